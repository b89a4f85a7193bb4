//! liftcheck library crate: re-exports for integration tests.
//!
//! The primary interface is the `liftcheck` binary. This lib.rs exposes
//! the engine modules so integration tests can drive repositories,
//! checkouts and comparisons directly without going through the CLI.

pub mod checkout;
pub mod compare;
pub mod config;
pub mod doctor;
pub mod error;
pub mod exec;
pub mod proxy;
pub mod repo;
pub mod scenarios;
pub mod tree;

pub use compare::{ComparisonOutcome, ConvertComparison};
pub use config::{HarnessConfig, Settings, Verbosity};
pub use error::{HarnessError, Result};
pub use exec::{CommandRunner, NativeCommand, RunStatus, ShellRunner};
pub use repo::{ConversionResult, CvsRepository};
