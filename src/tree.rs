//! Working-tree enumeration and content comparison.
//!
//! A manifest is the set of relative file paths under a checkout,
//! excluding the version-control bookkeeping directory and files the
//! converter synthesizes from ignore-file conventions. Two checkouts
//! compare equal when their manifests match and every shared path is
//! byte-identical.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::Result;

/// Bookkeeping directory the legacy client scatters through checkouts.
pub const LEGACY_BOOKKEEPING: &str = "CVS";

/// Bookkeeping directory at the root of a converted repository.
pub const TARGET_BOOKKEEPING: &str = ".git";

/// Ignore-file suffixes excluded from manifests on both sides. The
/// converter synthesizes target-side ignore files from the legacy
/// ones, so neither kind can be expected to exist, or to match, on the
/// other side.
pub const IGNORE_SUFFIXES: [&str; 2] = [".cvsignore", ".gitignore"];

fn is_ignore_file(name: &str) -> bool {
    IGNORE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Enumerate every regular file under `root`, relative to `root`,
/// skipping the `bookkeeping` directory and ignore files. Sorted by
/// construction (`BTreeSet`).
pub fn manifest(root: &Path, bookkeeping: &str) -> Result<BTreeSet<PathBuf>> {
    let mut files = BTreeSet::new();
    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || entry.file_name() != bookkeeping);
    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if is_ignore_file(&name) {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .expect("walked path is under its root");
        files.insert(rel.to_path_buf());
    }
    Ok(files)
}

/// Byte-exact content comparison.
pub fn same_bytes(a: &Path, b: &Path) -> Result<bool> {
    Ok(std::fs::read(a)? == std::fs::read(b)?)
}

/// Difference between two manifests.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ManifestDelta {
    /// Paths present only on the legacy side.
    pub legacy_only: Vec<PathBuf>,
    /// Paths present only on the converted side.
    pub converted_only: Vec<PathBuf>,
}

impl ManifestDelta {
    /// Compute the one-sided differences between two manifests.
    pub fn between(legacy: &BTreeSet<PathBuf>, converted: &BTreeSet<PathBuf>) -> Self {
        Self {
            legacy_only: legacy.difference(converted).cloned().collect(),
            converted_only: converted.difference(legacy).cloned().collect(),
        }
    }

    /// Whether the manifests were identical.
    pub fn is_empty(&self) -> bool {
        self.legacy_only.is_empty() && self.converted_only.is_empty()
    }
}
