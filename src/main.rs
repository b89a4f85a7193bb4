use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use liftcheck::config::{HarnessConfig, Settings, Verbosity};
use liftcheck::doctor;
use liftcheck::scenarios::{self, Scenario};

/// Differential test harness for CVS-to-git history conversion
///
/// liftcheck scripts a CVS repository through version-control
/// operations, converts it with an external lifter, and asserts that
/// the CVS checkout and the converted git tree are identical at every
/// shared branch and tag. Divergences are reported to stderr; a failed
/// native command aborts the scenario.
#[derive(Parser)]
#[command(name = "liftcheck")]
#[command(version, about)]
#[command(after_help = "See 'liftcheck list' for the available scenarios.")]
struct Cli {
    /// Raise verbosity (repeatable: steps, commands, native output,
    /// converter output)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Keep scratch directories and stream files instead of cleaning up
    #[arg(short = 'k', long = "keep", short_alias = 'n', global = true)]
    keep: bool,

    /// Path to a configuration file (default: ./liftcheck.toml if present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenarios (all of them when none are named)
    Run {
        /// Scenario names, as shown by 'liftcheck list'
        scenarios: Vec<String>,
    },

    /// List available scenarios
    List,

    /// Check that cvs, git and the converter are available
    Doctor,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("liftcheck={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let config = match &cli.config {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::load_or_default(std::path::Path::new("."))?,
    };
    Ok(Settings {
        config,
        verbosity: Verbosity::new(cli.verbose),
        retain: cli.keep,
    })
}

fn select(names: &[String]) -> Result<Vec<&'static Scenario>> {
    if names.is_empty() {
        return Ok(scenarios::SCENARIOS.iter().collect());
    }
    let mut selected = Vec::with_capacity(names.len());
    for name in names {
        match scenarios::find(name) {
            Some(scenario) => selected.push(scenario),
            None => bail!(
                "unknown scenario '{name}'; see 'liftcheck list' for the available ones"
            ),
        }
    }
    Ok(selected)
}

fn run(settings: &Settings, names: &[String]) -> Result<()> {
    let selected = select(names)?;
    let mut failed = 0usize;
    for scenario in &selected {
        match scenario.run(settings) {
            Ok(true) => println!("liftcheck: {}: ok", scenario.name),
            Ok(false) => {
                println!("liftcheck: {}: FAILED", scenario.name);
                failed += 1;
            }
            // a native-tool failure aborts the whole run
            Err(err) => return Err(err.into()),
        }
    }
    if failed > 0 {
        bail!("{failed} of {} scenario(s) failed", selected.len());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let settings = load_settings(&cli)?;

    match &cli.command {
        Commands::Run { scenarios: names } => run(&settings, names),
        Commands::List => {
            for scenario in scenarios::SCENARIOS {
                println!("{:<14} {}", scenario.name, scenario.summary);
            }
            Ok(())
        }
        Commands::Doctor => {
            doctor::run(&settings.config.tools)?;
            Ok(())
        }
    }
}
