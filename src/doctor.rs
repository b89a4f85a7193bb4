//! Environment checks for the external tools.
//!
//! The harness is only as good as the executables it drives; `liftcheck
//! doctor` reports whether the legacy client, the target client and the
//! converter are installed and answering.

use std::process::Command;

use anyhow::Result;

use crate::config::ToolsConfig;

struct ToolCheck {
    ok: bool,
    message: String,
}

fn print_check(check: &ToolCheck) {
    let prefix = if check.ok { "[OK]" } else { "[FAIL]" };
    println!("{} {}", prefix, check.message);
}

/// Check that the configured executables are available.
///
/// Returns `Ok(true)` when everything answered; the caller decides the
/// exit status.
#[allow(clippy::unnecessary_wraps)]
pub fn run(tools: &ToolsConfig) -> Result<bool> {
    let checks = [
        check_tool(&tools.cvs, &["--version"]),
        check_tool(&tools.git, &["--version"]),
        check_tool(&tools.converter, &["--version"]),
    ];

    println!("liftcheck doctor");
    println!("================");
    println!();
    for check in &checks {
        print_check(check);
    }
    println!();

    let all_ok = checks.iter().all(|c| c.ok);
    if all_ok {
        println!("All tools available.");
    } else {
        println!("Some tools are missing; scenarios will fail until they are installed.");
    }
    Ok(all_ok)
}

fn check_tool(name: &str, args: &[&str]) -> ToolCheck {
    match Command::new(name).args(args).output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout);
            let version = version.lines().next().unwrap_or("unknown").trim().to_owned();
            ToolCheck {
                ok: true,
                message: format!("{name}: {version}"),
            }
        }
        Ok(_) => ToolCheck {
            ok: false,
            message: format!("{name}: found but returned an error"),
        },
        Err(_) => ToolCheck {
            ok: false,
            message: format!("{name}: not found"),
        },
    }
}
