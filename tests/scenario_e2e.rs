//! End-to-end scenario runs against the real external tools.
//!
//! Each test skips gracefully when cvs, git or the converter are not
//! installed; the engine itself is covered by the unit tests, which
//! drive it with a scripted runner.

mod common;

use liftcheck::scenarios;

fn run_scenario(name: &str) {
    if !common::conversion_tools_available() {
        eprintln!("skipping {name}: cvs/git/cvs-fast-export not all installed");
        return;
    }
    let scenario = scenarios::find(name).expect("scenario is registered");
    let passed = scenario
        .run(&common::settings())
        .expect("no native tool failure");
    assert!(passed, "scenario {name} reported divergence");
}

#[test]
fn linear_history_converts_cleanly() {
    run_scenario("linear");
}

#[test]
fn branched_history_converts_cleanly() {
    run_scenario("branched");
}

#[test]
fn interleaved_commits_convert_cleanly() {
    run_scenario("interleaved");
}

#[test]
fn ignore_files_do_not_pollute_manifests() {
    run_scenario("ignores");
}

#[test]
fn proxied_archive_converts_cleanly() {
    run_scenario("proxied");
}

#[test]
fn log_messages_survive_conversion() {
    run_scenario("log-messages");
}

#[test]
fn deliberate_divergence_is_detected() {
    run_scenario("divergence");
}
