//! Named test scenarios.
//!
//! Each scenario scripts a CVS history through the checkout
//! primitives, converts it, and asserts tree equality (or a deliberate
//! divergence) between the legacy checkout and the conversion. A
//! scenario returns `Ok(true)` when every assertion held, `Ok(false)`
//! when at least one comparison failed, and `Err` when a native tool
//! failed outright.
//!
//! Scenarios run against the real external tools; use `liftcheck
//! doctor` to see whether those are installed.

use std::path::Path;

use tracing::info;

use crate::compare::ConvertComparison;
use crate::config::Settings;
use crate::error::Result;
use crate::exec::{NativeCommand, ShellRunner};
use crate::repo::CvsRepository;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Everything a scenario body needs: a scratch directory to build in
/// and the run settings.
pub struct Context<'a> {
    /// Scratch directory; all repositories, checkouts and conversion
    /// outputs are created inside it.
    pub workdir: &'a Path,
    /// Run settings (config, verbosity, retention).
    pub settings: &'a Settings,
}

/// A named, self-contained test scenario.
pub struct Scenario {
    /// Identifier used on the command line.
    pub name: &'static str,
    /// One-line description for `liftcheck list`.
    pub summary: &'static str,
    run: fn(&Context<'_>) -> Result<bool>,
}

/// All scenarios, in the order they are run by default.
pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "linear",
        summary: "trunk-only history; full sweep plus a repeated compare",
        run: linear,
    },
    Scenario {
        name: "branched",
        summary: "branch, tag and merge back to trunk",
        run: branched,
    },
    Scenario {
        name: "interleaved",
        summary: "three files committed in overlapping groups",
        run: interleaved,
    },
    Scenario {
        name: "ignores",
        summary: "ignore files are excluded from manifests on both sides",
        run: ignores,
    },
    Scenario {
        name: "proxied",
        summary: "archive without CVSROOT converts through the proxy wrapper",
        run: proxied,
    },
    Scenario {
        name: "log-messages",
        summary: "commit messages survive conversion in order",
        run: log_messages,
    },
    Scenario {
        name: "divergence",
        summary: "a deliberate mutation is reported as expected divergence",
        run: divergence,
    },
];

/// Look a scenario up by name.
pub fn find(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.name == name)
}

impl Scenario {
    /// Run this scenario in a fresh scratch directory.
    ///
    /// The scratch directory is removed on every exit path (including
    /// fatal errors) unless retention was requested, in which case its
    /// path is printed.
    pub fn run(&self, settings: &Settings) -> Result<bool> {
        info!(target: "liftcheck::scenario", "running scenario {}", self.name);
        let scratch = tempfile::Builder::new()
            .prefix(&format!("liftcheck-{}-", self.name))
            .tempdir()?;
        let ctx = Context {
            workdir: scratch.path(),
            settings,
        };
        let outcome = (self.run)(&ctx);
        if settings.retain {
            let kept = scratch.keep();
            eprintln!("liftcheck: {}: scratch retained at {}", self.name, kept.display());
        }
        outcome
    }
}

// ---------------------------------------------------------------------------
// Scenario bodies
// ---------------------------------------------------------------------------

fn fresh_repo(ctx: &Context<'_>, stem: &str) -> Result<CvsRepository<ShellRunner>> {
    let mut repo = CvsRepository::new(
        ctx.workdir,
        &format!("{stem}.testrepo"),
        ctx.settings.clone(),
        ShellRunner,
    );
    repo.init()?;
    repo.module("module")?;
    Ok(repo)
}

/// Trunk-only history: several commits, one tag, then a full sweep and
/// a repeated compare of the default branch (same outcome both times).
fn linear(ctx: &Context<'_>) -> Result<bool> {
    let mut repo = fresh_repo(ctx, "linear")?;
    let mut work = repo.checkout("module", Some("linear.work"))?;
    work.write("README", "one\n")?;
    work.add(&["README"])?;
    work.commit("add README")?;
    work.append("README", "two\n")?;
    work.commit("extend README")?;
    work.write("hello.c", "int main(void) { return 0; }\n")?;
    work.add(&["hello.c"])?;
    work.commit("add hello")?;
    work.tag("v1")?;
    work.cleanup()?;

    let mut cc = ConvertComparison::new(repo, "module", "linear", &[])?;
    let mut ok = cc.checkall()?;
    ok &= cc.compare_tree("branch", "master", true)?;
    cc.cleanup()?;
    Ok(ok)
}

/// Branch off trunk, work on both sides, merge back, tag the result.
fn branched(ctx: &Context<'_>) -> Result<bool> {
    let mut repo = fresh_repo(ctx, "branched")?;
    let mut work = repo.checkout("module", Some("branched.work"))?;
    work.write("base.txt", "base\n")?;
    work.add(&["base.txt"])?;
    work.commit("add base")?;

    work.branch("side")?;
    work.write("side.txt", "from the side\n")?;
    work.add(&["side.txt"])?;
    work.commit("side work")?;

    work.switch("HEAD")?;
    work.write("trunk.txt", "from the trunk\n")?;
    work.add(&["trunk.txt"])?;
    work.commit("trunk work")?;

    work.merge("side")?;
    work.commit("merge side to trunk")?;
    work.tag("v1")?;
    work.cleanup()?;

    let mut cc = ConvertComparison::new(repo, "module", "branched", &[])?;
    let ok = cc.checkall()?;
    cc.cleanup()?;
    Ok(ok)
}

/// Three files committed in overlapping groups, the shape that
/// historically confused patchset estimation.
fn interleaved(ctx: &Context<'_>) -> Result<bool> {
    let mut repo = fresh_repo(ctx, "interleaved")?;
    let mut work = repo.checkout("module", Some("interleaved.work"))?;
    work.write("a", "a 1.1\n")?;
    work.add(&["a"])?;
    work.commit("changes are done")?;

    work.write("c", "c 1.1\n")?;
    work.add(&["c"])?;
    work.commit("changes")?;

    work.append("c", "c 1.2\n")?;
    work.commit("changes")?;

    work.write("b", "b 1.1\n")?;
    work.add(&["b"])?;
    work.append("c", "c 1.3\n")?;
    work.commit("changes are done")?;
    work.cleanup()?;

    let mut cc = ConvertComparison::new(repo, "module", "interleaved", &[])?;
    let ok = cc.compare_tree("branch", "master", true)?;
    cc.cleanup()?;
    Ok(ok)
}

/// Ignore files live on both sides under different conventions; the
/// manifests must still compare clean.
fn ignores(ctx: &Context<'_>) -> Result<bool> {
    let mut repo = fresh_repo(ctx, "ignores")?;
    let mut work = repo.checkout("module", Some("ignores.work"))?;
    work.write(".cvsignore", "*.o\n*.a\n")?;
    work.add(&[".cvsignore"])?;
    work.commit("add ignore patterns")?;
    work.write("kept.txt", "kept\n")?;
    work.add(&["kept.txt"])?;
    work.commit("add kept file")?;
    work.cleanup()?;

    let mut cc = ConvertComparison::new(repo, "module", "ignores", &[])?;
    let ok = cc.checkall()?;
    cc.cleanup()?;
    Ok(ok)
}

/// Copy a module's archive files into a repository without `CVSROOT`
/// and convert through the proxy wrapper; the result must compare as
/// clean as the ordinary conversion.
fn proxied(ctx: &Context<'_>) -> Result<bool> {
    let mut repo = fresh_repo(ctx, "proxied")?;
    let mut work = repo.checkout("module", Some("proxied.work"))?;
    work.write("one.txt", "one\n")?;
    work.add(&["one.txt"])?;
    work.commit("add one")?;
    work.append("one.txt", "more\n")?;
    work.commit("extend one")?;
    work.cleanup()?;

    // a bare archive: the module's ,v files with no CVSROOT beside them
    let bare = ctx.workdir.join("proxbare.testrepo");
    copy_tree(&repo.directory().join("module"), &bare)?;

    let mut ordinary = ConvertComparison::new(repo, "module", "proxied", &[])?;
    let mut ok = ordinary.checkall()?;
    ordinary.cleanup()?;

    let bare_repo = CvsRepository::new(
        ctx.workdir,
        "proxbare.testrepo",
        ctx.settings.clone(),
        ShellRunner,
    );
    let mut cc = ConvertComparison::new(bare_repo, "module", "proxbare", &[])?;
    if !cc.checkout().is_proxied() {
        eprintln!("liftcheck: proxied: checkout unexpectedly ran without the proxy wrapper");
        ok = false;
    }
    ok &= cc.checkall()?;
    cc.cleanup()?;
    Ok(ok)
}

/// Commit messages must survive conversion, newest first in the log.
fn log_messages(ctx: &Context<'_>) -> Result<bool> {
    let mut repo = fresh_repo(ctx, "logmsg")?;
    let mut work = repo.checkout("module", Some("logmsg.work"))?;
    work.write("f.txt", "1\n")?;
    work.add(&["f.txt"])?;
    work.commit("first")?;
    work.append("f.txt", "2\n")?;
    work.commit("second")?;
    work.append("f.txt", "3\n")?;
    work.commit("third")?;
    work.cleanup()?;

    let mut cc = ConvertComparison::new(repo, "module", "logmsg", &[])?;
    let mut ok = cc.compare_tree("branch", "master", true)?;
    let log = NativeCommand::new(&ctx.settings.config.tools.git)
        .args(["log", "--format=%s"])
        .current_dir(cc.git_dir());
    ok &= cc.command_returns(&log, "third\nsecond\nfirst")?;
    cc.cleanup()?;
    Ok(ok)
}

/// Mutate the legacy checkout after conversion; the comparison must
/// report divergence, and must have matched before the mutation.
fn divergence(ctx: &Context<'_>) -> Result<bool> {
    let mut repo = fresh_repo(ctx, "diverge")?;
    let mut work = repo.checkout("module", Some("diverge.work"))?;
    work.write("base.txt", "base\n")?;
    work.add(&["base.txt"])?;
    work.commit("add base")?;
    work.cleanup()?;

    let mut cc = ConvertComparison::new(repo, "module", "diverge", &[])?;
    let mut ok = cc.compare_tree("branch", "master", true)?;
    cc.checkout().append("base.txt", "uncommitted\n")?;
    // divergence is the expected outcome now
    ok &= !cc.compare_tree("branch", "master", false)?;
    cc.cleanup()?;
    Ok(ok)
}

/// Recursive copy used to fabricate bare archives.
fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in walkdir::WalkDir::new(from) {
        let entry = entry.map_err(std::io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(from)
            .expect("walked path is under its root");
        let target = to.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_names_are_unique() {
        let mut names: Vec<&str> = SCENARIOS.iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), SCENARIOS.len());
    }

    #[test]
    fn find_known_and_unknown() {
        assert!(find("linear").is_some());
        assert!(find("branched").is_some());
        assert!(find("no-such-scenario").is_none());
    }

    #[test]
    fn copy_tree_replicates_structure() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("sub")).unwrap();
        std::fs::write(src.join("top.txt,v"), "head 1.1;\n").unwrap();
        std::fs::write(src.join("sub/inner.txt,v"), "head 1.2;\n").unwrap();

        let dst = dir.path().join("dst");
        copy_tree(&src, &dst).unwrap();
        assert_eq!(
            std::fs::read_to_string(dst.join("top.txt,v")).unwrap(),
            "head 1.1;\n"
        );
        assert_eq!(
            std::fs::read_to_string(dst.join("sub/inner.txt,v")).unwrap(),
            "head 1.2;\n"
        );
    }
}
