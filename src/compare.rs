//! Conversion comparison, the top-level orchestration.
//!
//! [`ConvertComparison`] ties a [`CvsRepository`] to its converted git
//! counterpart: it makes the comparison checkout, runs the conversion,
//! and exposes the tree-comparison and command-output assertions test
//! scenarios are written in. Divergences are *reported*, not fatal, so
//! one scenario can surface several independent assertion failures;
//! any native-tool failure aborts the scenario through the usual error
//! path.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::checkout::CvsCheckout;
use crate::config::Settings;
use crate::error::Result;
use crate::exec::{CommandRunner, NativeCommand};
use crate::repo::{ConversionResult, CvsRepository};
use crate::tree::{self, ManifestDelta};

// ---------------------------------------------------------------------------
// ComparisonOutcome
// ---------------------------------------------------------------------------

/// The result of one tree comparison. Computed fresh per call.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ComparisonOutcome {
    /// Manifests matched and every shared path was byte-identical.
    pub matched: bool,
    /// Paths present only in the legacy checkout.
    pub legacy_only: Vec<PathBuf>,
    /// Paths present only in the converted tree.
    pub converted_only: Vec<PathBuf>,
    /// Shared paths whose contents differ.
    pub mismatched: Vec<PathBuf>,
}

// ---------------------------------------------------------------------------
// ConvertComparison
// ---------------------------------------------------------------------------

/// Compare a CVS repository and its git conversion for equality.
#[derive(Debug)]
pub struct ConvertComparison<R> {
    stem: String,
    repo: CvsRepository<R>,
    checkout: CvsCheckout<R>,
    git_dir: PathBuf,
    result: ConversionResult,
    settings: Settings,
    runner: R,
}

impl<R: CommandRunner + Clone> ConvertComparison<R> {
    /// Check out `module` as `<stem>.checkout`, convert it into
    /// `<stem>-git`, and retain the resulting reference sets.
    pub fn new(
        mut repo: CvsRepository<R>,
        module: &str,
        stem: &str,
        options: &[String],
    ) -> Result<Self> {
        let settings = repo.settings().clone();
        let runner = repo.runner().clone();
        let checkout = repo.checkout(module, Some(&format!("{stem}.checkout")))?;
        let git_name = format!("{stem}-git");
        let result = repo.convert(module, &git_name, options)?;
        let git_dir = repo.workdir().join(&git_name);
        Ok(Self {
            stem: stem.to_owned(),
            repo,
            checkout,
            git_dir,
            result,
            settings,
            runner,
        })
    }

    /// Branch names found by the conversion (synthetics filtered,
    /// `master` first).
    pub fn branches(&self) -> &[String] {
        &self.result.branches
    }

    /// Tag names found by the conversion.
    pub fn tags(&self) -> &[String] {
        &self.result.tags
    }

    /// The comparison checkout, for scenario-driven mutation.
    pub fn checkout(&self) -> &CvsCheckout<R> {
        &self.checkout
    }

    /// The converted repository directory.
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Compare the legacy and converted trees at `reference`.
    ///
    /// Returns whether the trees actually matched; the caller knows
    /// whether that was the expected outcome. Reference-switch failures
    /// are fatal (the name exists but the repository cannot produce
    /// it); a reference absent from both sets is an ordinary assertion
    /// failure.
    pub fn compare_tree(
        &self,
        legend: &str,
        reference: &str,
        success_expected: bool,
    ) -> Result<bool> {
        let preamble = format!("{} {} {}", self.stem, legend, reference);
        if !self.result.has_reference(reference) {
            if success_expected {
                eprintln!("liftcheck: {preamble}: branch or tag unexpectedly missing");
            }
            return Ok(false);
        }

        self.checkout.update(reference)?;
        let switch = NativeCommand::new(&self.settings.config.tools.git)
            .args(["checkout", "--quiet", reference])
            .current_dir(&self.git_dir);
        self.runner.run(&switch)?.check(&switch)?;

        let outcome = self.diff_trees()?;
        if outcome.matched {
            if success_expected {
                info!(target: "liftcheck::compare", "{preamble}: trees matched as expected");
            } else {
                eprintln!("liftcheck: {preamble}: trees unexpectedly match");
            }
        } else if success_expected {
            self.report_divergence(&preamble, &outcome);
        } else {
            info!(target: "liftcheck::compare", "{preamble}: trees diverged as expected");
        }
        Ok(outcome.matched)
    }

    /// Sweep every non-synthetic branch and every tag, expecting all of
    /// them to match.
    pub fn checkall(&self) -> Result<bool> {
        let mut all_matched = true;
        for branch in &self.result.branches {
            all_matched &= self.compare_tree("branch", branch, true)?;
        }
        for tag in &self.result.tags {
            all_matched &= self.compare_tree("tag", tag, true)?;
        }
        Ok(all_matched)
    }

    /// Run an auxiliary command and compare its trimmed output against
    /// an expected literal. Capture failure is fatal.
    pub fn command_returns(&self, command: &NativeCommand, expected: &str) -> Result<bool> {
        let out = self.runner.capture(command)?;
        let actual = String::from_utf8_lossy(&out);
        let matched = actual.trim() == expected.trim();
        if !matched {
            eprintln!("liftcheck: {}: `{command}` returned unexpected output", self.stem);
            eprintln!("{}", diffy::create_patch(expected, &actual));
        }
        Ok(matched)
    }

    /// Remove the comparison checkout and the conversion outputs
    /// (retention-aware).
    pub fn cleanup(&mut self) -> Result<()> {
        self.checkout.cleanup()?;
        self.repo.cleanup()
    }

    fn diff_trees(&self) -> Result<ComparisonOutcome> {
        let legacy_root = self.checkout.directory();
        let converted_root = self.git_dir.as_path();
        let legacy = tree::manifest(legacy_root, tree::LEGACY_BOOKKEEPING)?;
        let converted = tree::manifest(converted_root, tree::TARGET_BOOKKEEPING)?;
        let delta = ManifestDelta::between(&legacy, &converted);

        let mut mismatched = Vec::new();
        for rel in legacy.intersection(&converted) {
            if !tree::same_bytes(&legacy_root.join(rel), &converted_root.join(rel))? {
                mismatched.push(rel.clone());
            }
        }

        Ok(ComparisonOutcome {
            matched: delta.is_empty() && mismatched.is_empty(),
            legacy_only: delta.legacy_only,
            converted_only: delta.converted_only,
            mismatched,
        })
    }

    fn report_divergence(&self, preamble: &str, outcome: &ComparisonOutcome) {
        if !outcome.legacy_only.is_empty() || !outcome.converted_only.is_empty() {
            eprintln!("liftcheck: {preamble}: file manifests don't match");
            for path in &outcome.legacy_only {
                eprintln!("liftcheck: {preamble}: only in legacy checkout: {}", path.display());
            }
            for path in &outcome.converted_only {
                eprintln!("liftcheck: {preamble}: only in conversion: {}", path.display());
            }
        }
        for path in &outcome.mismatched {
            eprintln!(
                "liftcheck: {preamble}: {} differs between checkout and conversion",
                path.display()
            );
            if self.settings.verbosity.shows_steps() {
                self.print_diff(path);
            }
        }
    }

    fn print_diff(&self, rel: &Path) {
        let legacy = std::fs::read(self.checkout.directory().join(rel));
        let converted = std::fs::read(self.git_dir.join(rel));
        if let (Ok(legacy), Ok(converted)) = (legacy, converted) {
            match (std::str::from_utf8(&legacy), std::str::from_utf8(&converted)) {
                (Ok(a), Ok(b)) => eprintln!("{}", diffy::create_patch(a, b)),
                _ => eprintln!("liftcheck: {}: binary contents differ", rel.display()),
            }
        }
    }
}
