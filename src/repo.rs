//! Legacy-repository driver.
//!
//! [`CvsRepository`] owns a CVS repository directory inside a scratch
//! workdir and drives it through its lifecycle: initialization, module
//! creation, checkouts (proxying repositories that lack `CVSROOT`), and
//! conversion into a freshly initialized git repository via the
//! external converter. Any failed native command is fatal for the
//! running scenario: the error unwinds to the runner, which cleans up
//! and exits non-zero.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::checkout::CvsCheckout;
use crate::config::{FilterConfig, Settings};
use crate::error::Result;
use crate::exec::{CommandRunner, NativeCommand};
use crate::proxy::ProxyMount;

// ---------------------------------------------------------------------------
// ConversionResult
// ---------------------------------------------------------------------------

/// Reference names found in a converted repository.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversionResult {
    /// Branch names, synthetic branches dropped, `master` first.
    pub branches: Vec<String>,
    /// Tag names.
    pub tags: Vec<String>,
}

impl ConversionResult {
    /// Parse `git branch -l` / `git tag -l` output into reference sets.
    ///
    /// The current-branch marker (`*`) is stripped from the branch
    /// listing; synthetic branches are dropped per `filter`; `master`
    /// is promoted to the front of the branch ordering regardless of
    /// its position in the raw listing.
    pub fn from_listings(branches_raw: &str, tags_raw: &str, filter: &FilterConfig) -> Self {
        let mut branches: Vec<String> = branches_raw
            .split_whitespace()
            .filter(|name| *name != "*")
            .filter(|name| !filter.is_synthetic(name))
            .map(ToOwned::to_owned)
            .collect();
        if let Some(pos) = branches.iter().position(|b| b == "master")
            && pos != 0
        {
            let master = branches.remove(pos);
            branches.insert(0, master);
        }
        let tags = tags_raw.split_whitespace().map(ToOwned::to_owned).collect();
        Self { branches, tags }
    }

    /// Whether `name` is a known branch or tag.
    pub fn has_reference(&self, name: &str) -> bool {
        self.branches.iter().any(|b| b == name) || self.tags.iter().any(|t| t == name)
    }
}

// ---------------------------------------------------------------------------
// CvsRepository
// ---------------------------------------------------------------------------

/// Build the standard client invocation: `cvs [-Q] -d:local:<repo> ...`.
///
/// Shared with [`CvsCheckout`], which runs the same client rooted at
/// its own working directory.
pub(crate) fn cvs_command(settings: &Settings, repo_dir: &Path, cwd: &Path) -> NativeCommand {
    let mut cmd = NativeCommand::new(&settings.config.tools.cvs);
    if !settings.verbosity.shows_native() {
        cmd = cmd.arg("-Q");
    }
    cmd.arg(format!("-d:local:{}", repo_dir.display()))
        .current_dir(cwd)
}

/// A CVS repository under the harness's control.
#[derive(Debug)]
pub struct CvsRepository<R> {
    workdir: PathBuf,
    directory: PathBuf,
    settings: Settings,
    runner: R,
    /// Conversion outputs (git directories, stream files) to remove on
    /// cleanup.
    conversions: Vec<PathBuf>,
}

impl<R: CommandRunner + Clone> CvsRepository<R> {
    /// Create a driver for `<workdir>/<name>`. Nothing touches the
    /// filesystem until [`CvsRepository::init`] or a checkout runs.
    pub fn new(workdir: impl Into<PathBuf>, name: &str, settings: Settings, runner: R) -> Self {
        let workdir = workdir.into();
        let directory = workdir.join(name);
        Self {
            workdir,
            directory,
            settings,
            runner,
            conversions: Vec::new(),
        }
    }

    /// The repository directory (the proxy wrapper once proxied).
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The scratch directory checkouts and conversions land in.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// The run settings this driver was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) fn runner(&self) -> &R {
        &self.runner
    }

    /// Run a native client subcommand against this repository.
    pub fn cvs(&self, args: &[&str], cwd: &Path) -> Result<()> {
        let cmd = cvs_command(&self.settings, &self.directory, cwd).args(args.iter().copied());
        self.runner.run(&cmd)?.check(&cmd)
    }

    fn git(&self, args: &[&str], cwd: &Path) -> Result<()> {
        let cmd = NativeCommand::new(&self.settings.config.tools.git)
            .args(args.iter().copied())
            .current_dir(cwd);
        self.runner.run(&cmd)?.check(&cmd)
    }

    /// Destroy and recreate the repository directory, then initialize
    /// it with the native client.
    pub fn init(&mut self) -> Result<()> {
        if self.directory.exists() {
            std::fs::remove_dir_all(&self.directory)?;
        }
        std::fs::create_dir_all(&self.directory)?;
        self.cvs(&["init"], &self.workdir)
    }

    /// Create an empty module with the given name.
    pub fn module(&self, name: &str) -> Result<()> {
        let module = self.directory.join(name);
        debug!(target: "liftcheck::repo", "creating module {}", module.display());
        std::fs::create_dir(&module)?;
        Ok(())
    }

    /// Check out a module into the workdir.
    ///
    /// A repository without a `CVSROOT` cannot be checked out directly;
    /// such repositories are wrapped in a [`ProxyMount`] and the driver
    /// is retargeted at the wrapper. When `name` is given and differs
    /// from the module name, the checked-out directory is renamed to it
    /// (destroying any pre-existing directory of that name).
    pub fn checkout(&mut self, module: &str, name: Option<&str>) -> Result<CvsCheckout<R>> {
        let proxy = if self.directory.join("CVSROOT").is_dir() {
            None
        } else {
            let mount = ProxyMount::create(&self.directory, module)?;
            self.directory = mount.root().to_path_buf();
            Some(mount)
        };

        self.cvs(&["co", module], &self.workdir)?;

        let checkout_name = name.unwrap_or(module);
        let directory = self.workdir.join(checkout_name);
        if checkout_name != module {
            if directory.exists() {
                std::fs::remove_dir_all(&directory)?;
            }
            std::fs::rename(self.workdir.join(module), &directory)?;
        }

        Ok(CvsCheckout::new(
            self.directory.clone(),
            module,
            directory,
            proxy,
            self.settings.clone(),
            self.runner.clone(),
        ))
    }

    /// Convert a module into a fresh git repository at
    /// `<workdir>/<git_name>` and enumerate the resulting references.
    ///
    /// The commit stream is kept in `<workdir>/<git_name>.fi` until
    /// cleanup. `options` are passed to the converter verbatim (author
    /// maps, vendor-branch handling, and so on).
    pub fn convert(
        &mut self,
        module: &str,
        git_name: &str,
        options: &[String],
    ) -> Result<ConversionResult> {
        let git_dir = self.workdir.join(git_name);
        let stream = self.workdir.join(format!("{git_name}.fi"));

        let listing = self.versioned_artifacts(module)?;
        info!(target: "liftcheck::repo", "converting module {module} ({} files)", listing.len());

        let mut converter = NativeCommand::new(&self.settings.config.tools.converter);
        for _ in 0..self.settings.verbosity.converter_flags() {
            converter = converter.arg("-v");
        }
        let mut stdin = String::new();
        for path in &listing {
            stdin.push_str(&path.display().to_string());
            stdin.push('\n');
        }
        let converter = converter
            .args(options.iter().cloned())
            .current_dir(&self.workdir)
            .stdin_bytes(stdin.into_bytes())
            .stdout_file(&stream);
        self.runner.run(&converter)?.check(&converter)?;
        self.conversions.push(stream.clone());

        if git_dir.exists() {
            std::fs::remove_dir_all(&git_dir)?;
        }
        std::fs::create_dir_all(&git_dir)?;
        self.conversions.push(git_dir.clone());
        self.git(&["init", "--quiet"], &git_dir)?;
        // the converter emits refs/heads/master; pin HEAD there so the
        // post-import checkout is independent of host git defaults
        self.git(&["symbolic-ref", "HEAD", "refs/heads/master"], &git_dir)?;

        let import = NativeCommand::new(&self.settings.config.tools.git)
            .args(["fast-import", "--quiet", "--done"])
            .current_dir(&git_dir)
            .stdin_file(&stream);
        self.runner.run(&import)?.check(&import)?;
        self.git(&["checkout"], &git_dir)?;

        let branches = self.capture_git(&["branch", "-l"], &git_dir)?;
        let tags = self.capture_git(&["tag", "-l"], &git_dir)?;
        Ok(ConversionResult::from_listings(
            &branches,
            &tags,
            &self.settings.config.filter,
        ))
    }

    fn capture_git(&self, args: &[&str], cwd: &Path) -> Result<String> {
        let cmd = NativeCommand::new(&self.settings.config.tools.git)
            .args(args.iter().copied())
            .current_dir(cwd);
        let out = self.runner.capture(&cmd)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Every `,v` artifact under the module directory, sorted.
    fn versioned_artifacts(&self, module: &str) -> Result<Vec<PathBuf>> {
        // resolve through the proxy symlink, if any
        let module_dir = self.directory.join(module);
        let module_dir = std::fs::canonicalize(&module_dir).unwrap_or(module_dir);
        let mut artifacts = Vec::new();
        for entry in WalkDir::new(module_dir) {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file()
                && entry.file_name().to_string_lossy().ends_with(",v")
            {
                artifacts.push(entry.path().to_path_buf());
            }
        }
        artifacts.sort();
        Ok(artifacts)
    }

    /// Remove conversion outputs, unless retention was requested.
    pub fn cleanup(&mut self) -> Result<()> {
        if self.settings.retain {
            return Ok(());
        }
        for path in self.conversions.drain(..) {
            if path.is_dir() {
                std::fs::remove_dir_all(&path)?;
            } else if path.exists() {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::ScriptedRunner;

    fn settings() -> Settings {
        Settings::default()
    }

    #[test]
    fn listings_strip_marker_and_filter_synthetics() {
        let filter = FilterConfig::default();
        let result = ConversionResult::from_listings(
            "  import-1.1.1\n* alpha\n  master\n  UNNAMED-1.2\n",
            "v1.0\nv2.0\n",
            &filter,
        );
        assert_eq!(result.branches, vec!["master", "alpha"]);
        assert_eq!(result.tags, vec!["v1.0", "v2.0"]);
        assert!(result.has_reference("alpha"));
        assert!(result.has_reference("v2.0"));
        assert!(!result.has_reference("import-1.1.1"));
    }

    #[test]
    fn master_promoted_even_when_current_branch_differs() {
        let filter = FilterConfig::default();
        let result =
            ConversionResult::from_listings("* work\n  master\n  topic\n", "", &filter);
        assert_eq!(result.branches, vec!["master", "work", "topic"]);
    }

    #[test]
    fn no_master_keeps_listing_order() {
        let filter = FilterConfig::default();
        let result = ConversionResult::from_listings("  beta\n  alpha\n", "", &filter);
        assert_eq!(result.branches, vec!["beta", "alpha"]);
    }

    #[test]
    fn init_recreates_directory_and_runs_cvs_init() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        let mut repo = CvsRepository::new(dir.path(), "fix.testrepo", settings(), runner.clone());

        // pre-existing content must be destroyed
        std::fs::create_dir_all(dir.path().join("fix.testrepo/old")).unwrap();
        repo.init().unwrap();
        assert!(repo.directory().is_dir());
        assert!(!repo.directory().join("old").exists());

        let commands = runner.commands();
        assert_eq!(commands.len(), 1);
        assert!(commands[0].starts_with("cvs -Q -d:local:"));
        assert!(commands[0].ends_with(" init"));
    }

    #[test]
    fn native_output_unmuted_at_high_verbosity() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        let mut loud = settings();
        loud.verbosity = crate::config::Verbosity::new(3);
        let repo = CvsRepository::new(dir.path(), "r.testrepo", loud, runner.clone());
        std::fs::create_dir_all(repo.directory()).unwrap();
        repo.cvs(&["init"], dir.path()).unwrap();
        assert!(!runner.commands()[0].contains("-Q"));
    }

    #[test]
    fn failed_native_command_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        runner.fail_matching("init");
        let mut repo = CvsRepository::new(dir.path(), "r.testrepo", settings(), runner);
        let err = repo.init().unwrap_err();
        assert!(matches!(
            err,
            crate::error::HarnessError::CommandFailed { code: 1, .. }
        ));
    }

    #[test]
    fn checkout_renames_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        let mut repo = CvsRepository::new(dir.path(), "r.testrepo", settings(), runner.clone());
        repo.init().unwrap();
        repo.module("module").unwrap();
        // the scripted runner does not touch the filesystem; fabricate
        // what `cvs init` and `cvs co` would have produced
        std::fs::create_dir_all(repo.directory().join("CVSROOT")).unwrap();
        std::fs::create_dir_all(dir.path().join("module")).unwrap();
        std::fs::write(dir.path().join("module/f.txt"), "x\n").unwrap();

        let co = repo.checkout("module", Some("r.checkout")).unwrap();
        assert_eq!(co.directory(), dir.path().join("r.checkout"));
        assert!(co.directory().join("f.txt").is_file());
        assert!(!co.is_proxied());
        assert!(runner.commands().last().unwrap().contains(" co module"));
    }

    #[test]
    fn checkout_proxies_repository_without_cvsroot() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        // a bare archive: module files, no CVSROOT
        let archive = dir.path().join("bare.testrepo");
        std::fs::create_dir_all(archive.join("module")).unwrap();
        std::fs::write(archive.join("module/f.txt,v"), "head 1.1;\n").unwrap();

        let mut repo =
            CvsRepository::new(dir.path(), "bare.testrepo", settings(), runner.clone());
        std::fs::create_dir_all(dir.path().join("module")).unwrap();
        let co = repo.checkout("module", None).unwrap();

        assert!(co.is_proxied());
        let proxied = dir.path().join("bare.testrepo.proxy");
        assert_eq!(repo.directory(), proxied);
        assert!(proxied.join("CVSROOT").is_dir());
        // the client was pointed at the wrapper, not the bare archive
        assert!(runner.commands()[0].contains("bare.testrepo.proxy"));
    }

    #[test]
    fn cleanup_removes_conversion_outputs_unless_retained() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        let mut repo = CvsRepository::new(dir.path(), "r.testrepo", settings(), runner);
        let keep = dir.path().join("r-git");
        let stream = dir.path().join("r-git.fi");
        std::fs::create_dir_all(&keep).unwrap();
        std::fs::write(&stream, "done\n").unwrap();
        repo.conversions.push(keep.clone());
        repo.conversions.push(stream.clone());

        repo.cleanup().unwrap();
        assert!(!keep.exists());
        assert!(!stream.exists());
    }

    #[test]
    fn retained_cleanup_keeps_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        let mut kept = settings();
        kept.retain = true;
        let mut repo = CvsRepository::new(dir.path(), "r.testrepo", kept, runner);
        let stream = dir.path().join("r-git.fi");
        std::fs::write(&stream, "done\n").unwrap();
        repo.conversions.push(stream.clone());
        repo.cleanup().unwrap();
        assert!(stream.exists());
    }

    #[test]
    fn convert_pipeline_sequences_converter_and_git() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        runner.push_capture("* master\n  import-1.1.1\n");
        runner.push_capture("v1\n");
        let mut repo = CvsRepository::new(dir.path(), "r.testrepo", settings(), runner.clone());
        repo.init().unwrap();
        repo.module("module").unwrap();
        std::fs::write(
            repo.directory().join("module/f.txt,v"),
            "head 1.1;\n",
        )
        .unwrap();

        let result = repo.convert("module", "r-git", &[]).unwrap();
        assert_eq!(result.branches, vec!["master"]);
        assert_eq!(result.tags, vec!["v1"]);

        let commands = runner.commands();
        // init, converter, git init, symbolic-ref, fast-import,
        // checkout, branch -l, tag -l
        assert_eq!(commands.len(), 8);
        assert!(commands[1].starts_with("cvs-fast-export"));
        assert!(commands[2].contains("git init --quiet"));
        assert!(commands[3].contains("symbolic-ref HEAD refs/heads/master"));
        assert!(commands[4].contains("fast-import --quiet --done"));
        assert!(commands[5].ends_with("git checkout"));
        assert!(commands[6].contains("branch -l"));
        assert!(commands[7].contains("tag -l"));
    }

    #[test]
    fn convert_passes_extra_options() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        runner.push_capture("master\n");
        runner.push_capture("");
        let mut repo = CvsRepository::new(dir.path(), "r.testrepo", settings(), runner.clone());
        repo.init().unwrap();
        repo.module("module").unwrap();
        repo.convert("module", "r-git", &["-A".to_owned(), "authors.map".to_owned()])
            .unwrap();
        assert!(runner.commands()[1].contains("-A authors.map"));
    }
}
