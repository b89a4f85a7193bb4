//! A working copy bound to a [`CvsRepository`](crate::repo::CvsRepository).
//!
//! Mutation operations translate to native client invocations rooted at
//! the checkout directory; file operations use absolute paths. The
//! commit operation enforces the inter-commit delay, since CVS timestamps
//! have one-second granularity and back-to-back commits would collide
//! or be misordered by downstream history reconstruction.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::Settings;
use crate::error::Result;
use crate::exec::CommandRunner;
use crate::proxy::ProxyMount;
use crate::repo::cvs_command;

/// A materialized, mutable working copy.
#[derive(Debug)]
pub struct CvsCheckout<R> {
    repo_dir: PathBuf,
    module: String,
    directory: PathBuf,
    proxy: Option<ProxyMount>,
    settings: Settings,
    runner: R,
}

impl<R: CommandRunner + Clone> CvsCheckout<R> {
    pub(crate) fn new(
        repo_dir: PathBuf,
        module: &str,
        directory: PathBuf,
        proxy: Option<ProxyMount>,
        settings: Settings,
        runner: R,
    ) -> Self {
        Self {
            repo_dir,
            module: module.to_owned(),
            directory,
            proxy,
            settings,
            runner,
        }
    }

    /// The checkout directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The module this checkout materializes.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Whether a proxy wrapper was fabricated to satisfy the client.
    pub fn is_proxied(&self) -> bool {
        self.proxy.is_some()
    }

    /// Run a native client subcommand rooted at the checkout.
    pub fn cvs(&self, args: &[&str]) -> Result<()> {
        let cmd =
            cvs_command(&self.settings, &self.repo_dir, &self.directory).args(args.iter().copied());
        self.runner.run(&cmd)?.check(&cmd)
    }

    /// Create file content in the working copy.
    pub fn write(&self, name: &str, content: &str) -> Result<()> {
        debug!(target: "liftcheck::checkout", "{name} <- {content:?}");
        std::fs::write(self.directory.join(name), content)?;
        Ok(())
    }

    /// Append to file content in the working copy.
    pub fn append(&self, name: &str, content: &str) -> Result<()> {
        use std::io::Write;
        debug!(target: "liftcheck::checkout", "{name} <-| {content:?}");
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.directory.join(name))?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }

    /// Add files to the version-controlled set.
    pub fn add(&self, names: &[&str]) -> Result<()> {
        let mut args = vec!["add"];
        args.extend_from_slice(names);
        self.cvs(&args)
    }

    /// Remove files from the version-controlled set.
    pub fn remove(&self, names: &[&str]) -> Result<()> {
        let mut args = vec!["remove", "-f"];
        args.extend_from_slice(names);
        self.cvs(&args)
    }

    /// Create a tag at the current state.
    pub fn tag(&self, name: &str) -> Result<()> {
        self.cvs(&["tag", name])
    }

    /// Create a branch and switch the checkout onto it.
    ///
    /// The client needs a root tag to anchor a branch deterministically,
    /// so this tags `<name>_root` first and branches from that.
    pub fn branch(&self, name: &str) -> Result<()> {
        let root = format!("{name}_root");
        self.cvs(&["tag", &root])?;
        self.cvs(&["tag", "-r", &root, "-b", name])?;
        self.cvs(&["up", "-r", name])
    }

    /// Switch to an existing branch (`HEAD` for the trunk).
    pub fn switch(&self, branch: &str) -> Result<()> {
        self.cvs(&["up", "-A"])?;
        if branch == "HEAD" {
            Ok(())
        } else {
            self.cvs(&["up", "-r", branch])
        }
    }

    /// Merge a branch to the trunk, leaving a `merge_<branch>` tag so
    /// the merge point stays addressable.
    pub fn merge(&self, branch: &str) -> Result<()> {
        let mark = format!("merge_{branch}");
        self.cvs(&["tag", &mark])?;
        self.cvs(&["up", "-A"])?;
        self.cvs(&["up", "-j", branch])
    }

    /// Commit changes to the repository.
    pub fn commit(&self, message: &str) -> Result<()> {
        std::thread::sleep(self.settings.config.timing.commit_delay());
        self.cvs(&["commit", "-m", message])
    }

    /// Update the working copy to the given revision or tag, with
    /// keyword expansion normalized (`-kk`) so content comparison is
    /// not polluted by client-side substitution. The conversion-side
    /// name for the default branch maps to the client's `HEAD`.
    pub fn update(&self, reference: &str) -> Result<()> {
        let reference = if reference == "master" {
            "HEAD"
        } else {
            reference
        };
        self.cvs(&["up", "-kk", "-r", reference])
    }

    /// Remove the checkout directory and tear down the proxy wrapper,
    /// in that order. A no-op when retention was requested.
    pub fn cleanup(&mut self) -> Result<()> {
        if self.settings.retain {
            return Ok(());
        }
        if self.directory.exists() {
            std::fs::remove_dir_all(&self.directory)?;
        }
        if let Some(proxy) = self.proxy.take() {
            proxy.teardown()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::ScriptedRunner;

    fn quick_settings() -> Settings {
        let mut settings = Settings::default();
        settings.config.timing.commit_delay_ms = 0;
        settings
    }

    fn checkout_at(dir: &Path, runner: &ScriptedRunner) -> CvsCheckout<ScriptedRunner> {
        let co_dir = dir.join("fix.checkout");
        std::fs::create_dir_all(&co_dir).unwrap();
        CvsCheckout::new(
            dir.join("fix.testrepo"),
            "module",
            co_dir,
            None,
            quick_settings(),
            runner.clone(),
        )
    }

    #[test]
    fn write_and_append_build_file_content() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        let co = checkout_at(dir.path(), &runner);
        co.write("hello.txt", "first\n").unwrap();
        co.append("hello.txt", "second\n").unwrap();
        let content = std::fs::read_to_string(co.directory().join("hello.txt")).unwrap();
        assert_eq!(content, "first\nsecond\n");
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn add_and_remove_invoke_client() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        let co = checkout_at(dir.path(), &runner);
        co.add(&["a.txt", "b.txt"]).unwrap();
        co.remove(&["a.txt"]).unwrap();
        let commands = runner.commands();
        assert!(commands[0].ends_with("add a.txt b.txt"));
        assert!(commands[1].ends_with("remove -f a.txt"));
    }

    #[test]
    fn branch_anchors_on_root_tag() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        let co = checkout_at(dir.path(), &runner);
        co.branch("side").unwrap();
        let commands = runner.commands();
        assert_eq!(commands.len(), 3);
        assert!(commands[0].ends_with("tag side_root"));
        assert!(commands[1].ends_with("tag -r side_root -b side"));
        assert!(commands[2].ends_with("up -r side"));
    }

    #[test]
    fn switch_to_trunk_is_single_update() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        let co = checkout_at(dir.path(), &runner);
        co.switch("HEAD").unwrap();
        co.switch("side").unwrap();
        let commands = runner.commands();
        assert_eq!(commands.len(), 3);
        assert!(commands[0].ends_with("up -A"));
        assert!(commands[1].ends_with("up -A"));
        assert!(commands[2].ends_with("up -r side"));
    }

    #[test]
    fn merge_tags_the_merge_point() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        let co = checkout_at(dir.path(), &runner);
        co.merge("side").unwrap();
        let commands = runner.commands();
        assert!(commands[0].ends_with("tag merge_side"));
        assert!(commands[1].ends_with("up -A"));
        assert!(commands[2].ends_with("up -j side"));
    }

    #[test]
    fn commit_passes_message_as_one_argument() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        let co = checkout_at(dir.path(), &runner);
        co.commit("add the second file").unwrap();
        assert!(runner.commands()[0].ends_with("commit -m 'add the second file'"));
    }

    #[test]
    fn update_maps_default_branch_name() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        let co = checkout_at(dir.path(), &runner);
        co.update("master").unwrap();
        co.update("v1").unwrap();
        let commands = runner.commands();
        assert!(commands[0].ends_with("up -kk -r HEAD"));
        assert!(commands[1].ends_with("up -kk -r v1"));
    }

    #[test]
    fn cleanup_removes_directory_and_proxy() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        let archive = dir.path().join("bare.testrepo");
        std::fs::create_dir_all(&archive).unwrap();
        let proxy = ProxyMount::create(&archive, "module").unwrap();
        let wrapper = proxy.root().to_path_buf();
        let co_dir = dir.path().join("bare.checkout");
        std::fs::create_dir_all(&co_dir).unwrap();

        let mut co = CvsCheckout::new(
            wrapper.clone(),
            "module",
            co_dir.clone(),
            Some(proxy),
            quick_settings(),
            runner,
        );
        assert!(co.is_proxied());
        co.cleanup().unwrap();
        assert!(!co_dir.exists());
        assert!(!wrapper.exists());
        assert!(archive.exists());
    }

    #[test]
    fn retained_cleanup_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        let co_dir = dir.path().join("fix.checkout");
        std::fs::create_dir_all(&co_dir).unwrap();
        let mut settings = quick_settings();
        settings.retain = true;
        let mut co = CvsCheckout::new(
            dir.path().join("fix.testrepo"),
            "module",
            co_dir.clone(),
            None,
            settings,
            runner,
        );
        co.cleanup().unwrap();
        assert!(co_dir.exists());
    }
}
