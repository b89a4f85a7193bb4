//! Proxy wrapper for repositories missing root metadata.
//!
//! The CVS client refuses to operate on a repository root that has no
//! `CVSROOT` administrative directory, a layout that real-world
//! archives (a bare module of `,v` files) often have. [`ProxyMount`]
//! fabricates a wrapper directory containing a symbolic link back to
//! the real repository plus a synthetic `CVSROOT`, so the client sees
//! the structure it expects. Teardown removes the pieces in reverse
//! creation order: metadata directory, then link, then wrapper.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

/// Suffix for the fabricated wrapper directory.
const PROXY_SUFFIX: &str = ".proxy";

/// A fabricated repository wrapper. Construction creates the wrapper
/// on disk; [`ProxyMount::teardown`] consumes the mount and removes it.
#[derive(Debug)]
pub struct ProxyMount {
    wrapper: PathBuf,
    link: PathBuf,
    cvsroot: PathBuf,
}

impl ProxyMount {
    /// Wrap `repository` (a directory of version-controlled files with
    /// no `CVSROOT`) so the native client can check it out.
    ///
    /// The wrapper lands next to the repository as `<repository>.proxy`
    /// and contains `<module>` (a symlink to the repository) and an
    /// empty `CVSROOT`.
    pub fn create(repository: &Path, module: &str) -> Result<Self> {
        let mut wrapper = repository.as_os_str().to_owned();
        wrapper.push(PROXY_SUFFIX);
        let wrapper = PathBuf::from(wrapper);

        if wrapper.exists() {
            std::fs::remove_dir_all(&wrapper)?;
        }
        std::fs::create_dir(&wrapper)?;

        let link = wrapper.join(module);
        std::os::unix::fs::symlink(repository, &link)?;

        let cvsroot = wrapper.join("CVSROOT");
        std::fs::create_dir(&cvsroot)?;

        debug!(target: "liftcheck::proxy", "proxied {} via {}", repository.display(), wrapper.display());
        Ok(Self {
            wrapper,
            link,
            cvsroot,
        })
    }

    /// The wrapper directory the native client should be pointed at.
    pub fn root(&self) -> &Path {
        &self.wrapper
    }

    /// Remove the fabricated structure, reversing creation order.
    pub fn teardown(self) -> Result<()> {
        std::fs::remove_dir_all(&self.cvsroot)?;
        std::fs::remove_file(&self.link)?;
        std::fs::remove_dir_all(&self.wrapper)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_builds_expected_layout() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("archive");
        std::fs::create_dir(&repo).unwrap();
        std::fs::write(repo.join("file.txt,v"), "head 1.1;\n").unwrap();

        let mount = ProxyMount::create(&repo, "module").unwrap();
        let root = mount.root().to_path_buf();

        assert_eq!(root, dir.path().join("archive.proxy"));
        assert!(root.join("CVSROOT").is_dir());
        let link = root.join("module");
        assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
        // the link resolves into the real repository
        assert!(link.join("file.txt,v").is_file());

        mount.teardown().unwrap();
        assert!(!root.exists());
        // the real repository is untouched
        assert!(repo.join("file.txt,v").is_file());
    }

    #[test]
    fn create_replaces_stale_wrapper() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("archive");
        std::fs::create_dir(&repo).unwrap();
        let stale = dir.path().join("archive.proxy");
        std::fs::create_dir(&stale).unwrap();
        std::fs::write(stale.join("leftover"), "x").unwrap();

        let mount = ProxyMount::create(&repo, "module").unwrap();
        assert!(!mount.root().join("leftover").exists());
        mount.teardown().unwrap();
    }
}
