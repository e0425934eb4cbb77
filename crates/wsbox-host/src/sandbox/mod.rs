//! Sandbox root and path containment.
//!
//! Every client-supplied path goes through [`SandboxRoot::resolve`] before it
//! touches the file system; uploads additionally create their parent chain
//! through [`secure_create_dir`].

use std::path::{Component, Path, PathBuf};

use crate::error::ContainmentError;

mod mkdir;
mod paths;

pub use mkdir::{ILLEGAL_NAME_CHARS, MAX_DIR_DEPTH, MAX_DIR_NAME_LEN, plan_create_dir, secure_create_dir};
pub use paths::{canonical_logical, resolve};

/// How a candidate path is checked against the sandbox root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContainmentCheck {
    /// The candidate's string form must start with the root's string form.
    ///
    /// This admits siblings sharing the root as a name prefix: with a root of
    /// `/srv/files`, `/srv/files2/x` passes.
    #[default]
    LiteralPrefix,
    /// The candidate must have every component of the root as its leading
    /// components.
    PathComponents,
}

impl ContainmentCheck {
    pub fn contains(self, root: &Path, candidate: &Path) -> bool {
        match self {
            ContainmentCheck::LiteralPrefix => candidate
                .as_os_str()
                .as_encoded_bytes()
                .starts_with(root.as_os_str().as_encoded_bytes()),
            ContainmentCheck::PathComponents => candidate.starts_with(root),
        }
    }
}

/// The single directory outside of which no operation may read or write.
///
/// Fixed at start-up; the path is absolute and lexically normal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxRoot {
    path: PathBuf,
    check: ContainmentCheck,
}

impl SandboxRoot {
    /// Build a root from any directory path. Relative paths are made absolute
    /// against the current directory; symlinks are not followed.
    pub fn new(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let absolute = std::path::absolute(dir.as_ref())?;
        Ok(Self {
            path: normalize_absolute(&absolute),
            check: ContainmentCheck::default(),
        })
    }

    pub fn with_check(mut self, check: ContainmentCheck) -> Self {
        self.check = check;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn check(&self) -> ContainmentCheck {
        self.check
    }

    pub fn contains(&self, candidate: &Path) -> bool {
        self.check.contains(&self.path, candidate)
    }

    pub fn resolve(&self, logical: &str) -> Result<PathBuf, ContainmentError> {
        resolve(logical, self)
    }
}

fn normalize_absolute(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(value) => out.push(value),
        }
    }
    out
}
