use std::path::{Component, Path};

use super::SandboxRoot;
use crate::error::SecurityError;

pub const MAX_DIR_DEPTH: usize = 5;
pub const MAX_DIR_NAME_LEN: usize = 50;
pub const ILLEGAL_NAME_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

/// Create `target` and any missing ancestors below `root`, one level at a time.
///
/// Succeeds immediately when `target` already exists. Every policy check runs
/// before the first directory is created. Directories made by earlier steps of
/// the walk are left in place if a later step fails.
pub async fn secure_create_dir(root: &SandboxRoot, target: &Path) -> Result<(), SecurityError> {
    if tokio::fs::metadata(target).await.is_ok() {
        return Ok(());
    }

    let segments = plan_create_dir(root, target)?;

    let mut current = root.path().to_path_buf();
    for segment in segments {
        current.push(segment);
        if !root.contains(&current) {
            return Err(SecurityError::Escape(current));
        }
        match tokio::fs::create_dir(&current).await {
            Ok(()) => tracing::debug!(path = %current.display(), "created directory"),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(source) => {
                return Err(SecurityError::Create {
                    path: current,
                    source,
                });
            }
        }
    }
    Ok(())
}

/// Policy half of [`secure_create_dir`]: the segments of `target` relative to
/// the root, once depth, character and length limits have been checked.
pub fn plan_create_dir(root: &SandboxRoot, target: &Path) -> Result<Vec<String>, SecurityError> {
    let relative = target
        .strip_prefix(root.path())
        .map_err(|_| SecurityError::InvalidPath(target.to_path_buf()))?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(name) => {
                let name = name
                    .to_str()
                    .ok_or_else(|| SecurityError::IllegalCharacters(name.to_string_lossy().into()))?;
                segments.push(name.to_string());
            }
            _ => return Err(SecurityError::InvalidPath(target.to_path_buf())),
        }
    }

    if segments.len() > MAX_DIR_DEPTH {
        return Err(SecurityError::TooDeep {
            depth: segments.len(),
            max: MAX_DIR_DEPTH,
        });
    }
    for name in &segments {
        if name.contains(ILLEGAL_NAME_CHARS) {
            return Err(SecurityError::IllegalCharacters(name.clone()));
        }
        if name.len() > MAX_DIR_NAME_LEN {
            return Err(SecurityError::NameTooLong {
                name: name.clone(),
                max: MAX_DIR_NAME_LEN,
            });
        }
    }
    Ok(segments)
}
