use std::path::PathBuf;

use super::SandboxRoot;
use crate::error::ContainmentError;

/// Map a client-supplied logical path to an absolute path under `root`.
///
/// The logical path is canonicalized before it is joined onto the root, so a
/// `..` can never be carried into the join. The containment check on the
/// joined path is an independent second gate.
pub fn resolve(logical: &str, root: &SandboxRoot) -> Result<PathBuf, ContainmentError> {
    let canonical = canonical_logical(logical);
    if canonical.split('/').any(|segment| segment == "..") {
        return Err(ContainmentError::ParentSegment(logical.to_string()));
    }

    let relative = canonical.trim_start_matches('/');
    let target = if relative.is_empty() {
        root.path().to_path_buf()
    } else {
        root.path().join(relative)
    };

    if !root.contains(&target) {
        return Err(ContainmentError::Escape(logical.to_string()));
    }
    Ok(target)
}

/// Lexical canonical form of a logical path, always rooted at `/`.
///
/// `.` segments and repeated separators are dropped and `..` pops the previous
/// segment. A `..` with nothing left to pop stays in the output, so
/// `/../../etc` canonicalizes to `/../../etc` rather than `/etc`.
pub fn canonical_logical(raw: &str) -> String {
    let rooted = format!("/{raw}");
    let mut segments: Vec<&str> = Vec::new();
    for segment in rooted.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::sandbox::ContainmentCheck;

    fn root() -> SandboxRoot {
        SandboxRoot::new("/srv/files").unwrap()
    }

    #[test]
    fn canonical_form_collapses_dots_and_separators() {
        assert_eq!(canonical_logical(""), "/");
        assert_eq!(canonical_logical("/"), "/");
        assert_eq!(canonical_logical("a//b/./c/"), "/a/b/c");
        assert_eq!(canonical_logical("/a/b/../c"), "/a/c");
        assert_eq!(canonical_logical("/../../etc"), "/../../etc");
        assert_eq!(canonical_logical("/a/../../etc"), "/../etc");
        assert_eq!(canonical_logical("name..with..dots"), "/name..with..dots");
    }

    #[test]
    fn resolves_under_root() {
        let root = root();
        assert_eq!(resolve("/", &root).unwrap(), Path::new("/srv/files"));
        assert_eq!(resolve("", &root).unwrap(), Path::new("/srv/files"));
        assert_eq!(
            resolve("/sub/deep/file.bin", &root).unwrap(),
            Path::new("/srv/files/sub/deep/file.bin")
        );
        assert_eq!(
            resolve("docs/./notes/../readme.md", &root).unwrap(),
            Path::new("/srv/files/docs/readme.md")
        );
    }

    #[test]
    fn rejects_parent_segments_surviving_canonicalization() {
        let root = root();
        for raw in ["/../../etc", "..", "../x", "/a/../../b", "a/b/../../../c", "/./.."] {
            let err = resolve(raw, &root).unwrap_err();
            assert_eq!(err, ContainmentError::ParentSegment(raw.to_string()), "{raw}");
        }
    }

    #[test]
    fn dots_inside_names_are_not_parent_segments() {
        let root = root();
        assert_eq!(
            resolve("/archive..old/x", &root).unwrap(),
            Path::new("/srv/files/archive..old/x")
        );
    }

    #[test]
    fn resolved_paths_keep_root_as_prefix_under_both_checks() {
        for check in [ContainmentCheck::LiteralPrefix, ContainmentCheck::PathComponents] {
            let root = root().with_check(check);
            for raw in ["a", "/a/b", "a/../b", "./c/./d", "//e//f//"] {
                let resolved = resolve(raw, &root).unwrap();
                assert!(resolved.starts_with("/srv/files"), "{raw} -> {resolved:?}");
                assert_ne!(resolved, Path::new("/srv/files"));
            }
        }
    }
}
