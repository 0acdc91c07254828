//! Resolution of external object references to filesystem paths.
//!
//! Every filesystem open or remove triggered by a request goes through
//! [`resolve_reference`] first. The resolution is purely lexical: the object
//! need not exist, and symlinks are not followed.

use crate::models::object::UPLOADS_DIR;
use std::path::{Component, Path, PathBuf};

/// Outcome of resolving an object reference against the storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Absolute candidate path (lexically normalised).
    pub path: PathBuf,

    /// True when `path` lies strictly inside the storage root.
    pub is_safe: bool,
}

impl ResolvedPath {
    fn unsafe_at(path: PathBuf) -> Self {
        Self {
            path,
            is_safe: false,
        }
    }

    /// Return the path only if the guard accepted it.
    pub fn into_safe(self) -> Option<PathBuf> {
        self.is_safe.then_some(self.path)
    }
}

/// Resolve a media `reference` relative to the storage `root`.
///
/// Flat references (`<id><ext>`) live in `<root>/uploads`; references that
/// contain a `/` are taken relative to the root itself, so the `key` returned
/// by an upload (`uploads/<id><ext>`) resolves to the same file.
pub fn resolve_reference(root: &Path, reference: &str) -> ResolvedPath {
    if reference.contains('/') {
        resolve_under(root, root, reference)
    } else {
        resolve_under(root, &root.join(UPLOADS_DIR), reference)
    }
}

/// Resolve a reference that always names something inside `<root>/uploads`.
pub fn resolve_upload_reference(root: &Path, reference: &str) -> ResolvedPath {
    resolve_under(root, &root.join(UPLOADS_DIR), reference)
}

/// Join `reference` onto `base` and judge the result against `root`.
///
/// `root` must already be absolute. The verdict is unsafe when:
/// - the reference is empty, absolute, or contains a NUL byte
/// - the reference contains a `..` component anywhere
/// - the normalised candidate is the root itself or lies outside it
fn resolve_under(root: &Path, base: &Path, reference: &str) -> ResolvedPath {
    let joined = base.join(reference);

    if reference.is_empty() || reference.contains('\0') {
        return ResolvedPath::unsafe_at(joined);
    }

    let escapes = Path::new(reference).components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return ResolvedPath::unsafe_at(normalize(&joined).unwrap_or(joined));
    }

    let Some(candidate) = normalize(&joined) else {
        return ResolvedPath::unsafe_at(joined);
    };
    let is_safe = is_strictly_within(&candidate, root);

    ResolvedPath {
        path: candidate,
        is_safe,
    }
}

/// True when `path` is a descendant of `root` (and not `root` itself).
///
/// Both paths are compared lexically; the relative remainder must not start
/// with or contain a parent-directory segment.
pub fn is_strictly_within(path: &Path, root: &Path) -> bool {
    let (Some(path), Some(root)) = (normalize(path), normalize(root)) else {
        return false;
    };
    match path.strip_prefix(&root) {
        Ok(rel) => {
            rel.components().next().is_some()
                && rel
                    .components()
                    .all(|c| matches!(c, Component::Normal(_)))
        }
        Err(_) => false,
    }
}

/// Collapse `.` and `..` segments without touching the filesystem.
///
/// Returns `None` when `..` would climb above the filesystem root.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> PathBuf {
        PathBuf::from("/srv/storage")
    }

    #[test]
    fn flat_reference_lands_in_uploads() {
        let resolved = resolve_reference(&root(), "abc.png");
        assert!(resolved.is_safe);
        assert_eq!(resolved.path, PathBuf::from("/srv/storage/uploads/abc.png"));
    }

    #[test]
    fn nested_reference_is_relative_to_root() {
        let resolved = resolve_reference(&root(), "uploads/abc.thumb.jpg");
        assert!(resolved.is_safe);
        assert_eq!(
            resolved.path,
            PathBuf::from("/srv/storage/uploads/abc.thumb.jpg")
        );
    }

    #[test]
    fn current_dir_segments_are_collapsed() {
        let resolved = resolve_reference(&root(), "./uploads/./abc.png");
        assert!(resolved.is_safe);
        assert_eq!(resolved.path, PathBuf::from("/srv/storage/uploads/abc.png"));
    }

    #[test]
    fn parent_segments_are_always_rejected() {
        for reference in [
            "..",
            "../secret.txt",
            "../../etc/passwd",
            "uploads/../../etc/passwd",
            "uploads/../uploads/abc.png",
            "a/b/../../..",
            "..\0",
        ] {
            let resolved = resolve_reference(&root(), reference);
            assert!(!resolved.is_safe, "{reference:?} should be unsafe");
        }
    }

    #[test]
    fn absolute_and_degenerate_references_are_rejected() {
        for reference in ["/etc/passwd", "", "abc\0.png", "./"] {
            let resolved = resolve_reference(&root(), reference);
            assert!(!resolved.is_safe, "{reference:?} should be unsafe");
        }
    }

    #[test]
    fn root_itself_is_not_strictly_within() {
        assert!(!is_strictly_within(&root(), &root()));
        assert!(is_strictly_within(&root().join("uploads"), &root()));
        assert!(!is_strictly_within(Path::new("/srv/storage-other/x"), &root()));
        assert!(!is_strictly_within(Path::new("/srv/storage/../x"), &root()));
    }

    #[test]
    fn upload_references_never_leave_uploads() {
        let resolved = resolve_upload_reference(&root(), "uploads/abc.png");
        assert!(resolved.is_safe);
        assert_eq!(
            resolved.path,
            PathBuf::from("/srv/storage/uploads/uploads/abc.png")
        );
        assert!(!resolve_upload_reference(&root(), "../abc.png").is_safe);
        assert!(!resolve_upload_reference(&root(), "/abc.png").is_safe);
    }

    #[test]
    fn into_safe_drops_rejected_paths() {
        assert!(resolve_reference(&root(), "../x").into_safe().is_none());
        assert_eq!(
            resolve_reference(&root(), "x.png").into_safe(),
            Some(PathBuf::from("/srv/storage/uploads/x.png"))
        );
    }
}
