//! OS capabilities probed during alias detection
//!
//! Case sensitivity, symlink semantics and real-path lookup differ between
//! platforms, so the resolver never calls `std::fs` directly. Tests and
//! embedders can substitute their own [`PathPlatform`].

use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Filesystem capabilities used by [`PathResolver`](super::PathResolver)
pub trait PathPlatform: Send + Sync + Debug {
    /// The real, symlink-free, on-disk form of `path`
    fn real_path(&self, path: &Path) -> io::Result<PathBuf>;

    /// Whether `path` itself is a symbolic link (the link is not followed)
    fn is_symlink(&self, path: &Path) -> io::Result<bool>;

    /// The raw target of the symbolic link at `path`
    fn read_link(&self, path: &Path) -> io::Result<PathBuf>;

    /// Whether `path` exists, following symlinks
    fn exists(&self, path: &Path) -> bool;

    /// Whether `path` is a directory, following symlinks
    fn is_dir(&self, path: &Path) -> bool;

    /// Lexical normalization: drop `.` segments and fold `..` segments
    fn normalize(&self, path: &Path) -> PathBuf {
        normalize_lexically(path)
    }

    /// Case- and segment-sensitive comparison of two paths
    fn same_name(&self, a: &Path, b: &Path) -> bool {
        same_segments(a, b)
    }
}

/// The host operating system, via `std::fs`
#[derive(Debug, Default, Clone, Copy)]
pub struct HostPlatform;

impl PathPlatform for HostPlatform {
    fn real_path(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }

    fn is_symlink(&self, path: &Path) -> io::Result<bool> {
        Ok(fs::symlink_metadata(path)?.file_type().is_symlink())
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        fs::read_link(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

/// Fold `.` and `..` segments without touching the filesystem
///
/// `..` never climbs above the root of an absolute path; leading `..`
/// segments of a relative path are kept.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    let mut depth = 0usize;

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    normalized.pop();
                    depth -= 1;
                } else if !path.has_root() {
                    normalized.push("..");
                }
            }
            Component::Normal(name) => {
                normalized.push(name);
                depth += 1;
            }
        }
    }

    normalized
}

/// Compare two paths segment by segment, starting from the last segment
///
/// Unlike `Path::eq`, `.` segments are significant and the comparison is
/// byte-exact, so `Foo.txt` and `foo.txt` differ even where the OS would
/// treat them as the same file.
pub fn same_segments(a: &Path, b: &Path) -> bool {
    let a: Vec<&[u8]> = segments(a).collect();
    let b: Vec<&[u8]> = segments(b).collect();
    if a.len() != b.len() {
        return false;
    }

    a.iter().rev().zip(b.iter().rev()).all(|(x, y)| x == y)
}

/// Non-empty segments of a path, `.` and `..` included
pub(crate) fn segments(path: &Path) -> impl Iterator<Item = &[u8]> {
    path.as_os_str()
        .as_encoded_bytes()
        .split(|byte| is_separator(*byte))
        .filter(|segment| !segment.is_empty())
}

fn is_separator(byte: u8) -> bool {
    byte == b'/' || (cfg!(windows) && byte == b'\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(normalize_lexically(Path::new("a/b/../c")), Path::new("a/c"));
        assert_eq!(normalize_lexically(Path::new("./a/./b")), Path::new("a/b"));
        assert_eq!(normalize_lexically(Path::new("../a")), Path::new("../a"));
        assert_eq!(normalize_lexically(Path::new("a/../../b")), Path::new("../b"));
    }

    #[cfg(unix)]
    #[test]
    fn test_normalize_lexically_absolute() {
        assert_eq!(
            normalize_lexically(Path::new("/srv/www/../../etc")),
            Path::new("/etc")
        );
        assert_eq!(normalize_lexically(Path::new("/../etc")), Path::new("/etc"));
        assert_eq!(normalize_lexically(Path::new("/srv/./www/")), Path::new("/srv/www"));
    }

    #[test]
    fn test_same_segments() {
        assert!(same_segments(Path::new("a/b/c"), Path::new("a/b/c")));
        assert!(same_segments(Path::new("a//b/"), Path::new("a/b")));
        assert!(!same_segments(Path::new("a/b/c"), Path::new("a/c")));
        assert!(!same_segments(Path::new("a/Foo.txt"), Path::new("a/foo.txt")));
        assert!(!same_segments(Path::new("a/./b"), Path::new("a/b")));
    }

    #[test]
    fn test_segments_keep_dots() {
        let parts: Vec<&[u8]> = segments(Path::new("/a/./b/../c")).collect();
        assert_eq!(
            parts,
            vec![&b"a"[..], &b"."[..], &b"b"[..], &b".."[..], &b"c"[..]]
        );
    }
}
