//! Canonical path resolution and alias detection
//!
//! Access control upstream compares path strings, so a request must not be
//! able to reach a file through a spelling the rules never saw. For every
//! resolved path one alias representative is computed by four ordered
//! checks; the first check that fires wins:
//!
//! 1. **Encoding**: the literal URI's path differs (ignoring percent-encoding)
//!    from the path of the URI the resolved path would produce. The alias is
//!    the real path of the literal input, or of the resolved path when the
//!    literal has none (a file addressed with a trailing `/`).
//! 2. **Normalization**: the absolute path differs from its lexically
//!    normalized form (`.`/`..` segments). The alias is the normalized path.
//! 3. **Symbolic link**: the path itself is a symlink. The alias is the link
//!    target resolved against the link's parent (one level).
//! 4. **Real path**: the path exists and its real on-disk form differs
//!    segment-wise from the absolute path (case folding, linked parents).
//!
//! A probe that fails (I/O error) falls through to the next check; it never
//! aborts resolution.

mod platform;

pub use platform::{normalize_lexically, same_segments, HostPlatform, PathPlatform};

use std::env;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::{ResourceError, Result};
use crate::uri;

/// A canonical path and its alias, computed once at resolution time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    path: PathBuf,
    alias: Option<PathBuf>,
}

impl ResolvedPath {
    /// The absolute, OS-normalized path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A textually different path reaching the same object, if any
    pub fn alias(&self) -> Option<&Path> {
        self.alias.as_deref()
    }

    pub fn is_alias(&self) -> bool {
        self.alias.is_some()
    }

    pub fn into_parts(self) -> (PathBuf, Option<PathBuf>) {
        (self.path, self.alias)
    }
}

/// Resolves `file:` URIs and host paths to [`ResolvedPath`]s
#[derive(Debug, Clone)]
pub struct PathResolver {
    platform: Arc<dyn PathPlatform>,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl PathResolver {
    /// A resolver probing the host filesystem
    pub fn new() -> Self {
        Self::with_platform(Arc::new(HostPlatform))
    }

    pub fn with_platform(platform: Arc<dyn PathPlatform>) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> &dyn PathPlatform {
        self.platform.as_ref()
    }

    /// Resolve an absolute `file:` URI
    ///
    /// Dot segments in the literal URI are preserved so that the
    /// normalization check can see them.
    pub fn resolve_uri(&self, input: &str) -> Result<ResolvedPath> {
        let parsed = uri::parse_absolute(input)?;
        if !parsed.scheme().eq_ignore_ascii_case("file") {
            return Err(ResourceError::InvalidArgument(format!(
                "not a file uri: {input}"
            )));
        }
        let raw = uri::raw_file_path(input).ok_or_else(|| {
            ResourceError::InvalidArgument(format!("unable to build path from: {input}"))
        })?;

        let path = os_normalize(&raw);
        let alias = self.detect(true, &raw, &path);
        Ok(ResolvedPath { path, alias })
    }

    /// Resolve a host path; relative paths are anchored at the working directory
    ///
    /// A normalization alias of a relative path stays relative.
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> Result<ResolvedPath> {
        let raw = path.as_ref();
        let absolute = if raw.is_absolute() {
            os_normalize(raw)
        } else {
            os_normalize(&env::current_dir()?.join(raw))
        };

        let alias = self.detect(false, raw, &absolute);
        Ok(ResolvedPath {
            path: absolute,
            alias,
        })
    }

    fn detect(&self, from_uri: bool, raw: &Path, absolute: &Path) -> Option<PathBuf> {
        let platform = self.platform();

        if from_uri && raw.as_os_str().as_encoded_bytes() != self.own_uri_path(absolute) {
            // `secret.txt/` has no real path of its own but still reaches the file
            match platform
                .real_path(raw)
                .or_else(|_| platform.real_path(absolute))
            {
                Ok(real) => return Some(real),
                Err(e) => tracing::trace!(
                    path = %raw.display(),
                    error = %e,
                    "real path of literal uri unavailable"
                ),
            }
            if raw.as_os_str().as_encoded_bytes().ends_with(b"/") && !platform.is_dir(absolute) {
                return Some(absolute.to_path_buf());
            }
        }

        // A normalization difference is an alias on its own, symlinks are not probed
        let normal = platform.normalize(absolute);
        if !platform.same_name(absolute, &normal) {
            return Some(platform.normalize(raw));
        }

        match platform.is_symlink(absolute) {
            Ok(true) => match platform.read_link(absolute) {
                Ok(target) => {
                    return Some(match absolute.parent() {
                        Some(parent) => parent.join(target),
                        None => target,
                    })
                }
                Err(e) => tracing::trace!(
                    path = %absolute.display(),
                    error = %e,
                    "unreadable symlink"
                ),
            },
            Ok(false) => {}
            Err(e) => tracing::trace!(
                path = %absolute.display(),
                error = %e,
                "symlink probe failed"
            ),
        }

        if platform.exists(absolute) {
            match platform.real_path(absolute) {
                Ok(real) if !platform.same_name(absolute, &real) => return Some(real),
                Ok(_) => {}
                Err(e) => tracing::trace!(
                    path = %absolute.display(),
                    error = %e,
                    "real path probe failed"
                ),
            }
        }

        None
    }

    /// Decoded path of the `file:` URI the resolved path would produce
    fn own_uri_path(&self, absolute: &Path) -> Vec<u8> {
        let mut own = absolute.as_os_str().as_encoded_bytes().to_vec();
        if !own.ends_with(b"/") && self.platform.is_dir(absolute) {
            own.push(b'/');
        }
        own
    }
}

/// Collapse repeated separators and drop a trailing one, keeping `.`/`..`
fn os_normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normalized.push(component.as_os_str()),
            _ => break,
        }
    }

    for segment in platform::segments(path) {
        if is_prefix_segment(segment) {
            continue;
        }
        normalized.push(segment_path(segment));
    }

    normalized
}

#[cfg(unix)]
fn segment_path(segment: &[u8]) -> PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    PathBuf::from(OsStr::from_bytes(segment))
}

#[cfg(not(unix))]
fn segment_path(segment: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(segment).into_owned())
}

#[cfg(windows)]
fn is_prefix_segment(segment: &[u8]) -> bool {
    segment.len() == 2 && segment[1] == b':'
}

#[cfg(not(windows))]
fn is_prefix_segment(_segment: &[u8]) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_os_normalize_keeps_dot_segments() {
        assert_eq!(os_normalize(Path::new("/a//b/")), PathBuf::from("/a/b"));
        assert_eq!(
            os_normalize(Path::new("/a/./b/../c")).as_os_str(),
            "/a/./b/../c"
        );
        assert_eq!(os_normalize(Path::new("/")), PathBuf::from("/"));
    }

    #[cfg(unix)]
    #[test]
    fn test_normalization_alias_wins_before_probing() {
        let resolver = PathResolver::new();
        let resolved = resolver
            .resolve_path("/nonexistent-root/www/../secret")
            .unwrap();

        assert_eq!(resolved.path(), Path::new("/nonexistent-root/www/../secret"));
        assert_eq!(resolved.alias(), Some(Path::new("/nonexistent-root/secret")));
    }

    #[test]
    fn test_relative_normalization_alias_stays_relative() {
        let resolver = PathResolver::new();
        let resolved = resolver.resolve_path("a/b/../c").unwrap();

        assert!(resolved.is_alias());
        assert_eq!(resolved.alias(), Some(Path::new("a/c")));
        assert!(resolved.path().is_absolute());
    }

    #[test]
    fn test_non_file_uri_rejected() {
        let resolver = PathResolver::new();
        let err = resolver.resolve_uri("jar:file:///srv/app.zip!/").unwrap_err();
        assert!(matches!(err, ResourceError::InvalidArgument(_)));

        let err = resolver.resolve_uri("srv/index.html").unwrap_err();
        assert!(matches!(err, ResourceError::InvalidArgument(_)));
    }
}
