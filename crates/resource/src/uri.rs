//! URI helpers shared by resources and mounts
//!
//! The `url` crate normalizes dot segments while parsing, which would hide
//! exactly the traversal artifacts alias detection has to see. Paths are
//! therefore extracted from the literal input string here, and `Url` is only
//! used where the parsed form is what we want (keys, containers).

use std::path::PathBuf;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use url::Url;

use crate::error::{ResourceError, Result};

/// Separator between an archive URI and the entry path inside it
pub const CONTAINER_SEPARATOR: &str = "!/";

/// Schemes that address the host filesystem directly and are never mounted
pub const DIRECT_SCHEMES: &[&str] = &["file", "jrt"];

const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Parse an absolute URI, rejecting relative references
pub fn parse_absolute(input: &str) -> Result<Url> {
    match Url::parse(input) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => Err(ResourceError::InvalidArgument(
            format!("not an absolute uri: {input}"),
        )),
        Err(e) => Err(ResourceError::InvalidArgument(format!(
            "malformed uri {input}: {e}"
        ))),
    }
}

/// Whether the scheme addresses the host filesystem directly
pub fn is_direct_scheme(scheme: &str) -> bool {
    DIRECT_SCHEMES
        .iter()
        .any(|direct| direct.eq_ignore_ascii_case(scheme))
}

/// The container URI wrapped by an archive URI
///
/// `jar:file:///srv/app.zip!/static/a.css` unwraps to `file:///srv/app.zip`.
/// Returns `None` when the wrapped part is not itself an absolute URI.
pub fn unwrap_container(uri: &Url) -> Option<Url> {
    let inner = uri.as_str().strip_prefix(uri.scheme())?.strip_prefix(':')?;
    let container = match inner.find(CONTAINER_SEPARATOR) {
        Some(sep) => &inner[..sep],
        None => inner,
    };
    Url::parse(container).ok()
}

/// The on-disk file backing an archive URI, if the container is a `file:` URI
pub fn backing_file(uri: &Url) -> Option<PathBuf> {
    let container = unwrap_container(uri)?;
    if container.scheme() != "file" {
        return None;
    }
    container.to_file_path().ok()
}

/// The decoded entry path inside an archive URI, without a leading slash
pub fn container_entry(uri: &Url) -> String {
    let raw = uri.as_str();
    let Some(sep) = raw.find(CONTAINER_SEPARATOR) else {
        return String::new();
    };
    let entry = &raw[sep + CONTAINER_SEPARATOR.len()..];
    let entry = match entry.find(|c| c == '?' || c == '#') {
        Some(end) => &entry[..end],
        None => entry,
    };
    percent_decode_str(entry).decode_utf8_lossy().into_owned()
}

/// Filesystem path of a literal `file:` URI, without any dot-segment folding
///
/// Only an empty or `localhost` authority is accepted.
pub fn raw_file_path(input: &str) -> Option<PathBuf> {
    let colon = input.find(':')?;
    if !input[..colon].eq_ignore_ascii_case("file") {
        return None;
    }

    let mut rest = &input[colon + 1..];
    if let Some(end) = rest.find(|c| c == '?' || c == '#') {
        rest = &rest[..end];
    }
    if let Some(authority) = rest.strip_prefix("//") {
        let slash = authority.find('/').unwrap_or(authority.len());
        let host = &authority[..slash];
        if !host.is_empty() && !host.eq_ignore_ascii_case("localhost") {
            return None;
        }
        rest = &authority[slash..];
    }
    if !rest.starts_with('/') {
        return None;
    }

    Some(bytes_to_path(percent_decode_str(rest).collect()))
}

/// Percent-encode a single path segment for inclusion in a URI
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

#[cfg(unix)]
fn bytes_to_path(bytes: Vec<u8>) -> PathBuf {
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;

    PathBuf::from(OsString::from_vec(bytes))
}

#[cfg(not(unix))]
fn bytes_to_path(bytes: Vec<u8>) -> PathBuf {
    let path = String::from_utf8_lossy(&bytes);
    // `/C:/dir` addresses drive C:
    match path.as_bytes() {
        [b'/', drive, b':', ..] if drive.is_ascii_alphabetic() => PathBuf::from(&path[1..]),
        _ => PathBuf::from(path.as_ref()),
    }
}
