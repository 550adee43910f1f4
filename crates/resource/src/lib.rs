//! Filesystem resources with alias detection
//!
//! Every client-supplied path that reaches the server is turned into a
//! canonical, absolute filesystem path before any access-control decision is
//! made. If the operating system could reach the same physical object through
//! a textually different path (symlinks, `.`/`..` segments, case folding,
//! URI normalization), the resource is flagged as an alias and carries one
//! representative alias path.
//!
//! # Architecture
//!
//! - [`Resource`]: the capability every server-facing resource exposes
//! - [`PathResolver`]: computes the canonical path and the alias, if any
//! - [`PathPlatform`]: OS capabilities the resolver probes (real path,
//!   symlinks, lexical normalization, segment comparison)
//! - [`PathResource`]: a `file:` resource built on top of the resolver

pub mod alias;
pub mod error;
pub mod path_resource;
pub mod resource;
pub mod uri;

pub use alias::{HostPlatform, PathPlatform, PathResolver, ResolvedPath};
pub use error::{ResourceError, Result};
pub use path_resource::PathResource;
pub use resource::{Resource, DIR_SUFFIX};
