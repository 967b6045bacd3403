//! Resolution, inference and registry generation for aqua.
//!
//! [`resolver`] turns a registry entry into the effective package for a
//! version and platform. [`asset`] infers templates from release asset
//! names and [`generate`] builds whole registry entries from a project's
//! release history. [`sources`] wraps the GitHub and crates.io APIs those
//! steps depend on.

pub mod asset;
pub mod generate;
pub mod lint;
pub mod paths;
pub mod registry_cache;
pub mod resolver;
pub mod sources;
pub mod versions;

pub use paths::*;

/// User Agent string for outgoing requests
pub const USER_AGENT: &str = concat!("aqua/", env!("CARGO_PKG_VERSION"));
