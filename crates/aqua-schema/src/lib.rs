//! Data model shared by the aqua crates.
//!
//! Everything here is pure: registry and `aqua.yaml` types, the runtime
//! descriptor, version parsing, the expression language used by
//! constraints and filters, and asset templates.
//!
//! ```
//! use aqua_schema::Runtime;
//!
//! let rt = Runtime::new("darwin", "arm64");
//! assert_eq!(rt.env(), "darwin/arm64");
//! ```

pub mod aqua_config;
pub mod expr;
pub mod registry;
pub mod runtime;
pub mod template;
pub mod version;

pub use aqua_config::{AquaConfig, ConfigError};
pub use registry::{PackageInfo, PackageType, RegistryConfig};
pub use runtime::Runtime;
pub use version::Version;
