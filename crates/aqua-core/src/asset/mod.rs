//! Inferring registry settings from release asset names.
//!
//! [`parse_asset_name`] reads one name; [`parse_asset_infos`] folds the
//! results for a release into a [`PackageInfo`](aqua_schema::PackageInfo).
//! [`exclude`] and [`checksum_config_from_filename`] sort out the assets
//! that should not take part.

mod aggregate;
mod checksum;
mod exclude;
mod parse;

pub use aggregate::{parse_asset_infos, select_for_runtime};
pub use checksum::checksum_config_from_filename;
pub use exclude::exclude;
pub use parse::{AssetInfo, FORMAT_RAW, is_supported_format, parse_asset_name, remove_ext};
pub(crate) use parse::templatize_version;
