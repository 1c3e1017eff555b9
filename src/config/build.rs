//! `[build]` section configuration.
//!
//! Controls where `build` writes rendered pages.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[build]` section in usingdata.toml.
///
/// # Example
/// ```toml
/// [build]
/// output = "dist"
/// clean = true    # Remove the output directory before building
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Output directory (relative to project root).
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Clear the output directory completely before building.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub clean: bool,
}
