//! Errors raised while loading `usingdata.toml`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("malformed usingdata.toml")]
    Toml(#[from] toml::de::Error),

    /// A namespace name in `[parser.nonincludable]` that no namespace uses.
    #[error("[parser.nonincludable] unknown namespace `{0}`")]
    UnknownNamespace(String),

    /// An expansion limit set to zero, which would reject every page.
    #[error("[parser.{0}] must be greater than 0")]
    ZeroLimit(&'static str),

    #[error("invalid config: {0}")]
    Validation(String),
}
