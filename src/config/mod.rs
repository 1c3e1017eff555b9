//! Project configuration management for `usingdata.toml`.
//!
//! # Sections
//!
//! | Section     | Purpose                                          |
//! |-------------|--------------------------------------------------|
//! | `[wiki]`    | Page directory, file extension, main page        |
//! | `[parser]`  | Expansion limits, non-includable namespaces      |
//! | `[build]`   | Output directory for rendered pages              |
//! | `[log]`     | Verbosity                                        |
//!
//! # Example
//!
//! ```toml
//! [wiki]
//! pages = "pages"
//! extension = "wiki"
//!
//! [parser]
//! max_depth = 40
//! nonincludable = ["User"]
//!
//! [build]
//! output = "public"
//! clean = true
//! ```
//!
//! Every section is optional. A missing config file yields the defaults.

mod build;
pub mod defaults;
mod error;
mod log;
mod parser;
mod wiki;

pub use build::BuildSection;
pub use error::ConfigError;
pub use log::LogSection;
pub use parser::ParserSection;
pub use wiki::WikiSection;

use crate::cli::Cli;
use crate::logger;
use crate::wiki::ParserOptions;
use anyhow::{Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing usingdata.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct WikiConfig {
    /// Project root; every relative path is resolved against it
    #[serde(skip)]
    #[educe(Default = PathBuf::from("./"))]
    pub root: PathBuf,

    /// Path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub wiki: WikiSection,

    #[serde(default)]
    pub parser: ParserSection,

    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub log: LogSection,
}

impl WikiConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: WikiConfig = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        let mut config = Self::from_str(&content)?;
        config.config_path = path.to_path_buf();
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load(path: &Path) -> Result<Self> {
        if path.is_file() {
            Self::from_path(path)
        } else {
            Ok(Self {
                config_path: path.to_path_buf(),
                ..Self::default()
            })
        }
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli) {
        if let Some(root) = &cli.root {
            self.root = root.clone();
        }
        if cli.verbose {
            self.log.verbose = true;
        }
        if let Some(clean) = cli.clean_flag() {
            self.build.clean |= clean;
        }
        logger::set_verbose(self.log.verbose);
    }

    /// Validate configuration values that serde cannot check.
    pub fn validate(&self) -> Result<()> {
        self.parser.validate()?;
        if self.wiki.extension.is_empty() || self.wiki.extension.starts_with('.') {
            bail!(ConfigError::Validation(
                "[wiki.extension] must be non-empty and given without the leading dot".into()
            ));
        }
        Ok(())
    }

    pub fn parser_options(&self) -> Result<ParserOptions> {
        Ok(self.parser.options()?)
    }

    /// Page directory resolved against the root.
    pub fn pages_dir(&self) -> PathBuf {
        self.root.join(&self.wiki.pages)
    }

    /// Output directory resolved against the root.
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.build.output)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiki::Namespace;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_from_str() {
        let config = WikiConfig::from_str(
            r#"
            [wiki]
            main_page = "Home"
            [parser]
            nonincludable = ["User"]
        "#,
        )
        .unwrap();

        assert_eq!(config.wiki.main_page, "Home");
        let options = config.parser_options().unwrap();
        assert_eq!(options.nonincludable, vec![Namespace::User]);
    }

    #[test]
    fn test_from_str_invalid_toml() {
        let result = WikiConfig::from_str("[wiki\nmain_page = 1");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_section_rejected() {
        let result = WikiConfig::from_str("[serve]\nport = 1");
        assert!(result.is_err());
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[build]\noutput = \"site\"").unwrap();

        let config = WikiConfig::from_path(file.path()).unwrap();
        assert_eq!(config.build.output, PathBuf::from("site"));
        assert_eq!(config.config_path, file.path());
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = WikiConfig::from_path(Path::new("/nonexistent/usingdata.toml")).unwrap_err();
        assert!(err.to_string().contains("cannot read config"));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usingdata.toml");

        let config = WikiConfig::load(&path).unwrap();
        assert_eq!(config.wiki.main_page, "Main Page");
        assert_eq!(config.config_path, path);
    }

    #[test]
    fn test_paths_follow_root() {
        let mut config = WikiConfig::default();
        assert_eq!(config.pages_dir(), Path::new("./pages"));

        config.root = PathBuf::from("/srv/wiki");
        assert_eq!(config.pages_dir(), Path::new("/srv/wiki/pages"));
        assert_eq!(config.output_dir(), Path::new("/srv/wiki/public"));
    }

    #[test]
    fn test_update_with_cli() {
        let cli = Cli::parse_from(["usingdata", "--root", "/srv/wiki", "build", "--clean"]);
        let mut config = WikiConfig::default();
        config.update_with_cli(&cli);

        assert_eq!(config.root, PathBuf::from("/srv/wiki"));
        assert!(config.build.clean);
        assert!(!config.log.verbose);
    }

    #[test]
    fn test_validate() {
        assert!(WikiConfig::default().validate().is_ok());

        let config = WikiConfig::from_str("[wiki]\nextension = \".wiki\"").unwrap();
        assert!(config.validate().is_err());

        let config = WikiConfig::from_str("[parser]\nmax_depth = 0").unwrap();
        assert!(config.validate().is_err());
    }
}
