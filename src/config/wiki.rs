//! `[wiki]` section configuration.
//!
//! Where the pages live and how they are named on disk.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[wiki]` section in usingdata.toml.
///
/// # Example
/// ```toml
/// [wiki]
/// pages = "content"      # One file per page, namespaces as sub-directories
/// extension = "txt"
/// main_page = "Home"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct WikiSection {
    /// Page directory (relative to project root).
    #[serde(default = "defaults::wiki::pages")]
    #[educe(Default = defaults::wiki::pages())]
    pub pages: PathBuf,

    /// File extension of page files, without the dot.
    #[serde(default = "defaults::wiki::extension")]
    #[educe(Default = defaults::wiki::extension())]
    pub extension: String,

    /// Page rendered when no page is named on the command line.
    #[serde(default = "defaults::wiki::main_page")]
    #[educe(Default = defaults::wiki::main_page())]
    pub main_page: String,
}

#[cfg(test)]
mod tests {
    use super::super::WikiConfig;
    use std::path::PathBuf;

    #[test]
    fn test_wiki_section() {
        let config = r#"
            [wiki]
            pages = "content"
            extension = "txt"
            main_page = "Home"
        "#;
        let config: WikiConfig = toml::from_str(config).unwrap();

        assert_eq!(config.wiki.pages, PathBuf::from("content"));
        assert_eq!(config.wiki.extension, "txt");
        assert_eq!(config.wiki.main_page, "Home");
    }

    #[test]
    fn test_wiki_section_defaults() {
        let config: WikiConfig = toml::from_str("").unwrap();

        assert_eq!(config.wiki.pages, PathBuf::from("pages"));
        assert_eq!(config.wiki.extension, "wiki");
        assert_eq!(config.wiki.main_page, "Main Page");
    }

    #[test]
    fn test_unknown_field_rejection() {
        let config = r#"
            [wiki]
            unknown_field = "should_fail"
        "#;
        let result: Result<WikiConfig, _> = toml::from_str(config);
        assert!(result.is_err());
    }
}
