//! `[parser]` section configuration.
//!
//! Expansion limits and transclusion rules.

use super::defaults;
use super::error::ConfigError;
use crate::wiki::{Namespace, ParserOptions};
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[parser]` section in usingdata.toml.
///
/// # Example
/// ```toml
/// [parser]
/// max_depth = 20
/// max_node_count = 500000
/// nonincludable = ["User", "Help"]
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ParserSection {
    /// Maximum template nesting depth.
    #[serde(default = "defaults::parser::max_depth")]
    #[educe(Default = defaults::parser::max_depth())]
    pub max_depth: usize,

    /// Maximum expansion nesting, data bindings included.
    #[serde(default = "defaults::parser::max_expand_depth")]
    #[educe(Default = defaults::parser::max_expand_depth())]
    pub max_expand_depth: usize,

    /// Maximum number of nodes expanded while rendering one page.
    #[serde(default = "defaults::parser::max_node_count")]
    #[educe(Default = defaults::parser::max_node_count())]
    pub max_node_count: usize,

    /// Namespace names whose pages may not be transcluded.
    #[serde(default = "defaults::parser::nonincludable")]
    #[educe(Default = defaults::parser::nonincludable())]
    pub nonincludable: Vec<String>,

    /// Render pages as section previews: a page's own data is read from the
    /// store instead of from the text being rendered.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub section_preview: bool,
}

impl ParserSection {
    /// Resolve namespace names into parser options.
    pub fn options(&self) -> Result<ParserOptions, ConfigError> {
        let nonincludable = self
            .nonincludable
            .iter()
            .map(|name| {
                Namespace::from_name(name)
                    .ok_or_else(|| ConfigError::UnknownNamespace(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ParserOptions {
            max_depth: self.max_depth,
            max_expand_depth: self.max_expand_depth,
            max_node_count: self.max_node_count,
            nonincludable,
            section_preview: self.section_preview,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("max_depth", self.max_depth),
            ("max_expand_depth", self.max_expand_depth),
            ("max_node_count", self.max_node_count),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroLimit(field));
            }
        }
        self.options().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::super::{ConfigError, WikiConfig};
    use crate::wiki::Namespace;

    #[test]
    fn test_parser_section() {
        let config = r#"
            [parser]
            max_depth = 20
            max_node_count = 500
            nonincludable = ["user", "Help"]
            section_preview = true
        "#;
        let config: WikiConfig = toml::from_str(config).unwrap();
        let options = config.parser.options().unwrap();

        assert_eq!(options.max_depth, 20);
        assert_eq!(options.max_expand_depth, 100);
        assert_eq!(options.max_node_count, 500);
        assert_eq!(options.nonincludable, vec![Namespace::User, Namespace::Help]);
        assert!(options.section_preview);
    }

    #[test]
    fn test_parser_section_defaults() {
        let config: WikiConfig = toml::from_str("").unwrap();
        let options = config.parser.options().unwrap();

        assert_eq!(options, crate::wiki::ParserOptions::default());
        assert!(config.parser.validate().is_ok());
    }

    #[test]
    fn test_zero_limit_rejected() {
        let config = r#"
            [parser]
            max_node_count = 0
        "#;
        let config: WikiConfig = toml::from_str(config).unwrap();
        let err = config.parser.validate().unwrap_err();
        assert!(matches!(err, ConfigError::ZeroLimit("max_node_count")));
    }

    #[test]
    fn test_unknown_namespace_rejected() {
        let config = r#"
            [parser]
            nonincludable = ["Portal"]
        "#;
        let config: WikiConfig = toml::from_str(config).unwrap();
        let err = config.parser.validate().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownNamespace(ref name) if name == "Portal"));
    }
}
