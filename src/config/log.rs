//! `[log]` section configuration.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[log]` section in usingdata.toml.
///
/// # Example
/// ```toml
/// [log]
/// verbose = true   # Report discovery, redirects and skipped fetches
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct LogSection {
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::super::WikiConfig;

    #[test]
    fn test_log_section() {
        let config: WikiConfig = toml::from_str("[log]\nverbose = true").unwrap();
        assert!(config.log.verbose);

        let config: WikiConfig = toml::from_str("").unwrap();
        assert!(!config.log.verbose);
    }
}
