//! Preprocessor error types.
//!
//! Missing pages, fields and malformed titles are not errors; they degrade
//! to defaults or literal text. Only I/O failures and the node-count guard
//! abort an expansion.

use std::path::PathBuf;
use thiserror::Error;

/// Page store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error when reading page file `{0}`")]
    Io(PathBuf, #[source] std::io::Error),
}

/// Expansion errors.
#[derive(Debug, Error)]
pub enum ExpandError {
    #[error("expansion exceeded the node-count limit of {0}")]
    NodeCountExceeded(usize),

    #[error("failed to fetch `{title}`")]
    Fetch {
        title: String,
        #[source]
        source: StoreError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_expand_error_display() {
        let err = ExpandError::NodeCountExceeded(100);
        assert!(err.to_string().contains("100"));

        let err = ExpandError::Fetch {
            title: "Template:Box".to_owned(),
            source: StoreError::Io(
                PathBuf::from("pages/Template/Box.wiki"),
                Error::new(ErrorKind::PermissionDenied, "denied"),
            ),
        };
        assert!(err.to_string().contains("Template:Box"));
        let source = err.source().map(ToString::to_string).unwrap_or_default();
        assert!(source.contains("Box.wiki"));
    }
}
