//! Serializable views of the frame registry, used by `inspect`.

use serde::Serialize;

/// What a data frame knows about its page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameSummary {
    /// Canonical page the data was declared on.
    pub source: String,
    /// Known fragments, sorted, the empty fragment first.
    pub fragments: Vec<FragmentSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FragmentSummary {
    /// Fragment name, lower-cased.
    pub name: String,
    /// Fields declared but not yet resolved.
    pub pending: Vec<String>,
    /// Fields already resolved, with their expanded text.
    pub resolved: Vec<ResolvedField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedField {
    pub name: String,
    pub value: String,
}
