//! Fragment normalization and field keys.
//!
//! Fragments are case-insensitive sub-keys of a page's data. A fragment is
//! normalized by lower-casing it, writing every `#` as `"# "` and appending
//! the `##` terminator:
//!
//! ```text
//! ""      → "##"
//! "Stats" → "stats##"
//! "a#b"   → "a# b##"
//! "a##b"  → "a# # b##"
//! ```
//!
//! Inside the body every `#` is followed by a space, so the only bare `##`
//! is the terminator and distinct fragments never share a normal form.

use std::fmt;

use serde::Serialize;

const TERMINATOR: &str = "##";

/// A fragment in normal form.
///
/// Only produced by [`Normalize`]; normalizing it again is the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NormalizedFragment(String);

impl Default for NormalizedFragment {
    fn default() -> Self {
        Self(TERMINATOR.to_owned())
    }
}

impl NormalizedFragment {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the normal form of the empty fragment.
    pub fn is_empty_fragment(&self) -> bool {
        self.0 == TERMINATOR
    }

    /// The lower-cased fragment this normal form was built from.
    pub fn denormalize(&self) -> String {
        let body = self.0.strip_suffix(TERMINATOR).unwrap_or(&self.0);
        body.replace("# ", "#")
    }

    /// Key of `field` within this fragment.
    pub fn key(&self, field: &str) -> FieldKey {
        FieldKey {
            fragment: self.clone(),
            field: field.to_owned(),
        }
    }
}

impl fmt::Display for NormalizedFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Conversion into a [`NormalizedFragment`].
pub trait Normalize {
    fn normalize(&self) -> NormalizedFragment;
}

impl Normalize for str {
    fn normalize(&self) -> NormalizedFragment {
        let mut out = self.to_lowercase().replace('#', "# ");
        out.push_str(TERMINATOR);
        NormalizedFragment(out)
    }
}

impl Normalize for String {
    fn normalize(&self) -> NormalizedFragment {
        self.as_str().normalize()
    }
}

impl Normalize for NormalizedFragment {
    fn normalize(&self) -> NormalizedFragment {
        self.clone()
    }
}

pub fn normalize_fragment<F: Normalize + ?Sized>(fragment: &F) -> NormalizedFragment {
    fragment.normalize()
}

// ============================================================================
// Field Keys
// ============================================================================

/// A field name scoped to a normalized fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldKey {
    fragment: NormalizedFragment,
    field: String,
}

impl FieldKey {
    pub fn fragment(&self) -> &NormalizedFragment {
        &self.fragment
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.fragment, self.field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_normal_forms() {
        assert_eq!(normalize_fragment("").as_str(), "##");
        assert_eq!(normalize_fragment("Stats").as_str(), "stats##");
        assert_eq!(normalize_fragment("a#b").as_str(), "a# b##");
        assert!(normalize_fragment("").is_empty_fragment());
        assert_eq!(NormalizedFragment::default(), normalize_fragment(""));
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(normalize_fragment("A"), normalize_fragment("a"));
        assert_eq!(normalize_fragment("ÉPÉE"), normalize_fragment("épée"));
    }

    #[test]
    fn test_idempotent() {
        for raw in ["", "a", "A#b", "##", "x# y##"] {
            let once = normalize_fragment(raw);
            assert_eq!(normalize_fragment(&once), once);
        }
    }

    #[test]
    fn test_lookalike_is_still_escaped() {
        // A raw string that looks normalized is a different fragment.
        assert_ne!(normalize_fragment("a##"), normalize_fragment("a"));
        assert_ne!(normalize_fragment("a# "), normalize_fragment("a"));
    }

    #[test]
    fn test_no_collisions() {
        let inputs = [
            "", "#", "##", "###", "# ", " #", "a", "a#", "#a", "a#b", "a##b", "a# b", "a #b",
            "a# #b", "a ##", "a##", "a# ", "# #", "#  ", "b", "a b",
        ];
        let normal: HashSet<_> = inputs.iter().map(|raw| normalize_fragment(*raw)).collect();
        assert_eq!(normal.len(), inputs.len());
    }

    #[test]
    fn test_denormalize() {
        for raw in ["", "stats", "a#b", "a##", "# x"] {
            assert_eq!(normalize_fragment(raw).denormalize(), raw);
        }
    }

    #[test]
    fn test_field_keys() {
        let stats = normalize_fragment("Stats");
        assert_eq!(stats.key("x"), normalize_fragment("stats").key("x"));
        assert_ne!(stats.key("x"), stats.key("y"));
        assert_ne!(normalize_fragment("").key("x"), stats.key("x"));
        assert_eq!(stats.key("x").to_string(), "stats##x");
        assert_eq!(stats.key("x").field(), "x");
    }
}
