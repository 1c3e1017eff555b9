//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#false() -> bool {
    false
}

// ============================================================================
// [wiki] Section Defaults
// ============================================================================

pub mod wiki {
    use std::path::PathBuf;

    pub fn pages() -> PathBuf {
        "pages".into()
    }

    pub fn extension() -> String {
        "wiki".into()
    }

    pub fn main_page() -> String {
        "Main Page".into()
    }
}

// ============================================================================
// [parser] Section Defaults
// ============================================================================

pub mod parser {
    pub fn max_depth() -> usize {
        40
    }

    pub fn max_expand_depth() -> usize {
        100
    }

    pub fn max_node_count() -> usize {
        1_000_000
    }

    pub fn nonincludable() -> Vec<String> {
        Vec::new()
    }
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn output() -> PathBuf {
        "public".into()
    }
}
