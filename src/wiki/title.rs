//! Page titles and namespaces.
//!
//! A [`Title`] is the canonical identity of a page: a namespace, the page
//! text with its first letter capitalised, and an optional `#fragment`.
//!
//! ```text
//! "template:infobox_item#Stats"
//!     │         │            │
//!     │         │            └── fragment  "Stats"
//!     │         └── text       "Infobox item"
//!     └── namespace  Template  → prefixed text "Template:Infobox item"
//! ```

use std::fmt;

/// Characters that can never appear in a page title.
const INVALID_TITLE_CHARS: &[char] = &['<', '>', '[', ']', '{', '}', '|'];

// ============================================================================
// Namespaces
// ============================================================================

/// The namespaces known to the preprocessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    Media,
    Special,
    Main,
    Talk,
    User,
    Project,
    File,
    MediaWiki,
    Template,
    Help,
    Category,
}

impl Namespace {
    pub const ALL: [Namespace; 11] = [
        Namespace::Media,
        Namespace::Special,
        Namespace::Main,
        Namespace::Talk,
        Namespace::User,
        Namespace::Project,
        Namespace::File,
        Namespace::MediaWiki,
        Namespace::Template,
        Namespace::Help,
        Namespace::Category,
    ];

    /// Numeric namespace id.
    pub const fn id(self) -> i32 {
        match self {
            Namespace::Media => -2,
            Namespace::Special => -1,
            Namespace::Main => 0,
            Namespace::Talk => 1,
            Namespace::User => 2,
            Namespace::Project => 4,
            Namespace::File => 6,
            Namespace::MediaWiki => 8,
            Namespace::Template => 10,
            Namespace::Help => 12,
            Namespace::Category => 14,
        }
    }

    /// Canonical prefix, empty for the main namespace.
    pub const fn name(self) -> &'static str {
        match self {
            Namespace::Media => "Media",
            Namespace::Special => "Special",
            Namespace::Main => "",
            Namespace::Talk => "Talk",
            Namespace::User => "User",
            Namespace::Project => "Project",
            Namespace::File => "File",
            Namespace::MediaWiki => "MediaWiki",
            Namespace::Template => "Template",
            Namespace::Help => "Help",
            Namespace::Category => "Category",
        }
    }

    /// Look up a namespace by its prefix, ignoring case and `_`/space differences.
    ///
    /// The main namespace has no prefix and is never returned.
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().replace('_', " ");
        Self::ALL
            .into_iter()
            .filter(|ns| *ns != Namespace::Main)
            .find(|ns| ns.name().eq_ignore_ascii_case(&wanted))
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Main => f.write_str("(Main)"),
            ns => f.write_str(ns.name()),
        }
    }
}

// ============================================================================
// Titles
// ============================================================================

/// Canonical page identity plus an optional fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Title {
    namespace: Namespace,
    text: String,
    fragment: String,
}

impl Title {
    /// Parse user-supplied text into a title.
    ///
    /// `default_ns` applies when the text carries no recognised namespace
    /// prefix; a leading `:` forces the main namespace. Returns `None` for
    /// empty titles and titles containing forbidden characters.
    pub fn new_from_text(text: &str, default_ns: Namespace) -> Option<Self> {
        let (page, fragment) = match text.split_once('#') {
            Some((page, fragment)) => (page, fragment.replace('_', " ").trim().to_owned()),
            None => (text, String::new()),
        };

        let mut page = normalize_spaces(page);
        let mut namespace = default_ns;

        if let Some(rest) = page.strip_prefix(':') {
            namespace = Namespace::Main;
            page = rest.trim_start().to_owned();
        } else if let Some((prefix, rest)) = page.split_once(':')
            && let Some(ns) = Namespace::from_name(prefix)
        {
            namespace = ns;
            page = rest.trim_start().to_owned();
        }

        if page.is_empty() || page.contains(INVALID_TITLE_CHARS) || is_relative_path(&page) {
            return None;
        }

        Some(Self {
            namespace,
            text: upper_first(&page),
            fragment,
        })
    }

    /// Build a title from already-canonical parts.
    pub fn new(namespace: Namespace, text: impl Into<String>) -> Self {
        Self {
            namespace,
            text: text.into(),
            fragment: String::new(),
        }
    }

    pub const fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Page text without namespace prefix.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// Page text with its namespace prefix, e.g. `Template:Infobox`.
    pub fn prefixed_text(&self) -> String {
        match self.namespace {
            Namespace::Main => self.text.clone(),
            ns => format!("{}:{}", ns.name(), self.text),
        }
    }

    /// Same page without its fragment.
    pub fn without_fragment(&self) -> Self {
        Self {
            namespace: self.namespace,
            text: self.text.clone(),
            fragment: String::new(),
        }
    }
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefixed_text())?;
        if !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}

// ============================================================================
// Text Helpers
// ============================================================================

/// Replace `_` with spaces, collapse whitespace runs and trim.
fn normalize_spaces(text: &str) -> String {
    text.replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn upper_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Escape text so that it renders literally when placed back into wikitext.
pub fn escape_wiki_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_line_start = true;

    for c in text.chars() {
        match c {
            '"' | '&' | '\'' | '<' | '=' | '>' | '[' | ']' | '{' | '|' | '}' => {
                out.push_str(&format!("&#{};", c as u32));
            }
            '#' | '*' | ':' | ';' if at_line_start => {
                out.push_str(&format!("&#{};", c as u32));
            }
            _ => out.push(c),
        }
        at_line_start = c == '\n';
    }

    out.replace("__", "_&#95;").replace("://", "&#58;//")
}

/// Decode a page reference that arrived URL-encoded.
///
/// Text without `%` is returned unchanged. Decoded text has `<` and `>`
/// re-escaped so that decoding cannot smuggle markup into a title.
pub fn decode_source(text: &str) -> String {
    if !text.contains('%') {
        return text.to_owned();
    }
    let plus_decoded = text.replace('+', " ");
    let decoded = urlencoding::decode_binary(plus_decoded.as_bytes());
    String::from_utf8_lossy(&decoded)
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Titles that read as filesystem-relative paths: `.`, `..`, `./x`,
/// `../x`, `/x`, `x/./y`, `x/../y`, `x/.` and `x/..`.
fn is_relative_path(page: &str) -> bool {
    page == "."
        || page == ".."
        || page.starts_with("./")
        || page.starts_with("../")
        || page.starts_with('/')
        || page.contains("/./")
        || page.contains("/../")
        || page.ends_with("/.")
        || page.ends_with("/..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_rejects_relative_paths() {
        for text in [".", "..", "../secret", "./x", "/etc/foo", "a/../b", "a/./b", "a/..", ":../secret"] {
            assert!(Title::new_from_text(text, Namespace::Main).is_none(), "{text}");
        }
        let title = Title::new_from_text("Sword/Stats..v2", Namespace::Main).unwrap();
        assert_eq!(title.text(), "Sword/Stats..v2");
    }

    #[test]
    fn test_title_basic() {
        let title = Title::new_from_text("main_page", Namespace::Main).unwrap();
        assert_eq!(title.namespace(), Namespace::Main);
        assert_eq!(title.text(), "Main page");
        assert_eq!(title.prefixed_text(), "Main page");
        assert_eq!(title.fragment(), "");
    }

    #[test]
    fn test_title_default_namespace() {
        let title = Title::new_from_text("Infobox", Namespace::Template).unwrap();
        assert_eq!(title.prefixed_text(), "Template:Infobox");
    }

    #[test]
    fn test_title_explicit_namespace_wins() {
        let title = Title::new_from_text("user:alice", Namespace::Template).unwrap();
        assert_eq!(title.namespace(), Namespace::User);
        assert_eq!(title.prefixed_text(), "User:Alice");
    }

    #[test]
    fn test_title_leading_colon_forces_main() {
        let title = Title::new_from_text(":Infobox", Namespace::Template).unwrap();
        assert_eq!(title.namespace(), Namespace::Main);
        assert_eq!(title.prefixed_text(), "Infobox");
    }

    #[test]
    fn test_title_unknown_prefix_stays_in_text() {
        let title = Title::new_from_text("Foo:Bar", Namespace::Main).unwrap();
        assert_eq!(title.namespace(), Namespace::Main);
        assert_eq!(title.text(), "Foo:Bar");
    }

    #[test]
    fn test_title_fragment() {
        let title = Title::new_from_text("Sword#Base_stats ", Namespace::Main).unwrap();
        assert_eq!(title.prefixed_text(), "Sword");
        assert_eq!(title.fragment(), "Base stats");
        assert_eq!(title.to_string(), "Sword#Base stats");
    }

    #[test]
    fn test_title_whitespace_collapsed() {
        let title = Title::new_from_text("  a   b__c ", Namespace::Main).unwrap();
        assert_eq!(title.text(), "A b c");
    }

    #[test]
    fn test_title_invalid() {
        assert!(Title::new_from_text("", Namespace::Main).is_none());
        assert!(Title::new_from_text("#only-fragment", Namespace::Main).is_none());
        assert!(Title::new_from_text("Template:", Namespace::Main).is_none());
        assert!(Title::new_from_text("a[b]", Namespace::Main).is_none());
        assert!(Title::new_from_text("a|b", Namespace::Main).is_none());
    }

    #[test]
    fn test_namespace_from_name() {
        assert_eq!(Namespace::from_name("template"), Some(Namespace::Template));
        assert_eq!(Namespace::from_name("Media_Wiki"), None);
        assert_eq!(Namespace::from_name("mediawiki"), Some(Namespace::MediaWiki));
        assert_eq!(Namespace::from_name(""), None);
    }

    #[test]
    fn test_escape_wiki_text() {
        assert_eq!(escape_wiki_text("Plain page"), "Plain page");
        assert_eq!(escape_wiki_text("A|B"), "A&#124;B");
        assert_eq!(escape_wiki_text("*star"), "&#42;star");
        assert_eq!(escape_wiki_text("a\n#b"), "a\n&#35;b");
        assert_eq!(escape_wiki_text("x__y"), "x_&#95;y");
        assert_eq!(escape_wiki_text("http://x"), "http&#58;//x");
    }

    #[test]
    fn test_decode_source() {
        assert_eq!(decode_source("Plain"), "Plain");
        assert_eq!(decode_source("A%20B"), "A B");
        assert_eq!(decode_source("A+B%23frag"), "A B#frag");
        assert_eq!(decode_source("%3Cb%3E"), "&lt;b&gt;");
    }
}
