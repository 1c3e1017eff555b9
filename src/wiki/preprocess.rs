//! Wikitext preprocessor: turns raw page text into a [`Node`] tree.
//!
//! Brace matching follows the usual wikitext rules: a run of `{` opens a
//! piece, and a run of `}` closes as much of it as possible, preferring an
//! argument (`{{{`) over a template (`{{`). Leftover braces stay literal.
//!
//! ```text
//! "{{{{{a}}}}}"   →  Template { title: [Argument { name: "a" }] }
//! "{{{a}}"        →  "{" + Template { title: "a" }
//! "{{x|[[A|B]]}}" →  Template { title: "x", parts: ["[[A|B]]"] }
//! ```
//!
//! Unclosed constructs degrade to literal text; preprocessing never fails.

use std::rc::Rc;
use std::sync::LazyLock;

use regex::Regex;

use super::node::{ArgumentRef, ExtensionTag, Node, Nodes, Part, Template};

/// Characters that may start a structural construct.
const SPECIAL_CHARS: &[char] = &['<', '{', '}', '[', ']', '|', '='];

/// Preprocess `text` into a node tree.
///
/// `for_inclusion` selects transclusion semantics for `<noinclude>`,
/// `<includeonly>` and `<onlyinclude>`. `ext_tags` lists the lower-case
/// names of extension tags whose bodies are kept verbatim.
pub fn preprocess(text: &str, for_inclusion: bool, ext_tags: &[String]) -> Nodes {
    let text = strip_inclusion_tags(text, for_inclusion);
    let mut builder = TreeBuilder {
        src: &text,
        pos: 0,
        root: PartBuf::default(),
        stack: Vec::new(),
        ext_tags,
    };
    builder.run();
    Rc::from(builder.finish())
}

// ============================================================================
// Inclusion Control
// ============================================================================

static RE_ONLYINCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<onlyinclude\s*>(.*?)(?:</onlyinclude\s*>|$)").unwrap()
});
static RE_NOINCLUDE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<noinclude\s*>.*?(?:</noinclude\s*>|$)").unwrap()
});
static RE_INCLUDEONLY_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<includeonly\s*>.*?(?:</includeonly\s*>|$)").unwrap()
});
static RE_INCLUSION_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(?:noinclude|includeonly|onlyinclude)\s*/?>").unwrap()
});

/// Apply `<noinclude>`, `<includeonly>` and `<onlyinclude>` semantics.
fn strip_inclusion_tags(text: &str, for_inclusion: bool) -> String {
    if for_inclusion {
        let text = if RE_ONLYINCLUDE.is_match(text) {
            RE_ONLYINCLUDE
                .captures_iter(text)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str())
                .collect::<String>()
        } else {
            text.to_owned()
        };
        let text = RE_NOINCLUDE_BLOCK.replace_all(&text, "");
        RE_INCLUSION_TAG.replace_all(&text, "").into_owned()
    } else {
        let text = RE_INCLUDEONLY_BLOCK.replace_all(text, "");
        RE_INCLUSION_TAG.replace_all(&text, "").into_owned()
    }
}

// ============================================================================
// Tree Builder
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PieceKind {
    /// `{{` / `{{{`
    Brace,
    /// `[[`, tracked only so that `|` inside links does not split parts.
    Link,
}

impl PieceKind {
    const fn open_char(self) -> char {
        match self {
            PieceKind::Brace => '{',
            PieceKind::Link => '[',
        }
    }
}

/// Node accumulator for one part. `eq` marks where a top-level `=` split
/// the part into name and value.
#[derive(Debug, Default)]
struct PartBuf {
    nodes: Vec<Node>,
    eq: Option<usize>,
}

impl PartBuf {
    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let split_here = self.eq == Some(self.nodes.len());
        match self.nodes.last_mut() {
            Some(Node::Text(last)) if !split_here => last.push_str(text),
            _ => self.nodes.push(Node::Text(text.to_owned())),
        }
    }

    fn push_node(&mut self, node: Node) {
        match node {
            Node::Text(text) => self.push_text(&text),
            node => self.nodes.push(node),
        }
    }

    /// Nodes with the `=` separator put back, for literal reconstruction.
    fn into_literal(self) -> Vec<Node> {
        let Some(eq) = self.eq else {
            return self.nodes;
        };
        let mut out = PartBuf::default();
        let mut nodes = self.nodes;
        let value = nodes.split_off(eq);
        for node in nodes {
            out.push_node(node);
        }
        out.push_text("=");
        for node in value {
            out.push_node(node);
        }
        out.nodes
    }
}

#[derive(Debug)]
struct Piece {
    kind: PieceKind,
    open: usize,
    done: Vec<PartBuf>,
    current: PartBuf,
}

impl Piece {
    fn new(kind: PieceKind, open: usize) -> Self {
        Self {
            kind,
            open,
            done: Vec::new(),
            current: PartBuf::default(),
        }
    }

    fn into_parts(self) -> Vec<PartBuf> {
        let mut parts = self.done;
        parts.push(self.current);
        parts
    }
}

struct TreeBuilder<'a> {
    src: &'a str,
    pos: usize,
    root: PartBuf,
    stack: Vec<Piece>,
    ext_tags: &'a [String],
}

impl TreeBuilder<'_> {
    fn acc(&mut self) -> &mut PartBuf {
        match self.stack.last_mut() {
            Some(piece) => &mut piece.current,
            None => &mut self.root,
        }
    }

    fn top_kind(&self) -> Option<PieceKind> {
        self.stack.last().map(|piece| piece.kind)
    }

    fn run(&mut self) {
        let src = self.src;
        while self.pos < src.len() {
            let rest = &src[self.pos..];

            let plain = rest.find(SPECIAL_CHARS).unwrap_or(rest.len());
            if plain > 0 {
                self.acc().push_text(&rest[..plain]);
                self.pos += plain;
                continue;
            }

            if rest.starts_with("<!--") {
                self.comment(rest);
            } else if rest.starts_with('<') {
                match self.ext_tag(rest) {
                    Some((tag, consumed)) => {
                        self.acc().push_node(Node::Tag(tag));
                        self.pos += consumed;
                    }
                    None => self.literal_char('<'),
                }
            } else if rest.starts_with("{{") {
                self.open(PieceKind::Brace, rest);
            } else if rest.starts_with("[[") {
                self.open(PieceKind::Link, rest);
            } else if rest.starts_with('}') && self.top_kind() == Some(PieceKind::Brace) {
                self.close(PieceKind::Brace, '}', rest);
            } else if rest.starts_with(']') && self.top_kind() == Some(PieceKind::Link) {
                self.close(PieceKind::Link, ']', rest);
            } else if rest.starts_with('|') && self.top_kind() == Some(PieceKind::Brace) {
                if let Some(piece) = self.stack.last_mut() {
                    let finished = std::mem::take(&mut piece.current);
                    piece.done.push(finished);
                }
                self.pos += 1;
            } else if rest.starts_with('=') && self.is_name_split_point() {
                let acc = self.acc();
                acc.eq = Some(acc.nodes.len());
                self.pos += 1;
            } else {
                let c = rest.chars().next().unwrap_or(' ');
                self.literal_char(c);
            }
        }
    }

    fn literal_char(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.acc().push_text(c.encode_utf8(&mut buf));
        self.pos += c.len_utf8();
    }

    /// A `=` splits name from value only in the first `=` of a non-title
    /// part of a brace piece.
    fn is_name_split_point(&self) -> bool {
        match self.stack.last() {
            Some(piece) => {
                piece.kind == PieceKind::Brace && !piece.done.is_empty() && piece.current.eq.is_none()
            }
            None => false,
        }
    }

    fn comment(&mut self, rest: &str) {
        let body_start = "<!--".len();
        let (body, consumed) = match rest[body_start..].find("-->") {
            Some(end) => (&rest[body_start..body_start + end], body_start + end + "-->".len()),
            None => (&rest[body_start..], rest.len()),
        };
        self.acc().push_node(Node::Comment(body.to_owned()));
        self.pos += consumed;
    }

    /// Try to parse a registered extension tag at the start of `rest`.
    fn ext_tag(&self, rest: &str) -> Option<(ExtensionTag, usize)> {
        let name_len = rest[1..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
            .unwrap_or(rest.len() - 1);
        if name_len == 0 {
            return None;
        }
        let name = rest[1..1 + name_len].to_ascii_lowercase();
        if !self.ext_tags.iter().any(|tag| *tag == name) {
            return None;
        }

        let after_name = &rest[1 + name_len..];
        if !after_name.starts_with(|c: char| c.is_whitespace() || c == '>' || c == '/') {
            return None;
        }
        let close = find_tag_end(after_name)?;
        let attr_text = &after_name[..close];
        let head_len = 1 + name_len + close + 1;

        if let Some(attr_text) = attr_text.trim_end().strip_suffix('/') {
            let tag = ExtensionTag {
                name,
                attrs: parse_attributes(attr_text),
                body: None,
            };
            return Some((tag, head_len));
        }

        let body_src = &rest[head_len..];
        let (body_len, close_len) = find_closing_tag(body_src, &name)?;
        let tag = ExtensionTag {
            name,
            attrs: parse_attributes(attr_text),
            body: Some(body_src[..body_len].to_owned()),
        };
        Some((tag, head_len + body_len + close_len))
    }

    fn open(&mut self, kind: PieceKind, rest: &str) {
        let count = run_length(rest, kind.open_char());
        self.stack.push(Piece::new(kind, count));
        self.pos += count;
    }

    fn close(&mut self, kind: PieceKind, close_char: char, rest: &str) {
        let count = run_length(rest, close_char);
        let open = self.stack.last().map_or(0, |piece| piece.open);
        let max = match kind {
            PieceKind::Brace => 3,
            PieceKind::Link => 2,
        };
        let matching = count.min(open).min(max);
        if matching < 2 {
            let literal = close_char.to_string().repeat(count);
            self.acc().push_text(&literal);
            self.pos += count;
            return;
        }

        let Some(piece) = self.stack.pop() else {
            return;
        };
        let remaining = piece.open - matching;
        let element = build_element(piece, matching);
        self.pos += matching;

        if remaining >= 2 {
            let mut reopened = Piece::new(kind, remaining);
            for node in element {
                reopened.current.push_node(node);
            }
            self.stack.push(reopened);
        } else {
            let leftover = kind.open_char().to_string().repeat(remaining);
            let acc = self.acc();
            acc.push_text(&leftover);
            for node in element {
                acc.push_node(node);
            }
        }
    }

    /// Unwind unclosed pieces into literal text.
    fn finish(mut self) -> Vec<Node> {
        while let Some(piece) = self.stack.pop() {
            let literal = literal_piece(piece);
            let acc = self.acc();
            for node in literal {
                acc.push_node(node);
            }
        }
        self.root.nodes
    }
}

fn run_length(text: &str, c: char) -> usize {
    text.chars().take_while(|&x| x == c).count()
}

/// Build the node(s) a closed piece stands for.
fn build_element(piece: Piece, matching: usize) -> Vec<Node> {
    match piece.kind {
        PieceKind::Link => {
            let mut acc = PartBuf::default();
            acc.push_text("[[");
            for node in piece.current.into_literal() {
                acc.push_node(node);
            }
            acc.push_text("]]");
            acc.nodes
        }
        PieceKind::Brace if matching == 3 => {
            let mut parts = piece.into_parts().into_iter();
            let name = parts.next().map(|p| p.into_literal()).unwrap_or_default();
            let default = parts.next().map(|p| Rc::from(p.into_literal()));
            vec![Node::Argument(ArgumentRef {
                name: Rc::from(name),
                default,
            })]
        }
        PieceKind::Brace => {
            let mut parts = piece.into_parts().into_iter();
            let title = parts.next().map(|p| p.into_literal()).unwrap_or_default();
            let mut index = 0;
            let parts = parts
                .map(|mut part| {
                    Rc::new(match part.eq {
                        Some(eq) => {
                            let value = part.nodes.split_off(eq);
                            Part::named(Rc::from(part.nodes), Rc::from(value))
                        }
                        None => {
                            index += 1;
                            Part::positional(index, Rc::from(part.nodes))
                        }
                    })
                })
                .collect();
            vec![Node::Template(Template {
                title: Rc::from(title),
                parts,
            })]
        }
    }
}

fn literal_piece(piece: Piece) -> Vec<Node> {
    let mut acc = PartBuf::default();
    acc.push_text(&piece.kind.open_char().to_string().repeat(piece.open));
    for (i, part) in piece.into_parts().into_iter().enumerate() {
        if i > 0 {
            acc.push_text("|");
        }
        for node in part.into_literal() {
            acc.push_node(node);
        }
    }
    acc.nodes
}

// ============================================================================
// Tag Helpers
// ============================================================================

static RE_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>/=]+)))?"#)
        .unwrap()
});

/// Index of the `>` ending a tag head, skipping quoted attribute values.
fn find_tag_end(text: &str) -> Option<usize> {
    let mut quote = None;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '>') => return Some(i),
            _ => {}
        }
    }
    None
}

/// Find `</name>` (case-insensitive). Returns body length and closing tag length.
fn find_closing_tag(body: &str, name: &str) -> Option<(usize, usize)> {
    let lower = body.to_ascii_lowercase();
    let needle = format!("</{name}");
    let mut from = 0;
    while let Some(found) = lower[from..].find(&needle) {
        let start = from + found;
        let after = &body[start + needle.len()..];
        let spaces = after.len() - after.trim_start().len();
        if after[spaces..].starts_with('>') {
            return Some((start, needle.len() + spaces + 1));
        }
        from = start + needle.len();
    }
    None
}

/// Parse `key="value"` style attributes; keys are lower-cased.
pub fn parse_attributes(text: &str) -> Vec<(String, String)> {
    RE_ATTRIBUTE
        .captures_iter(text)
        .map(|caps| {
            let key = caps[1].to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().to_owned())
                .unwrap_or_default();
            (key, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiki::node::to_source;

    fn tags() -> Vec<String> {
        vec!["using".to_owned(), "nowiki".to_owned()]
    }

    fn parse(text: &str) -> Nodes {
        preprocess(text, false, &tags())
    }

    fn only_template(nodes: &[Node]) -> &Template {
        match nodes {
            [Node::Template(t)] => t,
            other => panic!("expected a single template, got {other:?}"),
        }
    }

    #[test]
    fn test_plain_text() {
        let nodes = parse("hello world");
        assert_eq!(&*nodes, &[Node::Text("hello world".into())]);
    }

    #[test]
    fn test_template_parts() {
        let nodes = parse("{{Infobox|first|name = value|second}}");
        let t = only_template(&nodes);
        assert_eq!(to_source(&t.title), "Infobox");
        assert_eq!(t.parts.len(), 3);
        assert_eq!(t.parts[0].index, Some(1));
        assert_eq!(to_source(&t.parts[0].value), "first");
        assert_eq!(to_source(t.parts[1].name.as_deref().unwrap()), "name ");
        assert_eq!(to_source(&t.parts[1].value), " value");
        assert_eq!(t.parts[2].index, Some(2));
    }

    #[test]
    fn test_only_first_equals_splits() {
        let nodes = parse("{{T|a=b=c}}");
        let t = only_template(&nodes);
        assert_eq!(to_source(t.parts[0].name.as_deref().unwrap()), "a");
        assert_eq!(to_source(&t.parts[0].value), "b=c");
    }

    #[test]
    fn test_equals_in_title_is_literal() {
        let nodes = parse("{{a=b}}");
        let t = only_template(&nodes);
        assert_eq!(to_source(&t.title), "a=b");
        assert!(t.parts.is_empty());
    }

    #[test]
    fn test_argument_with_default() {
        let nodes = parse("{{{name|fallback}}}");
        match &*nodes {
            [Node::Argument(arg)] => {
                assert_eq!(to_source(&arg.name), "name");
                assert_eq!(to_source(arg.default.as_deref().unwrap()), "fallback");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_argument_default_keeps_equals() {
        let nodes = parse("{{{a|x=y}}}");
        match &*nodes {
            [Node::Argument(arg)] => {
                assert_eq!(to_source(arg.default.as_deref().unwrap()), "x=y");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_five_braces() {
        let nodes = parse("{{{{{a}}}}}");
        let t = only_template(&nodes);
        assert!(matches!(&*t.title, [Node::Argument(_)]));
    }

    #[test]
    fn test_unbalanced_braces() {
        let nodes = parse("{{{a}}");
        assert_eq!(nodes[0], Node::Text("{".into()));
        assert!(matches!(nodes[1], Node::Template(_)));
    }

    #[test]
    fn test_unclosed_is_literal() {
        let nodes = parse("{{T|a=b");
        assert_eq!(to_source(&nodes), "{{T|a=b");
        assert!(nodes.iter().all(|n| matches!(n, Node::Text(_))));
    }

    #[test]
    fn test_link_pipe_does_not_split() {
        let nodes = parse("{{T|[[Page|label]]}}");
        let t = only_template(&nodes);
        assert_eq!(t.parts.len(), 1);
        assert_eq!(to_source(&t.parts[0].value), "[[Page|label]]");
    }

    #[test]
    fn test_nested_template() {
        let nodes = parse("{{A|{{B|x}}|y}}");
        let t = only_template(&nodes);
        assert_eq!(t.parts.len(), 2);
        assert!(matches!(&*t.parts[0].value, [Node::Template(_)]));
    }

    #[test]
    fn test_comment() {
        let nodes = parse("a<!-- hidden -->b");
        assert_eq!(nodes[1], Node::Comment(" hidden ".into()));
        assert_eq!(nodes.len(), 3);
    }

    #[test]
    fn test_ext_tag() {
        let nodes = parse(r#"<using page="A#f" default='none'>{{{x}}}</USING>"#);
        match &*nodes {
            [Node::Tag(tag)] => {
                assert_eq!(tag.name, "using");
                assert_eq!(
                    tag.attrs,
                    vec![
                        ("page".to_owned(), "A#f".to_owned()),
                        ("default".to_owned(), "none".to_owned())
                    ]
                );
                assert_eq!(tag.body.as_deref(), Some("{{{x}}}"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_self_closing_tag() {
        let nodes = parse("<nowiki/>x");
        assert!(matches!(&nodes[0], Node::Tag(ExtensionTag { body: None, .. })));
    }

    #[test]
    fn test_unknown_and_unclosed_tags_are_text() {
        assert_eq!(&*parse("<b>x</b>"), &[Node::Text("<b>x</b>".into())]);
        assert_eq!(&*parse("<nowiki>x"), &[Node::Text("<nowiki>x".into())]);
    }

    #[test]
    fn test_inclusion_tags() {
        let text = "a<noinclude>b</noinclude><includeonly>c</includeonly>";
        assert_eq!(strip_inclusion_tags(text, false), "ab");
        assert_eq!(strip_inclusion_tags(text, true), "ac");
    }

    #[test]
    fn test_onlyinclude() {
        let text = "x<onlyinclude>a</onlyinclude>y<onlyinclude>b</onlyinclude>z";
        assert_eq!(strip_inclusion_tags(text, true), "ab");
        assert_eq!(strip_inclusion_tags(text, false), "xaybz");
    }
}
