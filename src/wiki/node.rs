//! Preprocessor syntax tree.
//!
//! The tree only models the constructs that take part in expansion:
//! templates `{{...}}`, arguments `{{{...}}}`, extension tags and comments.
//! Everything else is plain text.

use std::rc::Rc;

/// A sequence of nodes. Shared so that raw (unexpanded) values can be kept
/// around cheaply by frames and data declarations.
pub type Nodes = Rc<[Node]>;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Comment(String),
    /// `{{title|part|name=part}}`, also used for parser functions and variables.
    Template(Template),
    /// `{{{name|default}}}`
    Argument(ArgumentRef),
    /// `<name attrs>body</name>` for registered extension tags.
    Tag(ExtensionTag),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub title: Nodes,
    pub parts: Vec<Rc<Part>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentRef {
    pub name: Nodes,
    pub default: Option<Nodes>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionTag {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    /// `None` for self-closing tags.
    pub body: Option<String>,
}

/// One `|`-separated part of a template invocation.
///
/// A part with a top-level `=` is named; other parts get consecutive
/// 1-based positional indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub name: Option<Nodes>,
    pub value: Nodes,
    pub index: Option<usize>,
}

impl Part {
    pub fn positional(index: usize, value: Nodes) -> Self {
        Self {
            name: None,
            value,
            index: Some(index),
        }
    }

    pub fn named(name: Nodes, value: Nodes) -> Self {
        Self {
            name: Some(name),
            value,
            index: None,
        }
    }

    pub const fn is_named(&self) -> bool {
        self.name.is_some()
    }
}

/// Build a node sequence holding a single text node.
pub fn text(value: impl Into<String>) -> Nodes {
    let value = value.into();
    if value.is_empty() {
        Rc::from(Vec::new())
    } else {
        Rc::from(vec![Node::Text(value)])
    }
}

/// Reconstruct the source text of a node sequence.
///
/// Used when a construct has to be echoed back literally, such as an
/// argument reference with no value and no default.
pub fn to_source(nodes: &[Node]) -> String {
    let mut out = String::new();
    write_source(nodes, &mut out);
    out
}

fn write_source(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            Node::Template(template) => {
                out.push_str("{{");
                write_source(&template.title, out);
                for part in &template.parts {
                    out.push('|');
                    if let Some(name) = &part.name {
                        write_source(name, out);
                        out.push('=');
                    }
                    write_source(&part.value, out);
                }
                out.push_str("}}");
            }
            Node::Argument(arg) => {
                out.push_str("{{{");
                write_source(&arg.name, out);
                if let Some(default) = &arg.default {
                    out.push('|');
                    write_source(default, out);
                }
                out.push_str("}}}");
            }
            Node::Tag(tag) => {
                out.push('<');
                out.push_str(&tag.name);
                for (key, value) in &tag.attrs {
                    out.push_str(&format!(" {key}=\"{value}\""));
                }
                match &tag.body {
                    Some(body) => {
                        out.push('>');
                        out.push_str(body);
                        out.push_str(&format!("</{}>", tag.name));
                    }
                    None => out.push_str("/>"),
                }
            }
        }
    }
}
