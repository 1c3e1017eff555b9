//! The expansion engine.
//!
//! A [`Parser`] walks a node tree against a [`Frame`], calling registered
//! hooks for variables, parser functions and extension tags, and
//! transcluding templates from its [`PageStore`].
//!
//! # Template transclusion
//!
//! ```text
//! {{Name|a|k=v}}
//!    │
//!    ├── variable hook?          {{NAME}} with no parts
//!    ├── function hook?          {{#name:...}} / {{name:...}}
//!    └── template
//!          ├── invalid title     → literal braces
//!          ├── not includable    → [[:Title]]
//!          ├── too deep / loop   → error span
//!          ├── missing page      → [[:Title]]
//!          └── expand page tree in a child frame
//! ```
//!
//! A data parser ([`Parser::data_parser`]) shares hooks and store with its
//! origin but has its own caller token, caches and node counter, and does
//! not run clear-state hooks.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::FxHashMap;

use super::error::ExpandError;
use super::frame::{CallerToken, Frame};
use super::hooks::{Hooks, NOWIKI};
use super::node::{self, ArgumentRef, ExtensionTag, Node, Nodes, Template};
use super::preprocess::preprocess;
use super::store::PageStore;
use super::title::{Namespace, Title};
use crate::log;

static RE_REDIRECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\A\s*#REDIRECT\s*:?\s*\[\[([^\]|]+)(?:\|[^\]]*)?\]\]").unwrap()
});

// ============================================================================
// Options
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    /// Maximum template nesting depth.
    pub max_depth: usize,
    /// Maximum nesting of expansions, including data bindings that bypass
    /// the template depth check.
    pub max_expand_depth: usize,
    /// Maximum number of nodes expanded in one parse.
    pub max_node_count: usize,
    /// Namespaces whose pages render as links instead of being transcluded.
    pub nonincludable: Vec<Namespace>,
    /// The page being parsed is a section preview; its own data is fetched
    /// from the store.
    pub section_preview: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            max_depth: 40,
            max_expand_depth: 100,
            max_node_count: 1_000_000,
            nonincludable: Vec::new(),
            section_preview: false,
        }
    }
}

// ============================================================================
// Parser
// ============================================================================

/// Cached template tree and the title it was finally loaded from.
type CachedTemplate = (Option<Nodes>, Title);

pub struct Parser {
    token: CallerToken,
    options: Rc<ParserOptions>,
    hooks: Rc<Hooks>,
    store: Rc<dyn PageStore>,
    ext_tags: Rc<[String]>,
    page: RefCell<Option<Title>>,
    templates: RefCell<FxHashMap<String, CachedTemplate>>,
    node_count: Cell<usize>,
    expand_depth: Cell<usize>,
    clear_state_suppressed: bool,
}

/// Tracks one level of [`Parser::expand`] nesting.
struct DepthGuard<'a>(&'a Cell<usize>);

impl<'a> DepthGuard<'a> {
    fn enter(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        Self(depth)
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

impl Parser {
    pub fn new(store: Rc<dyn PageStore>, hooks: Rc<Hooks>, options: ParserOptions) -> Self {
        let ext_tags = Rc::from(hooks.ext_tag_names());
        Self {
            token: CallerToken::next(),
            options: Rc::new(options),
            hooks,
            store,
            ext_tags,
            page: RefCell::new(None),
            templates: RefCell::new(FxHashMap::default()),
            node_count: Cell::new(0),
            expand_depth: Cell::new(0),
            clear_state_suppressed: false,
        }
    }

    /// A parser for data discovery.
    ///
    /// Shares hooks, store and options, but has a fresh caller token and
    /// empty caches, and never runs clear-state hooks.
    pub fn data_parser(&self) -> Self {
        Self {
            token: CallerToken::next(),
            options: Rc::clone(&self.options),
            hooks: Rc::clone(&self.hooks),
            store: Rc::clone(&self.store),
            ext_tags: Rc::clone(&self.ext_tags),
            page: RefCell::new(None),
            templates: RefCell::new(FxHashMap::default()),
            node_count: Cell::new(0),
            expand_depth: Cell::new(0),
            clear_state_suppressed: true,
        }
    }

    pub const fn token(&self) -> CallerToken {
        self.token
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// The page currently being parsed.
    pub fn page(&self) -> Option<Title> {
        self.page.borrow().clone()
    }

    pub fn node_count(&self) -> usize {
        self.node_count.get()
    }

    /// Charge `count` nodes against the node-count limit.
    pub fn add_node_count(&self, count: usize) -> Result<(), ExpandError> {
        let total = self.node_count.get().saturating_add(count);
        self.node_count.set(total);
        if total > self.options.max_node_count {
            return Err(ExpandError::NodeCountExceeded(self.options.max_node_count));
        }
        Ok(())
    }

    /// Reset per-parse state and notify clear-state hooks.
    pub fn clear_state(&self) {
        if !self.clear_state_suppressed {
            self.hooks.run_clear_state();
        }
        self.templates.borrow_mut().clear();
        self.node_count.set(0);
    }

    /// Begin an independent parse of the page `title` and return its root
    /// frame.
    pub fn start(&self, title: Option<Title>) -> Rc<Frame> {
        self.clear_state();
        *self.page.borrow_mut() = title.clone();
        Frame::root(self, title)
    }

    /// Start an independent parse of `text` as the page `title`.
    pub fn parse(&self, text: &str, title: Option<Title>) -> Result<String, ExpandError> {
        let frame = self.start(title);
        self.replace_variables(text, &frame)
    }

    /// Expand `text` for its side effects, such as data declarations.
    ///
    /// Unlike [`Parser::parse`] the template cache is dropped afterwards, as
    /// fetches may have been skipped while it was filled.
    pub fn preprocess(&self, text: &str, title: Option<Title>) -> Result<String, ExpandError> {
        let frame = self.start(title);
        let out = self.replace_variables(text, &frame);
        self.templates.borrow_mut().clear();
        out
    }

    /// Preprocess `text` and expand it in `frame`.
    pub fn replace_variables(&self, text: &str, frame: &Rc<Frame>) -> Result<String, ExpandError> {
        let nodes = preprocess(text, false, &self.ext_tags);
        self.expand(frame, &nodes)
    }

    /// Expand `nodes` in `frame`.
    pub fn expand(&self, frame: &Rc<Frame>, nodes: &[Node]) -> Result<String, ExpandError> {
        let _depth = DepthGuard::enter(&self.expand_depth);
        if self.expand_depth.get() > self.options.max_expand_depth {
            return Ok(format!(
                "<span class=\"error\">Expansion depth limit exceeded ({})</span>",
                self.options.max_expand_depth
            ));
        }

        let mut out = String::new();
        for node in nodes {
            self.add_node_count(1)?;
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Comment(_) => {}
                Node::Template(template) => out.push_str(&self.expand_template(frame, template)?),
                Node::Argument(arg) => out.push_str(&self.expand_argument(frame, arg)?),
                Node::Tag(tag) => out.push_str(&self.expand_tag(frame, tag)?),
            }
        }
        Ok(out)
    }

    fn expand_argument(&self, frame: &Rc<Frame>, arg: &ArgumentRef) -> Result<String, ExpandError> {
        let name = self.expand(frame, &arg.name)?;
        let name = name.trim();
        if let Some(value) = frame.argument(self, name)? {
            return Ok(value);
        }
        match &arg.default {
            Some(default) => self.expand(frame, default),
            None => Ok(format!("{{{{{{{name}}}}}}}")),
        }
    }

    fn expand_tag(&self, frame: &Rc<Frame>, tag: &ExtensionTag) -> Result<String, ExpandError> {
        if let Some(hook) = self.hooks.tag(&tag.name) {
            return hook(self, frame, tag.body.as_deref(), &tag.attrs);
        }
        if tag.name == NOWIKI {
            return Ok(tag.body.clone().unwrap_or_default());
        }
        Ok(node::to_source(&[Node::Tag(tag.clone())]))
    }

    fn expand_template(&self, frame: &Rc<Frame>, template: &Template) -> Result<String, ExpandError> {
        let expanded = self.expand(frame, &template.title)?;
        let name = expanded.trim();

        if template.parts.is_empty()
            && let Some(hook) = self.hooks.variable(&name.to_uppercase())
        {
            return hook(self, frame);
        }

        if let Some((function, first)) = name.split_once(':') {
            let hook = match function.strip_prefix('#') {
                Some(function) => self.hooks.function(function.trim()),
                None => self.hooks.function_no_hash(function.trim()),
            };
            if let Some(hook) = hook {
                return hook(self, frame, first.trim(), &template.parts);
            }
        }

        let Some(title) = Title::new_from_text(name, Namespace::Template) else {
            return Ok(literal_template(&expanded, template));
        };
        let title = title.without_fragment();

        if !self.is_includable(title.namespace()) {
            return Ok(format!("[[:{}]]", title.prefixed_text()));
        }
        if frame.depth() >= self.options.max_depth {
            return Ok(format!(
                "<span class=\"error\">Template recursion depth limit exceeded ({})</span>",
                self.options.max_depth
            ));
        }
        if frame.is_expanding(&title) {
            return Ok(format!(
                "<span class=\"error\">Template loop detected: [[:{}]]</span>",
                title.prefixed_text()
            ));
        }

        let (tree, final_title) = self.template_tree(&title)?;
        let Some(tree) = tree else {
            return Ok(format!("[[:{}]]", final_title.prefixed_text()));
        };
        let child = frame.new_child(
            self,
            template.parts.clone(),
            Some(final_title),
            FxHashMap::default(),
        );
        self.expand(&child, &tree)
    }

    /// Whether pages in `namespace` may be transcluded.
    pub fn is_includable(&self, namespace: Namespace) -> bool {
        namespace != Namespace::Special && !self.options.nonincludable.contains(&namespace)
    }

    /// Preprocessed tree of `title` for transclusion, cached per parse.
    ///
    /// Returns the title the text was actually loaded from, which differs
    /// from `title` when a redirect was followed.
    pub fn template_tree(&self, title: &Title) -> Result<CachedTemplate, ExpandError> {
        let key = title.prefixed_text();
        if let Some(cached) = self.templates.borrow().get(&key) {
            return Ok(cached.clone());
        }

        let (text, final_title) = self.fetch_template_and_title(title)?;
        let tree = text.map(|text| preprocess(&text, true, &self.ext_tags));
        let entry = (tree, final_title);
        self.templates.borrow_mut().insert(key, entry.clone());
        Ok(entry)
    }

    /// Fetch the raw text of `title`, following one redirect.
    ///
    /// Before-fetch hooks may veto the fetch, in which case the page is
    /// reported missing.
    pub fn fetch_template_and_title(
        &self,
        title: &Title,
    ) -> Result<(Option<String>, Title), ExpandError> {
        let text = self.fetch(title)?;

        if let Some(text) = &text
            && let Some(caps) = RE_REDIRECT.captures(text)
            && let Some(target) = Title::new_from_text(&caps[1], Namespace::Main)
        {
            let target = target.without_fragment();
            log!("fetch"; "following redirect {} -> {}", title.prefixed_text(), target.prefixed_text());
            let text = self.fetch(&target)?;
            return Ok((text, target));
        }

        Ok((text, title.clone()))
    }

    fn fetch(&self, title: &Title) -> Result<Option<String>, ExpandError> {
        if self.hooks.skip_fetch(title) {
            log!("fetch"; "skipped {}", title.prefixed_text());
            return Ok(None);
        }
        self.store.fetch(title).map_err(|source| ExpandError::Fetch {
            title: title.prefixed_text(),
            source,
        })
    }
}

/// Echo an unresolvable `{{...}}` back with its expanded title.
fn literal_template(title: &str, template: &Template) -> String {
    let mut out = format!("{{{{{title}");
    for part in &template.parts {
        out.push('|');
        if let Some(name) = &part.name {
            out.push_str(&node::to_source(name));
            out.push('=');
        }
        out.push_str(&node::to_source(&part.value));
    }
    out.push_str("}}");
    out
}
