//! Expansion frames and argument sources.
//!
//! A [`Frame`] is one level of the expansion stack: the page being rendered,
//! a transcluded template, or a data binding. Frames are reference counted
//! because data declarations keep their declaring frame alive long after the
//! expansion that created it has returned.
//!
//! ```text
//! root (Page)            depth 0, NoArguments
//!   └── Template:Box     depth 1, TemplateArguments (parts expanded in root)
//!         └── DataFrame  depth 2, arguments served by the data frame
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;

use super::error::ExpandError;
use super::node::Part;
use super::parser::Parser;
use super::title::Title;

// ============================================================================
// Caller Tokens
// ============================================================================

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of one evaluator.
///
/// Every [`Parser`] gets its own token; a parser cloned for discovery gets a
/// fresh one. Tokens are only compared for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallerToken(u64);

impl CallerToken {
    pub fn next() -> Self {
        Self(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

// ============================================================================
// Argument Sources
// ============================================================================

/// Anything that can answer `{{{name}}}` lookups.
///
/// `Ok(None)` means the argument is absent, which is different from an
/// argument whose value is the empty string.
pub trait ArgumentSource {
    fn argument(&self, parser: &Parser, name: &str) -> Result<Option<String>, ExpandError>;
}

/// Argument source of a page rendered directly.
#[derive(Debug, Default)]
pub struct NoArguments;

impl ArgumentSource for NoArguments {
    fn argument(&self, _: &Parser, _: &str) -> Result<Option<String>, ExpandError> {
        Ok(None)
    }
}

/// Arguments passed to a transcluded template.
///
/// Values are expanded lazily in the calling frame and memoized. Named
/// values are trimmed, positional ones are not. `fixed` values take
/// precedence over every part.
pub struct TemplateArguments {
    caller_frame: Rc<Frame>,
    parts: Vec<Rc<Part>>,
    fixed: FxHashMap<String, String>,
    /// Argument name → index into `parts`, built on first lookup.
    names: RefCell<Option<FxHashMap<String, usize>>>,
    expanded: RefCell<FxHashMap<String, String>>,
}

impl TemplateArguments {
    pub fn new(
        caller_frame: Rc<Frame>,
        parts: Vec<Rc<Part>>,
        fixed: FxHashMap<String, String>,
    ) -> Self {
        Self {
            caller_frame,
            parts,
            fixed,
            names: RefCell::new(None),
            expanded: RefCell::new(FxHashMap::default()),
        }
    }

    fn part_index(&self, parser: &Parser, name: &str) -> Result<Option<usize>, ExpandError> {
        if let Some(names) = self.names.borrow().as_ref() {
            return Ok(names.get(name).copied());
        }

        let mut names = FxHashMap::default();
        for (i, part) in self.parts.iter().enumerate() {
            let key = match (&part.name, part.index) {
                (Some(name), _) => parser.expand(&self.caller_frame, name)?.trim().to_owned(),
                (None, Some(index)) => index.to_string(),
                (None, None) => continue,
            };
            names.insert(key, i);
        }
        let found = names.get(name).copied();
        *self.names.borrow_mut() = Some(names);
        Ok(found)
    }
}

impl ArgumentSource for TemplateArguments {
    fn argument(&self, parser: &Parser, name: &str) -> Result<Option<String>, ExpandError> {
        if let Some(value) = self.fixed.get(name) {
            return Ok(Some(value.clone()));
        }
        if let Some(value) = self.expanded.borrow().get(name) {
            return Ok(Some(value.clone()));
        }

        let Some(index) = self.part_index(parser, name)? else {
            return Ok(None);
        };
        let part = &self.parts[index];
        let value = parser.expand(&self.caller_frame, &part.value)?;
        let value = if part.is_named() {
            value.trim().to_owned()
        } else {
            value
        };

        self.expanded
            .borrow_mut()
            .insert(name.to_owned(), value.clone());
        Ok(Some(value))
    }
}

// ============================================================================
// Frames
// ============================================================================

pub struct Frame {
    parent: Option<Rc<Frame>>,
    title: Option<Title>,
    depth: usize,
    caller: CallerToken,
    arguments: Rc<dyn ArgumentSource>,
}

impl Frame {
    /// Top-level frame for a page rendered by `parser`.
    pub fn root(parser: &Parser, title: Option<Title>) -> Rc<Self> {
        Rc::new(Self {
            parent: None,
            title,
            depth: 0,
            caller: parser.token(),
            arguments: Rc::new(NoArguments),
        })
    }

    /// Frame backed by an arbitrary argument source.
    pub fn with_source(
        parent: Option<Rc<Frame>>,
        title: Option<Title>,
        depth: usize,
        caller: CallerToken,
        arguments: Rc<dyn ArgumentSource>,
    ) -> Rc<Self> {
        Rc::new(Self {
            parent,
            title,
            depth,
            caller,
            arguments,
        })
    }

    /// Child frame for a template transcluded from `self`.
    pub fn new_child(
        self: &Rc<Self>,
        parser: &Parser,
        parts: Vec<Rc<Part>>,
        title: Option<Title>,
        fixed: FxHashMap<String, String>,
    ) -> Rc<Self> {
        let arguments = TemplateArguments::new(Rc::clone(self), parts, fixed);
        Rc::new(Self {
            parent: Some(Rc::clone(self)),
            title,
            depth: self.depth + 1,
            caller: parser.token(),
            arguments: Rc::new(arguments),
        })
    }

    pub fn parent(&self) -> Option<&Rc<Frame>> {
        self.parent.as_ref()
    }

    pub fn title(&self) -> Option<&Title> {
        self.title.as_ref()
    }

    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Token of the evaluator that created this frame.
    pub const fn caller(&self) -> CallerToken {
        self.caller
    }

    pub fn argument(&self, parser: &Parser, name: &str) -> Result<Option<String>, ExpandError> {
        self.arguments.argument(parser, name)
    }

    /// Whether `title` is already being expanded in this frame or an ancestor.
    pub fn is_expanding(&self, title: &Title) -> bool {
        let mut frame = Some(self);
        while let Some(current) = frame {
            if current
                .title
                .as_ref()
                .is_some_and(|t| t.prefixed_text() == title.prefixed_text())
            {
                return true;
            }
            frame = current.parent.as_deref();
        }
        false
    }

    /// The frame `depth` levels up, `self` for depth 0.
    pub fn ancestor(self: &Rc<Self>, depth: usize) -> Option<Rc<Frame>> {
        let mut frame = Rc::clone(self);
        for _ in 0..depth {
            frame = frame.parent.clone()?;
        }
        Some(frame)
    }
}
