//! Data frames: the published argument set of one page.
//!
//! # Lifecycle of a field
//!
//! ```text
//! {{#data:Box#Stats|atk = {{{base}}}+1}}
//!        │
//!        ▼  add_declarations
//! pending  [ (declaring scope, {stats##atk: raw nodes}) , ... ]
//!        │
//!        ▼  resolve_field (first lookup, earliest batch wins, entry consumed)
//! resolved { stats##atk: "12+1" }                  caller independent
//!        │
//!        ▼  trim, cached while the caller stays the same
//! per_caller { stats##atk: "12+1" }
//! ```
//!
//! During [`DataFrame::expand_on`] the frame serves as the argument source
//! of a template body: overrides passed by the consumer come first, then the
//! fields of the fragment in view.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use rustc_hash::{FxHashMap, FxHashSet};

use super::fragment::{FieldKey, Normalize, NormalizedFragment};
use super::types::{FragmentSummary, FrameSummary, ResolvedField};
use crate::wiki::title::escape_wiki_text;
use crate::wiki::{ArgumentSource, CallerToken, ExpandError, Frame, Nodes, Parser, Part, Title};

// ============================================================================
// Expansion Inputs
// ============================================================================

/// A consumer-supplied value layered above the stored fields.
#[derive(Debug, Clone)]
pub enum OverrideValue {
    /// Unexpanded; expanded once in the override scope on first use.
    Raw(Nodes),
    Text(String),
}

pub type Overrides = FxHashMap<String, OverrideValue>;

/// The body expanded by [`DataFrame::expand_on`].
#[derive(Debug, Clone)]
pub enum TemplateBody {
    Empty,
    /// A preprocessed template.
    Tree(Nodes),
    /// Text returned as-is, such as a link to a missing template.
    Literal(String),
    /// Wikitext that is preprocessed and expanded in place.
    Wikitext(String),
}

// ============================================================================
// Frame State
// ============================================================================

/// One batch of named fields from a single declaration.
struct Declaration {
    scope: Rc<Frame>,
    fields: FxHashMap<FieldKey, Nodes>,
}

struct OverrideLayer {
    fields: RefCell<Overrides>,
    scope: Rc<Frame>,
}

/// State swapped in for the duration of one bulk expansion.
struct ExpansionState {
    caller: Option<CallerToken>,
    per_caller: FxHashMap<FieldKey, String>,
    overrides: Option<Rc<OverrideLayer>>,
    fragment: String,
    fragment_normalized: NormalizedFragment,
    title: Option<Title>,
}

pub struct DataFrame {
    source_page: String,
    parent: Weak<Frame>,
    parent_caller: CallerToken,
    depth: usize,
    known_fragments: RefCell<FxHashSet<NormalizedFragment>>,
    pending: RefCell<Vec<Declaration>>,
    resolved: RefCell<FxHashMap<FieldKey, String>>,
    state: RefCell<ExpansionState>,
}

impl DataFrame {
    /// Empty frame for `source_page`, created from the scope `parent`.
    pub fn new(parent: &Rc<Frame>, source_page: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            source_page: source_page.into(),
            parent: Rc::downgrade(parent),
            parent_caller: parent.caller(),
            depth: parent.depth() + 1,
            known_fragments: RefCell::new(FxHashSet::default()),
            pending: RefCell::new(Vec::new()),
            resolved: RefCell::new(FxHashMap::default()),
            state: RefCell::new(ExpansionState {
                caller: None,
                per_caller: FxHashMap::default(),
                overrides: None,
                fragment: String::new(),
                fragment_normalized: NormalizedFragment::default(),
                title: parent.title().cloned(),
            }),
        })
    }

    pub fn source_page(&self) -> &str {
        &self.source_page
    }

    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Record the named parts of one declaration under `fragment`.
    ///
    /// Field names are expanded in `scope` and trimmed; values stay raw
    /// until first resolved. Positional parts are ignored. The fragment
    /// becomes known even when no field is named.
    pub fn add_declarations(
        &self,
        parser: &Parser,
        scope: &Rc<Frame>,
        parts: &[Rc<Part>],
        fragment: &str,
    ) -> Result<(), ExpandError> {
        let prefix = fragment.normalize();
        let mut fields = FxHashMap::default();
        for part in parts {
            if let Some(name) = &part.name {
                let name = parser.expand(scope, name)?;
                fields.insert(prefix.key(name.trim()), part.value.clone());
            }
        }

        self.pending.borrow_mut().push(Declaration {
            scope: Rc::clone(scope),
            fields,
        });
        self.known_fragments.borrow_mut().insert(prefix);
        Ok(())
    }

    /// Whether `fragment` was declared at least once.
    pub fn has_fragment<F: Normalize + ?Sized>(&self, fragment: &F) -> bool {
        self.known_fragments
            .borrow()
            .contains(&fragment.normalize())
    }

    /// Whether the fragment in view has never been declared.
    pub fn is_empty(&self) -> bool {
        let state = self.state.borrow();
        !self
            .known_fragments
            .borrow()
            .contains(&state.fragment_normalized)
    }

    /// Look up one field, expanding its declaration on first use.
    ///
    /// Values are expanded with `parser`; `caller` only decides whether the
    /// trimmed result may be cached for the active expansion. Returns
    /// `default` when the field was never declared.
    pub fn resolve_field(
        &self,
        parser: &Parser,
        caller: CallerToken,
        fragment: &NormalizedFragment,
        field: &str,
        default: Option<&str>,
    ) -> Result<Option<String>, ExpandError> {
        let key = fragment.key(field);
        {
            let state = self.state.borrow();
            if state.caller == Some(caller)
                && let Some(value) = state.per_caller.get(&key)
            {
                return Ok(Some(value.clone()));
            }
        }

        let cached = self.resolved.borrow().get(&key).cloned();
        let text = match cached {
            Some(text) => text,
            None => match self.take_pending(&key) {
                Some((scope, raw)) => {
                    let text = parser.expand(&scope, &raw)?;
                    self.resolved.borrow_mut().insert(key.clone(), text.clone());
                    text
                }
                None => return Ok(default.map(str::to_owned)),
            },
        };

        let text = text.trim().to_owned();
        let mut state = self.state.borrow_mut();
        if state.caller == Some(caller) {
            state.per_caller.insert(key, text.clone());
        }
        Ok(Some(text))
    }

    /// Remove the earliest pending declaration of `key`.
    fn take_pending(&self, key: &FieldKey) -> Option<(Rc<Frame>, Nodes)> {
        let mut pending = self.pending.borrow_mut();
        pending.iter_mut().find_map(|declaration| {
            declaration
                .fields
                .remove(key)
                .map(|raw| (Rc::clone(&declaration.scope), raw))
        })
    }

    /// Expand `body` with this frame's fields as its arguments.
    ///
    /// `overrides` are visible for this expansion only and are expanded in
    /// `outer`. Unqualified lookups read `fragment`. The frame's expansion
    /// state is restored on every exit path; the caller and its cache only
    /// when a caller was active before.
    pub fn expand_on(
        self: &Rc<Self>,
        parser: &Parser,
        outer: &Rc<Frame>,
        template_title: Option<Title>,
        body: TemplateBody,
        overrides: Overrides,
        fragment: &str,
    ) -> Result<String, ExpandError> {
        let title = template_title.or_else(|| outer.title().cloned());
        let layer = OverrideLayer {
            fields: RefCell::new(overrides),
            scope: Rc::clone(outer),
        };
        let installed = ExpansionState {
            caller: Some(parser.token()),
            per_caller: FxHashMap::default(),
            overrides: Some(Rc::new(layer)),
            fragment: fragment.to_owned(),
            fragment_normalized: fragment.normalize(),
            title,
        };
        let _restore = RestoreGuard::install(self, installed);

        let frame = Frame::with_source(
            self.parent.upgrade(),
            self.title_context(),
            self.depth,
            parser.token(),
            Rc::clone(self) as Rc<dyn ArgumentSource>,
        );
        match body {
            TemplateBody::Empty => Ok(String::new()),
            TemplateBody::Tree(nodes) => parser.expand(&frame, &nodes),
            TemplateBody::Literal(text) => Ok(text),
            TemplateBody::Wikitext(text) => parser.replace_variables(&text, &frame),
        }
    }

    /// Title that expansions of this frame run under: the bound template
    /// during [`DataFrame::expand_on`], the creating scope's title otherwise.
    pub fn title_context(&self) -> Option<Title> {
        self.state.borrow().title.clone()
    }

    /// Known fragments with their pending and resolved field names.
    pub fn summary(&self) -> FrameSummary {
        let mut fragments: BTreeMap<NormalizedFragment, FragmentSummary> = self
            .known_fragments
            .borrow()
            .iter()
            .map(|fragment| {
                let summary = FragmentSummary {
                    name: fragment.denormalize(),
                    pending: Vec::new(),
                    resolved: Vec::new(),
                };
                (fragment.clone(), summary)
            })
            .collect();

        for declaration in self.pending.borrow().iter() {
            for key in declaration.fields.keys() {
                if let Some(summary) = fragments.get_mut(key.fragment()) {
                    summary.pending.push(key.field().to_owned());
                }
            }
        }
        for (key, value) in self.resolved.borrow().iter() {
            if let Some(summary) = fragments.get_mut(key.fragment()) {
                summary.resolved.push(ResolvedField {
                    name: key.field().to_owned(),
                    value: value.trim().to_owned(),
                });
            }
        }

        let mut fragments: Vec<FragmentSummary> = fragments.into_values().collect();
        fragments.sort_by(|a, b| a.name.cmp(&b.name));
        for summary in &mut fragments {
            summary.pending.sort();
            summary.pending.dedup();
            summary.resolved.sort_by(|a, b| a.name.cmp(&b.name));
        }

        FrameSummary {
            source: self.source_page.clone(),
            fragments,
        }
    }
}

impl ArgumentSource for DataFrame {
    fn argument(&self, parser: &Parser, name: &str) -> Result<Option<String>, ExpandError> {
        match name {
            "data-found" => return Ok((!self.is_empty()).then(|| "1".to_owned())),
            "data-source" => return Ok(Some(self.source_page.clone())),
            "data-sourcee" => return Ok(Some(escape_wiki_text(&self.source_page))),
            "data-fragment" => return Ok(Some(self.state.borrow().fragment.clone())),
            "data-source-fragment" => {
                let state = self.state.borrow();
                let value = if state.fragment.is_empty() {
                    self.source_page.clone()
                } else {
                    format!("{}#{}", self.source_page, state.fragment)
                };
                return Ok(Some(value));
            }
            _ => {}
        }

        let layer = self.state.borrow().overrides.clone();
        if let Some(layer) = layer {
            let value = layer.fields.borrow().get(name).cloned();
            match value {
                Some(OverrideValue::Text(text)) => return Ok(Some(text)),
                Some(OverrideValue::Raw(raw)) => {
                    let text = parser.expand(&layer.scope, &raw)?;
                    layer
                        .fields
                        .borrow_mut()
                        .insert(name.to_owned(), OverrideValue::Text(text.clone()));
                    return Ok(Some(text));
                }
                None => {}
            }
        }

        let (caller, fragment) = {
            let state = self.state.borrow();
            (
                state.caller.unwrap_or(self.parent_caller),
                state.fragment_normalized.clone(),
            )
        };
        self.resolve_field(parser, caller, &fragment, name, None)
    }
}

// ============================================================================
// Restore Guard
// ============================================================================

/// Swaps an [`ExpansionState`] in and puts the previous one back on drop.
struct RestoreGuard<'a> {
    frame: &'a DataFrame,
    saved: Option<ExpansionState>,
}

impl<'a> RestoreGuard<'a> {
    fn install(frame: &'a DataFrame, mut installed: ExpansionState) -> Self {
        let mut state = frame.state.borrow_mut();
        let caller_changed = state.caller.is_some() && state.caller != installed.caller;
        // Same caller keeps its cache; a new caller starts with a fresh one.
        installed.per_caller = if caller_changed {
            FxHashMap::default()
        } else {
            state.per_caller.clone()
        };
        let saved = std::mem::replace(&mut *state, installed);
        drop(state);
        Self {
            frame,
            saved: Some(saved),
        }
    }
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        let Some(saved) = self.saved.take() else {
            return;
        };
        let mut state = self.frame.state.borrow_mut();
        state.overrides = saved.overrides;
        state.fragment = saved.fragment;
        state.fragment_normalized = saved.fragment_normalized;
        state.title = saved.title;
        if saved.caller.is_some() {
            state.caller = saved.caller;
            state.per_caller = saved.per_caller;
        }
    }
}
