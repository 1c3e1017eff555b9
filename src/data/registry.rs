//! Per-run registry of data frames.
//!
//! The registry maps page names to their [`DataFrame`] and carries the
//! discovery flag. Both are reset when a top-level parse starts.
//!
//! # Discovery
//!
//! ```text
//! get_or_create("Sword")
//!   ├── frame exists            → return it
//!   ├── current page / no page  → empty frame, nothing fetched
//!   └── fetch "Sword" (one redirect followed)
//!         ├── canonical name differs → alias it to the same frame
//!         └── text found → data parser preprocesses it with
//!                          discovery on: template fetches are skipped and
//!                          every {{#data:...}} lands in the registry
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::frame::DataFrame;
use super::types::FrameSummary;
use crate::log;
use crate::wiki::{ExpandError, Frame, Parser, Title};

#[derive(Default)]
pub struct FrameRegistry {
    frames: RefCell<FxHashMap<String, Rc<DataFrame>>>,
    discovering: Cell<bool>,
}

/// Sets the discovery flag for its lifetime.
struct DiscoveryGuard<'a>(&'a Cell<bool>);

impl<'a> DiscoveryGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for DiscoveryGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl FrameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every frame and leave discovery mode.
    pub fn clear(&self) {
        self.frames.borrow_mut().clear();
        self.discovering.set(false);
    }

    pub fn is_discovering(&self) -> bool {
        self.discovering.get()
    }

    pub fn get(&self, page: &str) -> Option<Rc<DataFrame>> {
        self.frames.borrow().get(page).cloned()
    }

    /// The frame of `page`, created empty in `scope` if missing. Never fetches.
    pub fn get_or_insert(&self, page: &str, scope: &Rc<Frame>) -> Rc<DataFrame> {
        let mut frames = self.frames.borrow_mut();
        let frame = frames
            .entry(page.to_owned())
            .or_insert_with(|| DataFrame::new(scope, page));
        Rc::clone(frame)
    }

    /// The frame of `page`, discovering its data on first reference.
    ///
    /// `page` is the canonical name of `title`, empty when the title was
    /// invalid.
    pub fn get_or_create(
        &self,
        parser: &Parser,
        page: &str,
        title: Option<&Title>,
        scope: &Rc<Frame>,
    ) -> Result<Rc<DataFrame>, ExpandError> {
        if let Some(frame) = self.get(page) {
            return Ok(frame);
        }
        let frame = self.get_or_insert(page, scope);

        let is_current = parser
            .page()
            .is_some_and(|current| current.prefixed_text() == page);
        let Some(title) = title else {
            return Ok(frame);
        };
        if page.is_empty() || (is_current && !parser.options().section_preview) {
            return Ok(frame);
        }

        let (text, canonical) = parser.fetch_template_and_title(&title.without_fragment())?;
        let canonical_page = canonical.prefixed_text();
        if canonical_page != page {
            log!("data"; "{} resolves to {}", page, canonical_page);
            self.frames
                .borrow_mut()
                .insert(canonical_page, Rc::clone(&frame));
        }

        if let Some(text) = text.filter(|text| !text.is_empty()) {
            self.discover(parser, &text, canonical)?;
        }
        Ok(frame)
    }

    /// Preprocess `text` as the page `title` to collect its declarations.
    ///
    /// Runs on a data parser, so clear-state hooks stay silent; its node
    /// count is charged to `parser`.
    pub fn discover(&self, parser: &Parser, text: &str, title: Title) -> Result<(), ExpandError> {
        log!("data"; "discovering {}", title.prefixed_text());
        let sub = parser.data_parser();
        let outcome = {
            let _discovery = DiscoveryGuard::enter(&self.discovering);
            sub.preprocess(text, Some(title))
        };
        parser.add_node_count(sub.node_count())?;
        outcome.map(|_| ())
    }

    /// Summary of the frame registered for `page`.
    pub fn summary(&self, page: &str) -> Option<FrameSummary> {
        self.get(page).map(|frame| frame.summary())
    }

    /// Names under which frames are registered, sorted.
    pub fn pages(&self) -> Vec<String> {
        let mut pages: Vec<String> = self.frames.borrow().keys().cloned().collect();
        pages.sort();
        pages
    }
}
