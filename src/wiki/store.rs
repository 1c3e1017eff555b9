//! Page sources.
//!
//! A store only answers "what is the text of this page". Redirects and
//! transclusion rules live in the parser.

use std::cell::RefCell;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use rustc_hash::FxHashMap;
use walkdir::WalkDir;

use super::error::StoreError;
use super::title::{Namespace, Title};

pub trait PageStore {
    /// Raw text of `title`, `None` when the page does not exist.
    fn fetch(&self, title: &Title) -> Result<Option<String>, StoreError>;
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// Pages kept in memory, keyed by prefixed title text.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pages: RefCell<FxHashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a page. Unparseable titles are ignored.
    pub fn insert(&self, title: &str, text: impl Into<String>) {
        if let Some(title) = Title::new_from_text(title, Namespace::Main) {
            self.pages
                .borrow_mut()
                .insert(title.prefixed_text(), text.into());
        }
    }

    /// Builder form of [`MemoryStore::insert`].
    pub fn with(self, title: &str, text: impl Into<String>) -> Self {
        self.insert(title, text);
        self
    }
}

impl PageStore for MemoryStore {
    fn fetch(&self, title: &Title) -> Result<Option<String>, StoreError> {
        Ok(self.pages.borrow().get(&title.prefixed_text()).cloned())
    }
}

// ============================================================================
// Filesystem Store
// ============================================================================

/// One file per page.
///
/// ```text
/// pages/
/// ├── Main_Page.wiki          Main Page
/// ├── Sword.wiki              Sword
/// └── Template/
///     └── Item_box.wiki       Template:Item box
/// ```
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
    extension: String,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path backing `title`.
    pub fn path_for(&self, title: &Title) -> PathBuf {
        let file = format!("{}.{}", title.text().replace(' ', "_"), self.extension);
        match title.namespace() {
            Namespace::Main => self.root.join(file),
            ns => self.root.join(ns.name()).join(file),
        }
    }

    /// Every page in the store, sorted by prefixed text.
    ///
    /// Files in unknown sub-directories are treated as main namespace pages
    /// named after their relative path.
    pub fn titles(&self) -> Vec<Title> {
        let mut titles: Vec<Title> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| self.title_for(entry.path()))
            .collect();
        titles.sort_by_key(Title::prefixed_text);
        titles.dedup();
        titles
    }

    /// Whether `path` stays below the store root without `..`, root or
    /// prefix components.
    fn contains(&self, path: &Path) -> bool {
        path.strip_prefix(&self.root).is_ok_and(|relative| {
            relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        })
    }

    fn title_for(&self, path: &Path) -> Option<Title> {
        if path.extension().and_then(|ext| ext.to_str()) != Some(self.extension.as_str()) {
            return None;
        }
        let relative = path.strip_prefix(&self.root).ok()?.with_extension("");
        let mut components = relative
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .collect::<Vec<_>>();

        let namespace = match components.as_slice() {
            [dir, _, ..] => Namespace::from_name(dir),
            _ => None,
        };
        if namespace.is_some() {
            components.remove(0);
        }
        let text = components.join("/");
        Title::new_from_text(&text, Namespace::Main).map(|title| match namespace {
            Some(ns) => Title::new(ns, title.text()),
            None => title,
        })
    }
}

impl PageStore for FsStore {
    fn fetch(&self, title: &Title) -> Result<Option<String>, StoreError> {
        let path = self.path_for(title);
        if !self.contains(&path) {
            return Ok(None);
        }
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::Io(path, err)),
        }
    }
}
