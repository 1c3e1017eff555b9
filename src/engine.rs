//! Wiring of store, hooks and parser into one renderer.
//!
//! ```text
//! Engine::new(store, options)
//!     │
//!     ├── UsingData::register(&mut hooks)   #data, #using, <using>, SELFNAME...
//!     └── Parser::new(store, hooks, options)
//!
//! render_page("Sword") ── fetch ──► parse ──► expanded wikitext
//! query("Sword#Stats", "atk") ── registry ──► resolved field
//! ```

use std::rc::Rc;

use anyhow::{Context, Result, anyhow};

use crate::config::WikiConfig;
use crate::data::{FrameSummary, UsingData, normalize_fragment};
use crate::log;
use crate::wiki::{FsStore, Hooks, Namespace, PageStore, Parser, ParserOptions, Title};

pub struct Engine {
    store: Rc<dyn PageStore>,
    data: Rc<UsingData>,
    parser: Parser,
}

impl Engine {
    pub fn new(store: Rc<dyn PageStore>, options: ParserOptions) -> Self {
        let data = UsingData::new();
        let mut hooks = Hooks::new();
        data.register(&mut hooks);
        let parser = Parser::new(Rc::clone(&store), Rc::new(hooks), options);
        Self {
            store,
            data,
            parser,
        }
    }

    /// Engine over the page directory of `config`.
    pub fn from_config(config: &WikiConfig) -> Result<Self> {
        let store = FsStore::new(config.pages_dir(), config.wiki.extension.clone());
        Ok(Self::new(Rc::new(store), config.parser_options()?))
    }

    pub const fn parser(&self) -> &Parser {
        &self.parser
    }

    pub fn data(&self) -> &UsingData {
        &self.data
    }

    /// Render the stored text of `page`.
    pub fn render_page(&self, page: &str) -> Result<String> {
        let title = parse_title(page)?;
        let text = self
            .store
            .fetch(&title)?
            .ok_or_else(|| anyhow!("page `{}` not found", title.prefixed_text()))?;
        self.render_text(&text, Some(title))
    }

    /// Render `text` as if it were the page `title`.
    pub fn render_text(&self, text: &str, title: Option<Title>) -> Result<String> {
        let name = title.as_ref().map(Title::prefixed_text).unwrap_or_default();
        log!("render"; "{}", name);
        self.parser
            .parse(text, title)
            .with_context(|| format!("failed to render `{name}`"))
    }

    /// Value of `field` published by `target` ("Page" or "Page#Fragment").
    ///
    /// `None` when the field is not declared and no default was given.
    pub fn query(&self, target: &str, field: &str, default: Option<&str>) -> Result<Option<String>> {
        let title = parse_title(target)?;
        let root = self.parser.start(None);
        let frame = self.data.registry().get_or_create(
            &self.parser,
            &title.prefixed_text(),
            Some(&title),
            &root,
        )?;
        let value = frame.resolve_field(
            &self.parser,
            self.parser.token(),
            &normalize_fragment(title.fragment()),
            field,
            default,
        )?;
        Ok(value)
    }

    /// Fragments and fields `page` publishes.
    pub fn inspect(&self, page: &str) -> Result<FrameSummary> {
        let title = parse_title(page)?;
        let name = title.prefixed_text();
        let root = self.parser.start(None);
        self.data
            .registry()
            .get_or_create(&self.parser, &name, Some(&title), &root)?;
        self.data
            .registry()
            .summary(&name)
            .ok_or_else(|| anyhow!("no data frame for `{name}`"))
    }
}

fn parse_title(text: &str) -> Result<Title> {
    Title::new_from_text(text, Namespace::Main).ok_or_else(|| anyhow!("invalid page name `{text}`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiki::MemoryStore;

    fn engine(store: MemoryStore) -> Engine {
        Engine::new(Rc::new(store), ParserOptions::default())
    }

    fn render(engine: &Engine, text: &str) -> String {
        engine
            .render_text(text, Title::new_from_text("Reader", Namespace::Main))
            .unwrap()
    }

    #[test]
    fn test_usingarg_reads_declared_field() {
        let engine = engine(MemoryStore::new().with("A", "{{#data:|x=5}}"));
        assert_eq!(render(&engine, "{{#usingarg:A|x}}"), "5");
        assert_eq!(render(&engine, "{{#usingarg:A|y|none}}"), "none");
        assert_eq!(render(&engine, "[{{#usingarg:A|y}}]"), "[]");
    }

    #[test]
    fn test_earliest_declaration_wins() {
        let engine = engine(MemoryStore::new().with("A", "{{#data:|x=9}}{{#data:|x=5}}"));
        assert_eq!(render(&engine, "{{#usingarg:A|x}}"), "9");
    }

    #[test]
    fn test_using_binds_template() {
        let store = MemoryStore::new()
            .with("Sword", "{{#data:#Stats|atk= 12 |name=Blade}}")
            .with("Template:Card", "{{{name}}}: {{{atk}}} ({{{def|?}}})");
        let engine = engine(store);

        assert_eq!(render(&engine, "{{#using:Sword#Stats|Card}}"), "Blade: 12 (?)");
        assert_eq!(
            render(&engine, "{{#using:Sword#Stats|Card|atk=99}}"),
            "Blade: 99 (?)"
        );
    }

    #[test]
    fn test_override_visible_only_during_expansion() {
        let store = MemoryStore::new()
            .with("A", "{{#data:#f|x=5}}")
            .with("Template:T", "{{{x}}}");
        let engine = engine(store);

        assert_eq!(
            render(&engine, "{{#using:A#f|T|x=9}},{{#usingarg:A#f|x}}"),
            "9,5"
        );
    }

    #[test]
    fn test_nested_using_on_same_page() {
        let store = MemoryStore::new()
            .with("A", "{{#data:|x=outer}}{{#data:#g|x=g}}")
            .with(
                "Template:Outer",
                "{{{x}}}/{{#using:A#g|Inner|x=ov}}/{{{x}}}/{{{data-fragment}}}",
            )
            .with("Template:Inner", "{{{x}}}:{{{data-fragment}}}");
        let engine = engine(store);

        assert_eq!(render(&engine, "{{#using:A|Outer}}"), "outer/ov:g/outer/");
    }

    #[test]
    fn test_using_unknown_fragment_default() {
        let store = MemoryStore::new()
            .with("Sword", "{{#data:#Stats|atk=12}}")
            .with("Template:Card", "card");
        let engine = engine(store);

        assert_eq!(render(&engine, "{{#using:Sword#Other|Card|missing}}"), "missing");
        assert_eq!(render(&engine, "{{#using:Sword#Stats|Card|missing}}"), "card");
    }

    #[test]
    fn test_using_tag() {
        let store = MemoryStore::new().with("Sword", "{{#data:|atk=12}}");
        let engine = engine(store);

        assert_eq!(
            render(&engine, r#"<using page="Sword">atk={{{atk}}}</using>"#),
            "atk=12"
        );
        assert_eq!(
            render(&engine, r#"<using page="Sword" atk="1">atk={{{atk}}}</using>"#),
            "atk=1"
        );
    }

    #[test]
    fn test_transitive_discovery_through_redirect() {
        let store = MemoryStore::new()
            .with("C", "#REDIRECT [[D]]")
            .with("D", "{{#data:|x=7}}");
        let engine = engine(store);

        assert_eq!(render(&engine, "{{#usingarg:C|x}}"), "7");
        assert_eq!(engine.query("D", "x", None).unwrap().as_deref(), Some("7"));
    }

    #[test]
    fn test_selfname_and_parentname() {
        let store = MemoryStore::new()
            .with("Sword", "{{#data:|atk=1}}")
            .with("Template:Who", "{{SELFNAME}}/{{PARENTNAME}}");
        let engine = engine(store);

        assert_eq!(render(&engine, "{{#using:Sword|Who}}"), "Template:Who/Reader");
    }

    #[test]
    fn test_data_transcludes_on_own_page() {
        let store = MemoryStore::new()
            .with("Template:Infobox", "{{{data-found}}}:{{{data-source}}}:{{{hp}}}");
        let engine = engine(store);

        assert_eq!(render(&engine, "{{#data:Infobox|hp=3}}"), "3:Reader:3");
    }

    #[test]
    fn test_query_and_inspect() {
        let store = MemoryStore::new().with("Sword", "{{#data:#Stats|atk=12|def=3}}");
        let engine = engine(store);

        assert_eq!(
            engine.query("Sword#stats", "atk", None).unwrap().as_deref(),
            Some("12")
        );
        assert_eq!(
            engine.query("Sword", "atk", Some("0")).unwrap().as_deref(),
            Some("0")
        );
        assert_eq!(engine.query("Sword", "atk", None).unwrap(), None);

        let summary = engine.inspect("Sword").unwrap();
        assert_eq!(summary.source, "Sword");
        assert_eq!(summary.fragments[0].pending, vec!["atk", "def"]);
    }

    #[test]
    fn test_ancestorname_huge_depth() {
        let engine = engine(MemoryStore::new());
        assert_eq!(render(&engine, "[{{ANCESTORNAME:1e18}}]"), "[]");
        assert_eq!(render(&engine, "[{{ANCESTORNAME:0}}]"), "[Reader]");
    }

    #[test]
    fn test_pages_outside_store_unreachable() {
        let dir = tempfile::TempDir::new().unwrap();
        let pages = dir.path().join("pages");
        std::fs::create_dir_all(&pages).unwrap();
        std::fs::write(dir.path().join("secret.wiki"), "TOP SECRET {{#data:|x=1}}").unwrap();
        let engine = Engine::new(Rc::new(FsStore::new(&pages, "wiki")), ParserOptions::default());

        for text in [
            "{{:../secret}}",
            "{{#usingarg:../secret|x}}",
            r#"<using page="../secret">{{{x}}}</using>"#,
        ] {
            let out = render(&engine, text);
            assert!(!out.contains("TOP SECRET") && !out.contains('1'), "{text}: {out}");
        }
    }

    #[test]
    fn test_render_page_missing() {
        let engine = engine(MemoryStore::new());
        let err = engine.render_page("Nowhere").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_renders_are_independent() {
        let store = MemoryStore::new().with("A", "{{#data:|x=5}}");
        store.insert("B", "{{#usingarg:A|x}}");
        let engine = engine(store);

        assert_eq!(engine.render_page("B").unwrap(), "5");
        assert_eq!(engine.render_page("B").unwrap(), "5");
    }
}
