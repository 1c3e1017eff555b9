//! Parser hooks publishing and consuming page data.
//!
//! | Syntax                                              | Handler          |
//! |-----------------------------------------------------|------------------|
//! | `{{#data:Template#frag\|name=value...}}`            | [`UsingData::data`]      |
//! | `{{#using:Page#frag\|Template\|Default\|name=value}}` | [`UsingData::using`]     |
//! | `{{#usingarg:Page#frag\|Field\|Default}}`           | [`UsingData::using_arg`] |
//! | `<using page="Page#frag" default="...">...</using>` | [`UsingData::using_tag`] |
//! | `{{SELFNAME}}`, `{{PARENTNAME}}`, `{{ANCESTORNAME:n}}` | [`ancestor_name`]     |

use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::fragment::normalize_fragment;
use super::frame::{DataFrame, OverrideValue, Overrides, TemplateBody};
use super::registry::FrameRegistry;
use crate::wiki::title::{decode_source, escape_wiki_text};
use crate::wiki::{ExpandError, Frame, Hooks, Namespace, Nodes, Parser, Part, Title};

/// Arguments shared by `#using` and `#usingarg`.
struct UsingCall {
    frame: Rc<DataFrame>,
    fragment: String,
    overrides: Overrides,
    /// First positional part, expanded.
    first: Option<String>,
    /// Second positional part, left raw.
    second: Option<Nodes>,
}

pub struct UsingData {
    registry: Rc<FrameRegistry>,
}

impl UsingData {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            registry: Rc::new(FrameRegistry::new()),
        })
    }

    pub fn registry(&self) -> &FrameRegistry {
        &self.registry
    }

    /// Install every data hook into `hooks`.
    pub fn register(self: &Rc<Self>, hooks: &mut Hooks) {
        let this = Rc::clone(self);
        hooks.set_function_hook(
            "using",
            Rc::new(move |parser, frame, first, parts| this.using(parser, frame, first, parts)),
        );
        let this = Rc::clone(self);
        hooks.set_function_hook(
            "usingarg",
            Rc::new(move |parser, frame, first, parts| this.using_arg(parser, frame, first, parts)),
        );
        let this = Rc::clone(self);
        hooks.set_function_hook(
            "data",
            Rc::new(move |parser, frame, first, parts| this.data(parser, frame, first, parts)),
        );
        hooks.set_function_hook_no_hash(
            "ancestorname",
            Rc::new(|_, frame, first, _| Ok(ancestor_name(frame, ancestor_depth(first)))),
        );

        let this = Rc::clone(self);
        hooks.set_tag_hook(
            "using",
            Rc::new(move |parser, frame, body, attrs| this.using_tag(parser, frame, body, attrs)),
        );

        hooks.set_variable_hook("SELFNAME", Rc::new(|_, frame| Ok(ancestor_name(frame, 0))));
        hooks.set_variable_hook("PARENTNAME", Rc::new(|_, frame| Ok(ancestor_name(frame, 1))));
        hooks.set_variable_hook("ANCESTORNAME", Rc::new(|_, frame| Ok(ancestor_name(frame, 1))));

        let registry = Rc::clone(&self.registry);
        hooks.on_before_fetch(Rc::new(move |_| registry.is_discovering()));
        let registry = Rc::clone(&self.registry);
        hooks.on_clear_state(Rc::new(move || registry.clear()));
    }

    /// Parse the page reference and positional parts common to `#using`
    /// and `#usingarg`. `None` while discovering.
    fn parse_using_commons(
        &self,
        parser: &Parser,
        frame: &Rc<Frame>,
        target: &str,
        parts: &[Rc<Part>],
    ) -> Result<Option<UsingCall>, ExpandError> {
        if self.registry.is_discovering() {
            return Ok(None);
        }

        let target = decode_source(target.trim());
        let title = Title::new_from_text(&target, Namespace::Main);
        let source_page = title.as_ref().map(Title::prefixed_text).unwrap_or_default();
        let fragment = title
            .as_ref()
            .map(|title| title.fragment().to_owned())
            .unwrap_or_default();

        let mut first = None;
        let mut second = None;
        let mut overrides = Overrides::default();
        for part in parts {
            match (&part.name, part.index) {
                (Some(name), _) => {
                    let name = parser.expand(frame, name)?;
                    overrides.insert(name.trim().to_owned(), OverrideValue::Raw(part.value.clone()));
                }
                (None, Some(1)) => first = Some(parser.expand(frame, &part.value)?),
                (None, Some(2)) => second = Some(part.value.clone()),
                _ => {}
            }
        }

        let data_frame = self
            .registry
            .get_or_create(parser, &source_page, title.as_ref(), frame)?;
        Ok(Some(UsingCall {
            frame: data_frame,
            fragment,
            overrides,
            first,
            second,
        }))
    }

    /// `{{#using:Page#frag|Template|Default|name=value...}}`
    ///
    /// Expands `Template` with the data of `Page#frag` as its arguments and
    /// the named parts layered on top. `Default` replaces the whole output
    /// when the fragment was never declared.
    pub fn using(
        &self,
        parser: &Parser,
        frame: &Rc<Frame>,
        target: &str,
        parts: &[Rc<Part>],
    ) -> Result<String, ExpandError> {
        let Some(call) = self.parse_using_commons(parser, frame, target, parts)? else {
            return Ok(String::new());
        };

        if !call.frame.has_fragment(&call.fragment)
            && let Some(default) = &call.second
        {
            return parser.expand(frame, default);
        }

        let (body, title) = match call.first.as_deref() {
            None | Some("") => (TemplateBody::Empty, None),
            Some(name) => match Title::new_from_text(name, Namespace::Template) {
                Some(title) => fetch_template(parser, &title)?,
                None => (TemplateBody::Literal(format!("[[:{name}]]")), None),
            },
        };
        call.frame
            .expand_on(parser, frame, title, body, call.overrides, &call.fragment)
    }

    /// `{{#usingarg:Page#frag|Field|Default}}`
    ///
    /// A missing field yields `Default`, or empty text when no default was
    /// given.
    pub fn using_arg(
        &self,
        parser: &Parser,
        frame: &Rc<Frame>,
        target: &str,
        parts: &[Rc<Part>],
    ) -> Result<String, ExpandError> {
        let Some(call) = self.parse_using_commons(parser, frame, target, parts)? else {
            return Ok(String::new());
        };

        let field = call.first.unwrap_or_default();
        let found = call.frame.resolve_field(
            parser,
            parser.token(),
            &normalize_fragment(&call.fragment),
            &field,
            None,
        )?;
        match (found, call.second) {
            (Some(value), _) => Ok(value),
            (None, Some(default)) => parser.expand(frame, &default),
            (None, None) => Ok(String::new()),
        }
    }

    /// `<using page="Page#frag" default="...">body</using>`
    ///
    /// Other attributes override fields for the body. The body is expanded
    /// as wikitext in the calling page's context.
    pub fn using_tag(
        &self,
        parser: &Parser,
        frame: &Rc<Frame>,
        body: Option<&str>,
        attrs: &[(String, String)],
    ) -> Result<String, ExpandError> {
        if self.registry.is_discovering() {
            return Ok(String::new());
        }

        let attr = |key: &str| attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());
        let source = match attr("page") {
            Some(page) => decode_source(&parser.replace_variables(page, frame)?),
            None => String::new(),
        };

        if let Some(title) = Title::new_from_text(&source, Namespace::Main) {
            let data_frame =
                self.registry
                    .get_or_create(parser, &title.prefixed_text(), Some(&title), frame)?;
            if data_frame.has_fragment(title.fragment()) {
                let mut overrides = Overrides::default();
                for (key, value) in attrs {
                    if key == "page" || key == "default" {
                        continue;
                    }
                    let value = parser.replace_variables(value, frame)?;
                    overrides.insert(key.clone(), OverrideValue::Text(value));
                }
                let body = match body {
                    Some(text) => TemplateBody::Wikitext(text.to_owned()),
                    None => TemplateBody::Empty,
                };
                return data_frame.expand_on(
                    parser,
                    frame,
                    frame.title().cloned(),
                    body,
                    overrides,
                    title.fragment(),
                );
            }
        }

        match attr("default") {
            Some(default) => parser.replace_variables(default, frame),
            None => Ok(String::new()),
        }
    }

    /// `{{#data:Template#frag|name=value...}}`
    ///
    /// On a page rendered directly, or while discovering, the named parts
    /// are declared as data of the current page under `frag`. Outside
    /// discovery the template is then transcluded with the same parts and
    /// `data-*` arguments describing the declaration.
    pub fn data(
        &self,
        parser: &Parser,
        frame: &Rc<Frame>,
        target: &str,
        parts: &[Rc<Part>],
    ) -> Result<String, ExpandError> {
        let target = decode_source(target.trim());
        let host_page = frame.title().map(Title::prefixed_text).unwrap_or_default();
        let template = Title::new_from_text(&target, Namespace::Template);
        let fragment = match &template {
            Some(title) => title.fragment().to_owned(),
            None => target.strip_prefix('#').unwrap_or_default().to_owned(),
        };

        let discovering = self.registry.is_discovering();
        if frame.depth() == 0 || discovering {
            self.registry
                .get_or_insert(&host_page, frame)
                .add_declarations(parser, frame, parts, &fragment)?;
            if discovering {
                return Ok(String::new());
            }
        }

        let Some(template) = template else {
            return Ok(String::new());
        };
        let (body, title) = fetch_template(parser, &template)?;

        let source_fragment = if fragment.is_empty() {
            host_page.clone()
        } else {
            format!("{host_page}#{fragment}")
        };
        let found = if frame.depth() == 0 { "3" } else { "2" };
        let fixed = FxHashMap::from_iter([
            ("data-found".to_owned(), found.to_owned()),
            ("data-source".to_owned(), host_page.clone()),
            ("data-sourcee".to_owned(), escape_wiki_text(&host_page)),
            ("data-fragment".to_owned(), fragment),
            ("data-source-fragment".to_owned(), source_fragment),
        ]);
        let child = frame.new_child(parser, parts.to_vec(), title, fixed);

        match body {
            TemplateBody::Empty => Ok(String::new()),
            TemplateBody::Tree(nodes) => parser.expand(&child, &nodes),
            TemplateBody::Literal(text) => Ok(text),
            TemplateBody::Wikitext(text) => parser.replace_variables(&text, &child),
        }
    }
}

/// Load `title` for use as a template body.
///
/// Special and non-includable namespaces, as well as missing pages, yield a
/// link to the page instead.
pub fn fetch_template(
    parser: &Parser,
    title: &Title,
) -> Result<(TemplateBody, Option<Title>), ExpandError> {
    let title = title.without_fragment();
    if !parser.is_includable(title.namespace()) {
        let link = format!("[[:{}]]", title.prefixed_text());
        return Ok((TemplateBody::Literal(link), Some(title)));
    }

    let (tree, title) = parser.template_tree(&title)?;
    let body = match tree {
        Some(nodes) => TemplateBody::Tree(nodes),
        None => TemplateBody::Literal(format!("[[:{}]]", title.prefixed_text())),
    };
    Ok((body, Some(title)))
}

/// Escaped title of the frame `depth` levels above `frame`, empty when
/// there is none.
pub fn ancestor_name(frame: &Rc<Frame>, depth: usize) -> String {
    frame
        .ancestor(depth)
        .and_then(|ancestor| ancestor.title().map(Title::prefixed_text))
        .map(|name| escape_wiki_text(&name))
        .unwrap_or_default()
}

/// Depth argument of `{{ANCESTORNAME:n}}`: numeric values are truncated and
/// floored at 0, anything else means 1.
fn ancestor_depth(arg: &str) -> usize {
    match arg.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => n.max(0.0) as usize,
        _ => 1,
    }
}
