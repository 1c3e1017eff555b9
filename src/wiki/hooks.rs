//! Extension points of the preprocessor.
//!
//! Extensions register callbacks here before a [`Parser`] is built. Hooks are
//! shared between a parser and the data parsers cloned from it, so every
//! callback is reference counted.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::error::ExpandError;
use super::frame::Frame;
use super::node::Part;
use super::parser::Parser;
use super::title::Title;

/// `{{#name:first|parts...}}`. `first` is the expanded, trimmed text after
/// the colon; `parts` are left unexpanded.
pub type FunctionHook =
    Rc<dyn Fn(&Parser, &Rc<Frame>, &str, &[Rc<Part>]) -> Result<String, ExpandError>>;

/// `<name attrs>body</name>`. The body is `None` for self-closing tags.
pub type TagHook =
    Rc<dyn Fn(&Parser, &Rc<Frame>, Option<&str>, &[(String, String)]) -> Result<String, ExpandError>>;

/// `{{NAME}}`
pub type VariableHook = Rc<dyn Fn(&Parser, &Rc<Frame>) -> Result<String, ExpandError>>;

/// Called before a page is fetched. Returning `true` skips the fetch.
pub type FetchHook = Rc<dyn Fn(&Title) -> bool>;

/// Called when a parser starts an independent parse.
pub type ClearStateHook = Rc<dyn Fn()>;

/// Built-in tag whose body is emitted verbatim.
pub const NOWIKI: &str = "nowiki";

#[derive(Default)]
pub struct Hooks {
    functions: FxHashMap<String, FunctionHook>,
    functions_no_hash: FxHashMap<String, FunctionHook>,
    tags: FxHashMap<String, TagHook>,
    variables: FxHashMap<String, VariableHook>,
    before_fetch: Vec<FetchHook>,
    clear_state: Vec<ClearStateHook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `{{#name:...}}`. Names are case-insensitive.
    pub fn set_function_hook(&mut self, name: &str, hook: FunctionHook) {
        self.functions.insert(name.to_lowercase(), hook);
    }

    /// Register `{{name:...}}` without the leading `#`.
    pub fn set_function_hook_no_hash(&mut self, name: &str, hook: FunctionHook) {
        self.functions_no_hash.insert(name.to_lowercase(), hook);
    }

    pub fn set_tag_hook(&mut self, name: &str, hook: TagHook) {
        self.tags.insert(name.to_ascii_lowercase(), hook);
    }

    /// Register `{{NAME}}`. Variable names are matched upper-case.
    pub fn set_variable_hook(&mut self, name: &str, hook: VariableHook) {
        self.variables.insert(name.to_uppercase(), hook);
    }

    pub fn on_before_fetch(&mut self, hook: FetchHook) {
        self.before_fetch.push(hook);
    }

    pub fn on_clear_state(&mut self, hook: ClearStateHook) {
        self.clear_state.push(hook);
    }

    pub fn function(&self, name: &str) -> Option<&FunctionHook> {
        self.functions.get(&name.to_lowercase())
    }

    pub fn function_no_hash(&self, name: &str) -> Option<&FunctionHook> {
        self.functions_no_hash.get(&name.to_lowercase())
    }

    pub fn tag(&self, name: &str) -> Option<&TagHook> {
        self.tags.get(name)
    }

    pub fn variable(&self, name: &str) -> Option<&VariableHook> {
        self.variables.get(name)
    }

    /// Whether any before-fetch hook asks to skip `title`.
    pub fn skip_fetch(&self, title: &Title) -> bool {
        self.before_fetch.iter().any(|hook| hook(title))
    }

    pub fn run_clear_state(&self) {
        for hook in &self.clear_state {
            hook();
        }
    }

    /// Tag names the preprocessor must recognise, sorted.
    pub fn ext_tag_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tags.keys().cloned().collect();
        if !names.iter().any(|name| name == NOWIKI) {
            names.push(NOWIKI.to_owned());
        }
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_names_are_case_insensitive() {
        let mut hooks = Hooks::new();
        hooks.set_function_hook("Using", Rc::new(|_, _, _, _| Ok(String::new())));
        hooks.set_variable_hook("selfname", Rc::new(|_, _| Ok(String::new())));

        assert!(hooks.function("USING").is_some());
        assert!(hooks.function_no_hash("using").is_none());
        assert!(hooks.variable("SELFNAME").is_some());
    }

    #[test]
    fn test_ext_tag_names_include_nowiki() {
        let mut hooks = Hooks::new();
        hooks.set_tag_hook("Using", Rc::new(|_, _, _, _| Ok(String::new())));
        assert_eq!(hooks.ext_tag_names(), vec!["nowiki", "using"]);
    }

    #[test]
    fn test_fetch_and_clear_hooks() {
        let cleared = Rc::new(Cell::new(0));
        let mut hooks = Hooks::new();
        let counter = Rc::clone(&cleared);
        hooks.on_clear_state(Rc::new(move || counter.set(counter.get() + 1)));
        hooks.on_before_fetch(Rc::new(|title| title.text() == "Blocked"));

        hooks.run_clear_state();
        assert_eq!(cleared.get(), 1);
        assert!(hooks.skip_fetch(&Title::new(crate::wiki::Namespace::Main, "Blocked")));
        assert!(!hooks.skip_fetch(&Title::new(crate::wiki::Namespace::Main, "Open")));
    }
}
