//! usingdata - page data inheritance for a wikitext preprocessor.
//!
//! Pages publish named fields with `{{#data:...}}`; other pages read them
//! with `{{#using:...}}`, `{{#usingarg:...}}` and `<using>`.

pub mod build;
pub mod cli;
pub mod config;
pub mod data;
pub mod engine;
pub mod logger;
pub mod wiki;
