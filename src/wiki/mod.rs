//! A small wikitext preprocessor.
//!
//! Covers the part of wikitext that matters for data transclusion:
//! templates, arguments, parser functions, variables and extension tags.
//! Links, formatting and HTML rendering are left untouched.
//!
//! ```text
//! text ──preprocess──▶ Nodes ──Parser::expand(frame)──▶ text
//!                                  │
//!                                  ├── Hooks (functions, tags, variables)
//!                                  └── PageStore (template text)
//! ```

pub mod error;
pub mod frame;
pub mod hooks;
pub mod node;
pub mod parser;
pub mod preprocess;
pub mod store;
pub mod title;

pub use error::{ExpandError, StoreError};
pub use frame::{ArgumentSource, CallerToken, Frame};
pub use hooks::Hooks;
pub use node::{Node, Nodes, Part};
pub use parser::{Parser, ParserOptions};
pub use store::{FsStore, MemoryStore, PageStore};
pub use title::{Namespace, Title};
