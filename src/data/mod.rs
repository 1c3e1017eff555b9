//! Page data: publishing fields with `#data` and reading them elsewhere.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                            One Parse Run                             │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                                                                      │
//! │  {{#using:Sword#Stats|Box}}                                          │
//! │        │                                                             │
//! │        ▼                                                             │
//! │  ┌───────────────┐  first reference  ┌──────────────────────────┐    │
//! │  │ FrameRegistry │ ────────────────► │ discovery: data parser   │    │
//! │  │ page → frame  │ ◄──────────────── │ preprocesses "Sword",    │    │
//! │  └───────────────┘   #data declares  │ template fetches skipped │    │
//! │        │                             └──────────────────────────┘    │
//! │        ▼                                                             │
//! │  ┌───────────────┐                                                   │
//! │  │  DataFrame    │ ── expand_on(Template:Box) ──► {{{atk}}} lookups  │
//! │  │  "Sword"      │ ── resolve_field("atk")    ──► {{#usingarg:...}}  │
//! │  └───────────────┘                                                   │
//! │                                                                      │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The registry is cleared whenever a top-level parse starts, so data never
//! leaks from one page render into the next.

mod fragment;
mod frame;
mod hooks;
mod registry;
mod types;

pub use fragment::{FieldKey, Normalize, NormalizedFragment, normalize_fragment};
pub use frame::{DataFrame, OverrideValue, Overrides, TemplateBody};
pub use hooks::{UsingData, ancestor_name, fetch_template};
pub use registry::FrameRegistry;
pub use types::{FragmentSummary, FrameSummary, ResolvedField};
