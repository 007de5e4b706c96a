//! Key-less web research: one `research(topic)` call expands the topic into
//! search queries, seeds a crawl from public search-result HTML (no API
//! keys), politely crawls a budgeted subset of pages, and returns readable
//! text fragments with any embedded code samples.
//!
//! Re-exports `webforage-core` (types, traits, errors) and exposes
//! `webforage-local` as [`local`], so downstream users need only this one
//! dependency.

pub use webforage_core::*;
pub use webforage_local as local;

pub mod cache;
pub mod compose;
pub mod config;
pub mod dictionary;
pub mod research;

pub use config::EngineConfig;
pub use dictionary::{DictionaryClient, DictionaryHit};
pub use research::ResearchEngine;
