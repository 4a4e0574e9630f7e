//! The grammar core: data model, normalizer, analyzer, and emitter.
//!
//! A compile flows `RawGrammar` (from the frontend) -> [`normalize`] ->
//! `Grammar` -> [`analyze`] -> lookahead tables -> [`emit`] -> a context
//! map, which `serialize` then renders.

pub mod analyze;
pub mod emit;
pub mod normalize;
pub mod types;

pub use analyze::analyze;
pub use emit::emit;
pub use normalize::normalize;
