//! `sbnfc`: compiles a compact grammar-description language (SGL) into a
//! declarative `.sublime-syntax` stack-based pattern machine.
//!
//! The pipeline runs in four stages: [`frontend`] lexes and parses SGL
//! source into a raw, EBNF-sugared grammar; [`grammar::normalize`]
//! reduces that to pure BNF; [`grammar::analyze`] computes FIRST/FOLLOW
//! sets and per-production lookahead tables; [`grammar::emit`] uses
//! those tables to synthesize sublime-syntax contexts, which
//! [`serialize`] renders to YAML.

pub mod context;
pub mod error;
pub mod frontend;
pub mod grammar;
pub mod serialize;
