//! The serializer: renders the emitter's context map as `.sublime-syntax`
//! YAML.
//!
//! Grounded on `sublime_generator.py::SublimeSyntax.dump`'s field set and
//! sparse-dict shape: optional fields are omitted rather than written as
//! `null`, and `contexts`/`captures` use ordered maps so the rendered
//! file is stable across runs.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{InternalError, Result};

/// A single entry within a context's rule list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Action {
    /// Splices another context's rules in at this point.
    Include {
        include: String,
    },
    /// Scopes the whole matched region of the context that pushed/set
    /// into this one.
    MetaScope {
        meta_scope: String,
    },
    /// Suppresses the implicit inclusion of the `prototype` context.
    MetaIncludePrototype {
        meta_include_prototype: bool,
    },
    /// An ordinary match rule.
    Match(MatchAction),
}

/// How many stack frames a match rule pops, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Pop {
    /// `pop: true`, equivalent to `pop: 1`.
    One(bool),
    /// `pop: N`.
    Many(u32),
}

/// One `match:` rule: a regex, the scope(s) it applies, and what
/// happens to the context stack when it fires.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchAction {
    #[serde(rename = "match")]
    pub pattern: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub captures: BTreeMap<u32, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pop: Option<Pop>,
    /// Names this rule as the entry point of a set of ordered,
    /// backtracking alternatives; paired with `branch`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_point: Option<String>,
    /// The ordered list of contexts to try, first match wins, for the
    /// `branch_point` this rule opens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<Vec<String>>,
    /// Reverts to the next untried arm of the named `branch_point`,
    /// undoing any input consumed since it was entered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with_prototype: Option<Vec<Action>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed_scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escape: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub escape_captures: BTreeMap<u32, String>,
}

impl MatchAction {
    /// A bare match rule with no scope, captures, or stack effect yet.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Default::default()
        }
    }
}

/// The header fields the frontend extracts from a grammar's options
/// block, independent of any rule body.
#[derive(Debug, Clone, Default)]
pub struct Header {
    pub name: String,
    pub scope: String,
    pub file_extensions: Vec<String>,
    pub first_line_match: Option<String>,
    pub hidden: bool,
}

/// The top-level `.sublime-syntax` document shape.
#[derive(Debug, Clone, Serialize)]
pub struct SyntaxFile {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub file_extensions: Vec<String>,
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_line_match: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub hidden: bool,
    pub contexts: BTreeMap<String, Vec<Action>>,
    pub version: u32,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Render a completed context map to `.sublime-syntax` YAML.
pub fn dump(header: &Header, contexts: BTreeMap<String, Vec<Action>>) -> Result<String> {
    let file = SyntaxFile {
        name: header.name.clone(),
        file_extensions: header.file_extensions.clone(),
        scope: header.scope.clone(),
        first_line_match: header.first_line_match.clone(),
        hidden: header.hidden,
        contexts,
        version: 2,
    };
    serde_yaml::to_string(&file)
        .map_err(|e| InternalError::Serialization(e.to_string()).into())
}
