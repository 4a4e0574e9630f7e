//! Top-level error taxonomy.
//!
//! Four kinds of failure can end a compile, per the error handling design:
//! a malformed-input [`Error::Syntax`] (reported with a [`Context`]), a
//! well-formed-but-meaningless-grammar [`Error::Grammar`], an
//! assertion-class [`Error::Internal`] (the generator itself is buggy),
//! and an [`Error::Unsupported`] grammar feature. There is no recovery;
//! every stage aborts the whole compile on its first error.

use std::fmt::{self, Display};

use crate::context::MaybeContext;
use crate::frontend::lexer::SyntaxError;

/// The single error type threaded through every compile stage.
#[derive(Debug)]
pub enum Error {
    /// Malformed SGL token or production.
    Syntax(SyntaxError),
    /// A well-formed grammar that cannot be compiled: left recursion, a
    /// missing rule, an arity mismatch, or similar.
    Grammar(GrammarError),
    /// An invariant the normalizer/analyzer/emitter rely on was violated.
    /// Indicates a bug in this generator, not in the input grammar.
    Internal(InternalError),
    /// The grammar uses a feature this generator does not implement.
    Unsupported(String),
}

/// Result alias used by every compile stage that cannot attach a source
/// location to its errors (everything past the frontend).
pub type Result<T> = core::result::Result<T, Error>;

/// Result alias for the top-level pipeline, which may surface either a
/// located frontend error or a contextless grammar/internal/unsupported
/// error.
pub type PipelineResult<T> = core::result::Result<T, MaybeContext<Error>>;

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Syntax(e) => write!(f, "syntax error: {e}"),
            Error::Grammar(e) => write!(f, "grammar error: {e}"),
            Error::Internal(e) => write!(f, "internal error (this is a bug): {e}"),
            Error::Unsupported(feature) => write!(f, "unsupported feature: {feature}"),
        }
    }
}

impl From<SyntaxError> for Error {
    fn from(value: SyntaxError) -> Self {
        Error::Syntax(value)
    }
}

impl From<GrammarError> for Error {
    fn from(value: GrammarError) -> Self {
        Error::Grammar(value)
    }
}

impl From<InternalError> for Error {
    fn from(value: InternalError) -> Self {
        Error::Internal(value)
    }
}

/// Errors that mean the grammar, though syntactically valid SGL, cannot
/// be compiled.
#[derive(Debug)]
pub enum GrammarError {
    /// A nonterminal was found to derive itself with no intervening
    /// terminal: `A => A alpha` for some `alpha`.
    LeftRecursion {
        /// The nonterminal at which the recursion was detected.
        symbol: String,
        /// The chain of nonterminals entered before the cycle closed.
        chain: Vec<String>,
    },
    /// A production referenced a nonterminal with no rule (and no
    /// passive variant of a ruled nonterminal).
    MissingRule(String),
    /// A parameterized rule was applied with the wrong number of
    /// arguments.
    ArityMismatch {
        /// The rule name.
        name: String,
        /// The number of parameters the rule declares.
        expected: usize,
        /// The number of arguments supplied at the call site.
        found: usize,
    },
    /// An argument list was applied to a terminal reference, which
    /// cannot be parameterized.
    ArgsAppliedToTerminal(String),
    /// No parameterized rule matched a given name/argument combination.
    NoMatchingRule {
        /// The rule name that was requested.
        name: String,
        /// The number of arguments supplied.
        arity: usize,
    },
    /// A `U_IDENT` variable resolved to something that can't be
    /// interpolated into a string (e.g. a parameterized nonterminal).
    BadInterpolation(String),
}

impl Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarError::LeftRecursion { symbol, chain } => {
                write!(
                    f,
                    "left recursion detected on {symbol}: {}",
                    chain.join(", ")
                )
            }
            GrammarError::MissingRule(name) => write!(f, "no rule found for `{name}`"),
            GrammarError::ArityMismatch {
                name,
                expected,
                found,
            } => write!(
                f,
                "rule `{name}` expects {expected} argument(s), found {found}"
            ),
            GrammarError::ArgsAppliedToTerminal(name) => {
                write!(f, "tried to apply arguments to terminal `{name}`")
            }
            GrammarError::NoMatchingRule { name, arity } => {
                write!(f, "no matching rule found for `{name}` with {arity} argument(s)")
            }
            GrammarError::BadInterpolation(msg) => write!(f, "{msg}"),
        }
    }
}

/// Assertion-class failures: these indicate a bug in the generator, not
/// in the input grammar, because the invariants normalization and
/// analysis maintain should make them impossible.
#[derive(Debug)]
pub enum InternalError {
    /// A branch arm was constructed with an empty production and an
    /// empty follow check, which should be unreachable if invariants
    /// hold.
    EmptyProductionAndFollow(String),
    /// The emitter tried to enqueue the same context name twice with
    /// disagreeing arguments.
    NameCollision(String),
    /// The emitted context map could not be rendered to YAML.
    Serialization(String),
}

impl Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InternalError::EmptyProductionAndFollow(name) => write!(
                f,
                "branch arm for `{name}` has both an empty production and an empty follow set"
            ),
            InternalError::NameCollision(name) => {
                write!(f, "context name `{name}` was enqueued twice with conflicting arguments")
            }
            InternalError::Serialization(msg) => write!(f, "serialization failed: {msg}"),
        }
    }
}
