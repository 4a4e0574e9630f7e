//! Locational context for diagnostics.
//!
//! Wraps an inner error/warning kind with the file, line, and column at
//! which it occurred so the CLI can print a caret-pointing diagnostic.

use std::fmt::Display;

use colored::Colorize;

/// Gives locational context to the inner error/warning type.
#[derive(Debug, Clone)]
pub struct Context<T: Display> {
    /// The kind of error or warning that occurred.
    kind: T,
    /// The contents of the line on which it occurred.
    line: String,
    /// The zero-indexed line number on which it occurred.
    line_num: usize,
    /// The zero-indexed column at which it occurred.
    line_index: usize,
    /// The name of the file in which it occurred.
    file_name: String,
}

impl<T: Display> Context<T> {
    /// Construct a new `Context<T>`.
    pub fn new(
        kind: T,
        line: String,
        line_num: usize,
        line_index: usize,
        file_name: String,
    ) -> Self {
        Self {
            kind,
            line,
            line_num,
            line_index,
            file_name,
        }
    }

    /// The wrapped error/warning kind.
    pub fn kind(&self) -> &T {
        &self.kind
    }

    /// Allows converting the inner kind while keeping the same context.
    pub fn map_kind<F: FnOnce(T) -> U, U: Display>(self, f: F) -> Context<U> {
        let Self {
            kind,
            line,
            line_num,
            line_index,
            file_name,
        } = self;

        Context {
            kind: f(kind),
            line,
            line_num,
            line_index,
            file_name,
        }
    }
}

impl<T: Display> Display for Context<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // [ERROR] unexpected token in grammar.sbnf:12:34:
        // main : 'a' |? 'b' ;
        //            ^~~ happened here

        write!(
            f,
            "{} in {}:{}:{}:\n{}\n{}{}\n",
            self.kind,
            self.file_name.purple(),
            (self.line_num + 1).to_string().purple(),
            (self.line_index + 1).to_string().purple(),
            self.line,
            " ".repeat(self.line_index),
            "^~~ happened here".blue()
        )
    }
}

/// An error type that may or may not carry locational context.
///
/// Grammar-level errors (left recursion, arity mismatches) generally have
/// no single source location; syntax errors always do.
#[derive(Debug, Clone)]
pub enum MaybeContext<T: Display> {
    /// There is locational context available.
    Context(Context<T>),
    /// There is no locational context.
    NoContext(T),
}

impl<T: Display> MaybeContext<T> {
    /// Allows converting the inner kind while keeping the same context.
    pub fn map_kind<F: FnOnce(T) -> U, U: Display>(self, f: F) -> MaybeContext<U> {
        match self {
            MaybeContext::Context(c) => MaybeContext::Context(c.map_kind(f)),
            MaybeContext::NoContext(e) => MaybeContext::NoContext(f(e)),
        }
    }
}

impl<T: Display> From<Context<T>> for MaybeContext<T> {
    fn from(value: Context<T>) -> Self {
        Self::Context(value)
    }
}

impl<T: Display> From<T> for MaybeContext<T> {
    fn from(value: T) -> Self {
        Self::NoContext(value)
    }
}

impl<T: Display> Display for MaybeContext<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaybeContext::Context(c) => c.fmt(f),
            MaybeContext::NoContext(n) => n.fmt(f),
        }
    }
}
