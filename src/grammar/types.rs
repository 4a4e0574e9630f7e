//! The grammar data model: terminals, nonterminals, and the expression
//! trees the frontend builds and the normalizer reduces to pure BNF.
//!
//! Terminals and nonterminals are value types, keyed by all their fields
//! (structural identity, not object identity) per the data model's
//! hash-consing design note. Synthetic nonterminals introduced during
//! normalization get a stable textual name built from a short hash of a
//! canonical (derived `Debug`) representation, mirroring the
//! `<kind>/<short-hash-of-repr>` scheme the distilled grammar uses.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A leaf symbol: a regex pattern plus the options that control how it
/// is scoped, embedded, or included when matched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Terminal {
    /// The regular-expression pattern this terminal matches.
    pub regex: String,
    /// Free-form comma-separated key/value and bare-tag options string.
    pub options: Option<String>,
    /// Whether this terminal is lookahead-only (see module docs on
    /// passive semantics in `analyze`/`emit`).
    pub passive: bool,
    /// `embed` descriptor: escape-regex arguments plus an options
    /// string, present when the terminal starts an embedded sub-syntax.
    pub embed: Option<(Vec<RuleArg>, String)>,
    /// `include` descriptor: the rule to splice in, plus an options
    /// string, present when the terminal includes another rule's context.
    pub include: Option<(Vec<RuleArg>, String)>,
}

impl Terminal {
    /// Construct a terminal with no options, not passive, no embed/include.
    pub fn new(regex: impl Into<String>) -> Self {
        Self {
            regex: regex.into(),
            options: None,
            passive: false,
            embed: None,
            include: None,
        }
    }

    /// Returns `self` with `passive` set.
    pub fn passive(mut self) -> Self {
        self.passive = true;
        self
    }

    /// Bare comma-separated option tags, used as meta-scope names.
    pub fn option_list(&self) -> Vec<String> {
        option_list(&self.options)
    }

    /// Colon-separated key/value option pairs.
    pub fn option_kv(&self) -> HashMap<String, String> {
        option_kv(&self.options)
    }

    /// The stable context-name for this terminal, a hash of its full
    /// structural identity prefixed with its kind tag.
    pub fn canonical_name(&self) -> String {
        format!("/T/{}", hash7(&format!("{self:?}")))
    }
}

/// A symbol usable as an argument to a parameterized rule: either a
/// terminal or another (possibly itself parameterized) nonterminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuleArg {
    /// A terminal argument.
    Terminal(Terminal),
    /// A nonterminal argument.
    Nonterminal(Nonterminal),
}

/// A named grammar rule, optionally parameterized and/or passive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nonterminal {
    /// The rule's base name, e.g. `expression` or `main`.
    pub symbol: String,
    /// Immutable argument tuple used by the frontend for parameterized
    /// rule instantiation; part of this value's identity.
    pub args: Vec<RuleArg>,
    /// Whether this is the lookahead-only passive variant of the rule.
    pub passive: bool,
}

impl Nonterminal {
    /// Construct a non-passive, zero-argument nonterminal.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            args: Vec::new(),
            passive: false,
        }
    }

    /// Construct a nonterminal with the given arguments.
    pub fn with_args(symbol: impl Into<String>, args: Vec<RuleArg>) -> Self {
        Self {
            symbol: symbol.into(),
            args,
            passive: false,
        }
    }

    /// Returns `self` with `passive` set.
    pub fn passive(mut self) -> Self {
        self.passive = true;
        self
    }

    /// Returns the non-passive variant of this nonterminal (identity
    /// unchanged otherwise).
    pub fn as_active(&self) -> Nonterminal {
        let mut nt = self.clone();
        nt.passive = false;
        nt
    }

    /// Returns the passive variant of this nonterminal.
    pub fn as_passive(&self) -> Nonterminal {
        let mut nt = self.clone();
        nt.passive = true;
        nt
    }

    /// The stable context-name for this nonterminal.
    ///
    /// Zero-argument, non-passive nonterminals use their bare symbol
    /// name, with `main` specially suffixed by a trailing slash (so it
    /// can never collide with a rule literally named `main/`); every
    /// other nonterminal (parameterized and/or passive) gets a
    /// hash-derived name.
    pub fn canonical_name(&self) -> String {
        if self.args.is_empty() && !self.passive {
            if self.symbol == "main" {
                return format!("{}/", self.symbol);
            }
            return self.symbol.clone();
        }
        format!("{}/{}", self.symbol, hash7(&format!("{self:?}")))
    }
}

/// Either kind of grammar symbol, used in post-normalization
/// productions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol {
    /// A terminal symbol.
    Terminal(Terminal),
    /// A nonterminal symbol.
    Nonterminal(Nonterminal),
}

impl Symbol {
    /// The non-passive variant of this symbol (terminals and
    /// nonterminals alike).
    pub fn as_active(&self) -> Symbol {
        match self {
            Symbol::Terminal(t) => {
                let mut t = t.clone();
                t.passive = false;
                Symbol::Terminal(t)
            }
            Symbol::Nonterminal(n) => Symbol::Nonterminal(n.as_active()),
        }
    }

    /// Whether the underlying symbol is marked passive.
    pub fn is_passive(&self) -> bool {
        match self {
            Symbol::Terminal(t) => t.passive,
            Symbol::Nonterminal(n) => n.passive,
        }
    }

    /// The stable context-name for this symbol.
    pub fn canonical_name(&self) -> String {
        match self {
            Symbol::Terminal(t) => t.canonical_name(),
            Symbol::Nonterminal(n) => n.canonical_name(),
        }
    }
}

/// Lets a production slot be compared directly against a `Nonterminal`,
/// the way FOLLOW-set computation needs to ask "is this occurrence of
/// the production equal to the nonterminal I'm computing FOLLOW for?"
/// without unwrapping the `Symbol` at every call site.
impl PartialEq<Nonterminal> for Symbol {
    fn eq(&self, other: &Nonterminal) -> bool {
        match self {
            Symbol::Nonterminal(n) => n == other,
            Symbol::Terminal(_) => false,
        }
    }
}

/// An ordered sequence of symbols; `Vec::new()` is the empty production.
pub type Concatenation = Vec<Symbol>;

/// An ordered list of productions (alternatives) plus the options string
/// that applies to the whole rule (meta-scope tags, `include-prototype`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alternation {
    /// The alternative right-hand sides.
    pub productions: Vec<Concatenation>,
    /// Free-form options string attached to the rule as a whole.
    pub options: Option<String>,
}

impl Alternation {
    /// Bare comma-separated option tags (meta-scope names).
    pub fn option_list(&self) -> Vec<String> {
        option_list(&self.options)
    }

    /// Colon-separated key/value option pairs.
    pub fn option_kv(&self) -> HashMap<String, String> {
        option_kv(&self.options)
    }

    /// Whether the rule should have the implicit `prototype` context
    /// spliced into every context it generates (true unless
    /// `include-prototype: false` is set).
    pub fn include_prototype(&self) -> bool {
        self.option_kv()
            .get("include-prototype")
            .map(|v| v != "false")
            .unwrap_or(true)
    }
}

/// A grammar: a mapping from nonterminal to its rule body, plus a
/// distinguished start symbol.
#[derive(Debug, Clone)]
pub struct Grammar {
    /// The rule map. Keys are non-passive nonterminals.
    pub rules: HashMap<Nonterminal, Alternation>,
    /// The start symbol.
    pub start: Nonterminal,
}

/// A pre-normalization expression: a production may nest these freely
/// before the normalizer eliminates EBNF sugar; afterwards every
/// production contains only [`Symbol`] values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A terminal leaf.
    Terminal(Terminal),
    /// A nonterminal reference.
    Nonterminal(Nonterminal),
    /// A sequence of sub-expressions.
    Concatenation(Vec<Expr>),
    /// A nested choice of productions.
    Alternation(RawAlternation),
    /// Zero-or-more repetitions of the sub-expression (`X*`).
    Repetition(Box<Expr>),
    /// Zero-or-one occurrences of the sub-expression (`X?`).
    Optional(Box<Expr>),
    /// A lookahead-only occurrence of the sub-expression (`~X`).
    Passive(Box<Expr>),
    /// Internal marker consumed by the normalizer's passive-collapsing
    /// pass; never observed outside `normalize`.
    Skip,
}

/// A pre-normalization alternation: like [`Alternation`] but productions
/// may still contain EBNF sugar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAlternation {
    /// The alternative right-hand sides, each a list of [`Expr`].
    pub productions: Vec<Vec<Expr>>,
    /// Free-form options string.
    pub options: Option<String>,
}

impl RawAlternation {
    /// Colon-separated key/value option pairs.
    pub fn option_kv(&self) -> HashMap<String, String> {
        option_kv(&self.options)
    }

    /// Whether the rule should have the prototype context spliced in.
    pub fn include_prototype(&self) -> bool {
        self.option_kv()
            .get("include-prototype")
            .map(|v| v != "false")
            .unwrap_or(true)
    }
}

/// A grammar whose rule bodies may still contain EBNF sugar, as handed
/// from the frontend to the normalizer.
pub type RawGrammar = HashMap<Nonterminal, RawAlternation>;

/// A stable, deterministic name for a not-yet-named synthetic
/// nonterminal, used by the normalizer to build names like
/// `/opt/<hash>` that embed the identity of the expression being
/// replaced.
pub fn expr_name(expr: &Expr) -> String {
    match expr {
        Expr::Terminal(t) => t.canonical_name(),
        Expr::Nonterminal(nt) => nt.canonical_name(),
        Expr::Concatenation(items) => format!("/cat/{}", hash7(&format!("{items:?}"))),
        Expr::Alternation(alt) => format!("/alt/{}", hash7(&format!("{alt:?}"))),
        Expr::Repetition(sub) => format!("/*/{}", hash7(&format!("{sub:?}"))),
        Expr::Optional(sub) => format!("/opt/{}", hash7(&format!("{sub:?}"))),
        Expr::Passive(sub) => format!("/~/{}", hash7(&format!("{sub:?}"))),
        Expr::Skip => unreachable!("Skip markers never survive to name generation"),
    }
}

/// Split a free-form options string into its bare-tag list.
fn option_list(options: &Option<String>) -> Vec<String> {
    let Some(options) = options else {
        return Vec::new();
    };
    options
        .split(',')
        .map(str::trim)
        .filter(|s| !s.contains(':'))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split a free-form options string into its `key: value` pairs.
fn option_kv(options: &Option<String>) -> HashMap<String, String> {
    let Some(options) = options else {
        return HashMap::new();
    };
    let mut map = HashMap::new();
    for entry in options.split(',').map(str::trim) {
        if let Some((k, v)) = entry.split_once(':') {
            map.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
    map
}

/// A small, dependency-free, deterministic 7-hex-digit digest (FNV-1a
/// truncated to 28 bits) used as the "short hash of repr" the data model
/// calls for. Not cryptographic; only collision-avoidance within one
/// grammar is required.
fn hash7(s: &str) -> String {
    struct Fnv1a(u64);
    impl Hasher for Fnv1a {
        fn finish(&self) -> u64 {
            self.0
        }
        fn write(&mut self, bytes: &[u8]) {
            for &b in bytes {
                self.0 ^= b as u64;
                self.0 = self.0.wrapping_mul(0x0000_0100_0000_01B3);
            }
        }
    }
    let mut hasher = Fnv1a(0xCBF2_9CE4_8422_2325);
    s.hash(&mut hasher);
    format!("{:07x}", hasher.finish() & 0x0FFF_FFFF)
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical_name())
    }
}
