//! The grammar analyzer: FIRST/FOLLOW fixed-point computation and the
//! per-nonterminal lookahead tables the emitter turns into branch-point
//! contexts.
//!
//! FIRST is computed recursively with a recursion guard: re-entering a
//! nonterminal that is still being computed (i.e. reached again before
//! any terminal was consumed on the path back to it) means the grammar
//! is left-recursive, which this generator cannot compile into a
//! finite-state pattern machine. FOLLOW is computed by the standard
//! fixed-point iteration over every production. Each nonterminal's
//! lookahead table splits predicting terminals into an active lane
//! (`np_table`, committing matches) and a passive lane (`p_table`,
//! lookahead-only matches from a `~`-marked leading symbol), mirroring
//! the active/passive split the emitter needs to choose between a
//! consuming branch-point context and a non-consuming passive-preface
//! context.

use std::collections::{HashMap, HashSet};

use crate::error::{GrammarError, Result};
use crate::grammar::types::{Grammar, Nonterminal, Symbol, Terminal};

/// The set of terminals a symbol or sequence of symbols can start with,
/// plus whether that symbol/sequence can also derive the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirstSet {
    pub terminals: HashSet<Terminal>,
    pub nullable: bool,
}

/// A nonterminal's lookahead table: which terminal predicts which
/// production(s), split by whether the predicting symbol is active or
/// passive, plus the FOLLOW set used to decide whether falling through
/// every production (no lookahead terminal matched) is itself valid
/// (when `nullable` is true) or a hard parse failure.
#[derive(Debug, Clone, Default)]
pub struct LookaheadTable {
    /// Terminal -> indices of productions it predicts via a committing
    /// (non-passive) leading symbol. Ordered-backtracking fallback among
    /// more than one entry is expected and is not itself an error.
    pub np_table: HashMap<Terminal, Vec<usize>>,
    /// Terminal -> indices of productions it predicts via a `~`-marked
    /// (passive, lookahead-only) leading symbol.
    pub p_table: HashMap<Terminal, Vec<usize>>,
    /// The FOLLOW set of this nonterminal: terminals that may legally
    /// come after it, used by the follow-check context when no
    /// production's lookahead terminal is seen.
    pub follow: HashSet<Terminal>,
    /// True if at least one production of this rule derives the empty
    /// string, i.e. the rule may be satisfied by falling straight
    /// through to its FOLLOW set.
    pub nullable: bool,
}

/// FIRST sets, FOLLOW sets, and lookahead tables for every nonterminal
/// in a grammar.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub first: HashMap<Nonterminal, FirstSet>,
    pub follow: HashMap<Nonterminal, HashSet<Terminal>>,
    pub tables: HashMap<Nonterminal, LookaheadTable>,
}

/// Run the full analysis pipeline: FIRST, then FOLLOW, then the
/// per-nonterminal lookahead tables.
pub fn analyze(grammar: &Grammar) -> Result<Analysis> {
    let mut first = HashMap::new();
    for nt in grammar.rules.keys() {
        let mut visiting = Vec::new();
        first_of_nonterminal(&nt.as_active(), grammar, &mut first, &mut visiting)?;
    }

    let follow = compute_follow(grammar, &first);

    let mut tables = HashMap::new();
    for (nt, alt) in &grammar.rules {
        let productions = &alt.productions;
        let table = build_lookahead_table(nt, productions, &first, &follow);
        tables.insert(nt.clone(), table);
    }

    Ok(Analysis {
        first,
        follow,
        tables,
    })
}

fn first_of_symbol(
    symbol: &Symbol,
    grammar: &Grammar,
    cache: &mut HashMap<Nonterminal, FirstSet>,
    visiting: &mut Vec<Nonterminal>,
) -> Result<FirstSet> {
    match symbol {
        Symbol::Terminal(t) => {
            let mut terminals = HashSet::new();
            terminals.insert(t.clone());
            Ok(FirstSet {
                terminals,
                nullable: false,
            })
        }
        Symbol::Nonterminal(n) => {
            let fs = first_of_nonterminal(&n.as_active(), grammar, cache, visiting)?;
            Ok(if n.passive { passivate(fs) } else { fs })
        }
    }
}

/// A `~`-marked reference to a nonterminal predicts the same terminals
/// its active form does, but only as lookahead: every terminal in the
/// FIRST set is remapped to its passive variant, so it is never mistaken
/// for a committing match by the lookahead table `build_lookahead_table`
/// builds from this FIRST set.
fn passivate(fs: FirstSet) -> FirstSet {
    FirstSet {
        terminals: fs.terminals.into_iter().map(Terminal::passive).collect(),
        nullable: fs.nullable,
    }
}

/// Recursively compute (and memoize) the FIRST set of a non-passive
/// nonterminal, raising [`GrammarError::LeftRecursion`] if computing it
/// requires re-entering itself before any terminal is consumed.
fn first_of_nonterminal(
    nt: &Nonterminal,
    grammar: &Grammar,
    cache: &mut HashMap<Nonterminal, FirstSet>,
    visiting: &mut Vec<Nonterminal>,
) -> Result<FirstSet> {
    if let Some(fs) = cache.get(nt) {
        return Ok(fs.clone());
    }
    if visiting.contains(nt) {
        return Err(GrammarError::LeftRecursion {
            symbol: nt.canonical_name(),
            chain: visiting.iter().map(Nonterminal::canonical_name).collect(),
        }
        .into());
    }

    let alt = grammar
        .rules
        .get(nt)
        .ok_or_else(|| GrammarError::MissingRule(nt.canonical_name()))?;

    visiting.push(nt.clone());
    let mut result = FirstSet::default();
    for production in &alt.productions {
        let mut prod_nullable = true;
        for symbol in production {
            let sym_first = first_of_symbol(symbol, grammar, cache, visiting)?;
            result.terminals.extend(sym_first.terminals);
            if !sym_first.nullable {
                prod_nullable = false;
                break;
            }
        }
        if prod_nullable {
            result.nullable = true;
        }
    }
    visiting.pop();

    cache.insert(nt.clone(), result.clone());
    Ok(result)
}

/// FIRST of a sequence of symbols (e.g. the tail of a production),
/// using already-computed nonterminal FIRST sets. Never triggers
/// further recursive computation; every nonterminal's FIRST set must
/// already be in `first` by the time FOLLOW runs.
fn first_of_sequence(symbols: &[Symbol], first: &HashMap<Nonterminal, FirstSet>) -> FirstSet {
    let mut result = FirstSet {
        terminals: HashSet::new(),
        nullable: true,
    };
    for symbol in symbols {
        let sym_first = first_of_symbol_cached(symbol, first);
        result.terminals.extend(sym_first.terminals);
        if !sym_first.nullable {
            result.nullable = false;
            return result;
        }
    }
    result
}

fn first_of_symbol_cached(symbol: &Symbol, first: &HashMap<Nonterminal, FirstSet>) -> FirstSet {
    match symbol {
        Symbol::Terminal(t) => {
            let mut terminals = HashSet::new();
            terminals.insert(t.clone());
            FirstSet {
                terminals,
                nullable: false,
            }
        }
        Symbol::Nonterminal(n) => {
            let fs = first.get(&n.as_active()).cloned().unwrap_or_default();
            if n.passive {
                passivate(fs)
            } else {
                fs
            }
        }
    }
}

/// Standard fixed-point FOLLOW computation: for every occurrence of a
/// nonterminal `B` within a production of `A`, FOLLOW(B) gains FIRST of
/// what comes after it, and FOLLOW(A) too if everything after `B` is
/// nullable (including if `B` is the last symbol).
fn compute_follow(
    grammar: &Grammar,
    first: &HashMap<Nonterminal, FirstSet>,
) -> HashMap<Nonterminal, HashSet<Terminal>> {
    let mut follow: HashMap<Nonterminal, HashSet<Terminal>> = grammar
        .rules
        .keys()
        .map(|nt| (nt.clone(), HashSet::new()))
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for (nt, alt) in &grammar.rules {
            for production in &alt.productions {
                for i in 0..production.len() {
                    let Symbol::Nonterminal(b) = &production[i] else {
                        continue;
                    };
                    let b_active = b.as_active();
                    let rest_first = first_of_sequence(&production[i + 1..], first);

                    let before = follow.get(&b_active).map(HashSet::len).unwrap_or(0);
                    {
                        let entry = follow.entry(b_active.clone()).or_default();
                        entry.extend(rest_first.terminals);
                    }
                    if rest_first.nullable {
                        if let Some(nt_follow) = follow.get(nt).cloned() {
                            let entry = follow.entry(b_active.clone()).or_default();
                            entry.extend(nt_follow);
                        }
                    }
                    let after = follow.get(&b_active).map(HashSet::len).unwrap_or(0);
                    if after != before {
                        changed = true;
                    }
                }
            }
        }
    }

    follow
}

/// Build one nonterminal's lookahead table from its productions.
fn build_lookahead_table(
    nt: &Nonterminal,
    productions: &[Vec<Symbol>],
    first: &HashMap<Nonterminal, FirstSet>,
    follow: &HashMap<Nonterminal, HashSet<Terminal>>,
) -> LookaheadTable {
    let mut np_table: HashMap<Terminal, Vec<usize>> = HashMap::new();
    let mut p_table: HashMap<Terminal, Vec<usize>> = HashMap::new();
    let mut nullable = false;

    for (i, production) in productions.iter().enumerate() {
        let mut prod_nullable = true;
        for symbol in production {
            let sym_first = first_of_symbol_cached(symbol, first);
            let table = if symbol.is_passive() {
                &mut p_table
            } else {
                &mut np_table
            };
            for t in sym_first.terminals {
                table.entry(t).or_default().push(i);
            }
            if !sym_first.nullable {
                prod_nullable = false;
                break;
            }
        }
        if prod_nullable {
            nullable = true;
        }
    }

    LookaheadTable {
        np_table,
        p_table,
        follow: follow.get(&nt.as_active()).cloned().unwrap_or_default(),
        nullable,
    }
}

/// A deterministic emission order for a set of terminals: by explicit
/// `sort:` option (ascending, default 0) and then by pattern text, so
/// the emitted alternation pattern doesn't depend on hash iteration
/// order.
pub fn sorted_terminals(terms: impl IntoIterator<Item = Terminal>) -> Vec<Terminal> {
    let mut v: Vec<Terminal> = terms.into_iter().collect();
    v.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)).then_with(|| a.regex.cmp(&b.regex)));
    v.dedup();
    v
}

fn sort_key(t: &Terminal) -> i64 {
    t.option_kv()
        .get("sort")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::types::{Alternation, Terminal};
    use std::collections::HashMap as Map;

    fn term(s: &str) -> Symbol {
        Symbol::Terminal(Terminal::new(s))
    }

    fn nt_sym(s: &str) -> Symbol {
        Symbol::Nonterminal(Nonterminal::new(s))
    }

    #[test]
    fn first_set_stops_at_nonnullable_symbol() {
        let mut rules = Map::new();
        rules.insert(
            Nonterminal::new("main"),
            Alternation {
                productions: vec![vec![term("a"), term("b")]],
                options: None,
            },
        );
        let grammar = Grammar {
            rules,
            start: Nonterminal::new("main"),
        };
        let analysis = analyze(&grammar).unwrap();
        let fs = &analysis.first[&Nonterminal::new("main")];
        assert!(!fs.nullable);
        assert_eq!(fs.terminals.len(), 1);
        assert!(fs.terminals.contains(&Terminal::new("a")));
    }

    #[test]
    fn left_recursion_is_detected() {
        let mut rules = Map::new();
        rules.insert(
            Nonterminal::new("main"),
            Alternation {
                productions: vec![vec![nt_sym("main"), term("a")], vec![term("b")]],
                options: None,
            },
        );
        let grammar = Grammar {
            rules,
            start: Nonterminal::new("main"),
        };
        let err = analyze(&grammar).unwrap_err();
        match err {
            crate::error::Error::Grammar(GrammarError::LeftRecursion { .. }) => {}
            other => panic!("expected LeftRecursion, got {other:?}"),
        }
    }

    #[test]
    fn nullable_production_marks_rule_nullable_and_uses_follow() {
        let mut rules = Map::new();
        rules.insert(
            Nonterminal::new("main"),
            Alternation {
                productions: vec![vec![nt_sym("opt"), term("end")]],
                options: None,
            },
        );
        rules.insert(
            Nonterminal::new("opt"),
            Alternation {
                productions: vec![vec![], vec![term("x")]],
                options: None,
            },
        );
        let grammar = Grammar {
            rules,
            start: Nonterminal::new("main"),
        };
        let analysis = analyze(&grammar).unwrap();
        let opt_table = &analysis.tables[&Nonterminal::new("opt")];
        assert!(opt_table.nullable);
        assert!(opt_table.follow.contains(&Terminal::new("end")));
    }
}
