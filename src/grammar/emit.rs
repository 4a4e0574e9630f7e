//! The emitter: turns an analyzed grammar into the stack-based pattern
//! machine a text editor's syntax engine executes — a map of named
//! contexts, each a short list of match rules.
//!
//! Every rule reference becomes, demand-driven, one of seven kinds of
//! context, discovered via a worklist and memoized by name so a
//! terminal or nonterminal shared by several productions is emitted
//! once:
//!
//! 1. **entry/branch-point** (`build_entry`) — one per nonterminal,
//!    dispatching on lookahead (active lane first, then passive lane,
//!    then an epsilon fallback if the rule is nullable, then `fail!`).
//!    A terminal predicting more than one production emits a real
//!    Sublime `branch_point`/`branch` pair instead of a plain `set`,
//!    so the production actually tried first can fail and hand off to
//!    the next one (see `build_branch_terminal`).
//! 2. **offset** (`build_offset`) — one per `(rule, production,
//!    position)`, threading a production's symbols one at a time via
//!    `set`, so a chosen production never grows the stack on its own —
//!    only entering a sub-nonterminal does, exactly as a real call
//!    would.
//! 3. **terminal** (`build_terminal`) — the single real (consuming)
//!    match for a given terminal, shared by every offset context that
//!    needs it, always popping exactly one frame back to its caller.
//!    Within a branch arm, the same match is built again per
//!    `branch_point` by `build_branch_terminal`, with a trailing
//!    `fail:` rule so a mismatch there reverts to the next arm instead
//!    of falling through to `fail!`. Only terminal mismatches revert
//!    this way — a sub-nonterminal reached from within a branch arm
//!    still dispatches through its own ordinary entry context, so a
//!    mismatch several symbols deep inside a nested rule call does not
//!    propagate back to the enclosing branch_point.
//! 4. **passive terminal** (`build_passive_terminal`) — the
//!    non-consuming lookahead counterpart, used wherever normalization
//!    marked a terminal passive (a `~`-prefixed match).
//! 5. **meta-scope wrapper** — not a context of its own but a set of
//!    leading pseudo-rules (`leading_meta`) prepended to a production's
//!    offset contexts when the rule carries scope tags or
//!    `include-prototype: false`.
//! 6. **main** (`install_main`) — the context the editor actually
//!    starts in: pushes `fail1!` and `fail2!` underneath the start
//!    symbol's entry context, so a derivation that never gets off the
//!    ground at all still has somewhere to fall through to.
//! 7. **fixed utility contexts** (`install_utilities`) — `pop1!`
//!    through `pop5!`, `consume!`, the single-production `fail!`, and
//!    the two-level `fail1!`/`reset1!`/`fail2!`/`reset2!` recovery loop:
//!    a mismatch scopes one illegal character and hands off to the
//!    matching `resetN!`, which keeps scoping illegal characters until a
//!    newline, then resets the whole stack and restarts the derivation
//!    from the start symbol.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::error::{GrammarError, InternalError, Result};
use crate::grammar::analyze::{sorted_terminals, Analysis, LookaheadTable};
use crate::grammar::types::{Alternation, Grammar, Nonterminal, Symbol, Terminal};
use crate::serialize::{Action, MatchAction, Pop};

enum Task {
    Entry(Nonterminal),
    /// `(rule, production, position, enclosing branch_point name)`. The
    /// branch_point is `Some` only for offset chains reached through an
    /// ambiguous-FIRST dispatch (see `build_entry`), and threads through
    /// every offset in that production so a mismatch anywhere in the arm
    /// — not just at its first symbol — can revert to the next arm.
    Offset(Nonterminal, usize, usize, Option<String>),
    Terminal(Terminal),
    PassiveTerminal(Terminal),
    /// A terminal reached from within a branch arm: identical consuming
    /// match, plus a trailing epsilon `fail:` rule that hands control
    /// back to the branch_point when the real pattern doesn't match.
    BranchTerminal(Terminal, String),
}

struct Emitter<'a> {
    grammar: &'a Grammar,
    analysis: &'a Analysis,
    contexts: BTreeMap<String, Vec<Action>>,
    queued: HashSet<String>,
    todo: VecDeque<Task>,
    scope_postfix: Option<String>,
    /// The start symbol's entry context name, needed by both `main` and
    /// the `reset1!`/`reset2!` recovery contexts, which restart the
    /// parse there after a failed line.
    start_entry: String,
}

/// Emit the full context map for an analyzed grammar, ready to be
/// handed to [`crate::serialize::dump`]. `scope_postfix`, when set, is
/// appended (as `.postfix`) to every scope this emitter assigns,
/// mirroring `SublimeSyntaxOptions.scope_postfix`.
pub fn emit(
    grammar: &Grammar,
    analysis: &Analysis,
    scope_postfix: Option<&str>,
) -> Result<BTreeMap<String, Vec<Action>>> {
    let mut emitter = Emitter {
        grammar,
        analysis,
        contexts: BTreeMap::new(),
        queued: HashSet::new(),
        todo: VecDeque::new(),
        scope_postfix: scope_postfix.map(str::to_string),
        start_entry: grammar.start.as_active().canonical_name(),
    };

    emitter.enqueue_entry(grammar.start.clone());
    let prototype = Nonterminal::new("prototype");
    if grammar.rules.contains_key(&prototype) {
        emitter.enqueue_entry(prototype);
    }

    emitter.run()?;
    emitter.install_utilities();
    emitter.install_main();
    Ok(emitter.contexts)
}

impl<'a> Emitter<'a> {
    fn run(&mut self) -> Result<()> {
        while let Some(task) = self.todo.pop_front() {
            match task {
                Task::Entry(nt) => self.build_entry(&nt)?,
                Task::Offset(nt, idx, offset, bp) => self.build_offset(&nt, idx, offset, bp)?,
                Task::Terminal(t) => self.build_terminal(&t),
                Task::PassiveTerminal(t) => self.build_passive_terminal(&t),
                Task::BranchTerminal(t, bp) => self.build_branch_terminal(&t, &bp),
            }
        }
        Ok(())
    }

    fn enqueue_entry(&mut self, nt: Nonterminal) {
        let active = nt.as_active();
        let name = active.canonical_name();
        if self.queued.insert(name) {
            self.todo.push_back(Task::Entry(active));
        }
    }

    fn enqueue_offset(&mut self, nt: Nonterminal, idx: usize, offset: usize, bp: Option<String>) {
        let name = offset_name(&nt, idx, offset, bp.as_deref());
        if self.queued.insert(name) {
            self.todo.push_back(Task::Offset(nt, idx, offset, bp));
        }
    }

    fn enqueue_terminal(&mut self, t: Terminal) {
        let name = t.canonical_name();
        if self.queued.insert(name) {
            self.todo.push_back(Task::Terminal(t));
        }
    }

    fn enqueue_passive_terminal(&mut self, t: Terminal) {
        let name = passive_terminal_name(&t);
        if self.queued.insert(name) {
            self.todo.push_back(Task::PassiveTerminal(t));
        }
    }

    fn enqueue_branch_terminal(&mut self, t: Terminal, bp: String) {
        let name = branch_terminal_name(&t, &bp);
        if self.queued.insert(name) {
            self.todo.push_back(Task::BranchTerminal(t, bp));
        }
    }

    /// Build the dispatcher context for `nt`: a zero-width lookahead per
    /// predicting terminal (active lane, then passive lane), landing on
    /// the chosen production's first offset context; an epsilon
    /// fallback if `nt` is nullable (follow-membership is not checked,
    /// see `grammar::analyze` module docs); `fail!` otherwise.
    ///
    /// A terminal that predicts more than one production (FIRST sets
    /// overlap past one token of lookahead, as in `'a' 'b' | 'a' 'c'`)
    /// cannot be resolved by a lookahead table alone — it becomes a
    /// `branch_point`/`branch` pair instead of a plain `set`, so the
    /// editor tries each production in order and reverts to the next on
    /// a later mismatch (see `build_offset`, `build_branch_terminal`).
    fn build_entry(&mut self, nt: &Nonterminal) -> Result<()> {
        let name = nt.canonical_name();
        let table: LookaheadTable = self
            .analysis
            .tables
            .get(nt)
            .cloned()
            .ok_or_else(|| GrammarError::MissingRule(nt.canonical_name()))?;

        let mut term_to_idxs: HashMap<Terminal, Vec<usize>> = HashMap::new();
        for (t, idxs) in table.np_table.iter().chain(table.p_table.iter()) {
            let entry = term_to_idxs.entry(t.clone()).or_default();
            for &idx in idxs {
                if !entry.contains(&idx) {
                    entry.push(idx);
                }
            }
        }

        let mut body = Vec::new();
        for t in sorted_terminals(term_to_idxs.keys().cloned()) {
            let idxs = term_to_idxs[&t].clone();
            if idxs.len() == 1 {
                let idx = idxs[0];
                self.enqueue_offset(nt.clone(), idx, 0, None);
                body.push(Action::Match(MatchAction {
                    pattern: format!("(?={})", t.regex),
                    set: Some(vec![offset_name(nt, idx, 0, None)]),
                    ..Default::default()
                }));
            } else {
                let bp = branch_point_name(nt, &idxs);
                let branch = idxs
                    .iter()
                    .map(|&idx| {
                        self.enqueue_offset(nt.clone(), idx, 0, Some(bp.clone()));
                        offset_name(nt, idx, 0, Some(&bp))
                    })
                    .collect();
                body.push(Action::Match(MatchAction {
                    pattern: format!("(?={})", t.regex),
                    branch_point: Some(bp),
                    branch: Some(branch),
                    ..Default::default()
                }));
            }
        }

        if table.nullable {
            body.push(Action::Match(MatchAction {
                pattern: String::new(),
                pop: Some(Pop::Many(1)),
                ..Default::default()
            }));
        } else {
            body.push(Action::Match(MatchAction {
                pattern: String::new(),
                set: Some(vec!["fail!".to_string()]),
                ..Default::default()
            }));
        }

        self.contexts.insert(name, body);
        Ok(())
    }

    /// Build the context for one position within one production: push
    /// the symbol's target context (a terminal, passive terminal, or
    /// sub-nonterminal entry) together with the continuation that
    /// resumes the production after it returns, replacing this context
    /// rather than stacking on top of it so a production's own frame
    /// never accumulates depth.
    fn build_offset(
        &mut self,
        nt: &Nonterminal,
        idx: usize,
        offset: usize,
        bp: Option<String>,
    ) -> Result<()> {
        let name = offset_name(nt, idx, offset, bp.as_deref());
        let alt = self
            .grammar
            .rules
            .get(nt)
            .ok_or_else(|| GrammarError::MissingRule(nt.canonical_name()))?;
        let production = alt.productions.get(idx).ok_or_else(|| {
            InternalError::EmptyProductionAndFollow(format!(
                "production {idx} out of range for {}",
                nt.canonical_name()
            ))
        })?;
        let symbol = production.get(offset).ok_or_else(|| {
            InternalError::EmptyProductionAndFollow(format!(
                "offset {offset} out of range in production {idx} of {}",
                nt.canonical_name()
            ))
        })?;

        let target = match symbol {
            Symbol::Terminal(t) => {
                if t.passive {
                    self.enqueue_passive_terminal(t.clone());
                    passive_terminal_name(t)
                } else if let Some(bp_name) = &bp {
                    // A mismatch on this terminal, anywhere in a branch
                    // arm, must revert to the next arm rather than fall
                    // through to `fail!` — see `build_branch_terminal`.
                    self.enqueue_branch_terminal(t.clone(), bp_name.clone());
                    branch_terminal_name(t, bp_name)
                } else {
                    self.enqueue_terminal(t.clone());
                    t.canonical_name()
                }
            }
            Symbol::Nonterminal(b) => {
                let active_b = b.as_active();
                self.enqueue_entry(active_b.clone());
                active_b.canonical_name()
            }
        };

        let continuation = if offset + 1 == production.len() {
            // A production consisting solely of passive (non-consuming)
            // symbols matches without advancing the input position at
            // all. Popping back to the caller's entry context in that
            // case would repeat the same zero-width dispatch forever, so
            // the last symbol of an all-passive production instead falls
            // through to `consume!`, which guarantees forward progress.
            if production.iter().all(Symbol::is_passive) {
                "consume!".to_string()
            } else {
                "pop1!".to_string()
            }
        } else {
            self.enqueue_offset(nt.clone(), idx, offset + 1, bp.clone());
            offset_name(nt, idx, offset + 1, bp.as_deref())
        };

        let mut body = self.leading_meta(alt);
        body.push(Action::Match(MatchAction {
            pattern: String::new(),
            set: Some(vec![continuation, target]),
            ..Default::default()
        }));
        self.contexts.insert(name, body);
        Ok(())
    }

    /// Append the scope postfix, if one was configured, to a scope name.
    fn postfixed(&self, scope: Option<String>) -> Option<String> {
        match (scope, &self.scope_postfix) {
            (Some(s), Some(postfix)) => Some(format!("{s}.{postfix}")),
            (scope, _) => scope,
        }
    }

    /// Build the real consuming `MatchAction` for a terminal: scope,
    /// numeric captures, and embed/include wiring. Shared by
    /// `build_terminal` and `build_branch_terminal`, which differ only
    /// in what happens on a *mismatch*.
    ///
    /// A terminal's scope comes from its bare option tags (`option_list`,
    /// space-joined), not from any `key: value` option — `scope` is not
    /// itself a recognized key, so a terminal declares its scope the same
    /// way a rule declares its `meta_scope` (see `leading_meta`).
    fn terminal_match(&self, t: &Terminal) -> MatchAction {
        let kv = t.option_kv();
        let tags = t.option_list();
        let scope = if tags.is_empty() {
            None
        } else {
            self.postfixed(Some(tags.join(" ")))
        };
        let mut action = MatchAction {
            pattern: t.regex.clone(),
            scope,
            captures: kv
                .iter()
                .filter_map(|(k, v)| k.parse::<u32>().ok().map(|n| (n, v.clone())))
                .collect(),
            ..Default::default()
        };

        if let Some((_, embed_scope)) = &t.embed {
            action.embed = Some(embed_scope.clone());
            action.escape = Some(kv.get("escape").cloned().unwrap_or_else(|| "$".to_string()));
            action.embed_scope = kv.get("embed_scope").cloned();
            action.pop = Some(Pop::Many(2));
        } else if let Some((_, include_target)) = &t.include {
            action.set = Some(vec![
                "pop2!".to_string(),
                "pop1!".to_string(),
                include_target.clone(),
            ]);
        } else {
            action.pop = Some(Pop::Many(1));
        }
        action
    }

    fn build_terminal(&mut self, t: &Terminal) {
        let action = self.terminal_match(t);
        self.contexts.insert(t.canonical_name(), vec![Action::Match(action)]);
    }

    /// Build a terminal match reached from within a branch arm: the
    /// same consuming match as `build_terminal`, followed by a
    /// zero-width `fail:` rule that reverts to the next untried arm of
    /// `bp` when the real pattern doesn't match here.
    fn build_branch_terminal(&mut self, t: &Terminal, bp: &str) {
        let action = self.terminal_match(t);
        let fail = Action::Match(MatchAction {
            pattern: String::new(),
            fail: Some(bp.to_string()),
            ..Default::default()
        });
        self.contexts
            .insert(branch_terminal_name(t, bp), vec![Action::Match(action), fail]);
    }

    /// Build the non-consuming lookahead counterpart of a terminal:
    /// confirms the pattern is next without advancing past it.
    fn build_passive_terminal(&mut self, t: &Terminal) {
        let action = MatchAction {
            pattern: format!("(?={})", t.regex),
            pop: Some(Pop::Many(1)),
            ..Default::default()
        };
        self.contexts
            .insert(passive_terminal_name(t), vec![Action::Match(action)]);
    }

    /// Install the fixed utility contexts every emitted grammar shares:
    /// `pop1!`..`pop5!`, `consume!`, the plain per-production `fail!`,
    /// and the two-level `fail1!`/`reset1!`/`fail2!`/`reset2!` recovery
    /// loop `main` (see `install_main`) falls back into when no
    /// top-level derivation at all can be started.
    fn install_utilities(&mut self) {
        for n in 1..=5u32 {
            self.contexts.entry(format!("pop{n}!")).or_insert_with(|| {
                vec![Action::Match(MatchAction {
                    pattern: String::new(),
                    pop: Some(Pop::Many(n)),
                    ..Default::default()
                })]
            });
        }
        // A guaranteed-forward-progress fallback (see `build_offset`'s
        // all-passive-production continuation): scopes the one character
        // it consumes `meta.consume`, per `sublime_generator.py`'s
        // `consume!` context, rather than leaving it unscoped.
        let consume_scope = self.postfixed(Some("meta.consume".to_string()));
        self.contexts.entry("consume!".to_string()).or_insert_with(|| {
            vec![Action::Match(MatchAction {
                pattern: r"\S".to_string(),
                scope: consume_scope,
                pop: Some(Pop::Many(1)),
                ..Default::default()
            })]
        });
        self.contexts
            .entry("fail!".to_string())
            .or_insert_with(|| fail_body(1));

        // fail1!/reset1! guard the outermost `main` frame, fail2!/reset2!
        // the one nested inside it (see `install_main`): a mismatch
        // scopes the offending character as illegal and hands off to the
        // matching `resetN!`, which keeps scoping illegal characters
        // until a newline, then restarts the whole derivation from
        // scratch rather than leaving a half-matched stack behind.
        for (fail_name, reset_name, restart) in [
            ("fail1!", "reset1!", vec!["fail1!".to_string(), "fail2!".to_string(), self.start_entry.clone()]),
            ("fail2!", "reset2!", vec!["fail2!".to_string(), self.start_entry.clone()]),
        ] {
            self.contexts.entry(fail_name.to_string()).or_insert_with(|| {
                vec![
                    Action::Match(MatchAction {
                        pattern: ".".to_string(),
                        scope: Some("invalid.illegal".to_string()),
                        set: Some(vec![reset_name.to_string()]),
                        ..Default::default()
                    }),
                    Action::Match(MatchAction {
                        pattern: "$".to_string(),
                        set: Some(vec![reset_name.to_string()]),
                        ..Default::default()
                    }),
                ]
            });
            self.contexts.entry(reset_name.to_string()).or_insert_with(|| {
                vec![
                    Action::Match(MatchAction {
                        pattern: "(?=\\n)".to_string(),
                        set: Some(restart.clone()),
                        ..Default::default()
                    }),
                    Action::Match(MatchAction {
                        pattern: ".".to_string(),
                        scope: Some("invalid.illegal".to_string()),
                        ..Default::default()
                    }),
                ]
            });
        }
    }

    /// Leading pseudo-rules a production's offset contexts carry when
    /// the rule declares meta-scope tags or opts out of the implicit
    /// prototype. All of a rule's bare option tags join into a single
    /// `meta_scope`, space-separated, mirroring `_meta_context` — a rule
    /// with more than one tag scopes its whole match under every tag at
    /// once, it does not split the tags between `meta_scope` and
    /// `meta_content_scope`.
    fn leading_meta(&self, alt: &Alternation) -> Vec<Action> {
        let mut out = Vec::new();
        let tags = alt.option_list();
        if !tags.is_empty() {
            out.push(Action::MetaScope {
                meta_scope: self.postfixed(Some(tags.join(" "))).unwrap(),
            });
        }
        if !alt.include_prototype() {
            out.push(Action::MetaIncludePrototype {
                meta_include_prototype: false,
            });
        }
        out
    }

    /// Install the context the editor actually starts in: pushes
    /// `fail1!` and `fail2!` underneath the start symbol's entry context
    /// so a derivation that never gets off the ground (no production at
    /// all predicted) falls through to the recovery loop those contexts
    /// drive, instead of leaving `main` with nothing further to try.
    fn install_main(&mut self) {
        self.contexts.insert(
            "main".to_string(),
            vec![Action::Match(MatchAction {
                pattern: String::new(),
                push: Some(vec!["fail1!".to_string(), "fail2!".to_string(), self.start_entry.clone()]),
                ..Default::default()
            })],
        );
    }
}

fn offset_name(nt: &Nonterminal, idx: usize, offset: usize, bp: Option<&str>) -> String {
    match bp {
        Some(bp) => format!("{}/p{idx}/{offset}/bp/{bp}", nt.canonical_name()),
        None => format!("{}/p{idx}/{offset}", nt.canonical_name()),
    }
}

fn passive_terminal_name(t: &Terminal) -> String {
    format!("{}/peek", t.canonical_name())
}

/// A terminal reached only from within one particular branch arm needs
/// its own context (distinct from the plain `t.canonical_name()` one),
/// since only this call site should revert to `bp` on mismatch — the
/// same terminal reached outside any branch still falls through to
/// `fail!` as usual.
fn branch_terminal_name(t: &Terminal, bp: &str) -> String {
    format!("{}/branch/{bp}", t.canonical_name())
}

/// Names the `branch_point` dispatching between the given production
/// indices of `nt`, all predicted by the same terminal.
fn branch_point_name(nt: &Nonterminal, idxs: &[usize]) -> String {
    format!(
        "{}/bp/{}",
        nt.canonical_name(),
        idxs.iter().map(|i| i.to_string()).collect::<Vec<_>>().join("-")
    )
}

/// A catch-all "could not predict a production" handler: scope one
/// character as illegal and pop back to the caller, or pop without
/// scoping anything at end of line so a dangling context never stalls
/// the parse.
fn fail_body(depth: u32) -> Vec<Action> {
    vec![
        Action::Match(MatchAction {
            pattern: ".".to_string(),
            scope: Some("invalid.illegal".to_string()),
            pop: Some(Pop::Many(depth)),
            ..Default::default()
        }),
        Action::Match(MatchAction {
            pattern: "$".to_string(),
            pop: Some(Pop::Many(depth)),
            ..Default::default()
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::analyze::analyze;
    use crate::grammar::types::{Alternation as Alt, Terminal as Term};
    use std::collections::HashMap as Map;

    fn small_grammar() -> Grammar {
        let mut rules = Map::new();
        rules.insert(
            Nonterminal::new("main"),
            Alt {
                productions: vec![vec![Symbol::Terminal(Term::new("a"))]],
                options: None,
            },
        );
        Grammar {
            rules,
            start: Nonterminal::new("main"),
        }
    }

    #[test]
    fn emits_main_and_utility_contexts() {
        let grammar = small_grammar();
        let analysis = analyze(&grammar).unwrap();
        let contexts = emit(&grammar, &analysis, None).unwrap();
        assert!(contexts.contains_key("main"));
        assert!(contexts.contains_key("pop1!"));
        assert!(contexts.contains_key("fail!"));
        assert!(contexts.contains_key("fail1!"));
        assert!(contexts.contains_key("fail2!"));
        assert!(contexts.contains_key("reset1!"));
        assert!(contexts.contains_key("reset2!"));
        assert!(contexts.contains_key("consume!"));

        // main pushes fail1!, fail2!, then the start symbol's entry, in
        // that order, so a derivation that never starts at all still has
        // the recovery loop underneath it.
        let main_push = contexts["main"]
            .iter()
            .find_map(|a| match a {
                Action::Match(m) => m.push.clone(),
                _ => None,
            })
            .expect("main pushes a context list");
        assert_eq!(main_push, vec!["fail1!", "fail2!", "main/"]);

        // the lone terminal context should carry the real consuming match
        let terminal_ctx = contexts
            .iter()
            .find(|(name, _)| name.starts_with("/T/"))
            .expect("terminal context emitted");
        assert_eq!(terminal_ctx.1.len(), 1);
    }

    #[test]
    fn reset_contexts_restart_at_start_entry_after_newline() {
        let grammar = small_grammar();
        let analysis = analyze(&grammar).unwrap();
        let contexts = emit(&grammar, &analysis, None).unwrap();

        let reset1_restart = contexts["reset1!"]
            .iter()
            .find_map(|a| match a {
                Action::Match(m) if m.pattern == "(?=\\n)" => m.set.clone(),
                _ => None,
            })
            .expect("reset1! restarts the derivation at a newline");
        assert_eq!(reset1_restart, vec!["fail1!", "fail2!", "main/"]);

        let reset2_restart = contexts["reset2!"]
            .iter()
            .find_map(|a| match a {
                Action::Match(m) if m.pattern == "(?=\\n)" => m.set.clone(),
                _ => None,
            })
            .expect("reset2! restarts the derivation at a newline");
        assert_eq!(reset2_restart, vec!["fail2!", "main/"]);
    }

    #[test]
    fn terminal_scope_comes_from_option_list_not_option_kv() {
        // A `scope:`-keyed option is not itself a recognized key; only
        // bare tags (option_list) become the match's scope.
        let mut rules = Map::new();
        rules.insert(
            Nonterminal::new("main"),
            Alt {
                productions: vec![vec![Symbol::Terminal(Term {
                    options: Some("keyword.control, escape: #".to_string()),
                    ..Term::new("a")
                })]],
                options: None,
            },
        );
        let grammar = Grammar {
            rules,
            start: Nonterminal::new("main"),
        };
        let analysis = analyze(&grammar).unwrap();
        let contexts = emit(&grammar, &analysis, None).unwrap();
        let terminal_ctx = contexts
            .iter()
            .find(|(name, _)| name.starts_with("/T/"))
            .expect("terminal context emitted")
            .1;
        let scope = terminal_ctx
            .iter()
            .find_map(|a| match a {
                Action::Match(m) => m.scope.clone(),
                _ => None,
            })
            .expect("scope set from option_list");
        assert_eq!(scope, "keyword.control");
    }

    #[test]
    fn leading_meta_joins_every_tag_into_one_meta_scope() {
        let mut rules = Map::new();
        rules.insert(
            Nonterminal::new("main"),
            Alt {
                productions: vec![vec![Symbol::Terminal(Term::new("a"))]],
                options: Some("variable.function, support.type, meta.thing".to_string()),
            },
        );
        let grammar = Grammar {
            rules,
            start: Nonterminal::new("main"),
        };
        let analysis = analyze(&grammar).unwrap();
        let contexts = emit(&grammar, &analysis, None).unwrap();
        let offset_ctx = contexts
            .iter()
            .find(|(name, _)| name.contains("/p0/0"))
            .expect("offset context emitted")
            .1;
        let meta_scope = offset_ctx
            .iter()
            .find_map(|a| match a {
                Action::MetaScope { meta_scope } => Some(meta_scope.clone()),
                _ => None,
            })
            .expect("meta_scope present");
        assert_eq!(meta_scope, "variable.function support.type meta.thing");
        // only one meta pseudo-rule is emitted for the tags, not a
        // separate meta_scope/meta_content_scope pair
        assert_eq!(
            offset_ctx
                .iter()
                .filter(|a| matches!(a, Action::MetaScope { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn all_passive_production_falls_through_to_consume_not_pop1() {
        // main : ~'a' | 'b' ; -- the first production is entirely
        // passive (zero-width), so its last offset must route to
        // `consume!` rather than `pop1!`, or input `a` would loop
        // forever re-dispatching on the same zero-width lookahead.
        let mut rules = Map::new();
        rules.insert(
            Nonterminal::new("main"),
            Alt {
                productions: vec![
                    vec![Symbol::Terminal(Term::new("a").passive())],
                    vec![Symbol::Terminal(Term::new("b"))],
                ],
                options: None,
            },
        );
        let grammar = Grammar {
            rules,
            start: Nonterminal::new("main"),
        };
        let analysis = analyze(&grammar).unwrap();
        let contexts = emit(&grammar, &analysis, None).unwrap();

        let passive_offset = contexts
            .iter()
            .find(|(name, _)| name.contains("/p0/0"))
            .expect("offset context for the passive production emitted")
            .1;
        let set = passive_offset
            .iter()
            .find_map(|a| match a {
                Action::Match(m) => m.set.clone(),
                _ => None,
            })
            .expect("offset context sets continuation+target");
        assert!(
            set.contains(&"consume!".to_string()),
            "expected consume! in {set:?}"
        );
        assert!(!set.contains(&"pop1!".to_string()));
    }

    #[test]
    fn ambiguous_first_terminal_emits_branch_point() {
        // S : 'a' 'b' | 'a' 'c' ; -- both productions start with 'a', so a
        // single token of lookahead cannot pick one; the entry context
        // must offer both as an ordered, backtracking branch_point.
        let mut rules = Map::new();
        rules.insert(
            Nonterminal::new("main"),
            Alt {
                productions: vec![
                    vec![Symbol::Terminal(Term::new("a")), Symbol::Terminal(Term::new("b"))],
                    vec![Symbol::Terminal(Term::new("a")), Symbol::Terminal(Term::new("c"))],
                ],
                options: None,
            },
        );
        let grammar = Grammar {
            rules,
            start: Nonterminal::new("main"),
        };
        let analysis = analyze(&grammar).unwrap();
        let contexts = emit(&grammar, &analysis, None).unwrap();

        let entry = &contexts[&Nonterminal::new("main").canonical_name()];
        let branch_match = entry
            .iter()
            .find_map(|a| match a {
                Action::Match(m) if m.branch_point.is_some() => Some(m),
                _ => None,
            })
            .expect("entry context emits a branch_point for the ambiguous terminal");
        let branch = branch_match.branch.as_ref().expect("branch arms listed");
        assert_eq!(branch.len(), 2);

        // Every terminal reached from within a branch arm carries a
        // trailing `fail:` rule reverting to the branch_point.
        let branch_terminal_ctx = contexts
            .iter()
            .find(|(name, _)| name.contains("/branch/"))
            .expect("branch-local terminal context emitted")
            .1;
        assert!(branch_terminal_ctx
            .iter()
            .any(|a| matches!(a, Action::Match(m) if m.fail.is_some())));
    }

    #[test]
    fn nullable_rule_falls_through_without_fail() {
        let mut rules = Map::new();
        rules.insert(
            Nonterminal::new("main"),
            Alt {
                productions: vec![vec![]],
                options: None,
            },
        );
        let grammar = Grammar {
            rules,
            start: Nonterminal::new("main"),
        };
        let analysis = analyze(&grammar).unwrap();
        let contexts = emit(&grammar, &analysis, None).unwrap();
        let entry = &contexts[&Nonterminal::new("main").canonical_name()];
        assert!(entry
            .iter()
            .any(|a| matches!(a, Action::Match(m) if m.pop.is_some())));
    }
}
