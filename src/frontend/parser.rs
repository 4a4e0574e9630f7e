//! The SGL parser: recursive descent over the token stream from
//! [`crate::frontend::lexer`], producing the still-EBNF-sugared
//! [`RawGrammar`] the normalizer consumes, plus the header metadata that
//! becomes the output file's top-level fields.
//!
//! Parameterized rules (`name(a, b): ...;`) are actualized on demand: the
//! parser first collects every rule definition (possibly several
//! overloads of the same name, dispatched on literal argument patterns),
//! then [`actualize`] walks from the start symbol with a worklist,
//! mirroring `make_actualized_rules`/`find_matching_rule`'s demand-driven
//! instantiation instead of eagerly expanding every overload.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::context::{Context, MaybeContext};
use crate::error::{Error, GrammarError};
use crate::frontend::lexer::{lex, SyntaxError};
use crate::frontend::token::{Token, TokenKind};
use crate::grammar::types::{Expr, Nonterminal, RawAlternation, RawGrammar, RuleArg, Terminal};
use crate::serialize::Header;

const RESERVED_HEADER_VARS: &[&str] = &["NAME", "SCOPE", "EXTENSIONS", "FIRST_LINE", "SCOPE_POSTFIX", "HIDDEN"];

/// A grammar-body variable declared with `U_IDENT: element;`, usable
/// wherever a terminal or nonterminal reference is expected.
#[derive(Debug, Clone)]
enum VarValue {
    Terminal(Terminal),
    Nonterminal(Nonterminal),
}

/// One parameter slot in a rule's declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ParamPattern {
    /// Binds to whatever argument is supplied at the call site.
    Var(String),
    /// Requires the call-site argument to equal this value exactly,
    /// picking out one overload among several same-named rules.
    Literal(RuleArg),
}

#[derive(Debug, Clone)]
struct RuleDef {
    name: String,
    params: Vec<ParamPattern>,
    body: Vec<Vec<Expr>>,
    options: Option<String>,
}

/// The fully parsed grammar: header metadata plus a [`RawGrammar`] with
/// every reachable parameterized rule already actualized, ready for
/// [`crate::grammar::normalize::normalize`].
pub struct ParsedGrammar {
    pub header: Header,
    pub scope_postfix: Option<String>,
    pub grammar: RawGrammar,
    pub start: Nonterminal,
}

/// Parse a complete `.sbnf` source file. `global_args` are the CLI's
/// trailing positional arguments, substituted as literal-terminal
/// arguments to the top-level `main` rule when it is parameterized.
pub fn parse(source: &str, file_name: &str, global_args: &[String]) -> Result<ParsedGrammar, MaybeContext<Error>> {
    let tokens = lex(source, file_name).map_err(|c| MaybeContext::Context(c.map_kind(Error::from)))?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        file_name: file_name.to_string(),
        source_lines: source.lines().map(str::to_string).collect(),
        header: Header::default(),
        scope_postfix: None,
        vars: HashMap::new(),
        rule_defs: Vec::new(),
    };
    parser.parse_file().map_err(MaybeContext::Context)?;

    let args = global_args
        .iter()
        .map(|a| RuleArg::Terminal(Terminal::new(escape_literal(a))))
        .collect();
    let start = Nonterminal::with_args("main", args);
    let grammar = actualize(&parser.rule_defs, &start)
        .map_err(|e| MaybeContext::NoContext(Error::Grammar(e)))?;

    Ok(ParsedGrammar {
        header: parser.header,
        scope_postfix: parser.scope_postfix,
        grammar,
        start,
    })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    file_name: String,
    source_lines: Vec<String>,
    header: Header,
    scope_postfix: Option<String>,
    vars: HashMap<String, VarValue>,
    rule_defs: Vec<RuleDef>,
}

type PResult<T> = Result<T, Context<Error>>;

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn err_here(&self, kind: SyntaxError) -> Context<Error> {
        let tok = self.peek();
        let line_text = self.source_lines.get(tok.line).cloned().unwrap_or_default();
        Context::new(Error::Syntax(kind), line_text, tok.line, tok.col, self.file_name.clone())
    }

    fn expect(&mut self, matches_kind: impl Fn(&TokenKind) -> bool, expected: &str) -> PResult<Token> {
        if matches_kind(&self.peek().kind) {
            Ok(self.advance())
        } else {
            let found = self.peek().kind.to_string();
            Err(self.err_here(SyntaxError::UnexpectedToken {
                expected: expected.to_string(),
                found,
            }))
        }
    }

    fn eat(&mut self, matches_kind: impl Fn(&TokenKind) -> bool) -> bool {
        if matches_kind(&self.peek().kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn parse_file(&mut self) -> PResult<()> {
        while !self.at_eof() {
            match self.peek().kind.clone() {
                TokenKind::UIdent(name) => self.parse_var_statement(name)?,
                TokenKind::Ident(_) => self.parse_rule_def()?,
                _ => {
                    let found = self.peek().kind.to_string();
                    return Err(self.err_here(SyntaxError::UnexpectedToken {
                        expected: "a variable declaration or rule definition".to_string(),
                        found,
                    }));
                }
            }
        }
        Ok(())
    }

    fn parse_var_statement(&mut self, name: String) -> PResult<()> {
        self.advance(); // the UIdent itself
        self.expect(|k| matches!(k, TokenKind::Colon), "`:`")?;
        if RESERVED_HEADER_VARS.contains(&name.as_str()) {
            self.parse_header_var(&name)?;
        } else {
            let element = self.parse_element()?;
            let value = match element {
                Expr::Terminal(t) => VarValue::Terminal(t),
                Expr::Nonterminal(n) => VarValue::Nonterminal(n),
                _ => {
                    return Err(self.err_here(SyntaxError::UnexpectedToken {
                        expected: "a terminal or nonterminal".to_string(),
                        found: "a compound expression".to_string(),
                    }))
                }
            };
            self.vars.insert(name, value);
        }
        self.expect(|k| matches!(k, TokenKind::Semicolon), "`;`")?;
        Ok(())
    }

    fn parse_header_var(&mut self, name: &str) -> PResult<()> {
        match name {
            "NAME" => self.header.name = self.expect_literal()?,
            "SCOPE" => self.header.scope = self.expect_literal()?,
            "FIRST_LINE" => self.header.first_line_match = Some(self.expect_literal_or_regex()?),
            "SCOPE_POSTFIX" => self.scope_postfix = Some(self.expect_literal()?),
            "HIDDEN" => self.header.hidden = self.expect_bool_ident()?,
            "EXTENSIONS" => {
                let mut exts = vec![self.expect_ident()?];
                while self.eat(|k| matches!(k, TokenKind::Comma)) {
                    exts.push(self.expect_ident()?);
                }
                self.header.file_extensions = exts;
            }
            _ => unreachable!("caller only passes names from RESERVED_HEADER_VARS"),
        }
        Ok(())
    }

    fn expect_literal(&mut self) -> PResult<String> {
        let tok = self.expect(|k| matches!(k, TokenKind::Literal(_)), "a literal string")?;
        match tok.kind {
            TokenKind::Literal(s) => Ok(s),
            _ => unreachable!(),
        }
    }

    fn expect_literal_or_regex(&mut self) -> PResult<String> {
        let tok = self.expect(
            |k| matches!(k, TokenKind::Literal(_) | TokenKind::Regex(_)),
            "a literal string or regex",
        )?;
        match tok.kind {
            TokenKind::Literal(s) => Ok(escape_literal(&s)),
            TokenKind::Regex(s) => Ok(s),
            _ => unreachable!(),
        }
    }

    fn expect_ident(&mut self) -> PResult<String> {
        let tok = self.expect(|k| matches!(k, TokenKind::Ident(_)), "an identifier")?;
        match tok.kind {
            TokenKind::Ident(s) => Ok(s),
            _ => unreachable!(),
        }
    }

    fn expect_bool_ident(&mut self) -> PResult<bool> {
        let name = self.expect_ident()?;
        match name.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(self.err_here(SyntaxError::UnexpectedToken {
                expected: "`true` or `false`".to_string(),
                found: format!("`{other}`"),
            })),
        }
    }

    fn parse_rule_def(&mut self) -> PResult<()> {
        let name = self.expect_ident()?;
        let params = if self.eat(|k| matches!(k, TokenKind::LParen)) {
            let mut params = vec![self.parse_param()?];
            while self.eat(|k| matches!(k, TokenKind::Comma)) {
                params.push(self.parse_param()?);
            }
            self.expect(|k| matches!(k, TokenKind::RParen), "`)`")?;
            params
        } else {
            Vec::new()
        };
        let rule_options = self.maybe_options();
        self.expect(|k| matches!(k, TokenKind::Colon), "`:`")?;
        let alternation = self.parse_alternation()?;
        self.expect(|k| matches!(k, TokenKind::Semicolon), "`;`")?;

        self.rule_defs.push(RuleDef {
            name,
            params,
            body: alternation,
            options: rule_options,
        });
        Ok(())
    }

    fn parse_param(&mut self) -> PResult<ParamPattern> {
        match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(ParamPattern::Var(name))
            }
            TokenKind::Literal(_) | TokenKind::Regex(_) | TokenKind::UIdent(_) => {
                Ok(ParamPattern::Literal(self.parse_arg()?))
            }
            _ => {
                let found = self.peek().kind.to_string();
                Err(self.err_here(SyntaxError::UnexpectedToken {
                    expected: "a parameter name or literal pattern".to_string(),
                    found,
                }))
            }
        }
    }

    /// `{ ... }` immediately following the current position, if present.
    fn maybe_options(&mut self) -> Option<String> {
        if let TokenKind::Options(_) = self.peek().kind.clone() {
            let tok = self.advance();
            match tok.kind {
                TokenKind::Options(s) => Some(s),
                _ => unreachable!(),
            }
        } else {
            None
        }
    }

    fn parse_alternation(&mut self) -> PResult<Vec<Vec<Expr>>> {
        let mut productions = vec![self.parse_concatenation()?];
        while self.eat(|k| matches!(k, TokenKind::Pipe)) {
            productions.push(self.parse_concatenation()?);
        }
        Ok(productions)
    }

    fn parse_concatenation(&mut self) -> PResult<Vec<Expr>> {
        let mut elements = Vec::new();
        while self.starts_element() {
            elements.push(self.parse_element()?);
        }
        Ok(elements)
    }

    fn starts_element(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Tilde
                | TokenKind::Literal(_)
                | TokenKind::Regex(_)
                | TokenKind::Ident(_)
                | TokenKind::UIdent(_)
                | TokenKind::LParen
                | TokenKind::Percent
        )
    }

    fn parse_element(&mut self) -> PResult<Expr> {
        let passive = self.eat(|k| matches!(k, TokenKind::Tilde));
        let mut expr = self.parse_primary()?;
        if passive {
            expr = Expr::Passive(Box::new(expr));
        }
        loop {
            if self.eat(|k| matches!(k, TokenKind::Star)) {
                expr = Expr::Repetition(Box::new(expr));
            } else if self.eat(|k| matches!(k, TokenKind::Question)) {
                expr = Expr::Optional(Box::new(expr));
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        match self.peek().kind.clone() {
            TokenKind::Literal(s) => {
                self.advance();
                let options = self.maybe_options();
                let mut t = Terminal::new(escape_literal(&s));
                t.options = options;
                Ok(Expr::Terminal(t))
            }
            TokenKind::Regex(s) => {
                self.advance();
                let options = self.maybe_options();
                let mut t = Terminal::new(s);
                t.options = options;
                Ok(Expr::Terminal(t))
            }
            TokenKind::Percent => self.parse_embed_or_include(),
            TokenKind::Ident(name) => {
                self.advance();
                let args = if self.eat(|k| matches!(k, TokenKind::LParen)) {
                    let args = if matches!(self.peek().kind, TokenKind::RParen) {
                        Vec::new()
                    } else {
                        let mut args = vec![self.parse_arg()?];
                        while self.eat(|k| matches!(k, TokenKind::Comma)) {
                            args.push(self.parse_arg()?);
                        }
                        args
                    };
                    self.expect(|k| matches!(k, TokenKind::RParen), "`)`")?;
                    args
                } else {
                    Vec::new()
                };
                Ok(Expr::Nonterminal(Nonterminal::with_args(name, args)))
            }
            TokenKind::UIdent(name) => {
                self.advance();
                match self.vars.get(&name) {
                    Some(VarValue::Terminal(t)) => Ok(Expr::Terminal(t.clone())),
                    Some(VarValue::Nonterminal(n)) => Ok(Expr::Nonterminal(n.clone())),
                    None => Err(self.err_here(SyntaxError::UnexpectedToken {
                        expected: "a previously declared variable".to_string(),
                        found: format!("undeclared variable `{name}`"),
                    })),
                }
            }
            TokenKind::LParen => {
                self.advance();
                let productions = self.parse_alternation()?;
                self.expect(|k| matches!(k, TokenKind::RParen), "`)`")?;
                Ok(Expr::Alternation(RawAlternation {
                    productions,
                    options: None,
                }))
            }
            _ => {
                let found = self.peek().kind.to_string();
                Err(self.err_here(SyntaxError::UnexpectedToken {
                    expected: "a terminal, rule reference, or `(`".to_string(),
                    found,
                }))
            }
        }
    }

    fn parse_embed_or_include(&mut self) -> PResult<Expr> {
        self.advance(); // '%'
        let keyword = self.expect_ident()?;
        let is_embed = match keyword.as_str() {
            "embed" => true,
            "include" => false,
            other => {
                return Err(self.err_here(SyntaxError::UnexpectedToken {
                    expected: "`embed` or `include`".to_string(),
                    found: format!("`{other}`"),
                }))
            }
        };
        let args = if self.eat(|k| matches!(k, TokenKind::LParen)) {
            let args = if matches!(self.peek().kind, TokenKind::RParen) {
                Vec::new()
            } else {
                let mut args = vec![self.parse_arg()?];
                while self.eat(|k| matches!(k, TokenKind::Comma)) {
                    args.push(self.parse_arg()?);
                }
                args
            };
            self.expect(|k| matches!(k, TokenKind::RParen), "`)`")?;
            args
        } else {
            Vec::new()
        };
        // The embed scope / include target is a bare name, used verbatim
        // (not regex-escaped) by the emitter as `embed:`/the `set:` target.
        let target = self.expect_literal()?;
        let trigger = self.expect_literal_or_regex()?;
        let options = self.maybe_options();

        let mut t = Terminal::new(trigger);
        t.options = options;
        if is_embed {
            t.embed = Some((args, target));
        } else {
            t.include = Some((args, target));
        }
        Ok(Expr::Terminal(t))
    }

    fn parse_arg(&mut self) -> PResult<RuleArg> {
        match self.peek().kind.clone() {
            TokenKind::Literal(s) => {
                self.advance();
                Ok(RuleArg::Terminal(Terminal::new(escape_literal(&s))))
            }
            TokenKind::Regex(s) => {
                self.advance();
                Ok(RuleArg::Terminal(Terminal::new(s)))
            }
            TokenKind::UIdent(name) => {
                self.advance();
                match self.vars.get(&name) {
                    Some(VarValue::Terminal(t)) => Ok(RuleArg::Terminal(t.clone())),
                    Some(VarValue::Nonterminal(n)) => Ok(RuleArg::Nonterminal(n.clone())),
                    None => Err(self.err_here(SyntaxError::UnexpectedToken {
                        expected: "a previously declared variable".to_string(),
                        found: format!("undeclared variable `{name}`"),
                    })),
                }
            }
            TokenKind::Ident(name) => {
                self.advance();
                let args = if self.eat(|k| matches!(k, TokenKind::LParen)) {
                    let mut args = vec![self.parse_arg()?];
                    while self.eat(|k| matches!(k, TokenKind::Comma)) {
                        args.push(self.parse_arg()?);
                    }
                    self.expect(|k| matches!(k, TokenKind::RParen), "`)`")?;
                    args
                } else {
                    Vec::new()
                };
                Ok(RuleArg::Nonterminal(Nonterminal::with_args(name, args)))
            }
            _ => {
                let found = self.peek().kind.to_string();
                Err(self.err_here(SyntaxError::UnexpectedToken {
                    expected: "an argument".to_string(),
                    found,
                }))
            }
        }
    }
}

/// Escapes regex metacharacters in a backtick literal so it matches only
/// its own literal text.
fn escape_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Walks from `start`, actualizing every reachable parameterized rule
/// on demand via a worklist, the way `make_actualized_rules` expands
/// call sites lazily instead of instantiating every overload up front.
fn actualize(rule_defs: &[RuleDef], start: &Nonterminal) -> Result<RawGrammar, GrammarError> {
    let mut grammar = RawGrammar::new();
    let mut queued: HashSet<Nonterminal> = HashSet::new();
    let mut todo: VecDeque<Nonterminal> = VecDeque::new();

    let start_active = start.as_active();
    queued.insert(start_active.clone());
    todo.push_back(start_active);

    while let Some(nt) = todo.pop_front() {
        let def = find_matching_rule(rule_defs, &nt)?;
        let bindings = bind_params(&def.params, &nt.args);
        let productions: Vec<Vec<Expr>> = def
            .body
            .iter()
            .map(|prod| prod.iter().map(|e| subst_expr(e, &bindings)).collect())
            .collect();

        for production in &productions {
            for expr in production {
                collect_nonterminal_refs(expr, &mut |n: &Nonterminal| {
                    let key = n.as_active();
                    if queued.insert(key.clone()) {
                        todo.push_back(key);
                    }
                });
            }
        }

        grammar.insert(
            nt,
            RawAlternation {
                productions,
                options: def.options.clone(),
            },
        );
    }

    Ok(grammar)
}

fn find_matching_rule<'a>(rule_defs: &'a [RuleDef], nt: &Nonterminal) -> Result<&'a RuleDef, GrammarError> {
    let candidates: Vec<&RuleDef> = rule_defs.iter().filter(|d| d.name == nt.symbol).collect();
    if candidates.is_empty() {
        return Err(GrammarError::MissingRule(nt.symbol.clone()));
    }
    let same_arity: Vec<&&RuleDef> = candidates.iter().filter(|d| d.params.len() == nt.args.len()).collect();
    if same_arity.is_empty() {
        return Err(GrammarError::ArityMismatch {
            name: nt.symbol.clone(),
            expected: candidates[0].params.len(),
            found: nt.args.len(),
        });
    }
    for def in same_arity {
        let matches = def
            .params
            .iter()
            .zip(nt.args.iter())
            .all(|(p, a)| match p {
                ParamPattern::Var(_) => true,
                ParamPattern::Literal(lit) => lit == a,
            });
        if matches {
            return Ok(def);
        }
    }
    Err(GrammarError::NoMatchingRule {
        name: nt.symbol.clone(),
        arity: nt.args.len(),
    })
}

fn bind_params<'a>(params: &'a [ParamPattern], args: &'a [RuleArg]) -> HashMap<&'a str, &'a RuleArg> {
    params
        .iter()
        .zip(args.iter())
        .filter_map(|(p, a)| match p {
            ParamPattern::Var(name) => Some((name.as_str(), a)),
            ParamPattern::Literal(_) => None,
        })
        .collect()
}

fn subst_arg(arg: &RuleArg, bindings: &HashMap<&str, &RuleArg>) -> RuleArg {
    match arg {
        RuleArg::Terminal(_) => arg.clone(),
        RuleArg::Nonterminal(n) => {
            if n.args.is_empty() && !n.passive {
                if let Some(bound) = bindings.get(n.symbol.as_str()) {
                    return (*bound).clone();
                }
            }
            let new_args = n.args.iter().map(|a| subst_arg(a, bindings)).collect();
            RuleArg::Nonterminal(Nonterminal {
                symbol: n.symbol.clone(),
                args: new_args,
                passive: n.passive,
            })
        }
    }
}

fn subst_expr(expr: &Expr, bindings: &HashMap<&str, &RuleArg>) -> Expr {
    match expr {
        Expr::Terminal(_) => expr.clone(),
        Expr::Nonterminal(n) => {
            if n.args.is_empty() && !n.passive {
                if let Some(bound) = bindings.get(n.symbol.as_str()) {
                    return match bound {
                        RuleArg::Terminal(t) => Expr::Terminal(t.clone()),
                        RuleArg::Nonterminal(nt) => Expr::Nonterminal(nt.clone()),
                    };
                }
            }
            let new_args = n.args.iter().map(|a| subst_arg(a, bindings)).collect();
            Expr::Nonterminal(Nonterminal {
                symbol: n.symbol.clone(),
                args: new_args,
                passive: n.passive,
            })
        }
        Expr::Concatenation(items) => Expr::Concatenation(items.iter().map(|e| subst_expr(e, bindings)).collect()),
        Expr::Alternation(alt) => Expr::Alternation(RawAlternation {
            productions: alt
                .productions
                .iter()
                .map(|p| p.iter().map(|e| subst_expr(e, bindings)).collect())
                .collect(),
            options: alt.options.clone(),
        }),
        Expr::Repetition(sub) => Expr::Repetition(Box::new(subst_expr(sub, bindings))),
        Expr::Optional(sub) => Expr::Optional(Box::new(subst_expr(sub, bindings))),
        Expr::Passive(sub) => Expr::Passive(Box::new(subst_expr(sub, bindings))),
        Expr::Skip => Expr::Skip,
    }
}

fn collect_nonterminal_refs(expr: &Expr, f: &mut impl FnMut(&Nonterminal)) {
    match expr {
        Expr::Terminal(_) | Expr::Skip => {}
        Expr::Nonterminal(n) => f(n),
        Expr::Concatenation(items) => items.iter().for_each(|e| collect_nonterminal_refs(e, f)),
        Expr::Alternation(alt) => alt
            .productions
            .iter()
            .for_each(|p| p.iter().for_each(|e| collect_nonterminal_refs(e, f))),
        Expr::Repetition(sub) | Expr::Optional(sub) | Expr::Passive(sub) => collect_nonterminal_refs(sub, f),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_single_rule() {
        let src = r#"
            NAME: `Test Language`;
            SCOPE: `source.test`;
            EXTENSIONS: test, tst;
            main: `if` expr* ;
            expr: `x` | `y` ;
        "#;
        let parsed = parse(src, "test.sbnf", &[]).unwrap();
        assert_eq!(parsed.header.name, "Test Language");
        assert_eq!(parsed.header.scope, "source.test");
        assert_eq!(parsed.header.file_extensions, vec!["test", "tst"]);
        assert!(parsed.grammar.contains_key(&Nonterminal::new("main")));
        assert!(parsed.grammar.contains_key(&Nonterminal::new("expr")));
    }

    #[test]
    fn actualizes_parameterized_rule_per_call_site() {
        let src = r#"
            NAME: `Test`;
            SCOPE: `source.test`;
            main: list(`a`) | list(`b`) ;
            list(x): x* ;
        "#;
        let parsed = parse(src, "test.sbnf", &[]).unwrap();
        assert_eq!(parsed.grammar.len(), 3); // main + list(a) + list(b)
    }

    #[test]
    fn missing_rule_is_reported() {
        let src = "main: nope;";
        let err = parse(src, "test.sbnf", &[]).unwrap_err();
        match err {
            MaybeContext::NoContext(Error::Grammar(GrammarError::MissingRule(name))) => {
                assert_eq!(name, "nope");
            }
            other => panic!("expected MissingRule, got {other:?}"),
        }
    }

    #[test]
    fn passive_prefix_wraps_expression() {
        let src = "main: ~`x` `y`;";
        let parsed = parse(src, "test.sbnf", &[]).unwrap();
        let alt = &parsed.grammar[&Nonterminal::new("main")];
        assert!(matches!(alt.productions[0][0], Expr::Passive(_)));
    }

    #[test]
    fn parses_embed_directive_with_target_and_options() {
        let src = "main: % embed `source.js` '<script>' {escape: `</script>`} ;";
        let parsed = parse(src, "test.sbnf", &[]).unwrap();
        let alt = &parsed.grammar[&Nonterminal::new("main")];
        match &alt.productions[0][0] {
            Expr::Terminal(t) => {
                assert_eq!(t.embed.as_ref().unwrap().1, "source.js");
                assert!(t.options.is_some());
            }
            other => panic!("expected a terminal, got {other:?}"),
        }
    }

    #[test]
    fn global_args_become_literal_terminals_for_main() {
        let src = "main(x): x;";
        let parsed = parse(src, "test.sbnf", &["hello".to_string()]).unwrap();
        assert_eq!(parsed.start.args.len(), 1);
        assert!(parsed.grammar.contains_key(&parsed.start));
    }
}
