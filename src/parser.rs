use pest::error::{ErrorVariant, InputLocation, LineColLocation};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::ast::*;
use crate::error::ParseError;

#[derive(Parser)]
#[grammar = "grammar.pest"]
struct ClauseParser;

/**
 * Parses a whole program: any number of facts and rules, each terminated by
 * a period. `%` starts a comment running to the end of the line.
 */
pub fn parse_program(code: &str) -> Result<Vec<Clause>, ParseError> {
    diagnose(code, Expect::Clause)?;
    let parsed_program = parse_top(Rule::program, code)?;

    let mut program = Vec::new();
    for pair in parsed_program.into_inner() {
        match pair.as_rule() {
            Rule::clause => program.push(construct_clause(pair)?),
            Rule::EOI => (),
            _ => return Err(unexpected(&pair)),
        }
    }

    Ok(program)
}

/**
 * Parses `head.` where head is an atom or compound term.
 */
pub fn parse_fact(code: &str) -> Result<Clause, ParseError> {
    diagnose(code, Expect::Clause)?;
    let pair = match parse_top(Rule::fact_text, code) {
        Ok(pair) => pair,
        Err(err) if parses_as(Rule::rule_text, code) => {
            return Err(ParseError::new(err.line, err.column, "expected a fact but found a rule"))
        },
        Err(err) => return Err(err),
    };
    construct_clause(pair)
}

/**
 * Parses `head :- goal, ..., goal.` with at least one body goal.
 */
pub fn parse_rule(code: &str) -> Result<Clause, ParseError> {
    diagnose(code, Expect::Clause)?;
    let pair = match parse_top(Rule::rule_text, code) {
        Ok(pair) => pair,
        Err(err) if parses_as(Rule::fact_text, code) => {
            return Err(ParseError::new(err.line, err.column, "expected `:-` followed by the rule body"))
        },
        Err(err) => return Err(err),
    };
    construct_clause(pair)
}

/**
 * Parses a goal or a comma-separated conjunction of goals. A trailing
 * period is accepted but not required.
 */
pub fn parse_query(code: &str) -> Result<Query, ParseError> {
    diagnose(code, Expect::Query)?;
    let pair = parse_top(Rule::query_text, code)?;

    let mut scope = Scope::new();
    let mut goals = Vec::new();
    for pair in pair.into_inner() {
        match pair.as_rule() {
            Rule::goals => goals = construct_goals(pair, &mut scope)?,
            Rule::EOI => (),
            _ => return Err(unexpected(&pair)),
        }
    }

    Ok(Query::new(goals, scope.names))
}

fn parse_top(rule: Rule, code: &str) -> Result<Pair<'_, Rule>, ParseError> {
    let mut pairs = ClauseParser::parse(rule, code).map_err(|err| from_pest(err, rule, code))?;
    match pairs.next() {
        Some(pair) => Ok(pair),
        None => Err(ParseError::at_offset(code, 0, "empty input")),
    }
}

/**
 * Variable names seen so far in one clause or query. Each anonymous `_`
 * gets its own id.
 */
struct Scope {
    names: Vec<String>,
}

impl Scope {
    fn new() -> Self {
        Scope { names: Vec::new() }
    }

    fn lookup(&mut self, name: &str) -> Var {
        if name != "_" {
            if let Some(id) = self.names.iter().position(|n| n == name) {
                return Var(id);
            }
        }
        self.names.push(name.to_string());
        Var(self.names.len() - 1)
    }
}

fn construct_clause(pair: Pair<Rule>) -> Result<Clause, ParseError> {
    let mut scope = Scope::new();
    let mut head = None;
    let mut body = Vec::new();

    for pair in pair.into_inner() {
        match pair.as_rule() {
            Rule::term if head.is_none() => head = Some(construct_callable(pair, &mut scope, "clause head")?),
            Rule::goals => body = construct_goals(pair, &mut scope)?,
            Rule::EOI => (),
            _ => return Err(unexpected(&pair)),
        }
    }

    match head {
        Some(head) => Ok(Clause::new(head, body, scope.names)),
        None => Err(ParseError::new(1, 1, "clause has an empty head")),
    }
}

fn construct_goals(pair: Pair<Rule>, scope: &mut Scope) -> Result<Vec<Term>, ParseError> {
    let mut goals = Vec::new();
    for pair in pair.into_inner() {
        goals.push(construct_callable(pair, scope, "goal")?);
    }
    Ok(goals)
}

/**
 * A term in head or goal position must be an atom or compound term.
 */
fn construct_callable(pair: Pair<Rule>, scope: &mut Scope, what: &str) -> Result<Term, ParseError> {
    let (line, column) = pair.as_span().start_pos().line_col();
    let text = pair.as_str().to_string();
    let term = construct_term(pair, scope)?;
    match term {
        Term::Variable(_) => Err(ParseError::new(
            line,
            column,
            format!("{} cannot be a variable: `{}`", what, text),
        )),
        _ => Ok(term),
    }
}

fn construct_term(pair: Pair<Rule>, scope: &mut Scope) -> Result<Term, ParseError> {
    match pair.as_rule() {
        Rule::term => construct_term(first_inner(pair)?, scope),
        Rule::variable => Ok(Term::Variable(scope.lookup(pair.as_str()))),
        Rule::atom => Ok(Term::atom(&atom_text(pair)?)),
        Rule::compound_term => construct_compound_term(pair, scope),
        _ => Err(unexpected(&pair)),
    }
}

fn construct_compound_term(pair: Pair<Rule>, scope: &mut Scope) -> Result<Term, ParseError> {
    let mut it = pair.into_inner();
    let name = match it.next() {
        Some(functor) => atom_text(functor)?,
        None => return Err(ParseError::new(1, 1, "compound term without a functor")),
    };

    let mut parameters = Vec::new();
    for pair in it {
        parameters.push(construct_term(pair, scope)?);
    }

    Ok(Term::compound(&name, parameters))
}

fn atom_text(pair: Pair<Rule>) -> Result<String, ParseError> {
    match pair.as_rule() {
        Rule::name | Rule::number | Rule::single_quoted | Rule::double_quoted => Ok(pair.as_str().to_string()),
        Rule::atom | Rule::functor | Rule::quoted => atom_text(first_inner(pair)?),
        _ => Err(unexpected(&pair)),
    }
}

fn first_inner(pair: Pair<Rule>) -> Result<Pair<Rule>, ParseError> {
    let (line, column) = pair.as_span().start_pos().line_col();
    match pair.into_inner().next() {
        Some(inner) => Ok(inner),
        None => Err(ParseError::new(line, column, "incomplete term")),
    }
}

fn parses_as(rule: Rule, code: &str) -> bool {
    ClauseParser::parse(rule, code).is_ok()
}

fn unexpected(pair: &Pair<Rule>) -> ParseError {
    let (line, column) = pair.as_span().start_pos().line_col();
    ParseError::new(line, column, format!("unexpected `{}`", pair.as_str()))
}

fn from_pest(err: pest::error::Error<Rule>, rule: Rule, code: &str) -> ParseError {
    let (line, column) = match err.line_col {
        LineColLocation::Pos(pos) => pos,
        LineColLocation::Span(start, _) => start,
    };
    let offset = match err.location {
        InputLocation::Pos(pos) => pos,
        InputLocation::Span((start, _)) => start,
    };
    let reason = match &err.variant {
        ErrorVariant::ParsingError { positives, .. } if expects_term(positives) && starts_with_neck(code, offset) => {
            match rule {
                Rule::query_text => String::from("query has no goals"),
                _ => String::from("clause has an empty head"),
            }
        },
        ErrorVariant::ParsingError { positives, negatives } => describe(positives, negatives),
        ErrorVariant::CustomError { message } => message.clone(),
    };
    ParseError::new(line, column, reason)
}

fn expects_term(positives: &[Rule]) -> bool {
    positives.iter().any(|rule| {
        matches!(
            rule,
            Rule::term | Rule::compound_term | Rule::atom | Rule::variable | Rule::functor | Rule::name | Rule::goals | Rule::clause
        )
    })
}

fn starts_with_neck(code: &str, offset: usize) -> bool {
    code.get(offset..).map_or(false, |rest| rest.trim_start().starts_with(":-"))
}

fn describe(positives: &[Rule], negatives: &[Rule]) -> String {
    let mut expected: Vec<&str> = Vec::new();
    for rule in positives {
        let description = describe_rule(*rule);
        if !expected.contains(&description) {
            expected.push(description);
        }
    }
    if !expected.is_empty() {
        return format!("expected {}", expected.join(" or "));
    }
    match negatives.first() {
        Some(rule) => format!("unexpected {}", describe_rule(*rule)),
        None => String::from("unexpected input"),
    }
}

fn describe_rule(rule: Rule) -> &'static str {
    match rule {
        Rule::name | Rule::functor => "an atom",
        Rule::variable => "a variable",
        Rule::term | Rule::atom | Rule::number | Rule::quoted | Rule::compound_term => "a term",
        Rule::goals => "a goal",
        Rule::clause => "a clause",
        Rule::EOI => "end of input",
        _ => "valid syntax",
    }
}

#[derive(Copy, Clone, PartialEq)]
enum Expect {
    Clause,
    Query,
}

/**
 * Scans raw text for errors pest would report with a less useful message:
 * unbalanced parentheses, unterminated quotes and a missing final period.
 */
fn diagnose(code: &str, expect: Expect) -> Result<(), ParseError> {
    let mut open_parens: Vec<usize> = Vec::new();
    let mut last_significant: Option<(usize, char)> = None;
    let mut chars = code.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        match c {
            '%' => {
                while let Some((_, c)) = chars.peek() {
                    if *c == '\n' {
                        break;
                    }
                    chars.next();
                }
                continue;
            },
            c if c.is_whitespace() => continue,
            '\'' | '"' => {
                let mut closed = false;
                for (_, inner) in chars.by_ref() {
                    if inner == c {
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(ParseError::at_offset(code, offset, "unterminated quoted atom"));
                }
            },
            '(' => open_parens.push(offset),
            ')' => {
                if open_parens.pop().is_none() {
                    return Err(ParseError::at_offset(code, offset, "unbalanced `)` without matching `(`"));
                }
            },
            _ => (),
        }
        last_significant = Some((offset, c));
    }

    if let Some(offset) = open_parens.first() {
        return Err(ParseError::at_offset(code, *offset, "unbalanced `(` is never closed"));
    }

    if expect == Expect::Clause {
        match last_significant {
            Some((_, '.')) | None => (),
            Some((offset, c)) => {
                return Err(ParseError::at_offset(
                    code,
                    offset + c.len_utf8(),
                    "unterminated clause: expected `.`",
                ))
            },
        }
    }

    Ok(())
}
