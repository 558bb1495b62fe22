use std::fmt;
use std::sync::Arc;

/**
 * Identity of a logic variable. Source names are only kept for display;
 * two variables are the same iff their ids are equal.
 */
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(pub usize);

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Term {
    Atom(Arc<str>),
    Variable(Var),
    Compound(CompoundTerm),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompoundTerm {
    pub name: Arc<str>,
    pub parameters: Arc<[Term]>,
}

/**
 * Functor name and arity of a callable term. Atoms are predicates of
 * arity zero.
 */
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PredicateKey {
    pub name: Arc<str>,
    pub arity: usize,
}

/**
 * A stored Horn clause. Variables are numbered locally from zero; `var_names`
 * holds the source name of each one (`_` for anonymous variables).
 */
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Clause {
    pub(crate) head: Term,
    pub(crate) body: Vec<Term>,
    pub(crate) var_names: Vec<String>,
}

/**
 * A parsed query: a conjunction of goals over locally numbered variables.
 */
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    pub(crate) goals: Vec<Term>,
    pub(crate) var_names: Vec<String>,
}

impl Term {
    pub fn atom(name: &str) -> Self {
        Term::Atom(Arc::from(name))
    }

    pub fn var(id: usize) -> Self {
        Term::Variable(Var(id))
    }

    pub fn compound(name: &str, parameters: Vec<Term>) -> Self {
        Term::Compound(CompoundTerm {
            name: Arc::from(name),
            parameters: parameters.into(),
        })
    }

    pub fn key(&self) -> Option<PredicateKey> {
        match self {
            Term::Atom(name) => Some(PredicateKey { name: name.clone(), arity: 0 }),
            Term::Compound(term) => Some(PredicateKey {
                name: term.name.clone(),
                arity: term.parameters.len(),
            }),
            Term::Variable(_) => None,
        }
    }

    pub fn is_ground(&self) -> bool {
        let mut pending = vec![self];
        while let Some(term) = pending.pop() {
            match term {
                Term::Atom(_) => (),
                Term::Variable(_) => return false,
                Term::Compound(term) => pending.extend(term.parameters.iter()),
            }
        }
        true
    }

    /**
     * Every variable occurring in the term, in left-to-right order of first
     * occurrence.
     */
    pub fn variables(&self) -> Vec<Var> {
        let mut found = Vec::new();
        self.collect_variables(&mut found);
        found
    }

    fn collect_variables(&self, found: &mut Vec<Var>) {
        match self {
            Term::Atom(_) => (),
            Term::Variable(var) => {
                if !found.contains(var) {
                    found.push(*var);
                }
            },
            Term::Compound(term) => {
                for parameter in term.parameters.iter() {
                    parameter.collect_variables(found);
                }
            },
        }
    }

    /**
     * Shifts every variable id by `base`. Used to rename a stored clause
     * apart before it is resolved against a goal.
     */
    pub fn offset(&self, base: usize) -> Term {
        if base == 0 {
            return self.clone();
        }
        match self {
            Term::Atom(_) => self.clone(),
            Term::Variable(Var(id)) => Term::Variable(Var(id + base)),
            Term::Compound(term) => Term::Compound(CompoundTerm {
                name: term.name.clone(),
                parameters: term.parameters.iter().map(|p| p.offset(base)).collect(),
            }),
        }
    }

    /**
     * Renders the term, naming variables `names[id]` where available and
     * `_G<id>` otherwise.
     */
    pub fn display_with<'a>(&'a self, names: &'a [String]) -> TermDisplay<'a> {
        TermDisplay { term: self, names }
    }
}

pub struct TermDisplay<'a> {
    term: &'a Term,
    names: &'a [String],
}

impl fmt::Display for TermDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_term(f, self.term, self.names)
    }
}

fn write_term(f: &mut fmt::Formatter<'_>, term: &Term, names: &[String]) -> fmt::Result {
    match term {
        Term::Atom(name) => write_atom(f, name),
        Term::Variable(Var(id)) => match names.get(*id) {
            Some(name) if name != "_" => write!(f, "{}", name),
            _ => write!(f, "_G{}", id),
        },
        Term::Compound(term) => {
            write_atom(f, &term.name)?;
            write!(f, "(")?;
            for (i, parameter) in term.parameters.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_term(f, parameter, names)?;
            }
            write!(f, ")")
        },
    }
}

fn write_atom(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    if is_plain_atom(name) {
        write!(f, "{}", name)
    } else if name.contains('\'') {
        write!(f, "\"{}\"", name)
    } else {
        write!(f, "'{}'", name)
    }
}

fn is_plain_atom(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        Some(c) if c.is_ascii_digit() => chars.all(|c| c.is_ascii_digit()),
        _ => false,
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_term(f, self, &[])
    }
}

impl fmt::Display for PredicateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_atom(f, &self.name)?;
        write!(f, "/{}", self.arity)
    }
}

impl Clause {
    pub(crate) fn new(head: Term, body: Vec<Term>, var_names: Vec<String>) -> Self {
        Clause { head, body, var_names }
    }

    pub fn head(&self) -> &Term {
        &self.head
    }

    pub fn body(&self) -> &[Term] {
        &self.body
    }

    pub fn is_fact(&self) -> bool {
        self.body.is_empty()
    }

    pub fn var_count(&self) -> usize {
        self.var_names.len()
    }

    pub fn key(&self) -> PredicateKey {
        // Heads are checked to be callable when the clause is built.
        match self.head.key() {
            Some(key) => key,
            None => unreachable!("clause head is a variable"),
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_term(f, &self.head, &self.var_names)?;
        for (i, goal) in self.body.iter().enumerate() {
            if i == 0 {
                write!(f, " :- ")?;
            } else {
                write!(f, ", ")?;
            }
            write_term(f, goal, &self.var_names)?;
        }
        write!(f, ".")
    }
}

impl Query {
    pub(crate) fn new(goals: Vec<Term>, var_names: Vec<String>) -> Self {
        Query { goals, var_names }
    }

    pub fn goals(&self) -> &[Term] {
        &self.goals
    }

    pub fn var_count(&self) -> usize {
        self.var_names.len()
    }

    pub fn var_names(&self) -> &[String] {
        &self.var_names
    }

    /**
     * Named variables reported in solutions, in order of first appearance.
     */
    pub fn named_variables(&self) -> impl Iterator<Item = (&str, Var)> + '_ {
        self.var_names
            .iter()
            .enumerate()
            .filter(|(_, name)| name.as_str() != "_")
            .map(|(id, name)| (name.as_str(), Var(id)))
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, goal) in self.goals.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write_term(f, goal, &self.var_names)?;
        }
        Ok(())
    }
}
