use crate::ast::*;

/**
 * Bindings from variable ids to terms.
 *
 * Each variable is bound at most once. Bindings are recorded on a trail so a
 * search can take a `Mark` and later discard everything bound after it, which
 * is how backtracking restores an earlier substitution. Fresh variable ranges
 * for renamed clauses are handed out by `alloc`.
 */
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Substitution {
    cells: Vec<Option<Term>>,
    trail: Vec<Var>,
    next_var: usize,
}

/**
 * A restorable snapshot of a substitution.
 */
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Mark {
    trail: usize,
    next_var: usize,
}

impl Substitution {
    pub fn new() -> Self {
        Substitution::default()
    }

    /**
     * Reserves `size` fresh variable ids and returns the first one. Any id
     * at or above the returned base has never been bound.
     */
    pub fn alloc(&mut self, size: usize) -> usize {
        let base = self.next_var;
        self.next_var += size;
        base
    }

    pub fn get(&self, var: Var) -> Option<&Term> {
        match self.cells.get(var.0) {
            Some(Some(term)) => Some(term),
            _ => None,
        }
    }

    /**
     * Binds an unbound variable. Rebinding is a logic error in the caller.
     */
    pub fn bind(&mut self, var: Var, term: Term) {
        debug_assert!(self.get(var).is_none(), "variable {:?} is already bound", var);
        if self.cells.len() <= var.0 {
            self.cells.resize(var.0 + 1, None);
        }
        self.cells[var.0] = Some(term);
        self.trail.push(var);
        if self.next_var <= var.0 {
            self.next_var = var.0 + 1;
        }
    }

    pub fn len(&self) -> usize {
        self.trail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trail.is_empty()
    }

    /**
     * Bindings in the order they were made.
     */
    pub fn iter(&self) -> impl Iterator<Item = (Var, &Term)> + '_ {
        self.trail.iter().filter_map(move |var| self.get(*var).map(|term| (*var, term)))
    }

    pub fn mark(&self) -> Mark {
        Mark { trail: self.trail.len(), next_var: self.next_var }
    }

    /**
     * Drops every binding and allocation made after `mark`.
     */
    pub fn undo(&mut self, mark: Mark) {
        while self.trail.len() > mark.trail {
            if let Some(var) = self.trail.pop() {
                self.cells[var.0] = None;
            }
        }
        self.next_var = mark.next_var;
        if self.cells.len() > mark.next_var {
            self.cells.truncate(mark.next_var);
        }
    }

    /**
     * Follows variable bindings until reaching an unbound variable or a
     * non-variable term.
     */
    pub fn walk(&self, term: &Term) -> Term {
        let mut current = term;
        while let Term::Variable(var) = current {
            match self.get(*var) {
                Some(bound) => current = bound,
                None => break,
            }
        }
        current.clone()
    }

    /**
     * Applies the substitution throughout `term`.
     *
     * Without the occurs check a variable may end up bound to a term that
     * contains it. Expansion stops at such a variable and leaves it in place,
     * so resolving always terminates.
     */
    pub fn resolve(&self, term: &Term) -> Term {
        let mut expanding = Vec::new();
        self.resolve_inner(term, &mut expanding)
    }

    fn resolve_inner(&self, term: &Term, expanding: &mut Vec<Var>) -> Term {
        match term {
            Term::Atom(_) => term.clone(),
            Term::Variable(var) => {
                if expanding.contains(var) {
                    return term.clone();
                }
                match self.get(*var) {
                    Some(bound) => {
                        expanding.push(*var);
                        let resolved = self.resolve_inner(bound, expanding);
                        expanding.pop();
                        resolved
                    },
                    None => term.clone(),
                }
            },
            Term::Compound(compound) => Term::Compound(CompoundTerm {
                name: compound.name.clone(),
                parameters: compound
                    .parameters
                    .iter()
                    .map(|p| self.resolve_inner(p, expanding))
                    .collect(),
            }),
        }
    }
}
