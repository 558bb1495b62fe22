use std::collections::HashSet;
use std::sync::Arc;

use crate::ast::*;
use crate::substitution::Substitution;


/**
 * Unifies `a` and `b` under `subst` without the occurs check.
 *
 * Returns the extended substitution, or `None` when the terms do not unify.
 * `subst` itself is left untouched.
 */
pub fn unify(a: &Term, b: &Term, subst: &Substitution) -> Option<Substitution> {
    unify_with(a, b, subst, false)
}

pub fn unify_with(a: &Term, b: &Term, subst: &Substitution, occurs_check: bool) -> Option<Substitution> {
    let mut extended = subst.clone();
    if unify_in_place(&mut extended, a, b, occurs_check) {
        Some(extended)
    } else {
        None
    }
}

/**
 * Unifies in place, extending `subst`. Arguments of compound terms are
 * matched left to right, each pair under the bindings made by the pairs
 * before it.
 *
 * On failure `subst` may hold partial bindings; callers take a `Mark`
 * beforehand and undo to it.
 *
 * With `occurs_check` off a variable can be bound to a term containing
 * itself, e.g. `X = f(X)`. Two such terms are compared as rational trees:
 * a pair of compound terms reached through bindings is only expanded once,
 * so unification terminates on cyclic bindings.
 */
pub fn unify_in_place(subst: &mut Substitution, a: &Term, b: &Term, occurs_check: bool) -> bool {
    let mut pending = vec![(a.clone(), b.clone())];
    let mut expanded: HashSet<(usize, usize)> = HashSet::new();

    while let Some((a, b)) = pending.pop() {
        let through_binding = matches!(a, Term::Variable(_)) || matches!(b, Term::Variable(_));
        let a = subst.walk(&a);
        let b = subst.walk(&b);
        match (&a, &b) {
            (Term::Variable(x), Term::Variable(y)) if x == y => (),
            (Term::Variable(x), _) => {
                if occurs_check && occurs(subst, *x, &b) {
                    return false;
                }
                subst.bind(*x, b.clone());
            },
            (_, Term::Variable(y)) => {
                if occurs_check && occurs(subst, *y, &a) {
                    return false;
                }
                subst.bind(*y, a.clone());
            },
            (Term::Atom(x), Term::Atom(y)) => {
                if x != y {
                    return false;
                }
            },
            (Term::Compound(x), Term::Compound(y)) => {
                if x.name != y.name || x.parameters.len() != y.parameters.len() {
                    return false;
                }
                if Arc::ptr_eq(&x.parameters, &y.parameters) {
                    continue;
                }
                // Every cycle runs through a binding, and the bound terms are
                // shared, so their argument lists identify them.
                if through_binding && !expanded.insert((address(x), address(y))) {
                    continue;
                }
                // Pushed in reverse so the leftmost pair is unified first.
                for (p, q) in x.parameters.iter().zip(y.parameters.iter()).rev() {
                    pending.push((p.clone(), q.clone()));
                }
            },
            _ => return false,
        }
    }

    true
}

fn address(compound: &CompoundTerm) -> usize {
    compound.parameters.as_ptr() as usize
}

/**
 * Whether `var` occurs in `term` once bindings are followed.
 */
pub fn occurs(subst: &Substitution, var: Var, term: &Term) -> bool {
    let mut pending = vec![term.clone()];
    let mut followed = Vec::new();
    while let Some(term) = pending.pop() {
        match term {
            Term::Variable(other) => {
                if other == var {
                    return true;
                }
                if followed.contains(&other) {
                    continue;
                }
                followed.push(other);
                if let Some(bound) = subst.get(other) {
                    pending.push(bound.clone());
                }
            },
            Term::Compound(compound) => pending.extend(compound.parameters.iter().cloned()),
            Term::Atom(_) => (),
        }
    }
    false
}
