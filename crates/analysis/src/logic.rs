//! The boolean algebra of lowered pattern constraints.
//!
//! Lowering turns a pattern into a [`Tests`] tree over primitive checks.
//! Construction-time simplification keeps the trees in a flat normal form:
//! `AndSequence`/`OrSequence` never nest their own kind, never contain
//! their identity element, and never survive as singletons.

use std::sync::Arc;

use domain::ValueSet;

use crate::temp::{DagEvaluation, DagTemp, DagTest};

/// A single step of a case: perform an evaluation, or ask a boolean test.
/// Evaluations always "succeed"; they exist to order side computations
/// before the tests that consume their outputs.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DagCheck {
    Eval(Arc<DagEvaluation>),
    Test(DagTest),
}

impl DagCheck {
    pub fn input(&self) -> &DagTemp {
        match self {
            DagCheck::Eval(eval) => eval.input(),
            DagCheck::Test(test) => test.input(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tests {
    /// Always succeeds; the identity for `AndSequence`.
    True,
    /// Never succeeds; the identity for `OrSequence`.
    False,
    One(DagCheck),
    Not(Box<Tests>),
    AndSequence(Vec<Tests>),
    OrSequence(Vec<Tests>),
}

impl Tests {
    pub fn eval(eval: Arc<DagEvaluation>) -> Self {
        Tests::One(DagCheck::Eval(eval))
    }

    pub fn test(test: DagTest) -> Self {
        Tests::One(DagCheck::Test(test))
    }

    pub fn and(children: impl IntoIterator<Item = Tests>) -> Self {
        let mut seq = Vec::new();
        for child in children {
            match child {
                Tests::True => {}
                Tests::False => return Tests::False,
                Tests::AndSequence(inner) => seq.extend(inner),
                other => seq.push(other),
            }
        }
        match seq.len() {
            0 => Tests::True,
            1 => seq.pop().unwrap(),
            _ => Tests::AndSequence(seq),
        }
    }

    pub fn or(children: impl IntoIterator<Item = Tests>) -> Self {
        let mut seq = Vec::new();
        for child in children {
            match child {
                Tests::False => {}
                Tests::True => return Tests::True,
                Tests::OrSequence(inner) => seq.extend(inner),
                other => seq.push(other),
            }
        }
        match seq.len() {
            0 => Tests::False,
            1 => seq.pop().unwrap(),
            _ => Tests::OrSequence(seq),
        }
    }

    pub fn not(inner: Tests) -> Self {
        match inner {
            Tests::True => Tests::False,
            Tests::False => Tests::True,
            Tests::Not(inner) => *inner,
            other => Tests::Not(Box::new(other)),
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Tests::True)
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Tests::False)
    }

    /// The next check to decide: the leftmost primitive check of the tree.
    pub fn first_check(&self) -> Option<&DagCheck> {
        match self {
            Tests::True | Tests::False => None,
            Tests::One(check) => Some(check),
            Tests::Not(inner) => inner.first_check(),
            Tests::AndSequence(seq) | Tests::OrSequence(seq) => seq[0].first_check(),
        }
    }

    /// Rebuild the tree, mapping every leaf check through `f` and
    /// re-simplifying. `f` returns `True`/`False` for checks whose outcome
    /// became known, or `One` to keep them.
    pub fn map_checks(&self, f: &mut impl FnMut(&DagCheck) -> Tests) -> Tests {
        match self {
            Tests::True => Tests::True,
            Tests::False => Tests::False,
            Tests::One(check) => f(check),
            Tests::Not(inner) => Tests::not(inner.map_checks(f)),
            Tests::AndSequence(seq) => Tests::and(seq.iter().map(|t| t.map_checks(f))),
            Tests::OrSequence(seq) => Tests::or(seq.iter().map(|t| t.map_checks(f))),
        }
    }

    /// Walk every leaf check.
    pub fn for_each_check(&self, f: &mut impl FnMut(&DagCheck)) {
        match self {
            Tests::True | Tests::False => {}
            Tests::One(check) => f(check),
            Tests::Not(inner) => inner.for_each_check(f),
            Tests::AndSequence(seq) | Tests::OrSequence(seq) => {
                for t in seq {
                    t.for_each_check(f);
                }
            }
        }
    }

    /// Project this tree onto the feasible values of `temp`, starting from
    /// `full`. Checks on other temps contribute no constraint in either
    /// polarity, so the result over-approximates for mixed trees; for the
    /// single-temp trees produced by length lowering it is exact.
    pub fn project_values(&self, temp: &DagTemp, full: &ValueSet) -> ValueSet {
        self.project_values_inner(temp, full).0
    }

    /// Returns the projected set and whether it is exact (built only from
    /// checks on `temp`). A negation over an inexact projection must stay
    /// unconstraining rather than complementing an over-approximation.
    fn project_values_inner(&self, temp: &DagTemp, full: &ValueSet) -> (ValueSet, bool) {
        match self {
            Tests::True => (full.clone(), true),
            Tests::False => (full.intersect(&full.complement()), true),
            Tests::One(DagCheck::Eval(_)) => (full.clone(), false),
            Tests::One(DagCheck::Test(test)) => match test {
                DagTest::Value { input, value } if input == temp => {
                    (full.restrict(domain::Relation::Equal, value), true)
                }
                DagTest::Relational { input, op, value } if input == temp => {
                    (full.restrict(*op, value), true)
                }
                _ => (full.clone(), false),
            },
            Tests::Not(inner) => {
                let (set, exact) = inner.project_values_inner(temp, full);
                if exact {
                    (full.intersect(&set.complement()), true)
                } else {
                    (full.clone(), false)
                }
            }
            Tests::AndSequence(seq) => {
                let mut set = full.clone();
                let mut exact = true;
                for child in seq {
                    let (child_set, child_exact) = child.project_values_inner(temp, full);
                    set = set.intersect(&child_set);
                    exact &= child_exact;
                }
                (set, exact)
            }
            Tests::OrSequence(seq) => {
                let mut set = full.intersect(&full.complement());
                let mut exact = true;
                for child in seq {
                    let (child_set, child_exact) = child.project_values_inner(temp, full);
                    set = set.union(&child_set);
                    exact &= child_exact;
                }
                (full.intersect(&set), exact)
            }
        }
    }
}
