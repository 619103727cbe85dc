//! Counterexample synthesis for non-exhaustive matches.
//!
//! Given a node of a built decision DAG (normally the default leaf), find
//! the cheapest feasible path from the root to it and turn the tests and
//! evaluations along that path into a human-readable witness pattern.
//! Path cost is node count, with a heavy penalty on edges that require a
//! when clause to evaluate false; an optional mode refuses paths that
//! rely on null values, since a null witness is rarely the interesting
//! one.

use std::sync::Arc;

use domain::{Relation, SampleValue};

use crate::decision_dag::{DagNode, DecisionDag, NodeId};
use crate::oracle::{SequenceKind, TypeOracle};
use crate::temp::{DagEvaluation, DagTemp, DagTest};

/// A synthesized witness for a value no arm matches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnmatchedSample {
    /// A pattern-like rendering of the witness, e.g. `null`, `3`,
    /// `(1, _)` or `{ Length: 5 }`.
    pub display: String,
    /// The witness only reaches the target if some when clause evaluates
    /// to false.
    pub requires_false_when_clause: bool,
    /// The witness relies on a value of an enum type outside its declared
    /// constants.
    pub involves_unnamed_enum_value: bool,
}

const INF: u64 = u64::MAX / 4;
const WHEN_PENALTY: u64 = 1 << 16;

/// Synthesize a witness value description for some input reaching
/// `target`. With `no_null` set, paths that require a null value are
/// excluded; returns `None` when no admissible path exists.
pub fn sample_unmatched(
    oracle: &dyn TypeOracle,
    dag: &DecisionDag,
    target: NodeId,
    no_null: bool,
) -> Option<UnmatchedSample> {
    let dist = distances(dag, target, no_null);
    if dist[dag.root().index()] >= INF {
        return None;
    }

    let mut facts = PathFacts::default();
    let mut requires_false_when_clause = false;
    let mut id = dag.root();
    while id != target {
        match dag.node(id) {
            DagNode::Leaf { .. } => unreachable!("finite distance past a leaf"),
            DagNode::Evaluation { eval, next } => {
                facts.evals.push(eval.clone());
                id = *next;
            }
            DagNode::Test {
                test,
                when_true,
                when_false,
            } => {
                let (t, f) = branch_distances(&dist, test, *when_true, *when_false, no_null);
                if t <= f {
                    facts.tests.push((test.clone(), true));
                    id = *when_true;
                } else {
                    facts.tests.push((test.clone(), false));
                    id = *when_false;
                }
            }
            DagNode::When {
                when_true,
                when_false,
                ..
            } => {
                let t = dist[when_true.index()];
                let f = when_false
                    .map(|n| dist[n.index()].saturating_add(WHEN_PENALTY))
                    .unwrap_or(INF);
                if t <= f {
                    id = *when_true;
                } else {
                    requires_false_when_clause = true;
                    id = when_false.unwrap();
                }
            }
        }
    }

    let mut flags = Flags::default();
    let display = facts.describe(oracle, dag.root_temp(), &mut flags);
    Some(UnmatchedSample {
        display,
        requires_false_when_clause,
        involves_unnamed_enum_value: flags.involves_unnamed_enum_value,
    })
}

/// Shortest distance from every node to `target`, computed backward.
/// Successor ids are strictly smaller than their node's id, so a single
/// ascending sweep sees every successor before its predecessors.
fn distances(dag: &DecisionDag, target: NodeId, no_null: bool) -> Vec<u64> {
    let mut dist = vec![INF; dag.node_count()];
    dist[target.index()] = 0;
    for id in dag.node_ids() {
        if id == target {
            continue;
        }
        dist[id.index()] = match dag.node(id) {
            DagNode::Leaf { .. } => INF,
            DagNode::Evaluation { next, .. } => dist[next.index()],
            DagNode::Test {
                test,
                when_true,
                when_false,
            } => {
                let (t, f) = branch_distances(&dist, test, *when_true, *when_false, no_null);
                t.min(f).saturating_add(1)
            }
            DagNode::When {
                when_true,
                when_false,
                ..
            } => {
                let t = dist[when_true.index()];
                let f = when_false
                    .map(|n| dist[n.index()].saturating_add(WHEN_PENALTY))
                    .unwrap_or(INF);
                t.min(f).saturating_add(1)
            }
        };
    }
    dist
}

fn branch_distances(
    dist: &[u64],
    test: &DagTest,
    when_true: NodeId,
    when_false: NodeId,
    no_null: bool,
) -> (u64, u64) {
    let t = dist[when_true.index()];
    let f = dist[when_false.index()];
    if no_null {
        // The branch that asserts a null value is off limits.
        match test {
            DagTest::NonNull { .. } => return (t, INF),
            DagTest::Null { .. } => return (INF, f),
            _ => {}
        }
    }
    (t, f)
}

#[derive(Default)]
struct Flags {
    involves_unnamed_enum_value: bool,
}

/// Everything the chosen path asserts, keyed implicitly by temp.
#[derive(Default)]
struct PathFacts {
    tests: Vec<(DagTest, bool)>,
    evals: Vec<Arc<DagEvaluation>>,
}

impl PathFacts {
    fn tests_on<'a>(&'a self, temp: &'a DagTemp) -> impl Iterator<Item = (&'a DagTest, bool)> {
        self.tests
            .iter()
            .filter(move |(test, _)| test.input() == temp)
            .map(|(test, sense)| (test, *sense))
    }

    fn evals_from<'a>(
        &'a self,
        temp: &'a DagTemp,
    ) -> impl Iterator<Item = &'a Arc<DagEvaluation>> {
        self.evals.iter().filter(move |eval| eval.input() == temp)
    }

    /// Render a witness pattern for the value of `temp`, most specific
    /// shape first.
    fn describe(&self, oracle: &dyn TypeOracle, temp: &DagTemp, flags: &mut Flags) -> String {
        for (test, sense) in self.tests_on(temp) {
            match (test, sense) {
                (DagTest::Null { .. }, true) | (DagTest::NonNull { .. }, false) => {
                    return "null".to_string()
                }
                _ => {}
            }
        }

        if let Some(eval) = self
            .evals_from(temp)
            .find(|e| matches!(***e, DagEvaluation::NullableUnwrap { .. }))
        {
            let unwrapped = DagTemp::from_evaluation(eval.clone(), 0, temp.syntax);
            return self.describe(oracle, &unwrapped, flags);
        }

        if let Some(display) = self.describe_value(oracle, temp, flags) {
            return display;
        }
        if let Some(display) = self.describe_list(oracle, temp, flags) {
            return display;
        }

        if let Some(eval) = self
            .evals_from(temp)
            .find(|e| matches!(***e, DagEvaluation::Deconstruct { .. }))
        {
            let DagEvaluation::Deconstruct { output_tys, .. } = &**eval else {
                unreachable!()
            };
            let parts: Vec<String> = (0..output_tys.len())
                .map(|i| {
                    let output = DagTemp::from_evaluation(eval.clone(), i as u32, temp.syntax);
                    self.describe(oracle, &output, flags)
                })
                .collect();
            return format!("({})", parts.join(", "));
        }

        let properties = self.describe_properties(oracle, temp, flags);
        if !properties.is_empty() {
            return format!("{{ {} }}", properties.join(", "));
        }

        if let Some(eval) = self
            .evals_from(temp)
            .find(|e| matches!(***e, DagEvaluation::TypeCast { .. }))
        {
            let DagEvaluation::TypeCast { ty, .. } = &**eval else {
                unreachable!()
            };
            let narrowed = DagTemp::from_evaluation(eval.clone(), 0, temp.syntax);
            let inner = self.describe(oracle, &narrowed, flags);
            return if inner == "_" {
                oracle.display_ty(*ty)
            } else {
                inner
            };
        }

        "_".to_string()
    }

    /// A concrete constant witness from the numeric or discrete domain of
    /// `temp`, if the path constrains its value at all.
    fn describe_value(
        &self,
        oracle: &dyn TypeOracle,
        temp: &DagTemp,
        flags: &mut Flags,
    ) -> Option<String> {
        let mut constrained = false;
        let mut set = oracle.value_domain(temp.ty)?;
        for (test, sense) in self.tests_on(temp) {
            let (rel, value) = match test {
                DagTest::Value { value, .. } => (Relation::Equal, value),
                DagTest::Relational { op, value, .. } => (*op, value),
                _ => continue,
            };
            constrained = true;
            set = if sense {
                set.restrict(rel, value)
            } else {
                set.restrict_complement(rel, value)
            };
        }
        if !constrained {
            return None;
        }

        match set.sample()? {
            SampleValue::Exact(value) => {
                if let Some(name) = oracle.enum_constant_name(temp.ty, &value) {
                    return Some(name);
                }
                if oracle.enum_constants(temp.ty).is_some() {
                    flags.involves_unnamed_enum_value = true;
                }
                Some(value.to_string())
            }
            SampleValue::AboveWindow => {
                let domain = oracle.numeric_domain(temp.ty)?;
                Some(format!("> {}", domain.window_max()))
            }
            SampleValue::BelowWindow => {
                let domain = oracle.numeric_domain(temp.ty)?;
                Some(format!("< {}", domain.window_min()))
            }
        }
    }

    /// A `[...]` witness for an indexable sequence whose length the path
    /// pins down to a small concrete value.
    fn describe_list(
        &self,
        oracle: &dyn TypeOracle,
        temp: &DagTemp,
        flags: &mut Flags,
    ) -> Option<String> {
        let Some(SequenceKind::Indexable { length_member, .. }) = oracle.sequence_kind(temp.ty)
        else {
            return None;
        };
        let length_eval = self.evals_from(temp).find(|e| {
            matches!(&***e, DagEvaluation::Property { member, .. } if *member == length_member)
        })?;
        let length_temp = DagTemp::from_evaluation(length_eval.clone(), 0, temp.syntax);
        let length = match self.describe_value(oracle, &length_temp, flags)? {
            s if s.chars().all(|c| c.is_ascii_digit()) => s.parse::<usize>().ok()?,
            _ => return None,
        };
        if length > 8 {
            // A huge witness list helps nobody; let a property rendering
            // like `{ Length: n }` take over.
            return None;
        }

        let mut elements = vec!["_".to_string(); length];
        for eval in self.evals_from(temp) {
            let DagEvaluation::Index {
                index, from_end, ..
            } = &**eval
            else {
                continue;
            };
            let position = if *from_end {
                match length.checked_sub(*index as usize) {
                    Some(p) => p,
                    None => continue,
                }
            } else {
                *index as usize
            };
            if position < length {
                let output = DagTemp::from_evaluation(eval.clone(), 0, temp.syntax);
                elements[position] = self.describe(oracle, &output, flags);
            }
        }
        Some(format!("[{}]", elements.join(", ")))
    }

    fn describe_properties(
        &self,
        oracle: &dyn TypeOracle,
        temp: &DagTemp,
        flags: &mut Flags,
    ) -> Vec<String> {
        let mut rendered = Vec::new();
        for eval in self.evals_from(temp) {
            let member = match &**eval {
                DagEvaluation::Field { member, .. } | DagEvaluation::Property { member, .. } => {
                    *member
                }
                _ => continue,
            };
            let output = DagTemp::from_evaluation(eval.clone(), 0, temp.syntax);
            let sub = self.describe(oracle, &output, flags);
            if sub != "_" {
                rendered.push(format!("{}: {}", oracle.display_member(member), sub));
            }
        }
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{SyntaxId, TyId};
    use domain::{ConstValue, NumericDomain, ValueSet};
    use num_bigint::BigInt;

    struct IntOracle;

    impl TypeOracle for IntOracle {
        fn is_subtype_of(&self, a: TyId, b: TyId) -> bool {
            a == b
        }
        fn types_intersect(&self, a: TyId, b: TyId) -> bool {
            a == b
        }
        fn is_nullable(&self, _ty: TyId) -> bool {
            false
        }
        fn value_domain(&self, _ty: TyId) -> Option<ValueSet> {
            Some(ValueSet::full_numeric(NumericDomain::native_int()))
        }
        fn display_ty(&self, _ty: TyId) -> String {
            "int".to_string()
        }
    }

    fn int_temp() -> DagTemp {
        DagTemp::root(TyId(0), SyntaxId(0))
    }

    #[test]
    fn value_witness_avoids_excluded_constants() {
        let mut facts = PathFacts::default();
        facts.tests.push((
            DagTest::Value {
                input: int_temp(),
                value: ConstValue::Int(BigInt::from(0)),
            },
            false,
        ));
        let mut flags = Flags::default();
        let display = facts.describe(&IntOracle, &int_temp(), &mut flags);
        assert_ne!(display, "0");
        assert_ne!(display, "_");
    }

    #[test]
    fn witness_outside_window_uses_relational_phrasing() {
        let mut facts = PathFacts::default();
        facts.tests.push((
            DagTest::Relational {
                input: int_temp(),
                op: Relation::GreaterThan,
                value: ConstValue::Int(BigInt::from(i32::MAX)),
            },
            true,
        ));
        let mut flags = Flags::default();
        let display = facts.describe(&IntOracle, &int_temp(), &mut flags);
        assert_eq!(display, format!("> {}", i32::MAX));
    }

    #[test]
    fn unconstrained_temp_renders_wildcard() {
        let facts = PathFacts::default();
        let mut flags = Flags::default();
        assert_eq!(facts.describe(&IntOracle, &int_temp(), &mut flags), "_");
    }
}
