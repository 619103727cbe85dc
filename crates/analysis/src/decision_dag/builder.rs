//! Lowering patterns into test sequences and assembling the decision DAG.
//!
//! Construction is a frontier worklist over [`DagState`]s. A state is the
//! ordered list of cases still alive plus the per-temp value sets known on
//! the path reaching it. States are interned, so two paths arriving at the
//! same knowledge share one node. That sharing is what keeps the DAG
//! below the cross-product of the per-case decision trees and what makes
//! label reachability meaningful.

use std::collections::BTreeMap;
use std::sync::Arc;

use domain::{ConstValue, Relation, ValueSet};
use num_bigint::BigInt;
use rustc_hash::FxHashMap;

use crate::diagnostics::{InvalidLengthPattern, PatternMatchDiag};
use crate::guard::{StackGuard, TooComplex};
use crate::logic::{DagCheck, Tests};
use crate::oracle::{SequenceKind, SymbolId, SyntaxId, TypeOracle, WhenClauseId};
use crate::pattern::{Deconstruction, ListElement, Pattern, PatternKind, PropertyPattern};
use crate::reachability::MatchArm;
use crate::temp::{DagEvaluation, DagTemp, DagTest};

use super::types::{DagNode, DecisionDag, Label, NodeId};

/// One row of the decision table: a case's remaining constraints, its
/// bindings, its optional guard, and its target label.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct StateForCase {
    pub(crate) index: usize,
    pub(crate) syntax: SyntaxId,
    pub(crate) remaining: Tests,
    pub(crate) bindings: Vec<(SymbolId, DagTemp)>,
    pub(crate) when: Option<WhenClauseId>,
    pub(crate) label: Label,
}

impl StateForCase {
    fn with_remaining(&self, remaining: Tests) -> Self {
        Self {
            remaining,
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Pattern lowering
// ---------------------------------------------------------------------------

struct Lowered {
    tests: Tests,
    narrowed: DagTemp,
}

struct PatternLowering<'o> {
    oracle: &'o dyn TypeOracle,
    guard: StackGuard,
    bindings: Vec<(SymbolId, DagTemp)>,
    /// Sequence-length temps seen while lowering, for invalid-length
    /// detection at the case level.
    length_temps: Vec<(DagTemp, SyntaxId)>,
}

impl<'o> PatternLowering<'o> {
    fn lower(&mut self, input: &DagTemp, pat: &Pattern) -> Result<Lowered, TooComplex> {
        self.guard.enter()?;
        let result = self.lower_inner(input, pat);
        self.guard.exit();
        result
    }

    fn lower_inner(&mut self, input: &DagTemp, pat: &Pattern) -> Result<Lowered, TooComplex> {
        let lowered = match &pat.kind {
            PatternKind::Discard => Lowered {
                tests: Tests::True,
                narrowed: input.clone(),
            },

            PatternKind::Binding(symbol) => {
                self.bindings.push((*symbol, input.clone()));
                Lowered {
                    tests: Tests::True,
                    narrowed: input.clone(),
                }
            }

            PatternKind::Type { target, binding } => {
                let (tests, narrowed, _) = self.type_and_narrow(input, *target, pat.syntax);
                if let Some(symbol) = binding {
                    self.bindings.push((*symbol, narrowed.clone()));
                }
                Lowered {
                    tests: Tests::and(tests),
                    narrowed,
                }
            }

            PatternKind::Null => {
                let tests = if self.oracle.is_nullable(input.ty) {
                    Tests::test(DagTest::Null {
                        input: input.clone(),
                    })
                } else {
                    // A non-nullable input never matches `null`.
                    Tests::False
                };
                Lowered {
                    tests,
                    narrowed: input.clone(),
                }
            }

            PatternKind::Constant(value) => {
                let (mut tests, temp) = self.null_prepare(input, pat.syntax);
                tests.push(Tests::test(DagTest::Value {
                    input: temp.clone(),
                    value: value.clone(),
                }));
                Lowered {
                    tests: Tests::and(tests),
                    narrowed: temp,
                }
            }

            PatternKind::Relational { op, value } => {
                let (mut tests, temp) = self.null_prepare(input, pat.syntax);
                tests.push(Tests::test(DagTest::Relational {
                    input: temp.clone(),
                    op: *op,
                    value: value.clone(),
                }));
                Lowered {
                    tests: Tests::and(tests),
                    narrowed: temp,
                }
            }

            PatternKind::Recursive {
                target,
                deconstruction,
                properties,
                binding,
            } => {
                let (mut tests, narrowed, null_excluded) =
                    self.type_and_narrow(input, target.unwrap_or(input.ty), pat.syntax);

                // A recursive pattern never matches null, even when its
                // type test is irrefutable.
                if !null_excluded && self.oracle.is_nullable(narrowed.ty) {
                    tests.push(Tests::test(DagTest::NonNull {
                        input: narrowed.clone(),
                    }));
                }

                if let Some(Deconstruction {
                    method,
                    subpatterns,
                }) = deconstruction
                {
                    let eval = Arc::new(DagEvaluation::Deconstruct {
                        input: narrowed.clone(),
                        method: *method,
                        output_tys: subpatterns.iter().map(|p| p.ty).collect(),
                    });
                    tests.push(Tests::eval(eval.clone()));
                    for (i, sub) in subpatterns.iter().enumerate() {
                        let output =
                            DagTemp::from_evaluation(eval.clone(), i as u32, sub.syntax);
                        tests.push(self.lower(&output, sub)?.tests);
                    }
                }

                for PropertyPattern {
                    member,
                    is_field,
                    pattern: sub,
                } in properties
                {
                    let eval = Arc::new(if *is_field {
                        DagEvaluation::Field {
                            input: narrowed.clone(),
                            member: *member,
                            ty: sub.ty,
                        }
                    } else {
                        DagEvaluation::Property {
                            input: narrowed.clone(),
                            member: *member,
                            ty: sub.ty,
                        }
                    });
                    tests.push(Tests::eval(eval.clone()));
                    let output = DagTemp::from_evaluation(eval, 0, sub.syntax);
                    tests.push(self.lower(&output, sub)?.tests);
                }

                if let Some(symbol) = binding {
                    self.bindings.push((*symbol, narrowed.clone()));
                }
                Lowered {
                    tests: Tests::and(tests),
                    narrowed,
                }
            }

            PatternKind::List { elements, binding } => {
                let tests = self.lower_list(input, elements, pat.syntax)?;
                if let Some(symbol) = binding {
                    self.bindings.push((*symbol, input.clone()));
                }
                Lowered {
                    tests,
                    narrowed: input.clone(),
                }
            }

            PatternKind::And(lhs, rhs) => {
                let left = self.lower(input, lhs)?;
                let right = self.lower(&left.narrowed, rhs)?;
                Lowered {
                    tests: Tests::and([left.tests, right.tests]),
                    narrowed: right.narrowed,
                }
            }

            PatternKind::Or(lhs, rhs) => {
                let left = self.lower(input, lhs)?;
                let right = self.lower(input, rhs)?;
                Lowered {
                    tests: Tests::or([left.tests, right.tests]),
                    narrowed: input.clone(),
                }
            }

            PatternKind::Not(sub) => {
                // Patterns under `not` cannot bind; drop anything the
                // recursion collected.
                let before = self.bindings.len();
                let inner = self.lower(input, sub)?;
                self.bindings.truncate(before);
                Lowered {
                    tests: Tests::not(inner.tests),
                    narrowed: input.clone(),
                }
            }
        };
        Ok(lowered)
    }

    /// Null handling shared by constant and relational patterns: test
    /// non-null if needed and unwrap nullable value types.
    fn null_prepare(&mut self, input: &DagTemp, syntax: SyntaxId) -> (Vec<Tests>, DagTemp) {
        let mut tests = Vec::new();
        if !self.oracle.is_nullable(input.ty) {
            return (tests, input.clone());
        }
        tests.push(Tests::test(DagTest::NonNull {
            input: input.clone(),
        }));
        match self.oracle.nullable_underlying(input.ty) {
            Some(under) => {
                let eval = Arc::new(DagEvaluation::NullableUnwrap {
                    input: input.clone(),
                    ty: under,
                });
                tests.push(Tests::eval(eval.clone()));
                (tests, DagTemp::from_evaluation(eval, 0, syntax))
            }
            None => (tests, input.clone()),
        }
    }

    /// Tests narrowing `input` to `target`, the temp holding the narrowed
    /// value, and whether those tests already exclude null.
    fn type_and_narrow(
        &mut self,
        input: &DagTemp,
        target: crate::oracle::TyId,
        syntax: SyntaxId,
    ) -> (Vec<Tests>, DagTemp, bool) {
        let mut tests = Vec::new();
        if input.ty == target {
            return (tests, input.clone(), false);
        }

        if self.oracle.nullable_underlying(input.ty) == Some(target) {
            tests.push(Tests::test(DagTest::NonNull {
                input: input.clone(),
            }));
            let eval = Arc::new(DagEvaluation::NullableUnwrap {
                input: input.clone(),
                ty: target,
            });
            tests.push(Tests::eval(eval.clone()));
            return (tests, DagTemp::from_evaluation(eval, 0, syntax), true);
        }

        // Widening to a supertype is irrefutable; anything else takes a
        // runtime type test, whose success implies non-null.
        let tested = !self.oracle.is_subtype_of(input.ty, target);
        if tested {
            tests.push(Tests::test(DagTest::Type {
                input: input.clone(),
                ty: target,
            }));
        }
        let eval = Arc::new(DagEvaluation::TypeCast {
            input: input.clone(),
            ty: target,
        });
        tests.push(Tests::eval(eval.clone()));
        (tests, DagTemp::from_evaluation(eval, 0, syntax), tested)
    }

    fn lower_list(
        &mut self,
        input: &DagTemp,
        elements: &[ListElement],
        syntax: SyntaxId,
    ) -> Result<Tests, TooComplex> {
        let Some(kind) = self.oracle.sequence_kind(input.ty) else {
            panic!("list pattern applied to a non-sequence type");
        };
        let mut tests = Vec::new();
        if self.oracle.is_nullable(input.ty) {
            tests.push(Tests::test(DagTest::NonNull {
                input: input.clone(),
            }));
        }

        let slice_pos = elements
            .iter()
            .position(|e| matches!(e, ListElement::Slice(_)));
        let (before, slice, after) = match slice_pos {
            Some(pos) => {
                let ListElement::Slice(sub) = &elements[pos] else {
                    unreachable!()
                };
                debug_assert!(
                    !elements[pos + 1..]
                        .iter()
                        .any(|e| matches!(e, ListElement::Slice(_))),
                    "more than one slice in a list pattern"
                );
                (&elements[..pos], Some(sub), &elements[pos + 1..])
            }
            None => (elements, None, &elements[0..0]),
        };
        let required = before.len() + after.len();

        match kind {
            SequenceKind::Indexable {
                length_member,
                length_ty,
                element_ty: _,
                slice_ty,
            } => {
                let len_eval = Arc::new(DagEvaluation::Property {
                    input: input.clone(),
                    member: length_member,
                    ty: length_ty,
                });
                tests.push(Tests::eval(len_eval.clone()));
                let len_temp = DagTemp::from_evaluation(len_eval, 0, syntax);
                self.length_temps.push((len_temp.clone(), syntax));

                match slice {
                    None => tests.push(Tests::test(DagTest::Value {
                        input: len_temp.clone(),
                        value: ConstValue::Int(BigInt::from(required)),
                    })),
                    // `..` with nothing around it leaves the length
                    // unconstrained beyond its inherent lower bound.
                    Some(_) if required > 0 => tests.push(Tests::test(DagTest::Relational {
                        input: len_temp.clone(),
                        op: Relation::GreaterThanOrEqual,
                        value: ConstValue::Int(BigInt::from(required)),
                    })),
                    Some(_) => {}
                }

                for (i, element) in before.iter().enumerate() {
                    let ListElement::Pattern(sub) = element else {
                        unreachable!()
                    };
                    let eval = Arc::new(DagEvaluation::Index {
                        input: input.clone(),
                        index: i as u32,
                        from_end: false,
                        ty: sub.ty,
                    });
                    tests.push(Tests::eval(eval.clone()));
                    let output = DagTemp::from_evaluation(eval, 0, sub.syntax);
                    tests.push(self.lower(&output, sub)?.tests);
                }
                for (k, element) in after.iter().enumerate() {
                    let ListElement::Pattern(sub) = element else {
                        unreachable!()
                    };
                    let eval = Arc::new(DagEvaluation::Index {
                        input: input.clone(),
                        // `index` counts from the back: 1 is the last
                        // element.
                        index: (after.len() - k) as u32,
                        from_end: true,
                        ty: sub.ty,
                    });
                    tests.push(Tests::eval(eval.clone()));
                    let output = DagTemp::from_evaluation(eval, 0, sub.syntax);
                    tests.push(self.lower(&output, sub)?.tests);
                }
                if let Some(Some(sub)) = slice {
                    let eval = Arc::new(DagEvaluation::Slice {
                        input: input.clone(),
                        start: before.len() as u32,
                        end_from_end: after.len() as u32,
                        ty: slice_ty,
                    });
                    tests.push(Tests::eval(eval.clone()));
                    let output = DagTemp::from_evaluation(eval, 0, sub.syntax);
                    tests.push(self.lower(&output, sub)?.tests);
                }
            }

            SequenceKind::Enumerable {
                enumerator_ty,
                element_ty: _,
            } => {
                // From-end access and slice captures need random access;
                // the binder only produces prefix shapes for
                // enumerate-only inputs.
                assert!(
                    after.is_empty() && !matches!(slice, Some(Some(_))),
                    "enumerate-only list pattern with from-end or slice sub-pattern"
                );
                let acquire = Arc::new(DagEvaluation::EnumeratorAcquire {
                    input: input.clone(),
                    ty: enumerator_ty,
                });
                tests.push(Tests::eval(acquire.clone()));
                let enumerator = DagTemp::from_evaluation(acquire, 0, syntax);

                for (i, element) in before.iter().enumerate() {
                    let ListElement::Pattern(sub) = element else {
                        unreachable!()
                    };
                    let step = i as u32 + 1;
                    let advance = Arc::new(DagEvaluation::EnumeratorAdvance {
                        input: enumerator.clone(),
                        step,
                    });
                    tests.push(Tests::eval(advance.clone()));
                    let advanced = DagTemp::from_evaluation(advance, 0, sub.syntax);
                    tests.push(Tests::test(DagTest::MoveNext { input: advanced }));
                    let current = Arc::new(DagEvaluation::EnumeratorCurrent {
                        input: enumerator.clone(),
                        step,
                        ty: sub.ty,
                    });
                    tests.push(Tests::eval(current.clone()));
                    let output = DagTemp::from_evaluation(current, 0, sub.syntax);
                    tests.push(self.lower(&output, sub)?.tests);
                }

                match slice {
                    None => tests.push(Tests::test(DagTest::IterationBound {
                        input: enumerator.clone(),
                        bound: before.len() as u32,
                    })),
                    Some(_) => {
                        // The remainder is consumed but unconstrained;
                        // keep the consumed count for downstream lowering.
                        tests.push(Tests::eval(Arc::new(DagEvaluation::IterationCounter {
                            input: enumerator.clone(),
                        })));
                    }
                }
            }
        }
        Ok(Tests::and(tests))
    }
}

/// Lower one arm into its [`StateForCase`] rows, reporting and
/// neutralizing unsatisfiable length constraints.
///
/// An `or` whose alternatives bind variables becomes one row per
/// alternative, so each row carries only the bindings its own path
/// establishes and the `When` node downstream records the temp that is
/// actually live there. Binding-free disjunctions stay folded in the
/// test algebra; they never multiply rows.
pub(crate) fn lower_case(
    oracle: &dyn TypeOracle,
    root: &DagTemp,
    arm: &MatchArm,
    index: usize,
) -> Result<(Vec<StateForCase>, Vec<PatternMatchDiag>), TooComplex> {
    let mut expand_guard = StackGuard::new();
    let alternatives = expand_bound_alternatives(&mut expand_guard, &arm.pattern)?;

    let mut cases = Vec::with_capacity(alternatives.len());
    let mut diags = Vec::new();
    let mut reported: Vec<SyntaxId> = Vec::new();
    for pattern in &alternatives {
        let mut lowering = PatternLowering {
            oracle,
            guard: StackGuard::new(),
            bindings: Vec::new(),
            length_temps: Vec::new(),
        };
        let mut tests = lowering.lower(root, pattern)?.tests;

        for (len_temp, syntax) in &lowering.length_temps {
            let Some(full) = oracle.value_domain(len_temp.ty) else {
                continue;
            };
            if tests.project_values(len_temp, &full).is_empty() {
                if !reported.contains(syntax) {
                    reported.push(*syntax);
                    diags.push(InvalidLengthPattern { syntax: *syntax }.into());
                }
                // Permissive recovery: pretend the length is unconstrained
                // so the rest of the arm still participates in analysis.
                tests = tests.map_checks(&mut |check| match check {
                    DagCheck::Test(t) if t.input() == len_temp => Tests::True,
                    other => Tests::One(other.clone()),
                });
            }
        }

        cases.push(StateForCase {
            index,
            syntax: arm.syntax,
            remaining: tests,
            bindings: lowering.bindings,
            when: arm.when,
            label: arm.label,
        });
    }
    Ok((cases, diags))
}

/// Does this pattern introduce a variable? Bindings under `not` do not
/// count; lowering drops them.
fn binds(pattern: &Pattern) -> bool {
    let mut stack = vec![pattern];
    while let Some(p) = stack.pop() {
        match &p.kind {
            PatternKind::Binding(_) => return true,
            PatternKind::Type { binding, .. } => {
                if binding.is_some() {
                    return true;
                }
            }
            PatternKind::Recursive {
                deconstruction,
                properties,
                binding,
                ..
            } => {
                if binding.is_some() {
                    return true;
                }
                if let Some(d) = deconstruction {
                    stack.extend(d.subpatterns.iter());
                }
                stack.extend(properties.iter().map(|p| &p.pattern));
            }
            PatternKind::List { elements, binding } => {
                if binding.is_some() {
                    return true;
                }
                for element in elements {
                    match element {
                        ListElement::Pattern(p) => stack.push(p),
                        ListElement::Slice(Some(p)) => stack.push(p),
                        ListElement::Slice(None) => {}
                    }
                }
            }
            PatternKind::And(lhs, rhs) | PatternKind::Or(lhs, rhs) => {
                stack.push(lhs);
                stack.push(rhs);
            }
            PatternKind::Not(_)
            | PatternKind::Discard
            | PatternKind::Null
            | PatternKind::Constant(_)
            | PatternKind::Relational { .. } => {}
        }
    }
    false
}

/// Does any `or` in this pattern bind a variable in its alternatives?
fn has_bound_alternative(pattern: &Pattern) -> bool {
    let mut stack = vec![pattern];
    while let Some(p) = stack.pop() {
        // A subtree without bindings cannot hold a binding `or` either.
        if !binds(p) {
            continue;
        }
        match &p.kind {
            PatternKind::Or(..) => return true,
            PatternKind::And(lhs, rhs) => {
                stack.push(lhs);
                stack.push(rhs);
            }
            PatternKind::Recursive {
                deconstruction,
                properties,
                ..
            } => {
                if let Some(d) = deconstruction {
                    stack.extend(d.subpatterns.iter());
                }
                stack.extend(properties.iter().map(|p| &p.pattern));
            }
            PatternKind::List { elements, .. } => {
                for element in elements {
                    match element {
                        ListElement::Pattern(p) => stack.push(p),
                        ListElement::Slice(Some(p)) => stack.push(p),
                        ListElement::Slice(None) => {}
                    }
                }
            }
            _ => {}
        }
    }
    false
}

/// Row expansion multiplies through nested patterns; cap it the way the
/// state space is capped.
const MAX_EXPANSIONS: usize = 1 << 12;

fn expand_bound_alternatives(
    guard: &mut StackGuard,
    pattern: &Pattern,
) -> Result<Vec<Pattern>, TooComplex> {
    if !has_bound_alternative(pattern) {
        return Ok(vec![pattern.clone()]);
    }
    guard.enter()?;
    let result = expand_alternatives_inner(guard, pattern);
    guard.exit();
    result
}

fn expand_alternatives_inner(
    guard: &mut StackGuard,
    pattern: &Pattern,
) -> Result<Vec<Pattern>, TooComplex> {
    let expanded = match &pattern.kind {
        PatternKind::Or(lhs, rhs) => {
            let mut out = expand_bound_alternatives(guard, lhs)?;
            out.extend(expand_bound_alternatives(guard, rhs)?);
            if out.len() > MAX_EXPANSIONS {
                return Err(TooComplex);
            }
            out
        }

        PatternKind::And(lhs, rhs) => {
            let left = expand_bound_alternatives(guard, lhs)?;
            let right = expand_bound_alternatives(guard, rhs)?;
            if left.len().saturating_mul(right.len()) > MAX_EXPANSIONS {
                return Err(TooComplex);
            }
            let mut out = Vec::with_capacity(left.len() * right.len());
            for l in &left {
                for r in &right {
                    out.push(Pattern {
                        kind: PatternKind::And(Box::new(l.clone()), Box::new(r.clone())),
                        ..pattern.clone()
                    });
                }
            }
            out
        }

        PatternKind::Recursive {
            target,
            deconstruction,
            properties,
            binding,
        } => {
            let n_subs = deconstruction.as_ref().map_or(0, |d| d.subpatterns.len());
            let slots = deconstruction
                .iter()
                .flat_map(|d| d.subpatterns.iter())
                .chain(properties.iter().map(|p| &p.pattern));
            let mut rows: Vec<Vec<Pattern>> = vec![Vec::new()];
            for slot in slots {
                rows = cross(rows, expand_bound_alternatives(guard, slot)?)?;
            }
            rows.into_iter()
                .map(|mut row| {
                    let rebuilt_props = row.split_off(n_subs);
                    Pattern {
                        kind: PatternKind::Recursive {
                            target: *target,
                            deconstruction: deconstruction.as_ref().map(|d| Deconstruction {
                                method: d.method,
                                subpatterns: row,
                            }),
                            properties: properties
                                .iter()
                                .zip(rebuilt_props)
                                .map(|(p, sub)| PropertyPattern {
                                    member: p.member,
                                    is_field: p.is_field,
                                    pattern: sub,
                                })
                                .collect(),
                            binding: *binding,
                        },
                        ..pattern.clone()
                    }
                })
                .collect()
        }

        PatternKind::List { elements, binding } => {
            let mut rows: Vec<Vec<ListElement>> = vec![Vec::new()];
            for element in elements {
                let choices = match element {
                    ListElement::Pattern(p) => expand_bound_alternatives(guard, p)?
                        .into_iter()
                        .map(ListElement::Pattern)
                        .collect(),
                    ListElement::Slice(Some(p)) => expand_bound_alternatives(guard, p)?
                        .into_iter()
                        .map(|p| ListElement::Slice(Some(Box::new(p))))
                        .collect(),
                    ListElement::Slice(None) => vec![ListElement::Slice(None)],
                };
                rows = cross(rows, choices)?;
            }
            rows.into_iter()
                .map(|elements| Pattern {
                    kind: PatternKind::List {
                        elements,
                        binding: *binding,
                    },
                    ..pattern.clone()
                })
                .collect()
        }

        // Nothing else nests a binding `or`.
        _ => vec![pattern.clone()],
    };
    Ok(expanded)
}

fn cross<T: Clone>(rows: Vec<Vec<T>>, choices: Vec<T>) -> Result<Vec<Vec<T>>, TooComplex> {
    if rows.len().saturating_mul(choices.len()) > MAX_EXPANSIONS {
        return Err(TooComplex);
    }
    let mut out = Vec::with_capacity(rows.len() * choices.len());
    for row in &rows {
        for choice in &choices {
            let mut extended = row.clone();
            extended.push(choice.clone());
            out.push(extended);
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// DAG construction
// ---------------------------------------------------------------------------

/// The frontier at one point of the decision process: surviving cases in
/// priority order, and what is known about temp values on this path.
/// Value-set entries are kept only while strictly narrowed, so states
/// reached with equivalent knowledge are structurally identical.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct DagState {
    cases: Vec<StateForCase>,
    values: BTreeMap<DagTemp, ValueSet>,
}

#[derive(Debug)]
enum Decision {
    Leaf(Label),
    When {
        bindings: Vec<(SymbolId, DagTemp)>,
        when: Option<WhenClauseId>,
        label: Label,
        fallthrough: Option<usize>,
    },
    Eval {
        eval: Arc<DagEvaluation>,
        next: usize,
    },
    Test {
        test: DagTest,
        when_true: usize,
        when_false: usize,
    },
    /// A test whose outcome was statically known; no node is emitted.
    Forward(usize),
}

impl Decision {
    fn successors(&self) -> impl Iterator<Item = usize> + '_ {
        let (a, b) = match self {
            Decision::Leaf(_) => (None, None),
            Decision::When { fallthrough, .. } => (*fallthrough, None),
            Decision::Eval { next, .. } => (Some(*next), None),
            Decision::Test {
                when_true,
                when_false,
                ..
            } => (Some(*when_true), Some(*when_false)),
            Decision::Forward(next) => (Some(*next), None),
        };
        a.into_iter().chain(b)
    }
}

/// Pathological or-chains can explode the state space; bail out with a
/// "too complex" diagnostic before memory does.
const MAX_STATES: usize = 1 << 20;

pub(crate) struct DagBuilder<'o> {
    oracle: &'o dyn TypeOracle,
    default_label: Label,
    states: Vec<DagState>,
    state_ids: FxHashMap<DagState, usize>,
    decisions: Vec<Option<Decision>>,
}

/// Build the decision DAG for `cases` over the given root temp. Cases
/// whose constraints are already known unsatisfiable do not participate.
pub(crate) fn build_dag(
    oracle: &dyn TypeOracle,
    root_temp: DagTemp,
    cases: Vec<StateForCase>,
    default_label: Label,
) -> Result<DecisionDag, TooComplex> {
    let mut builder = DagBuilder {
        oracle,
        default_label,
        states: Vec::new(),
        state_ids: FxHashMap::default(),
        decisions: Vec::new(),
    };
    let initial = DagState {
        cases: cases
            .into_iter()
            .filter(|case| !case.remaining.is_false())
            .collect(),
        values: BTreeMap::new(),
    };
    let root_sid = builder.intern(initial);

    // Phase 1: explore the state space, deciding each state once.
    let mut next = 0;
    while next < builder.states.len() {
        if builder.states.len() > MAX_STATES {
            return Err(TooComplex);
        }
        let decision = builder.decide(next)?;
        builder.decisions[next] = Some(decision);
        next += 1;
    }

    // Phase 2: emit nodes in post-order so successors precede their
    // predecessors in the arena.
    Ok(builder.emit(root_sid, root_temp))
}

impl<'o> DagBuilder<'o> {
    fn intern(&mut self, state: DagState) -> usize {
        if let Some(&sid) = self.state_ids.get(&state) {
            return sid;
        }
        let sid = self.states.len();
        self.states.push(state.clone());
        self.state_ids.insert(state, sid);
        self.decisions.push(None);
        sid
    }

    fn decide(&mut self, sid: usize) -> Result<Decision, TooComplex> {
        let state = self.states[sid].clone();
        let Some(first) = state.cases.first() else {
            return Ok(Decision::Leaf(self.default_label));
        };

        if first.remaining.is_true() {
            if first.when.is_none() && first.bindings.is_empty() {
                return Ok(Decision::Leaf(first.label));
            }
            let fallthrough = first.when.map(|_| {
                // A failed guard proceeds to the next lower-priority case;
                // it never re-matches consumed input.
                self.intern(DagState {
                    cases: state.cases[1..].to_vec(),
                    values: state.values.clone(),
                })
            });
            return Ok(Decision::When {
                bindings: first.bindings.clone(),
                when: first.when,
                label: first.label,
                fallthrough,
            });
        }

        match select_check(&state.cases) {
            DagCheck::Eval(eval) => {
                let cases = state
                    .cases
                    .iter()
                    .map(|case| {
                        case.with_remaining(case.remaining.map_checks(&mut |check| {
                            match check {
                                DagCheck::Eval(e) if **e == *eval => Tests::True,
                                other => Tests::One(other.clone()),
                            }
                        }))
                    })
                    .collect();
                let next = self.intern(DagState {
                    cases,
                    values: state.values.clone(),
                });
                Ok(Decision::Eval { eval, next })
            }

            DagCheck::Test(test) => {
                let (true_values, false_values, true_empty, false_empty) =
                    self.branch_values(&state.values, &test);
                debug_assert!(!(true_empty && false_empty));

                if true_empty {
                    let target = self.filtered_state(&state, &test, false, false_values);
                    return Ok(Decision::Forward(self.intern(target)));
                }
                if false_empty {
                    let target = self.filtered_state(&state, &test, true, true_values);
                    return Ok(Decision::Forward(self.intern(target)));
                }

                let true_state = self.filtered_state(&state, &test, true, true_values);
                let false_state = self.filtered_state(&state, &test, false, false_values);
                Ok(Decision::Test {
                    test,
                    when_true: self.intern(true_state),
                    when_false: self.intern(false_state),
                })
            }
        }
    }

    /// Narrow the value-set knowledge by one test, for both branches.
    /// The two booleans report a statically empty branch.
    fn branch_values(
        &self,
        values: &BTreeMap<DagTemp, ValueSet>,
        test: &DagTest,
    ) -> (
        BTreeMap<DagTemp, ValueSet>,
        BTreeMap<DagTemp, ValueSet>,
        bool,
        bool,
    ) {
        let (input, rel, value) = match test {
            DagTest::Value { input, value } => (input, Relation::Equal, value),
            DagTest::Relational { input, op, value } => (input, *op, value),
            _ => return (values.clone(), values.clone(), false, false),
        };
        let Some(full) = self.oracle.value_domain(input.ty) else {
            return (values.clone(), values.clone(), false, false);
        };
        let current = values.get(input).cloned().unwrap_or(full);
        let true_set = current.restrict(rel, value);
        let false_set = current.restrict_complement(rel, value);

        let mut true_values = values.clone();
        set_narrowed(&mut true_values, input, true_set.clone());
        let mut false_values = values.clone();
        set_narrowed(&mut false_values, input, false_set.clone());
        (
            true_values,
            false_values,
            true_set.is_empty(),
            false_set.is_empty(),
        )
    }

    fn filtered_state(
        &self,
        state: &DagState,
        test: &DagTest,
        sense: bool,
        values: BTreeMap<DagTemp, ValueSet>,
    ) -> DagState {
        let cases = state
            .cases
            .iter()
            .filter_map(|case| {
                let remaining = case.remaining.map_checks(&mut |check| match check {
                    DagCheck::Eval(e) => Tests::eval(e.clone()),
                    DagCheck::Test(q) => self.infer(test, sense, q, &values),
                });
                (!remaining.is_false()).then(|| case.with_remaining(remaining))
            })
            .collect();
        DagState { cases, values }
    }

    /// What does deciding `decided = sense` say about `q`?
    fn infer(
        &self,
        decided: &DagTest,
        sense: bool,
        q: &DagTest,
        values: &BTreeMap<DagTemp, ValueSet>,
    ) -> Tests {
        if q == decided {
            return verdict(sense, q);
        }
        if let Some(result) = infer_enumerator(decided, sense, q) {
            return result;
        }
        if q.input() != decided.input() {
            return Tests::test(q.clone());
        }

        // Null-ness implied by the decision, if any.
        let known_null = match (decided, sense) {
            (DagTest::NonNull { .. }, s) => Some(!s),
            (DagTest::Null { .. }, s) => Some(s),
            (DagTest::Type { .. }, true) => Some(false),
            (DagTest::Value { .. }, true) | (DagTest::Relational { .. }, true) => Some(false),
            _ => None,
        };

        match q {
            DagTest::NonNull { .. } => match known_null {
                Some(is_null) => verdict(!is_null, q),
                None => Tests::test(q.clone()),
            },
            DagTest::Null { .. } => match known_null {
                Some(is_null) => verdict(is_null, q),
                None => Tests::test(q.clone()),
            },

            DagTest::Type { ty: q_ty, .. } => {
                if known_null == Some(true) {
                    return Tests::False;
                }
                match (decided, sense) {
                    (DagTest::Type { ty: d_ty, .. }, true) => {
                        if self.oracle.is_subtype_of(*d_ty, *q_ty) {
                            Tests::True
                        } else if !self.oracle.types_intersect(*d_ty, *q_ty) {
                            Tests::False
                        } else {
                            Tests::test(q.clone())
                        }
                    }
                    (DagTest::Type { ty: d_ty, .. }, false) => {
                        if self.oracle.is_subtype_of(*q_ty, *d_ty) {
                            Tests::False
                        } else {
                            Tests::test(q.clone())
                        }
                    }
                    _ => Tests::test(q.clone()),
                }
            }

            DagTest::Value { value, .. } | DagTest::Relational { value, .. } => {
                if known_null == Some(true) {
                    return Tests::False;
                }
                let rel = match q {
                    DagTest::Relational { op, .. } => *op,
                    _ => Relation::Equal,
                };
                if let Some(full) = self.oracle.value_domain(q.input().ty) {
                    let current = values.get(q.input()).cloned().unwrap_or(full.clone());
                    let q_set = full.restrict(rel, value);
                    if q_set.covers(&current) {
                        Tests::True
                    } else if q_set.intersect(&current).is_empty() {
                        Tests::False
                    } else {
                        Tests::test(q.clone())
                    }
                } else {
                    // No domain model: only direct constant conflicts are
                    // decidable.
                    match (decided, sense, q) {
                        (
                            DagTest::Value { value: a, .. },
                            true,
                            DagTest::Value { value: b, .. },
                        ) if a != b => Tests::False,
                        _ => Tests::test(q.clone()),
                    }
                }
            }

            DagTest::MoveNext { .. } | DagTest::IterationBound { .. } => Tests::test(q.clone()),
        }
    }

    fn emit(&self, root_sid: usize, root_temp: DagTemp) -> DecisionDag {
        enum Frame {
            Enter(usize),
            Exit(usize),
        }

        let mut nodes: Vec<DagNode> = Vec::new();
        let mut node_memo: FxHashMap<DagNode, NodeId> = FxHashMap::default();
        let mut node_of: Vec<Option<NodeId>> = vec![None; self.states.len()];
        let mut entered = vec![false; self.states.len()];

        let mut stack = vec![Frame::Enter(root_sid)];
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(sid) => {
                    if entered[sid] {
                        continue;
                    }
                    entered[sid] = true;
                    stack.push(Frame::Exit(sid));
                    let decision = self.decisions[sid].as_ref().unwrap();
                    stack.extend(decision.successors().map(Frame::Enter));
                }
                Frame::Exit(sid) => {
                    let node = match self.decisions[sid].as_ref().unwrap() {
                        Decision::Forward(next) => {
                            node_of[sid] = Some(node_of[*next].unwrap());
                            continue;
                        }
                        Decision::Leaf(label) => DagNode::Leaf { label: *label },
                        Decision::Eval { eval, next } => DagNode::Evaluation {
                            eval: eval.clone(),
                            next: node_of[*next].unwrap(),
                        },
                        Decision::Test {
                            test,
                            when_true,
                            when_false,
                        } => DagNode::Test {
                            test: test.clone(),
                            when_true: node_of[*when_true].unwrap(),
                            when_false: node_of[*when_false].unwrap(),
                        },
                        Decision::When {
                            bindings,
                            when,
                            label,
                            fallthrough,
                        } => {
                            let leaf =
                                add_node(&mut nodes, &mut node_memo, DagNode::Leaf { label: *label });
                            DagNode::When {
                                bindings: bindings.clone(),
                                when: *when,
                                when_true: leaf,
                                when_false: fallthrough.map(|next| node_of[next].unwrap()),
                            }
                        }
                    };
                    node_of[sid] = Some(add_node(&mut nodes, &mut node_memo, node));
                }
            }
        }

        DecisionDag::new(
            nodes,
            node_of[root_sid].unwrap(),
            root_temp,
            self.default_label,
        )
    }
}

fn add_node(
    nodes: &mut Vec<DagNode>,
    memo: &mut FxHashMap<DagNode, NodeId>,
    node: DagNode,
) -> NodeId {
    if let Some(&id) = memo.get(&node) {
        return id;
    }
    let id = NodeId(nodes.len() as u32);
    nodes.push(node.clone());
    memo.insert(node, id);
    id
}

fn verdict(holds: bool, _q: &DagTest) -> Tests {
    if holds {
        Tests::True
    } else {
        Tests::False
    }
}

/// Pick the next check to decide: the front check shared by the most
/// surviving cases; ties prefer evaluations over tests, then the earliest
/// contributing case.
fn select_check(cases: &[StateForCase]) -> DagCheck {
    struct Candidate {
        check: DagCheck,
        count: usize,
        first: usize,
    }

    let mut candidates: Vec<Candidate> = Vec::new();
    for (i, case) in cases.iter().enumerate() {
        // Cases already satisfied but behind a pending higher-priority
        // case contribute nothing here.
        let Some(check) = case.remaining.first_check() else {
            continue;
        };
        match candidates.iter_mut().find(|c| c.check == *check) {
            Some(candidate) => candidate.count += 1,
            None => candidates.push(Candidate {
                check: check.clone(),
                count: 1,
                first: i,
            }),
        }
    }

    candidates
        .into_iter()
        .max_by(|a, b| {
            let a_eval = matches!(a.check, DagCheck::Eval(_));
            let b_eval = matches!(b.check, DagCheck::Eval(_));
            a.count
                .cmp(&b.count)
                .then_with(|| a_eval.cmp(&b_eval))
                .then_with(|| b.first.cmp(&a.first))
        })
        .expect("an unsatisfied case must contribute a check")
        .check
}

fn set_narrowed(map: &mut BTreeMap<DagTemp, ValueSet>, temp: &DagTemp, set: ValueSet) {
    if set.is_full() {
        map.remove(temp);
    } else {
        map.insert(temp.clone(), set);
    }
}

/// Cross-temp inference between enumerator facts: the `step`th advance
/// succeeding or failing bounds the element count, and an exact
/// iteration bound decides every advance.
fn infer_enumerator(decided: &DagTest, sense: bool, q: &DagTest) -> Option<Tests> {
    enum Fact<'a> {
        Advanced(&'a DagTemp, u32),
        Bound(&'a DagTemp, u32),
    }

    fn fact(test: &DagTest) -> Option<Fact<'_>> {
        match test {
            DagTest::MoveNext { input } => match input.source.as_deref() {
                Some(DagEvaluation::EnumeratorAdvance { input, step }) => {
                    Some(Fact::Advanced(input, *step))
                }
                _ => None,
            },
            DagTest::IterationBound { input, bound } => Some(Fact::Bound(input, *bound)),
            _ => None,
        }
    }

    let d = fact(decided)?;
    let qf = fact(q)?;
    let (d_enum, q_enum) = match (&d, &qf) {
        (Fact::Advanced(a, _) | Fact::Bound(a, _), Fact::Advanced(b, _) | Fact::Bound(b, _)) => {
            (*a, *b)
        }
    };
    if d_enum != q_enum {
        return Some(Tests::test(q.clone()));
    }

    let result = match (d, sense, qf) {
        // count >= k
        (Fact::Advanced(_, k), true, Fact::Advanced(_, j)) if j <= k => Tests::True,
        (Fact::Advanced(_, k), true, Fact::Bound(_, n)) if n < k => Tests::False,
        // count < k
        (Fact::Advanced(_, k), false, Fact::Advanced(_, j)) if j >= k => Tests::False,
        (Fact::Advanced(_, k), false, Fact::Bound(_, n)) if n >= k => Tests::False,
        // count == n
        (Fact::Bound(_, n), true, Fact::Advanced(_, j)) => {
            if j <= n {
                Tests::True
            } else {
                Tests::False
            }
        }
        (Fact::Bound(_, _), true, Fact::Bound(_, _)) => Tests::False,
        _ => Tests::test(q.clone()),
    };
    Some(result)
}
