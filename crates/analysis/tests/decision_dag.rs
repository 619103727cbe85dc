mod test_oracle;

use std::sync::Arc;

use ascii_tree::{write_tree, Tree};
use domain::{ConstValue, Relation};
use num_bigint::BigInt;
use patdag_analysis::oracle::SyntaxId;
use patdag_analysis::pattern::{Deconstruction, ListElement, Pattern, PatternKind};
use patdag_analysis::temp::{DagEvaluation, DagTemp, DagTest};
use patdag_analysis::{build_decision_dag, DagNode, DecisionDag, Label, NodeId};
use rustc_hash::FxHashMap;

use test_oracle::{arm, int_pat, type_pat, TestOracle, DEFAULT, INT, INT_ARRAY, OBJECT, PAIR, STRING};

fn build(scrutinee_ty: patdag_analysis::oracle::TyId, arms: &[patdag_analysis::MatchArm]) -> DecisionDag {
    let (dag, diags) = build_decision_dag(&TestOracle, scrutinee_ty, SyntaxId(0), arms, DEFAULT)
        .expect("construct is small enough to build");
    assert!(diags.is_empty(), "unexpected lowering diagnostics: {diags:?}");
    dag
}

fn render_decision_dag(dag: &DecisionDag) -> String {
    let ascii_tree = convert_to_ascii_tree(dag, dag.root());
    let mut output = String::new();
    write_tree(&mut output, &ascii_tree).unwrap();
    output
}

fn convert_to_ascii_tree(dag: &DecisionDag, id: NodeId) -> Tree {
    match dag.node(id) {
        DagNode::Leaf { label } => Tree::Leaf(vec![format!("leaf {}", label.0)]),
        DagNode::Evaluation { eval, next } => Tree::Node(
            format!("eval {}", temp_label(&DagTemp::from_evaluation(eval.clone(), 0, SyntaxId(0)))),
            vec![convert_to_ascii_tree(dag, *next)],
        ),
        DagNode::Test {
            test,
            when_true,
            when_false,
        } => Tree::Node(
            test_label(test),
            vec![
                convert_to_ascii_tree(dag, *when_true),
                convert_to_ascii_tree(dag, *when_false),
            ],
        ),
        DagNode::When {
            when,
            when_true,
            when_false,
            ..
        } => {
            let mut children = vec![convert_to_ascii_tree(dag, *when_true)];
            children.extend(when_false.map(|id| convert_to_ascii_tree(dag, id)));
            let label = match when {
                Some(clause) => format!("when #{}", clause.0),
                None => "when".to_string(),
            };
            Tree::Node(label, children)
        }
    }
}

fn test_label(test: &DagTest) -> String {
    match test {
        DagTest::NonNull { input } => format!("{} is not null", temp_label(input)),
        DagTest::Null { input } => format!("{} is null", temp_label(input)),
        DagTest::Type { input, ty } => format!("{} is type {}", temp_label(input), ty.0),
        DagTest::Value { input, value } => format!("{} == {value}", temp_label(input)),
        DagTest::Relational { input, op, value } => {
            format!("{} {} {value}", temp_label(input), op.display_str())
        }
        DagTest::MoveNext { input } => format!("{} has next", temp_label(input)),
        DagTest::IterationBound { input, bound } => {
            format!("{} ends after {bound}", temp_label(input))
        }
    }
}

fn temp_label(temp: &DagTemp) -> String {
    let Some(eval) = temp.source.as_deref() else {
        return "input".to_string();
    };
    let base = temp_label(eval.input());
    match eval {
        DagEvaluation::TypeCast { ty, .. } => format!("({base} as {})", ty.0),
        DagEvaluation::NullableUnwrap { .. } => format!("{base}.Value"),
        DagEvaluation::Field { member, .. } | DagEvaluation::Property { member, .. } => {
            format!("{base}.m{}", member.0)
        }
        DagEvaluation::Deconstruct { .. } => format!("{base}.{}", temp.index),
        DagEvaluation::Index {
            index, from_end, ..
        } => format!("{base}[{}{index}]", if *from_end { "^" } else { "" }),
        DagEvaluation::Slice {
            start, end_from_end, ..
        } => format!("{base}[{start}..^{end_from_end}]"),
        DagEvaluation::EnumeratorAcquire { .. } => format!("{base}.enumerator"),
        DagEvaluation::EnumeratorAdvance { step, .. } => format!("{base}.advance{step}"),
        DagEvaluation::EnumeratorCurrent { step, .. } => format!("{base}.current{step}"),
        DagEvaluation::IterationCounter { .. } => format!("{base}.count"),
    }
}

fn relational_pat(op: Relation, v: i64) -> Pattern {
    Pattern::new(
        PatternKind::Relational {
            op,
            value: ConstValue::Int(BigInt::from(v)),
        },
        INT,
        SyntaxId(3000 + v.unsigned_abs() as u32),
    )
}

fn pair_pat(lhs: Pattern, rhs: Pattern, syntax: u32) -> Pattern {
    Pattern::new(
        PatternKind::Recursive {
            target: None,
            deconstruction: Some(Deconstruction {
                method: None,
                subpatterns: vec![lhs, rhs],
            }),
            properties: Vec::new(),
            binding: None,
        },
        PAIR,
        SyntaxId(syntax),
    )
}

fn list_pat(elements: Vec<ListElement>, syntax: u32) -> Pattern {
    Pattern::new(
        PatternKind::List {
            elements,
            binding: None,
        },
        INT_ARRAY,
        SyntaxId(syntax),
    )
}

fn discard(ty: patdag_analysis::oracle::TyId, syntax: u32) -> Pattern {
    Pattern::new(PatternKind::Discard, ty, SyntaxId(syntax))
}

#[test]
fn rendered_constant_chain_tests_the_input_directly() {
    let dag = build(
        INT,
        &[arm(int_pat(1), 0), arm(int_pat(2), 1), arm(discard(INT, 9), 2)],
    );
    let rendered = render_decision_dag(&dag);
    assert!(rendered.contains("input == 1"), "{rendered}");
    assert!(rendered.contains("input == 2"), "{rendered}");
    assert!(rendered.contains("leaf 2"), "{rendered}");
    // No evaluations are needed to test the input itself.
    assert!(!rendered.contains("eval"), "{rendered}");
}

#[test]
fn rendered_type_dispatch_casts_once_per_type() {
    let dag = build(
        OBJECT,
        &[
            arm(type_pat(OBJECT, STRING), 0),
            arm(type_pat(OBJECT, INT), 1),
            arm(discard(OBJECT, 9), 2),
        ],
    );
    let rendered = render_decision_dag(&dag);
    assert!(rendered.contains("input is type 1"), "{rendered}");
    assert!(rendered.contains("input is type 2"), "{rendered}");
    assert!(dag.is_exhaustive());
}

#[test]
fn rendered_pair_dispatch_shares_the_deconstruction() {
    let dag = build(
        PAIR,
        &[
            arm(pair_pat(int_pat(0), discard(INT, 90), 50), 0),
            arm(pair_pat(discard(INT, 91), int_pat(0), 51), 1),
            arm(discard(PAIR, 9), 2),
        ],
    );
    let rendered = render_decision_dag(&dag);
    assert!(rendered.contains("input.0 == 0"), "{rendered}");
    assert!(rendered.contains("input.1 == 0"), "{rendered}");

    let deconstructs = dag
        .node_ids()
        .filter(|&id| {
            matches!(
                dag.node(id),
                DagNode::Evaluation { eval, .. }
                    if matches!(eval.as_ref(), DagEvaluation::Deconstruct { .. })
            )
        })
        .count();
    assert_eq!(deconstructs, 1);
}

// A small reference interpreter for the cross-checks below: the DAG must
// select exactly the label the first-match semantics of the source
// patterns selects, for every input value.

#[derive(Clone, Debug, PartialEq, Eq)]
enum Value {
    Null,
    Int(i64),
    Pair(Box<Value>, Box<Value>),
    List(Vec<Value>),
}

impl Value {
    fn int(&self) -> i64 {
        match self {
            Value::Int(v) => *v,
            other => panic!("expected an integer, got {other:?}"),
        }
    }

    fn list(&self) -> &[Value] {
        match self {
            Value::List(vs) => vs,
            other => panic!("expected a list, got {other:?}"),
        }
    }
}

fn run_dag(dag: &DecisionDag, input: &Value) -> Label {
    let mut temps: FxHashMap<DagTemp, Value> = FxHashMap::default();
    temps.insert(dag.root_temp().clone(), input.clone());
    let mut id = dag.root();
    loop {
        match dag.node(id) {
            DagNode::Leaf { label } => return *label,
            DagNode::When {
                when, when_true, ..
            } => {
                assert!(when.is_none(), "cross-check arms carry no guards");
                id = *when_true;
            }
            DagNode::Evaluation { eval, next } => {
                let input = temps[eval.input()].clone();
                for (index, value) in evaluate(eval, &input).into_iter().enumerate() {
                    temps.insert(
                        DagTemp::from_evaluation(eval.clone(), index as u32, SyntaxId(0)),
                        value,
                    );
                }
                id = *next;
            }
            DagNode::Test {
                test,
                when_true,
                when_false,
            } => {
                id = if test_holds(test, &temps[test.input()]) {
                    *when_true
                } else {
                    *when_false
                };
            }
        }
    }
}

fn evaluate(eval: &Arc<DagEvaluation>, input: &Value) -> Vec<Value> {
    match eval.as_ref() {
        DagEvaluation::TypeCast { .. } | DagEvaluation::NullableUnwrap { .. } => {
            vec![input.clone()]
        }
        DagEvaluation::Field { .. } | DagEvaluation::Property { .. } => {
            // The only member the fixtures read is a sequence length.
            vec![Value::Int(input.list().len() as i64)]
        }
        DagEvaluation::Deconstruct { .. } => match input {
            Value::Pair(a, b) => vec![(**a).clone(), (**b).clone()],
            other => panic!("expected a pair, got {other:?}"),
        },
        DagEvaluation::Index {
            index, from_end, ..
        } => {
            let items = input.list();
            let at = if *from_end {
                items.len() - *index as usize
            } else {
                *index as usize
            };
            vec![items[at].clone()]
        }
        DagEvaluation::Slice {
            start, end_from_end, ..
        } => {
            let items = input.list();
            let end = items.len() - *end_from_end as usize;
            vec![Value::List(items[*start as usize..end].to_vec())]
        }
        other => panic!("evaluation {other:?} not modeled by the cross-check"),
    }
}

fn test_holds(test: &DagTest, input: &Value) -> bool {
    match test {
        DagTest::NonNull { .. } => *input != Value::Null,
        DagTest::Null { .. } => *input == Value::Null,
        DagTest::Value {
            value: ConstValue::Int(c),
            ..
        } => BigInt::from(input.int()) == *c,
        DagTest::Relational {
            op,
            value: ConstValue::Int(c),
            ..
        } => {
            let lhs = BigInt::from(input.int());
            match op {
                Relation::Equal => lhs == *c,
                Relation::LessThan => lhs < *c,
                Relation::LessThanOrEqual => lhs <= *c,
                Relation::GreaterThan => lhs > *c,
                Relation::GreaterThanOrEqual => lhs >= *c,
            }
        }
        other => panic!("test {other:?} not modeled by the cross-check"),
    }
}

fn matches_pattern(pattern: &Pattern, value: &Value) -> bool {
    match &pattern.kind {
        PatternKind::Discard | PatternKind::Binding(_) => true,
        PatternKind::Null => *value == Value::Null,
        PatternKind::Constant(ConstValue::Int(c)) => {
            *value != Value::Null && BigInt::from(value.int()) == *c
        }
        PatternKind::Relational {
            op,
            value: ConstValue::Int(c),
        } => {
            if *value == Value::Null {
                return false;
            }
            let lhs = BigInt::from(value.int());
            match op {
                Relation::Equal => lhs == *c,
                Relation::LessThan => lhs < *c,
                Relation::LessThanOrEqual => lhs <= *c,
                Relation::GreaterThan => lhs > *c,
                Relation::GreaterThanOrEqual => lhs >= *c,
            }
        }
        PatternKind::Recursive {
            target: None,
            deconstruction: Some(deconstruction),
            properties,
            ..
        } if properties.is_empty() => match value {
            Value::Pair(a, b) => {
                matches_pattern(&deconstruction.subpatterns[0], a)
                    && matches_pattern(&deconstruction.subpatterns[1], b)
            }
            Value::Null => false,
            other => panic!("expected a pair, got {other:?}"),
        },
        PatternKind::List { elements, .. } => {
            let Value::List(items) = value else {
                return false;
            };
            let slice_pos = elements
                .iter()
                .position(|e| matches!(e, ListElement::Slice(_)));
            let (before, slice, after): (&[ListElement], _, &[ListElement]) = match slice_pos {
                Some(pos) => (
                    &elements[..pos],
                    Some(&elements[pos]),
                    &elements[pos + 1..],
                ),
                None => (elements.as_slice(), None, &[]),
            };
            let required = before.len() + after.len();
            match slice {
                None if items.len() != required => return false,
                Some(_) if items.len() < required => return false,
                _ => {}
            }
            for (element, item) in before.iter().zip(items) {
                let ListElement::Pattern(sub) = element else {
                    unreachable!()
                };
                if !matches_pattern(sub, item) {
                    return false;
                }
            }
            for (element, item) in after.iter().rev().zip(items.iter().rev()) {
                let ListElement::Pattern(sub) = element else {
                    unreachable!()
                };
                if !matches_pattern(sub, item) {
                    return false;
                }
            }
            if let Some(ListElement::Slice(Some(sub))) = slice {
                let captured = Value::List(items[before.len()..items.len() - after.len()].to_vec());
                if !matches_pattern(sub, &captured) {
                    return false;
                }
            }
            true
        }
        PatternKind::And(lhs, rhs) => matches_pattern(lhs, value) && matches_pattern(rhs, value),
        PatternKind::Or(lhs, rhs) => matches_pattern(lhs, value) || matches_pattern(rhs, value),
        PatternKind::Not(inner) => !matches_pattern(inner, value),
        other => panic!("pattern {other:?} not modeled by the cross-check"),
    }
}

fn reference_label(arms: &[patdag_analysis::MatchArm], value: &Value) -> Label {
    arms.iter()
        .find(|arm| matches_pattern(&arm.pattern, value))
        .map(|arm| arm.label)
        .unwrap_or(DEFAULT)
}

fn cross_check(
    scrutinee_ty: patdag_analysis::oracle::TyId,
    arms: &[patdag_analysis::MatchArm],
    values: impl IntoIterator<Item = Value>,
) {
    let dag = build(scrutinee_ty, arms);
    for value in values {
        let expected = reference_label(arms, &value);
        let actual = run_dag(&dag, &value);
        assert_eq!(actual, expected, "dag disagrees on input {value:?}");
    }
}

#[test]
fn dag_agrees_with_first_match_semantics_on_integers() {
    let arms = [
        arm(relational_pat(Relation::LessThan, 0), 0),
        arm(int_pat(0), 1),
        arm(
            Pattern::new(
                PatternKind::And(
                    Box::new(relational_pat(Relation::GreaterThan, 5)),
                    Box::new(relational_pat(Relation::LessThan, 10)),
                ),
                INT,
                SyntaxId(60),
            ),
            2,
        ),
        arm(discard(INT, 9), 3),
    ];
    cross_check(INT, &arms, (-3..=12).map(Value::Int));
}

#[test]
fn dag_agrees_with_first_match_semantics_on_pairs() {
    let arms = [
        arm(pair_pat(int_pat(0), discard(INT, 90), 50), 0),
        arm(pair_pat(discard(INT, 91), int_pat(1), 51), 1),
        arm(
            Pattern::new(
                PatternKind::Not(Box::new(pair_pat(int_pat(2), int_pat(2), 52))),
                PAIR,
                SyntaxId(61),
            ),
            2,
        ),
        arm(discard(PAIR, 9), 3),
    ];
    let values = (0..4).flat_map(|a| {
        (0..4).map(move |b| Value::Pair(Box::new(Value::Int(a)), Box::new(Value::Int(b))))
    });
    cross_check(PAIR, &arms, values);
}

#[test]
fn dag_agrees_with_first_match_semantics_on_lists() {
    let arms = [
        arm(list_pat(vec![], 50), 0),
        arm(
            list_pat(
                vec![
                    ListElement::Pattern(int_pat(1)),
                    ListElement::Slice(None),
                ],
                51,
            ),
            1,
        ),
        arm(
            list_pat(
                vec![
                    ListElement::Slice(None),
                    ListElement::Pattern(int_pat(2)),
                ],
                52,
            ),
            2,
        ),
        arm(
            list_pat(
                vec![
                    ListElement::Pattern(discard(INT, 90)),
                    ListElement::Pattern(discard(INT, 91)),
                ],
                53,
            ),
            3,
        ),
        arm(discard(INT_ARRAY, 9), 4),
    ];

    let mut values = vec![Value::Null];
    for len in 0usize..=3 {
        let count = 2usize.pow(len as u32);
        for bits in 0..count {
            let items = (0..len)
                .map(|i| Value::Int(if bits >> i & 1 == 0 { 1 } else { 2 }))
                .collect();
            values.push(Value::List(items));
        }
    }
    cross_check(INT_ARRAY, &arms, values);
}
