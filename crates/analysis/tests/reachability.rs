mod test_oracle;

use domain::{ConstValue, Relation};
use num_bigint::BigInt;
use patdag_analysis::diagnostics::PatternMatchDiag;
use patdag_analysis::oracle::{SyntaxId, WhenClauseId};
use patdag_analysis::pattern::{Pattern, PatternKind, PropertyPattern};
use patdag_analysis::{
    analyze_match, check_exhaustiveness, check_reachability, check_redundant_disjuncts, MatchArm,
};

use test_oracle::{
    arm, int_pat, type_pat, TestOracle, COLOR, DEFAULT, INT, INT_ARRAY, LENGTH, LEN_MEMBER, OBJECT,
};

fn relational(op: Relation, v: i64, syntax: u32) -> Pattern {
    Pattern::new(
        PatternKind::Relational {
            op,
            value: ConstValue::Int(BigInt::from(v)),
        },
        INT,
        SyntaxId(syntax),
    )
}

fn or(lhs: Pattern, rhs: Pattern, syntax: u32) -> Pattern {
    let ty = lhs.ty;
    Pattern::new(
        PatternKind::Or(Box::new(lhs), Box::new(rhs)),
        ty,
        SyntaxId(syntax),
    )
}

/// `{ Length: n }` on a sequence type.
fn length_pat(n: i64, syntax: u32) -> Pattern {
    Pattern::new(
        PatternKind::Recursive {
            target: None,
            deconstruction: None,
            properties: vec![PropertyPattern {
                member: LEN_MEMBER,
                is_field: false,
                pattern: Pattern::new(
                    PatternKind::Constant(ConstValue::Int(BigInt::from(n))),
                    LENGTH,
                    SyntaxId(syntax + 1),
                ),
            }],
            binding: None,
        },
        INT_ARRAY,
        SyntaxId(syntax),
    )
}

#[test]
fn second_identical_disjunct_is_redundant() {
    let first = Pattern::new(
        PatternKind::Type {
            target: INT,
            binding: None,
        },
        OBJECT,
        SyntaxId(100),
    );
    let second = Pattern::new(
        PatternKind::Type {
            target: INT,
            binding: None,
        },
        OBJECT,
        SyntaxId(101),
    );
    let pattern = or(first, second, 102);

    let diags = check_redundant_disjuncts(&TestOracle, OBJECT, SyntaxId(0), &[], &pattern);
    assert_eq!(diags.len(), 1);
    assert!(matches!(&diags[0], PatternMatchDiag::Redundant(d) if d.syntax == SyntaxId(101)));
}

#[test]
fn complementary_relational_disjuncts_are_not_redundant() {
    let pattern = or(
        relational(Relation::GreaterThan, 0, 100),
        relational(Relation::LessThanOrEqual, 0, 101),
        102,
    );

    let diags = check_redundant_disjuncts(&TestOracle, INT, SyntaxId(0), &[], &pattern);
    assert!(diags.is_empty(), "{diags:?}");

    // Together the disjuncts also cover the whole integer line.
    let arms = [arm(pattern, 0)];
    assert!(check_exhaustiveness(&TestOracle, INT, SyntaxId(0), &arms));
}

#[test]
fn disjunct_subsumed_by_earlier_arm_is_redundant() {
    let prior = relational(Relation::GreaterThanOrEqual, 0, 90);
    let pattern = or(
        relational(Relation::GreaterThan, 10, 100),
        relational(Relation::LessThan, 0, 101),
        102,
    );

    let diags = check_redundant_disjuncts(&TestOracle, INT, SyntaxId(0), &[&prior], &pattern);
    assert_eq!(diags.len(), 1);
    assert!(matches!(&diags[0], PatternMatchDiag::Redundant(d) if d.syntax == SyntaxId(100)));
}

#[test]
fn negated_length_pattern_covers_null_and_other_lengths() {
    let negated = Pattern::new(
        PatternKind::Not(Box::new(length_pat(0, 110))),
        INT_ARRAY,
        SyntaxId(100),
    );
    let arms = [arm(negated, 0), arm(length_pat(0, 101), 1)];
    assert!(check_exhaustiveness(&TestOracle, INT_ARRAY, SyntaxId(0), &arms));

    // A property pattern never matches null, so its negation does; a
    // trailing null arm has nothing left.
    let negated = Pattern::new(
        PatternKind::Not(Box::new(length_pat(0, 110))),
        INT_ARRAY,
        SyntaxId(100),
    );
    let null = Pattern::new(PatternKind::Null, INT_ARRAY, SyntaxId(102));
    let arms = [arm(negated, 0), arm(length_pat(0, 101), 1), arm(null, 2)];
    let analysis = analyze_match(&TestOracle, INT_ARRAY, SyntaxId(0), &arms, DEFAULT);
    assert!(analysis.is_exhaustive);
    assert!(analysis
        .diagnostics
        .iter()
        .any(|d| matches!(d, PatternMatchDiag::Subsumed(s) if s.syntax == SyntaxId(102))));
}

#[test]
fn duplicate_arm_and_gap_are_both_reported() {
    let arms = [arm(int_pat(1), 0), {
        let mut duplicate = int_pat(1);
        duplicate.syntax = SyntaxId(101);
        MatchArm::new(duplicate, patdag_analysis::Label(1), SyntaxId(101))
    }];
    let analysis = analyze_match(&TestOracle, INT, SyntaxId(0), &arms, DEFAULT);
    assert!(!analysis.is_exhaustive);
    assert_eq!(
        check_reachability(&TestOracle, INT, SyntaxId(0), &arms),
        vec![true, false]
    );

    assert!(analysis
        .diagnostics
        .iter()
        .any(|d| matches!(d, PatternMatchDiag::Subsumed(s) if s.syntax == SyntaxId(101))));

    let gap = analysis
        .diagnostics
        .iter()
        .find_map(|d| match d {
            PatternMatchDiag::NotExhaustive(d) => Some(d),
            _ => None,
        })
        .expect("missing exhaustiveness diagnostic");
    let sample = gap.sample.as_ref().expect("a witness is synthesizable");
    assert_eq!(sample.display, "0");
    assert!(!sample.requires_false_when_clause);
}

#[test]
fn guarded_catch_all_is_not_exhaustive() {
    let catch_all = Pattern::new(PatternKind::Discard, INT, SyntaxId(100));
    let arms = [MatchArm::new(catch_all, patdag_analysis::Label(0), SyntaxId(100))
        .with_when(WhenClauseId(0))];
    let analysis = analyze_match(&TestOracle, INT, SyntaxId(0), &arms, DEFAULT);
    assert!(!analysis.is_exhaustive);

    let gap = analysis
        .diagnostics
        .iter()
        .find_map(|d| match d {
            PatternMatchDiag::NotExhaustive(d) => Some(d),
            _ => None,
        })
        .expect("missing exhaustiveness diagnostic");
    let sample = gap.sample.as_ref().expect("a witness is synthesizable");
    assert_eq!(sample.display, "_");
    assert!(sample.requires_false_when_clause);
}

#[test]
fn missing_enum_constant_is_named_in_the_message() {
    let red = Pattern::new(
        PatternKind::Constant(ConstValue::Int(BigInt::from(0))),
        COLOR,
        SyntaxId(100),
    );
    let arms = [arm(red, 0)];
    let analysis = analyze_match(&TestOracle, COLOR, SyntaxId(0), &arms, DEFAULT);
    assert!(!analysis.is_exhaustive);

    let message = analysis
        .diagnostics
        .iter()
        .find(|d| matches!(d, PatternMatchDiag::NotExhaustive(_)))
        .expect("missing exhaustiveness diagnostic")
        .message();
    assert_eq!(message, "match is not exhaustive: `Green` is not handled");
}

#[test]
fn deeply_nested_pattern_degrades_to_too_complex() {
    let mut pattern = int_pat(1);
    for i in 0..600 {
        pattern = Pattern::new(
            PatternKind::Not(Box::new(pattern)),
            INT,
            SyntaxId(5000 + i),
        );
    }
    let arms = [arm(pattern, 0)];
    let analysis = analyze_match(&TestOracle, INT, SyntaxId(0), &arms, DEFAULT);

    assert!(analysis.dag.is_none());
    // Suppressed follow-on diagnostics: exhaustive by fiat, one error.
    assert!(analysis.is_exhaustive);
    assert_eq!(analysis.diagnostics.len(), 1);
    assert!(matches!(
        analysis.diagnostics[0],
        PatternMatchDiag::TooComplex(_)
    ));
}

#[test]
fn nesting_past_the_limit_degrades_inside_the_default_stack() {
    // 400 levels is past the depth budget but within reach of a default
    // 2 MiB test thread; degradation must kick in before the stack does.
    let mut pattern = int_pat(1);
    for i in 0..400 {
        pattern = Pattern::new(
            PatternKind::Not(Box::new(pattern)),
            INT,
            SyntaxId(6000 + i),
        );
    }
    let arms = [arm(pattern, 0)];
    let analysis = analyze_match(&TestOracle, INT, SyntaxId(0), &arms, DEFAULT);

    assert!(analysis.dag.is_none());
    assert!(analysis.is_exhaustive);
    assert!(matches!(
        analysis.diagnostics[0],
        PatternMatchDiag::TooComplex(_)
    ));
}

#[test]
fn type_dispatch_with_catch_all_keeps_every_arm_live() {
    let arms = [
        arm(type_pat(OBJECT, INT), 0),
        arm(type_pat(OBJECT, COLOR), 1),
        arm(type_pat(OBJECT, OBJECT), 2),
    ];
    let analysis = analyze_match(&TestOracle, OBJECT, SyntaxId(0), &arms, DEFAULT);
    assert!(analysis.is_exhaustive);
    assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
}
