//! The public analysis surface: DAG construction, exhaustiveness, arm
//! reachability and or-disjunct redundancy for one match construct.
//!
//! Everything here orchestrates the same primitive: lower cases, build
//! the decision DAG, read the reachable-label set off it. An arm whose
//! label no feasible path reaches is subsumed; a reachable default label
//! means the match is not exhaustive; a disjunct is redundant when its
//! stand-in case loses its label after disjunction lifting.

use indexmap::IndexSet;

use crate::decision_dag::{build_dag, lower_case, DagNode, DecisionDag, Label, NodeId};
use crate::diagnostics::{
    PatternMatchDiag, PatternSubsumed, PatternTooComplex, RedundantPattern, SwitchNotExhaustive,
};
use crate::guard::TooComplex;
use crate::normalize::{lift_disjunctions, normalize, OrCase};
use crate::oracle::{SyntaxId, TyId, TypeOracle, WhenClauseId};
use crate::pattern::Pattern;
use crate::sampler::sample_unmatched;
use crate::temp::DagTemp;

/// One arm of a match construct, in priority order.
#[derive(Clone, Debug)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub when: Option<WhenClauseId>,
    /// The leaf this arm selects. Distinct arms must carry distinct
    /// labels.
    pub label: Label,
    pub syntax: SyntaxId,
}

impl MatchArm {
    pub fn new(pattern: Pattern, label: Label, syntax: SyntaxId) -> Self {
        Self {
            pattern,
            when: None,
            label,
            syntax,
        }
    }

    pub fn with_when(mut self, when: WhenClauseId) -> Self {
        self.when = Some(when);
        self
    }
}

/// Result of analyzing one match construct.
#[derive(Debug)]
pub struct MatchAnalysis {
    /// `None` when the construct was too complex to build.
    pub dag: Option<DecisionDag>,
    pub is_exhaustive: bool,
    pub diagnostics: Vec<PatternMatchDiag>,
}

/// Build the decision DAG for `arms` against a scrutinee of type
/// `scrutinee_ty`. Diagnostics cover recoverable per-case findings
/// (unsatisfiable length constraints); reachability findings are read off
/// the DAG by the callers.
pub fn build_decision_dag(
    oracle: &dyn TypeOracle,
    scrutinee_ty: TyId,
    scrutinee_syntax: SyntaxId,
    arms: &[MatchArm],
    default_label: Label,
) -> Result<(DecisionDag, Vec<PatternMatchDiag>), TooComplex> {
    let root = DagTemp::root(scrutinee_ty, scrutinee_syntax);
    let mut diagnostics = Vec::new();
    let mut cases = Vec::with_capacity(arms.len());
    for (index, arm) in arms.iter().enumerate() {
        let (rows, mut case_diags) = lower_case(oracle, &root, arm, index)?;
        diagnostics.append(&mut case_diags);
        cases.extend(rows);
    }
    let dag = build_dag(oracle, root, cases, default_label)?;
    Ok((dag, diagnostics))
}

/// The full analysis a binder runs per match construct: subsumed arms,
/// exhaustiveness with a counterexample, recoverable lowering errors.
pub fn analyze_match(
    oracle: &dyn TypeOracle,
    scrutinee_ty: TyId,
    scrutinee_syntax: SyntaxId,
    arms: &[MatchArm],
    default_label: Label,
) -> MatchAnalysis {
    let (dag, mut diagnostics) =
        match build_decision_dag(oracle, scrutinee_ty, scrutinee_syntax, arms, default_label) {
            Ok(built) => built,
            Err(TooComplex) => {
                return MatchAnalysis {
                    dag: None,
                    // Suppress follow-on noise for a construct we could
                    // not analyze.
                    is_exhaustive: true,
                    diagnostics: vec![PatternTooComplex {
                        syntax: scrutinee_syntax,
                    }
                    .into()],
                }
            }
        };

    let reachable = dag.reachable_labels();
    for arm in arms {
        if !reachable.contains(&arm.label) && !arm.pattern.synthesized {
            diagnostics.push(PatternSubsumed { syntax: arm.syntax }.into());
        }
    }

    let is_exhaustive = !reachable.contains(&default_label);
    if !is_exhaustive {
        let sample = default_leaf(&dag).and_then(|leaf| {
            // Prefer a witness that needs no null values; not every
            // default path offers one.
            sample_unmatched(oracle, &dag, leaf, true)
                .or_else(|| sample_unmatched(oracle, &dag, leaf, false))
        });
        diagnostics.push(
            SwitchNotExhaustive {
                syntax: scrutinee_syntax,
                sample,
            }
            .into(),
        );
    }

    MatchAnalysis {
        dag: Some(dag),
        is_exhaustive,
        diagnostics,
    }
}

/// Does the case list handle every value of the scrutinee type?
pub fn check_exhaustiveness(
    oracle: &dyn TypeOracle,
    scrutinee_ty: TyId,
    scrutinee_syntax: SyntaxId,
    arms: &[MatchArm],
) -> bool {
    let default_label = Label(arms.iter().map(|a| a.label.0 + 1).max().unwrap_or(0));
    match build_decision_dag(oracle, scrutinee_ty, scrutinee_syntax, arms, default_label) {
        Ok((dag, _)) => !dag.reachable_labels().contains(&default_label),
        // Benefit of the doubt for constructs we could not analyze.
        Err(TooComplex) => true,
    }
}

/// Per-arm reachability, in arm order. An arm is reachable when some
/// input value selects its label.
pub fn check_reachability(
    oracle: &dyn TypeOracle,
    scrutinee_ty: TyId,
    scrutinee_syntax: SyntaxId,
    arms: &[MatchArm],
) -> Vec<bool> {
    let default_label = Label(arms.iter().map(|a| a.label.0 + 1).max().unwrap_or(0));
    match build_decision_dag(oracle, scrutinee_ty, scrutinee_syntax, arms, default_label) {
        Ok((dag, _)) => {
            let reachable = dag.reachable_labels();
            arms.iter().map(|arm| reachable.contains(&arm.label)).collect()
        }
        Err(TooComplex) => vec![true; arms.len()],
    }
}

/// The interned leaf node carrying the DAG's default label, if any path
/// retained it.
pub fn default_leaf(dag: &DecisionDag) -> Option<NodeId> {
    let default = dag.default_label();
    dag.node_ids()
        .find(|&id| matches!(dag.node(id), DagNode::Leaf { label } if *label == default))
}

/// Flag `or` disjuncts of `pattern` that match nothing of their own,
/// given the arms accepted before it.
///
/// Disjuncts compiled into one DAG path share their leaf, so a subsumed
/// disjunct is invisible in the main DAG. Each disjunction is therefore
/// lifted into its own expansion set of stand-in top-level cases and
/// rebuilt against the preceding arms plus the negation of the whole
/// pattern (which re-checks the default path). The analysis runs a second
/// time on the normalized negation of the pattern, catching holes the
/// negation expansion introduces symmetrically.
pub fn check_redundant_disjuncts(
    oracle: &dyn TypeOracle,
    scrutinee_ty: TyId,
    scrutinee_syntax: SyntaxId,
    preceding: &[&Pattern],
    pattern: &Pattern,
) -> Vec<PatternMatchDiag> {
    let (positive, negative) = match (
        normalize(oracle, pattern, false),
        normalize(oracle, pattern, true),
    ) {
        (Ok(p), Ok(n)) => (p, n),
        _ => {
            return vec![PatternTooComplex {
                syntax: pattern.syntax,
            }
            .into()]
        }
    };

    let mut flagged: IndexSet<SyntaxId> = IndexSet::new();
    for (candidate, complement) in [(&positive, &negative), (&negative, &positive)] {
        for set in lift_disjunctions(candidate) {
            check_expansion_set(
                oracle,
                scrutinee_ty,
                scrutinee_syntax,
                preceding,
                &set,
                complement,
                &mut flagged,
            );
        }
    }

    flagged
        .into_iter()
        .map(|syntax| RedundantPattern { syntax }.into())
        .collect()
}

fn check_expansion_set(
    oracle: &dyn TypeOracle,
    scrutinee_ty: TyId,
    scrutinee_syntax: SyntaxId,
    preceding: &[&Pattern],
    set: &[OrCase],
    complement: &Pattern,
    flagged: &mut IndexSet<SyntaxId>,
) {
    let mut arms = Vec::with_capacity(preceding.len() + set.len() + 1);
    let mut next_label = 0u32;
    let mut label = |next_label: &mut u32| {
        let l = Label(*next_label);
        *next_label += 1;
        l
    };

    for prior in preceding {
        arms.push(MatchArm::new(
            (*prior).clone(),
            label(&mut next_label),
            prior.syntax,
        ));
    }
    let disjunct_labels: Vec<(Label, Option<SyntaxId>)> = set
        .iter()
        .map(|case| {
            let l = label(&mut next_label);
            arms.push(MatchArm::new(case.pattern.clone(), l, case.pattern.syntax));
            (l, case.syntax)
        })
        .collect();
    // The complement case keeps the default path honest without being a
    // candidate itself.
    arms.push(MatchArm::new(
        complement.clone(),
        label(&mut next_label),
        complement.syntax,
    ));
    let default_label = label(&mut next_label);

    let Ok((dag, _)) =
        build_decision_dag(oracle, scrutinee_ty, scrutinee_syntax, &arms, default_label)
    else {
        // Conservative: an expansion set too complex to rebuild flags
        // nothing.
        return;
    };
    let reachable = dag.reachable_labels();
    for (label, syntax) in disjunct_labels {
        if let Some(syntax) = syntax {
            if !reachable.contains(&label) {
                flagged.insert(syntax);
            }
        }
    }
}
