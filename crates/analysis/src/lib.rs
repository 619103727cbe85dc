//! Pattern-matching decision analysis.
//!
//! This crate lowers bound pattern trees into a shared decision DAG and
//! derives the static facts a compiler front end reports about a match
//! construct: which arms are unreachable, whether the construct is
//! exhaustive, which `or` disjuncts are redundant, and a witness value
//! when it is not exhaustive. The host compiler supplies type knowledge
//! through the [`oracle::TypeOracle`] trait and consumes abstract
//! [`diagnostics::PatternMatchDiag`] events.

pub mod decision_dag;
pub mod diagnostics;
pub mod guard;
pub mod logic;
mod normalize;
pub mod oracle;
pub mod pattern;
pub mod reachability;
pub mod sampler;
pub mod temp;

pub use decision_dag::{DagNode, DecisionDag, Label, NodeId};
pub use reachability::{
    analyze_match, build_decision_dag, check_exhaustiveness, check_reachability,
    check_redundant_disjuncts, MatchArm, MatchAnalysis,
};
pub use sampler::{sample_unmatched, UnmatchedSample};
