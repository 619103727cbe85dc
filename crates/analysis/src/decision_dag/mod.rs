//! # Decision DAG construction for pattern matching
//!
//! This module lowers a prioritized list of match cases into a single
//! decision DAG: a directed acyclic graph of evaluations (side
//! computations producing temps) and boolean tests, terminating in leaves
//! that name the case selected. The approach follows the state-frontier
//! construction used by production pattern compilers rather than
//! per-pattern tree compilation:
//!
//! - Each DAG state captures the cases still possible and the value-set
//!   knowledge accumulated on the path reaching it. States are memoized,
//!   so the graph shares sub-DAGs across cases instead of duplicating
//!   them per arm.
//! - Tests whose outcome is implied by earlier decisions are never
//!   emitted. As a consequence, every leaf in the finished DAG is
//!   genuinely reachable by some input, which is what turns the DAG into
//!   an exhaustiveness and reachability oracle.
//! - Guards stay opaque: a `When` node evaluates a guard after its
//!   pattern has fully matched, and a failed guard falls through to the
//!   next case in priority order.

mod builder;
mod types;


pub(crate) use self::builder::{build_dag, lower_case};
pub use self::types::{DagNode, DecisionDag, Label, NodeId};
