//! Decision DAG representation.
//!
//! Nodes live in an arena indexed by [`NodeId`]; edges point from a node
//! to nodes constructed before it, so every node's id is strictly greater
//! than the ids of its successors. That invariant makes the node vector a
//! reverse topological order, which the reachability traversal and the
//! counterexample sampler both lean on.

use std::sync::{Arc, OnceLock};

use rustc_hash::FxHashSet;

use crate::oracle::{SymbolId, WhenClauseId};
use crate::temp::{DagEvaluation, DagTemp, DagTest};

/// An opaque target of a case. Distinct cases get distinct labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(super) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DagNode {
    /// Perform a side computation, then continue; no branching.
    Evaluation {
        eval: Arc<DagEvaluation>,
        next: NodeId,
    },
    /// Branch on a boolean test.
    Test {
        test: DagTest,
        when_true: NodeId,
        when_false: NodeId,
    },
    /// A case whose pattern has fully matched: establish its bindings and
    /// evaluate its guard, if any. A failed guard falls through to the
    /// next lower-priority case, never back into pattern matching.
    When {
        bindings: Vec<(SymbolId, DagTemp)>,
        when: Option<WhenClauseId>,
        when_true: NodeId,
        /// `None` when there is no guard to fail.
        when_false: Option<NodeId>,
    },
    Leaf { label: Label },
}

impl DagNode {
    /// Successor node ids, in branch order.
    pub fn successors(&self) -> impl Iterator<Item = NodeId> + '_ {
        let (a, b) = match self {
            DagNode::Evaluation { next, .. } => (Some(*next), None),
            DagNode::Test {
                when_true,
                when_false,
                ..
            } => (Some(*when_true), Some(*when_false)),
            DagNode::When {
                when_true,
                when_false,
                ..
            } => (Some(*when_true), *when_false),
            DagNode::Leaf { .. } => (None, None),
        };
        a.into_iter().chain(b)
    }
}

/// The built decision DAG for one match construct.
#[derive(Debug)]
pub struct DecisionDag {
    nodes: Vec<DagNode>,
    root: NodeId,
    root_temp: DagTemp,
    default_label: Label,
    reachable: OnceLock<FxHashSet<Label>>,
}

impl DecisionDag {
    pub(super) fn new(
        nodes: Vec<DagNode>,
        root: NodeId,
        root_temp: DagTemp,
        default_label: Label,
    ) -> Self {
        Self {
            nodes,
            root,
            root_temp,
            default_label,
            reachable: OnceLock::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_temp(&self) -> &DagTemp {
        &self.root_temp
    }

    pub fn default_label(&self) -> Label {
        self.default_label
    }

    pub fn node(&self, id: NodeId) -> &DagNode {
        &self.nodes[id.index()]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    /// Labels of leaves reachable from the root. Infeasible branches were
    /// pruned during construction, so a plain forward traversal is exact.
    pub fn reachable_labels(&self) -> &FxHashSet<Label> {
        self.reachable.get_or_init(|| {
            let mut seen = vec![false; self.nodes.len()];
            let mut labels = FxHashSet::default();
            let mut stack = vec![self.root];
            while let Some(id) = stack.pop() {
                if std::mem::replace(&mut seen[id.index()], true) {
                    continue;
                }
                match self.node(id) {
                    DagNode::Leaf { label } => {
                        labels.insert(*label);
                    }
                    node => stack.extend(node.successors()),
                }
            }
            labels
        })
    }

    pub fn is_exhaustive(&self) -> bool {
        !self.reachable_labels().contains(&self.default_label)
    }
}
