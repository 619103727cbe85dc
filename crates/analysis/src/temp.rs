//! Temps, evaluations, and primitive tests.
//!
//! A [`DagTemp`] names a value derived from the match input; a
//! [`DagEvaluation`] is an operation producing a temp from another temp; a
//! [`DagTest`] is a boolean check on a temp. Identity is structural for
//! all three, so two cases reading the same field of the same temp talk
//! about the *same* temp, which is what lets the builder merge their tests
//! into one DAG node. Syntax locations ride along for diagnostics but do
//! not participate in identity.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use domain::{ConstValue, Relation};

use crate::oracle::{MemberId, SyntaxId, TyId};

/// A value derived from the match input.
#[derive(Clone, Debug)]
pub struct DagTemp {
    pub ty: TyId,
    /// The evaluation producing this temp, or `None` for the root input.
    pub source: Option<Arc<DagEvaluation>>,
    /// Which output of a multi-output evaluation this temp is.
    pub index: u32,
    pub syntax: SyntaxId,
}

impl DagTemp {
    /// The original input expression.
    pub fn root(ty: TyId, syntax: SyntaxId) -> Self {
        Self {
            ty,
            source: None,
            index: 0,
            syntax,
        }
    }

    pub fn from_evaluation(source: Arc<DagEvaluation>, index: u32, syntax: SyntaxId) -> Self {
        let ty = source.result_ty(index);
        Self {
            ty,
            source: Some(source),
            index,
            syntax,
        }
    }

    pub fn is_root(&self) -> bool {
        self.source.is_none()
    }
}

impl PartialEq for DagTemp {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && self.index == other.index && self.source == other.source
    }
}

impl Eq for DagTemp {}

impl Hash for DagTemp {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ty.hash(state);
        self.index.hash(state);
        self.source.hash(state);
    }
}

impl Ord for DagTemp {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.ty, self.index, &self.source).cmp(&(other.ty, other.index, &other.source))
    }
}

impl PartialOrd for DagTemp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An operation reading a temp and producing one or more new temps.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DagEvaluation {
    /// Reinterpret `input` at `ty` after a successful type test.
    TypeCast { input: DagTemp, ty: TyId },
    /// Read the underlying value of a nullable wrapper.
    NullableUnwrap { input: DagTemp, ty: TyId },
    Field {
        input: DagTemp,
        member: MemberId,
        ty: TyId,
    },
    Property {
        input: DagTemp,
        member: MemberId,
        ty: TyId,
    },
    /// Positional deconstruction; one output temp per element of
    /// `output_tys`, addressed by temp index.
    Deconstruct {
        input: DagTemp,
        method: Option<MemberId>,
        output_tys: Vec<TyId>,
    },
    /// Element read of an indexable sequence.
    Index {
        input: DagTemp,
        index: u32,
        from_end: bool,
        ty: TyId,
    },
    /// Sub-sequence read spanning `start` from the front to `end_from_end`
    /// from the back.
    Slice {
        input: DagTemp,
        start: u32,
        end_from_end: u32,
        ty: TyId,
    },
    EnumeratorAcquire { input: DagTemp, ty: TyId },
    /// The `step`th advance of an enumerator. Distinct steps are distinct
    /// evaluations, so each is performed once per path.
    EnumeratorAdvance { input: DagTemp, step: u32 },
    /// The element the enumerator is positioned on after advance `step`.
    EnumeratorCurrent {
        input: DagTemp,
        step: u32,
        ty: TyId,
    },
    /// Internal iteration counter increment.
    IterationCounter { input: DagTemp },
}

impl DagEvaluation {
    pub fn input(&self) -> &DagTemp {
        match self {
            DagEvaluation::TypeCast { input, .. }
            | DagEvaluation::NullableUnwrap { input, .. }
            | DagEvaluation::Field { input, .. }
            | DagEvaluation::Property { input, .. }
            | DagEvaluation::Deconstruct { input, .. }
            | DagEvaluation::Index { input, .. }
            | DagEvaluation::Slice { input, .. }
            | DagEvaluation::EnumeratorAcquire { input, .. }
            | DagEvaluation::EnumeratorAdvance { input, .. }
            | DagEvaluation::EnumeratorCurrent { input, .. }
            | DagEvaluation::IterationCounter { input } => input,
        }
    }

    pub fn result_ty(&self, index: u32) -> TyId {
        match self {
            DagEvaluation::TypeCast { ty, .. }
            | DagEvaluation::NullableUnwrap { ty, .. }
            | DagEvaluation::Field { ty, .. }
            | DagEvaluation::Property { ty, .. }
            | DagEvaluation::Index { ty, .. }
            | DagEvaluation::Slice { ty, .. }
            | DagEvaluation::EnumeratorAcquire { ty, .. }
            | DagEvaluation::EnumeratorCurrent { ty, .. } => {
                debug_assert_eq!(index, 0);
                *ty
            }
            DagEvaluation::Deconstruct { output_tys, .. } => output_tys[index as usize],
            DagEvaluation::EnumeratorAdvance { input, .. }
            | DagEvaluation::IterationCounter { input } => {
                debug_assert_eq!(index, 0);
                input.ty
            }
        }
    }
}

/// A boolean-valued check on a temp.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DagTest {
    NonNull { input: DagTemp },
    Null { input: DagTemp },
    /// Is the value of runtime type `ty`?
    Type { input: DagTemp, ty: TyId },
    /// Does the value equal `value`?
    Value { input: DagTemp, value: ConstValue },
    Relational {
        input: DagTemp,
        op: Relation,
        value: ConstValue,
    },
    /// Did an enumerator advance produce an element?
    MoveNext { input: DagTemp },
    /// Is the enumerator exhausted after exactly `bound` elements?
    IterationBound { input: DagTemp, bound: u32 },
}

impl DagTest {
    pub fn input(&self) -> &DagTemp {
        match self {
            DagTest::NonNull { input }
            | DagTest::Null { input }
            | DagTest::Type { input, .. }
            | DagTest::Value { input, .. }
            | DagTest::Relational { input, .. }
            | DagTest::MoveNext { input }
            | DagTest::IterationBound { input, .. } => input,
        }
    }
}
