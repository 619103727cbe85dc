//! The typed pattern tree handed over by the binder.
//!
//! Patterns arriving here are already bound and type checked: every node
//! carries the type it is applied against, member references are resolved,
//! and impossible coercions have been rejected. The analysis only decides
//! how to *test* them.

use domain::{ConstValue, Relation};

use crate::oracle::{MemberId, SymbolId, SyntaxId, TyId, TypeOracle};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    pub kind: PatternKind,
    /// The type of the value this pattern is applied to.
    pub ty: TyId,
    pub syntax: SyntaxId,
    /// Synthesized sub-patterns (desugaring, negation expansion) never
    /// produce redundancy warnings.
    pub synthesized: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatternKind {
    /// `_`: matches anything, including null.
    Discard,
    /// `var x`: matches anything, binds the input.
    Binding(SymbolId),
    /// `T` / `T x`: runtime type test, narrowing the input to `target`.
    Type {
        target: TyId,
        binding: Option<SymbolId>,
    },
    /// `null`.
    Null,
    /// A constant equality test.
    Constant(ConstValue),
    /// `< c`, `<= c`, `> c`, `>= c`.
    Relational { op: Relation, value: ConstValue },
    /// `T (p0, p1) { M0: q0, ... } x`: optional type test, optional
    /// positional deconstruction, property sub-patterns, optional binding.
    Recursive {
        target: Option<TyId>,
        deconstruction: Option<Deconstruction>,
        properties: Vec<PropertyPattern>,
        binding: Option<SymbolId>,
    },
    /// `[p0, .., pn] x`: list pattern with at most one slice element.
    List {
        elements: Vec<ListElement>,
        binding: Option<SymbolId>,
    },
    And(Box<Pattern>, Box<Pattern>),
    Or(Box<Pattern>, Box<Pattern>),
    Not(Box<Pattern>),
}

/// A positional deconstruction: an intrinsic tuple split, or a call to a
/// resolved deconstructor method.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deconstruction {
    /// `None` for tuple types, which deconstruct without a method.
    pub method: Option<MemberId>,
    /// One sub-pattern per output; its `ty` is the output type.
    pub subpatterns: Vec<Pattern>,
}

/// One `Member: pattern` entry of a recursive pattern. The sub-pattern's
/// `ty` is the member's type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyPattern {
    pub member: MemberId,
    /// Plain field access rather than a property getter; decides which
    /// evaluation kind the lowering emits.
    pub is_field: bool,
    pub pattern: Pattern,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListElement {
    Pattern(Pattern),
    /// `..` / `.. p`: absorbs any number of elements; the sub-pattern, if
    /// present, is applied to the captured sub-sequence.
    Slice(Option<Box<Pattern>>),
}

impl Pattern {
    pub fn new(kind: PatternKind, ty: TyId, syntax: SyntaxId) -> Self {
        Self {
            kind,
            ty,
            syntax,
            synthesized: false,
        }
    }

    pub fn synthesized(kind: PatternKind, ty: TyId, syntax: SyntaxId) -> Self {
        Self {
            kind,
            ty,
            syntax,
            synthesized: true,
        }
    }

    pub fn discard(ty: TyId, syntax: SyntaxId) -> Self {
        Self::synthesized(PatternKind::Discard, ty, syntax)
    }

    pub fn is_discard(&self) -> bool {
        matches!(self.kind, PatternKind::Discard)
    }

    /// The type a downstream consumer may assume for the matched value
    /// once this pattern has succeeded.
    pub fn narrowed_ty(&self, oracle: &dyn TypeOracle) -> TyId {
        match &self.kind {
            PatternKind::Type { target, .. } => *target,
            PatternKind::Recursive { target, .. } => target.unwrap_or(self.ty),
            PatternKind::And(_, rhs) => rhs.narrowed_ty(oracle),
            // TODO: the narrowed type of an or/negated pattern could be the
            // join of the operands' narrowed types; using the input type is
            // wider than necessary in some disjunction-under-negation
            // cases. Behavior is pinned by tests in normalize.rs.
            PatternKind::Or(..) | PatternKind::Not(_) => self.ty,
            _ => self.ty,
        }
    }

    /// Does this pattern match every value of its input type, null
    /// included?
    pub fn is_irrefutable(&self) -> bool {
        match &self.kind {
            PatternKind::Discard | PatternKind::Binding(_) => true,
            PatternKind::And(lhs, rhs) => lhs.is_irrefutable() && rhs.is_irrefutable(),
            PatternKind::Or(lhs, rhs) => lhs.is_irrefutable() || rhs.is_irrefutable(),
            _ => false,
        }
    }
}
