//! Interfaces to the surrounding compiler.
//!
//! The analysis never inspects types or symbols itself; it asks the
//! [`TypeOracle`] the binder hands it. All identifiers crossing this
//! boundary are opaque handles minted by the host.

use domain::{ConstValue, NumericDomain, ValueSet};
use num_bigint::BigInt;

/// A type handle minted by the host type system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TyId(pub u32);

/// A field, property, deconstructor or indexer symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberId(pub u32);

/// A pattern variable symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(pub u32);

/// A syntax location; diagnostics point back at these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SyntaxId(pub u32);

/// A bound-but-unevaluated when clause. The analysis treats guards as
/// black boxes that may evaluate either way.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WhenClauseId(pub u32);

/// A declared enum constant: its display name and underlying value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumConstant {
    pub name: String,
    pub value: BigInt,
}

/// Whether an enum type admits values outside its declared constants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnumShape {
    /// Every value of the type is one of the declared constants.
    Closed,
    /// The type ranges over its full underlying integer domain.
    Open,
}

/// How a sequence type supports element access, which decides how a list
/// pattern is lowered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequenceKind {
    /// Has a length and random access (possibly from the end).
    Indexable {
        length_member: MemberId,
        length_ty: TyId,
        element_ty: TyId,
        /// Result type of a sub-range read.
        slice_ty: TyId,
    },
    /// Only supports acquiring an enumerator and stepping it.
    Enumerable {
        enumerator_ty: TyId,
        element_ty: TyId,
    },
}

/// The type-system oracle, implemented by the host compiler.
pub trait TypeOracle {
    /// Is every value of `a` also a value of `b`?
    fn is_subtype_of(&self, a: TyId, b: TyId) -> bool;

    /// Can some runtime value inhabit both `a` and `b`?
    fn types_intersect(&self, a: TyId, b: TyId) -> bool;

    /// Can a value of `ty` be null?
    fn is_nullable(&self, ty: TyId) -> bool;

    /// The underlying type of a nullable value-type wrapper, if `ty` is
    /// one. Such inputs are unwrapped after a non-null test.
    fn nullable_underlying(&self, ty: TyId) -> Option<TyId> {
        let _ = ty;
        None
    }

    /// The value domain of a primitive type, or `None` for types with no
    /// usable value-set abstraction.
    fn value_domain(&self, ty: TyId) -> Option<ValueSet> {
        let _ = ty;
        None
    }

    /// The numeric domain of `ty`, if it is an integer-like type.
    fn numeric_domain(&self, ty: TyId) -> Option<NumericDomain> {
        match self.value_domain(ty)? {
            ValueSet::Numeric(set) => Some(set.domain().clone()),
            ValueSet::Discrete(_) => None,
        }
    }

    /// Declared constants of an enum type, with its openness.
    fn enum_constants(&self, ty: TyId) -> Option<(EnumShape, Vec<EnumConstant>)> {
        let _ = ty;
        None
    }

    /// Element types of a tuple type.
    fn tuple_elements(&self, ty: TyId) -> Option<Vec<TyId>> {
        let _ = ty;
        None
    }

    /// Sequence support of `ty`, if it is matchable by list patterns.
    fn sequence_kind(&self, ty: TyId) -> Option<SequenceKind> {
        let _ = ty;
        None
    }

    /// Human-readable type name, used in samples and diagnostics.
    fn display_ty(&self, ty: TyId) -> String;

    /// Display name of a member, used when rendering property samples.
    fn display_member(&self, member: MemberId) -> String {
        format!("member#{}", member.0)
    }
}

impl dyn TypeOracle + '_ {
    /// The display name of the enum constant with the given underlying
    /// value, if one is declared.
    pub fn enum_constant_name(&self, ty: TyId, value: &ConstValue) -> Option<String> {
        let ConstValue::Int(value) = value else {
            return None;
        };
        let (_, constants) = self.enum_constants(ty)?;
        constants
            .into_iter()
            .find(|c| c.value == *value)
            .map(|c| c.name)
    }
}
