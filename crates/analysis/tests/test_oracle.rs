//! A fixture type system shared by the integration tests: a small object
//! hierarchy with primitives, a nullable value type, a closed enum, a
//! tuple, and two sequence flavors.

use domain::{ConstValue, NumericDomain, ValueSet};
use num_bigint::BigInt;
use patdag_analysis::oracle::{
    EnumConstant, EnumShape, MemberId, SequenceKind, SyntaxId, TyId, TypeOracle,
};
use patdag_analysis::pattern::{Pattern, PatternKind};
use patdag_analysis::{Label, MatchArm};

pub const OBJECT: TyId = TyId(0);
pub const STRING: TyId = TyId(1);
pub const INT: TyId = TyId(2);
pub const BOOL: TyId = TyId(3);
pub const NULLABLE_INT: TyId = TyId(4);
pub const COLOR: TyId = TyId(5);
pub const PAIR: TyId = TyId(6);
pub const INT_ARRAY: TyId = TyId(7);
pub const SEQ: TyId = TyId(8);
pub const ENUMERATOR: TyId = TyId(9);
pub const LENGTH: TyId = TyId(10);

pub const LEN_MEMBER: MemberId = MemberId(0);
pub const DEFAULT: Label = Label(999);

pub struct TestOracle;

impl TypeOracle for TestOracle {
    fn is_subtype_of(&self, a: TyId, b: TyId) -> bool {
        a == b || b == OBJECT
    }

    fn types_intersect(&self, a: TyId, b: TyId) -> bool {
        self.is_subtype_of(a, b) || self.is_subtype_of(b, a)
    }

    fn is_nullable(&self, ty: TyId) -> bool {
        matches!(ty, OBJECT | STRING | NULLABLE_INT | INT_ARRAY | SEQ)
    }

    fn nullable_underlying(&self, ty: TyId) -> Option<TyId> {
        (ty == NULLABLE_INT).then_some(INT)
    }

    fn value_domain(&self, ty: TyId) -> Option<ValueSet> {
        match ty {
            INT => Some(ValueSet::full_numeric(NumericDomain::signed(32))),
            BOOL => Some(ValueSet::booleans()),
            STRING => Some(ValueSet::strings()),
            COLOR => Some(ValueSet::closed_enum([
                ConstValue::Int(BigInt::from(0)),
                ConstValue::Int(BigInt::from(1)),
            ])),
            LENGTH => Some(ValueSet::full_numeric(NumericDomain::length())),
            _ => None,
        }
    }

    fn enum_constants(&self, ty: TyId) -> Option<(EnumShape, Vec<EnumConstant>)> {
        (ty == COLOR).then(|| {
            (
                EnumShape::Closed,
                vec![
                    EnumConstant {
                        name: "Red".to_string(),
                        value: BigInt::from(0),
                    },
                    EnumConstant {
                        name: "Green".to_string(),
                        value: BigInt::from(1),
                    },
                ],
            )
        })
    }

    fn tuple_elements(&self, ty: TyId) -> Option<Vec<TyId>> {
        (ty == PAIR).then(|| vec![INT, INT])
    }

    fn sequence_kind(&self, ty: TyId) -> Option<SequenceKind> {
        match ty {
            INT_ARRAY => Some(SequenceKind::Indexable {
                length_member: LEN_MEMBER,
                length_ty: LENGTH,
                element_ty: INT,
                slice_ty: INT_ARRAY,
            }),
            SEQ => Some(SequenceKind::Enumerable {
                enumerator_ty: ENUMERATOR,
                element_ty: INT,
            }),
            _ => None,
        }
    }

    fn display_ty(&self, ty: TyId) -> String {
        match ty {
            OBJECT => "object".to_string(),
            STRING => "string".to_string(),
            INT => "int".to_string(),
            BOOL => "bool".to_string(),
            NULLABLE_INT => "int?".to_string(),
            COLOR => "Color".to_string(),
            PAIR => "(int, int)".to_string(),
            INT_ARRAY => "int[]".to_string(),
            _ => format!("T{}", ty.0),
        }
    }

    fn display_member(&self, member: MemberId) -> String {
        if member == LEN_MEMBER {
            "Length".to_string()
        } else {
            format!("m{}", member.0)
        }
    }
}

pub fn int_pat(v: i64) -> Pattern {
    Pattern::new(
        PatternKind::Constant(ConstValue::Int(BigInt::from(v))),
        INT,
        SyntaxId(1000 + v.unsigned_abs() as u32),
    )
}

pub fn type_pat(input: TyId, target: TyId) -> Pattern {
    Pattern::new(
        PatternKind::Type {
            target,
            binding: None,
        },
        input,
        SyntaxId(2000 + target.0),
    )
}

pub fn arm(pattern: Pattern, label: u32) -> MatchArm {
    let syntax = pattern.syntax;
    MatchArm::new(pattern, Label(label), syntax)
}
