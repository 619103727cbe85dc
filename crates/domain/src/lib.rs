//! Discrete value-set arithmetic for pattern-match analysis.
//!
//! A pattern checker needs to answer questions like "after `< 0` and `> 10`
//! are both excluded, is anything left of this `i32`?" and "give me one
//! concrete value that is left". This crate provides the value-set
//! abstraction those questions are asked of: interval sets over arbitrary
//! precision integers for numeric domains, and finite/cofinite sets for
//! equality-only domains (booleans, strings, closed enums).

use std::collections::BTreeSet;
use std::fmt;

use num_bigint::BigInt;

/// A compile-time constant that can appear in a constant or relational
/// pattern.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConstValue {
    Bool(bool),
    Int(BigInt),
    Str(String),
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Bool(b) => write!(f, "{b}"),
            ConstValue::Int(i) => write!(f, "{i}"),
            ConstValue::Str(s) => write!(f, "{s:?}"),
        }
    }
}

/// Relational operators usable in relational patterns and set filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Relation {
    Equal,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl Relation {
    pub fn display_str(self) -> &'static str {
        match self {
            Relation::Equal => "==",
            Relation::LessThan => "<",
            Relation::LessThanOrEqual => "<=",
            Relation::GreaterThan => ">",
            Relation::GreaterThanOrEqual => ">=",
        }
    }
}

/// The representable range of a numeric type, plus the sub-range we are
/// willing to print a concrete witness from.
///
/// For fixed-width types the two coincide. For platform-width integers the
/// true range depends on the target, so the samplable window is the 32-bit
/// range and anything outside it is reported as [`SampleValue::AboveWindow`]
/// or [`SampleValue::BelowWindow`] rather than as an exact constant.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NumericDomain {
    min: BigInt,
    max: BigInt,
    window_min: BigInt,
    window_max: BigInt,
}

impl NumericDomain {
    pub fn new(min: BigInt, max: BigInt) -> Self {
        assert!(min <= max, "empty numeric domain");
        Self {
            window_min: min.clone(),
            window_max: max.clone(),
            min,
            max,
        }
    }

    pub fn signed(bits: u32) -> Self {
        let one = BigInt::from(1);
        let half: BigInt = one.clone() << (bits - 1);
        Self::new(-half.clone(), half - one)
    }

    pub fn unsigned(bits: u32) -> Self {
        let one = BigInt::from(1);
        let full: BigInt = one.clone() << bits;
        Self::new(BigInt::from(0), full - one)
    }

    /// Platform-width signed integer: 64-bit range, 32-bit witness window.
    pub fn native_int() -> Self {
        let mut domain = Self::signed(64);
        let window = Self::signed(32);
        domain.window_min = window.min;
        domain.window_max = window.max;
        domain
    }

    /// Platform-width unsigned integer: 64-bit range, 32-bit witness window.
    pub fn native_uint() -> Self {
        let mut domain = Self::unsigned(64);
        let window = Self::unsigned(32);
        domain.window_min = window.min;
        domain.window_max = window.max;
        domain
    }

    /// The domain of a sequence length: a non-negative `i32`.
    pub fn length() -> Self {
        Self::new(BigInt::from(0), BigInt::from(i32::MAX))
    }

    pub fn min(&self) -> &BigInt {
        &self.min
    }

    pub fn max(&self) -> &BigInt {
        &self.max
    }

    pub fn window_min(&self) -> &BigInt {
        &self.window_min
    }

    pub fn window_max(&self) -> &BigInt {
        &self.window_max
    }

    pub fn contains(&self, value: &BigInt) -> bool {
        *value >= self.min && *value <= self.max
    }
}

/// A concrete witness drawn from a value set, or an indication that every
/// remaining value lies outside the samplable window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SampleValue {
    Exact(ConstValue),
    AboveWindow,
    BelowWindow,
}

/// A set of integers represented as sorted, disjoint, inclusive ranges
/// within a [`NumericDomain`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IntervalSet {
    domain: NumericDomain,
    ranges: Vec<(BigInt, BigInt)>,
}

impl IntervalSet {
    pub fn full(domain: NumericDomain) -> Self {
        let ranges = vec![(domain.min.clone(), domain.max.clone())];
        Self { domain, ranges }
    }

    pub fn empty(domain: NumericDomain) -> Self {
        Self {
            domain,
            ranges: Vec::new(),
        }
    }

    pub fn singleton(domain: NumericDomain, value: BigInt) -> Self {
        if domain.contains(&value) {
            Self {
                domain,
                ranges: vec![(value.clone(), value)],
            }
        } else {
            Self::empty(domain)
        }
    }

    /// The subset of the domain related to `value` by `rel`.
    pub fn from_relation(domain: NumericDomain, rel: Relation, value: &BigInt) -> Self {
        let one = BigInt::from(1);
        let (lo, hi) = match rel {
            Relation::Equal => (value.clone(), value.clone()),
            Relation::LessThan => (domain.min.clone(), value - &one),
            Relation::LessThanOrEqual => (domain.min.clone(), value.clone()),
            Relation::GreaterThan => (value + &one, domain.max.clone()),
            Relation::GreaterThanOrEqual => (value.clone(), domain.max.clone()),
        };
        let lo = lo.max(domain.min.clone());
        let hi = hi.min(domain.max.clone());
        if lo > hi {
            Self::empty(domain)
        } else {
            Self {
                domain,
                ranges: vec![(lo, hi)],
            }
        }
    }

    pub fn domain(&self) -> &NumericDomain {
        &self.domain
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ranges.len() == 1
            && self.ranges[0].0 == self.domain.min
            && self.ranges[0].1 == self.domain.max
    }

    pub fn contains(&self, value: &BigInt) -> bool {
        self.ranges
            .iter()
            .any(|(lo, hi)| value >= lo && value <= hi)
    }

    pub fn intersect(&self, other: &Self) -> Self {
        debug_assert_eq!(self.domain, other.domain);
        let mut ranges = Vec::new();
        for (a_lo, a_hi) in &self.ranges {
            for (b_lo, b_hi) in &other.ranges {
                let lo = a_lo.max(b_lo).clone();
                let hi = a_hi.min(b_hi).clone();
                if lo <= hi {
                    ranges.push((lo, hi));
                }
            }
        }
        Self {
            domain: self.domain.clone(),
            ranges: normalize_ranges(ranges),
        }
    }

    pub fn union(&self, other: &Self) -> Self {
        debug_assert_eq!(self.domain, other.domain);
        let mut ranges = self.ranges.clone();
        ranges.extend(other.ranges.iter().cloned());
        Self {
            domain: self.domain.clone(),
            ranges: normalize_ranges(ranges),
        }
    }

    pub fn complement(&self) -> Self {
        let one = BigInt::from(1);
        let mut ranges = Vec::new();
        let mut next = self.domain.min.clone();
        for (lo, hi) in &self.ranges {
            if &next < lo {
                ranges.push((next, lo - &one));
            }
            next = hi + &one;
        }
        if next <= self.domain.max {
            ranges.push((next, self.domain.max.clone()));
        }
        Self {
            domain: self.domain.clone(),
            ranges,
        }
    }

    /// Is any value of the set related to `value` by `rel`?
    pub fn any(&self, rel: Relation, value: &BigInt) -> bool {
        let related = Self::from_relation(self.domain.clone(), rel, value);
        !self.intersect(&related).is_empty()
    }

    /// Pick a witness, preferring small magnitudes inside the samplable
    /// window. Returns `None` only for the empty set.
    pub fn sample(&self) -> Option<SampleValue> {
        if self.ranges.is_empty() {
            return None;
        }
        let window_lo = &self.domain.window_min;
        let window_hi = &self.domain.window_max;
        let zero = BigInt::from(0);

        let mut best: Option<BigInt> = None;
        for (lo, hi) in &self.ranges {
            let lo = lo.max(window_lo);
            let hi = hi.min(window_hi);
            if lo > hi {
                continue;
            }
            // Closest-to-zero value of the clipped range.
            let candidate = if *lo <= zero && zero <= *hi {
                zero.clone()
            } else if *lo > zero {
                lo.clone()
            } else {
                hi.clone()
            };
            let replace = match &best {
                None => true,
                Some(b) => magnitude(&candidate) < magnitude(b),
            };
            if replace {
                best = Some(candidate);
            }
        }

        match best {
            Some(value) => Some(SampleValue::Exact(ConstValue::Int(value))),
            None => {
                // Everything left lies outside the window.
                if self.ranges.iter().any(|(lo, _)| lo > window_hi) {
                    Some(SampleValue::AboveWindow)
                } else {
                    Some(SampleValue::BelowWindow)
                }
            }
        }
    }
}

fn magnitude(value: &BigInt) -> BigInt {
    if *value < BigInt::from(0) {
        -value.clone()
    } else {
        value.clone()
    }
}

/// Merge overlapping or adjacent ranges into sorted disjoint form.
fn normalize_ranges(mut ranges: Vec<(BigInt, BigInt)>) -> Vec<(BigInt, BigInt)> {
    ranges.sort();
    let one = BigInt::from(1);
    let mut result: Vec<(BigInt, BigInt)> = Vec::with_capacity(ranges.len());
    for (lo, hi) in ranges {
        match result.last_mut() {
            Some((_, prev_hi)) if lo <= &*prev_hi + &one => {
                if hi > *prev_hi {
                    *prev_hi = hi;
                }
            }
            _ => result.push((lo, hi)),
        }
    }
    result
}

/// An equality-only value set: an explicit finite set, or the complement of
/// one. Used for strings, booleans, and closed enums.
///
/// When the universe is known and finite the set is kept in `Include` form
/// so emptiness and fullness are trivially decidable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DiscreteSet {
    universe: Option<Vec<ConstValue>>,
    kind: DiscreteKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum DiscreteKind {
    Include(BTreeSet<ConstValue>),
    Exclude(BTreeSet<ConstValue>),
}

impl DiscreteSet {
    /// The full set over a finite universe.
    pub fn finite_universe(values: impl IntoIterator<Item = ConstValue>) -> Self {
        let universe: Vec<_> = values.into_iter().collect();
        let all = universe.iter().cloned().collect();
        Self {
            universe: Some(universe),
            kind: DiscreteKind::Include(all),
        }
    }

    /// The full set over an unbounded universe (e.g. strings).
    pub fn infinite_universe() -> Self {
        Self {
            universe: None,
            kind: DiscreteKind::Exclude(BTreeSet::new()),
        }
    }

    pub fn booleans() -> Self {
        Self::finite_universe([ConstValue::Bool(false), ConstValue::Bool(true)])
    }

    fn with_kind(&self, kind: DiscreteKind) -> Self {
        let kind = match (kind, &self.universe) {
            // Keep finite universes in Include form.
            (DiscreteKind::Exclude(excluded), Some(universe)) => DiscreteKind::Include(
                universe
                    .iter()
                    .filter(|v| !excluded.contains(v))
                    .cloned()
                    .collect(),
            ),
            (kind, _) => kind,
        };
        Self {
            universe: self.universe.clone(),
            kind,
        }
    }

    pub fn singleton(&self, value: ConstValue) -> Self {
        self.with_kind(DiscreteKind::Include([value].into_iter().collect()))
    }

    pub fn is_empty(&self) -> bool {
        match &self.kind {
            DiscreteKind::Include(s) => s.is_empty(),
            DiscreteKind::Exclude(_) => false,
        }
    }

    pub fn is_full(&self) -> bool {
        match (&self.kind, &self.universe) {
            (DiscreteKind::Include(s), Some(universe)) => s.len() == universe.len(),
            (DiscreteKind::Include(_), None) => false,
            (DiscreteKind::Exclude(s), _) => s.is_empty(),
        }
    }

    pub fn contains(&self, value: &ConstValue) -> bool {
        match &self.kind {
            DiscreteKind::Include(s) => s.contains(value),
            DiscreteKind::Exclude(s) => !s.contains(value),
        }
    }

    pub fn intersect(&self, other: &Self) -> Self {
        use DiscreteKind::*;
        let kind = match (&self.kind, &other.kind) {
            (Include(a), Include(b)) => Include(a.intersection(b).cloned().collect()),
            (Include(a), Exclude(b)) | (Exclude(b), Include(a)) => {
                Include(a.iter().filter(|v| !b.contains(v)).cloned().collect())
            }
            (Exclude(a), Exclude(b)) => Exclude(a.union(b).cloned().collect()),
        };
        self.with_kind(kind)
    }

    pub fn union(&self, other: &Self) -> Self {
        use DiscreteKind::*;
        let kind = match (&self.kind, &other.kind) {
            (Include(a), Include(b)) => Include(a.union(b).cloned().collect()),
            (Include(a), Exclude(b)) | (Exclude(b), Include(a)) => {
                Exclude(b.iter().filter(|v| !a.contains(v)).cloned().collect())
            }
            (Exclude(a), Exclude(b)) => Exclude(a.intersection(b).cloned().collect()),
        };
        self.with_kind(kind)
    }

    pub fn complement(&self) -> Self {
        let kind = match &self.kind {
            DiscreteKind::Include(s) => DiscreteKind::Exclude(s.clone()),
            DiscreteKind::Exclude(s) => DiscreteKind::Include(s.clone()),
        };
        self.with_kind(kind)
    }

    pub fn sample(&self) -> Option<SampleValue> {
        match &self.kind {
            DiscreteKind::Include(s) => s
                .first()
                .cloned()
                .map(|v| SampleValue::Exact(v)),
            DiscreteKind::Exclude(excluded) => {
                // Unbounded universe: synthesize string witnesses until one
                // is outside the excluded set.
                let mut i = 0usize;
                loop {
                    let candidate = if i == 0 {
                        ConstValue::Str(String::new())
                    } else {
                        ConstValue::Str(format!("s{}", i - 1))
                    };
                    if !excluded.contains(&candidate) {
                        return Some(SampleValue::Exact(candidate));
                    }
                    i += 1;
                }
            }
        }
    }
}

/// A value set over some primitive type's domain.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueSet {
    Numeric(IntervalSet),
    Discrete(DiscreteSet),
}

impl ValueSet {
    pub fn full_numeric(domain: NumericDomain) -> Self {
        ValueSet::Numeric(IntervalSet::full(domain))
    }

    pub fn booleans() -> Self {
        ValueSet::Discrete(DiscreteSet::booleans())
    }

    pub fn strings() -> Self {
        ValueSet::Discrete(DiscreteSet::infinite_universe())
    }

    pub fn closed_enum(constants: impl IntoIterator<Item = ConstValue>) -> Self {
        ValueSet::Discrete(DiscreteSet::finite_universe(constants))
    }

    /// The subset of this set related to `value` by `rel`.
    ///
    /// Relational filtering on an equality-only domain with a non-equality
    /// relation answers permissively (the set itself); the binder rejects
    /// such patterns before they reach this crate.
    pub fn restrict(&self, rel: Relation, value: &ConstValue) -> Self {
        match (self, rel, value) {
            (ValueSet::Numeric(set), _, ConstValue::Int(v)) => ValueSet::Numeric(
                set.intersect(&IntervalSet::from_relation(set.domain().clone(), rel, v)),
            ),
            (ValueSet::Discrete(set), Relation::Equal, v) => {
                ValueSet::Discrete(set.intersect(&set.singleton(v.clone())))
            }
            (set, _, _) => set.clone(),
        }
    }

    /// The subset of the same domain *not* related to `value` by `rel`.
    pub fn restrict_complement(&self, rel: Relation, value: &ConstValue) -> Self {
        match (self, rel, value) {
            (ValueSet::Numeric(set), _, ConstValue::Int(v)) => {
                let related = IntervalSet::from_relation(set.domain().clone(), rel, v);
                ValueSet::Numeric(set.intersect(&related.complement()))
            }
            (ValueSet::Discrete(set), Relation::Equal, v) => {
                ValueSet::Discrete(set.intersect(&set.singleton(v.clone()).complement()))
            }
            (set, _, _) => set.clone(),
        }
    }

    pub fn intersect(&self, other: &Self) -> Self {
        match (self, other) {
            (ValueSet::Numeric(a), ValueSet::Numeric(b)) => ValueSet::Numeric(a.intersect(b)),
            (ValueSet::Discrete(a), ValueSet::Discrete(b)) => ValueSet::Discrete(a.intersect(b)),
            _ => panic!("value-set domain mismatch"),
        }
    }

    pub fn union(&self, other: &Self) -> Self {
        match (self, other) {
            (ValueSet::Numeric(a), ValueSet::Numeric(b)) => ValueSet::Numeric(a.union(b)),
            (ValueSet::Discrete(a), ValueSet::Discrete(b)) => ValueSet::Discrete(a.union(b)),
            _ => panic!("value-set domain mismatch"),
        }
    }

    pub fn complement(&self) -> Self {
        match self {
            ValueSet::Numeric(set) => ValueSet::Numeric(set.complement()),
            ValueSet::Discrete(set) => ValueSet::Discrete(set.complement()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ValueSet::Numeric(set) => set.is_empty(),
            ValueSet::Discrete(set) => set.is_empty(),
        }
    }

    pub fn is_full(&self) -> bool {
        match self {
            ValueSet::Numeric(set) => set.is_full(),
            ValueSet::Discrete(set) => set.is_full(),
        }
    }

    pub fn contains(&self, value: &ConstValue) -> bool {
        match (self, value) {
            (ValueSet::Numeric(set), ConstValue::Int(v)) => set.contains(v),
            (ValueSet::Numeric(_), _) => false,
            (ValueSet::Discrete(set), v) => set.contains(v),
        }
    }

    /// Does `self` cover every value of `other`?
    pub fn covers(&self, other: &Self) -> bool {
        other.intersect(&self.complement()).is_empty()
    }

    pub fn sample(&self) -> Option<SampleValue> {
        match self {
            ValueSet::Numeric(set) => set.sample(),
            ValueSet::Discrete(set) => set.sample(),
        }
    }
}
