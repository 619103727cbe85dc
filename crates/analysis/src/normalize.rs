//! Pattern rewriting in support of redundancy analysis.
//!
//! Two rewriters live here. [`normalize`] pushes `not` down to primitive
//! tests: combinators dualize, and a negated composite expands into a
//! disjunction over the ways it can fail, one structural slot at a time.
//! [`lift_disjunctions`] extracts every `or` found anywhere in a pattern
//! into its own expansion set of top-level cases, so each disjunct can be
//! checked for reachability on its own. Disjuncts compiled into a single
//! DAG path are indistinguishable there; only as separate cases does a
//! subsumed disjunct lose its label.

use crate::guard::{StackGuard, TooComplex};
use crate::oracle::{SyntaxId, TypeOracle};
use crate::pattern::{Deconstruction, ListElement, Pattern, PatternKind, PropertyPattern};

/// One isolated disjunct: the rebuilt top-level pattern standing in for
/// it, and the syntax to blame if it turns out redundant. `None` marks a
/// synthesized disjunct, which never gets a diagnostic.
pub(crate) struct OrCase {
    pub pattern: Pattern,
    pub syntax: Option<SyntaxId>,
}

/// Rewrite `pattern` (negating it when `negated`) so that `not` applies
/// only to primitive tests.
pub(crate) fn normalize(
    oracle: &dyn TypeOracle,
    pattern: &Pattern,
    negated: bool,
) -> Result<Pattern, TooComplex> {
    let mut guard = StackGuard::new();
    normalize_inner(oracle, pattern, negated, &mut guard)
}

fn normalize_inner(
    oracle: &dyn TypeOracle,
    pattern: &Pattern,
    negated: bool,
    guard: &mut StackGuard,
) -> Result<Pattern, TooComplex> {
    guard.enter()?;
    let result = normalize_kind(oracle, pattern, negated, guard);
    guard.exit();
    result
}

fn normalize_kind(
    oracle: &dyn TypeOracle,
    pattern: &Pattern,
    negated: bool,
    guard: &mut StackGuard,
) -> Result<Pattern, TooComplex> {
    let ty = pattern.ty;
    let syntax = pattern.syntax;

    if !negated {
        let rewritten = match &pattern.kind {
            PatternKind::And(lhs, rhs) => Pattern {
                kind: PatternKind::And(
                    Box::new(normalize_inner(oracle, lhs, false, guard)?),
                    Box::new(normalize_inner(oracle, rhs, false, guard)?),
                ),
                ..pattern.clone()
            },
            PatternKind::Or(lhs, rhs) => Pattern {
                kind: PatternKind::Or(
                    Box::new(normalize_inner(oracle, lhs, false, guard)?),
                    Box::new(normalize_inner(oracle, rhs, false, guard)?),
                ),
                ..pattern.clone()
            },
            PatternKind::Not(inner) => normalize_inner(oracle, inner, true, guard)?,
            PatternKind::Recursive {
                target,
                deconstruction,
                properties,
                binding,
            } => Pattern {
                kind: PatternKind::Recursive {
                    target: *target,
                    deconstruction: match deconstruction {
                        Some(d) => Some(Deconstruction {
                            method: d.method,
                            subpatterns: d
                                .subpatterns
                                .iter()
                                .map(|s| normalize_inner(oracle, s, false, guard))
                                .collect::<Result<_, _>>()?,
                        }),
                        None => None,
                    },
                    properties: properties
                        .iter()
                        .map(|p| {
                            Ok(PropertyPattern {
                                member: p.member,
                                is_field: p.is_field,
                                pattern: normalize_inner(oracle, &p.pattern, false, guard)?,
                            })
                        })
                        .collect::<Result<_, TooComplex>>()?,
                    binding: *binding,
                },
                ..pattern.clone()
            },
            PatternKind::List { elements, binding } => Pattern {
                kind: PatternKind::List {
                    elements: elements
                        .iter()
                        .map(|e| {
                            Ok(match e {
                                ListElement::Pattern(p) => ListElement::Pattern(
                                    normalize_inner(oracle, p, false, guard)?,
                                ),
                                ListElement::Slice(Some(p)) => ListElement::Slice(Some(
                                    Box::new(normalize_inner(oracle, p, false, guard)?),
                                )),
                                ListElement::Slice(None) => ListElement::Slice(None),
                            })
                        })
                        .collect::<Result<_, TooComplex>>()?,
                    binding: *binding,
                },
                ..pattern.clone()
            },
            _ => pattern.clone(),
        };
        return Ok(rewritten);
    }

    let rewritten = match &pattern.kind {
        // Irrefutable patterns negate to nothing.
        PatternKind::Discard | PatternKind::Binding(_) => never_matches(ty, syntax),

        PatternKind::Null
        | PatternKind::Constant(_)
        | PatternKind::Relational { .. } => negate_primitive(pattern.clone()),

        // Bindings don't survive negation.
        PatternKind::Type { target, .. } => negate_primitive(Pattern::synthesized(
            PatternKind::Type {
                target: *target,
                binding: None,
            },
            ty,
            syntax,
        )),

        PatternKind::And(lhs, rhs) => or_all(
            vec![
                normalize_inner(oracle, lhs, true, guard)?,
                normalize_inner(oracle, rhs, true, guard)?,
            ],
            ty,
            syntax,
        ),
        PatternKind::Or(lhs, rhs) => Pattern::synthesized(
            PatternKind::And(
                Box::new(normalize_inner(oracle, lhs, true, guard)?),
                Box::new(normalize_inner(oracle, rhs, true, guard)?),
            ),
            ty,
            syntax,
        ),
        PatternKind::Not(inner) => normalize_inner(oracle, inner, false, guard)?,

        PatternKind::Recursive {
            target,
            deconstruction,
            properties,
            ..
        } => {
            let mut disjuncts = Vec::new();

            // "Wrong shape": fails the type test or is null. For
            // composites that match any value this disjunct is vacuous.
            let shell = Pattern::synthesized(
                PatternKind::Recursive {
                    target: *target,
                    deconstruction: deconstruction.as_ref().map(|d| Deconstruction {
                        method: d.method,
                        subpatterns: d
                            .subpatterns
                            .iter()
                            .map(|s| Pattern::discard(s.ty, s.syntax))
                            .collect(),
                    }),
                    properties: properties
                        .iter()
                        .map(|p| PropertyPattern {
                            member: p.member,
                            is_field: p.is_field,
                            pattern: Pattern::discard(p.pattern.ty, p.pattern.syntax),
                        })
                        .collect(),
                    binding: None,
                },
                ty,
                syntax,
            );
            if !recursive_shell_always_matches(oracle, &shell) {
                disjuncts.push(negate_primitive(shell));
            }

            // "Right shape, slot N fails", one disjunct per refutable
            // slot, siblings discarded.
            if let Some(d) = deconstruction {
                for (i, sub) in d.subpatterns.iter().enumerate() {
                    if sub.is_irrefutable() {
                        continue;
                    }
                    let neg = normalize_inner(oracle, sub, true, guard)?;
                    let subpatterns = d
                        .subpatterns
                        .iter()
                        .enumerate()
                        .map(|(j, s)| {
                            if j == i {
                                neg.clone()
                            } else {
                                Pattern::discard(s.ty, s.syntax)
                            }
                        })
                        .collect();
                    disjuncts.push(Pattern::synthesized(
                        PatternKind::Recursive {
                            target: *target,
                            deconstruction: Some(Deconstruction {
                                method: d.method,
                                subpatterns,
                            }),
                            properties: Vec::new(),
                            binding: None,
                        },
                        ty,
                        syntax,
                    ));
                }
            }
            for prop in properties {
                if prop.pattern.is_irrefutable() {
                    continue;
                }
                let neg = normalize_inner(oracle, &prop.pattern, true, guard)?;
                disjuncts.push(Pattern::synthesized(
                    PatternKind::Recursive {
                        target: *target,
                        deconstruction: None,
                        properties: vec![PropertyPattern {
                            member: prop.member,
                            is_field: prop.is_field,
                            pattern: neg,
                        }],
                        binding: None,
                    },
                    ty,
                    syntax,
                ));
            }
            or_all(disjuncts, ty, syntax)
        }

        PatternKind::List { elements, .. } => {
            let mut disjuncts = Vec::new();

            // "Wrong length or null".
            let shell = Pattern::synthesized(
                PatternKind::List {
                    elements: elements.iter().map(discard_element).collect(),
                    binding: None,
                },
                ty,
                syntax,
            );
            if !list_shell_always_matches(oracle, &shell) {
                disjuncts.push(negate_primitive(shell));
            }

            // "Right length, element N fails".
            for (i, element) in elements.iter().enumerate() {
                let sub = match element {
                    ListElement::Pattern(p) => p,
                    ListElement::Slice(Some(p)) => p,
                    ListElement::Slice(None) => continue,
                };
                if sub.is_irrefutable() {
                    continue;
                }
                let neg = normalize_inner(oracle, sub, true, guard)?;
                let rebuilt = elements
                    .iter()
                    .enumerate()
                    .map(|(j, e)| {
                        if j != i {
                            return discard_element(e);
                        }
                        match e {
                            ListElement::Pattern(_) => ListElement::Pattern(neg.clone()),
                            ListElement::Slice(_) => {
                                ListElement::Slice(Some(Box::new(neg.clone())))
                            }
                        }
                    })
                    .collect();
                disjuncts.push(Pattern::synthesized(
                    PatternKind::List {
                        elements: rebuilt,
                        binding: None,
                    },
                    ty,
                    syntax,
                ));
            }
            or_all(disjuncts, ty, syntax)
        }
    };
    Ok(rewritten)
}

fn negate_primitive(inner: Pattern) -> Pattern {
    let ty = inner.ty;
    let syntax = inner.syntax;
    Pattern::synthesized(PatternKind::Not(Box::new(inner)), ty, syntax)
}

fn never_matches(ty: crate::oracle::TyId, syntax: SyntaxId) -> Pattern {
    negate_primitive(Pattern::discard(ty, syntax))
}

fn or_all(disjuncts: Vec<Pattern>, ty: crate::oracle::TyId, syntax: SyntaxId) -> Pattern {
    let mut iter = disjuncts.into_iter();
    let Some(first) = iter.next() else {
        return never_matches(ty, syntax);
    };
    iter.fold(first, |acc, next| {
        Pattern::synthesized(PatternKind::Or(Box::new(acc), Box::new(next)), ty, syntax)
    })
}

fn discard_element(element: &ListElement) -> ListElement {
    match element {
        ListElement::Pattern(p) => ListElement::Pattern(Pattern::discard(p.ty, p.syntax)),
        ListElement::Slice(_) => ListElement::Slice(None),
    }
}

/// Does the all-discards rendition of a recursive pattern match every
/// value of its input type?
fn recursive_shell_always_matches(oracle: &dyn TypeOracle, shell: &Pattern) -> bool {
    let PatternKind::Recursive { target, .. } = &shell.kind else {
        unreachable!()
    };
    let type_ok = match target {
        None => true,
        Some(t) => *t == shell.ty || oracle.is_subtype_of(shell.ty, *t),
    };
    // A recursive pattern never matches null, so a nullable input always
    // leaves the shell refutable.
    type_ok && !oracle.is_nullable(shell.ty)
}

/// `[..]` against a non-nullable sequence matches everything.
fn list_shell_always_matches(oracle: &dyn TypeOracle, shell: &Pattern) -> bool {
    let PatternKind::List { elements, .. } = &shell.kind else {
        unreachable!()
    };
    elements.len() == 1
        && matches!(elements[0], ListElement::Slice(None))
        && !oracle.is_nullable(shell.ty)
}

// ---------------------------------------------------------------------------
// Disjunction lifting
// ---------------------------------------------------------------------------

/// Every `or` in `pattern`, wherever it nests, lifted into one expansion
/// set of stand-in top-level cases. Context following the disjunction
/// (later conjuncts, later slots) is truncated from the stand-ins;
/// reachability of the widened stand-in is a valid proxy for the
/// disjunct's own reachability.
pub(crate) fn lift_disjunctions(pattern: &Pattern) -> Vec<Vec<OrCase>> {
    let mut sets = Vec::new();
    collect(pattern, &|p| p, &mut sets);
    sets
}

fn collect(pattern: &Pattern, wrap: &dyn Fn(Pattern) -> Pattern, sets: &mut Vec<Vec<OrCase>>) {
    match &pattern.kind {
        PatternKind::Or(..) => {
            let mut leaves = Vec::new();
            flatten_or(pattern, &mut leaves);
            sets.push(
                leaves
                    .iter()
                    .map(|leaf| OrCase {
                        pattern: wrap((*leaf).clone()),
                        syntax: (!leaf.synthesized).then_some(leaf.syntax),
                    })
                    .collect(),
            );
            for leaf in leaves {
                collect(leaf, wrap, sets);
            }
        }

        PatternKind::And(lhs, rhs) => {
            collect(lhs, wrap, sets);
            let lhs = (**lhs).clone();
            let ty = pattern.ty;
            let syntax = pattern.syntax;
            let rewrap = |p: Pattern| {
                wrap(Pattern::synthesized(
                    PatternKind::And(Box::new(lhs.clone()), Box::new(p)),
                    ty,
                    syntax,
                ))
            };
            collect(rhs, &rewrap, sets);
        }

        PatternKind::Recursive {
            target,
            deconstruction,
            properties,
            ..
        } => {
            let ty = pattern.ty;
            let syntax = pattern.syntax;
            if let Some(d) = deconstruction {
                for (i, sub) in d.subpatterns.iter().enumerate() {
                    let rewrap = |p: Pattern| {
                        let subpatterns = d
                            .subpatterns
                            .iter()
                            .enumerate()
                            .map(|(j, s)| match j.cmp(&i) {
                                std::cmp::Ordering::Less => s.clone(),
                                std::cmp::Ordering::Equal => p.clone(),
                                std::cmp::Ordering::Greater => Pattern::discard(s.ty, s.syntax),
                            })
                            .collect();
                        wrap(Pattern::synthesized(
                            PatternKind::Recursive {
                                target: *target,
                                deconstruction: Some(Deconstruction {
                                    method: d.method,
                                    subpatterns,
                                }),
                                properties: Vec::new(),
                                binding: None,
                            },
                            ty,
                            syntax,
                        ))
                    };
                    collect(sub, &rewrap, sets);
                }
            }
            for (i, prop) in properties.iter().enumerate() {
                let rewrap = |p: Pattern| {
                    let mut rebuilt: Vec<PropertyPattern> = properties[..i].to_vec();
                    rebuilt.push(PropertyPattern {
                        member: prop.member,
                        is_field: prop.is_field,
                        pattern: p,
                    });
                    wrap(Pattern::synthesized(
                        PatternKind::Recursive {
                            target: *target,
                            deconstruction: deconstruction.clone(),
                            properties: rebuilt,
                            binding: None,
                        },
                        ty,
                        syntax,
                    ))
                };
                collect(&prop.pattern, &rewrap, sets);
            }
        }

        PatternKind::List { elements, .. } => {
            let ty = pattern.ty;
            let syntax = pattern.syntax;
            for (i, element) in elements.iter().enumerate() {
                let sub = match element {
                    ListElement::Pattern(p) => p,
                    ListElement::Slice(Some(p)) => p,
                    ListElement::Slice(None) => continue,
                };
                let rewrap = |p: Pattern| {
                    let rebuilt = elements
                        .iter()
                        .enumerate()
                        .map(|(j, e)| match j.cmp(&i) {
                            std::cmp::Ordering::Less => e.clone(),
                            std::cmp::Ordering::Equal => match e {
                                ListElement::Pattern(_) => ListElement::Pattern(p.clone()),
                                ListElement::Slice(_) => {
                                    ListElement::Slice(Some(Box::new(p.clone())))
                                }
                            },
                            std::cmp::Ordering::Greater => discard_element(e),
                        })
                        .collect();
                    wrap(Pattern::synthesized(
                        PatternKind::List {
                            elements: rebuilt,
                            binding: None,
                        },
                        ty,
                        syntax,
                    ))
                };
                collect(sub, &rewrap, sets);
            }
        }

        // Negation has been pushed to primitives before lifting runs;
        // nothing below a `not` can hold an `or`.
        PatternKind::Not(_) => {}

        PatternKind::Discard
        | PatternKind::Binding(_)
        | PatternKind::Type { .. }
        | PatternKind::Null
        | PatternKind::Constant(_)
        | PatternKind::Relational { .. } => {}
    }
}

fn flatten_or<'a>(pattern: &'a Pattern, leaves: &mut Vec<&'a Pattern>) {
    match &pattern.kind {
        PatternKind::Or(lhs, rhs) => {
            flatten_or(lhs, leaves);
            flatten_or(rhs, leaves);
        }
        _ => leaves.push(pattern),
    }
}
