//! Diagnostics raised by pattern analysis.
//!
//! These are abstract events; rendering them into user-visible text with
//! source excerpts is the host compiler's job.

use crate::oracle::SyntaxId;
use crate::sampler::UnmatchedSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
}

/// A match expression does not handle every input value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchNotExhaustive {
    pub syntax: SyntaxId,
    /// A witness value no arm matches, when one could be synthesized.
    pub sample: Option<UnmatchedSample>,
}

/// A whole arm can never be reached given the arms before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSubsumed {
    pub syntax: SyntaxId,
}

/// One disjunct of an `or` pattern adds nothing: every value it matches is
/// already handled by a sibling disjunct or an earlier arm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedundantPattern {
    pub syntax: SyntaxId,
}

/// The length constraints of a list pattern admit no length at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidLengthPattern {
    pub syntax: SyntaxId,
}

/// The pattern is nested too deeply to analyze.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternTooComplex {
    pub syntax: SyntaxId,
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::From)]
pub enum PatternMatchDiag {
    NotExhaustive(SwitchNotExhaustive),
    Subsumed(PatternSubsumed),
    Redundant(RedundantPattern),
    InvalidLength(InvalidLengthPattern),
    TooComplex(PatternTooComplex),
}

impl PatternMatchDiag {
    pub fn severity(&self) -> Severity {
        match self {
            PatternMatchDiag::NotExhaustive(_)
            | PatternMatchDiag::InvalidLength(_)
            | PatternMatchDiag::TooComplex(_) => Severity::Error,
            PatternMatchDiag::Subsumed(_) | PatternMatchDiag::Redundant(_) => Severity::Warning,
        }
    }

    pub fn local_code(&self) -> u16 {
        match self {
            PatternMatchDiag::NotExhaustive(_) => 1,
            PatternMatchDiag::Subsumed(_) => 2,
            PatternMatchDiag::Redundant(_) => 3,
            PatternMatchDiag::InvalidLength(_) => 4,
            PatternMatchDiag::TooComplex(_) => 5,
        }
    }

    pub fn syntax(&self) -> SyntaxId {
        match self {
            PatternMatchDiag::NotExhaustive(d) => d.syntax,
            PatternMatchDiag::Subsumed(d) => d.syntax,
            PatternMatchDiag::Redundant(d) => d.syntax,
            PatternMatchDiag::InvalidLength(d) => d.syntax,
            PatternMatchDiag::TooComplex(d) => d.syntax,
        }
    }

    pub fn message(&self) -> String {
        match self {
            PatternMatchDiag::NotExhaustive(d) => match &d.sample {
                Some(sample) => format!(
                    "match is not exhaustive: `{}` is not handled",
                    sample.display
                ),
                None => "match is not exhaustive".to_string(),
            },
            PatternMatchDiag::Subsumed(_) => {
                "pattern is unreachable: already handled by earlier arms".to_string()
            }
            PatternMatchDiag::Redundant(_) => {
                "pattern is redundant: already handled by another alternative".to_string()
            }
            PatternMatchDiag::InvalidLength(_) => {
                "length constraints of this pattern cannot be satisfied".to_string()
            }
            PatternMatchDiag::TooComplex(_) => {
                "pattern is too deeply nested to analyze".to_string()
            }
        }
    }
}
