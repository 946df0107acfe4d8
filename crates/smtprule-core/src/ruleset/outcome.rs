//! Outcome of a matching pass

use serde::Serialize;
use std::fmt;

/// Why a matching pass could not be decided
///
/// The caller should answer with a temporary failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum Indeterminate {
    /// A table backend could not answer
    LookupFailed { table: String },
    /// An envelope address could not be rendered as a table key
    UnrenderableAddress { predicate: &'static str },
    /// The envelope lacks the session state this predicate needs
    Unsupported { predicate: &'static str },
}

impl fmt::Display for Indeterminate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Indeterminate::LookupFailed { table } => {
                write!(f, "lookup failed on table <{}>", table)
            }
            Indeterminate::UnrenderableAddress { predicate } => {
                write!(f, "cannot render address for {}", predicate)
            }
            Indeterminate::Unsupported { predicate } => {
                write!(f, "{} cannot be evaluated for this envelope", predicate)
            }
        }
    }
}

/// Record chosen by a matching pass
#[derive(Debug, PartialEq)]
pub struct Selection<'a, R> {
    /// Position in configuration order, starting at 0
    pub index: usize,
    pub record: &'a R,
}

impl<R> Clone for Selection<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for Selection<'_, R> {}

/// Three-way result of matching an envelope against an ordered record set
#[derive(Debug, PartialEq)]
pub enum MatchOutcome<'a, R> {
    Selected(Selection<'a, R>),
    /// No record applies; the caller's default policy decides
    NoMatch,
    /// A predicate could not be decided; the search was abandoned
    Indeterminate(Indeterminate),
}

impl<'a, R> MatchOutcome<'a, R> {
    pub fn selected(&self) -> Option<&'a R> {
        match self {
            MatchOutcome::Selected(selection) => Some(selection.record),
            _ => None,
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            MatchOutcome::Selected(selection) => Some(selection.index),
            _ => None,
        }
    }

    pub fn is_no_match(&self) -> bool {
        matches!(self, MatchOutcome::NoMatch)
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, MatchOutcome::Indeterminate(_))
    }

    /// `Ok(None)` for no match, `Err` when the pass was indeterminate
    pub fn into_result(self) -> Result<Option<Selection<'a, R>>, Indeterminate> {
        match self {
            MatchOutcome::Selected(selection) => Ok(Some(selection)),
            MatchOutcome::NoMatch => Ok(None),
            MatchOutcome::Indeterminate(cause) => Err(cause),
        }
    }
}
