//! Presence, polarity and the predicate verdict

use super::outcome::Indeterminate;
use crate::table::Lookup;
use serde::Serialize;

/// Configured sense of a predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Normal,
    Negated,
}

impl Polarity {
    pub fn is_negated(self) -> bool {
        matches!(self, Polarity::Negated)
    }
}

/// One filter dimension of a rule
///
/// `Absent` leaves the dimension unconstrained: it always passes and its
/// polarity is irrelevant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot<T> {
    Absent,
    Present(Polarity, T),
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot::Absent
    }
}

impl<T> Slot<T> {
    pub fn normal(value: T) -> Self {
        Slot::Present(Polarity::Normal, value)
    }

    pub fn negated(value: T) -> Self {
        Slot::Present(Polarity::Negated, value)
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Slot::Absent)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Slot<U> {
        match self {
            Slot::Absent => Slot::Absent,
            Slot::Present(polarity, value) => Slot::Present(polarity, f(value)),
        }
    }
}

/// Result of evaluating one predicate with its polarity applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The predicate holds; evaluation continues with the next one
    Pass,
    /// The predicate does not hold; the record is abandoned
    Fail,
    /// The predicate could not be decided; the whole search stops
    Indeterminate(Indeterminate),
}

impl Verdict {
    /// Apply polarity to a raw predicate result
    ///
    /// A failure is never inverted by negation.
    pub fn from_raw(raw: Result<bool, Indeterminate>, polarity: Polarity) -> Self {
        match raw {
            Ok(matched) if matched != polarity.is_negated() => Verdict::Pass,
            Ok(_) => Verdict::Fail,
            Err(cause) => Verdict::Indeterminate(cause),
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

impl Lookup {
    /// Collapse into a raw predicate result
    pub fn into_raw(self) -> Result<bool, Indeterminate> {
        match self {
            Lookup::Matched => Ok(true),
            Lookup::NotMatched => Ok(false),
            Lookup::Failed { table } => Err(Indeterminate::LookupFailed { table }),
        }
    }
}
