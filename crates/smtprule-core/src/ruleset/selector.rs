//! Ordered rule iteration
//!
//! Records are tried in configuration order and the first one whose every
//! predicate passes is selected. A predicate that cannot be decided stops
//! the search outright: falling through to a later, possibly more
//! permissive, record would bypass the one that could not be evaluated.

use super::outcome::{MatchOutcome, Selection};
use super::polarity::Verdict;
use super::predicate::Condition;
use smtprule_common::Envelope;
use std::fmt;
use tracing::{debug, trace};

/// A rule or match entry as seen by the selector
pub trait Record: fmt::Display {
    /// Action the caller applies when this record is selected
    fn action(&self) -> &str;

    /// Predicates in evaluation order
    fn conditions(&self) -> &[Condition];

    /// Evaluate the predicate chain, stopping at the first non-passing predicate
    fn evaluate(&self, envelope: &Envelope) -> Verdict {
        for condition in self.conditions() {
            match condition.evaluate(envelope) {
                Verdict::Pass => continue,
                other => return other,
            }
        }
        Verdict::Pass
    }
}

/// Select the first record whose predicates all pass
pub fn select<'a, R: Record>(records: &'a [R], envelope: &Envelope) -> MatchOutcome<'a, R> {
    for (index, record) in records.iter().enumerate() {
        match record.evaluate(envelope) {
            Verdict::Pass => {
                trace!(rule = index + 1, "rule #{} matched: {}", index + 1, record);
                return MatchOutcome::Selected(Selection { index, record });
            }
            Verdict::Fail => continue,
            Verdict::Indeterminate(cause) => {
                debug!(
                    rule = index + 1,
                    %cause,
                    "temporary failure in processing of a rule"
                );
                return MatchOutcome::Indeterminate(cause);
            }
        }
    }

    trace!("no rule matched");
    MatchOutcome::NoMatch
}
