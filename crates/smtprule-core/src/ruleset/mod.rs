//! Rule Matching Module
//!
//! Selects which configured rule applies to an envelope. Two rule shapes
//! share one selector: fixed-predicate [`Rule`]s and predicate-chain
//! [`Match`] entries.

mod engine;
mod entry;
mod outcome;
mod polarity;
mod predicate;
mod rule;
mod selector;

pub use engine::{Ruleset, RulesetHandle};
pub use entry::{FromFilter, Match, MatchBuilder};
pub use outcome::{Indeterminate, MatchOutcome, Selection};
pub use polarity::{Polarity, Slot, Verdict};
pub use predicate::{Condition, Predicate};
pub use rule::{Rule, RuleBuilder};
pub use selector::{select, Record};
