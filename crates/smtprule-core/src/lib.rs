//! smtprule Core - rule selection for a mail transfer agent
//!
//! Given an envelope and an ordered rule set, decides which rule applies,
//! that none does, or that the decision cannot be made right now because a
//! lookup table backend failed.
//!
//! - [`table`]: lookup oracle trait, table registry and the in-memory static backend.
//! - [`ruleset`]: predicates, polarity, the fixed-predicate rules and
//!   predicate-chain matches, and the selector that walks them.

pub mod ruleset;
pub mod table;

#[cfg(test)]
pub(crate) mod testing;

pub use ruleset::{
    select, Condition, FromFilter, Indeterminate, Match, MatchBuilder, MatchOutcome, Polarity,
    Predicate, Record, Rule, RuleBuilder, Ruleset, RulesetHandle, Selection, Slot, Verdict,
};
pub use table::{KeyKind, Lookup, LookupError, StaticTable, Table, TableRef, TableRegistry};
