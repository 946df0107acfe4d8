//! Rule sets and their reloadable handle

use super::entry::{FromFilter, Match, MatchBuilder};
use super::outcome::MatchOutcome;
use super::polarity::{Polarity, Slot};
use super::rule::{Rule, RuleBuilder};
use super::selector::select;
use crate::table::{KeyKind, TableRef, TableRegistry};
use smtprule_common::config::{AuthFilter, MatchConfig, RuleConfig};
use smtprule_common::{Config, Envelope, Error, Result};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

/// Ordered fixed-predicate rules and predicate-chain match entries
///
/// Immutable once built; hosts that reload configuration build a new one
/// and swap it in through a [`RulesetHandle`].
#[derive(Debug, Clone, Default)]
pub struct Ruleset {
    rules: Vec<Rule>,
    matches: Vec<Match>,
}

impl Ruleset {
    pub fn new(rules: Vec<Rule>, matches: Vec<Match>) -> Self {
        Self { rules, matches }
    }

    /// Build from configuration, resolving table names through `tables`
    pub fn from_config(config: &Config, tables: &TableRegistry) -> Result<Self> {
        let rules = config
            .rules
            .iter()
            .enumerate()
            .map(|(i, rule)| build_rule(rule, tables).map_err(|e| at_position("rule", i, e)))
            .collect::<Result<Vec<_>>>()?;

        let matches = config
            .matches
            .iter()
            .enumerate()
            .map(|(i, entry)| build_match(entry, tables).map_err(|e| at_position("match", i, e)))
            .collect::<Result<Vec<_>>>()?;

        info!(
            rules = rules.len(),
            matches = matches.len(),
            tables = tables.len(),
            "ruleset loaded"
        );
        Ok(Self::new(rules, matches))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    /// Match an envelope against the fixed-predicate rules
    pub fn match_rule(&self, envelope: &Envelope) -> MatchOutcome<'_, Rule> {
        select(&self.rules, envelope)
    }

    /// Match an envelope against the predicate-chain entries
    pub fn match_entry(&self, envelope: &Envelope) -> MatchOutcome<'_, Match> {
        select(&self.matches, envelope)
    }
}

/// Holder of the active ruleset generation
///
/// Matching calls take a [`snapshot`](Self::snapshot) and keep using it even
/// if a reload replaces the active generation meanwhile.
#[derive(Debug, Default)]
pub struct RulesetHandle {
    current: RwLock<Arc<Ruleset>>,
}

impl RulesetHandle {
    pub fn new(ruleset: Ruleset) -> Self {
        Self {
            current: RwLock::new(Arc::new(ruleset)),
        }
    }

    /// The active generation
    pub fn snapshot(&self) -> Arc<Ruleset> {
        // The lock only guards a pointer swap, so a poisoned lock still holds
        // a complete generation.
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Install a new generation, returning the one it replaces
    pub fn replace(&self, ruleset: Ruleset) -> Arc<Ruleset> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::replace(&mut *current, Arc::new(ruleset));
        info!(
            rules = current.rules().len(),
            matches = current.matches().len(),
            "ruleset replaced"
        );
        previous
    }
}

fn at_position(what: &str, index: usize, err: Error) -> Error {
    let at = |msg: String| format!("{} #{}: {}", what, index + 1, msg);
    match err {
        Error::Config(msg) => Error::Config(at(msg)),
        Error::Validation(msg) => Error::Validation(at(msg)),
        Error::Table(msg) => Error::Table(at(msg)),
    }
}

/// Parse a `[!]name` filter into its polarity and name
fn parse_filter(value: &str) -> Result<(Polarity, &str)> {
    let (polarity, name) = match value.strip_prefix('!') {
        Some(rest) => (Polarity::Negated, rest.trim_start()),
        None => (Polarity::Normal, value),
    };
    if name.is_empty() {
        return Err(Error::Validation(format!("empty filter {:?}", value)));
    }
    Ok((polarity, name))
}

fn table_slot(
    value: Option<&str>,
    kind: KeyKind,
    tables: &TableRegistry,
) -> Result<Slot<TableRef>> {
    let Some(value) = value else {
        return Ok(Slot::Absent);
    };
    let (polarity, name) = parse_filter(value)?;
    Ok(Slot::Present(polarity, tables.resolve(name, kind)?))
}

fn flag_slot(value: Option<bool>) -> Slot<()> {
    match value {
        None => Slot::Absent,
        Some(true) => Slot::normal(()),
        Some(false) => Slot::negated(()),
    }
}

fn build_rule(config: &RuleConfig, tables: &TableRegistry) -> Result<Rule> {
    let tag = match config.tag.as_deref() {
        None => Slot::Absent,
        Some(value) => {
            let (polarity, tag) = parse_filter(value)?;
            Slot::Present(polarity, tag.to_string())
        }
    };

    RuleBuilder::new(&config.action)
        .tag(tag)
        .authenticated(flag_slot(config.authenticated))
        .sources(table_slot(config.sources.as_deref(), KeyKind::Netaddr, tables)?)
        .senders(table_slot(config.senders.as_deref(), KeyKind::Mailaddr, tables)?)
        .recipients(table_slot(config.recipients.as_deref(), KeyKind::Mailaddr, tables)?)
        .destination(table_slot(config.destination.as_deref(), KeyKind::Domain, tables)?)
        .build()
}

fn build_match(config: &MatchConfig, tables: &TableRegistry) -> Result<Match> {
    // `socket` is a keyword here and shadows any table of that name.
    let from = match config.from.as_deref() {
        None => Slot::Absent,
        Some(value) => match parse_filter(value)? {
            (polarity, "socket") => Slot::Present(polarity, FromFilter::Socket),
            (polarity, name) => Slot::Present(
                polarity,
                FromFilter::Table(tables.resolve(name, KeyKind::Netaddr)?),
            ),
        },
    };

    let auth = match &config.auth {
        None => Slot::Absent,
        Some(AuthFilter::Flag(required)) => flag_slot(Some(*required)).map(|()| None),
        Some(AuthFilter::Table(value)) => {
            let (polarity, name) = parse_filter(value)?;
            Slot::Present(polarity, Some(tables.resolve(name, KeyKind::Credentials)?))
        }
    };

    MatchBuilder::new(&config.action)
        .tag(table_slot(config.tag.as_deref(), KeyKind::String, tables)?)
        .from(from)
        .to(table_slot(config.to.as_deref(), KeyKind::Domain, tables)?)
        .helo(table_slot(config.helo.as_deref(), KeyKind::Domain, tables)?)
        .auth(auth)
        .starttls(flag_slot(config.starttls))
        .mail_from(table_slot(config.mail_from.as_deref(), KeyKind::Mailaddr, tables)?)
        .rcpt_to(table_slot(config.rcpt_to.as_deref(), KeyKind::Mailaddr, tables)?)
        .build()
}
