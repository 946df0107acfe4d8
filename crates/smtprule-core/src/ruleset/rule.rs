//! Fixed-predicate rules
//!
//! A rule filters on a fixed set of dimensions, each optional and each
//! negatable. Dimensions are evaluated in the order tag, authentication,
//! source, sender, recipient, destination, whatever order they were set in.

use super::polarity::Slot;
use super::predicate::{compile, fmt_chain, Condition, Predicate};
use super::selector::Record;
use crate::table::TableRef;
use smtprule_common::Result;
use std::fmt;

/// Fixed-predicate rule
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    action: String,
    conditions: Vec<Condition>,
}

impl Rule {
    pub fn builder(action: impl Into<String>) -> RuleBuilder {
        RuleBuilder::new(action)
    }
}

impl Record for Rule {
    fn action(&self) -> &str {
        &self.action
    }

    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_chain(f, &self.conditions, &self.action)
    }
}

/// Builder for [`Rule`]
#[derive(Debug, Clone, Default)]
pub struct RuleBuilder {
    action: String,
    tag: Slot<String>,
    authenticated: Slot<()>,
    sources: Slot<TableRef>,
    senders: Slot<TableRef>,
    recipients: Slot<TableRef>,
    destination: Slot<TableRef>,
}

impl RuleBuilder {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Self::default()
        }
    }

    /// Listener tag must equal this string
    pub fn tag(mut self, tag: Slot<String>) -> Self {
        self.tag = tag;
        self
    }

    /// Session must be authenticated (or, negated, must not be)
    pub fn authenticated(mut self, authenticated: Slot<()>) -> Self {
        self.authenticated = authenticated;
        self
    }

    pub fn sources(mut self, table: Slot<TableRef>) -> Self {
        self.sources = table;
        self
    }

    pub fn senders(mut self, table: Slot<TableRef>) -> Self {
        self.senders = table;
        self
    }

    pub fn recipients(mut self, table: Slot<TableRef>) -> Self {
        self.recipients = table;
        self
    }

    pub fn destination(mut self, table: Slot<TableRef>) -> Self {
        self.destination = table;
        self
    }

    pub fn build(self) -> Result<Rule> {
        let conditions = compile([
            self.tag.map(Predicate::TagEquals),
            self.authenticated.map(|()| Predicate::Authenticated),
            self.sources.map(Predicate::Source),
            self.senders.map(Predicate::Sender),
            self.recipients.map(Predicate::Recipient),
            self.destination.map(Predicate::Destination),
        ])?;

        Ok(Rule {
            action: self.action,
            conditions,
        })
    }
}
