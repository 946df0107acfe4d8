//! Predicate-chain match entries
//!
//! Predicates run in the order tag, from, to, helo, auth, starttls,
//! mail-from, rcpt-to; a predicate only runs when every one before it passed.

use super::polarity::Slot;
use super::predicate::{compile, fmt_chain, Condition, Predicate};
use super::selector::Record;
use crate::table::TableRef;
use smtprule_common::Result;
use std::fmt;

/// What the `from` predicate checks
#[derive(Debug, Clone, PartialEq)]
pub enum FromFilter {
    /// Source address is in this table
    Table(TableRef),
    /// Session came in over the local socket
    Socket,
}

/// Predicate-chain match entry
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    action: String,
    conditions: Vec<Condition>,
}

impl Match {
    pub fn builder(action: impl Into<String>) -> MatchBuilder {
        MatchBuilder::new(action)
    }
}

impl Record for Match {
    fn action(&self) -> &str {
        &self.action
    }

    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_chain(f, &self.conditions, &self.action)
    }
}

/// Builder for [`Match`]
#[derive(Debug, Clone, Default)]
pub struct MatchBuilder {
    action: String,
    tag: Slot<TableRef>,
    from: Slot<FromFilter>,
    to: Slot<TableRef>,
    helo: Slot<TableRef>,
    auth: Slot<Option<TableRef>>,
    starttls: Slot<()>,
    mail_from: Slot<TableRef>,
    rcpt_to: Slot<TableRef>,
}

impl MatchBuilder {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Self::default()
        }
    }

    pub fn tag(mut self, table: Slot<TableRef>) -> Self {
        self.tag = table;
        self
    }

    pub fn from(mut self, from: Slot<FromFilter>) -> Self {
        self.from = from;
        self
    }

    pub fn to(mut self, table: Slot<TableRef>) -> Self {
        self.to = table;
        self
    }

    pub fn helo(mut self, table: Slot<TableRef>) -> Self {
        self.helo = table;
        self
    }

    /// Session must be authenticated, against a credentials table if given
    pub fn auth(mut self, auth: Slot<Option<TableRef>>) -> Self {
        self.auth = auth;
        self
    }

    pub fn starttls(mut self, starttls: Slot<()>) -> Self {
        self.starttls = starttls;
        self
    }

    pub fn mail_from(mut self, table: Slot<TableRef>) -> Self {
        self.mail_from = table;
        self
    }

    pub fn rcpt_to(mut self, table: Slot<TableRef>) -> Self {
        self.rcpt_to = table;
        self
    }

    pub fn build(self) -> Result<Match> {
        let conditions = compile([
            self.tag.map(Predicate::TagTable),
            self.from.map(|from| match from {
                FromFilter::Table(table) => Predicate::Source(table),
                FromFilter::Socket => Predicate::LocalSocket,
            }),
            self.to.map(Predicate::Destination),
            self.helo.map(Predicate::Helo),
            self.auth.map(Predicate::Auth),
            self.starttls.map(|()| Predicate::StartTls),
            self.mail_from.map(Predicate::MailFrom),
            self.rcpt_to.map(Predicate::RcptTo),
        ])?;

        Ok(Match {
            action: self.action,
            conditions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::KeyKind;
    use crate::testing::CountingTable;
    use pretty_assertions::assert_eq;

    fn table(name: &str, kind: KeyKind) -> TableRef {
        TableRef::new(CountingTable::new(name, kind, &[]))
    }

    #[test]
    fn test_predicate_order_is_fixed() {
        let entry = Match::builder("deliver")
            .rcpt_to(Slot::normal(table("rcpts", KeyKind::Mailaddr)))
            .mail_from(Slot::normal(table("senders", KeyKind::Mailaddr)))
            .starttls(Slot::normal(()))
            .auth(Slot::negated(None))
            .helo(Slot::normal(table("helos", KeyKind::Domain)))
            .to(Slot::normal(table("domains", KeyKind::Domain)))
            .from(Slot::normal(FromFilter::Socket))
            .tag(Slot::normal(table("tags", KeyKind::String)))
            .build()
            .unwrap();

        assert_eq!(
            entry.to_string(),
            "match tag <tags> from socket to <domains> helo <helos> !auth starttls \
             mail-from <senders> rcpt-to <rcpts> action \"deliver\""
        );
    }

    #[test]
    fn test_from_table() {
        let entry = Match::builder("relay")
            .from(Slot::negated(FromFilter::Table(table("lan", KeyKind::Netaddr))))
            .build()
            .unwrap();
        assert_eq!(entry.conditions().len(), 1);
        assert_eq!(entry.to_string(), "match !from <lan> action \"relay\"");
    }

    #[test]
    fn test_auth_table_kind_checked() {
        let err = Match::builder("submit")
            .auth(Slot::normal(Some(table("users", KeyKind::Mailaddr))))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("credentials"));
    }
}
