//! Predicate evaluators, one per filter dimension

use super::outcome::Indeterminate;
use super::polarity::{Polarity, Slot, Verdict};
use crate::table::{KeyKind, TableRef};
use smtprule_common::{Envelope, Error};
use std::fmt;
use tracing::warn;

/// A filter dimension and what it is checked against
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Listener tag equals this string
    TagEquals(String),
    /// Listener tag is in a string table
    TagTable(TableRef),
    /// Session is authenticated
    Authenticated,
    /// Source address is in a network-address table
    Source(TableRef),
    /// Session came in over the local submission socket
    LocalSocket,
    /// Sender address is in a mail-address table
    Sender(TableRef),
    /// Recipient address is in a mail-address table
    Recipient(TableRef),
    /// MAIL FROM address is in a mail-address table
    MailFrom(TableRef),
    /// RCPT TO address is in a mail-address table
    RcptTo(TableRef),
    /// Recipient domain is in a domain table
    Destination(TableRef),
    /// HELO/EHLO name is in a domain table
    Helo(TableRef),
    /// Session is authenticated, as a user of the credentials table if one is given
    Auth(Option<TableRef>),
    /// Session negotiated STARTTLS
    StartTls,
}

impl Predicate {
    pub fn name(&self) -> &'static str {
        match self {
            Predicate::TagEquals(_) | Predicate::TagTable(_) => "tag",
            Predicate::Authenticated => "authenticated",
            Predicate::Source(_) | Predicate::LocalSocket => "from",
            Predicate::Sender(_) => "sender",
            Predicate::Recipient(_) => "recipient",
            Predicate::MailFrom(_) => "mail-from",
            Predicate::RcptTo(_) => "rcpt-to",
            Predicate::Destination(_) => "to",
            Predicate::Helo(_) => "helo",
            Predicate::Auth(_) => "auth",
            Predicate::StartTls => "starttls",
        }
    }

    /// Key kind the predicate's table is queried with
    pub fn key_kind(&self) -> Option<KeyKind> {
        match self {
            Predicate::TagTable(_) => Some(KeyKind::String),
            Predicate::Source(_) => Some(KeyKind::Netaddr),
            Predicate::Sender(_)
            | Predicate::Recipient(_)
            | Predicate::MailFrom(_)
            | Predicate::RcptTo(_) => Some(KeyKind::Mailaddr),
            Predicate::Destination(_) | Predicate::Helo(_) => Some(KeyKind::Domain),
            Predicate::Auth(Some(_)) => Some(KeyKind::Credentials),
            _ => None,
        }
    }

    pub fn table(&self) -> Option<&TableRef> {
        match self {
            Predicate::TagTable(t)
            | Predicate::Source(t)
            | Predicate::Sender(t)
            | Predicate::Recipient(t)
            | Predicate::MailFrom(t)
            | Predicate::RcptTo(t)
            | Predicate::Destination(t)
            | Predicate::Helo(t)
            | Predicate::Auth(Some(t)) => Some(t),
            _ => None,
        }
    }

    /// Evaluate against the envelope, before polarity
    pub fn test(&self, envelope: &Envelope) -> Result<bool, Indeterminate> {
        match self {
            Predicate::TagEquals(tag) => Ok(envelope.tag == *tag),
            Predicate::TagTable(table) => table.lookup(&envelope.tag, KeyKind::String).into_raw(),
            Predicate::Authenticated => Ok(envelope.flags.authenticated),
            Predicate::Source(table) => table
                .lookup(&envelope.source_key(), KeyKind::Netaddr)
                .into_raw(),
            Predicate::LocalSocket => Ok(envelope.origin.is_local_socket()),
            Predicate::Sender(table) | Predicate::MailFrom(table) => {
                let key = self.render(envelope.sender.to_text())?;
                table.lookup(&key, KeyKind::Mailaddr).into_raw()
            }
            Predicate::Recipient(table) | Predicate::RcptTo(table) => {
                let key = self.render(envelope.recipient.to_text())?;
                table.lookup(&key, KeyKind::Mailaddr).into_raw()
            }
            Predicate::Destination(table) => table
                .lookup(&envelope.recipient.domain, KeyKind::Domain)
                .into_raw(),
            Predicate::Helo(table) => table.lookup(&envelope.helo, KeyKind::Domain).into_raw(),
            Predicate::Auth(table) => self.test_auth(table.as_ref(), envelope),
            Predicate::StartTls => envelope.tls.ok_or_else(|| self.unsupported()),
        }
    }

    fn test_auth(&self, table: Option<&TableRef>, envelope: &Envelope) -> Result<bool, Indeterminate> {
        if !envelope.flags.authenticated {
            return Ok(false);
        }
        let Some(table) = table else {
            return Ok(true);
        };

        // The username is only known when the host records it on the envelope.
        let username = envelope
            .username
            .as_deref()
            .ok_or_else(|| self.unsupported())?;
        table.lookup(username, KeyKind::Credentials).into_raw()
    }

    fn unsupported(&self) -> Indeterminate {
        warn!(predicate = self.name(), "envelope lacks the session state a predicate needs");
        Indeterminate::Unsupported {
            predicate: self.name(),
        }
    }

    fn render(&self, key: Option<String>) -> Result<String, Indeterminate> {
        key.ok_or_else(|| {
            warn!(predicate = self.name(), "cannot render envelope address as a table key");
            Indeterminate::UnrenderableAddress {
                predicate: self.name(),
            }
        })
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::TagEquals(tag) => write!(f, "tag {:?}", tag),
            Predicate::Authenticated => write!(f, "authenticated"),
            Predicate::LocalSocket => write!(f, "from socket"),
            Predicate::Auth(None) => write!(f, "auth"),
            Predicate::StartTls => write!(f, "starttls"),
            other => match other.table() {
                Some(table) => write!(f, "{} {}", other.name(), table),
                None => write!(f, "{}", other.name()),
            },
        }
    }
}

/// A predicate with its configured polarity
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub predicate: Predicate,
    pub polarity: Polarity,
}

impl Condition {
    pub fn new(predicate: Predicate, polarity: Polarity) -> Self {
        Self {
            predicate,
            polarity,
        }
    }

    /// Condition for a configured slot, `None` when the slot is absent
    ///
    /// Fails when the slot's table is not declared for the key kind the
    /// predicate queries it with.
    pub fn from_slot(slot: Slot<Predicate>) -> smtprule_common::Result<Option<Self>> {
        let Slot::Present(polarity, predicate) = slot else {
            return Ok(None);
        };

        if let (Some(table), Some(kind)) = (predicate.table(), predicate.key_kind()) {
            if !table.supports(kind) {
                return Err(Error::Validation(format!(
                    "table {} cannot be used for {} lookups by {}",
                    table,
                    kind,
                    predicate.name()
                )));
            }
        }
        Ok(Some(Self::new(predicate, polarity)))
    }

    pub fn evaluate(&self, envelope: &Envelope) -> Verdict {
        Verdict::from_raw(self.predicate.test(envelope), self.polarity)
    }
}

/// Collect the present slots, in the order given, into a predicate chain
pub(crate) fn compile(
    slots: impl IntoIterator<Item = Slot<Predicate>>,
) -> smtprule_common::Result<Vec<Condition>> {
    let mut conditions = Vec::new();
    for slot in slots {
        if let Some(condition) = Condition::from_slot(slot)? {
            conditions.push(condition);
        }
    }
    Ok(conditions)
}

/// Render a predicate chain and its action
pub(crate) fn fmt_chain(
    f: &mut fmt::Formatter<'_>,
    conditions: &[Condition],
    action: &str,
) -> fmt::Result {
    f.write_str("match")?;
    if conditions.is_empty() {
        f.write_str(" all")?;
    }
    for condition in conditions {
        write!(f, " {}", condition)?;
    }
    write!(f, " action {:?}", action)
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.polarity.is_negated() {
            f.write_str("!")?;
        }
        write!(f, "{}", self.predicate)
    }
}
