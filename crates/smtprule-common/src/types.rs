//! Envelope model consulted by the rule engine

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Longest textual form a mail address may render to.
pub const MAILADDR_TEXT_MAX: usize = 2047;

/// Mail address as carried on the envelope
///
/// Either part may be empty: the null reverse-path (`MAIL FROM:<>`) has both
/// parts empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MailAddress {
    pub user: String,
    pub domain: String,
}

impl MailAddress {
    /// Create a new mail address
    pub fn new(user: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            domain: domain.into(),
        }
    }

    /// Parse `user@domain`, splitting on the last `@`
    ///
    /// A string without `@` is taken as a bare user. `<>` and the empty string
    /// yield the null address.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        let s = s
            .strip_prefix('<')
            .and_then(|rest| rest.strip_suffix('>'))
            .unwrap_or(s);

        match s.rsplit_once('@') {
            Some((user, domain)) => Self::new(user, domain),
            None => Self::new(s, ""),
        }
    }

    /// Whether this is the null reverse-path
    pub fn is_null(&self) -> bool {
        self.user.is_empty() && self.domain.is_empty()
    }

    /// Render the address as a table key
    ///
    /// Returns `None` when the address cannot be rendered: the rendered form
    /// is too long or one of the parts carries control characters. Callers
    /// must treat `None` as a failed lookup, never as a miss.
    pub fn to_text(&self) -> Option<String> {
        let has_control = |part: &str| part.chars().any(|c| c.is_control());
        if has_control(&self.user) || has_control(&self.domain) {
            return None;
        }

        let text = format!("{}@{}", self.user, self.domain);
        if text.len() > MAILADDR_TEXT_MAX {
            return None;
        }
        Some(text)
    }
}

impl std::fmt::Display for MailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.user, self.domain)
    }
}

/// Where the session carrying the envelope was accepted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Network connection from this peer address
    Inet(IpAddr),
    /// Local submission socket
    Local,
}

impl Origin {
    /// Render the origin as a network-address table key
    pub fn to_text(&self) -> String {
        match self {
            Origin::Inet(IpAddr::V4(addr)) => addr.to_string(),
            Origin::Inet(IpAddr::V6(addr)) => format!("IPv6:{}", addr),
            Origin::Local => "local".to_string(),
        }
    }

    pub fn is_local_socket(&self) -> bool {
        matches!(self, Origin::Local)
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<IpAddr> for Origin {
    fn from(addr: IpAddr) -> Self {
        Origin::Inet(addr)
    }
}

/// Envelope flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EnvelopeFlags {
    /// The session authenticated with SMTP AUTH
    pub authenticated: bool,
    /// The message was generated by the server itself (bounce, forward)
    pub internal: bool,
}

/// Message envelope as seen by the rule engine
///
/// Read-only for the duration of a matching pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Reverse-path (MAIL FROM)
    pub sender: MailAddress,

    /// Forward-path (RCPT TO) this envelope is for
    pub recipient: MailAddress,

    /// Originating address of the session
    pub origin: Origin,

    /// Listener tag the session was accepted on
    #[serde(default)]
    pub tag: String,

    /// HELO/EHLO name
    #[serde(default)]
    pub helo: String,

    #[serde(default)]
    pub flags: EnvelopeFlags,

    /// Whether the session negotiated STARTTLS; `None` when the host does
    /// not track it
    #[serde(default)]
    pub tls: Option<bool>,

    /// Username the session authenticated as, if known
    #[serde(default)]
    pub username: Option<String>,
}

impl Envelope {
    /// Create an envelope for a network session
    pub fn new(sender: MailAddress, recipient: MailAddress, origin: impl Into<Origin>) -> Self {
        Self {
            sender,
            recipient,
            origin: origin.into(),
            tag: String::new(),
            helo: String::new(),
            flags: EnvelopeFlags::default(),
            tls: None,
            username: None,
        }
    }

    /// Set the listener tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Set the HELO/EHLO name
    pub fn with_helo(mut self, helo: impl Into<String>) -> Self {
        self.helo = helo.into();
        self
    }

    /// Mark the session authenticated, optionally recording the username
    pub fn authenticated(mut self, username: Option<String>) -> Self {
        self.flags.authenticated = true;
        self.username = username;
        self
    }

    /// Mark the envelope as internally generated
    pub fn internal(mut self) -> Self {
        self.flags.internal = true;
        self
    }

    /// Record the STARTTLS state of the session
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Network-address key for source lookups
    ///
    /// Authenticated and internal envelopes are looked up as `local`
    /// whatever their peer address.
    pub fn source_key(&self) -> String {
        if self.flags.authenticated || self.flags.internal {
            "local".to_string()
        } else {
            self.origin.to_text()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mail_address_parse() {
        let addr = MailAddress::parse("<user@example.com>");
        assert_eq!(addr, MailAddress::new("user", "example.com"));
        assert_eq!(addr.to_text().as_deref(), Some("user@example.com"));

        let quoted = MailAddress::parse("\"a@b\"@example.com");
        assert_eq!(quoted.domain, "example.com");
    }

    #[test]
    fn test_null_sender() {
        let addr = MailAddress::parse("<>");
        assert!(addr.is_null());
        assert_eq!(addr.to_text().as_deref(), Some("@"));
    }

    #[test]
    fn test_unrenderable_address() {
        let addr = MailAddress::new("bad\nuser", "example.com");
        assert_eq!(addr.to_text(), None);

        let long = MailAddress::new("a".repeat(MAILADDR_TEXT_MAX), "example.com");
        assert_eq!(long.to_text(), None);
    }

    #[test]
    fn test_origin_text() {
        let v4: IpAddr = "10.1.2.3".parse().unwrap();
        let v6: IpAddr = "2001:db8::1".parse().unwrap();
        assert_eq!(Origin::Inet(v4).to_text(), "10.1.2.3");
        assert_eq!(Origin::Inet(v6).to_text(), "IPv6:2001:db8::1");
        assert_eq!(Origin::Local.to_text(), "local");
    }

    #[test]
    fn test_source_key_substitution() {
        let ip: IpAddr = "192.168.1.1".parse().unwrap();
        let env = Envelope::new(MailAddress::default(), MailAddress::default(), ip);
        assert_eq!(env.source_key(), "192.168.1.1");
        assert_eq!(env.clone().authenticated(None).source_key(), "local");
        assert_eq!(env.internal().source_key(), "local");
    }
}
