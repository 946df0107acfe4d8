//! In-memory table built from configuration lists

use super::{KeyKind, LookupError, Table};
use ipnet::IpNet;
use smtprule_common::{Error, Result};
use std::net::IpAddr;

/// Sub-address delimiter stripped from keys before user comparison
const SUBADDRESS_DELIM: char = '+';

/// Static list of entries, matched per key kind
///
/// Lookups never fail.
#[derive(Debug, Clone)]
pub struct StaticTable {
    name: String,
    kinds: Vec<KeyKind>,
    entries: Vec<String>,
    networks: Vec<IpNet>,
    has_local: bool,
}

impl StaticTable {
    /// Create a table
    ///
    /// Entries that are `local`, an address, or a CIDR network serve netaddr
    /// lookups. A table declared only for network addresses must hold nothing
    /// else; a table with other kinds keeps the remaining entries for those.
    pub fn new(name: impl Into<String>, kinds: Vec<KeyKind>, entries: Vec<String>) -> Result<Self> {
        let name = name.into();
        if kinds.is_empty() {
            return Err(Error::Table(format!("table <{}> declares no key kinds", name)));
        }

        let mut networks = Vec::new();
        let mut has_local = false;
        if kinds.contains(&KeyKind::Netaddr) {
            let netaddr_only = kinds.iter().all(|kind| *kind == KeyKind::Netaddr);
            for entry in &entries {
                if entry == "local" {
                    has_local = true;
                    continue;
                }
                match parse_network(entry) {
                    Some(net) => networks.push(net),
                    None if netaddr_only => {
                        return Err(Error::Table(format!(
                            "table <{}>: invalid network address {:?}",
                            name, entry
                        )));
                    }
                    None => {}
                }
            }
        }

        Ok(Self {
            name,
            kinds,
            entries,
            networks,
            has_local,
        })
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    fn match_netaddr(&self, key: &str) -> bool {
        if key == "local" {
            return self.has_local;
        }
        let key = key.strip_prefix("IPv6:").unwrap_or(key);
        match key.parse::<IpAddr>() {
            Ok(addr) => self.networks.iter().any(|net| net.contains(&addr)),
            Err(_) => false,
        }
    }

    fn match_domain(&self, key: &str) -> bool {
        self.entries.iter().any(|entry| domain_match(key, entry))
    }

    fn match_mailaddr(&self, key: &str) -> bool {
        let (user, domain) = key.rsplit_once('@').unwrap_or((key, ""));
        self.entries
            .iter()
            .any(|entry| mailaddr_match(user, domain, entry))
    }

    fn match_credentials(&self, key: &str) -> bool {
        self.entries.iter().any(|entry| {
            let user = entry.split_once(':').map_or(entry.as_str(), |(u, _)| u);
            user == key
        })
    }
}

impl Table for StaticTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn kinds(&self) -> &[KeyKind] {
        &self.kinds
    }

    fn lookup(&self, key: &str, kind: KeyKind) -> std::result::Result<bool, LookupError> {
        if !self.supports(kind) {
            return Err(LookupError(format!(
                "table <{}> does not serve {} lookups",
                self.name, kind
            )));
        }

        Ok(match kind {
            KeyKind::Netaddr => self.match_netaddr(key),
            KeyKind::Domain => self.match_domain(key),
            KeyKind::Mailaddr => self.match_mailaddr(key),
            KeyKind::String => self.entries.iter().any(|entry| entry == key),
            KeyKind::Credentials => self.match_credentials(key),
        })
    }
}

fn parse_network(entry: &str) -> Option<IpNet> {
    let entry = entry.strip_prefix("IPv6:").unwrap_or(entry);
    if let Ok(net) = entry.parse::<IpNet>() {
        return Some(net);
    }
    let addr = entry.parse::<IpAddr>().ok()?;
    let prefix = if addr.is_ipv4() { 32 } else { 128 };
    IpNet::new(addr, prefix).ok()
}

/// `*.example.com` and `.example.com` match any subdomain of example.com;
/// a lone `*` matches every domain
fn domain_match(domain: &str, pattern: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    let pattern = pattern.strip_prefix('*').unwrap_or(pattern);
    if pattern.starts_with('.') {
        let domain = domain.to_ascii_lowercase();
        return domain.ends_with(&pattern.to_ascii_lowercase());
    }
    domain.eq_ignore_ascii_case(pattern)
}

/// Match a key address against a table entry
///
/// Entries are `user@domain`, `@domain`, `user@`, a bare domain, or `@` for
/// any address. An entry without a sub-address matches keys that carry one.
fn mailaddr_match(user: &str, domain: &str, entry: &str) -> bool {
    let (entry_user, entry_domain) = entry.rsplit_once('@').unwrap_or(("", entry));

    if entry_user.is_empty() && entry_domain.is_empty() {
        return true;
    }

    if !entry_domain.is_empty() && !domain_match(domain, entry_domain) {
        return false;
    }

    if !entry_user.is_empty() {
        let user = if entry_user.contains(SUBADDRESS_DELIM) {
            user
        } else {
            user.split(SUBADDRESS_DELIM).next().unwrap_or(user)
        };
        if !user.eq_ignore_ascii_case(entry_user) {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table(kind: KeyKind, entries: &[&str]) -> StaticTable {
        StaticTable::new(
            "t",
            vec![kind],
            entries.iter().map(|s| s.to_string()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_netaddr() {
        let t = table(KeyKind::Netaddr, &["10.0.0.0/8", "192.168.1.7", "2001:db8::/32"]);
        assert!(t.lookup("10.1.2.3", KeyKind::Netaddr).unwrap());
        assert!(t.lookup("192.168.1.7", KeyKind::Netaddr).unwrap());
        assert!(!t.lookup("192.168.1.1", KeyKind::Netaddr).unwrap());
        assert!(t.lookup("IPv6:2001:db8::25", KeyKind::Netaddr).unwrap());
        assert!(!t.lookup("local", KeyKind::Netaddr).unwrap());
        assert!(!t.lookup("not-an-address", KeyKind::Netaddr).unwrap());
    }

    #[test]
    fn test_netaddr_local() {
        let t = table(KeyKind::Netaddr, &["local"]);
        assert!(t.lookup("local", KeyKind::Netaddr).unwrap());
        assert!(!t.lookup("127.0.0.1", KeyKind::Netaddr).unwrap());
    }

    #[test]
    fn test_netaddr_rejects_garbage() {
        let err = StaticTable::new("t", vec![KeyKind::Netaddr], vec!["nope".to_string()])
            .unwrap_err();
        assert_eq!(err.code(), "TABLE_ERROR");
        assert_eq!(
            err.to_string(),
            "Table error: table <t>: invalid network address \"nope\""
        );
    }

    #[test]
    fn test_mixed_kinds_keep_non_network_entries() {
        let t = StaticTable::new(
            "mixed",
            vec![KeyKind::Netaddr, KeyKind::Domain],
            vec!["local".to_string(), "10.0.0.0/8".to_string(), "example.com".to_string()],
        )
        .unwrap();

        assert!(t.lookup("local", KeyKind::Netaddr).unwrap());
        assert!(t.lookup("10.9.8.7", KeyKind::Netaddr).unwrap());
        assert!(!t.lookup("192.0.2.1", KeyKind::Netaddr).unwrap());
        assert!(t.lookup("example.com", KeyKind::Domain).unwrap());
        assert!(!t.lookup("example.org", KeyKind::Domain).unwrap());
    }

    #[test]
    fn test_no_kinds_rejected() {
        let err = StaticTable::new("t", Vec::new(), Vec::new()).unwrap_err();
        assert_eq!(err.code(), "TABLE_ERROR");
    }

    #[test]
    fn test_domain() {
        let t = table(KeyKind::Domain, &["Example.com", "*.corp.example"]);
        assert!(t.lookup("example.COM", KeyKind::Domain).unwrap());
        assert!(t.lookup("mx.corp.example", KeyKind::Domain).unwrap());
        assert!(!t.lookup("corp.example", KeyKind::Domain).unwrap());
        assert!(!t.lookup("example.org", KeyKind::Domain).unwrap());
    }

    #[test]
    fn test_domain_wildcard_matches_everything() {
        let t = table(KeyKind::Domain, &["*"]);
        assert!(t.lookup("example.com", KeyKind::Domain).unwrap());
        assert!(t.lookup("mx.corp.example", KeyKind::Domain).unwrap());
    }

    #[test]
    fn test_mailaddr() {
        let t = table(
            KeyKind::Mailaddr,
            &["alice@example.com", "@lists.example.org", "bob+tag@example.net", "example.edu"],
        );
        assert!(t.lookup("Alice@example.com", KeyKind::Mailaddr).unwrap());
        assert!(t.lookup("alice+news@example.com", KeyKind::Mailaddr).unwrap());
        assert!(t.lookup("anyone@lists.example.org", KeyKind::Mailaddr).unwrap());
        assert!(t.lookup("bob+tag@example.net", KeyKind::Mailaddr).unwrap());
        assert!(!t.lookup("bob@example.net", KeyKind::Mailaddr).unwrap());
        assert!(t.lookup("carol@example.edu", KeyKind::Mailaddr).unwrap());
        assert!(!t.lookup("carol@example.com", KeyKind::Mailaddr).unwrap());
    }

    #[test]
    fn test_mailaddr_catch_all() {
        let t = table(KeyKind::Mailaddr, &["@"]);
        assert!(t.lookup("anyone@anywhere", KeyKind::Mailaddr).unwrap());
        assert!(t.lookup("@", KeyKind::Mailaddr).unwrap());
    }

    #[test]
    fn test_string_and_credentials() {
        let t = table(KeyKind::String, &["MTA"]);
        assert!(t.lookup("MTA", KeyKind::String).unwrap());
        assert!(!t.lookup("mta", KeyKind::String).unwrap());

        let t = table(KeyKind::Credentials, &["alice:$2b$hash", "bob"]);
        assert!(t.lookup("alice", KeyKind::Credentials).unwrap());
        assert!(t.lookup("bob", KeyKind::Credentials).unwrap());
        assert!(!t.lookup("carol", KeyKind::Credentials).unwrap());
    }

    #[test]
    fn test_undeclared_kind_is_an_error() {
        let t = table(KeyKind::Domain, &["example.com"]);
        assert!(t.lookup("example.com", KeyKind::String).is_err());
    }
}
