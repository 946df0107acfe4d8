//! Configuration for smtprule

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Lookup tables referenced by rules and matches
    #[serde(default)]
    pub tables: Vec<TableConfig>,

    /// Fixed-predicate rules, in evaluation order
    #[serde(default)]
    pub rules: Vec<RuleConfig>,

    /// Predicate-chain match entries, in evaluation order
    #[serde(default)]
    pub matches: Vec<MatchConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Kind of key a table lookup is scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    /// Network address, CIDR network or `local`
    Netaddr,
    /// Mail address
    Mailaddr,
    /// Domain name
    Domain,
    /// Plain string
    String,
    /// Authentication credentials, keyed by username
    Credentials,
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyKind::Netaddr => write!(f, "netaddr"),
            KeyKind::Mailaddr => write!(f, "mailaddr"),
            KeyKind::Domain => write!(f, "domain"),
            KeyKind::String => write!(f, "string"),
            KeyKind::Credentials => write!(f, "credentials"),
        }
    }
}

/// Static lookup table declared inline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableConfig {
    /// Table name, referenced from rules
    pub name: String,

    /// Key kinds this table may be queried with
    pub kinds: Vec<KeyKind>,

    /// Table entries
    #[serde(default)]
    pub entries: Vec<String>,
}

/// Fixed-predicate rule
///
/// Table references are table names; a leading `!` negates the dimension.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    /// Action the caller applies when this rule is selected
    pub action: String,

    /// Listener tag the envelope must carry
    pub tag: Option<String>,

    /// `true` requires an authenticated session, `false` an unauthenticated one
    pub authenticated: Option<bool>,

    /// Source address table
    pub sources: Option<String>,

    /// Sender address table
    pub senders: Option<String>,

    /// Recipient address table
    pub recipients: Option<String>,

    /// Destination domain table
    pub destination: Option<String>,
}

/// `auth` filter of a match entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthFilter {
    /// `true` requires authentication, `false` requires its absence
    Flag(bool),
    /// Authenticated username must be in this credentials table
    Table(String),
}

/// Predicate-chain match entry
///
/// Table references are table names; a leading `!` negates the predicate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchConfig {
    /// Action the caller applies when this entry is selected
    pub action: String,

    /// Table of listener tags
    pub tag: Option<String>,

    /// Source address table, or `socket` for local submissions
    pub from: Option<String>,

    /// Destination domain table
    pub to: Option<String>,

    /// HELO/EHLO name table
    pub helo: Option<String>,

    pub auth: Option<AuthFilter>,

    /// `true` requires STARTTLS, `false` requires its absence
    pub starttls: Option<bool>,

    /// MAIL FROM address table
    pub mail_from: Option<String>,

    /// RCPT TO address table
    pub rcpt_to: Option<String>,
}

impl Config {
    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration from file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Load configuration from the default locations
    pub fn load() -> crate::Result<Self> {
        let paths = [
            PathBuf::from("./smtprule.toml"),
            PathBuf::from("/etc/smtprule/smtprule.toml"),
        ];

        for path in paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(crate::Error::Config(
            "No configuration file found".to_string(),
        ))
    }
}
