//! Lookup tables
//!
//! Tables are the only source of indeterminate outcomes in rule matching: a
//! backend that cannot answer yields [`Lookup::Failed`], which aborts the
//! whole matching pass.

mod static_table;

pub use smtprule_common::config::KeyKind;
pub use static_table::StaticTable;

use smtprule_common::config::TableConfig;
use smtprule_common::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Failure reported by a table backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct LookupError(pub String);

/// Key/value lookup backend
pub trait Table: Send + Sync + fmt::Debug {
    /// Name the table is referenced by
    fn name(&self) -> &str;

    /// Key kinds this table may be queried with
    fn kinds(&self) -> &[KeyKind];

    /// Whether `key` is present when interpreted as `kind`
    fn lookup(&self, key: &str, kind: KeyKind) -> std::result::Result<bool, LookupError>;

    fn supports(&self, kind: KeyKind) -> bool {
        self.kinds().contains(&kind)
    }
}

/// Tri-state result of a table lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Matched,
    NotMatched,
    /// The backend could not answer
    Failed { table: String },
}

/// Shared handle to a registered table
#[derive(Clone)]
pub struct TableRef(Arc<dyn Table>);

impl TableRef {
    pub fn new(table: impl Table + 'static) -> Self {
        Self(Arc::new(table))
    }

    /// Wrap a table the caller keeps a handle to
    pub fn from_arc(table: Arc<dyn Table>) -> Self {
        Self(table)
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn supports(&self, kind: KeyKind) -> bool {
        self.0.supports(kind)
    }

    /// Query the table, logging backend failures
    pub fn lookup(&self, key: &str, kind: KeyKind) -> Lookup {
        // Kinds are checked when rules are built against the registry.
        debug_assert!(
            self.supports(kind),
            "table {} queried with undeclared kind {}",
            self.name(),
            kind
        );

        match self.0.lookup(key, kind) {
            Ok(true) => Lookup::Matched,
            Ok(false) => Lookup::NotMatched,
            Err(e) => {
                warn!(
                    table = %self.name(),
                    error = %e,
                    "failure to perform a table lookup on table {}",
                    self.name()
                );
                Lookup::Failed {
                    table: self.name().to_string(),
                }
            }
        }
    }
}

impl fmt::Debug for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableRef(<{}>)", self.name())
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.name())
    }
}

impl PartialEq for TableRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Tables by name
#[derive(Debug, Default, Clone)]
pub struct TableRegistry {
    tables: HashMap<String, TableRef>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build static tables from configuration
    pub fn from_config(tables: &[TableConfig]) -> Result<Self> {
        let mut registry = Self::new();
        for table in tables {
            let backend = StaticTable::new(&table.name, table.kinds.clone(), table.entries.clone())?;
            registry.register(backend)?;
        }
        Ok(registry)
    }

    /// Register a table under its own name
    pub fn register(&mut self, table: impl Table + 'static) -> Result<TableRef> {
        let name = table.name().to_string();
        if name.is_empty() {
            return Err(Error::Table("table name must not be empty".to_string()));
        }
        if self.tables.contains_key(&name) {
            return Err(Error::Table(format!("duplicate table <{}>", name)));
        }

        let handle = TableRef::new(table);
        self.tables.insert(name, handle.clone());
        Ok(handle)
    }

    pub fn get(&self, name: &str) -> Option<&TableRef> {
        self.tables.get(name)
    }

    /// Resolve a table that a predicate will query with `kind`
    pub fn resolve(&self, name: &str, kind: KeyKind) -> Result<TableRef> {
        let table = self
            .get(name)
            .ok_or_else(|| Error::Config(format!("unknown table <{}>", name)))?;

        if !table.supports(kind) {
            return Err(Error::Validation(format!(
                "table <{}> cannot be used for {} lookups",
                name, kind
            )));
        }
        Ok(table.clone())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingTable, FailingTable};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lookup_tri_state() {
        let table = TableRef::new(CountingTable::new("lan", KeyKind::Netaddr, &["local"]));
        assert_eq!(table.lookup("local", KeyKind::Netaddr), Lookup::Matched);
        assert_eq!(table.lookup("10.0.0.1", KeyKind::Netaddr), Lookup::NotMatched);

        let broken = TableRef::new(FailingTable::new("ldap", KeyKind::Netaddr));
        assert_eq!(
            broken.lookup("local", KeyKind::Netaddr),
            Lookup::Failed {
                table: "ldap".to_string()
            }
        );
    }

    #[test]
    fn test_registry_resolve() {
        let mut registry = TableRegistry::new();
        registry
            .register(CountingTable::new("domains", KeyKind::Domain, &["example.com"]))
            .unwrap();

        assert!(registry.resolve("domains", KeyKind::Domain).is_ok());

        let err = registry.resolve("domains", KeyKind::Netaddr).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("cannot be used for netaddr lookups"));

        let err = registry.resolve("missing", KeyKind::Domain).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert!(err.to_string().contains("unknown table <missing>"));
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut registry = TableRegistry::new();
        registry
            .register(CountingTable::new("t", KeyKind::String, &[]))
            .unwrap();
        let err = registry
            .register(CountingTable::new("t", KeyKind::String, &[]))
            .unwrap_err();
        assert_eq!(err.to_string(), "Table error: duplicate table <t>");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_from_config() {
        let tables = vec![TableConfig {
            name: "lan".to_string(),
            kinds: vec![KeyKind::Netaddr],
            entries: vec!["10.0.0.0/8".to_string()],
        }];
        let registry = TableRegistry::from_config(&tables).unwrap();
        let lan = registry.resolve("lan", KeyKind::Netaddr).unwrap();
        assert_eq!(lan.lookup("10.1.2.3", KeyKind::Netaddr), Lookup::Matched);
    }
}
