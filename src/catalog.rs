//! Query catalog: logical query names mapped to remote query identifiers.
//!
//! The catalog is built once at startup (from the built-in table or from the
//! `[[queries]]` section of the config file) and shared read-only with every
//! component that needs it. Several logical names may point at the same
//! remote query; names themselves are unique.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// User-facing query name.
    pub name: String,
    /// Remote query identifier.
    pub query_id: i64,
}

impl CatalogEntry {
    /// Convenience constructor.
    pub fn new(name: impl Into<String>, query_id: i64) -> Self {
        Self {
            name: name.into(),
            query_id,
        }
    }
}

/// Built-in x402 query table, in fetch/export order.
const BUILTIN_QUERIES: &[(&str, i64)] = &[
    ("num transactions", 6_084_845),
    ("num transactions percent", 6_084_845),
    ("x402 volume evm", 6_094_619),
    ("volume by token evm", 6_094_619),
    ("facilitators by chain", 6_084_891),
    ("facilitators by chain percent", 6_084_891),
    ("facilitators solana", 6_084_802),
    ("x402 volume solana", 6_094_785),
    ("volume by token solana", 6_094_785),
];

/// Errors raised by catalog construction and lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// The name is not in the catalog.
    #[error("unknown query name '{name}' (available: {available})")]
    NotFound {
        /// Requested name.
        name: String,
        /// Comma-separated list of known names.
        available: String,
    },

    /// Two entries share a name.
    #[error("duplicate query name '{0}'")]
    Duplicate(String),

    /// An entry has an empty name.
    #[error("query names must not be empty")]
    EmptyName,
}

/// Immutable lookup table from logical name to remote query id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCatalog {
    entries: Vec<CatalogEntry>,
}

impl QueryCatalog {
    /// Build a catalog, preserving entry order.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Duplicate`] or [`CatalogError::EmptyName`].
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if entry.name.trim().is_empty() {
                return Err(CatalogError::EmptyName);
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(CatalogError::Duplicate(entry.name.clone()));
            }
        }
        Ok(Self { entries })
    }

    /// The built-in x402 catalog.
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN_QUERIES
                .iter()
                .map(|(name, id)| CatalogEntry::new(*name, *id))
                .collect(),
        }
    }

    /// Look up the remote identifier for `name`.
    pub fn resolve(&self, name: &str) -> Result<i64, CatalogError> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.query_id)
            .ok_or_else(|| CatalogError::NotFound {
                name: name.to_owned(),
                available: self.names().collect::<Vec<_>>().join(", "),
            })
    }

    /// Entries in catalog order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Names in catalog order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for QueryCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
