//! Declarative database setup.
//!
//! ```
//! use kvmodel_core::config::DatabaseConfig;
//!
//! let config = DatabaseConfig::from_json(
//!     r#"{ "tables": [{ "name": "orders" }, { "name": "log", "timestamped": false }],
//!          "stable_timestamp": 10 }"#,
//! )
//! .unwrap();
//! assert_eq!(config.tables.len(), 2);
//! assert!(config.tables[0].timestamped);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{TS_NONE, Timestamp};

fn default_timestamped() -> bool {
    true
}

/// Settings for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    pub name: String,
    /// Tables without timestamps ignore every timestamp passed to them.
    #[serde(default = "default_timestamped")]
    pub timestamped: bool,
}

impl TableConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestamped: true,
        }
    }
}

/// Settings for a whole database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub tables: Vec<TableConfig>,
    #[serde(default = "default_stable_timestamp")]
    pub stable_timestamp: Timestamp,
}

fn default_stable_timestamp() -> Timestamp {
    TS_NONE
}

impl DatabaseConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
