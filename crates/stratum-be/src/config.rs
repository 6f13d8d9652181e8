//! Configuration for the backend store

use crate::{BeError, Result, TxCredit};
use serde::{Deserialize, Serialize};

/// Configuration for a store instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Table name, used in log and error messages
    pub name: String,

    /// Largest credit a single transaction may reserve
    pub max_tx_credit: TxCredit,

    /// Bytes charged for creating or destroying the table descriptor
    pub table_descriptor_size: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            max_tx_credit: TxCredit::new(1 << 20, 256 * 1024 * 1024), // 1M records, 256 MB
            table_descriptor_size: 64,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration for the named table
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the per-transaction credit limit
    #[must_use]
    pub const fn with_max_tx_credit(mut self, credit: TxCredit) -> Self {
        self.max_tx_credit = credit;
        self
    }

    /// Set the table descriptor size
    #[must_use]
    pub const fn with_table_descriptor_size(mut self, size: u64) -> Self {
        self.table_descriptor_size = size;
        self
    }

    /// Parse a configuration from JSON; missing fields take default values
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for consistency
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(BeError::Config("table name must not be empty".to_string()));
        }
        if self.max_tx_credit.is_zero() {
            return Err(BeError::Config(
                "max_tx_credit must allow at least one record".to_string(),
            ));
        }
        Ok(())
    }
}
