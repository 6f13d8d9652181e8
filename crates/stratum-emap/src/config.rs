//! Configuration for extent maps

use crate::Result;
use serde::{Deserialize, Serialize};

/// Configuration for an [`ExtMap`](crate::ExtMap)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtMapConfig {
    /// Check the partition of a map whenever a cursor on it is closed
    pub verify_invariants: bool,

    /// Log every segment of a map that fails the partition check
    pub dump_on_violation: bool,
}

impl ExtMapConfig {
    /// Create the default configuration (no checks)
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration with every check enabled, for tests and debugging
    pub const fn paranoid() -> Self {
        Self {
            verify_invariants: true,
            dump_on_violation: true,
        }
    }

    /// Enable or disable the partition check on cursor close
    #[must_use]
    pub const fn with_verify_invariants(mut self, enabled: bool) -> Self {
        self.verify_invariants = enabled;
        self
    }

    /// Enable or disable dumping a map that fails the check
    #[must_use]
    pub const fn with_dump_on_violation(mut self, enabled: bool) -> Self {
        self.dump_on_violation = enabled;
        self
    }

    /// Parse a configuration from JSON; missing fields take default values
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
