use crate::error::ConfigError;
use ethers::types::Address;
use serde::{Deserialize, Serialize};

pub mod plan;
pub use plan::{BatchPlan, JsonPlanFile, PlanBridge, PlanEntry, PlanKind, ResolvedPlan};

/// Hard ceiling on entries per batch.
pub const MAX_BATCH_ENTRIES: usize = 32;

fn default_max_batch_entries() -> usize {
    MAX_BATCH_ENTRIES
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Account that takes custody of swept funds during a batch.
    pub engine_address: Address,
    pub target_asset: Address,
    /// Token native value is routed as on the exchange.
    pub wrapped_native: Address,
    #[serde(default = "default_max_batch_entries")]
    pub max_batch_entries: usize,
}

impl EngineConfig {
    pub fn new(engine_address: Address, target_asset: Address, wrapped_native: Address) -> Self {
        Self {
            engine_address,
            target_asset,
            wrapped_native,
            max_batch_entries: MAX_BATCH_ENTRIES,
        }
    }

    pub fn with_max_batch_entries(mut self, max_batch_entries: usize) -> Self {
        self.max_batch_entries = max_batch_entries;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, address) in [
            ("engine_address", self.engine_address),
            ("target_asset", self.target_asset),
            ("wrapped_native", self.wrapped_native),
        ] {
            if address.is_zero() {
                return Err(ConfigError::MissingField {
                    field: field.to_string(),
                });
            }
        }

        if self.max_batch_entries == 0 || self.max_batch_entries > MAX_BATCH_ENTRIES {
            return Err(ConfigError::InvalidValue {
                field: "max_batch_entries".to_string(),
                reason: format!(
                    "must be between 1 and {}, got {}",
                    MAX_BATCH_ENTRIES, self.max_batch_entries
                ),
            });
        }

        Ok(())
    }
}
