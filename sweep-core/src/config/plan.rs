//! # Batch Plans
//!
//! JSON description of a sweep: who, how much native value, which entries,
//! and where to settle. Amounts are decimal strings so 256-bit values survive
//! the trip through JSON.

use crate::error::ConfigError;
use crate::request::{BatchRequest, BridgeParams};
use crate::source::{Asset, ConversionPath, RequestedAmount, ValueSource};
use crate::traits::PlanLoader;
use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn zero_amount() -> String {
    "0".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanKind {
    Native,
    Token,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanEntry {
    pub kind: PlanKind,
    #[serde(default)]
    pub token: Option<Address>,
    /// "0" sweeps everything available.
    #[serde(default = "zero_amount")]
    pub amount: String,
    pub path: Vec<Address>,
    #[serde(default = "zero_amount")]
    pub min_output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanBridge {
    pub destination_id: u16,
    /// 32-byte canonical recipient, hex encoded.
    pub recipient: String,
    pub fee: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPlan {
    pub requester: Address,
    #[serde(default = "zero_amount")]
    pub supplied_native: String,
    pub entries: Vec<PlanEntry>,
    #[serde(default)]
    pub bridge: Option<PlanBridge>,
    #[serde(default)]
    pub deadline: Option<u64>,
}

/// A plan with every string field parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPlan {
    pub requester: Address,
    pub supplied_native: U256,
    pub request: BatchRequest,
}

impl BatchPlan {
    pub fn resolve(&self) -> Result<ResolvedPlan, ConfigError> {
        let supplied_native = parse_amount("supplied_native", &self.supplied_native)?;

        let entries = self
            .entries
            .iter()
            .enumerate()
            .map(|(index, entry)| entry.resolve(index))
            .collect::<Result<Vec<_>, _>>()?;

        let mut request = BatchRequest::new(entries);
        if let Some(bridge) = &self.bridge {
            request = request.with_bridge(bridge.resolve()?);
        }
        if let Some(deadline) = self.deadline {
            request = request.with_deadline(deadline);
        }

        Ok(ResolvedPlan {
            requester: self.requester,
            supplied_native,
            request,
        })
    }
}

impl PlanEntry {
    fn resolve(&self, index: usize) -> Result<ValueSource, ConfigError> {
        let asset = match (self.kind, self.token) {
            (PlanKind::Native, _) => Asset::Native,
            (PlanKind::Token, Some(token)) => Asset::Token(token),
            (PlanKind::Token, None) => {
                return Err(ConfigError::MissingField {
                    field: format!("entries[{}].token", index),
                })
            }
        };

        Ok(ValueSource {
            asset,
            requested: RequestedAmount::from(parse_amount(
                &format!("entries[{}].amount", index),
                &self.amount,
            )?),
            path: ConversionPath::from(self.path.clone()),
            min_output: parse_amount(&format!("entries[{}].min_output", index), &self.min_output)?,
        })
    }
}

impl PlanBridge {
    fn resolve(&self) -> Result<BridgeParams, ConfigError> {
        Ok(BridgeParams::new(
            self.destination_id,
            parse_recipient(&self.recipient)?,
            parse_amount("bridge.fee", &self.fee)?,
        ))
    }
}

pub fn parse_amount(field: &str, value: &str) -> Result<U256, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_dec_str(trimmed).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        reason: format!("'{}' is not a decimal amount: {}", trimmed, e),
    })
}

/// Recipients must already be in 32-byte canonical form.
pub fn parse_recipient(value: &str) -> Result<H256, ConfigError> {
    let stripped = value.trim().trim_start_matches("0x");
    let bytes = hex::decode(stripped).map_err(|e| ConfigError::InvalidValue {
        field: "bridge.recipient".to_string(),
        reason: e.to_string(),
    })?;
    if bytes.len() != 32 {
        return Err(ConfigError::InvalidValue {
            field: "bridge.recipient".to_string(),
            reason: format!("expected 32 bytes, got {}", bytes.len()),
        });
    }
    Ok(H256::from_slice(&bytes))
}

/// Loads a [`BatchPlan`] from a JSON file.
#[derive(Debug, Clone)]
pub struct JsonPlanFile {
    path: PathBuf,
}

impl JsonPlanFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PlanLoader for JsonPlanFile {
    async fn load_plan(&self) -> Result<BatchPlan> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read plan file {}", self.path.display()))?;
        let plan = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse plan file {}", self.path.display()))?;
        Ok(plan)
    }
}
