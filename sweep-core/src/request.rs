//! # Batch Requests
//!
//! The caller-facing shape of a sweep: entries, bridge parameters, deadline,
//! and the receipt that comes back.

use crate::error::{BridgeParamError, ShapeError};
use crate::source::{Asset, ConversionPath, RequestedAmount, ValueSource};
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

/// Bridge parameters as submitted. All default means "settle directly".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeParams {
    pub destination_id: u16,
    pub recipient: H256,
    pub fee: U256,
}

impl BridgeParams {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn new(destination_id: u16, recipient: H256, fee: U256) -> Self {
        Self {
            destination_id,
            recipient,
            fee,
        }
    }

    /// Resolve the params into a route. Either every field is set or none is.
    pub fn route(&self) -> Result<Option<BridgeRoute>, BridgeParamError> {
        let destination_set = self.destination_id != 0;
        let recipient_set = !self.recipient.is_zero();
        let fee_set = !self.fee.is_zero();

        match (destination_set, recipient_set, fee_set) {
            (false, false, false) => Ok(None),
            (true, true, true) => Ok(Some(BridgeRoute {
                destination_id: self.destination_id,
                recipient: self.recipient,
                fee: self.fee,
            })),
            _ => Err(BridgeParamError::PartiallySpecified {
                destination_set,
                recipient_set,
                fee_set,
            }),
        }
    }
}

/// Validated, enabled bridge parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeRoute {
    pub destination_id: u16,
    pub recipient: H256,
    pub fee: U256,
}

/// An ordered batch of value sources plus settlement instructions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub entries: Vec<ValueSource>,
    #[serde(default)]
    pub bridge: BridgeParams,
    /// Forwarded to the exchange untouched.
    #[serde(default)]
    pub deadline: Option<u64>,
}

impl BatchRequest {
    pub fn new(entries: Vec<ValueSource>) -> Self {
        Self {
            entries,
            bridge: BridgeParams::disabled(),
            deadline: None,
        }
    }

    pub fn with_bridge(mut self, bridge: BridgeParams) -> Self {
        self.bridge = bridge;
        self
    }

    pub fn with_deadline(mut self, deadline: u64) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Build a request from the parallel-array form callers submit.
    pub fn from_parallel(
        assets: &[Asset],
        amounts: &[U256],
        paths: &[Vec<Address>],
        min_outputs: &[U256],
    ) -> Result<Self, ShapeError> {
        let expected = assets.len();
        for (field, actual) in [
            ("amounts", amounts.len()),
            ("paths", paths.len()),
            ("min_outputs", min_outputs.len()),
        ] {
            if actual != expected {
                return Err(ShapeError::LengthMismatch {
                    field,
                    expected,
                    actual,
                });
            }
        }

        let entries = assets
            .iter()
            .zip(amounts)
            .zip(paths)
            .zip(min_outputs)
            .map(|(((asset, amount), path), min_output)| ValueSource {
                asset: *asset,
                requested: RequestedAmount::from(*amount),
                path: ConversionPath::from(path.clone()),
                min_output: *min_output,
            })
            .collect();

        Ok(Self::new(entries))
    }
}

/// Final disposition of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub bridged: bool,
    pub total_output: U256,
    pub sequence_id: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipient() -> H256 {
        H256::repeat_byte(0xab)
    }

    #[test]
    fn test_default_params_disable_bridging() {
        assert_eq!(BridgeParams::disabled().route(), Ok(None));
    }

    #[test]
    fn test_full_params_enable_bridging() {
        let params = BridgeParams::new(2, recipient(), U256::from(5));
        let route = params.route().unwrap().unwrap();
        assert_eq!(route.destination_id, 2);
        assert_eq!(route.recipient, recipient());
        assert_eq!(route.fee, U256::from(5));
    }

    #[test]
    fn test_any_single_field_is_rejected() {
        let partials = [
            BridgeParams::new(2, H256::zero(), U256::zero()),
            BridgeParams::new(0, recipient(), U256::zero()),
            BridgeParams::new(0, H256::zero(), U256::from(1)),
            BridgeParams::new(2, recipient(), U256::zero()),
        ];

        for params in partials {
            assert!(
                matches!(
                    params.route(),
                    Err(BridgeParamError::PartiallySpecified { .. })
                ),
                "{:?} should be rejected",
                params
            );
        }
    }

    #[test]
    fn test_from_parallel_length_mismatch() {
        let assets = [Asset::Native, Asset::Native];
        let amounts = [U256::from(1), U256::from(2)];
        let paths = vec![vec![Address::zero(), Address::zero()]];
        let min_outputs = [U256::zero(), U256::zero()];

        let err = BatchRequest::from_parallel(&assets, &amounts, &paths, &min_outputs)
            .unwrap_err();
        assert_eq!(
            err,
            ShapeError::LengthMismatch {
                field: "paths",
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_from_parallel_maps_zero_to_remainder() {
        let token = Address::repeat_byte(1);
        let target = Address::repeat_byte(9);
        let request = BatchRequest::from_parallel(
            &[Asset::Token(token)],
            &[U256::zero()],
            &[vec![token, target]],
            &[U256::from(3)],
        )
        .unwrap();

        assert_eq!(request.entries.len(), 1);
        assert!(request.entries[0].requested.is_remainder());
        assert_eq!(request.entries[0].min_output, U256::from(3));
        assert_eq!(request.bridge, BridgeParams::disabled());
    }
}
