//! # Settlement Router
//!
//! Pays a batch's accumulated output once: straight to the requester, or
//! through the bridge under scoped authorizations for the output and the fee.

use crate::authorization::{with_scoped_authorization, Grant};
use crate::error::{BridgeError, BridgeParamError, SweepError};
use crate::request::{BridgeRoute, SettlementReceipt};
use crate::source::Asset;
use crate::traits::{BridgeAdapter, BridgeTransfer, Ledger, SpendAuthority};
use ethers::types::{Address, U256};
use tracing::debug;

pub struct SettlementRouter<'a> {
    authority: &'a dyn SpendAuthority,
    bridge: Option<&'a dyn BridgeAdapter>,
    engine: Address,
    target_asset: Address,
}

impl<'a> SettlementRouter<'a> {
    pub fn new(
        authority: &'a dyn SpendAuthority,
        bridge: Option<&'a dyn BridgeAdapter>,
        engine: Address,
        target_asset: Address,
    ) -> Self {
        Self {
            authority,
            bridge,
            engine,
            target_asset,
        }
    }

    pub fn settle(
        &self,
        ledger: &mut dyn Ledger,
        requester: Address,
        total_output: U256,
        route: Option<&BridgeRoute>,
    ) -> Result<SettlementReceipt, SweepError> {
        match route {
            None => self.settle_direct(ledger, requester, total_output),
            Some(route) => self.settle_bridged(ledger, total_output, route),
        }
    }

    fn settle_direct(
        &self,
        ledger: &mut dyn Ledger,
        requester: Address,
        total_output: U256,
    ) -> Result<SettlementReceipt, SweepError> {
        debug!("Paying {} target asset to {:?}", total_output, requester);
        ledger.transfer(
            self.engine,
            requester,
            Asset::Token(self.target_asset),
            total_output,
        )?;

        Ok(SettlementReceipt {
            bridged: false,
            total_output,
            sequence_id: None,
        })
    }

    fn settle_bridged(
        &self,
        ledger: &mut dyn Ledger,
        total_output: U256,
        route: &BridgeRoute,
    ) -> Result<SettlementReceipt, SweepError> {
        let bridge = self.bridge.ok_or(BridgeParamError::NoBridgeConfigured)?;

        let transfer = BridgeTransfer {
            sender: self.engine,
            asset: self.target_asset,
            amount: total_output,
            destination_id: route.destination_id,
            recipient: route.recipient,
            fee: route.fee,
        };

        let output_grant = Grant {
            owner: self.engine,
            spender: bridge.address(),
            asset: Asset::Token(self.target_asset),
            amount: total_output,
        };
        let fee_grant = Grant {
            owner: self.engine,
            spender: bridge.address(),
            asset: Asset::Native,
            amount: route.fee,
        };

        debug!(
            "Bridging {} to destination {} (fee: {})",
            total_output, route.destination_id, route.fee
        );
        let sequence_id = with_scoped_authorization(
            self.authority,
            ledger,
            output_grant,
            |ledger| -> Result<u64, BridgeError> {
                with_scoped_authorization(self.authority, ledger, fee_grant, |ledger| {
                    bridge.transfer(ledger, &transfer)
                })
            },
        )?;

        Ok(SettlementReceipt {
            bridged: true,
            total_output,
            sequence_id: Some(sequence_id),
        })
    }
}
