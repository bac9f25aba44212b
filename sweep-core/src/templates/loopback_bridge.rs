//! # Loopback Bridge
//!
//! Reference [`BridgeAdapter`]: takes custody of the bridged asset and fee on
//! the local ledger and hands out monotonically increasing sequence ids.

use crate::error::BridgeError;
use crate::source::Asset;
use crate::traits::{BridgeAdapter, BridgeTransfer, Ledger};
use ethers::types::{Address, U256};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

#[derive(Debug)]
pub struct LoopbackBridge {
    address: Address,
    min_fee: U256,
    destinations: BTreeSet<u16>,
    next_sequence: AtomicU64,
}

impl LoopbackBridge {
    pub fn new(address: Address, min_fee: U256) -> Self {
        Self {
            address,
            min_fee,
            destinations: BTreeSet::new(),
            next_sequence: AtomicU64::new(0),
        }
    }

    pub fn with_destination(mut self, destination_id: u16) -> Self {
        self.destinations.insert(destination_id);
        self
    }

    pub fn with_destinations(mut self, destinations: impl IntoIterator<Item = u16>) -> Self {
        self.destinations.extend(destinations);
        self
    }

    /// Sequence id the next accepted transfer will receive. Ids are not
    /// reused when a batch reverts.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence.load(Ordering::SeqCst)
    }
}

impl BridgeAdapter for LoopbackBridge {
    fn address(&self) -> Address {
        self.address
    }

    fn transfer(
        &self,
        ledger: &mut dyn Ledger,
        transfer: &BridgeTransfer,
    ) -> Result<u64, BridgeError> {
        if !self.destinations.contains(&transfer.destination_id) {
            return Err(BridgeError::InvalidDestination {
                destination_id: transfer.destination_id,
            });
        }
        if transfer.fee < self.min_fee {
            return Err(BridgeError::FeeTooLow {
                required: self.min_fee,
                provided: transfer.fee,
            });
        }

        ledger.transfer_from(
            self.address,
            transfer.sender,
            self.address,
            Asset::Token(transfer.asset),
            transfer.amount,
        )?;
        ledger.transfer_from(
            self.address,
            transfer.sender,
            self.address,
            Asset::Native,
            transfer.fee,
        )?;

        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        debug!(
            "Bridge sequence {}: {} to {:?} on destination {}",
            sequence, transfer.amount, transfer.recipient, transfer.destination_id
        );
        Ok(sequence)
    }
}
