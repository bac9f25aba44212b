use crate::config::BatchPlan;
use crate::error::{BridgeError, ConversionError, LedgerError};
use crate::source::{Asset, ConversionPath};
use anyhow::Result;
use async_trait::async_trait;
use ethers::types::{Address, H256, U256};

/// Position in a ledger's change journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

impl Checkpoint {
    pub fn new(depth: usize) -> Self {
        Self(depth)
    }

    pub fn depth(&self) -> usize {
        self.0
    }
}

/// Balances, allowances and permit nonces shared by the engine and its adapters.
///
/// Batches run with exclusive access to the ledger and bracket their work
/// with [`Ledger::checkpoint`] and either [`Ledger::commit`] or
/// [`Ledger::revert_to`].
pub trait Ledger {
    fn balance_of(&self, account: Address, asset: Asset) -> U256;

    /// Spendable allowance; zero once the grant has expired.
    fn allowance(&self, owner: Address, spender: Address, asset: Asset) -> U256;

    /// Set (not add to) the allowance. A zero amount clears it.
    fn approve(
        &mut self,
        owner: Address,
        spender: Address,
        asset: Asset,
        amount: U256,
        expires_at: Option<u64>,
    ) -> Result<(), LedgerError>;

    fn transfer(
        &mut self,
        from: Address,
        to: Address,
        asset: Asset,
        amount: U256,
    ) -> Result<(), LedgerError>;

    /// Move funds on behalf of `from`, consuming `spender`'s allowance.
    fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        asset: Asset,
        amount: U256,
    ) -> Result<(), LedgerError>;

    /// Next unused permit nonce for the `(owner, spender, asset)` triple.
    fn nonce(&self, owner: Address, spender: Address, asset: Asset) -> u64;

    /// Consume the current permit nonce and return it. Journaled like any
    /// other write, so a revert hands the nonce back.
    fn use_nonce(
        &mut self,
        owner: Address,
        spender: Address,
        asset: Asset,
    ) -> Result<u64, LedgerError>;

    /// Current time in seconds, used for expiring grants and deadlines.
    fn now(&self) -> u64;

    fn checkpoint(&mut self) -> Checkpoint;

    fn revert_to(&mut self, checkpoint: Checkpoint);

    fn commit(&mut self, checkpoint: Checkpoint);
}

/// One conversion handed to an exchange.
#[derive(Debug, Clone, Copy)]
pub struct ConversionOrder<'a> {
    /// Holder of the input and recipient of the output.
    pub owner: Address,
    pub input: Asset,
    pub amount: U256,
    pub path: &'a ConversionPath,
    pub min_output: U256,
    pub deadline: Option<u64>,
}

pub trait ExchangeAdapter: Send + Sync {
    /// Identity the engine authorizes as spender.
    fn address(&self) -> Address;

    /// Pull `order.amount` of the input from the owner and pay the target
    /// asset back to it. Returns the output amount.
    fn convert(
        &self,
        ledger: &mut dyn Ledger,
        order: &ConversionOrder<'_>,
    ) -> Result<U256, ConversionError>;
}

/// One cross-chain transfer handed to a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeTransfer {
    pub sender: Address,
    pub asset: Address,
    pub amount: U256,
    pub destination_id: u16,
    pub recipient: H256,
    pub fee: U256,
}

pub trait BridgeAdapter: Send + Sync {
    fn address(&self) -> Address;

    /// Pull the asset and the native fee from the sender and return the
    /// bridge sequence id.
    fn transfer(
        &self,
        ledger: &mut dyn Ledger,
        transfer: &BridgeTransfer,
    ) -> Result<u64, BridgeError>;
}

/// Grants and revokes spend rights on behalf of the engine.
pub trait SpendAuthority: Send + Sync {
    fn name(&self) -> &str;

    fn grant(
        &self,
        ledger: &mut dyn Ledger,
        owner: Address,
        spender: Address,
        asset: Asset,
        amount: U256,
    ) -> Result<(), LedgerError>;

    fn revoke(
        &self,
        ledger: &mut dyn Ledger,
        owner: Address,
        spender: Address,
        asset: Asset,
    ) -> Result<(), LedgerError>;
}

#[async_trait]
pub trait PlanLoader: Send + Sync {
    /// Load a batch plan from its source (file, etc.)
    async fn load_plan(&self) -> Result<BatchPlan>;
}
