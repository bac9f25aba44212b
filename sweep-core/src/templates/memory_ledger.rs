//! # In-Memory Ledger
//!
//! Reference [`Ledger`] with a change journal, so a batch can be rolled back
//! as a unit. Used by the simulator and the test suite.

use crate::error::LedgerError;
use crate::source::Asset;
use crate::traits::{Checkpoint, Ledger};
use ethers::types::{Address, U256};
use std::collections::HashMap;

type BalanceKey = (Address, Asset);
type AllowanceKey = (Address, Address, Asset);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Allowance {
    pub amount: U256,
    pub expires_at: Option<u64>,
}

impl Allowance {
    fn is_expired(&self, now: u64) -> bool {
        matches!(self.expires_at, Some(expires_at) if now > expires_at)
    }
}

#[derive(Debug, Clone)]
enum JournalEntry {
    Balance {
        key: BalanceKey,
        previous: Option<U256>,
    },
    Allowance {
        key: AllowanceKey,
        previous: Option<Allowance>,
    },
    Nonce {
        key: AllowanceKey,
        previous: Option<u64>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    balances: HashMap<BalanceKey, U256>,
    allowances: HashMap<AllowanceKey, Allowance>,
    nonces: HashMap<AllowanceKey, u64>,
    clock: u64,
    journal: Vec<JournalEntry>,
    open_checkpoints: usize,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(mut self, now: u64) -> Self {
        self.clock = now;
        self
    }

    pub fn set_time(&mut self, now: u64) {
        self.clock = now;
    }

    /// Credit an account out of thin air. Setup only.
    pub fn mint(
        &mut self,
        account: Address,
        asset: Asset,
        amount: U256,
    ) -> Result<(), LedgerError> {
        let balance = self.balance_of(account, asset);
        let updated = balance
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { account })?;
        self.set_balance((account, asset), updated);
        Ok(())
    }

    /// Raw stored grant, including expired ones.
    pub fn grant_of(&self, owner: Address, spender: Address, asset: Asset) -> Option<Allowance> {
        self.allowances.get(&(owner, spender, asset)).copied()
    }

    pub fn journal_len(&self) -> usize {
        self.journal.len()
    }

    fn set_balance(&mut self, key: BalanceKey, value: U256) {
        let previous = if value.is_zero() {
            self.balances.remove(&key)
        } else {
            self.balances.insert(key, value)
        };
        if self.open_checkpoints > 0 {
            self.journal.push(JournalEntry::Balance { key, previous });
        }
    }

    fn set_allowance(&mut self, key: AllowanceKey, value: Allowance) {
        let previous = if value.amount.is_zero() {
            self.allowances.remove(&key)
        } else {
            self.allowances.insert(key, value)
        };
        if self.open_checkpoints > 0 {
            self.journal.push(JournalEntry::Allowance { key, previous });
        }
    }

    fn set_nonce(&mut self, key: AllowanceKey, value: u64) {
        let previous = self.nonces.insert(key, value);
        if self.open_checkpoints > 0 {
            self.journal.push(JournalEntry::Nonce { key, previous });
        }
    }

    fn undo(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::Balance { key, previous } => match previous {
                Some(value) => {
                    self.balances.insert(key, value);
                }
                None => {
                    self.balances.remove(&key);
                }
            },
            JournalEntry::Allowance { key, previous } => match previous {
                Some(value) => {
                    self.allowances.insert(key, value);
                }
                None => {
                    self.allowances.remove(&key);
                }
            },
            JournalEntry::Nonce { key, previous } => match previous {
                Some(value) => {
                    self.nonces.insert(key, value);
                }
                None => {
                    self.nonces.remove(&key);
                }
            },
        }
    }
}

impl Ledger for InMemoryLedger {
    fn balance_of(&self, account: Address, asset: Asset) -> U256 {
        self.balances
            .get(&(account, asset))
            .copied()
            .unwrap_or_default()
    }

    fn allowance(&self, owner: Address, spender: Address, asset: Asset) -> U256 {
        match self.allowances.get(&(owner, spender, asset)) {
            Some(grant) if !grant.is_expired(self.clock) => grant.amount,
            _ => U256::zero(),
        }
    }

    fn approve(
        &mut self,
        owner: Address,
        spender: Address,
        asset: Asset,
        amount: U256,
        expires_at: Option<u64>,
    ) -> Result<(), LedgerError> {
        self.set_allowance((owner, spender, asset), Allowance { amount, expires_at });
        Ok(())
    }

    fn transfer(
        &mut self,
        from: Address,
        to: Address,
        asset: Asset,
        amount: U256,
    ) -> Result<(), LedgerError> {
        if amount.is_zero() || from == to {
            return Ok(());
        }

        let available = self.balance_of(from, asset);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                account: from,
                asset,
                required: amount,
                available,
            });
        }

        let credited = self
            .balance_of(to, asset)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { account: to })?;

        self.set_balance((from, asset), available - amount);
        self.set_balance((to, asset), credited);
        Ok(())
    }

    fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        asset: Asset,
        amount: U256,
    ) -> Result<(), LedgerError> {
        let key = (from, spender, asset);
        let grant = self.allowances.get(&key).copied().unwrap_or_default();

        if !amount.is_zero() {
            if grant.is_expired(self.clock) {
                return Err(LedgerError::AuthorizationExpired {
                    owner: from,
                    spender,
                    expired_at: grant.expires_at.unwrap_or_default(),
                });
            }
            if grant.amount < amount {
                return Err(LedgerError::InsufficientAllowance {
                    owner: from,
                    spender,
                    asset,
                    required: amount,
                    available: grant.amount,
                });
            }
        }

        self.transfer(from, to, asset, amount)?;
        if !amount.is_zero() {
            self.set_allowance(
                key,
                Allowance {
                    amount: grant.amount - amount,
                    expires_at: grant.expires_at,
                },
            );
        }
        Ok(())
    }

    fn nonce(&self, owner: Address, spender: Address, asset: Asset) -> u64 {
        self.nonces
            .get(&(owner, spender, asset))
            .copied()
            .unwrap_or_default()
    }

    fn use_nonce(
        &mut self,
        owner: Address,
        spender: Address,
        asset: Asset,
    ) -> Result<u64, LedgerError> {
        let used = self.nonce(owner, spender, asset);
        let next = used
            .checked_add(1)
            .ok_or(LedgerError::NonceExhausted { owner, spender })?;
        self.set_nonce((owner, spender, asset), next);
        Ok(used)
    }

    fn now(&self) -> u64 {
        self.clock
    }

    fn checkpoint(&mut self) -> Checkpoint {
        self.open_checkpoints += 1;
        Checkpoint::new(self.journal.len())
    }

    fn revert_to(&mut self, checkpoint: Checkpoint) {
        while self.journal.len() > checkpoint.depth() {
            if let Some(entry) = self.journal.pop() {
                self.undo(entry);
            }
        }
        self.close_checkpoint();
    }

    fn commit(&mut self, _checkpoint: Checkpoint) {
        self.close_checkpoint();
    }
}

impl InMemoryLedger {
    fn close_checkpoint(&mut self) {
        self.open_checkpoints = self.open_checkpoints.saturating_sub(1);
        if self.open_checkpoints == 0 {
            self.journal.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Address {
        Address::repeat_byte(0xa1)
    }

    fn bob() -> Address {
        Address::repeat_byte(0xb0)
    }

    fn usdc() -> Asset {
        Asset::Token(Address::repeat_byte(0x05))
    }

    #[test]
    fn test_transfer_moves_balance() {
        let mut ledger = InMemoryLedger::new();
        ledger.mint(alice(), usdc(), U256::from(100)).unwrap();

        ledger
            .transfer(alice(), bob(), usdc(), U256::from(40))
            .unwrap();

        assert_eq!(ledger.balance_of(alice(), usdc()), U256::from(60));
        assert_eq!(ledger.balance_of(bob(), usdc()), U256::from(40));
    }

    #[test]
    fn test_transfer_rejects_overdraft() {
        let mut ledger = InMemoryLedger::new();
        ledger.mint(alice(), Asset::Native, U256::from(5)).unwrap();

        let err = ledger
            .transfer(alice(), bob(), Asset::Native, U256::from(6))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(ledger.balance_of(alice(), Asset::Native), U256::from(5));
    }

    #[test]
    fn test_transfer_from_consumes_allowance() {
        let mut ledger = InMemoryLedger::new();
        ledger.mint(alice(), usdc(), U256::from(100)).unwrap();
        ledger
            .approve(alice(), bob(), usdc(), U256::from(30), None)
            .unwrap();

        ledger
            .transfer_from(bob(), alice(), bob(), usdc(), U256::from(20))
            .unwrap();

        assert_eq!(ledger.allowance(alice(), bob(), usdc()), U256::from(10));
        let err = ledger
            .transfer_from(bob(), alice(), bob(), usdc(), U256::from(11))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientAllowance { .. }));
    }

    #[test]
    fn test_expired_allowance_reads_as_zero() {
        let mut ledger = InMemoryLedger::new().with_clock(1_000);
        ledger.mint(alice(), usdc(), U256::from(100)).unwrap();
        ledger
            .approve(alice(), bob(), usdc(), U256::from(50), Some(1_010))
            .unwrap();

        assert_eq!(ledger.allowance(alice(), bob(), usdc()), U256::from(50));

        ledger.set_time(1_011);
        assert_eq!(ledger.allowance(alice(), bob(), usdc()), U256::zero());
        let err = ledger
            .transfer_from(bob(), alice(), bob(), usdc(), U256::from(1))
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::AuthorizationExpired {
                expired_at: 1_010,
                ..
            }
        ));
    }

    #[test]
    fn test_revert_restores_state() {
        let mut ledger = InMemoryLedger::new();
        ledger.mint(alice(), usdc(), U256::from(100)).unwrap();

        let checkpoint = ledger.checkpoint();
        ledger
            .transfer(alice(), bob(), usdc(), U256::from(100))
            .unwrap();
        ledger
            .approve(alice(), bob(), Asset::Native, U256::from(9), None)
            .unwrap();
        ledger.revert_to(checkpoint);

        assert_eq!(ledger.balance_of(alice(), usdc()), U256::from(100));
        assert_eq!(ledger.balance_of(bob(), usdc()), U256::zero());
        assert_eq!(ledger.grant_of(alice(), bob(), Asset::Native), None);
        assert_eq!(ledger.journal_len(), 0);
    }

    #[test]
    fn test_nested_revert_keeps_outer_changes() {
        let mut ledger = InMemoryLedger::new();
        ledger.mint(alice(), usdc(), U256::from(10)).unwrap();

        let outer = ledger.checkpoint();
        ledger.transfer(alice(), bob(), usdc(), U256::from(4)).unwrap();

        let inner = ledger.checkpoint();
        ledger.transfer(alice(), bob(), usdc(), U256::from(6)).unwrap();
        ledger.revert_to(inner);

        assert_eq!(ledger.balance_of(bob(), usdc()), U256::from(4));
        ledger.commit(outer);
        assert_eq!(ledger.balance_of(bob(), usdc()), U256::from(4));
        assert_eq!(ledger.journal_len(), 0);
    }

    #[test]
    fn test_revert_hands_back_nonces() {
        let mut ledger = InMemoryLedger::new();
        assert_eq!(ledger.use_nonce(alice(), bob(), usdc()).unwrap(), 0);

        let checkpoint = ledger.checkpoint();
        assert_eq!(ledger.use_nonce(alice(), bob(), usdc()).unwrap(), 1);
        assert_eq!(ledger.use_nonce(alice(), bob(), usdc()).unwrap(), 2);
        assert_eq!(ledger.nonce(alice(), bob(), Asset::Native), 0);
        ledger.revert_to(checkpoint);

        assert_eq!(ledger.nonce(alice(), bob(), usdc()), 1);
    }
}
