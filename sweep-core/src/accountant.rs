//! # Batch Accountant
//!
//! Running totals for one in-flight batch. All native-value bookkeeping goes
//! through [`BatchAccountant::remaining_native`], so the fee check, the
//! deferred remainder and the final conservation check can never disagree.

use crate::error::AccountingError;
use ethers::types::U256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchAccountant {
    supplied_native: U256,
    reserved_fee: U256,
    native_consumed: U256,
    total_output: U256,
    deferred_index: Option<usize>,
}

impl BatchAccountant {
    /// `reserved_fee` is the bridge fee when bridging, zero otherwise.
    pub fn new(
        supplied_native: U256,
        reserved_fee: U256,
        deferred_index: Option<usize>,
    ) -> Result<Self, AccountingError> {
        if reserved_fee > supplied_native {
            return Err(AccountingError::FeeExceedsSupply {
                fee: reserved_fee,
                supplied: supplied_native,
            });
        }

        Ok(Self {
            supplied_native,
            reserved_fee,
            native_consumed: U256::zero(),
            total_output: U256::zero(),
            deferred_index,
        })
    }

    /// Supplied native value not yet committed to a conversion or the fee.
    pub fn remaining_native(&self) -> Result<U256, AccountingError> {
        self.supplied_native
            .checked_sub(self.reserved_fee)
            .and_then(|available| available.checked_sub(self.native_consumed))
            .ok_or(AccountingError::NativeUnderflow {
                consumed: self.native_consumed,
                available: self.supplied_native.saturating_sub(self.reserved_fee),
            })
    }

    /// Commit native value to entry `index`; fails before anything is spent
    /// if it would dip into the fee or beyond the supplied value.
    pub fn commit_native(&mut self, index: usize, amount: U256) -> Result<(), AccountingError> {
        let remaining = self.remaining_native()?;
        if amount > remaining {
            return Err(AccountingError::NativeOverCommitted {
                index,
                requested: amount,
                remaining,
            });
        }
        self.native_consumed += amount;
        Ok(())
    }

    pub fn record_output(&mut self, amount: U256) -> Result<(), AccountingError> {
        self.total_output = self
            .total_output
            .checked_add(amount)
            .ok_or(AccountingError::Overflow {
                what: "total output",
            })?;
        Ok(())
    }

    /// Every unit of supplied native value must be consumed or reserved for
    /// the fee. Returns the total output to settle.
    pub fn finalize(&self) -> Result<U256, AccountingError> {
        let unaccounted = self.remaining_native()?;
        if !unaccounted.is_zero() {
            return Err(AccountingError::ConservationMismatch {
                supplied: self.supplied_native,
                consumed: self.native_consumed,
                fee: self.reserved_fee,
                unaccounted,
            });
        }
        Ok(self.total_output)
    }

    pub fn supplied_native(&self) -> U256 {
        self.supplied_native
    }

    pub fn reserved_fee(&self) -> U256 {
        self.reserved_fee
    }

    pub fn native_consumed(&self) -> U256 {
        self.native_consumed
    }

    pub fn total_output(&self) -> U256 {
        self.total_output
    }

    pub fn deferred_index(&self) -> Option<usize> {
        self.deferred_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(n: u64) -> U256 {
        U256::from(n)
    }

    #[test]
    fn test_fee_larger_than_supply_rejected() {
        let err = BatchAccountant::new(u(5), u(6), None).unwrap_err();
        assert_eq!(
            err,
            AccountingError::FeeExceedsSupply {
                fee: u(6),
                supplied: u(5)
            }
        );
    }

    #[test]
    fn test_commit_respects_fee_reservation() {
        let mut accountant = BatchAccountant::new(u(10), u(3), None).unwrap();
        accountant.commit_native(0, u(4)).unwrap();
        assert_eq!(accountant.remaining_native().unwrap(), u(3));

        let err = accountant.commit_native(2, u(4)).unwrap_err();
        assert_eq!(
            err,
            AccountingError::NativeOverCommitted {
                index: 2,
                requested: u(4),
                remaining: u(3)
            }
        );
        assert_eq!(accountant.native_consumed(), u(4));
    }

    #[test]
    fn test_finalize_requires_exact_conservation() {
        let mut accountant = BatchAccountant::new(u(10), u(2), Some(0)).unwrap();
        accountant.commit_native(1, u(5)).unwrap();

        let err = accountant.finalize().unwrap_err();
        assert!(matches!(
            err,
            AccountingError::ConservationMismatch { unaccounted, .. } if unaccounted == u(3)
        ));

        let remainder = accountant.remaining_native().unwrap();
        accountant.commit_native(0, remainder).unwrap();
        accountant.record_output(u(42)).unwrap();
        assert_eq!(accountant.finalize().unwrap(), u(42));
    }

    #[test]
    fn test_output_overflow_detected() {
        let mut accountant = BatchAccountant::new(U256::zero(), U256::zero(), None).unwrap();
        accountant.record_output(U256::MAX).unwrap();
        let err = accountant.record_output(u(1)).unwrap_err();
        assert!(matches!(err, AccountingError::Overflow { .. }));
    }

    #[test]
    fn test_token_only_batch_conserves_trivially() {
        let accountant = BatchAccountant::new(U256::zero(), U256::zero(), None).unwrap();
        assert_eq!(accountant.finalize().unwrap(), U256::zero());
    }
}
