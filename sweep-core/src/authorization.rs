//! # Scoped Authorization
//!
//! Spend rights granted to an adapter live exactly as long as one operation.
//! [`with_scoped_authorization`] grants the exact amount, runs the operation,
//! and revokes whatever the adapter left unused on every exit path.

use crate::error::LedgerError;
use crate::source::Asset;
use crate::traits::{Ledger, SpendAuthority};
use ethers::types::{Address, U256};
use tracing::{debug, warn};

/// What to authorize: `owner` lets `spender` move `amount` of `asset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    pub owner: Address,
    pub spender: Address,
    pub asset: Asset,
    pub amount: U256,
}

/// Run `body` under a spend right for exactly `grant.amount`.
///
/// The residual allowance is revoked to zero whether `body` succeeds or
/// fails. If `body` failed, its error is returned even when the revoke also
/// fails; otherwise a failed revoke is the error.
pub fn with_scoped_authorization<T, E, F>(
    authority: &dyn SpendAuthority,
    ledger: &mut dyn Ledger,
    grant: Grant,
    body: F,
) -> Result<T, E>
where
    E: From<LedgerError>,
    F: FnOnce(&mut dyn Ledger) -> Result<T, E>,
{
    authority.grant(
        ledger,
        grant.owner,
        grant.spender,
        grant.asset,
        grant.amount,
    )?;

    let outcome = body(&mut *ledger);

    let residual = ledger.allowance(grant.owner, grant.spender, grant.asset);
    if !residual.is_zero() {
        debug!(
            "Revoking residual {} {} allowance for {:?}",
            residual, grant.asset, grant.spender
        );
    }

    // Expired grants read as zero but may still be stored, so always revoke.
    let revoked = authority.revoke(ledger, grant.owner, grant.spender, grant.asset);

    match (outcome, revoked) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(revoke_err)) => {
            warn!(
                "Revoke for {:?} failed after a failed operation: {}",
                grant.spender, revoke_err
            );
            Err(e)
        }
    }
}

/// Plain on-ledger approvals with no expiry.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectApproval;

impl SpendAuthority for DirectApproval {
    fn name(&self) -> &str {
        "direct"
    }

    fn grant(
        &self,
        ledger: &mut dyn Ledger,
        owner: Address,
        spender: Address,
        asset: Asset,
        amount: U256,
    ) -> Result<(), LedgerError> {
        ledger.approve(owner, spender, asset, amount, None)
    }

    fn revoke(
        &self,
        ledger: &mut dyn Ledger,
        owner: Address,
        spender: Address,
        asset: Asset,
    ) -> Result<(), LedgerError> {
        ledger.approve(owner, spender, asset, U256::zero(), None)
    }
}

/// Permit2-style grants: every approval expires `ttl_secs` after the ledger
/// clock and consumes the ledger's next nonce for its `(owner, spender, asset)`.
/// Nonces live on the ledger, so a reverted batch gives them back.
#[derive(Debug, Clone, Copy)]
pub struct Permit2Authority {
    ttl_secs: u64,
}

impl Permit2Authority {
    pub const DEFAULT_TTL_SECS: u64 = 60;

    pub fn new(ttl_secs: u64) -> Self {
        Self { ttl_secs }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }
}

impl Default for Permit2Authority {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL_SECS)
    }
}

impl SpendAuthority for Permit2Authority {
    fn name(&self) -> &str {
        "permit2"
    }

    fn grant(
        &self,
        ledger: &mut dyn Ledger,
        owner: Address,
        spender: Address,
        asset: Asset,
        amount: U256,
    ) -> Result<(), LedgerError> {
        let expires_at = ledger.now().saturating_add(self.ttl_secs);
        let nonce = ledger.use_nonce(owner, spender, asset)?;
        debug!(
            "Permit {} {} to {:?} (nonce: {}, expires: {})",
            amount, asset, spender, nonce, expires_at
        );
        ledger.approve(owner, spender, asset, amount, Some(expires_at))
    }

    fn revoke(
        &self,
        ledger: &mut dyn Ledger,
        owner: Address,
        spender: Address,
        asset: Asset,
    ) -> Result<(), LedgerError> {
        ledger.approve(owner, spender, asset, U256::zero(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::InMemoryLedger;

    fn engine() -> Address {
        Address::repeat_byte(0xe0)
    }

    fn router() -> Address {
        Address::repeat_byte(0x70)
    }

    fn dai() -> Asset {
        Asset::Token(Address::repeat_byte(0xda))
    }

    fn grant(amount: u64) -> Grant {
        Grant {
            owner: engine(),
            spender: router(),
            asset: dai(),
            amount: U256::from(amount),
        }
    }

    #[test]
    fn test_grant_is_exact_inside_body() {
        let mut ledger = InMemoryLedger::new();
        let seen: Result<U256, LedgerError> =
            with_scoped_authorization(&DirectApproval, &mut ledger, grant(25), |ledger| {
                Ok(ledger.allowance(engine(), router(), dai()))
            });

        assert_eq!(seen.unwrap(), U256::from(25));
        assert_eq!(ledger.allowance(engine(), router(), dai()), U256::zero());
    }

    #[test]
    fn test_residual_revoked_after_partial_use() {
        let mut ledger = InMemoryLedger::new();
        ledger.mint(engine(), dai(), U256::from(100)).unwrap();

        let result: Result<(), LedgerError> =
            with_scoped_authorization(&DirectApproval, &mut ledger, grant(40), |ledger| {
                ledger.transfer_from(router(), engine(), router(), dai(), U256::from(15))
            });

        assert!(result.is_ok());
        assert_eq!(ledger.allowance(engine(), router(), dai()), U256::zero());
        assert_eq!(ledger.balance_of(router(), dai()), U256::from(15));
    }

    #[test]
    fn test_residual_revoked_on_failure() {
        let mut ledger = InMemoryLedger::new();
        let result: Result<(), LedgerError> =
            with_scoped_authorization(&DirectApproval, &mut ledger, grant(40), |_| {
                Err(LedgerError::Overflow { account: router() })
            });

        assert_eq!(result, Err(LedgerError::Overflow { account: router() }));
        assert_eq!(ledger.allowance(engine(), router(), dai()), U256::zero());
        assert_eq!(ledger.grant_of(engine(), router(), dai()), None);
    }

    #[test]
    fn test_permit2_grants_expire_and_consume_nonces() {
        let authority = Permit2Authority::new(30);
        let mut ledger = InMemoryLedger::new().with_clock(1_000);

        assert_eq!(ledger.nonce(engine(), router(), dai()), 0);
        authority
            .grant(&mut ledger, engine(), router(), dai(), U256::from(7))
            .unwrap();

        let stored = ledger.grant_of(engine(), router(), dai()).unwrap();
        assert_eq!(stored.expires_at, Some(1_030));
        assert_eq!(ledger.nonce(engine(), router(), dai()), 1);

        ledger.set_time(1_031);
        assert_eq!(ledger.allowance(engine(), router(), dai()), U256::zero());

        authority
            .revoke(&mut ledger, engine(), router(), dai())
            .unwrap();
        assert_eq!(ledger.grant_of(engine(), router(), dai()), None);
        assert_eq!(ledger.nonce(engine(), router(), dai()), 1);
    }

    #[test]
    fn test_permit2_nonce_returns_on_revert() {
        let authority = Permit2Authority::default();
        let mut ledger = InMemoryLedger::new();

        let checkpoint = ledger.checkpoint();
        let result: Result<(), LedgerError> =
            with_scoped_authorization(&authority, &mut ledger, grant(5), |_| {
                Err(LedgerError::Overflow { account: router() })
            });
        assert!(result.is_err());
        assert_eq!(ledger.nonce(engine(), router(), dai()), 1);

        ledger.revert_to(checkpoint);
        assert_eq!(ledger.nonce(engine(), router(), dai()), 0);
    }
}
