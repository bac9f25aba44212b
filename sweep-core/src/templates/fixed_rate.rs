//! # Fixed-Rate Exchange
//!
//! Reference [`ExchangeAdapter`] that prices every hop with a configured
//! rational rate and pays out of its own target-asset liquidity.

use crate::error::ConversionError;
use crate::source::Asset;
use crate::traits::{ConversionOrder, ExchangeAdapter, Ledger};
use ethers::types::{Address, U256};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rate {
    pub numerator: U256,
    pub denominator: U256,
}

impl Rate {
    pub fn new(numerator: impl Into<U256>, denominator: impl Into<U256>) -> Self {
        Self {
            numerator: numerator.into(),
            denominator: denominator.into(),
        }
    }

    fn apply(&self, amount: U256) -> Option<U256> {
        if self.denominator.is_zero() {
            return None;
        }
        amount
            .checked_mul(self.numerator)
            .map(|scaled| scaled / self.denominator)
    }
}

#[derive(Debug, Clone)]
pub struct FixedRateExchange {
    address: Address,
    target_asset: Address,
    wrapped_native: Address,
    rates: HashMap<(Address, Address), Rate>,
}

impl FixedRateExchange {
    pub fn new(address: Address, target_asset: Address, wrapped_native: Address) -> Self {
        Self {
            address,
            target_asset,
            wrapped_native,
            rates: HashMap::new(),
        }
    }

    /// Price one hop: `amount_out = amount_in * rate.numerator / rate.denominator`.
    pub fn with_rate(mut self, from: Address, to: Address, rate: Rate) -> Self {
        self.rates.insert((from, to), rate);
        self
    }

    /// Output for `amount` along `path`, without moving funds.
    pub fn quote(&self, path: &[Address], amount: U256) -> Result<U256, ConversionError> {
        if path.len() < 2 {
            return Err(ConversionError::RouteInvalid {
                reason: format!("path has {} hops", path.len()),
            });
        }

        path.windows(2).try_fold(amount, |running, pair| {
            let rate = self.rates.get(&(pair[0], pair[1])).ok_or_else(|| {
                ConversionError::RouteInvalid {
                    reason: format!("no pool for {:?} -> {:?}", pair[0], pair[1]),
                }
            })?;
            rate.apply(running).ok_or_else(|| ConversionError::RouteInvalid {
                reason: format!("rate overflow on {:?} -> {:?}", pair[0], pair[1]),
            })
        })
    }
}

impl ExchangeAdapter for FixedRateExchange {
    fn address(&self) -> Address {
        self.address
    }

    fn convert(
        &self,
        ledger: &mut dyn Ledger,
        order: &ConversionOrder<'_>,
    ) -> Result<U256, ConversionError> {
        if let Some(deadline) = order.deadline {
            let now = ledger.now();
            if now > deadline {
                return Err(ConversionError::DeadlineExpired { deadline, now });
            }
        }

        let expected_source = order.input.route_address(self.wrapped_native);
        if order.path.first() != Some(expected_source) {
            return Err(ConversionError::RouteInvalid {
                reason: format!("path does not start at {:?}", expected_source),
            });
        }
        if order.path.last() != Some(self.target_asset) {
            return Err(ConversionError::RouteInvalid {
                reason: format!("path does not end at {:?}", self.target_asset),
            });
        }

        let output = self.quote(order.path.as_slice(), order.amount)?;
        if output < order.min_output {
            return Err(ConversionError::SlippageExceeded {
                min_output: order.min_output,
                output,
            });
        }

        let target = Asset::Token(self.target_asset);
        let liquidity = ledger.balance_of(self.address, target);
        if liquidity < output {
            return Err(ConversionError::InsufficientLiquidity {
                required: output,
                available: liquidity,
            });
        }

        ledger.transfer_from(
            self.address,
            order.owner,
            self.address,
            order.input,
            order.amount,
        )?;
        ledger.transfer(self.address, order.owner, target, output)?;

        debug!(
            "Converted {} {} -> {} over {} hops",
            order.amount,
            order.input,
            output,
            order.path.len() - 1
        );
        Ok(output)
    }
}
