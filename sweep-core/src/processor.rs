//! # Batch Processor
//!
//! Orchestrates one sweep: validate, take custody, convert every entry under
//! a scoped authorization, resolve the deferred native entry last, check
//! conservation, settle once. Any failure reverts the ledger to the state it
//! had before the batch started.

use crate::accountant::BatchAccountant;
use crate::authorization::{with_scoped_authorization, DirectApproval, Grant};
use crate::config::EngineConfig;
use crate::error::{
    AccountingError, BridgeParamError, ConversionError, FundsError, ShapeError, SweepError,
};
use crate::metrics::MetricsCollector;
use crate::request::{BatchRequest, BridgeRoute, SettlementReceipt};
use crate::settlement::SettlementRouter;
use crate::source::{Asset, RequestedAmount, ValueSource};
use crate::traits::{BridgeAdapter, ConversionOrder, ExchangeAdapter, Ledger, SpendAuthority};
use ethers::types::{Address, U256};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of validating a request without touching any funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preflight {
    pub entries: usize,
    pub deferred_index: Option<usize>,
    pub route: Option<BridgeRoute>,
}

impl Preflight {
    pub fn bridged(&self) -> bool {
        self.route.is_some()
    }

    fn reserved_fee(&self) -> U256 {
        self.route.map(|route| route.fee).unwrap_or_default()
    }
}

pub struct BatchProcessor {
    config: EngineConfig,
    exchange: Arc<dyn ExchangeAdapter>,
    bridge: Option<Arc<dyn BridgeAdapter>>,
    authority: Arc<dyn SpendAuthority>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl BatchProcessor {
    pub fn new(config: EngineConfig, exchange: Arc<dyn ExchangeAdapter>) -> Self {
        Self {
            config,
            exchange,
            bridge: None,
            authority: Arc::new(DirectApproval),
            metrics: None,
        }
    }

    pub fn with_bridge(mut self, bridge: Arc<dyn BridgeAdapter>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn with_authority(mut self, authority: Arc<dyn SpendAuthority>) -> Self {
        self.authority = authority;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate bridge params, shape and the static native budget.
    pub fn preflight(
        &self,
        request: &BatchRequest,
        supplied_native: U256,
    ) -> Result<Preflight, SweepError> {
        let route = request.bridge.route()?;
        if route.is_some() && self.bridge.is_none() {
            return Err(BridgeParamError::NoBridgeConfigured.into());
        }

        let deferred_index = self.validate_shape(&request.entries)?;
        let preflight = Preflight {
            entries: request.entries.len(),
            deferred_index,
            route,
        };

        // Dry run of the native budget on a throwaway accountant.
        let mut budget =
            BatchAccountant::new(supplied_native, preflight.reserved_fee(), deferred_index)?;
        for (index, entry) in request.entries.iter().enumerate() {
            if let (Asset::Native, RequestedAmount::Exact(amount)) = (entry.asset, entry.requested)
            {
                budget.commit_native(index, amount)?;
            }
        }
        if deferred_index.is_none() {
            budget.finalize()?;
        }

        Ok(preflight)
    }

    /// Run a batch atomically against `ledger`.
    pub fn process(
        &self,
        ledger: &mut dyn Ledger,
        requester: Address,
        request: &BatchRequest,
        supplied_native: U256,
    ) -> Result<SettlementReceipt, SweepError> {
        let started = Instant::now();
        let mut converted = 0;

        let outcome = self.run(ledger, requester, request, supplied_native, &mut converted);

        match &outcome {
            Ok(receipt) => info!(
                target: "sweep_result",
                "SETTLED {:?}: {} entries -> {} (bridged: {}, sequence: {:?})",
                requester,
                converted,
                receipt.total_output,
                receipt.bridged,
                receipt.sequence_id
            ),
            Err(e) => warn!(
                target: "sweep_result",
                "REVERTED {:?}: {}",
                requester,
                e
            ),
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_batch(started.elapsed(), converted, &outcome);
        }
        outcome
    }

    fn run(
        &self,
        ledger: &mut dyn Ledger,
        requester: Address,
        request: &BatchRequest,
        supplied_native: U256,
        converted: &mut usize,
    ) -> Result<SettlementReceipt, SweepError> {
        // Nothing external is touched until the request is known to be well formed.
        let preflight = self.preflight(request, supplied_native)?;

        let checkpoint = ledger.checkpoint();
        match self.execute(ledger, requester, request, supplied_native, &preflight, converted) {
            Ok(receipt) => {
                ledger.commit(checkpoint);
                Ok(receipt)
            }
            Err(e) => {
                ledger.revert_to(checkpoint);
                *converted = 0;
                Err(e)
            }
        }
    }

    fn execute(
        &self,
        ledger: &mut dyn Ledger,
        requester: Address,
        request: &BatchRequest,
        supplied_native: U256,
        preflight: &Preflight,
        converted: &mut usize,
    ) -> Result<SettlementReceipt, SweepError> {
        let engine = self.config.engine_address;
        let mut accountant = BatchAccountant::new(
            supplied_native,
            preflight.reserved_fee(),
            preflight.deferred_index,
        )?;

        if !supplied_native.is_zero() {
            let available = ledger.balance_of(requester, Asset::Native);
            if available < supplied_native {
                return Err(FundsError::InsufficientNative {
                    supplied: supplied_native,
                    available,
                }
                .into());
            }
            ledger.transfer(requester, engine, Asset::Native, supplied_native)?;
        }

        for (index, entry) in request.entries.iter().enumerate() {
            let amount = match (entry.asset, entry.requested) {
                (Asset::Native, RequestedAmount::Remainder) => {
                    debug!("Entry {}: native remainder deferred", index);
                    continue;
                }
                (Asset::Native, RequestedAmount::Exact(amount)) => {
                    accountant.commit_native(index, amount)?;
                    amount
                }
                (Asset::Token(_), requested) => {
                    self.pull_token(ledger, requester, index, entry.asset, requested)?
                }
            };

            self.convert_entry(ledger, &mut accountant, index, entry, amount, request.deadline)?;
            *converted += 1;
        }

        if let Some(index) = accountant.deferred_index() {
            let remainder = accountant.remaining_native()?;
            if remainder.is_zero() {
                debug!("Entry {}: no native remainder left to convert", index);
            } else {
                accountant.commit_native(index, remainder)?;
                let entry = &request.entries[index];
                self.convert_entry(
                    ledger,
                    &mut accountant,
                    index,
                    entry,
                    remainder,
                    request.deadline,
                )?;
                *converted += 1;
            }
        }

        let total_output = accountant.finalize()?;

        let router = SettlementRouter::new(
            self.authority.as_ref(),
            self.bridge.as_deref(),
            engine,
            self.config.target_asset,
        );
        router.settle(ledger, requester, total_output, preflight.route.as_ref())
    }

    fn validate_shape(&self, entries: &[ValueSource]) -> Result<Option<usize>, ShapeError> {
        if entries.is_empty() {
            return Err(ShapeError::EmptyBatch);
        }
        if entries.len() > self.config.max_batch_entries {
            return Err(ShapeError::TooManyEntries {
                len: entries.len(),
                max: self.config.max_batch_entries,
            });
        }

        let target = self.config.target_asset;
        let mut deferred_index: Option<usize> = None;

        for (index, entry) in entries.iter().enumerate() {
            let (Some(first), Some(last)) = (entry.path.first(), entry.path.last()) else {
                return Err(ShapeError::PathTooShort {
                    index,
                    len: entry.path.len(),
                });
            };
            if entry.path.len() < 2 {
                return Err(ShapeError::PathTooShort {
                    index,
                    len: entry.path.len(),
                });
            }

            let expected = entry.asset.route_address(self.config.wrapped_native);
            if first != expected {
                return Err(ShapeError::PathSourceMismatch {
                    index,
                    expected,
                    actual: first,
                });
            }
            if last != target {
                return Err(ShapeError::PathTargetMismatch {
                    index,
                    expected: target,
                    actual: last,
                });
            }
            if entry.asset == Asset::Token(target) {
                return Err(ShapeError::TargetAsInput { index });
            }
            if entry.requested == RequestedAmount::Exact(U256::zero()) {
                return Err(ShapeError::ZeroAmount { index });
            }

            if entry.is_deferred() {
                if let Some(first) = deferred_index {
                    return Err(ShapeError::DuplicateDeferred {
                        first,
                        second: index,
                    });
                }
                deferred_index = Some(index);
            }
        }

        Ok(deferred_index)
    }

    fn pull_token(
        &self,
        ledger: &mut dyn Ledger,
        requester: Address,
        index: usize,
        asset: Asset,
        requested: RequestedAmount,
    ) -> Result<U256, SweepError> {
        let engine = self.config.engine_address;
        let amount = match requested {
            RequestedAmount::Exact(amount) => amount,
            RequestedAmount::Remainder => {
                let balance = ledger.balance_of(requester, asset);
                if balance.is_zero() {
                    return Err(FundsError::EmptySweep { index, asset }.into());
                }
                balance
            }
        };

        ledger
            .transfer_from(engine, requester, engine, asset, amount)
            .map_err(|source| FundsError::Pull { index, source })?;
        debug!("Entry {}: pulled {} {}", index, amount, asset);
        Ok(amount)
    }

    fn convert_entry(
        &self,
        ledger: &mut dyn Ledger,
        accountant: &mut BatchAccountant,
        index: usize,
        entry: &ValueSource,
        amount: U256,
        deadline: Option<u64>,
    ) -> Result<(), SweepError> {
        let engine = self.config.engine_address;
        let target = Asset::Token(self.config.target_asset);

        let order = ConversionOrder {
            owner: engine,
            input: entry.asset,
            amount,
            path: &entry.path,
            min_output: entry.min_output,
            deadline,
        };
        let grant = Grant {
            owner: engine,
            spender: self.exchange.address(),
            asset: entry.asset,
            amount,
        };

        let input_before = ledger.balance_of(engine, entry.asset);
        let output_before = ledger.balance_of(engine, target);

        let output = with_scoped_authorization(self.authority.as_ref(), ledger, grant, |ledger| {
            self.exchange.convert(ledger, &order)
        })
        .map_err(|source| SweepError::Conversion { index, source })?;

        if output < entry.min_output {
            return Err(SweepError::Conversion {
                index,
                source: ConversionError::SlippageExceeded {
                    min_output: entry.min_output,
                    output,
                },
            });
        }

        let consumed = input_before.saturating_sub(ledger.balance_of(engine, entry.asset));
        if consumed != amount {
            return Err(AccountingError::InputMismatch {
                index,
                expected: amount,
                consumed,
            }
            .into());
        }

        let received = ledger
            .balance_of(engine, target)
            .saturating_sub(output_before);
        if received != output {
            return Err(AccountingError::OutputMismatch {
                index,
                reported: output,
                received,
            }
            .into());
        }

        accountant.record_output(output)?;
        debug!(
            "Entry {}: converted {} {} -> {} (min: {})",
            index, amount, entry.asset, output, entry.min_output
        );
        Ok(())
    }
}
