use crate::config::{AuthorityKind, SweeperConfig};
use anyhow::Result;
use ethers::types::{Address, U256};
use std::sync::Arc;
use sweep_core::config::plan::parse_amount;
use sweep_core::{
    Asset, BatchProcessor, DirectApproval, FixedRateExchange, InMemoryLedger, Ledger,
    LoopbackBridge, MetricsCollector, Permit2Authority, Preflight, Rate, ResolvedPlan,
    SettlementReceipt, SpendAuthority, SweepError,
};
use tracing::info;

/// A seeded in-memory world to run batch plans against.
pub struct Simulation {
    ledger: InMemoryLedger,
    processor: BatchProcessor,
    metrics: Arc<MetricsCollector>,
    target_asset: Address,
}

impl Simulation {
    pub fn from_config(config: &SweeperConfig) -> Result<Self> {
        let engine = &config.engine;

        let mut exchange = FixedRateExchange::new(
            config.exchange.address,
            engine.target_asset,
            engine.wrapped_native,
        );
        for rate in &config.exchange.rates {
            exchange = exchange.with_rate(
                rate.from,
                rate.to,
                Rate::new(
                    parse_amount("exchange.rates.numerator", &rate.numerator)?,
                    parse_amount("exchange.rates.denominator", &rate.denominator)?,
                ),
            );
        }

        let authority: Arc<dyn SpendAuthority> = match config.authority.kind {
            AuthorityKind::Direct => Arc::new(DirectApproval),
            AuthorityKind::Permit2 => Arc::new(Permit2Authority::new(config.authority.ttl_secs)),
        };

        let metrics = Arc::new(MetricsCollector::default());
        let mut processor = BatchProcessor::new(engine.clone(), Arc::new(exchange))
            .with_authority(authority)
            .with_metrics(metrics.clone());

        if let Some(bridge) = &config.bridge {
            let min_fee = parse_amount("bridge.min_fee", &bridge.min_fee)?;
            processor = processor.with_bridge(Arc::new(
                LoopbackBridge::new(bridge.address, min_fee)
                    .with_destinations(bridge.destinations.iter().copied()),
            ));
        }

        let mut ledger = InMemoryLedger::new().with_clock(config.clock);
        ledger.mint(
            config.exchange.address,
            Asset::Token(engine.target_asset),
            parse_amount("exchange.liquidity", &config.exchange.liquidity)?,
        )?;
        for seed in &config.balances {
            ledger.mint(seed.account, seed.asset(), seed.amount()?)?;
        }
        for seed in &config.allowances {
            ledger.approve(
                seed.owner,
                seed.spender,
                Asset::Token(seed.token),
                seed.amount()?,
                None,
            )?;
        }

        info!(
            "Simulation seeded: {} balances, {} allowances, authority: {:?}",
            config.balances.len(),
            config.allowances.len(),
            config.authority.kind
        );

        Ok(Self {
            ledger,
            processor,
            metrics,
            target_asset: engine.target_asset,
        })
    }

    pub fn check(&self, plan: &ResolvedPlan) -> Result<Preflight, SweepError> {
        self.processor.preflight(&plan.request, plan.supplied_native)
    }

    pub fn run(&mut self, plan: &ResolvedPlan) -> Result<SettlementReceipt, SweepError> {
        self.processor.process(
            &mut self.ledger,
            plan.requester,
            &plan.request,
            plan.supplied_native,
        )
    }

    pub fn balance(&self, account: Address, asset: Asset) -> U256 {
        self.ledger.balance_of(account, asset)
    }

    pub fn target_balance(&self, account: Address) -> U256 {
        self.balance(account, Asset::Token(self.target_asset))
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }
}
