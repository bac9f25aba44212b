//! # Sweep Core - Batch Dust Conversion and Settlement
//!
//! This crate converts many small balances ("dust") into a single target
//! asset in one atomic batch and settles the result locally or through a
//! cross-chain bridge.
//!
//! ## Modules
//!
//! - [`accountant`] - Native value bookkeeping and conservation checks
//! - [`authorization`] - Scoped, always-revoked spend rights
//! - [`config`] - Engine configuration and JSON batch plans
//! - [`error`] - Typed error handling with thiserror
//! - [`metrics`] - Batch outcome and timing metrics
//! - [`processor`] - Batch validation and execution
//! - [`request`] - Batch requests, bridge parameters and receipts
//! - [`settlement`] - Direct and bridged settlement
//! - [`source`] - Assets, amounts and conversion paths
//! - [`templates`] - Reference ledger, exchange and bridge adapters
//! - [`traits`] - Ledger and adapter seams

pub mod accountant;
pub mod authorization;
pub mod config;
pub mod error;
pub mod metrics;
pub mod processor;
pub mod request;
pub mod settlement;
pub mod source;
pub mod templates;
pub mod traits;
pub(crate) mod utils;

pub use accountant::BatchAccountant;
pub use authorization::{with_scoped_authorization, DirectApproval, Grant, Permit2Authority};
pub use config::{
    BatchPlan, EngineConfig, JsonPlanFile, PlanBridge, PlanEntry, PlanKind, ResolvedPlan,
    MAX_BATCH_ENTRIES,
};
pub use error::{
    AccountingError, BridgeError, BridgeParamError, ConfigError, ConversionError, FundsError,
    LedgerError, ShapeError, SweepError,
};
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use processor::{BatchProcessor, Preflight};
pub use request::{BatchRequest, BridgeParams, BridgeRoute, SettlementReceipt};
pub use settlement::SettlementRouter;
pub use source::{Asset, ConversionPath, RequestedAmount, ValueSource};
pub use templates::{FixedRateExchange, InMemoryLedger, LoopbackBridge, Rate};
pub use traits::{
    BridgeAdapter, BridgeTransfer, Checkpoint, ConversionOrder, ExchangeAdapter, Ledger,
    PlanLoader, SpendAuthority,
};

pub use utils::setup_logger;
