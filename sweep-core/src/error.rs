//! # Sweep Error Types
//!
//! Centralized error definitions for the sweep-core crate.
//! Every failure aborts the whole batch; the variants only say where and why.

use crate::source::Asset;
use ethers::types::{Address, U256};
use thiserror::Error;

/// Unified error type returned by batch processing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SweepError {
    #[error(transparent)]
    Shape(ShapeError),

    #[error(transparent)]
    Funds(FundsError),

    #[error("Conversion failed for entry {index}: {source}")]
    Conversion {
        index: usize,
        #[source]
        source: ConversionError,
    },

    #[error(transparent)]
    BridgeParam(BridgeParamError),

    #[error("Bridge transfer failed: {0}")]
    Bridge(BridgeError),

    #[error(transparent)]
    Accounting(AccountingError),

    #[error("Ledger error: {0}")]
    Ledger(LedgerError),
}

impl SweepError {
    /// Index of the entry that caused the failure, when there is one.
    pub fn entry_index(&self) -> Option<usize> {
        match self {
            SweepError::Conversion { index, .. } => Some(*index),
            SweepError::Funds(FundsError::EmptySweep { index, .. })
            | SweepError::Funds(FundsError::Pull { index, .. }) => Some(*index),
            SweepError::Accounting(AccountingError::OutputMismatch { index, .. })
            | SweepError::Accounting(AccountingError::InputMismatch { index, .. })
            | SweepError::Accounting(AccountingError::NativeOverCommitted { index, .. }) => {
                Some(*index)
            }
            SweepError::Shape(e) => e.entry_index(),
            _ => None,
        }
    }
}

impl From<ShapeError> for SweepError {
    fn from(e: ShapeError) -> Self {
        SweepError::Shape(e)
    }
}

impl From<FundsError> for SweepError {
    fn from(e: FundsError) -> Self {
        SweepError::Funds(e)
    }
}

impl From<BridgeParamError> for SweepError {
    fn from(e: BridgeParamError) -> Self {
        SweepError::BridgeParam(e)
    }
}

impl From<BridgeError> for SweepError {
    fn from(e: BridgeError) -> Self {
        SweepError::Bridge(e)
    }
}

impl From<AccountingError> for SweepError {
    fn from(e: AccountingError) -> Self {
        SweepError::Accounting(e)
    }
}

impl From<LedgerError> for SweepError {
    fn from(e: LedgerError) -> Self {
        SweepError::Ledger(e)
    }
}

/// Malformed batch; always raised before any funds move.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("Batch contains no entries")]
    EmptyBatch,

    #[error("Batch has {len} entries (max: {max})")]
    TooManyEntries { len: usize, max: usize },

    #[error("Length mismatch for '{field}': expected {expected}, got {actual}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Entry {index}: conversion path has {len} hops, need at least 2")]
    PathTooShort { index: usize, len: usize },

    #[error("Entry {index}: path starts at {actual:?}, expected {expected:?}")]
    PathSourceMismatch {
        index: usize,
        expected: Address,
        actual: Address,
    },

    #[error("Entry {index}: path ends at {actual:?}, expected target {expected:?}")]
    PathTargetMismatch {
        index: usize,
        expected: Address,
        actual: Address,
    },

    #[error("Entry {index}: explicit amount must be non-zero")]
    ZeroAmount { index: usize },

    #[error("Entry {index}: target asset cannot be swept into itself")]
    TargetAsInput { index: usize },

    #[error("Entries {first} and {second} both resolve the native remainder")]
    DuplicateDeferred { first: usize, second: usize },
}

impl ShapeError {
    pub fn entry_index(&self) -> Option<usize> {
        match self {
            ShapeError::PathTooShort { index, .. }
            | ShapeError::PathSourceMismatch { index, .. }
            | ShapeError::PathTargetMismatch { index, .. }
            | ShapeError::ZeroAmount { index }
            | ShapeError::TargetAsInput { index } => Some(*index),
            ShapeError::DuplicateDeferred { second, .. } => Some(*second),
            _ => None,
        }
    }
}

/// Caller funds could not be taken into engine custody.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FundsError {
    #[error("Requester cannot supply {supplied} native (balance: {available})")]
    InsufficientNative { supplied: U256, available: U256 },

    #[error("Entry {index}: nothing to sweep, {asset} balance is zero")]
    EmptySweep { index: usize, asset: Asset },

    #[error("Entry {index}: failed to pull funds: {source}")]
    Pull {
        index: usize,
        #[source]
        source: LedgerError,
    },
}

/// Failures reported by an exchange adapter (or detected on its output).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("Slippage exceeded: output {output} below minimum {min_output}")]
    SlippageExceeded { min_output: U256, output: U256 },

    #[error("Invalid route: {reason}")]
    RouteInvalid { reason: String },

    #[error("Insufficient liquidity: need {required}, pool holds {available}")]
    InsufficientLiquidity { required: U256, available: U256 },

    #[error("Deadline {deadline} passed (now: {now})")]
    DeadlineExpired { deadline: u64, now: u64 },

    #[error(transparent)]
    Ledger(LedgerError),
}

impl From<LedgerError> for ConversionError {
    fn from(e: LedgerError) -> Self {
        ConversionError::Ledger(e)
    }
}

/// Bridge parameters that cannot describe a settlement.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeParamError {
    #[error(
        "Bridge params partially specified (destination: {destination_set}, recipient: {recipient_set}, fee: {fee_set})"
    )]
    PartiallySpecified {
        destination_set: bool,
        recipient_set: bool,
        fee_set: bool,
    },

    #[error("Bridging requested but no bridge adapter is configured")]
    NoBridgeConfigured,
}

/// Failures reported by a bridge adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Bridge fee too low: need {required}, got {provided}")]
    FeeTooLow { required: U256, provided: U256 },

    #[error("Unsupported destination {destination_id}")]
    InvalidDestination { destination_id: u16 },

    #[error(transparent)]
    Ledger(LedgerError),
}

impl From<LedgerError> for BridgeError {
    fn from(e: LedgerError) -> Self {
        BridgeError::Ledger(e)
    }
}

/// Defect detection: native value or output that does not add up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountingError {
    #[error("Entry {index}: native over-committed, requested {requested}, remaining {remaining}")]
    NativeOverCommitted {
        index: usize,
        requested: U256,
        remaining: U256,
    },

    #[error("Bridge fee {fee} exceeds supplied native {supplied}")]
    FeeExceedsSupply { fee: U256, supplied: U256 },

    #[error(
        "Conservation mismatch: supplied {supplied}, consumed {consumed}, fee {fee}, unaccounted {unaccounted}"
    )]
    ConservationMismatch {
        supplied: U256,
        consumed: U256,
        fee: U256,
        unaccounted: U256,
    },

    #[error("Entry {index}: adapter reported {reported} but engine received {received}")]
    OutputMismatch {
        index: usize,
        reported: U256,
        received: U256,
    },

    #[error("Entry {index}: adapter consumed {consumed} of {expected} input")]
    InputMismatch {
        index: usize,
        expected: U256,
        consumed: U256,
    },

    #[error("Arithmetic overflow while accumulating {what}")]
    Overflow { what: &'static str },

    #[error("Native committed {consumed} exceeds the {available} available after the fee")]
    NativeUnderflow { consumed: U256, available: U256 },
}

/// Balance and allowance ledger errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient {asset} balance for {account:?}: need {required}, have {available}")]
    InsufficientBalance {
        account: Address,
        asset: Asset,
        required: U256,
        available: U256,
    },

    #[error(
        "Insufficient {asset} allowance from {owner:?} to {spender:?}: need {required}, have {available}"
    )]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        asset: Asset,
        required: U256,
        available: U256,
    },

    #[error("Authorization from {owner:?} to {spender:?} expired at {expired_at}")]
    AuthorizationExpired {
        owner: Address,
        spender: Address,
        expired_at: u64,
    },

    #[error("Balance overflow for {account:?}")]
    Overflow { account: Address },

    #[error("Permit nonces exhausted from {owner:?} to {spender:?}")]
    NonceExhausted { owner: Address, spender: Address },
}

/// Configuration and plan-file errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: '{field}'")]
    MissingField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("I/O error reading {path}: {msg}")]
    IoError { path: String, msg: String },
}
