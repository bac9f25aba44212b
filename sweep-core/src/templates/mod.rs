//! # Reference Implementations
//!
//! In-process implementations of the [`crate::traits`] seams. They back the
//! simulator and the test suite, and serve as templates when wiring the
//! engine to a real exchange, bridge or ledger.

pub mod fixed_rate;
pub mod loopback_bridge;
pub mod memory_ledger;

pub use fixed_rate::{FixedRateExchange, Rate};
pub use loopback_bridge::LoopbackBridge;
pub use memory_ledger::{Allowance, InMemoryLedger};
