//! request timing for the benchmark client
//!
//! a fixed-capacity ledger of per-request issue/completion instants and a
//! log-bucketed histogram used to summarise the completed latencies.

pub mod histogram;
pub mod ledger;

pub use histogram::{Histogram, LatencySummary};
pub use ledger::{Entry, TimingLedger};
