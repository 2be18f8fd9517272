//! Batch report and error ledger

mod aggregator;
mod ledger;

pub use aggregator::{BatchReport, ResultAggregator};
pub use ledger::{ErrorLedger, Severity};
