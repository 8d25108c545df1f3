//! Robots.txt handling module
//!
//! This module provides the politeness gate: fetching, parsing and caching
//! robots.txt files per domain, and persisting the URLs they disallow.

mod cache;
mod disk;
mod gate;
mod ledger;
mod parser;

pub use cache::CachedRobots;
pub use disk::RobotsDiskCache;
pub use gate::{GateSettings, PolitenessGate};
pub use ledger::{DenialLedger, LedgerError};
pub use parser::ParsedRobots;
