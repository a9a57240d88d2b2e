//! Engine module - scheduling and orchestration
//!
//! The adaptive concurrency governor, the FIFO admission queue, the
//! per-domain session loop and the run orchestrator.

pub mod governor;
pub mod queue;
pub mod runner;
pub mod session;

pub use governor::{ConcurrencyGovernor, ResourceProbe, ResourcePressure, SystemProbe};
pub use queue::TaskQueue;
pub use runner::{CrawlEngine, RunReport, RunSummary};
pub use session::{DomainOutcome, DomainSession};
