//! Monitoring engine: reachability probing, the status transition state
//! machine, and the check loop that drives both.

pub mod prober;
pub mod runner;
pub mod state;
pub mod types;
pub mod validation;

pub use prober::{Probe, Prober};
pub use runner::{CheckRunner, ReportError};
pub use state::{AlertPolicy, transition};
