//! Automated payout eligibility and settlement for marketplace hubbers.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
