//! Agentic job search automation: application lifecycle tracking, follow-up
//! cadence, and interview scheduling over pluggable external gateways.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
