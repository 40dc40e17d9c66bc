//! Core domain types and logic.
//!
//! Everything in here is pure: bar series in, trades/signals out. Network
//! and storage live behind the port traits and never leak into this module.

pub mod bar;
pub mod definition;
pub mod error;
pub mod forward;
pub mod indicator;
pub mod metrics;
pub mod rule;
pub mod rule_eval;
pub mod simulator;
