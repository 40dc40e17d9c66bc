//! stratlab — RSI strategy backtester and forward signal engine.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], request orchestration in [`runner`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod runner;
pub mod cli;
