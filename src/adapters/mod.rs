//! Concrete adapter implementations for ports.

pub mod binance;
pub mod config_file;
pub mod cryptocompare;
pub mod csv_bars;
pub mod failover;
pub mod sqlite_store;
pub mod web;
