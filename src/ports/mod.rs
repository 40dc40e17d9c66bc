//! Port traits at the seams of the hexagon.

pub mod bar_port;
pub mod config_port;
pub mod store_port;
