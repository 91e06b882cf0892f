//! Application layer: port traits, outbound events, and the service that
//! ties the control core together.

pub mod events;
pub mod ports;
pub mod service;
