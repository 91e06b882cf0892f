//! Hardware adapters implementing the port traits over `embedded-hal`
//! pins.

pub mod indicator;
pub mod relay;

pub use indicator::FaultLed;
pub use relay::RelayBank;
