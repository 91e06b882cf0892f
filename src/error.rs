//! Unified error types for the PDU control core.
//!
//! A single `Error` enum that every subsystem can convert into, keeping
//! the control loop's error handling uniform. All variants are `Copy` so
//! they can be cheaply passed around without allocation. Nothing in this
//! core is fatal: every error is reported synchronously to the caller and
//! leaves no state half-mutated.

use core::fmt;

/// Every fallible operation in the control core funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A port index outside `0..PORT_COUNT` was requested.
    InvalidPort,
    /// A requested setting is outside its valid range.
    /// The `&'static str` names the field and its range.
    ConfigRange(&'static str),
    /// A power cycle was requested while one is already outstanding.
    CycleInProgress,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPort => write!(f, "invalid port index"),
            Self::ConfigRange(msg) => write!(f, "setting out of range: {msg}"),
            Self::CycleInProgress => write!(f, "a power cycle is already in progress"),
        }
    }
}

impl std::error::Error for Error {}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
