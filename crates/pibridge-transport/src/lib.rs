//! Raw byte channel beneath the piBridge transaction core.
//!
//! The bridge medium is a half-duplex serial line shared by every module on
//! the bus. This crate only moves bytes:
//! - [`SerialPort`] drives the RS-485 line through the `serialport` crate
//! - [`memory::link`] connects a controller to a simulated module in memory
//!
//! Framing, correlation and timeouts live one layer up. Everything there is
//! written against the [`Transport`] trait provided here.

pub mod error;
pub mod memory;
pub mod queue;
pub mod serial;
pub mod traits;

/// Line speed of the piBridge segment on RevPi base modules.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

pub use error::{Result, TransportError};
pub use memory::{link, MemoryDevice, MemoryTransport};
pub use queue::ReceiveQueue;
pub use serial::SerialPort;
pub use traits::Transport;
