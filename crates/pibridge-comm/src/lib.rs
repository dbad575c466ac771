//! Request/response transaction core for the piBridge fieldbus.
//!
//! Layers, bottom up:
//! - [`rx::ReceiveBuffer`]: pending-byte reads and input clearing
//! - [`router::Router`]: address checks and per-domain timeouts
//! - [`guard::BusGuard`]: FIFO exclusive access to the medium
//! - [`transaction::Transaction`]: one request and its correlated reply
//! - [`PiBridge`]: the blocking, thread-safe call surface
//!
//! ```no_run
//! use pibridge_comm::{BridgeConfig, PiBridge};
//!
//! # fn main() -> pibridge_comm::Result<()> {
//! let config = BridgeConfig::default();
//! let bridge = PiBridge::open_serial(&config.serial.clone(), config)?;
//! let mut reply = [0u8; 32];
//! let len = bridge.req_io(31, 0x01, &[], &mut reply)?;
//! println!("{:02x?}", &reply[..len]);
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod guard;
pub mod router;
pub mod rx;
pub mod stats;
pub mod transaction;

#[cfg(feature = "async")]
pub mod async_bridge;

pub use bridge::{BusSession, PiBridge};
pub use config::{
    AddressRange, BridgeConfig, SerialConfig, DEFAULT_DEVICE, DEFAULT_GATE_TIMEOUT,
    DEFAULT_IO_TIMEOUT,
};
pub use error::{BridgeError, Result};
pub use guard::{BusGuard, BusPermit};
pub use router::{Route, Router, Target};
pub use rx::{ReceiveBuffer, RxError};
pub use stats::{BridgeStats, StatsSnapshot};
pub use transaction::{Response, Transaction, TransactionState};

#[cfg(feature = "async")]
pub use async_bridge::AsyncPiBridge;
