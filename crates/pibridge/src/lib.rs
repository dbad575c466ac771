//! Transaction core for the piBridge fieldbus.
//!
//! piBridge connects a controller to the I/O expansion and gateway modules
//! on one shared, half-duplex serial segment. This crate turns that segment
//! into blocking request/response calls that any number of threads can make
//! at once.
//!
//! # Crate Structure
//!
//! - [`transport`]: Raw byte channels (serial tty, in-memory link)
//! - [`frame`]: Local I/O and gateway frame codec
//! - [`comm`]: Router, bus guard, transactions and the [`PiBridge`] facade
//!
//! ```no_run
//! use pibridge::{BridgeConfig, PiBridge};
//!
//! # fn main() -> pibridge::comm::Result<()> {
//! let config = BridgeConfig::default();
//! let bridge = PiBridge::open_serial(&config.serial.clone(), config)?;
//! let mut reply = [0u8; 16];
//! let len = bridge.req_gate(0x20, 0x0301, &[], &mut reply)?;
//! println!("{:02x?}", &reply[..len]);
//! # Ok(())
//! # }
//! ```

/// Re-export transport types.
pub mod transport {
    pub use pibridge_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use pibridge_frame::*;
}

/// Re-export transaction core types.
pub mod comm {
    pub use pibridge_comm::*;
}

pub use pibridge_comm::{BridgeConfig, BridgeError, PiBridge, Target};

#[cfg(feature = "async")]
pub use pibridge_comm::AsyncPiBridge;
