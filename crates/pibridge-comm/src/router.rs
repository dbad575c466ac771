use std::time::Duration;

use bytes::Bytes;
use pibridge_frame::{Domain, Frame, FrameError};

use crate::config::{AddressRange, BridgeConfig};
use crate::error::{BridgeError, Result};

/// Who a call is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// I/O expansion module on the local bus.
    LocalIo { address: u8 },
    /// Module reached through a gateway destination.
    Gateway { destination: u8 },
}

impl Target {
    /// Addressing domain of the target.
    pub fn domain(&self) -> Domain {
        match self {
            Target::LocalIo { .. } => Domain::LocalIo,
            Target::Gateway { .. } => Domain::Gateway,
        }
    }

    /// Address (local I/O) or destination (gateway) byte.
    pub fn address(&self) -> u8 {
        match *self {
            Target::LocalIo { address } => address,
            Target::Gateway { destination } => destination,
        }
    }
}

/// A call that passed routing: addressing and deadline are settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub domain: Domain,
    pub address: u8,
    pub command: u16,
    pub timeout: Duration,
}

impl Route {
    /// Build the request frame for this route.
    pub fn frame(&self, payload: &[u8]) -> Frame {
        Frame::new(
            self.domain,
            self.address,
            self.command,
            Bytes::copy_from_slice(payload),
        )
    }
}

/// Picks domain parameters for a call and rejects bad addresses before
/// anything touches the bus.
#[derive(Debug, Clone)]
pub struct Router {
    io_addresses: AddressRange,
    gate_addresses: AddressRange,
    io_timeout: Duration,
    gate_timeout: Duration,
}

impl Router {
    /// Create a router from bridge configuration.
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            io_addresses: config.io_addresses,
            gate_addresses: config.gate_addresses,
            io_timeout: config.io_timeout(),
            gate_timeout: config.gate_timeout(),
        }
    }

    /// Response timeout used when the caller does not supply one.
    pub fn default_timeout(&self, domain: Domain) -> Duration {
        match domain {
            Domain::LocalIo => self.io_timeout,
            Domain::Gateway => self.gate_timeout,
        }
    }

    /// Valid addresses for `domain`.
    pub fn address_range(&self, domain: Domain) -> AddressRange {
        match domain {
            Domain::LocalIo => self.io_addresses,
            Domain::Gateway => self.gate_addresses,
        }
    }

    /// Resolve a call into a [`Route`].
    pub fn route(&self, target: Target, command: u16, timeout: Option<Duration>) -> Result<Route> {
        let domain = target.domain();
        let address = target.address();

        let range = self.address_range(domain);
        if !range.contains(address) {
            return Err(BridgeError::InvalidAddress {
                domain,
                address,
                first: range.first,
                last: range.last,
            });
        }

        let max = domain.max_command();
        if command > max {
            return Err(BridgeError::Encoding(FrameError::CommandOutOfRange {
                domain,
                command,
                max,
            }));
        }

        let timeout = match timeout {
            Some(timeout) if timeout.is_zero() => return Err(BridgeError::InvalidTimeout),
            Some(timeout) => timeout,
            None => self.default_timeout(domain),
        };

        Ok(Route {
            domain,
            address,
            command,
            timeout,
        })
    }
}
