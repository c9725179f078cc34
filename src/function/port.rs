//! Free local port allocation, stable per logical name.

use crate::error::{ConfigError, ConfigResult};
use std::collections::HashMap;
use std::net::{Ipv4Addr, TcpListener, UdpSocket};
use std::sync::Mutex;
use tracing::debug;

const MAX_ATTEMPTS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

/// Hands out free ports and remembers them by name.
///
/// Each protocol has its own lock held across the whole probe, so two
/// concurrent requests for different names never receive the same port.
#[derive(Debug, Default)]
pub struct PortAllocator {
    tcp: Mutex<HashMap<String, u16>>,
    udp: Mutex<HashMap<String, u16>>,
}

impl PortAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Port for `name`, probing a free one on first request.
    pub fn allocate(&self, protocol: Protocol, name: &str) -> ConfigResult<u16> {
        let space = match protocol {
            Protocol::Tcp => &self.tcp,
            Protocol::Udp => &self.udp,
        };
        let mut assigned = space.lock().map_err(|_| {
            ConfigError::evaluation(expression(protocol, name), "port allocator lock poisoned")
        })?;
        if let Some(port) = assigned.get(name) {
            return Ok(*port);
        }

        for _ in 0..MAX_ATTEMPTS {
            let port = probe(protocol)
                .map_err(|e| ConfigError::evaluation(expression(protocol, name), e.to_string()))?;
            if assigned.values().any(|p| *p == port) {
                continue;
            }
            debug!(protocol = protocol.as_str(), name = %name, port, "Allocated port");
            assigned.insert(name.to_string(), port);
            return Ok(port);
        }
        Err(ConfigError::evaluation(
            expression(protocol, name),
            "no free port found",
        ))
    }

    /// Port already assigned to `name`, if any.
    pub fn assigned(&self, protocol: Protocol, name: &str) -> Option<u16> {
        let space = match protocol {
            Protocol::Tcp => &self.tcp,
            Protocol::Udp => &self.udp,
        };
        space.lock().ok()?.get(name).copied()
    }
}

fn expression(protocol: Protocol, name: &str) -> String {
    match protocol {
        Protocol::Tcp => format!("availableTcpPort({})", name),
        Protocol::Udp => format!("availableUdpPort({})", name),
    }
}

/// Ask the OS for an ephemeral port and release it.
fn probe(protocol: Protocol) -> std::io::Result<u16> {
    let addr = (Ipv4Addr::LOCALHOST, 0);
    match protocol {
        Protocol::Tcp => Ok(TcpListener::bind(addr)?.local_addr()?.port()),
        Protocol::Udp => Ok(UdpSocket::bind(addr)?.local_addr()?.port()),
    }
}
