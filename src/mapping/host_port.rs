//! `host:port` values.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid host and port '{input}': {reason}")]
pub struct HostAndPortError {
    input: String,
    reason: &'static str,
}

/// A host with an optional port.
///
/// The canonical form is `host:port`; IPv6 hosts are bracketed when a port
/// follows (`[::1]:80`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostAndPort {
    host: String,
    port: Option<u16>,
}

impl HostAndPort {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port: Some(port),
        }
    }

    pub fn host_only(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn port_or(&self, default: u16) -> u16 {
        self.port.unwrap_or(default)
    }
}

impl FromStr for HostAndPort {
    type Err = HostAndPortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let invalid = |reason| HostAndPortError {
            input: s.to_string(),
            reason,
        };

        let (host, port) = if let Some(rest) = input.strip_prefix('[') {
            let (host, after) = rest.split_once(']').ok_or_else(|| invalid("unclosed '['"))?;
            match after {
                "" => (host, None),
                _ => (
                    host,
                    Some(after.strip_prefix(':').ok_or_else(|| invalid("unexpected text after ']'"))?),
                ),
            }
        } else {
            match input.matches(':').count() {
                0 => (input, None),
                1 => match input.split_once(':') {
                    Some((host, port)) => (host, Some(port)),
                    None => (input, None),
                },
                // Bare IPv6 address without port.
                _ => (input, None),
            }
        };

        if host.is_empty() {
            return Err(invalid("empty host"));
        }
        let port = port
            .map(|p| p.parse::<u16>().map_err(|_| invalid("port is not a number in 0-65535")))
            .transpose()?;
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for HostAndPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) if self.host.contains(':') => write!(f, "[{}]:{}", self.host, port),
            Some(port) => write!(f, "{}:{}", self.host, port),
            None => f.write_str(&self.host),
        }
    }
}

impl Serialize for HostAndPort {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HostAndPort {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!("db:5432".parse::<HostAndPort>().unwrap(), HostAndPort::new("db", 5432));
        assert_eq!("db".parse::<HostAndPort>().unwrap(), HostAndPort::host_only("db"));
        assert_eq!("[::1]:80".parse::<HostAndPort>().unwrap(), HostAndPort::new("::1", 80));
        assert_eq!("[::1]".parse::<HostAndPort>().unwrap(), HostAndPort::host_only("::1"));
        assert_eq!("fe80::1".parse::<HostAndPort>().unwrap(), HostAndPort::host_only("fe80::1"));
    }

    #[test]
    fn test_invalid() {
        for input in ["", ":80", "db:", "db:70000", "[::1", "[::1]x"] {
            assert!(input.parse::<HostAndPort>().is_err(), "{input}");
        }
    }

    #[test]
    fn test_display_is_canonical() {
        for input in ["db:5432", "db", "[::1]:80", "fe80::1"] {
            assert_eq!(input.parse::<HostAndPort>().unwrap().to_string(), input);
        }
    }

    #[test]
    fn test_serde_as_string() {
        let value = serde_json::to_value(HostAndPort::new("::1", 8080)).unwrap();
        assert_eq!(value, "[::1]:8080");
        let back: HostAndPort = serde_json::from_value(value).unwrap();
        assert_eq!(back.port_or(1), 8080);
    }
}
