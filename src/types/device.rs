//! Advertisements and discovered base stations.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::protocol::Generation;

/// Length of a link-layer address in bytes.
pub const ADDRESS_LEN: usize = 6;

/// A 48-bit link-layer address, most significant byte first.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceAddress([u8; ADDRESS_LEN]);

impl DeviceAddress {
    /// Creates an address from its bytes.
    #[must_use]
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the address bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl FromStr for DeviceAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidAddress {
            value: s.to_string(),
        };

        let octets: Vec<&str> = s.trim().split([':', '-']).collect();
        if octets.len() != ADDRESS_LEN {
            return Err(invalid());
        }

        let mut bytes = [0u8; ADDRESS_LEN];
        for (byte, octet) in bytes.iter_mut().zip(octets) {
            hex::decode_to_slice(octet, std::slice::from_mut(byte)).map_err(|_| invalid())?;
        }
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for DeviceAddress {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DeviceAddress> for String {
    fn from(address: DeviceAddress) -> Self {
        address.to_string()
    }
}

impl std::fmt::Debug for DeviceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeviceAddress({self})")
    }
}

impl std::fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// One advertisement observed during a scan.
#[derive(Debug, Clone)]
pub struct Advertisement<H> {
    /// Backend handle used to open a link to the advertiser.
    pub handle: H,
    /// Link-layer address.
    pub address: DeviceAddress,
    /// Advertised local name, if present.
    pub name: Option<String>,
    /// Advertised service identifiers.
    pub services: Vec<Uuid>,
    /// Signal strength, if reported.
    pub rssi: Option<i16>,
}

impl<H> Advertisement<H> {
    /// Returns the base station generation this advertisement announces.
    #[must_use]
    pub fn generation(&self) -> Option<Generation> {
        Generation::from_services(&self.services)
    }
}

/// Generation-specific part of a discovered base station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// Version 1 base station resolved to a registry index.
    Gen1 { identity: usize },
    /// Version 2 base station; never carries an identity.
    Gen2,
}

impl DeviceKind {
    /// Returns the protocol generation.
    #[must_use]
    pub const fn generation(self) -> Generation {
        match self {
            Self::Gen1 { .. } => Generation::V1,
            Self::Gen2 => Generation::V2,
        }
    }

    /// Returns the identity index for version 1 base stations.
    #[must_use]
    pub const fn identity(self) -> Option<usize> {
        match self {
            Self::Gen1 { identity } => Some(identity),
            Self::Gen2 => None,
        }
    }
}

/// A base station found during one scan.
///
/// Lives for one scan and dispatch cycle only.
#[derive(Debug, Clone)]
pub struct DiscoveredDevice<H> {
    /// Backend handle.
    pub handle: H,
    /// Link-layer address.
    pub address: DeviceAddress,
    /// Generation and identity.
    pub kind: DeviceKind,
    /// Advertised name, kept for logging.
    pub name: Option<String>,
}

impl<H> DiscoveredDevice<H> {
    /// Returns the protocol generation.
    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.kind.generation()
    }

    /// Returns the identity index for version 1 base stations.
    #[must_use]
    pub const fn identity(&self) -> Option<usize> {
        self.kind.identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse_and_display() {
        let address: DeviceAddress = "d3:ea:e4:a4:58:df".parse().unwrap();
        assert_eq!(address.as_bytes(), &[0xD3, 0xEA, 0xE4, 0xA4, 0x58, 0xDF]);
        assert_eq!(address.to_string(), "D3:EA:E4:A4:58:DF");

        let dashed: DeviceAddress = "D3-EA-E4-A4-58-DF".parse().unwrap();
        assert_eq!(dashed, address);
    }

    #[test]
    fn test_address_parse_rejects_bad_input() {
        assert!("D3:EA:E4:A4:58".parse::<DeviceAddress>().is_err());
        assert!("D3:EA:E4:A4:58:DF:00".parse::<DeviceAddress>().is_err());
        assert!("D3:EA:E4:A4:58:G0".parse::<DeviceAddress>().is_err());
        assert!("D3:EA:E4:A4:58:D".parse::<DeviceAddress>().is_err());
    }

    #[test]
    fn test_device_kind() {
        let gen1 = DeviceKind::Gen1 { identity: 3 };
        assert_eq!(gen1.generation(), Generation::V1);
        assert_eq!(gen1.identity(), Some(3));
        assert_eq!(DeviceKind::Gen2.generation(), Generation::V2);
        assert_eq!(DeviceKind::Gen2.identity(), None);
    }
}
