//! GATT identifiers of the two base station generations.

use uuid::Uuid;

/// Power service advertised by version 1 (HTC) base stations.
pub const GEN1_SERVICE: Uuid = Uuid::from_u128(0x0000_cb00_0000_1000_8000_0080_5f9b_34fb);

/// Command characteristic of the version 1 power service.
pub const GEN1_CHARACTERISTIC: Uuid = Uuid::from_u128(0x0000_cb01_0000_1000_8000_0080_5f9b_34fb);

/// Power service advertised by version 2 base stations.
pub const GEN2_SERVICE: Uuid = Uuid::from_u128(0x0000_1523_1212_efde_1523_785f_eabc_d124);

/// Power-state characteristic of the version 2 power service.
pub const GEN2_CHARACTERISTIC: Uuid = Uuid::from_u128(0x0000_1525_1212_efde_1523_785f_eabc_d124);

/// Base station protocol generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Generation {
    /// Version 1 (HTC) base stations.
    V1,
    /// Version 2 (SteamVR 2.0) base stations.
    V2,
}

impl Generation {
    /// Returns the service this generation advertises and exposes.
    #[must_use]
    pub const fn service(self) -> Uuid {
        match self {
            Self::V1 => GEN1_SERVICE,
            Self::V2 => GEN2_SERVICE,
        }
    }

    /// Returns the characteristic power commands are written to.
    #[must_use]
    pub const fn characteristic(self) -> Uuid {
        match self {
            Self::V1 => GEN1_CHARACTERISTIC,
            Self::V2 => GEN2_CHARACTERISTIC,
        }
    }

    /// Identifies the generation from an advertised service, if any.
    ///
    /// Version 1 wins when both services are advertised.
    #[must_use]
    pub fn from_services(services: &[Uuid]) -> Option<Self> {
        if services.contains(&GEN1_SERVICE) {
            Some(Self::V1)
        } else if services.contains(&GEN2_SERVICE) {
            Some(Self::V2)
        } else {
            None
        }
    }

    /// Returns the protocol number (1 or 2).
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.number())
    }
}

/// Services the scanner filters on.
#[must_use]
pub fn scan_services() -> Vec<Uuid> {
    vec![GEN1_SERVICE, GEN2_SERVICE]
}
