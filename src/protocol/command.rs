//! Power command encoding for both base station generations.
//!
//! Version 1 (HTC) base stations take a fixed 20-byte command:
//! ```text
//! ┌────────┬────────┬──────────────┬────────────────┬──────────────┐
//! │  0x12  │ opcode │ timeout (BE) │ full id (LE)   │ zero padding │
//! │ 1 byte │ 1 byte │   2 bytes    │    4 bytes     │   12 bytes   │
//! └────────┴────────┴──────────────┴────────────────┴──────────────┘
//! ```
//!
//! Version 2 base stations take a single power-state byte and are addressed
//! at the link layer only.

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::gatt::Generation;
use crate::types::FullId;

/// Header byte of every version 1 command.
pub const GEN1_HEADER: u8 = 0x12;

/// Size of a version 1 command.
pub const GEN1_COMMAND_LEN: usize = 20;

/// Timeout field value sent with a version 1 sleep command (seconds).
pub const GEN1_SLEEP_TIMEOUT: u16 = 1;

/// The operator's intent for a dispatch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// Power the base station up.
    Wake,
    /// Put the base station to sleep.
    Sleep,
}

impl Intent {
    /// Returns the lowercase verb used by the trigger surfaces (`on` / `off`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Wake => "on",
            Self::Sleep => "off",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wake => f.write_str("wake"),
            Self::Sleep => f.write_str("sleep"),
        }
    }
}

/// Version 1 command opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Gen1Opcode {
    /// Wake up and stay on.
    Wake = 0x00,
    /// Go to sleep after the timeout.
    Sleep = 0x02,
}

impl From<Gen1Opcode> for u8 {
    fn from(op: Gen1Opcode) -> Self {
        op as Self
    }
}

impl From<Intent> for Gen1Opcode {
    fn from(intent: Intent) -> Self {
        match intent {
            Intent::Wake => Self::Wake,
            Intent::Sleep => Self::Sleep,
        }
    }
}

/// Version 2 power-state values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Gen2PowerState {
    /// Standby.
    Sleep = 0x00,
    /// Powered on.
    Wake = 0x01,
}

impl From<Intent> for Gen2PowerState {
    fn from(intent: Intent) -> Self {
        match intent {
            Intent::Wake => Self::Wake,
            Intent::Sleep => Self::Sleep,
        }
    }
}

/// Who a command is encoded for.
///
/// Version 1 commands carry the configured full identifier; version 2
/// commands carry no identity at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recipient {
    /// A version 1 base station with its configured identifier.
    Gen1(FullId),
    /// A version 2 base station.
    Gen2,
}

impl Recipient {
    /// Returns the protocol generation of this recipient.
    #[must_use]
    pub const fn generation(&self) -> Generation {
        match self {
            Self::Gen1(_) => Generation::V1,
            Self::Gen2 => Generation::V2,
        }
    }
}

/// Encodes the power command for a recipient.
#[must_use]
pub fn encode(intent: Intent, recipient: Recipient) -> Bytes {
    match recipient {
        Recipient::Gen1(id) => encode_gen1(intent, id),
        Recipient::Gen2 => encode_gen2(intent),
    }
}

/// Builds the 20-byte version 1 command.
#[must_use]
pub fn encode_gen1(intent: Intent, id: FullId) -> Bytes {
    let timeout = match intent {
        Intent::Wake => 0,
        Intent::Sleep => GEN1_SLEEP_TIMEOUT,
    };

    let mut buf = BytesMut::with_capacity(GEN1_COMMAND_LEN);
    buf.put_u8(GEN1_HEADER);
    buf.put_u8(Gen1Opcode::from(intent).into());
    buf.put_u16(timeout);
    buf.put_u32_le(id.value());
    buf.put_bytes(0, GEN1_COMMAND_LEN - buf.len());
    buf.freeze()
}

/// Builds the single-byte version 2 command.
#[must_use]
pub fn encode_gen2(intent: Intent) -> Bytes {
    Bytes::copy_from_slice(&[Gen2PowerState::from(intent) as u8])
}
