//! Protocol definitions for base station communication.
//!
//! This module contains the low-level protocol types including:
//! - Power command encoding for both generations
//! - GATT service and characteristic identifiers
//! - Connection parameter policy

pub mod command;
pub mod gatt;
pub mod params;

pub use command::{
    GEN1_COMMAND_LEN, GEN1_HEADER, Gen1Opcode, Gen2PowerState, Intent, Recipient, encode,
    encode_gen1, encode_gen2,
};
pub use gatt::{
    GEN1_CHARACTERISTIC, GEN1_SERVICE, GEN2_CHARACTERISTIC, GEN2_SERVICE, Generation,
    scan_services,
};
pub use params::{ConnectionParams, ParamPolicy};
