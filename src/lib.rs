//! # lighthouse
//!
//! A Rust library that switches `SteamVR` base stations on and off over
//! Bluetooth LE.
//!
//! Both base station generations are supported behind one interface:
//! version 1 units are matched against configured identities and addressed
//! by their full identifier, version 2 units take a single power byte.
//!
//! ## Features
//!
//! - Async/await based API using Tokio
//! - Time-boxed discovery with per-identity targeting
//! - Bounded connection retry and per-device outcomes
//! - Event-driven reporting for status lights and publishers
//! - TOML configuration
//!
//! ## Quick Start
//!
//! ```no_run
//! use lighthouse::{Controller, ControllerConfig, Intent, Target};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), lighthouse::Error> {
//!     let config = ControllerConfig::load("lighthouse.toml").await?;
//!     let controller = Controller::bluetooth(&config).await?;
//!
//!     // Wake every base station in range
//!     let outcome = controller.run(Intent::Wake, Target::All).await?;
//!     for device in &outcome.outcomes {
//!         println!("{} {:?}", device.address, device.stage);
//!     }
//!
//!     // Put the first configured one to sleep
//!     controller.run(Intent::Sleep, Target::Specific(0)).await?.check()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`protocol`] - Command encoding, GATT identifiers, connection parameters
//! - [`types`] - Identities, discovered devices and outcomes
//! - [`transport`] - Radio abstraction and the `btleplug` backend
//! - [`discovery`] - Scan window and identity matching
//! - [`connection`] - Link establishment with bounded retry
//! - [`dispatch`] - The scan, connect, write pipeline
//! - [`state`] - Run state and last-known status
//! - [`event`] - Async event system
//! - [`client`] - High-level [`Controller`]
//! - [`config`] - TOML configuration
//! - [`trigger`] - HTTP, messaging and button request parsing
//! - [`indicator`] - Status light blink patterns

pub mod client;
pub mod config;
pub mod connection;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod indicator;
pub mod protocol;
pub mod state;
pub mod transport;
pub mod trigger;
pub mod types;

// Re-exports for convenience
pub use client::{Controller, CycleHandle, Response};
pub use config::{ControllerConfig, MqttConfig, RetryConfig};
pub use connection::{ConnectionManager, RetryPolicy};
pub use discovery::{DiscoverySession, Gen2Filter, Observation, ScanState};
pub use dispatch::{CommandDispatcher, DispatchSettings};
pub use error::{DeviceError, Error, Result};
pub use event::{Event, EventDispatcher, EventFilter, EventKind, Subscription};
pub use indicator::{BlinkPattern, Indicator};
pub use protocol::{ConnectionParams, Generation, Intent, ParamPolicy, Recipient, encode};
pub use state::{IdentityStatus, Phase, RunState, StatusBoard};
pub use transport::{BtleLink, BtleRadio, Link, LinkOptions, Radio};
pub use trigger::{Button, Request, Topics, parse_http};
pub use types::{
    Advertisement, AggregateOutcome, DeviceAddress, DeviceKind, DiscoveredDevice,
    DispatchOutcome, FullId, Identity, IdentityRegistry, PowerStatus, Stage, Target,
};
