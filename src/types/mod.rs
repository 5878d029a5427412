//! Data types for base station control.
//!
//! This module contains the core data structures used throughout the library:
//! - Identities and the registry that resolves advertised names
//! - Advertisements and discovered devices
//! - Dispatch outcomes and last-known power status

pub mod device;
pub mod identity;
pub mod outcome;

pub use device::{Advertisement, DeviceAddress, DeviceKind, DiscoveredDevice};
pub use identity::{FullId, Identity, IdentityRegistry, MAX_NAME_LEN, Target, truncate_name};
pub use outcome::{AggregateOutcome, DispatchOutcome, PowerStatus, Stage};
