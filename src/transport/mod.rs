//! Radio layer for base station communication.
//!
//! This module provides the abstraction over the Bluetooth LE central.
//! [`Radio`] covers the adapter (scanning, opening links) and [`Link`]
//! covers one peer (connecting, GATT discovery, writes). The production
//! backend is [`BtleRadio`], built on `btleplug`.

pub mod btle;
#[cfg(test)]
pub(crate) mod mock;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{Error, Result, millis};
use crate::protocol::{ConnectionParams, ParamPolicy};
use crate::types::{Advertisement, DeviceAddress};

/// Capacity of the advertisement channel handed out by [`Radio::start_scan`].
pub const SCAN_CHANNEL_CAPACITY: usize = 64;

/// Boxed future returned by the radio traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Runs one radio operation, failing with [`Error::Timeout`] after `timeout`.
pub(crate) async fn bounded<T, F>(timeout: Duration, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        result = operation => result,
        () = tokio::time::sleep(timeout) => Err(Error::Timeout {
            timeout_ms: millis(timeout),
        }),
    }
}

/// A characteristic found during GATT discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GattCharacteristic {
    /// Characteristic identifier.
    pub uuid: Uuid,
    /// True if the characteristic accepts acknowledged writes.
    pub writable: bool,
}

/// A service found during GATT discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    /// Service identifier.
    pub uuid: Uuid,
    /// Characteristics of the service.
    pub characteristics: Vec<GattCharacteristic>,
}

impl GattService {
    /// Looks up a characteristic by identifier.
    #[must_use]
    pub fn characteristic(&self, uuid: Uuid) -> Option<&GattCharacteristic> {
        self.characteristics.iter().find(|c| c.uuid == uuid)
    }
}

/// Options applied when a link is opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkOptions {
    /// Parameters requested on connect.
    pub params: ConnectionParams,
    /// Bounds for peer renegotiation requests.
    pub policy: ParamPolicy,
}

/// Trait for the adapter side of the radio.
pub trait Radio: Send + Sync {
    /// Opaque reference to an advertiser.
    type Handle: Clone + Send + Sync + std::fmt::Debug + 'static;

    /// Link type produced by [`Radio::open_link`].
    type Link: Link + 'static;

    /// Starts scanning for advertisers of the given services.
    ///
    /// Advertisements are delivered on the returned channel until
    /// [`Radio::stop_scan`] is called.
    fn start_scan(
        &self,
        services: Vec<Uuid>,
    ) -> BoxFuture<'_, Result<mpsc::Receiver<Advertisement<Self::Handle>>>>;

    /// Stops scanning.
    fn stop_scan(&self) -> BoxFuture<'_, Result<()>>;

    /// Creates a link to an advertiser without connecting it.
    fn open_link(
        &self,
        handle: Self::Handle,
        options: LinkOptions,
    ) -> BoxFuture<'_, Result<Self::Link>>;
}

/// Trait for one radio link to a peer.
pub trait Link: Send + Sync {
    /// Returns the peer address.
    fn address(&self) -> DeviceAddress;

    /// Connects to the peer.
    fn connect(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Returns true if the link is currently connected.
    fn is_connected(&self) -> BoxFuture<'_, Result<bool>>;

    /// Disconnects from the peer and releases the link.
    fn disconnect(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Discovers the peer's services and characteristics.
    fn services(&mut self) -> BoxFuture<'_, Result<Vec<GattService>>>;

    /// Writes to a characteristic and waits for the acknowledgment.
    fn write(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
        data: Bytes,
    ) -> BoxFuture<'_, Result<()>>;
}

pub use btle::{BtleLink, BtleRadio};
