//! Bluetooth LE backend built on `btleplug`.

use std::future::Future;

use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::transport::{
    BoxFuture, GattCharacteristic, GattService, Link, LinkOptions, Radio, SCAN_CHANNEL_CAPACITY,
};
use crate::types::{Advertisement, DeviceAddress};

/// Radio backed by the host's first Bluetooth adapter.
pub struct BtleRadio {
    adapter: Adapter,
    scan_task: Mutex<Option<JoinHandle<()>>>,
}

impl BtleRadio {
    /// Opens the first Bluetooth adapter of the host.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoAdapter`] if the host has no adapter.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(Error::NoAdapter)?;
        Ok(Self::with_adapter(adapter))
    }

    /// Wraps an already selected adapter.
    #[must_use]
    pub fn with_adapter(adapter: Adapter) -> Self {
        Self {
            adapter,
            scan_task: Mutex::new(None),
        }
    }

    /// Returns the underlying adapter.
    #[must_use]
    pub const fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Forwards adapter events as advertisements until the receiver is dropped.
    async fn run_scan_loop(
        adapter: Adapter,
        mut events: impl futures::Stream<Item = CentralEvent> + Unpin,
        tx: mpsc::Sender<Advertisement<PeripheralId>>,
    ) {
        while let Some(event) = events.next().await {
            let id = match event {
                CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                _ => continue,
            };

            let advertisement = match advertisement_for(&adapter, &id).await {
                Ok(Some(advertisement)) => advertisement,
                Ok(None) => continue,
                Err(e) => {
                    tracing::trace!("skipping peripheral {:?}: {}", id, e);
                    continue;
                }
            };

            if tx.send(advertisement).await.is_err() {
                tracing::debug!("advertisement receiver dropped");
                return;
            }
        }
    }
}

/// Reads the current properties of a peripheral into an advertisement.
async fn advertisement_for(
    adapter: &Adapter,
    id: &PeripheralId,
) -> Result<Option<Advertisement<PeripheralId>>> {
    let peripheral = adapter.peripheral(id).await?;
    let Some(props) = peripheral.properties().await? else {
        return Ok(None);
    };
    Ok(Some(Advertisement {
        handle: id.clone(),
        address: DeviceAddress::new(props.address.into_inner()),
        name: props.local_name,
        services: props.services,
        rssi: props.rssi,
    }))
}

impl Radio for BtleRadio {
    type Handle = PeripheralId;
    type Link = BtleLink;

    fn start_scan(
        &self,
        services: Vec<Uuid>,
    ) -> BoxFuture<'_, Result<mpsc::Receiver<Advertisement<PeripheralId>>>> {
        Box::pin(async move {
            // Subscribe before scanning so no early advertisement is missed
            let events = self.adapter.events().await?;
            self.adapter.start_scan(ScanFilter { services }).await?;
            tracing::debug!("scan started");

            let (tx, rx) = mpsc::channel(SCAN_CHANNEL_CAPACITY);
            let adapter = self.adapter.clone();
            let task = tokio::spawn(Self::run_scan_loop(adapter, events, tx));

            if let Some(previous) = self.scan_task.lock().await.replace(task) {
                previous.abort();
            }
            Ok(rx)
        })
    }

    fn stop_scan(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if let Some(task) = self.scan_task.lock().await.take() {
                task.abort();
            }
            self.adapter.stop_scan().await?;
            tracing::debug!("scan stopped");
            Ok(())
        })
    }

    fn open_link(
        &self,
        handle: PeripheralId,
        options: LinkOptions,
    ) -> BoxFuture<'_, Result<BtleLink>> {
        Box::pin(async move {
            let peripheral = self.adapter.peripheral(&handle).await?;
            // The host stack owns connection parameters; the options are
            // kept for logging only.
            tracing::trace!(
                "opening link to {} (preferred {:?})",
                peripheral.address(),
                options.params
            );
            Ok(BtleLink::new(peripheral, options))
        })
    }
}

/// One link to a base station.
pub struct BtleLink {
    peripheral: Peripheral,
    address: DeviceAddress,
    options: LinkOptions,
}

impl BtleLink {
    fn new(peripheral: Peripheral, options: LinkOptions) -> Self {
        let address = DeviceAddress::new(peripheral.address().into_inner());
        Self {
            peripheral,
            address,
            options,
        }
    }

    /// Returns the options this link was opened with.
    #[must_use]
    pub const fn options(&self) -> &LinkOptions {
        &self.options
    }

    fn call<'a, T, F>(&'a self, fut: F) -> BoxFuture<'a, Result<T>>
    where
        F: Future<Output = btleplug::Result<T>> + Send + 'a,
    {
        Box::pin(async move { fut.await.map_err(Error::from) })
    }
}

impl Link for BtleLink {
    fn address(&self) -> DeviceAddress {
        self.address
    }

    fn connect(&mut self) -> BoxFuture<'_, Result<()>> {
        self.call(self.peripheral.connect())
    }

    fn is_connected(&self) -> BoxFuture<'_, Result<bool>> {
        self.call(self.peripheral.is_connected())
    }

    fn disconnect(&mut self) -> BoxFuture<'_, Result<()>> {
        self.call(self.peripheral.disconnect())
    }

    fn services(&mut self) -> BoxFuture<'_, Result<Vec<GattService>>> {
        Box::pin(async move {
            self.peripheral.discover_services().await?;
            let services = self
                .peripheral
                .services()
                .into_iter()
                .map(|service| GattService {
                    uuid: service.uuid,
                    characteristics: service
                        .characteristics
                        .into_iter()
                        .map(|c| GattCharacteristic {
                            uuid: c.uuid,
                            writable: acknowledges_writes(c.properties),
                        })
                        .collect(),
                })
                .collect();
            Ok(services)
        })
    }

    fn write(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
        data: Bytes,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let target = self
                .peripheral
                .characteristics()
                .into_iter()
                .find(|c| c.uuid == characteristic && c.service_uuid == service)
                .ok_or(btleplug::Error::NoSuchCharacteristic)?;

            if !acknowledges_writes(target.properties) {
                return Err(btleplug::Error::NotSupported(format!(
                    "characteristic {characteristic} does not acknowledge writes"
                ))
                .into());
            }

            tracing::trace!("writing {} to {}", hex::encode(&data), self.address);
            self.peripheral
                .write(&target, &data, WriteType::WithResponse)
                .await?;
            Ok(())
        })
    }
}

/// True if the characteristic supports writes with response.
fn acknowledges_writes(properties: CharPropFlags) -> bool {
    properties.contains(CharPropFlags::WRITE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unacknowledged_characteristic_is_not_writable() {
        assert!(acknowledges_writes(CharPropFlags::WRITE));
        assert!(acknowledges_writes(
            CharPropFlags::WRITE | CharPropFlags::WRITE_WITHOUT_RESPONSE | CharPropFlags::READ
        ));
        assert!(!acknowledges_writes(CharPropFlags::WRITE_WITHOUT_RESPONSE));
        assert!(!acknowledges_writes(CharPropFlags::READ));
    }
}
