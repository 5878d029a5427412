//! Scripted in-memory radio for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::protocol::{ConnectionParams, GEN1_SERVICE, GEN2_SERVICE, Generation};
use crate::transport::{BoxFuture, GattCharacteristic, GattService, Link, LinkOptions, Radio};
use crate::types::{Advertisement, DeviceAddress};

/// Scripted behavior of one peer.
#[derive(Debug, Clone)]
pub(crate) struct PeerScript {
    /// Number of initial connection attempts that fail.
    pub connect_failures: u32,
    /// Connection attempts never complete.
    pub connect_hangs: bool,
    /// Services returned by discovery.
    pub services: Vec<GattService>,
    /// Service discovery never completes.
    pub services_hang: bool,
    /// Disconnects never complete.
    pub disconnect_hangs: bool,
    /// Writes are rejected.
    pub write_fails: bool,
    /// Writes never complete.
    pub write_hangs: bool,
    /// Parameters the peer asks for once connected.
    pub proposes: Option<ConnectionParams>,
}

impl PeerScript {
    /// A well-behaved base station of the given generation.
    pub fn healthy(generation: Generation) -> Self {
        Self {
            connect_failures: 0,
            connect_hangs: false,
            services: vec![GattService {
                uuid: generation.service(),
                characteristics: vec![GattCharacteristic {
                    uuid: generation.characteristic(),
                    writable: true,
                }],
            }],
            services_hang: false,
            disconnect_hangs: false,
            write_fails: false,
            write_hangs: false,
            proposes: None,
        }
    }

    pub fn proposing(mut self, params: ConnectionParams) -> Self {
        self.proposes = Some(params);
        self
    }

    pub fn failing_connects(mut self, count: u32) -> Self {
        self.connect_failures = count;
        self
    }

    pub fn hanging_connect(mut self) -> Self {
        self.connect_hangs = true;
        self
    }

    pub fn hanging_services(mut self) -> Self {
        self.services_hang = true;
        self
    }

    pub fn hanging_disconnect(mut self) -> Self {
        self.disconnect_hangs = true;
        self
    }

    pub fn without_services(mut self) -> Self {
        self.services.clear();
        self
    }

    pub fn without_characteristic(mut self) -> Self {
        for service in &mut self.services {
            service.characteristics.clear();
        }
        self
    }

    pub fn read_only(mut self) -> Self {
        for service in &mut self.services {
            for characteristic in &mut service.characteristics {
                characteristic.writable = false;
            }
        }
        self
    }

    pub fn failing_write(mut self) -> Self {
        self.write_fails = true;
        self
    }

    pub fn hanging_write(mut self) -> Self {
        self.write_hangs = true;
        self
    }
}

/// What happened to one peer.
#[derive(Debug, Clone, Default)]
pub(crate) struct PeerLog {
    pub connect_attempts: u32,
    pub disconnects: u32,
    pub writes: Vec<(Uuid, Bytes)>,
    /// Renegotiation requests and whether they were accepted.
    pub param_requests: Vec<(ConnectionParams, bool)>,
}

#[derive(Debug, Default)]
struct Shared {
    scripts: HashMap<DeviceAddress, PeerScript>,
    logs: HashMap<DeviceAddress, PeerLog>,
    connected: HashMap<DeviceAddress, bool>,
    scans: u32,
    stops: u32,
}

/// In-memory radio replaying a fixed set of advertisements.
#[derive(Clone, Default)]
pub(crate) struct MockRadio {
    advertisements: Vec<Advertisement<DeviceAddress>>,
    shared: Arc<Mutex<Shared>>,
    keep_open: Arc<Mutex<Option<mpsc::Sender<Advertisement<DeviceAddress>>>>>,
    close_after_replay: bool,
}

impl MockRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ends the advertisement stream once every advertisement was replayed.
    pub fn closing(mut self) -> Self {
        self.close_after_replay = true;
        self
    }

    /// Adds a raw advertisement with no scripted peer behind it.
    pub fn advertise(mut self, advertisement: Advertisement<DeviceAddress>) -> Self {
        self.advertisements.push(advertisement);
        self
    }

    /// Adds a version 1 base station advertising `name`.
    pub fn gen1(self, address: DeviceAddress, name: &str, script: PeerScript) -> Self {
        self.peer(address, Some(name), GEN1_SERVICE, script)
    }

    /// Adds a version 2 base station.
    pub fn gen2(self, address: DeviceAddress, script: PeerScript) -> Self {
        self.peer(address, Some("LHB-TEST"), GEN2_SERVICE, script)
    }

    fn peer(
        self,
        address: DeviceAddress,
        name: Option<&str>,
        service: Uuid,
        script: PeerScript,
    ) -> Self {
        self.shared
            .lock()
            .unwrap()
            .scripts
            .insert(address, script);
        self.advertise(Advertisement {
            handle: address,
            address,
            name: name.map(str::to_string),
            services: vec![service],
            rssi: Some(-60),
        })
    }

    pub fn log(&self, address: DeviceAddress) -> PeerLog {
        self.shared
            .lock()
            .unwrap()
            .logs
            .get(&address)
            .cloned()
            .unwrap_or_default()
    }

    pub fn scans(&self) -> (u32, u32) {
        let shared = self.shared.lock().unwrap();
        (shared.scans, shared.stops)
    }

    pub fn connected_count(&self) -> usize {
        self.shared
            .lock()
            .unwrap()
            .connected
            .values()
            .filter(|c| **c)
            .count()
    }
}

impl Radio for MockRadio {
    type Handle = DeviceAddress;
    type Link = MockLink;

    fn start_scan(
        &self,
        _services: Vec<Uuid>,
    ) -> BoxFuture<'_, Result<mpsc::Receiver<Advertisement<DeviceAddress>>>> {
        Box::pin(async move {
            self.shared.lock().unwrap().scans += 1;
            let (tx, rx) = mpsc::channel(self.advertisements.len().max(1));
            for advertisement in &self.advertisements {
                tx.try_send(advertisement.clone())
                    .map_err(|_| Error::ChannelClosed)?;
            }
            if !self.close_after_replay {
                *self.keep_open.lock().unwrap() = Some(tx);
            }
            Ok(rx)
        })
    }

    fn stop_scan(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.shared.lock().unwrap().stops += 1;
            self.keep_open.lock().unwrap().take();
            Ok(())
        })
    }

    fn open_link(
        &self,
        handle: DeviceAddress,
        options: LinkOptions,
    ) -> BoxFuture<'_, Result<MockLink>> {
        Box::pin(async move {
            Ok(MockLink {
                address: handle,
                options,
                shared: Arc::clone(&self.shared),
            })
        })
    }
}

/// Link into the mock radio.
#[derive(Debug)]
pub(crate) struct MockLink {
    address: DeviceAddress,
    options: LinkOptions,
    shared: Arc<Mutex<Shared>>,
}

impl MockLink {
    fn script(&self) -> PeerScript {
        self.shared
            .lock()
            .unwrap()
            .scripts
            .get(&self.address)
            .cloned()
            .unwrap_or_else(|| PeerScript::healthy(Generation::V1))
    }
}

impl Link for MockLink {
    fn address(&self) -> DeviceAddress {
        self.address
    }

    fn connect(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let script = self.script();
            let attempt = {
                let mut shared = self.shared.lock().unwrap();
                let log = shared.logs.entry(self.address).or_default();
                log.connect_attempts += 1;
                log.connect_attempts
            };
            if script.connect_hangs {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if attempt <= script.connect_failures {
                return Err(Error::Timeout { timeout_ms: 0 });
            }
            let mut shared = self.shared.lock().unwrap();
            shared.connected.insert(self.address, true);
            if let Some(params) = script.proposes {
                // A rejected request leaves the connection up
                let accepted = self.options.policy.accepts(&params);
                shared
                    .logs
                    .entry(self.address)
                    .or_default()
                    .param_requests
                    .push((params, accepted));
            }
            Ok(())
        })
    }

    fn is_connected(&self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            Ok(self
                .shared
                .lock()
                .unwrap()
                .connected
                .get(&self.address)
                .copied()
                .unwrap_or(false))
        })
    }

    fn disconnect(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.script().disconnect_hangs {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            let mut shared = self.shared.lock().unwrap();
            shared.connected.insert(self.address, false);
            shared.logs.entry(self.address).or_default().disconnects += 1;
            Ok(())
        })
    }

    fn services(&mut self) -> BoxFuture<'_, Result<Vec<GattService>>> {
        Box::pin(async move {
            let script = self.script();
            if script.services_hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok(script.services)
        })
    }

    fn write(
        &mut self,
        _service: Uuid,
        characteristic: Uuid,
        data: Bytes,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let script = self.script();
            if script.write_hangs {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if script.write_fails {
                return Err(Error::Timeout { timeout_ms: 0 });
            }
            self.shared
                .lock()
                .unwrap()
                .logs
                .entry(self.address)
                .or_default()
                .writes
                .push((characteristic, data));
            Ok(())
        })
    }
}
