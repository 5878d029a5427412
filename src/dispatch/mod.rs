//! The scan, connect, write pipeline.
//!
//! [`CommandDispatcher::run`] performs one full dispatch cycle: it scans,
//! then walks the discovered devices in discovery order. A device that
//! fails at any stage is recorded and the walk moves on. Every link is
//! released before the aggregate outcome is returned.

use std::time::Duration;

use crate::connection::{ConnectionManager, RetryPolicy};
use crate::discovery::{DEFAULT_SCAN_WINDOW, DiscoverySession, Gen2Filter};
use crate::error::{DeviceError, Result};
use crate::event::{Event, EventDispatcher};
use crate::protocol::{Generation, Intent, Recipient, encode};
use crate::transport::{Link, LinkOptions, Radio, bounded};
use crate::types::{
    AggregateOutcome, DeviceKind, DiscoveredDevice, DispatchOutcome, IdentityRegistry, Stage,
    Target,
};

/// Default maximum number of concurrent links.
pub const DEFAULT_MAX_LINKS: usize = 5;

/// Hard upper bound on concurrent links.
pub const MAX_LINKS_LIMIT: usize = 9;

/// Default pause between two devices.
pub const DEFAULT_INTER_COMMAND_DELAY: Duration = Duration::from_millis(100);

/// Default timeout of service discovery and of one characteristic write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables of a dispatch cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Scan window. `None` scans until the radio ends the scan.
    pub scan_window: Option<Duration>,
    /// Maximum discovered devices and concurrent links.
    pub max_links: usize,
    /// Connection retry policy.
    pub retry: RetryPolicy,
    /// Pause between two devices.
    pub inter_command_delay: Duration,
    /// Timeout of service discovery and of one characteristic write.
    pub write_timeout: Duration,
    /// Options for every link.
    pub link: LinkOptions,
    /// Version 2 address allow-list.
    pub gen2: Gen2Filter,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            scan_window: Some(DEFAULT_SCAN_WINDOW),
            max_links: DEFAULT_MAX_LINKS,
            retry: RetryPolicy::default(),
            inter_command_delay: DEFAULT_INTER_COMMAND_DELAY,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            link: LinkOptions::default(),
            gen2: Gen2Filter::default(),
        }
    }
}

/// Runs dispatch cycles against one radio.
pub struct CommandDispatcher<'a, R> {
    radio: &'a R,
    registry: &'a IdentityRegistry,
    settings: &'a DispatchSettings,
    events: Option<&'a EventDispatcher>,
}

impl<'a, R: Radio> CommandDispatcher<'a, R> {
    /// Creates a dispatcher.
    #[must_use]
    pub const fn new(
        radio: &'a R,
        registry: &'a IdentityRegistry,
        settings: &'a DispatchSettings,
    ) -> Self {
        Self {
            radio,
            registry,
            settings,
            events: None,
        }
    }

    /// Reports scan completion and per-device outcomes to `events`.
    #[must_use]
    pub const fn with_events(mut self, events: &'a EventDispatcher) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: Event) {
        if let Some(events) = self.events {
            events.dispatch(event);
        }
    }

    /// Runs one full cycle and returns its aggregate outcome.
    pub async fn run(&self, intent: Intent, target: Target) -> AggregateOutcome {
        tracing::info!("dispatch cycle: {} {}", intent, target);

        let devices = self.discover(target).await;
        self.emit(Event::ScanCompleted {
            discovered: devices.len(),
        });
        if devices.is_empty() {
            tracing::warn!("no base stations found");
            return AggregateOutcome::new(intent, target, Vec::new());
        }

        let mut links = ConnectionManager::new(
            self.radio,
            self.settings.max_links,
            self.settings.retry,
            self.settings.link.clone(),
        );
        let mut outcomes = Vec::with_capacity(devices.len());
        for (i, device) in devices.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.settings.inter_command_delay).await;
            }
            let outcome = self.dispatch_one(&mut links, device, intent).await;
            if let Some(ref failure) = outcome.failure {
                tracing::warn!(
                    "{} {} failed at {:?}: {}",
                    outcome.generation(),
                    device.address,
                    outcome.stage,
                    failure
                );
            }
            self.emit(Event::DeviceDispatched(outcome.clone()));
            outcomes.push(outcome);
        }
        links.release_all().await;

        let aggregate = AggregateOutcome::new(intent, target, outcomes);
        tracing::info!(
            "dispatch cycle done: {}/{} base stations accepted {}",
            aggregate.outcomes.len() - aggregate.failed_count(),
            aggregate.outcomes.len(),
            intent
        );
        aggregate
    }

    async fn discover(&self, target: Target) -> Vec<DiscoveredDevice<R::Handle>> {
        let mut session = DiscoverySession::new(
            self.registry,
            &self.settings.gen2,
            target,
            self.settings.max_links,
        );
        if let Err(e) = session.run(self.radio, self.settings.scan_window).await {
            tracing::warn!("scan failed: {}", e);
        }
        session.into_devices()
    }

    /// Connects, locates the power characteristic and writes the command.
    async fn dispatch_one(
        &self,
        links: &mut ConnectionManager<'_, R>,
        device: &DiscoveredDevice<R::Handle>,
        intent: Intent,
    ) -> DispatchOutcome {
        let (address, kind) = (device.address, device.kind);
        let fail = |stage, failure| DispatchOutcome::failed(address, kind, stage, failure);

        let Some(recipient) = self.recipient(kind) else {
            return fail(
                Stage::NotConnected,
                DeviceError::WriteFailed {
                    reason: "identity no longer configured".into(),
                },
            );
        };

        let link = match links.connect(device).await {
            Ok(link) => link,
            Err(e) => return fail(Stage::NotConnected, e),
        };

        let generation = kind.generation();
        let services = match bounded(self.settings.write_timeout, link.services()).await {
            Ok(services) => services,
            Err(e) => {
                tracing::debug!("service discovery on {} failed: {}", address, e);
                Vec::new()
            }
        };
        let Some(service) = services.iter().find(|s| s.uuid == generation.service()) else {
            return fail(Stage::Connected, DeviceError::ServiceNotFound);
        };
        let Some(characteristic) = service.characteristic(generation.characteristic()) else {
            return fail(Stage::ServiceFound, DeviceError::CharacteristicNotFound);
        };
        if !characteristic.writable {
            return fail(Stage::CharacteristicFound, DeviceError::CharacteristicNotWritable);
        }

        let payload = encode(intent, recipient);
        tracing::trace!("{} payload for {}: {}", generation, address, hex::encode(&payload));
        if let Err(e) = write(link, generation, payload, self.settings.write_timeout).await {
            return fail(
                Stage::CharacteristicFound,
                DeviceError::WriteFailed {
                    reason: e.to_string(),
                },
            );
        }

        tracing::info!("sent {} to {} base station {}", intent, generation, address);
        DispatchOutcome::written(address, kind)
    }

    fn recipient(&self, kind: DeviceKind) -> Option<Recipient> {
        match kind {
            DeviceKind::Gen1 { identity } => self
                .registry
                .get(identity)
                .map(|identity| Recipient::Gen1(identity.full_id)),
            DeviceKind::Gen2 => Some(Recipient::Gen2),
        }
    }
}

/// Writes the payload to the power characteristic, bounded by `timeout`.
async fn write<L: Link>(
    link: &mut L,
    generation: Generation,
    payload: bytes::Bytes,
    timeout: Duration,
) -> Result<()> {
    bounded(
        timeout,
        link.write(generation.service(), generation.characteristic(), payload),
    )
    .await
}
