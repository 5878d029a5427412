//! Time-boxed scanning and identity matching.
//!
//! A [`DiscoverySession`] runs one scan window and turns the advertisements
//! it sees into a bounded list of [`DiscoveredDevice`]s:
//!
//! - Version 1 advertisers are matched against the identity registry by
//!   label containment. Matches outside the current [`Target`] are skipped
//!   while the scan is still running, so a targeted command never reaches
//!   other known base stations.
//! - Version 2 advertisers are recorded unless an address allow-list is
//!   configured and does not contain them.
//! - Once the list is full, further advertisements are ignored.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::Result;
use crate::protocol::{Generation, scan_services};
use crate::transport::Radio;
use crate::types::{
    Advertisement, DeviceAddress, DeviceKind, DiscoveredDevice, IdentityRegistry, Target,
};

/// Default scan window.
pub const DEFAULT_SCAN_WINDOW: Duration = Duration::from_secs(5);

/// Address allow-list for version 2 base stations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Gen2Filter {
    /// When false, every version 2 base station is accepted.
    pub filter: bool,
    /// Accepted addresses when filtering is on.
    pub allow: Vec<DeviceAddress>,
}

impl Gen2Filter {
    /// Accepts every version 2 base station.
    #[must_use]
    pub const fn allow_all() -> Self {
        Self {
            filter: false,
            allow: Vec::new(),
        }
    }

    /// Accepts only the listed addresses.
    #[must_use]
    pub fn only(allow: impl IntoIterator<Item = DeviceAddress>) -> Self {
        Self {
            filter: true,
            allow: allow.into_iter().collect(),
        }
    }

    /// Returns true if the address passes the filter.
    #[must_use]
    pub fn admits(&self, address: &DeviceAddress) -> bool {
        !self.filter || self.allow.contains(address)
    }
}

/// Lifecycle of a discovery session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Not started.
    Idle,
    /// Scan window open.
    Scanning,
    /// Scan window closed; the device list is final.
    Completed,
}

/// What the session did with one advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Added to the device list.
    Recorded(DeviceKind),
    /// Known version 1 base station outside the current target.
    NotTargeted,
    /// Version 1 base station with no matching identity.
    UnknownIdentity,
    /// Version 2 base station rejected by the allow-list.
    Filtered,
    /// Address already recorded in this session.
    Duplicate,
    /// Device list is full.
    CapacityReached,
    /// Not a base station.
    Ignored,
}

/// One scan window and the devices it found.
pub struct DiscoverySession<'a, H> {
    registry: &'a IdentityRegistry,
    filter: &'a Gen2Filter,
    target: Target,
    capacity: usize,
    devices: Vec<DiscoveredDevice<H>>,
    state: ScanState,
}

impl<'a, H: Clone> DiscoverySession<'a, H> {
    /// Creates a session that records at most `capacity` devices.
    #[must_use]
    pub fn new(
        registry: &'a IdentityRegistry,
        filter: &'a Gen2Filter,
        target: Target,
        capacity: usize,
    ) -> Self {
        Self {
            registry,
            filter,
            target,
            capacity,
            devices: Vec::with_capacity(capacity),
            state: ScanState::Idle,
        }
    }

    /// Returns the session state.
    #[must_use]
    pub const fn state(&self) -> ScanState {
        self.state
    }

    /// Returns the devices recorded so far, in discovery order.
    #[must_use]
    pub fn devices(&self) -> &[DiscoveredDevice<H>] {
        &self.devices
    }

    /// Consumes the session and returns the recorded devices.
    #[must_use]
    pub fn into_devices(self) -> Vec<DiscoveredDevice<H>> {
        self.devices
    }

    /// Applies the matching rules to one advertisement.
    pub fn observe(&mut self, advertisement: &Advertisement<H>) -> Observation {
        if self.devices.len() >= self.capacity {
            return Observation::CapacityReached;
        }
        let Some(generation) = advertisement.generation() else {
            return Observation::Ignored;
        };
        if self
            .devices
            .iter()
            .any(|d| d.address == advertisement.address)
        {
            return Observation::Duplicate;
        }

        let kind = match generation {
            Generation::V1 => match self.match_identity(advertisement) {
                Ok(identity) => DeviceKind::Gen1 { identity },
                Err(observation) => return observation,
            },
            Generation::V2 => {
                if !self.filter.admits(&advertisement.address) {
                    tracing::debug!("{} not in v2 allow-list", advertisement.address);
                    return Observation::Filtered;
                }
                DeviceKind::Gen2
            }
        };

        tracing::info!(
            "found {} base station {} ({})",
            generation,
            advertisement.address,
            advertisement.name.as_deref().unwrap_or("unnamed")
        );
        self.devices.push(DiscoveredDevice {
            handle: advertisement.handle.clone(),
            address: advertisement.address,
            kind,
            name: advertisement.name.clone(),
        });
        Observation::Recorded(kind)
    }

    /// Resolves a version 1 advertisement to an identity inside the target.
    fn match_identity(
        &self,
        advertisement: &Advertisement<H>,
    ) -> std::result::Result<usize, Observation> {
        let Some(name) = advertisement.name.as_deref() else {
            return Err(Observation::UnknownIdentity);
        };

        let mut skipped = false;
        for index in self.registry.matches(name) {
            if self.target.admits(index) {
                return Ok(index);
            }
            tracing::debug!(
                "skipping {} - identity {} is not the target {}",
                name,
                index,
                self.target
            );
            skipped = true;
        }

        if skipped {
            Err(Observation::NotTargeted)
        } else {
            tracing::debug!("no identity configured for {}", name);
            Err(Observation::UnknownIdentity)
        }
    }

    /// Scans for `window`, recording matching devices.
    ///
    /// `None` scans until the radio closes the advertisement stream.
    pub async fn run<R>(&mut self, radio: &R, window: Option<Duration>) -> Result<()>
    where
        R: Radio<Handle = H>,
    {
        self.devices.clear();
        let mut rx = radio.start_scan(scan_services()).await?;
        self.state = ScanState::Scanning;
        tracing::debug!("scanning for {:?}", window);

        let deadline = window.map(|w| Instant::now() + w);
        loop {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, rx.recv()).await {
                    Ok(next) => next,
                    Err(_) => break,
                },
                None => rx.recv().await,
            };
            match next {
                Some(advertisement) => {
                    self.observe(&advertisement);
                }
                None => {
                    tracing::debug!("advertisement stream closed");
                    break;
                }
            }
        }

        if let Err(e) = radio.stop_scan().await {
            tracing::warn!("failed to stop scan: {}", e);
        }
        self.state = ScanState::Completed;
        tracing::info!("scan ended, found {} base station(s)", self.devices.len());
        Ok(())
    }
}
