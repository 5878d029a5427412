//! Link establishment with bounded retry.
//!
//! A [`ConnectionManager`] lives for exactly one dispatch cycle. It owns
//! every link opened during the cycle and tears all of them down in
//! [`ConnectionManager::release_all`].

use std::time::Duration;

use crate::error::{DeviceError, Result};
use crate::transport::{Link, LinkOptions, Radio, bounded};
use crate::types::{DeviceAddress, DiscoveredDevice};

/// Default number of connection attempts per device.
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Default delay between two connection attempts.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Default timeout of a single connection attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Bounded retry policy for connection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub attempts: u32,
    /// Delay between two attempts. Not applied after the last one.
    pub settle_delay: Duration,
    /// Timeout of each attempt and of each disconnect.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            settle_delay: DEFAULT_SETTLE_DELAY,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }
}

/// Owner of the links opened during one dispatch cycle.
pub struct ConnectionManager<'r, R: Radio> {
    radio: &'r R,
    links: Vec<R::Link>,
    capacity: usize,
    retry: RetryPolicy,
    options: LinkOptions,
}

impl<'r, R: Radio> ConnectionManager<'r, R> {
    /// Creates a manager allowing at most `capacity` concurrent links.
    #[must_use]
    pub fn new(radio: &'r R, capacity: usize, retry: RetryPolicy, options: LinkOptions) -> Self {
        Self {
            radio,
            links: Vec::with_capacity(capacity),
            capacity,
            retry,
            options,
        }
    }

    /// Returns the number of links currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Returns true if no link is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    fn position(&self, address: DeviceAddress) -> Option<usize> {
        self.links.iter().position(|link| link.address() == address)
    }

    /// Returns a connected link to the device.
    ///
    /// An existing link to the same address is reused. Otherwise a new link
    /// is opened and connected under the retry policy.
    pub async fn connect(
        &mut self,
        device: &DiscoveredDevice<R::Handle>,
    ) -> std::result::Result<&mut R::Link, DeviceError> {
        if let Some(index) = self.position(device.address) {
            if self.resume(index).await {
                return Ok(&mut self.links[index]);
            }
            let mut stale = self.links.swap_remove(index);
            release(&mut stale, self.retry.attempt_timeout).await;
        }

        if self.links.len() >= self.capacity {
            tracing::warn!(
                "cannot connect to {}: all {} links in use",
                device.address,
                self.capacity
            );
            return Err(DeviceError::CapacitySaturated {
                capacity: self.capacity,
            });
        }

        let mut link = match self
            .radio
            .open_link(device.handle.clone(), self.options.clone())
            .await
        {
            Ok(link) => link,
            Err(e) => {
                tracing::warn!("cannot open link to {}: {}", device.address, e);
                return Err(DeviceError::ConnectFailed { attempts: 0 });
            }
        };

        let attempts = self.retry.attempts.max(1);
        for attempt in 1..=attempts {
            match try_connect(&mut link, self.retry.attempt_timeout).await {
                Ok(()) => {
                    tracing::debug!(
                        "connected to {} on attempt {}/{}",
                        device.address,
                        attempt,
                        attempts
                    );
                    self.links.push(link);
                    let index = self.links.len() - 1;
                    return Ok(&mut self.links[index]);
                }
                Err(e) => {
                    tracing::warn!(
                        "connection attempt {}/{} to {} failed: {}",
                        attempt,
                        attempts,
                        device.address,
                        e
                    );
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.retry.settle_delay).await;
            }
        }

        release(&mut link, self.retry.attempt_timeout).await;
        Err(DeviceError::ConnectFailed { attempts })
    }

    /// Brings an existing link back up with a single attempt.
    async fn resume(&mut self, index: usize) -> bool {
        let timeout = self.retry.attempt_timeout;
        let link = &mut self.links[index];
        if matches!(bounded(timeout, link.is_connected()).await, Ok(true)) {
            tracing::debug!("reusing link to {}", link.address());
            return true;
        }
        match try_connect(&mut *link, timeout).await {
            Ok(()) => {
                tracing::debug!("resumed link to {}", link.address());
                true
            }
            Err(e) => {
                tracing::debug!("cannot resume link to {}: {}", link.address(), e);
                false
            }
        }
    }

    /// Disconnects and drops every link.
    pub async fn release_all(&mut self) {
        let timeout = self.retry.attempt_timeout;
        for mut link in self.links.drain(..) {
            release(&mut link, timeout).await;
        }
    }
}

/// One connection attempt bounded by `timeout`.
async fn try_connect<L: Link>(link: &mut L, timeout: Duration) -> Result<()> {
    bounded(timeout, link.connect()).await
}

async fn release<L: Link>(link: &mut L, timeout: Duration) {
    if let Err(e) = bounded(timeout, link.disconnect()).await {
        tracing::debug!("disconnect from {} failed: {}", link.address(), e);
    }
}
