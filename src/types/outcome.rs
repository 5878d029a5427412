//! Per-device and aggregate dispatch results.

use crate::error::{DeviceError, Error};
use crate::protocol::{Generation, Intent};
use crate::types::device::{DeviceAddress, DeviceKind};
use crate::types::identity::Target;

/// How far a device got through the dispatch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// No link could be established.
    NotConnected,
    /// Link established.
    Connected,
    /// Generation-specific service located.
    ServiceFound,
    /// Power characteristic located. Failures at this stage are either
    /// [`DeviceError::CharacteristicNotWritable`] or
    /// [`DeviceError::WriteFailed`].
    CharacteristicFound,
    /// Command written and acknowledged.
    Written,
}

/// Result of commanding one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Device address.
    pub address: DeviceAddress,
    /// Generation and identity.
    pub kind: DeviceKind,
    /// Last stage reached.
    pub stage: Stage,
    /// Why the device stopped short of [`Stage::Written`].
    pub failure: Option<DeviceError>,
}

impl DispatchOutcome {
    /// Creates a successful outcome.
    #[must_use]
    pub const fn written(address: DeviceAddress, kind: DeviceKind) -> Self {
        Self {
            address,
            kind,
            stage: Stage::Written,
            failure: None,
        }
    }

    /// Creates a failed outcome at `stage`.
    #[must_use]
    pub const fn failed(
        address: DeviceAddress,
        kind: DeviceKind,
        stage: Stage,
        failure: DeviceError,
    ) -> Self {
        Self {
            address,
            kind,
            stage,
            failure: Some(failure),
        }
    }

    /// Returns true if the command was written.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.failure.is_none() && matches!(self.stage, Stage::Written)
    }

    /// Returns the protocol generation.
    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.kind.generation()
    }
}

/// Result of a whole dispatch cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateOutcome {
    /// Command that was sent.
    pub intent: Intent,
    /// Scope the command was issued for.
    pub target: Target,
    /// Per-device outcomes in discovery order.
    pub outcomes: Vec<DispatchOutcome>,
}

impl AggregateOutcome {
    /// Creates an aggregate from per-device outcomes.
    #[must_use]
    pub const fn new(intent: Intent, target: Target, outcomes: Vec<DispatchOutcome>) -> Self {
        Self {
            intent,
            target,
            outcomes,
        }
    }

    /// Returns true if at least one device was found and every device succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(DispatchOutcome::succeeded)
    }

    /// Returns the number of devices that did not accept the command.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.succeeded()).count()
    }

    /// Returns the outcome for a configured identity, if it was discovered.
    #[must_use]
    pub fn for_identity(&self, index: usize) -> Option<&DispatchOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.kind.identity() == Some(index))
    }

    /// Converts the aggregate into an error if it failed.
    pub fn check(&self) -> Result<(), Error> {
        if self.outcomes.is_empty() {
            return Err(Error::NoDevicesFound);
        }
        match self.failed_count() {
            0 => Ok(()),
            failed => Err(Error::DispatchFailed {
                failed,
                total: self.outcomes.len(),
            }),
        }
    }
}

/// Last-known power status of a base station.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PowerStatus {
    /// Never commanded, or not found by the last cycle that targeted it.
    #[default]
    Unknown,
    /// Last wake command was written.
    Awake,
    /// Last sleep command was written.
    Asleep,
    /// Found, but the last command did not go through.
    Unreachable,
}

impl PowerStatus {
    /// Derives the status from a device outcome.
    #[must_use]
    pub const fn from_outcome(intent: Intent, outcome: &DispatchOutcome) -> Self {
        if !outcome.succeeded() {
            return Self::Unreachable;
        }
        match intent {
            Intent::Wake => Self::Awake,
            Intent::Sleep => Self::Asleep,
        }
    }

    /// Returns the payload published for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Awake => "on",
            Self::Asleep => "off",
            Self::Unreachable => "error",
        }
    }
}

impl std::fmt::Display for PowerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
