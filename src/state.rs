//! Run-State and the last-known status board.
//!
//! [`RunState`] is the gate that keeps a single cycle in flight.
//! [`StatusBoard`] remembers what the most recent cycles did to each base
//! station so status publishers have something better than a placeholder.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::protocol::Intent;
use crate::types::{
    AggregateOutcome, DeviceAddress, DeviceKind, IdentityRegistry, PowerStatus, Target,
};

/// Controller phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    /// Ready to accept a command.
    #[default]
    Idle,
    /// A cycle is scanning or dispatching.
    Busy { intent: Intent, target: Target },
}

impl Phase {
    /// Returns true if no cycle is in flight.
    #[must_use]
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns the active target. [`Target::All`] while idle.
    #[must_use]
    pub const fn target(self) -> Target {
        match self {
            Self::Idle => Target::All,
            Self::Busy { target, .. } => target,
        }
    }
}

/// Shared run state.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    phase: Arc<Mutex<Phase>>,
}

impl RunState {
    /// Creates an idle run state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Phase> {
        self.phase
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        *self.lock()
    }

    /// Moves from idle to busy.
    ///
    /// The returned guard moves back to idle, with the target reset to
    /// all, when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyBusy`] if a cycle is in flight. The
    /// in-flight cycle is not affected.
    pub fn try_begin(&self, intent: Intent, target: Target) -> Result<BusyGuard> {
        let mut phase = self.lock();
        if !phase.is_idle() {
            return Err(Error::AlreadyBusy);
        }
        *phase = Phase::Busy { intent, target };
        Ok(BusyGuard {
            state: self.clone(),
        })
    }
}

/// Holds the run state busy for the lifetime of one cycle.
#[derive(Debug)]
#[must_use = "the run state returns to idle when the guard is dropped"]
pub struct BusyGuard {
    state: RunState,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        *self.state.lock() = Phase::Idle;
    }
}

/// Status of one configured identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityStatus {
    /// Registry index.
    pub index: usize,
    /// Advertised label.
    pub label: String,
    /// Display name.
    pub name: String,
    /// Last-known power status.
    pub status: PowerStatus,
}

/// Last-known power status per base station.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusBoard {
    identities: Vec<PowerStatus>,
    gen2: BTreeMap<DeviceAddress, PowerStatus>,
}

impl StatusBoard {
    /// Creates a board for `count` identities, all unknown.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            identities: vec![PowerStatus::Unknown; count],
            gen2: BTreeMap::new(),
        }
    }

    /// Applies the outcome of a finished cycle.
    ///
    /// Identities in the cycle's target that were not found become
    /// [`PowerStatus::Unknown`]. Version 2 entries are replaced by the ones
    /// from this cycle.
    pub fn record(&mut self, aggregate: &AggregateOutcome) {
        for (index, status) in self.identities.iter_mut().enumerate() {
            if aggregate.target.admits(index) {
                *status = aggregate
                    .for_identity(index)
                    .map_or(PowerStatus::Unknown, |outcome| {
                        PowerStatus::from_outcome(aggregate.intent, outcome)
                    });
            }
        }
        self.gen2.clear();
        for outcome in &aggregate.outcomes {
            if outcome.kind == DeviceKind::Gen2 {
                self.gen2.insert(
                    outcome.address,
                    PowerStatus::from_outcome(aggregate.intent, outcome),
                );
            }
        }
    }

    /// Returns the status of an identity.
    #[must_use]
    pub fn identity(&self, index: usize) -> PowerStatus {
        self.identities.get(index).copied().unwrap_or_default()
    }

    /// Iterates over version 2 base stations from the last cycle, by address.
    pub fn gen2(&self) -> impl Iterator<Item = (DeviceAddress, PowerStatus)> + '_ {
        self.gen2.iter().map(|(address, status)| (*address, *status))
    }

    /// Joins the board with the registry.
    #[must_use]
    pub fn snapshot(&self, registry: &IdentityRegistry) -> Vec<IdentityStatus> {
        registry
            .iter()
            .enumerate()
            .map(|(index, identity)| IdentityStatus {
                index,
                label: identity.label.clone(),
                name: identity.name.clone(),
                status: self.identity(index),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeviceError;
    use crate::types::{DispatchOutcome, FullId, Identity, Stage};

    #[test]
    fn test_second_begin_rejected() {
        let state = RunState::new();
        let guard = state.try_begin(Intent::Wake, Target::Specific(1)).unwrap();

        assert!(matches!(
            state.try_begin(Intent::Sleep, Target::All),
            Err(Error::AlreadyBusy)
        ));
        assert_eq!(
            state.phase(),
            Phase::Busy {
                intent: Intent::Wake,
                target: Target::Specific(1)
            }
        );

        drop(guard);
        assert_eq!(state.phase(), Phase::Idle);
        assert_eq!(state.phase().target(), Target::All);
        assert!(state.try_begin(Intent::Sleep, Target::All).is_ok());
    }

    fn addr(last: u8) -> DeviceAddress {
        DeviceAddress::new([0xDD, 0, 0, 0, 0, last])
    }

    #[test]
    fn test_status_board_records_cycles() {
        let registry = IdentityRegistry::new(vec![
            Identity::new("C21347", FullId::new(1), "Room 1"),
            Identity::new("F862BD", FullId::new(2), "Room 2"),
        ]);
        let mut board = StatusBoard::new(registry.count());

        board.record(&AggregateOutcome::new(
            Intent::Wake,
            Target::All,
            vec![
                DispatchOutcome::written(addr(1), DeviceKind::Gen1 { identity: 0 }),
                DispatchOutcome::failed(
                    addr(2),
                    DeviceKind::Gen2,
                    Stage::NotConnected,
                    DeviceError::ConnectFailed { attempts: 3 },
                ),
            ],
        ));
        assert_eq!(board.identity(0), PowerStatus::Awake);
        assert_eq!(board.identity(1), PowerStatus::Unknown);
        assert_eq!(
            board.gen2().collect::<Vec<_>>(),
            [(addr(2), PowerStatus::Unreachable)]
        );

        // A targeted cycle leaves other identities alone
        board.record(&AggregateOutcome::new(
            Intent::Sleep,
            Target::Specific(1),
            vec![DispatchOutcome::written(
                addr(3),
                DeviceKind::Gen1 { identity: 1 },
            )],
        ));
        let snapshot = board.snapshot(&registry);
        assert_eq!(snapshot[0].status, PowerStatus::Awake);
        assert_eq!(snapshot[1].status, PowerStatus::Asleep);
        assert_eq!(snapshot[1].name, "Room 2");
    }

    #[test]
    fn test_gen2_entries_follow_last_cycle() {
        let mut board = StatusBoard::new(0);
        let cycle = |addresses: &[u8]| {
            AggregateOutcome::new(
                Intent::Wake,
                Target::All,
                addresses
                    .iter()
                    .map(|last| DispatchOutcome::written(addr(*last), DeviceKind::Gen2))
                    .collect(),
            )
        };

        board.record(&cycle(&[1, 2, 3]));
        board.record(&cycle(&[3, 4]));

        assert_eq!(
            board.gen2().collect::<Vec<_>>(),
            [(addr(3), PowerStatus::Awake), (addr(4), PowerStatus::Awake)]
        );

        board.record(&cycle(&[]));
        assert_eq!(board.gen2().count(), 0);
    }
}
