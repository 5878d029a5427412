//! Main [`Controller`] implementation.
//!
//! This module provides the high-level [`Controller`] that combines the
//! radio, the run state, the dispatch pipeline and the event system into
//! one interface for trigger surfaces.

use std::sync::Arc;

use tokio::sync::{RwLock, oneshot};

use crate::config::ControllerConfig;
use crate::dispatch::{CommandDispatcher, DispatchSettings};
use crate::error::{Error, Result};
use crate::event::{Event, EventDispatcher, Subscription};
use crate::protocol::Intent;
use crate::state::{IdentityStatus, Phase, RunState, StatusBoard};
use crate::transport::{BtleRadio, Radio};
use crate::trigger::Request;
use crate::types::{
    AggregateOutcome, DeviceAddress, Identity, IdentityRegistry, PowerStatus, Target,
};

/// Capacity of the event broadcast channel.
pub const EVENT_CAPACITY: usize = 64;

/// Handle to an accepted dispatch cycle.
#[derive(Debug)]
pub struct CycleHandle {
    intent: Intent,
    target: Target,
    receiver: oneshot::Receiver<AggregateOutcome>,
}

impl CycleHandle {
    /// Returns the command of this cycle.
    #[must_use]
    pub const fn intent(&self) -> Intent {
        self.intent
    }

    /// Returns the target of this cycle.
    #[must_use]
    pub const fn target(&self) -> Target {
        self.target
    }

    /// Waits for the cycle to finish.
    ///
    /// The controller is idle again when this returns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] if the cycle task was aborted.
    pub async fn outcome(self) -> Result<AggregateOutcome> {
        self.receiver.await.map_err(|_| Error::ChannelClosed)
    }
}

/// Result of [`Controller::handle`].
#[derive(Debug)]
pub enum Response {
    /// A cycle was started.
    Started(CycleHandle),
    /// An identity was renamed; carries the stored name.
    Renamed { index: usize, name: String },
}

/// Controller for a set of base stations.
pub struct Controller<R> {
    radio: Arc<R>,
    settings: Arc<DispatchSettings>,
    registry: Arc<RwLock<IdentityRegistry>>,
    board: Arc<RwLock<StatusBoard>>,
    state: RunState,
    dispatcher: EventDispatcher,
}

impl Controller<BtleRadio> {
    /// Creates a controller on the host's first Bluetooth adapter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoAdapter`] if the host has no adapter.
    pub async fn bluetooth(config: &ControllerConfig) -> Result<Self> {
        let radio = BtleRadio::new().await?;
        Ok(Self::new(radio, config))
    }
}

impl<R: Radio + 'static> Controller<R> {
    /// Creates a controller from a configuration.
    #[must_use]
    pub fn new(radio: R, config: &ControllerConfig) -> Self {
        Self::with_settings(radio, config.registry(), config.settings())
    }

    /// Creates a controller from an explicit registry and settings.
    #[must_use]
    pub fn with_settings(
        radio: R,
        registry: IdentityRegistry,
        settings: DispatchSettings,
    ) -> Self {
        let board = StatusBoard::new(registry.count());
        Self {
            radio: Arc::new(radio),
            settings: Arc::new(settings),
            registry: Arc::new(RwLock::new(registry)),
            board: Arc::new(RwLock::new(board)),
            state: RunState::new(),
            dispatcher: EventDispatcher::new(EVENT_CAPACITY),
        }
    }

    /// Starts a dispatch cycle in the background.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTarget`] if the target is not a configured
    /// identity and [`Error::AlreadyBusy`] if a cycle is in flight. In both
    /// cases nothing is started and the run state is unchanged.
    pub async fn request(&self, intent: Intent, target: Target) -> Result<CycleHandle> {
        let registry = {
            let registry = self.registry.read().await;
            registry.check_target(target)?;
            registry.clone()
        };
        let guard = self.state.try_begin(intent, target).inspect_err(|_| {
            tracing::info!("rejected {} {}: a command is in progress", intent, target);
        })?;

        tracing::info!("starting {} {}", intent, target);
        self.dispatcher.dispatch(Event::CycleStarted { intent, target });

        let (tx, receiver) = oneshot::channel();
        let radio = Arc::clone(&self.radio);
        let settings = Arc::clone(&self.settings);
        let board = Arc::clone(&self.board);
        let events = self.dispatcher.clone();

        tokio::spawn(async move {
            let aggregate = CommandDispatcher::new(&*radio, &registry, &settings)
                .with_events(&events)
                .run(intent, target)
                .await;

            board.write().await.record(&aggregate);
            drop(guard);

            events.dispatch(Event::CycleFinished(aggregate.clone()));
            // The caller may have dropped the handle
            let _ = tx.send(aggregate);
        });

        Ok(CycleHandle {
            intent,
            target,
            receiver,
        })
    }

    /// Runs a dispatch cycle to completion.
    pub async fn run(&self, intent: Intent, target: Target) -> Result<AggregateOutcome> {
        self.request(intent, target).await?.outcome().await
    }

    /// Renames an identity and returns the stored, truncated name.
    ///
    /// Allowed while a cycle is in flight.
    pub async fn rename(&self, index: usize, name: &str) -> Result<String> {
        let stored = self
            .registry
            .write()
            .await
            .rename(index, name)?
            .to_string();
        tracing::info!("identity {} renamed to {:?}", index, stored);
        self.dispatcher.dispatch(Event::Renamed {
            index,
            name: stored.clone(),
        });
        Ok(stored)
    }

    /// Handles a request from any trigger surface.
    pub async fn handle(&self, request: Request) -> Result<Response> {
        match request {
            Request::Command { intent, target } => {
                self.request(intent, target).await.map(Response::Started)
            }
            Request::Rename { index, name } => {
                let name = self.rename(index, &name).await?;
                Ok(Response::Renamed { index, name })
            }
        }
    }

    /// Returns the last-known status of every identity.
    pub async fn status(&self) -> Vec<IdentityStatus> {
        let registry = self.registry.read().await;
        self.board.read().await.snapshot(&registry)
    }

    /// Returns the last-known status of version 2 base stations.
    pub async fn gen2_status(&self) -> Vec<(DeviceAddress, PowerStatus)> {
        self.board.read().await.gen2().collect()
    }

    /// Returns the configured identities.
    pub async fn identities(&self) -> Vec<Identity> {
        self.registry.read().await.iter().cloned().collect()
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Returns the dispatch settings.
    #[must_use]
    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Returns the radio.
    #[must_use]
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Returns the event dispatcher.
    #[must_use]
    pub const fn events(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Subscribes to events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.dispatcher.subscribe()
    }
}
