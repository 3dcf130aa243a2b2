//! Coordinator Actor
//!
//! This module provides an async actor for driving capability
//! transactions. All coordination happens in this actor; modem tasks
//! and control surfaces talk to it exclusively through channels.
//!
//! # Architecture
//!
//! The actor receives commands through one channel and emits events
//! through another. Requests bound for modems are forwarded to each
//! phone's link task; replies come back in as commands. A request for
//! a link whose task has gone away is answered locally with a
//! `RadioNotAvailable` ack, so a dead modem resolves a transaction the
//! same way as one that refused it — nothing ever fails synchronously.
//!
//! # Example
//!
//! ```rust,ignore
//! use xbar_switch::actor::{run_switch_actor, SwitchActorCommand};
//! use xbar_switch::{CoordinatorConfig, SwitchEvent};
//! use tokio::sync::mpsc;
//!
//! let (cmd_tx, cmd_rx) = mpsc::channel(256);
//! let (event_tx, mut event_rx) = mpsc::channel(256);
//!
//! // Spawn the actor
//! tokio::spawn(run_switch_actor(CoordinatorConfig::default(), cmd_rx, event_tx));
//!
//! // Send commands and receive events
//! ```

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};
use xbar_fanout::{RadioStateWatch, SubscriberId};
use xbar_ril::{
    ModemError, ModemId, ModemRequest, ModemResponse, PhoneId, RadioAccessFamily, RadioState,
};

use crate::engine::{CapabilityCoordinator, CoordinatorConfig, SetOutcome};
use crate::error::SwitchError;
use crate::events::SwitchEvent;
use crate::link::{ModemLink, ModemLinkMeta};
use crate::state::{PhoneDescriptor, SlotStatus};

/// How often the actor checks the transaction deadline
const TIMEOUT_POLL_INTERVAL_MS: u64 = 100;

/// Snapshot of one phone for sync queries
#[derive(Debug, Clone)]
pub struct PhoneSummary {
    /// Capability currently in effect
    pub capability: RadioAccessFamily,
    /// Everything the phone's hardware supports
    pub supported: RadioAccessFamily,
    /// Logical modem serving the phone
    pub modem_id: ModemId,
    /// Transaction status
    pub status: SlotStatus,
    /// Radio power state
    pub radio_state: RadioState,
}

/// Everything needed to attach one modem to the coordinator
#[derive(Debug)]
pub struct ModemRegistration {
    /// Metadata about the modem link
    pub meta: ModemLinkMeta,
    /// Initial capability, supported mask, and logical modem id
    pub descriptor: PhoneDescriptor,
    /// Channel requests for this modem are forwarded to
    pub request_tx: mpsc::Sender<ModemRequest>,
}

/// Radio state condition a watcher subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateWatch {
    /// Every transition (fires immediately on subscribe)
    Changed,
    /// Radio turned on
    On,
    /// Radio became reachable
    Available,
    /// Radio became unreachable
    NotAvailable,
    /// Radio left the on state
    OffOrNotAvailable,
}

/// Commands sent to the coordinator actor
#[derive(Debug)]
pub enum SwitchActorCommand {
    /// Register a new modem with the coordinator
    RegisterModem {
        /// Link, metadata and initial configuration
        registration: ModemRegistration,
        /// Channel to send back the assigned phone slot
        response: oneshot::Sender<PhoneId>,
    },

    /// Request a new capability assignment, one entry per phone
    SetCapability {
        /// Requested access family per phone slot
        requested: Vec<RadioAccessFamily>,
        /// Channel to send back acceptance or rejection
        response: oneshot::Sender<Result<SetOutcome, SwitchError>>,
    },

    /// Process a message from a modem (ack, notification, or radio
    /// state change)
    ModemResponse {
        /// The message
        response: ModemResponse,
    },

    /// Query the state of a specific phone
    QueryPhoneState {
        /// Phone to query
        phone_id: PhoneId,
        /// Channel to send back the snapshot (or None if not found)
        response: oneshot::Sender<Option<PhoneSummary>>,
    },

    /// Query the least and most capable supported masks across phones
    QueryCapabilityRange {
        /// Channel to send back (min, max)
        response: oneshot::Sender<(RadioAccessFamily, RadioAccessFamily)>,
    },

    /// Subscribe to one phone's radio state
    WatchRadioState {
        /// Phone to watch
        phone_id: PhoneId,
        /// Condition to watch for
        watch: StateWatch,
        /// Subscriber identity
        id: SubscriberId,
        /// Channel notifications are delivered on
        tx: mpsc::UnboundedSender<RadioState>,
    },

    /// Drop one phone's radio state subscription
    UnwatchRadioState {
        /// Phone being watched
        phone_id: PhoneId,
        /// Subscriber identity used at registration
        id: SubscriberId,
    },

    /// Replace the whole modem set (multi-SIM configuration change).
    /// A transaction in flight is force-aborted.
    ReconfigureModems {
        /// One registration per phone slot
        modems: Vec<ModemRegistration>,
    },

    /// Report an error from an async task (emits SwitchEvent::Error)
    ReportError {
        /// Source of the error (e.g. "modem0")
        source: String,
        /// Error message
        message: String,
    },

    /// Shutdown the actor
    Shutdown,
}

/// Internal state for the coordinator actor
struct SwitchActorState {
    /// The transaction engine
    coordinator: CapabilityCoordinator,
    /// Outbound links to each phone's modem task
    links: HashMap<PhoneId, ModemLink>,
    /// Radio power state watches, one per phone
    watches: HashMap<PhoneId, RadioStateWatch>,
}

impl SwitchActorState {
    fn new(config: CoordinatorConfig) -> Self {
        Self {
            coordinator: CapabilityCoordinator::with_config(config),
            links: HashMap::new(),
            watches: HashMap::new(),
        }
    }
}

/// Push buffered engine output out: requests to the per-phone modem
/// links, events to the event channel.
///
/// Synthesized acks for dead links feed straight back into the
/// engine, which can buffer further requests (FINISH after a failed
/// START, rollback after a failed FINISH), so the request loop runs
/// until the buffer stays empty.
async fn flush_engine(state: &mut SwitchActorState, event_tx: &mpsc::Sender<SwitchEvent>) {
    loop {
        let requests = state.coordinator.drain_requests();
        if requests.is_empty() {
            break;
        }
        for (phone_id, request) in requests {
            let delivered = match state.links.get(&phone_id) {
                Some(link) => link.request_tx.send(request.clone()).await.is_ok(),
                None => false,
            };
            if delivered {
                continue;
            }
            if let ModemRequest::SetCapability { cap } = request {
                warn!(
                    phone = phone_id.as_u32(),
                    phase = cap.phase.name(),
                    "modem link down, answering locally"
                );
                state
                    .coordinator
                    .process_modem_response(ModemResponse::CapabilityAck {
                        phone_id,
                        cap,
                        error: Some(ModemError::RadioNotAvailable),
                    });
            } else {
                debug!(
                    phone = phone_id.as_u32(),
                    request = request.name(),
                    "dropping request for dead modem link"
                );
            }
        }
    }

    for event in state.coordinator.drain_events() {
        let _ = event_tx.send(event).await;
    }
}

/// Run the coordinator actor until a `Shutdown` command arrives or
/// the command channel closes.
///
/// # Arguments
///
/// * `config` - Coordinator configuration
/// * `cmd_rx` - Receiver for commands sent to the actor
/// * `event_tx` - Sender for events emitted by the actor
pub async fn run_switch_actor(
    config: CoordinatorConfig,
    mut cmd_rx: mpsc::Receiver<SwitchActorCommand>,
    event_tx: mpsc::Sender<SwitchEvent>,
) {
    let mut state = SwitchActorState::new(config);
    info!("Coordinator actor started");

    // Deadline poll timer - fails a transaction whose phones never
    // all answered
    let mut timeout_timer = interval(Duration::from_millis(TIMEOUT_POLL_INTERVAL_MS));
    timeout_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break; };
                match cmd {
            SwitchActorCommand::RegisterModem {
                registration,
                response,
            } => {
                let ModemRegistration {
                    meta,
                    descriptor,
                    request_tx,
                } = registration;

                let phone_id = state.coordinator.add_phone(descriptor);
                state
                    .links
                    .insert(phone_id, ModemLink::new(meta.clone(), request_tx));
                // Modems report in once their task is up; until then
                // the radio counts as unreachable
                state
                    .watches
                    .insert(phone_id, RadioStateWatch::new(RadioState::Unavailable));

                let _ = response.send(phone_id);
                let _ = event_tx
                    .send(SwitchEvent::PhoneAdded { phone_id, meta })
                    .await;

                info!("Registered modem: {}", phone_id);
            }

            SwitchActorCommand::SetCapability {
                requested,
                response,
            } => {
                let result = state.coordinator.set_capability(&requested);
                let _ = response.send(result);
                flush_engine(&mut state, &event_tx).await;
            }

            SwitchActorCommand::ModemResponse { response } => match response {
                ModemResponse::RadioStateChanged {
                    phone_id,
                    state: radio_state,
                } => {
                    if let Some(watch) = state.watches.get_mut(&phone_id) {
                        watch.set_state(radio_state, false);
                    } else {
                        warn!(
                            phone = phone_id.as_u32(),
                            "radio state for unknown phone"
                        );
                    }
                }
                other => {
                    state.coordinator.process_modem_response(other);
                    flush_engine(&mut state, &event_tx).await;
                }
            },

            SwitchActorCommand::QueryPhoneState { phone_id, response } => {
                let summary = state.coordinator.slot(phone_id).map(|slot| PhoneSummary {
                    capability: slot.capability,
                    supported: slot.supported,
                    modem_id: slot.modem_id.clone(),
                    status: slot.status,
                    radio_state: state
                        .watches
                        .get(&phone_id)
                        .map(|w| w.state())
                        .unwrap_or(RadioState::Unavailable),
                });
                let _ = response.send(summary);
            }

            SwitchActorCommand::QueryCapabilityRange { response } => {
                let _ = response.send((
                    state.coordinator.min_supported_capability(),
                    state.coordinator.max_supported_capability(),
                ));
            }

            SwitchActorCommand::WatchRadioState {
                phone_id,
                watch,
                id,
                tx,
            } => {
                if let Some(w) = state.watches.get_mut(&phone_id) {
                    match watch {
                        StateWatch::Changed => w.subscribe_state_changed(id, tx),
                        StateWatch::On => w.subscribe_on(id, tx),
                        StateWatch::Available => w.subscribe_available(id, tx),
                        StateWatch::NotAvailable => w.subscribe_not_available(id, tx),
                        StateWatch::OffOrNotAvailable => {
                            w.subscribe_off_or_not_available(id, tx)
                        }
                    }
                } else {
                    warn!(phone = phone_id.as_u32(), "watch for unknown phone");
                }
            }

            SwitchActorCommand::UnwatchRadioState { phone_id, id } => {
                if let Some(w) = state.watches.get_mut(&phone_id) {
                    w.unsubscribe(id);
                }
            }

            SwitchActorCommand::ReconfigureModems { modems } => {
                let count = modems.len();
                state.links.clear();

                let mut descriptors = Vec::with_capacity(count);
                for (i, reg) in modems.into_iter().enumerate() {
                    let phone_id = PhoneId(i as u32);
                    state
                        .links
                        .insert(phone_id, ModemLink::new(reg.meta, reg.request_tx));
                    // Surviving phones keep their watch (and its
                    // subscribers); new slots start unreachable
                    state
                        .watches
                        .entry(phone_id)
                        .or_insert_with(|| RadioStateWatch::new(RadioState::Unavailable));
                    descriptors.push(reg.descriptor);
                }
                state.watches.retain(|id, _| id.as_index() < count);

                state.coordinator.reconfigure_phones(descriptors);
                flush_engine(&mut state, &event_tx).await;

                info!("Reconfigured to {} modems", count);
            }

            SwitchActorCommand::ReportError { source, message } => {
                let _ = event_tx.send(SwitchEvent::Error { source, message }).await;
            }

            SwitchActorCommand::Shutdown => {
                info!("Coordinator actor shutting down");
                break;
            }
                }
            }
            _ = timeout_timer.tick() => {
                state.coordinator.poll_deadline(Instant::now());
                flush_engine(&mut state, &event_tx).await;
            }
        }
    }

    info!("Coordinator actor stopped");
}
