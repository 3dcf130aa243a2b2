//! Policy Actor
//!
//! Async wrapper around [`DeviceStatePolicy`] for one phone. Device
//! state transitions come in as commands; the requests the policy
//! decides on go straight out to that phone's modem channel, and
//! policy events to whoever tracks device idle state.

use tokio::sync::mpsc;
use tracing::{debug, info};
use xbar_fanout::SubscriberId;
use xbar_ril::ModemRequest;

use crate::engine::{DeviceStateEvent, DeviceStatePolicy, PolicyConfig, PolicyEvent};

/// Commands sent to the policy actor
#[derive(Debug)]
pub enum PolicyActorCommand {
    /// Feed one device state transition into the policy
    DeviceState {
        /// The transition
        event: DeviceStateEvent,
    },

    /// Subscribe to deltas of the physical channel config filter bit
    WatchPhysicalChannel {
        /// Subscriber identity
        id: SubscriberId,
        /// Channel deltas are delivered on
        tx: mpsc::UnboundedSender<bool>,
    },

    /// Drop a physical channel subscription
    UnwatchPhysicalChannel {
        /// Subscriber identity used at registration
        id: SubscriberId,
    },

    /// Shutdown the actor
    Shutdown,
}

/// Run the policy actor until a `Shutdown` command arrives or the
/// command channel closes.
///
/// # Arguments
///
/// * `config` - Seed state for the policy inputs
/// * `cmd_rx` - Receiver for commands sent to the actor
/// * `request_tx` - Sender toward the governed modem
/// * `event_tx` - Sender for policy events
pub async fn run_policy_actor(
    config: PolicyConfig,
    mut cmd_rx: mpsc::Receiver<PolicyActorCommand>,
    request_tx: mpsc::Sender<ModemRequest>,
    event_tx: mpsc::Sender<PolicyEvent>,
) {
    let mut policy = DeviceStatePolicy::with_config(config);
    info!("Device state policy actor started");

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            PolicyActorCommand::DeviceState { event } => {
                policy.update(event);
                for request in policy.drain_requests() {
                    if request_tx.send(request).await.is_err() {
                        debug!("modem channel closed, dropping policy requests");
                        break;
                    }
                }
                for event in policy.drain_events() {
                    let _ = event_tx.send(event).await;
                }
            }

            PolicyActorCommand::WatchPhysicalChannel { id, tx } => {
                policy.watch_physical_channel(id, tx);
            }

            PolicyActorCommand::UnwatchPhysicalChannel { id } => {
                policy.unwatch_physical_channel(id);
            }

            PolicyActorCommand::Shutdown => {
                info!("Policy actor shutting down");
                break;
            }
        }
    }

    info!("Policy actor stopped");
}
