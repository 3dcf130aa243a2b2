//! Crossbar Daemon
//!
//! Headless host process for the multi-phone capability coordinator.
//! Virtual modems stand in for vendor RIL links; the daemon wires them
//! to the switch actor and a device state policy actor, then walks
//! through a capability swap and a screen-off policy transition.
//!
//! # Architecture
//!
//! ```text
//! main <--commands/events--> switch actor <--requests/acks--> modem tasks
//!                            policy actor ----requests-----------^
//! ```

mod settings;

use anyhow::{anyhow, bail, Context};
use settings::DaemonSettings;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use xbar_policy::{run_policy_actor, DeviceStateEvent, PolicyActorCommand, PolicyEvent};
use xbar_ril::{ModemId, PhoneId, RadioAccessFamily, RadioState};
use xbar_sim::{run_virtual_modem_task, VirtualModem};
use xbar_switch::{
    run_switch_actor, CoordinatorConfig, ModemLinkMeta, ModemRegistration, PhoneDescriptor,
    PhoneSummary, SetOutcome, SwitchActorCommand, SwitchEvent,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    // Include all our crates in the default filter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "crossbard=info,xbar_ril=info,xbar_fanout=info,xbar_switch=info,\
                 xbar_policy=info,xbar_sim=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Crossbar capability daemon");

    let settings = DaemonSettings::load()?;
    if settings.phones.is_empty() {
        bail!("settings configure no phones");
    }
    info!(
        phones = settings.phones.len(),
        timeout_ms = settings.transaction_timeout_ms,
        "settings loaded"
    );

    // Coordinator actor
    let (switch_tx, switch_rx) = mpsc::channel(32);
    let (event_tx, mut event_rx) = mpsc::channel(32);
    let switch_handle = tokio::spawn(run_switch_actor(
        CoordinatorConfig {
            timeout_ms: settings.transaction_timeout_ms,
        },
        switch_rx,
        event_tx,
    ));

    // One virtual modem per configured phone. Register first so the
    // coordinator knows the slot before the modem's initial radio
    // state report arrives.
    let mut request_txs = Vec::new();
    let mut modem_handles = Vec::new();
    for (index, phone) in settings.phones.iter().enumerate() {
        let supported = phone
            .supported_raf()
            .with_context(|| format!("phone {index} supported mask"))?;
        let capability = phone
            .capability_raf()
            .with_context(|| format!("phone {index} starting capability"))?;
        let modem_name = format!("modem{index}");

        let (request_tx, request_rx) = mpsc::channel(32);
        let (response_tx, mut response_rx) = mpsc::channel(32);

        let (reg_tx, reg_rx) = oneshot::channel();
        switch_tx
            .send(SwitchActorCommand::RegisterModem {
                registration: ModemRegistration {
                    meta: ModemLinkMeta::new_virtual(modem_name.clone(), format!("sim-{index}")),
                    descriptor: PhoneDescriptor {
                        capability,
                        supported,
                        modem_id: ModemId::new(modem_name.as_str()),
                    },
                    request_tx: request_tx.clone(),
                },
                response: reg_tx,
            })
            .await
            .map_err(|_| anyhow!("coordinator actor is gone"))?;
        let phone_id = reg_rx.await.context("coordinator dropped registration")?;

        let mut modem = VirtualModem::with_config(
            phone_id,
            ModemId::new(modem_name.as_str()),
            supported,
            capability,
            phone.modem.clone(),
        );
        modem.set_radio_state(RadioState::On);
        modem_handles.push(tokio::spawn(run_virtual_modem_task(
            modem,
            request_rx,
            response_tx,
        )));

        // Forward modem responses into the coordinator
        let forward_tx = switch_tx.clone();
        tokio::spawn(async move {
            while let Some(response) = response_rx.recv().await {
                if forward_tx
                    .send(SwitchActorCommand::ModemResponse { response })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        info!(
            phone = phone_id.as_u32(),
            modem = %modem_name,
            supported = %supported,
            capability = %capability,
            "phone registered"
        );
        request_txs.push(request_tx);
    }

    // Device state policy for the default data phone
    let (policy_tx, policy_rx) = mpsc::channel(32);
    let (policy_event_tx, mut policy_event_rx) = mpsc::channel(32);
    let policy_handle = tokio::spawn(run_policy_actor(
        settings.policy.clone(),
        policy_rx,
        request_txs[0].clone(),
        policy_event_tx,
    ));
    let policy_log_handle = tokio::spawn(async move {
        while let Some(event) = policy_event_rx.recv().await {
            match event {
                PolicyEvent::HighPowerChanged(high) => {
                    info!(high, "device power class changed")
                }
            }
        }
    });

    // The modems came up powered on; tell the policy so it settles
    // into its working state.
    policy_tx
        .send(PolicyActorCommand::DeviceState {
            event: DeviceStateEvent::RadioOn,
        })
        .await
        .map_err(|_| anyhow!("policy actor is gone"))?;

    // ---------------------------------------------------------------------
    // Demonstration: rotate every phone's capability one slot left
    // ---------------------------------------------------------------------
    let mut current = Vec::new();
    for index in 0..request_txs.len() {
        let summary = query_phone(&switch_tx, PhoneId(index as u32)).await?;
        info!(
            phone = index,
            capability = %summary.capability,
            modem = %summary.modem_id,
            "phone state before swap"
        );
        current.push(summary.capability);
    }

    let requested: Vec<RadioAccessFamily> = (0..current.len())
        .map(|i| current[(i + 1) % current.len()])
        .collect();

    let (set_tx, set_rx) = oneshot::channel();
    switch_tx
        .send(SwitchActorCommand::SetCapability {
            requested,
            response: set_tx,
        })
        .await
        .map_err(|_| anyhow!("coordinator actor is gone"))?;
    match set_rx.await.context("coordinator dropped the request")?? {
        SetOutcome::Started { session } => {
            info!(%session, "capability swap accepted");
            let outcome = wait_for_terminal(&mut event_rx).await?;
            if matches!(outcome, SwitchEvent::CapabilitySetFailed) {
                warn!("capability swap did not take effect");
            }
        }
        SetOutcome::NoChange => info!("every phone already holds its requested capability"),
    }

    for index in 0..request_txs.len() {
        let summary = query_phone(&switch_tx, PhoneId(index as u32)).await?;
        info!(
            phone = index,
            capability = %summary.capability,
            modem = %summary.modem_id,
            "phone state after swap"
        );
    }

    // ---------------------------------------------------------------------
    // Demonstration: screen off drops the default data phone to the
    // idle reporting policy
    // ---------------------------------------------------------------------
    policy_tx
        .send(PolicyActorCommand::DeviceState {
            event: DeviceStateEvent::ScreenChanged(false),
        })
        .await
        .map_err(|_| anyhow!("policy actor is gone"))?;

    // Clean shutdown: policy first, then the coordinator (which drops
    // its modem request senders), then the modem tasks run dry.
    policy_tx
        .send(PolicyActorCommand::Shutdown)
        .await
        .map_err(|_| anyhow!("policy actor is gone"))?;
    policy_handle.await.context("policy actor panicked")?;
    policy_log_handle
        .await
        .context("policy event logger panicked")?;

    switch_tx
        .send(SwitchActorCommand::Shutdown)
        .await
        .map_err(|_| anyhow!("coordinator actor is gone"))?;
    switch_handle.await.context("coordinator actor panicked")?;

    drop(request_txs);
    for handle in modem_handles {
        handle.await.context("modem task panicked")?;
    }

    info!("Crossbar daemon stopped");
    Ok(())
}

/// Ask the coordinator for one phone's snapshot.
async fn query_phone(
    switch_tx: &mpsc::Sender<SwitchActorCommand>,
    phone_id: PhoneId,
) -> anyhow::Result<PhoneSummary> {
    let (tx, rx) = oneshot::channel();
    switch_tx
        .send(SwitchActorCommand::QueryPhoneState {
            phone_id,
            response: tx,
        })
        .await
        .map_err(|_| anyhow!("coordinator actor is gone"))?;
    rx.await
        .context("coordinator dropped the query")?
        .with_context(|| format!("no phone in slot {}", phone_id.as_u32()))
}

/// Log coordinator events until a transaction reaches its terminal
/// outcome, and return that outcome.
async fn wait_for_terminal(
    event_rx: &mut mpsc::Receiver<SwitchEvent>,
) -> anyhow::Result<SwitchEvent> {
    while let Some(event) = event_rx.recv().await {
        log_switch_event(&event);
        if event.is_terminal() {
            return Ok(event);
        }
    }
    bail!("coordinator event channel closed mid-transaction")
}

fn log_switch_event(event: &SwitchEvent) {
    match event {
        SwitchEvent::PhoneAdded { phone_id, meta } => {
            info!(
                phone = phone_id.as_u32(),
                modem = %meta.display_name,
                "phone added"
            );
        }
        SwitchEvent::PhonesReconfigured { count } => info!(count, "phone set reconfigured"),
        SwitchEvent::TransactionStarted { session } => {
            info!(%session, "capability transaction started");
        }
        SwitchEvent::PhoneStatusChanged { phone_id, status } => {
            debug!(
                phone = phone_id.as_u32(),
                status = status.name(),
                "phone status"
            );
        }
        SwitchEvent::CapabilitySetDone { capabilities } => {
            for (phone_id, raf) in capabilities {
                info!(
                    phone = phone_id.as_u32(),
                    capability = %raf,
                    "capability committed"
                );
            }
        }
        SwitchEvent::CapabilitySetFailed => warn!("capability transaction failed"),
        SwitchEvent::Error { source, message } => {
            error!(source = %source, message = %message, "coordinator error");
        }
    }
}
