//! Virtual modem actor task
//!
//! This module provides a pure async task that owns a VirtualModem
//! and pumps it over channels: requests in, responses out, with an
//! optional per-request delay to model modem latency.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info};
use xbar_ril::{ModemRequest, ModemResponse};

use crate::VirtualModem;

/// Run the virtual modem task.
///
/// Pending output queued before spawn (an initial radio power state,
/// typically) goes out first. The task exits when either channel
/// closes.
pub async fn run_virtual_modem_task(
    mut modem: VirtualModem,
    mut request_rx: mpsc::Receiver<ModemRequest>,
    response_tx: mpsc::Sender<ModemResponse>,
) {
    info!("Starting virtual modem task for {}", modem.modem_id());

    while let Some(response) = modem.take_output() {
        if response_tx.send(response).await.is_err() {
            return;
        }
    }

    while let Some(request) = request_rx.recv().await {
        debug!(
            modem = %modem.modem_id(),
            request = request.name(),
            "handling request"
        );
        modem.handle_request(request);

        let delay_ms = modem.config().response_delay_ms;
        if delay_ms > 0 {
            sleep(Duration::from_millis(delay_ms)).await;
        }

        while let Some(response) = modem.take_output() {
            if response_tx.send(response).await.is_err() {
                debug!("response channel closed for {}", modem.modem_id());
                return;
            }
        }
    }

    info!("Virtual modem task stopped for {}", modem.modem_id());
}
