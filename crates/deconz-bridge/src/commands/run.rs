// ── Long-running bridge ──
//
// Starts the adapter, prints every host notification as a JSON line and
// unloads on Ctrl-C / SIGTERM. A failed first pairing pass is retried in the
// background; only a rejected API key ends the run.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use deconz_core::{Adapter, AdapterConfig, CoreError, HostNotification};

use super::print_json_line;
use crate::error::CliError;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn handle(config: AdapterConfig) -> Result<(), CliError> {
    let adapter = Adapter::new(config)?;
    let Some(notifications) = adapter.take_notifications().await else {
        return Err(CliError::Validation {
            field: "notifications".into(),
            reason: "receiver already taken".into(),
        });
    };
    let printer = tokio::spawn(print_notifications(notifications));

    let mut retry: Option<JoinHandle<()>> = None;
    match adapter.start().await {
        Ok(()) => {}
        Err(e @ CoreError::Unauthorized { .. }) => {
            adapter.unload().await;
            return Err(e.into());
        }
        Err(e) => {
            warn!(error = %e, "initial pairing failed, retrying in the background");
            retry = Some(tokio::spawn(retry_pairing(adapter.clone())));
        }
    }
    info!(devices = adapter.devices().len(), "bridge running");

    shutdown_signal().await;

    if let Some(retry) = retry {
        retry.abort();
        let _ = retry.await;
    }
    adapter.unload().await;
    drop(adapter);

    // every sender is gone once the adapter is dropped
    match tokio::time::timeout(DRAIN_TIMEOUT, printer).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            warn!(error = %e, "notification printer panicked");
            Ok(())
        }
        Err(_) => {
            warn!("notification printer did not drain in time");
            Ok(())
        }
    }
}

async fn print_notifications(
    mut notifications: UnboundedReceiver<HostNotification>,
) -> Result<(), CliError> {
    let mut stdout = std::io::stdout();
    while let Some(notification) = notifications.recv().await {
        let value = serde_json::to_value(&notification)?;
        print_json_line(&mut stdout.lock(), &value)?;
    }
    Ok(())
}

/// Repeat pairing passes with backoff until one succeeds.
async fn retry_pairing(adapter: Adapter) {
    let reconnect = adapter.config().reconnect.clone();
    let mut attempt: u32 = 0;
    loop {
        tokio::time::sleep(reconnect.delay_for(attempt)).await;
        match adapter.start_pairing().await {
            Ok(added) => {
                info!(added, attempt, "pairing succeeded after retrying");
                return;
            }
            Err(e) => {
                warn!(error = %e, attempt, "pairing retry failed");
                attempt = attempt.saturating_add(1);
            }
        }
    }
}

/// Wait for Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl-C, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
