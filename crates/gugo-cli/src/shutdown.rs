use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Cancels `cancel` on the first Ctrl+C or SIGTERM. A second Ctrl+C exits
/// immediately.
pub(crate) fn spawn_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        if !wait_for_signal().await {
            return;
        }
        warn!("shutdown requested, cancelling in-flight work");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("second interrupt, exiting");
            std::process::exit(130);
        }
    });
}

#[cfg(unix)]
async fn wait_for_signal() -> bool {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(err) => {
            warn!(error = %err, "unable to listen for SIGTERM");
            return tokio::signal::ctrl_c().await.is_ok();
        }
    };
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.is_ok(),
        _ = terminate.recv() => true,
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> bool {
    tokio::signal::ctrl_c().await.is_ok()
}
