use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cancels `cancel` on SIGINT/SIGTERM (Ctrl+C on windows).
pub async fn on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigint, mut sigterm) = match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(i), Ok(t)) => (i, t),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(error = %e, "Failed to install signal handlers");
                return;
            }
        };
        tokio::select! {
            _ = sigint.recv()  => info!("SIGINT received - shutting down"),
            _ = sigterm.recv() => info!("SIGTERM received - shutting down"),
            () = cancel.cancelled() => return,
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            r = tokio::signal::ctrl_c() => match r {
                Ok(()) => info!("Ctrl+C received - shutting down"),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                    return;
                }
            },
            () = cancel.cancelled() => return,
        }
    }

    cancel.cancel();
}
