mod rx;
mod tx;

pub use rx::rx;
pub use tx::tx;

use crate::error::{Error, Result};

use tracing::info;

/// Resolves once the process is asked to stop.
#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| Error::Io("failed to create SIGTERM signal", e))?;

    tokio::select! {
        _ = sigterm.recv() => {
            info!("received SIGTERM, initiating shutdown");
        }
        result = tokio::signal::ctrl_c() => {
            result.map_err(|e| Error::Io("failed to listen for SIGINT", e))?;
            info!("received SIGINT, initiating shutdown");
        }
    }

    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| Error::Io("failed to listen for ctrl-c", e))?;

    info!("received ctrl-c, initiating shutdown");

    Ok(())
}
