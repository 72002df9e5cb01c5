//! Shipping side of logship: watches a glob pattern and tails every matching
//! file to a receiver, one worker per file.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod error;
mod supervisor;
mod worker;

pub use error::{Error, Result};
pub use worker::TransmitterWorker;

use supervisor::Supervisor;

use std::time::Duration;

use logship_protocol::DEFAULT_PORT;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

/// Transmitter configuration.
#[derive(Clone, Debug)]
pub struct TransmitterConfig {
    /// Receiver host name or address.
    pub host: String,

    /// Receiver port.
    pub port: u16,

    /// Glob pattern selecting the files to ship.
    pub pattern: String,

    /// Pause between scans of the pattern.
    pub rescan_interval: Duration,

    /// Limit on establishing each connection.
    pub connect_timeout: Duration,

    /// Largest read taken from a file before sending.
    pub chunk_size: usize,

    /// Pause after catching up with the end of a file.
    pub poll_interval: Duration,
}

impl TransmitterConfig {
    /// Creates a configuration shipping files matching `pattern` to `host:port`.
    pub fn new(host: impl Into<String>, port: u16, pattern: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            pattern: pattern.into(),
            rescan_interval: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(60),
            chunk_size: 4096,
            poll_interval: Duration::from_secs(1),
        }
    }

    /// Creates a configuration for a receiver on the default port.
    pub fn with_default_port(host: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(host, DEFAULT_PORT, pattern)
    }
}

/// Service running the transmitter supervisor loop.
pub struct Transmitter {
    config: TransmitterConfig,
    shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
}

impl Transmitter {
    /// Create a new `Transmitter`.
    #[must_use]
    pub fn new(config: TransmitterConfig) -> Self {
        Self {
            config,
            shutdown_token: CancellationToken::new(),
            task_tracker: TaskTracker::new(),
        }
    }

    /// Starts watching the pattern.
    ///
    /// The returned handle completes once the supervisor has stopped and every
    /// worker has exited.
    ///
    /// # Errors
    ///
    /// Returns an error if the transmitter is already started or the pattern
    /// is not a valid glob.
    pub fn start(&self) -> Result<JoinHandle<()>> {
        if self.task_tracker.is_closed() {
            return Err(Error::AlreadyStarted);
        }

        glob::Pattern::new(&self.config.pattern)?;

        let supervisor = Supervisor::new(self.config.clone(), self.shutdown_token.clone());
        let handle = self.task_tracker.spawn(supervisor.run());

        self.task_tracker.close();

        Ok(handle)
    }

    /// Stops the supervisor and every worker, waiting for them to exit.
    pub async fn shutdown(&self) {
        info!("transmitter shutting down...");

        self.shutdown_token.cancel();
        self.task_tracker.wait().await;

        info!("transmitter shutdown complete.");
    }
}
