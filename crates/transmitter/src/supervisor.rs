use crate::TransmitterConfig;
use crate::error::Result;
use crate::worker::TransmitterWorker;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of one pass over the watch pattern.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct RescanReport {
    /// Regular files currently matching the pattern.
    pub matched: usize,

    /// Workers started for paths seen for the first time.
    pub spawned: usize,

    /// Workers started to replace ones that had exited.
    pub respawned: usize,
}

/// Keeps exactly one live worker per file matching the watch pattern.
///
/// The worker map is only touched from the supervisor's own loop. Paths that
/// stop matching keep their record (and their worker, which keeps tailing the
/// old handle) for the life of the supervisor.
pub(crate) struct Supervisor {
    config: TransmitterConfig,
    workers: HashMap<PathBuf, JoinHandle<Result<()>>>,
    shutdown_token: CancellationToken,
}

impl Supervisor {
    pub(crate) fn new(config: TransmitterConfig, shutdown_token: CancellationToken) -> Self {
        Self {
            config,
            workers: HashMap::new(),
            shutdown_token,
        }
    }

    /// Rescans every `rescan_interval` until cancelled, then waits for workers.
    pub(crate) async fn run(mut self) {
        info!(
            "watching {} every {:?}",
            self.config.pattern, self.config.rescan_interval
        );

        loop {
            match self.rescan().await {
                Ok(report) if report.spawned > 0 || report.respawned > 0 => {
                    info!(
                        "rescan matched {} files: {} new workers, {} restarted",
                        report.matched, report.spawned, report.respawned
                    );
                }
                Ok(_) => {}
                Err(e) => error!("rescan failed: {}", e),
            }

            tokio::select! {
                () = self.shutdown_token.cancelled() => break,
                () = tokio::time::sleep(self.config.rescan_interval) => {}
            }
        }

        for (path, handle) in self.workers.drain() {
            log_exit(&path, handle.await);
        }

        info!("transmitter supervisor stopped");
    }

    /// Expands the pattern and starts a worker for every matching file that
    /// has none, or whose worker has exited.
    pub(crate) async fn rescan(&mut self) -> Result<RescanReport> {
        let mut report = RescanReport::default();
        let entries: Vec<_> = glob::glob(&self.config.pattern)?.collect();

        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!("skipping unreadable path {}: {}", e.path().display(), e.error());
                    continue;
                }
            };

            if !path.is_file() {
                debug!("skipping {}: not a regular file", path.display());
                continue;
            }

            report.matched += 1;

            match self.workers.remove(&path) {
                Some(handle) if !handle.is_finished() => {
                    self.workers.insert(path, handle);
                    continue;
                }
                Some(handle) => {
                    log_exit(&path, handle.await);
                    report.respawned += 1;
                }
                None => report.spawned += 1,
            }

            let handle = self.spawn_worker(path.clone());
            self.workers.insert(path, handle);
        }

        let unmatched = self.workers.len().saturating_sub(report.matched);
        if unmatched > 0 {
            debug!("{} worker records kept for paths no longer matching", unmatched);
        }

        Ok(report)
    }

    /// Whether a worker for `path` is recorded and still running.
    pub(crate) fn is_worker_alive(&self, path: &Path) -> bool {
        self.workers
            .get(path)
            .is_some_and(|handle| !handle.is_finished())
    }

    fn spawn_worker(&self, path: PathBuf) -> JoinHandle<Result<()>> {
        debug!("starting worker for {}", path.display());

        let worker = TransmitterWorker::new(&self.config, path, self.shutdown_token.clone());
        tokio::spawn(worker.run())
    }
}

fn log_exit(path: &Path, outcome: std::result::Result<Result<()>, tokio::task::JoinError>) {
    match outcome {
        Ok(Ok(())) => debug!("worker for {} exited", path.display()),
        Ok(Err(e)) => warn!("worker for {} failed: {}", path.display(), e),
        Err(e) if e.is_cancelled() => warn!("worker for {} was aborted", path.display()),
        Err(e) => error!("worker for {} panicked: {}", path.display(), e),
    }
}
