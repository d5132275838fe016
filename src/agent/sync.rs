//! Periodic breakpoint sync
//!
//! Fetches the full breakpoint list for the service immediately on start and
//! then every interval, replacing the cache wholesale. A failed fetch leaves
//! the previous cache in place until the next tick.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::registrar::Registrar;
use super::stats::AgentStats;
use crate::breakpoint::BreakpointCache;
use crate::control_plane::{ControlPlane, ControlPlaneError};

pub(crate) struct SyncShared {
    pub(crate) service: String,
    pub(crate) client: Arc<dyn ControlPlane>,
    pub(crate) cache: Arc<BreakpointCache>,
    pub(crate) registrar: Arc<Registrar>,
    pub(crate) stats: Arc<AgentStats>,
    pub(crate) interval: Duration,
    pub(crate) timeout: Duration,
    /// Held while applying a fetch and while cancelling, so nothing lands
    /// in the cache once `stop` has returned.
    pub(crate) apply_gate: Mutex<()>,
}

impl SyncShared {
    /// Fetch once and replace the cache. Returns whether the cache was replaced.
    pub(crate) async fn sync_once(&self, token: Option<&CancellationToken>) -> bool {
        let fetched = match tokio::time::timeout(
            self.timeout,
            self.client.fetch_active_breakpoints(&self.service),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ControlPlaneError::Timeout(self.timeout.as_millis() as u64)),
        };

        let configs = match fetched {
            Ok(configs) => configs,
            Err(e) => {
                self.stats.record_sync(false);
                tracing::warn!(service = %self.service, error = %e, "Breakpoint sync failed");
                return false;
            }
        };

        let _gate = self.apply_gate.lock();
        if token.is_some_and(CancellationToken::is_cancelled) {
            tracing::debug!("Discarding breakpoint fetch that finished after stop");
            return false;
        }

        self.registrar
            .mark_known(configs.iter().filter_map(|config| config.primary_key()));
        let count = self.cache.replace_all(configs);
        self.stats.record_sync(true);
        tracing::debug!(service = %self.service, count, "Breakpoint cache synced");
        true
    }

    async fn run(self: Arc<Self>, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // First tick completes immediately
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = self.sync_once(Some(&token)) => {}
            }
        }

        tracing::debug!(service = %self.service, "Breakpoint sync loop stopped");
    }
}

struct RunningSync {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Start/stop handle for the background sync task
pub(crate) struct SyncLoop {
    shared: Arc<SyncShared>,
    running: Mutex<Option<RunningSync>>,
}

impl SyncLoop {
    pub(crate) fn new(shared: SyncShared) -> Self {
        Self {
            shared: Arc::new(shared),
            running: Mutex::new(None),
        }
    }

    pub(crate) fn shared(&self) -> &SyncShared {
        &self.shared
    }

    /// Spawn the loop on the current tokio runtime. No-op if already running.
    pub(crate) fn start(&self) -> bool {
        let mut running = self.running.lock();
        if running.is_some() {
            return true;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot start breakpoint sync outside a tokio runtime");
                return false;
            }
        };

        let token = CancellationToken::new();
        let handle = runtime.spawn(Arc::clone(&self.shared).run(token.clone()));
        *running = Some(RunningSync { token, handle });
        tracing::debug!(
            service = %self.shared.service,
            interval_ms = self.shared.interval.as_millis() as u64,
            "Breakpoint sync loop started"
        );
        true
    }

    /// Cancel the loop. Safe to call repeatedly and from any thread.
    pub(crate) fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };

        {
            let _gate = self.shared.apply_gate.lock();
            running.token.cancel();
        }
        running.handle.abort();
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }
}

impl Drop for SyncLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
