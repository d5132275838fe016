//! Auto-registration of newly seen capture points
//!
//! Tracks one entry per `function:label` identity. An identity in flight
//! admits no second request; a registered identity is never sent again.
//! Failures are retried on the next capture unless the policy fences them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::outcome::SkipReason;
use super::stats::AgentStats;
use crate::breakpoint::{BreakpointCache, CapturePointIdentity};
use crate::config::RegistrationPolicy;
use crate::control_plane::{CapturePointRegistration, ControlPlane, ControlPlaneError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    InFlight { failures: u32 },
    Registered,
    Failed(u32),
    Fenced,
}

enum Admission {
    Known,
    Proceed { failures: u32 },
    Pending,
    Fenced,
}

pub struct Registrar {
    service: String,
    client: Arc<dyn ControlPlane>,
    policy: RegistrationPolicy,
    timeout: Duration,
    stats: Arc<AgentStats>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl Registrar {
    pub fn new(
        service: impl Into<String>,
        client: Arc<dyn ControlPlane>,
        policy: RegistrationPolicy,
        timeout: Duration,
        stats: Arc<AgentStats>,
    ) -> Self {
        Self {
            service: service.into(),
            client,
            policy,
            timeout,
            stats,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_known(&self, key: &str) -> bool {
        matches!(self.entries.lock().get(key), Some(Entry::Registered))
    }

    /// Mark identities the server already knows about (from a sync)
    pub fn mark_known<I>(&self, keys: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut entries = self.entries.lock();
        for key in keys {
            // An in-flight request still owns its entry; it settles itself.
            if !matches!(entries.get(&key), Some(Entry::InFlight { .. })) {
                entries.insert(key, Entry::Registered);
            }
        }
    }

    /// Forget every identity, registered or failed
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Make sure `identity` is known to the control plane.
    ///
    /// On a successful registration the returned config is seeded into
    /// `cache`. Any failure is logged and mapped to a [`SkipReason`].
    pub async fn ensure_known(
        &self,
        identity: &CapturePointIdentity,
        cache: &BreakpointCache,
    ) -> Result<(), SkipReason> {
        let key = identity.primary_key();

        let failures = match self.admit(&key, cache.get(identity).is_some()) {
            Admission::Known => return Ok(()),
            Admission::Pending => return Err(SkipReason::RegistrationPending),
            Admission::Fenced => return Err(SkipReason::RegistrationFenced),
            Admission::Proceed { failures } => failures,
        };

        let mut guard = InFlightGuard {
            registrar: self,
            key: &key,
            failures,
            settled: false,
        };

        let registration = CapturePointRegistration::new(self.service.clone(), identity);
        let result = match tokio::time::timeout(
            self.timeout,
            self.client.register_capture_point(&registration),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ControlPlaneError::Timeout(self.timeout.as_millis() as u64)),
        };

        match result {
            Ok(config) => {
                cache.seed(identity, config);
                guard.settle(Entry::Registered);
                self.stats.record_registration(true);
                tracing::debug!(identity = %identity, "Registered capture point");
                Ok(())
            }
            Err(e) => {
                let failures = failures + 1;
                let fenced = self.policy.max_failures.is_some_and(|max| failures >= max);
                guard.settle(if fenced {
                    Entry::Fenced
                } else {
                    Entry::Failed(failures)
                });
                self.stats.record_registration(false);
                tracing::warn!(
                    identity = %identity,
                    error = %e,
                    failures,
                    fenced,
                    "Capture point registration failed"
                );
                Err(SkipReason::RegistrationFailed)
            }
        }
    }

    fn admit(&self, key: &str, cached: bool) -> Admission {
        let mut entries = self.entries.lock();
        match entries.get(key).copied() {
            Some(Entry::Registered) => Admission::Known,
            Some(Entry::InFlight { .. }) => Admission::Pending,
            Some(Entry::Fenced) => Admission::Fenced,
            // The server already sent us a breakpoint for this label.
            _ if cached => {
                entries.insert(key.to_string(), Entry::Registered);
                Admission::Known
            }
            Some(Entry::Failed(failures)) => {
                entries.insert(key.to_string(), Entry::InFlight { failures });
                Admission::Proceed { failures }
            }
            None => {
                entries.insert(key.to_string(), Entry::InFlight { failures: 0 });
                Admission::Proceed { failures: 0 }
            }
        }
    }
}

/// Resets an in-flight entry if the registering task is dropped mid-request
struct InFlightGuard<'a> {
    registrar: &'a Registrar,
    key: &'a str,
    failures: u32,
    settled: bool,
}

impl InFlightGuard<'_> {
    fn settle(&mut self, entry: Entry) {
        self.registrar
            .entries
            .lock()
            .insert(self.key.to_string(), entry);
        self.settled = true;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let entry = if self.failures == 0 {
                None
            } else {
                Some(Entry::Failed(self.failures))
            };
            let mut entries = self.registrar.entries.lock();
            match entry {
                Some(entry) => {
                    entries.insert(self.key.to_string(), entry);
                }
                None => {
                    entries.remove(self.key);
                }
            }
        }
    }
}
