//! Capture gate
//!
//! `Agent::capture` runs the call-site steps synchronously (locate, read the
//! ambient context) and hands the rest to a background task: ensure the
//! capture point is known, resolve its breakpoint, check policy, redact,
//! build the snapshot and ship it. Each step can end the capture with a
//! [`SkipReason`]; none of them can fail the caller.

use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::outcome::{CaptureOutcome, CaptureTicket, SkipReason};
use super::registrar::Registrar;
use super::stats::{AgentStats, StatsSnapshot};
use super::sync::{SyncLoop, SyncShared};
use crate::breakpoint::{BreakpointCache, BreakpointConfig, BreakpointVerdict, CapturePointIdentity};
use crate::config::{AgentConfig, ConfigError};
use crate::context::{AmbientContext, ContextProvider, Correlation, NoContext};
use crate::control_plane::{ControlPlane, ControlPlaneError, HttpControlPlane};
use crate::locator::{CallerLocator, LocatedCall, ANONYMOUS_FUNCTION};
use crate::redact::{CaptureValues, Redactor};
use crate::snapshot::{Snapshot, SourceLocation};
use crate::transport::{HttpTransport, SnapshotTransport, TransportError};

/// Errors building an agent. Nothing after construction returns an error.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build control plane client: {0}")]
    ControlPlane(#[from] ControlPlaneError),

    #[error("Failed to build snapshot transport: {0}")]
    Transport(#[from] TransportError),
}

pub struct AgentBuilder {
    config: AgentConfig,
    control_plane: Option<Arc<dyn ControlPlane>>,
    transport: Option<Arc<dyn SnapshotTransport>>,
    context: Option<Arc<dyn ContextProvider>>,
    locator: Option<CallerLocator>,
    redactor: Option<Redactor>,
}

impl AgentBuilder {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            control_plane: None,
            transport: None,
            context: None,
            locator: None,
            redactor: None,
        }
    }

    pub fn control_plane(mut self, control_plane: Arc<dyn ControlPlane>) -> Self {
        self.control_plane = Some(control_plane);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn SnapshotTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn context_provider(mut self, context: Arc<dyn ContextProvider>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn locator(mut self, locator: CallerLocator) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn redactor(mut self, redactor: Redactor) -> Self {
        self.redactor = Some(redactor);
        self
    }

    /// Validate the config and fill unset collaborators with HTTP defaults
    pub fn build(self) -> Result<Agent, AgentError> {
        self.config.validate()?;

        let control_plane: Arc<dyn ControlPlane> = match self.control_plane {
            Some(control_plane) => control_plane,
            None => Arc::new(HttpControlPlane::from_config(&self.config)?),
        };
        let transport: Arc<dyn SnapshotTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::from_config(&self.config)?),
        };

        let stats = Arc::new(AgentStats::default());
        let cache = Arc::new(BreakpointCache::new());
        let registrar = Arc::new(Registrar::new(
            self.config.service_name.clone(),
            Arc::clone(&control_plane),
            self.config.registration,
            self.config.request_timeout,
            Arc::clone(&stats),
        ));
        let sync = SyncLoop::new(SyncShared {
            service: self.config.service_name.clone(),
            client: control_plane,
            cache: Arc::clone(&cache),
            registrar: Arc::clone(&registrar),
            stats: Arc::clone(&stats),
            interval: self.config.sync_interval,
            timeout: self.config.request_timeout,
            apply_gate: Default::default(),
        });

        Ok(Agent {
            inner: Arc::new(AgentInner {
                config: self.config,
                cache,
                registrar,
                sync,
                locator: self.locator.unwrap_or_default(),
                redactor: self.redactor.unwrap_or_default(),
                transport,
                context: self.context.unwrap_or_else(|| Arc::new(NoContext)),
                stats,
            }),
        })
    }
}

/// Snapshot capture agent.
///
/// Construct once at startup and pass clones to call sites; clones share
/// the cache, registrations and sync loop. The sync loop stops when the
/// last clone is dropped.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

struct AgentInner {
    config: AgentConfig,
    cache: Arc<BreakpointCache>,
    registrar: Arc<Registrar>,
    sync: SyncLoop,
    locator: CallerLocator,
    redactor: Redactor,
    transport: Arc<dyn SnapshotTransport>,
    context: Arc<dyn ContextProvider>,
    stats: Arc<AgentStats>,
}

/// Everything gathered at the call site
struct CaptureRequest {
    label: String,
    values: CaptureValues,
    located: LocatedCall,
    context: Option<AmbientContext>,
    captured_at: DateTime<Utc>,
}

impl Agent {
    pub fn builder(config: AgentConfig) -> AgentBuilder {
        AgentBuilder::new(config)
    }

    /// Start the background sync loop. Idempotent; returns false without a runtime.
    pub fn start(&self) -> bool {
        self.inner.sync.start()
    }

    /// Stop the sync loop. Idempotent and callable from any thread.
    ///
    /// No fetch started by the loop updates the cache after this returns.
    pub fn stop(&self) {
        self.inner.sync.stop();
    }

    pub fn is_running(&self) -> bool {
        self.inner.sync.is_running()
    }

    /// Run one sync outside the loop. Returns whether the cache was replaced.
    pub async fn sync_now(&self) -> bool {
        self.inner.sync.shared().sync_once(None).await
    }

    pub fn config(&self) -> &AgentConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &BreakpointCache {
        &self.inner.cache
    }

    pub fn registrar(&self) -> &Registrar {
        &self.inner.registrar
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Record `values` at this call site if an armed breakpoint matches.
    ///
    /// Returns immediately. The ticket can be awaited for the outcome or
    /// dropped; either way nothing here panics or returns an error to the
    /// caller.
    ///
    /// Cost: with the default [`BacktraceResolver`](crate::BacktraceResolver)
    /// every call captures and symbolizes the whole stack on the calling
    /// thread, including calls at points with no armed breakpoint. The first
    /// call in a process also loads debug info. Hot paths should use a
    /// host-supplied resolver such as [`FixedFrameResolver`](crate::FixedFrameResolver)
    /// or turn the agent off with `enabled = false`, which returns before
    /// locating.
    #[track_caller]
    #[inline(never)]
    pub fn capture(&self, label: &str, values: CaptureValues) -> CaptureTicket {
        let caller = Location::caller();
        let inner = &self.inner;

        if !inner.config.enabled {
            return inner.finish_early(SkipReason::AgentDisabled);
        }

        // Must run on the caller's stack: FRAME_SKIP_DEPTH counts this frame.
        let located = match inner.locator.locate() {
            Some(located) => located,
            None if inner.config.caller_fallback => LocatedCall {
                location: SourceLocation {
                    file_path: caller.file().to_string(),
                    line_number: caller.line(),
                    function_name: ANONYMOUS_FUNCTION.to_string(),
                },
                stack_text: String::new(),
            },
            None => return inner.finish_early(SkipReason::NoLocation),
        };

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::debug!(label, "Capture called outside a tokio runtime");
                return inner.finish_early(SkipReason::NoRuntime);
            }
        };

        let request = CaptureRequest {
            label: label.to_string(),
            values,
            located,
            context: inner.context.current_context(),
            captured_at: Utc::now(),
        };

        let inner = Arc::clone(&self.inner);
        CaptureTicket::pending(runtime.spawn(async move { inner.process(request).await }))
    }
}

impl AgentInner {
    fn finish_early(&self, reason: SkipReason) -> CaptureTicket {
        self.stats.record_skipped();
        CaptureTicket::ready(CaptureOutcome::Skipped(reason))
    }

    async fn process(&self, request: CaptureRequest) -> CaptureOutcome {
        let label = request.label.clone();
        let outcome = self.run_gate(request).await;

        match &outcome {
            CaptureOutcome::Captured { snapshot_id } => {
                self.stats.record_captured();
                tracing::debug!(label = %label, %snapshot_id, "Snapshot captured");
            }
            CaptureOutcome::Skipped(reason) => {
                self.stats.record_skipped();
                tracing::debug!(label = %label, reason = %reason, "Capture skipped");
            }
            CaptureOutcome::ShipFailed => self.stats.record_ship_failure(),
        }
        outcome
    }

    async fn run_gate(&self, request: CaptureRequest) -> CaptureOutcome {
        let identity = CapturePointIdentity::new(&request.located.location, request.label.clone());

        if let Err(reason) = self.registrar.ensure_known(&identity, &self.cache).await {
            return CaptureOutcome::Skipped(reason);
        }

        let Some(config) = self.cache.get(&identity) else {
            return CaptureOutcome::Skipped(SkipReason::NotConfigured);
        };

        if let Some(reason) = policy_skip(&config, Utc::now()) {
            return CaptureOutcome::Skipped(reason);
        }

        if let Some(condition) = &config.condition {
            tracing::trace!(
                breakpoint = %config.id,
                condition = %condition,
                "Breakpoint condition not evaluated"
            );
        }

        let snapshot = self.assemble(&config, request);
        self.ship(snapshot).await
    }

    fn assemble(&self, config: &BreakpointConfig, request: CaptureRequest) -> Snapshot {
        let redaction = self.redactor.redact(&request.values);
        let correlation = Correlation::from_context(request.context);
        let stack_trace = if self.config.capture_stack {
            request.located.stack_text
        } else {
            String::new()
        };

        Snapshot {
            id: Uuid::new_v4(),
            breakpoint_id: config.id.clone(),
            service: self.config.service_name.clone(),
            label: request.label,
            location: request.located.location,
            variables: redaction.variables,
            findings: redaction.findings,
            stack_trace,
            trace_id: correlation.trace_id,
            span_id: correlation.span_id,
            request_context: correlation.request,
            captured_at: request.captured_at,
        }
    }

    async fn ship(&self, snapshot: Snapshot) -> CaptureOutcome {
        let timeout = self.config.request_timeout;
        let result = match tokio::time::timeout(timeout, self.transport.send(&snapshot)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(millis(timeout))),
        };

        match result {
            Ok(()) => CaptureOutcome::Captured {
                snapshot_id: snapshot.id,
            },
            Err(e) => {
                tracing::warn!(
                    breakpoint = %snapshot.breakpoint_id,
                    error = %e,
                    "Failed to ship snapshot"
                );
                CaptureOutcome::ShipFailed
            }
        }
    }
}

fn policy_skip(config: &BreakpointConfig, now: DateTime<Utc>) -> Option<SkipReason> {
    match config.verdict(now) {
        BreakpointVerdict::Armed => None,
        BreakpointVerdict::Disabled => Some(SkipReason::Disabled),
        BreakpointVerdict::Expired => Some(SkipReason::Expired),
        BreakpointVerdict::BudgetExhausted => Some(SkipReason::BudgetExhausted),
    }
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}
