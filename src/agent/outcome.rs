use tokio::task::JoinHandle;
use uuid::Uuid;

/// Why a capture call produced no snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Agent-wide kill switch is off
    AgentDisabled,
    /// Call site could not be resolved
    NoLocation,
    /// Called outside a tokio runtime
    NoRuntime,
    /// Another call is registering the same capture point
    RegistrationPending,
    RegistrationFailed,
    /// Registration failed too often and is no longer attempted
    RegistrationFenced,
    /// Known capture point with no cached breakpoint
    NotConfigured,
    Disabled,
    Expired,
    BudgetExhausted,
    /// The background capture task panicked or was cancelled
    Aborted,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::AgentDisabled => "agent_disabled",
            SkipReason::NoLocation => "no_location",
            SkipReason::NoRuntime => "no_runtime",
            SkipReason::RegistrationPending => "registration_pending",
            SkipReason::RegistrationFailed => "registration_failed",
            SkipReason::RegistrationFenced => "registration_fenced",
            SkipReason::NotConfigured => "not_configured",
            SkipReason::Disabled => "disabled",
            SkipReason::Expired => "expired",
            SkipReason::BudgetExhausted => "budget_exhausted",
            SkipReason::Aborted => "aborted",
        }
    }

    /// Expected no-op outcomes, as opposed to failures
    pub fn is_policy(&self) -> bool {
        matches!(
            self,
            SkipReason::AgentDisabled
                | SkipReason::NotConfigured
                | SkipReason::Disabled
                | SkipReason::Expired
                | SkipReason::BudgetExhausted
        )
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a single capture call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Captured { snapshot_id: Uuid },
    Skipped(SkipReason),
    /// Snapshot was built but the transport failed; it is not retried
    ShipFailed,
}

impl CaptureOutcome {
    pub fn is_captured(&self) -> bool {
        matches!(self, CaptureOutcome::Captured { .. })
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            CaptureOutcome::Skipped(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Handle to an in-progress capture.
///
/// Dropping the ticket leaves the capture running in the background.
#[derive(Debug)]
pub struct CaptureTicket {
    inner: TicketInner,
}

#[derive(Debug)]
enum TicketInner {
    Ready(CaptureOutcome),
    Pending(JoinHandle<CaptureOutcome>),
}

impl CaptureTicket {
    pub(crate) fn ready(outcome: CaptureOutcome) -> Self {
        Self {
            inner: TicketInner::Ready(outcome),
        }
    }

    pub(crate) fn pending(handle: JoinHandle<CaptureOutcome>) -> Self {
        Self {
            inner: TicketInner::Pending(handle),
        }
    }

    /// True when the outcome was decided without spawning work
    pub fn is_ready(&self) -> bool {
        matches!(self.inner, TicketInner::Ready(_))
    }

    /// Wait for the capture to finish. Never fails.
    pub async fn outcome(self) -> CaptureOutcome {
        match self.inner {
            TicketInner::Ready(outcome) => outcome,
            TicketInner::Pending(handle) => match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(error = %e, "Capture task did not complete");
                    CaptureOutcome::Skipped(SkipReason::Aborted)
                }
            },
        }
    }
}
