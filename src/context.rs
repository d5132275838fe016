//! Ambient request context
//!
//! The host integration (a web framework adapter, a job runner) exposes its
//! per-request key/value context through [`ContextProvider`]. The agent reads
//! it once per capture and never mutates it.

use std::collections::BTreeMap;
use std::future::Future;

/// Per-request key/value context
pub type AmbientContext = BTreeMap<String, String>;

/// Key holding the trace correlation id
pub const TRACE_ID_KEY: &str = "trace_id";

/// Key holding the span correlation id
pub const SPAN_ID_KEY: &str = "span_id";

pub trait ContextProvider: Send + Sync {
    fn current_context(&self) -> Option<AmbientContext>;
}

/// Provider for hosts without request context
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContext;

impl ContextProvider for NoContext {
    fn current_context(&self) -> Option<AmbientContext> {
        None
    }
}

impl<F> ContextProvider for F
where
    F: Fn() -> Option<AmbientContext> + Send + Sync,
{
    fn current_context(&self) -> Option<AmbientContext> {
        self()
    }
}

tokio::task_local! {
    static REQUEST_CONTEXT: AmbientContext;
}

/// Context carried in a tokio task-local for the duration of a request
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskLocalContext;

impl TaskLocalContext {
    /// Run `future` with `context` visible to captures made inside it
    pub async fn scope<F: Future>(context: AmbientContext, future: F) -> F::Output {
        REQUEST_CONTEXT.scope(context, future).await
    }
}

impl ContextProvider for TaskLocalContext {
    fn current_context(&self) -> Option<AmbientContext> {
        REQUEST_CONTEXT.try_with(|context| context.clone()).ok()
    }
}

/// Correlation ids split out of an ambient context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Correlation {
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    /// Remaining keys; `None` when nothing is left
    pub request: Option<AmbientContext>,
}

impl Correlation {
    pub fn from_context(context: Option<AmbientContext>) -> Self {
        let Some(mut context) = context else {
            return Self::default();
        };
        let trace_id = context.remove(TRACE_ID_KEY);
        let span_id = context.remove(SPAN_ID_KEY);
        Self {
            trace_id,
            span_id,
            request: (!context.is_empty()).then_some(context),
        }
    }
}
