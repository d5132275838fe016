//! In-process control plane for tests and local development
//!
//! Serves a configurable breakpoint list, answers registrations from a
//! template, and records every call so tests can assert on traffic.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CapturePointRegistration, ControlPlane, ControlPlaneError};
use crate::breakpoint::BreakpointConfig;

#[derive(Default)]
pub struct MockControlPlane {
    breakpoints: Mutex<Vec<BreakpointConfig>>,
    /// Config returned by registration; identity fields are filled from the request
    registration_template: Mutex<Option<BreakpointConfig>>,
    registrations: Mutex<Vec<CapturePointRegistration>>,
    fetches: AtomicUsize,
    fail_fetches: AtomicBool,
    fail_registrations: AtomicBool,
    fetch_delay: Mutex<Duration>,
    registration_delay: Mutex<Duration>,
}

impl MockControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_breakpoints(self, breakpoints: Vec<BreakpointConfig>) -> Self {
        self.set_breakpoints(breakpoints);
        self
    }

    pub fn with_registration_template(self, template: BreakpointConfig) -> Self {
        *self.registration_template.lock() = Some(template);
        self
    }

    pub fn with_fetch_delay(self, delay: Duration) -> Self {
        *self.fetch_delay.lock() = delay;
        self
    }

    pub fn with_registration_delay(self, delay: Duration) -> Self {
        *self.registration_delay.lock() = delay;
        self
    }

    /// Replace the list served by the next fetch
    pub fn set_breakpoints(&self, breakpoints: Vec<BreakpointConfig>) {
        *self.breakpoints.lock() = breakpoints;
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub fn fail_registrations(&self, fail: bool) {
        self.fail_registrations.store(fail, Ordering::SeqCst);
    }

    /// Registration requests received so far, failed ones included
    pub fn registrations(&self) -> Vec<CapturePointRegistration> {
        self.registrations.lock().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.registrations.lock().clear();
        self.fetches.store(0, Ordering::SeqCst);
    }

    fn registered_config(&self, registration: &CapturePointRegistration) -> BreakpointConfig {
        let id = format!("bp-{}", self.registrations.lock().len());
        let mut config = self
            .registration_template
            .lock()
            .clone()
            .unwrap_or_else(|| BreakpointConfig::new(id.clone(), "", ""));
        if config.id.is_empty() {
            config.id = id;
        }
        config.service = registration.service.clone();
        config.function_name = Some(registration.function_name.clone());
        config.label = Some(registration.label.clone());
        config.file_path = Some(registration.file_path.clone());
        config.line_number = Some(registration.line_number);
        config
    }
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    async fn fetch_active_breakpoints(
        &self,
        _service: &str,
    ) -> Result<Vec<BreakpointConfig>, ControlPlaneError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let delay = *self.fetch_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(ControlPlaneError::Status {
                status: 503,
                body: "mock fetch failure".into(),
            });
        }
        Ok(self.breakpoints.lock().clone())
    }

    async fn register_capture_point(
        &self,
        registration: &CapturePointRegistration,
    ) -> Result<BreakpointConfig, ControlPlaneError> {
        self.registrations.lock().push(registration.clone());

        let delay = *self.registration_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.fail_registrations.load(Ordering::SeqCst) {
            return Err(ControlPlaneError::Rejected("mock registration failure".into()));
        }
        Ok(self.registered_config(registration))
    }
}
