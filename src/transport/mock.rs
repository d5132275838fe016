use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{SnapshotTransport, TransportError};
use crate::snapshot::Snapshot;

/// Keeps every snapshot it is handed; can be told to fail or stall
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Snapshot>>,
    fail: AtomicBool,
    delay: Mutex<Duration>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let transport = Self::default();
        transport.set_failing(true);
        transport
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock() = delay;
        self
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Snapshot> {
        self.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl SnapshotTransport for RecordingTransport {
    async fn send(&self, snapshot: &Snapshot) -> Result<(), TransportError> {
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected("mock transport failure".into()));
        }
        self.sent.lock().push(snapshot.clone());
        Ok(())
    }
}
