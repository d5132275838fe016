//! In-memory breakpoint cache
//!
//! Maps both identity key forms to a shared `Arc<BreakpointConfig>`. A sync
//! builds the next map off-lock and swaps it in under the write lock, so
//! readers observe either the old or the new set, never a mix.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::model::{BreakpointConfig, CapturePointIdentity};

#[derive(Debug, Default)]
pub struct BreakpointCache {
    entries: RwLock<HashMap<String, Arc<BreakpointConfig>>>,
}

impl BreakpointCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole cache with a freshly fetched set.
    ///
    /// Entries absent from `configs` disappear. Returns the number of configs indexed.
    pub fn replace_all(&self, configs: Vec<BreakpointConfig>) -> usize {
        let count = configs.len();
        let mut next = HashMap::with_capacity(count * 2);
        for config in configs {
            index(&mut next, Arc::new(config), None);
        }

        *self.entries.write() = next;
        tracing::trace!(count, "Breakpoint cache replaced");
        count
    }

    /// Seed a single config returned by registration.
    ///
    /// Indexed under the config's own keys and under the registering
    /// identity, so the next lookup from the same call site resolves even
    /// when the server echoes partial identity fields.
    pub fn seed(
        &self,
        identity: &CapturePointIdentity,
        config: BreakpointConfig,
    ) -> Arc<BreakpointConfig> {
        let config = Arc::new(config);
        index(&mut self.entries.write(), Arc::clone(&config), Some(identity));
        config
    }

    /// Look up by `function:label` first, then `file:line`.
    ///
    /// A `file:line` hit only counts when the config carries no label or the
    /// identity's label; one line can capture under several labels.
    pub fn get(&self, identity: &CapturePointIdentity) -> Option<Arc<BreakpointConfig>> {
        let entries = self.entries.read();
        if let Some(config) = entries.get(&identity.primary_key()) {
            return Some(Arc::clone(config));
        }
        entries
            .get(&identity.location_key())
            .filter(|config| {
                config
                    .label
                    .as_deref()
                    .map_or(true, |label| label == identity.label)
            })
            .cloned()
    }

    pub fn get_key(&self, key: &str) -> Option<Arc<BreakpointConfig>> {
        self.entries.read().get(key).cloned()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of keys (each config contributes up to two)
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn index(
    map: &mut HashMap<String, Arc<BreakpointConfig>>,
    config: Arc<BreakpointConfig>,
    identity: Option<&CapturePointIdentity>,
) {
    let mut keys: Vec<String> = config
        .primary_key()
        .into_iter()
        .chain(config.location_key())
        .collect();
    if let Some(identity) = identity {
        keys.push(identity.primary_key());
        keys.push(identity.location_key());
    }

    for key in keys {
        map.insert(key, Arc::clone(&config));
    }
}
