use crate::probe::ProbeResult;
use dashmap::DashMap;

/// Latest published result per probe operation. Entries are replaced whole,
/// so readers never observe a partially written result.
#[derive(Debug, Default)]
pub struct ResultStore {
    entries: DashMap<String, ProbeResult>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Stores `result` under `key`, returning the value it replaced.
    pub fn put(&self, key: impl Into<String>, result: ProbeResult) -> Option<ProbeResult> {
        self.entries.insert(key.into(), result)
    }

    pub fn get(&self, key: &str) -> Option<ProbeResult> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
