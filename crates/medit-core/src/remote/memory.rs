//! In-memory `RemoteStore` with failure injection, for engine tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{RemoteError, RemoteResult, RemoteStore};
use crate::models::{DiagramId, DiagramRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum RemoteCall {
    Verify,
    Create,
    Update,
    Fetch,
    FetchAll,
    Delete,
}

#[derive(Debug, Default)]
struct State {
    records: BTreeMap<String, DiagramRecord>,
    next_id: u64,
    failures: HashMap<RemoteCall, RemoteError>,
    calls: HashMap<RemoteCall, usize>,
}

/// Clones share state, so a test can keep a handle while the engine owns another.
#[derive(Debug, Clone, Default)]
pub(crate) struct InMemoryRemote {
    state: Arc<Mutex<State>>,
}

impl InMemoryRemote {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Store a record as if another device had written it.
    pub(crate) fn insert(&self, record: DiagramRecord) {
        let clean = DiagramRecord {
            dirty: false,
            retry_count: 0,
            ..record
        };
        self.state()
            .records
            .insert(clean.id.as_str().to_string(), clean);
    }

    pub(crate) fn get(&self, id: &str) -> Option<DiagramRecord> {
        self.state().records.get(id).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.state().records.len()
    }

    /// Make every subsequent `call` fail with `error` until cleared.
    pub(crate) fn fail(&self, call: RemoteCall, error: RemoteError) {
        self.state().failures.insert(call, error);
    }

    pub(crate) fn clear_failures(&self) {
        self.state().failures.clear();
    }

    pub(crate) fn calls(&self, call: RemoteCall) -> usize {
        self.state().calls.get(&call).copied().unwrap_or(0)
    }

    fn enter(&self, call: RemoteCall) -> RemoteResult<MutexGuard<'_, State>> {
        let mut state = self.state();
        *state.calls.entry(call).or_insert(0) += 1;
        if let Some(error) = state.failures.get(&call).cloned() {
            return Err(error);
        }
        Ok(state)
    }
}

impl RemoteStore for InMemoryRemote {
    async fn create(&self, record: &DiagramRecord) -> RemoteResult<DiagramRecord> {
        let mut state = self.enter(RemoteCall::Create)?;
        state.next_id += 1;
        let created = DiagramRecord {
            id: DiagramId::canonical(format!("r{}", state.next_id)),
            dirty: false,
            retry_count: 0,
            ..record.clone()
        };
        state
            .records
            .insert(created.id.as_str().to_string(), created.clone());
        Ok(created)
    }

    async fn update(&self, record: &DiagramRecord) -> RemoteResult<()> {
        let mut state = self.enter(RemoteCall::Update)?;
        let Some(stored) = state.records.get_mut(record.id.as_str()) else {
            return Err(RemoteError::NotFound(record.id.to_string()));
        };
        *stored = DiagramRecord {
            dirty: false,
            retry_count: 0,
            ..record.clone()
        };
        Ok(())
    }

    async fn fetch_by_id(&self, id: &DiagramId) -> RemoteResult<Option<DiagramRecord>> {
        let state = self.enter(RemoteCall::Fetch)?;
        Ok(state.records.get(id.as_str()).cloned())
    }

    async fn fetch_all(&self) -> RemoteResult<Vec<DiagramRecord>> {
        let state = self.enter(RemoteCall::FetchAll)?;
        Ok(state.records.values().cloned().collect())
    }

    async fn delete_by_id(&self, id: &DiagramId) -> RemoteResult<()> {
        let mut state = self.enter(RemoteCall::Delete)?;
        state.records.remove(id.as_str());
        Ok(())
    }

    async fn verify_accessible(&self) -> RemoteResult<()> {
        self.enter(RemoteCall::Verify).map(|_| ())
    }
}
