//! Checkpoint store with lease semantics
//!
//! In-memory analog of a lease/checkpoint table: one row per shard, plus
//! scripted fault injection so tests can exercise every failure class.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use contracts::{CheckpointError, Checkpointer, ShardId};
use tracing::debug;

struct StoreState {
    /// Shard -> number of records checkpointed (resume position)
    checkpoints: HashMap<ShardId, u64>,
    /// Shards whose lease moved to another worker
    revoked: HashSet<ShardId>,
    /// Scripted failures, popped one per checkpoint call
    scripted: HashMap<ShardId, VecDeque<CheckpointError>>,
    /// Successful writes per shard
    writes: HashMap<ShardId, u64>,
}

/// Process-local checkpoint table.
pub struct InMemoryCheckpointStore {
    application_name: String,
    state: Mutex<StoreState>,
}

impl InMemoryCheckpointStore {
    /// Create an empty store for one consumer application.
    pub fn new(application_name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            application_name: application_name.into(),
            state: Mutex::new(StoreState {
                checkpoints: HashMap::new(),
                revoked: HashSet::new(),
                scripted: HashMap::new(),
                writes: HashMap::new(),
            }),
        })
    }

    /// Application this store belongs to
    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    /// Queue failures to return from the next checkpoint calls on a shard,
    /// in order, before normal processing resumes.
    pub fn script_failures(&self, shard_id: &ShardId, failures: Vec<CheckpointError>) {
        let mut state = self.state.lock().unwrap();
        state
            .scripted
            .entry(shard_id.clone())
            .or_default()
            .extend(failures);
    }

    /// Move the shard's lease to another worker; every later checkpoint on
    /// it fails with `LeaseGone`.
    pub fn revoke_lease(&self, shard_id: &ShardId) {
        let mut state = self.state.lock().unwrap();
        state.revoked.insert(shard_id.clone());
        debug!(app = %self.application_name, shard_id = %shard_id, "lease revoked");
    }

    /// Resume position for a shard, if one was ever committed
    pub fn last_checkpoint(&self, shard_id: &ShardId) -> Option<u64> {
        self.state.lock().unwrap().checkpoints.get(shard_id).copied()
    }

    /// Number of successful checkpoint writes for a shard
    pub fn write_count(&self, shard_id: &ShardId) -> u64 {
        self.state
            .lock()
            .unwrap()
            .writes
            .get(shard_id)
            .copied()
            .unwrap_or(0)
    }

    fn commit(&self, shard_id: &ShardId, position: u64) -> Result<(), CheckpointError> {
        let mut state = self.state.lock().unwrap();

        if let Some(queue) = state.scripted.get_mut(shard_id) {
            if let Some(err) = queue.pop_front() {
                return Err(err);
            }
        }

        if state.revoked.contains(shard_id) {
            return Err(CheckpointError::lease_gone(format!(
                "shard {shard_id} is leased to another worker"
            )));
        }

        state.checkpoints.insert(shard_id.clone(), position);
        *state.writes.entry(shard_id.clone()).or_insert(0) += 1;
        Ok(())
    }
}

/// Per-shard checkpoint capability backed by the store.
///
/// The shard reader advances `position` as it hands records to the
/// processor; `checkpoint()` commits whatever has been handed out so far.
pub struct StoreCheckpointer {
    store: Arc<InMemoryCheckpointStore>,
    shard_id: ShardId,
    position: AtomicU64,
    calls: AtomicU64,
}

impl StoreCheckpointer {
    /// Create a checkpointer bound to one shard.
    pub fn new(store: Arc<InMemoryCheckpointStore>, shard_id: ShardId) -> Arc<Self> {
        Arc::new(Self {
            store,
            shard_id,
            position: AtomicU64::new(0),
            calls: AtomicU64::new(0),
        })
    }

    /// Record that everything below `next_sequence` has been delivered.
    pub fn advance_to(&self, next_sequence: u64) {
        self.position.store(next_sequence, Ordering::SeqCst);
    }

    /// Position the next checkpoint will commit
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::SeqCst)
    }

    /// Total checkpoint calls, including failed ones
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Checkpointer for StoreCheckpointer {
    fn checkpoint(&self) -> Result<(), CheckpointError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let position = self.position.load(Ordering::SeqCst);
        self.store.commit(&self.shard_id, position)?;
        debug!(shard_id = %self.shard_id, position, "checkpoint committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shard() -> ShardId {
        ShardId::from_index(0)
    }

    #[test]
    fn test_commit_and_resume() {
        let store = InMemoryCheckpointStore::new("app");
        let cp = StoreCheckpointer::new(store.clone(), shard());

        assert_eq!(store.last_checkpoint(&shard()), None);

        cp.advance_to(42);
        cp.checkpoint().unwrap();

        assert_eq!(store.last_checkpoint(&shard()), Some(42));
        assert_eq!(store.write_count(&shard()), 1);
        assert_eq!(cp.call_count(), 1);
    }

    #[test]
    fn test_scripted_failures_pop_in_order() {
        let store = InMemoryCheckpointStore::new("app");
        store.script_failures(
            &shard(),
            vec![
                CheckpointError::throttled("first"),
                CheckpointError::throttled("second"),
            ],
        );
        let cp = StoreCheckpointer::new(store.clone(), shard());
        cp.advance_to(1);

        assert!(matches!(
            cp.checkpoint(),
            Err(CheckpointError::Throttled { .. })
        ));
        assert!(matches!(
            cp.checkpoint(),
            Err(CheckpointError::Throttled { .. })
        ));
        // Script exhausted, the write goes through
        cp.checkpoint().unwrap();
        assert_eq!(store.last_checkpoint(&shard()), Some(1));
        assert_eq!(cp.call_count(), 3);
    }

    #[test]
    fn test_revoked_lease_rejects_checkpoints() {
        let store = InMemoryCheckpointStore::new("app");
        let cp = StoreCheckpointer::new(store.clone(), shard());
        cp.advance_to(5);
        cp.checkpoint().unwrap();

        store.revoke_lease(&shard());
        assert!(matches!(
            cp.checkpoint(),
            Err(CheckpointError::LeaseGone { .. })
        ));
        // The committed position is untouched
        assert_eq!(store.last_checkpoint(&shard()), Some(5));
    }
}
