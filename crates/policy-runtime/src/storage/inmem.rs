use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::debug;

use super::{
    PolicyEvent, StorageError, Store, Transaction, TransactionParams, TriggerConfig, TriggerEvent,
    TriggerHandle,
};

type Policies = BTreeMap<String, Vec<u8>>;

struct TxnState {
    write: bool,
    view: Arc<Policies>,
    /// Pending changes; `None` marks a deletion.
    writes: BTreeMap<String, Option<Vec<u8>>>,
}

impl TxnState {
    fn get(&self, id: &str) -> Option<&[u8]> {
        match self.writes.get(id) {
            Some(pending) => pending.as_deref(),
            None => self.view.get(id).map(Vec::as_slice),
        }
    }
}

/// In-memory [`Store`] with snapshot reads and a single writer.
///
/// Read transactions see the state as of their creation. Write
/// transactions are serialized; opening a second one blocks until the
/// first commits or aborts. Commit triggers must not open write
/// transactions.
pub struct InMemoryStore {
    policies: RwLock<Arc<Policies>>,
    txns: Mutex<HashMap<u64, TxnState>>,
    writer_busy: Mutex<bool>,
    writer_released: Condvar,
    triggers: RwLock<Vec<(TriggerHandle, TriggerConfig)>>,
    next_txn: AtomicU64,
    next_trigger: AtomicU64,
}

struct WriterGuard<'a>(&'a InMemoryStore);

impl Drop for WriterGuard<'_> {
    fn drop(&mut self) {
        *self.0.writer_busy.lock() = false;
        self.0.writer_released.notify_one();
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_policies(BTreeMap::new())
    }

    /// Creates a store preloaded with `policies`.
    pub fn with_policies(policies: BTreeMap<String, Vec<u8>>) -> Self {
        Self {
            policies: RwLock::new(Arc::new(policies)),
            txns: Mutex::new(HashMap::new()),
            writer_busy: Mutex::new(false),
            writer_released: Condvar::new(),
            triggers: RwLock::new(Vec::new()),
            next_txn: AtomicU64::new(1),
            next_trigger: AtomicU64::new(1),
        }
    }

    fn acquire_writer(&self) {
        let mut busy = self.writer_busy.lock();
        while *busy {
            self.writer_released.wait(&mut busy);
        }
        *busy = true;
    }

    fn with_state<T>(
        &self,
        txn: &Transaction,
        f: impl FnOnce(&TxnState) -> T,
    ) -> Result<T, StorageError> {
        let txns = self.txns.lock();
        let state = txns
            .get(&txn.id())
            .ok_or(StorageError::InvalidTransaction(txn.id()))?;
        Ok(f(state))
    }

    fn with_write_state<T>(
        &self,
        txn: &Transaction,
        f: impl FnOnce(&mut TxnState) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut txns = self.txns.lock();
        let state = txns
            .get_mut(&txn.id())
            .ok_or(StorageError::InvalidTransaction(txn.id()))?;
        if !state.write {
            return Err(StorageError::ReadOnly(txn.id()));
        }
        f(state)
    }
}

impl Store for InMemoryStore {
    fn new_transaction(&self, params: TransactionParams) -> Result<Transaction, StorageError> {
        if params.write {
            self.acquire_writer();
        }
        let id = self.next_txn.fetch_add(1, Ordering::Relaxed);
        let state = TxnState {
            write: params.write,
            view: self.policies.read().clone(),
            writes: BTreeMap::new(),
        };
        self.txns.lock().insert(id, state);
        Ok(Transaction::new(id, params.write))
    }

    fn commit(&self, txn: Transaction) -> Result<(), StorageError> {
        let state = self
            .txns
            .lock()
            .remove(&txn.id())
            .ok_or(StorageError::InvalidTransaction(txn.id()))?;
        if !state.write {
            return Ok(());
        }
        let _writer = WriterGuard(self);

        let mut next = state.view.as_ref().clone();
        let mut event = TriggerEvent::default();
        for (id, data) in state.writes {
            match data {
                Some(bytes) => {
                    next.insert(id.clone(), bytes.clone());
                    event.policy.push(PolicyEvent {
                        id,
                        data: Some(bytes),
                        removed: false,
                    });
                }
                None => {
                    next.remove(&id);
                    event.policy.push(PolicyEvent {
                        id,
                        data: None,
                        removed: true,
                    });
                }
            }
        }

        let committed = Arc::new(next);
        *self.policies.write() = committed.clone();
        debug!(txn = txn.id(), changes = event.policy.len(), "committed write transaction");

        // Triggers read through the same handle, now pinned to the committed view.
        self.txns.lock().insert(
            txn.id(),
            TxnState {
                write: false,
                view: committed,
                writes: BTreeMap::new(),
            },
        );
        let triggers: Vec<TriggerConfig> = self
            .triggers
            .read()
            .iter()
            .map(|(_, config)| config.clone())
            .collect();
        for trigger in &triggers {
            (trigger.on_commit)(self, &txn, &event);
        }
        self.txns.lock().remove(&txn.id());
        Ok(())
    }

    fn abort(&self, txn: Transaction) {
        let state = self.txns.lock().remove(&txn.id());
        if let Some(state) = state {
            if state.write {
                drop(WriterGuard(self));
            }
            debug!(txn = txn.id(), "aborted transaction");
        }
    }

    fn list_policies(&self, txn: &Transaction) -> Result<Vec<String>, StorageError> {
        self.with_state(txn, |state| {
            let mut ids: BTreeSet<&String> = state.view.keys().collect();
            for (id, pending) in &state.writes {
                if pending.is_some() {
                    ids.insert(id);
                } else {
                    ids.remove(id);
                }
            }
            ids.into_iter().cloned().collect()
        })
    }

    fn get_policy(&self, txn: &Transaction, id: &str) -> Result<Vec<u8>, StorageError> {
        self.with_state(txn, |state| state.get(id).map(<[u8]>::to_vec))?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    fn upsert_policy(&self, txn: &Transaction, id: &str, data: &[u8]) -> Result<(), StorageError> {
        self.with_write_state(txn, |state| {
            state.writes.insert(id.to_string(), Some(data.to_vec()));
            Ok(())
        })
    }

    fn delete_policy(&self, txn: &Transaction, id: &str) -> Result<(), StorageError> {
        self.with_write_state(txn, |state| {
            if state.get(id).is_none() {
                return Err(StorageError::NotFound(id.to_string()));
            }
            state.writes.insert(id.to_string(), None);
            Ok(())
        })
    }

    fn register(
        &self,
        txn: &Transaction,
        config: TriggerConfig,
    ) -> Result<TriggerHandle, StorageError> {
        self.with_write_state(txn, |_| Ok(()))?;
        let handle = TriggerHandle(self.next_trigger.fetch_add(1, Ordering::Relaxed));
        self.triggers.write().push((handle, config));
        Ok(handle)
    }

    fn unregister(&self, handle: TriggerHandle) {
        self.triggers.write().retain(|(h, _)| *h != handle);
    }
}
