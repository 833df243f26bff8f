//! Storage collaborator contract.
//!
//! The manager only needs policy modules and commit notifications from
//! storage. [`InMemoryStore`] is the bundled implementation.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

mod inmem;

pub use inmem::InMemoryStore;

/// Handle for an open transaction.
///
/// Handles are cheap to copy. A handle stays valid until the transaction
/// is committed or aborted, including inside commit triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Transaction {
    id: u64,
    write: bool,
}

impl Transaction {
    pub(crate) fn new(id: u64, write: bool) -> Self {
        Self { id, write }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_write(&self) -> bool {
        self.write
    }
}

/// Options for opening a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionParams {
    pub write: bool,
}

impl TransactionParams {
    pub fn read() -> Self {
        Self { write: false }
    }

    pub fn write() -> Self {
        Self { write: true }
    }
}

/// Storage failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Policy not found: {0}")]
    NotFound(String),

    #[error("Invalid transaction {0}")]
    InvalidTransaction(u64),

    #[error("Write attempted in read transaction {0}")]
    ReadOnly(u64),
}

/// A single policy change within a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyEvent {
    pub id: String,

    /// New module bytes, `None` when removed.
    pub data: Option<Vec<u8>>,

    pub removed: bool,
}

/// Summary of what a committed transaction changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerEvent {
    pub policy: Vec<PolicyEvent>,
}

impl TriggerEvent {
    pub fn policy_changed(&self) -> bool {
        !self.policy.is_empty()
    }
}

type CommitCallback = dyn Fn(&dyn Store, &Transaction, &TriggerEvent) + Send + Sync;

/// Callback invoked after each committed write transaction.
///
/// The transaction handle passed to the callback is still readable and
/// observes the committed state.
#[derive(Clone)]
pub struct TriggerConfig {
    pub on_commit: Arc<CommitCallback>,
}

impl TriggerConfig {
    pub fn new<F>(on_commit: F) -> Self
    where
        F: Fn(&dyn Store, &Transaction, &TriggerEvent) + Send + Sync + 'static,
    {
        Self {
            on_commit: Arc::new(on_commit),
        }
    }
}

impl fmt::Debug for TriggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerConfig").finish_non_exhaustive()
    }
}

/// Identifies a registered commit trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerHandle(pub(crate) u64);

/// Transactional policy storage.
pub trait Store: Send + Sync {
    fn new_transaction(&self, params: TransactionParams) -> Result<Transaction, StorageError>;

    /// Commits `txn`, then runs commit triggers synchronously.
    fn commit(&self, txn: Transaction) -> Result<(), StorageError>;

    fn abort(&self, txn: Transaction);

    /// Identifiers of all stored policies, sorted.
    fn list_policies(&self, txn: &Transaction) -> Result<Vec<String>, StorageError>;

    fn get_policy(&self, txn: &Transaction, id: &str) -> Result<Vec<u8>, StorageError>;

    fn upsert_policy(&self, txn: &Transaction, id: &str, data: &[u8]) -> Result<(), StorageError>;

    fn delete_policy(&self, txn: &Transaction, id: &str) -> Result<(), StorageError>;

    /// Registers a commit trigger. Requires a write transaction.
    fn register(
        &self,
        txn: &Transaction,
        config: TriggerConfig,
    ) -> Result<TriggerHandle, StorageError>;

    fn unregister(&self, handle: TriggerHandle);
}

/// Runs `f` inside a transaction, committing on success and aborting on
/// failure.
pub fn txn<T, E, F>(store: &dyn Store, params: TransactionParams, f: F) -> Result<T, E>
where
    E: From<StorageError>,
    F: FnOnce(&Transaction) -> Result<T, E>,
{
    let txn = store.new_transaction(params)?;
    match f(&txn) {
        Ok(value) => {
            store.commit(txn)?;
            Ok(value)
        }
        Err(err) => {
            store.abort(txn);
            Err(err)
        }
    }
}
