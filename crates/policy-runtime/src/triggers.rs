//! Compiler change notifications.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::storage::{Store, Transaction};

type CompilerCallback = dyn Fn(&dyn Store, &Transaction) + Send + Sync;

/// Callback run after the compiler is republished for a commit.
#[derive(Clone)]
pub struct CompilerTriggerConfig {
    pub on_compiler_change: Arc<CompilerCallback>,
}

impl CompilerTriggerConfig {
    pub fn new<F>(on_compiler_change: F) -> Self
    where
        F: Fn(&dyn Store, &Transaction) + Send + Sync + 'static,
    {
        Self {
            on_compiler_change: Arc::new(on_compiler_change),
        }
    }
}

impl fmt::Debug for CompilerTriggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilerTriggerConfig").finish_non_exhaustive()
    }
}

/// Append-only, ordered list of compiler triggers.
///
/// Managers sharing one registry fan out each other's commits to all of
/// its triggers.
#[derive(Debug, Default)]
pub struct TriggerRegistry {
    triggers: Mutex<Vec<CompilerTriggerConfig>>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, config: CompilerTriggerConfig) {
        self.triggers.lock().push(config);
    }

    pub fn len(&self) -> usize {
        self.triggers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.lock().is_empty()
    }

    /// Invokes every trigger in registration order.
    ///
    /// The list is copied first, so a trigger may register further
    /// triggers; those run from the next notification on.
    pub fn notify(&self, store: &dyn Store, txn: &Transaction) {
        let triggers = self.triggers.lock().clone();
        for trigger in &triggers {
            (trigger.on_compiler_change)(store, txn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryStore, TransactionParams};

    #[test]
    fn test_notify_in_registration_order() {
        let registry = Arc::new(TriggerRegistry::new());
        let calls = Arc::new(Mutex::new(Vec::new()));
        for name in ["first", "second", "third"] {
            let calls = calls.clone();
            registry.register(CompilerTriggerConfig::new(move |_, txn| {
                calls.lock().push((name, txn.id()));
            }));
        }
        assert_eq!(registry.len(), 3);

        let store = InMemoryStore::new();
        let txn = store.new_transaction(TransactionParams::read()).unwrap();
        registry.notify(&store, &txn);

        let id = txn.id();
        assert_eq!(
            *calls.lock(),
            vec![("first", id), ("second", id), ("third", id)]
        );
    }

    #[test]
    fn test_register_during_notify() {
        let registry = Arc::new(TriggerRegistry::new());
        let inner = registry.clone();
        registry.register(CompilerTriggerConfig::new(move |_, _| {
            inner.register(CompilerTriggerConfig::new(|_, _| {}));
        }));

        let store = InMemoryStore::new();
        let txn = store.new_transaction(TransactionParams::read()).unwrap();
        registry.notify(&store, &txn);
        assert_eq!(registry.len(), 2);
    }
}
