//! Compiler lifecycle and plugin orchestration.
//!
//! A [`Manager`] owns the published [`Compiler`] snapshot for one store.
//! [`Manager::start`] compiles the stored policies, starts the registered
//! plugins, and subscribes to the store so that every commit which
//! changes policies recompiles, republishes, and notifies compiler
//! triggers before the commit returns to its writer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::builtins::BuiltinRegistry;
use crate::client::ServiceClient;
use crate::compiler::{load_compiler_from_store, Compiler};
use crate::config::ManagerConfig;
use crate::error::{PolicyError, Result};
use crate::plugin::Plugin;
use crate::storage::{
    txn, Store, Transaction, TransactionParams, TriggerConfig, TriggerEvent, TriggerHandle,
};
use crate::triggers::{CompilerTriggerConfig, TriggerRegistry};

/// Label key always set to the manager's identifier.
pub const ID_LABEL: &str = "id";

/// State reachable from the store's commit trigger.
struct Shared {
    builtins: Arc<BuiltinRegistry>,
    triggers: Arc<TriggerRegistry>,
    compiler: RwLock<Option<Arc<Compiler>>>,
    generation: AtomicU64,
}

impl Shared {
    fn new(builtins: Arc<BuiltinRegistry>, triggers: Arc<TriggerRegistry>) -> Self {
        Self {
            builtins,
            triggers,
            compiler: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Swaps in a fully built compiler.
    fn publish(&self, compiler: Compiler) -> Arc<Compiler> {
        let compiler = Arc::new(compiler);
        *self.compiler.write() = Some(compiler.clone());
        self.generation.fetch_add(1, Ordering::SeqCst);
        compiler
    }

    /// Recompiles if policies changed since the last publish, e.g. a
    /// commit made by a plugin while it started. Must run in a write
    /// transaction so no commit can land before the subscription exists.
    fn catch_up(&self, store: &dyn Store, txn: &Transaction) -> Result<()> {
        let compiler = match load_compiler_from_store(store, txn, self.builtins.clone()) {
            Ok(compiler) => compiler,
            Err(err @ PolicyError::Compile(_)) => {
                warn!(
                    txn = txn.id(),
                    error = %err,
                    "policies written during startup failed to compile, keeping previous compiler"
                );
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        let current = self.compiler.read().clone();
        if current.is_some_and(|c| c.revision() == compiler.revision()) {
            return Ok(());
        }
        let compiler = self.publish(compiler);
        info!(
            txn = txn.id(),
            modules = compiler.len(),
            revision = compiler.revision(),
            "recompiled policies written during startup"
        );
        self.triggers.notify(store, txn);
        Ok(())
    }

    fn on_commit(&self, store: &dyn Store, txn: &Transaction, event: &TriggerEvent) {
        if !event.policy_changed() {
            return;
        }

        match load_compiler_from_store(store, txn, self.builtins.clone()) {
            Ok(compiler) => {
                let compiler = self.publish(compiler);
                info!(
                    txn = txn.id(),
                    modules = compiler.len(),
                    revision = compiler.revision(),
                    "recompiled policies"
                );
                self.triggers.notify(store, txn);
            }
            Err(err) => {
                warn!(
                    txn = txn.id(),
                    error = %err,
                    "policy recompilation failed, keeping previous compiler"
                );
            }
        }
    }
}

/// Manages the compiled policy set and the plugins that depend on it.
pub struct Manager {
    labels: HashMap<String, String>,
    store: Arc<dyn Store>,
    services: HashMap<String, ServiceClient>,
    plugins: Mutex<Vec<Arc<dyn Plugin>>>,
    shared: Arc<Shared>,
    started: AtomicBool,
    subscription: Mutex<Option<TriggerHandle>>,
}

impl Manager {
    /// Creates a manager from a raw YAML or JSON configuration payload.
    ///
    /// One service client is built per configured service. The `id` label
    /// is always set to `id`, replacing any configured value.
    pub fn new(config: &[u8], id: impl Into<String>, store: Arc<dyn Store>) -> Result<Self> {
        let parsed = ManagerConfig::parse(config)?;

        let mut labels = parsed.labels;
        labels.insert(ID_LABEL.to_string(), id.into());

        let mut services = HashMap::with_capacity(parsed.services.len());
        for raw in &parsed.services {
            let client = ServiceClient::new(raw)?;
            let name = client.service().to_string();
            if services.insert(name.clone(), client).is_some() {
                return Err(PolicyError::config(format!("duplicate service '{}'", name)));
            }
        }

        Ok(Self {
            labels,
            store,
            services,
            plugins: Mutex::new(Vec::new()),
            shared: Arc::new(Shared::new(
                Arc::new(BuiltinRegistry::with_defaults()),
                Arc::new(TriggerRegistry::new()),
            )),
            started: AtomicBool::new(false),
            subscription: Mutex::new(None),
        })
    }

    /// Compiles against `builtins` instead of the default catalog.
    pub fn with_builtins(mut self, builtins: Arc<BuiltinRegistry>) -> Self {
        self.shared = Arc::new(Shared::new(builtins, self.shared.triggers.clone()));
        self
    }

    /// Notifies the triggers in `triggers`, which may be shared with
    /// other managers.
    pub fn with_triggers(mut self, triggers: Arc<TriggerRegistry>) -> Self {
        self.shared = Arc::new(Shared::new(self.shared.builtins.clone(), triggers));
        self
    }

    pub fn labels(&self) -> &HashMap<String, String> {
        &self.labels
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn builtins(&self) -> &Arc<BuiltinRegistry> {
        &self.shared.builtins
    }

    /// Configured service names, sorted.
    pub fn services(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The client for service `name`, if configured.
    pub fn client(&self, name: &str) -> Option<&ServiceClient> {
        self.services.get(name)
    }

    /// Adds a plugin to be started by [`Manager::start`].
    pub fn register(&self, plugin: Arc<dyn Plugin>) {
        self.plugins.lock().push(plugin);
    }

    /// The current compiler, or `None` before a successful bootstrap.
    pub fn get_compiler(&self) -> Option<Arc<Compiler>> {
        self.shared.compiler.read().clone()
    }

    /// Number of compilers published so far.
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    /// Registers a callback run after each recompilation caused by a commit.
    pub fn register_compiler_trigger(&self, config: CompilerTriggerConfig) {
        self.shared.triggers.register(config);
    }

    /// Compiles the stored policies, starts plugins and subscribes to
    /// policy commits.
    ///
    /// Fails fast. A bootstrap failure publishes nothing and leaves the
    /// manager startable again. A plugin failure leaves earlier plugins
    /// running.
    pub fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(PolicyError::AlreadyStarted);
        }

        let store = self.store.as_ref();
        let bootstrap = txn(store, TransactionParams::read(), |t| {
            load_compiler_from_store(store, t, self.shared.builtins.clone())
        });
        let compiler = match bootstrap {
            Ok(compiler) => self.shared.publish(compiler),
            Err(err) => {
                self.started.store(false, Ordering::SeqCst);
                return Err(err);
            }
        };
        info!(
            modules = compiler.len(),
            revision = compiler.revision(),
            "compiled stored policies"
        );

        let plugins = self.plugins.lock().clone();
        for (index, plugin) in plugins.iter().enumerate() {
            debug!(index, "starting plugin");
            plugin
                .start()
                .map_err(|source| PolicyError::PluginStart { index, source })?;
        }

        let shared = self.shared.clone();
        let handle = txn(store, TransactionParams::write(), |t| {
            self.shared.catch_up(store, t)?;
            let on_commit = TriggerConfig::new(move |store, txn, event| {
                shared.on_commit(store, txn, event)
            });
            store.register(t, on_commit).map_err(PolicyError::from)
        })?;
        *self.subscription.lock() = Some(handle);

        Ok(())
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        if let Some(handle) = self.subscription.lock().take() {
            self.store.unregister(handle);
        }
    }
}
