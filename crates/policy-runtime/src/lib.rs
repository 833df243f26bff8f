//! Policy Runtime
//!
//! Compiler lifecycle and plugin orchestration for a declarative policy
//! engine. The [`Manager`] loads policy modules from a transactional
//! [`Store`], publishes an immutable [`Compiler`] snapshot to concurrent
//! readers, and recompiles on every commit that changes policies. The
//! [`BuiltinRegistry`] resolves and validates every function call a
//! policy can make.

pub mod ast;
pub mod builtins;
pub mod catalog;
pub mod client;
pub mod compiler;
pub mod config;
pub mod docs;
pub mod error;
pub mod manager;
pub mod parser;
pub mod plugin;
pub mod policy;
pub mod storage;
pub mod triggers;
pub mod types;

pub use builtins::{Builtin, BuiltinRegistry};
pub use client::ServiceClient;
pub use compiler::Compiler;
pub use config::ManagerConfig;
pub use error::{CompileError, CompileErrors, PolicyError, Result};
pub use manager::Manager;
pub use plugin::Plugin;
pub use policy::PolicyModule;
pub use storage::{InMemoryStore, Store, Transaction, TransactionParams};
pub use triggers::{CompilerTriggerConfig, TriggerRegistry};

/// Version of the policy runtime.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::ast::{Expr, Ref, Term};
    pub use crate::builtins::{Builtin, BuiltinRegistry};
    pub use crate::compiler::Compiler;
    pub use crate::error::{PluginError, PolicyError, Result};
    pub use crate::manager::Manager;
    pub use crate::plugin::Plugin;
    pub use crate::storage::{InMemoryStore, Store, Transaction, TransactionParams};
    pub use crate::triggers::CompilerTriggerConfig;
    pub use crate::types::*;
}
