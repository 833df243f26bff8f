//! Error types for the policy runtime.

use std::fmt;

use thiserror::Error;

use crate::storage::StorageError;

/// Result type for policy runtime operations.
pub type Result<T> = std::result::Result<T, PolicyError>;

/// Boxed error returned by plugins that fail to start.
pub type PluginError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by the manager, the compiler and the builtin tooling.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Manager configuration is malformed or a service client could not be built.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Error propagated verbatim from the storage collaborator.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// One or more modules failed to parse or compile.
    #[error("Compilation failed: {0}")]
    Compile(CompileErrors),

    /// The first plugin that failed to start.
    #[error("Plugin {index} failed to start: {source}")]
    PluginStart {
        index: usize,
        #[source]
        source: PluginError,
    },

    /// A policy module is structurally valid but violates naming rules.
    #[error("Policy validation error: {0}")]
    Validation(String),

    /// `Manager::start` was invoked more than once.
    #[error("Manager already started")]
    AlreadyStarted,

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PolicyError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a compile error carrying a single diagnostic.
    pub fn compile(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Compile(CompileErrors(vec![CompileError::new(module, message)]))
    }

    /// Returns the compile diagnostics, if this is a compile error.
    pub fn compile_errors(&self) -> Option<&[CompileError]> {
        match self {
            Self::Compile(errors) => Some(&errors.0),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PolicyError {
    fn from(err: serde_json::Error) -> Self {
        PolicyError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for PolicyError {
    fn from(err: serde_yaml::Error) -> Self {
        PolicyError::Serialization(err.to_string())
    }
}

impl From<regex::Error> for PolicyError {
    fn from(err: regex::Error) -> Self {
        PolicyError::Validation(format!("Invalid regex: {}", err))
    }
}

/// A single diagnostic produced while parsing or compiling a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// Identifier of the module the diagnostic belongs to.
    pub module: String,

    /// Rule the diagnostic belongs to, if any.
    pub rule: Option<String>,

    /// Human-readable message.
    pub message: String,
}

impl CompileError {
    pub fn new(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            rule: None,
            message: message.into(),
        }
    }

    pub fn in_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rule {
            Some(rule) => write!(f, "{}: {}: {}", self.module, rule, self.message),
            None => write!(f, "{}: {}", self.module, self.message),
        }
    }
}

/// Aggregated compile diagnostics, in module order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileErrors(pub Vec<CompileError>);

impl CompileErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn push(&mut self, error: CompileError) {
        self.0.push(error);
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompileError> {
        self.0.iter()
    }
}

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.len() > 1 {
            write!(f, "{} errors occurred: ", self.0.len())?;
        }
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}
