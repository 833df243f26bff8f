//! Extension lifecycle contract.

use crate::error::PluginError;

/// An extension subsystem started by the manager.
///
/// The manager calls `start` at most once, in registration order. It
/// never calls `stop`; shutdown ordering belongs to the owner.
pub trait Plugin: Send + Sync {
    fn start(&self) -> Result<(), PluginError>;

    /// Stops the plugin. Failures are the plugin's own concern.
    fn stop(&self);
}
