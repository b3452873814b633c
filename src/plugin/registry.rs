use super::hooks::{HookRegistry, Hooks};
use super::{Plugin, PluginError};
use crate::state::SharedState;

/// Ordered collection of plugins awaiting attachment.
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// Register a plugin. Attachment follows registration order.
    pub fn register<P: Plugin + 'static>(&mut self, plugin: P) {
        self.plugins.push(Box::new(plugin));
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<P: Plugin + 'static>(mut self, plugin: P) -> Self {
        self.register(plugin);
        self
    }

    /// Attach every plugin in registration order.
    ///
    /// Stops at the first failure; nothing registered so far is kept.
    /// Consuming the registry makes a second attachment impossible.
    pub fn attach_all(self, state: &SharedState) -> Result<Hooks, PluginError> {
        let mut hooks = HookRegistry::new();

        for plugin in &self.plugins {
            let name = plugin.name();
            hooks.begin(name);
            plugin
                .attach(state, &mut hooks)
                .map_err(|source| PluginError::Attach {
                    plugin: name,
                    source: Box::new(source),
                })?;
            tracing::info!(plugin = name, "Plugin attached");
        }

        let hooks = hooks.freeze();
        tracing::info!(
            plugins = hooks.plugins().len(),
            commands = hooks.commands().count(),
            "All plugins attached"
        );
        Ok(hooks)
    }

    /// Plugin names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Number of registered plugins
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}
