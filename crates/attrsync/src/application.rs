//! Application wiring: the shared services and the modules using them.
//!
//! Modules do not look services up globally. They receive an [`AppContext`]
//! holding the addresses of the model registry, the preference store and,
//! optionally, a keypress monitor. [`Application`] spawns the services and
//! hands out contexts for them.
//!
//! # Example
//!
//! ```no_run
//! use attrsync::{AppConfig, Application};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = Application::new(AppConfig::default())?;
//!     let mut viewer = app.create_module("viewer");
//!     viewer.add_boolean_attribute("Loop", "Loop", true);
//!     let viewer = app.spawn_module(viewer, ())?;
//!     // ... use the module through its address ...
//!     app.stop_module(viewer.id());
//!     app.shutdown();
//!     Ok(())
//! }
//! ```

use attrsync_core::{ActorHandle, ActorId, Addr, Recipient, spawn};
use parking_lot::Mutex;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::hotkey::KeypressMessage;
use crate::logging::targets;
use crate::module::{Module, ModuleHooks, ModuleMessage, spawn_module};
use crate::preferences::{PreferenceMessage, PreferenceStore};
use crate::registry::{ModelRegistry, RegistryClient, RegistryMessage};

/// The services a module talks to.
///
/// Missing services turn the corresponding parts of the change pipeline
/// into no-ops, which keeps modules usable on their own.
#[derive(Debug, Clone, Default)]
pub struct AppContext {
    pub registry: Option<Addr<RegistryMessage>>,
    pub preferences: Option<Addr<PreferenceMessage>>,
    pub keypress: Option<Recipient<KeypressMessage>>,
    pub config: AppConfig,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn with_registry(mut self, registry: Addr<RegistryMessage>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_preferences(mut self, preferences: Addr<PreferenceMessage>) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn with_keypress(mut self, keypress: Recipient<KeypressMessage>) -> Self {
        self.keypress = Some(keypress);
        self
    }

    /// A blocking client for the registry, if there is one.
    pub fn registry_client(&self) -> Option<RegistryClient> {
        self.registry
            .clone()
            .map(|addr| RegistryClient::new(addr, self.config.timeout()))
    }
}

/// Owns the service actors and every module spawned through it.
///
/// Dropping the application shuts everything down: modules first, so their
/// withdrawals reach the registry, then the registry, then the preference
/// store.
pub struct Application {
    config: AppConfig,
    preferences: ActorHandle<PreferenceMessage>,
    registry: ActorHandle<RegistryMessage>,
    keypress: Option<Recipient<KeypressMessage>>,
    modules: Mutex<Vec<ActorHandle<ModuleMessage>>>,
}

impl Application {
    /// Start the preference store and the model registry.
    ///
    /// The store reads `preferences_file` when one is configured.
    pub fn new(config: AppConfig) -> Result<Self, AppError> {
        let store = match &config.preferences_file {
            Some(path) => PreferenceStore::open(path)?,
            None => PreferenceStore::default(),
        };
        let preferences = spawn(store, config.actor("preferences"))?;
        let registry = spawn(
            ModelRegistry::new(&config, Some(preferences.address())),
            config.actor("model-registry"),
        )?;
        tracing::info!(
            target: targets::APP,
            registry = %registry.id(),
            preferences = %preferences.id(),
            "application started"
        );
        Ok(Self {
            config,
            preferences,
            registry,
            keypress: None,
            modules: Mutex::new(Vec::new()),
        })
    }

    /// Route hotkey registrations of modules created afterwards to `keypress`.
    pub fn with_keypress(mut self, keypress: Recipient<KeypressMessage>) -> Self {
        self.keypress = Some(keypress);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn context(&self) -> AppContext {
        AppContext {
            registry: Some(self.registry.address()),
            preferences: Some(self.preferences.address()),
            keypress: self.keypress.clone(),
            config: self.config.clone(),
        }
    }

    pub fn registry(&self) -> Addr<RegistryMessage> {
        self.registry.address()
    }

    pub fn registry_client(&self) -> RegistryClient {
        RegistryClient::new(self.registry.address(), self.config.timeout())
    }

    pub fn preferences(&self) -> Addr<PreferenceMessage> {
        self.preferences.address()
    }

    /// A detached module wired to this application's services.
    pub fn create_module(&self, name: impl Into<String>) -> Module {
        Module::new(name, self.context())
    }

    /// Start `module` on its own actor and keep its handle.
    pub fn spawn_module<H: ModuleHooks>(&self, module: Module, hooks: H) -> Result<Addr<ModuleMessage>, AppError> {
        let handle = spawn_module(module, hooks)?;
        let addr = handle.address();
        tracing::debug!(target: targets::APP, module = %addr.name(), actor = %addr.id(), "module spawned");
        self.modules.lock().push(handle);
        Ok(addr)
    }

    /// Stop a module and wait for its teardown. Returns false for unknown ids.
    pub fn stop_module(&self, id: ActorId) -> bool {
        let handle = {
            let mut modules = self.modules.lock();
            match modules.iter().position(|handle| handle.id() == id) {
                Some(index) => modules.remove(index),
                None => return false,
            }
        };
        handle.stop_and_join();
        true
    }

    pub fn module_count(&self) -> usize {
        self.modules.lock().len()
    }

    /// Stop every module, then the registry, then the preference store.
    pub fn shutdown(&self) {
        let modules: Vec<_> = self.modules.lock().drain(..).collect();
        if modules.is_empty() && !self.registry.is_running() {
            return;
        }
        let count = modules.len();
        for handle in modules {
            handle.stop_and_join();
        }
        self.registry.stop_and_join();
        self.preferences.stop_and_join();
        tracing::info!(target: targets::APP, modules = count, "application stopped");
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        self.shutdown();
    }
}
