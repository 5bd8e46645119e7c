//! attrsync - observable attributes, linked modules and a central UI model
//! registry.
//!
//! The crate is organised around four pieces:
//!
//! - [`attribute`]: typed properties with per-role data
//! - [`module`]: named collections of attributes running the change
//!   pipeline (events, UI models, menus, preferences, linking)
//! - [`registry`]: the actor owning every named UI model tree
//! - [`preferences`]: the JSON preference store modules persist into
//!
//! Services and modules run as actors from `attrsync-core`. An
//! [`Application`] starts the services and spawns modules wired to them.
//!
//! # Example
//!
//! ```no_run
//! use attrsync::module::ModuleMessage;
//! use attrsync::{AppConfig, Application};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = Application::new(AppConfig::default())?;
//!
//!     let mut playhead = app.create_module("playhead");
//!     let looping = playhead.add_boolean_attribute("Loop", "Loop", false);
//!     playhead.expose_attribute_in_model_data(looping, "playhead toolbar", true)?;
//!     let playhead = app.spawn_module(playhead, ())?;
//!
//!     playhead.send(ModuleMessage::SetRoleData {
//!         attribute: looping.into(),
//!         role: attrsync::Role::Value,
//!         value: serde_json::json!(true),
//!         notify: true,
//!         reply: None,
//!     })?;
//!
//!     let toolbar = app.registry_client().model_data("playhead toolbar")?;
//!     println!("{toolbar:#}");
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod attribute;
pub mod config;
pub mod error;
pub mod hotkey;
pub mod logging;
pub mod module;
pub mod preferences;
pub mod registry;

pub use application::{AppContext, Application};
pub use attribute::{Attribute, AttributeKind, AttributeValue, ColourTriplet, FloatOptions, Role};
pub use config::AppConfig;
pub use error::{
    AppError, AttributeError, ConfigError, ModuleError, ModuleResult, PreferenceError, RegistryError,
    RegistryResult,
};
pub use hotkey::{Hotkey, HotkeyEvent, KeypressMessage};
pub use module::{
    AttributeEvent, MenuItem, Module, ModuleActor, ModuleHooks, ModuleMessage, spawn_module,
};
pub use preferences::{PreferenceEvent, PreferenceMessage, PreferenceStore};
pub use registry::{ModelEvent, ModelRegistry, NodeTarget, RegistryClient, RegistryMessage};

pub use attrsync_core::{ActorId, Addr, Recipient, RequestTimeout};
