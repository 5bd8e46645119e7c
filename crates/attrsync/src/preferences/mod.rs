//! The preference store.
//!
//! Preferences live in one JSON document. Each preference is an object
//! addressed by a JSON pointer and holds at least a `value`, optionally a
//! `default_value`:
//!
//! ```json
//! { "ui": { "viewport": { "volume": { "value": 0.5, "default_value": 1.0 } } } }
//! ```
//!
//! The [`PreferenceStore`] actor owns the document. Writes can opt out of
//! the change broadcast, which modules use when persisting their own
//! attribute values so the change does not bounce back to them.

mod document;

use std::path::PathBuf;

use attrsync_core::{Actor, ActorId, Context, EventGroup, Recipient, Reply};
use serde_json::Value;

use crate::error::PreferenceError;
use crate::logging::targets;

pub use document::{Preferences, load_json, preference_value, save_json};

/// Events broadcast to preference subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum PreferenceEvent {
    /// A value changed. `path` is the full pointer, ending in `/value`.
    Changed { path: String, value: Value },
    /// The whole document was replaced.
    Reloaded(Value),
}

/// Messages accepted by the [`PreferenceStore`].
#[derive(Debug)]
pub enum PreferenceMessage {
    /// Reply with the whole document, optionally subscribing to changes.
    GetGroup {
        subscriber: Option<Recipient<PreferenceEvent>>,
        reply: Reply<Value>,
    },
    /// Reply with the value of the preference at `path`.
    GetValue {
        path: String,
        reply: Reply<Result<Value, PreferenceError>>,
    },
    /// Write `value` to `path + "/value"`.
    SetValue {
        value: Value,
        path: String,
        create_if_missing: bool,
        broadcast: bool,
    },
    /// Replace the whole document and broadcast it.
    Reload(Value),
    Subscribe(Recipient<PreferenceEvent>),
    Unsubscribe(ActorId),
    /// Write the document to its backing file.
    Save {
        reply: Reply<Result<(), PreferenceError>>,
    },
}

/// Actor owning the preference document.
#[derive(Debug, Default)]
pub struct PreferenceStore {
    prefs: Preferences,
    subscribers: EventGroup<PreferenceEvent>,
    file: Option<PathBuf>,
    dirty: bool,
}

impl PreferenceStore {
    pub fn new(doc: Value) -> Self {
        Self {
            prefs: Preferences::new(doc),
            ..Default::default()
        }
    }

    /// A store backed by `path`. A missing file starts an empty document.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PreferenceError> {
        let path = path.into();
        let doc = if path.exists() {
            load_json(&path)?
        } else {
            Value::Object(Default::default())
        };
        tracing::info!(target: targets::PREFERENCES, path = %path.display(), "preferences loaded");
        Ok(Self {
            prefs: Preferences::new(doc),
            file: Some(path),
            ..Default::default()
        })
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    fn set_value(&mut self, value: Value, path: &str, create_if_missing: bool, broadcast: bool) {
        match self.prefs.set_value(path, value.clone(), create_if_missing) {
            Ok(true) => {
                self.dirty = true;
                tracing::debug!(target: targets::PREFERENCES, path, broadcast, "preference set");
                if broadcast {
                    self.subscribers.broadcast(&PreferenceEvent::Changed {
                        path: format!("{path}/value"),
                        value,
                    });
                }
            }
            Ok(false) => {}
            Err(err) => tracing::warn!(target: targets::PREFERENCES, error = %err, "preference not set"),
        }
    }

    fn save(&mut self) -> Result<(), PreferenceError> {
        let path = self.file.as_ref().ok_or(PreferenceError::NoBackingFile)?;
        save_json(path, self.prefs.document())?;
        self.dirty = false;
        Ok(())
    }
}

impl Actor for PreferenceStore {
    type Message = PreferenceMessage;

    fn handle(&mut self, msg: PreferenceMessage, _ctx: &mut Context<PreferenceMessage>) {
        match msg {
            PreferenceMessage::GetGroup { subscriber, reply } => {
                if let Some(subscriber) = subscriber {
                    self.subscribers.join(subscriber);
                }
                reply.send(self.prefs.document().clone());
            }
            PreferenceMessage::GetValue { path, reply } => {
                reply.send(
                    self.prefs
                        .value(&path)
                        .ok_or(PreferenceError::NotFound(path)),
                );
            }
            PreferenceMessage::SetValue {
                value,
                path,
                create_if_missing,
                broadcast,
            } => self.set_value(value, &path, create_if_missing, broadcast),
            PreferenceMessage::Reload(doc) => {
                self.prefs = Preferences::new(doc.clone());
                self.dirty = true;
                self.subscribers.broadcast(&PreferenceEvent::Reloaded(doc));
            }
            PreferenceMessage::Subscribe(subscriber) => {
                self.subscribers.join(subscriber);
            }
            PreferenceMessage::Unsubscribe(id) => {
                self.subscribers.leave(id);
            }
            PreferenceMessage::Save { reply } => reply.send(self.save()),
        }
    }

    fn stopped(&mut self) {
        if self.dirty && self.file.is_some() {
            if let Err(err) = self.save() {
                tracing::error!(target: targets::PREFERENCES, error = %err, "failed to save preferences");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attrsync_core::{ActorConfig, RequestTimeout, spawn};
    use serde_json::json;

    fn get_value(addr: &attrsync_core::Addr<PreferenceMessage>, path: &str) -> Result<Value, PreferenceError> {
        addr.request(
            |reply| PreferenceMessage::GetValue {
                path: path.to_string(),
                reply,
            },
            RequestTimeout::Infinite,
        )
        .unwrap()
    }

    #[test]
    fn test_set_and_get() {
        let store = PreferenceStore::new(json!({"ui": {"volume": {"default_value": 1.0}}}));
        let handle = spawn(store, ActorConfig::with_name("prefs")).unwrap();
        let addr = handle.address();

        assert_eq!(get_value(&addr, "/ui/volume").unwrap(), json!(1.0));
        addr.tell(PreferenceMessage::SetValue {
            value: json!(0.25),
            path: "/ui/volume".into(),
            create_if_missing: false,
            broadcast: false,
        });
        assert_eq!(get_value(&addr, "/ui/volume").unwrap(), json!(0.25));

        addr.tell(PreferenceMessage::SetValue {
            value: json!(true),
            path: "/ui/new/flag".into(),
            create_if_missing: false,
            broadcast: false,
        });
        assert!(matches!(get_value(&addr, "/ui/new/flag"), Err(PreferenceError::NotFound(_))));
        handle.stop_and_join();
    }

    #[test]
    fn test_save_on_stop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        let handle = spawn(PreferenceStore::open(&path).unwrap(), ActorConfig::with_name("prefs")).unwrap();
        handle.address().tell(PreferenceMessage::SetValue {
            value: json!("dark"),
            path: "/ui/theme".into(),
            create_if_missing: true,
            broadcast: false,
        });
        handle.stop_and_join();

        let doc = load_json(&path).unwrap();
        assert_eq!(doc, json!({"ui": {"theme": {"value": "dark"}}}));
    }

    #[test]
    fn test_save_without_file() {
        let handle = spawn(PreferenceStore::default(), ActorConfig::with_name("prefs")).unwrap();
        let result = handle
            .address()
            .request(|reply| PreferenceMessage::Save { reply }, RequestTimeout::Infinite)
            .unwrap();
        assert!(matches!(result, Err(PreferenceError::NoBackingFile)));
        handle.stop_and_join();
    }
}
