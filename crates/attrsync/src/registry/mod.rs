//! The central model registry.
//!
//! [`ModelRegistry`] is a single actor owning every named UI model of the
//! process. Producers (modules) publish attribute data and menu items into
//! models; any number of clients subscribe to a model and may edit it. All
//! mutations go through the registry mailbox, so edits to one model are
//! applied one at a time and never interleave mid-update.
//!
//! Each mutation is re-broadcast to the model's clients as a [`ModelEvent`].
//! Node edits carry the id of the actor that made them and are not echoed
//! back to it.
//!
//! Lookup misses on fire-and-forget messages are logged and dropped; request
//! messages reply with a [`RegistryError`].

mod model;

use std::time::{Duration, Instant};

use attrsync_core::{Actor, ActorId, Addr, Context, Recipient, Reply, RequestTimeout};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::logging::targets;
use crate::preferences::{PreferenceMessage, preference_value};

pub use model::{
    ATTR_UUID_FIELD, MENU_POSITION_FIELD, Model, ModelStore, NODE_UUID_FIELD, NodeTarget, PrefsPush,
    compare_by_field,
};

/// Events sent to model clients and menu watchers.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    /// The full model after a structural change.
    ModelData { model: String, data: Value },
    /// One node changed. `node` is the node payload after the change.
    NodeDataChanged {
        model: String,
        path: String,
        role: Option<String>,
        value: Value,
        node: Value,
    },
    /// A menu item was clicked or triggered by its hotkey.
    MenuNodeActivated {
        model: String,
        path: String,
        data: Value,
        user_data: Value,
        from_hotkey: bool,
    },
}

/// Messages accepted by the [`ModelRegistry`].
#[derive(Debug)]
pub enum RegistryMessage {
    /// Create a model or attach to an existing one; replies with the model.
    ///
    /// With a preference path and null `data` the initial tree is read from
    /// the preference store.
    RegisterModel {
        name: String,
        data: Value,
        preference_path: Option<String>,
        client: Option<Recipient<ModelEvent>>,
        reply: Option<Reply<Value>>,
    },
    /// Insert or update the node describing an attribute.
    RegisterAttribute {
        model: String,
        data: Value,
        attr_uuid: Uuid,
        sort_role: String,
        client: Option<Recipient<ModelEvent>>,
        reply: Option<Reply<Value>>,
    },
    DeregisterAttribute {
        model: String,
        attr_uuid: Uuid,
        client: Option<ActorId>,
    },
    /// Set one role of a node, or its whole payload when `role` is `None`.
    SetNodeData {
        model: String,
        target: NodeTarget,
        role: Option<String>,
        value: Value,
        setter: Option<ActorId>,
    },
    InsertRows {
        model: String,
        path: String,
        row: usize,
        count: usize,
        data: Value,
        requester: Option<ActorId>,
    },
    RemoveRows {
        model: String,
        path: String,
        row: usize,
        count: usize,
        requester: Option<ActorId>,
    },
    InsertOrUpdateMenuNode {
        model: String,
        menu_path: String,
        data: Value,
        watcher: Option<Recipient<ModelEvent>>,
    },
    RemoveNode {
        model: String,
        uuid: Uuid,
    },
    MenuNodeActivated {
        model: String,
        target: NodeTarget,
        user_data: Value,
        from_hotkey: bool,
    },
    PushToPrefs {
        model: String,
        actually_push: bool,
    },
    /// Stop sending events to `client`.
    Leave {
        client: ActorId,
    },
    ModelData {
        name: String,
        reply: Reply<RegistryResult<Value>>,
    },
    NodeData {
        model: String,
        target: NodeTarget,
        reply: Reply<RegistryResult<Value>>,
    },
    ModelNames {
        reply: Reply<Vec<String>>,
    },
}

/// The registry actor.
#[derive(Debug)]
pub struct ModelRegistry {
    store: ModelStore,
    preferences: Option<Addr<PreferenceMessage>>,
    timeout: RequestTimeout,
    prune_interval: Duration,
    next_prune: Instant,
}

/// How often clients and watchers of stopped actors are dropped.
const PRUNE_INTERVAL: Duration = Duration::from_secs(5);

impl ModelRegistry {
    pub fn new(config: &AppConfig, preferences: Option<Addr<PreferenceMessage>>) -> Self {
        Self {
            store: ModelStore::new(config.prefs_push_delay()),
            preferences,
            timeout: config.timeout(),
            prune_interval: PRUNE_INTERVAL,
            next_prune: Instant::now() + PRUNE_INTERVAL,
        }
    }

    pub fn prune_interval(mut self, interval: Duration) -> Self {
        self.next_prune = Instant::now() + interval;
        self.prune_interval = interval;
        self
    }

    /// Drop stopped clients and watchers once the prune interval has passed.
    fn prune_if_due(&mut self, now: Instant) -> Option<usize> {
        if now < self.next_prune {
            return None;
        }
        self.next_prune = now + self.prune_interval;
        let pruned = self.store.prune();
        if pruned > 0 {
            tracing::debug!(target: targets::REGISTRY, pruned, "dropped stopped clients");
        }
        Some(pruned)
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Read a model's initial tree from the preference store.
    fn load_from_prefs(&self, path: &str) -> Value {
        let Some(prefs) = &self.preferences else {
            tracing::warn!(target: targets::REGISTRY, path, "no preference store to load model from");
            return Value::Object(Map::new());
        };
        match prefs.request(
            |reply| PreferenceMessage::GetGroup {
                subscriber: None,
                reply,
            },
            self.timeout,
        ) {
            Ok(doc) => preference_value(&doc, path).unwrap_or_else(|| Value::Object(Map::new())),
            Err(err) => {
                tracing::warn!(target: targets::REGISTRY, path, error = %err, "failed to read model preferences");
                Value::Object(Map::new())
            }
        }
    }

    fn send_to_prefs(&self, push: PrefsPush) {
        let Some(prefs) = &self.preferences else {
            return;
        };
        tracing::debug!(target: targets::REGISTRY, path = %push.path, "pushing model to preferences");
        prefs.tell(PreferenceMessage::SetValue {
            value: push.data,
            path: push.path,
            create_if_missing: true,
            broadcast: true,
        });
    }

    #[tracing::instrument(skip(self, data, client, reply), target = "attrsync::registry", level = "debug")]
    fn register_model(
        &mut self,
        name: String,
        data: Value,
        preference_path: Option<String>,
        client: Option<Recipient<ModelEvent>>,
        reply: Option<Reply<Value>>,
    ) {
        let data = match &preference_path {
            Some(path) if data.is_null() && !self.store.contains(&name) => self.load_from_prefs(path),
            _ => data,
        };
        let preference_path = preference_path.filter(|p| !p.is_empty());
        let json = self.store.register_model(&name, &data, preference_path, client);
        if let Some(reply) = reply {
            reply.send(json);
        }
    }

    fn log_miss<T>(what: &str, result: RegistryResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(target: targets::REGISTRY, error = %err, "{what} dropped");
                None
            }
        }
    }
}

impl Actor for ModelRegistry {
    type Message = RegistryMessage;

    fn handle(&mut self, msg: RegistryMessage, _ctx: &mut Context<RegistryMessage>) {
        match msg {
            RegistryMessage::RegisterModel {
                name,
                data,
                preference_path,
                client,
                reply,
            } => self.register_model(name, data, preference_path, client, reply),
            RegistryMessage::RegisterAttribute {
                model,
                data,
                attr_uuid,
                sort_role,
                client,
                reply,
            } => {
                let json = self
                    .store
                    .register_attribute(&model, &data, attr_uuid, &sort_role, client);
                if let Some(reply) = reply {
                    reply.send(json);
                }
            }
            RegistryMessage::DeregisterAttribute {
                model,
                attr_uuid,
                client,
            } => {
                tracing::debug!(target: targets::REGISTRY, model = %model, %attr_uuid, ?client, "deregistering attribute");
                Self::log_miss(
                    "deregister_attribute",
                    self.store.deregister_attribute(&model, attr_uuid),
                );
            }
            RegistryMessage::SetNodeData {
                model,
                target,
                role,
                value,
                setter,
            } => {
                Self::log_miss(
                    "set_node_data",
                    self.store
                        .set_node_data(&model, &target, role.as_deref(), value, setter),
                );
            }
            RegistryMessage::InsertRows {
                model,
                path,
                row,
                count,
                data,
                requester,
            } => {
                Self::log_miss(
                    "insert_rows",
                    self.store
                        .insert_rows(&model, &path, row, count, &data, requester),
                );
            }
            RegistryMessage::RemoveRows {
                model,
                path,
                row,
                count,
                requester,
            } => {
                Self::log_miss(
                    "remove_rows",
                    self.store.remove_rows(&model, &path, row, count, requester),
                );
            }
            RegistryMessage::InsertOrUpdateMenuNode {
                model,
                menu_path,
                data,
                watcher,
            } => {
                Self::log_miss(
                    "insert_or_update_menu_node",
                    self.store
                        .insert_or_update_menu_node(&model, &menu_path, &data, watcher),
                );
            }
            RegistryMessage::RemoveNode { model, uuid } => {
                Self::log_miss("remove_node", self.store.remove_node(&model, uuid));
            }
            RegistryMessage::MenuNodeActivated {
                model,
                target,
                user_data,
                from_hotkey,
            } => {
                Self::log_miss(
                    "menu_node_activated",
                    self.store
                        .menu_node_activated(&model, &target, user_data, from_hotkey),
                );
            }
            RegistryMessage::PushToPrefs {
                model,
                actually_push,
            } => {
                if let Some(Some(push)) = Self::log_miss(
                    "push_to_prefs",
                    self.store.push_to_prefs(&model, actually_push),
                ) {
                    self.send_to_prefs(push);
                }
            }
            RegistryMessage::Leave { client } => self.store.forget(client),
            RegistryMessage::ModelData { name, reply } => reply.send(self.store.model_data(&name)),
            RegistryMessage::NodeData {
                model,
                target,
                reply,
            } => reply.send(self.store.node_data(&model, &target)),
            RegistryMessage::ModelNames { reply } => reply.send(self.store.names()),
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        Some(
            self.store
                .next_deadline()
                .map_or(self.next_prune, |deadline| deadline.min(self.next_prune)),
        )
    }

    fn deadline_reached(&mut self, _ctx: &mut Context<RegistryMessage>) {
        let now = Instant::now();
        self.prune_if_due(now);
        for push in self.store.expired_pushes(now) {
            self.send_to_prefs(push);
        }
    }

    fn stopped(&mut self) {
        for push in self.store.pending_pushes() {
            self.send_to_prefs(push);
        }
        tracing::debug!(target: targets::REGISTRY, models = self.store.names().len(), "registry stopped");
    }
}

/// Blocking convenience calls against a registry address.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    addr: Addr<RegistryMessage>,
    timeout: RequestTimeout,
}

impl RegistryClient {
    pub fn new(addr: Addr<RegistryMessage>, timeout: RequestTimeout) -> Self {
        Self { addr, timeout }
    }

    pub fn address(&self) -> &Addr<RegistryMessage> {
        &self.addr
    }

    pub fn register_model(
        &self,
        name: &str,
        data: Value,
        preference_path: Option<&str>,
        client: Option<Recipient<ModelEvent>>,
    ) -> RegistryResult<Value> {
        Ok(self.addr.request(
            |reply| RegistryMessage::RegisterModel {
                name: name.to_string(),
                data,
                preference_path: preference_path.map(str::to_string),
                client,
                reply: Some(reply),
            },
            self.timeout,
        )?)
    }

    pub fn model_data(&self, name: &str) -> RegistryResult<Value> {
        self.addr.request(
            |reply| RegistryMessage::ModelData {
                name: name.to_string(),
                reply,
            },
            self.timeout,
        )?
    }

    pub fn node_data(&self, model: &str, target: NodeTarget) -> RegistryResult<Value> {
        self.addr.request(
            |reply| RegistryMessage::NodeData {
                model: model.to_string(),
                target,
                reply,
            },
            self.timeout,
        )?
    }

    pub fn model_names(&self) -> RegistryResult<Vec<String>> {
        Ok(self
            .addr
            .request(|reply| RegistryMessage::ModelNames { reply }, self.timeout)?)
    }

    pub fn set_node_data(
        &self,
        model: &str,
        target: NodeTarget,
        role: Option<&str>,
        value: Value,
        setter: Option<ActorId>,
    ) -> RegistryResult<()> {
        Ok(self.addr.send(RegistryMessage::SetNodeData {
            model: model.to_string(),
            target,
            role: role.map(str::to_string),
            value,
            setter,
        })?)
    }

    pub fn activate_menu_node(&self, model: &str, target: NodeTarget, user_data: Value) -> RegistryResult<()> {
        Ok(self.addr.send(RegistryMessage::MenuNodeActivated {
            model: model.to_string(),
            target,
            user_data,
            from_hotkey: false,
        })?)
    }
}
