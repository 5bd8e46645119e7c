//! Registry state: named JSON model trees and their subscribers.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::{Duration, Instant};

use attrsync_core::json_tree::{self, DEFAULT_CHILDREN_KEY, JsonTree};
use attrsync_core::{ActorId, Debouncer, EventGroup, NodeId, Recipient};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use super::ModelEvent;
use crate::error::{RegistryError, RegistryResult};
use crate::logging::targets;

/// Payload field holding the uuid of an attribute node.
pub const ATTR_UUID_FIELD: &str = "attr_uuid";
/// Payload field holding the uuid of a menu node.
pub const NODE_UUID_FIELD: &str = "uuid";
/// Payload field used to order menu items.
pub const MENU_POSITION_FIELD: &str = "menu_item_position";

/// How a message addresses a node of a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTarget {
    /// A JSON pointer such as `/children/0/children/2`.
    Path(String),
    /// The node published for an attribute (`attr_uuid` field).
    Attribute(Uuid),
    /// A menu node (`uuid` field).
    Node(Uuid),
}

impl fmt::Display for NodeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeTarget::Path(path) => write!(f, "path \"{path}\""),
            NodeTarget::Attribute(uuid) => write!(f, "attribute {uuid}"),
            NodeTarget::Node(uuid) => write!(f, "node {uuid}"),
        }
    }
}

/// One named model.
#[derive(Debug)]
pub struct Model {
    name: String,
    tree: JsonTree,
    clients: EventGroup<ModelEvent>,
    preference_path: Option<String>,
    menu_watchers: HashMap<Uuid, EventGroup<ModelEvent>>,
    prefs: Debouncer,
}

impl Model {
    fn new(name: &str, data: &Value, preference_path: Option<String>, prefs_delay: Duration) -> Self {
        Self {
            name: name.to_string(),
            tree: json_tree::json_to_tree(data, DEFAULT_CHILDREN_KEY),
            clients: EventGroup::new(),
            preference_path,
            menu_watchers: HashMap::new(),
            prefs: Debouncer::new(prefs_delay),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tree(&self) -> &JsonTree {
        &self.tree
    }

    pub fn preference_path(&self) -> Option<&str> {
        self.preference_path.as_deref()
    }

    pub fn clients(&self) -> &EventGroup<ModelEvent> {
        &self.clients
    }

    pub fn watcher_count(&self, uuid: Uuid) -> usize {
        self.menu_watchers.get(&uuid).map_or(0, EventGroup::len)
    }

    /// The model as a JSON document.
    pub fn to_json(&self) -> Value {
        json_tree::to_json(&self.tree, DEFAULT_CHILDREN_KEY)
    }

    fn find(&self, target: &NodeTarget) -> Option<NodeId> {
        let root = self.tree.root();
        match target {
            NodeTarget::Path(path) => json_tree::pointer_to_node(&self.tree, DEFAULT_CHILDREN_KEY, path),
            NodeTarget::Attribute(uuid) => {
                json_tree::find_by_field(&self.tree, root, ATTR_UUID_FIELD, &json!(uuid.to_string()))
            }
            NodeTarget::Node(uuid) => {
                json_tree::find_by_field(&self.tree, root, NODE_UUID_FIELD, &json!(uuid.to_string()))
            }
        }
    }

    fn locate(&self, target: &NodeTarget) -> RegistryResult<NodeId> {
        self.find(target).ok_or_else(|| RegistryError::NodeNotFound {
            model: self.name.clone(),
            target: target.to_string(),
        })
    }

    fn pointer(&self, node: NodeId) -> String {
        json_tree::node_pointer(&self.tree, node, DEFAULT_CHILDREN_KEY).unwrap_or_default()
    }

    fn broadcast_model(&mut self, skip: Option<ActorId>) {
        let event = ModelEvent::ModelData {
            model: self.name.clone(),
            data: self.to_json(),
        };
        self.clients.broadcast_except(&event, skip);
    }

    fn watchers_of(&mut self, node: NodeId) -> Option<&mut EventGroup<ModelEvent>> {
        let uuid = json_tree::str_field(&self.tree, node, NODE_UUID_FIELD)
            .and_then(|s| Uuid::parse_str(s).ok())?;
        self.menu_watchers.get_mut(&uuid)
    }

    /// Arm the preference push. Returns true if the model is persisted.
    fn schedule_prefs(&mut self) -> bool {
        if self.preference_path.is_none() {
            return false;
        }
        self.prefs.arm_if_idle();
        true
    }

    fn forget(&mut self, actor: ActorId) {
        self.clients.leave(actor);
        for watchers in self.menu_watchers.values_mut() {
            watchers.leave(actor);
        }
        self.menu_watchers.retain(|_, watchers| !watchers.is_empty());
    }
}

/// A model serialized for the preference store.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefsPush {
    pub path: String,
    pub data: Value,
}

/// Orders object payloads by a numeric or string field; payloads without
/// the field sort last.
pub fn compare_by_field(field: &str, a: &Value, b: &Value) -> Ordering {
    match (a.get(field), b.get(field)) {
        (Some(x), Some(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => match (x.as_str(), y.as_str()) {
                (Some(x), Some(y)) => x.cmp(y),
                _ => Ordering::Equal,
            },
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// All models of a registry.
///
/// Every mutation broadcasts its outcome to the affected subscribers and
/// schedules a preference push where the model is persisted.
#[derive(Debug)]
pub struct ModelStore {
    models: BTreeMap<String, Model>,
    prefs_delay: Duration,
}

impl ModelStore {
    pub fn new(prefs_delay: Duration) -> Self {
        Self {
            models: BTreeMap::new(),
            prefs_delay,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Model> {
        self.models.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    fn model_mut(&mut self, name: &str) -> RegistryResult<&mut Model> {
        self.models
            .get_mut(name)
            .ok_or_else(|| RegistryError::UnknownModel(name.to_string()))
    }

    /// Create an empty model on first use.
    fn auto_register(&mut self, name: &str) -> &mut Model {
        let delay = self.prefs_delay;
        self.models.entry(name.to_string()).or_insert_with(|| {
            tracing::debug!(target: targets::REGISTRY, model = name, "auto-registering model");
            Model::new(name, &Value::Object(Map::new()), None, delay)
        })
    }

    /// The model as JSON.
    pub fn model_data(&self, name: &str) -> RegistryResult<Value> {
        self.models
            .get(name)
            .map(Model::to_json)
            .ok_or_else(|| RegistryError::UnknownModel(name.to_string()))
    }

    /// The JSON of one node and its subtree.
    pub fn node_data(&self, name: &str, target: &NodeTarget) -> RegistryResult<Value> {
        let model = self
            .models
            .get(name)
            .ok_or_else(|| RegistryError::UnknownModel(name.to_string()))?;
        let node = model.locate(target)?;
        Ok(json_tree::tree_to_json(&model.tree, node, DEFAULT_CHILDREN_KEY))
    }

    /// Attach `client` to an existing model, or create it from `data`.
    ///
    /// The existing tree always wins over the caller's data. A new client of
    /// an existing model receives the current model data.
    pub fn register_model(
        &mut self,
        name: &str,
        data: &Value,
        preference_path: Option<String>,
        client: Option<Recipient<ModelEvent>>,
    ) -> Value {
        if let Some(model) = self.models.get_mut(name) {
            if let Some(client) = client {
                if model.clients.join(client.clone()) {
                    client.tell(ModelEvent::ModelData {
                        model: model.name.clone(),
                        data: model.to_json(),
                    });
                }
            }
            return model.to_json();
        }

        let from_prefs = preference_path.is_some();
        let mut model = Model::new(name, data, preference_path, self.prefs_delay);
        if let Some(client) = client {
            if from_prefs {
                client.tell(ModelEvent::ModelData {
                    model: name.to_string(),
                    data: model.to_json(),
                });
            }
            model.clients.join(client);
        }
        tracing::debug!(target: targets::REGISTRY, model = name, "model registered");
        let json = model.to_json();
        self.models.insert(name.to_string(), model);
        json
    }

    /// Insert or update the node for an attribute and re-sort the root.
    pub fn register_attribute(
        &mut self,
        name: &str,
        data: &Value,
        attr_uuid: Uuid,
        sort_role: &str,
        client: Option<Recipient<ModelEvent>>,
    ) -> Value {
        let model = self.auto_register(name);
        if let Some(client) = client {
            model.clients.join(client);
        }
        let root = model.tree.root();
        let target = NodeTarget::Attribute(attr_uuid);
        match model.find(&target) {
            Some(node) => {
                model.tree.set_data(node, data.clone());
            }
            None => {
                let end = model.tree.child_count(root);
                json_tree::append_json(&mut model.tree, root, end, data, DEFAULT_CHILDREN_KEY);
            }
        }
        if !sort_role.is_empty() {
            model
                .tree
                .do_sort(root, |a, b| compare_by_field(sort_role, a, b));
        }
        model.broadcast_model(None);
        model.to_json()
    }

    /// Remove the node of an attribute. Returns true if one was removed.
    pub fn deregister_attribute(&mut self, name: &str, attr_uuid: Uuid) -> RegistryResult<bool> {
        let model = self.model_mut(name)?;
        let Some(node) = model.find(&NodeTarget::Attribute(attr_uuid)) else {
            return Ok(false);
        };
        model.tree.remove(node);
        model.broadcast_model(None);
        model.schedule_prefs();
        Ok(true)
    }

    /// Set one role of a node, or replace its payload when `role` is `None`.
    ///
    /// On change, clients other than `setter` and the menu watchers of the
    /// node receive [`ModelEvent::NodeDataChanged`]. Returns whether the node
    /// changed.
    pub fn set_node_data(
        &mut self,
        name: &str,
        target: &NodeTarget,
        role: Option<&str>,
        value: Value,
        setter: Option<ActorId>,
    ) -> RegistryResult<bool> {
        let model = self.model_mut(name)?;
        let node = model.locate(target)?;
        let Some(payload) = model.tree.data_mut(node) else {
            return Ok(false);
        };

        let changed = match role {
            Some(role) => {
                let Value::Object(map) = payload else {
                    return Err(RegistryError::NotAnObject {
                        model: name.to_string(),
                        role: role.to_string(),
                    });
                };
                if map.get(role) == Some(&value) {
                    false
                } else {
                    map.insert(role.to_string(), value.clone());
                    true
                }
            }
            None if *payload == value => false,
            None => {
                *payload = value.clone();
                true
            }
        };
        if !changed {
            return Ok(false);
        }

        let event = ModelEvent::NodeDataChanged {
            model: name.to_string(),
            path: model.pointer(node),
            role: role.map(str::to_string),
            value,
            node: model.tree.data(node).cloned().unwrap_or_default(),
        };
        model.clients.broadcast_except(&event, setter);
        if let Some(watchers) = model.watchers_of(node) {
            watchers.broadcast_except(&event, setter);
        }
        model.schedule_prefs();
        Ok(true)
    }

    /// Insert `count` copies of `data` at `row` under the node at `path`.
    pub fn insert_rows(
        &mut self,
        name: &str,
        path: &str,
        row: usize,
        count: usize,
        data: &Value,
        requester: Option<ActorId>,
    ) -> RegistryResult<()> {
        let model = self.model_mut(name)?;
        let parent = model.locate(&NodeTarget::Path(path.to_string()))?;
        let size = model.tree.child_count(parent);
        if row > size {
            return Err(RegistryError::RowOutOfRange {
                model: name.to_string(),
                path: path.to_string(),
                row,
                size,
            });
        }
        for _ in 0..count {
            json_tree::append_json(&mut model.tree, parent, row, data, DEFAULT_CHILDREN_KEY);
        }
        model.broadcast_model(requester);
        model.schedule_prefs();
        Ok(())
    }

    /// Remove up to `count` children starting at `row`. Returns how many went.
    pub fn remove_rows(
        &mut self,
        name: &str,
        path: &str,
        row: usize,
        count: usize,
        requester: Option<ActorId>,
    ) -> RegistryResult<usize> {
        let model = self.model_mut(name)?;
        let parent = model.locate(&NodeTarget::Path(path.to_string()))?;
        let removed = model.tree.remove_children(parent, row, count);
        model.broadcast_model(requester);
        model.schedule_prefs();
        Ok(removed)
    }

    /// Insert a menu item below the `|`-separated `menu_path`, creating
    /// submenus as needed, or update the item with the same `uuid`.
    pub fn insert_or_update_menu_node(
        &mut self,
        name: &str,
        menu_path: &str,
        data: &Value,
        watcher: Option<Recipient<ModelEvent>>,
    ) -> RegistryResult<NodeId> {
        let uuid = data
            .get(NODE_UUID_FIELD)
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| RegistryError::NodeNotFound {
                model: name.to_string(),
                target: "menu item without a uuid".to_string(),
            })?;

        let model = self.auto_register(name);
        let mut parent = model.tree.root();
        for segment in menu_path.split('|').filter(|s| !s.is_empty()) {
            let existing = model
                .tree
                .children(parent)
                .iter()
                .copied()
                .find(|&c| json_tree::str_field(&model.tree, c, "name") == Some(segment));
            parent = match existing {
                Some(child) => child,
                None => model
                    .tree
                    .push_back(parent, json!({"name": segment, "menu_item_type": "menu"}))
                    .ok_or_else(|| RegistryError::NodeNotFound {
                        model: name.to_string(),
                        target: format!("menu \"{segment}\""),
                    })?,
            };
        }

        let uuid_value = json!(uuid.to_string());
        let existing = model
            .tree
            .children(parent)
            .iter()
            .copied()
            .find(|&c| model.tree.data(c).and_then(|d| d.get(NODE_UUID_FIELD)) == Some(&uuid_value));
        let node = match existing {
            Some(node) => {
                model.tree.set_data(node, data.clone());
                node
            }
            None => {
                let end = model.tree.child_count(parent);
                json_tree::append_json(&mut model.tree, parent, end, data, DEFAULT_CHILDREN_KEY)
                    .ok_or_else(|| RegistryError::NodeNotFound {
                        model: name.to_string(),
                        target: menu_path.to_string(),
                    })?
            }
        };
        model
            .tree
            .do_sort(parent, |a, b| compare_by_field(MENU_POSITION_FIELD, a, b));

        if let Some(watcher) = watcher {
            model.menu_watchers.entry(uuid).or_default().join(watcher);
        }
        model.broadcast_model(None);
        Ok(node)
    }

    /// Remove the node whose `uuid` field matches. Returns true if found.
    pub fn remove_node(&mut self, name: &str, uuid: Uuid) -> RegistryResult<bool> {
        let model = self.auto_register(name);
        model.menu_watchers.remove(&uuid);
        let Some(node) = model.find(&NodeTarget::Node(uuid)) else {
            return Ok(false);
        };
        if model.tree.remove(node).is_none() {
            return Ok(false);
        }
        model.broadcast_model(None);
        Ok(true)
    }

    /// Forward a menu click to the watchers of the node.
    pub fn menu_node_activated(
        &mut self,
        name: &str,
        target: &NodeTarget,
        user_data: Value,
        from_hotkey: bool,
    ) -> RegistryResult<usize> {
        let model = self.model_mut(name)?;
        let node = model.locate(target)?;
        let event = ModelEvent::MenuNodeActivated {
            model: name.to_string(),
            path: model.pointer(node),
            data: model.tree.data(node).cloned().unwrap_or_default(),
            user_data,
            from_hotkey,
        };
        Ok(model
            .watchers_of(node)
            .map_or(0, |watchers| watchers.broadcast(&event)))
    }

    /// Schedule or perform a preference push.
    ///
    /// The first request arms the model's timer; `actually_push` serializes
    /// the model immediately.
    pub fn push_to_prefs(&mut self, name: &str, actually_push: bool) -> RegistryResult<Option<PrefsPush>> {
        let model = self.model_mut(name)?;
        let Some(path) = model.preference_path.clone() else {
            return Ok(None);
        };
        if !actually_push {
            model.prefs.arm_if_idle();
            return Ok(None);
        }
        model.prefs.cancel();
        Ok(Some(PrefsPush {
            path,
            data: model.to_json(),
        }))
    }

    /// Pushes for every model whose timer has expired.
    pub fn expired_pushes(&mut self, now: Instant) -> Vec<PrefsPush> {
        self.take_pushes(|timer| timer.take_if_expired(now))
    }

    /// Pushes for every model with an armed timer, expired or not.
    pub fn pending_pushes(&mut self) -> Vec<PrefsPush> {
        self.take_pushes(|timer| {
            let armed = timer.is_armed();
            timer.cancel();
            armed
        })
    }

    fn take_pushes(&mut self, mut due: impl FnMut(&mut Debouncer) -> bool) -> Vec<PrefsPush> {
        self.models
            .values_mut()
            .filter_map(|model| {
                if !due(&mut model.prefs) {
                    return None;
                }
                Some(PrefsPush {
                    path: model.preference_path.clone()?,
                    data: model.to_json(),
                })
            })
            .collect()
    }

    /// The earliest armed preference timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        attrsync_core::timer::earliest(self.models.values().map(|m| m.prefs.deadline()))
    }

    /// Drop an actor from every client and watcher list.
    pub fn forget(&mut self, actor: ActorId) {
        for model in self.models.values_mut() {
            model.forget(actor);
        }
    }

    /// Drop clients and watchers whose actor has stopped.
    pub fn prune(&mut self) -> usize {
        let mut pruned = 0;
        for model in self.models.values_mut() {
            pruned += model.clients.prune();
            for watchers in model.menu_watchers.values_mut() {
                pruned += watchers.prune();
            }
            model.menu_watchers.retain(|_, w| !w.is_empty());
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ModelStore {
        ModelStore::new(Duration::from_millis(10))
    }

    #[test]
    fn test_first_writer_wins() {
        let mut store = store();
        let first = store.register_model("panels", &json!({"name": "a"}), None, None);
        let second = store.register_model("panels", &json!({"name": "b"}), None, None);
        assert_eq!(first, json!({"name": "a"}));
        assert_eq!(second, first);
        assert_eq!(store.names(), vec!["panels".to_string()]);
    }

    #[test]
    fn test_register_attribute_sorted() {
        let mut store = store();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        store.register_attribute(
            "toolbar",
            &json!({"attr_uuid": a.to_string(), "title": "A", "toolbar_position": 2}),
            a,
            "toolbar_position",
            None,
        );
        let data = store.register_attribute(
            "toolbar",
            &json!({"attr_uuid": b.to_string(), "title": "B", "toolbar_position": 1}),
            b,
            "toolbar_position",
            None,
        );
        assert_eq!(data["children"][0]["title"], "B");
        assert_eq!(data["children"][1]["title"], "A");

        // updating in place keeps one node per attribute
        store.register_attribute(
            "toolbar",
            &json!({"attr_uuid": a.to_string(), "title": "A2", "toolbar_position": 0}),
            a,
            "toolbar_position",
            None,
        );
        let data = store.model_data("toolbar").unwrap();
        assert_eq!(data["children"].as_array().unwrap().len(), 2);
        assert_eq!(data["children"][0]["title"], "A2");

        assert!(store.deregister_attribute("toolbar", a).unwrap());
        assert!(!store.deregister_attribute("toolbar", a).unwrap());
        assert!(matches!(
            store.node_data("toolbar", &NodeTarget::Attribute(a)),
            Err(RegistryError::NodeNotFound { .. })
        ));
    }

    #[test]
    fn test_set_node_data() {
        let mut store = store();
        store.register_model(
            "m",
            &json!({"children": [{"name": "x", "value": 1}, {"name": "y"}]}),
            None,
            None,
        );
        let target = NodeTarget::Path("/children/0".into());
        assert!(store.set_node_data("m", &target, Some("value"), json!(2), None).unwrap());
        assert!(!store.set_node_data("m", &target, Some("value"), json!(2), None).unwrap());
        assert!(store.set_node_data("m", &NodeTarget::Path("/1".into()), None, json!({"name": "z"}), None).unwrap());
        assert_eq!(
            store.model_data("m").unwrap(),
            json!({"children": [{"name": "x", "value": 2}, {"name": "z"}]})
        );
        assert!(matches!(
            store.set_node_data("m", &NodeTarget::Path("/children/5".into()), Some("v"), json!(1), None),
            Err(RegistryError::NodeNotFound { .. })
        ));
        assert!(matches!(
            store.set_node_data("nope", &target, Some("v"), json!(1), None),
            Err(RegistryError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_insert_and_remove_rows() {
        let mut store = store();
        store.register_model("list", &json!({"name": "root"}), None, None);
        store.insert_rows("list", "", 0, 2, &json!({"name": "a"}), None).unwrap();
        store.insert_rows("list", "", 1, 1, &json!({"name": "b"}), None).unwrap();
        assert!(matches!(
            store.insert_rows("list", "", 9, 1, &json!({}), None),
            Err(RegistryError::RowOutOfRange { row: 9, size: 3, .. })
        ));
        let names: Vec<Value> = store.model_data("list").unwrap()["children"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].clone())
            .collect();
        assert_eq!(names, vec![json!("a"), json!("b"), json!("a")]);

        assert_eq!(store.remove_rows("list", "", 1, 5, None).unwrap(), 2);
        assert_eq!(
            store.model_data("list").unwrap(),
            json!({"name": "root", "children": [{"name": "a"}]})
        );
    }

    #[test]
    fn test_menu_nodes() {
        let mut store = store();
        let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
        store
            .insert_or_update_menu_node(
                "main menu",
                "Playback|Speed",
                &json!({"uuid": u1.to_string(), "name": "Fast", "menu_item_position": 2.0}),
                None,
            )
            .unwrap();
        store
            .insert_or_update_menu_node(
                "main menu",
                "Playback|Speed",
                &json!({"uuid": u2.to_string(), "name": "Slow", "menu_item_position": 1.0}),
                None,
            )
            .unwrap();
        store
            .insert_or_update_menu_node(
                "main menu",
                "Playback|Speed",
                &json!({"uuid": u1.to_string(), "name": "Faster", "menu_item_position": 2.0}),
                None,
            )
            .unwrap();

        let data = store.model_data("main menu").unwrap();
        let playback = &data["children"][0];
        assert_eq!(playback["name"], "Playback");
        assert_eq!(playback["menu_item_type"], "menu");
        let speed = &playback["children"][0]["children"];
        assert_eq!(speed.as_array().unwrap().len(), 2);
        assert_eq!(speed[0]["name"], "Slow");
        assert_eq!(speed[1]["name"], "Faster");

        assert!(store.remove_node("main menu", u2).unwrap());
        assert!(!store.remove_node("main menu", u2).unwrap());
        assert!(store.insert_or_update_menu_node("main menu", "X", &json!({"name": "no uuid"}), None).is_err());
    }

    #[test]
    fn test_prefs_push_schedule() {
        let mut store = store();
        store.register_model("layout", &json!({"name": "l"}), Some("/ui/layout".into()), None);
        store.register_model("plain", &json!({}), None, None);
        assert_eq!(store.push_to_prefs("plain", false).unwrap(), None);
        assert_eq!(store.next_deadline(), None);

        store.set_node_data("layout", &NodeTarget::Path(String::new()), Some("name"), json!("m"), None).unwrap();
        let deadline = store.next_deadline().unwrap();
        assert!(store.expired_pushes(deadline - Duration::from_millis(5)).is_empty());
        let pushes = store.expired_pushes(deadline);
        assert_eq!(
            pushes,
            vec![PrefsPush {
                path: "/ui/layout".into(),
                data: json!({"name": "m"})
            }]
        );
        assert_eq!(store.next_deadline(), None);

        let push = store.push_to_prefs("layout", true).unwrap().unwrap();
        assert_eq!(push.path, "/ui/layout");
    }

    #[test]
    fn test_compare_by_field() {
        let a = json!({"p": 1});
        let b = json!({"p": 2.5});
        let none = json!({});
        assert_eq!(compare_by_field("p", &a, &b), Ordering::Less);
        assert_eq!(compare_by_field("p", &none, &a), Ordering::Greater);
        assert_eq!(compare_by_field("p", &none, &none), Ordering::Equal);
    }
}
