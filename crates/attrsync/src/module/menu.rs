//! Menu items projected from module attributes into registry menu models.
//!
//! An attribute carries its menu placements in the `menu_paths` role, one
//! string per placement:
//!
//! ```text
//! [RESKIN|][USE_ATTR_VALUE|]<model>|<path>[|<node uuid>]
//! ```
//!
//! The module assigns a node uuid to each placement the first time it sees
//! it and keeps the payload of the registry node in step with the
//! attribute.

use std::fmt;

use serde_json::{Map, Value, json};
use uuid::Uuid;

use super::{ChangeOrigin, HookCall, Module, uuid_field};
use crate::attribute::{Attribute, AttributeKind, AttributeValue, Role};
use crate::error::ModuleResult;
use crate::logging::targets;
use crate::registry::{MENU_POSITION_FIELD, NODE_UUID_FIELD, NodeTarget, RegistryMessage};

/// The item shows custom text instead of the attribute title.
pub const RESKIN_MARKER: &str = "RESKIN|";
/// The item shows the attribute value as its text.
pub const USE_ATTR_VALUE_MARKER: &str = "USE_ATTR_VALUE|";

/// A parsed `menu_paths` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub reskin: bool,
    pub use_attr_value: bool,
    pub model: String,
    pub path: String,
    pub node: Option<Uuid>,
}

impl MenuEntry {
    /// Returns `None` for entries without a model name.
    pub fn parse(text: &str) -> Option<MenuEntry> {
        let mut rest = text;
        let mut reskin = false;
        let mut use_attr_value = false;
        loop {
            if let Some(stripped) = rest.strip_prefix(RESKIN_MARKER) {
                reskin = true;
                rest = stripped;
            } else if let Some(stripped) = rest.strip_prefix(USE_ATTR_VALUE_MARKER) {
                use_attr_value = true;
                rest = stripped;
            } else {
                break;
            }
        }

        let mut segments: Vec<&str> = rest.split('|').collect();
        let node = match segments.last().map(|last| Uuid::parse_str(last)) {
            Some(Ok(uuid)) if segments.len() > 1 => {
                segments.pop();
                Some(uuid)
            }
            _ => None,
        };
        let model = segments.first().filter(|model| !model.is_empty())?.to_string();
        let path = segments[1..].join("|");
        Some(MenuEntry {
            reskin,
            use_attr_value,
            model,
            path,
            node,
        })
    }

    /// `model|path`, without markers or node.
    pub fn location(&self) -> String {
        if self.path.is_empty() {
            self.model.clone()
        } else {
            format!("{}|{}", self.model, self.path)
        }
    }
}

impl fmt::Display for MenuEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reskin {
            f.write_str(RESKIN_MARKER)?;
        }
        if self.use_attr_value {
            f.write_str(USE_ATTR_VALUE_MARKER)?;
        }
        f.write_str(&self.location())?;
        if let Some(node) = self.node {
            write!(f, "|{node}")?;
        }
        Ok(())
    }
}

/// A menu item owned by a module.
///
/// Items bound to an attribute track its state: toggles for booleans,
/// multichoice menus for combo boxes and buttons for actions.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuItem {
    pub model: String,
    /// Display text. Empty means the attribute title.
    pub text: String,
    pub path: String,
    pub position: Option<f64>,
    pub attribute: Option<Uuid>,
    pub divider: bool,
    pub hotkey: Option<Uuid>,
    pub user_data: Value,
    pub use_attr_value: bool,
}

impl MenuItem {
    pub fn new(model: impl Into<String>, text: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            text: text.into(),
            path: path.into(),
            position: None,
            attribute: None,
            divider: false,
            hotkey: None,
            user_data: Value::Null,
            use_attr_value: false,
        }
    }

    pub fn position(mut self, position: f64) -> Self {
        self.position = Some(position);
        self
    }

    pub fn attribute(mut self, attribute: Uuid) -> Self {
        self.attribute = Some(attribute);
        self
    }

    pub fn divider(mut self) -> Self {
        self.divider = true;
        self
    }

    pub fn hotkey(mut self, hotkey: Uuid) -> Self {
        self.hotkey = Some(hotkey);
        self
    }

    pub fn user_data(mut self, user_data: Value) -> Self {
        self.user_data = user_data;
        self
    }

    pub fn use_attr_value(mut self) -> Self {
        self.use_attr_value = true;
        self
    }
}

/// The attribute-dependent part of a menu node payload.
pub fn attribute_menu_item_data(attribute: &Attribute) -> Value {
    match attribute.kind() {
        AttributeKind::Boolean => json!({
            "menu_item_type": "toggle",
            "is_checked": attribute.get_role_data::<bool>(Role::Value).unwrap_or(false),
        }),
        AttributeKind::StringChoice => json!({
            "menu_item_type": "multichoice",
            "choices": attribute.role_data_as_json(Role::StringChoices).unwrap_or_else(|_| json!([])),
            "current_choice": attribute.value_json(),
        }),
        AttributeKind::Action => json!({"menu_item_type": "button"}),
        _ => json!({
            "menu_item_type": "item",
            "value": attribute.value_json(),
        }),
    }
}

fn value_text(attribute: &Attribute) -> String {
    match attribute.value_json() {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl Module {
    /// Add a menu item and publish it once attached. Returns the node uuid.
    ///
    /// Items bound to an attribute are also recorded in its `menu_paths`.
    pub fn insert_menu_item(&mut self, mut item: MenuItem) -> ModuleResult<Uuid> {
        let node = Uuid::new_v4();
        if let Some(attribute) = item.attribute {
            let index = self.locate(&attribute.into())?;
            if item.text == self.attributes[index].title() {
                item.text.clear();
            }
            let entry = MenuEntry {
                reskin: !item.text.is_empty(),
                use_attr_value: item.use_attr_value,
                model: item.model.clone(),
                path: item.path.clone(),
                node: Some(node),
            };
            self.push_menu_path(index, entry.to_string());
        }
        if let Some(hotkey) = item.hotkey {
            self.menu_hotkeys.insert(hotkey, node);
        }
        tracing::debug!(target: targets::MODULE, module = %self.name, model = %item.model, path = %item.path, %node, "menu item added");
        self.menu_nodes.insert(node, item);
        self.publish_menu_node(node);
        Ok(node)
    }

    /// Returns true if the node belonged to this module.
    pub fn remove_menu_item(&mut self, node: Uuid) -> bool {
        let Some(item) = self.menu_nodes.remove(&node) else {
            return false;
        };
        self.menu_hotkeys.retain(|_, mapped| *mapped != node);
        if let Some(index) = item.attribute.and_then(|uuid| self.locate(&uuid.into()).ok()) {
            let paths: Vec<String> = self.attributes[index]
                .get_role_data(Role::MenuPaths)
                .unwrap_or_default();
            let kept: Vec<String> = paths
                .into_iter()
                .filter(|text| MenuEntry::parse(text).and_then(|e| e.node) != Some(node))
                .collect();
            if let Err(err) = self.attributes[index].set_role_data(Role::MenuPaths, kept) {
                tracing::warn!(target: targets::MODULE, error = %err, "menu paths not updated");
            }
        }
        if let Some(registry) = self.attached_registry() {
            registry.tell(RegistryMessage::RemoveNode {
                model: item.model,
                uuid: node,
            });
        }
        true
    }

    /// Menu placements of every attribute under `root`, keyed by title.
    pub fn menu_attrs(&self, root: &str) -> Value {
        let mut out = Map::new();
        for attribute in &self.attributes {
            let paths: Vec<String> = attribute.get_role_data(Role::MenuPaths).unwrap_or_default();
            let matching: Vec<Value> = paths
                .iter()
                .filter_map(|text| MenuEntry::parse(text))
                .filter(|entry| entry.location().starts_with(root))
                .map(|entry| Value::String(entry.location()))
                .collect();
            if !matching.is_empty() {
                out.insert(
                    attribute.title().to_string(),
                    json!({
                        "attr_uuid": attribute.uuid().to_string(),
                        "menu_paths": matching,
                        "data": attribute_menu_item_data(attribute),
                    }),
                );
            }
        }
        Value::Object(out)
    }

    /// The full registry payload of a menu node.
    pub(super) fn menu_payload(&self, node: Uuid, item: &MenuItem) -> Value {
        let mut data = Map::new();
        data.insert(NODE_UUID_FIELD.to_string(), json!(node.to_string()));
        let kind = if item.divider { "divider" } else { "item" };
        data.insert("menu_item_type".to_string(), json!(kind));
        if let Some(position) = item.position {
            data.insert(MENU_POSITION_FIELD.to_string(), json!(position));
        }
        if let Some(hotkey) = item.hotkey {
            data.insert("hotkey_uuid".to_string(), json!(hotkey.to_string()));
        }
        if !item.user_data.is_null() {
            data.insert("user_data".to_string(), item.user_data.clone());
        }

        let attribute = item.attribute.and_then(|uuid| self.attribute(uuid));
        let name = match attribute {
            Some(attribute) if item.use_attr_value => value_text(attribute),
            Some(attribute) if item.text.is_empty() => attribute.title().to_string(),
            _ => item.text.clone(),
        };
        data.insert("name".to_string(), json!(name));
        if let Some(Value::Object(extra)) = attribute.map(attribute_menu_item_data) {
            data.extend(extra);
        }
        Value::Object(data)
    }

    pub(super) fn publish_menu_node(&self, node: Uuid) {
        let (Some(registry), Some(parent)) = (&self.context.registry, &self.parent) else {
            return;
        };
        let Some(item) = self.menu_nodes.get(&node) else {
            return;
        };
        registry.tell(RegistryMessage::InsertOrUpdateMenuNode {
            model: item.model.clone(),
            menu_path: item.path.clone(),
            data: self.menu_payload(node, item),
            watcher: Some(parent.recipient()),
        });
    }

    /// Push fresh payloads for every menu node bound to `attribute`.
    pub(super) fn update_attribute_menu_item_data(&self, attribute: Uuid) -> usize {
        let Some(registry) = self.attached_registry() else {
            return 0;
        };
        let mut sent = 0;
        for (node, item) in self
            .menu_nodes
            .iter()
            .filter(|(_, item)| item.attribute == Some(attribute))
        {
            registry.tell(RegistryMessage::SetNodeData {
                model: item.model.clone(),
                target: NodeTarget::Node(*node),
                role: None,
                value: self.menu_payload(*node, item),
                setter: self.id(),
            });
            sent += 1;
        }
        sent
    }

    fn push_menu_path(&mut self, index: usize, entry: String) {
        let mut paths: Vec<String> = self.attributes[index]
            .get_role_data(Role::MenuPaths)
            .unwrap_or_default();
        paths.push(entry);
        if let Err(err) = self.attributes[index].set_role_data(Role::MenuPaths, paths) {
            tracing::warn!(target: targets::MODULE, error = %err, "menu paths not updated");
        }
    }

    /// Create menu items for `menu_paths` entries not seen before. Returns
    /// the new node uuids.
    pub(super) fn adopt_menu_paths(&mut self, attribute: Uuid) -> Vec<Uuid> {
        let Ok(index) = self.locate(&attribute.into()) else {
            return Vec::new();
        };
        let paths: Vec<String> = self.attributes[index]
            .get_role_data(Role::MenuPaths)
            .unwrap_or_default();
        let mut rewritten = Vec::with_capacity(paths.len());
        let mut adopted = Vec::new();
        for text in paths {
            let Some(mut entry) = MenuEntry::parse(&text) else {
                tracing::warn!(target: targets::MODULE, module = %self.name, entry = %text, "malformed menu path");
                rewritten.push(text);
                continue;
            };
            let node = *entry.node.get_or_insert_with(Uuid::new_v4);
            if !self.menu_nodes.contains_key(&node) {
                let mut item = MenuItem::new(&entry.model, "", &entry.path).attribute(attribute);
                item.use_attr_value = entry.use_attr_value;
                self.menu_nodes.insert(node, item);
                adopted.push(node);
            }
            rewritten.push(entry.to_string());
        }
        if !adopted.is_empty() {
            if let Err(err) = self.attributes[index].set_role_data(Role::MenuPaths, rewritten) {
                tracing::warn!(target: targets::MODULE, error = %err, "menu paths not updated");
            }
        }
        adopted
    }

    /// React to a menu node being triggered in the UI or by its hotkey.
    pub fn menu_node_activated(&mut self, data: &Value, user_data: &Value, from_hotkey: bool) {
        let attribute = uuid_field(data, NODE_UUID_FIELD)
            .and_then(|node| self.menu_nodes.get(&node))
            .and_then(|item| item.attribute);
        if let Some(index) = attribute.and_then(|uuid| self.locate(&uuid.into()).ok()) {
            self.activate_attribute(index, data, user_data);
        }
        self.hook_calls.push(HookCall::MenuItemActivated {
            item: data.clone(),
            user_data: user_data.clone(),
            from_hotkey,
        });
    }

    fn activate_attribute(&mut self, index: usize, data: &Value, user_data: &Value) {
        let origin = ChangeOrigin::Local;
        let result = match self.attributes[index].kind() {
            AttributeKind::Boolean => {
                let checked = self.attributes[index]
                    .get_role_data::<bool>(Role::Value)
                    .unwrap_or(false);
                self.write(index, Role::Value, AttributeValue::from(!checked), true, &origin)
            }
            AttributeKind::StringChoice => {
                let choice = user_data
                    .as_str()
                    .or_else(|| data.get("current_choice").and_then(Value::as_str));
                match choice {
                    Some(choice) => self.write(index, Role::Value, AttributeValue::from(choice), true, &origin),
                    None => Ok(false),
                }
            }
            AttributeKind::Action => {
                self.write(index, Role::Activated, AttributeValue::from(true), true, &origin)
                    .and_then(|_| self.write(index, Role::Activated, AttributeValue::from(false), true, &origin))
            }
            _ => Ok(false),
        };
        if let Err(err) = result {
            tracing::warn!(target: targets::MODULE, module = %self.name, error = %err, "menu activation rejected");
        }
    }

    /// Apply an edit of a menu node's checked state or choice.
    pub(super) fn menu_node_edited(
        &mut self,
        node: Uuid,
        role: Option<&str>,
        value: &Value,
        origin: &ChangeOrigin,
    ) {
        if !matches!(role, Some("is_checked" | "current_choice" | "value")) {
            return;
        }
        let Some(attribute) = self.menu_nodes.get(&node).and_then(|item| item.attribute) else {
            return;
        };
        let Ok(index) = self.locate(&attribute.into()) else {
            return;
        };
        if let Err(err) = self.write_json(index, Role::Value, value, true, origin) {
            tracing::warn!(target: targets::MODULE, module = %self.name, error = %err, "menu edit rejected");
        }
    }
}
