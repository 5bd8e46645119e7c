//! Modules: named, ordered collections of attributes.
//!
//! A [`Module`] owns its attributes and runs the change pipeline whenever a
//! role write with `notify` set actually changes something:
//!
//! 1. subscribers of the module's [`AttributeEvent`] group are told, and an
//!    `attribute_changed` hook call is queued;
//! 2. every UI model the attribute is exposed in gets the new role value
//!    through the registry, except the model the change came from;
//! 3. menu items projecting the attribute are refreshed;
//! 4. value changes of preference-backed attributes are queued for a
//!    debounced write to the preference store;
//! 5. value changes are forwarded to linked modules, except the one the
//!    change came from.
//!
//! A module lives inside a [`ModuleActor`]. Until the actor attaches it
//! (see [`Module::set_parent`]) nothing is sent to the registry, the
//! preference store or the keypress monitor; exposures, menu items and
//! hotkeys are recorded and published on attach.
//!
//! # Example
//!
//! ```
//! use attrsync::application::AppContext;
//! use attrsync::attribute::Role;
//! use attrsync::module::Module;
//!
//! let mut module = Module::new("playhead", AppContext::default());
//! let looping = module.add_boolean_attribute("Loop", "Loop", false);
//! assert!(module.set_attribute_value(looping, true).unwrap());
//! assert_eq!(module.serialise()["Loop"], true);
//! assert!(module.set_role_data(looping, Role::Value, "sometimes", true).is_err());
//! ```

mod actor;
mod menu;
mod message;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;

use attrsync_core::{ActorId, Addr, Debouncer, EventGroup, Recipient};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::application::AppContext;
use crate::attribute::{
    Attribute, AttributeValue, ColourTriplet, FloatOptions, FromAttributeValue, Role,
};
use crate::error::{ModuleError, ModuleResult};
use crate::hotkey::{Hotkey, HotkeyEvent, KeypressMessage};
use crate::logging::targets;
use crate::preferences::{PreferenceEvent, PreferenceMessage, preference_value};
use crate::registry::{ATTR_UUID_FIELD, ModelEvent, NODE_UUID_FIELD, NodeTarget, RegistryMessage};

pub use actor::{ModuleActor, ModuleHooks, spawn_module};
pub use menu::{MenuEntry, MenuItem, RESKIN_MARKER, USE_ATTR_VALUE_MARKER, attribute_menu_item_data};
pub use message::{AttributeEvent, AttributeRef, ChangeOrigin, ModuleMessage};

/// Sort field of attribute nodes in UI models.
pub const TOOLBAR_SORT_ROLE: &str = "toolbar_position";

/// A deferred call into the module's [`ModuleHooks`].
#[derive(Debug, Clone, PartialEq)]
pub enum HookCall {
    AttributeChanged { attribute: Uuid, role: Role },
    MenuItemActivated {
        item: Value,
        user_data: Value,
        from_hotkey: bool,
    },
    HotkeyPressed { hotkey: Uuid, context: String },
    HotkeyReleased { hotkey: Uuid, context: String },
    ConnectedToUiChanged(bool),
}

/// A named collection of attributes and their synchronization state.
#[derive(Debug)]
pub struct Module {
    name: String,
    uuid: Uuid,
    attributes: Vec<Attribute>,
    context: AppContext,
    parent: Option<Addr<ModuleMessage>>,
    events: EventGroup<AttributeEvent>,
    linked: Vec<Addr<ModuleMessage>>,
    partially_linked: Vec<Addr<ModuleMessage>>,
    linking_disabled: bool,
    prefs_pending: BTreeSet<Uuid>,
    prefs_flush: Debouncer,
    menu_nodes: BTreeMap<Uuid, MenuItem>,
    menu_hotkeys: HashMap<Uuid, Uuid>,
    hotkeys: Vec<Hotkey>,
    pending_hotkeys: Vec<Hotkey>,
    connected_to_ui: bool,
    hook_calls: Vec<HookCall>,
    torn_down: bool,
}

fn uuid_field(data: &Value, field: &str) -> Option<Uuid> {
    data.get(field)
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}

impl Module {
    pub fn new(name: impl Into<String>, context: AppContext) -> Self {
        let flush_delay = context.config.flush_delay();
        Self {
            name: name.into(),
            uuid: Uuid::new_v4(),
            attributes: Vec::new(),
            context,
            parent: None,
            events: EventGroup::new(),
            linked: Vec::new(),
            partially_linked: Vec::new(),
            linking_disabled: false,
            prefs_pending: BTreeSet::new(),
            prefs_flush: Debouncer::new(flush_delay),
            menu_nodes: BTreeMap::new(),
            menu_hotkeys: HashMap::new(),
            hotkeys: Vec::new(),
            pending_hotkeys: Vec::new(),
            connected_to_ui: false,
            hook_calls: Vec::new(),
            torn_down: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// The id of the owning actor, once attached.
    pub fn id(&self) -> Option<ActorId> {
        self.parent.as_ref().map(Addr::id)
    }

    pub fn parent(&self) -> Option<&Addr<ModuleMessage>> {
        self.parent.as_ref()
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub fn is_connected_to_ui(&self) -> bool {
        self.connected_to_ui
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute(&self, uuid: Uuid) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.uuid() == uuid)
    }

    /// The first attribute with the given title.
    pub fn attribute_by_title(&self, title: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.title() == title)
    }

    pub fn hotkeys(&self) -> &[Hotkey] {
        &self.hotkeys
    }

    pub fn menu_items(&self) -> impl Iterator<Item = (Uuid, &MenuItem)> {
        self.menu_nodes.iter().map(|(uuid, item)| (*uuid, item))
    }

    /// Attributes waiting for the preference flush.
    pub fn pending_preference_writes(&self) -> usize {
        self.prefs_pending.len()
    }

    /// Number of linked modules, full and partial.
    pub fn linked_count(&self) -> usize {
        self.linked.len() + self.partially_linked.len()
    }

    pub fn is_linked_to(&self, actor: ActorId) -> bool {
        self.linked
            .iter()
            .chain(&self.partially_linked)
            .any(|peer| peer.id() == actor)
    }

    /// Drain the hook calls queued by recent operations.
    pub fn take_hook_calls(&mut self) -> Vec<HookCall> {
        std::mem::take(&mut self.hook_calls)
    }

    fn locate(&self, attribute: &AttributeRef) -> ModuleResult<usize> {
        let found = match attribute {
            AttributeRef::Uuid(uuid) => self.attributes.iter().position(|a| a.uuid() == *uuid),
            AttributeRef::Title(title) => self.attributes.iter().position(|a| a.title() == title),
        };
        found.ok_or_else(|| match attribute {
            AttributeRef::Uuid(uuid) => ModuleError::UnknownAttribute {
                module: self.name.clone(),
                uuid: *uuid,
            },
            AttributeRef::Title(title) => ModuleError::UnknownTitle {
                module: self.name.clone(),
                title: title.clone(),
            },
        })
    }

    /// The registry, if the module is attached to an actor.
    fn attached_registry(&self) -> Option<&Addr<RegistryMessage>> {
        self.parent.as_ref()?;
        self.context.registry.as_ref()
    }

    // Attribute factories.

    /// Take ownership of a built attribute.
    pub fn add(&mut self, attribute: Attribute) -> Uuid {
        let uuid = attribute.uuid();
        tracing::debug!(target: targets::MODULE, module = %self.name, title = attribute.title(), "attribute added");
        self.attributes.push(attribute);
        let adopted = self.adopt_menu_paths(uuid);
        if self.parent.is_some() {
            let index = self.attributes.len() - 1;
            for model in self.attributes[index].ui_data_models() {
                self.register_in_model(index, &model);
            }
            for node in adopted {
                self.publish_menu_node(node);
            }
        }
        uuid
    }

    pub fn add_float_attribute(
        &mut self,
        title: &str,
        abbr_title: &str,
        value: f64,
        options: FloatOptions,
    ) -> Uuid {
        self.add(Attribute::float(title, abbr_title, value, options))
    }

    pub fn add_string_choice_attribute(
        &mut self,
        title: &str,
        abbr_title: &str,
        value: &str,
        options: Vec<String>,
        abbr_options: Vec<String>,
    ) -> Uuid {
        self.add(Attribute::string_choice(title, abbr_title, value, options, abbr_options))
    }

    /// A combo box from `(option, abbreviation, enabled)` tuples.
    pub fn add_string_choice_attribute_with(
        &mut self,
        title: &str,
        abbr_title: &str,
        value: &str,
        options: &[(&str, &str, bool)],
    ) -> Uuid {
        let names = options.iter().map(|(name, _, _)| name.to_string()).collect();
        let abbrs = options.iter().map(|(_, abbr, _)| abbr.to_string()).collect();
        let enabled: Vec<bool> = options.iter().map(|(_, _, enabled)| *enabled).collect();
        let mut attribute = Attribute::string_choice(title, abbr_title, value, names, abbrs);
        if let Err(err) = attribute.set_role_data(Role::StringChoicesEnabled, enabled) {
            tracing::warn!(target: targets::MODULE, error = %err, "combo box options left enabled");
        }
        self.add(attribute)
    }

    pub fn add_boolean_attribute(&mut self, title: &str, abbr_title: &str, value: bool) -> Uuid {
        self.add(Attribute::boolean(title, abbr_title, value))
    }

    pub fn add_string_attribute(&mut self, title: &str, abbr_title: &str, value: &str) -> Uuid {
        self.add(Attribute::string(title, abbr_title, value))
    }

    pub fn add_integer_attribute(
        &mut self,
        title: &str,
        abbr_title: &str,
        value: i64,
        min: i64,
        max: i64,
    ) -> Uuid {
        self.add(Attribute::integer(title, abbr_title, value, min, max))
    }

    pub fn add_qml_code_attribute(&mut self, title: &str, code: &str) -> Uuid {
        self.add(Attribute::qml_code(title, code))
    }

    pub fn add_action_attribute(&mut self, title: &str, abbr_title: &str) -> Uuid {
        self.add(Attribute::action(title, abbr_title))
    }

    pub fn add_colour_attribute(&mut self, title: &str, abbr_title: &str, value: ColourTriplet) -> Uuid {
        self.add(Attribute::colour(title, abbr_title, value))
    }

    pub fn add_json_attribute(&mut self, title: &str, abbr_title: &str, value: Value) -> Uuid {
        self.add(Attribute::json(title, abbr_title, value))
    }

    pub fn add_float_vector_attribute(&mut self, title: &str, abbr_title: &str, value: Vec<f64>) -> Uuid {
        self.add(Attribute::float_vector(title, abbr_title, value))
    }

    pub fn add_vec4_attribute(&mut self, title: &str, abbr_title: &str, value: [f32; 4]) -> Uuid {
        self.add(Attribute::vec4(title, abbr_title, value))
    }

    /// Build an attribute from a JSON value and role data.
    ///
    /// `combo_box_options` in the role data makes a combo box, `qml_code` a
    /// QML attribute; otherwise the value type picks float, boolean or
    /// string. Every role data entry is then applied.
    pub fn add_attribute(&mut self, title: &str, value: &Value, role_data: &Value) -> ModuleResult<Uuid> {
        let invalid = |reason: &str| ModuleError::InvalidAttribute {
            title: title.to_string(),
            reason: reason.to_string(),
        };

        let mut attribute = if let Some(options) = role_data.get(Role::StringChoices.name()) {
            let options = options
                .as_array()
                .and_then(|items| {
                    items
                        .iter()
                        .map(|item| item.as_str().map(str::to_string))
                        .collect::<Option<Vec<_>>>()
                })
                .ok_or_else(|| invalid("combo_box_options must be a list of strings."))?;
            let value = value
                .as_str()
                .ok_or_else(|| invalid("combo box value must be a string."))?;
            Attribute::string_choice(title, title, value, options, Vec::new())
        } else if let Some(code) = role_data.get(Role::QmlCode.name()) {
            Attribute::qml_code(title, code.as_str().unwrap_or_default())
        } else {
            match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => {
                    return Err(invalid("Integer type attribute not supported."));
                }
                Value::Number(n) => {
                    Attribute::float(title, title, n.as_f64().unwrap_or_default(), FloatOptions::default())
                }
                Value::Bool(b) => Attribute::boolean(title, title, *b),
                Value::String(s) => Attribute::string(title, title, s),
                _ => return Err(invalid("Unrecognised attribute value type")),
            }
        };
        attribute.update_from_json(role_data);
        Ok(self.add(attribute))
    }

    /// Remove an attribute and its UI and menu projections.
    pub fn remove_attribute(&mut self, attribute: Uuid) -> bool {
        let Ok(index) = self.locate(&attribute.into()) else {
            return false;
        };
        let removed = self.attributes.remove(index);
        self.prefs_pending.remove(&attribute);
        self.events.broadcast(&AttributeEvent::Deleted {
            module: self.uuid,
            attribute,
        });
        for model in removed.ui_data_models() {
            self.deregister_from_model(attribute, &model);
        }
        let nodes: Vec<Uuid> = self
            .menu_nodes
            .iter()
            .filter(|(_, item)| item.attribute == Some(attribute))
            .map(|(node, _)| *node)
            .collect();
        for node in nodes {
            self.remove_menu_item(node);
        }
        true
    }

    /// Forward value changes of `attribute` over partial links too.
    pub fn set_partially_linked(&mut self, attribute: Uuid, linked: bool) -> ModuleResult<()> {
        let index = self.locate(&attribute.into())?;
        self.attributes[index].set_partially_linked(linked);
        Ok(())
    }

    pub fn set_redraw_viewport_on_change(&mut self, attribute: Uuid, redraw: bool) -> ModuleResult<()> {
        let index = self.locate(&attribute.into())?;
        self.attributes[index].set_redraw_viewport_on_change(redraw);
        Ok(())
    }

    // Role data.

    pub fn set_role_data(
        &mut self,
        attribute: impl Into<AttributeRef>,
        role: Role,
        value: impl Into<AttributeValue>,
        notify: bool,
    ) -> ModuleResult<bool> {
        let index = self.locate(&attribute.into())?;
        self.write(index, role, value.into(), notify, &ChangeOrigin::Local)
    }

    pub fn set_role_data_json(
        &mut self,
        attribute: impl Into<AttributeRef>,
        role: Role,
        value: &Value,
        notify: bool,
    ) -> ModuleResult<bool> {
        let index = self.locate(&attribute.into())?;
        self.write_json(index, role, value, notify, &ChangeOrigin::Local)
    }

    /// Write a role addressed by its wire name.
    pub fn set_role_data_by_name(&mut self, attribute: Uuid, role: &str, value: &Value) -> ModuleResult<bool> {
        let role = Role::parse(role)?;
        self.set_role_data_json(attribute, role, value, true)
    }

    pub fn set_attribute_value(
        &mut self,
        attribute: impl Into<AttributeRef>,
        value: impl Into<AttributeValue>,
    ) -> ModuleResult<bool> {
        self.set_role_data(attribute, Role::Value, value, true)
    }

    /// Apply a value change to the attribute titled `title`.
    ///
    /// `source` is the linked module actor the change came from, if any.
    pub fn change_attribute_value(
        &mut self,
        title: &str,
        value: &Value,
        notify: bool,
        source: Option<ActorId>,
    ) -> ModuleResult<bool> {
        let index = self.locate(&AttributeRef::Title(title.to_string()))?;
        let origin = source.map_or(ChangeOrigin::Local, ChangeOrigin::Linked);
        self.write_json(index, Role::Value, value, notify, &origin)
    }

    pub fn attribute_value(&self, attribute: impl Into<AttributeRef>) -> ModuleResult<Value> {
        self.role_data_json(attribute, Role::Value)
    }

    pub fn role_data_json(&self, attribute: impl Into<AttributeRef>, role: Role) -> ModuleResult<Value> {
        let index = self.locate(&attribute.into())?;
        Ok(self.attributes[index].role_data_as_json(role)?)
    }

    /// Read the value of an attribute as `T`.
    pub fn get_value<T: FromAttributeValue>(&self, attribute: impl Into<AttributeRef>) -> ModuleResult<T> {
        let index = self.locate(&attribute.into())?;
        Ok(self.attributes[index].get_role_data(Role::Value)?)
    }

    fn write(
        &mut self,
        index: usize,
        role: Role,
        value: AttributeValue,
        notify: bool,
        origin: &ChangeOrigin,
    ) -> ModuleResult<bool> {
        let changed = self.attributes[index].set_role_data(role, value)?;
        if changed && notify {
            self.notify_change(index, role, origin);
        }
        Ok(changed)
    }

    fn write_json(
        &mut self,
        index: usize,
        role: Role,
        value: &Value,
        notify: bool,
        origin: &ChangeOrigin,
    ) -> ModuleResult<bool> {
        let changed = self.attributes[index].set_role_data_json(role, value)?;
        if changed && notify {
            self.notify_change(index, role, origin);
        }
        Ok(changed)
    }

    fn notify_change(&mut self, index: usize, role: Role, origin: &ChangeOrigin) {
        let attribute = &self.attributes[index];
        let uuid = attribute.uuid();
        let value = attribute.role_data_as_json(role).unwrap_or(Value::Null);
        let title = attribute.title().to_string();
        let models = attribute.ui_data_models();
        let redraw = attribute.redraw_viewport_on_change();
        let has_menus = attribute.has_role_data(Role::MenuPaths);
        let persisted = attribute.has_role_data(Role::PreferencePath);
        let partial = attribute.is_partially_linked();
        tracing::trace!(target: targets::MODULE, module = %self.name, title = %title, role = %role, ?origin, "attribute changed");

        let changed = AttributeEvent::Changed {
            module: self.uuid,
            attribute: uuid,
            role,
            value: value.clone(),
        };
        self.events.broadcast(&changed);
        if redraw {
            self.events
                .broadcast(&AttributeEvent::RedrawViewport { module: self.uuid });
        }
        self.hook_calls
            .push(HookCall::AttributeChanged { attribute: uuid, role });

        if let Some(registry) = self.attached_registry() {
            for model in &models {
                if matches!(origin, ChangeOrigin::Model(source) if source == model) {
                    continue;
                }
                registry.tell(RegistryMessage::SetNodeData {
                    model: model.clone(),
                    target: NodeTarget::Attribute(uuid),
                    role: Some(role.name().to_string()),
                    value: value.clone(),
                    setter: self.id(),
                });
            }
        }

        if has_menus {
            if role == Role::MenuPaths {
                for node in self.adopt_menu_paths(uuid) {
                    self.publish_menu_node(node);
                }
            }
            self.update_attribute_menu_item_data(uuid);
        }

        if role != Role::Value {
            return;
        }
        if persisted && *origin != ChangeOrigin::Preferences {
            self.prefs_pending.insert(uuid);
            self.prefs_flush.arm();
        }
        self.forward_to_linked(&title, &value, partial, origin);
    }

    // Linking.

    /// Link this module to `peer`.
    ///
    /// With `all_attrs` every value change is forwarded, otherwise only
    /// changes of attributes marked as partially linked. `both_ways` asks the
    /// peer to link back; `initial_push_sync` sends the current values now.
    pub fn link_to(
        &mut self,
        peer: Addr<ModuleMessage>,
        both_ways: bool,
        all_attrs: bool,
        initial_push_sync: bool,
    ) -> ModuleResult<()> {
        let me = self
            .parent
            .clone()
            .ok_or_else(|| ModuleError::Detached(self.name.clone()))?;
        if peer.id() == me.id() {
            return Ok(());
        }
        let links = if all_attrs {
            &mut self.linked
        } else {
            &mut self.partially_linked
        };
        if !links.contains(&peer) {
            links.push(peer.clone());
        }
        tracing::debug!(target: targets::MODULE, module = %self.name, peer = %peer.id(), both_ways, all_attrs, "linked");

        if both_ways {
            peer.send(ModuleMessage::Link {
                peer: me.clone(),
                both_ways: false,
                all_attrs,
                initial_push_sync: false,
            })?;
        }
        if initial_push_sync {
            let synced = self
                .attributes
                .iter()
                .filter(|a| all_attrs || a.is_partially_linked())
                .filter(|a| a.has_role_data(Role::Value));
            for attribute in synced {
                peer.tell(ModuleMessage::ChangeAttributeValue {
                    title: attribute.title().to_string(),
                    value: attribute.value_json(),
                    notify: true,
                    source: Some(me.id()),
                });
            }
        }
        Ok(())
    }

    /// Returns true if `peer` was linked.
    pub fn unlink_from(&mut self, peer: ActorId) -> bool {
        let before = self.linked_count();
        self.linked.retain(|addr| addr.id() != peer);
        self.partially_linked.retain(|addr| addr.id() != peer);
        before != self.linked_count()
    }

    pub fn unlink_all(&mut self) {
        self.linked.clear();
        self.partially_linked.clear();
    }

    pub fn set_linking_disabled(&mut self, disabled: bool) {
        self.linking_disabled = disabled;
    }

    fn forward_to_linked(&mut self, title: &str, value: &Value, partial: bool, origin: &ChangeOrigin) {
        if self.linking_disabled {
            return;
        }
        let Some(me) = self.id() else {
            return;
        };
        let skip = match origin {
            ChangeOrigin::Linked(source) => Some(*source),
            _ => None,
        };
        self.linked.retain(Addr::is_alive);
        self.partially_linked.retain(Addr::is_alive);

        let partial_peers: &[Addr<ModuleMessage>] = if partial { &self.partially_linked } else { &[] };
        for peer in self.linked.iter().chain(partial_peers) {
            if Some(peer.id()) == skip {
                continue;
            }
            peer.tell(ModuleMessage::ChangeAttributeValue {
                title: title.to_string(),
                value: value.clone(),
                notify: true,
                source: Some(me),
            });
        }
    }

    // Attachment and preferences.

    /// Attach the module to its actor.
    ///
    /// Registers queued hotkeys, subscribes to the preference store and
    /// applies stored preferences, then publishes UI model exposures and
    /// menu items.
    pub fn set_parent(&mut self, parent: Addr<ModuleMessage>) {
        tracing::debug!(target: targets::MODULE, module = %self.name, actor = %parent.id(), "module attached");
        self.parent = Some(parent);
        self.flush_hotkeys();
        self.load_preferences();
        self.publish();
    }

    fn load_preferences(&mut self) {
        let (Some(prefs), Some(parent)) = (&self.context.preferences, &self.parent) else {
            return;
        };
        let doc = prefs.request(
            |reply| PreferenceMessage::GetGroup {
                subscriber: Some(parent.recipient()),
                reply,
            },
            self.context.config.timeout(),
        );
        match doc {
            Ok(doc) => self.update_attrs_from_preferences(&doc, true),
            Err(err) => {
                tracing::warn!(target: targets::MODULE, module = %self.name, error = %err, "failed to read preferences");
            }
        }
    }

    fn publish(&mut self) {
        for index in 0..self.attributes.len() {
            for model in self.attributes[index].ui_data_models() {
                self.register_in_model(index, &model);
            }
        }
        let uuids: Vec<Uuid> = self.attributes.iter().map(Attribute::uuid).collect();
        for uuid in uuids {
            self.adopt_menu_paths(uuid);
        }
        let nodes: Vec<Uuid> = self.menu_nodes.keys().copied().collect();
        for node in nodes {
            self.publish_menu_node(node);
        }
    }

    /// Apply preference values from a whole preference document.
    ///
    /// With `initial` set, `init_only_preference_path` values are applied
    /// too and that role is dropped afterwards.
    pub fn update_attrs_from_preferences(&mut self, doc: &Value, initial: bool) {
        for index in 0..self.attributes.len() {
            let attribute = &self.attributes[index];
            let path = attribute.role_str(Role::PreferencePath).map(str::to_string);
            let init_path = attribute
                .role_str(Role::InitOnlyPreferencePath)
                .map(str::to_string)
                .filter(|_| initial);

            if let Some(value) = path.and_then(|path| preference_value(doc, &path)) {
                self.apply_preference(index, &value);
            }
            if let Some(path) = init_path {
                if let Some(value) = preference_value(doc, &path) {
                    self.apply_preference(index, &value);
                }
                self.attributes[index].delete_role_data(Role::InitOnlyPreferencePath);
            }
        }
    }

    /// Apply a single preference change. `path` ends in `/value`.
    pub fn update_attr_from_preference(&mut self, path: &str, value: &Value) -> usize {
        let matching: Vec<usize> = self
            .attributes
            .iter()
            .enumerate()
            .filter(|(_, a)| {
                a.role_str(Role::PreferencePath)
                    .is_some_and(|pref| format!("{pref}/value") == path)
            })
            .map(|(index, _)| index)
            .collect();
        for &index in &matching {
            self.apply_preference(index, value);
        }
        matching.len()
    }

    fn apply_preference(&mut self, index: usize, value: &Value) {
        if let Err(err) = self.write_json(index, Role::Value, value, true, &ChangeOrigin::Preferences) {
            tracing::warn!(target: targets::MODULE, module = %self.name, error = %err, "preference not applied");
        }
    }

    pub fn preference_event(&mut self, event: PreferenceEvent) {
        match event {
            PreferenceEvent::Changed { path, value } => {
                self.update_attr_from_preference(&path, &value);
            }
            PreferenceEvent::Reloaded(doc) => self.update_attrs_from_preferences(&doc, false),
        }
    }

    /// When the preference flush is due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.prefs_flush.deadline()
    }

    /// Flush queued preference writes if the debounce delay has passed.
    pub fn flush_preferences_if_due(&mut self, now: Instant) -> usize {
        if self.prefs_flush.take_if_expired(now) {
            self.flush_preferences()
        } else {
            0
        }
    }

    /// Write every queued attribute value to the preference store, without
    /// asking the store to broadcast the change.
    pub fn flush_preferences(&mut self) -> usize {
        self.prefs_flush.cancel();
        let pending = std::mem::take(&mut self.prefs_pending);
        let Some(prefs) = &self.context.preferences else {
            if !pending.is_empty() {
                tracing::debug!(target: targets::MODULE, module = %self.name, "no preference store, dropping writes");
            }
            return 0;
        };
        let mut written = 0;
        for uuid in pending {
            let Some(attribute) = self.attribute(uuid) else {
                continue;
            };
            let Some(path) = attribute.role_str(Role::PreferencePath) else {
                continue;
            };
            prefs.tell(PreferenceMessage::SetValue {
                value: attribute.value_json(),
                path: path.to_string(),
                create_if_missing: true,
                broadcast: false,
            });
            written += 1;
        }
        tracing::debug!(target: targets::MODULE, module = %self.name, written, "preferences flushed");
        written
    }

    // UI models.

    /// Publish or withdraw an attribute in a registry model.
    pub fn expose_attribute_in_model_data(
        &mut self,
        attribute: Uuid,
        model: &str,
        expose: bool,
    ) -> ModuleResult<bool> {
        let index = self.locate(&attribute.into())?;
        if !self.attributes[index].expose_in_ui_model(model, expose) {
            return Ok(false);
        }
        if expose {
            self.register_in_model(index, model);
        } else {
            self.deregister_from_model(attribute, model);
        }
        Ok(true)
    }

    /// Expose or withdraw every attribute with a toolbar position.
    pub fn connect_to_viewport(&mut self, toolbar_model: &str, connect: bool) -> usize {
        let uuids: Vec<Uuid> = self
            .attributes
            .iter()
            .filter(|a| a.has_role_data(Role::ToolbarPosition))
            .map(Attribute::uuid)
            .collect();
        let mut changed = 0;
        for uuid in uuids {
            if let Ok(true) = self.expose_attribute_in_model_data(uuid, toolbar_model, connect) {
                changed += 1;
            }
        }
        changed
    }

    fn register_in_model(&self, index: usize, model: &str) {
        let (Some(registry), Some(parent)) = (&self.context.registry, &self.parent) else {
            return;
        };
        let attribute = &self.attributes[index];
        registry.tell(RegistryMessage::RegisterAttribute {
            model: model.to_string(),
            data: attribute.as_json(),
            attr_uuid: attribute.uuid(),
            sort_role: TOOLBAR_SORT_ROLE.to_string(),
            client: Some(parent.recipient()),
            reply: None,
        });
    }

    fn deregister_from_model(&self, attribute: Uuid, model: &str) {
        if let Some(registry) = self.attached_registry() {
            registry.tell(RegistryMessage::DeregisterAttribute {
                model: model.to_string(),
                attr_uuid: attribute,
                client: self.id(),
            });
        }
    }

    /// Handle an event from a registry model this module is a client of.
    pub fn model_event(&mut self, event: ModelEvent) {
        match event {
            ModelEvent::NodeDataChanged {
                model,
                role,
                value,
                node,
                ..
            } => self.apply_node_edit(&model, role.as_deref(), &value, &node),
            ModelEvent::MenuNodeActivated {
                data,
                user_data,
                from_hotkey,
                ..
            } => self.menu_node_activated(&data, &user_data, from_hotkey),
            ModelEvent::ModelData { model, .. } => {
                tracing::trace!(target: targets::MODULE, module = %self.name, model = %model, "model data");
            }
        }
    }

    /// Apply an edit made through a registry model to the real attribute.
    fn apply_node_edit(&mut self, model: &str, role: Option<&str>, value: &Value, node: &Value) {
        let origin = ChangeOrigin::Model(model.to_string());
        let Some(attribute) = uuid_field(node, ATTR_UUID_FIELD) else {
            if let Some(menu_node) = uuid_field(node, NODE_UUID_FIELD) {
                self.menu_node_edited(menu_node, role, value, &origin);
            }
            return;
        };
        let Ok(index) = self.locate(&attribute.into()) else {
            return;
        };
        match role.map(Role::parse) {
            Some(Ok(role)) => {
                if let Err(err) = self.write_json(index, role, value, true, &origin) {
                    tracing::warn!(target: targets::MODULE, module = %self.name, error = %err, "model edit rejected");
                }
            }
            Some(Err(err)) => {
                tracing::debug!(target: targets::MODULE, module = %self.name, error = %err, "model edit ignored");
            }
            None => {
                for role in self.attributes[index].update_from_json(node) {
                    self.notify_change(index, role, &origin);
                }
            }
        }
    }

    /// Switch the module to UI-connected mode and send its full description.
    pub fn connect_to_ui(&mut self) {
        if !self.connected_to_ui {
            self.connected_to_ui = true;
            self.hook_calls.push(HookCall::ConnectedToUiChanged(true));
        }
        let description = AttributeEvent::FullDescription {
            module: self.uuid,
            attributes: self.full_module(""),
        };
        self.events.broadcast(&description);
    }

    pub fn disconnect_from_ui(&mut self) {
        if self.connected_to_ui {
            self.connected_to_ui = false;
            self.hook_calls.push(HookCall::ConnectedToUiChanged(false));
        }
    }

    // Hotkeys.

    /// Register a hotkey with the keypress monitor. Returns its uuid.
    ///
    /// Registration waits until the module is attached.
    pub fn register_hotkey(&mut self, hotkey: Hotkey) -> Uuid {
        let uuid = hotkey.uuid;
        self.hotkeys.push(hotkey.clone());
        self.pending_hotkeys.push(hotkey);
        self.flush_hotkeys();
        uuid
    }

    fn flush_hotkeys(&mut self) {
        let (Some(keypress), Some(parent)) = (&self.context.keypress, &self.parent) else {
            return;
        };
        for hotkey in self.pending_hotkeys.drain(..) {
            keypress.tell(KeypressMessage::RegisterHotkey {
                hotkey,
                watcher: parent.recipient(),
            });
        }
    }

    /// Route a hotkey event. Presses only count while connected to the UI.
    pub fn hotkey_event(&mut self, event: HotkeyEvent) {
        let HotkeyEvent {
            hotkey,
            activated,
            context,
        } = event;
        if !(activated && self.connected_to_ui) {
            self.hook_calls
                .push(HookCall::HotkeyReleased { hotkey, context });
            return;
        }
        if let Some(node) = self.menu_hotkeys.get(&hotkey).copied() {
            if let (Some(registry), Some(item)) = (self.attached_registry(), self.menu_nodes.get(&node)) {
                registry.tell(RegistryMessage::MenuNodeActivated {
                    model: item.model.clone(),
                    target: NodeTarget::Node(node),
                    user_data: Value::Null,
                    from_hotkey: true,
                });
            }
        }
        self.hook_calls
            .push(HookCall::HotkeyPressed { hotkey, context });
    }

    // Event subscribers.

    pub fn join_events(&mut self, subscriber: Recipient<AttributeEvent>) -> bool {
        self.events.join(subscriber)
    }

    pub fn leave_events(&mut self, subscriber: ActorId) -> bool {
        self.events.leave(subscriber)
    }

    // Descriptions and persistence.

    /// Attribute descriptions in `group`, or all of them for an empty group.
    pub fn full_module(&self, group: &str) -> Value {
        Value::Array(
            self.attributes
                .iter()
                .filter(|a| group.is_empty() || a.belongs_to_model(group))
                .map(Attribute::as_json)
                .collect(),
        )
    }

    /// Attribute values keyed by `serialize_key`, falling back to the title.
    pub fn serialise(&self) -> Value {
        let mut out = Map::new();
        for attribute in self.attributes.iter().filter(|a| a.has_role_data(Role::Value)) {
            let key = attribute
                .role_str(Role::SerializeKey)
                .unwrap_or(attribute.title());
            out.insert(key.to_string(), attribute.value_json());
        }
        Value::Object(out)
    }

    /// Restore values written by [`serialise`](Self::serialise). Returns how
    /// many attributes changed.
    pub fn deserialise(&mut self, doc: &Value) -> usize {
        let Some(map) = doc.as_object() else {
            return 0;
        };
        let mut changed = 0;
        for index in 0..self.attributes.len() {
            let attribute = &self.attributes[index];
            let key = attribute
                .role_str(Role::SerializeKey)
                .unwrap_or(attribute.title());
            let Some(value) = map.get(key) else {
                continue;
            };
            match self.write_json(index, Role::Value, value, true, &ChangeOrigin::Local) {
                Ok(true) => changed += 1,
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(target: targets::MODULE, module = %self.name, error = %err, "value not restored");
                }
            }
        }
        changed
    }

    /// Apply role documents keyed by attribute title. Returns the number of
    /// roles that changed.
    pub fn update_from_json(&mut self, doc: &Value) -> usize {
        let Some(map) = doc.as_object() else {
            return 0;
        };
        let mut changed = 0;
        for (title, roles) in map {
            let Ok(index) = self.locate(&AttributeRef::Title(title.clone())) else {
                tracing::debug!(target: targets::MODULE, module = %self.name, title = %title, "no attribute to update");
                continue;
            };
            for role in self.attributes[index].update_from_json(roles) {
                self.notify_change(index, role, &ChangeOrigin::Local);
                changed += 1;
            }
        }
        changed
    }

    // Teardown.

    /// Withdraw every registry projection and flush pending preferences.
    ///
    /// Runs once; later calls do nothing.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        if !self.prefs_pending.is_empty() {
            self.flush_preferences();
        }
        let Some(parent) = self.parent.clone() else {
            return;
        };
        if let Some(prefs) = &self.context.preferences {
            prefs.tell(PreferenceMessage::Unsubscribe(parent.id()));
        }
        let Some(registry) = &self.context.registry else {
            return;
        };
        let mut withdrawn = 0;
        for attribute in &self.attributes {
            for model in attribute.ui_data_models() {
                registry.tell(RegistryMessage::DeregisterAttribute {
                    model,
                    attr_uuid: attribute.uuid(),
                    client: Some(parent.id()),
                });
                withdrawn += 1;
            }
        }
        for (node, item) in &self.menu_nodes {
            registry.tell(RegistryMessage::RemoveNode {
                model: item.model.clone(),
                uuid: *node,
            });
            withdrawn += 1;
        }
        registry.tell(RegistryMessage::Leave { client: parent.id() });
        tracing::debug!(target: targets::MODULE, module = %self.name, withdrawn, "module torn down");
    }
}

impl Drop for Module {
    fn drop(&mut self) {
        self.teardown();
    }
}
