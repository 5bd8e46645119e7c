//! Messages and events of module actors.

use attrsync_core::{ActorId, Addr, Recipient, Reply};
use serde_json::Value;
use uuid::Uuid;

use super::menu::MenuItem;
use crate::attribute::Role;
use crate::error::ModuleResult;
use crate::hotkey::{Hotkey, HotkeyEvent};
use crate::preferences::PreferenceEvent;
use crate::registry::ModelEvent;

/// Where a role write came from.
///
/// The change pipeline uses the origin to avoid sending a change back to
/// the party that made it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// The module itself or one of its clients.
    Local,
    /// A linked module actor.
    Linked(ActorId),
    /// An edit made through the named registry model.
    Model(String),
    /// The preference store.
    Preferences,
}

/// Events broadcast to a module's attribute event subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeEvent {
    Changed {
        module: Uuid,
        attribute: Uuid,
        role: Role,
        value: Value,
    },
    Deleted {
        module: Uuid,
        attribute: Uuid,
    },
    /// An attribute flagged for viewport redraws changed.
    RedrawViewport { module: Uuid },
    /// Every attribute of the module, sent when it connects to the UI or on
    /// request.
    FullDescription { module: Uuid, attributes: Value },
}

/// Addresses an attribute by uuid or by title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeRef {
    Uuid(Uuid),
    Title(String),
}

impl From<Uuid> for AttributeRef {
    fn from(uuid: Uuid) -> Self {
        AttributeRef::Uuid(uuid)
    }
}

impl From<&str> for AttributeRef {
    fn from(title: &str) -> Self {
        AttributeRef::Title(title.to_string())
    }
}

impl From<String> for AttributeRef {
    fn from(title: String) -> Self {
        AttributeRef::Title(title)
    }
}

/// Messages accepted by a module actor.
#[derive(Debug)]
pub enum ModuleMessage {
    /// Write one role. `reply` receives whether the role changed.
    SetRoleData {
        attribute: AttributeRef,
        role: Role,
        value: Value,
        notify: bool,
        reply: Option<Reply<ModuleResult<bool>>>,
    },
    /// Write one role addressed by its wire name.
    SetRoleDataByName {
        attribute: Uuid,
        role: String,
        value: Value,
        reply: Option<Reply<ModuleResult<bool>>>,
    },
    /// Value change forwarded by a linked module; matched by title.
    ChangeAttributeValue {
        title: String,
        value: Value,
        notify: bool,
        source: Option<ActorId>,
    },
    GetValue {
        attribute: AttributeRef,
        reply: Reply<ModuleResult<Value>>,
    },
    GetRoleData {
        attribute: AttributeRef,
        role: Role,
        reply: Reply<ModuleResult<Value>>,
    },
    AddAttribute {
        title: String,
        value: Value,
        role_data: Value,
        reply: Option<Reply<ModuleResult<Uuid>>>,
    },
    RemoveAttribute {
        attribute: Uuid,
        reply: Option<Reply<bool>>,
    },
    /// Attributes exposed in `group`, or all of them for an empty group.
    FullDescription {
        group: String,
        reply: Reply<Value>,
    },
    /// Attributes projected into menus below `root`.
    MenuDescription {
        root: String,
        reply: Reply<Value>,
    },
    Serialise {
        reply: Reply<Value>,
    },
    Deserialise(Value),
    /// Apply role data documents keyed by attribute title.
    UpdateFromJson(Value),
    JoinEvents(Recipient<AttributeEvent>),
    LeaveEvents(ActorId),
    Link {
        peer: Addr<ModuleMessage>,
        both_ways: bool,
        all_attrs: bool,
        initial_push_sync: bool,
    },
    Unlink(ActorId),
    UnlinkAll,
    SetLinkingDisabled(bool),
    ConnectToUi,
    DisconnectFromUi,
    ConnectToViewport {
        toolbar_model: String,
        connect: bool,
    },
    ExposeInModel {
        attribute: Uuid,
        model: String,
        expose: bool,
    },
    InsertMenuItem {
        item: MenuItem,
        reply: Option<Reply<ModuleResult<Uuid>>>,
    },
    RemoveMenuItem(Uuid),
    RegisterHotkey {
        hotkey: Hotkey,
        reply: Option<Reply<Uuid>>,
    },
    /// Write queued preference values now.
    FlushPreferences,
    Model(ModelEvent),
    Preferences(PreferenceEvent),
    Hotkey(HotkeyEvent),
}

impl From<ModelEvent> for ModuleMessage {
    fn from(event: ModelEvent) -> Self {
        ModuleMessage::Model(event)
    }
}

impl From<PreferenceEvent> for ModuleMessage {
    fn from(event: PreferenceEvent) -> Self {
        ModuleMessage::Preferences(event)
    }
}

impl From<HotkeyEvent> for ModuleMessage {
    fn from(event: HotkeyEvent) -> Self {
        ModuleMessage::Hotkey(event)
    }
}
