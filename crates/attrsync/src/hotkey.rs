//! Hotkey definitions and the keypress monitor boundary.
//!
//! The keypress monitor itself lives outside this crate. Modules describe
//! their hotkeys with [`Hotkey`], send them to the monitor with
//! [`KeypressMessage::RegisterHotkey`] and receive [`HotkeyEvent`]s back.

use attrsync_core::Recipient;
use uuid::Uuid;

/// A keyboard shortcut registered by a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hotkey {
    pub uuid: Uuid,
    pub keycode: i32,
    pub modifier: i32,
    pub name: String,
    pub description: String,
    pub auto_repeat: bool,
    pub component: String,
    pub context: String,
}

impl Hotkey {
    pub fn new(keycode: i32, modifier: i32, name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            keycode,
            modifier,
            name: name.into(),
            description: String::new(),
            auto_repeat: false,
            component: String::new(),
            context: String::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn auto_repeat(mut self, auto_repeat: bool) -> Self {
        self.auto_repeat = auto_repeat;
        self
    }

    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.component = component.into();
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

/// A hotkey press or release delivered to the registering module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotkeyEvent {
    pub hotkey: Uuid,
    pub activated: bool,
    pub context: String,
}

/// Messages accepted by a keypress monitor.
#[derive(Debug)]
pub enum KeypressMessage {
    RegisterHotkey {
        hotkey: Hotkey,
        watcher: Recipient<HotkeyEvent>,
    },
}
