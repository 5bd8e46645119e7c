//! The actor hosting a [`Module`].

use std::time::Instant;

use attrsync_core::{Actor, ActorHandle, ActorResult, Context, Reply, spawn};
use serde_json::Value;
use uuid::Uuid;

use super::{HookCall, Module, ModuleMessage};
use crate::attribute::Role;
use crate::error::ModuleResult;
use crate::logging::targets;

/// Module-specific behaviour layered over the generic change pipeline.
///
/// Every method has an empty default. Hooks run on the module's actor
/// thread after the message that caused them has been handled, and may
/// change the module further.
pub trait ModuleHooks: Send + 'static {
    /// Called once after the module is attached to its actor.
    fn setup(&mut self, _module: &mut Module) {}

    fn attribute_changed(&mut self, _module: &mut Module, _attribute: Uuid, _role: Role) {}

    fn menu_item_activated(
        &mut self,
        _module: &mut Module,
        _item: &Value,
        _user_data: &Value,
        _from_hotkey: bool,
    ) {
    }

    fn hotkey_pressed(&mut self, _module: &mut Module, _hotkey: Uuid, _context: &str) {}

    fn hotkey_released(&mut self, _module: &mut Module, _hotkey: Uuid, _context: &str) {}

    fn connected_to_ui_changed(&mut self, _module: &mut Module, _connected: bool) {}
}

impl ModuleHooks for () {}

/// Runs a [`Module`] and its hooks on a dedicated actor thread.
pub struct ModuleActor<H: ModuleHooks = ()> {
    module: Module,
    hooks: H,
}

impl<H: ModuleHooks> ModuleActor<H> {
    pub fn new(module: Module, hooks: H) -> Self {
        Self { module, hooks }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    fn run_hooks(&mut self) {
        loop {
            let calls = self.module.take_hook_calls();
            if calls.is_empty() {
                break;
            }
            for call in calls {
                let module = &mut self.module;
                match call {
                    HookCall::AttributeChanged { attribute, role } => {
                        self.hooks.attribute_changed(module, attribute, role)
                    }
                    HookCall::MenuItemActivated {
                        item,
                        user_data,
                        from_hotkey,
                    } => self
                        .hooks
                        .menu_item_activated(module, &item, &user_data, from_hotkey),
                    HookCall::HotkeyPressed { hotkey, context } => {
                        self.hooks.hotkey_pressed(module, hotkey, &context)
                    }
                    HookCall::HotkeyReleased { hotkey, context } => {
                        self.hooks.hotkey_released(module, hotkey, &context)
                    }
                    HookCall::ConnectedToUiChanged(connected) => {
                        self.hooks.connected_to_ui_changed(module, connected)
                    }
                }
            }
        }
    }

    fn dispatch(&mut self, msg: ModuleMessage) {
        let module = &mut self.module;
        match msg {
            ModuleMessage::SetRoleData {
                attribute,
                role,
                value,
                notify,
                reply,
            } => respond(reply, module.set_role_data_json(attribute, role, &value, notify)),
            ModuleMessage::SetRoleDataByName {
                attribute,
                role,
                value,
                reply,
            } => respond(reply, module.set_role_data_by_name(attribute, &role, &value)),
            ModuleMessage::ChangeAttributeValue {
                title,
                value,
                notify,
                source,
            } => {
                if let Err(err) = module.change_attribute_value(&title, &value, notify, source) {
                    tracing::debug!(target: targets::MODULE, module = module.name(), error = %err, "linked change ignored");
                }
            }
            ModuleMessage::GetValue { attribute, reply } => reply.send(module.attribute_value(attribute)),
            ModuleMessage::GetRoleData {
                attribute,
                role,
                reply,
            } => reply.send(module.role_data_json(attribute, role)),
            ModuleMessage::AddAttribute {
                title,
                value,
                role_data,
                reply,
            } => respond(reply, module.add_attribute(&title, &value, &role_data)),
            ModuleMessage::RemoveAttribute { attribute, reply } => {
                let removed = module.remove_attribute(attribute);
                if let Some(reply) = reply {
                    reply.send(removed);
                }
            }
            ModuleMessage::FullDescription { group, reply } => reply.send(module.full_module(&group)),
            ModuleMessage::MenuDescription { root, reply } => reply.send(module.menu_attrs(&root)),
            ModuleMessage::Serialise { reply } => reply.send(module.serialise()),
            ModuleMessage::Deserialise(doc) => {
                module.deserialise(&doc);
            }
            ModuleMessage::UpdateFromJson(doc) => {
                module.update_from_json(&doc);
            }
            ModuleMessage::JoinEvents(subscriber) => {
                module.join_events(subscriber);
            }
            ModuleMessage::LeaveEvents(subscriber) => {
                module.leave_events(subscriber);
            }
            ModuleMessage::Link {
                peer,
                both_ways,
                all_attrs,
                initial_push_sync,
            } => respond(None, module.link_to(peer, both_ways, all_attrs, initial_push_sync)),
            ModuleMessage::Unlink(peer) => {
                module.unlink_from(peer);
            }
            ModuleMessage::UnlinkAll => module.unlink_all(),
            ModuleMessage::SetLinkingDisabled(disabled) => module.set_linking_disabled(disabled),
            ModuleMessage::ConnectToUi => module.connect_to_ui(),
            ModuleMessage::DisconnectFromUi => module.disconnect_from_ui(),
            ModuleMessage::ConnectToViewport {
                toolbar_model,
                connect,
            } => {
                module.connect_to_viewport(&toolbar_model, connect);
            }
            ModuleMessage::ExposeInModel {
                attribute,
                model,
                expose,
            } => respond(None, module.expose_attribute_in_model_data(attribute, &model, expose)),
            ModuleMessage::InsertMenuItem { item, reply } => respond(reply, module.insert_menu_item(item)),
            ModuleMessage::RemoveMenuItem(node) => {
                module.remove_menu_item(node);
            }
            ModuleMessage::RegisterHotkey { hotkey, reply } => {
                let uuid = module.register_hotkey(hotkey);
                if let Some(reply) = reply {
                    reply.send(uuid);
                }
            }
            ModuleMessage::FlushPreferences => {
                module.flush_preferences();
            }
            ModuleMessage::Model(event) => module.model_event(event),
            ModuleMessage::Preferences(event) => module.preference_event(event),
            ModuleMessage::Hotkey(event) => module.hotkey_event(event),
        }
    }
}

/// Send `result` to the requester, or log a failure nobody waits for.
fn respond<T>(reply: Option<Reply<ModuleResult<T>>>, result: ModuleResult<T>) {
    match reply {
        Some(reply) => reply.send(result),
        None => {
            if let Err(err) = result {
                tracing::warn!(target: targets::MODULE, error = %err, "module request failed");
            }
        }
    }
}

impl<H: ModuleHooks> Actor for ModuleActor<H> {
    type Message = ModuleMessage;

    fn started(&mut self, ctx: &mut Context<ModuleMessage>) {
        self.module.set_parent(ctx.address());
        self.hooks.setup(&mut self.module);
        self.run_hooks();
    }

    fn handle(&mut self, msg: ModuleMessage, _ctx: &mut Context<ModuleMessage>) {
        self.dispatch(msg);
        self.run_hooks();
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.module.next_deadline()
    }

    fn deadline_reached(&mut self, _ctx: &mut Context<ModuleMessage>) {
        self.module.flush_preferences_if_due(Instant::now());
    }

    fn stopped(&mut self) {
        self.module.teardown();
    }
}

/// Spawn `module` on its own actor thread.
pub fn spawn_module<H: ModuleHooks>(module: Module, hooks: H) -> ActorResult<ActorHandle<ModuleMessage>> {
    let config = module.context().config.actor(module.name());
    spawn(ModuleActor::new(module, hooks), config)
}
