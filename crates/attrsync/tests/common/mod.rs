//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use attrsync::module::ModuleMessage;
use attrsync::{AppConfig, Recipient, RequestTimeout};
use attrsync_core::{Actor, ActorConfig, ActorHandle, Context, spawn};
use parking_lot::Mutex;
use serde_json::Value;

pub const WAIT: Duration = Duration::from_secs(5);
pub const TIMEOUT: RequestTimeout = RequestTimeout::After(Duration::from_secs(5));

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Short delays so debounced work happens within a test.
pub fn test_config() -> AppConfig {
    AppConfig::new()
        .preference_flush_delay(Duration::from_millis(300))
        .registry_prefs_delay(Duration::from_millis(100))
        .request_timeout(Some(Duration::from_secs(5)))
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

/// An actor recording every message it receives.
struct Probe<E> {
    events: Arc<Mutex<Vec<E>>>,
}

impl<E: Send + 'static> Actor for Probe<E> {
    type Message = E;

    fn handle(&mut self, msg: E, _ctx: &mut Context<E>) {
        self.events.lock().push(msg);
    }
}

pub struct ProbeHandle<E: Send + 'static> {
    handle: ActorHandle<E>,
    events: Arc<Mutex<Vec<E>>>,
}

pub fn probe<E: Send + 'static>(name: &str) -> ProbeHandle<E> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let handle = spawn(
        Probe {
            events: events.clone(),
        },
        ActorConfig::with_name(name),
    )
    .unwrap();
    ProbeHandle { handle, events }
}

impl<E: Send + 'static> ProbeHandle<E> {
    pub fn recipient(&self) -> Recipient<E> {
        self.handle.address().recipient()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn take(&self) -> Vec<E> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn with_events<R>(&self, f: impl FnOnce(&[E]) -> R) -> R {
        f(&self.events.lock())
    }
}

/// Read an attribute value through the module actor.
pub fn value_of(module: &attrsync::Addr<ModuleMessage>, title: &str) -> Value {
    module
        .request(
            |reply| ModuleMessage::GetValue {
                attribute: title.into(),
                reply,
            },
            TIMEOUT,
        )
        .unwrap()
        .unwrap()
}

/// Set an attribute value through the module actor without waiting.
pub fn set_value(module: &attrsync::Addr<ModuleMessage>, title: &str, value: Value) {
    module
        .send(ModuleMessage::SetRoleData {
            attribute: title.into(),
            role: attrsync::Role::Value,
            value,
            notify: true,
            reply: None,
        })
        .unwrap();
}

/// Number of children of the JSON node, treating a missing list as empty.
pub fn child_count(node: &Value) -> usize {
    node.get("children")
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}
