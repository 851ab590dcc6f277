//! Shared helpers for unit tests

use crate::context::Context;
use crate::core::config::ClientConfig;
use crate::core::diagnostics::set_notification_handler;
use crate::dispatch::{Observer, ObserverResult};
use crate::registry::ChannelId;
use crate::service::{SimVariable, SimulatedControl, SimulatedService};
use crate::types::FieldType;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Mutex;

static CAPTURED: Mutex<Vec<String>> = Mutex::new(Vec::new());

fn capture(text: &str) {
    CAPTURED
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .push(text.to_string());
}

/// Route diagnostics into an in-memory list, clearing anything captured
/// earlier. Tests using this must be `#[serial]`.
pub fn install_capture() {
    CAPTURED.lock().unwrap_or_else(|e| e.into_inner()).clear();
    set_notification_handler(Some(capture));
}

pub fn captured() -> Vec<String> {
    CAPTURED.lock().unwrap_or_else(|e| e.into_inner()).clone()
}

pub fn captured_containing(needle: &str) -> usize {
    captured().iter().filter(|line| line.contains(needle)).count()
}

/// Start a context over a fresh simulated service. Tests using this must be
/// `#[serial]`, since only one context may be active.
pub fn start_context() -> (Context, SimulatedControl) {
    let (service, control) = SimulatedService::new();
    let cx = Context::initialise(ClientConfig::default(), service).unwrap();
    (cx, control)
}

pub fn scalar(value: f64) -> SimVariable {
    SimVariable::new(FieldType::Double, 1).with_values(value.to_ne_bytes().to_vec())
}

/// Create `name`, open it, connect it and complete the initial read.
pub fn connect_channel(cx: &mut Context, control: &SimulatedControl, name: &str) -> ChannelId {
    let id = cx.create_channel(name);
    assert!(cx.open(id));
    control.connect(name);
    cx.poll(usize::MAX);
    control.complete_gets();
    cx.poll(usize::MAX);
    id
}

pub type EventLog = Rc<RefCell<Vec<String>>>;

/// Observer that appends `label:kind:flag` for every event it receives.
pub struct Recorder {
    pub label: &'static str,
    pub log: EventLog,
}

impl Recorder {
    pub fn new(label: &'static str, log: &EventLog) -> Self {
        Self {
            label,
            log: Rc::clone(log),
        }
    }

    fn record(&self, kind: &str, flag: bool) -> ObserverResult {
        self.log
            .borrow_mut()
            .push(format!("{}:{}:{}", self.label, kind, flag));
        Ok(())
    }
}

impl Observer for Recorder {
    fn on_connection(&mut self, _cx: &mut Context, _channel: ChannelId, up: bool) -> ObserverResult {
        self.record("connection", up)
    }

    fn on_update(&mut self, _cx: &mut Context, _channel: ChannelId, first: bool) -> ObserverResult {
        self.record("update", first)
    }

    fn on_write_ack(&mut self, _cx: &mut Context, _channel: ChannelId, ok: bool) -> ObserverResult {
        self.record("write-ack", ok)
    }
}
