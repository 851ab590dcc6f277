//! Shared helpers for the integration tests

#![allow(dead_code)]

use pvlink::core::config::ClientConfig;
use pvlink::core::diagnostics::set_notification_handler;
use pvlink::service::{SimVariable, SimulatedControl, SimulatedService};
use pvlink::types::FieldType;
use pvlink::{ChannelId, Context, Observer, ObserverResult};
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

/// Route diagnostics into memory. Callers must be `#[serial]`.
pub fn install_capture() {
    CAPTURED.lock().unwrap_or_else(|e| e.into_inner()).clear();
    set_notification_handler(Some(capture));
}

pub fn captured_containing(needle: &str) -> usize {
    CAPTURED
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .iter()
        .filter(|line| line.contains(needle))
        .count()
}

pub fn start() -> (Context, SimulatedControl) {
    let (service, control) = SimulatedService::new();
    let cx = Context::initialise(ClientConfig::default(), service).expect("context starts");
    (cx, control)
}

pub fn doubles(values: &[f64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

pub fn double_variable(values: &[f64]) -> SimVariable {
    SimVariable::new(FieldType::Double, values.len()).with_values(doubles(values))
}

/// Everything an observer saw, as `kind:flag` strings.
#[derive(Clone, Default)]
pub struct Seen(pub Rc<RefCell<Vec<String>>>);

impl Seen {
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.borrow().iter().filter(|e| e.as_str() == entry).count()
    }

    fn push(&self, kind: &str, flag: bool) -> ObserverResult {
        self.0.borrow_mut().push(format!("{}:{}", kind, flag));
        Ok(())
    }
}

impl Observer for Seen {
    fn on_connection(&mut self, _cx: &mut Context, _channel: ChannelId, up: bool) -> ObserverResult {
        self.push("connection", up)
    }

    fn on_update(&mut self, _cx: &mut Context, _channel: ChannelId, first: bool) -> ObserverResult {
        self.push("update", first)
    }

    fn on_write_ack(&mut self, _cx: &mut Context, _channel: ChannelId, ok: bool) -> ObserverResult {
        self.push("write-ack", ok)
    }
}
