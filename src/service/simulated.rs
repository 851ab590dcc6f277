//! In-process channel service
//!
//! [`SimulatedService`] is handed to a context; the paired
//! [`SimulatedControl`] (cheap to clone, usable from any thread) defines
//! variables, connects and disconnects them, completes reads, posts
//! subscription updates and acknowledges writes. Every call the context
//! makes is recorded for inspection.

use crate::core::sync::{handle_mutex_poison, recover_poison};
use crate::queue::{NotificationSender, RequestToken, UpdateEvent};
use crate::registry::{ChannelTag, ForeignHandle};
use crate::service::error::ServiceError;
use crate::service::traits::{ChannelService, SubscriptionId};
use crate::types::{
    CompletionStatus, ControlInfo, DbrKind, DbrType, EventMask, FieldType, TimeStamp, UpdateMeta,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Service operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceOp {
    Create,
    Destroy,
    Get,
    Subscribe,
    ClearSubscription,
    Put,
    Flush,
}

/// A call made by the context, in order of arrival.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceCall {
    Create {
        name: String,
        priority: u32,
        handle: ForeignHandle,
    },
    Destroy(ForeignHandle),
    Get {
        handle: ForeignHandle,
        dbr_type: DbrType,
        count: usize,
    },
    Subscribe {
        handle: ForeignHandle,
        dbr_type: DbrType,
        count: usize,
        mask: EventMask,
    },
    ClearSubscription(SubscriptionId),
    Put {
        handle: ForeignHandle,
        field: FieldType,
        count: usize,
        values: Vec<u8>,
        with_ack: bool,
    },
    Flush,
}

/// Definition of one remote variable.
#[derive(Debug, Clone)]
pub struct SimVariable {
    pub field: FieldType,
    pub count: usize,
    /// Native-endian element values, `count * element_size` bytes.
    pub values: Vec<u8>,
    pub control: ControlInfo,
    pub status: u16,
    pub severity: u16,
    pub host: String,
    pub read_access: bool,
    pub write_access: bool,
}

impl SimVariable {
    pub fn new(field: FieldType, count: usize) -> Self {
        Self {
            field,
            count,
            values: vec![0; field.element_size() * count],
            control: ControlInfo::default(),
            status: 0,
            severity: 0,
            host: "localhost:5064".to_string(),
            read_access: true,
            write_access: true,
        }
    }

    pub fn with_values(mut self, values: Vec<u8>) -> Self {
        self.values = values;
        self
    }

    pub fn with_control(mut self, control: ControlInfo) -> Self {
        self.control = control;
        self
    }

    fn meta_for(&self, kind: DbrKind) -> UpdateMeta {
        let mut meta = UpdateMeta::default();
        if kind == DbrKind::Plain {
            return meta;
        }
        meta.status = self.status;
        meta.severity = self.severity;
        match kind {
            DbrKind::Time => meta.stamp = Some(TimeStamp::now()),
            DbrKind::Control | DbrKind::Graphic => {
                meta.control = Some(Box::new(self.control.clone()))
            }
            _ => {}
        }
        meta
    }

    fn payload(&self, count: usize) -> Vec<u8> {
        let bytes = count
            .saturating_mul(self.field.element_size())
            .min(self.values.len());
        self.values[..bytes].to_vec()
    }
}

#[derive(Debug)]
struct SimChannel {
    name: String,
    tag: ChannelTag,
    connected: bool,
}

#[derive(Debug, Clone, Copy)]
struct SimRequest {
    handle: ForeignHandle,
    dbr_type: DbrType,
    count: usize,
    token: RequestToken,
}

#[derive(Debug, Default)]
struct SimState {
    sender: Option<NotificationSender>,
    variables: HashMap<String, SimVariable>,
    channels: BTreeMap<ForeignHandle, SimChannel>,
    subscriptions: BTreeMap<SubscriptionId, (SimRequest, EventMask)>,
    pending_gets: Vec<SimRequest>,
    pending_acks: Vec<(ForeignHandle, FieldType, usize, RequestToken)>,
    calls: Vec<ServiceCall>,
    failing: HashSet<ServiceOp>,
    free_handles: Vec<u64>,
    recycle_handles: bool,
    next_handle: u64,
    next_subscription: u64,
}

impl SimState {
    fn check(&self, op: ServiceOp) -> Result<(), ServiceError> {
        if self.failing.contains(&op) {
            Err(ServiceError::call_failed(op.name(), "injected failure"))
        } else {
            Ok(())
        }
    }

    fn channel(&self, handle: ForeignHandle) -> Result<&SimChannel, ServiceError> {
        self.channels
            .get(&handle)
            .ok_or(ServiceError::UnknownHandle(handle))
    }

    fn connected_variable(&self, handle: ForeignHandle) -> Option<&SimVariable> {
        let channel = self.channels.get(&handle).filter(|c| c.connected)?;
        self.variables.get(&channel.name)
    }

    fn sender(&self) -> Result<&NotificationSender, ServiceError> {
        self.sender.as_ref().ok_or(ServiceError::NotAttached)
    }

    fn set_connected(&mut self, name: &str, up: bool) -> usize {
        let mut changed = 0;
        for (handle, channel) in self.channels.iter_mut() {
            if channel.name == name && channel.connected != up {
                channel.connected = up;
                changed += 1;
                if let Some(sender) = &self.sender {
                    sender.enqueue_connection(*handle, Some(channel.tag), up);
                }
            }
        }
        changed
    }

    fn complete(&self, request: SimRequest, status: CompletionStatus) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };
        let Some(channel) = self.channels.get(&request.handle) else {
            return false;
        };
        let Some(variable) = self.connected_variable(request.handle) else {
            return false;
        };
        let count = request.count.min(variable.count);
        let event = UpdateEvent::new(
            request.handle,
            Some(channel.tag),
            request.dbr_type.raw(),
            count,
            request.token,
        )
        .with_status(status)
        .with_meta(variable.meta_for(request.dbr_type.kind))
        .with_values(variable.payload(count));
        sender.enqueue_update(event);
        true
    }

    fn post(&self, name: &str, mask: EventMask) -> usize {
        self.subscriptions
            .values()
            .filter(|(request, sub_mask)| {
                sub_mask.0 & mask.0 != 0
                    && self
                        .channels
                        .get(&request.handle)
                        .is_some_and(|c| c.name == name)
            })
            .filter(|(request, _)| self.complete(*request, CompletionStatus::Normal))
            .count()
    }
}

impl ServiceOp {
    fn name(self) -> &'static str {
        match self {
            ServiceOp::Create => "create_channel",
            ServiceOp::Destroy => "destroy_channel",
            ServiceOp::Get => "array_get",
            ServiceOp::Subscribe => "array_subscribe",
            ServiceOp::ClearSubscription => "clear_subscription",
            ServiceOp::Put => "array_put",
            ServiceOp::Flush => "flush",
        }
    }
}

/// The service half handed to a context.
#[derive(Debug)]
pub struct SimulatedService {
    state: Arc<Mutex<SimState>>,
}

/// The test-side half, used to drive the simulated remote end.
#[derive(Debug, Clone)]
pub struct SimulatedControl {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedService {
    pub fn new() -> (SimulatedService, SimulatedControl) {
        let state = Arc::new(Mutex::new(SimState {
            next_handle: 1,
            next_subscription: 1,
            ..SimState::default()
        }));
        (
            SimulatedService {
                state: Arc::clone(&state),
            },
            SimulatedControl { state },
        )
    }

    fn lock(&self) -> Result<MutexGuard<'_, SimState>, ServiceError> {
        handle_mutex_poison(self.state.lock(), ServiceError::Internal)
    }

    fn put(
        &mut self,
        handle: ForeignHandle,
        field: FieldType,
        count: usize,
        values: &[u8],
        ack: Option<RequestToken>,
    ) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        state.check(ServiceOp::Put)?;
        let name = state.channel(handle)?.name.clone();
        let needed = count.checked_mul(field.element_size());
        if count == 0 || needed.map_or(true, |needed| values.len() < needed) {
            return Err(ServiceError::InvalidRequest(format!(
                "{} bytes do not hold {} {} elements",
                values.len(),
                count,
                field
            )));
        }
        state.calls.push(ServiceCall::Put {
            handle,
            field,
            count,
            values: values.to_vec(),
            with_ack: ack.is_some(),
        });
        if let Some(variable) = state.variables.get_mut(&name) {
            if variable.field == field {
                let bytes = values.len().min(variable.values.len());
                variable.values[..bytes].copy_from_slice(&values[..bytes]);
            }
        }
        if let Some(token) = ack {
            state.pending_acks.push((handle, field, count, token));
        }
        Ok(())
    }
}

impl ChannelService for SimulatedService {
    fn attach(&mut self, sender: NotificationSender) -> Result<(), ServiceError> {
        self.lock()?.sender = Some(sender);
        Ok(())
    }

    fn detach(&mut self) {
        recover_poison(self.state.lock(), "simulated service").sender = None;
    }

    fn create_channel(
        &mut self,
        name: &str,
        priority: u32,
        tag: ChannelTag,
    ) -> Result<ForeignHandle, ServiceError> {
        let mut state = self.lock()?;
        state.check(ServiceOp::Create)?;
        let raw = if state.recycle_handles {
            state.free_handles.pop()
        } else {
            None
        };
        let handle = ForeignHandle(raw.unwrap_or_else(|| {
            let next = state.next_handle;
            state.next_handle += 1;
            next
        }));
        state.channels.insert(
            handle,
            SimChannel {
                name: name.to_string(),
                tag,
                connected: false,
            },
        );
        state.calls.push(ServiceCall::Create {
            name: name.to_string(),
            priority,
            handle,
        });
        Ok(handle)
    }

    fn destroy_channel(&mut self, handle: ForeignHandle) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        state.check(ServiceOp::Destroy)?;
        state
            .channels
            .remove(&handle)
            .ok_or(ServiceError::UnknownHandle(handle))?;
        state.subscriptions.retain(|_, (request, _)| request.handle != handle);
        state.pending_gets.retain(|request| request.handle != handle);
        state.pending_acks.retain(|(h, ..)| *h != handle);
        state.free_handles.push(handle.0);
        state.calls.push(ServiceCall::Destroy(handle));
        Ok(())
    }

    fn array_get(
        &mut self,
        handle: ForeignHandle,
        dbr_type: DbrType,
        count: usize,
        token: RequestToken,
    ) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        state.check(ServiceOp::Get)?;
        state.channel(handle)?;
        state.calls.push(ServiceCall::Get {
            handle,
            dbr_type,
            count,
        });
        state.pending_gets.push(SimRequest {
            handle,
            dbr_type,
            count,
            token,
        });
        Ok(())
    }

    fn array_subscribe(
        &mut self,
        handle: ForeignHandle,
        dbr_type: DbrType,
        count: usize,
        mask: EventMask,
        token: RequestToken,
    ) -> Result<SubscriptionId, ServiceError> {
        let mut state = self.lock()?;
        state.check(ServiceOp::Subscribe)?;
        state.channel(handle)?;
        let id = SubscriptionId(state.next_subscription);
        state.next_subscription += 1;
        state.subscriptions.insert(
            id,
            (
                SimRequest {
                    handle,
                    dbr_type,
                    count,
                    token,
                },
                mask,
            ),
        );
        state.calls.push(ServiceCall::Subscribe {
            handle,
            dbr_type,
            count,
            mask,
        });
        Ok(id)
    }

    fn clear_subscription(&mut self, subscription: SubscriptionId) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        state.check(ServiceOp::ClearSubscription)?;
        state.subscriptions.remove(&subscription);
        state.calls.push(ServiceCall::ClearSubscription(subscription));
        Ok(())
    }

    fn array_put(
        &mut self,
        handle: ForeignHandle,
        field: FieldType,
        count: usize,
        values: &[u8],
    ) -> Result<(), ServiceError> {
        self.put(handle, field, count, values, None)
    }

    fn array_put_with_ack(
        &mut self,
        handle: ForeignHandle,
        field: FieldType,
        count: usize,
        values: &[u8],
        token: RequestToken,
    ) -> Result<(), ServiceError> {
        self.put(handle, field, count, values, Some(token))
    }

    fn host_field_type(&self, handle: ForeignHandle) -> Option<FieldType> {
        let state = recover_poison(self.state.lock(), "simulated service");
        state.connected_variable(handle).map(|v| v.field)
    }

    fn host_element_count(&self, handle: ForeignHandle) -> usize {
        let state = recover_poison(self.state.lock(), "simulated service");
        state.connected_variable(handle).map_or(0, |v| v.count)
    }

    fn host_name(&self, handle: ForeignHandle) -> String {
        let state = recover_poison(self.state.lock(), "simulated service");
        state
            .connected_variable(handle)
            .map(|v| v.host.clone())
            .unwrap_or_default()
    }

    fn read_access(&self, handle: ForeignHandle) -> bool {
        let state = recover_poison(self.state.lock(), "simulated service");
        state.connected_variable(handle).is_some_and(|v| v.read_access)
    }

    fn write_access(&self, handle: ForeignHandle) -> bool {
        let state = recover_poison(self.state.lock(), "simulated service");
        state.connected_variable(handle).is_some_and(|v| v.write_access)
    }

    fn flush(&mut self) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        state.check(ServiceOp::Flush)?;
        if state.calls.last() != Some(&ServiceCall::Flush) {
            state.calls.push(ServiceCall::Flush);
        }
        Ok(())
    }

    fn protocol_version(&self) -> String {
        "4.13 (simulated)".to_string()
    }
}

impl SimulatedControl {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        recover_poison(self.state.lock(), "simulated service")
    }

    pub fn define(&self, name: &str, variable: SimVariable) {
        self.lock().variables.insert(name.to_string(), variable);
    }

    /// Bring every channel named `name` online. Returns how many changed.
    pub fn connect(&self, name: &str) -> usize {
        self.lock().set_connected(name, true)
    }

    pub fn disconnect(&self, name: &str) -> usize {
        self.lock().set_connected(name, false)
    }

    /// Complete every outstanding read. Returns how many completed.
    pub fn complete_gets(&self) -> usize {
        let mut state = self.lock();
        let requests = std::mem::take(&mut state.pending_gets);
        requests
            .into_iter()
            .filter(|request| state.complete(*request, CompletionStatus::Normal))
            .count()
    }

    /// Fail every outstanding read with `message`.
    pub fn fail_gets(&self, message: &str) -> usize {
        let mut state = self.lock();
        let requests = std::mem::take(&mut state.pending_gets);
        requests
            .into_iter()
            .filter(|request| {
                state.complete(*request, CompletionStatus::Failed(message.to_string()))
            })
            .count()
    }

    /// Replace a variable's value and post it to value subscribers.
    pub fn post_value(&self, name: &str, values: Vec<u8>) -> usize {
        let mut state = self.lock();
        match state.variables.get_mut(name) {
            Some(variable) => variable.values = values,
            None => return 0,
        }
        state.post(name, EventMask::VALUE)
    }

    /// Change a variable's alarm state and post it to alarm subscribers.
    pub fn post_alarm(&self, name: &str, status: u16, severity: u16) -> usize {
        let mut state = self.lock();
        match state.variables.get_mut(name) {
            Some(variable) => {
                variable.status = status;
                variable.severity = severity;
            }
            None => return 0,
        }
        state.post(name, EventMask::ALARM)
    }

    /// Acknowledge every outstanding write.
    pub fn ack_writes(&self, success: bool) -> usize {
        let mut state = self.lock();
        let acks = std::mem::take(&mut state.pending_acks);
        let Ok(sender) = state.sender() else {
            return 0;
        };
        let mut delivered = 0;
        for (handle, field, count, token) in acks {
            let Some(channel) = state.channels.get(&handle) else {
                continue;
            };
            let status = if success {
                CompletionStatus::Normal
            } else {
                CompletionStatus::Failed("put rejected".to_string())
            };
            sender.enqueue_update(
                UpdateEvent::new(handle, Some(channel.tag), field.raw(), count, token)
                    .with_status(status),
            );
            delivered += 1;
        }
        delivered
    }

    /// Queue a raw line of library output.
    pub fn emit_diagnostic(&self, text: &str) -> bool {
        match self.lock().sender() {
            Ok(sender) => {
                sender.enqueue_diagnostic(text);
                true
            }
            Err(_) => false,
        }
    }

    /// Queue an arbitrary update, bypassing the usual bookkeeping.
    pub fn inject_update(&self, event: UpdateEvent) -> bool {
        match self.lock().sender() {
            Ok(sender) => {
                sender.enqueue_update(event);
                true
            }
            Err(_) => false,
        }
    }

    /// Queue a connection event for `handle` whatever its current state,
    /// as the library does when a circuit is re-established.
    pub fn inject_connection(&self, handle: ForeignHandle, is_up: bool) -> bool {
        let state = self.lock();
        let (Ok(sender), Some(channel)) = (state.sender(), state.channels.get(&handle)) else {
            return false;
        };
        sender.enqueue_connection(handle, Some(channel.tag), is_up);
        true
    }

    pub fn set_failing(&self, op: ServiceOp, failing: bool) {
        let mut state = self.lock();
        if failing {
            state.failing.insert(op);
        } else {
            state.failing.remove(&op);
        }
    }

    /// Hand out destroyed handle values again, most recent first.
    pub fn set_recycle_handles(&self, recycle: bool) {
        self.lock().recycle_handles = recycle;
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn pending_gets(&self) -> usize {
        self.lock().pending_gets.len()
    }

    pub fn pending_acks(&self) -> usize {
        self.lock().pending_acks.len()
    }

    pub fn subscription_count(&self) -> usize {
        self.lock().subscriptions.len()
    }

    pub fn channel_count(&self) -> usize {
        self.lock().channels.len()
    }

    pub fn is_attached(&self) -> bool {
        self.lock().sender.is_some()
    }

    pub fn value_of(&self, name: &str) -> Option<Vec<u8>> {
        self.lock().variables.get(name).map(|v| v.values.clone())
    }

    pub fn tag_of(&self, handle: ForeignHandle) -> Option<ChannelTag> {
        self.lock().channels.get(&handle).map(|c| c.tag)
    }
}
