//! Channel lifecycle and update handling

use crate::channel::payload::PayloadBuffer;
use crate::channel::Link;
use crate::core::config::{DEFAULT_PRIORITY, MAX_PRIORITY};
use crate::dispatch::{ChannelEvent, Handlers, Observer};
use crate::queue::{RequestToken, UpdateEvent};
use crate::registry::{ChannelId, ChannelTag, ForeignHandle, ObserverId};
use crate::service::SubscriptionId;
use crate::types::{
    AlarmCondition, AlarmSeverity, CompletionStatus, ControlInfo, DbrKind, DbrType, EventMask,
    FieldType, ReadMode, TimeStamp, UpdateMeta, ALARM_NSTATUS,
};
use std::collections::BTreeSet;

/// Longest channel name accepted, in bytes.
pub const MAX_NAME_LEN: usize = 60;
/// Most enumeration labels kept from a control update.
pub const MAX_ENUM_STATES: usize = 16;
/// Longest enumeration label kept, in bytes.
pub const MAX_ENUM_STRING_SIZE: usize = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Closed, or never opened.
    #[default]
    Unused,
    /// Opened, waiting for the first connection.
    Pending,
    Connected,
    Disconnected,
}

/// Per-channel request options. They take effect on the next connect or
/// read.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelOptions {
    /// Field type to request; `None` uses the host's native type.
    pub request_field: Option<FieldType>,
    /// Upper bound on elements requested; `None` requests all of them.
    pub request_count: Option<usize>,
    pub priority: u32,
    /// Treat CHAR arrays as text.
    pub long_string: bool,
    pub read_mode: ReadMode,
    pub event_mask: EventMask,
    /// Writes ask for an acknowledgement; only one may be outstanding.
    pub put_ack: bool,
    /// Append units to formatted numbers.
    pub include_units: bool,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            request_field: None,
            request_count: None,
            priority: DEFAULT_PRIORITY,
            long_string: false,
            read_mode: ReadMode::default(),
            event_mask: EventMask::default(),
            put_ack: false,
            include_units: false,
        }
    }
}

/// Client-side state of one remote variable.
///
/// A channel is owned by its [`Context`](crate::context::Context) and only
/// changes on the thread that polls it.
pub struct Channel {
    id: ChannelId,
    tag: ChannelTag,
    name: String,
    handle: Option<ForeignHandle>,
    state: ConnectionState,
    pub(crate) options: ChannelOptions,

    host_field: Option<FieldType>,
    host_count: usize,
    host_name: String,

    pub(crate) control: ControlInfo,

    pub(crate) data_field: Option<FieldType>,
    pub(crate) data_count: usize,
    status: u16,
    severity: u16,
    stamp: TimeStamp,
    first_update: bool,
    reported_connected: bool,
    pub(crate) payload: PayloadBuffer,

    pending_write: bool,
    get_token: Option<RequestToken>,
    write_token: Option<RequestToken>,
    subscription: Option<(SubscriptionId, RequestToken)>,
    disconnect_time: Option<TimeStamp>,

    pub(crate) hook: Option<Box<dyn Observer>>,
    pub(crate) handlers: Handlers,
    pub(crate) observers: BTreeSet<ObserverId>,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("handle", &self.handle)
            .field("state", &self.state)
            .field("data_count", &self.data_count)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

/// Truncate to at most `MAX_NAME_LEN` bytes without splitting a character.
fn limit_name(name: &str) -> String {
    let mut end = name.len().min(MAX_NAME_LEN);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

impl Channel {
    pub(crate) fn new(id: ChannelId, context: u64, name: &str) -> Self {
        Self {
            id,
            tag: ChannelTag {
                context,
                channel: id,
            },
            name: limit_name(name),
            handle: None,
            state: ConnectionState::Unused,
            options: ChannelOptions::default(),
            host_field: None,
            host_count: 0,
            host_name: String::new(),
            control: ControlInfo::default(),
            data_field: None,
            data_count: 0,
            status: 0,
            severity: 0,
            stamp: TimeStamp::default(),
            first_update: false,
            reported_connected: false,
            payload: PayloadBuffer::Empty,
            pending_write: false,
            get_token: None,
            write_token: None,
            subscription: None,
            disconnect_time: None,
            hook: None,
            handlers: Handlers::default(),
            observers: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Change the name. Takes effect on the next open.
    pub(crate) fn rename(&mut self, name: &str) {
        self.name = limit_name(name);
    }

    pub fn handle(&self) -> Option<ForeignHandle> {
        self.handle
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn data_is_available(&self) -> bool {
        self.is_connected() && !self.payload.is_empty()
    }

    /// The cached value as received.
    pub fn payload(&self) -> &PayloadBuffer {
        &self.payload
    }

    pub fn is_first_update_pending(&self) -> bool {
        self.first_update
    }

    pub fn has_pending_write(&self) -> bool {
        self.pending_write
    }

    /// When the channel last lost its connection.
    pub fn disconnect_time(&self) -> Option<TimeStamp> {
        self.disconnect_time
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn is_observed_by(&self, observer: ObserverId) -> bool {
        self.observers.contains(&observer)
    }

    // Options

    pub fn options(&self) -> &ChannelOptions {
        &self.options
    }

    /// Replace every option; the priority is clamped to 0..=99.
    pub fn set_options(&mut self, options: ChannelOptions) {
        self.options = options;
        self.options.priority = self.options.priority.min(MAX_PRIORITY);
    }

    pub fn set_default_options(&mut self) {
        let include_units = self.options.include_units;
        self.options = ChannelOptions {
            include_units,
            ..ChannelOptions::default()
        };
    }

    pub fn set_priority(&mut self, priority: u32) {
        self.options.priority = priority.min(MAX_PRIORITY);
    }

    pub fn set_request_field(&mut self, field: Option<FieldType>) {
        self.options.request_field = field;
    }

    pub fn set_request_count(&mut self, count: usize) {
        self.options.request_count = Some(count);
    }

    pub fn clear_request_count(&mut self) {
        self.options.request_count = None;
    }

    pub fn set_read_mode(&mut self, mode: ReadMode) {
        self.options.read_mode = mode;
    }

    pub fn set_event_mask(&mut self, mask: EventMask) {
        self.options.event_mask = mask;
    }

    pub fn set_put_ack(&mut self, put_ack: bool) {
        self.options.put_ack = put_ack;
    }

    pub fn set_long_string(&mut self, long_string: bool) {
        self.options.long_string = long_string;
    }

    pub fn set_include_units(&mut self, include_units: bool) {
        self.options.include_units = include_units;
    }

    // Metadata. Defaults are returned while not connected.

    pub fn host_field_type(&self) -> Option<FieldType> {
        self.host_field.filter(|_| self.is_connected())
    }

    pub fn host_element_count(&self) -> usize {
        if self.is_connected() {
            self.host_count
        } else {
            0
        }
    }

    pub fn host_name(&self) -> &str {
        if self.is_connected() {
            &self.host_name
        } else {
            ""
        }
    }

    pub fn data_field_type(&self) -> Option<FieldType> {
        self.data_field.filter(|_| self.is_connected())
    }

    pub fn data_element_count(&self) -> usize {
        if self.is_connected() {
            self.data_count
        } else {
            0
        }
    }

    /// Size of one received element, zero when no data is available.
    pub fn data_element_size(&self) -> usize {
        match self.data_field {
            Some(field) if self.data_is_available() => field.element_size(),
            _ => 0,
        }
    }

    pub fn alarm_severity(&self) -> AlarmSeverity {
        if !self.is_connected() {
            return AlarmSeverity::Disconnected;
        }
        AlarmSeverity::from_raw(self.severity).unwrap_or(AlarmSeverity::Invalid)
    }

    pub fn alarm_status(&self) -> AlarmCondition {
        if !self.is_connected() {
            return AlarmCondition::NoAlarm;
        }
        AlarmCondition::from_raw(self.status).unwrap_or_default()
    }

    pub fn raw_severity(&self) -> u16 {
        self.severity
    }

    pub fn raw_status(&self) -> u16 {
        self.status
    }

    pub fn has_valid_severity(&self) -> bool {
        self.alarm_severity() <= AlarmSeverity::Major
    }

    pub fn precision(&self) -> i16 {
        self.control_value(|c| c.precision)
    }

    pub fn units(&self) -> &str {
        if self.is_connected() {
            &self.control.units
        } else {
            ""
        }
    }

    pub fn lower_display_limit(&self) -> f64 {
        self.control_value(|c| c.lower_disp_limit)
    }

    pub fn upper_display_limit(&self) -> f64 {
        self.control_value(|c| c.upper_disp_limit)
    }

    pub fn lower_control_limit(&self) -> f64 {
        self.control_value(|c| c.lower_ctrl_limit)
    }

    pub fn upper_control_limit(&self) -> f64 {
        self.control_value(|c| c.upper_ctrl_limit)
    }

    pub fn lower_warning_limit(&self) -> f64 {
        self.control_value(|c| c.lower_warning_limit)
    }

    pub fn upper_warning_limit(&self) -> f64 {
        self.control_value(|c| c.upper_warning_limit)
    }

    pub fn lower_alarm_limit(&self) -> f64 {
        self.control_value(|c| c.lower_alarm_limit)
    }

    pub fn upper_alarm_limit(&self) -> f64 {
        self.control_value(|c| c.upper_alarm_limit)
    }

    fn control_value<T: Default>(&self, pick: impl Fn(&ControlInfo) -> T) -> T {
        if self.is_connected() {
            pick(&self.control)
        } else {
            T::default()
        }
    }

    /// Lowest value the host's native type can represent, zero when not
    /// connected.
    pub fn min_field_value(&self) -> f64 {
        self.host_field_type().map_or(0.0, FieldType::min_value)
    }

    pub fn max_field_value(&self) -> f64 {
        self.host_field_type().map_or(0.0, FieldType::max_value)
    }

    /// Time of the latest update, or of the latest connection change.
    pub fn time_stamp(&self) -> TimeStamp {
        self.stamp
    }

    pub fn utc_time_image(&self, precision: i32) -> String {
        self.stamp.utc_image(precision)
    }

    pub fn local_time_image(&self, precision: i32) -> String {
        self.stamp.local_image(precision)
    }

    /// Whether this is an alarm status field (`<record>.STAT`).
    pub fn is_alarm_status(&self) -> bool {
        self.name.ends_with(".STAT")
    }

    /// Whether a CHAR array is decoded as one string.
    pub fn is_long_string(&self) -> bool {
        self.host_field == Some(FieldType::Char)
            && (self.options.long_string || self.name.ends_with('$'))
    }

    // Lifecycle

    /// Create the foreign channel. An empty name, or a channel that is
    /// already open, succeeds without doing anything.
    pub(crate) fn open(&mut self, link: &mut Link<'_>) -> bool {
        if self.name.is_empty() || self.handle.is_some() {
            return true;
        }
        match link
            .service
            .create_channel(&self.name, self.options.priority, self.tag)
        {
            Ok(handle) => {
                log::debug!("Opened {} as {}", self.name, handle);
                self.handle = Some(handle);
                self.state = ConnectionState::Pending;
                true
            }
            Err(e) => {
                crate::report_error!("create_channel ({}) failed ({})", self.name, e);
                false
            }
        }
    }

    /// Release the foreign channel and forget all cached data.
    pub(crate) fn close(&mut self, link: &mut Link<'_>) -> Option<ChannelEvent> {
        if self.cancel_subscription(link) {
            self.disconnect_time = Some(TimeStamp::now());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = link.service.destroy_channel(handle) {
                crate::report_error!("destroy_channel ({}) failed ({})", self.name, e);
            }
        }
        self.state = ConnectionState::Unused;
        self.pending_write = false;
        self.get_token = None;
        self.write_token = None;
        self.discard_data();
        self.connection_changed()
    }

    /// Issue a single read. Only possible while connected.
    pub(crate) fn reread(&mut self, link: &mut Link<'_>) -> bool {
        self.is_connected() && self.read_subscribe(link, ReadMode::SingleRead)
    }

    pub(crate) fn on_connection(&mut self, link: &mut Link<'_>, is_up: bool) -> Option<ChannelEvent> {
        if is_up {
            self.on_connected_up(link)
        } else {
            self.on_connected_down(link)
        }
    }

    fn on_connected_up(&mut self, link: &mut Link<'_>) -> Option<ChannelEvent> {
        log::debug!("{} connected", self.name);
        self.state = ConnectionState::Connected;
        if let Some(handle) = self.handle {
            self.host_field = link.service.host_field_type(handle);
            self.host_count = link.service.host_element_count(handle);
            self.host_name = link.service.host_name(handle);
        }
        self.discard_data();
        self.first_update = true;
        self.get_token = Some(link.tokens.mint());
        self.write_token = Some(link.tokens.mint());

        // A repeated connect must not leave the earlier subscription active.
        self.cancel_subscription(link);
        self.read_subscribe(link, self.options.read_mode);
        self.connection_changed()
    }

    fn on_connected_down(&mut self, link: &mut Link<'_>) -> Option<ChannelEvent> {
        log::debug!("{} disconnected", self.name);
        self.pending_write = false;
        self.state = ConnectionState::Disconnected;
        self.cancel_subscription(link);
        self.disconnect_time = Some(TimeStamp::now());
        self.get_token = None;
        self.write_token = None;
        self.discard_data();
        self.connection_changed()
    }

    /// Stamp the change and report connectivity if it differs from what was
    /// last reported.
    fn connection_changed(&mut self) -> Option<ChannelEvent> {
        self.stamp = TimeStamp::now();
        let connected = self.is_connected();
        if self.reported_connected == connected {
            return None;
        }
        self.reported_connected = connected;
        Some(ChannelEvent::Connection(connected))
    }

    fn discard_data(&mut self) {
        self.payload.clear();
        self.data_count = 0;
        self.data_field = None;
    }

    fn cancel_subscription(&mut self, link: &mut Link<'_>) -> bool {
        let Some((subscription, _)) = self.subscription.take() else {
            return false;
        };
        if let Err(e) = link.service.clear_subscription(subscription) {
            crate::report_error!("clear_subscription ({}) failed ({})", self.name, e);
        }
        true
    }

    /// Read the value with full metadata and, in subscribe mode, subscribe
    /// for time-stamped updates.
    pub(crate) fn read_subscribe(&mut self, link: &mut Link<'_>, mode: ReadMode) -> bool {
        let Some(handle) = self.handle else {
            return false;
        };
        let mut count = self.host_count;
        if count == 0 {
            return false;
        }
        if let Some(limit) = self.options.request_count {
            count = count.min(limit);
        }

        let Some(field) = self.options.request_field.or(self.host_field) else {
            crate::report_error!("field type ({}) is unknown", self.name);
            return false;
        };
        let initial = DbrType::initial_for(field);
        let update = DbrType::update_for(field);
        let element_size = field.element_size();

        let max_bytes = link.max_array_bytes;
        let meta_size = initial.size_with_one_element();
        if meta_size.saturating_add(count.saturating_mul(element_size)) >= max_bytes {
            let truncated = max_bytes.saturating_sub(meta_size) / element_size;
            crate::report_error!(
                "PV ({}) request count truncated from {} to {} elements",
                self.name,
                count,
                truncated
            );
            crate::report_error!("Effective EPICS_CA_MAX_ARRAY_BYTES = {}", max_bytes);
            count = truncated;
        }

        if matches!(mode, ReadMode::SingleRead | ReadMode::Subscribe) {
            let token = match self.get_token {
                Some(token) => token,
                None => *self.get_token.insert(link.tokens.mint()),
            };
            if let Err(e) = link.service.array_get(handle, initial, count, token) {
                crate::report_error!("array_get ({}) failed ({})", self.name, e);
                return false;
            }
        }

        if mode == ReadMode::Subscribe {
            let token = link.tokens.mint();
            match link
                .service
                .array_subscribe(handle, update, count, self.options.event_mask, token)
            {
                Ok(subscription) => self.subscription = Some((subscription, token)),
                Err(e) => {
                    crate::report_error!("array_subscribe ({}) failed ({})", self.name, e);
                    return false;
                }
            }
        }
        true
    }

    /// Route a completion by its request token.
    pub(crate) fn on_update(&mut self, event: UpdateEvent) -> Option<ChannelEvent> {
        let token = event.token;
        let is_read = self.get_token == Some(token)
            || self.subscription.is_some_and(|(_, sub)| sub == token);

        if is_read {
            if let CompletionStatus::Failed(message) = &event.status {
                crate::report_error!("Get/Sub ({}) error ({})", self.name, message);
                return None;
            }
            return self.apply_payload(event.dbr_type, event.count, event.meta, event.values);
        }

        if self.write_token == Some(token) {
            if self.pending_write {
                self.pending_write = false;
                return Some(ChannelEvent::WriteAck(event.status.is_normal()));
            }
            crate::report_error!("({}) unexpected put call back", self.name);
            return None;
        }

        log::debug!("{}: ignoring completion for stale token {:?}", self.name, token);
        None
    }

    /// Install a received value and its metadata.
    pub(crate) fn apply_payload(
        &mut self,
        raw_type: u16,
        count: usize,
        meta: UpdateMeta,
        mut values: Vec<u8>,
    ) -> Option<ChannelEvent> {
        if !self.is_connected() {
            log::debug!("{}: update while {:?} ignored", self.name, self.state);
            return None;
        }
        let Some(dbr) = DbrType::from_raw(raw_type) else {
            log::debug!("{}: invalid request type {} ignored", self.name, raw_type);
            return None;
        };
        let element_size = dbr.field.element_size();
        let Some(expected) = count.checked_mul(element_size) else {
            log::debug!("{}: element count {} out of range, ignored", self.name, count);
            return None;
        };
        if expected == 0 || values.len() < element_size {
            return None;
        }
        if matches!(dbr.kind, DbrKind::Plain | DbrKind::Graphic) {
            crate::report_error!("({}): unexpected buffer type {}", self.name, dbr);
            return None;
        }

        values.truncate(expected);
        self.data_count = values.len() / element_size;
        self.data_field = Some(dbr.field);
        self.payload.install(values);

        self.status = meta.status;
        self.severity = meta.severity;
        match dbr.kind {
            DbrKind::Time => self.stamp = meta.stamp.unwrap_or_else(TimeStamp::now),
            DbrKind::Control => {
                self.stamp = TimeStamp::now();
                let control = meta.control.map(|c| *c).unwrap_or_default();
                self.apply_control(dbr.field, control);
            }
            _ => {
                self.stamp = TimeStamp::now();
                self.control = ControlInfo::default();
            }
        }

        let first = std::mem::replace(&mut self.first_update, false);
        Some(ChannelEvent::Update { first })
    }

    fn apply_control(&mut self, field: FieldType, mut control: ControlInfo) {
        if field == FieldType::Enum {
            let mut states = control.enum_states;
            states.truncate(MAX_ENUM_STATES);
            for label in states.iter_mut() {
                truncate_label(label);
            }
            let upper = if self.is_alarm_status() {
                ALARM_NSTATUS as f64 - 1.0
            } else {
                states.len() as f64 - 1.0
            };
            self.control = ControlInfo {
                enum_states: states,
                upper_disp_limit: upper,
                upper_ctrl_limit: upper,
                ..ControlInfo::default()
            };
        } else {
            if !field.is_floating() {
                control.precision = 0;
            }
            control.enum_states.clear();
            self.control = control;
        }
    }

    // Writes

    /// Issue a write. In put-ack mode only one write may be outstanding.
    pub(crate) fn write(
        &mut self,
        link: &mut Link<'_>,
        field: FieldType,
        count: usize,
        bytes: &[u8],
    ) -> bool {
        let Some(handle) = self.handle.filter(|_| self.is_connected()) else {
            return false;
        };

        if !self.options.put_ack {
            return match link.service.array_put(handle, field, count, bytes) {
                Ok(()) => true,
                Err(e) => {
                    crate::report_error!("array_put ({}) failed ({})", self.name, e);
                    false
                }
            };
        }

        if self.pending_write {
            crate::report_error!("put ({}) write inhibited - pending put callback", self.name);
            return false;
        }
        let token = match self.write_token {
            Some(token) => token,
            None => *self.write_token.insert(link.tokens.mint()),
        };
        match link
            .service
            .array_put_with_ack(handle, field, count, bytes, token)
        {
            Ok(()) => {
                self.pending_write = true;
                true
            }
            Err(e) => {
                crate::report_error!("array_put_with_ack ({}) failed ({})", self.name, e);
                false
            }
        }
    }

    /// Abandon an outstanding acknowledged write, reporting it as failed.
    pub(crate) fn clear_pending_write(&mut self) -> Option<ChannelEvent> {
        if !self.pending_write {
            return None;
        }
        self.pending_write = false;
        // A late ack for the abandoned write must not match the next one.
        self.write_token = None;
        Some(ChannelEvent::WriteAck(false))
    }
}

fn truncate_label(label: &mut String) {
    if label.len() > MAX_ENUM_STRING_SIZE {
        let mut end = MAX_ENUM_STRING_SIZE;
        while !label.is_char_boundary(end) {
            end -= 1;
        }
        label.truncate(end);
    }
}
