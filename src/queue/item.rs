//! Items carried from producer threads to the consumer

use crate::registry::{ChannelTag, ForeignHandle};
use crate::types::{CompletionStatus, UpdateMeta};

/// Identifies one outstanding request (a read, a subscription or a write).
/// A channel mints fresh tokens on every connect, so completions of
/// requests issued before a reconnect no longer match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestToken(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionEvent {
    pub handle: ForeignHandle,
    pub tag: Option<ChannelTag>,
    pub is_up: bool,
}

/// Completion of a read, a subscription update or a write acknowledgement.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateEvent {
    pub handle: ForeignHandle,
    pub tag: Option<ChannelTag>,
    /// Raw request type; may be out of range.
    pub dbr_type: u16,
    pub count: usize,
    pub token: RequestToken,
    pub status: CompletionStatus,
    pub meta: UpdateMeta,
    /// Element values in native byte order.
    pub values: Vec<u8>,
}

impl UpdateEvent {
    pub fn new(
        handle: ForeignHandle,
        tag: Option<ChannelTag>,
        dbr_type: u16,
        count: usize,
        token: RequestToken,
    ) -> Self {
        Self {
            handle,
            tag,
            dbr_type,
            count,
            token,
            status: CompletionStatus::Normal,
            meta: UpdateMeta::default(),
            values: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: CompletionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_meta(mut self, meta: UpdateMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_values(mut self, values: Vec<u8>) -> Self {
        self.values = values;
        self
    }

    pub(crate) fn coalesce_key(&self) -> CoalesceKey {
        CoalesceKey {
            handle: self.handle,
            dbr_type: self.dbr_type,
            token: self.token,
        }
    }
}

/// Updates sharing a key supersede one another under load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CoalesceKey {
    handle: ForeignHandle,
    dbr_type: u16,
    token: RequestToken,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Connection(ConnectionEvent),
    Update(UpdateEvent),
    /// One line of text printed by the service library.
    Diagnostic(String),
}

impl Notification {
    pub fn handle(&self) -> Option<ForeignHandle> {
        match self {
            Notification::Connection(event) => Some(event.handle),
            Notification::Update(event) => Some(event.handle),
            Notification::Diagnostic(_) => None,
        }
    }
}
