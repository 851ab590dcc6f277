//! Interface to the remote monitored-variable service
//!
//! Calls are made from the consumer thread only. Completions and connection
//! changes come back asynchronously through the [`NotificationSender`] given
//! to [`ChannelService::attach`], carrying the [`ChannelTag`] and
//! [`RequestToken`] supplied with the originating call.

use crate::queue::{NotificationSender, RequestToken};
use crate::registry::{ChannelTag, ForeignHandle};
use crate::service::error::ServiceError;
use crate::types::{DbrType, EventMask, FieldType};

/// Identifies one active subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

pub trait ChannelService {
    /// Route future notifications to `sender`.
    fn attach(&mut self, sender: NotificationSender) -> Result<(), ServiceError>;

    /// Stop delivering notifications.
    fn detach(&mut self);

    fn create_channel(
        &mut self,
        name: &str,
        priority: u32,
        tag: ChannelTag,
    ) -> Result<ForeignHandle, ServiceError>;

    fn destroy_channel(&mut self, handle: ForeignHandle) -> Result<(), ServiceError>;

    fn array_get(
        &mut self,
        handle: ForeignHandle,
        dbr_type: DbrType,
        count: usize,
        token: RequestToken,
    ) -> Result<(), ServiceError>;

    fn array_subscribe(
        &mut self,
        handle: ForeignHandle,
        dbr_type: DbrType,
        count: usize,
        mask: EventMask,
        token: RequestToken,
    ) -> Result<SubscriptionId, ServiceError>;

    fn clear_subscription(&mut self, subscription: SubscriptionId) -> Result<(), ServiceError>;

    /// Write without acknowledgement.
    fn array_put(
        &mut self,
        handle: ForeignHandle,
        field: FieldType,
        count: usize,
        values: &[u8],
    ) -> Result<(), ServiceError>;

    /// Write and report completion as an update carrying `token`.
    fn array_put_with_ack(
        &mut self,
        handle: ForeignHandle,
        field: FieldType,
        count: usize,
        values: &[u8],
        token: RequestToken,
    ) -> Result<(), ServiceError>;

    /// Native type of the remote variable, `None` while unreachable.
    fn host_field_type(&self, handle: ForeignHandle) -> Option<FieldType>;

    fn host_element_count(&self, handle: ForeignHandle) -> usize;

    fn host_name(&self, handle: ForeignHandle) -> String;

    fn read_access(&self, handle: ForeignHandle) -> bool;

    fn write_access(&self, handle: ForeignHandle) -> bool;

    /// Send any buffered requests.
    fn flush(&mut self) -> Result<(), ServiceError>;

    fn protocol_version(&self) -> String;
}
