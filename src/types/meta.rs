//! Channel options and the metadata that travels with updates

use crate::types::time::TimeStamp;
use serde::{Deserialize, Serialize};

/// What a channel does once it connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReadMode {
    /// Connect only.
    NoRead,
    /// One read after each connect.
    SingleRead,
    /// One read, then a subscription for updates.
    #[default]
    Subscribe,
}

/// Which changes a subscription reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventMask(pub u32);

impl EventMask {
    pub const VALUE: EventMask = EventMask(1);
    pub const ARCHIVE: EventMask = EventMask(2);
    pub const ALARM: EventMask = EventMask(4);
    pub const PROPERTY: EventMask = EventMask(8);

    pub fn contains(self, other: EventMask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for EventMask {
    fn default() -> Self {
        Self::VALUE | Self::ALARM
    }
}

impl std::ops::BitOr for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: EventMask) -> EventMask {
        EventMask(self.0 | rhs.0)
    }
}

/// Outcome reported by the service for one completed request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CompletionStatus {
    #[default]
    Normal,
    Failed(String),
}

impl CompletionStatus {
    pub fn is_normal(&self) -> bool {
        matches!(self, CompletionStatus::Normal)
    }
}

/// Display, control and alarm properties delivered with control-style
/// reads.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ControlInfo {
    pub precision: i16,
    pub units: String,
    pub enum_states: Vec<String>,
    pub upper_disp_limit: f64,
    pub lower_disp_limit: f64,
    pub upper_alarm_limit: f64,
    pub upper_warning_limit: f64,
    pub lower_warning_limit: f64,
    pub lower_alarm_limit: f64,
    pub upper_ctrl_limit: f64,
    pub lower_ctrl_limit: f64,
}

/// Status part of an update. `control` is only present for control-style
/// reads.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateMeta {
    pub status: u16,
    pub severity: u16,
    pub stamp: Option<TimeStamp>,
    pub control: Option<Box<ControlInfo>>,
}
