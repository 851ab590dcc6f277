//! Value types shared by the queue, the channel state machine and the
//! service interface.

pub mod alarm;
pub mod field;
pub mod meta;
pub mod time;

pub use alarm::{condition_image, severity_image, AlarmCondition, AlarmSeverity, ALARM_NSTATUS};
pub use field::{DbrKind, DbrType, FieldType, STRING_SIZE};
pub use meta::{CompletionStatus, ControlInfo, EventMask, ReadMode, UpdateMeta};
pub use time::TimeStamp;
