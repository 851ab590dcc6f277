//! Alarm severities and conditions

use strum::IntoEnumIterator;
use strum_macros::EnumIter;

/// Number of distinct alarm conditions.
pub const ALARM_NSTATUS: u16 = 22;

#[derive(EnumIter, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum AlarmSeverity {
    #[default]
    NoAlarm,
    Minor,
    Major,
    Invalid,
    /// Client-side only: the channel is not connected.
    Disconnected,
}

impl AlarmSeverity {
    pub fn from_raw(raw: u16) -> Option<Self> {
        Self::iter().nth(raw as usize)
    }

    pub fn image(self) -> &'static str {
        match self {
            Self::NoAlarm => "NO_ALARM",
            Self::Minor => "MINOR",
            Self::Major => "MAJOR",
            Self::Invalid => "INVALID",
            Self::Disconnected => "DISCONNECTED",
        }
    }
}

#[derive(EnumIter, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlarmCondition {
    #[default]
    NoAlarm,
    Read,
    Write,
    HiHi,
    High,
    LoLo,
    Low,
    State,
    ChangeOfState,
    Comm,
    Timeout,
    HwLimit,
    Calc,
    Scan,
    Link,
    Soft,
    BadSub,
    Udf,
    Disable,
    Simm,
    ReadAccess,
    WriteAccess,
}

impl AlarmCondition {
    pub fn from_raw(raw: u16) -> Option<Self> {
        Self::iter().nth(raw as usize)
    }

    pub fn image(self) -> &'static str {
        match self {
            Self::NoAlarm => "NO_ALARM",
            Self::Read => "READ",
            Self::Write => "WRITE",
            Self::HiHi => "HIHI",
            Self::High => "HIGH",
            Self::LoLo => "LOLO",
            Self::Low => "LOW",
            Self::State => "STATE",
            Self::ChangeOfState => "COS",
            Self::Comm => "COMM",
            Self::Timeout => "TIMEOUT",
            Self::HwLimit => "HWLIMIT",
            Self::Calc => "CALC",
            Self::Scan => "SCAN",
            Self::Link => "LINK",
            Self::Soft => "SOFT",
            Self::BadSub => "BAD_SUB",
            Self::Udf => "UDF",
            Self::Disable => "DISABLE",
            Self::Simm => "SIMM",
            Self::ReadAccess => "READ_ACCESS",
            Self::WriteAccess => "WRITE_ACCESS",
        }
    }

    /// Labels used when an alarm status field is read as an enumeration.
    pub fn labels() -> Vec<String> {
        Self::iter().map(|c| c.image().to_string()).collect()
    }
}

/// Render a raw severity, including values outside the known range.
pub fn severity_image(raw: u16) -> String {
    match AlarmSeverity::from_raw(raw) {
        Some(severity) => severity.image().to_string(),
        None => format!("unknown severity {}", raw),
    }
}

/// Render a raw condition, including values outside the known range.
pub fn condition_image(raw: u16) -> String {
    match AlarmCondition::from_raw(raw) {
        Some(condition) => condition.image().to_string(),
        None => format!("unknown status {}", raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_count_matches_constant() {
        assert_eq!(AlarmCondition::iter().count(), ALARM_NSTATUS as usize);
        assert_eq!(AlarmCondition::labels()[8], "COS");
    }

    #[test]
    fn test_images() {
        assert_eq!(severity_image(2), "MAJOR");
        assert_eq!(severity_image(9), "unknown severity 9");
        assert_eq!(condition_image(21), "WRITE_ACCESS");
        assert_eq!(condition_image(22), "unknown status 22");
        assert_eq!(AlarmSeverity::Disconnected.image(), "DISCONNECTED");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(AlarmSeverity::Major > AlarmSeverity::Minor);
        assert_eq!(AlarmSeverity::from_raw(3), Some(AlarmSeverity::Invalid));
    }
}
