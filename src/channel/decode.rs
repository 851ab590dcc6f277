//! Typed access to a channel's cached value

use crate::channel::state::{Channel, MAX_ENUM_STRING_SIZE};
use crate::types::{AlarmCondition, FieldType, ALARM_NSTATUS, STRING_SIZE};

const LOW_LIMITS: [f64; 16] = [
    1.0e0, 1.0e0, 1.0e-1, 1.0e-1, 1.0e-2, 1.0e-2, 1.0e-3, 1.0e-3, 1.0e-4, 1.0e-4, 1.0e-5, 1.0e-5,
    1.0e-6, 1.0e-6, 1.0e-7, 1.0e-7,
];

const HIGH_LIMITS: [f64; 16] = [
    1.0e1, 1.0e2, 1.0e2, 1.0e3, 1.0e3, 1.0e4, 1.0e4, 1.0e5, 1.0e5, 1.0e6, 1.0e6, 1.0e7, 1.0e7,
    1.0e8, 1.0e8, 1.0e9,
];

/// Text up to the first NUL, at most `limit` bytes.
fn limited_text(bytes: &[u8], limit: usize) -> String {
    let bytes = &bytes[..bytes.len().min(limit)];
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Length of the numeric prefix of `text` (after leading whitespace),
/// accepting a sign, digits and, when `floating`, a fraction and exponent.
fn numeric_prefix(text: &str, floating: bool) -> &str {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let digits = |from: usize| {
        bytes[from..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+') | Some(b'-')));
    let whole = digits(end);
    end += whole;
    if !floating {
        return if whole > 0 { &text[..end] } else { "" };
    }

    let mut mantissa = whole;
    if bytes.get(end) == Some(&b'.') {
        let fraction = digits(end + 1);
        mantissa += fraction;
        end += 1 + fraction;
    }
    if mantissa == 0 {
        return "";
    }
    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exponent = digits(exp_end);
        if exponent > 0 {
            end = exp_end + exponent;
        }
    }
    &text[..end]
}

/// Parse a leading floating point number, yielding zero when there is none.
pub(crate) fn parse_floating(text: &str) -> f64 {
    numeric_prefix(text, true).parse().unwrap_or(0.0)
}

/// Parse a leading integer, saturating on overflow and yielding zero when
/// there is none.
pub(crate) fn parse_integer(text: &str) -> i32 {
    let prefix = numeric_prefix(text, false);
    if prefix.is_empty() {
        return 0;
    }
    match prefix.parse::<i64>() {
        Ok(value) => value.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
        Err(_) if prefix.starts_with('-') => i32::MIN,
        Err(_) => i32::MAX,
    }
}

/// `%.{precision}e` as printed by C: at least two exponent digits, always
/// signed.
pub(crate) fn format_scientific(value: f64, precision: usize) -> String {
    if !value.is_finite() {
        return non_finite(value);
    }
    let text = format!("{:.*e}", precision, value);
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exponent.abs())
        }
        None => text,
    }
}

fn non_finite(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value > 0.0 {
        "inf".to_string()
    } else {
        "-inf".to_string()
    }
}

/// Fixed notation when the magnitude suits the precision, scientific
/// otherwise. Precision is clamped to 0..=15.
pub fn format_floating(value: f64, precision: i16) -> String {
    let p = precision.clamp(0, 15) as usize;
    let magnitude = value.abs();
    let in_fixed_range = magnitude >= LOW_LIMITS[p] && magnitude < HIGH_LIMITS[p];
    if magnitude == 0.0 || in_fixed_range {
        format!("{:.*}", p, value)
    } else {
        format_scientific(value, p)
    }
}

impl Channel {
    fn element(&self, index: usize) -> Option<(FieldType, &[u8])> {
        if !self.data_is_available() || index >= self.data_count {
            return None;
        }
        let field = self.data_field?;
        let size = field.element_size();
        let start = index.checked_mul(size)?;
        let bytes = self.payload.as_bytes().get(start..start + size)?;
        Some((field, bytes))
    }

    /// Element `index` widened to `f64`; zero when unavailable.
    pub fn get_floating(&self, index: usize) -> f64 {
        let Some((field, bytes)) = self.element(index) else {
            return 0.0;
        };
        match field {
            FieldType::String => parse_floating(&limited_text(bytes, STRING_SIZE)),
            FieldType::Short => i16::from_ne_bytes([bytes[0], bytes[1]]) as f64,
            FieldType::Float => f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            FieldType::Enum => u16::from_ne_bytes([bytes[0], bytes[1]]) as f64,
            FieldType::Char => bytes[0] as f64,
            FieldType::Long => i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            FieldType::Double => f64::from_ne_bytes(eight(bytes)),
        }
    }

    /// Element `index` converted to `i32`; floating values truncate toward
    /// zero and saturate. Zero when unavailable.
    pub fn get_integer(&self, index: usize) -> i32 {
        let Some((field, bytes)) = self.element(index) else {
            return 0;
        };
        match field {
            FieldType::String => parse_integer(&limited_text(bytes, STRING_SIZE)),
            FieldType::Short => i16::from_ne_bytes([bytes[0], bytes[1]]) as i32,
            FieldType::Float => f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i32,
            FieldType::Enum => u16::from_ne_bytes([bytes[0], bytes[1]]) as i32,
            FieldType::Char => bytes[0] as i32,
            FieldType::Long => i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            FieldType::Double => f64::from_ne_bytes(eight(bytes)) as i32,
        }
    }

    /// Element `index` formatted for display.
    ///
    /// Long strings yield the whole text at index 0 and nothing elsewhere.
    /// Enumerations yield their label, numbers are formatted with the cached
    /// precision and, if enabled, followed by the units.
    pub fn get_string(&self, index: usize) -> String {
        if !self.data_is_available() {
            return String::new();
        }
        if self.is_long_string() {
            if index != 0 {
                return String::new();
            }
            return limited_text(self.payload.as_bytes(), self.data_count);
        }

        let Some((field, bytes)) = self.element(index) else {
            return String::new();
        };
        let units = if self.options.include_units && !self.control.units.is_empty() {
            format!(" {}", self.control.units)
        } else {
            String::new()
        };

        match field {
            FieldType::String => limited_text(bytes, STRING_SIZE),
            FieldType::Char | FieldType::Short | FieldType::Long => {
                format!("{}{}", self.get_integer(index), units)
            }
            FieldType::Enum => self.get_enumeration(self.get_integer(index)),
            FieldType::Float | FieldType::Double => {
                let text = format_floating(self.get_floating(index), self.control.precision);
                format!("{}{}", text, units)
            }
        }
    }

    pub fn get_floating_array(&self) -> Vec<f64> {
        self.indices().map(|i| self.get_floating(i)).collect()
    }

    pub fn get_integer_array(&self) -> Vec<i32> {
        self.indices().map(|i| self.get_integer(i)).collect()
    }

    pub fn get_string_array(&self) -> Vec<String> {
        self.indices().map(|i| self.get_string(i)).collect()
    }

    fn indices(&self) -> std::ops::Range<usize> {
        if self.data_is_available() {
            0..self.data_count
        } else {
            0..0
        }
    }

    /// Number of enumeration labels. Alarm status fields always have all
    /// alarm conditions; other fields have none unless they are
    /// enumerations.
    pub fn enumeration_states_count(&self) -> usize {
        if self.data_field_type() != Some(FieldType::Enum) {
            return 0;
        }
        if self.is_alarm_status() {
            ALARM_NSTATUS as usize
        } else {
            self.control.enum_states.len()
        }
    }

    /// Label for `state`, or `#<state>` if there is none.
    pub fn get_enumeration(&self, state: i32) -> String {
        let count = self.enumeration_states_count();
        let in_range = usize::try_from(state).is_ok_and(|s| s < count);
        if !in_range {
            return format!("#{}", state);
        }
        if self.is_alarm_status() {
            return AlarmCondition::from_raw(state as u16)
                .map(|c| c.image().to_string())
                .unwrap_or_else(|| format!("#{}", state));
        }
        let label = &self.control.enum_states[state as usize];
        limited_text(label.as_bytes(), MAX_ENUM_STRING_SIZE)
    }

    pub fn get_enumeration_states(&self) -> Vec<String> {
        (0..self.enumeration_states_count())
            .map(|state| self.get_enumeration(state as i32))
            .collect()
    }

    /// Size in bytes of the cached value.
    pub fn raw_data_size(&self) -> usize {
        self.payload.len()
    }

    /// Cached value bytes from `offset`; empty when unavailable or past
    /// the end.
    pub fn raw_data(&self, offset: usize) -> &[u8] {
        if !self.data_is_available() {
            return &[];
        }
        self.payload.as_bytes().get(offset..).unwrap_or(&[])
    }

    /// Copy cached value bytes from `offset` into `dest`, returning how many
    /// were copied.
    pub fn copy_raw_data(&self, dest: &mut [u8], offset: usize) -> usize {
        let source = self.raw_data(offset);
        let count = dest.len().min(source.len());
        dest[..count].copy_from_slice(&source[..count]);
        count
    }
}

fn eight(bytes: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&bytes[..8]);
    out
}
