//! Native field types and request ("DBR") types

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

/// Bytes in one fixed-width string element.
pub const STRING_SIZE: usize = 40;

/// Native representation of a remote variable's value.
#[derive(EnumIter, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Short,
    Float,
    Enum,
    Char,
    Long,
    Double,
}

impl FieldType {
    pub fn from_raw(raw: u16) -> Option<Self> {
        Self::iter().find(|ft| ft.raw() == raw)
    }

    pub fn raw(self) -> u16 {
        match self {
            Self::String => 0,
            Self::Short => 1,
            Self::Float => 2,
            Self::Enum => 3,
            Self::Char => 4,
            Self::Long => 5,
            Self::Double => 6,
        }
    }

    pub fn element_size(self) -> usize {
        match self {
            Self::String => STRING_SIZE,
            Self::Short | Self::Enum => 2,
            Self::Float | Self::Long => 4,
            Self::Char => 1,
            Self::Double => 8,
        }
    }

    pub fn image(self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Short => "SHORT",
            Self::Float => "FLOAT",
            Self::Enum => "ENUM",
            Self::Char => "CHAR",
            Self::Long => "LONG",
            Self::Double => "DOUBLE",
        }
    }

    /// Smallest value the native type can hold.
    pub fn min_value(self) -> f64 {
        match self {
            Self::String | Self::Enum => 0.0,
            Self::Short => i16::MIN as f64,
            Self::Char => i8::MIN as f64,
            Self::Float => -(f32::MAX as f64),
            Self::Long => i32::MIN as f64,
            Self::Double => -f64::MAX,
        }
    }

    /// Largest value the native type can hold. CHAR fields serve as both
    /// signed and unsigned bytes, so they span -128 to 255.
    pub fn max_value(self) -> f64 {
        match self {
            Self::String => 0.0,
            Self::Short => i16::MAX as f64,
            Self::Float => f32::MAX as f64,
            Self::Enum => u16::MAX as f64,
            Self::Char => u8::MAX as f64,
            Self::Long => i32::MAX as f64,
            Self::Double => f64::MAX,
        }
    }

    pub fn is_floating(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.image())
    }
}

/// How much metadata accompanies the value in a request.
#[derive(EnumIter, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbrKind {
    Plain,
    Status,
    Time,
    Graphic,
    Control,
}

impl DbrKind {
    fn raw(self) -> u16 {
        match self {
            Self::Plain => 0,
            Self::Status => 1,
            Self::Time => 2,
            Self::Graphic => 3,
            Self::Control => 4,
        }
    }
}

/// A request type: one field type combined with one metadata kind. The raw
/// encoding is `kind * 7 + field`, so `Control`/`Double` is 34.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DbrType {
    pub kind: DbrKind,
    pub field: FieldType,
}

impl DbrType {
    pub const fn new(kind: DbrKind, field: FieldType) -> Self {
        Self { kind, field }
    }

    pub fn from_raw(raw: u16) -> Option<Self> {
        let kind = DbrKind::iter().find(|k| k.raw() == raw / 7)?;
        let field = FieldType::from_raw(raw % 7)?;
        Some(Self { kind, field })
    }

    pub fn raw(self) -> u16 {
        self.kind.raw() * 7 + self.field.raw()
    }

    /// The request used for the first read after connecting. Strings have
    /// no control form, so they use the status form instead.
    pub fn initial_for(field: FieldType) -> Self {
        match field {
            FieldType::String => Self::new(DbrKind::Status, field),
            _ => Self::new(DbrKind::Control, field),
        }
    }

    /// The request used for subscription updates.
    pub fn update_for(field: FieldType) -> Self {
        Self::new(DbrKind::Time, field)
    }

    /// Size in bytes of the request structure carrying a single element,
    /// i.e. the metadata plus one value including alignment padding.
    pub fn size_with_one_element(self) -> usize {
        use DbrKind::*;
        use FieldType::*;

        match (self.kind, self.field) {
            (Plain, ft) => ft.element_size(),
            (Status, String) => 44,
            (Status, Short) | (Status, Enum) => 6,
            (Status, Float) | (Status, Long) => 8,
            (Status, Char) => 6,
            (Status, Double) => 16,
            (Time, String) => 52,
            (Time, Double) => 24,
            (Time, _) => 16,
            (Graphic, String) => 44,
            (Graphic, Short) => 26,
            (Graphic, Float) => 44,
            (Graphic, Enum) => 424,
            (Graphic, Char) => 20,
            (Graphic, Long) => 40,
            (Graphic, Double) => 72,
            (Control, String) => 44,
            (Control, Short) => 30,
            (Control, Float) => 52,
            (Control, Enum) => 424,
            (Control, Char) => 22,
            (Control, Long) => 48,
            (Control, Double) => 88,
        }
    }
}

impl std::fmt::Display for DbrType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            DbrKind::Plain => "",
            DbrKind::Status => "STS_",
            DbrKind::Time => "TIME_",
            DbrKind::Graphic => "GR_",
            DbrKind::Control => "CTRL_",
        };
        write!(f, "DBR_{}{}", kind, self.field.image())
    }
}
