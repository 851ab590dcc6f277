//! Encoding of typed values for writes

use crate::channel::state::Channel;
use crate::channel::Link;
use crate::types::{FieldType, STRING_SIZE};

/// One fixed-width string element, truncated to leave room for the NUL.
fn string_element(value: &str) -> [u8; STRING_SIZE] {
    let mut element = [0u8; STRING_SIZE];
    let bytes = value.as_bytes();
    let len = bytes.len().min(STRING_SIZE - 1);
    element[..len].copy_from_slice(&bytes[..len]);
    element
}

impl Channel {
    pub(crate) fn write_floating(&mut self, link: &mut Link<'_>, value: f64) -> bool {
        self.write(link, FieldType::Double, 1, &value.to_ne_bytes())
    }

    pub(crate) fn write_integer(&mut self, link: &mut Link<'_>, value: i32) -> bool {
        self.write(link, FieldType::Long, 1, &value.to_ne_bytes())
    }

    /// Write text. A CHAR array host field receives the bytes directly,
    /// limited to its element count and NUL-terminated when shorter;
    /// anything else receives one string element.
    pub(crate) fn write_string(&mut self, link: &mut Link<'_>, value: &str) -> bool {
        let host_count = self.host_element_count();
        if self.host_field_type() == Some(FieldType::Char) && host_count >= 2 {
            let bytes = value.as_bytes();
            let len = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
            let len = len.min(host_count);
            let mut data = bytes[..len].to_vec();
            if len < host_count {
                data.push(0);
            }
            if data.is_empty() {
                data.push(0);
            }
            let count = data.len();
            return self.write(link, FieldType::Char, count, &data);
        }
        self.write(link, FieldType::String, 1, &string_element(value))
    }

    pub(crate) fn write_floating_array(&mut self, link: &mut Link<'_>, values: &[f64]) -> bool {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        self.write(link, FieldType::Double, values.len(), &bytes)
    }

    pub(crate) fn write_integer_array(&mut self, link: &mut Link<'_>, values: &[i32]) -> bool {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        self.write(link, FieldType::Long, values.len(), &bytes)
    }

    pub(crate) fn write_string_array<S: AsRef<str>>(
        &mut self,
        link: &mut Link<'_>,
        values: &[S],
    ) -> bool {
        let bytes: Vec<u8> = values
            .iter()
            .flat_map(|v| string_element(v.as_ref()))
            .collect();
        self.write(link, FieldType::String, values.len(), &bytes)
    }

    pub(crate) fn write_bytes(&mut self, link: &mut Link<'_>, values: &[u8]) -> bool {
        self.write(link, FieldType::Char, values.len(), values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_element_truncates_and_terminates() {
        let element = string_element("abc");
        assert_eq!(&element[..4], b"abc\0");

        let long = "x".repeat(60);
        let element = string_element(&long);
        assert_eq!(element[STRING_SIZE - 2], b'x');
        assert_eq!(element[STRING_SIZE - 1], 0);
    }
}
