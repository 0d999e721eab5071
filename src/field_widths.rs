//! Field widths of an ISO 2709 record.
//!
//! Positions 10, 11 and 20-22 of the leader describe how the rest of a
//! record is laid out: how many indicator characters start each data field,
//! how many identifier characters follow each subfield marker, and how many
//! digits the directory uses for field lengths, field starts and the
//! implementation-defined part. [`FieldWidths`] captures those five values.

use crate::error::{Iso2709Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of characters in a tag.
pub const TAG_LENGTH: usize = 3;

/// Largest width that fits the single leader digit.
const MAX_WIDTH: u8 = 9;

/// Largest supported identifier length.
const MAX_IDENTIFIER_LENGTH: u8 = 2;

/// Immutable description of the per-field widths of a record.
///
/// Two instances are equal iff all widths are equal.
///
/// # Examples
///
/// ```
/// use iso2709::FieldWidths;
///
/// let widths = FieldWidths::new(2, 1, 4, 5, 0)?;
/// assert_eq!(widths.entry_length(), 12);
/// assert_eq!(widths.max_field_length(), 9999);
/// # Ok::<(), iso2709::Iso2709Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawFieldWidths")]
pub struct FieldWidths {
    indicator_length: u8,
    identifier_length: u8,
    field_length_length: u8,
    field_start_length: u8,
    impl_defined_part_length: u8,
}

/// Unvalidated mirror used while deserializing.
#[derive(Deserialize)]
struct RawFieldWidths {
    indicator_length: u8,
    identifier_length: u8,
    field_length_length: u8,
    field_start_length: u8,
    impl_defined_part_length: u8,
}

impl TryFrom<RawFieldWidths> for FieldWidths {
    type Error = Iso2709Error;

    fn try_from(raw: RawFieldWidths) -> Result<Self> {
        FieldWidths::new(
            raw.indicator_length,
            raw.identifier_length,
            raw.field_length_length,
            raw.field_start_length,
            raw.impl_defined_part_length,
        )
    }
}

impl FieldWidths {
    /// Create a validated set of field widths.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::InvalidWidths`] if
    /// - `indicator_length` or `impl_defined_part_length` exceeds 9,
    /// - `identifier_length` is not 0, 1 or 2,
    /// - `field_length_length` or `field_start_length` is not in `1..=9`.
    pub fn new(
        indicator_length: u8,
        identifier_length: u8,
        field_length_length: u8,
        field_start_length: u8,
        impl_defined_part_length: u8,
    ) -> Result<Self> {
        check_range("indicator length", indicator_length, 0, MAX_WIDTH)?;
        check_range("identifier length", identifier_length, 0, MAX_IDENTIFIER_LENGTH)?;
        check_range("field length length", field_length_length, 1, MAX_WIDTH)?;
        check_range("field start length", field_start_length, 1, MAX_WIDTH)?;
        check_range("impl defined part length", impl_defined_part_length, 0, MAX_WIDTH)?;
        Ok(FieldWidths {
            indicator_length,
            identifier_length,
            field_length_length,
            field_start_length,
            impl_defined_part_length,
        })
    }

    /// Number of characters in a tag (always 3).
    #[must_use]
    pub const fn tag_length(&self) -> usize {
        TAG_LENGTH
    }

    /// Number of indicator characters at the start of each data field.
    #[must_use]
    pub const fn indicator_length(&self) -> usize {
        self.indicator_length as usize
    }

    /// Number of identifier characters following each subfield marker.
    #[must_use]
    pub const fn identifier_length(&self) -> usize {
        self.identifier_length as usize
    }

    /// Number of digits of the field length in a directory entry.
    #[must_use]
    pub const fn field_length_length(&self) -> usize {
        self.field_length_length as usize
    }

    /// Number of digits of the field start in a directory entry.
    #[must_use]
    pub const fn field_start_length(&self) -> usize {
        self.field_start_length as usize
    }

    /// Number of characters of the implementation-defined part of a
    /// directory entry.
    #[must_use]
    pub const fn impl_defined_part_length(&self) -> usize {
        self.impl_defined_part_length as usize
    }

    /// Width of one directory entry in bytes.
    #[must_use]
    pub const fn entry_length(&self) -> usize {
        TAG_LENGTH
            + self.field_length_length()
            + self.field_start_length()
            + self.impl_defined_part_length()
    }

    /// Largest field length a single directory entry can record.
    #[must_use]
    pub fn max_field_length(&self) -> usize {
        max_value(self.field_length_length())
    }

    /// Largest field start a directory entry can record.
    #[must_use]
    pub fn max_field_start(&self) -> usize {
        max_value(self.field_start_length())
    }
}

impl fmt::Display for FieldWidths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(indicator_length={}, identifier_length={}, field_length_length={}, \
             field_start_length={}, impl_defined_part_length={})",
            self.indicator_length,
            self.identifier_length,
            self.field_length_length,
            self.field_start_length,
            self.impl_defined_part_length
        )
    }
}

fn check_range(name: &str, value: u8, min: u8, max: u8) -> Result<()> {
    if value < min || value > max {
        return Err(Iso2709Error::InvalidWidths(format!(
            "{name} must be between {min} and {max}, got {value}"
        )));
    }
    Ok(())
}

/// Largest number with `digits` decimal digits.
fn max_value(digits: usize) -> usize {
    (0..digits).fold(1usize, |acc, _| acc * 10) - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_length_sums_all_parts() {
        let widths = FieldWidths::new(2, 2, 4, 5, 3).unwrap();
        assert_eq!(widths.entry_length(), 3 + 4 + 5 + 3);
        assert_eq!(widths.tag_length(), 3);
    }

    #[test]
    fn test_equality_is_structural() {
        let a = FieldWidths::new(1, 2, 3, 4, 5).unwrap();
        let b = FieldWidths::new(1, 2, 3, 4, 5).unwrap();
        let c = FieldWidths::new(1, 2, 3, 4, 6).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_rejects_identifier_length_above_two() {
        let result = FieldWidths::new(2, 3, 4, 5, 0);
        assert!(matches!(result, Err(Iso2709Error::InvalidWidths(_))));
    }

    #[test]
    fn test_rejects_zero_field_length_length() {
        assert!(FieldWidths::new(2, 1, 0, 5, 0).is_err());
        assert!(FieldWidths::new(2, 1, 4, 0, 0).is_err());
    }

    #[test]
    fn test_rejects_widths_above_nine() {
        assert!(FieldWidths::new(10, 1, 4, 5, 0).is_err());
        assert!(FieldWidths::new(2, 1, 4, 5, 10).is_err());
    }

    #[test]
    fn test_max_values() {
        let widths = FieldWidths::new(0, 0, 2, 3, 0).unwrap();
        assert_eq!(widths.max_field_length(), 99);
        assert_eq!(widths.max_field_start(), 999);
    }

    #[test]
    fn test_display() {
        let widths = FieldWidths::new(2, 1, 4, 5, 0).unwrap();
        assert_eq!(
            widths.to_string(),
            "(indicator_length=2, identifier_length=1, field_length_length=4, \
             field_start_length=5, impl_defined_part_length=0)"
        );
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: FieldWidths = serde_json::from_str(
            r#"{"indicator_length":2,"identifier_length":1,"field_length_length":4,
                "field_start_length":5,"impl_defined_part_length":0}"#,
        )
        .unwrap();
        assert_eq!(ok, FieldWidths::new(2, 1, 4, 5, 0).unwrap());

        let bad = serde_json::from_str::<FieldWidths>(
            r#"{"indicator_length":2,"identifier_length":7,"field_length_length":4,
                "field_start_length":5,"impl_defined_part_length":0}"#,
        );
        assert!(bad.is_err());
    }
}
