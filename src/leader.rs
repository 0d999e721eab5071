//! ISO 2709 record leader parsing and serialization.
//!
//! The leader is a 24-byte fixed-length header at the start of every record.
//! It describes the record's physical structure: total length, where the
//! data area begins, and the widths used by the directory and data fields.
//!
//! # Structure
//!
//! - Positions 0-4: Record length (5 digits)
//! - Position 5: Record status
//! - Positions 6-9: Implementation codes (format-specific meaning)
//! - Position 10: Indicator length (1 digit)
//! - Position 11: Identifier length (1 digit)
//! - Positions 12-16: Base address of data (5 digits)
//! - Positions 17-19: System characters
//! - Position 20: Length of the field length in directory entries
//! - Position 21: Length of the field start in directory entries
//! - Position 22: Length of the implementation-defined part of entries
//! - Position 23: Reserved

use crate::error::{Iso2709Error, Result};
use crate::field_widths::FieldWidths;
use crate::iso646::Iso646Buffer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of the leader in bytes.
pub const LEADER_LENGTH: usize = 24;

/// Smallest base address: leader followed by the directory terminator.
pub const MIN_BASE_ADDRESS: usize = LEADER_LENGTH + 1;

/// Largest base address the five leader digits can record.
pub const MAX_BASE_ADDRESS: usize = 99_999;

/// Smallest record: leader, directory terminator and record terminator.
pub const MIN_RECORD_LENGTH: usize = MIN_BASE_ADDRESS + 1;

/// Largest record length the five leader digits can record.
pub const MAX_RECORD_LENGTH: usize = 99_999;

/// Number of implementation codes.
pub const IMPL_CODES_LENGTH: usize = 4;

/// Number of system characters.
pub const SYSTEM_CHARS_LENGTH: usize = 3;

const RECORD_LENGTH_START: usize = 0;
const RECORD_LENGTH_LENGTH: usize = 5;
const RECORD_STATUS_POS: usize = 5;
const IMPL_CODES_START: usize = 6;
const INDICATOR_LENGTH_POS: usize = 10;
const IDENTIFIER_LENGTH_POS: usize = 11;
const BASE_ADDRESS_START: usize = 12;
const BASE_ADDRESS_LENGTH: usize = 5;
const SYSTEM_CHARS_START: usize = 17;
const FIELD_LENGTH_LENGTH_POS: usize = 20;
const FIELD_START_LENGTH_POS: usize = 21;
const IMPL_DEFINED_PART_LENGTH_POS: usize = 22;
const RESERVED_CHAR_POS: usize = 23;

const DEFAULT_CHAR: char = ' ';

/// ISO 2709 Leader - 24 bytes at the start of every record.
///
/// Serializing a leader produced by [`Leader::from_bytes`] reproduces the
/// exact bytes it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leader {
    /// Record length (5 digits) - positions 0-4
    pub record_length: u32,
    /// Record status (1 char) - position 5
    pub record_status: char,
    /// Implementation codes (4 chars) - positions 6-9
    pub impl_codes: String,
    /// Indicator length (1 digit) - position 10
    pub indicator_length: u8,
    /// Identifier length (1 digit) - position 11
    pub identifier_length: u8,
    /// Base address of data (5 digits) - positions 12-16
    pub base_address: u32,
    /// System characters (3 chars) - positions 17-19
    pub system_chars: String,
    /// Length of the field length (1 digit) - position 20
    pub field_length_length: u8,
    /// Length of the field start (1 digit) - position 21
    pub field_start_length: u8,
    /// Length of the implementation-defined part (1 digit) - position 22
    pub impl_defined_part_length: u8,
    /// Reserved (1 char) - position 23
    pub reserved_char: char,
}

impl Leader {
    /// Create the leader of an empty record laid out with `widths`.
    ///
    /// Record status, implementation codes, system characters and the
    /// reserved character are spaces.
    #[must_use]
    pub fn new(widths: &FieldWidths) -> Self {
        Leader {
            record_length: length_digits(MIN_RECORD_LENGTH),
            record_status: DEFAULT_CHAR,
            impl_codes: DEFAULT_CHAR.to_string().repeat(IMPL_CODES_LENGTH),
            indicator_length: width_digit(widths.indicator_length()),
            identifier_length: width_digit(widths.identifier_length()),
            base_address: length_digits(MIN_BASE_ADDRESS),
            system_chars: DEFAULT_CHAR.to_string().repeat(SYSTEM_CHARS_LENGTH),
            field_length_length: width_digit(widths.field_length_length()),
            field_start_length: width_digit(widths.field_start_length()),
            impl_defined_part_length: width_digit(widths.impl_defined_part_length()),
            reserved_char: DEFAULT_CHAR,
        }
    }

    /// Parse a leader from the first 24 bytes of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::InvalidLeader`] if fewer than 24 bytes are
    /// available, and propagates [`Iso2709Error::NotANumber`] and
    /// [`Iso2709Error::CharacterRange`] for malformed positions.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < LEADER_LENGTH {
            return Err(Iso2709Error::InvalidLeader(format!(
                "Leader must be at least {LEADER_LENGTH} bytes, got {}",
                bytes.len()
            )));
        }
        let buffer = Iso646Buffer::new(&bytes[..LEADER_LENGTH]);

        Ok(Leader {
            record_length: buffer.parse_digits_at(RECORD_LENGTH_START, RECORD_LENGTH_LENGTH)?,
            record_status: buffer.char_at(RECORD_STATUS_POS)?,
            impl_codes: buffer
                .chars_at(IMPL_CODES_START, IMPL_CODES_LENGTH)?
                .to_string(),
            indicator_length: buffer.parse_digit_at(INDICATOR_LENGTH_POS)?,
            identifier_length: buffer.parse_digit_at(IDENTIFIER_LENGTH_POS)?,
            base_address: buffer.parse_digits_at(BASE_ADDRESS_START, BASE_ADDRESS_LENGTH)?,
            system_chars: buffer
                .chars_at(SYSTEM_CHARS_START, SYSTEM_CHARS_LENGTH)?
                .to_string(),
            field_length_length: buffer.parse_digit_at(FIELD_LENGTH_LENGTH_POS)?,
            field_start_length: buffer.parse_digit_at(FIELD_START_LENGTH_POS)?,
            impl_defined_part_length: buffer.parse_digit_at(IMPL_DEFINED_PART_LENGTH_POS)?,
            reserved_char: buffer.char_at(RESERVED_CHAR_POS)?,
        })
    }

    /// Serialize the leader to its 24-byte form.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::InvalidLeader`] if the implementation codes
    /// or system characters have the wrong length,
    /// [`Iso2709Error::CharacterRange`] for characters outside the 7-bit
    /// repertoire and [`Iso2709Error::NumberTooLarge`] for numbers that do
    /// not fit their positions.
    pub fn as_bytes(&self) -> Result<Vec<u8>> {
        check_char_count("Implementation codes", &self.impl_codes, IMPL_CODES_LENGTH)?;
        check_char_count("System characters", &self.system_chars, SYSTEM_CHARS_LENGTH)?;

        let mut buffer = Iso646Buffer::with_capacity(LEADER_LENGTH);
        buffer.write_digits(self.record_length as usize, RECORD_LENGTH_LENGTH)?;
        buffer.write_char(self.record_status)?;
        buffer.write_chars(&self.impl_codes)?;
        buffer.write_digit(self.indicator_length)?;
        buffer.write_digit(self.identifier_length)?;
        buffer.write_digits(self.base_address as usize, BASE_ADDRESS_LENGTH)?;
        buffer.write_chars(&self.system_chars)?;
        buffer.write_digit(self.field_length_length)?;
        buffer.write_digit(self.field_start_length)?;
        buffer.write_digit(self.impl_defined_part_length)?;
        buffer.write_char(self.reserved_char)?;
        Ok(buffer.into_inner())
    }

    /// Field widths described by positions 10, 11 and 20-22.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::InvalidWidths`] if the leader holds widths
    /// the codec cannot work with.
    pub fn field_widths(&self) -> Result<FieldWidths> {
        FieldWidths::new(
            self.indicator_length,
            self.identifier_length,
            self.field_length_length,
            self.field_start_length,
            self.impl_defined_part_length,
        )
    }
}

impl fmt::Display for Leader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_bytes() {
            Ok(bytes) => f.write_str(&Iso646Buffer::new(bytes).render()),
            Err(_) => write!(f, "{self:?}"),
        }
    }
}

fn check_char_count(name: &str, value: &str, expected: usize) -> Result<()> {
    let count = value.chars().count();
    if count != expected {
        return Err(Iso2709Error::InvalidLeader(format!(
            "{name} must be {expected} characters, got {count}"
        )));
    }
    Ok(())
}

// Widths are validated by `FieldWidths` to be single digits.
fn width_digit(width: usize) -> u8 {
    u8::try_from(width).unwrap_or(u8::MAX)
}

fn length_digits(length: usize) -> u32 {
    u32::try_from(length).unwrap_or(u32::MAX)
}
