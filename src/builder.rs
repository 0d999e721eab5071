//! Encoding of ISO 2709 records.
//!
//! [`RecordBuilder`] accepts fields in the order the format requires: an
//! optional record identifier field, then reference fields, then data
//! fields. Each call validates its arguments immediately, so a rejected
//! field never reaches the record and the builder stays usable.
//!
//! # Examples
//!
//! ```
//! use iso2709::{FieldWidths, Record, RecordBuilder};
//!
//! let widths = FieldWidths::new(2, 1, 4, 5, 0)?;
//! let mut builder = RecordBuilder::new(widths);
//! builder.append_identifier_field("ID-1")?;
//! builder.start_data_field("245", "10")?;
//! builder.append_subfield("a", "Title")?;
//! builder.end_data_field()?;
//! let bytes = builder.build()?;
//!
//! let record = Record::new(&bytes)?;
//! assert_eq!(record.record_id()?.as_deref(), Some("ID-1"));
//! # Ok::<(), iso2709::Iso2709Error>(())
//! ```

use crate::directory::{DirectoryBuilder, EntryPart};
use crate::error::{Iso2709Error, Result};
use crate::field_widths::FieldWidths;
use crate::handler::FieldEvent;
use crate::iso646::Iso646Buffer;
use crate::leader::{
    Leader, IMPL_CODES_LENGTH, LEADER_LENGTH, MAX_BASE_ADDRESS, MAX_RECORD_LENGTH,
    SYSTEM_CHARS_LENGTH,
};
use crate::record::{FIELD_TERMINATOR, RECORD_TERMINATOR, SUBFIELD_MARKER};
use encoding_rs::{Encoding, UTF_8};
use lazy_static::lazy_static;
use regex::Regex;
use smallvec::SmallVec;
use std::borrow::Cow;
use std::fmt;

const ID_FIELD_TAG: &str = "001";
const BLANK: char = ' ';
const LENGTH_DIGITS: usize = 5;

lazy_static! {
    static ref REFERENCE_FIELD_TAG: Regex =
        Regex::new(r"^00[1-9a-zA-Z]$").expect("reference field tag pattern");
    static ref DATA_FIELD_TAG: Regex =
        Regex::new(r"^(?:0[1-9a-zA-Z][0-9a-zA-Z]|[1-9a-zA-Z][0-9a-zA-Z]{2})$")
            .expect("data field tag pattern");
}

/// Which fields may be appended next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AppendState {
    /// Fresh builder; the identifier field is still allowed.
    Empty,
    ReferenceFields,
    DataFields,
    InDataField,
    /// `build` was called; only `reset` is allowed.
    Built,
}

#[derive(Debug, Clone)]
struct DirectoryEntry {
    tag: String,
    impl_defined_part: String,
    part: EntryPart,
}

/// The data field currently being assembled.
#[derive(Debug, Clone)]
struct OpenField {
    tag: String,
    impl_defined_part: String,
    start: usize,
    previous_state: AppendState,
}

/// Builds records in ISO 2709 format.
///
/// A builder is reused across records: [`build`](Self::build) ends a
/// record and [`reset`](Self::reset) prepares the next one.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    widths: FieldWidths,
    leader: Leader,
    directory: DirectoryBuilder,
    entries: Vec<DirectoryEntry>,
    fields: Vec<u8>,
    open_field: Option<OpenField>,
    state: AppendState,
    charset: &'static Encoding,
    blank_impl_defined_part: String,
    blank_identifier: String,
}

impl RecordBuilder {
    /// Create a builder for records laid out with `widths`.
    #[must_use]
    pub fn new(widths: FieldWidths) -> Self {
        RecordBuilder {
            widths,
            leader: Leader::new(&widths),
            directory: DirectoryBuilder::new(widths),
            entries: Vec::new(),
            fields: Vec::new(),
            open_field: None,
            state: AppendState::Empty,
            charset: UTF_8,
            blank_impl_defined_part: blanks(widths.impl_defined_part_length()),
            blank_identifier: blanks(widths.identifier_length()),
        }
    }

    /// Field widths of the records produced by this builder.
    #[must_use]
    pub fn field_widths(&self) -> FieldWidths {
        self.widths
    }

    /// Set the character set used to encode field values.
    pub fn set_charset(&mut self, charset: &'static Encoding) {
        self.charset = charset;
    }

    /// Character set used to encode field values (UTF-8 unless changed).
    #[must_use]
    pub fn charset(&self) -> &'static Encoding {
        self.charset
    }

    /// Set the record status in the leader.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::InvalidArgument`] for characters outside the
    /// 7-bit repertoire and for information separators.
    pub fn set_record_status(&mut self, record_status: char) -> Result<()> {
        check_structural_char("Record status", record_status)?;
        self.leader.record_status = record_status;
        Ok(())
    }

    /// Set all four implementation codes in the leader.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::InvalidArgument`] if `impl_codes` does not
    /// hold exactly four valid characters.
    pub fn set_impl_codes(&mut self, impl_codes: &str) -> Result<()> {
        check_structural_chars("Implementation codes", impl_codes, IMPL_CODES_LENGTH)?;
        self.leader.impl_codes = impl_codes.to_string();
        Ok(())
    }

    /// Set the implementation code at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::InvalidArgument`] if `index` is not below 4
    /// or `value` is not a valid character.
    pub fn set_impl_code(&mut self, index: usize, value: char) -> Result<()> {
        check_structural_char("Implementation code", value)?;
        replace_char_at(&mut self.leader.impl_codes, index, value, "Implementation code")
    }

    /// Set all three system characters in the leader.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::InvalidArgument`] if `system_chars` does not
    /// hold exactly three valid characters.
    pub fn set_system_chars(&mut self, system_chars: &str) -> Result<()> {
        check_structural_chars("System characters", system_chars, SYSTEM_CHARS_LENGTH)?;
        self.leader.system_chars = system_chars.to_string();
        Ok(())
    }

    /// Set the system character at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::InvalidArgument`] if `index` is not below 3
    /// or `value` is not a valid character.
    pub fn set_system_char(&mut self, index: usize, value: char) -> Result<()> {
        check_structural_char("System character", value)?;
        replace_char_at(&mut self.leader.system_chars, index, value, "System character")
    }

    /// Set the reserved character in the leader.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::InvalidArgument`] for invalid characters.
    pub fn set_reserved_char(&mut self, reserved_char: char) -> Result<()> {
        check_structural_char("Reserved character", reserved_char)?;
        self.leader.reserved_char = reserved_char;
        Ok(())
    }

    /// Append the record identifier field (tag `001`) with a blank
    /// implementation-defined part.
    ///
    /// # Errors
    ///
    /// See [`append_identifier_field_with_impl`](Self::append_identifier_field_with_impl).
    pub fn append_identifier_field(&mut self, value: &str) -> Result<()> {
        let impl_defined_part = self.blank_impl_defined_part.clone();
        self.append_identifier_field_with_impl(&impl_defined_part, value)
    }

    /// Append the record identifier field (tag `001`).
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::IllegalState`] unless this is the first field
    /// of the record, plus the errors of
    /// [`append_reference_field_with_impl`](Self::append_reference_field_with_impl).
    pub fn append_identifier_field_with_impl(
        &mut self,
        impl_defined_part: &str,
        value: &str,
    ) -> Result<()> {
        if self.state != AppendState::Empty {
            return Err(self.illegal_state("the identifier field must be the first field"));
        }
        self.append_reference_field_with_impl(ID_FIELD_TAG, impl_defined_part, value)
    }

    /// Append a reference field with a blank implementation-defined part.
    ///
    /// # Errors
    ///
    /// See [`append_reference_field_with_impl`](Self::append_reference_field_with_impl).
    pub fn append_reference_field(&mut self, tag: &str, value: &str) -> Result<()> {
        let impl_defined_part = self.blank_impl_defined_part.clone();
        self.append_reference_field_with_impl(tag, &impl_defined_part, value)
    }

    /// Append a reference field.
    ///
    /// # Errors
    ///
    /// Returns
    /// - [`Iso2709Error::IllegalState`] inside a data field, after data
    ///   fields or after [`build`](Self::build),
    /// - [`Iso2709Error::InvalidTag`] unless `tag` matches `00[1-9a-zA-Z]`,
    /// - [`Iso2709Error::InvalidArgument`] for a malformed
    ///   implementation-defined part or a value containing terminators,
    /// - [`Iso2709Error::Encoding`] if the value cannot be encoded,
    /// - [`Iso2709Error::UnrepresentableLength`] if the record layout can
    ///   no longer be expressed with the configured widths.
    pub fn append_reference_field_with_impl(
        &mut self,
        tag: &str,
        impl_defined_part: &str,
        value: &str,
    ) -> Result<()> {
        match self.state {
            AppendState::Empty | AppendState::ReferenceFields => {}
            AppendState::DataFields => {
                return Err(self.illegal_state("reference fields must precede data fields"))
            }
            _ => return Err(self.illegal_state("cannot append a reference field")),
        }
        check_tag(&REFERENCE_FIELD_TAG, tag)?;
        self.check_impl_defined_part(impl_defined_part)?;
        let encoded = self.encode_value(value, &[FIELD_TERMINATOR, RECORD_TERMINATOR])?;

        let start = self.fields.len();
        self.fields.extend_from_slice(&encoded);
        self.fields.push(FIELD_TERMINATOR);
        self.commit_field(tag, impl_defined_part, start)?;
        self.state = AppendState::ReferenceFields;
        Ok(())
    }

    /// Start a data field with a blank implementation-defined part.
    ///
    /// # Errors
    ///
    /// See [`start_data_field_with_impl`](Self::start_data_field_with_impl).
    pub fn start_data_field(&mut self, tag: &str, indicators: &str) -> Result<()> {
        let impl_defined_part = self.blank_impl_defined_part.clone();
        self.start_data_field_with_impl(tag, indicators, &impl_defined_part)
    }

    /// Start a data field with blank indicators and a blank
    /// implementation-defined part.
    ///
    /// # Errors
    ///
    /// See [`start_data_field_with_impl`](Self::start_data_field_with_impl).
    pub fn start_data_field_blank(&mut self, tag: &str) -> Result<()> {
        let indicators = blanks(self.widths.indicator_length());
        self.start_data_field(tag, &indicators)
    }

    /// Start a data field. Subfields follow through
    /// [`append_subfield`](Self::append_subfield) until
    /// [`end_data_field`](Self::end_data_field).
    ///
    /// # Errors
    ///
    /// Returns
    /// - [`Iso2709Error::IllegalState`] inside a data field or after
    ///   [`build`](Self::build),
    /// - [`Iso2709Error::InvalidTag`] for tags that are not data field tags,
    /// - [`Iso2709Error::InvalidArgument`] if the indicators or the
    ///   implementation-defined part have the wrong length or invalid
    ///   characters.
    pub fn start_data_field_with_impl(
        &mut self,
        tag: &str,
        indicators: &str,
        impl_defined_part: &str,
    ) -> Result<()> {
        if matches!(self.state, AppendState::InDataField | AppendState::Built) {
            return Err(self.illegal_state("cannot start a data field"));
        }
        check_tag(&DATA_FIELD_TAG, tag)?;
        check_structural_chars("Indicators", indicators, self.widths.indicator_length())?;
        self.check_impl_defined_part(impl_defined_part)?;

        self.open_field = Some(OpenField {
            tag: tag.to_string(),
            impl_defined_part: impl_defined_part.to_string(),
            start: self.fields.len(),
            previous_state: self.state,
        });
        self.fields.extend_from_slice(indicators.as_bytes());
        self.state = AppendState::InDataField;
        Ok(())
    }

    /// Append a subfield to the current data field.
    ///
    /// With an identifier length of 0 no subfield marker is written,
    /// `identifier` must be empty and `value` may contain subfield markers.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::IllegalState`] outside a data field,
    /// [`Iso2709Error::InvalidArgument`] if the identifier has the wrong
    /// length or the value contains separators, and
    /// [`Iso2709Error::Encoding`] if the value cannot be encoded.
    pub fn append_subfield(&mut self, identifier: &str, value: &str) -> Result<()> {
        if self.state != AppendState::InDataField {
            return Err(self.illegal_state("subfields must be appended inside a data field"));
        }
        check_structural_chars("Identifier", identifier, self.widths.identifier_length())?;
        // Without identifiers the decoder returns the whole remainder, markers included.
        let forbidden: &[u8] = if self.widths.identifier_length() == 0 {
            &[FIELD_TERMINATOR, RECORD_TERMINATOR]
        } else {
            &[FIELD_TERMINATOR, RECORD_TERMINATOR, SUBFIELD_MARKER]
        };
        let encoded = self.encode_value(value, forbidden)?;
        if self.widths.identifier_length() > 0 {
            self.fields.push(SUBFIELD_MARKER);
            self.fields.extend_from_slice(identifier.as_bytes());
        }
        self.fields.extend_from_slice(&encoded);
        Ok(())
    }

    /// Append a subfield with a blank identifier.
    ///
    /// # Errors
    ///
    /// See [`append_subfield`](Self::append_subfield).
    pub fn append_unidentified_subfield(&mut self, value: &str) -> Result<()> {
        let identifier = self.blank_identifier.clone();
        self.append_subfield(&identifier, value)
    }

    /// Close the current data field and add it to the directory.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::IllegalState`] outside a data field and
    /// [`Iso2709Error::UnrepresentableLength`] if the field does not fit the
    /// record layout. In the latter case the field is discarded.
    pub fn end_data_field(&mut self) -> Result<()> {
        if self.state != AppendState::InDataField {
            return Err(self.illegal_state("no data field to end"));
        }
        let Some(field) = self.open_field.take() else {
            return Err(self.illegal_state("no data field to end"));
        };
        self.fields.push(FIELD_TERMINATOR);
        match self.commit_field(&field.tag, &field.impl_defined_part, field.start) {
            Ok(()) => {
                self.state = AppendState::DataFields;
                Ok(())
            }
            Err(e) => {
                self.state = field.previous_state;
                Err(e)
            }
        }
    }

    /// Re-encode a sequence of decoded field events.
    ///
    /// Continuation entries are laid out anew, so
    /// [`FieldEvent::ExtraImplPart`] events are skipped.
    ///
    /// # Errors
    ///
    /// Propagates the error of the first rejected event.
    pub fn append_events(&mut self, events: &[FieldEvent]) -> Result<()> {
        for event in events {
            match event {
                FieldEvent::Reference {
                    tag,
                    impl_defined_part,
                    value,
                } => self.append_reference_field_with_impl(tag, impl_defined_part, value)?,
                FieldEvent::DataStart {
                    tag,
                    impl_defined_part,
                    indicators,
                } => self.start_data_field_with_impl(tag, indicators, impl_defined_part)?,
                FieldEvent::Data { identifier, value } => self.append_subfield(identifier, value)?,
                FieldEvent::DataEnd => self.end_data_field()?,
                FieldEvent::ExtraImplPart(part) => {
                    log::trace!("ignoring continuation entry part {part:?}");
                }
            }
        }
        Ok(())
    }

    /// Assemble the record.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::IllegalState`] inside a data field or if the
    /// record was already built since the last [`reset`](Self::reset).
    pub fn build(&mut self) -> Result<Vec<u8>> {
        match self.state {
            AppendState::InDataField => {
                return Err(self.illegal_state("cannot build inside a data field"))
            }
            AppendState::Built => {
                return Err(self.illegal_state("record was already built, call reset"))
            }
            _ => {}
        }
        let base_address = LEADER_LENGTH + self.directory.length();
        let record_length = base_address + self.fields.len() + 1;
        self.leader.base_address = length_to_u32(base_address, "base address")?;
        self.leader.record_length = length_to_u32(record_length, "record length")?;

        let mut buffer = Iso646Buffer::with_capacity(record_length);
        buffer.write_bytes(&self.leader.as_bytes()?)?;
        for entry in &self.entries {
            self.directory
                .write_entry(&mut buffer, &entry.tag, &entry.impl_defined_part, entry.part)?;
        }
        buffer.write_byte(FIELD_TERMINATOR)?;
        buffer.write_bytes(&self.fields)?;
        buffer.write_byte(RECORD_TERMINATOR)?;

        log::debug!(
            "built record of {record_length} bytes with {} directory entries",
            self.entries.len()
        );
        self.state = AppendState::Built;
        Ok(buffer.into_inner())
    }

    /// Discard all fields and restore the default leader.
    pub fn reset(&mut self) {
        self.leader = Leader::new(&self.widths);
        self.directory.reset();
        self.entries.clear();
        self.fields.clear();
        self.open_field = None;
        self.state = AppendState::Empty;
    }

    /// Lay out the field in `fields[start..]` and add its entries, or drop
    /// the field bytes if the record could no longer be represented.
    fn commit_field(&mut self, tag: &str, impl_defined_part: &str, start: usize) -> Result<()> {
        match self.plan_field(start) {
            Ok(parts) => {
                if parts.len() > 1 {
                    log::debug!("field {tag} spans {} directory entries", parts.len());
                }
                self.directory.commit(parts.len());
                self.entries.extend(parts.into_iter().map(|part| DirectoryEntry {
                    tag: tag.to_string(),
                    impl_defined_part: impl_defined_part.to_string(),
                    part,
                }));
                Ok(())
            }
            Err(e) => {
                log::debug!("discarding field {tag}: {e}");
                self.fields.truncate(start);
                Err(e)
            }
        }
    }

    fn plan_field(&self, start: usize) -> Result<SmallVec<[EntryPart; 1]>> {
        let parts = self.directory.plan(start, self.fields.len() - start)?;
        let entry_count = self.directory.entry_count() + parts.len();
        let base_address = LEADER_LENGTH + self.directory.length_with(entry_count);
        if base_address > MAX_BASE_ADDRESS {
            return Err(Iso2709Error::UnrepresentableLength {
                what: "base address",
                value: base_address,
                digits: LENGTH_DIGITS,
            });
        }
        let record_length = base_address + self.fields.len() + 1;
        if record_length > MAX_RECORD_LENGTH {
            return Err(Iso2709Error::UnrepresentableLength {
                what: "record length",
                value: record_length,
                digits: LENGTH_DIGITS,
            });
        }
        Ok(parts)
    }

    fn encode_value<'v>(&self, value: &'v str, forbidden: &[u8]) -> Result<Cow<'v, [u8]>> {
        let (encoded, _, had_errors) = self.charset.encode(value);
        if had_errors {
            return Err(Iso2709Error::Encoding(format!(
                "{value:?} cannot be represented in {}",
                self.charset.name()
            )));
        }
        if let Some(byte) = encoded.iter().find(|byte| forbidden.contains(byte)) {
            return Err(Iso2709Error::InvalidArgument(format!(
                "Value {value:?} contains the separator 0x{byte:02x}"
            )));
        }
        Ok(encoded)
    }

    fn check_impl_defined_part(&self, impl_defined_part: &str) -> Result<()> {
        check_structural_chars(
            "Implementation-defined part",
            impl_defined_part,
            self.widths.impl_defined_part_length(),
        )
    }

    fn illegal_state(&self, message: &str) -> Iso2709Error {
        Iso2709Error::IllegalState(format!("{message} (state: {:?})", self.state))
    }
}

impl fmt::Display for RecordBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "leader: {}", self.leader)?;
        f.write_str("directory:")?;
        for entry in &self.entries {
            write!(
                f,
                " {}/{}/{}/{}",
                entry.tag, entry.part.length, entry.part.start, entry.impl_defined_part
            )?;
        }
        writeln!(f)?;
        write!(f, "fields: {}", Iso646Buffer::new(&self.fields[..]))
    }
}

fn blanks(count: usize) -> String {
    BLANK.to_string().repeat(count)
}

fn check_tag(pattern: &Regex, tag: &str) -> Result<()> {
    if pattern.is_match(tag) {
        Ok(())
    } else {
        Err(Iso2709Error::InvalidTag(tag.to_string()))
    }
}

/// 7-bit characters other than the information separators.
fn check_structural_char(what: &str, value: char) -> Result<()> {
    let valid = value.is_ascii()
        && ![FIELD_TERMINATOR, RECORD_TERMINATOR, SUBFIELD_MARKER]
            .iter()
            .any(|&separator| char::from(separator) == value);
    if valid {
        Ok(())
    } else {
        Err(Iso2709Error::InvalidArgument(format!(
            "{what} must be a 7-bit character other than a separator, got {value:?}"
        )))
    }
}

fn check_structural_chars(what: &str, value: &str, expected_length: usize) -> Result<()> {
    for c in value.chars() {
        check_structural_char(what, c)?;
    }
    if value.len() != expected_length {
        return Err(Iso2709Error::InvalidArgument(format!(
            "{what} must have {expected_length} characters, got {value:?}"
        )));
    }
    Ok(())
}

fn replace_char_at(target: &mut String, index: usize, value: char, what: &str) -> Result<()> {
    // Leader strings only ever hold 7-bit characters, so byte and char
    // indices coincide.
    if index >= target.len() {
        return Err(Iso2709Error::InvalidArgument(format!(
            "{what} index {index} is out of range"
        )));
    }
    let mut buf = [0u8; 4];
    target.replace_range(index..=index, value.encode_utf8(&mut buf));
    Ok(())
}

fn length_to_u32(value: usize, what: &'static str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Iso2709Error::UnrepresentableLength {
        what,
        value,
        digits: LENGTH_DIGITS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use encoding_rs::WINDOWS_1252;

    fn marc_like() -> RecordBuilder {
        RecordBuilder::new(FieldWidths::new(2, 1, 4, 5, 0).unwrap())
    }

    fn short_entries() -> RecordBuilder {
        RecordBuilder::new(FieldWidths::new(2, 1, 2, 3, 2).unwrap())
    }

    #[test]
    fn test_build_empty_record() {
        let bytes = marc_like().build().unwrap();
        assert_eq!(bytes, b"00026     2100025   450 \x1e\x1d".to_vec());
    }

    #[test]
    fn test_build_identifier_field() {
        let mut builder = RecordBuilder::new(FieldWidths::new(0, 0, 1, 1, 0).unwrap());
        builder.append_identifier_field("ID").unwrap();
        let bytes = builder.build().unwrap();
        assert_eq!(
            bytes,
            b"00034     0000030   110 00130\x1eID\x1e\x1d".to_vec()
        );
    }

    #[test]
    fn test_leader_setters() {
        let mut builder = marc_like();
        builder.set_record_status('n').unwrap();
        builder.set_impl_codes("am  ").unwrap();
        builder.set_impl_code(3, 'x').unwrap();
        builder.set_system_chars("a  ").unwrap();
        builder.set_system_char(2, 'z').unwrap();
        builder.set_reserved_char('0').unwrap();
        let bytes = builder.build().unwrap();
        assert_eq!(&bytes[..24], b"00026nam x2100025a z4500");
    }

    #[test]
    fn test_leader_setters_reject_invalid_chars() {
        let mut builder = marc_like();
        assert!(builder.set_record_status('\u{1d}').is_err());
        assert!(builder.set_record_status('ü').is_err());
        assert!(builder.set_reserved_char('\u{1f}').is_err());
        assert!(builder.set_impl_codes("abc").is_err());
        assert!(builder.set_impl_codes("ab\u{1e}c").is_err());
        assert!(builder.set_impl_code(4, 'a').is_err());
        assert!(builder.set_system_chars("abcd").is_err());
        assert!(builder.set_system_char(3, 'a').is_err());
    }

    #[test]
    fn test_continuation_entries_for_long_fields() {
        let mut builder = short_entries();
        builder.start_data_field("020", "AB").unwrap();
        builder.append_subfield("a", &"x".repeat(60)).unwrap();
        builder.append_subfield("b", &"y".repeat(60)).unwrap();
        builder.end_data_field().unwrap();
        let bytes = builder.build().unwrap();

        assert_eq!(&bytes[12..17], b"00045");
        assert_eq!(&bytes[24..45], b"02000000  02028099  \x1e");

        let events = Record::new(&bytes).unwrap().events().unwrap();
        assert_eq!(events.len(), 5);
        assert_eq!(
            events[2],
            FieldEvent::Data {
                identifier: "b".to_string(),
                value: "y".repeat(60),
            }
        );
        assert_eq!(events[4], FieldEvent::ExtraImplPart("  ".to_string()));
    }

    #[test]
    fn test_identifier_field_only_first() {
        let mut builder = marc_like();
        builder.append_reference_field("003", "XYZ").unwrap();
        assert!(matches!(
            builder.append_identifier_field("ID"),
            Err(Iso2709Error::IllegalState(_))
        ));
    }

    #[test]
    fn test_reference_field_after_data_field_fails() {
        let mut builder = marc_like();
        builder.start_data_field("245", "10").unwrap();
        builder.end_data_field().unwrap();
        assert!(matches!(
            builder.append_reference_field("003", "XYZ"),
            Err(Iso2709Error::IllegalState(_))
        ));
    }

    #[test]
    fn test_calls_outside_data_field_fail() {
        let mut builder = marc_like();
        assert!(matches!(
            builder.append_subfield("a", "x"),
            Err(Iso2709Error::IllegalState(_))
        ));
        assert!(matches!(
            builder.end_data_field(),
            Err(Iso2709Error::IllegalState(_))
        ));
    }

    #[test]
    fn test_calls_inside_data_field_fail() {
        let mut builder = marc_like();
        builder.start_data_field("245", "10").unwrap();
        assert!(matches!(
            builder.start_data_field("246", "10"),
            Err(Iso2709Error::IllegalState(_))
        ));
        assert!(matches!(
            builder.append_reference_field("003", "XYZ"),
            Err(Iso2709Error::IllegalState(_))
        ));
        assert!(matches!(builder.build(), Err(Iso2709Error::IllegalState(_))));
    }

    #[test]
    fn test_build_only_once_per_cycle() {
        let mut builder = marc_like();
        builder.append_identifier_field("1").unwrap();
        let first = builder.build().unwrap();
        assert!(matches!(builder.build(), Err(Iso2709Error::IllegalState(_))));
        assert!(builder.append_reference_field("003", "X").is_err());

        builder.reset();
        builder.append_identifier_field("1").unwrap();
        assert_eq!(builder.build().unwrap(), first);
    }

    #[test]
    fn test_reset_restores_default_leader() {
        let mut builder = marc_like();
        builder.set_record_status('c').unwrap();
        builder.append_identifier_field("1").unwrap();
        builder.reset();
        assert_eq!(
            builder.build().unwrap(),
            b"00026     2100025   450 \x1e\x1d".to_vec()
        );
    }

    #[test]
    fn test_tags_are_validated() {
        let mut builder = marc_like();
        assert!(matches!(
            builder.append_reference_field("010", "x"),
            Err(Iso2709Error::InvalidTag(_))
        ));
        assert!(builder.append_reference_field("000", "x").is_err());
        assert!(builder.append_reference_field("00a", "x").is_ok());
        assert!(matches!(
            builder.start_data_field("002", "  "),
            Err(Iso2709Error::InvalidTag(_))
        ));
        assert!(builder.start_data_field("01", "  ").is_err());
        assert!(builder.start_data_field("0A1", "  ").is_ok());
    }

    #[test]
    fn test_structural_arguments_are_validated() {
        let mut builder = short_entries();
        assert!(matches!(
            builder.start_data_field("245", "1"),
            Err(Iso2709Error::InvalidArgument(_))
        ));
        assert!(builder.start_data_field_with_impl("245", "10", "X").is_err());
        builder.start_data_field("245", "10").unwrap();
        assert!(matches!(
            builder.append_subfield("ab", "x"),
            Err(Iso2709Error::InvalidArgument(_))
        ));
        assert!(builder.append_subfield("a", "x\u{1f}y").is_err());
        assert!(builder.append_subfield("a", "x\u{1e}y").is_err());
    }

    #[test]
    fn test_defaults_are_blank() {
        let mut builder = short_entries();
        builder.start_data_field_blank("245").unwrap();
        builder.append_unidentified_subfield("v").unwrap();
        builder.end_data_field().unwrap();
        let events = Record::new(&builder.build().unwrap())
            .unwrap()
            .events()
            .unwrap();
        assert_eq!(
            events,
            vec![
                FieldEvent::DataStart {
                    tag: "245".to_string(),
                    impl_defined_part: "  ".to_string(),
                    indicators: "  ".to_string(),
                },
                FieldEvent::Data {
                    identifier: " ".to_string(),
                    value: "v".to_string(),
                },
                FieldEvent::DataEnd,
            ]
        );
    }

    #[test]
    fn test_unrepresentable_field_is_discarded() {
        let mut builder = RecordBuilder::new(FieldWidths::new(0, 1, 1, 1, 0).unwrap());
        assert!(matches!(
            builder.append_reference_field("002", &"x".repeat(20)),
            Err(Iso2709Error::UnrepresentableLength { what: "field start", .. })
        ));
        builder.append_reference_field("002", "abc").unwrap();
        let bytes = builder.build().unwrap();
        assert_eq!(
            Record::new(&bytes).unwrap().events().unwrap(),
            vec![FieldEvent::Reference {
                tag: "002".to_string(),
                impl_defined_part: String::new(),
                value: "abc".to_string(),
            }]
        );
    }

    #[test]
    fn test_failed_data_field_leaves_record_clean() {
        let mut builder = RecordBuilder::new(FieldWidths::new(0, 1, 1, 1, 0).unwrap());
        builder.start_data_field("245", "").unwrap();
        builder.append_subfield("a", &"x".repeat(30)).unwrap();
        assert!(builder.end_data_field().is_err());
        // The builder is back at the start and accepts an identifier field.
        builder.append_identifier_field("1").unwrap();
        builder.reset();
        assert_eq!(&builder.build().unwrap()[24..], b"\x1e\x1d");
    }

    #[test]
    fn test_record_length_limit() {
        let mut builder = RecordBuilder::new(FieldWidths::new(0, 0, 5, 5, 0).unwrap());
        assert!(matches!(
            builder.append_reference_field("002", &"x".repeat(99_990)),
            Err(Iso2709Error::UnrepresentableLength { what: "record length", .. })
        ));
    }

    #[test]
    fn test_charset_is_used_for_values() {
        let mut builder = RecordBuilder::new(FieldWidths::new(0, 0, 1, 1, 0).unwrap());
        builder.set_charset(WINDOWS_1252);
        assert_eq!(builder.charset(), WINDOWS_1252);
        assert!(matches!(
            builder.append_identifier_field("✓"),
            Err(Iso2709Error::Encoding(_))
        ));
        builder.append_identifier_field("ü").unwrap();
        let bytes = builder.build().unwrap();
        assert_eq!(&bytes[30..32], b"\xfc\x1e");
    }

    #[test]
    fn test_without_identifiers_no_marker_is_written() {
        let mut builder = RecordBuilder::new(FieldWidths::new(1, 0, 2, 2, 0).unwrap());
        builder.start_data_field("100", "1").unwrap();
        builder.append_subfield("", "abc").unwrap();
        builder.end_data_field().unwrap();
        let bytes = builder.build().unwrap();
        assert_eq!(&bytes[32..], b"1abc\x1e\x1d");
    }

    #[test]
    fn test_without_identifiers_markers_in_values_round_trip() {
        let original = b"00038SIMPL1000030SYS110R10070\x1e1abc\x1fd\x1e\x1d";
        let record = Record::new(original).unwrap();
        let events = record.events().unwrap();
        assert_eq!(
            events[1],
            FieldEvent::Data {
                identifier: String::new(),
                value: "abc\u{1f}d".to_string(),
            }
        );

        let mut builder = RecordBuilder::new(record.field_widths());
        builder.set_record_status(record.record_status()).unwrap();
        builder.set_impl_codes(record.impl_codes()).unwrap();
        builder.set_system_chars(record.system_chars()).unwrap();
        builder.set_reserved_char(record.reserved_char()).unwrap();
        builder.append_events(&events).unwrap();
        assert_eq!(builder.build().unwrap(), original.to_vec());
    }

    #[test]
    fn test_append_events_reproduces_record() {
        let mut builder = short_entries();
        builder.append_identifier_field_with_impl("XY", "ID").unwrap();
        builder.start_data_field("020", "AB").unwrap();
        builder.append_subfield("a", &"x".repeat(120)).unwrap();
        builder.end_data_field().unwrap();
        let original = builder.build().unwrap();

        let events = Record::new(&original).unwrap().events().unwrap();
        builder.reset();
        builder.append_events(&events).unwrap();
        assert_eq!(builder.build().unwrap(), original);
    }

    #[test]
    fn test_display() {
        let mut builder = RecordBuilder::new(FieldWidths::new(0, 0, 1, 1, 0).unwrap());
        builder.append_identifier_field("ID").unwrap();
        let rendered = builder.to_string();
        assert!(rendered.starts_with("leader: 00026"));
        assert!(rendered.contains("directory: 001/3/0/"));
        assert!(rendered.ends_with("fields: ID\u{1e}"));
    }
}
