//! Decoding of ISO 2709 records.
//!
//! [`Record`] wraps the bytes of one record, validates its physical
//! structure and drives a [`FieldHandler`] across its fields. Fields whose
//! directory entries form a continuation group are reported once, followed
//! by the implementation-defined parts of the additional entries.
//!
//! # Examples
//!
//! ```
//! use iso2709::{FieldEvent, Record};
//!
//! let data = b"00051SIMPL2100035SYS110R0116001296\x1eAB\x1fX1\x1eCD\x1fY2\x1fZ3\x1e\x1d";
//! let record = Record::new(data)?;
//! let events = record.events()?;
//!
//! assert_eq!(events.len(), 7);
//! assert_eq!(
//!     events[1],
//!     FieldEvent::Data { identifier: "X".to_string(), value: "1".to_string() }
//! );
//! # Ok::<(), iso2709::Iso2709Error>(())
//! ```

use crate::directory::DirectoryCursor;
use crate::error::{Iso2709Error, Result};
use crate::field_widths::FieldWidths;
use crate::handler::{FieldEvent, FieldHandler};
use crate::iso646::Iso646Buffer;
use crate::leader::{Leader, LEADER_LENGTH, MIN_BASE_ADDRESS, MIN_RECORD_LENGTH};
use encoding_rs::{Encoding, UTF_8};
use smallvec::SmallVec;
use std::borrow::Cow;

/// Terminates the directory and every field value.
pub const FIELD_TERMINATOR: u8 = 0x1E;
/// Terminates a record.
pub const RECORD_TERMINATOR: u8 = 0x1D;
/// Precedes every subfield identifier in data fields.
pub const SUBFIELD_MARKER: u8 = 0x1F;

const DATA_SEPARATORS: [u8; 2] = [FIELD_TERMINATOR, SUBFIELD_MARKER];

/// Decode `bytes` and report its fields to `handler`.
///
/// An empty input is not a record and is accepted as a no-op.
///
/// # Errors
///
/// See [`Record::new`] and [`Record::process_fields`].
pub fn decode<H: FieldHandler + ?Sized>(bytes: &[u8], handler: &mut H) -> Result<()> {
    if bytes.is_empty() {
        log::trace!("skipping empty input");
        return Ok(());
    }
    Record::new(bytes)?.process_fields(handler)
}

/// Decoding view of one ISO 2709 record.
///
/// The record borrows its bytes and keeps no field values: every call to
/// [`process_fields`](Self::process_fields) walks the directory afresh.
#[derive(Debug, Clone)]
pub struct Record<'a> {
    data: &'a [u8],
    buffer: Iso646Buffer<&'a [u8]>,
    leader: Leader,
    widths: FieldWidths,
    base_address: usize,
    directory_end: usize,
    record_id_start: Option<usize>,
    charset: &'static Encoding,
}

impl<'a> Record<'a> {
    /// Validate the structure of `data` and prepare it for decoding.
    ///
    /// # Errors
    ///
    /// Returns
    /// - [`Iso2709Error::RecordTooShort`] if `data` is shorter than 26 bytes,
    /// - [`Iso2709Error::InvalidWidths`] if the leader holds unusable widths,
    /// - [`Iso2709Error::InvalidRecord`] if the base address is out of range,
    ///   the directory is not terminated, or its length is not a multiple
    ///   of the entry length,
    /// - any error raised while parsing the leader or the directory.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        if data.len() < MIN_RECORD_LENGTH {
            return Err(Iso2709Error::RecordTooShort {
                length: data.len(),
                minimum: MIN_RECORD_LENGTH,
            });
        }
        let leader = Leader::from_bytes(data)?;
        let widths = leader.field_widths()?;

        let base_address = leader.base_address as usize;
        if base_address < MIN_BASE_ADDRESS || base_address > data.len() - 1 {
            return Err(Iso2709Error::InvalidRecord(format!(
                "Base address {base_address} is out of range for a record of {} bytes",
                data.len()
            )));
        }
        let directory_end = base_address - 1;
        if data[directory_end] != FIELD_TERMINATOR {
            return Err(Iso2709Error::InvalidRecord(format!(
                "Directory is not terminated at offset {directory_end}"
            )));
        }
        let directory_length = directory_end - LEADER_LENGTH;
        if directory_length % widths.entry_length() != 0 {
            return Err(Iso2709Error::InvalidRecord(format!(
                "Directory length {directory_length} is not a multiple of the entry length {}",
                widths.entry_length()
            )));
        }

        let mut record = Record {
            data,
            buffer: Iso646Buffer::new(data),
            leader,
            widths,
            base_address,
            directory_end,
            record_id_start: None,
            charset: UTF_8,
        };
        record.record_id_start = record.find_record_id_start()?;
        Ok(record)
    }

    fn find_record_id_start(&self) -> Result<Option<usize>> {
        let mut cursor = self.directory();
        while !cursor.at_end() {
            if cursor.is_record_id_field()? {
                return Ok(Some(cursor.field_start()?));
            }
            cursor.advance();
        }
        Ok(None)
    }

    /// Use `charset` to decode field values.
    #[must_use]
    pub fn with_charset(mut self, charset: &'static Encoding) -> Self {
        self.charset = charset;
        self
    }

    /// Set the character set used to decode field values (UTF-8 unless
    /// changed).
    pub fn set_charset(&mut self, charset: &'static Encoding) {
        self.charset = charset;
    }

    /// Character set used to decode field values.
    #[must_use]
    pub fn charset(&self) -> &'static Encoding {
        self.charset
    }

    /// The parsed leader.
    #[must_use]
    pub fn leader(&self) -> &Leader {
        &self.leader
    }

    /// Field widths declared by the leader.
    #[must_use]
    pub fn field_widths(&self) -> FieldWidths {
        self.widths
    }

    /// Offset of the data area.
    #[must_use]
    pub fn base_address(&self) -> usize {
        self.base_address
    }

    /// Record status from the leader.
    #[must_use]
    pub fn record_status(&self) -> char {
        self.leader.record_status
    }

    /// Implementation codes from the leader.
    #[must_use]
    pub fn impl_codes(&self) -> &str {
        &self.leader.impl_codes
    }

    /// System characters from the leader.
    #[must_use]
    pub fn system_chars(&self) -> &str {
        &self.leader.system_chars
    }

    /// Reserved character from the leader.
    #[must_use]
    pub fn reserved_char(&self) -> char {
        self.leader.reserved_char
    }

    /// The raw record bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// A cursor positioned at the first directory entry.
    #[must_use]
    pub fn directory(&self) -> DirectoryCursor<'_, &'a [u8]> {
        DirectoryCursor::new(&self.buffer, &self.widths, self.directory_end)
    }

    /// Check that the declared record length matches the number of bytes
    /// and that the record ends with the record terminator.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::InvalidRecord`] describing the mismatch.
    pub fn validate_length(&self) -> Result<()> {
        let declared = self.leader.record_length as usize;
        if declared != self.buffer.len() {
            return Err(Iso2709Error::InvalidRecord(format!(
                "Record length in leader is {declared}, actual length is {}",
                self.buffer.len()
            )));
        }
        let last = self.buffer.byte_at(self.buffer.len() - 1)?;
        if last != RECORD_TERMINATOR {
            return Err(Iso2709Error::InvalidRecord(format!(
                "Record must end with a record terminator but found 0x{last:02x}"
            )));
        }
        Ok(())
    }

    /// Value of the first field tagged `001`, if the record has one.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::InvalidRecord`] if the field starts outside
    /// the record.
    pub fn record_id(&self) -> Result<Option<Cow<'a, str>>> {
        let Some(field_start) = self.record_id_start else {
            return Ok(None);
        };
        let start = self.data_offset("001", field_start)?;
        let length = self.buffer.distance_to_any(&DATA_SEPARATORS, start);
        let bytes = &self.data[start..start + length];
        let (value, _had_errors) = self.charset.decode_without_bom_handling(bytes);
        Ok(Some(value))
    }

    /// Report all fields of the record to `handler`, in directory order.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::InvalidRecord`] for fields that start outside
    /// the record, are not terminated, are shorter than their indicators or
    /// have malformed subfields, and propagates directory parsing errors.
    /// Events already delivered before an error must be discarded by the
    /// caller.
    pub fn process_fields<H: FieldHandler + ?Sized>(&self, handler: &mut H) -> Result<()> {
        let mut cursor = self.directory();
        let mut extra_parts: SmallVec<[&str; 2]> = SmallVec::new();

        while !cursor.at_end() {
            let tag = cursor.tag()?;
            let impl_defined_part = cursor.impl_defined_part()?;
            let field_start = cursor.field_start()?;
            let is_reference = cursor.is_reference_field()?;
            let mut continued = cursor.is_continued()?;
            cursor.advance();

            extra_parts.clear();
            while continued && !cursor.at_end() && cursor.tag()? == tag {
                extra_parts.push(cursor.impl_defined_part()?);
                continued = cursor.is_continued()?;
                cursor.advance();
            }
            if !extra_parts.is_empty() {
                log::debug!(
                    "field {tag} continues over {} additional directory entries",
                    extra_parts.len()
                );
            }

            let start = self.data_offset(tag, field_start)?;
            let length = self.buffer.distance_to(FIELD_TERMINATOR, start);
            if start + length >= self.buffer.len() {
                return Err(Iso2709Error::InvalidRecord(format!(
                    "Field {tag} at offset {start} is not terminated"
                )));
            }
            log::trace!("decoding field {tag} at offset {start} ({length} bytes)");

            if is_reference {
                let value = self.buffer.string_at(start, length, self.charset)?;
                handler.reference_field(tag, impl_defined_part, &value);
            } else {
                self.process_data_field(handler, tag, impl_defined_part, start, start + length)?;
            }
            for part in &extra_parts {
                handler.additional_impl_defined_part(part);
            }
        }
        Ok(())
    }

    /// Collect the fields of the record as events.
    ///
    /// # Errors
    ///
    /// See [`process_fields`](Self::process_fields).
    pub fn events(&self) -> Result<Vec<FieldEvent>> {
        let mut events = Vec::new();
        self.process_fields(&mut events)?;
        Ok(events)
    }

    fn data_offset(&self, tag: &str, field_start: usize) -> Result<usize> {
        self.base_address
            .checked_add(field_start)
            .filter(|&start| start < self.buffer.len())
            .ok_or_else(|| {
                Iso2709Error::InvalidRecord(format!(
                    "Field {tag} starts at {field_start}, outside of the data area"
                ))
            })
    }

    fn process_data_field<H: FieldHandler + ?Sized>(
        &self,
        handler: &mut H,
        tag: &str,
        impl_defined_part: &str,
        start: usize,
        end: usize,
    ) -> Result<()> {
        let indicator_length = self.widths.indicator_length();
        if start + indicator_length > end {
            return Err(Iso2709Error::InvalidRecord(format!(
                "Field {tag} is shorter than its {indicator_length} indicators"
            )));
        }
        let indicators = self.buffer.chars_at(start, indicator_length)?;
        handler.start_data_field(tag, impl_defined_part, indicators);
        self.process_subfields(handler, tag, start + indicator_length, end)?;
        handler.end_data_field();
        Ok(())
    }

    fn process_subfields<H: FieldHandler + ?Sized>(
        &self,
        handler: &mut H,
        tag: &str,
        from: usize,
        end: usize,
    ) -> Result<()> {
        if from == end {
            return Ok(());
        }
        let identifier_length = self.widths.identifier_length();
        if identifier_length == 0 {
            let value = self.buffer.string_at(from, end - from, self.charset)?;
            handler.data("", &value);
            return Ok(());
        }

        let mut position = from;
        while position < end {
            if self.buffer.byte_at(position)? != SUBFIELD_MARKER {
                return Err(Iso2709Error::InvalidRecord(format!(
                    "Expected subfield marker at offset {position} in field {tag}"
                )));
            }
            let identifier_start = position + 1;
            let value_start = identifier_start + identifier_length;
            if value_start > end {
                return Err(Iso2709Error::InvalidRecord(format!(
                    "Truncated subfield identifier at offset {identifier_start} in field {tag}"
                )));
            }
            let identifier = self.buffer.chars_at(identifier_start, identifier_length)?;
            if identifier.as_bytes().contains(&SUBFIELD_MARKER) {
                return Err(Iso2709Error::InvalidRecord(format!(
                    "Subfield identifier at offset {identifier_start} in field {tag} \
                     contains a subfield marker"
                )));
            }
            let value_length = self.buffer.distance_to_any(&DATA_SEPARATORS, value_start);
            let value = self.buffer.string_at(value_start, value_length, self.charset)?;
            handler.data(identifier, &value);
            position = value_start + value_length;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;

    #[test]
    fn test_minimal_record() {
        let record = Record::new(b"00026SIMPL1200025SYS345R\x1e\x1d").unwrap();
        assert_eq!(record.record_status(), 'S');
        assert_eq!(record.impl_codes(), "IMPL");
        assert_eq!(record.system_chars(), "SYS");
        assert_eq!(record.reserved_char(), 'R');
        assert_eq!(record.base_address(), 25);
        assert_eq!(record.field_widths(), FieldWidths::new(1, 2, 3, 4, 5).unwrap());
        assert!(record.events().unwrap().is_empty());
        assert!(record.validate_length().is_ok());
    }

    #[test]
    fn test_rejects_short_input() {
        let result = Record::new(b"00005");
        assert!(matches!(
            result,
            Err(Iso2709Error::RecordTooShort { length: 5, minimum: 26 })
        ));
    }

    #[test]
    fn test_decode_accepts_empty_input() {
        let mut events: Vec<FieldEvent> = Vec::new();
        decode(b"", &mut events).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_rejects_base_address_out_of_range() {
        let result = Record::new(b"00026SIMPL1200099SYS345R\x1e\x1d");
        assert!(matches!(result, Err(Iso2709Error::InvalidRecord(_))));
        let result = Record::new(b"00026SIMPL1200024SYS345R\x1e\x1d");
        assert!(matches!(result, Err(Iso2709Error::InvalidRecord(_))));
    }

    #[test]
    fn test_rejects_unterminated_directory() {
        let result = Record::new(b"00026SIMPL1200025SYS345RX\x1d");
        assert!(matches!(result, Err(Iso2709Error::InvalidRecord(_))));
    }

    #[test]
    fn test_rejects_partial_directory_entry() {
        let result = Record::new(b"00033SIMPL0000029SYS110R0012\x1eID\x1e\x1d");
        assert!(matches!(result, Err(Iso2709Error::InvalidRecord(_))));
    }

    #[test]
    fn test_record_id() {
        let record = Record::new(b"00034SIMPL0000030SYS110R00120\x1eID\x1e\x1d").unwrap();
        assert_eq!(record.record_id().unwrap().as_deref(), Some("ID"));

        let record = Record::new(b"00034SIMPL0000030SYS110R00220\x1eXY\x1e\x1d").unwrap();
        assert_eq!(record.record_id().unwrap(), None);
    }

    #[test]
    fn test_reference_fields() {
        let record =
            Record::new(b"00042SIMPL0000035SYS110R0012000223\x1eID\x1eXY\x1e\x1d").unwrap();
        let events = record.events().unwrap();
        assert_eq!(
            events,
            vec![
                FieldEvent::Reference {
                    tag: "001".to_string(),
                    impl_defined_part: String::new(),
                    value: "ID".to_string(),
                },
                FieldEvent::Reference {
                    tag: "002".to_string(),
                    impl_defined_part: String::new(),
                    value: "XY".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_charset_applies_to_values() {
        let data = b"00033SIMPL0000030SYS110R00120\x1e\xfc\x1e\x1d";
        let record = Record::new(data).unwrap().with_charset(WINDOWS_1252);
        assert_eq!(record.charset(), WINDOWS_1252);
        assert_eq!(record.record_id().unwrap().as_deref(), Some("ü"));
    }

    #[test]
    fn test_rejects_unterminated_field() {
        let record = Record::new(b"00033SIMPL0000030SYS110R00220\x1eXYZ\x1d").unwrap();
        assert!(matches!(record.events(), Err(Iso2709Error::InvalidRecord(_))));
    }

    #[test]
    fn test_rejects_field_start_outside_record() {
        let record = Record::new(b"00034SIMPL0000030SYS110R00299\x1eXY\x1e\x1d").unwrap();
        assert!(matches!(record.events(), Err(Iso2709Error::InvalidRecord(_))));
    }

    #[test]
    fn test_validate_length_detects_mismatch() {
        let record = Record::new(b"00099SIMPL1200025SYS345R\x1e\x1d").unwrap();
        assert!(record.validate_length().is_err());
        let record = Record::new(b"00026SIMPL1200025SYS345R\x1eX").unwrap();
        assert!(record.validate_length().is_err());
    }
}
