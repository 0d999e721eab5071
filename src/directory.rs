//! Directory of an ISO 2709 record.
//!
//! The directory follows the leader and holds one fixed-width entry per
//! field part: `tag(3) field_length field_start impl_defined_part`. Entries
//! with a field length of zero mark a field that continues in the next
//! entry; this is how fields longer than the field-length digits can
//! express are stored.
//!
//! [`DirectoryCursor`] walks the entries of a record being decoded and
//! [`DirectoryBuilder`] lays out the entries of a record being encoded.

use crate::error::{Iso2709Error, Result};
use crate::field_widths::{FieldWidths, TAG_LENGTH};
use crate::iso646::Iso646Buffer;
use crate::leader::LEADER_LENGTH;
use smallvec::SmallVec;
use std::fmt;

const RECORD_ID_TAG: &str = "001";
const REFERENCE_FIELD_PREFIX: &str = "00";

/// Rewindable cursor over the directory entries of a record.
///
/// The cursor covers the byte range `[24, directory_end)`. All accessors
/// parse only the entry under the cursor.
#[derive(Debug)]
pub struct DirectoryCursor<'b, B: AsRef<[u8]>> {
    buffer: &'b Iso646Buffer<B>,
    directory_end: usize,
    field_length_length: usize,
    field_start_length: usize,
    impl_defined_part_length: usize,
    entry_length: usize,
    position: usize,
}

impl<'b, B: AsRef<[u8]>> DirectoryCursor<'b, B> {
    /// Create a cursor positioned at the first entry.
    pub fn new(buffer: &'b Iso646Buffer<B>, widths: &FieldWidths, directory_end: usize) -> Self {
        DirectoryCursor {
            buffer,
            directory_end,
            field_length_length: widths.field_length_length(),
            field_start_length: widths.field_start_length(),
            impl_defined_part_length: widths.impl_defined_part_length(),
            entry_length: widths.entry_length(),
            position: LEADER_LENGTH,
        }
    }

    /// Move back to the first entry.
    pub fn rewind(&mut self) {
        self.position = LEADER_LENGTH;
    }

    /// Move to the next entry.
    pub fn advance(&mut self) {
        debug_assert!(!self.at_end());
        self.position += self.entry_length;
    }

    /// Whether the cursor has moved past the last entry.
    #[must_use]
    pub fn at_end(&self) -> bool {
        self.position >= self.directory_end
    }

    /// Byte offset of the current entry within the record.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Tag of the current entry.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::CharacterRange`] for non 7-bit tags.
    pub fn tag(&self) -> Result<&'b str> {
        self.buffer.chars_at(self.position, TAG_LENGTH)
    }

    /// Declared field length of the current entry.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::NotANumber`] if the entry holds non-digits.
    pub fn field_length(&self) -> Result<usize> {
        let start = self.position + TAG_LENGTH;
        Ok(self.buffer.parse_digits_at(start, self.field_length_length)? as usize)
    }

    /// Declared field start of the current entry, relative to the base
    /// address.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::NotANumber`] if the entry holds non-digits.
    pub fn field_start(&self) -> Result<usize> {
        let start = self.position + TAG_LENGTH + self.field_length_length;
        Ok(self.buffer.parse_digits_at(start, self.field_start_length)? as usize)
    }

    /// Implementation-defined part of the current entry.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::CharacterRange`] for non 7-bit characters.
    pub fn impl_defined_part(&self) -> Result<&'b str> {
        let start =
            self.position + TAG_LENGTH + self.field_length_length + self.field_start_length;
        self.buffer.chars_at(start, self.impl_defined_part_length)
    }

    /// Whether the current entry belongs to the record identifier field.
    ///
    /// # Errors
    ///
    /// See [`tag`](Self::tag).
    pub fn is_record_id_field(&self) -> Result<bool> {
        Ok(self.tag()? == RECORD_ID_TAG)
    }

    /// Whether the current entry belongs to a reference field.
    ///
    /// # Errors
    ///
    /// See [`tag`](Self::tag).
    pub fn is_reference_field(&self) -> Result<bool> {
        Ok(self.tag()?.starts_with(REFERENCE_FIELD_PREFIX))
    }

    /// Whether the current entry carries the continuation marker (a field
    /// length of zero).
    ///
    /// # Errors
    ///
    /// See [`field_length`](Self::field_length).
    pub fn is_continued(&self) -> Result<bool> {
        Ok(self.field_length()? == 0)
    }
}

impl<B: AsRef<[u8]>> fmt::Display for DirectoryCursor<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.at_end() {
            return f.write_str("@END-OF-DIRECTORY");
        }
        let end = (self.position + self.entry_length).min(self.directory_end);
        let entry = self
            .buffer
            .as_bytes()
            .get(self.position..end)
            .unwrap_or_default();
        f.write_str(&Iso646Buffer::new(entry).render())
    }
}

/// One planned directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPart {
    /// Length recorded in the entry (0 for continued parts).
    pub length: usize,
    /// Start of the part relative to the base address.
    pub start: usize,
}

/// Lays out directory entries for fields appended to a record.
///
/// A field longer than the largest representable field length is split
/// into parts of that size; all but the last part are recorded with a
/// length of zero.
#[derive(Debug, Clone)]
pub struct DirectoryBuilder {
    widths: FieldWidths,
    max_field_length: usize,
    max_field_start: usize,
    entry_count: usize,
}

impl DirectoryBuilder {
    /// Create an empty directory for records laid out with `widths`.
    #[must_use]
    pub fn new(widths: FieldWidths) -> Self {
        DirectoryBuilder {
            widths,
            max_field_length: widths.max_field_length(),
            max_field_start: widths.max_field_start(),
            entry_count: 0,
        }
    }

    /// Plan the entries of a field occupying `length` bytes at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::UnrepresentableLength`] if the start of the
    /// last part does not fit the field start digits.
    pub fn plan(&self, start: usize, length: usize) -> Result<SmallVec<[EntryPart; 1]>> {
        let mut parts = SmallVec::new();
        let mut remaining = length;
        let mut part_start = start;
        while remaining > self.max_field_length {
            parts.push(EntryPart {
                length: 0,
                start: part_start,
            });
            remaining -= self.max_field_length;
            part_start += self.max_field_length;
        }
        if part_start > self.max_field_start {
            return Err(Iso2709Error::UnrepresentableLength {
                what: "field start",
                value: part_start,
                digits: self.widths.field_start_length(),
            });
        }
        parts.push(EntryPart {
            length: remaining,
            start: part_start,
        });
        Ok(parts)
    }

    /// Record that `count` more entries have been added.
    pub fn commit(&mut self, count: usize) {
        self.entry_count += count;
    }

    /// Number of committed entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Length of the directory in bytes for `entry_count` entries,
    /// including the directory terminator.
    #[must_use]
    pub fn length_with(&self, entry_count: usize) -> usize {
        entry_count * self.widths.entry_length() + 1
    }

    /// Length of the committed directory, including its terminator.
    #[must_use]
    pub fn length(&self) -> usize {
        self.length_with(self.entry_count)
    }

    /// Write one entry at the cursor of `buffer`.
    ///
    /// # Errors
    ///
    /// Propagates buffer write errors.
    pub fn write_entry(
        &self,
        buffer: &mut Iso646Buffer,
        tag: &str,
        impl_defined_part: &str,
        part: EntryPart,
    ) -> Result<()> {
        buffer.write_chars(tag)?;
        buffer.write_digits(part.length, self.widths.field_length_length())?;
        buffer.write_digits(part.start, self.widths.field_start_length())?;
        buffer.write_chars(impl_defined_part)
    }

    /// Forget all entries.
    pub fn reset(&mut self) {
        self.entry_count = 0;
    }
}
