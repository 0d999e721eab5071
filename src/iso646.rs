//! Byte buffer with ISO 646 (7-bit) typed accessors.
//!
//! The structural parts of an ISO 2709 record (leader, directory, indicators,
//! identifiers) are restricted to the 7-bit ISO 646 repertoire, while field
//! values may use any character set. [`Iso646Buffer`] offers both views over
//! one fixed-size byte sequence, plus a movable write cursor used when
//! records are assembled.
//!
//! # Example
//!
//! ```
//! use iso2709::Iso646Buffer;
//!
//! let mut buffer = Iso646Buffer::with_capacity(8);
//! buffer.write_digits(42, 5)?;
//! buffer.write_chars("ab")?;
//! assert_eq!(buffer.parse_digits_at(0, 5)?, 42);
//! assert_eq!(buffer.chars_at(5, 2)?, "ab");
//! assert_eq!(buffer.free_space(), 1);
//! # Ok::<(), iso2709::Iso2709Error>(())
//! ```

use crate::error::{Iso2709Error, Result};
use encoding_rs::Encoding;
use std::borrow::Cow;
use std::fmt;

/// Highest code of the 7-bit repertoire.
const MAX_CHAR_CODE: u8 = 0x7F;

const RADIX: u32 = 10;

/// Fixed-size byte buffer with typed read accessors and a write cursor.
///
/// The buffer is generic over its storage: decoding wraps a borrowed
/// `&[u8]`, encoding writes into an owned `Vec<u8>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Iso646Buffer<B = Vec<u8>> {
    bytes: B,
    write_position: usize,
}

impl Iso646Buffer<Vec<u8>> {
    /// Create a zero-filled buffer of `capacity` bytes with the write
    /// cursor at 0.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Iso646Buffer::new(vec![0u8; capacity])
    }
}

impl<B: AsRef<[u8]>> Iso646Buffer<B> {
    /// Wrap existing storage. The write cursor starts at 0.
    pub fn new(bytes: B) -> Self {
        Iso646Buffer {
            bytes,
            write_position: 0,
        }
    }

    /// The underlying bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_ref()
    }

    /// Consume the buffer and return its storage.
    pub fn into_inner(self) -> B {
        self.bytes
    }

    /// Capacity of the buffer in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether the buffer has a capacity of zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current position of the write cursor.
    #[must_use]
    pub fn write_position(&self) -> usize {
        self.write_position
    }

    /// Number of bytes between the write cursor and the end of the buffer.
    #[must_use]
    pub fn free_space(&self) -> usize {
        self.len() - self.write_position
    }

    /// Move the write cursor.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::OutOfBounds`] if `position` is past the end
    /// of the buffer.
    pub fn set_write_position(&mut self, position: usize) -> Result<()> {
        if position > self.len() {
            return Err(Iso2709Error::OutOfBounds {
                index: position,
                length: self.len(),
            });
        }
        self.write_position = position;
        Ok(())
    }

    /// Number of bytes from `from_index` to the first occurrence of `byte`.
    ///
    /// If `byte` does not occur, the distance to the end of the buffer is
    /// returned. Never fails: a `from_index` at or past the end yields 0.
    #[must_use]
    pub fn distance_to(&self, byte: u8, from_index: usize) -> usize {
        let Some(tail) = self.as_bytes().get(from_index..) else {
            return 0;
        };
        memchr::memchr(byte, tail).unwrap_or(tail.len())
    }

    /// Number of bytes from `from_index` to the first occurrence of any of
    /// `bytes`. Behaves like [`distance_to`](Self::distance_to) otherwise.
    #[must_use]
    pub fn distance_to_any(&self, bytes: &[u8], from_index: usize) -> usize {
        let Some(tail) = self.as_bytes().get(from_index..) else {
            return 0;
        };
        let found = match *bytes {
            [] => None,
            [a] => memchr::memchr(a, tail),
            [a, b] => memchr::memchr2(a, b, tail),
            [a, b, c] => memchr::memchr3(a, b, c, tail),
            _ => tail.iter().position(|byte| bytes.contains(byte)),
        };
        found.unwrap_or(tail.len())
    }

    /// Decode `length` bytes at `start` using `charset`.
    ///
    /// Malformed sequences are replaced with U+FFFD.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::OutOfBounds`] if the range exceeds the buffer.
    pub fn string_at(
        &self,
        start: usize,
        length: usize,
        charset: &'static Encoding,
    ) -> Result<Cow<'_, str>> {
        if length == 0 {
            return Ok(Cow::Borrowed(""));
        }
        let bytes = self.slice(start, length)?;
        let (decoded, _had_errors) = charset.decode_without_bom_handling(bytes);
        Ok(decoded)
    }

    /// The byte at `index` as a 7-bit character.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::CharacterRange`] if the byte is outside the
    /// 7-bit repertoire and [`Iso2709Error::OutOfBounds`] if `index` is past
    /// the end.
    pub fn char_at(&self, index: usize) -> Result<char> {
        let byte = self.byte_at(index)?;
        check_char_code(byte, index)?;
        Ok(char::from(byte))
    }

    /// `length` bytes at `start` as 7-bit characters.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::CharacterRange`] if any byte is outside the
    /// 7-bit repertoire and [`Iso2709Error::OutOfBounds`] if the range
    /// exceeds the buffer.
    pub fn chars_at(&self, start: usize, length: usize) -> Result<&str> {
        if length == 0 {
            return Ok("");
        }
        let bytes = self.slice(start, length)?;
        for (offset, &byte) in bytes.iter().enumerate() {
            check_char_code(byte, start + offset)?;
        }
        // 7-bit bytes are always valid UTF-8.
        std::str::from_utf8(bytes).map_err(|e| Iso2709Error::CharacterRange {
            index: start + e.valid_up_to(),
            code: u32::from(bytes[e.valid_up_to()]),
        })
    }

    /// The raw byte at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::OutOfBounds`] if `index` is past the end.
    pub fn byte_at(&self, index: usize) -> Result<u8> {
        self.as_bytes()
            .get(index)
            .copied()
            .ok_or(Iso2709Error::OutOfBounds {
                index,
                length: self.len(),
            })
    }

    /// Parse the single ASCII digit at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::NotANumber`] if the byte is not a digit.
    pub fn parse_digit_at(&self, index: usize) -> Result<u8> {
        let byte = self.byte_at(index)?;
        if byte.is_ascii_digit() {
            Ok(byte - b'0')
        } else {
            Err(Iso2709Error::NotANumber { index, byte })
        }
    }

    /// Parse `length` ASCII digits at `start` as a non-negative number.
    ///
    /// A `length` of zero yields 0 for any `start`.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::NotANumber`] if a byte is not a digit and
    /// [`Iso2709Error::NumberTooLarge`] if the value does not fit a `u32`.
    pub fn parse_digits_at(&self, start: usize, length: usize) -> Result<u32> {
        if length == 0 {
            return Ok(0);
        }
        self.slice(start, length)?;
        let mut result: u32 = 0;
        for index in start..start + length {
            let digit = u32::from(self.parse_digit_at(index)?);
            result = result
                .checked_mul(RADIX)
                .and_then(|value| value.checked_add(digit))
                .ok_or(Iso2709Error::NumberTooLarge { index: start })?;
        }
        Ok(result)
    }

    /// Render the whole buffer as 7-bit characters for diagnostics.
    ///
    /// Bytes outside the repertoire are shown as U+FFFD instead of failing.
    #[must_use]
    pub fn render(&self) -> String {
        self.as_bytes()
            .iter()
            .map(|&byte| {
                if byte <= MAX_CHAR_CODE {
                    char::from(byte)
                } else {
                    char::REPLACEMENT_CHARACTER
                }
            })
            .collect()
    }

    fn slice(&self, start: usize, length: usize) -> Result<&[u8]> {
        start
            .checked_add(length)
            .and_then(|end| self.as_bytes().get(start..end))
            .ok_or(Iso2709Error::OutOfBounds {
                index: start.saturating_add(length),
                length: self.len(),
            })
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Iso646Buffer<B> {
    /// Write a raw byte at the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::OutOfBounds`] if the buffer is full.
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write_bytes(&[byte])
    }

    /// Write raw bytes at the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::OutOfBounds`] if they do not fit.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve(bytes.len())?;
        let start = self.write_position;
        self.bytes.as_mut()[start..start + bytes.len()].copy_from_slice(bytes);
        self.write_position += bytes.len();
        Ok(())
    }

    /// Write a 7-bit character at the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::CharacterRange`] for characters outside the
    /// 7-bit repertoire and [`Iso2709Error::OutOfBounds`] if the buffer is
    /// full.
    pub fn write_char(&mut self, value: char) -> Result<()> {
        let byte = char_to_byte(value, self.write_position)?;
        self.write_byte(byte)
    }

    /// Write 7-bit characters at the cursor.
    ///
    /// Nothing is written if any character is out of range.
    ///
    /// # Errors
    ///
    /// See [`write_char`](Self::write_char).
    pub fn write_chars(&mut self, chars: &str) -> Result<()> {
        for (offset, value) in chars.chars().enumerate() {
            char_to_byte(value, self.write_position + offset)?;
        }
        self.write_bytes(chars.as_bytes())
    }

    /// Write the single ASCII digit of a value below 10.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::NumberTooLarge`] if `value` has more than one
    /// digit.
    pub fn write_digit(&mut self, value: u8) -> Result<()> {
        if value >= 10 {
            return Err(Iso2709Error::NumberTooLarge {
                index: self.write_position,
            });
        }
        self.write_byte(b'0' + value)
    }

    /// Write `value` as `width` left-zero-padded ASCII digits.
    ///
    /// Nothing is written if `value` does not fit.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::NumberTooLarge`] if `value` needs more than
    /// `width` digits and [`Iso2709Error::OutOfBounds`] if the digits do not
    /// fit the buffer.
    pub fn write_digits(&mut self, value: usize, width: usize) -> Result<()> {
        self.reserve(width)?;
        let start = self.write_position;
        if (0..width).fold(value, |head, _| head / 10) != 0 {
            return Err(Iso2709Error::NumberTooLarge { index: start });
        }
        let mut head = value;
        for slot in self.bytes.as_mut()[start..start + width].iter_mut().rev() {
            // `head % 10` is always a single digit
            *slot = b'0' + u8::try_from(head % 10).unwrap_or(0);
            head /= 10;
        }
        self.write_position += width;
        Ok(())
    }

    fn reserve(&self, count: usize) -> Result<()> {
        if count > self.free_space() {
            return Err(Iso2709Error::OutOfBounds {
                index: self.write_position + count,
                length: self.len(),
            });
        }
        Ok(())
    }
}

impl<B: AsRef<[u8]>> fmt::Display for Iso646Buffer<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn check_char_code(byte: u8, index: usize) -> Result<()> {
    if byte > MAX_CHAR_CODE {
        return Err(Iso2709Error::CharacterRange {
            index,
            code: u32::from(byte),
        });
    }
    Ok(())
}

fn char_to_byte(value: char, index: usize) -> Result<u8> {
    u8::try_from(value)
        .ok()
        .filter(|&byte| byte <= MAX_CHAR_CODE)
        .ok_or(Iso2709Error::CharacterRange {
            index,
            code: u32::from(value),
        })
}
