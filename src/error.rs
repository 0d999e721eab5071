//! Error types for ISO 2709 operations.
//!
//! This module provides the [`Iso2709Error`] type for all codec operations
//! and the [`Result`] convenience type. Every error is local to the record
//! being decoded or encoded: callers discard that record and move on.

use thiserror::Error;

/// Error type for all ISO 2709 codec operations.
#[derive(Error, Debug)]
pub enum Iso2709Error {
    /// The input is smaller than the smallest record the format allows.
    #[error("Record too short: {length} bytes, at least {minimum} required")]
    RecordTooShort {
        /// Number of bytes supplied.
        length: usize,
        /// Minimum number of bytes of a record.
        minimum: usize,
    },

    /// A byte outside the 7-bit character repertoire was found where a
    /// character was required.
    #[error("Invalid character code 0x{code:02x} found at index {index}")]
    CharacterRange {
        /// Offset of the offending byte.
        index: usize,
        /// The offending byte or character code.
        code: u32,
    },

    /// A byte that is not an ASCII digit was found in a number.
    #[error("Digit expected at index {index} but got 0x{byte:02x}")]
    NotANumber {
        /// Offset of the offending byte.
        index: usize,
        /// The offending byte.
        byte: u8,
    },

    /// A number does not fit into the integer type or the digit width.
    #[error("Number starting at index {index} is too large")]
    NumberTooLarge {
        /// Offset at which the number starts.
        index: usize,
    },

    /// The encoder API was called out of its defined sequence.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// A length or offset cannot be represented in the configured number
    /// of digits.
    #[error("{what} {value} cannot be represented in {digits} digits")]
    UnrepresentableLength {
        /// Name of the quantity that did not fit.
        what: &'static str,
        /// The value that did not fit.
        value: usize,
        /// The available number of digits.
        digits: usize,
    },

    /// The record structure is malformed.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// The 24-byte leader is malformed.
    #[error("Invalid leader: {0}")]
    InvalidLeader(String),

    /// A set of field widths is outside the ranges the format allows.
    #[error("Invalid field widths: {0}")]
    InvalidWidths(String),

    /// A tag does not have the format required for the field kind.
    #[error("Invalid tag '{0}'")]
    InvalidTag(String),

    /// An argument passed to the encoder is not acceptable.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A value cannot be represented in the selected character set.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A character set label is not known.
    #[error("Unknown character set '{0}'")]
    UnknownCharset(String),

    /// An access reached past the end of a buffer.
    #[error("Index {index} is out of bounds for buffer of length {length}")]
    OutOfBounds {
        /// The first index that is out of bounds.
        index: usize,
        /// Length of the buffer.
        length: usize,
    },

    /// A configuration document could not be read.
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Convenience type alias for [`std::result::Result`] with [`Iso2709Error`].
pub type Result<T> = std::result::Result<T, Iso2709Error>;
