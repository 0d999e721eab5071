#![warn(missing_docs)]

//! # iso2709: ISO 2709 record codec
//!
//! Decoding and encoding of records in the ISO 2709 interchange format,
//! the container underneath MARC 21, UNIMARC and related bibliographic
//! formats. The crate handles the physical layer only: leader, directory,
//! fields and subfields. It knows nothing about what the tags mean.
//!
//! ## Quick Start
//!
//! ### Decoding
//!
//! ```
//! use iso2709::{FieldEvent, Record};
//!
//! let data = b"00034SIMPL0000030SYS110R00120\x1eID\x1e\x1d";
//! let record = Record::new(data)?;
//!
//! assert_eq!(record.record_id()?.as_deref(), Some("ID"));
//! for event in record.events()? {
//!     if let FieldEvent::Reference { tag, value, .. } = event {
//!         println!("{tag}: {value}");
//!     }
//! }
//! # Ok::<(), iso2709::Iso2709Error>(())
//! ```
//!
//! Implement [`FieldHandler`] to receive fields without collecting them.
//!
//! ### Encoding
//!
//! ```
//! use iso2709::{FieldWidths, RecordBuilder};
//!
//! let mut builder = RecordBuilder::new(FieldWidths::new(2, 1, 4, 5, 0)?);
//! builder.set_record_status('n')?;
//! builder.append_identifier_field("12345")?;
//! builder.start_data_field("245", "10")?;
//! builder.append_subfield("a", "Test Title")?;
//! builder.end_data_field()?;
//!
//! let bytes = builder.build()?;
//! assert_eq!(bytes.last(), Some(&0x1D));
//! # Ok::<(), iso2709::Iso2709Error>(())
//! ```
//!
//! ## Modules
//!
//! - [`field_widths`] — Indicator, identifier and directory entry widths
//! - [`iso646`] — Byte buffer with 7-bit typed accessors
//! - [`leader`] — The 24-byte record leader
//! - [`directory`] — Directory traversal and layout
//! - [`handler`] — Field callback protocol and its event form
//! - [`record`] — Record decoding
//! - [`builder`] — Record encoding
//! - [`config`] — Widths and character set of a record format
//! - [`error`] — Error types and result type

pub mod builder;
pub mod config;
pub mod directory;
pub mod error;
pub mod field_widths;
pub mod handler;
pub mod iso646;
pub mod leader;
/// Record decoding (`Record`, `decode`)
pub mod record;

pub use builder::RecordBuilder;
pub use config::CodecConfig;
pub use directory::{DirectoryBuilder, DirectoryCursor, EntryPart};
pub use error::{Iso2709Error, Result};
pub use field_widths::FieldWidths;
pub use handler::{replay, FieldEvent, FieldHandler};
pub use iso646::Iso646Buffer;
pub use leader::Leader;
pub use record::{decode, Record};
