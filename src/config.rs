//! Codec configuration.
//!
//! A [`CodecConfig`] names the field widths and character set a record
//! format uses. It is usually loaded from JSON:
//!
//! ```
//! use iso2709::CodecConfig;
//!
//! let config = CodecConfig::from_json(
//!     r#"{
//!         "widths": {
//!             "indicator_length": 2,
//!             "identifier_length": 1,
//!             "field_length_length": 4,
//!             "field_start_length": 5,
//!             "impl_defined_part_length": 0
//!         },
//!         "charset": "iso-8859-1"
//!     }"#,
//! )?;
//! assert_eq!(config.encoding()?.name(), "windows-1252");
//! # Ok::<(), iso2709::Iso2709Error>(())
//! ```

use crate::builder::RecordBuilder;
use crate::error::{Iso2709Error, Result};
use crate::field_widths::FieldWidths;
use crate::handler::FieldHandler;
use crate::record::Record;
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

fn default_charset() -> String {
    "utf-8".to_string()
}

/// Field widths and character set of a record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Widths of the records.
    pub widths: FieldWidths,
    /// `encoding_rs` label of the character set of field values.
    #[serde(default = "default_charset")]
    pub charset: String,
}

impl CodecConfig {
    /// Configuration for `widths` with UTF-8 values.
    #[must_use]
    pub fn new(widths: FieldWidths) -> Self {
        CodecConfig {
            widths,
            charset: default_charset(),
        }
    }

    /// Parse a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::Config`] for malformed documents, including
    /// widths outside the allowed ranges.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Resolve the character set label.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::UnknownCharset`] if the label is not known.
    pub fn encoding(&self) -> Result<&'static Encoding> {
        Encoding::for_label(self.charset.trim().as_bytes())
            .ok_or_else(|| Iso2709Error::UnknownCharset(self.charset.clone()))
    }

    /// A builder for records in this format.
    ///
    /// # Errors
    ///
    /// See [`encoding`](Self::encoding).
    pub fn record_builder(&self) -> Result<RecordBuilder> {
        let mut builder = RecordBuilder::new(self.widths);
        builder.set_charset(self.encoding()?);
        Ok(builder)
    }

    /// Decode a record in this format.
    ///
    /// Empty input is accepted as a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Iso2709Error::InvalidRecord`] if the leader declares other
    /// widths than configured, plus the errors of [`Record::new`] and
    /// [`Record::process_fields`].
    pub fn decode<H: FieldHandler + ?Sized>(&self, bytes: &[u8], handler: &mut H) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let record = Record::new(bytes)?.with_charset(self.encoding()?);
        if record.field_widths() != self.widths {
            return Err(Iso2709Error::InvalidRecord(format!(
                "Record uses widths {} but {} are configured",
                record.field_widths(),
                self.widths
            )));
        }
        record.process_fields(handler)
    }
}
