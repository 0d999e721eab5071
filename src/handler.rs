//! Field event protocol between the codec and record formats built on it.
//!
//! Decoding a record drives a [`FieldHandler`] through the record's fields.
//! The same sequence of calls can be captured as [`FieldEvent`] values,
//! which are easier to inspect, store, and replay into another handler or
//! into a [`RecordBuilder`](crate::RecordBuilder).
//!
//! # Example
//!
//! ```
//! use iso2709::{FieldEvent, Record};
//!
//! let data = b"00034SIMPL0000030SYS110R00120\x1eID\x1e\x1d";
//! let events = Record::new(data)?.events()?;
//!
//! assert_eq!(
//!     events,
//!     vec![FieldEvent::Reference {
//!         tag: "001".to_string(),
//!         impl_defined_part: String::new(),
//!         value: "ID".to_string(),
//!     }]
//! );
//! # Ok::<(), iso2709::Iso2709Error>(())
//! ```

use serde::{Deserialize, Serialize};

/// Receiver of the fields of a decoded record.
///
/// For every field the decoder calls either
/// [`reference_field`](Self::reference_field) or the sequence
/// [`start_data_field`](Self::start_data_field),
/// [`data`](Self::data)*, [`end_data_field`](Self::end_data_field).
/// Fields stored as continuation groups are followed by one
/// [`additional_impl_defined_part`](Self::additional_impl_defined_part)
/// call per additional directory entry.
pub trait FieldHandler {
    /// A reference field (tag starting with `00`).
    fn reference_field(&mut self, tag: &str, impl_defined_part: &str, value: &str);

    /// Start of a data field.
    fn start_data_field(&mut self, tag: &str, impl_defined_part: &str, indicators: &str);

    /// One subfield of the current data field.
    fn data(&mut self, identifier: &str, value: &str);

    /// End of the current data field.
    fn end_data_field(&mut self);

    /// Implementation-defined part of a continuation entry of the
    /// preceding field.
    fn additional_impl_defined_part(&mut self, impl_defined_part: &str) {
        let _ = impl_defined_part;
    }
}

/// One call of the [`FieldHandler`] protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldEvent {
    /// A reference field.
    Reference {
        /// Field tag.
        tag: String,
        /// Implementation-defined part of the first directory entry.
        impl_defined_part: String,
        /// Field value.
        value: String,
    },
    /// Start of a data field.
    DataStart {
        /// Field tag.
        tag: String,
        /// Implementation-defined part of the first directory entry.
        impl_defined_part: String,
        /// Indicator characters.
        indicators: String,
    },
    /// A subfield of the current data field.
    Data {
        /// Subfield identifier (empty when identifiers are not used).
        identifier: String,
        /// Subfield value.
        value: String,
    },
    /// End of the current data field.
    DataEnd,
    /// Implementation-defined part of a continuation entry.
    ExtraImplPart(String),
}

impl FieldEvent {
    /// Dispatch this event to `handler`.
    pub fn apply<H: FieldHandler + ?Sized>(&self, handler: &mut H) {
        match self {
            FieldEvent::Reference {
                tag,
                impl_defined_part,
                value,
            } => handler.reference_field(tag, impl_defined_part, value),
            FieldEvent::DataStart {
                tag,
                impl_defined_part,
                indicators,
            } => handler.start_data_field(tag, impl_defined_part, indicators),
            FieldEvent::Data { identifier, value } => handler.data(identifier, value),
            FieldEvent::DataEnd => handler.end_data_field(),
            FieldEvent::ExtraImplPart(part) => handler.additional_impl_defined_part(part),
        }
    }
}

/// Replay `events` into `handler` in order.
pub fn replay<H: FieldHandler + ?Sized>(events: &[FieldEvent], handler: &mut H) {
    for event in events {
        event.apply(handler);
    }
}

/// Collects events in call order.
impl FieldHandler for Vec<FieldEvent> {
    fn reference_field(&mut self, tag: &str, impl_defined_part: &str, value: &str) {
        self.push(FieldEvent::Reference {
            tag: tag.to_string(),
            impl_defined_part: impl_defined_part.to_string(),
            value: value.to_string(),
        });
    }

    fn start_data_field(&mut self, tag: &str, impl_defined_part: &str, indicators: &str) {
        self.push(FieldEvent::DataStart {
            tag: tag.to_string(),
            impl_defined_part: impl_defined_part.to_string(),
            indicators: indicators.to_string(),
        });
    }

    fn data(&mut self, identifier: &str, value: &str) {
        self.push(FieldEvent::Data {
            identifier: identifier.to_string(),
            value: value.to_string(),
        });
    }

    fn end_data_field(&mut self) {
        self.push(FieldEvent::DataEnd);
    }

    fn additional_impl_defined_part(&mut self, impl_defined_part: &str) {
        self.push(FieldEvent::ExtraImplPart(impl_defined_part.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Counts calls instead of storing them.
    #[derive(Default)]
    struct Counter {
        reference: usize,
        data_fields: usize,
        subfields: usize,
    }

    impl FieldHandler for Counter {
        fn reference_field(&mut self, _: &str, _: &str, _: &str) {
            self.reference += 1;
        }

        fn start_data_field(&mut self, _: &str, _: &str, _: &str) {
            self.data_fields += 1;
        }

        fn data(&mut self, _: &str, _: &str) {
            self.subfields += 1;
        }

        fn end_data_field(&mut self) {}
    }

    fn sample() -> Vec<FieldEvent> {
        vec![
            FieldEvent::Reference {
                tag: "001".to_string(),
                impl_defined_part: String::new(),
                value: "ID".to_string(),
            },
            FieldEvent::ExtraImplPart("B".to_string()),
            FieldEvent::DataStart {
                tag: "245".to_string(),
                impl_defined_part: String::new(),
                indicators: "10".to_string(),
            },
            FieldEvent::Data {
                identifier: "a".to_string(),
                value: "Title".to_string(),
            },
            FieldEvent::DataEnd,
        ]
    }

    #[test]
    fn test_replay_into_vec_reproduces_events() {
        let events = sample();
        let mut collected = Vec::new();
        replay(&events, &mut collected);
        assert_eq!(collected, events);
    }

    #[test]
    fn test_default_additional_impl_defined_part_is_ignored() {
        let mut counter = Counter::default();
        replay(&sample(), &mut counter);
        assert_eq!(counter.reference, 1);
        assert_eq!(counter.data_fields, 1);
        assert_eq!(counter.subfields, 1);
    }

    #[test]
    fn test_events_serialize_to_json() {
        let json = serde_json::to_string(&FieldEvent::DataEnd).unwrap();
        assert_eq!(json, "\"DataEnd\"");
        let back: Vec<FieldEvent> =
            serde_json::from_str(&serde_json::to_string(&sample()).unwrap()).unwrap();
        assert_eq!(back, sample());
    }
}
