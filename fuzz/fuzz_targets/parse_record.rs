#![no_main]

use iso2709::{FieldEvent, Record};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(record) = Record::new(data) {
        let _ = record.validate_length();
        let _ = record.record_id();
        let mut events: Vec<FieldEvent> = Vec::new();
        let _ = record.process_fields(&mut events);
    }
});
