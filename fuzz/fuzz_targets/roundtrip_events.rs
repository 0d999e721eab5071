#![no_main]

use iso2709::{Record, RecordBuilder};
use libfuzzer_sys::fuzz_target;

// Any record that decodes and re-encodes must decode to the same events.
fuzz_target!(|data: &[u8]| {
    let Ok(record) = Record::new(data) else {
        return;
    };
    let Ok(events) = record.events() else {
        return;
    };
    let mut builder = RecordBuilder::new(record.field_widths());
    if builder.append_events(&events).is_err() {
        return;
    }
    let Ok(bytes) = builder.build() else {
        return;
    };
    let reencoded = Record::new(&bytes)
        .and_then(|record| record.events())
        .expect("re-encoded record must decode");
    let strip = |events: Vec<iso2709::FieldEvent>| {
        events
            .into_iter()
            .filter(|event| !matches!(event, iso2709::FieldEvent::ExtraImplPart(_)))
            .collect::<Vec<_>>()
    };
    assert_eq!(strip(reencoded), strip(events));
});
