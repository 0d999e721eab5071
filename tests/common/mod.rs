//! Common test helpers and utilities shared across test suite.

use iso2709::{FieldWidths, RecordBuilder};

/// Record with a continuation group: entries `001/0/00/A`, `001/3/09/B`
/// and `002/3/12/C` over the values `abcdefghijk` and `XY`.
#[allow(dead_code)]
pub const CONTINUATION_RECORD: &[u8] =
    b"00062SIMPL0000046SYS121R001000A001309B002312C\x1eabcdefghijk\x1eXY\x1e\x1d";

/// Widths of MARC 21 records.
#[allow(dead_code)]
pub fn marc21_widths() -> FieldWidths {
    FieldWidths::new(2, 1, 4, 5, 0).expect("valid widths")
}

/// Builds a small MARC 21 style record with one field of each kind.
#[allow(dead_code)]
pub fn create_test_record() -> Vec<u8> {
    let mut builder = RecordBuilder::new(marc21_widths());
    builder.set_record_status('n').expect("valid status");
    builder.set_impl_codes("am  ").expect("valid codes");
    builder.append_identifier_field("ocm00012345").expect("id field");
    builder
        .append_reference_field("008", "850101s1925    nyu           000 1 eng  ")
        .expect("reference field");
    builder.start_data_field("245", "10").expect("start 245");
    builder
        .append_subfield("a", "The Great Gatsby /")
        .expect("subfield a");
    builder
        .append_subfield("c", "F. Scott Fitzgerald.")
        .expect("subfield c");
    builder.end_data_field().expect("end 245");
    builder.start_data_field("650", " 0").expect("start 650");
    builder.append_subfield("a", "Rich people").expect("subfield a");
    builder.append_subfield("z", "New York").expect("subfield z");
    builder.end_data_field().expect("end 650");
    builder.build().expect("record")
}

/// Builds `count` distinct records.
#[allow(dead_code)]
pub fn create_test_records(count: usize) -> Vec<Vec<u8>> {
    let mut builder = RecordBuilder::new(marc21_widths());
    (0..count)
        .map(|i| {
            builder.reset();
            builder
                .append_identifier_field(&format!("rec{i:05}"))
                .expect("id field");
            builder.start_data_field("245", "00").expect("start 245");
            builder
                .append_subfield("a", &format!("Title number {i}"))
                .expect("subfield");
            builder.end_data_field().expect("end 245");
            builder.build().expect("record")
        })
        .collect()
}
