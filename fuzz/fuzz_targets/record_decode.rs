//! Fuzzer for the stream-dialect record codec.
//!
//! Any byte sequence must either parse into a record or fail with a
//! structured error. Panics and out-of-bounds accesses are bugs. Parsed
//! records must re-serialize to exactly the bytes they were parsed from.

#![no_main]

use libfuzzer_sys::fuzz_target;
use wringer_proto::{Cursor, Record};

fuzz_target!(|data: &[u8]| {
    let mut cursor = Cursor::new(data);
    if let Ok(record) = Record::parse(&mut cursor) {
        let consumed = cursor.position();
        let wire = record.to_wire().expect("parsed record must re-serialize");
        assert_eq!(
            &wire,
            &data[..consumed],
            "re-serialization must reproduce the consumed bytes"
        );
    }

    // Lenient boundaries must never change the no-fault guarantee
    let mut lenient = Cursor::new(data);
    let _ = Record::parse_with_policy(&mut lenient, false);
});
