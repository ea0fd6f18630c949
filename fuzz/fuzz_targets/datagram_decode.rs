//! Fuzzer for the datagram-dialect record codec and prefix view.

#![no_main]

use libfuzzer_sys::fuzz_target;
use wringer_proto::{Cursor, DatagramPrefix, DatagramRecord};

fuzz_target!(|data: &[u8]| {
    let mut cursor = Cursor::new(data);
    if let Ok(record) = DatagramRecord::parse(&mut cursor) {
        let consumed = cursor.position();
        let wire = record.to_wire().expect("parsed record must re-serialize");
        assert_eq!(&wire, &data[..consumed]);

        // The zero-copy prefix view must agree with the full codec
        let prefix = DatagramPrefix::peek(data).expect("full parse implies a full prefix");
        assert_eq!(prefix.epoch(), record.epoch);
        assert_eq!(prefix.sequence_number(), record.sequence_number);
    } else {
        // Failure must be structured either way
        let _ = DatagramPrefix::peek(data);
    }
});
