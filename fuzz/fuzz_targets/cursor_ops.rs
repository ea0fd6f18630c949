//! Fuzzer for cursor and boundary-stack discipline.
//!
//! Interprets the input as a little program of cursor operations and
//! checks the substrate's invariants: the position never goes backward,
//! a failed read never advances, and no operation faults.

#![no_main]

use libfuzzer_sys::fuzz_target;
use wringer_proto::Cursor;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let (program, input) = data.split_at(data.len() / 2);
    let mut cursor = Cursor::new(input);
    let mut depth = 0usize;

    for chunk in program.chunks(2) {
        let before = cursor.position();
        match chunk[0] % 6 {
            0 => {
                let n = usize::from(chunk.get(1).copied().unwrap_or(0));
                let result = cursor.read_fixed(n);
                if result.is_err() {
                    assert_eq!(cursor.position(), before, "failed read must not advance");
                }
            },
            1 => {
                let _ = cursor.read_until(chunk.get(1).copied().unwrap_or(0));
            },
            2 => {
                let limit = usize::from(chunk.get(1).copied().unwrap_or(0));
                cursor.push_boundary(limit, "fuzz", chunk[0] & 0x80 != 0);
                depth += 1;
            },
            3 => {
                if depth > 0 {
                    cursor.pop_boundary().expect("tracked boundary must pop");
                    depth -= 1;
                } else {
                    assert!(cursor.pop_boundary().is_err());
                }
            },
            4 => {
                let _ = cursor.peek_remaining();
                assert_eq!(cursor.position(), before, "peek must not advance");
            },
            _ => {
                let _ = cursor.read_u16();
                let _ = cursor.read_u48();
            },
        }

        assert!(cursor.position() >= before, "cursor must never seek backward");
        assert!(cursor.position() <= input.len());
        assert_eq!(
            cursor.already_parsed().len(),
            cursor.position(),
            "consumed prefix must track the position"
        );
    }
});
