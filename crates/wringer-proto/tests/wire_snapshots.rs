//! Snapshot tests for wire format stability.
//!
//! Inline hex snapshots of every dialect's record framing. If any of these
//! change, interoperability with real peers breaks.

use insta::assert_snapshot;
use wringer_proto::{
    ContentType, DatagramRecord, Fragment, HandshakeKind, LegacyRecord, Message, ProtocolVersion,
    Record,
};

#[test]
fn snapshot_stream_record() {
    let record = Record::new(
        ContentType::Handshake,
        ProtocolVersion::V12,
        vec![0xCA, 0xFE, 0xBA, 0xBE],
    );
    assert_snapshot!(hex::encode(record.to_wire().unwrap()), @"1603030004cafebabe");
}

#[test]
fn snapshot_stream_record_empty_payload() {
    let record = Record::new(ContentType::Application, ProtocolVersion::V13, Vec::new());
    assert_snapshot!(hex::encode(record.to_wire().unwrap()), @"1703040000");
}

#[test]
fn snapshot_datagram_record() {
    let record = DatagramRecord::new(
        ContentType::Application,
        ProtocolVersion::D12,
        2,
        5,
        vec![0x01, 0x02, 0x03],
    );
    assert_snapshot!(hex::encode(record.to_wire().unwrap()), @"17fefd00020000000000050003010203");
}

#[test]
fn snapshot_legacy_record_short_header() {
    let record = LegacyRecord::unpadded(vec![0xAB, 0xCD]);
    assert_snapshot!(hex::encode(record.to_wire().unwrap()), @"8002abcd");
}

#[test]
fn snapshot_legacy_record_long_header() {
    let record = LegacyRecord::padded(vec![0xAA], vec![0x00, 0x00]);
    assert_snapshot!(hex::encode(record.to_wire().unwrap()), @"000302aa0000");
}

#[test]
fn snapshot_handshake_message() {
    let message = Message::new(HandshakeKind::ClientHello, vec![0xAA, 0xBB]);
    assert_snapshot!(hex::encode(message.to_wire().unwrap()), @"01000002aabb");
}

#[test]
fn snapshot_handshake_fragment() {
    let fragment = Fragment::new(HandshakeKind::Certificate, 4, 1, 0, vec![0xDE, 0xAD]);
    assert_snapshot!(hex::encode(fragment.to_wire().unwrap()), @"0b0000040001000000000002dead");
}
