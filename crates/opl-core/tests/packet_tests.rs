//! Integration tests for DNS query decoding

use opl_core::packet::{decode_query, parse_query, DnsQueryBuilder, DnsQueryError};
use proptest::prelude::*;
use std::net::Ipv4Addr;

fn hostname() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-zA-Z0-9][a-zA-Z0-9-]{0,19}", 1..5).prop_map(|labels| labels.join("."))
}

#[test]
fn test_decode_store_starbucks() {
    let frame = DnsQueryBuilder::new("store.starbucks.com").build().unwrap();
    assert_eq!(decode_query(&frame).as_deref(), Some("store.starbucks.com"));
}

#[test]
fn test_parse_reports_addresses() {
    let frame = DnsQueryBuilder::new("Example.COM")
        .src_ip([192, 168, 1, 7])
        .dst_ip([1, 1, 1, 1])
        .src_port(41000)
        .transaction_id(0xBEEF)
        .build()
        .unwrap();

    let query = parse_query(&frame).unwrap();
    assert_eq!(query.name, "example.com");
    assert_eq!(query.src_addr, Ipv4Addr::new(192, 168, 1, 7));
    assert_eq!(query.dst_addr, Ipv4Addr::new(1, 1, 1, 1));
    assert_eq!(query.src_port, 41000);
    assert_eq!(query.transaction_id, 0xBEEF);
}

#[test]
fn test_decode_with_ip_options() {
    let frame = DnsQueryBuilder::new("example.com")
        .ip_options(&[0x94, 0x04, 0x00, 0x00])
        .build()
        .unwrap();
    assert_eq!(frame[0] & 0x0F, 6);
    assert_eq!(decode_query(&frame).as_deref(), Some("example.com"));
}

#[test]
fn test_ten_byte_frame() {
    let frame = [0x45u8, 0, 0, 10, 0, 0, 0, 0, 64, 17];
    assert_eq!(decode_query(&frame), None);
    assert!(matches!(
        parse_query(&frame),
        Err(DnsQueryError::TooShort { actual: 10, .. })
    ));
}

#[test]
fn test_header_only_frame() {
    // Valid IPv4/UDP/53 headers, DNS header, nothing after it
    let mut frame = DnsQueryBuilder::new("example.com").build().unwrap();
    frame.truncate(20 + 8 + 12);
    assert_eq!(decode_query(&frame), None);
}

#[test]
fn test_non_ascii_label_rejected() {
    let mut frame = DnsQueryBuilder::new("caf1.com").build().unwrap();
    // Replace the '1' in "caf1" with a Latin-1 byte
    let pos = 40 + frame[40..].iter().position(|&b| b == b'1').unwrap();
    frame[pos] = 0xE9;
    assert!(matches!(
        parse_query(&frame),
        Err(DnsQueryError::InvalidLabel { .. })
    ));
}

#[test]
fn test_frame_not_mutated() {
    let frame = DnsQueryBuilder::new("example.com").build().unwrap();
    let copy = frame.clone();
    let _ = decode_query(&frame);
    assert_eq!(frame, copy);
}

proptest! {
    #[test]
    fn prop_decode_valid_query(name in hostname()) {
        let frame = DnsQueryBuilder::new(name.clone()).build().unwrap();
        prop_assert_eq!(decode_query(&frame), Some(name.to_lowercase()));
    }

    #[test]
    fn prop_wrong_version_rejected(name in hostname(), version in 0u8..16) {
        prop_assume!(version != 4);
        let mut frame = DnsQueryBuilder::new(name).build().unwrap();
        frame[0] = (version << 4) | (frame[0] & 0x0F);
        prop_assert_eq!(decode_query(&frame), None);
    }

    #[test]
    fn prop_wrong_protocol_rejected(name in hostname(), proto in any::<u8>()) {
        prop_assume!(proto != 17);
        let mut frame = DnsQueryBuilder::new(name).build().unwrap();
        frame[9] = proto;
        prop_assert_eq!(decode_query(&frame), None);
    }

    #[test]
    fn prop_wrong_port_rejected(name in hostname(), port in any::<u16>()) {
        prop_assume!(port != 53);
        let frame = DnsQueryBuilder::new(name).dst_port(port).build().unwrap();
        prop_assert_eq!(decode_query(&frame), None);
    }

    #[test]
    fn prop_short_frames_rejected(bytes in prop::collection::vec(any::<u8>(), 0..28)) {
        prop_assert_eq!(decode_query(&bytes), None);
    }

    #[test]
    fn prop_arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..600)) {
        let _ = parse_query(&bytes);
    }
}
