//! DNS question decoding
//!
//! Turns a raw IPv4 frame read from the tunnel into the hostname of the
//! first DNS question it carries. Anything that is not an IPv4/UDP packet
//! addressed to port 53 is rejected; IPv6 DNS is not handled.

use super::{
    ports, protocol, DNS_HEADER_LEN, IPV4_MIN_HEADER_LEN, MAX_HOSTNAME_LEN, MAX_LABEL_LEN,
    MIN_FRAME_LEN, UDP_HEADER_LEN,
};
use crate::blocklist::is_hostname_byte;
use std::fmt;
use std::net::Ipv4Addr;
use thiserror::Error;

/// Reason a frame did not yield a DNS question name
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsQueryError {
    /// Frame shorter than the headers it claims to have
    #[error("frame too short: need {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum length required
        expected: usize,
        /// Actual frame length
        actual: usize,
    },

    /// IP version nibble is not 4
    #[error("not an IPv4 packet (version {0})")]
    NotIpv4(u8),

    /// IHL smaller than the minimum IPv4 header
    #[error("invalid IPv4 header length {0}")]
    BadHeaderLength(usize),

    /// Transport protocol is not UDP
    #[error("not a UDP packet (protocol {0})")]
    NotUdp(u8),

    /// UDP destination port is not 53
    #[error("not addressed to DNS (port {0})")]
    NotDns(u16),

    /// A label claims more bytes than remain in the frame
    #[error("label at offset {offset} runs past end of frame")]
    Truncated {
        /// Offset of the offending length byte
        offset: usize,
    },

    /// Question section holds no labels
    #[error("empty question name")]
    EmptyName,

    /// Label length or content is not a plain hostname label
    #[error("invalid label at offset {offset}")]
    InvalidLabel {
        /// Offset of the offending length byte
        offset: usize,
    },

    /// A name handed to the frame builder has a label over 63 bytes
    #[error("label of {len} bytes exceeds the 63 byte limit")]
    LabelTooLong {
        /// Length of the offending label
        len: usize,
    },
}

/// A decoded outbound DNS question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuery {
    /// Lowercased question name without trailing dot
    pub name: String,
    /// DNS transaction id
    pub transaction_id: u16,
    /// Sender address
    pub src_addr: Ipv4Addr,
    /// Resolver address
    pub dst_addr: Ipv4Addr,
    /// Sender UDP port
    pub src_port: u16,
}

impl fmt::Display for DnsQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}:{} -> {}:53, id {:#06x})",
            self.name, self.src_addr, self.src_port, self.dst_addr, self.transaction_id
        )
    }
}

/// Decode the queried hostname from a raw frame.
///
/// Returns `None` for anything that is not a well-formed IPv4/UDP/53 query.
pub fn decode_query(frame: &[u8]) -> Option<String> {
    parse_query(frame).ok().map(|q| q.name)
}

/// Parse a raw frame into a [`DnsQuery`], reporting why it was rejected.
pub fn parse_query(frame: &[u8]) -> Result<DnsQuery, DnsQueryError> {
    let len = frame.len();
    if len < MIN_FRAME_LEN {
        return Err(DnsQueryError::TooShort {
            expected: MIN_FRAME_LEN,
            actual: len,
        });
    }

    let version = frame[0] >> 4;
    if version != 4 {
        return Err(DnsQueryError::NotIpv4(version));
    }

    let header_len = usize::from(frame[0] & 0x0F) * 4;
    if header_len < IPV4_MIN_HEADER_LEN {
        return Err(DnsQueryError::BadHeaderLength(header_len));
    }
    if len < header_len + UDP_HEADER_LEN {
        return Err(DnsQueryError::TooShort {
            expected: header_len + UDP_HEADER_LEN,
            actual: len,
        });
    }

    let proto = frame[9];
    if proto != protocol::UDP {
        return Err(DnsQueryError::NotUdp(proto));
    }

    let src_port = u16::from_be_bytes([frame[header_len], frame[header_len + 1]]);
    let dst_port = u16::from_be_bytes([frame[header_len + 2], frame[header_len + 3]]);
    if dst_port != ports::DNS {
        return Err(DnsQueryError::NotDns(dst_port));
    }

    let dns_start = header_len + UDP_HEADER_LEN;
    let question_start = dns_start + DNS_HEADER_LEN;
    if question_start >= len {
        return Err(DnsQueryError::TooShort {
            expected: question_start + 1,
            actual: len,
        });
    }

    let name = read_name(frame, question_start)?;

    Ok(DnsQuery {
        name,
        transaction_id: u16::from_be_bytes([frame[dns_start], frame[dns_start + 1]]),
        src_addr: Ipv4Addr::new(frame[12], frame[13], frame[14], frame[15]),
        dst_addr: Ipv4Addr::new(frame[16], frame[17], frame[18], frame[19]),
        src_port,
    })
}

/// Read a sequence of length-prefixed labels starting at `offset`.
///
/// Reaching the end of the frame without a terminator ends the name.
fn read_name(frame: &[u8], offset: usize) -> Result<String, DnsQueryError> {
    let mut name = String::new();
    let mut pos = offset;

    while pos < frame.len() {
        let label_len = usize::from(frame[pos]);
        if label_len == 0 {
            break;
        }
        if label_len > MAX_LABEL_LEN {
            return Err(DnsQueryError::InvalidLabel { offset: pos });
        }
        if pos + label_len + 1 > frame.len() {
            return Err(DnsQueryError::Truncated { offset: pos });
        }

        let label = &frame[pos + 1..pos + 1 + label_len];
        if !label.iter().copied().all(is_hostname_byte) {
            return Err(DnsQueryError::InvalidLabel { offset: pos });
        }

        if !name.is_empty() {
            name.push('.');
        }
        name.extend(label.iter().map(|b| char::from(b.to_ascii_lowercase())));
        if name.len() > MAX_HOSTNAME_LEN {
            return Err(DnsQueryError::InvalidLabel { offset: pos });
        }

        pos += label_len + 1;
    }

    if name.is_empty() {
        return Err(DnsQueryError::EmptyName);
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::DnsQueryBuilder;

    fn question(labels: &[&str]) -> Vec<u8> {
        let mut out = Vec::new();
        for label in labels {
            out.push(label.len() as u8);
            out.extend_from_slice(label.as_bytes());
        }
        out.push(0);
        out
    }

    #[test]
    fn test_read_name_simple() {
        let q = question(&["example", "com"]);
        assert_eq!(read_name(&q, 0).unwrap(), "example.com");
    }

    #[test]
    fn test_read_name_subdomain() {
        let q = question(&["www", "example", "com"]);
        assert_eq!(read_name(&q, 0).unwrap(), "www.example.com");
    }

    #[test]
    fn test_read_name_empty() {
        assert_eq!(read_name(&[0], 0), Err(DnsQueryError::EmptyName));
    }

    #[test]
    fn test_read_name_truncated_label() {
        // Claims 7 bytes, only 3 follow
        let q = [7, b'e', b'x', b'a'];
        assert_eq!(read_name(&q, 0), Err(DnsQueryError::Truncated { offset: 0 }));
    }

    #[test]
    fn test_read_name_without_terminator() {
        let q = [3, b'f', b'o', b'o'];
        assert_eq!(read_name(&q, 0).unwrap(), "foo");
    }

    #[test]
    fn test_read_name_rejects_url_bytes() {
        let q = question(&["evil@starbucks", "com"]);
        assert_eq!(read_name(&q, 0), Err(DnsQueryError::InvalidLabel { offset: 0 }));

        let q = question(&["starbucks", "com/x"]);
        assert_eq!(read_name(&q, 0), Err(DnsQueryError::InvalidLabel { offset: 10 }));
    }

    #[test]
    fn test_read_name_accepts_underscore() {
        let q = question(&["_sip", "example", "com"]);
        assert_eq!(read_name(&q, 0).unwrap(), "_sip.example.com");
    }

    #[test]
    fn test_read_name_rejects_pointer() {
        let q = [0xC0, 0x0C];
        assert_eq!(read_name(&q, 0), Err(DnsQueryError::InvalidLabel { offset: 0 }));
    }

    #[test]
    fn test_parse_query_fields() {
        let frame = DnsQueryBuilder::new("Store.Starbucks.com")
            .src_ip([10, 0, 0, 2])
            .dst_ip([8, 8, 8, 8])
            .src_port(40000)
            .transaction_id(0xBEEF)
            .build()
            .unwrap();

        let query = parse_query(&frame).unwrap();
        assert_eq!(query.name, "store.starbucks.com");
        assert_eq!(query.src_addr, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(query.dst_addr, Ipv4Addr::new(8, 8, 8, 8));
        assert_eq!(query.src_port, 40000);
        assert_eq!(query.transaction_id, 0xBEEF);
    }

    #[test]
    fn test_parse_query_short_frame() {
        assert_eq!(
            parse_query(&[0u8; 10]),
            Err(DnsQueryError::TooShort { expected: 28, actual: 10 })
        );
        assert_eq!(decode_query(&[]), None);
    }

    #[test]
    fn test_parse_query_ipv6() {
        let mut frame = DnsQueryBuilder::new("example.com").build().unwrap();
        frame[0] = 0x60;
        assert_eq!(parse_query(&frame), Err(DnsQueryError::NotIpv4(6)));
    }

    #[test]
    fn test_parse_query_tcp() {
        let mut frame = DnsQueryBuilder::new("example.com").build().unwrap();
        frame[9] = 6;
        assert_eq!(parse_query(&frame), Err(DnsQueryError::NotUdp(6)));
    }

    #[test]
    fn test_parse_query_other_port() {
        let frame = DnsQueryBuilder::new("example.com").dst_port(443).build().unwrap();
        assert_eq!(parse_query(&frame), Err(DnsQueryError::NotDns(443)));
    }

    #[test]
    fn test_parse_query_bad_ihl() {
        let mut frame = DnsQueryBuilder::new("example.com").build().unwrap();
        frame[0] = 0x42;
        assert_eq!(parse_query(&frame), Err(DnsQueryError::BadHeaderLength(8)));
    }

    #[test]
    fn test_parse_query_with_ip_options() {
        let frame = DnsQueryBuilder::new("picket.example.org")
            .ip_options(&[0x01, 0x01, 0x01, 0x00])
            .build()
            .unwrap();
        assert_eq!(frame[0] & 0x0F, 6);
        assert_eq!(decode_query(&frame).as_deref(), Some("picket.example.org"));
    }

    #[test]
    fn test_parse_query_header_only() {
        // IPv4 + UDP + DNS header, nothing after it
        let frame = DnsQueryBuilder::new("example.com").build().unwrap();
        let cut = &frame[..40];
        assert!(matches!(parse_query(cut), Err(DnsQueryError::TooShort { .. })));
    }

    #[test]
    fn test_display() {
        let frame = DnsQueryBuilder::new("example.com").transaction_id(1).build().unwrap();
        let query = parse_query(&frame).unwrap();
        assert!(query.to_string().starts_with("example.com ("));
    }
}
