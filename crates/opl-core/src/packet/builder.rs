//! DNS query frame builder

use super::{
    ports, protocol, DnsQueryError, DNS_HEADER_LEN, IPV4_MIN_HEADER_LEN, MAX_LABEL_LEN,
    UDP_HEADER_LEN,
};
use bytes::{BufMut, BytesMut};

/// Builder for IPv4/UDP frames carrying a single DNS question
///
/// Produces the same shape of frame a device writes into the tunnel when
/// it resolves a name. Checksums are left zeroed.
pub struct DnsQueryBuilder {
    name: String,
    src_ip: [u8; 4],
    dst_ip: [u8; 4],
    src_port: u16,
    dst_port: u16,
    transaction_id: u16,
    ip_options: Vec<u8>,
}

impl DnsQueryBuilder {
    /// Create a builder for an `A IN` query of `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            src_ip: [10, 0, 0, 2],
            dst_ip: [8, 8, 8, 8],
            src_port: 53000,
            dst_port: ports::DNS,
            transaction_id: 0x1234,
            ip_options: Vec::new(),
        }
    }

    /// Set source IP
    pub fn src_ip(mut self, ip: [u8; 4]) -> Self {
        self.src_ip = ip;
        self
    }

    /// Set destination IP
    pub fn dst_ip(mut self, ip: [u8; 4]) -> Self {
        self.dst_ip = ip;
        self
    }

    /// Set source port
    pub fn src_port(mut self, port: u16) -> Self {
        self.src_port = port;
        self
    }

    /// Set destination port
    pub fn dst_port(mut self, port: u16) -> Self {
        self.dst_port = port;
        self
    }

    /// Set DNS transaction id
    pub fn transaction_id(mut self, id: u16) -> Self {
        self.transaction_id = id;
        self
    }

    /// Append IPv4 options (padded to a 4-byte boundary)
    pub fn ip_options(mut self, options: &[u8]) -> Self {
        self.ip_options = options.to_vec();
        while self.ip_options.len() % 4 != 0 {
            self.ip_options.push(0);
        }
        self
    }

    fn question(&self) -> Result<Vec<u8>, DnsQueryError> {
        let mut out = Vec::with_capacity(self.name.len() + 6);
        for label in self.name.trim_end_matches('.').split('.') {
            if label.is_empty() {
                continue;
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(DnsQueryError::LabelTooLong { len: label.len() });
            }
            out.push(label.len() as u8);
            out.extend_from_slice(label.as_bytes());
        }
        out.push(0);
        out.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]); // QTYPE A, QCLASS IN
        Ok(out)
    }

    /// Build the frame.
    ///
    /// Fails if any label of the name is longer than 63 bytes.
    pub fn build(self) -> Result<Vec<u8>, DnsQueryError> {
        let question = self.question()?;
        let ip_header_len = IPV4_MIN_HEADER_LEN + self.ip_options.len();
        let udp_len = UDP_HEADER_LEN + DNS_HEADER_LEN + question.len();
        let total_len = ip_header_len + udp_len;

        let mut frame = BytesMut::with_capacity(total_len);

        // IPv4 header
        frame.put_u8(0x40 | (ip_header_len / 4) as u8); // Version (4) + IHL
        frame.put_u8(0x00); // DSCP + ECN
        frame.put_u16(total_len as u16);
        frame.put_u16(0x0000); // Identification
        frame.put_u16(0x4000); // Flags (DF) + Fragment Offset
        frame.put_u8(64); // TTL
        frame.put_u8(protocol::UDP);
        frame.put_u16(0x0000); // Header Checksum (placeholder)
        frame.put_slice(&self.src_ip);
        frame.put_slice(&self.dst_ip);
        frame.put_slice(&self.ip_options);

        // UDP header
        frame.put_u16(self.src_port);
        frame.put_u16(self.dst_port);
        frame.put_u16(udp_len as u16);
        frame.put_u16(0x0000); // Checksum (placeholder)

        // DNS header
        frame.put_u16(self.transaction_id);
        frame.put_u16(0x0100); // Standard query, RD
        frame.put_u16(1); // QDCOUNT
        frame.put_u16(0); // ANCOUNT
        frame.put_u16(0); // NSCOUNT
        frame.put_u16(0); // ARCOUNT

        frame.put_slice(&question);

        Ok(frame.to_vec())
    }
}
