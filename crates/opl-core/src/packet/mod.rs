//! Packet parsing
//!
//! Just enough IPv4/UDP/DNS handling to recover the hostname a device is
//! asking for. Nothing here allocates more than the decoded name, and no
//! function mutates or keeps the frame it is given.

mod builder;
mod dns;

pub use builder::DnsQueryBuilder;
pub use dns::{decode_query, parse_query, DnsQuery, DnsQueryError};

/// Minimum IPv4 header length in bytes
pub const IPV4_MIN_HEADER_LEN: usize = 20;

/// UDP header length in bytes
pub const UDP_HEADER_LEN: usize = 8;

/// Fixed DNS header length in bytes
pub const DNS_HEADER_LEN: usize = 12;

/// Smallest frame that can carry IPv4 + UDP headers
pub const MIN_FRAME_LEN: usize = IPV4_MIN_HEADER_LEN + UDP_HEADER_LEN;

/// Maximum hostname length (DNS standard)
pub const MAX_HOSTNAME_LEN: usize = 253;

/// Maximum length of a single DNS label
pub const MAX_LABEL_LEN: usize = 63;

/// IP protocol numbers we care about
pub mod protocol {
    /// UDP (protocol number 17)
    pub const UDP: u8 = 17;
}

/// Well-known ports
pub mod ports {
    /// DNS port
    pub const DNS: u16 = 53;
}
