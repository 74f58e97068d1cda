//! Internet checksums for IPv4, TCP, UDP and ICMP echo.
//!
//! All routines compute the one's complement of the one's complement sum of
//! big-endian 16-bit words (RFC 1071). An odd trailing byte is treated as the
//! high byte of a final word whose low byte is zero.
//!
//! The header/segment variants zero the checksum field of their input before
//! summing and return the value to be stored there. They never write the
//! result back; the caller patches it in with `to_be_bytes`.
//!
//! # Field offsets
//!
//! ```text
//! IPv4 header   checksum at bytes 10..12
//! TCP segment   checksum at bytes 16..18
//! UDP datagram  length at 4..6, checksum at 6..8
//! ICMP message  checksum at bytes 2..4
//! ```

use crate::error::{CodecError, Result};
use crate::packet::{IpProtocol, IPV4_HEADER_LEN};

const IPV4_CHECKSUM: usize = 10;
const TCP_CHECKSUM: usize = 16;
const UDP_LENGTH: usize = 4;
const UDP_CHECKSUM: usize = 6;
const ICMP_CHECKSUM: usize = 2;

/// Checksum of an arbitrary byte buffer.
pub fn checksum16(bytes: &[u8]) -> u16 {
    fold(sum_words(bytes))
}

/// Zero the IPv4 header checksum field and compute it over `IHL * 4` bytes.
pub fn ipv4_checksum(header: &mut [u8]) -> Result<u16> {
    let header_len = ipv4_header_len(header)?;
    header[IPV4_CHECKSUM..IPV4_CHECKSUM + 2].fill(0);
    Ok(checksum16(&header[..header_len]))
}

/// Zero the TCP checksum field and compute it over pseudo-header + segment.
///
/// The segment length is taken from the IPv4 total length minus the IPv4
/// header length, as carried in `ip_header`.
pub fn tcp_checksum(ip_header: &[u8], segment: &mut [u8]) -> Result<u16> {
    let len = ipv4_payload_len(ip_header)?;
    CodecError::ensure_len(segment, len.max(TCP_CHECKSUM + 2), "TCP segment shorter than IPv4 length")?;
    segment[TCP_CHECKSUM..TCP_CHECKSUM + 2].fill(0);

    let sum = pseudo_header_sum(ip_header, IpProtocol::TCP, len as u16)? + sum_words(&segment[..len]);
    Ok(fold(sum))
}

/// Zero the UDP checksum field and compute it over pseudo-header + datagram.
///
/// The datagram length is taken from the UDP length field. A computed value
/// of zero is returned as `0xFFFF` since zero means "no checksum" (RFC 768).
pub fn udp_checksum(ip_header: &[u8], datagram: &mut [u8]) -> Result<u16> {
    CodecError::ensure_len(datagram, UDP_CHECKSUM + 2, "UDP header truncated")?;
    let len = u16::from_be_bytes([datagram[UDP_LENGTH], datagram[UDP_LENGTH + 1]]);
    CodecError::ensure_len(datagram, len as usize, "UDP datagram shorter than its length field")?;
    datagram[UDP_CHECKSUM..UDP_CHECKSUM + 2].fill(0);

    let sum = pseudo_header_sum(ip_header, IpProtocol::UDP, len)? + sum_words(&datagram[..len as usize]);
    match fold(sum) {
        0 => Ok(0xFFFF),
        checksum => Ok(checksum),
    }
}

/// Zero the ICMP checksum field and compute it over the whole message.
///
/// ICMP has no pseudo-header; `ip_header` only provides the message length.
pub fn icmp_echo_checksum(ip_header: &[u8], message: &mut [u8]) -> Result<u16> {
    let len = ipv4_payload_len(ip_header)?;
    CodecError::ensure_len(message, len.max(ICMP_CHECKSUM + 2), "ICMP message shorter than IPv4 length")?;
    message[ICMP_CHECKSUM..ICMP_CHECKSUM + 2].fill(0);
    Ok(checksum16(&message[..len]))
}

/// Sum big-endian 16-bit words without folding.
fn sum_words(bytes: &[u8]) -> u64 {
    let mut chunks = bytes.chunks_exact(2);
    let mut sum: u64 = chunks
        .by_ref()
        .map(|word| u16::from_be_bytes([word[0], word[1]]) as u64)
        .sum();
    if let [last] = chunks.remainder() {
        sum += (*last as u64) << 8;
    }
    sum
}

/// Fold carries back into the low 16 bits, then invert.
fn fold(mut sum: u64) -> u16 {
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

/// Source address, destination address, zero + protocol, L4 length.
fn pseudo_header_sum(ip_header: &[u8], protocol: IpProtocol, len: u16) -> Result<u64> {
    CodecError::ensure_len(ip_header, IPV4_HEADER_LEN, "IPv4 header truncated")?;
    Ok(sum_words(&ip_header[12..20]) + protocol.0 as u64 + len as u64)
}

fn ipv4_header_len(header: &[u8]) -> Result<usize> {
    CodecError::ensure_len(header, IPV4_HEADER_LEN, "IPv4 header truncated")?;
    let header_len = ((header[0] & 0x0F) as usize) * 4;
    if header_len < IPV4_HEADER_LEN {
        return Err(CodecError::MalformedFrame {
            reason: "IPv4 IHL below minimum",
            required: IPV4_HEADER_LEN,
            actual: header_len,
        }
        .into());
    }
    CodecError::ensure_len(header, header_len, "IPv4 header shorter than IHL")?;
    Ok(header_len)
}

/// IPv4 total length minus header length.
fn ipv4_payload_len(ip_header: &[u8]) -> Result<usize> {
    let header_len = ipv4_header_len(ip_header)?;
    let total_len = u16::from_be_bytes([ip_header[2], ip_header[3]]) as usize;
    if total_len < header_len {
        return Err(CodecError::MalformedFrame {
            reason: "IPv4 total length below header length",
            required: header_len,
            actual: total_len,
        }
        .into());
    }
    Ok(total_len - header_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Well-known sample header with checksum 0xb861 in place
    const SAMPLE_IPV4: [u8; 20] = [
        0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0xb8, 0x61, 0xc0, 0xa8, 0x00, 0x01,
        0xc0, 0xa8, 0x00, 0xc7,
    ];

    #[test]
    fn test_known_ipv4_checksum() {
        let mut header = SAMPLE_IPV4;
        let checksum = ipv4_checksum(&mut header).unwrap();
        assert_eq!(checksum, 0xb861);
        // Field was zeroed before summing
        assert_eq!(&header[10..12], &[0, 0]);
    }

    #[test]
    fn test_checksum_of_checksummed_header_is_zero() {
        // Summing a header with its correct checksum in place yields 0
        assert_eq!(checksum16(&SAMPLE_IPV4), 0);
    }

    #[test]
    fn test_odd_length_pads_low_byte() {
        // 0x0102 + 0x0300 = 0x0402
        assert_eq!(checksum16(&[0x01, 0x02, 0x03]), !0x0402);
    }

    #[test]
    fn test_carry_folding() {
        // 0xFFFF + 0xFFFF = 0x1FFFE -> 0xFFFF -> inverted 0x0000
        assert_eq!(checksum16(&[0xFF, 0xFF, 0xFF, 0xFF]), 0x0000);
        // 0xFFFF + 0x0001 = 0x10000 -> 0x0001 -> inverted 0xFFFE
        assert_eq!(checksum16(&[0xFF, 0xFF, 0x00, 0x01]), 0xFFFE);
    }

    #[test]
    fn test_empty_buffer() {
        assert_eq!(checksum16(&[]), 0xFFFF);
    }

    #[test]
    fn test_udp_zero_maps_to_ffff() {
        // Choose a datagram whose sum is exactly 0xFFFF so the folded result is 0.
        let mut ip = [0u8; 20];
        ip[0] = 0x45;
        ip[3] = 28;
        // pseudo header: addresses 0, protocol 17, length 8
        // datagram words: source port, length 8
        let ports: u16 = 0xFFFF - 17 - 8 - 8;
        let mut datagram = [0u8; 8];
        datagram[0..2].copy_from_slice(&ports.to_be_bytes());
        datagram[4..6].copy_from_slice(&8u16.to_be_bytes());
        assert_eq!(udp_checksum(&ip, &mut datagram).unwrap(), 0xFFFF);
    }

    #[test]
    fn test_truncated_inputs_are_rejected() {
        let mut short = [0x45u8; 10];
        assert!(ipv4_checksum(&mut short).is_err());

        let mut ip = [0u8; 20];
        ip[0] = 0x45;
        ip[3] = 60; // claims a 40 byte TCP segment
        let mut segment = [0u8; 20];
        assert!(tcp_checksum(&ip, &mut segment).is_err());

        let mut datagram = [0u8; 8];
        datagram[4..6].copy_from_slice(&64u16.to_be_bytes());
        assert!(udp_checksum(&ip, &mut datagram).is_err());
    }

    #[test]
    fn test_bad_ihl_is_rejected() {
        let mut header = SAMPLE_IPV4;
        header[0] = 0x44;
        assert!(ipv4_checksum(&mut header).is_err());
    }
}
