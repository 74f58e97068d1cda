//! Error types for the flowtrace system.
//!
//! All operations return structured errors rather than panicking.
//! A failed archive read or file write aborts the run; nothing is retried.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all operations in the system.
///
/// Each variant corresponds to a specific failure domain:
/// - Codec: building or parsing IPv4 packets
/// - Archive: reading or writing packet-capture files
/// - File: reading or writing flat locality files
/// - Config: a run parameter is missing or out of range
#[derive(Debug, Error)]
pub enum Error {
    /// Packet encode/decode error
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Packet-capture archive error
    #[error("capture archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Destination path could not be created or written
    #[error("cannot write to file \"{}\": {source}", path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source path could not be opened or read
    #[error("cannot read file \"{}\": {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A locality file line that is not a non-negative integer
    #[error("{}:{line}: expected a non-negative integer, got {value:?}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        value: String,
    },

    /// Other I/O error (output streams, log sinks)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Packet codec errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Encode requested for a protocol other than TCP, UDP or ICMP
    #[error("IP protocol not supported, got {0}")]
    UnsupportedProtocol(u8),

    /// Frame too short for the fields read from it
    #[error("malformed frame: {reason} (need {required} bytes, got {actual})")]
    MalformedFrame {
        reason: &'static str,
        required: usize,
        actual: usize,
    },

    /// Frame does not carry an IPv4 header
    #[error("not an IPv4 packet: version field is {version}")]
    NotIpv4 { version: u8 },

    /// Requested size does not fit the IPv4 total length field
    #[error("packet size {size} exceeds the IPv4 maximum of {max}")]
    OversizedPacket { size: usize, max: usize },
}

impl CodecError {
    /// Fail with `MalformedFrame` unless `bytes` holds at least `required` bytes.
    pub(crate) fn ensure_len(bytes: &[u8], required: usize, reason: &'static str) -> Result<()> {
        if bytes.len() < required {
            return Err(CodecError::MalformedFrame {
                reason,
                required,
                actual: bytes.len(),
            }
            .into());
        }
        Ok(())
    }
}

/// Packet-capture archive errors.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Archive missing, unreadable, or with an invalid global header
    #[error("cannot open \"{name}\": {reason}")]
    Open { name: String, reason: String },

    /// A record could not be read
    #[error("cannot read record {record} of \"{name}\": {reason}")]
    Read {
        name: String,
        record: u64,
        reason: String,
    },

    /// A record could not be written
    #[error("cannot write capture record: {0}")]
    Write(String),

    /// Link layer this reader cannot strip
    #[error("unsupported link type {link_type} in \"{name}\"")]
    UnsupportedLinkType { name: String, link_type: String },
}

/// Type alias for Result with our Error type
pub type Result<T> = std::result::Result<T, Error>;
