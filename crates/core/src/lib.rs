//! flowtrace-core: packet synthesis/parsing and reuse-distance analysis
//!
//! This library converts between captured network traffic and compact
//! statistical representations used for cache/locality research:
//! - Synthesizes minimal Ethernet/IPv4/{TCP,UDP,ICMP} packets tagged with a
//!   rule priority
//! - Parses captured packets back into 5-tuples and dense flow IDs
//! - Estimates temporal locality of the resulting flow-reference sequence
//!   (stack-distance CDF, sliding-window reuse ratio)
//! - Generates Zipf-distributed reference sequences for comparison
//!
//! # Architecture
//!
//! - `checksum`: Internet checksums for IPv4/TCP/UDP/ICMP
//! - `packet`: Frame encode/decode
//! - `flow`: Dense first-seen flow IDs
//! - `capture`: pcap archive reading and writing
//! - `reuse`: Stack-distance and reuse-ratio analyzers
//! - `zipf`: Seeded Zipf locality source
//! - `sequence`: One-integer-per-line locality files
//! - `log`: Operator message log with pluggable sinks
//! - `metrics`: Extraction run statistics
//!
//! # Design Principles
//!
//! - **No panics**: Malformed input yields structured errors
//! - **Deterministic**: Seeded randomness makes runs reproducible
//! - **Single pass**: Every run reads its inputs once and fails fast

pub mod capture;
pub mod checksum;
pub mod error;
pub mod flow;
pub mod log;
pub mod metrics;
pub mod packet;
pub mod reuse;
pub mod sequence;
pub mod zipf;

// Re-export commonly used types
pub use error::{Error, Result};
pub use flow::FlowIndex;
pub use log::Logger;
pub use packet::{FiveTuple, IpProtocol, TracePacket};
