//! Packet-capture archives.
//!
//! [`CaptureWriter`] encodes [`TracePacket`]s into a classic pcap file
//! (Ethernet link type, microsecond timestamps, captured length equal to
//! original length, snaplen large enough for any encodable frame). [`TraceReader`] reads one or more archives and turns
//! them into a locality sequence through a shared [`FlowIndex`].
//!
//! # Link layers
//!
//! | link type   | handling                                           |
//! |-------------|----------------------------------------------------|
//! | Ethernet    | non-IPv4 EtherTypes filtered, 14-byte header strip |
//! | Raw / IPv4  | records without version 4 filtered                 |
//! | other       | `ArchiveError::UnsupportedLinkType`                |
//!
//! Records cut short by the archive snaplen are accepted: sizes come from the
//! original length and only the captured bytes are decoded.

use crate::error::{ArchiveError, Result};
use crate::flow::FlowIndex;
use crate::log::Logger;
use crate::metrics::TraceStats;
use crate::packet::{decode, encode, strip_ethernet, TracePacket};
use pcap_file::pcap::{PcapHeader, PcapPacket, PcapReader, PcapWriter};
use pcap_file::{DataLink, TsResolution};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

/// Snaplen written to archives (libpcap's maximum).
pub const SNAPLEN: u32 = 262_144;

/// Writes synthesized packets to a pcap archive.
pub struct CaptureWriter<W: Write> {
    writer: PcapWriter<W>,
    written: u64,
}

impl CaptureWriter<BufWriter<File>> {
    /// Create (or truncate) an archive at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|err| ArchiveError::Open {
            name: path.display().to_string(),
            reason: err.to_string(),
        })?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> CaptureWriter<W> {
    /// Write the global header to `inner`.
    pub fn new(inner: W) -> Result<Self> {
        let header = PcapHeader {
            snaplen: SNAPLEN,
            datalink: DataLink::ETHERNET,
            ts_resolution: TsResolution::MicroSecond,
            ..Default::default()
        };
        let writer = PcapWriter::with_header(inner, header)
            .map_err(|err| ArchiveError::Write(err.to_string()))?;
        Ok(Self { writer, written: 0 })
    }

    /// Encode `packet` and append it as one record. Returns the frame length.
    pub fn append(&mut self, packet: &TracePacket) -> Result<usize> {
        let frame = encode(packet)?;
        let record = PcapPacket::new(
            Duration::from_micros(packet.timestamp),
            frame.len() as u32,
            &frame,
        );
        self.writer
            .write_packet(&record)
            .map_err(|err| ArchiveError::Write(err.to_string()))?;
        self.written += 1;
        Ok(frame.len())
    }

    /// Number of records written.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush and return the underlying writer.
    pub fn finish(self) -> Result<W> {
        let mut inner = self.writer.into_writer();
        inner.flush()?;
        Ok(inner)
    }
}

/// Reads archives into a locality sequence plus per-packet sizes and times.
///
/// The flow index persists across calls, so reading several archives in a
/// row yields consistent flow IDs.
#[derive(Debug, Default)]
pub struct TraceReader {
    index: FlowIndex,
    locality: Vec<u64>,
    sizes: Vec<u64>,
    timestamps: Vec<u64>,
    stats: TraceStats,
}

impl TraceReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the archive at `path`. See [`TraceReader::read_from`].
    pub fn read_file(&mut self, path: &Path, limit: Option<usize>, log: &mut Logger) -> Result<usize> {
        let name = path.display().to_string();
        let file = File::open(path).map_err(|err| ArchiveError::Open {
            name: name.clone(),
            reason: err.to_string(),
        })?;
        self.read_from(&name, BufReader::new(file), limit, log)
    }

    /// Read records from `reader` until the end or until `limit` packets
    /// have been extracted. Returns the number of packets extracted.
    ///
    /// # Errors
    /// - `ArchiveError::Open` for an invalid global header
    /// - `ArchiveError::UnsupportedLinkType` for link types other than
    ///   Ethernet or raw IPv4
    /// - `ArchiveError::Read` for a truncated or corrupt record, or one whose
    ///   captured length exceeds its original length
    /// - `CodecError` if an IPv4 packet is too short to decode
    pub fn read_from<R: Read>(
        &mut self,
        name: &str,
        reader: R,
        limit: Option<usize>,
        log: &mut Logger,
    ) -> Result<usize> {
        let mut reader = PcapReader::new(reader).map_err(|err| ArchiveError::Open {
            name: name.to_string(),
            reason: err.to_string(),
        })?;

        let header = reader.header();
        let link_type = header.datalink;
        let strip: fn(&[u8]) -> Result<Option<&[u8]>> = match link_type {
            DataLink::ETHERNET => strip_ethernet,
            DataLink::RAW | DataLink::IPV4 => raw_ipv4,
            other => {
                return Err(ArchiveError::UnsupportedLinkType {
                    name: name.to_string(),
                    link_type: format!("{:?}", other),
                }
                .into())
            }
        };
        tracing::debug!(name, ?link_type, "archive opened");

        let mut record = 0u64;
        let mut extracted = 0usize;
        let label = format!("Parsing \"{}\"", name);
        while let Some(packet) = reader.next_raw_packet() {
            if limit.is_some_and(|limit| extracted >= limit) {
                break;
            }
            record += 1;

            let packet = packet.map_err(|err| ArchiveError::Read {
                name: name.to_string(),
                record,
                reason: err.to_string(),
            })?;
            if packet.incl_len > packet.orig_len {
                return Err(ArchiveError::Read {
                    name: name.to_string(),
                    record,
                    reason: format!(
                        "captured length {} exceeds original length {}",
                        packet.incl_len, packet.orig_len
                    ),
                }
                .into());
            }
            self.stats.records_read += 1;

            let Some(ip_packet) = strip(packet.data.as_ref())? else {
                self.stats.records_filtered += 1;
                continue;
            };

            let tuple = decode(ip_packet)?;
            let id = self.index.lookup_or_insert(&tuple);
            self.locality.push(id);
            self.sizes.push(packet.orig_len as u64);
            self.timestamps
                .push(record_micros(packet.ts_sec, packet.ts_frac, header.ts_resolution));
            self.stats.bytes += packet.orig_len as u64;
            extracted += 1;

            log.tick(&label, extracted);
        }

        self.stats.archives_read += 1;
        self.stats.packets_extracted += extracted as u64;
        self.stats.distinct_flows = self.index.len() as u64;
        tracing::debug!(name, records = record, extracted, flows = self.index.len(), "archive read");
        Ok(extracted)
    }

    /// Flow ID of every extracted packet, in capture order.
    pub fn locality(&self) -> &[u64] {
        &self.locality
    }

    /// Original wire length of every extracted packet.
    pub fn sizes(&self) -> &[u64] {
        &self.sizes
    }

    /// Timestamp (microseconds) of every extracted packet.
    pub fn timestamps(&self) -> &[u64] {
        &self.timestamps
    }

    pub fn flows(&self) -> &FlowIndex {
        &self.index
    }

    pub fn stats(&self) -> &TraceStats {
        &self.stats
    }

    /// Mark the run complete and return its statistics.
    pub fn finish_stats(&mut self) -> &TraceStats {
        self.stats.complete();
        &self.stats
    }
}

/// Record timestamp in microseconds since the epoch.
fn record_micros(ts_sec: u32, ts_frac: u32, resolution: TsResolution) -> u64 {
    let frac_us = match resolution {
        TsResolution::MicroSecond => ts_frac as u64,
        TsResolution::NanoSecond => ts_frac as u64 / 1000,
    };
    ts_sec as u64 * 1_000_000 + frac_us
}

fn raw_ipv4(packet: &[u8]) -> Result<Option<&[u8]>> {
    match packet.first() {
        Some(byte) if byte >> 4 == 4 => Ok(Some(packet)),
        _ => Ok(None),
    }
}
