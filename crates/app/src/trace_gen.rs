//! Synthetic trace generation.
//!
//! Builds a seeded population of distinct flows and a packet stream over it
//! whose flow popularity follows Zipf(flows, alpha).
//!
//! # Design
//!
//! - Flows get random IPv4 addresses and ports, protocol drawn from
//!   TCP/UDP/ICMP (ICMP flows carry zero ports)
//! - Flow rank 0 is the most popular; a packet's priority tag is its flow rank
//! - Sizes are uniform in `[min_size, max_size]`, timestamps evenly spaced
//!
//! The same seed always yields the same trace.

use crate::config::SynthConfig;
use flowtrace_core::{
    capture::CaptureWriter, zipf::ZipfSource, Error, FiveTuple, IpProtocol, Logger, Result,
    TracePacket,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::net::Ipv4Addr;

const PROTOCOLS: [IpProtocol; 3] = [IpProtocol::TCP, IpProtocol::UDP, IpProtocol::ICMP];

/// Generate `count` distinct random five-tuples.
pub fn generate_flows(rng: &mut ChaCha8Rng, count: u64) -> Vec<FiveTuple> {
    let mut seen = HashSet::with_capacity(count as usize);
    let mut flows = Vec::with_capacity(count as usize);

    while (flows.len() as u64) < count {
        let protocol = PROTOCOLS[rng.gen_range(0..PROTOCOLS.len())];
        let tuple = FiveTuple::new(
            protocol,
            Ipv4Addr::from(rng.gen::<u32>()),
            Ipv4Addr::from(rng.gen::<u32>()),
            rng.gen(),
            rng.gen(),
        );
        // Duplicates are redrawn
        if seen.insert(tuple) {
            flows.push(tuple);
        }
    }
    flows
}

/// Generate the packet stream described by `config`.
pub fn generate_trace(config: &SynthConfig, seed: u64, log: &mut Logger) -> Result<Vec<TracePacket>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let flows = generate_flows(&mut rng, config.flows);

    // Flow choice draws from its own stream
    let mut popularity = ZipfSource::new(config.flows, config.alpha, seed.wrapping_add(1))?;

    let mut packets = Vec::with_capacity(config.count);
    for i in 0..config.count {
        let rank = popularity.sample() - 1;
        let priority = u32::try_from(rank)
            .map_err(|_| Error::Config(format!("flow rank {} does not fit a priority tag", rank)))?;
        let size = rng.gen_range(config.min_size..=config.max_size);
        let timestamp = (i as u64)
            .checked_mul(config.gap_us)
            .and_then(|offset| config.start_us.checked_add(offset))
            .ok_or_else(|| Error::Config(format!("timestamp of packet {} overflows", i)))?;
        packets.push(TracePacket::new(flows[rank as usize], priority, size, timestamp));
        log.progress("Generating packets", i, config.count);
    }
    log.done("Generating packets");

    tracing::debug!(flows = flows.len(), packets = packets.len(), seed, "trace generated");
    Ok(packets)
}

/// Generate a trace and write it to the archive at `config.out`.
///
/// Returns the number of packets written.
pub fn write_synthetic_archive(config: &SynthConfig, seed: u64, log: &mut Logger) -> Result<u64> {
    let packets = generate_trace(config, seed, log)?;
    let mut writer = CaptureWriter::create(&config.out)?;
    for packet in &packets {
        writer.append(packet)?;
    }
    let written = writer.written();
    writer.finish()?;
    Ok(written)
}
