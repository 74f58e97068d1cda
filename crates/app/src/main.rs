//! flowtrace: capture, synthesize and analyze flow locality traces.
//!
//! Modes:
//! - `zipf`: synthetic Zipf locality file
//! - `pcap`: flow locality, sizes and timestamps from capture archives
//! - `analyze`: sliding-window reuse ratio of a locality file
//! - `cdf`: stack-distance CDF of a locality file
//! - `synth`: synthetic capture archive

mod config;
mod trace_gen;

use clap::Parser;
use config::{AnalyzeConfig, CdfConfig, Cli, Config, Mode, PcapConfig, SynthConfig, ZipfConfig};
use flowtrace_core::{
    capture::TraceReader,
    reuse::{stack_distance_cdf, write_reuse_ratios},
    sequence::{read_sequence, write_sequence, SequenceReader},
    zipf::{report_head_mass, ZipfSource},
    Error, Logger, Result,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let mut log = Logger::console();
    ExitCode::from(execute(Cli::parse(), &mut log))
}

/// Run one mode and report a failure on `log`. Returns the exit status.
fn execute(cli: Cli, log: &mut Logger) -> u8 {
    match run(cli, log) {
        Ok(()) => 0,
        Err(e) => {
            log.line(format!("Error: {}", e));
            1
        }
    }
}

fn run(cli: Cli, log: &mut Logger) -> Result<()> {
    let config = Config::from_cli(cli)?;
    if config.print_config {
        log.message(config.print());
    }
    tracing::info!(seed = config.seed, "starting");

    match &config.mode {
        Mode::Zipf(c) => run_zipf(c, config.seed, log),
        Mode::Pcap(c) => run_pcap(c, log),
        Mode::Analyze(c) => run_analyze(c, log),
        Mode::Cdf(c) => run_cdf(c, log),
        Mode::Synth(c) => run_synth(c, config.seed, log),
    }
}

fn run_zipf(config: &ZipfConfig, seed: u64, log: &mut Logger) -> Result<()> {
    log.line("Mode: Zipf locality");
    let mut source = ZipfSource::new(config.n, config.alpha, seed)?;
    let sequence = source.generate(config.count, log);
    report_head_mass(&sequence, config.n, log);

    log.line(format!("Writing locality to \"{}\"", config.out.display()));
    write_sequence(&config.out, &sequence)
}

fn run_pcap(config: &PcapConfig, log: &mut Logger) -> Result<()> {
    log.line("Mode: PCAP analysis");
    let mut reader = TraceReader::new();
    for archive in &config.archives {
        log.line(format!("Parsing PCAP file \"{}\"...", archive.display()));
        let extracted = reader.read_file(archive, config.limit, log)?;
        log.line(format!("\rExtracted {} values", extracted));
    }
    log.line(format!("Total extracted: {} values", reader.locality().len()));

    if let Some(path) = &config.out {
        log.line(format!("Writing locality to \"{}\"", path.display()));
        write_sequence(path, reader.locality())?;
    }
    if let Some(path) = &config.out_sizes {
        log.line(format!("Writing packet sizes to \"{}\"", path.display()));
        write_sequence(path, reader.sizes())?;
    }
    if let Some(path) = &config.out_times {
        log.line(format!("Writing timestamps to \"{}\"", path.display()));
        write_sequence(path, reader.timestamps())?;
    }

    let stats = reader.finish_stats();
    stats.print_summary(log);
    tracing::debug!(summary = %stats.export_text(), "pcap run finished");
    Ok(())
}

fn run_analyze(config: &AnalyzeConfig, log: &mut Logger) -> Result<()> {
    log.line(format!(
        "Mode: locality analysis (window {}, step {})",
        config.window, config.step
    ));
    let values = SequenceReader::open(&config.input)?;

    let emitted = match &config.out {
        Some(path) => {
            let write_err = |source| Error::FileWrite {
                path: path.clone(),
                source,
            };
            let file = File::create(path).map_err(write_err)?;
            let out = BufWriter::new(file);
            write_reuse_ratios(values, config.window, config.step, out, log).map_err(|e| match e {
                Error::Io(source) => write_err(source),
                other => other,
            })?
        }
        None => {
            let stdout = std::io::stdout();
            write_reuse_ratios(values, config.window, config.step, stdout.lock(), log)?
        }
    };
    log.line(format!("Wrote {} ratios", emitted));
    Ok(())
}

fn run_cdf(config: &CdfConfig, log: &mut Logger) -> Result<()> {
    log.line(format!("Reading locality from \"{}\"", config.input.display()));
    let sequence = read_sequence(&config.input, log)?;
    let cdf = stack_distance_cdf(&sequence, config.window, log)?;

    let mut text = Vec::new();
    writeln!(text, "Results: index CDF")?;
    cdf.write_to(&mut text)?;
    log.message(String::from_utf8_lossy(&text));
    Ok(())
}

fn run_synth(config: &SynthConfig, seed: u64, log: &mut Logger) -> Result<()> {
    log.line(format!(
        "Mode: synthetic capture ({} flows, {} packets)",
        config.flows, config.count
    ));
    let written = trace_gen::write_synthetic_archive(config, seed, log)?;
    log.line(format!("Wrote {} packets to \"{}\"", written, config.out.display()));
    Ok(())
}
