//! Configuration for the flowtrace application.
//!
//! Parses the command line into a [`Cli`] and resolves it into a [`Config`]
//! with every default filled in, so a run can be printed and repeated.
//!
//! # Philosophy
//!
//! Each mode works with only its mandatory paths given, using the defaults
//! of the original measurement tools. Randomness comes from a single seed;
//! without `--seed` a time-based seed is chosen and printed.

use clap::{Args, Parser, Subcommand};
use flowtrace_core::{Error, Result};
use std::path::PathBuf;

/// Command line of the `flowtrace` binary.
#[derive(Parser, Debug)]
#[command(
    name = "flowtrace",
    about = "Capture, synthesize and analyze flow locality traces"
)]
pub struct Cli {
    /// Random seed for determinism (default: time-based)
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Print resolved configuration before running
    #[arg(long, global = true)]
    pub print_config: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a Zipf locality file (no input required).
    Zipf(ZipfArgs),

    /// Extract flow locality, packet sizes and timestamps from capture archives.
    Pcap(PcapArgs),

    /// Sliding-window reuse ratio over a locality file.
    Analyze(AnalyzeArgs),

    /// Stack-distance CDF of a locality file.
    Cdf(CdfArgs),

    /// Write a synthetic capture archive with Zipf-skewed flow popularity.
    Synth(SynthArgs),
}

#[derive(Args, Debug)]
pub struct ZipfArgs {
    /// Output locality file
    #[arg(long)]
    pub out: PathBuf,

    /// How many locality items to generate
    #[arg(long, alias = "zipf-count", default_value_t = 10_000_000)]
    pub count: usize,

    /// Zipf N parameter (number of available flows)
    #[arg(long = "n", alias = "zipf-n", default_value_t = 500_000)]
    pub n: u64,

    /// Zipf alpha parameter
    #[arg(long, alias = "zipf-alpha", default_value_t = 0.99)]
    pub alpha: f64,
}

#[derive(Args, Debug)]
pub struct PcapArgs {
    /// Input archives, separated by semicolon (or repeated)
    #[arg(long = "pcap", value_delimiter = ';')]
    pub archives: Vec<PathBuf>,

    /// Output file for the flow locality sequence
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Output file for packet sizes (bytes)
    #[arg(long)]
    pub out_sizes: Option<PathBuf>,

    /// Output file for packet timestamps (usec)
    #[arg(long)]
    pub out_times: Option<PathBuf>,

    /// Maximum packets to extract from each archive
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Input locality file
    #[arg(long = "in")]
    pub input: PathBuf,

    /// Output file for the ratios (default: stdout)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Window size
    #[arg(long, default_value_t = 3_000_000)]
    pub window: usize,

    /// Step size
    #[arg(long, default_value_t = 800_000)]
    pub step: usize,
}

#[derive(Args, Debug)]
pub struct CdfArgs {
    /// Input locality file
    #[arg(long = "in")]
    pub input: PathBuf,

    /// MRU window size
    #[arg(long, default_value_t = 10)]
    pub window: usize,
}

#[derive(Args, Debug)]
pub struct SynthArgs {
    /// Output capture archive
    #[arg(long)]
    pub out: PathBuf,

    /// Number of distinct flows
    #[arg(long, default_value_t = 1000)]
    pub flows: u64,

    /// Number of packets
    #[arg(long, default_value_t = 100_000)]
    pub count: usize,

    /// Zipf alpha of flow popularity
    #[arg(long, default_value_t = 0.99)]
    pub alpha: f64,

    /// Smallest packet size in bytes
    #[arg(long, default_value_t = 64)]
    pub min_size: usize,

    /// Largest packet size in bytes
    #[arg(long, default_value_t = 1500)]
    pub max_size: usize,

    /// Gap between consecutive timestamps in microseconds
    #[arg(long, default_value_t = 10)]
    pub gap_us: u64,

    /// Timestamp of the first packet in microseconds since the epoch
    #[arg(long, default_value_t = 0)]
    pub start_us: u64,
}

/// Complete configuration for a run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Seed for all randomness
    pub seed: u64,

    /// Whether to print detailed config
    pub print_config: bool,

    pub mode: Mode,
}

/// Resolved per-mode settings.
#[derive(Debug, Clone)]
pub enum Mode {
    Zipf(ZipfConfig),
    Pcap(PcapConfig),
    Analyze(AnalyzeConfig),
    Cdf(CdfConfig),
    Synth(SynthConfig),
}

#[derive(Debug, Clone)]
pub struct ZipfConfig {
    pub out: PathBuf,
    pub count: usize,
    pub n: u64,
    pub alpha: f64,
}

#[derive(Debug, Clone)]
pub struct PcapConfig {
    pub archives: Vec<PathBuf>,
    pub out: Option<PathBuf>,
    pub out_sizes: Option<PathBuf>,
    pub out_times: Option<PathBuf>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct AnalyzeConfig {
    pub input: PathBuf,
    pub out: Option<PathBuf>,
    pub window: usize,
    pub step: usize,
}

#[derive(Debug, Clone)]
pub struct CdfConfig {
    pub input: PathBuf,
    pub window: usize,
}

#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub out: PathBuf,
    pub flows: u64,
    pub count: usize,
    pub alpha: f64,
    pub min_size: usize,
    pub max_size: usize,
    pub gap_us: u64,

    /// Timestamp of the first packet (usec since epoch)
    pub start_us: u64,
}

impl Config {
    /// Resolve parsed arguments into a configuration.
    ///
    /// If --seed is provided, uses that seed for all randomness (fully deterministic).
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let seed = cli.seed.unwrap_or_else(time_seed);

        let mode = match cli.command {
            Command::Zipf(args) => Mode::Zipf(ZipfConfig {
                out: args.out,
                count: args.count,
                n: args.n,
                alpha: args.alpha,
            }),
            Command::Pcap(args) => {
                let archives: Vec<PathBuf> = args
                    .archives
                    .into_iter()
                    .filter(|p| !p.as_os_str().is_empty())
                    .collect();
                if archives.is_empty() {
                    return Err(Error::Config("no capture archive given (--pcap)".to_string()));
                }
                if args.out.is_none() && args.out_sizes.is_none() && args.out_times.is_none() {
                    return Err(Error::Config(
                        "no output path given (--out, --out-sizes or --out-times)".to_string(),
                    ));
                }
                if args.count == Some(0) {
                    return Err(Error::Config("--count must be positive".to_string()));
                }
                Mode::Pcap(PcapConfig {
                    archives,
                    out: args.out,
                    out_sizes: args.out_sizes,
                    out_times: args.out_times,
                    limit: args.count,
                })
            }
            Command::Analyze(args) => {
                if args.window == 0 || args.step == 0 || args.step > args.window {
                    return Err(Error::Config(format!(
                        "invalid window {} / step {} (need 0 < step <= window)",
                        args.window, args.step
                    )));
                }
                Mode::Analyze(AnalyzeConfig {
                    input: args.input,
                    out: args.out,
                    window: args.window,
                    step: args.step,
                })
            }
            Command::Cdf(args) => {
                if args.window == 0 {
                    return Err(Error::Config("window must be positive".to_string()));
                }
                Mode::Cdf(CdfConfig {
                    input: args.input,
                    window: args.window,
                })
            }
            Command::Synth(args) => {
                if args.flows == 0 || args.flows > u32::MAX as u64 {
                    return Err(Error::Config(format!(
                        "--flows {} out of range (1..={})",
                        args.flows,
                        u32::MAX
                    )));
                }
                if args.min_size > args.max_size {
                    return Err(Error::Config(format!(
                        "--min-size {} exceeds --max-size {}",
                        args.min_size, args.max_size
                    )));
                }
                Mode::Synth(SynthConfig {
                    out: args.out,
                    flows: args.flows,
                    count: args.count,
                    alpha: args.alpha,
                    min_size: args.min_size,
                    max_size: args.max_size,
                    gap_us: args.gap_us,
                    start_us: args.start_us,
                })
            }
        };

        Ok(Config {
            seed,
            print_config: cli.print_config,
            mode,
        })
    }

    /// Render the configuration in human-readable form.
    pub fn print(&self) -> String {
        let mut out = String::new();
        out.push_str("=== Configuration ===\n");
        out.push_str(&format!("Seed: {}\n", self.seed));

        match &self.mode {
            Mode::Zipf(c) => {
                out.push_str("Mode: zipf\n");
                out.push_str(&format!("Output file: {}\n", c.out.display()));
                out.push_str(&format!("Count: {}\n", c.count));
                out.push_str(&format!("N: {}\n", c.n));
                out.push_str(&format!("Alpha: {}\n", c.alpha));
            }
            Mode::Pcap(c) => {
                out.push_str("Mode: pcap\n");
                for archive in &c.archives {
                    out.push_str(&format!("Archive: {}\n", archive.display()));
                }
                out.push_str(&format!("Locality file: {}\n", display_opt(&c.out)));
                out.push_str(&format!("Sizes file: {}\n", display_opt(&c.out_sizes)));
                out.push_str(&format!("Times file: {}\n", display_opt(&c.out_times)));
                match c.limit {
                    Some(limit) => out.push_str(&format!("Limit: {} packets per archive\n", limit)),
                    None => out.push_str("Limit: none\n"),
                }
            }
            Mode::Analyze(c) => {
                out.push_str("Mode: analyze\n");
                out.push_str(&format!("Input file: {}\n", c.input.display()));
                out.push_str(&format!(
                    "Output file: {}\n",
                    c.out.as_ref().map_or("(stdout)".to_string(), |p| p.display().to_string())
                ));
                out.push_str(&format!("Window: {}\n", c.window));
                out.push_str(&format!("Step: {}\n", c.step));
            }
            Mode::Cdf(c) => {
                out.push_str("Mode: cdf\n");
                out.push_str(&format!("Input file: {}\n", c.input.display()));
                out.push_str(&format!("Window: {}\n", c.window));
            }
            Mode::Synth(c) => {
                out.push_str("Mode: synth\n");
                out.push_str(&format!("Output file: {}\n", c.out.display()));
                out.push_str(&format!("Flows: {}\n", c.flows));
                out.push_str(&format!("Packets: {}\n", c.count));
                out.push_str(&format!("Alpha: {}\n", c.alpha));
                out.push_str(&format!("Packet size: {}-{} bytes\n", c.min_size, c.max_size));
                out.push_str(&format!("Timestamp gap: {} us\n", c.gap_us));
            }
        }
        out
    }
}

fn display_opt(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map_or("(none)".to_string(), |p| p.display().to_string())
}

fn time_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
