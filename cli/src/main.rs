//! `vmmctl` — trace replay and synthetic trace generation for the VMM
//! simulation core. Thin glue over `vmm_core`: argument parsing, trace
//! file I/O, and metric serialization live here; the simulation itself
//! lives in the library crate.

mod output;
mod rng;
mod trace_io;
mod tracegen;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn, LevelFilter};

use vmm_core::config::PageTableType;
use vmm_core::replacement::Algorithm;
use vmm_core::tlb::TlbPolicy;
use vmm_core::trace::Trace;
use vmm_core::{Config, Vmm};

use tracegen::{GenOptions, Pattern};

#[derive(Parser)]
#[command(
    name = "vmmctl",
    version,
    about = "Virtual memory manager simulator — trace replay and metrics"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Trace file to replay (required unless generating a trace).
    #[arg(short = 't', long = "trace", value_name = "FILE")]
    trace: Option<PathBuf>,

    /// Physical RAM size in megabytes.
    #[arg(short = 'r', long = "ram", default_value_t = 64)]
    ram: u32,

    /// Page size in bytes. Must be a power of two.
    #[arg(short = 'p', long = "page-size", default_value_t = 4096)]
    page_size: u32,

    /// Swap store size in megabytes.
    #[arg(short = 's', long = "swap", default_value_t = 256)]
    swap: u32,

    /// Per-process virtual address space size in megabytes.
    #[arg(short = 'v', long = "vspace", default_value_t = 4096)]
    vspace: u32,

    /// Page-replacement algorithm.
    #[arg(short = 'a', long = "algorithm", default_value = "CLOCK")]
    algorithm: Algorithm,

    /// TLB size in entries. Must be greater than zero.
    #[arg(short = 'T', long = "tlb-size", default_value_t = 64)]
    tlb_size: u32,

    /// TLB eviction policy.
    #[arg(long = "tlb-policy", default_value = "LRU")]
    tlb_policy: TlbPolicy,

    /// Page table shape.
    #[arg(long = "pt-type", default_value = "SINGLE")]
    pt_type: PageTableType,

    /// Cap on the number of references replayed.
    #[arg(short = 'n', long = "max-accesses")]
    max_accesses: Option<u64>,

    /// Seed for the deterministic PRNG (used by `gen-trace`, recorded for
    /// reproducibility even on a replayed trace).
    #[arg(long = "seed", default_value_t = 42)]
    seed: u64,

    /// Write a JSON metrics report to this file.
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<PathBuf>,

    /// Append a one-row CSV metrics summary to this file.
    #[arg(long = "csv", value_name = "FILE")]
    csv: Option<PathBuf>,

    /// Label recorded in the CSV `config` column.
    #[arg(long = "config-name", default_value = "default")]
    config_name: String,

    /// Increase logging verbosity (-v info, -vv debug).
    #[arg(short = 'V', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Enable debug-level logging unconditionally.
    #[arg(short = 'D', long = "debug")]
    debug: bool,

    /// Suppress all logging below error level.
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a synthetic reference trace instead of replaying one.
    GenTrace {
        /// Output trace file path.
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output: PathBuf,

        /// Reference pattern.
        #[arg(long = "pattern", default_value = "random")]
        pattern: Pattern,

        /// Number of references to generate.
        #[arg(short = 'n', long = "count", default_value_t = 10_000)]
        count: usize,

        /// pid tag stamped on every generated reference.
        #[arg(long = "pid", default_value_t = 1)]
        pid: u32,

        /// Page size in bytes, used to convert the generated page index
        /// into an address.
        #[arg(short = 'p', long = "page-size", default_value_t = 4096)]
        page_size: u32,

        /// Address space size in megabytes the generated pages are drawn
        /// from.
        #[arg(short = 'v', long = "vspace", default_value_t = 4096)]
        vspace: u32,

        /// PRNG seed.
        #[arg(long = "seed", default_value_t = 42)]
        seed: u64,
    },
}

fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        LevelFilter::Error
    } else if cli.debug || cli.verbose >= 2 {
        LevelFilter::Debug
    } else if cli.verbose == 1 {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new().filter_level(level).format_timestamp_millis().init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Some(Command::GenTrace { output, pattern, count, pid, page_size, vspace, seed }) = &cli.command {
        let opts = GenOptions {
            pattern: *pattern,
            count: *count,
            pid: *pid,
            page_size: *page_size,
            vspace_bytes: *vspace as u64 * 1024 * 1024,
            seed: *seed,
        };
        let entries = tracegen::generate(&opts);
        trace_io::write_trace_file(output, &entries)
            .with_context(|| format!("writing generated trace to {}", output.display()))?;
        info!("wrote {} references to {}", entries.len(), output.display());
        return Ok(());
    }

    let trace_path = cli.trace.clone().context("missing required --trace FILE (or use the gen-trace subcommand)")?;

    let config = Config {
        ram_mb: cli.ram,
        page_size: cli.page_size,
        swap_mb: cli.swap,
        vspace_mb: cli.vspace,
        algorithm: cli.algorithm,
        tlb_size: cli.tlb_size,
        tlb_policy: cli.tlb_policy,
        pt_type: cli.pt_type,
        max_accesses: cli.max_accesses,
        seed: cli.seed,
        latencies: Default::default(),
        max_processes: 256,
    };

    let trace: Trace =
        trace_io::load_trace_file(&trace_path).with_context(|| format!("loading trace {}", trace_path.display()))?;
    info!("loaded {} references from {}", trace.len(), trace_path.display());

    let mut vmm = Vmm::new(config).context("invalid configuration")?;

    let start = Instant::now();
    vmm.run_trace(trace);
    let elapsed_ms = start.elapsed().as_millis() as u64;

    let mut metrics = vmm.metrics().clone();
    metrics.simulation_time_ms = elapsed_ms;
    let latencies = &vmm.config().latencies;

    if let Some(path) = &cli.output {
        output::write_json(path, &metrics, latencies).context("writing JSON output")?;
    }
    if let Some(path) = &cli.csv {
        output::write_csv(path, &cli.config_name, &metrics, latencies).context("writing CSV output")?;
    }
    if cli.output.is_none() && cli.csv.is_none() {
        output::print_summary(&metrics, latencies);
    }

    if metrics.page_faults == 0 && metrics.total_accesses > 0 {
        warn!("simulation completed with zero page faults — check trace/config");
    }
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("vmmctl: error: {e:#}");
        std::process::exit(1);
    }
}
