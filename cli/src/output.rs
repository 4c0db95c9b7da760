//! Metric serialization: JSON, CSV, and the human-readable summary.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use vmm_core::Metrics;
use vmm_core::metrics::Latencies;

#[derive(Serialize)]
struct ProcessRow {
    pid: u32,
    accesses: u64,
    reads: u64,
    writes: u64,
    page_faults: u64,
    tlb_hits: u64,
    tlb_misses: u64,
}

#[derive(Serialize)]
struct Report {
    total_accesses: u64,
    reads: u64,
    writes: u64,
    page_faults: u64,
    major_faults: u64,
    minor_faults: u64,
    page_fault_rate: f64,
    tlb_hits: u64,
    tlb_misses: u64,
    tlb_hit_rate: f64,
    swap_ins: u64,
    swap_outs: u64,
    replacements: u64,
    avg_memory_access_time_ns: f64,
    simulation_time_ms: u64,
    per_process: Vec<ProcessRow>,
}

fn build_report(metrics: &Metrics, latencies: &Latencies) -> Report {
    Report {
        total_accesses: metrics.total_accesses,
        reads: metrics.reads,
        writes: metrics.writes,
        page_faults: metrics.page_faults,
        major_faults: metrics.major_faults,
        minor_faults: metrics.minor_faults,
        page_fault_rate: metrics.page_fault_rate(),
        tlb_hits: metrics.tlb_hits,
        tlb_misses: metrics.tlb_misses,
        tlb_hit_rate: metrics.tlb_hit_rate(),
        swap_ins: metrics.swap_ins,
        swap_outs: metrics.swap_outs,
        replacements: metrics.replacements,
        avg_memory_access_time_ns: metrics.avg_memory_access_time_ns(latencies),
        simulation_time_ms: metrics.simulation_time_ms,
        per_process: metrics
            .per_process()
            .into_iter()
            .map(|p| ProcessRow {
                pid: p.pid,
                accesses: p.accesses,
                reads: p.reads,
                writes: p.writes,
                page_faults: p.page_faults,
                tlb_hits: p.tlb_hits,
                tlb_misses: p.tlb_misses,
            })
            .collect(),
    }
}

pub fn write_json(path: &Path, metrics: &Metrics, latencies: &Latencies) -> Result<()> {
    let report = build_report(metrics, latencies);
    let json = serde_json::to_string_pretty(&report)?;
    fs::write(path, json).with_context(|| format!("failed to write JSON output to {}", path.display()))?;
    Ok(())
}

pub fn write_csv(path: &Path, config_name: &str, metrics: &Metrics, latencies: &Latencies) -> Result<()> {
    let needs_header = !path.exists();
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open CSV output {}", path.display()))?,
    );
    if needs_header {
        wtr.write_record([
            "config",
            "total_accesses",
            "reads",
            "writes",
            "page_faults",
            "pf_rate",
            "tlb_hits",
            "tlb_misses",
            "tlb_hit_rate",
            "swap_ins",
            "swap_outs",
            "replacements",
            "amt_ns",
            "runtime_ms",
        ])?;
    }
    wtr.write_record(&[
        config_name.to_string(),
        metrics.total_accesses.to_string(),
        metrics.reads.to_string(),
        metrics.writes.to_string(),
        metrics.page_faults.to_string(),
        format!("{:.6}", metrics.page_fault_rate()),
        metrics.tlb_hits.to_string(),
        metrics.tlb_misses.to_string(),
        format!("{:.6}", metrics.tlb_hit_rate()),
        metrics.swap_ins.to_string(),
        metrics.swap_outs.to_string(),
        metrics.replacements.to_string(),
        format!("{:.3}", metrics.avg_memory_access_time_ns(latencies)),
        metrics.simulation_time_ms.to_string(),
    ])?;
    wtr.flush()?;
    Ok(())
}

pub fn print_summary(metrics: &Metrics, latencies: &Latencies) {
    println!("{}", "── simulation summary ──".bold());
    println!("total accesses:     {}", metrics.total_accesses);
    println!("reads / writes:     {} / {}", metrics.reads, metrics.writes);
    println!(
        "page faults:        {} ({} major, {} minor)",
        metrics.page_faults, metrics.major_faults, metrics.minor_faults
    );
    println!("page fault rate:    {:.4}", metrics.page_fault_rate());
    println!("tlb hits / misses:  {} / {}", metrics.tlb_hits, metrics.tlb_misses);
    println!("tlb hit rate:       {:.4}", metrics.tlb_hit_rate());
    println!("swap ins / outs:    {} / {}", metrics.swap_ins, metrics.swap_outs);
    println!("replacements:       {}", metrics.replacements);
    println!(
        "avg memory access:  {:.2} ns",
        metrics.avg_memory_access_time_ns(latencies)
    );
    println!("{}", "── per-process ──".bold());
    for p in metrics.per_process() {
        println!(
            "  pid {:<6} accesses={:<8} faults={:<6} tlb_hits={:<8} tlb_misses={}",
            p.pid, p.accesses, p.page_faults, p.tlb_hits, p.tlb_misses
        );
    }
}
