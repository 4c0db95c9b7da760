//! Trace file I/O: parsing the input format and writing generated traces.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use vmm_core::trace::{Op, Trace, TraceEntry};

/// Parses `<pid> <op> <addr>` per line. `addr` may be decimal or
/// `0x`-prefixed hex. Anything other than `W`/`w` is read. Unparseable
/// lines are skipped silently (logged at debug).
pub fn load_trace_file(path: &Path) -> Result<Trace> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to open trace file {}", path.display()))?;
    let mut entries = Vec::new();
    for (lineno, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_line(line) {
            Some(entry) => entries.push(entry),
            None => debug!("skipping unparseable trace line {}: {line:?}", lineno + 1),
        }
    }
    Ok(Trace::new(entries))
}

fn parse_line(line: &str) -> Option<TraceEntry> {
    let mut parts = line.split_whitespace();
    let pid: u32 = parts.next()?.parse().ok()?;
    let op_str = parts.next()?;
    let addr_str = parts.next()?;
    let op = match op_str {
        "W" | "w" => Op::Write,
        _ => Op::Read,
    };
    let addr = if let Some(hex) = addr_str.strip_prefix("0x").or_else(|| addr_str.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()?
    } else {
        addr_str.parse().ok()?
    };
    Some(TraceEntry { pid, op, addr })
}

pub fn write_trace_file(path: &Path, entries: &[TraceEntry]) -> Result<()> {
    let mut f = fs::File::create(path)
        .with_context(|| format!("failed to create trace file {}", path.display()))?;
    for e in entries {
        let op = match e.op {
            Op::Read => 'R',
            Op::Write => 'W',
        };
        writeln!(f, "{} {} 0x{:x}", e.pid, op, e.addr)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_and_hex_addresses() {
        assert_eq!(parse_line("1 R 0").unwrap().addr, 0);
        assert_eq!(parse_line("1 W 0x1000").unwrap().addr, 0x1000);
        assert_eq!(parse_line("1 w 4096").unwrap().op, Op::Write);
        assert_eq!(parse_line("1 x 4096").unwrap().op, Op::Read);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_line("not a trace line").is_none());
        assert!(parse_line("1 R").is_none());
    }
}
