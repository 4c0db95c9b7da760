//! Per-process and global counters, and the derived rates/timings.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ProcessMetrics {
    pub pid: u32,
    pub accesses: u64,
    pub reads: u64,
    pub writes: u64,
    pub page_faults: u64,
    pub tlb_hits: u64,
    pub tlb_misses: u64,
}

#[derive(Debug, Clone)]
pub struct Latencies {
    pub tlb_hit_ns: u64,
    pub memory_access_ns: u64,
    pub page_fault_us: u64,
    pub swap_io_us: u64,
}

impl Default for Latencies {
    fn default() -> Self {
        Latencies {
            tlb_hit_ns: 1,
            memory_access_ns: 100,
            page_fault_us: 1000,
            swap_io_us: 5000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Metrics {
    pub total_accesses: u64,
    pub reads: u64,
    pub writes: u64,
    pub page_faults: u64,
    pub major_faults: u64,
    pub minor_faults: u64,
    pub tlb_hits: u64,
    pub tlb_misses: u64,
    pub swap_ins: u64,
    pub swap_outs: u64,
    pub replacements: u64,
    pub simulation_time_ms: u64,
    per_process: HashMap<u32, ProcessMetrics>,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics::default()
    }

    fn proc(&mut self, pid: u32) -> &mut ProcessMetrics {
        self.per_process.entry(pid).or_insert_with(|| ProcessMetrics { pid, ..Default::default() })
    }

    pub fn record_access(&mut self, pid: u32, is_write: bool) {
        self.total_accesses += 1;
        let p = self.proc(pid);
        p.accesses += 1;
        if is_write {
            self.writes += 1;
            p.writes += 1;
        } else {
            self.reads += 1;
            p.reads += 1;
        }
    }

    pub fn record_tlb_hit(&mut self, pid: u32) {
        self.tlb_hits += 1;
        self.proc(pid).tlb_hits += 1;
    }

    pub fn record_tlb_miss(&mut self, pid: u32) {
        self.tlb_misses += 1;
        self.proc(pid).tlb_misses += 1;
    }

    pub fn record_page_fault(&mut self, pid: u32, major: bool) {
        self.page_faults += 1;
        self.proc(pid).page_faults += 1;
        if major {
            self.major_faults += 1;
        } else {
            self.minor_faults += 1;
        }
    }

    pub fn record_replacement(&mut self) {
        self.replacements += 1;
    }

    pub fn page_fault_rate(&self) -> f64 {
        if self.total_accesses == 0 {
            0.0
        } else {
            self.page_faults as f64 / self.total_accesses as f64
        }
    }

    pub fn tlb_hit_rate(&self) -> f64 {
        let total = self.tlb_hits + self.tlb_misses;
        if total == 0 {
            0.0
        } else {
            self.tlb_hits as f64 / total as f64
        }
    }

    pub fn avg_memory_access_time_ns(&self, lat: &Latencies) -> f64 {
        let tlb_hit_rate = self.tlb_hit_rate();
        let pf_rate = self.page_fault_rate();
        lat.tlb_hit_ns as f64
            + (1.0 - tlb_hit_rate) * lat.memory_access_ns as f64
            + pf_rate * (lat.page_fault_us as f64 * 1000.0)
    }

    pub fn per_process(&self) -> Vec<ProcessMetrics> {
        let mut v: Vec<_> = self.per_process.values().cloned().collect();
        v.sort_by_key(|p| p.pid);
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_process_sums_match_global() {
        let mut m = Metrics::new();
        m.record_access(1, false);
        m.record_access(2, true);
        m.record_tlb_hit(1);
        m.record_page_fault(2, true);
        let sum_access: u64 = m.per_process().iter().map(|p| p.accesses).sum();
        assert_eq!(sum_access, m.total_accesses);
        let sum_faults: u64 = m.per_process().iter().map(|p| p.page_faults).sum();
        assert_eq!(sum_faults, m.page_faults);
    }

    #[test]
    fn derived_rates_use_the_documented_formula() {
        let mut m = Metrics::new();
        for _ in 0..4 {
            m.record_access(1, false);
        }
        m.record_page_fault(1, false);
        m.record_tlb_hit(1);
        m.record_tlb_hit(1);
        m.record_tlb_miss(1);
        assert!((m.page_fault_rate() - 0.25).abs() < 1e-9);
        assert!((m.tlb_hit_rate() - (2.0 / 3.0)).abs() < 1e-9);
    }
}
