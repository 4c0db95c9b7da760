//! VMM core: orchestrates the per-reference pipeline and owns every
//! subsystem. The single writer of frames, TLB, page tables, and metrics.

use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::frame::FramePool;
use crate::metrics::Metrics;
use crate::pagetable::{PageTable, PteFlags};
use crate::process::Process;
use crate::replacement::{Algorithm, ReplacementPolicy};
use crate::swap::SwapStore;
use crate::tlb::Tlb;
use crate::trace::{Op, Trace, TraceEntry};

/// How often (in references) the approximate-LRU ageing sweep runs.
const AGE_INTERVAL: u64 = 1000;

pub struct Vmm {
    config: Config,
    frames: FramePool,
    swap: SwapStore,
    tlb: Tlb,
    policy: ReplacementPolicy,
    metrics: Metrics,
    processes: HashMap<u32, Process>,
    clock_us: u64,
    references_seen: u64,
}

impl Vmm {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let total_frames = config.total_frames();
        let total_swap = config.total_swap_slots();
        Ok(Vmm {
            frames: FramePool::new(total_frames),
            swap: SwapStore::new(total_swap),
            tlb: Tlb::new(config.tlb_size as usize, config.tlb_policy),
            policy: ReplacementPolicy::new(config.algorithm, config.page_size),
            metrics: Metrics::new(),
            processes: HashMap::new(),
            clock_us: 0,
            references_seen: 0,
            config,
        })
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn tick(&mut self) -> u64 {
        self.clock_us += 1;
        self.clock_us
    }

    fn ensure_process(&mut self, pid: u32) -> Result<()> {
        if self.processes.contains_key(&pid) {
            return Ok(());
        }
        if self.processes.len() >= self.config.max_processes {
            return Err(Error::ProcessLimit(self.config.max_processes));
        }
        let page_table = match self.config.pt_type {
            crate::config::PageTableType::Single => PageTable::single_level(self.config.total_pages()),
            crate::config::PageTableType::TwoLevel => PageTable::two_level(self.config.total_pages()),
        };
        self.processes.insert(pid, Process::new(pid, page_table));
        Ok(())
    }

    /// Explicit process teardown: invalidates every TLB entry for `pid`.
    /// The per-reference pipeline never calls this on its own — processes
    /// live for the VMM's lifetime during trace replay.
    pub fn retire_process(&mut self, pid: u32) {
        self.tlb.invalidate_all(pid);
        self.processes.remove(&pid);
    }

    /// Replays an entire trace, driving the per-reference pipeline in
    /// order. Installs the trace into the OPT policy for lookahead
    /// regardless of the configured algorithm (harmless if unused).
    pub fn run_trace(&mut self, trace: Trace) {
        let trace = Rc::new(trace);
        self.policy.set_trace(trace.clone());

        let cap = self.config.max_accesses;
        for (i, entry) in trace.entries.iter().enumerate() {
            if let Some(cap) = cap {
                if self.references_seen >= cap {
                    break;
                }
            }
            self.policy.set_position(i);
            if let Err(e) = self.step(*entry) {
                warn!("reference {i} ({pid}, {addr:#x}) failed: {e}", pid = entry.pid, addr = entry.addr);
                continue;
            }
            self.references_seen += 1;
            if self.config.algorithm == Algorithm::ApproxLru && self.references_seen % AGE_INTERVAL == 0 {
                self.frames.age_all();
            }
        }
    }

    /// Processes a single (pid, op, addr) reference per the documented
    /// ordering: ensure process → record access → TLB lookup → (hit path)
    /// or (miss → page-table lookup → fault handler if needed) → TLB
    /// install.
    fn step(&mut self, entry: TraceEntry) -> Result<()> {
        self.ensure_process(entry.pid)?;

        let is_write = entry.op == Op::Write;
        self.metrics.record_access(entry.pid, is_write);

        let vpn = (entry.addr / self.config.page_size as u64) as usize;
        let now = self.tick();

        if let Some(frame) = self.tlb.lookup(entry.pid, vpn) {
            self.metrics.record_tlb_hit(entry.pid);
            self.policy.on_access(frame, now, &mut self.frames);
            if is_write {
                self.mark_dirty(entry.pid, vpn, frame)?;
            }
            return Ok(());
        }
        self.metrics.record_tlb_miss(entry.pid);

        let pte_lookup = {
            let proc = self.processes.get(&entry.pid).expect("ensured above");
            proc.page_table.lookup(vpn).map(|p| (p.is_valid(), p.frame))
        };
        let frame = match pte_lookup {
            None => return Err(Error::InvalidAddress(vpn)),
            Some((false, _)) => self.handle_page_fault(entry.pid, vpn, is_write)?,
            Some((true, frame)) => {
                self.policy.on_access(frame, now, &mut self.frames);
                if is_write {
                    self.mark_dirty(entry.pid, vpn, frame)?;
                }
                frame
            }
        };

        self.tlb.insert(entry.pid, vpn, frame);
        Ok(())
    }

    fn mark_dirty(&mut self, pid: u32, vpn: usize, frame: usize) -> Result<()> {
        self.frames.set_dirty(frame, true)?;
        let proc = self.processes.get_mut(&pid).expect("process exists");
        if let Some(pte) = proc.page_table.lookup_mut(vpn) {
            pte.set_dirty(true);
        }
        Ok(())
    }

    /// §4.6 Page-fault handler.
    fn handle_page_fault(&mut self, pid: u32, vpn: usize, is_write: bool) -> Result<usize> {
        {
            let proc = self.processes.get(&pid).expect("ensured above");
            if proc.page_table.lookup(vpn).is_none() {
                return Err(Error::InvalidAddress(vpn));
            }
        }

        let now = self.tick();
        let frame = match self.frames.allocate(now) {
            Ok(idx) => idx,
            Err(_) => {
                let victim = self.policy.select_victim(&mut self.frames)?;
                self.evict(victim, now)?;
                self.frames.allocate(now).map_err(|_| Error::NoVictim)?
            }
        };

        let proc = self.processes.get(&pid).expect("ensured above");
        let swap_offset = proc.page_table.lookup(vpn).map(|p| p.swap_offset).unwrap_or(0);
        let major = swap_offset != 0;
        if major {
            self.swap.swap_in();
            self.swap.free(swap_offset - 1)?;
        }

        let mut flags = PteFlags::USER;
        if is_write {
            flags |= PteFlags::WRITABLE;
        }
        {
            let proc = self.processes.get_mut(&pid).expect("ensured above");
            proc.page_table.map(vpn, frame, flags)?;
            if major {
                if let Some(pte) = proc.page_table.lookup_mut(vpn) {
                    pte.swap_offset = 0;
                }
            }
            if is_write {
                if let Some(pte) = proc.page_table.lookup_mut(vpn) {
                    pte.set_dirty(true);
                }
            }
        }

        self.frames.set_owner(frame, pid, vpn)?;
        self.frames.set_dirty(frame, is_write)?;
        self.policy.on_allocate(frame);

        debug_assert!({
            let proc = self.processes.get(&pid).expect("ensured above");
            let pte = proc.page_table.lookup(vpn).expect("just mapped");
            pte.is_valid() && pte.frame == frame
        });

        self.metrics.record_page_fault(pid, major);
        Ok(frame)
    }

    /// Evicts the resident page currently occupying `victim` frame index,
    /// swapping it out first if dirty. Silently drops the page when the
    /// swap store is exhausted, matching the original's behaviour.
    fn evict(&mut self, victim: usize, _now: u64) -> Result<()> {
        let f = *self.frames.get(victim)?;
        let owner_pid = f.pid;
        let owner_vpn = f.vpn;

        if f.dirty {
            match self.swap.allocate(owner_pid, owner_vpn) {
                Ok(slot) => {
                    self.swap.swap_out();
                    if let Some(proc) = self.processes.get_mut(&owner_pid) {
                        if let Some(pte) = proc.page_table.lookup_mut(owner_vpn) {
                            // +1: swap_offset reserves 0 to mean "not in swap",
                            // but slot indices from the store are 0-based.
                            pte.swap_offset = slot + 1;
                        }
                    }
                }
                Err(Error::SwapExhausted) => {
                    debug!("swap exhausted, dropping dirty page pid={owner_pid} vpn={owner_vpn}");
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(proc) = self.processes.get_mut(&owner_pid) {
            let _ = proc.page_table.unmap(owner_vpn);
        }
        self.tlb.invalidate(owner_pid, owner_vpn);
        self.frames.free(victim)?;
        self.policy.on_free(victim);
        self.metrics.record_replacement();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageTableType;
    use crate::tlb::TlbPolicy;

    fn cfg(ram_mb: u32, page_size: u32, swap_mb: u32, algorithm: Algorithm, tlb_size: u32) -> Config {
        Config {
            ram_mb,
            page_size,
            swap_mb,
            vspace_mb: 4096,
            algorithm,
            tlb_size,
            tlb_policy: TlbPolicy::Lru,
            pt_type: PageTableType::Single,
            max_accesses: None,
            seed: 42,
            latencies: crate::metrics::Latencies::default(),
            max_processes: 256,
        }
    }

    fn entry(pid: u32, op: Op, addr: u64) -> TraceEntry {
        TraceEntry { pid, op, addr }
    }

    /// Scenario 1: single frame, two pages, FIFO — 3 faults, 0 TLB hits.
    #[test]
    fn scenario_single_frame_two_pages_fifo() {
        let mut vmm = Vmm::new(cfg(64, 4096, 16, Algorithm::Fifo, 4)).unwrap();
        // The scenario calls for exactly one physical frame.
        vmm.frames = FramePool::new(1);

        let trace = Trace::new(vec![
            entry(1, Op::Read, 0x0),
            entry(1, Op::Read, 0x1000),
            entry(1, Op::Read, 0x0),
        ]);
        vmm.run_trace(trace);
        assert_eq!(vmm.metrics().page_faults, 3);
        assert_eq!(vmm.metrics().tlb_hits, 0);
    }

    /// Scenario 2: TLB warm hit.
    #[test]
    fn scenario_tlb_warm_hit() {
        let mut vmm = Vmm::new(cfg(64, 4096, 16, Algorithm::Lru, 4)).unwrap();
        let trace = Trace::new(vec![entry(1, Op::Read, 0x0), entry(1, Op::Read, 0x0)]);
        vmm.run_trace(trace);
        assert_eq!(vmm.metrics().page_faults, 1);
        assert_eq!(vmm.metrics().tlb_hits, 1);
    }

    /// Scenario 3: dirty eviction triggers swap-out.
    #[test]
    fn scenario_dirty_eviction_triggers_swap_out() {
        let mut vmm = Vmm::new(cfg(64, 4096, 16, Algorithm::Clock, 4)).unwrap();
        vmm.frames = FramePool::new(1);
        let trace = Trace::new(vec![entry(1, Op::Write, 0x0), entry(1, Op::Read, 0x1000)]);
        vmm.run_trace(trace);
        assert_eq!(vmm.metrics().page_faults, 2);
        assert_eq!(vmm.swap.swap_outs, 1);
        assert_eq!(vmm.swap.swap_ins, 0);
    }

    /// Scenario 6: two-process TLB isolation.
    #[test]
    fn scenario_two_process_tlb_isolation() {
        let mut vmm = Vmm::new(cfg(64, 4096, 16, Algorithm::Lru, 4)).unwrap();
        let trace = Trace::new(vec![entry(1, Op::Read, 0x0), entry(2, Op::Read, 0x0)]);
        vmm.run_trace(trace);
        // Both are first-touch faults; neither hits the other's mapping.
        assert_eq!(vmm.metrics().tlb_hits, 0);
        assert_eq!(vmm.metrics().page_faults, 2);
    }

    /// Scenario 4: Belady's anomaly under OPT vs FIFO. OPT with 4 frames
    /// must fault strictly fewer times than OPT with 3 frames on the
    /// classic reference string that makes FIFO misbehave.
    #[test]
    fn scenario_opt_monotonic_in_frame_count() {
        let pages: [u64; 12] = [1, 2, 3, 4, 1, 2, 5, 1, 2, 3, 4, 5];
        let make_trace = || Trace::new(pages.iter().map(|&p| entry(1, Op::Read, p * 4096)).collect());

        let mut vmm3 = Vmm::new(cfg(64, 4096, 16, Algorithm::Opt, 4)).unwrap();
        vmm3.frames = FramePool::new(3);
        vmm3.run_trace(make_trace());

        let mut vmm4 = Vmm::new(cfg(64, 4096, 16, Algorithm::Opt, 4)).unwrap();
        vmm4.frames = FramePool::new(4);
        vmm4.run_trace(make_trace());

        assert!(
            vmm4.metrics().page_faults < vmm3.metrics().page_faults,
            "OPT with more frames must not fault more often: 4-frame={} 3-frame={}",
            vmm4.metrics().page_faults,
            vmm3.metrics().page_faults
        );
    }

    /// Scenario 5: a page aged through 32 silent cycles collapses to age 0
    /// and is preferred as APPROX_LRU's victim over a freshly-allocated,
    /// untouched frame.
    #[test]
    fn scenario_aging_collapses_under_silence() {
        let mut vmm = Vmm::new(cfg(64, 4096, 16, Algorithm::ApproxLru, 4)).unwrap();
        vmm.frames = FramePool::new(2);

        // Touch vpn 0 once, then let it go cold for 32 ageing cycles while
        // vpn 1 is allocated (and thus starts with a fresh, high age).
        let mut trace = vec![entry(1, Op::Read, 0x0)];
        for _ in 0..AGE_INTERVAL * 32 {
            trace.push(entry(1, Op::Read, 0x1000));
        }
        vmm.run_trace(Trace::new(trace));

        // vpn 0's frame ages to 0 while vpn 1 (repeatedly touched) stays hot;
        // a third distinct page forces an eviction and must claim vpn 0's
        // frame rather than vpn 1's.
        vmm.step(entry(1, Op::Read, 0x2000)).unwrap();
        let pid1 = &vmm.processes[&1];
        assert!(!pid1.page_table.lookup(0).unwrap().is_valid(), "cold vpn 0 should have been evicted");
        assert!(pid1.page_table.lookup(1).unwrap().is_valid(), "hot vpn 1 must survive");
    }

    #[test]
    fn process_limit_rejects_new_pid_but_continues() {
        let mut c = cfg(64, 4096, 16, Algorithm::Lru, 4);
        c.max_processes = 1;
        let mut vmm = Vmm::new(c).unwrap();
        let trace = Trace::new(vec![entry(1, Op::Read, 0x0), entry(2, Op::Read, 0x0)]);
        vmm.run_trace(trace);
        assert_eq!(vmm.metrics().total_accesses, 1);
    }
}
