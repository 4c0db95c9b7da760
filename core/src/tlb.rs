//! Fully associative TLB with FIFO or LRU eviction.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlbPolicy {
    Fifo,
    Lru,
}

impl std::str::FromStr for TlbPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FIFO" => Ok(TlbPolicy::Fifo),
            "LRU" => Ok(TlbPolicy::Lru),
            other => Err(format!("unknown TLB policy {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TlbEntry {
    valid: bool,
    pid: u32,
    vpn: usize,
    frame: usize,
    last_use: u64,
}

impl TlbEntry {
    fn invalid() -> Self {
        TlbEntry { valid: false, pid: 0, vpn: 0, frame: 0, last_use: 0 }
    }
}

pub struct Tlb {
    entries: Vec<TlbEntry>,
    policy: TlbPolicy,
    fifo_next: usize,
    clock: u64,
    pub hits: u64,
    pub misses: u64,
}

impl Tlb {
    pub fn new(size: usize, policy: TlbPolicy) -> Self {
        Tlb {
            entries: vec![TlbEntry::invalid(); size],
            policy,
            fifo_next: 0,
            clock: 0,
            hits: 0,
            misses: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Returns the frame number on a hit; bumps the entry's last-use
    /// counter under LRU. Updates hit/miss counters.
    pub fn lookup(&mut self, pid: u32, vpn: usize) -> Option<usize> {
        let found = self.entries.iter().position(|e| e.valid && e.pid == pid && e.vpn == vpn);
        match found {
            Some(idx) => {
                self.hits += 1;
                if self.policy == TlbPolicy::Lru {
                    let t = self.tick();
                    self.entries[idx].last_use = t;
                }
                Some(self.entries[idx].frame)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Inserts or updates the mapping for (pid, vpn). Always bumps the
    /// timestamp of the resulting entry.
    pub fn insert(&mut self, pid: u32, vpn: usize, frame: usize) {
        let t = self.tick();
        if let Some(idx) = self.entries.iter().position(|e| e.valid && e.pid == pid && e.vpn == vpn) {
            self.entries[idx].frame = frame;
            self.entries[idx].last_use = t;
            return;
        }
        let victim = self.choose_victim();
        self.entries[victim] = TlbEntry { valid: true, pid, vpn, frame, last_use: t };
        if self.policy == TlbPolicy::Fifo {
            self.fifo_next = (victim + 1) % self.entries.len();
        }
    }

    fn choose_victim(&mut self) -> usize {
        match self.policy {
            TlbPolicy::Fifo => {
                let v = self.fifo_next;
                self.fifo_next = (self.fifo_next + 1) % self.entries.len();
                v
            }
            TlbPolicy::Lru => {
                if let Some(idx) = self.entries.iter().position(|e| !e.valid) {
                    return idx;
                }
                self.entries
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, e)| e.last_use)
                    .map(|(idx, _)| idx)
                    .unwrap_or(0)
            }
        }
    }

    /// Clears the matching entry, if present. No-op otherwise. Never bumps
    /// any timestamp.
    pub fn invalidate(&mut self, pid: u32, vpn: usize) {
        if let Some(idx) = self.entries.iter().position(|e| e.valid && e.pid == pid && e.vpn == vpn) {
            self.entries[idx] = TlbEntry::invalid();
        }
    }

    /// Clears every entry belonging to `pid`.
    pub fn invalidate_all(&mut self, pid: u32) {
        for e in self.entries.iter_mut() {
            if e.valid && e.pid == pid {
                *e = TlbEntry::invalid();
            }
        }
    }

    pub fn flush(&mut self) {
        for e in self.entries.iter_mut() {
            *e = TlbEntry::invalid();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_then_insert_then_hit() {
        let mut tlb = Tlb::new(4, TlbPolicy::Lru);
        assert_eq!(tlb.lookup(1, 0), None);
        tlb.insert(1, 0, 5);
        assert_eq!(tlb.lookup(1, 0), Some(5));
        assert_eq!(tlb.hits, 1);
        assert_eq!(tlb.misses, 1);
    }

    #[test]
    fn fifo_evicts_in_insertion_order() {
        let mut tlb = Tlb::new(2, TlbPolicy::Fifo);
        tlb.insert(1, 0, 10);
        tlb.insert(1, 1, 11);
        tlb.insert(1, 2, 12); // evicts slot for vpn 0
        assert_eq!(tlb.lookup(1, 0), None);
        assert_eq!(tlb.lookup(1, 1), Some(11));
    }

    #[test]
    fn invalidate_is_noop_if_absent_and_clears_if_present() {
        let mut tlb = Tlb::new(2, TlbPolicy::Lru);
        tlb.invalidate(1, 0); // no-op, must not panic
        tlb.insert(1, 0, 3);
        tlb.invalidate(1, 0);
        assert_eq!(tlb.lookup(1, 0), None);
    }

    #[test]
    fn two_processes_are_isolated() {
        let mut tlb = Tlb::new(4, TlbPolicy::Lru);
        tlb.insert(1, 0, 9);
        assert_eq!(tlb.lookup(2, 0), None);
    }
}
