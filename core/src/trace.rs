//! Reference trace: the sequence the VMM replays, and that OPT looks ahead
//! through. Parsing the trace file itself is a concern of the `vmmctl`
//! binary; this module only defines the in-memory shape both sides share.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy)]
pub struct TraceEntry {
    pub pid: u32,
    pub op: Op,
    pub addr: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Trace {
    pub entries: Vec<TraceEntry>,
}

impl Trace {
    pub fn new(entries: Vec<TraceEntry>) -> Self {
        Trace { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Virtual page number of entry `i` under `page_size`, used by OPT's
    /// lookahead. The original hardcodes 4096 here regardless of the
    /// configured page size; this divides by the real page size instead.
    pub fn vpn_at(&self, i: usize, page_size: u32) -> Option<(u32, usize)> {
        self.entries.get(i).map(|e| (e.pid, (e.addr / page_size as u64) as usize))
    }
}
