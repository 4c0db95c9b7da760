//! Per-process page table: single-level dense array or lazily-allocated
//! two-level (1024-entry L1 fan-out).

use crate::error::{Error, Result};

bitflags::bitflags! {
    #[derive(Default)]
    pub struct PteFlags: u8 {
        const VALID    = 0b0000_0001;
        const DIRTY    = 0b0000_0010;
        const ACCESSED = 0b0000_0100;
        const WRITABLE = 0b0000_1000;
        const USER     = 0b0001_0000;
    }
}

/// A page-table entry. `frame` is meaningful only while `VALID` is set;
/// `swap_offset` is a 1-based slot index, 0 meaning "not in swap".
#[derive(Debug, Clone, Copy, Default)]
pub struct Pte {
    pub frame: usize,
    pub flags: PteFlags,
    pub swap_offset: usize,
}

impl Pte {
    pub fn is_valid(&self) -> bool {
        self.flags.contains(PteFlags::VALID)
    }

    pub fn is_dirty(&self) -> bool {
        self.flags.contains(PteFlags::DIRTY)
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.flags.set(PteFlags::DIRTY, dirty);
    }
}

const L1_FANOUT: usize = 1024;

enum Shape {
    Single { entries: Vec<Pte> },
    TwoLevel {
        l1: Vec<Option<Vec<Pte>>>,
        l2_pages: usize,
    },
}

pub struct PageTable {
    shape: Shape,
    total_pages: usize,
}

impl PageTable {
    pub fn single_level(total_pages: usize) -> Self {
        PageTable {
            shape: Shape::Single { entries: vec![Pte::default(); total_pages] },
            total_pages,
        }
    }

    pub fn two_level(total_pages: usize) -> Self {
        let l1_len = (total_pages + L1_FANOUT - 1) / L1_FANOUT;
        PageTable {
            shape: Shape::TwoLevel {
                l1: (0..l1_len).map(|_| None).collect(),
                l2_pages: L1_FANOUT,
            },
            total_pages,
        }
    }

    fn in_range(&self, vpn: usize) -> bool {
        vpn < self.total_pages
    }

    pub fn lookup(&self, vpn: usize) -> Option<&Pte> {
        if !self.in_range(vpn) {
            return None;
        }
        match &self.shape {
            Shape::Single { entries } => entries.get(vpn),
            Shape::TwoLevel { l1, l2_pages } => {
                let l1_idx = (vpn >> 10) & 0x3FF;
                let l2_idx = vpn & 0x3FF;
                let _ = l2_pages;
                l1.get(l1_idx)?.as_ref()?.get(l2_idx)
            }
        }
    }

    pub fn lookup_mut(&mut self, vpn: usize) -> Option<&mut Pte> {
        if !self.in_range(vpn) {
            return None;
        }
        match &mut self.shape {
            Shape::Single { entries } => entries.get_mut(vpn),
            Shape::TwoLevel { l1, .. } => {
                let l1_idx = (vpn >> 10) & 0x3FF;
                let l2_idx = vpn & 0x3FF;
                l1.get_mut(l1_idx)?.as_mut()?.get_mut(l2_idx)
            }
        }
    }

    /// Maps `vpn` to `frame` with the given flags plus VALID. Allocates the
    /// L2 sub-table on demand for two-level tables.
    pub fn map(&mut self, vpn: usize, frame: usize, flags: PteFlags) -> Result<()> {
        if !self.in_range(vpn) {
            return Err(Error::OutOfRange(vpn));
        }
        match &mut self.shape {
            Shape::Single { entries } => {
                let pte = &mut entries[vpn];
                pte.frame = frame;
                pte.flags = flags | PteFlags::VALID;
            }
            Shape::TwoLevel { l1, .. } => {
                let l1_idx = (vpn >> 10) & 0x3FF;
                let l2_idx = vpn & 0x3FF;
                let slot = l1.get_mut(l1_idx).ok_or(Error::OutOfRange(vpn))?;
                if slot.is_none() {
                    *slot = Some(vec![Pte::default(); L1_FANOUT]);
                }
                let l2 = slot.as_mut().ok_or(Error::AllocFail)?;
                let pte = l2.get_mut(l2_idx).ok_or(Error::OutOfRange(vpn))?;
                pte.frame = frame;
                pte.flags = flags | PteFlags::VALID;
            }
        }
        Ok(())
    }

    /// Clears the valid flag; frame number and swap offset are preserved
    /// for diagnostics.
    pub fn unmap(&mut self, vpn: usize) -> Result<()> {
        let pte = self.lookup_mut(vpn).ok_or(Error::OutOfRange(vpn))?;
        pte.flags.remove(PteFlags::VALID);
        Ok(())
    }

    pub fn count_valid(&self) -> usize {
        match &self.shape {
            Shape::Single { entries } => entries.iter().filter(|p| p.is_valid()).count(),
            Shape::TwoLevel { l1, .. } => l1
                .iter()
                .filter_map(|l2| l2.as_ref())
                .flat_map(|l2| l2.iter())
                .filter(|p| p.is_valid())
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_then_lookup_round_trips() {
        let mut pt = PageTable::single_level(16);
        pt.map(3, 7, PteFlags::USER).unwrap();
        let pte = pt.lookup(3).unwrap();
        assert_eq!(pte.frame, 7);
        assert!(pte.is_valid());
    }

    #[test]
    fn unmap_preserves_frame_clears_valid() {
        let mut pt = PageTable::single_level(16);
        pt.map(3, 7, PteFlags::empty()).unwrap();
        pt.unmap(3).unwrap();
        let pte = pt.lookup(3).unwrap();
        assert_eq!(pte.frame, 7);
        assert!(!pte.is_valid());
    }

    #[test]
    fn two_level_splits_vpn_and_lazily_allocates() {
        let mut pt = PageTable::two_level(1 << 20);
        pt.map(1025, 1, PteFlags::empty()).unwrap();
        assert!(pt.lookup(1025).unwrap().is_valid());
        assert!(pt.lookup(1024).unwrap().frame == 0 && !pt.lookup(1024).unwrap().is_valid());
    }

    #[test]
    fn out_of_range_vpn_is_none() {
        let pt = PageTable::single_level(4);
        assert!(pt.lookup(4).is_none());
    }
}
