//! Simulation configuration and its fatal-at-bootstrap validation.

use crate::error::{Error, Result};
use crate::metrics::Latencies;
use crate::replacement::Algorithm;
use crate::tlb::TlbPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageTableType {
    Single,
    TwoLevel,
}

impl std::str::FromStr for PageTableType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SINGLE" => Ok(PageTableType::Single),
            "TWO_LEVEL" => Ok(PageTableType::TwoLevel),
            other => Err(format!("unknown page table type {other:?}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub ram_mb: u32,
    pub page_size: u32,
    pub swap_mb: u32,
    pub vspace_mb: u32,
    pub algorithm: Algorithm,
    pub tlb_size: u32,
    pub tlb_policy: TlbPolicy,
    pub pt_type: PageTableType,
    pub max_accesses: Option<u64>,
    pub seed: u64,
    pub latencies: Latencies,
    pub max_processes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ram_mb: 64,
            page_size: 4096,
            swap_mb: 256,
            vspace_mb: 4096,
            algorithm: Algorithm::Clock,
            tlb_size: 64,
            tlb_policy: TlbPolicy::Lru,
            pt_type: PageTableType::Single,
            max_accesses: None,
            seed: 42,
            latencies: Latencies::default(),
            max_processes: 256,
        }
    }
}

fn is_power_of_two(n: u32) -> bool {
    n != 0 && (n & (n - 1)) == 0
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if !is_power_of_two(self.page_size) {
            return Err(Error::InvalidPageSize(self.page_size));
        }
        if self.tlb_size == 0 {
            return Err(Error::InvalidTlbSize);
        }
        Ok(())
    }

    pub fn total_frames(&self) -> usize {
        (self.ram_mb as usize * 1024 * 1024) / self.page_size as usize
    }

    pub fn total_swap_slots(&self) -> usize {
        (self.swap_mb as usize * 1024 * 1024) / self.page_size as usize
    }

    pub fn total_pages(&self) -> usize {
        (self.vspace_mb as usize * 1024 * 1024) / self.page_size as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_power_of_two_page_size() {
        let mut cfg = Config::default();
        cfg.page_size = 4000;
        assert_eq!(cfg.validate().unwrap_err(), Error::InvalidPageSize(4000));
    }

    #[test]
    fn rejects_zero_tlb_size() {
        let mut cfg = Config::default();
        cfg.tlb_size = 0;
        assert_eq!(cfg.validate().unwrap_err(), Error::InvalidTlbSize);
    }

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }
}
