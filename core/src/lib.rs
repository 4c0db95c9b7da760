//! Address-translation and page-fault simulation core.
//!
//! Owns the TLB, per-process page tables, the physical frame pool, the
//! swap store, and the replacement policy. Consumers (the `vmmctl`
//! binary, or tests) build a [`Config`], construct a [`Vmm`], and replay a
//! [`Trace`] through it.

pub mod config;
pub mod error;
pub mod frame;
pub mod metrics;
pub mod pagetable;
pub mod process;
pub mod replacement;
pub mod swap;
pub mod tlb;
pub mod trace;
pub mod vmm;

pub use config::Config;
pub use error::{Error, Result};
pub use metrics::Metrics;
pub use replacement::Algorithm;
pub use trace::{Op, Trace, TraceEntry};
pub use vmm::Vmm;
