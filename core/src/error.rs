//! Error taxonomy for the simulation core.
//!
//! Fatal errors (configuration, I/O at the boundary) propagate with `?`.
//! Per-reference soft failures (`ResourceExhaustion`-adjacent, `InvalidAddress`,
//! `PolicyFailure`) are caught by the VMM's trace loop, logged, and turned into
//! a skipped reference rather than aborting the run.

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("page size {0} is not a power of two")]
    InvalidPageSize(u32),

    #[error("TLB size must be greater than zero")]
    InvalidTlbSize,

    #[error("frame pool has no free frames")]
    NoFreeFrames,

    #[error("frame index {0} is out of range")]
    OutOfRange(usize),

    #[error("frame index {0} is already free")]
    AlreadyFree(usize),

    #[error("swap store is exhausted")]
    SwapExhausted,

    #[error("swap slot {0} is already free")]
    SwapAlreadyFree(usize),

    #[error("virtual page number {0} is outside the process address space")]
    InvalidAddress(usize),

    #[error("page table failed to allocate an L2 sub-table")]
    AllocFail,

    #[error("replacement policy could not select a victim")]
    NoVictim,

    #[error("maximum number of processes ({0}) exceeded")]
    ProcessLimit(usize),
}

pub type Result<T> = core::result::Result<T, Error>;
