//! Process descriptor: exclusively owns its page table.

use crate::pagetable::PageTable;

pub struct Process {
    pub pid: u32,
    pub page_table: PageTable,
    pub active: bool,
}

impl Process {
    pub fn new(pid: u32, page_table: PageTable) -> Self {
        Process { pid, page_table, active: true }
    }
}
