//! Kernel-wide limits and the user address-space layout the fault path relies on.

/// Size of one page, the unit of stack growth.
pub const PAGE_SIZE: u64 = 4096;

/// First kernel virtual address; user space lies strictly below it.
pub const KERNEL_BASE: u64 = 0x8000_0000;

/// Upper bound on pages granted below a process's base stack page.
pub const MAX_STACK_EXTENSIONS: usize = 100;

/// Processors the kernel keeps per-CPU state for.
pub const MAX_CPUS: usize = 8;

/// Bytes kept of a process name.
pub const PROC_NAME_LEN: usize = 16;

/// Where the user stack sits and how far it may grow.
///
/// The base stack page ends one guard page below `kernel_base`, so the lowest
/// valid stack address of a process with `k` extensions is
/// `kernel_base - 2 * page_size - k * page_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackLayout {
    pub page_size: u64,
    pub kernel_base: u64,
    pub max_extensions: usize,
}

impl StackLayout {
    pub const fn new() -> Self {
        Self {
            page_size: PAGE_SIZE,
            kernel_base: KERNEL_BASE,
            max_extensions: MAX_STACK_EXTENSIONS,
        }
    }

    /// Stack bottom before any extension.
    pub const fn base_bottom(&self) -> u64 {
        self.kernel_base - 2 * self.page_size
    }

    /// Stack bottom after `extensions` granted pages.
    pub const fn bottom(&self, extensions: usize) -> u64 {
        self.base_bottom() - extensions as u64 * self.page_size
    }

    /// `None` when rounding would leave the address space.
    pub const fn page_round_up(&self, addr: u64) -> Option<u64> {
        match addr.checked_add(self.page_size - 1) {
            Some(end) => Some(end & !(self.page_size - 1)),
            None => None,
        }
    }
}

impl Default for StackLayout {
    fn default() -> Self {
        Self::new()
    }
}
