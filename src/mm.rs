//! # User Page Mapping
//!
//! Just enough paging for the fault path: a handle naming a process page table,
//! a bump frame allocator over the largest usable region the bootloader
//! reported, and the two operations stack growth needs.
//!
//! Page tables are reached through the bootloader's complete physical memory
//! mapping at [`physical_memory_offset`].

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use bootloader_api::info::MemoryRegionKind;
use bootloader_api::BootInfo;
use x86_64::structures::paging::mapper::{FlagUpdateError, MapToError};
use x86_64::structures::paging::{
    FrameAllocator, Mapper, OffsetPageTable, Page, PageTable, PageTableFlags, PhysFrame, Size4KiB,
};
use x86_64::{PhysAddr, VirtAddr};

use crate::param::PAGE_SIZE;

static PHYSICAL_MEMORY_OFFSET: AtomicU64 = AtomicU64::new(0);
static PHYSICAL_MEMORY_END: AtomicU64 = AtomicU64::new(0);
static NEXT_PHYSICAL_FRAME: AtomicU64 = AtomicU64::new(0);

/// Page-table root of one address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSpace {
    root: PhysAddr,
}

impl AddressSpace {
    pub const fn new(root: PhysAddr) -> Self {
        Self { root }
    }

    /// The address space loaded in CR3 on this processor.
    pub fn current() -> Self {
        let (frame, _) = x86_64::registers::control::Cr3::read();
        Self::new(frame.start_address())
    }

    pub fn root(&self) -> PhysAddr {
        self.root
    }

    unsafe fn mapper(&self) -> OffsetPageTable<'static> {
        let offset = physical_memory_offset();
        let table: *mut PageTable = VirtAddr::new(self.root.as_u64() + offset).as_mut_ptr();
        OffsetPageTable::new(&mut *table, VirtAddr::new(offset))
    }

    /// Map zeroed, writable user pages over `[from, to)`.
    ///
    /// Pages mapped before a failure stay mapped; they belong to the address
    /// space and are released with it.
    pub fn grow(&self, from: u64, to: u64) -> Result<(), GrowError> {
        if from >= to || from % PAGE_SIZE != 0 {
            return Err(GrowError::BadRange);
        }

        let mut frames = BumpFrameAllocator;
        let mut mapper = unsafe { self.mapper() };
        let flags = PageTableFlags::PRESENT | PageTableFlags::WRITABLE | PageTableFlags::USER_ACCESSIBLE;
        let parent_flags = flags;

        let first: Page<Size4KiB> = Page::containing_address(VirtAddr::new(from));
        let last: Page<Size4KiB> = Page::containing_address(VirtAddr::new(to - 1));
        for page in Page::range_inclusive(first, last) {
            let frame = frames.allocate_frame().ok_or(GrowError::OutOfFrames)?;
            let frame_virt = VirtAddr::new(frame.start_address().as_u64() + physical_memory_offset());
            unsafe {
                core::ptr::write_bytes(frame_virt.as_mut_ptr::<u8>(), 0, PAGE_SIZE as usize);
                mapper
                    .map_to_with_table_flags(page, frame, flags, parent_flags, &mut frames)
                    .map_err(GrowError::from)?
                    .flush();
            }
        }
        Ok(())
    }

    /// Give user mode access to the page containing `addr`.
    pub fn set_user_accessible(&self, addr: u64) -> Result<(), GrowError> {
        let page: Page<Size4KiB> = Page::containing_address(VirtAddr::new(addr));
        let mut mapper = unsafe { self.mapper() };
        let flags = PageTableFlags::PRESENT | PageTableFlags::WRITABLE | PageTableFlags::USER_ACCESSIBLE;
        unsafe {
            mapper
                .update_flags(page, flags)
                .map_err(GrowError::from)?
                .flush();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowError {
    BadRange,
    OutOfFrames,
    AlreadyMapped,
    NotMapped,
}

impl fmt::Display for GrowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrowError::BadRange => write!(f, "empty or unaligned range"),
            GrowError::OutOfFrames => write!(f, "out of physical frames"),
            GrowError::AlreadyMapped => write!(f, "page already mapped"),
            GrowError::NotMapped => write!(f, "page not mapped"),
        }
    }
}

impl From<MapToError<Size4KiB>> for GrowError {
    fn from(err: MapToError<Size4KiB>) -> Self {
        match err {
            MapToError::FrameAllocationFailed => GrowError::OutOfFrames,
            MapToError::ParentEntryHugePage | MapToError::PageAlreadyMapped(_) => GrowError::AlreadyMapped,
        }
    }
}

impl From<FlagUpdateError> for GrowError {
    fn from(_: FlagUpdateError) -> Self {
        GrowError::NotMapped
    }
}

pub struct BumpFrameAllocator;

unsafe impl FrameAllocator<Size4KiB> for BumpFrameAllocator {
    fn allocate_frame(&mut self) -> Option<PhysFrame<Size4KiB>> {
        loop {
            let current = NEXT_PHYSICAL_FRAME.load(Ordering::Relaxed);
            let frame_addr = (current + PAGE_SIZE - 1) & !(PAGE_SIZE - 1);
            let next_frame = frame_addr + PAGE_SIZE;

            if next_frame > PHYSICAL_MEMORY_END.load(Ordering::Relaxed) {
                return None;
            }

            if NEXT_PHYSICAL_FRAME
                .compare_exchange_weak(current, next_frame, Ordering::SeqCst, Ordering::Relaxed)
                .is_ok()
            {
                return Some(PhysFrame::containing_address(PhysAddr::new(frame_addr)));
            }
        }
    }
}

pub fn physical_memory_offset() -> u64 {
    PHYSICAL_MEMORY_OFFSET.load(Ordering::Relaxed)
}

/// Record the physical memory window and hand the largest usable region to
/// the frame allocator. Frames below 16 MiB are left to the bootloader's
/// allocations.
pub fn init(boot_info: &BootInfo) -> Result<(), &'static str> {
    let offset = boot_info
        .physical_memory_offset
        .into_option()
        .ok_or("bootloader did not map physical memory")?;
    PHYSICAL_MEMORY_OFFSET.store(offset, Ordering::Release);

    let (start, end) = boot_info
        .memory_regions
        .iter()
        .filter(|r| r.kind == MemoryRegionKind::Usable)
        .map(|r| (r.start, r.end))
        .max_by_key(|(start, end)| end - start)
        .ok_or("no usable memory found")?;

    let start = start.max(16 * 1024 * 1024);
    if start >= end {
        return Err("usable memory ends below 16 MiB");
    }

    PHYSICAL_MEMORY_END.store(end, Ordering::Release);
    NEXT_PHYSICAL_FRAME.store(start, Ordering::Release);
    Ok(())
}
