// gdt.rs
//
// One GDT and TSS per processor slot. Each TSS names that processor's own
// ring 0 trap stack and double fault stack; sharing either between processors
// would let two traps run on the same stack.

use spin::Once;
use x86_64::structures::gdt::{Descriptor, GlobalDescriptorTable, SegmentSelector};
use x86_64::structures::tss::TaskStateSegment;
use x86_64::VirtAddr;

use crate::param::MAX_CPUS;
use crate::trap::idt::DOUBLE_FAULT_IST_INDEX;

const STACK_SIZE: usize = 4096 * 4;

#[repr(C, align(16))]
struct Stack([u8; STACK_SIZE]);

struct CpuStacks {
    double_fault: Stack,
    /// Loaded on a ring 3 -> ring 0 trap until the scheduler installs a
    /// per-process kernel stack.
    trap: Stack,
}

static mut STACKS: [CpuStacks; MAX_CPUS] = [const {
    CpuStacks {
        double_fault: Stack([0; STACK_SIZE]),
        trap: Stack([0; STACK_SIZE]),
    }
}; MAX_CPUS];

static TSS: [Once<TaskStateSegment>; MAX_CPUS] = [const { Once::new() }; MAX_CPUS];

fn stack_top(stack: *const Stack) -> VirtAddr {
    VirtAddr::from_ptr(stack) + STACK_SIZE as u64
}

/// Task state segment of processor slot `cpu`.
pub fn tss(cpu: usize) -> &'static TaskStateSegment {
    TSS[cpu].call_once(|| {
        let mut tss = TaskStateSegment::new();
        let (double_fault, trap) = unsafe {
            (
                core::ptr::addr_of!(STACKS[cpu].double_fault),
                core::ptr::addr_of!(STACKS[cpu].trap),
            )
        };
        tss.interrupt_stack_table[DOUBLE_FAULT_IST_INDEX as usize] = stack_top(double_fault);
        tss.privilege_stack_table[0] = stack_top(trap);
        tss
    })
}

pub struct Selectors {
    pub kernel_code: SegmentSelector,
    pub kernel_data: SegmentSelector,
    pub user_code: SegmentSelector,
    pub user_data: SegmentSelector,
    tss: SegmentSelector,
}

static GDT: [Once<(GlobalDescriptorTable, Selectors)>; MAX_CPUS] = [const { Once::new() }; MAX_CPUS];

fn gdt(cpu: usize) -> &'static (GlobalDescriptorTable, Selectors) {
    GDT[cpu].call_once(|| {
        let mut gdt = GlobalDescriptorTable::new();

        let kernel_code = gdt.append(Descriptor::kernel_code_segment());
        let kernel_data = gdt.append(Descriptor::kernel_data_segment());
        let user_data = gdt.append(Descriptor::user_data_segment());
        let user_code = gdt.append(Descriptor::user_code_segment());
        let tss = gdt.append(Descriptor::tss_segment(tss(cpu)));

        (
            gdt,
            Selectors {
                kernel_code,
                kernel_data,
                user_code,
                user_data,
                tss,
            },
        )
    })
}

/// Segment selectors; every processor's GDT has the same layout.
pub fn selectors(cpu: usize) -> &'static Selectors {
    &gdt(cpu).1
}

/// Load processor slot `cpu`'s GDT and TSS on the calling processor.
pub fn init(cpu: usize) {
    let (ref gdt, ref selectors) = *gdt(cpu);
    gdt.load();

    unsafe {
        use x86_64::instructions::segmentation::{Segment, CS, DS, ES, SS};

        CS::set_reg(selectors.kernel_code);
        DS::set_reg(selectors.kernel_data);
        ES::set_reg(selectors.kernel_data);
        SS::set_reg(selectors.kernel_data);

        x86_64::instructions::tables::load_tss(selectors.tss);
    }
}
