//! # On-Demand Stack Growth
//!
//! A user stack starts as one page. When the process touches the page just
//! below its lowest stack address, the fault is taken as a request for one more
//! page instead of a crash:
//!
//! ```text
//!  kernel_base ─┬──────────────┐
//!               │  guard page  │
//!               ├──────────────┤ ← base_bottom + page
//!               │  base stack  │
//!               ├──────────────┤ ← base_bottom
//!               │  granted #1  │
//!               ├──────────────┤ ← bottom (k = 1)
//!               │  fault here  │   grants #2 if above heap and k < cap
//!               ├──────────────┤
//!               ~              ~
//!               │  data/heap   │
//!            0 ─┴──────────────┘
//! ```
//!
//! The fault must land in `(bottom - page, bottom]`, i.e. round up to exactly
//! `bottom`. A fault anywhere else is not stack growth. The check, the mapping
//! and the bump of the extension count all happen under the process's stack
//! lock, so two processors faulting on the same process cannot grant the same
//! page twice or skip one.

use core::fmt;

use crate::mm::GrowError;
use crate::param::StackLayout;
use crate::platform::Platform;
use crate::proc::Process;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackGrant {
    /// Start of the newly mapped page, the new stack bottom.
    pub page: u64,
    pub extensions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackRejection {
    NotAtBottom { rounded: Option<u64>, bottom: u64 },
    HitsHeap { bottom: u64, size: u64 },
    LimitReached { extensions: usize },
    MapFailed(GrowError),
}

impl fmt::Display for StackRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackRejection::NotAtBottom { rounded: Some(rounded), bottom } => {
                write!(f, "m={:#x} bstack={:#x}: not at stack bottom", rounded, bottom)
            }
            StackRejection::NotAtBottom { rounded: None, bottom } => {
                write!(f, "bstack={:#x}: address out of range", bottom)
            }
            StackRejection::HitsHeap { bottom, size } => {
                write!(f, "bstack={:#x} sz={:#x}: stack would meet heap", bottom, size)
            }
            StackRejection::LimitReached { extensions } => {
                write!(f, "stackcount={}: limit reached", extensions)
            }
            StackRejection::MapFailed(err) => write!(f, "allocation failed: {}", err),
        }
    }
}

/// Grant one stack page for a fault at `fault_addr`, or say why not.
pub fn grow<P: Platform + ?Sized>(
    platform: &P,
    process: &Process,
    fault_addr: u64,
    layout: &StackLayout,
) -> Result<StackGrant, StackRejection> {
    let mut stack = process.lock_stack();
    let bottom = stack.bottom;

    let rounded = layout.page_round_up(fault_addr);
    if rounded != Some(bottom) {
        return Err(StackRejection::NotAtBottom { rounded, bottom });
    }

    let size = process.size();
    if bottom <= size {
        return Err(StackRejection::HitsHeap { bottom, size });
    }

    if stack.extensions >= layout.max_extensions {
        return Err(StackRejection::LimitReached {
            extensions: stack.extensions,
        });
    }

    let page = bottom - layout.page_size;
    let space = process.address_space();
    platform
        .grow_address_space(space, page, bottom)
        .map_err(StackRejection::MapFailed)?;
    platform.set_user_accessible(space, page);

    stack.extensions += 1;
    stack.bottom = page;

    #[cfg(feature = "trace_stack_growth")]
    platform.diag(format_args!(
        "pid {}: stackcount={} bstack={:#x} rc={:#x}",
        process.pid(),
        stack.extensions,
        page,
        fault_addr
    ));

    Ok(StackGrant {
        page,
        extensions: stack.extensions,
    })
}
