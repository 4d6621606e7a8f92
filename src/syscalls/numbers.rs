//! System call numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum SyscallNumber {
    // Process Management (20-39)
    Exit = 20,
    GetPid = 24,

    // Time (60-79)
    Uptime = 61,

    // Unknown
    Unknown = usize::MAX,
}

impl From<u64> for SyscallNumber {
    fn from(num: u64) -> Self {
        match num {
            20 => Self::Exit,
            24 => Self::GetPid,
            61 => Self::Uptime,
            _ => Self::Unknown,
        }
    }
}
