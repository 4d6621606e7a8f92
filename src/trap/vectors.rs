//! Per-vector entry stubs.
//!
//! Each `trap_vector_N` pushes a zero error code unless the CPU already pushed
//! one (`code` below), pushes `N`, and jumps to `trap_common`, which saves the general
//! registers into a [`TrapFrame`] on the stack and hands it to the kernel's
//! trap entry. `trap_vector_table` lists the 256 stub addresses in vector
//! order for [`idt::init`](crate::trap::idt::init).
//!
//! [`TrapFrame`]: crate::trap::TrapFrame

use crate::trap::idt::VECTOR_COUNT;

macro_rules! trap_stubs {
    ($($vector:literal $kind:ident),* $(,)?) => {
        core::arch::global_asm!(
            ".pushsection .text.trap_vectors, \"ax\"",
            $(
                concat!(".global trap_vector_", stringify!($vector)),
                concat!("trap_vector_", stringify!($vector), ":"),
                concat!(".ifc ", stringify!($kind), ",zero"),
                "push 0",
                ".endif",
                concat!("push ", stringify!($vector)),
                "jmp trap_common",
            )*
            "trap_common:",
            "push rax",
            "push rcx",
            "push rdx",
            "push rdi",
            "push rsi",
            "push r8",
            "push r9",
            "push r10",
            "push r11",
            "push rbx",
            "push rbp",
            "push r12",
            "push r13",
            "push r14",
            "push r15",
            "mov rdi, rsp",
            "cld",
            "call {entry}",
            "pop r15",
            "pop r14",
            "pop r13",
            "pop r12",
            "pop rbp",
            "pop rbx",
            "pop r11",
            "pop r10",
            "pop r9",
            "pop r8",
            "pop rsi",
            "pop rdi",
            "pop rdx",
            "pop rcx",
            "pop rax",
            "add rsp, 16",
            "iretq",
            ".popsection",
            ".pushsection .rodata.trap_vectors, \"a\"",
            ".balign 8",
            ".global trap_vector_table",
            "trap_vector_table:",
            $(
                concat!(".quad trap_vector_", stringify!($vector)),
            )*
            ".popsection",
            entry = sym crate::kernel::trap_entry,
        );
    };
}

trap_stubs! {
    0 zero, 1 zero, 2 zero, 3 zero, 4 zero, 5 zero, 6 zero, 7 zero,
    8 code, 9 zero, 10 code, 11 code, 12 code, 13 code, 14 code, 15 zero,
    16 zero, 17 code, 18 zero, 19 zero, 20 zero, 21 code, 22 zero, 23 zero,
    24 zero, 25 zero, 26 zero, 27 zero, 28 zero, 29 code, 30 code, 31 zero,
    32 zero, 33 zero, 34 zero, 35 zero, 36 zero, 37 zero, 38 zero, 39 zero,
    40 zero, 41 zero, 42 zero, 43 zero, 44 zero, 45 zero, 46 zero, 47 zero,
    48 zero, 49 zero, 50 zero, 51 zero, 52 zero, 53 zero, 54 zero, 55 zero,
    56 zero, 57 zero, 58 zero, 59 zero, 60 zero, 61 zero, 62 zero, 63 zero,
    64 zero, 65 zero, 66 zero, 67 zero, 68 zero, 69 zero, 70 zero, 71 zero,
    72 zero, 73 zero, 74 zero, 75 zero, 76 zero, 77 zero, 78 zero, 79 zero,
    80 zero, 81 zero, 82 zero, 83 zero, 84 zero, 85 zero, 86 zero, 87 zero,
    88 zero, 89 zero, 90 zero, 91 zero, 92 zero, 93 zero, 94 zero, 95 zero,
    96 zero, 97 zero, 98 zero, 99 zero, 100 zero, 101 zero, 102 zero, 103 zero,
    104 zero, 105 zero, 106 zero, 107 zero, 108 zero, 109 zero, 110 zero, 111 zero,
    112 zero, 113 zero, 114 zero, 115 zero, 116 zero, 117 zero, 118 zero, 119 zero,
    120 zero, 121 zero, 122 zero, 123 zero, 124 zero, 125 zero, 126 zero, 127 zero,
    128 zero, 129 zero, 130 zero, 131 zero, 132 zero, 133 zero, 134 zero, 135 zero,
    136 zero, 137 zero, 138 zero, 139 zero, 140 zero, 141 zero, 142 zero, 143 zero,
    144 zero, 145 zero, 146 zero, 147 zero, 148 zero, 149 zero, 150 zero, 151 zero,
    152 zero, 153 zero, 154 zero, 155 zero, 156 zero, 157 zero, 158 zero, 159 zero,
    160 zero, 161 zero, 162 zero, 163 zero, 164 zero, 165 zero, 166 zero, 167 zero,
    168 zero, 169 zero, 170 zero, 171 zero, 172 zero, 173 zero, 174 zero, 175 zero,
    176 zero, 177 zero, 178 zero, 179 zero, 180 zero, 181 zero, 182 zero, 183 zero,
    184 zero, 185 zero, 186 zero, 187 zero, 188 zero, 189 zero, 190 zero, 191 zero,
    192 zero, 193 zero, 194 zero, 195 zero, 196 zero, 197 zero, 198 zero, 199 zero,
    200 zero, 201 zero, 202 zero, 203 zero, 204 zero, 205 zero, 206 zero, 207 zero,
    208 zero, 209 zero, 210 zero, 211 zero, 212 zero, 213 zero, 214 zero, 215 zero,
    216 zero, 217 zero, 218 zero, 219 zero, 220 zero, 221 zero, 222 zero, 223 zero,
    224 zero, 225 zero, 226 zero, 227 zero, 228 zero, 229 zero, 230 zero, 231 zero,
    232 zero, 233 zero, 234 zero, 235 zero, 236 zero, 237 zero, 238 zero, 239 zero,
    240 zero, 241 zero, 242 zero, 243 zero, 244 zero, 245 zero, 246 zero, 247 zero,
    248 zero, 249 zero, 250 zero, 251 zero, 252 zero, 253 zero, 254 zero, 255 zero,
}

extern "C" {
    static trap_vector_table: [u64; VECTOR_COUNT];
}

/// Addresses of the entry stubs, indexed by vector.
pub fn stubs() -> &'static [u64; VECTOR_COUNT] {
    unsafe { &*core::ptr::addr_of!(trap_vector_table) }
}
