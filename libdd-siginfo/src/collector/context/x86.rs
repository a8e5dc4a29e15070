// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
use super::ContextLayout;
use libc::ucontext_t;

/// `mcontext_t.gregs`, in `REG_*` index order from <sys/ucontext.h>.
const NAMES: [&str; 19] = [
    "GS", "FS", "ES", "DS", "EDI", "ESI", "EBP", "ESP", "EBX", "EDX", "ECX", "EAX", "TRAPNO",
    "ERR", "EIP", "CS", "EFL", "UESP", "SS",
];

pub struct X86Layout;

impl ContextLayout for X86Layout {
    const REGISTER_COUNT: usize = NAMES.len();
    const IP_INDEX: usize = 14;
    const FP_INDEX: usize = 6;
    const SP_INDEX: usize = 7;

    fn register_name(index: usize) -> Option<&'static str> {
        NAMES.get(index).copied()
    }

    fn read_register(ucontext: &ucontext_t, index: usize) -> usize {
        // greg_t is signed; keep the bit pattern instead of sign-extending.
        ucontext.uc_mcontext.gregs[index] as u32 as usize
    }
}
