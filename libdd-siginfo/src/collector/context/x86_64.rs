// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
use super::ContextLayout;
use libc::ucontext_t;

/// `mcontext_t.gregs`, in `REG_*` index order from <sys/ucontext.h>.
const NAMES: [&str; 23] = [
    "R8", "R9", "R10", "R11", "R12", "R13", "R14", "R15", "RDI", "RSI", "RBP", "RBX", "RDX",
    "RAX", "RCX", "RSP", "RIP", "EFL", "CSGSFS", "ERR", "TRAPNO", "OLDMASK", "CR2",
];

pub struct X86_64Layout;

impl ContextLayout for X86_64Layout {
    const REGISTER_COUNT: usize = NAMES.len();
    const IP_INDEX: usize = 16;
    const FP_INDEX: usize = 10;
    const SP_INDEX: usize = 15;

    fn register_name(index: usize) -> Option<&'static str> {
        NAMES.get(index).copied()
    }

    fn read_register(ucontext: &ucontext_t, index: usize) -> usize {
        ucontext.uc_mcontext.gregs[index] as usize
    }
}
