// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
use super::ContextLayout;
use libc::ucontext_t;

// x0..x30 live in `regs`, followed by the separate sp, pc and pstate fields.
const GENERAL_REGISTERS: usize = 31;
const SP_SLOT: usize = 31;
const PC_SLOT: usize = 32;
const PSTATE_SLOT: usize = 33;

const NAMES: [&str; 34] = [
    "x0", "x1", "x2", "x3", "x4", "x5", "x6", "x7", "x8", "x9", "x10", "x11", "x12", "x13", "x14",
    "x15", "x16", "x17", "x18", "x19", "x20", "x21", "x22", "x23", "x24", "x25", "x26", "x27",
    "x28", "fp", "lr", "sp", "pc", "pstate",
];

pub struct Aarch64Layout;

impl ContextLayout for Aarch64Layout {
    const REGISTER_COUNT: usize = NAMES.len();
    const IP_INDEX: usize = PC_SLOT;
    // x29
    const FP_INDEX: usize = 29;
    const SP_INDEX: usize = SP_SLOT;

    fn register_name(index: usize) -> Option<&'static str> {
        NAMES.get(index).copied()
    }

    fn read_register(ucontext: &ucontext_t, index: usize) -> usize {
        let mcontext = &ucontext.uc_mcontext;
        match index {
            i if i < GENERAL_REGISTERS => mcontext.regs[i] as usize,
            SP_SLOT => mcontext.sp as usize,
            PC_SLOT => mcontext.pc as usize,
            PSTATE_SLOT => mcontext.pstate as usize,
            _ => 0,
        }
    }
}
