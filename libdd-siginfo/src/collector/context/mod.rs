// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Read access to the machine context the kernel hands to an `SA_SIGINFO` handler.
//!
//! Which registers exist, what they are called, and which ones hold the instruction and frame
//! pointers depends on the CPU. Each supported architecture provides a [`ContextLayout`]; the one
//! matching the build target is exported as [`NativeLayout`]. This module is only compiled for
//! targets that have a layout (`cfg(siginfo_ucontext)`, set by the build script).

use libc::{c_void, ucontext_t};
use std::fmt;

#[cfg(target_arch = "aarch64")]
mod aarch64;
#[cfg(target_arch = "x86")]
mod x86;
#[cfg(target_arch = "x86_64")]
mod x86_64;

#[cfg(target_arch = "aarch64")]
pub use aarch64::Aarch64Layout as NativeLayout;
#[cfg(target_arch = "x86")]
pub use x86::X86Layout as NativeLayout;
#[cfg(target_arch = "x86_64")]
pub use x86_64::X86_64Layout as NativeLayout;

/// Describes the general purpose register file stored in a `ucontext_t`.
pub trait ContextLayout {
    /// Number of register slots; valid indices are `0..REGISTER_COUNT`.
    const REGISTER_COUNT: usize;
    /// Slot holding the address of the faulting instruction.
    const IP_INDEX: usize;
    /// Slot holding the frame pointer of the faulting function.
    const FP_INDEX: usize;
    /// Slot holding the stack pointer at the time of the fault.
    const SP_INDEX: usize;

    fn register_name(index: usize) -> Option<&'static str>;

    /// Reads slot `index`. Callers guarantee `index < REGISTER_COUNT`.
    fn read_register(ucontext: &ucontext_t, index: usize) -> usize;
}

/// Borrowed view of the context of the faulting thread. Only valid for the duration of the signal
/// handler invocation that received it.
#[derive(Clone, Copy)]
pub struct ExecutionContext<'a> {
    ucontext: &'a ucontext_t,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(ucontext: &'a ucontext_t) -> Self {
        Self { ucontext }
    }

    /// # Safety
    /// `ucontext` must be null or point to a `ucontext_t` that stays valid for `'a`, such as the
    /// third argument of an `SA_SIGINFO` handler.
    pub unsafe fn from_raw(ucontext: *const c_void) -> Option<Self> {
        // SAFETY: upheld by the caller.
        unsafe { (ucontext as *const ucontext_t).as_ref() }.map(Self::new)
    }

    pub fn register_count(&self) -> usize {
        NativeLayout::REGISTER_COUNT
    }

    pub fn register_value(&self, index: usize) -> Option<usize> {
        (index < NativeLayout::REGISTER_COUNT)
            .then(|| NativeLayout::read_register(self.ucontext, index))
    }

    pub fn instruction_pointer(&self) -> usize {
        NativeLayout::read_register(self.ucontext, NativeLayout::IP_INDEX)
    }

    pub fn frame_base(&self) -> usize {
        NativeLayout::read_register(self.ucontext, NativeLayout::FP_INDEX)
    }

    pub fn stack_pointer(&self) -> usize {
        NativeLayout::read_register(self.ucontext, NativeLayout::SP_INDEX)
    }

    /// Whether the frame pointer can start a walk. Code built without frame pointers uses the
    /// register for data; on a downward-growing stack a live frame never lies below the stack
    /// pointer.
    pub fn has_plausible_frame_base(&self) -> bool {
        let fp = self.frame_base();
        fp != 0 && fp % std::mem::align_of::<usize>() == 0 && fp >= self.stack_pointer()
    }

    /// Every register slot in index order, with its label.
    pub fn registers(&self) -> impl Iterator<Item = (RegisterLabel, usize)> + 'a {
        let ucontext = self.ucontext;
        (0..NativeLayout::REGISTER_COUNT)
            .map(move |i| (RegisterLabel(i), NativeLayout::read_register(ucontext, i)))
    }
}

pub fn register_name(index: usize) -> Option<&'static str> {
    NativeLayout::register_name(index)
}

/// Displays the symbolic name of a register slot, or `reg[NN]` when it has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterLabel(pub usize);

impl fmt::Display for RegisterLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match register_name(self.0) {
            Some(name) => f.pad(name),
            None => write!(f, "reg[{:02}]", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zeroed_ucontext() -> ucontext_t {
        // SAFETY: ucontext_t is plain old data; all-zero is a valid bit pattern.
        unsafe { std::mem::zeroed() }
    }

    #[test]
    fn test_every_slot_has_a_label() {
        for index in 0..NativeLayout::REGISTER_COUNT {
            let label = RegisterLabel(index).to_string();
            assert!(!label.is_empty());
        }
        assert!(NativeLayout::IP_INDEX < NativeLayout::REGISTER_COUNT);
        assert!(NativeLayout::FP_INDEX < NativeLayout::REGISTER_COUNT);
        assert!(NativeLayout::SP_INDEX < NativeLayout::REGISTER_COUNT);
    }

    #[test]
    fn test_unnamed_slot_falls_back_to_index() {
        let past_end = NativeLayout::REGISTER_COUNT;
        assert_eq!(register_name(past_end), None);
        assert_eq!(
            RegisterLabel(past_end).to_string(),
            format!("reg[{past_end:02}]")
        );
    }

    #[test]
    fn test_label_honours_width() {
        let name = register_name(NativeLayout::IP_INDEX).unwrap();
        let padded = format!("{:>6}", RegisterLabel(NativeLayout::IP_INDEX));
        assert_eq!(padded.len(), name.len().max(6));
        assert!(padded.ends_with(name));
    }

    #[test]
    fn test_out_of_range_register_is_none() {
        let ucontext = zeroed_ucontext();
        let context = ExecutionContext::new(&ucontext);
        assert_eq!(context.register_value(context.register_count()), None);
        assert_eq!(context.register_value(0), Some(0));
        assert_eq!(context.registers().count(), NativeLayout::REGISTER_COUNT);
    }

    #[cfg(target_arch = "x86_64")]
    fn set_register(ucontext: &mut ucontext_t, index: usize, value: usize) {
        ucontext.uc_mcontext.gregs[index] = value as i64;
    }

    #[cfg(target_arch = "aarch64")]
    fn set_register(ucontext: &mut ucontext_t, index: usize, value: usize) {
        if index == NativeLayout::SP_INDEX {
            ucontext.uc_mcontext.sp = value as u64;
        } else {
            ucontext.uc_mcontext.regs[index] = value as u64;
        }
    }

    #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
    #[test]
    fn test_frame_base_below_stack_pointer_is_rejected() {
        let mut ucontext = zeroed_ucontext();
        let context = ExecutionContext::new(&ucontext);
        assert!(!context.has_plausible_frame_base());

        // A data pointer below the stack, as left in the register by code without frame pointers.
        set_register(&mut ucontext, NativeLayout::SP_INDEX, 0x7fff_1990_f950);
        set_register(&mut ucontext, NativeLayout::FP_INDEX, 0x7f15_415e_27c0);
        assert!(!ExecutionContext::new(&ucontext).has_plausible_frame_base());

        set_register(&mut ucontext, NativeLayout::FP_INDEX, 0x7fff_1990_f9a0);
        assert!(ExecutionContext::new(&ucontext).has_plausible_frame_base());

        set_register(&mut ucontext, NativeLayout::FP_INDEX, 0x7fff_1990_f9a3);
        assert!(!ExecutionContext::new(&ucontext).has_plausible_frame_base());
    }

    #[test]
    fn test_from_raw_null_is_unavailable() {
        assert!(unsafe { ExecutionContext::from_raw(std::ptr::null()) }.is_none());
    }
}
