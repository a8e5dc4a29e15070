// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Formats the crash report, one line at a time, in the order: signal description, registers,
//! stack trace.

#[cfg(siginfo_ucontext)]
use super::context::ExecutionContext;
#[cfg(siginfo_frame_walk)]
use super::frame_pointer_walker::walk_frame_pointers;
use super::generic_walker::{capture_current_stack, emit_generic_frame};
#[cfg(siginfo_frame_walk)]
use super::symbolizer::Frame;
use super::symbolizer::{DefaultBeautifier, NameBeautifier};
use crate::crash_info::{classify, describe_subcode};
use crate::shared::constants::*;
use crate::shared::log::{emit_line, LineSink};
use libc::{c_int, c_void, siginfo_t};

/// Emits the full report for a fatal signal.
///
/// This does not terminate the process; the crash handler does that afterwards. It is exposed so
/// embedders with their own signal handler can produce the same report.
///
/// # Safety
/// `sig_info` and `ucontext` must each be null or valid for the duration of the call, as the
/// second and third arguments of an `SA_SIGINFO` handler are.
/// SIGNAL SAFETY:
///     Formatting and the default sink do not allocate. Demangling and the generic stack walk may.
pub unsafe fn emit_crash_report(
    w: &mut impl LineSink,
    signum: c_int,
    sig_info: *const siginfo_t,
    ucontext: *const c_void,
) {
    let beautifier = DefaultBeautifier::default();
    // SAFETY: upheld by the caller.
    emit_siginfo(w, signum, unsafe { sig_info.as_ref() });

    #[cfg(siginfo_ucontext)]
    {
        // SAFETY: upheld by the caller.
        let context = unsafe { ExecutionContext::from_raw(ucontext) };
        if let Some(context) = &context {
            emit_registers(w, context);
            emit_stacktrace_for_context(w, context, &beautifier);
            return;
        }
    }
    #[cfg(not(siginfo_ucontext))]
    let _ = ucontext;

    emit_stacktrace_generic(w, None, &beautifier);
}

/// Walks the frame pointers of the faulting thread when they look usable. When they do not, or
/// when the chain ends right after the faulting frame, the stack is captured instead, starting
/// at the faulting instruction.
#[cfg(siginfo_ucontext)]
fn emit_stacktrace_for_context(
    w: &mut impl LineSink,
    context: &ExecutionContext<'_>,
    beautifier: &impl NameBeautifier,
) {
    let ip = context.instruction_pointer();
    #[cfg(siginfo_frame_walk)]
    {
        if context.has_plausible_frame_base() {
            // SAFETY: the frame pointer comes from the context of the faulting thread.
            let emitted = unsafe {
                emit_stacktrace_by_frame_pointers(w, ip, context.frame_base(), beautifier)
            };
            if emitted > 1 {
                return;
            }
        }
    }
    emit_stacktrace_generic(w, Some(ip), beautifier);
}

/// Emits the description line, then the `siginfo_t` fields when they are available.
pub fn emit_siginfo(w: &mut impl LineSink, signum: c_int, sig_info: Option<&siginfo_t>) {
    let descriptor = classify(signum);
    match descriptor {
        Some(descriptor) => emit_line!(w, "{}! ({})", descriptor.message, descriptor.name),
        None => emit_line!(w, "Unknown bad signal {signum} caught!"),
    }

    let Some(info) = sig_info else {
        return;
    };
    emit_line!(w, "info.si_signo = {}", info.si_signo);
    emit_line!(w, "info.si_errno = {}", info.si_errno);
    emit_line!(
        w,
        "info.si_code  = {} ({})",
        info.si_code,
        describe_subcode(descriptor, info.si_code)
    );
    emit_line!(
        w,
        "info.si_addr  = 0x{:0HEX_WIDTH$x}",
        fault_address(info)
    );
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn fault_address(info: &siginfo_t) -> usize {
    // SAFETY: every siginfo_t has the field; it is only meaningful for memory faults.
    unsafe { info.si_addr() as usize }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn fault_address(info: &siginfo_t) -> usize {
    info.si_addr as usize
}

/// One line per register slot: `{name:>6} = 0x{value}`.
#[cfg(siginfo_ucontext)]
pub fn emit_registers(w: &mut impl LineSink, context: &ExecutionContext<'_>) {
    for (label, value) in context.registers() {
        emit_line!(w, "{label:>6} = 0x{value:0HEX_WIDTH$x}");
    }
}

/// Walks the frame-pointer chain from the faulting frame and prints each frame as soon as it is
/// reached. Stops after the entry function. Returns the number of frames printed.
///
/// # Safety
/// See [`walk_frame_pointers`].
#[cfg(siginfo_frame_walk)]
pub unsafe fn emit_stacktrace_by_frame_pointers(
    w: &mut impl LineSink,
    ip: usize,
    bp: usize,
    beautifier: &impl NameBeautifier,
) -> usize {
    emit_line!(w, "{SIGINFO_BEGIN_STACKTRACE}");
    let mut emitted = 0;
    // SAFETY: upheld by the caller.
    for (index, raw) in unsafe { walk_frame_pointers(ip, bp) }.enumerate() {
        emitted += 1;
        match Frame::symbolize(raw.ip, beautifier) {
            Some(frame) => {
                emit_line!(w, "{index:2}: {frame}");
                if frame.is_entry_function() {
                    break;
                }
            }
            None => emit_line!(
                w,
                "{index:2}: [dladdr failed for 0x{:0HEX_WIDTH$x}]",
                raw.ip
            ),
        }
    }
    emit_line!(w, "{SIGINFO_END_STACKTRACE}");
    emitted
}

/// Captures the stack of the calling thread and prints each frame. Inside a signal handler the
/// capture starts in the handler; passing the faulting instruction as `fault_ip` drops the frames
/// above it when the unwinder finds it.
pub fn emit_stacktrace_generic(
    w: &mut impl LineSink,
    fault_ip: Option<usize>,
    beautifier: &impl NameBeautifier,
) {
    emit_line!(w, "{SIGINFO_BEGIN_STACKTRACE_GENERIC}");
    let stack = capture_current_stack(fault_ip);
    for (index, raw) in stack.frames().iter().enumerate() {
        emit_generic_frame(w, index, raw.ip, beautifier);
    }
    emit_line!(w, "{SIGINFO_END_STACKTRACE}");
}
