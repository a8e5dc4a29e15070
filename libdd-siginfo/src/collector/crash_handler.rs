// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::emitters::emit_crash_report;
use crate::shared::constants::SIGINFO_EXIT_STATUS;
use crate::shared::log::{emit_line, GlobalSink};
use libc::{c_int, c_void, siginfo_t};
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering::SeqCst;

// Note that this file makes use the following async-signal safe functions in a signal handler.
// <https://man7.org/linux/man-pages/man7/signal-safety.7.html>
// - _exit
// - write (through the default sink)
// - dladdr is not on the list, but is in practice safe once the loader has finished startup.

/// Progress of the one crash report a process may produce.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    /// No fatal signal received yet.
    Idle = 0,
    /// A fatal signal claimed the report.
    Triggered = 1,
    /// The report is being written.
    Reporting = 2,
    /// The report is complete and the process is exiting.
    Terminated = 3,
}

impl HandlerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Triggered,
            2 => Self::Reporting,
            _ => Self::Terminated,
        }
    }
}

static STATE: AtomicU8 = AtomicU8::new(HandlerState::Idle as u8);

/// Current state of the crash handler.
pub fn handler_state() -> HandlerState {
    HandlerState::from_u8(STATE.load(SeqCst))
}

/// Claims the report for the caller. Only the first caller in the process succeeds.
fn begin_report() -> bool {
    STATE
        .compare_exchange(
            HandlerState::Idle as u8,
            HandlerState::Triggered as u8,
            SeqCst,
            SeqCst,
        )
        .is_ok()
}

pub(crate) extern "C" fn handle_posix_sigaction(
    signum: c_int,
    sig_info: *mut siginfo_t,
    ucontext: *mut c_void,
) {
    let sink = &mut GlobalSink;
    if !begin_report() {
        // Either another thread is reporting, or the report itself faulted. Do not re-enter.
        emit_line!(
            sink,
            "Fatal signal {signum} received while reporting a previous crash, terminating"
        );
        terminate();
    }

    STATE.store(HandlerState::Reporting as u8, SeqCst);
    // SAFETY: both pointers come straight from the kernel.
    unsafe { emit_crash_report(sink, signum, sig_info, ucontext) };
    STATE.store(HandlerState::Terminated as u8, SeqCst);
    terminate()
}

/// Ends the process without running exit handlers or flushing stdio, neither of which is safe
/// after a fatal signal.
pub fn terminate() -> ! {
    // SAFETY: `_exit` is async-signal-safe and has no preconditions.
    unsafe { libc::_exit(SIGINFO_EXIT_STATUS) }
}
