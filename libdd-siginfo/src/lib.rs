// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! Prints a human readable report when the process receives a fatal signal, then exits.
//!
//! Once [`setup`] (or [`init`]) has run, a SIGILL, SIGFPE, SIGSEGV, SIGBUS or SIGABRT produces:
//! 1. A description of the signal and the fields of its `siginfo_t`:
//!    ```text
//!    Segmentation Fault! (SIGSEGV)
//!    info.si_signo = 11
//!    info.si_errno = 0
//!    info.si_code  = 1 (SEGV_MAPERR; Address not mapped to object)
//!    info.si_addr  = 0x000000000000007b
//!    ```
//! 2. The general purpose registers of the faulting thread, on targets whose signal context layout
//!    is known (Linux on x86-64, x86 and AArch64).
//! 3. A stack trace of at most 20 frames. Where the context is known this follows the frame
//!    pointers from the faulting instruction; elsewhere the stack of the handler is captured with
//!    `backtrace`.
//!
//! The process then ends with `_exit(255)`. Old handlers are never chained to: the program state
//! after one of these signals cannot be trusted.
//!
//! The report is written one line at a time to a [`LogSink`], stderr by default. Lines are
//! formatted on the stack, so the default path does not allocate.
#![cfg(unix)]

mod collector;
mod crash_info;
mod shared;

pub use collector::*;
pub use crash_info::*;
pub use shared::configuration::*;
pub use shared::constants::*;
pub use shared::log::{
    reset_log_sink, set_log_sink, stderr_sink, GlobalSink, LineBuffer, LineSink, LogSink,
    MAX_LINE_LEN,
};
