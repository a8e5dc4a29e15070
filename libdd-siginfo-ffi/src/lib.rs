// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]
#![cfg(unix)]

use libc::{c_char, c_int};
use libdd_siginfo::{reset_log_sink, set_log_sink, stderr_sink, SiginfoConfiguration};
use std::ptr;
use std::sync::atomic::AtomicPtr;
use std::sync::atomic::Ordering::SeqCst;

/// Receives one NUL-terminated report line, including its trailing newline. Called from the signal
/// handler, so it must be async-signal-safe.
pub type LogSinkCallback = extern "C" fn(line: *const c_char);

// Either null or a `LogSinkCallback` cast to a pointer.
static C_SINK: AtomicPtr<()> = AtomicPtr::new(ptr::null_mut());

#[no_mangle]
#[must_use]
/// Installs the crash handler with the default configuration: an alternate signal stack is created
/// and used.
///
/// Returns 1 on success and 0 if a signal could not be registered. The reason has already been
/// written to the log sink.
///
/// # Preconditions
///   None
/// # Safety
///   No other installation should run concurrently.
/// # Atomicity
///   This function is not atomic. A crash during its execution is handled by whichever
///   disposition its signal had at that moment.
pub extern "C" fn ddog_siginfo_setup() -> c_int {
    libdd_siginfo::setup() as c_int
}

#[no_mangle]
#[must_use]
/// Installs the crash handler, choosing whether to create and use an alternate signal stack.
/// Creating an alternate stack without using it is rejected.
///
/// Returns 1 on success and 0 on failure.
///
/// # Preconditions
///   None
/// # Safety
///   No other installation should run concurrently.
pub extern "C" fn ddog_siginfo_init(create_alt_stack: bool, use_alt_stack: bool) -> c_int {
    let config = match SiginfoConfiguration::new(create_alt_stack, use_alt_stack) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid siginfo configuration");
            return 0;
        }
    };
    libdd_siginfo::init(config).is_ok() as c_int
}

#[no_mangle]
/// Routes every report line to `sink`. Passing null restores the default, which writes to stderr.
///
/// # Preconditions
///   None
/// # Safety
///   `sink` must stay callable for the rest of the process lifetime.
/// # Atomicity
///   A crash concurrent with this call uses either the old or the new sink.
pub unsafe extern "C" fn ddog_siginfo_set_log_sink(sink: Option<LogSinkCallback>) {
    match sink {
        Some(sink) => {
            C_SINK.store(sink as *mut (), SeqCst);
            set_log_sink(forward_to_c_sink);
        }
        None => {
            reset_log_sink();
            C_SINK.store(ptr::null_mut(), SeqCst);
        }
    }
}

/// Copies the line into a NUL-terminated stack buffer and hands it to the C sink.
fn forward_to_c_sink(line: &str) {
    let sink = C_SINK.load(SeqCst);
    if sink.is_null() {
        return stderr_sink(line);
    }
    // SAFETY: the only non-null values stored come from `ddog_siginfo_set_log_sink`.
    let sink = unsafe { std::mem::transmute::<*mut (), LogSinkCallback>(sink) };

    let mut buf = [0u8; libdd_siginfo::MAX_LINE_LEN + 1];
    let len = line.len().min(libdd_siginfo::MAX_LINE_LEN);
    buf[..len].copy_from_slice(&line.as_bytes()[..len]);
    sink(buf.as_ptr() as *const c_char);
}
