// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Maximum number of frames printed in a stack trace.
///
/// This limit prevents runaway frame walking in case of stack corruption.
pub const MAX_BACKTRACE_FRAMES: usize = 20;

/// Exit status of a process that was terminated by the crash handler.
pub const SIGINFO_EXIT_STATUS: libc::c_int = 255;

/// The frame-pointer walk stops after the frame resolving to this symbol.
pub const ENTRY_FUNCTION_NAME: &str = "main";

/// Number of hex digits needed to print a native pointer.
pub const HEX_WIDTH: usize = 2 * std::mem::size_of::<usize>();

pub const SIGINFO_BEGIN_STACKTRACE: &str = "Stack trace:";
pub const SIGINFO_BEGIN_STACKTRACE_GENERIC: &str = "Stack trace (generic):";
pub const SIGINFO_END_STACKTRACE: &str = "End of stack trace";
