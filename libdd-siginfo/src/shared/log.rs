// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Line-oriented output for the crash report.
//!
//! Every logical line of the report is formatted into a fixed-size stack buffer and handed to a
//! [`LineSink`] in a single call. Nothing here allocates, so the default path (format, then
//! `write(2)` to stderr) can run inside a signal handler.

use std::fmt;
use std::ptr;
use std::sync::atomic::AtomicPtr;
use std::sync::atomic::Ordering::SeqCst;

/// Longest line we format, including the trailing newline. Longer lines are cut short.
pub const MAX_LINE_LEN: usize = 512;

/// Receives the report one newline-terminated line at a time.
pub trait LineSink {
    fn emit_line(&mut self, line: &str);
}

/// Signature of an embedder-supplied sink. The line is newline-terminated; the sink must be safe
/// to call from a signal handler.
pub type LogSink = fn(&str);

// Either null (use `stderr_sink`) or a `LogSink` cast to a pointer by `set_log_sink`.
static LOG_SINK: AtomicPtr<()> = AtomicPtr::new(ptr::null_mut());

/// Routes all subsequent report lines to `sink`.
///
/// ATOMICITY:
///     This function uses a store on an atomic pointer. A crash concurrent with this call will use
///     either the old or the new sink, never a torn value.
pub fn set_log_sink(sink: LogSink) {
    LOG_SINK.store(sink as *mut (), SeqCst);
}

/// Restores the default stderr sink.
pub fn reset_log_sink() {
    LOG_SINK.store(ptr::null_mut(), SeqCst);
}

fn current_sink() -> LogSink {
    let sink = LOG_SINK.load(SeqCst);
    if sink.is_null() {
        return stderr_sink;
    }
    // SAFETY: the only non-null values ever stored come from `set_log_sink`, which stores a
    // `LogSink` cast to a pointer of the same size.
    unsafe { std::mem::transmute::<*mut (), LogSink>(sink) }
}

/// Writes the line to file descriptor 2 with `write(2)`, which is async-signal-safe.
pub fn stderr_sink(line: &str) {
    write_all(line.as_bytes(), |bytes| {
        // SAFETY: the pointer and length come from a live slice.
        unsafe {
            libc::write(
                libc::STDERR_FILENO,
                bytes.as_ptr() as *const libc::c_void,
                bytes.len(),
            )
        }
    })
}

/// Retries short writes and EINTR. Gives up on any other error, or when nothing was written.
fn write_all(mut bytes: &[u8], mut write: impl FnMut(&[u8]) -> isize) {
    while !bytes.is_empty() {
        let written = write(bytes);
        if written < 0 {
            if nix::errno::Errno::last() == nix::errno::Errno::EINTR {
                continue;
            }
            return;
        }
        if written == 0 {
            return;
        }
        bytes = &bytes[written as usize..];
    }
}

/// The process-wide sink, as configured by [`set_log_sink`].
pub struct GlobalSink;

impl LineSink for GlobalSink {
    fn emit_line(&mut self, line: &str) {
        current_sink()(line)
    }
}

/// Collects lines without their trailing newline. Used by tests and by callers that want the
/// report as data.
impl LineSink for Vec<String> {
    fn emit_line(&mut self, line: &str) {
        self.push(line.trim_end_matches('\n').to_string());
    }
}

/// A fixed-capacity `fmt::Write` target for one line of output.
pub struct LineBuffer {
    buf: [u8; MAX_LINE_LEN],
    len: usize,
    truncated: bool,
}

impl LineBuffer {
    pub const fn new() -> Self {
        Self {
            buf: [0; MAX_LINE_LEN],
            len: 0,
            truncated: false,
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Appends the newline and returns the finished line.
    pub fn finish(&mut self) -> &str {
        // One byte is always kept free for the newline by `write_str`.
        self.buf[self.len] = b'\n';
        self.len += 1;
        // `write_str` only ever copies whole characters, so this cannot fail.
        std::str::from_utf8(&self.buf[..self.len]).unwrap_or_default()
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Write for LineBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let available = MAX_LINE_LEN - 1 - self.len;
        let mut take = s.len().min(available);
        while !s.is_char_boundary(take) {
            take -= 1;
        }
        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        if take < s.len() {
            self.truncated = true;
        }
        Ok(())
    }
}

/// Formats one line into a [`LineBuffer`] and hands it to the given [`LineSink`].
macro_rules! emit_line {
    ($sink:expr, $($arg:tt)*) => {{
        let mut line = $crate::shared::log::LineBuffer::new();
        let _ = ::std::fmt::Write::write_fmt(&mut line, format_args!($($arg)*));
        $crate::shared::log::LineSink::emit_line(&mut *$sink, line.finish());
    }};
}
pub(crate) use emit_line;
