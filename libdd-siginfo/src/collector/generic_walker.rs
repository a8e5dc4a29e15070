// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Stack capture for targets where the frame-pointer walk is unavailable.
//!
//! SIGNAL SAFETY:
//!     Unwinding with `backtrace` is not guaranteed to be signal safe.
//!     <https://github.com/rust-lang/backtrace-rs/issues/414>
//!     Capturing the instruction pointers seems safe in practice; resolving them through debug info
//!     may allocate and is only attempted for frames that `dladdr` cannot name.

use super::frame_pointer_walker::{CallStack, RawFrame};
use super::symbolizer::{resolve, NameBeautifier, UNKNOWN_NAME};
use crate::shared::constants::{HEX_WIDTH, MAX_BACKTRACE_FRAMES};
use crate::shared::log::{emit_line, LineSink};
use libc::c_void;

// Frames looked at while searching for the faulting instruction.
const MAX_SEARCH_DEPTH: usize = 4 * MAX_BACKTRACE_FRAMES;

/// Captures up to `MAX_BACKTRACE_FRAMES` instruction pointers of the calling thread, innermost
/// first.
///
/// Without `start_ip` the frames include the capturing code itself. With it, the capture starts at
/// the first frame whose instruction pointer is `start_ip`, which from a signal handler is the
/// interrupted frame. If no such frame is found the whole capture is returned.
pub fn capture_current_stack(start_ip: Option<usize>) -> CallStack {
    let mut everything = CallStack::new();
    let mut from_start: Option<CallStack> = None;
    let mut seen = 0;
    // SAFETY: we do not call into `backtrace` concurrently from another thread of this report.
    unsafe {
        backtrace::trace_unsynchronized(|frame| {
            let frame = RawFrame {
                ip: frame.ip() as usize,
                bp: 0,
            };
            seen += 1;
            if from_start.is_none() && start_ip == Some(frame.ip) {
                from_start = Some(CallStack::new());
            }
            everything.push(frame);
            match from_start.as_mut() {
                Some(stack) => stack.push(frame) && !stack.is_full(),
                None => start_ip.is_some() && seen < MAX_SEARCH_DEPTH,
            }
        })
    };
    from_start.unwrap_or(everything)
}

/// Emits one captured frame as `NN: module(symbol+0xOFF) [0xADDR]`.
///
/// The name comes from `dladdr` when the address is exported, otherwise from debug info. When
/// neither knows the address, the offset is relative to the module base, and when not even the
/// module is known only the address is printed.
pub fn emit_generic_frame(
    w: &mut impl LineSink,
    index: usize,
    ip: usize,
    beautifier: &impl NameBeautifier,
) {
    let Some(resolved) = resolve(ip) else {
        emit_line!(w, "{index:2}: [0x{ip:0HEX_WIDTH$x}]");
        return;
    };
    let module = resolved.module.unwrap_or(UNKNOWN_NAME);

    if let Some(raw) = resolved.symbol {
        let pretty = beautifier.beautify(raw);
        let name = pretty.as_deref().unwrap_or(raw);
        let offset = ip.wrapping_sub(resolved.symbol_address);
        emit_line!(w, "{index:2}: {module}({name}+0x{offset:x}) [0x{ip:0HEX_WIDTH$x}]");
        return;
    }

    let mut emitted = false;
    // SAFETY: see module documentation.
    unsafe {
        backtrace::resolve_unsynchronized(ip as *mut c_void, |symbol| {
            if emitted {
                // Inlined frames resolve to several symbols; the outermost one is enough.
                return;
            }
            if let Some(name) = symbol.name() {
                let start = symbol.addr().map_or(ip, |addr| addr as usize);
                let offset = ip.wrapping_sub(start);
                emit_line!(w, "{index:2}: {module}({name}+0x{offset:x}) [0x{ip:0HEX_WIDTH$x}]");
                emitted = true;
            }
        })
    };
    if !emitted {
        let offset = ip.wrapping_sub(resolved.module_base);
        emit_line!(w, "{index:2}: {module}(+0x{offset:x}) [0x{ip:0HEX_WIDTH$x}]");
    }
}
