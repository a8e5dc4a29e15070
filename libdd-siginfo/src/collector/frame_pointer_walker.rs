// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Stack frame collection for the crash report.
//!
//! The frame-pointer walk yields frames one at a time and holds no buffer. Captured stacks are
//! stored in a fixed-capacity [`CallStack`], so neither touches the allocator, which is not safe to
//! use from a signal handler.

use crate::shared::constants::MAX_BACKTRACE_FRAMES;
use std::mem;

/// A raw stack frame.
///
/// - `ip`: Instruction pointer (the faulting instruction for the innermost frame, a return address
///   for the others)
/// - `bp`: Base/frame pointer at this frame, or 0 when the frame was not found by walking frame
///   pointers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawFrame {
    pub ip: usize,
    pub bp: usize,
}

/// Innermost-first list of at most [`MAX_BACKTRACE_FRAMES`] frames.
#[derive(Debug, Clone)]
pub struct CallStack {
    frames: [RawFrame; MAX_BACKTRACE_FRAMES],
    len: usize,
}

impl CallStack {
    pub const fn new() -> Self {
        Self {
            frames: [RawFrame { ip: 0, bp: 0 }; MAX_BACKTRACE_FRAMES],
            len: 0,
        }
    }

    /// Appends a frame. Returns false, dropping the frame, when the stack is full.
    pub fn push(&mut self, frame: RawFrame) -> bool {
        if self.is_full() {
            return false;
        }
        self.frames[self.len] = frame;
        self.len += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == MAX_BACKTRACE_FRAMES
    }

    pub fn frames(&self) -> &[RawFrame] {
        &self.frames[..self.len]
    }
}

impl Default for CallStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Follows the chain of saved frame pointers starting at (`ip`, `bp`).
///
/// Every frame is assumed to start with the standard record `[saved bp, return address]` at the
/// address held in `bp`. The walk ends when the frame pointer or instruction pointer is null, when
/// the next frame pointer is misaligned or does not lie above the current one (the stack grows
/// down, so anything else means a corrupted or cyclic chain), or when [`MAX_BACKTRACE_FRAMES`]
/// frames have been produced.
///
/// The walk is lazy: the record of a frame is only read when the frame after it is requested. A
/// caller that prints each frame as it arrives keeps everything printed so far if a read faults,
/// and never touches the records beyond the frame where it stops.
///
/// # Safety
/// Every frame pointer reached that passes the checks above is dereferenced. On a corrupted stack
/// this may fault; the caller must be prepared for that (the crash handler is, via its re-entrancy
/// guard).
pub unsafe fn walk_frame_pointers(ip: usize, bp: usize) -> FramePointerWalk {
    FramePointerWalk {
        current: Some(RawFrame { ip, bp }),
        produced: 0,
    }
}

/// Iterator returned by [`walk_frame_pointers`], innermost frame first.
#[derive(Debug)]
pub struct FramePointerWalk {
    current: Option<RawFrame>,
    produced: usize,
}

impl Iterator for FramePointerWalk {
    type Item = RawFrame;

    fn next(&mut self) -> Option<RawFrame> {
        if self.produced == MAX_BACKTRACE_FRAMES {
            return None;
        }
        if self.produced > 0 {
            // SAFETY: guaranteed by the caller of `walk_frame_pointers`.
            self.current = self.current.and_then(|frame| unsafe { caller_of(frame) });
        }
        match self.current {
            Some(frame) if frame.ip != 0 && frame.bp != 0 => {
                self.produced += 1;
                Some(frame)
            }
            _ => {
                self.current = None;
                None
            }
        }
    }
}

/// Reads the record at `frame.bp`, or returns `None` when the chain ends there.
unsafe fn caller_of(frame: RawFrame) -> Option<RawFrame> {
    if frame.bp % mem::align_of::<usize>() != 0 {
        return None;
    }
    let record = frame.bp as *const usize;
    // SAFETY: see `walk_frame_pointers`.
    let (next_bp, next_ip) = unsafe { (record.read_volatile(), record.add(1).read_volatile()) };
    if next_bp != 0 && next_bp <= frame.bp {
        return None;
    }
    Some(RawFrame {
        ip: next_ip,
        bp: next_bp,
    })
}
