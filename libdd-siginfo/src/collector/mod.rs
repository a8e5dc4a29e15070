// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
mod api;
#[cfg(siginfo_ucontext)]
pub mod context;
mod crash_handler;
mod emitters;
mod frame_pointer_walker;
mod generic_walker;
mod signal_handler_manager;
mod symbolizer;

pub use api::*;
pub use crash_handler::{handler_state, HandlerState};
#[cfg(siginfo_ucontext)]
pub use emitters::emit_registers;
#[cfg(siginfo_frame_walk)]
pub use emitters::emit_stacktrace_by_frame_pointers;
pub use emitters::{emit_crash_report, emit_siginfo, emit_stacktrace_generic};
pub use frame_pointer_walker::{walk_frame_pointers, CallStack, FramePointerWalk, RawFrame};
pub use generic_walker::capture_current_stack;
pub use signal_handler_manager::SiginfoError;
#[cfg(feature = "demangle")]
pub use symbolizer::Demangler;
pub use symbolizer::{
    resolve, DefaultBeautifier, Frame, NameBeautifier, RawNames, ResolvedAddress, UNKNOWN_NAME,
};
