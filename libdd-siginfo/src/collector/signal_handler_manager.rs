// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
use super::crash_handler::handle_posix_sigaction;
use crate::crash_info::{SignalDescriptor, SIGNAL_DESCRIPTORS};
use crate::shared::configuration::SiginfoConfiguration;
use crate::shared::log::{emit_line, GlobalSink};
use libc::{
    c_int, mmap, sigaltstack, MAP_ANON, MAP_FAILED, MAP_PRIVATE, PROT_NONE, PROT_READ, PROT_WRITE,
    SIGSTKSZ,
};
use nix::errno::Errno;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, Signal};
use std::ptr;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::SeqCst;
use tracing::{debug, error};

static ALT_STACK_CREATED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, thiserror::Error)]
pub enum SiginfoError {
    #[error("sigaction failed for signal {signum}: {source}")]
    SignalRegistration {
        signum: c_int,
        #[source]
        source: Errno,
    },
    #[error("Signal {0} is not known to this platform")]
    UnknownSignal(c_int),
    #[error("Failed to set up the alternative signal stack in {step}: {source}")]
    AltStack {
        step: &'static str,
        #[source]
        source: Errno,
    },
}

/// Installs the crash handler for every signal in [`SIGNAL_DESCRIPTORS`].
///
/// Registration stops at the first failure, which is also reported through the log sink. Signals
/// registered before the failure keep the crash handler. Calling this again re-installs the same
/// handler, so it is safe to call more than once.
///
/// ATOMICITY:
///     Each signal is registered with its own `sigaction` call. A crash concurrent with this
///     function is handled by whichever disposition was current for its signal at the time.
pub fn register_crash_handlers(config: &SiginfoConfiguration) -> Result<(), SiginfoError> {
    if config.create_alt_stack()
        && ALT_STACK_CREATED
            .compare_exchange(false, true, SeqCst, SeqCst)
            .is_ok()
    {
        // SAFETY: only reached once per process, so no live altstack is ever replaced by us.
        if let Err(e) = unsafe { create_alt_stack() } {
            ALT_STACK_CREATED.store(false, SeqCst);
            error!(error = %e, "Unable to create the alternative signal stack");
            return Err(e);
        }
        debug!("Created the alternative signal stack");
    }

    for descriptor in SIGNAL_DESCRIPTORS.iter() {
        // SAFETY: the handler only uses the APIs listed in `crash_handler`.
        unsafe { register_signal_handler(descriptor, config) }?;
        debug!(
            signal = descriptor.name,
            signum = descriptor.signo,
            "Installed crash handler"
        );
    }
    Ok(())
}

unsafe fn register_signal_handler(
    descriptor: &SignalDescriptor,
    config: &SiginfoConfiguration,
) -> Result<(), SiginfoError> {
    let signum = descriptor.signo;
    let signal_type =
        Signal::try_from(signum).map_err(|_| SiginfoError::UnknownSignal(signum))?;

    // SA_NODEFER lets a fault inside the report reach the handler again, where it ends the
    // process, instead of being blocked until the report returns.
    let extra_saflags = if config.use_alt_stack() {
        SaFlags::SA_ONSTACK
    } else {
        SaFlags::empty()
    };
    let sig_action = SigAction::new(
        SigHandler::SigAction(handle_posix_sigaction),
        SaFlags::SA_NODEFER | extra_saflags,
        signal::SigSet::empty(),
    );

    if let Err(errno) = unsafe { signal::sigaction(signal_type, &sig_action) } {
        emit_line!(
            &mut GlobalSink,
            "sigaction failed for signal {signum}. errno is {} ({})",
            errno as i32,
            errno.desc()
        );
        error!(signal = descriptor.name, %errno, "Unable to install crash handler");
        return Err(SiginfoError::SignalRegistration {
            signum,
            source: errno,
        });
    }
    Ok(())
}

/// Allocates a signal altstack, and puts a guard page at the end.
/// Inspired by https://github.com/rust-lang/rust/pull/69969/files
unsafe fn create_alt_stack() -> Result<(), SiginfoError> {
    // The altstack is the greater of 16 pages or SIGSTKSZ; the default SIGSTKSZ (8KB) is too small
    // once demangling and symbol lookup are on the stack.
    let page_size = page_size::get();
    let sigalstack_base_size = std::cmp::max(SIGSTKSZ, 16 * page_size);
    let stackp = mmap(
        ptr::null_mut(),
        sigalstack_base_size + page_size,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANON,
        -1,
        0,
    );
    if stackp == MAP_FAILED {
        return Err(SiginfoError::AltStack {
            step: "mmap",
            source: Errno::last(),
        });
    }
    if libc::mprotect(stackp, page_size, PROT_NONE) != 0 {
        return Err(SiginfoError::AltStack {
            step: "mprotect",
            source: Errno::last(),
        });
    }
    let stackp = stackp.add(page_size);

    let stack = libc::stack_t {
        ss_sp: stackp,
        ss_flags: 0,
        ss_size: sigalstack_base_size,
    };
    if sigaltstack(&stack, ptr::null_mut()) != 0 {
        return Err(SiginfoError::AltStack {
            step: "sigaltstack",
            source: Errno::last(),
        });
    }
    Ok(())
}
