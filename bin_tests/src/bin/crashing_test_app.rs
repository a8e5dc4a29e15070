// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#[cfg(not(unix))]
fn main() {}

#[cfg(unix)]
fn main() -> anyhow::Result<()> {
    unix::main()
}

/// The crash functions are exported unmangled so that the report can name them.
#[cfg(unix)]
mod unix {
    use anyhow::Context;
    use bin_tests::CrashMode;
    use libdd_siginfo::{self as siginfo, SiginfoConfiguration};
    use std::env;
    use std::hint::black_box;
    use std::sync::atomic::{AtomicBool, Ordering::SeqCst};

    #[no_mangle]
    #[inline(never)]
    pub extern "C" fn crash_by_segv_write() {
        // SAFETY: none; this is the crash under test.
        unsafe { std::ptr::write_volatile(123 as *mut u8, 1) };
    }

    #[no_mangle]
    #[inline(never)]
    pub extern "C" fn crash_by_bad_call() {
        // SAFETY: none; this is the crash under test.
        let f: extern "C" fn() = unsafe { std::mem::transmute(black_box(0xDEADBEEF_usize)) };
        f();
    }

    #[no_mangle]
    #[inline(never)]
    pub extern "C" fn crash_by_illegal_instruction() {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        unsafe {
            std::arch::asm!("ud2", options(nostack));
        }
        #[cfg(target_arch = "aarch64")]
        unsafe {
            std::arch::asm!("udf #0", options(nostack));
        }
        #[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
        unsafe {
            libc::raise(libc::SIGILL);
        }
    }

    #[no_mangle]
    #[inline(never)]
    pub extern "C" fn crash_by_divide_by_zero() {
        // Rust checks divisions for zero; the hardware only traps on x86.
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        unsafe {
            std::arch::asm!(
                "xor edx, edx",
                "div ecx",
                inout("eax") 1u32 => _,
                in("ecx") black_box(0u32),
                out("edx") _,
                options(nostack),
            );
        }
        #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
        unsafe {
            libc::raise(libc::SIGFPE);
        }
    }

    #[no_mangle]
    #[inline(never)]
    pub extern "C" fn crash_by_bus_error() {
        unsafe {
            libc::raise(libc::SIGBUS);
        }
    }

    #[allow(unconditional_recursion)]
    #[inline(never)]
    fn recurse(depth: u64) -> u64 {
        let frame = black_box([depth as u8; 1024]);
        recurse(depth + 1) + frame[0] as u64
    }

    /// Prefixes every report line so the test can tell it went through this sink.
    fn tagged_stderr_sink(line: &str) {
        siginfo::stderr_sink("[sink] ");
        siginfo::stderr_sink(line);
    }

    static SINK_FAULTED: AtomicBool = AtomicBool::new(false);

    /// Faults the first time it is called, i.e. in the middle of the first report.
    fn faulting_sink(line: &str) {
        if !SINK_FAULTED.swap(true, SeqCst) {
            crash_by_segv_write();
        }
        siginfo::stderr_sink(line);
    }

    fn install() -> anyhow::Result<()> {
        siginfo::init(SiginfoConfiguration::default()).context("installing the crash handler")
    }

    #[inline(never)]
    pub fn main() -> anyhow::Result<()> {
        let mode: CrashMode = env::args()
            .nth(1)
            .context("Unexpected number of arguments")?
            .parse()
            .map_err(anyhow::Error::msg)?;

        match mode {
            CrashMode::Abort => {
                install()?;
                unsafe { libc::abort() };
            }
            CrashMode::SegvWrite => {
                install()?;
                crash_by_segv_write();
            }
            CrashMode::BadCall => {
                install()?;
                crash_by_bad_call();
            }
            CrashMode::IllegalInstruction => {
                install()?;
                crash_by_illegal_instruction();
            }
            CrashMode::DivideByZero => {
                install()?;
                crash_by_divide_by_zero();
            }
            CrashMode::BusError => {
                install()?;
                crash_by_bus_error();
            }
            CrashMode::SetupTwice => {
                anyhow::ensure!(siginfo::setup(), "first setup failed");
                anyhow::ensure!(siginfo::setup(), "second setup failed");
                crash_by_segv_write();
            }
            CrashMode::CustomSink => {
                siginfo::set_log_sink(tagged_stderr_sink);
                install()?;
                crash_by_segv_write();
            }
            CrashMode::NoAltStack => {
                siginfo::init(SiginfoConfiguration::new(false, false)?)?;
                crash_by_segv_write();
            }
            CrashMode::StackOverflow => {
                install()?;
                black_box(recurse(0));
            }
            CrashMode::FaultingSink => {
                siginfo::set_log_sink(faulting_sink);
                install()?;
                crash_by_segv_write();
            }
        }
        anyhow::bail!("{mode} did not crash the process")
    }
}
