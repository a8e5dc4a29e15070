// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg(unix)]

use bin_tests::{run_crashing_app, BuildProfile, CrashMode, CrashOutput};
use std::os::unix::process::ExitStatusExt;

const POINTER_HEX_WIDTH: usize = 2 * std::mem::size_of::<usize>();

fn crash(mode: CrashMode) -> CrashOutput {
    let output = bin_tests::timeit!("crashing_test_app", {
        run_crashing_app(mode, BuildProfile::Debug).unwrap()
    });
    eprintln!("{mode} stderr:\n{}", output.stderr);
    output
}

/// Every handled crash exits with status 255 rather than being killed by the signal.
fn assert_exited_from_handler(output: &CrashOutput) {
    assert_eq!(output.status.signal(), None, "{output:?}");
    assert_eq!(output.status.code(), Some(255), "{output:?}");
    assert_eq!(output.stdout, "");
}

/// The stack trace section is present and, unless the walk itself faulted, properly closed.
fn assert_stack_trace(output: &CrashOutput) {
    let lines = output.stderr_lines();
    assert!(
        lines
            .iter()
            .any(|l| *l == "Stack trace:" || *l == "Stack trace (generic):"),
        "{lines:?}"
    );
    let closed = lines.iter().any(|l| *l == "End of stack trace");
    let walk_faulted = lines
        .iter()
        .any(|l| l.ends_with("received while reporting a previous crash, terminating"));
    assert!(closed || walk_faulted, "{lines:?}");

    let frames = lines
        .iter()
        .skip_while(|l| !l.starts_with("Stack trace"))
        .skip(1)
        .take_while(|l| **l != "End of stack trace")
        .filter(|l| is_frame_line(l))
        .count();
    assert!(frames <= libdd_siginfo::MAX_BACKTRACE_FRAMES, "{lines:?}");

    // Nothing is walked past the entry function.
    if let Some(main) = lines.iter().position(|l| l.contains("<main+")) {
        assert_eq!(lines[main + 1], "End of stack trace", "{lines:?}");
    }
}

/// Frame lines start with their index: ` 0: ...`.
fn is_frame_line(line: &str) -> bool {
    line.trim_start()
        .split(':')
        .next()
        .is_some_and(|n| n.parse::<usize>().is_ok())
}

fn frame_lines<'a>(lines: &[&'a str]) -> Vec<&'a str> {
    lines.iter().copied().filter(|l| is_frame_line(l)).collect()
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_segv_write_report() {
    let output = crash(CrashMode::SegvWrite);
    assert_exited_from_handler(&output);
    let lines = output.stderr_lines();

    assert_eq!(lines[0], "Segmentation Fault! (SIGSEGV)");
    assert_eq!(lines[1], format!("info.si_signo = {}", libc::SIGSEGV));
    assert_eq!(lines[2], "info.si_errno = 0");
    assert_eq!(
        lines[3],
        "info.si_code  = 1 (SEGV_MAPERR; Address not mapped to object)"
    );
    assert_eq!(
        lines[4],
        format!("info.si_addr  = 0x{:0POINTER_HEX_WIDTH$x}", 123)
    );
    assert_stack_trace(&output);
}

#[test]
#[cfg_attr(miri, ignore)]
#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
fn test_segv_write_registers_and_first_frame() {
    let output = crash(CrashMode::SegvWrite);
    let lines = output.stderr_lines();

    // 23 general purpose registers follow the five siginfo lines.
    let registers = &lines[5..28];
    assert!(registers[0].starts_with("    R8 = 0x"), "{registers:?}");
    assert!(registers[16].starts_with("   RIP = 0x"), "{registers:?}");
    assert!(registers[22].starts_with("   CR2 = 0x"), "{registers:?}");
    for line in registers {
        let (_, value) = line.split_once(" = 0x").unwrap();
        assert_eq!(value.len(), POINTER_HEX_WIDTH, "{line}");
    }
    assert_eq!(lines[28], "Stack trace:");

    let rip = registers[16].split_once(" = ").unwrap().1;
    assert!(
        lines[29].starts_with(&format!(" 0: {rip} <crash_by_segv_write+")),
        "{lines:?}"
    );
    assert!(lines[29].contains("crashing_test_app"), "{lines:?}");
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_abort_report() {
    let output = crash(CrashMode::Abort);
    assert_exited_from_handler(&output);
    let lines = output.stderr_lines();
    assert_eq!(lines[0], "Abort! (SIGABRT)");
    assert_eq!(lines[1], format!("info.si_signo = {}", libc::SIGABRT));
    assert!(lines[3].starts_with("info.si_code  = "), "{lines:?}");
    assert!(!lines[3].ends_with("(unknown)"), "{lines:?}");
    assert_stack_trace(&output);

    // The trace starts at the interrupted code, not inside the handler, and reaches the caller of
    // abort.
    let frames = frame_lines(&lines);
    assert!(
        frames.iter().any(|l| l.contains("crashing_test_app")),
        "{lines:?}"
    );
    assert!(
        !frames.iter().any(|l| l.contains("handle_posix_sigaction")),
        "{lines:?}"
    );
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_bad_call_report() {
    let output = crash(CrashMode::BadCall);
    assert_exited_from_handler(&output);
    let lines = output.stderr_lines();
    assert_eq!(lines[0], "Segmentation Fault! (SIGSEGV)");
    assert_eq!(
        lines[4],
        format!("info.si_addr  = 0x{:0POINTER_HEX_WIDTH$x}", 0xDEADBEEF_usize)
    );
    #[cfg(target_os = "linux")]
    {
        let marker = format!(
            " 0: [dladdr failed for 0x{:0POINTER_HEX_WIDTH$x}]",
            0xDEADBEEF_usize
        );
        assert!(lines.contains(&marker.as_str()), "{lines:?}");
    }
    assert_stack_trace(&output);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_illegal_instruction_report() {
    let output = crash(CrashMode::IllegalInstruction);
    assert_exited_from_handler(&output);
    let lines = output.stderr_lines();
    assert_eq!(lines[0], "Illegal instruction! (SIGILL)");
    #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
    assert_eq!(lines[3], "info.si_code  = 2 (ILL_ILLOPN; Illegal operand)");
    #[cfg(all(target_os = "linux", target_arch = "aarch64"))]
    assert_eq!(lines[3], "info.si_code  = 1 (ILL_ILLOPC; Illegal opcode)");
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_divide_by_zero_report() {
    let output = crash(CrashMode::DivideByZero);
    assert_exited_from_handler(&output);
    let lines = output.stderr_lines();
    assert_eq!(lines[0], "Floating point exception! (SIGFPE)");
    #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
    assert_eq!(lines[3], "info.si_code  = 1 (FPE_INTDIV; Integer divide by zero)");
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_bus_error_report() {
    let output = crash(CrashMode::BusError);
    assert_exited_from_handler(&output);
    let lines = output.stderr_lines();
    assert_eq!(lines[0], "Bus error (bad memory access)! (SIGBUS)");
    #[cfg(target_os = "linux")]
    assert_eq!(lines[3], "info.si_code  = -6 (SI_TKILL; sent by tkill system call)");
    assert_stack_trace(&output);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_setup_twice_reports_once() {
    let output = crash(CrashMode::SetupTwice);
    assert_exited_from_handler(&output);
    let lines = output.stderr_lines();
    let headers = lines
        .iter()
        .filter(|l| **l == "Segmentation Fault! (SIGSEGV)")
        .count();
    assert_eq!(headers, 1, "{lines:?}");
    assert_eq!(
        lines.iter().filter(|l| l.starts_with("Stack trace")).count(),
        1,
        "{lines:?}"
    );
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_custom_sink_receives_every_line() {
    let output = crash(CrashMode::CustomSink);
    assert_exited_from_handler(&output);
    let lines = output.stderr_lines();
    assert_eq!(lines[0], "[sink] Segmentation Fault! (SIGSEGV)");
    assert!(lines.iter().all(|l| l.starts_with("[sink] ")), "{lines:?}");
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_report_without_alt_stack() {
    let output = crash(CrashMode::NoAltStack);
    assert_exited_from_handler(&output);
    assert_eq!(output.stderr_lines()[0], "Segmentation Fault! (SIGSEGV)");
    assert_stack_trace(&output);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_fault_while_reporting_terminates() {
    let output = crash(CrashMode::FaultingSink);
    assert_exited_from_handler(&output);
    let lines = output.stderr_lines();
    let reentered = format!(
        "Fatal signal {} received while reporting a previous crash, terminating",
        libc::SIGSEGV
    );
    assert_eq!(
        lines.iter().filter(|l| **l == reentered).count(),
        1,
        "{lines:?}"
    );
    // The first report died on its first line.
    assert!(!lines.iter().any(|l| l.starts_with("Stack trace")), "{lines:?}");
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_stack_overflow_is_reported_on_alt_stack() {
    let output = crash(CrashMode::StackOverflow);
    assert_exited_from_handler(&output);
    let lines = output.stderr_lines();
    assert_eq!(lines[0], "Segmentation Fault! (SIGSEGV)");
    assert_stack_trace(&output);
}
