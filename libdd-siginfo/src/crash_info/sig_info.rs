// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Static description tables for the fatal signals we handle and their `si_code` values.
//!
//! See <https://man7.org/linux/man-pages/man2/sigaction.2.html>

use libc::c_int;

/// Text returned by [`describe_subcode`] when no table knows the code.
pub const UNKNOWN_SUBCODE: &str = "unknown";

/// One `si_code` value and its human readable reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubCode {
    pub code: c_int,
    pub reason: &'static str,
}

const fn sub_code(code: c_int, reason: &'static str) -> SubCode {
    SubCode { code, reason }
}

#[derive(Debug, PartialEq, Eq)]
pub struct SignalDescriptor {
    pub signo: c_int,
    /// Short name, e.g. "SIGSEGV".
    pub name: &'static str,
    /// What kind of fault this is, e.g. "Segmentation Fault".
    pub message: &'static str,
    /// Signal specific `si_code` reasons. Empty when the signal has none.
    pub codes: &'static [SubCode],
}

// These are defined in siginfo.h
// They are only derived here because there doesn't appear to be a crate that provides them in a
// comparable way.
#[cfg(not(target_vendor = "apple"))]
pub mod siginfo_code {
    use libc::c_int;

    pub const SI_USER: c_int = 0;
    pub const SI_KERNEL: c_int = 0x80;
    pub const SI_QUEUE: c_int = -1;
    pub const SI_TIMER: c_int = -2;
    pub const SI_MESGQ: c_int = -3;
    pub const SI_ASYNCIO: c_int = -4;
    pub const SI_SIGIO: c_int = -5;
    pub const SI_TKILL: c_int = -6;
    pub const SI_DETHREAD: c_int = -7;

    pub mod ill {
        use libc::c_int;
        pub const ILLOPC: c_int = 1;
        pub const ILLOPN: c_int = 2;
        pub const ILLADR: c_int = 3;
        pub const ILLTRP: c_int = 4;
        pub const PRVOPC: c_int = 5;
        pub const PRVREG: c_int = 6;
        pub const COPROC: c_int = 7;
        pub const BADSTK: c_int = 8;
    }

    pub mod fpe {
        use libc::c_int;
        pub const INTDIV: c_int = 1;
        pub const INTOVF: c_int = 2;
        pub const FLTDIV: c_int = 3;
        pub const FLTOVF: c_int = 4;
        pub const FLTUND: c_int = 5;
        pub const FLTRES: c_int = 6;
        pub const FLTINV: c_int = 7;
        pub const FLTSUB: c_int = 8;
    }

    pub mod segv {
        use libc::c_int;
        pub const MAPERR: c_int = 1;
        pub const ACCERR: c_int = 2;
    }

    pub mod bus {
        use libc::c_int;
        pub const ADRALN: c_int = 1;
        pub const ADRERR: c_int = 2;
        pub const OBJERR: c_int = 3;
    }
}

// Darwin numbers the origin codes from 0x10001 and orders the ILL/FPE codes differently.
// <https://github.com/apple/darwin-xnu/blob/main/bsd/sys/signal.h>
#[cfg(target_vendor = "apple")]
pub mod siginfo_code {
    use libc::c_int;

    pub const SI_USER: c_int = 0x10001;
    pub const SI_QUEUE: c_int = 0x10002;
    pub const SI_TIMER: c_int = 0x10003;
    pub const SI_ASYNCIO: c_int = 0x10004;
    pub const SI_MESGQ: c_int = 0x10005;

    pub mod ill {
        use libc::c_int;
        pub const ILLOPC: c_int = 1;
        pub const ILLTRP: c_int = 2;
        pub const PRVOPC: c_int = 3;
        pub const ILLOPN: c_int = 4;
        pub const ILLADR: c_int = 5;
        pub const PRVREG: c_int = 6;
        pub const COPROC: c_int = 7;
        pub const BADSTK: c_int = 8;
    }

    pub mod fpe {
        use libc::c_int;
        pub const FLTDIV: c_int = 1;
        pub const FLTOVF: c_int = 2;
        pub const FLTUND: c_int = 3;
        pub const FLTRES: c_int = 4;
        pub const FLTINV: c_int = 5;
        pub const FLTSUB: c_int = 6;
        pub const INTDIV: c_int = 7;
        pub const INTOVF: c_int = 8;
    }

    pub mod segv {
        use libc::c_int;
        pub const MAPERR: c_int = 1;
        pub const ACCERR: c_int = 2;
    }

    pub mod bus {
        use libc::c_int;
        pub const ADRALN: c_int = 1;
        pub const ADRERR: c_int = 2;
        pub const OBJERR: c_int = 3;
    }
}

use siginfo_code::*;

/// Codes describing who sent the signal. They mean the same thing whichever signal fired, so
/// they are consulted before the per-signal tables.
#[cfg(not(target_vendor = "apple"))]
pub static ORIGIN_CODES: &[SubCode] = &[
    sub_code(SI_USER, "SI_USER; sent by kill, sigsend, raise"),
    sub_code(SI_KERNEL, "SI_KERNEL; sent by the kernel from somewhere"),
    sub_code(SI_QUEUE, "SI_QUEUE; Signal sent by the sigqueue()"),
    sub_code(
        SI_TIMER,
        "SI_TIMER; Signal generated by expiration of a timer set by timer_settime()",
    ),
    sub_code(
        SI_MESGQ,
        "SI_MESGQ; Signal generated by arrival of a message on an empty message queue",
    ),
    sub_code(
        SI_ASYNCIO,
        "SI_ASYNCIO; Signal generated by completion of an asynchronous I/O request",
    ),
    sub_code(SI_SIGIO, "SI_SIGIO; sent by queued SIGIO"),
    sub_code(SI_TKILL, "SI_TKILL; sent by tkill system call"),
    sub_code(
        SI_DETHREAD,
        "SI_DETHREAD; sent by execve() killing subsidiary threads",
    ),
];

#[cfg(target_vendor = "apple")]
pub static ORIGIN_CODES: &[SubCode] = &[
    sub_code(SI_USER, "SI_USER; sent by kill, sigsend, raise"),
    sub_code(SI_QUEUE, "SI_QUEUE; Signal sent by the sigqueue()"),
    sub_code(
        SI_TIMER,
        "SI_TIMER; Signal generated by expiration of a timer set by timer_settime()",
    ),
    sub_code(
        SI_ASYNCIO,
        "SI_ASYNCIO; Signal generated by completion of an asynchronous I/O request",
    ),
    sub_code(
        SI_MESGQ,
        "SI_MESGQ; Signal generated by arrival of a message on an empty message queue",
    ),
];

static ILL_CODES: &[SubCode] = &[
    sub_code(ill::ILLOPC, "ILL_ILLOPC; Illegal opcode"),
    sub_code(ill::ILLOPN, "ILL_ILLOPN; Illegal operand"),
    sub_code(ill::ILLADR, "ILL_ILLADR; Illegal addressing mode"),
    sub_code(ill::ILLTRP, "ILL_ILLTRP; Illegal trap"),
    sub_code(ill::PRVOPC, "ILL_PRVOPC; Privileged opcode"),
    sub_code(ill::PRVREG, "ILL_PRVREG; Privileged register"),
    sub_code(ill::COPROC, "ILL_COPROC; Coprocessor error"),
    sub_code(ill::BADSTK, "ILL_BADSTK; Internal stack error"),
];

static FPE_CODES: &[SubCode] = &[
    sub_code(fpe::INTDIV, "FPE_INTDIV; Integer divide by zero"),
    sub_code(fpe::INTOVF, "FPE_INTOVF; Integer overflow"),
    sub_code(fpe::FLTDIV, "FPE_FLTDIV; Floating-point divide by zero"),
    sub_code(fpe::FLTOVF, "FPE_FLTOVF; Floating-point overflow"),
    sub_code(fpe::FLTUND, "FPE_FLTUND; Floating-point underflow"),
    sub_code(fpe::FLTRES, "FPE_FLTRES; Floating-point inexact result"),
    sub_code(fpe::FLTINV, "FPE_FLTINV; Invalid floating-point operation"),
    sub_code(fpe::FLTSUB, "FPE_FLTSUB; Subscript out of range"),
];

static SEGV_CODES: &[SubCode] = &[
    sub_code(segv::MAPERR, "SEGV_MAPERR; Address not mapped to object"),
    sub_code(
        segv::ACCERR,
        "SEGV_ACCERR; Invalid permissions for mapped object",
    ),
];

static BUS_CODES: &[SubCode] = &[
    sub_code(bus::ADRALN, "BUS_ADRALN; Invalid address alignment"),
    sub_code(bus::ADRERR, "BUS_ADRERR; Nonexistent physical address"),
    sub_code(bus::OBJERR, "BUS_OBJERR; Object-specific hardware error"),
];

/// The signals the crash handler is installed for, in installation order.
pub static SIGNAL_DESCRIPTORS: [SignalDescriptor; 5] = [
    SignalDescriptor {
        signo: libc::SIGILL,
        name: "SIGILL",
        message: "Illegal instruction",
        codes: ILL_CODES,
    },
    SignalDescriptor {
        signo: libc::SIGFPE,
        name: "SIGFPE",
        message: "Floating point exception",
        codes: FPE_CODES,
    },
    SignalDescriptor {
        signo: libc::SIGSEGV,
        name: "SIGSEGV",
        message: "Segmentation Fault",
        codes: SEGV_CODES,
    },
    SignalDescriptor {
        signo: libc::SIGBUS,
        name: "SIGBUS",
        message: "Bus error (bad memory access)",
        codes: BUS_CODES,
    },
    SignalDescriptor {
        signo: libc::SIGABRT,
        name: "SIGABRT",
        message: "Abort",
        codes: &[],
    },
];

/// Looks up the descriptor of a handled signal.
pub fn classify(signo: c_int) -> Option<&'static SignalDescriptor> {
    SIGNAL_DESCRIPTORS.iter().find(|d| d.signo == signo)
}

fn lookup(table: &'static [SubCode], code: c_int) -> Option<&'static str> {
    table.iter().find(|c| c.code == code).map(|c| c.reason)
}

/// Describes an `si_code`.
///
/// The origin table is checked first, then the table of `descriptor`, if any. Codes found in
/// neither are reported as [`UNKNOWN_SUBCODE`].
pub fn describe_subcode(descriptor: Option<&SignalDescriptor>, code: c_int) -> &'static str {
    lookup(ORIGIN_CODES, code)
        .or_else(|| descriptor.and_then(|d| lookup(d.codes, code)))
        .unwrap_or(UNKNOWN_SUBCODE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_handled_signals() {
        let segv = classify(libc::SIGSEGV).unwrap();
        assert_eq!(segv.name, "SIGSEGV");
        assert_eq!(segv.message, "Segmentation Fault");

        let abrt = classify(libc::SIGABRT).unwrap();
        assert_eq!(abrt.name, "SIGABRT");
        assert_eq!(abrt.message, "Abort");
        assert!(abrt.codes.is_empty());

        for signo in [libc::SIGILL, libc::SIGFPE, libc::SIGBUS] {
            assert_eq!(classify(signo).unwrap().signo, signo);
        }
    }

    #[test]
    fn test_classify_unhandled_signal() {
        assert!(classify(libc::SIGUSR1).is_none());
        assert!(classify(libc::SIGTERM).is_none());
        assert!(classify(0).is_none());
        assert!(classify(-1).is_none());
    }

    #[test]
    fn test_describe_signal_specific_codes() {
        let segv = classify(libc::SIGSEGV);
        assert_eq!(
            describe_subcode(segv, segv::MAPERR),
            "SEGV_MAPERR; Address not mapped to object"
        );
        assert_eq!(
            describe_subcode(segv, segv::ACCERR),
            "SEGV_ACCERR; Invalid permissions for mapped object"
        );
        assert_eq!(
            describe_subcode(classify(libc::SIGFPE), fpe::INTDIV),
            "FPE_INTDIV; Integer divide by zero"
        );
        assert_eq!(
            describe_subcode(classify(libc::SIGBUS), bus::ADRALN),
            "BUS_ADRALN; Invalid address alignment"
        );
    }

    #[test]
    fn test_origin_codes_take_precedence() {
        for descriptor in SIGNAL_DESCRIPTORS.iter() {
            assert_eq!(
                describe_subcode(Some(descriptor), SI_USER),
                "SI_USER; sent by kill, sigsend, raise"
            );
        }
        assert_eq!(
            describe_subcode(None, SI_QUEUE),
            "SI_QUEUE; Signal sent by the sigqueue()"
        );
    }

    #[test]
    fn test_abort_has_no_specific_codes() {
        let abrt = classify(libc::SIGABRT);
        assert_eq!(describe_subcode(abrt, 1), UNKNOWN_SUBCODE);
        assert_eq!(describe_subcode(abrt, 2), UNKNOWN_SUBCODE);
    }

    #[test]
    fn test_describe_subcode_is_total() {
        let descriptors = SIGNAL_DESCRIPTORS.iter().map(Some).chain([None]);
        for descriptor in descriptors {
            for code in -128..=256 {
                let description = describe_subcode(descriptor, code);
                assert!(!description.is_empty());
                // Deterministic: asking twice gives the same answer.
                assert_eq!(description, describe_subcode(descriptor, code));
            }
        }
        assert_eq!(describe_subcode(classify(libc::SIGSEGV), 42), UNKNOWN_SUBCODE);
        assert_eq!(describe_subcode(None, segv::MAPERR), UNKNOWN_SUBCODE);
    }

    #[test]
    fn test_code_tables_have_unique_codes() {
        let tables = SIGNAL_DESCRIPTORS
            .iter()
            .map(|d| d.codes)
            .chain([ORIGIN_CODES]);
        for table in tables {
            for (i, entry) in table.iter().enumerate() {
                assert!(
                    table[i + 1..].iter().all(|other| other.code != entry.code),
                    "duplicate code {} ({})",
                    entry.code,
                    entry.reason
                );
            }
        }
    }
}
