// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// The ways `crashing_test_app` can bring itself down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrashMode {
    /// `abort()`
    Abort,
    /// Write to address 123.
    SegvWrite,
    /// Call a function at address 0xDEADBEEF.
    BadCall,
    /// Execute an undefined instruction.
    IllegalInstruction,
    /// Integer division by zero.
    DivideByZero,
    /// `raise(SIGBUS)`
    BusError,
    /// Install the handler twice, then write to address 123.
    SetupTwice,
    /// Route the report through a custom sink, then write to address 123.
    CustomSink,
    /// Install without an alternate stack, then write to address 123.
    NoAltStack,
    /// Recurse until the stack overflows.
    StackOverflow,
    /// Route the report through a sink that faults on its first line, then write to address 123.
    FaultingSink,
}

impl CrashMode {
    /// Returns the string representation used in command-line arguments.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::SegvWrite => "segv_write",
            Self::BadCall => "bad_call",
            Self::IllegalInstruction => "ill",
            Self::DivideByZero => "fpe",
            Self::BusError => "bus",
            Self::SetupTwice => "setup_twice",
            Self::CustomSink => "custom_sink",
            Self::NoAltStack => "no_altstack",
            Self::StackOverflow => "stack_overflow",
            Self::FaultingSink => "faulting_sink",
        }
    }

    /// Returns all available modes.
    pub const fn all() -> &'static [Self] {
        &[
            Self::Abort,
            Self::SegvWrite,
            Self::BadCall,
            Self::IllegalInstruction,
            Self::DivideByZero,
            Self::BusError,
            Self::SetupTwice,
            Self::CustomSink,
            Self::NoAltStack,
            Self::StackOverflow,
            Self::FaultingSink,
        ]
    }
}

impl std::fmt::Display for CrashMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CrashMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| format!("Unknown crash mode: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_names_roundtrip() {
        for mode in CrashMode::all() {
            assert_eq!(mode.to_string().parse::<CrashMode>(), Ok(*mode));
        }
        assert!("nonsense".parse::<CrashMode>().is_err());
    }
}
