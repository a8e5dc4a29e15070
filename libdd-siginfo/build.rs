// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
use std::env;

/// Targets whose `ucontext_t` register layout is known to `collector::context`.
const UCONTEXT_TARGETS: &[(&str, &str)] = &[
    ("linux", "x86_64"),
    ("linux", "x86"),
    ("linux", "aarch64"),
];

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo::rustc-check-cfg=cfg(siginfo_ucontext)");
    println!("cargo::rustc-check-cfg=cfg(siginfo_frame_walk)");

    let os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();

    let has_ucontext = UCONTEXT_TARGETS
        .iter()
        .any(|(target_os, target_arch)| *target_os == os && *target_arch == arch);
    if !has_ucontext {
        return;
    }
    println!("cargo:rustc-cfg=siginfo_ucontext");

    // The frame-pointer walk needs the context; without it, or when asked to, we fall back to the
    // capture-based walk.
    if env::var_os("CARGO_FEATURE_FORCE_GENERIC_WALK").is_none() {
        println!("cargo:rustc-cfg=siginfo_frame_walk");
    }
}
