// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Address to symbol resolution with the dynamic loader.
//!
//! `dladdr` only sees symbols in the dynamic symbol table, so functions of an executable are only
//! resolved when it was linked with `-rdynamic`. Anything else reports the containing module and
//! an unknown symbol.

use crate::shared::constants::HEX_WIDTH;
use libc::{c_char, c_void, Dl_info};
use std::borrow::Cow;
use std::ffi::CStr;
use std::fmt;

#[cfg(feature = "demangle")]
use symbolic_common::Name;
#[cfg(feature = "demangle")]
use symbolic_demangle::{Demangle, DemangleOptions};

/// Printed in place of a symbol or module that could not be determined.
pub const UNKNOWN_NAME: &str = "??";

/// What the dynamic loader knows about an address.
///
/// The strings are owned by the loader and stay valid as long as the module is loaded. Modules
/// are never unloaded while we are reporting a crash, so they are treated as `'static`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub module: Option<&'static str>,
    pub module_base: usize,
    pub symbol: Option<&'static str>,
    pub symbol_address: usize,
}

/// Looks `ip` up with `dladdr`. Returns `None` when the address is not inside any loaded module.
pub fn resolve(ip: usize) -> Option<ResolvedAddress> {
    // SAFETY: Dl_info is plain old data; all-zero is a valid bit pattern.
    let mut info: Dl_info = unsafe { std::mem::zeroed() };
    // SAFETY: dladdr only writes to `info`.
    if unsafe { libc::dladdr(ip as *const c_void, &mut info) } == 0 {
        return None;
    }
    // SAFETY: dladdr fills these with null or NUL-terminated strings owned by the loader.
    let (module, symbol) = unsafe { (loader_str(info.dli_fname), loader_str(info.dli_sname)) };
    Some(ResolvedAddress {
        module,
        module_base: info.dli_fbase as usize,
        symbol,
        symbol_address: if symbol.is_some() {
            info.dli_saddr as usize
        } else {
            0
        },
    })
}

/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives the process.
unsafe fn loader_str(ptr: *const c_char) -> Option<&'static str> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: upheld by the caller.
    let s = unsafe { CStr::from_ptr(ptr) }.to_str().ok()?;
    (!s.is_empty()).then_some(s)
}

/// Turns raw (mangled) symbol names into readable ones.
pub trait NameBeautifier {
    /// Returns `None` when the name should be printed as-is.
    fn beautify(&self, raw: &str) -> Option<String>;
}

/// Leaves every name untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawNames;

impl NameBeautifier for RawNames {
    fn beautify(&self, _raw: &str) -> Option<String> {
        None
    }
}

/// Demangles Rust and C++ names.
#[cfg(feature = "demangle")]
#[derive(Debug, Default, Clone, Copy)]
pub struct Demangler;

#[cfg(feature = "demangle")]
impl NameBeautifier for Demangler {
    fn beautify(&self, raw: &str) -> Option<String> {
        Name::from(raw)
            .demangle(DemangleOptions::name_only())
            .filter(|demangled| demangled != raw)
    }
}

#[cfg(feature = "demangle")]
pub type DefaultBeautifier = Demangler;
#[cfg(not(feature = "demangle"))]
pub type DefaultBeautifier = RawNames;

/// One symbolized frame of a stack trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<'a> {
    pub ip: usize,
    /// The name as found in the symbol table.
    pub raw_symbol: Option<&'a str>,
    /// The name to print: the beautified name if there is one, else the raw one.
    pub symbol: Option<Cow<'a, str>>,
    /// Distance from the start of the symbol, or from the module base when the symbol is unknown.
    pub offset: usize,
    pub module: Option<&'a str>,
}

impl Frame<'static> {
    /// Symbolizes `ip`. Returns `None` when `dladdr` cannot place the address in any module.
    pub fn symbolize(ip: usize, beautifier: &impl NameBeautifier) -> Option<Self> {
        resolve(ip).map(|resolved| Self::from_resolved(ip, resolved, beautifier))
    }
}

impl<'a> Frame<'a> {
    pub fn from_resolved(
        ip: usize,
        resolved: ResolvedAddress,
        beautifier: &impl NameBeautifier,
    ) -> Self {
        let symbol = resolved.symbol.map(|raw| match beautifier.beautify(raw) {
            Some(pretty) => Cow::Owned(pretty),
            None => Cow::Borrowed(raw),
        });
        let base = if resolved.symbol.is_some() {
            resolved.symbol_address
        } else {
            resolved.module_base
        };
        Self {
            ip,
            raw_symbol: resolved.symbol,
            symbol,
            offset: ip.wrapping_sub(base),
            module: resolved.module,
        }
    }

    /// True for the program entry function, where a stack walk should stop.
    pub fn is_entry_function(&self) -> bool {
        self.raw_symbol == Some(crate::shared::constants::ENTRY_FUNCTION_NAME)
    }
}

/// `0x<ip> <symbol+offset> (module)`
impl fmt::Display for Frame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:0width$x} <{}+{}> ({})",
            self.ip,
            self.symbol.as_deref().unwrap_or(UNKNOWN_NAME),
            self.offset,
            self.module.unwrap_or(UNKNOWN_NAME),
            width = HEX_WIDTH,
        )
    }
}
