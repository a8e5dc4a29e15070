// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::signal_handler_manager::{register_crash_handlers, SiginfoError};
use crate::shared::configuration::SiginfoConfiguration;

/// Installs the crash handler with the given configuration.
///
/// PRECONDITIONS:
///     None.
/// SAFETY:
///     Installation is not reentrant. No other installation should run concurrently.
/// ATOMICITY:
///     This function is not atomic. A crash during its execution is handled by whichever
///     disposition its signal had at that moment.
pub fn init(config: SiginfoConfiguration) -> Result<(), SiginfoError> {
    register_crash_handlers(&config)
}

/// Installs the crash handler with the default configuration. Returns false if any signal could not
/// be registered; the reason has already been written to the log sink.
pub fn setup() -> bool {
    init(SiginfoConfiguration::default()).is_ok()
}

#[cfg(feature = "auto-init")]
mod auto_init {
    extern "C" fn install_at_load() {
        let _ = super::setup();
    }

    #[used]
    #[cfg_attr(
        any(target_os = "linux", target_os = "android"),
        link_section = ".init_array"
    )]
    #[cfg_attr(target_vendor = "apple", link_section = "__DATA,__mod_init_func")]
    static INSTALL_AT_LOAD: extern "C" fn() = install_at_load;
}
