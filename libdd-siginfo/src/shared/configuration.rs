// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// Runtime options for [`crate::init`].
///
/// Behaviour that has to be decided when the library is built (demangling, auto-init, the
/// stack-walk strategy) is selected with cargo features instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiginfoConfiguration {
    create_alt_stack: bool,
    use_alt_stack: bool,
}

impl Default for SiginfoConfiguration {
    fn default() -> Self {
        Self {
            create_alt_stack: true,
            use_alt_stack: true,
        }
    }
}

impl SiginfoConfiguration {
    pub fn new(create_alt_stack: bool, use_alt_stack: bool) -> anyhow::Result<Self> {
        // Requesting to create, but not use, the altstack is considered paradoxical.
        anyhow::ensure!(
            !create_alt_stack || use_alt_stack,
            "Cannot create an altstack without using it"
        );
        Ok(Self {
            create_alt_stack,
            use_alt_stack,
        })
    }

    pub fn create_alt_stack(&self) -> bool {
        self.create_alt_stack
    }

    pub fn use_alt_stack(&self) -> bool {
        self.use_alt_stack
    }

    pub fn set_create_alt_stack(&mut self, create_alt_stack: bool) -> anyhow::Result<()> {
        anyhow::ensure!(
            !create_alt_stack || self.use_alt_stack,
            "Cannot create an altstack without using it"
        );
        self.create_alt_stack = create_alt_stack;
        Ok(())
    }

    pub fn set_use_alt_stack(&mut self, use_alt_stack: bool) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.create_alt_stack || use_alt_stack,
            "Cannot create an altstack without using it"
        );
        self.use_alt_stack = use_alt_stack;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SiginfoConfiguration;

    #[test]
    fn test_create_without_use_is_rejected() {
        SiginfoConfiguration::new(true, false).unwrap_err();
        SiginfoConfiguration::new(false, true).unwrap();
        SiginfoConfiguration::new(false, false).unwrap();

        let mut config = SiginfoConfiguration::new(false, false).unwrap();
        config.set_create_alt_stack(true).unwrap_err();
        config.set_use_alt_stack(true).unwrap();
        config.set_create_alt_stack(true).unwrap();
        config.set_use_alt_stack(false).unwrap_err();
    }

    #[test]
    fn test_missing_fields_take_defaults() -> anyhow::Result<()> {
        let config: SiginfoConfiguration = serde_json::from_str(r#"{"create_alt_stack": false}"#)?;
        assert!(!config.create_alt_stack());
        assert!(config.use_alt_stack());
        assert_eq!(
            serde_json::from_str::<SiginfoConfiguration>("{}")?,
            SiginfoConfiguration::default()
        );
        Ok(())
    }
}
