// device-policy-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for device-policy-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use device_policy_config::ConfigError;
use device_policy_config::DevicePolicyConfig;

/// Parses a TOML string into a `DevicePolicyConfig` without validating it.
pub fn config_from_toml(toml_str: &str) -> Result<DevicePolicyConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<DevicePolicyConfig, toml::de::Error> {
    config_from_toml("")
}

/// Asserts a result failed with a message containing `needle`.
pub fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> Result<(), String> {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}
