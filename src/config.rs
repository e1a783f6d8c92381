//! Harness configuration with fallback to defaults.

use crate::compare::Tolerance;
use crate::errors::{ConfigError, ConfigResult};
use crate::registry::DataType;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Comparison tolerance per precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceConfig {
    pub fp32: Tolerance,
    pub fp16: Tolerance,
    pub bf16: Tolerance,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            fp32: Tolerance::new(1e-4, 1e-4),
            fp16: Tolerance::new(1e-2, 1e-2),
            bf16: Tolerance::new(5e-2, 5e-2),
        }
    }
}

impl ToleranceConfig {
    pub fn for_data_type(&self, data_type: DataType) -> Tolerance {
        match data_type {
            DataType::Fp32 => self.fp32,
            DataType::Fp16 => self.fp16,
            DataType::Bf16 => self.bf16,
        }
    }
}

/// Run parameters. CLI flags override whatever is loaded here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub warmup_iterations: usize,
    pub iterations: usize,
    pub device: String,
    /// Upper bound on one isolated worker run.
    pub worker_timeout_secs: u64,
    pub tolerance: ToleranceConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            warmup_iterations: 5,
            iterations: 100,
            device: "gpu".to_string(),
            worker_timeout_secs: 3600,
            tolerance: ToleranceConfig::default(),
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.device.trim().is_empty() {
            return Err(ConfigError::ConfigValidationError {
                field: "device".to_string(),
                message: "Device must not be empty".to_string(),
            });
        }

        if self.worker_timeout_secs == 0 {
            return Err(ConfigError::ConfigValidationError {
                field: "worker_timeout_secs".to_string(),
                message: "Worker timeout must be greater than 0".to_string(),
            });
        }

        for (name, tolerance) in [
            ("fp32", self.tolerance.fp32),
            ("fp16", self.tolerance.fp16),
            ("bf16", self.tolerance.bf16),
        ] {
            let valid = |v: f32| v.is_finite() && v >= 0.0;
            if !valid(tolerance.rtol) || !valid(tolerance.atol) {
                return Err(ConfigError::ConfigValidationError {
                    field: format!("tolerance.{}", name),
                    message: "Tolerances must be finite and non-negative".to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Values given on the command line. `None` keeps the loaded value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub warmup_iterations: Option<usize>,
    pub iterations: Option<usize>,
    pub device: Option<String>,
    pub worker_timeout_secs: Option<u64>,
}

impl HarnessConfig {
    /// Merges `overrides` into this configuration and validates the result.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> ConfigResult<Self> {
        if let Some(warmup_iterations) = overrides.warmup_iterations {
            self.warmup_iterations = warmup_iterations;
        }
        if let Some(iterations) = overrides.iterations {
            self.iterations = iterations;
        }
        if let Some(device) = overrides.device {
            self.device = device;
        }
        if let Some(worker_timeout_secs) = overrides.worker_timeout_secs {
            self.worker_timeout_secs = worker_timeout_secs;
        }
        self.validate()?;
        Ok(self)
    }
}

/// Loads JSON configuration files, falling back to defaults when absent.
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load_config<T>(path: &Path, config_name: &str) -> ConfigResult<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| ConfigError::ConfigParseError {
                path: path.display().to_string(),
                source: e,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "Config file '{}' not found, using default configuration for {}",
                    path.display(),
                    config_name
                );
                Ok(T::default())
            }
            Err(e) => Err(ConfigError::Io {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }

    /// Loads and validates the harness configuration. `None` selects defaults.
    pub fn load_harness_config(path: Option<&Path>) -> ConfigResult<HarnessConfig> {
        let config: HarnessConfig = match path {
            Some(path) => Self::load_config(path, "harness")?,
            None => {
                info!("No config file given, using default harness configuration");
                HarnessConfig::default()
            }
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.warmup_iterations, 5);
        assert_eq!(config.iterations, 100);
        assert_eq!(config.device, "gpu");
        assert_eq!(config.worker_timeout_secs, 3600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config =
            ConfigLoader::load_harness_config(Some(Path::new("/nonexistent/harness.json"))).unwrap();
        assert_eq!(config, HarnessConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"iterations": 7, "tolerance": {{"fp16": {{"rtol": 0.5, "atol": 0.25}}}}}}"#)
            .unwrap();

        let config = ConfigLoader::load_harness_config(Some(file.path())).unwrap();
        assert_eq!(config.iterations, 7);
        assert_eq!(config.warmup_iterations, 5);
        assert_eq!(config.tolerance.fp16, Tolerance::new(0.5, 0.25));
        assert_eq!(config.tolerance.fp32, ToleranceConfig::default().fp32);
    }

    #[test]
    fn test_invalid_json_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let result = ConfigLoader::load_harness_config(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::ConfigParseError { .. })));
    }

    #[test]
    fn test_zero_timeout_fails_validation() {
        let config = HarnessConfig {
            worker_timeout_secs: 0,
            ..HarnessConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ConfigValidationError { ref field, .. }) if field == "worker_timeout_secs"
        ));
    }

    #[test]
    fn test_overrides_replace_loaded_values() {
        let config = HarnessConfig::default()
            .with_overrides(ConfigOverrides {
                iterations: Some(3),
                device: Some("cpu".to_string()),
                worker_timeout_secs: Some(u64::MAX),
                ..ConfigOverrides::default()
            })
            .unwrap();
        assert_eq!(config.iterations, 3);
        assert_eq!(config.warmup_iterations, 5);
        assert_eq!(config.device, "cpu");
        assert_eq!(config.worker_timeout_secs, u64::MAX);
    }

    #[test]
    fn test_zero_timeout_override_fails_validation() {
        let result = HarnessConfig::default().with_overrides(ConfigOverrides {
            worker_timeout_secs: Some(0),
            ..ConfigOverrides::default()
        });
        assert!(matches!(
            result,
            Err(ConfigError::ConfigValidationError { ref field, .. }) if field == "worker_timeout_secs"
        ));
    }

    #[test]
    fn test_negative_tolerance_fails_validation() {
        let mut config = HarnessConfig::default();
        config.tolerance.bf16.atol = -1.0;
        assert!(config.validate().is_err());
    }
}
