// Job configuration loading

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub name: String,
    pub inputs: InputsConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub tolerance: ToleranceConfig,
}

// ---------------------------------------------------------------------------
// Inputs + Output
// ---------------------------------------------------------------------------

/// Input files. At least one stage stream is required; the duplicate list
/// and the topology enumeration are optional.
#[derive(Debug, Deserialize)]
pub struct InputsConfig {
    #[serde(default)]
    pub stage1: Option<PathBuf>,
    #[serde(default)]
    pub stage2: Option<PathBuf>,
    #[serde(default)]
    pub duplicates: Option<PathBuf>,
    #[serde(default)]
    pub topologies: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Filestem for every output artifact (`<stem>_summary.csv`, ...).
    pub stem: PathBuf,
}

// ---------------------------------------------------------------------------
// Tolerance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ToleranceConfig {
    /// Absolute tolerance for stage-1/stage-2 numeric agreement.
    #[serde(default = "default_absolute")]
    pub absolute: f64,
}

fn default_absolute() -> f64 {
    1e-6
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            absolute: default_absolute(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl JobConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: JobConfig =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Validation("name must not be empty".into()));
        }
        if self.output.stem.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "output.stem must not be empty".into(),
            ));
        }
        if self.inputs.stage1.is_none() && self.inputs.stage2.is_none() {
            return Err(ConfigError::Validation(
                "at least one of inputs.stage1 / inputs.stage2 is required".into(),
            ));
        }
        if !self.tolerance.absolute.is_finite() || self.tolerance.absolute <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "tolerance.absolute must be a positive finite number, got {}",
                self.tolerance.absolute
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    /// TOML parse / deserialization error.
    Parse(String),
    /// Config validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "config parse error: {msg}"),
            Self::Validation(msg) => write!(f, "config validation error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
name = "July batch"

[inputs]
stage1 = "data/stage1.jsonl"
stage2 = "data/stage2.jsonl"
duplicates = "data/equivalent.dat"
topologies = "data/topologies.csv"

[output]
stem = "out/july"

[tolerance]
absolute = 1e-6
"#;

    #[test]
    fn parse_valid() {
        let config = JobConfig::from_toml(VALID).unwrap();
        assert_eq!(config.name, "July batch");
        assert_eq!(config.inputs.stage1.as_deref().unwrap().to_str(), Some("data/stage1.jsonl"));
        assert_eq!(config.output.stem.to_str(), Some("out/july"));
        assert_eq!(config.tolerance.absolute, 1e-6);
    }

    #[test]
    fn tolerance_defaults() {
        let input = r#"
name = "Minimal"

[inputs]
stage2 = "stage2.jsonl"

[output]
stem = "out/run"
"#;
        let config = JobConfig::from_toml(input).unwrap();
        assert_eq!(config.tolerance.absolute, 1e-6);
        assert!(config.inputs.stage1.is_none());
        assert!(config.inputs.duplicates.is_none());
    }

    #[test]
    fn reject_empty_name() {
        let input = VALID.replace("July batch", " ");
        let err = JobConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn reject_no_stage_inputs() {
        let input = r#"
name = "Nothing to do"

[inputs]
topologies = "topologies.csv"

[output]
stem = "out/run"
"#;
        let err = JobConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("stage1"));
    }

    #[test]
    fn reject_bad_tolerance() {
        let input = VALID.replace("1e-6", "0.0");
        let err = JobConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("tolerance"));

        let input = VALID.replace("1e-6", "-1.0");
        assert!(JobConfig::from_toml(&input).is_err());
    }

    #[test]
    fn reject_unparseable_toml() {
        let err = JobConfig::from_toml("this is not toml = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
