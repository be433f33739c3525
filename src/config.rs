//! Model and service configuration.
//!
//! Weights and thresholds are fixed when a [`ModelConfig`] is built and are
//! never mutated afterwards; a `RiskModel` owns its copy.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Result, RiskError};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Per-feature weights of the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weights {
    pub avg_marks: f64,
    pub attendance: f64,
    pub assignment_completion: f64,
    pub behavior_score: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            avg_marks: 0.40,
            attendance: 0.25,
            assignment_completion: 0.20,
            behavior_score: 0.15,
        }
    }
}

impl Weights {
    pub fn sum(&self) -> f64 {
        self.avg_marks + self.attendance + self.assignment_completion + self.behavior_score
    }
}

/// Lower bounds of the three best risk tiers. Anything below `medium` is High.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    pub very_low: f64,
    pub low: f64,
    pub medium: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            very_low: 85.0,
            low: 70.0,
            medium: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    pub weights: Weights,
    pub thresholds: Thresholds,
}

impl ModelConfig {
    pub fn validate(&self) -> Result<()> {
        let w = &self.weights;
        let all = [w.avg_marks, w.attendance, w.assignment_completion, w.behavior_score];
        if all.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(RiskError::Config(format!("weights must be finite and non-negative: {w:?}")));
        }
        if (w.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(RiskError::Config(format!("weights sum to {}, expected 1.00", w.sum())));
        }

        let t = &self.thresholds;
        if !(t.very_low > t.low && t.low > t.medium) {
            return Err(RiskError::Config(format!(
                "thresholds must be strictly decreasing: veryLow={} low={} medium={}",
                t.very_low, t.low, t.medium
            )));
        }
        Ok(())
    }
}

/// What the feature normalizer does with values outside their bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InputPolicy {
    /// Score the values as given.
    #[default]
    Passthrough,
    /// Clamp each field into its bounds. Non-finite values become the lower bound.
    Clamp,
    /// Fail with `RiskError::OutOfRange`.
    Reject,
}

impl FromStr for InputPolicy {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "passthrough" => Ok(Self::Passthrough),
            "clamp" => Ok(Self::Clamp),
            "reject" => Ok(Self::Reject),
            other => Err(RiskError::Config(format!("unknown input policy {other:?}"))),
        }
    }
}

/// Fallback for numeric import cells that are unparseable or unmapped.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParseFailurePolicy {
    #[default]
    UseZero,
    Reject,
    UseDefault(f64),
}

impl FromStr for ParseFailurePolicy {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "zero" => return Ok(Self::UseZero),
            "reject" => return Ok(Self::Reject),
            _ => {}
        }
        if let Some(value) = s.strip_prefix("default:") {
            let value: f64 = value
                .trim()
                .parse()
                .map_err(|_| RiskError::Config(format!("invalid default value {value:?}")))?;
            return Ok(Self::UseDefault(value));
        }
        Err(RiskError::Config(format!("unknown parse failure policy {s:?}")))
    }
}

/// Options threaded through an import.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOptions {
    pub parse_failure: ParseFailurePolicy,
    pub input_policy: InputPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub input_policy: InputPolicy,
    pub parse_failure: ParseFailurePolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            input_policy: InputPolicy::default(),
            parse_failure: ParseFailurePolicy::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; missing keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("STUDENT_RISK_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("STUDENT_RISK_PORT") {
            config.port = port
                .trim()
                .parse()
                .map_err(|_| RiskError::Config(format!("invalid STUDENT_RISK_PORT {port:?}")))?;
        }
        if let Some(policy) = lookup("STUDENT_RISK_INPUT_POLICY") {
            config.input_policy = policy.parse()?;
        }
        if let Some(policy) = lookup("STUDENT_RISK_PARSE_FAILURE") {
            config.parse_failure = policy.parse()?;
        }

        Ok(config)
    }

    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            parse_failure: self.parse_failure,
            input_policy: self.input_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = ModelConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.weights.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_weights_not_summing_to_one() {
        let mut config = ModelConfig::default();
        config.weights.avg_marks = 0.5;
        assert!(matches!(config.validate(), Err(RiskError::Config(_))));
    }

    #[test]
    fn rejects_non_decreasing_thresholds() {
        let mut config = ModelConfig::default();
        config.thresholds.low = 85.0;
        assert!(matches!(config.validate(), Err(RiskError::Config(_))));
    }

    #[test]
    fn parses_policies() {
        assert_eq!("Clamp".parse::<InputPolicy>().unwrap(), InputPolicy::Clamp);
        assert_eq!("zero".parse::<ParseFailurePolicy>().unwrap(), ParseFailurePolicy::UseZero);
        assert_eq!(
            "default: 42.5".parse::<ParseFailurePolicy>().unwrap(),
            ParseFailurePolicy::UseDefault(42.5)
        );
        assert!("sometimes".parse::<InputPolicy>().is_err());
        assert!("default:abc".parse::<ParseFailurePolicy>().is_err());
    }

    #[test]
    fn server_config_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("STUDENT_RISK_PORT", "9090"),
            ("STUDENT_RISK_INPUT_POLICY", "reject"),
        ]
        .into_iter()
        .collect();

        let config = ServerConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9090);
        assert_eq!(config.input_policy, InputPolicy::Reject);
        assert_eq!(config.parse_failure, ParseFailurePolicy::UseZero);

        let bad = ServerConfig::from_lookup(|k| (k == "STUDENT_RISK_PORT").then(|| "eighty".to_string()));
        assert!(bad.is_err());
    }
}
