//! Named limit rules.
//!
//! Rules map a key (typically the name of an upstream API) to the policy its
//! limiter enforces. Keys without a rule fall back to the default policy.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use super::policy::LimitPolicy;
use crate::error::{GateError, Result};

/// A set of per-key limit policies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LimitRules {
    /// Policy for keys that have no rule of their own
    #[serde(default)]
    pub default: LimitPolicy,
    /// Policies by key
    #[serde(default)]
    pub limits: HashMap<String, LimitPolicy>,
}

impl LimitRules {
    /// Create rules with only a default policy.
    pub fn new(default: LimitPolicy) -> Self {
        Self {
            default,
            limits: HashMap::new(),
        }
    }

    /// Add or replace the policy for `key`.
    pub fn with_limit(mut self, key: impl Into<String>, policy: LimitPolicy) -> Self {
        self.limits.insert(key.into(), policy);
        self
    }

    /// Load rules from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading limit rules");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load rules from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let rules: LimitRules = serde_yaml::from_str(yaml)
            .map_err(|e| GateError::Config(format!("Failed to parse limit rules: {}", e)))?;
        rules.validate()?;
        Ok(rules)
    }

    /// Validate every policy, naming the offending key on failure.
    pub fn validate(&self) -> Result<()> {
        self.default.validate().map_err(|e| {
            GateError::InvalidConfiguration(format!("default: {}", e))
        })?;

        for (key, policy) in &self.limits {
            policy.validate().map_err(|e| {
                GateError::InvalidConfiguration(format!("limit '{}': {}", key, e))
            })?;
        }
        Ok(())
    }

    /// The policy that applies to `key`.
    pub fn policy_for(&self, key: &str) -> LimitPolicy {
        self.limits.get(key).copied().unwrap_or(self.default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::throttle::WaitPolicy;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_parse_rules() {
        let yaml = r#"
default:
  limit: 15
  window_ms: 60000
limits:
  github:
    limit: 30
    window_ms: 60000
    wait: shared_reset
  search:
    limit: 1
    window_ms: 5000
"#;

        let rules = LimitRules::from_yaml(yaml).unwrap();
        assert_eq!(rules.limits.len(), 2);

        let github = rules.policy_for("github");
        assert_eq!(github.limit, 30);
        assert_eq!(github.wait, WaitPolicy::SharedReset);

        let search = rules.policy_for("search");
        assert_eq!(search.limit, 1);
        assert_eq!(search.window(), Duration::from_secs(5));
        assert_eq!(search.wait, WaitPolicy::FullWindow);
    }

    #[test]
    fn test_unknown_key_uses_default() {
        let rules = LimitRules::new(LimitPolicy::new(7, Duration::from_secs(1)))
            .with_limit("known", LimitPolicy::new(2, Duration::from_secs(1)));

        assert_eq!(rules.policy_for("known").limit, 2);
        assert_eq!(rules.policy_for("other").limit, 7);
    }

    #[test]
    fn test_empty_rules_use_defaults() {
        let rules = LimitRules::from_yaml("{}").unwrap();
        assert_eq!(rules.default, LimitPolicy::default());
        assert!(rules.limits.is_empty());
    }

    #[test]
    fn test_invalid_rule_names_key() {
        let yaml = r#"
limits:
  broken:
    limit: 0
"#;

        let err = LimitRules::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, GateError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = LimitRules::from_yaml("limits: [not, a, map]").unwrap_err();
        assert!(matches!(err, GateError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "limits:\n  api:\n    limit: 4\n    window_ms: 1000").unwrap();

        let rules = LimitRules::from_file(file.path()).unwrap();
        assert_eq!(rules.policy_for("api").limit, 4);
    }

    #[test]
    fn test_missing_file() {
        let err = LimitRules::from_file("/nonexistent/callgate-rules.yaml").unwrap_err();
        assert!(matches!(err, GateError::Io(_)));
    }
}
