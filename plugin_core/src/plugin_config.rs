use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

/// Immutable option mapping handed to a plugin for one launch.
///
/// Recognised keys used by the built-in strategies:
/// - `bps`: bits per second for byte-paced output
/// - `on_ms` / `off_ms`: duty-cycle phases of the CPU pacer
/// - `port`: listening port of the slow HTTP service
/// - `drain_grace_ms`: how long the output throttle waits for its readers after the child exits
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct PluginConfig {
    values: BTreeMap<String, Value>,
}

impl PluginConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert used while a configuration is being assembled.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Integer value for `key`. Floats are truncated, numeric strings are parsed.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.values.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get_i64(key).and_then(|v| u64::try_from(v).ok())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns a new configuration where entries of `overrides` replace ours.
    pub fn merged(&self, overrides: &PluginConfig) -> PluginConfig {
        let mut values = self.values.clone();
        values.extend(overrides.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        PluginConfig { values }
    }

    /// Parses a `key=value` assignment as typed on a command line.
    ///
    /// Integers, floats and booleans keep their type; anything else is stored as a string.
    pub fn parse_assignment(assignment: &str) -> Result<(String, Value), String> {
        let (key, raw) = assignment
            .split_once('=')
            .ok_or_else(|| format!("Expected key=value, got '{}'", assignment))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("Missing key in '{}'", assignment));
        }
        let raw = raw.trim();
        let value = if let Ok(i) = raw.parse::<i64>() {
            Value::from(i)
        } else if let Ok(f) = raw.parse::<f64>() {
            Value::from(f)
        } else if let Ok(b) = raw.parse::<bool>() {
            Value::from(b)
        } else {
            Value::from(raw)
        };
        Ok((key.to_string(), value))
    }
}

impl FromIterator<(String, Value)> for PluginConfig {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self { values: iter.into_iter().collect() }
    }
}

impl std::fmt::Display for PluginConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pairs: Vec<String> = self
            .values
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(f, "{{{}}}", pairs.join(", "))
    }
}
