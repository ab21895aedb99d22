//! Secret values and the per-step environment that carries them.

use std::collections::HashMap;
use std::fmt;

const MASK: &str = "***";

/// A resolved secret. `Debug` never prints the value.
#[derive(Clone)]
pub struct SecretValue {
    value: String,
    pub version: Option<String>,
}

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretValue")
            .field("value", &MASK)
            .field("version", &self.version)
            .finish()
    }
}

/// Environment handed to the container runtime for exactly one step.
///
/// Secret values live here and nowhere else; the environment is dropped as
/// soon as the step's container call returns.
#[derive(Clone, Default)]
pub struct StepEnvironment {
    vars: HashMap<String, String>,
    secret_keys: Vec<String>,
}

impl StepEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.secret_keys.retain(|k| k != &key);
        self.vars.insert(key, value.into());
    }

    pub fn set_secret(&mut self, key: impl Into<String>, secret: SecretValue) {
        let key = key.into();
        if !self.secret_keys.contains(&key) {
            self.secret_keys.push(key.clone());
        }
        self.vars.insert(key, secret.value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn is_secret(&self, key: &str) -> bool {
        self.secret_keys.iter().any(|k| k == key)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `KEY=value` pairs in the form container runtimes expect.
    pub fn to_pairs(&self) -> Vec<String> {
        let mut pairs: Vec<String> = self.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        pairs.sort();
        pairs
    }

    /// Replace every secret value occurring in `input` with `***`.
    pub fn mask(&self, input: &str) -> String {
        let mut output = input.to_string();
        for key in &self.secret_keys {
            if let Some(value) = self.vars.get(key)
                && !value.is_empty()
            {
                output = output.replace(value.as_str(), MASK);
            }
        }
        output
    }
}

impl fmt::Debug for StepEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        let mut keys: Vec<&String> = self.vars.keys().collect();
        keys.sort();
        for key in keys {
            if self.is_secret(key) {
                map.entry(key, &MASK);
            } else {
                map.entry(key, &self.vars[key]);
            }
        }
        map.finish()
    }
}
