//! Configuration for finite-state observables and pipes.

use crate::error::{HeraldError, Result};
use crate::types::{CacheMode, COMPLETE, ERROR, NEXT};
use serde::{Deserialize, Serialize};

/// Finite-state observable configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiniteStateConfig {
    /// Replay policy for late observers.
    /// Default: once
    pub mode: CacheMode,

    /// Extra terminal notification names on top of `complete` and `error`.
    pub final_states: Vec<String>,
}

impl Default for FiniteStateConfig {
    fn default() -> Self {
        Self {
            mode: CacheMode::Once,
            final_states: Vec::new(),
        }
    }
}

impl FiniteStateConfig {
    /// Configuration with the given mode and the default final states.
    pub fn with_mode(mode: CacheMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Add a custom terminal state name. `next` is rejected.
    pub fn final_state(mut self, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        check_final_name(&name)?;
        if !self.final_states.contains(&name) {
            self.final_states.push(name);
        }
        Ok(self)
    }

    /// Parse from a JSON document such as `{"mode": "cache-all", "final_states": ["abort"]}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        for name in &config.final_states {
            check_final_name(name)?;
        }
        Ok(config)
    }

    /// Whether `name` ends the observable.
    pub fn is_final(&self, name: &str) -> bool {
        if name == NEXT {
            return false;
        }
        name == COMPLETE || name == ERROR || self.final_states.iter().any(|s| s == name)
    }
}

fn check_final_name(name: &str) -> Result<()> {
    if name == NEXT {
        return Err(HeraldError::Config(format!("'{name}' cannot be a final state")));
    }
    Ok(())
}

impl From<CacheMode> for FiniteStateConfig {
    fn from(mode: CacheMode) -> Self {
        FiniteStateConfig::with_mode(mode)
    }
}

/// Pipe lifecycle configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipeConfig {
    /// Activate the pipe's observer when its observable gains a first observer.
    /// Default: true
    pub auto_activate: bool,

    /// Deactivate the pipe's observer when its observable loses its last observer.
    /// Default: true
    pub auto_deactivate: bool,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            auto_activate: true,
            auto_deactivate: true,
        }
    }
}

impl PipeConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FiniteStateConfig::default();
        assert_eq!(config.mode, CacheMode::Once);
        assert!(config.is_final("complete"));
        assert!(config.is_final("error"));
        assert!(!config.is_final("next"));
        assert!(!config.is_final("abort"));

        let pipe = PipeConfig::default();
        assert!(pipe.auto_activate && pipe.auto_deactivate);
    }

    #[test]
    fn test_from_json() {
        let config =
            FiniteStateConfig::from_json(r#"{"mode": "cache-all", "final_states": ["abort"]}"#)
                .unwrap();
        assert_eq!(config.mode, CacheMode::CacheAll);
        assert!(config.is_final("abort"));

        let pipe = PipeConfig::from_json(r#"{"auto_deactivate": false}"#).unwrap();
        assert!(pipe.auto_activate);
        assert!(!pipe.auto_deactivate);
    }

    #[test]
    fn test_bad_json() {
        let result = FiniteStateConfig::from_json(r#"{"mode": "forever"}"#);
        assert!(matches!(result, Err(HeraldError::Config(_))));
    }

    #[test]
    fn test_final_state_builder_dedups() {
        let config = FiniteStateConfig::with_mode(CacheMode::Cache)
            .final_state("abort")
            .and_then(|c| c.final_state("abort"))
            .unwrap();
        assert_eq!(config.final_states, vec!["abort".to_string()]);
    }

    #[test]
    fn test_next_is_never_final() {
        assert!(matches!(
            FiniteStateConfig::default().final_state("next"),
            Err(HeraldError::Config(_))
        ));
        assert!(matches!(
            FiniteStateConfig::from_json(r#"{"final_states": ["abort", "next"]}"#),
            Err(HeraldError::Config(_))
        ));

        // a hand-built config still cannot make `next` terminal
        let config = FiniteStateConfig {
            mode: CacheMode::Cache,
            final_states: vec!["next".into()],
        };
        assert!(!config.is_final("next"));
    }
}
