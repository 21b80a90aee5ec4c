use analysis_orchestrator::PipelineConfig;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    // Completeness
    pub strict: bool,              // true = refuse short histories
    pub required_years: usize,     // 30
    pub max_years: usize,          // 30

    // Valuation
    pub required_return: f64,      // 10%

    // Resolution strategies
    pub strategy_timeout_ms: u64,  // 5000
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            strict: true,
            required_years: 30,
            max_years: 30,
            required_return: 10.0,
            strategy_timeout_ms: 5000,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            strict: parse_flag(env::var("STRICT_SYNC").ok().as_deref(), true),
            required_years: env::var("REQUIRED_YEARS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("REQUIRED_YEARS must be a whole number")?,
            max_years: env::var("MAX_YEARS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("MAX_YEARS must be a whole number")?,
            required_return: env::var("REQUIRED_RETURN")
                .unwrap_or_else(|_| "10.0".to_string())
                .parse()
                .context("REQUIRED_RETURN must be a number")?,
            strategy_timeout_ms: env::var("STRATEGY_TIMEOUT_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .context("STRATEGY_TIMEOUT_MS must be a whole number")?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_years == 0 {
            bail!("MAX_YEARS must be at least 1");
        }
        if self.strict && self.required_years > self.max_years {
            bail!(
                "REQUIRED_YEARS ({}) cannot exceed MAX_YEARS ({})",
                self.required_years,
                self.max_years
            );
        }
        if !self.required_return.is_finite() || self.required_return <= 0.0 {
            bail!("REQUIRED_RETURN must be a positive percentage");
        }
        if self.strategy_timeout_ms == 0 {
            bail!("STRATEGY_TIMEOUT_MS must be positive");
        }
        Ok(())
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            strict: self.strict,
            required_years: self.required_years,
            max_years: self.max_years,
            required_return: self.required_return,
            strategy_timeout: Duration::from_millis(self.strategy_timeout_ms),
        }
    }
}

/// Unset or unrecognised values fall back to `default`.
fn parse_flag(value: Option<&str>, default: bool) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}
