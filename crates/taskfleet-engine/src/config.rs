use serde::Deserialize;
use std::time::Duration;

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_intake_batch() -> usize {
    4
}

fn default_speed() -> f64 {
    1.5
}

fn default_reasoning_timeout_secs() -> u64 {
    60
}

fn default_context_budget() -> usize {
    500
}

/// Tunable engine parameters, loadable from the `[engine]` section of the
/// config file. Every field has a default so an empty section works.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Period of the tick scheduler.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Maximum pending tasks pulled into planning per tick.
    #[serde(default = "default_intake_batch")]
    pub intake_batch: usize,
    /// Distance an agent covers per tick.
    #[serde(default = "default_speed")]
    pub speed: f64,
    /// Upper bound on a single reasoning call. Expiry fails the subtask.
    #[serde(default = "default_reasoning_timeout_secs")]
    pub reasoning_timeout_secs: u64,
    /// Per-prior-output character budget when building executor context.
    #[serde(default = "default_context_budget")]
    pub context_budget: usize,
}

impl EngineConfig {
    /// Tick interval as a `Duration`.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Reasoning-call timeout as a `Duration`.
    pub fn reasoning_timeout(&self) -> Duration {
        Duration::from_secs(self.reasoning_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            intake_batch: default_intake_batch(),
            speed: default_speed(),
            reasoning_timeout_secs: default_reasoning_timeout_secs(),
            context_budget: default_context_budget(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: EngineConfig = toml::from_str("tick_interval_ms = 250").unwrap();
        assert_eq!(config.tick_interval(), Duration::from_millis(250));
        assert_eq!(config.intake_batch, 4);
        assert_eq!(config.reasoning_timeout(), Duration::from_secs(60));
        assert_eq!(config.context_budget, 500);
    }
}
