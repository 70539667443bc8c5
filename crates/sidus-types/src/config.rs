//! Runtime configuration types for Sidus.
//!
//! `RuntimeConfig` represents the `sidus.toml` that controls scheduling,
//! worker-pool bounds, skill-plan weights, and log output.

use serde::{Deserialize, Serialize};

/// Name given to agents that do not choose one.
pub const DEFAULT_AGENT_NAME: &str = "_default_agent_name_";

/// Top-level configuration for an agent runtime.
///
/// All fields have sensible defaults, so an empty file is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Agent name used in log output.
    #[serde(default = "default_agent_name")]
    pub agent_name: String,

    /// Scheduler tick in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Maximum task and loop bodies running at the same time.
    #[serde(default = "default_max_concurrent_executions")]
    pub max_concurrent_executions: usize,

    /// Maximum dispatches waiting for a worker before new ones are rejected.
    #[serde(default = "default_max_queued_executions")]
    pub max_queued_executions: usize,

    #[serde(default)]
    pub plan: PlanWeights,

    #[serde(default)]
    pub log: LogSettings,
}

fn default_agent_name() -> String {
    DEFAULT_AGENT_NAME.to_string()
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_max_concurrent_executions() -> usize {
    64
}

fn default_max_queued_executions() -> usize {
    1024
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            agent_name: default_agent_name(),
            tick_interval_ms: default_tick_interval_ms(),
            max_concurrent_executions: default_max_concurrent_executions(),
            max_queued_executions: default_max_queued_executions(),
            plan: PlanWeights::default(),
            log: LogSettings::default(),
        }
    }
}

impl RuntimeConfig {
    /// Clamp values that would stall the runtime.
    ///
    /// An empty agent name is replaced by [`DEFAULT_AGENT_NAME`].
    /// A zero tick would spin the scheduler and zero permits or queue slots
    /// would never run anything, so those are raised to 1. A detour weight
    /// that does not exceed the cheap weight is raised to `cheap_weight * 100`.
    pub fn validate(mut self) -> Self {
        if self.agent_name.trim().is_empty() {
            self.agent_name = default_agent_name();
        }
        self.tick_interval_ms = self.tick_interval_ms.max(1);
        self.max_concurrent_executions = self.max_concurrent_executions.max(1);
        self.max_queued_executions = self.max_queued_executions.max(1);
        self.plan.cheap_weight = self.plan.cheap_weight.max(1);
        if self.plan.detour_weight <= self.plan.cheap_weight {
            self.plan.detour_weight = self.plan.cheap_weight.saturating_mul(100);
        }
        self
    }
}

/// Edge weights used when compiling skill plans.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanWeights {
    /// Weight of an edge on the declared skill sequence.
    #[serde(default = "default_cheap_weight")]
    pub cheap_weight: u32,

    /// Weight of every other edge.
    #[serde(default = "default_detour_weight")]
    pub detour_weight: u32,
}

fn default_cheap_weight() -> u32 {
    1
}

fn default_detour_weight() -> u32 {
    100
}

impl Default for PlanWeights {
    fn default() -> Self {
        Self {
            cheap_weight: default_cheap_weight(),
            detour_weight: default_detour_weight(),
        }
    }
}

/// Log output settings consumed by `sidus-observe`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,

    /// Bridge spans to OpenTelemetry (stdout exporter).
    #[serde(default)]
    pub otel: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            otel: false,
        }
    }
}
