use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::BenchError;
use crate::metrics::collector::DEFAULT_SAMPLE_RETENTION_LIMIT;
use crate::pattern::{LoadPatternConfig, PatternKind};
use crate::workload::{Category, Complexity, WorkloadDistribution};

/// Configuration consumed by the harness core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Measurement phase length in seconds
    pub duration_secs: u64,
    /// Warmup phase length in seconds (samples discarded)
    pub warmup_secs: u64,
    /// Cooldown drain bound in seconds
    pub cooldown_secs: u64,
    /// Interval snapshot period in seconds
    pub interval_secs: u64,
    /// Control-loop tick in milliseconds
    pub tick_millis: u64,
    /// Per-operation deadline in seconds
    pub op_timeout_secs: u64,
    /// Consecutive fatal failures that abort the run (0 disables)
    pub max_consecutive_fatal_failures: u32,
    /// Raw latencies retained for exact global percentiles before falling
    /// back to histogram quantiles
    pub sample_retention_limit: usize,
    pub pattern: LoadPatternConfig,
    pub distribution: WorkloadDistribution,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            duration_secs: 60,
            warmup_secs: 10,
            cooldown_secs: 10,
            interval_secs: 5,
            tick_millis: 1000,
            op_timeout_secs: 30,
            max_consecutive_fatal_failures: 5,
            sample_retention_limit: DEFAULT_SAMPLE_RETENTION_LIMIT,
            pattern: LoadPatternConfig::default(),
            distribution: WorkloadDistribution::default(),
        }
    }
}

impl BenchmarkConfig {
    /// Validate all invariants the orchestrator relies on.
    pub fn validate(&self) -> std::result::Result<(), BenchError> {
        if self.duration_secs == 0 {
            return Err(BenchError::Config(
                "duration_secs must be at least 1".to_string(),
            ));
        }
        if self.interval_secs == 0 {
            return Err(BenchError::Config(
                "interval_secs must be at least 1".to_string(),
            ));
        }
        if self.tick_millis < 10 {
            return Err(BenchError::Config(
                "tick_millis must be at least 10".to_string(),
            ));
        }
        if self.op_timeout_secs == 0 {
            return Err(BenchError::Config(
                "op_timeout_secs must be at least 1".to_string(),
            ));
        }
        self.pattern.validate()?;
        self.distribution.validate()?;
        Ok(())
    }
}

/// loadbench - concurrent load-testing harness
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Measurement duration in seconds
    #[arg(short = 'd', long, env = "LOADBENCH_DURATION", default_value = "60")]
    pub duration: u64,

    /// Warmup duration in seconds
    #[arg(long, env = "LOADBENCH_WARMUP", default_value = "10")]
    pub warmup: u64,

    /// Cooldown drain bound in seconds
    #[arg(long, env = "LOADBENCH_COOLDOWN", default_value = "10")]
    pub cooldown: u64,

    /// Metrics interval in seconds
    #[arg(short = 'i', long, env = "LOADBENCH_INTERVAL", default_value = "5")]
    pub interval: u64,

    /// Peak concurrency
    #[arg(short = 'c', long, env = "LOADBENCH_CONCURRENCY", default_value = "50")]
    pub concurrency: usize,

    /// Load pattern (constant, ramp-up, spike, wave)
    #[arg(short = 'p', long, env = "LOADBENCH_PATTERN", default_value = "constant")]
    pub pattern: String,

    /// RAMP_UP: fraction of the run spent ramping
    #[arg(long, default_value = "0.3")]
    pub ramp_fraction: f64,

    /// SPIKE: cycle period in seconds
    #[arg(long, default_value = "60")]
    pub spike_period: f64,

    /// SPIKE: fraction of each period at the high level
    #[arg(long, default_value = "0.1667")]
    pub spike_duty_cycle: f64,

    /// WAVE: cycle period in seconds
    #[arg(long, default_value = "120")]
    pub wave_period: f64,

    /// Category weights, e.g. "read=0.6,write=0.2,update=0.15,delete=0.05"
    #[arg(long, env = "LOADBENCH_CATEGORY_WEIGHTS")]
    pub category_weights: Option<String>,

    /// Complexity weights, e.g. "simple=0.5,medium=0.3,complex=0.2"
    #[arg(long, env = "LOADBENCH_COMPLEXITY_WEIGHTS")]
    pub complexity_weights: Option<String>,

    /// Per-operation timeout in seconds
    #[arg(long, env = "LOADBENCH_OP_TIMEOUT", default_value = "30")]
    pub op_timeout: u64,

    /// Consecutive fatal failures before aborting (0 disables)
    #[arg(long, env = "LOADBENCH_FATAL_THRESHOLD", default_value = "5")]
    pub fatal_threshold: u32,

    /// Simulated backend: base latency for simple operations in ms
    #[arg(long, default_value = "2")]
    pub sim_latency_ms: u64,

    /// Simulated backend: latency jitter in ms
    #[arg(long, default_value = "2")]
    pub sim_jitter_ms: u64,

    /// Simulated backend: failure probability (0.0 to 1.0)
    #[arg(long, default_value = "0.0")]
    pub sim_error_rate: f64,

    /// Output the result as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl CliArgs {
    /// Build the harness configuration from the parsed arguments.
    pub fn to_benchmark_config(&self) -> Result<BenchmarkConfig> {
        let kind: PatternKind = self
            .pattern
            .parse()
            .map_err(|e: String| anyhow!(e))
            .context("invalid --pattern")?;

        let mut distribution = WorkloadDistribution::default();
        if let Some(spec) = &self.category_weights {
            distribution.categories =
                parse_weights::<Category>(spec).context("invalid --category-weights")?;
        }
        if let Some(spec) = &self.complexity_weights {
            distribution.complexities =
                parse_weights::<Complexity>(spec).context("invalid --complexity-weights")?;
        }

        Ok(BenchmarkConfig {
            duration_secs: self.duration,
            warmup_secs: self.warmup,
            cooldown_secs: self.cooldown,
            interval_secs: self.interval,
            op_timeout_secs: self.op_timeout,
            max_consecutive_fatal_failures: self.fatal_threshold,
            pattern: LoadPatternConfig {
                kind,
                max_concurrency: self.concurrency,
                ramp_fraction: self.ramp_fraction,
                spike_period_secs: self.spike_period,
                spike_duty_cycle: self.spike_duty_cycle,
                wave_period_secs: self.wave_period,
            },
            distribution,
            ..Default::default()
        })
    }
}

/// Parse a "key=weight,key=weight" specification.
fn parse_weights<T>(spec: &str) -> Result<Vec<(T, f64)>>
where
    T: std::str::FromStr<Err = String>,
{
    spec.split(',')
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("expected key=weight, got '{}'", pair))?;
            let key = key.trim().parse::<T>().map_err(|e| anyhow!(e))?;
            let weight: f64 = value
                .trim()
                .parse()
                .with_context(|| format!("invalid weight '{}'", value))?;
            Ok((key, weight))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(BenchmarkConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_durations() {
        let mut config = BenchmarkConfig::default();
        config.duration_secs = 0;
        assert!(config.validate().is_err());

        let mut config = BenchmarkConfig::default();
        config.interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = BenchmarkConfig::default();
        config.op_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = BenchmarkConfig::default();
        config.tick_millis = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_covers_pattern_and_distribution() {
        let mut config = BenchmarkConfig::default();
        config.pattern.max_concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = BenchmarkConfig::default();
        config.distribution.categories = vec![(Category::Read, 0.4)];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_weights() {
        let weights =
            parse_weights::<Category>("read=0.6, write=0.2,update=0.15,delete=0.05").unwrap();
        assert_eq!(weights.len(), 4);
        assert_eq!(weights[0], (Category::Read, 0.6));
        assert_eq!(weights[3], (Category::Delete, 0.05));

        assert!(parse_weights::<Category>("read:0.6").is_err());
        assert!(parse_weights::<Category>("scan=0.6").is_err());
        assert!(parse_weights::<Category>("read=lots").is_err());
        assert!(parse_weights::<Complexity>("simple=0.5,medium=0.5").is_ok());
    }

    #[test]
    fn test_config_roundtrips_through_json() {
        let config = BenchmarkConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: BenchmarkConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.duration_secs, config.duration_secs);
        assert_eq!(parsed.pattern.max_concurrency, config.pattern.max_concurrency);
        assert_eq!(parsed.distribution.categories.len(), 4);
    }
}
