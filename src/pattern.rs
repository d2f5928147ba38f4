//! Load pattern generation: maps elapsed time to a target concurrency level.
//!
//! [`target_concurrency`] is a pure function of elapsed time and
//! configuration so every pattern can be unit-tested without running a pool.

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

/// Supported load patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternKind {
    #[default]
    Constant,
    RampUp,
    Spike,
    Wave,
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternKind::Constant => write!(f, "constant"),
            PatternKind::RampUp => write!(f, "ramp-up"),
            PatternKind::Spike => write!(f, "spike"),
            PatternKind::Wave => write!(f, "wave"),
        }
    }
}

impl std::str::FromStr for PatternKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "constant" => Ok(PatternKind::Constant),
            "ramp-up" | "ramp_up" | "rampup" => Ok(PatternKind::RampUp),
            "spike" => Ok(PatternKind::Spike),
            "wave" => Ok(PatternKind::Wave),
            _ => Err(format!("Unknown load pattern: {}", s)),
        }
    }
}

/// Shape of the offered load over a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadPatternConfig {
    pub kind: PatternKind,
    /// Peak number of concurrent workers
    pub max_concurrency: usize,
    /// RAMP_UP: fraction of the run spent ramping from 1 to max
    pub ramp_fraction: f64,
    /// SPIKE: length of one low/high cycle in seconds
    pub spike_period_secs: f64,
    /// SPIKE: fraction of each period spent at the high level
    pub spike_duty_cycle: f64,
    /// WAVE: length of one full sine cycle in seconds
    pub wave_period_secs: f64,
}

impl Default for LoadPatternConfig {
    fn default() -> Self {
        Self {
            kind: PatternKind::Constant,
            max_concurrency: 50,
            ramp_fraction: 0.3,
            // 10s burst per 60s period
            spike_period_secs: 60.0,
            spike_duty_cycle: 10.0 / 60.0,
            wave_period_secs: 120.0,
        }
    }
}

impl LoadPatternConfig {
    pub fn constant(max_concurrency: usize) -> Self {
        Self {
            kind: PatternKind::Constant,
            max_concurrency,
            ..Default::default()
        }
    }

    pub fn ramp_up(max_concurrency: usize, ramp_fraction: f64) -> Self {
        Self {
            kind: PatternKind::RampUp,
            max_concurrency,
            ramp_fraction,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency < 1 {
            return Err(BenchError::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.ramp_fraction) {
            return Err(BenchError::Config(format!(
                "ramp_fraction must be in [0, 1], got {}",
                self.ramp_fraction
            )));
        }
        if self.spike_period_secs <= 0.0 || self.wave_period_secs <= 0.0 {
            return Err(BenchError::Config(
                "spike_period_secs and wave_period_secs must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.spike_duty_cycle) {
            return Err(BenchError::Config(format!(
                "spike_duty_cycle must be in [0, 1], got {}",
                self.spike_duty_cycle
            )));
        }
        Ok(())
    }
}

/// Target concurrency at `elapsed_secs` into a run of `total_secs`.
///
/// Pure and side-effect free. Outputs are rounded to the nearest integer and
/// never drop below 1 or exceed `max_concurrency`.
pub fn target_concurrency(elapsed_secs: f64, total_secs: f64, config: &LoadPatternConfig) -> usize {
    let max = config.max_concurrency;

    let raw = match config.kind {
        PatternKind::Constant => max as f64,
        PatternKind::RampUp => {
            let ramp_secs = config.ramp_fraction * total_secs;
            if ramp_secs <= 0.0 || elapsed_secs >= ramp_secs {
                max as f64
            } else {
                1.0 + (max as f64 - 1.0) * (elapsed_secs / ramp_secs)
            }
        }
        PatternKind::Spike => {
            let position = elapsed_secs.rem_euclid(config.spike_period_secs);
            if position < config.spike_duty_cycle * config.spike_period_secs {
                max as f64
            } else {
                (max / 4).max(1) as f64
            }
        }
        PatternKind::Wave => {
            let phase = 2.0 * std::f64::consts::PI * elapsed_secs / config.wave_period_secs;
            max as f64 * (0.625 + 0.375 * phase.sin())
        }
    };

    (raw.round() as usize).clamp(1, max)
}
