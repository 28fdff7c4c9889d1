//! Warmup ramp calculator.
//!
//! Turns a working weight into a short ramp of lighter sets, each a
//! percentage of the working weight rounded down to a loadable increment.

use serde::{Deserialize, Serialize};

/// One rung of the ramp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarmupStep {
    /// Fraction of the working weight (0.0 .. 1.0).
    pub percentage: f64,
    pub reps: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarmupScheme {
    #[serde(default = "default_steps")]
    pub steps: Vec<WarmupStep>,
    /// Smallest loadable weight change (plate pair).
    #[serde(default = "default_rounding_increment")]
    pub rounding_increment: f64,
    /// Lightest possible load, typically the empty bar.
    #[serde(default = "default_minimum_weight")]
    pub minimum_weight: f64,
}

fn default_steps() -> Vec<WarmupStep> {
    vec![
        WarmupStep {
            percentage: 0.4,
            reps: 8,
        },
        WarmupStep {
            percentage: 0.6,
            reps: 5,
        },
        WarmupStep {
            percentage: 0.8,
            reps: 3,
        },
    ]
}
fn default_rounding_increment() -> f64 {
    2.5
}
fn default_minimum_weight() -> f64 {
    20.0
}

impl Default for WarmupScheme {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            rounding_increment: default_rounding_increment(),
            minimum_weight: default_minimum_weight(),
        }
    }
}

/// A computed warmup set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarmupSet {
    pub weight: f64,
    pub reps: u32,
    pub percentage: f64,
}

impl WarmupScheme {
    /// Ramp for `working_weight`.
    ///
    /// Loads never drop below `minimum_weight` and never reach the working
    /// weight. Steps that land on the same load collapse into the first.
    /// A working weight at or below the minimum gets no ramp.
    pub fn calculate(&self, working_weight: f64) -> Vec<WarmupSet> {
        if !working_weight.is_finite() || working_weight <= self.minimum_weight {
            return Vec::new();
        }

        let mut ramp: Vec<WarmupSet> = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            if !(0.0..1.0).contains(&step.percentage) {
                continue;
            }
            let weight = self
                .round_down(working_weight * step.percentage)
                .max(self.minimum_weight);
            if weight >= working_weight {
                continue;
            }
            if ramp.iter().any(|w| (w.weight - weight).abs() < f64::EPSILON) {
                continue;
            }
            ramp.push(WarmupSet {
                weight,
                reps: step.reps,
                percentage: step.percentage,
            });
        }
        ramp
    }

    fn round_down(&self, weight: f64) -> f64 {
        if self.rounding_increment <= 0.0 {
            return weight;
        }
        // Nudge so 16.000000000000004 / 15.999999999999998 style results floor correctly.
        (weight / self.rounding_increment + 1e-9).floor() * self.rounding_increment
    }
}
