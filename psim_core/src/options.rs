use psim_schema::Milliseconds;
use serde::{Deserialize, Serialize};

use crate::SimError;

/// Constants of the simulated player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimOptions {
    /// Reaction interval at skill level 1; the interval is `reaction_scale / skill`.
    pub reaction_scale: f64,
    /// Time saved when the anchoring input was a release.
    pub release_leniency: Milliseconds,
    /// Minimum gap between a hold press and its release.
    pub min_release_gap: Milliseconds,
    /// Margin past the previous note before the next press may land.
    pub hold_epsilon: Milliseconds,
    /// How long a tap stays held in generated action streams.
    pub tap_release_delay: Milliseconds,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            reaction_scale: 1000.0,
            release_leniency: 50.0,
            min_release_gap: 1.0,
            hold_epsilon: 1.0,
            tap_release_delay: 20.0,
        }
    }
}

impl SimOptions {
    pub fn validate(&self) -> Result<(), SimError> {
        let fields = [
            ("reaction_scale", self.reaction_scale),
            ("release_leniency", self.release_leniency),
            ("min_release_gap", self.min_release_gap),
            ("hold_epsilon", self.hold_epsilon),
            ("tap_release_delay", self.tap_release_delay),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(SimError::new(
                    "E1103",
                    format!("{name} must be finite and >= 0 (got {value})"),
                ));
            }
        }
        if self.reaction_scale == 0.0 {
            return Err(SimError::new("E1103", "reaction_scale must be > 0"));
        }
        Ok(())
    }

    /// Time the simulated player needs between two consecutive inputs in
    /// one channel. Infinite at skill level 0.
    pub fn reaction_interval(&self, skill_level: f64) -> Milliseconds {
        self.reaction_scale / skill_level
    }

    /// Inverse of [`reaction_interval`](Self::reaction_interval): the skill
    /// level whose interval is exactly `interval`.
    pub fn skill_for_interval(&self, interval: Milliseconds) -> f64 {
        self.reaction_scale / interval
    }
}

/// Upper bound on the number of levels one sweep may sample.
pub const MAX_SWEEP_SAMPLES: usize = 100_000;

/// Skill-level range swept by the curve sampler: `[0, max_level)` in `step` increments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepOptions {
    pub max_level: f64,
    pub step: f64,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            max_level: 10.0,
            step: 0.1,
        }
    }
}

impl SweepOptions {
    pub fn validate(&self) -> Result<(), SimError> {
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(SimError::new(
                "E1102",
                format!("sweep step must be > 0 (got {})", self.step),
            ));
        }
        if !(self.max_level.is_finite() && self.max_level >= 0.0) {
            return Err(SimError::new(
                "E1102",
                format!("sweep max_level must be >= 0 (got {})", self.max_level),
            ));
        }
        let len = self.len();
        if len > MAX_SWEEP_SAMPLES {
            return Err(SimError::new(
                "E1102",
                format!("sweep has {len} levels (max {MAX_SWEEP_SAMPLES}); raise the step"),
            ));
        }
        Ok(())
    }

    /// Level of the `k`-th sample. Computed by index so long sweeps don't drift.
    pub fn level_at(&self, k: usize) -> f64 {
        k as f64 * self.step
    }

    /// Number of levels `k * step` below `max_level`. Zero for an invalid step.
    pub fn len(&self) -> usize {
        if !(self.step.is_finite() && self.step > 0.0) {
            return 0;
        }
        // The quotient is off by at most one either way after rounding.
        let mut k = (self.max_level / self.step).ceil() as usize;
        while k > 0 && self.level_at(k - 1) >= self.max_level {
            k -= 1;
        }
        while self.level_at(k) < self.max_level {
            k += 1;
        }
        k
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn levels(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len()).map(move |k| self.level_at(k))
    }
}

pub(crate) fn check_skill_level(skill_level: f64) -> Result<(), SimError> {
    if skill_level.is_nan() || skill_level < 0.0 || skill_level.is_infinite() {
        return Err(SimError::new(
            "E1101",
            format!("skill level must be finite and >= 0 (got {skill_level})"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sweep_has_one_hundred_levels() {
        let sweep = SweepOptions::default();
        assert_eq!(sweep.len(), 100);
        let levels: Vec<f64> = sweep.levels().collect();
        assert_eq!(levels[0], 0.0);
        assert!(levels[99] < 10.0);
    }

    #[test]
    fn sweep_len_counts_levels_below_max() {
        let cases = [
            (10.0, 0.1, 100),
            (5.0, 0.5, 10),
            (1.0, 0.3, 4),
            (0.3, 0.1, 3),
            (2.0, 1.0, 2),
            (0.0, 0.1, 0),
        ];
        for (max_level, step, expected) in cases {
            let sweep = SweepOptions { max_level, step };
            assert_eq!(sweep.len(), expected, "max {max_level} step {step}");
            assert!(sweep.levels().all(|l| l < max_level));
            assert!(sweep.level_at(expected) >= max_level);
        }
    }

    #[test]
    fn sweep_rejects_too_many_levels() {
        let sweep = SweepOptions {
            max_level: 10.0,
            step: 1e-9,
        };
        assert_eq!(sweep.len(), 10_000_000_000);
        assert_eq!(sweep.validate().unwrap_err().code, "E1102");

        let sweep = SweepOptions {
            max_level: 10.0,
            step: 1e-3,
        };
        assert!(sweep.validate().is_ok());
    }

    #[test]
    fn sweep_rejects_zero_step() {
        let sweep = SweepOptions {
            max_level: 5.0,
            step: 0.0,
        };
        assert_eq!(sweep.validate().unwrap_err().code, "E1102");
    }

    #[test]
    fn options_deserialize_with_partial_fields() {
        let opts: SimOptions = serde_json::from_str(r#"{"release_leniency": 30}"#).unwrap();
        assert_eq!(opts.release_leniency, 30.0);
        assert_eq!(opts.reaction_scale, 1000.0);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn reaction_interval_is_inverse_of_skill() {
        let opts = SimOptions::default();
        assert_eq!(opts.reaction_interval(10.0), 100.0);
        assert_eq!(opts.reaction_interval(0.0), f64::INFINITY);
        assert_eq!(opts.skill_for_interval(opts.reaction_interval(4.0)), 4.0);
    }

    #[test]
    fn negative_skill_is_rejected() {
        assert_eq!(check_skill_level(-0.5).unwrap_err().code, "E1101");
        assert!(check_skill_level(0.0).is_ok());
        assert!(check_skill_level(f64::NAN).is_err());
    }
}
