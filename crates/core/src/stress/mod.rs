use serde::{Deserialize, Serialize};

use crate::{config::StressConfig, SignalSample, Tier};

pub const MIN_STRESS: f32 = 0.0;
pub const MAX_STRESS: f32 = 100.0;

/// Bounded stress value. Always finite and inside `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(into = "f32", from = "f32")]
pub struct StressScore(f32);

impl StressScore {
    pub const ZERO: StressScore = StressScore(MIN_STRESS);

    /// Clamps any `f32` into range; NaN becomes zero.
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        Self(value.clamp(MIN_STRESS, MAX_STRESS))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    pub fn tier(self) -> Tier {
        Tier::classify(self.0)
    }
}

impl From<f32> for StressScore {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

impl From<StressScore> for f32 {
    fn from(value: StressScore) -> Self {
        value.0
    }
}

/// Immutable view handed to everything that is not the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressSnapshot {
    pub stress: StressScore,
    pub tier: Tier,
}

impl StressSnapshot {
    pub fn of(stress: StressScore) -> Self {
        Self {
            stress,
            tier: stress.tier(),
        }
    }
}

/// Owns the session's stress score and applies clamped delta updates.
#[derive(Debug, Clone)]
pub struct StressAccumulator {
    config: StressConfig,
    score: StressScore,
}

impl StressAccumulator {
    pub fn new(config: StressConfig) -> Self {
        let score = StressScore::new(config.baseline);
        Self { config, score }
    }

    pub fn score(&self) -> StressScore {
        self.score
    }

    pub fn snapshot(&self) -> StressSnapshot {
        StressSnapshot::of(self.score)
    }

    /// Folds one sample into the owned score and returns the new snapshot.
    pub fn apply(&mut self, sample: &SignalSample) -> StressSnapshot {
        self.score = update(&self.config, self.score, sample);
        self.snapshot()
    }

    /// Returns the score to the configured baseline.
    pub fn reset(&mut self) {
        self.score = StressScore::new(self.config.baseline);
    }
}

/// Computes the next score from the previous one and a sample.
///
/// Each cue is evaluated on its own. A value that is NaN or outside its
/// declared range contributes nothing. When every usable cue is calm the score
/// decays; a sample with no usable cue at all leaves the score untouched.
pub fn update(config: &StressConfig, previous: StressScore, sample: &SignalSample) -> StressScore {
    let cues = [
        gaze_contribution(config, sample.gaze_score),
        blink_contribution(config, sample.blink_rate),
    ];

    let mut usable = false;
    let mut delta = 0.0;
    for contribution in cues.into_iter().flatten() {
        usable = true;
        delta += contribution;
    }

    if usable && delta == 0.0 {
        delta = -config.calm_decay.max(0.0);
    }

    StressScore::new(previous.value() + delta)
}

fn gaze_contribution(config: &StressConfig, gaze_score: f32) -> Option<f32> {
    if !(0.0..=1.0).contains(&gaze_score) {
        tracing::debug!(gaze_score, "ignoring malformed gaze score");
        return None;
    }
    if gaze_score < config.gaze_off_center_threshold {
        Some(config.gaze_off_center_delta)
    } else {
        Some(0.0)
    }
}

fn blink_contribution(config: &StressConfig, blink_rate: f32) -> Option<f32> {
    if !(0.0..=config.max_blink_rate).contains(&blink_rate) {
        tracing::debug!(blink_rate, "ignoring malformed blink rate");
        return None;
    }
    if blink_rate > config.blink_rate_threshold {
        Some(config.blink_rate_delta)
    } else {
        Some(0.0)
    }
}
