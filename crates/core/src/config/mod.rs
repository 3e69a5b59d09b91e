use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{Result, StressSimError};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sampler: SamplerConfig,
    pub stress: StressConfig,
    pub heartbeat: HeartbeatConfig,
    pub audio: AudioConfig,
    pub speech: SpeechConfig,
}

impl AppConfig {
    pub fn live_defaults() -> Self {
        Self::default()
    }

    /// Parses a JSON document. Sections and fields that are missing keep
    /// their default values.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.heartbeat.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}

/// Cadence of the signal sampler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub period_ms: u64,
}

impl SamplerConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms.max(1))
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self { period_ms: 200 }
    }
}

/// Weights used by the stress accumulator when turning a signal sample into
/// a score delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    /// Score a fresh session starts from.
    pub baseline: f32,
    /// Gaze scores strictly below this count as looking away.
    pub gaze_off_center_threshold: f32,
    pub gaze_off_center_delta: f32,
    /// Blink rates strictly above this (events/minute) count as elevated.
    pub blink_rate_threshold: f32,
    pub blink_rate_delta: f32,
    /// Amount removed per tick when the sample shows no stress cue.
    pub calm_decay: f32,
    /// Blink rates above this are treated as sensor garbage.
    pub max_blink_rate: f32,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            baseline: 0.0,
            gaze_off_center_threshold: 0.5,
            gaze_off_center_delta: 2.0,
            blink_rate_threshold: 25.0,
            blink_rate_delta: 3.0,
            calm_decay: 0.5,
            max_blink_rate: 120.0,
        }
    }
}

/// What happens to a dub tone that is already armed when the heartbeat is
/// cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingDubPolicy {
    /// The armed dub still sounds; only future cycles are suppressed.
    #[default]
    FireArmed,
    /// Cancellation retracts the armed dub as well.
    Retract,
}

/// Shape of a single synthesized tone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneConfig {
    pub frequency_hz: f32,
    pub duration_ms: u64,
    pub gain: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub lub: ToneConfig,
    pub dub: ToneConfig,
    /// Offset of the dub tone as a fraction of the beat interval.
    pub dub_fraction: f32,
    pub min_bpm: f32,
    pub max_bpm: f32,
    pub pending_dub: PendingDubPolicy,
}

impl HeartbeatConfig {
    /// Rejects BPM bounds that are not finite, not positive or not ordered.
    /// Bounds outside 30..=140 are accepted and narrowed by the scheduler.
    pub fn validate(&self) -> Result<()> {
        let finite = self.min_bpm.is_finite() && self.max_bpm.is_finite();
        if !finite || self.min_bpm <= 0.0 {
            return Err(StressSimError::InvalidInput(
                "heartbeat bpm bounds must be finite and positive",
            ));
        }
        if self.min_bpm > self.max_bpm {
            return Err(StressSimError::InvalidInput(
                "heartbeat min_bpm must not exceed max_bpm",
            ));
        }
        Ok(())
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            lub: ToneConfig {
                frequency_hz: 80.0,
                duration_ms: 150,
                gain: 0.9,
            },
            dub: ToneConfig {
                frequency_hz: 100.0,
                duration_ms: 100,
                gain: 0.7,
            },
            dub_fraction: 0.35,
            min_bpm: 30.0,
            max_bpm: 140.0,
            pending_dub: PendingDubPolicy::FireArmed,
        }
    }
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub max_text_chars: usize,
    pub model_id: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            max_text_chars: 300,
            model_id: "eleven_turbo_v2_5".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_keep_defaults() {
        let config =
            AppConfig::from_json_str(r#"{ "sampler": { "period_ms": 100 }, "heartbeat": { "pending_dub": "retract" } }"#)
                .unwrap();

        assert_eq!(config.sampler.period(), Duration::from_millis(100));
        assert_eq!(config.heartbeat.pending_dub, PendingDubPolicy::Retract);
        assert_eq!(config.heartbeat.dub_fraction, 0.35);
        assert_eq!(config.stress.blink_rate_threshold, 25.0);
        assert_eq!(config.audio.sample_rate, 48_000);
    }

    #[test]
    fn rejects_malformed_documents() {
        let err = AppConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, crate::StressSimError::Json(_)));
    }

    #[test]
    fn rejects_unusable_bpm_bounds() {
        for raw in [
            r#"{ "heartbeat": { "min_bpm": 150, "max_bpm": 140 } }"#,
            r#"{ "heartbeat": { "min_bpm": 0 } }"#,
            r#"{ "heartbeat": { "min_bpm": -10, "max_bpm": 60 } }"#,
        ] {
            let err = AppConfig::from_json_str(raw).unwrap_err();
            assert!(matches!(err, crate::StressSimError::InvalidInput(_)), "{raw}");
        }

        let config = AppConfig::from_json_str(r#"{ "heartbeat": { "min_bpm": 40, "max_bpm": 120 } }"#)
            .unwrap();
        assert_eq!(config.heartbeat.min_bpm, 40.0);
    }

    #[test]
    fn zero_period_is_raised_to_one_millisecond() {
        let config = SamplerConfig { period_ms: 0 };
        assert_eq!(config.period(), Duration::from_millis(1));
    }
}
