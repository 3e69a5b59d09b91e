//! Pure mappings from the stress snapshot to effector parameters.

use serde::{Deserialize, Serialize};

use crate::{StressScore, StressSnapshot, Tier};

pub const MIN_BPM: f32 = 50.0;
pub const MAX_BPM: f32 = 140.0;
pub const MAX_VIBRATION: u8 = 200;

/// Heart rate for a score: 50 BPM at rest, 140 BPM at full stress.
pub fn to_bpm(score: f32) -> f32 {
    let score = StressScore::new(score).value();
    (MIN_BPM + (score / 100.0) * (MAX_BPM - MIN_BPM)).clamp(MIN_BPM, MAX_BPM)
}

/// Haptic intensity for a score. The result never leaves `[0, 200]`, whatever
/// is passed in.
pub fn to_vibration_intensity(score: f32) -> VibrationIntensity {
    let raw = ((score / 100.0) * f32::from(MAX_VIBRATION)).floor();
    VibrationIntensity::from_f32(raw)
}

/// Level shown on the external heart display: 9 when calm, 1 when panicking.
pub fn to_heart_level(score: f32) -> u8 {
    let score = StressScore::new(score).value();
    let band = (score / 10.0).floor() as u8;
    9 - band.min(8)
}

/// Motor drive value accepted by the haptic hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(into = "u8", from = "u8")]
pub struct VibrationIntensity(u8);

impl VibrationIntensity {
    pub const OFF: VibrationIntensity = VibrationIntensity(0);
    pub const MAX: VibrationIntensity = VibrationIntensity(MAX_VIBRATION);

    pub fn new(value: u8) -> Self {
        Self(value.min(MAX_VIBRATION))
    }

    fn from_f32(value: f32) -> Self {
        if value.is_nan() {
            return Self::OFF;
        }
        // Saturating cast, then the hardware rail.
        Self::new(value.clamp(0.0, f32::from(MAX_VIBRATION)) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl From<u8> for VibrationIntensity {
    fn from(value: u8) -> Self {
        Self::new(value)
    }
}

impl From<VibrationIntensity> for u8 {
    fn from(value: VibrationIntensity) -> Self {
        value.0
    }
}

/// Delivery parameters for the external text-to-speech service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
}

const NEUTRAL_VOICE: VoiceProfile = VoiceProfile {
    stability: 0.75,
    similarity_boost: 0.85,
    style: 0.10,
};
const COLD_VOICE: VoiceProfile = VoiceProfile {
    stability: 0.85,
    similarity_boost: 0.80,
    style: 0.05,
};
const AGGRESSIVE_VOICE: VoiceProfile = VoiceProfile {
    stability: 0.40,
    similarity_boost: 0.90,
    style: 0.45,
};
const HORROR_VOICE: VoiceProfile = VoiceProfile {
    stability: 0.20,
    similarity_boost: 0.95,
    style: 0.80,
};

pub fn to_voice_profile(tier: Tier) -> VoiceProfile {
    match tier {
        Tier::Neutral => NEUTRAL_VOICE,
        Tier::Cold => COLD_VOICE,
        Tier::Aggressive => AGGRESSIVE_VOICE,
        Tier::Horror => HORROR_VOICE,
    }
}

/// Looks up a profile by a raw tier label; unknown labels get the neutral
/// profile.
pub fn voice_profile_for(label: &str) -> VoiceProfile {
    to_voice_profile(Tier::from_label(label))
}

/// Rate, pitch and volume for the local speech fallback used when the remote
/// voice is not reachable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeechDelivery {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

pub fn to_speech_delivery(tier: Tier) -> SpeechDelivery {
    let (rate, pitch) = match tier {
        Tier::Neutral => (1.0, 1.0),
        Tier::Cold => (1.0, 0.8),
        Tier::Aggressive => (1.3, 1.0),
        Tier::Horror => (0.8, 0.4),
    };
    SpeechDelivery {
        rate,
        pitch,
        volume: 1.0,
    }
}

/// Every effector output derived from one stress snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectorFrame {
    pub stress: f32,
    pub tier: Tier,
    pub bpm: f32,
    pub vibration: VibrationIntensity,
    pub heart_level: u8,
    pub voice: VoiceProfile,
}

impl EffectorFrame {
    pub fn from_snapshot(snapshot: &StressSnapshot) -> Self {
        let score = snapshot.stress.value();
        Self {
            stress: score,
            tier: snapshot.tier,
            bpm: to_bpm(score),
            vibration: to_vibration_intensity(score),
            heart_level: to_heart_level(score),
            voice: to_voice_profile(snapshot.tier),
        }
    }
}
