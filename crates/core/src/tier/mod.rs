use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::StressScore;

/// Ordered escalation label derived from the stress score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Neutral,
    Cold,
    Aggressive,
    Horror,
}

/// Lower bounds of the cold, aggressive and horror tiers. Each interval is
/// closed below and open above, except horror which also includes 100.
const COLD_FROM: f32 = 25.0;
const AGGRESSIVE_FROM: f32 = 50.0;
const HORROR_FROM: f32 = 75.0;

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Neutral, Tier::Cold, Tier::Aggressive, Tier::Horror];

    /// Classifies a score. Total over every `f32`: values are clamped into
    /// `[0, 100]` first and NaN counts as zero.
    pub fn classify(score: f32) -> Tier {
        let score = StressScore::new(score).value();
        if score < COLD_FROM {
            Tier::Neutral
        } else if score < AGGRESSIVE_FROM {
            Tier::Cold
        } else if score < HORROR_FROM {
            Tier::Aggressive
        } else {
            Tier::Horror
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Neutral => "neutral",
            Tier::Cold => "cold",
            Tier::Aggressive => "aggressive",
            Tier::Horror => "horror",
        }
    }

    /// Validates a tier label coming from outside the system. Anything that is
    /// not exactly one of the four labels (ignoring case and surrounding
    /// whitespace) falls back to [`Tier::Neutral`].
    pub fn from_label(label: &str) -> Tier {
        match label.parse::<Tier>() {
            Ok(tier) => tier,
            Err(UnknownTier(raw)) => {
                tracing::warn!(tier = %raw, "unknown tier label, falling back to neutral");
                Tier::Neutral
            }
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a label is not one of the closed set of tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTier(pub String);

impl fmt::Display for UnknownTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown tier `{}`", self.0)
    }
}

impl std::error::Error for UnknownTier {}

impl FromStr for Tier {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Tier::ALL
            .into_iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownTier(s.to_string()))
    }
}
