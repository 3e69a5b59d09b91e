//! Boundary with the external dialogue and text-to-speech services.
//!
//! The core never trusts labels that come back from the dialogue service:
//! tiers and intents are matched exactly against closed sets and fall back to
//! defaults otherwise.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    config::SpeechConfig,
    mapping::{to_speech_delivery, to_voice_profile, SpeechDelivery, VoiceProfile},
    Result, StressSimError, Tier,
};

/// Payload handed to the speech synthesis collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    pub tier: Tier,
    pub voice_settings: VoiceProfile,
    pub model_id: String,
}

impl SpeechRequest {
    /// Builds a request, truncating `text` to the configured number of
    /// characters.
    pub fn new(config: &SpeechConfig, tier: Tier, text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StressSimError::InvalidInput("speech text must not be empty"));
        }
        Ok(Self {
            text: text.chars().take(config.max_text_chars).collect(),
            tier,
            voice_settings: to_voice_profile(tier),
            model_id: config.model_id.clone(),
        })
    }

    /// Same as [`SpeechRequest::new`] for a raw tier label.
    pub fn for_label(config: &SpeechConfig, tier: &str, text: &str) -> Result<Self> {
        Self::new(config, Tier::from_label(tier), text)
    }

    /// Local fallback parameters for the same tier.
    pub fn fallback_delivery(&self) -> SpeechDelivery {
        to_speech_delivery(self.tier)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Whatever the speech service returned. The core does not interpret it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeechResponse {
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// External text-to-speech collaborator.
pub trait SpeechClient {
    fn synthesize(&mut self, request: &SpeechRequest) -> Result<SpeechResponse>;
}

/// What the interviewer is trying to do with the next line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    #[default]
    Followup,
    Pressure,
    TopicShift,
    Accuse,
    Wrapup,
}

impl Intent {
    pub const ALL: [Intent; 5] = [
        Intent::Followup,
        Intent::Pressure,
        Intent::TopicShift,
        Intent::Accuse,
        Intent::Wrapup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Followup => "followup",
            Intent::Pressure => "pressure",
            Intent::TopicShift => "topic_shift",
            Intent::Accuse => "accuse",
            Intent::Wrapup => "wrapup",
        }
    }

    pub fn from_label(label: &str) -> Intent {
        let trimmed = label.trim();
        Intent::ALL
            .into_iter()
            .find(|intent| intent.as_str().eq_ignore_ascii_case(trimmed))
            .unwrap_or_default()
    }
}

/// Reply from the dialogue generation service after validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DialogueReply {
    pub line: String,
    pub next_question: String,
    pub intent: Intent,
    pub tier: Tier,
    pub tts_style: String,
    pub memory_update: String,
}

impl DialogueReply {
    /// Parses a reply of any shape. Unknown keys are ignored and missing or
    /// mistyped ones get defaults; `fallback_tier` is used when the reply does
    /// not name a tier at all.
    pub fn from_json(raw: &str, fallback_tier: Tier) -> Self {
        let value = match serde_json::from_str::<Value>(raw.trim()) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "dialogue reply is not JSON, using it as plain text");
                Value::String(raw.trim().to_string())
            }
        };
        Self::from_value(&value, fallback_tier)
    }

    pub fn from_value(value: &Value, fallback_tier: Tier) -> Self {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string()
        };

        let line = match value {
            Value::String(plain) => plain.clone(),
            _ => text("sharon_line"),
        };
        let tier = value
            .get("tier")
            .and_then(Value::as_str)
            .map(Tier::from_label)
            .unwrap_or(fallback_tier);
        let intent = value
            .get("intent")
            .and_then(Value::as_str)
            .map(Intent::from_label)
            .unwrap_or_default();

        Self {
            line,
            next_question: text("next_question"),
            intent,
            tier,
            tts_style: text("tts_style"),
            memory_update: text("memory_update"),
        }
    }

    /// Text to speak: the line followed by the next question.
    pub fn spoken_text(&self) -> String {
        [self.line.as_str(), self.next_question.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_the_tier_profile() {
        let request = SpeechRequest::new(&SpeechConfig::default(), Tier::Horror, "Look at me.").unwrap();
        assert_eq!(request.voice_settings, to_voice_profile(Tier::Horror));
        assert_eq!(request.fallback_delivery().pitch, 0.4);

        let json: Value = serde_json::from_str(&request.to_json().unwrap()).unwrap();
        assert_eq!(json["tier"], "horror");
        let boost = json["voice_settings"]["similarity_boost"].as_f64().unwrap();
        assert!((boost - 0.95).abs() < 1e-6);
        assert_eq!(json["model_id"], "eleven_turbo_v2_5");
    }

    #[test]
    fn request_truncates_long_text_by_characters() {
        let config = SpeechConfig {
            max_text_chars: 5,
            ..SpeechConfig::default()
        };
        let request = SpeechRequest::new(&config, Tier::Cold, "héllo wörld").unwrap();
        assert_eq!(request.text, "héllo");
    }

    #[test]
    fn request_rejects_blank_text() {
        let err = SpeechRequest::new(&SpeechConfig::default(), Tier::Neutral, "   ").unwrap_err();
        assert!(matches!(err, StressSimError::InvalidInput(_)));
    }

    #[test]
    fn unknown_labels_fall_back_to_neutral() {
        let request = SpeechRequest::for_label(&SpeechConfig::default(), "unknown-tier", "Hi").unwrap();
        assert_eq!(request.tier, Tier::Neutral);
        assert_eq!(request.voice_settings, to_voice_profile(Tier::Neutral));
    }

    #[test]
    fn parses_well_formed_reply() {
        let raw = r#"{
            "sharon_line": "You're avoiding the question.",
            "next_question": "Why did you leave?",
            "intent": "pressure",
            "tier": "aggressive",
            "tts_style": "snappy",
            "memory_update": "dodged salary"
        }"#;
        let reply = DialogueReply::from_json(raw, Tier::Neutral);

        assert_eq!(reply.tier, Tier::Aggressive);
        assert_eq!(reply.intent, Intent::Pressure);
        assert_eq!(reply.spoken_text(), "You're avoiding the question. Why did you leave?");
    }

    #[test]
    fn tolerates_any_reply_shape() {
        let reply = DialogueReply::from_json(r#"{ "tier": "very aggressive", "intent": 7 }"#, Tier::Cold);
        assert_eq!(reply.tier, Tier::Neutral);
        assert_eq!(reply.intent, Intent::Followup);
        assert!(reply.line.is_empty());

        let reply = DialogueReply::from_json(r#"[1, 2, 3]"#, Tier::Cold);
        assert_eq!(reply.tier, Tier::Cold);

        let reply = DialogueReply::from_json("Tell me about yourself.", Tier::Horror);
        assert_eq!(reply.line, "Tell me about yourself.");
        assert_eq!(reply.tier, Tier::Horror);
    }
}
