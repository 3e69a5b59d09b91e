//! Core library for the interview stress simulator.
//!
//! Attention signals (gaze centering and blink rate) are sampled at a fixed
//! cadence and folded into a bounded stress score. The score is classified
//! into an escalation tier and mapped onto three effectors: a synthesized
//! heartbeat, haptic vibration and the delivery parameters of an external
//! voice. Everything runs on one cooperative timeline driven by
//! [`InterviewSession::advance_to`].

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod haptics;
pub mod heartbeat;
pub mod mapping;
pub mod sampler;
pub mod session;
pub mod signal;
pub mod speech;
pub mod stress;
pub mod tier;
pub mod timeline;

pub use analysis::ToneAnalysis;
pub use audio::{AudioBackend, AudioSlot, BeatPhase, BufferSynth, RecordingBackend, Tone, ToneOutput};
pub use config::{AppConfig, AudioConfig, HeartbeatConfig, PendingDubPolicy, SamplerConfig, SpeechConfig, StressConfig};
pub use error::{Result, StressSimError};
pub use haptics::{HapticOutput, NullHaptics, RecordingHaptics};
pub use heartbeat::{BeatScheduleState, BeatScheduler, BeatState, CancellationToken};
pub use mapping::{
    to_bpm, to_heart_level, to_speech_delivery, to_vibration_intensity, to_voice_profile,
    voice_profile_for, EffectorFrame, SpeechDelivery, VibrationIntensity, VoiceProfile,
};
pub use sampler::{SampleTick, SignalSampler};
pub use session::{InterviewSession, TickReport};
pub use signal::{SignalFeed, SignalSample};
pub use speech::{DialogueReply, Intent, SpeechClient, SpeechRequest, SpeechResponse};
pub use stress::{StressAccumulator, StressScore, StressSnapshot};
pub use tier::Tier;
pub use timeline::{ScheduledEvent, Scheduler, SessionClock, TimerId};
