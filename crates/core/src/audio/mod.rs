use std::{
    f32::consts::PI,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use crate::{config::ToneConfig, Result, StressSimError};

/// Level the gain envelope decays to by the end of a tone.
const ENVELOPE_FLOOR: f32 = 0.001;

/// Which half of a heartbeat a tone belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeatPhase {
    Lub,
    Dub,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub phase: BeatPhase,
    pub frequency_hz: f32,
    pub duration: Duration,
    pub gain: f32,
}

impl Tone {
    pub fn from_config(phase: BeatPhase, config: &ToneConfig) -> Self {
        Self {
            phase,
            frequency_hz: config.frequency_hz,
            duration: Duration::from_millis(config.duration_ms),
            gain: config.gain,
        }
    }
}

/// An open synthesis context.
pub trait ToneOutput: Send {
    /// Starts `tone` at session time `at`.
    fn play(&mut self, at: Duration, tone: &Tone) -> Result<()>;

    /// Releases the device. Called exactly once per opened output.
    fn close(&mut self) {}
}

/// Factory for synthesis contexts.
pub trait AudioBackend: Send {
    fn open(&mut self) -> Result<Box<dyn ToneOutput>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Detached,
    Open,
    Disabled,
}

/// Lazily opened, explicitly released audio context.
///
/// The context is opened on the first tone. If that fails the slot reports
/// [`StressSimError::ActuatorUnavailable`] once and stays silent until it is
/// released.
pub struct AudioSlot {
    backend: Box<dyn AudioBackend>,
    output: Option<Box<dyn ToneOutput>>,
    state: SlotState,
}

impl AudioSlot {
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        Self {
            backend,
            output: None,
            state: SlotState::Detached,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == SlotState::Open
    }

    pub fn is_disabled(&self) -> bool {
        self.state == SlotState::Disabled
    }

    /// Plays a tone. Returns `Ok(true)` when it was sounded and `Ok(false)`
    /// when output is disabled after an earlier failure.
    pub fn play(&mut self, at: Duration, tone: &Tone) -> Result<bool> {
        if self.state == SlotState::Disabled {
            return Ok(false);
        }

        let result = match self.acquire() {
            Ok(output) => output.play(at, tone),
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => Ok(true),
            Err(err) => {
                self.close_output();
                self.state = SlotState::Disabled;
                tracing::warn!(error = %err, "audio output disabled");
                Err(match err {
                    unavailable @ StressSimError::ActuatorUnavailable(_) => unavailable,
                    other => StressSimError::ActuatorUnavailable(other.to_string()),
                })
            }
        }
    }

    /// Closes the context if one is open and re-arms the slot.
    pub fn release(&mut self) {
        self.close_output();
        self.state = SlotState::Detached;
    }

    fn acquire(&mut self) -> Result<&mut Box<dyn ToneOutput>> {
        if self.output.is_none() {
            let output = self.backend.open()?;
            tracing::debug!("audio context opened");
            self.output = Some(output);
            self.state = SlotState::Open;
        }
        self.output
            .as_mut()
            .ok_or_else(|| StressSimError::msg("audio context missing after open"))
    }

    fn close_output(&mut self) {
        if let Some(mut output) = self.output.take() {
            output.close();
            tracing::debug!("audio context closed");
        }
    }
}

impl Drop for AudioSlot {
    fn drop(&mut self) {
        self.close_output();
    }
}

impl std::fmt::Debug for AudioSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSlot")
            .field("state", &self.state)
            .finish()
    }
}

/// Offline synthesis backend that renders every tone into a shared PCM
/// buffer.
#[derive(Debug, Clone)]
pub struct BufferSynth {
    sample_rate: u32,
    buffer: Arc<Mutex<Vec<f32>>>,
}

impl BufferSynth {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Copy of everything rendered so far.
    pub fn samples(&self) -> Result<Vec<f32>> {
        Ok(lock_buffer(&self.buffer)?.clone())
    }
}

impl AudioBackend for BufferSynth {
    fn open(&mut self) -> Result<Box<dyn ToneOutput>> {
        Ok(Box::new(BufferOutput {
            sample_rate: self.sample_rate,
            buffer: self.buffer.clone(),
        }))
    }
}

struct BufferOutput {
    sample_rate: u32,
    buffer: Arc<Mutex<Vec<f32>>>,
}

impl ToneOutput for BufferOutput {
    fn play(&mut self, at: Duration, tone: &Tone) -> Result<()> {
        let rendered = render_tone(tone, self.sample_rate);
        let start = (at.as_secs_f64() * f64::from(self.sample_rate)).round() as usize;

        let mut buffer = lock_buffer(&self.buffer)?;
        if buffer.len() < start + rendered.len() {
            buffer.resize(start + rendered.len(), 0.0);
        }
        for (slot, sample) in buffer[start..].iter_mut().zip(rendered) {
            *slot += sample;
        }
        Ok(())
    }
}

fn lock_buffer(buffer: &Mutex<Vec<f32>>) -> Result<MutexGuard<'_, Vec<f32>>> {
    buffer
        .lock()
        .map_err(|_| StressSimError::msg("synthesis buffer has been poisoned"))
}

/// Renders a sine tone whose gain falls exponentially from `tone.gain` to
/// [`ENVELOPE_FLOOR`] over the tone's duration.
pub fn render_tone(tone: &Tone, sample_rate: u32) -> Vec<f32> {
    let sample_rate = sample_rate.max(1) as f32;
    let len = (tone.duration.as_secs_f32() * sample_rate).round() as usize;
    let gain = tone.gain.clamp(ENVELOPE_FLOOR, 1.0);
    let ratio = ENVELOPE_FLOOR / gain;

    (0..len)
        .map(|index| {
            let t = index as f32 / sample_rate;
            let progress = index as f32 / len as f32;
            let envelope = gain * ratio.powf(progress);
            envelope * (2.0 * PI * tone.frequency_hz * t).sin()
        })
        .collect()
}

/// A tone that reached an output, with the session time it started at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneEvent {
    pub at: Duration,
    pub tone: Tone,
}

#[derive(Debug, Default)]
struct Recording {
    events: Vec<ToneEvent>,
    opened: usize,
    closed: usize,
}

/// Backend that only records what it was asked to play. Useful for dry runs
/// and for asserting on timing.
#[derive(Debug, Clone)]
pub struct RecordingBackend {
    available: bool,
    recording: Arc<Mutex<Recording>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            available: true,
            recording: Arc::new(Mutex::new(Recording::default())),
        }
    }

    /// A backend whose device can never be opened.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn events(&self) -> Vec<ToneEvent> {
        self.with_recording(|recording| recording.events.clone())
    }

    pub fn phase_times(&self, phase: BeatPhase) -> Vec<Duration> {
        self.with_recording(|recording| {
            recording
                .events
                .iter()
                .filter(|event| event.tone.phase == phase)
                .map(|event| event.at)
                .collect()
        })
    }

    pub fn opened(&self) -> usize {
        self.with_recording(|recording| recording.opened)
    }

    pub fn closed(&self) -> usize {
        self.with_recording(|recording| recording.closed)
    }

    fn with_recording<R>(&self, read: impl FnOnce(&Recording) -> R) -> R {
        let guard = self
            .recording
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        read(&guard)
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for RecordingBackend {
    fn open(&mut self) -> Result<Box<dyn ToneOutput>> {
        if !self.available {
            return Err(StressSimError::ActuatorUnavailable(
                "no audio device".to_string(),
            ));
        }
        let mut recording = self
            .recording
            .lock()
            .map_err(|_| StressSimError::msg("recording has been poisoned"))?;
        recording.opened += 1;
        Ok(Box::new(RecordingOutput {
            recording: self.recording.clone(),
        }))
    }
}

struct RecordingOutput {
    recording: Arc<Mutex<Recording>>,
}

impl ToneOutput for RecordingOutput {
    fn play(&mut self, at: Duration, tone: &Tone) -> Result<()> {
        let mut recording = self
            .recording
            .lock()
            .map_err(|_| StressSimError::msg("recording has been poisoned"))?;
        recording.events.push(ToneEvent { at, tone: *tone });
        Ok(())
    }

    fn close(&mut self) {
        if let Ok(mut recording) = self.recording.lock() {
            recording.closed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeartbeatConfig;

    fn lub() -> Tone {
        Tone::from_config(BeatPhase::Lub, &HeartbeatConfig::default().lub)
    }

    #[test]
    fn opens_lazily_and_closes_on_release() {
        let backend = RecordingBackend::new();
        let mut slot = AudioSlot::new(Box::new(backend.clone()));
        assert_eq!(backend.opened(), 0);

        assert!(slot.play(Duration::ZERO, &lub()).unwrap());
        assert!(slot.play(Duration::from_millis(10), &lub()).unwrap());
        assert_eq!(backend.opened(), 1);
        assert!(slot.is_open());

        slot.release();
        assert_eq!(backend.closed(), 1);
        assert_eq!(backend.events().len(), 2);
    }

    #[test]
    fn closes_on_drop() {
        let backend = RecordingBackend::new();
        {
            let mut slot = AudioSlot::new(Box::new(backend.clone()));
            slot.play(Duration::ZERO, &lub()).unwrap();
        }
        assert_eq!(backend.closed(), 1);
    }

    #[test]
    fn reports_unavailable_device_once() {
        let mut slot = AudioSlot::new(Box::new(RecordingBackend::unavailable()));

        let err = slot.play(Duration::ZERO, &lub()).unwrap_err();
        assert!(err.is_recoverable());
        assert!(slot.is_disabled());

        assert!(!slot.play(Duration::from_secs(1), &lub()).unwrap());
        assert!(!slot.play(Duration::from_secs(2), &lub()).unwrap());
    }

    #[test]
    fn renders_decaying_tone() {
        let samples = render_tone(&lub(), 8_000);
        assert_eq!(samples.len(), 1_200);

        let head: f32 = samples[..200].iter().map(|s| s.abs()).fold(0.0, f32::max);
        let tail: f32 = samples[1_000..].iter().map(|s| s.abs()).fold(0.0, f32::max);
        assert!(head <= 0.9 + f32::EPSILON);
        assert!(head > 0.3);
        assert!(tail < 0.01);
    }

    #[test]
    fn buffer_synth_places_tones_on_the_timeline() {
        let synth = BufferSynth::new(1_000);
        let mut slot = AudioSlot::new(Box::new(synth.clone()));

        slot.play(Duration::from_millis(500), &lub()).unwrap();
        let samples = synth.samples().unwrap();

        assert_eq!(samples.len(), 650);
        assert!(samples[..500].iter().all(|s| *s == 0.0));
        assert!(samples[500..].iter().any(|s| s.abs() > 0.1));
    }
}
