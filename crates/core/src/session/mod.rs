//! One interview session: a single owner for the sampler, the stress score
//! and every effector, with an explicit start/advance/end lifecycle.

use std::time::Duration;

use crate::{
    audio::{AudioBackend, AudioSlot},
    config::AppConfig,
    haptics::HapticOutput,
    heartbeat::BeatScheduler,
    mapping::EffectorFrame,
    sampler::{SampleTick, SignalSampler},
    speech::{SpeechClient, SpeechRequest, SpeechResponse},
    Result, SignalFeed, SignalSample, StressAccumulator, StressSimError, StressSnapshot,
    VibrationIntensity,
};

/// What happened during one call to [`InterviewSession::advance_to`].
#[derive(Debug, Default)]
pub struct TickReport {
    pub ticks_applied: usize,
    pub ticks_skipped: usize,
    pub lubs: usize,
    pub dubs: usize,
    /// A recoverable actuator failure, reported once per attachment.
    pub fault: Option<StressSimError>,
}

pub struct InterviewSession {
    config: AppConfig,
    accumulator: StressAccumulator,
    sampler: SignalSampler,
    heartbeat: BeatScheduler,
    audio: AudioSlot,
    haptics: Box<dyn HapticOutput>,
    haptics_disabled: bool,
    last_vibration: Option<VibrationIntensity>,
    last_heart_level: Option<u8>,
    running: bool,
}

impl InterviewSession {
    pub fn new(
        config: AppConfig,
        audio: Box<dyn AudioBackend>,
        haptics: Box<dyn HapticOutput>,
    ) -> Self {
        let sampler = SignalSampler::new(config.sampler.period(), SignalFeed::new());
        Self {
            accumulator: StressAccumulator::new(config.stress.clone()),
            heartbeat: BeatScheduler::new(config.heartbeat.clone()),
            sampler,
            audio: AudioSlot::new(audio),
            haptics,
            haptics_disabled: false,
            last_vibration: None,
            last_heart_level: None,
            running: false,
            config,
        }
    }

    /// Handle for the signal producer. Publishing through it is the sampling
    /// entry point.
    pub fn signal_feed(&self) -> SignalFeed {
        self.sampler.feed().clone()
    }

    pub fn publish(&self, sample: SignalSample) {
        self.sampler.feed().publish(sample);
    }

    pub fn snapshot(&self) -> StressSnapshot {
        self.accumulator.snapshot()
    }

    pub fn effectors(&self) -> EffectorFrame {
        EffectorFrame::from_snapshot(&self.snapshot())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn heartbeat(&self) -> &BeatScheduler {
        &self.heartbeat
    }

    /// Starts sampling and the heartbeat at `now`. Calling it on a running
    /// session changes nothing.
    pub fn start(&mut self, now: Duration) {
        if self.running {
            return;
        }
        self.running = true;
        self.sampler.start(now);
        self.heartbeat.set_bpm(self.effectors().bpm);
        self.heartbeat.start(now);
        tracing::info!(stress = self.snapshot().stress.value(), "interview session started");
    }

    /// Runs every timer due at or before `now` in chronological order.
    pub fn advance_to(&mut self, now: Duration) -> TickReport {
        let mut report = TickReport::default();

        loop {
            let sampler_due = self.sampler.next_due().filter(|due| *due <= now);
            let beat_due = self.heartbeat.next_due().filter(|due| *due <= now);

            match (sampler_due, beat_due) {
                (None, None) => break,
                (Some(sample_at), Some(beat_at)) if beat_at < sample_at => {
                    self.run_beats(beat_at, &mut report)
                }
                (Some(sample_at), _) => self.run_sampler(sample_at, &mut report),
                (None, Some(beat_at)) => self.run_beats(beat_at, &mut report),
            }
        }

        if !self.running && self.heartbeat.next_due().is_none() {
            self.audio.release();
        }
        report
    }

    /// Ends the session. Timers are cancelled and the score goes back to the
    /// baseline; an armed dub may still sound on the next advance, after
    /// which the audio context is released.
    pub fn end(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.sampler.stop();
        self.heartbeat.stop();
        self.accumulator.reset();
        self.last_vibration = None;
        self.last_heart_level = None;
        if self.heartbeat.next_due().is_none() {
            self.audio.release();
        }
        tracing::info!("interview session ended");
    }

    /// Detaches the heartbeat effector right away: no tone of any kind sounds
    /// afterwards and the audio context is closed. Stress keeps updating.
    pub fn detach_heartbeat(&mut self) {
        self.heartbeat.stop();
        self.heartbeat.clear_pending();
        self.audio.release();
    }

    /// Re-attaches the heartbeat at the rate of the current score, with a lub
    /// at `now`. Does nothing on a stopped session or an attached heartbeat.
    pub fn attach_heartbeat(&mut self, now: Duration) {
        if !self.running {
            return;
        }
        self.heartbeat.set_bpm(self.effectors().bpm);
        self.heartbeat.start(now);
    }

    /// Builds the speech request for the current tier.
    pub fn speech_request(&self, text: &str) -> Result<SpeechRequest> {
        SpeechRequest::new(&self.config.speech, self.snapshot().tier, text)
    }

    /// Sends `text` to the speech collaborator with the current tier's voice.
    pub fn speak(&self, client: &mut dyn SpeechClient, text: &str) -> Result<SpeechResponse> {
        let request = self.speech_request(text)?;
        client.synthesize(&request)
    }

    fn run_sampler(&mut self, at: Duration, report: &mut TickReport) {
        match self.sampler.tick(at, &mut self.accumulator) {
            Some(SampleTick::Applied(snapshot)) => {
                report.ticks_applied += 1;
                self.push_effectors(&snapshot, report);
            }
            Some(SampleTick::Skipped) => report.ticks_skipped += 1,
            None => {}
        }
    }

    fn run_beats(&mut self, at: Duration, report: &mut TickReport) {
        let beats = self.heartbeat.poll(at, &mut self.audio);
        report.lubs += beats.cycles;
        report.dubs += beats.dubs;
        if let Some(fault) = beats.fault {
            report.fault.get_or_insert(fault);
        }
    }

    fn push_effectors(&mut self, snapshot: &StressSnapshot, report: &mut TickReport) {
        let frame = EffectorFrame::from_snapshot(snapshot);
        self.heartbeat.set_bpm(frame.bpm);

        if self.haptics_disabled {
            return;
        }
        let mut pushed = Ok(());
        if self.last_vibration != Some(frame.vibration) {
            self.last_vibration = Some(frame.vibration);
            pushed = self.haptics.set_intensity(frame.vibration);
        }
        if pushed.is_ok() && self.last_heart_level != Some(frame.heart_level) {
            self.last_heart_level = Some(frame.heart_level);
            pushed = self.haptics.set_heart_level(frame.heart_level);
        }
        if let Err(err) = pushed {
            tracing::warn!(error = %err, "haptic output disabled");
            self.haptics_disabled = true;
            report
                .fault
                .get_or_insert(StressSimError::ActuatorUnavailable(err.to_string()));
        }
    }
}

impl std::fmt::Debug for InterviewSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterviewSession")
            .field("running", &self.running)
            .field("snapshot", &self.snapshot())
            .field("heartbeat", &self.heartbeat.state())
            .field("audio", &self.audio)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{BeatPhase, RecordingBackend},
        haptics::{NullHaptics, RecordingHaptics},
        heartbeat::BeatState,
        StressScore, Tier,
    };

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn session(backend: &RecordingBackend, haptics: &RecordingHaptics) -> InterviewSession {
        InterviewSession::new(
            AppConfig::default(),
            Box::new(backend.clone()),
            Box::new(haptics.clone()),
        )
    }

    #[test]
    fn stress_builds_and_drives_every_effector() {
        let backend = RecordingBackend::new();
        let haptics = RecordingHaptics::new();
        let mut session = session(&backend, &haptics);

        session.publish(SignalSample::new(0.0, 40.0));
        session.start(ms(0));
        let report = session.advance_to(ms(2_000));

        assert_eq!(report.ticks_applied, 10);
        assert_eq!(session.snapshot().stress, StressScore::new(50.0));
        assert_eq!(session.snapshot().tier, Tier::Aggressive);
        assert_eq!(session.heartbeat().target_bpm(), 95.0);
        assert_eq!(haptics.intensities().last().map(|v| v.value()), Some(100));
        assert_eq!(haptics.heart_levels().last(), Some(&4));
        assert!(report.lubs >= 1);
        assert!(report.fault.is_none());
    }

    #[test]
    fn missing_signal_leaves_stress_alone() {
        let backend = RecordingBackend::new();
        let haptics = RecordingHaptics::new();
        let mut session = session(&backend, &haptics);

        session.start(ms(0));
        let report = session.advance_to(ms(600));

        assert_eq!(report.ticks_skipped, 3);
        assert_eq!(report.ticks_applied, 0);
        assert_eq!(session.snapshot().stress, StressScore::ZERO);
        assert!(haptics.intensities().is_empty());
    }

    #[test]
    fn heartbeat_starts_at_resting_rate() {
        let backend = RecordingBackend::new();
        let mut session = InterviewSession::new(
            AppConfig::default(),
            Box::new(backend.clone()),
            Box::new(NullHaptics),
        );

        session.start(ms(0));
        session.advance_to(ms(1_300));

        // 50 BPM: 1.2 s between lubs.
        assert_eq!(backend.phase_times(BeatPhase::Lub), vec![ms(0), ms(1_200)]);
        assert_eq!(backend.phase_times(BeatPhase::Dub), vec![ms(420)]);
    }

    #[test]
    fn end_cancels_timers_and_releases_audio() {
        let backend = RecordingBackend::new();
        let haptics = RecordingHaptics::new();
        let mut session = session(&backend, &haptics);
        session.publish(SignalSample::new(0.0, 40.0));
        session.start(ms(0));
        session.advance_to(ms(1_000));

        session.end();
        assert_eq!(session.snapshot().stress, StressScore::ZERO);

        // The dub armed at 0 already sounded; nothing is pending.
        let report = session.advance_to(ms(5_000));
        assert_eq!(report.ticks_applied + report.ticks_skipped, 0);
        assert_eq!(report.lubs, 0);
        assert_eq!(backend.opened(), 1);
        assert_eq!(backend.closed(), 1);
    }

    #[test]
    fn armed_dub_outlives_end_then_audio_is_released() {
        let backend = RecordingBackend::new();
        let mut session = InterviewSession::new(
            AppConfig::default(),
            Box::new(backend.clone()),
            Box::new(NullHaptics),
        );
        session.start(ms(0));
        session.advance_to(ms(100));

        session.end();
        assert_eq!(backend.closed(), 0);

        let report = session.advance_to(ms(3_000));
        assert_eq!(report.dubs, 1);
        assert_eq!(report.lubs, 0);
        assert_eq!(backend.closed(), 1);
    }

    #[test]
    fn detaching_the_heartbeat_silences_it_immediately() {
        let backend = RecordingBackend::new();
        let mut session = InterviewSession::new(
            AppConfig::default(),
            Box::new(backend.clone()),
            Box::new(NullHaptics),
        );
        session.start(ms(0));
        session.advance_to(ms(100));

        session.detach_heartbeat();
        assert_eq!(backend.closed(), 1);

        session.advance_to(ms(3_000));
        assert_eq!(backend.events().len(), 1);
        assert_eq!(backend.opened(), 1);
    }

    #[test]
    fn reattached_heartbeat_follows_the_current_score() {
        let backend = RecordingBackend::new();
        let haptics = RecordingHaptics::new();
        let mut session = session(&backend, &haptics);
        session.publish(SignalSample::new(0.0, 40.0));
        session.start(ms(0));
        session.advance_to(ms(100));

        session.detach_heartbeat();
        session.advance_to(ms(2_000));
        assert_eq!(backend.phase_times(BeatPhase::Lub), vec![ms(0)]);
        assert_eq!(session.snapshot().stress, StressScore::new(50.0));

        session.attach_heartbeat(ms(2_000));
        session.attach_heartbeat(ms(2_000));
        session.advance_to(ms(2_000));
        assert_eq!(backend.phase_times(BeatPhase::Lub), vec![ms(0), ms(2_000)]);
        assert_eq!(session.heartbeat().state().current_bpm, 95.0);
        assert_eq!(backend.opened(), 2);

        session.end();
        session.attach_heartbeat(ms(3_000));
        assert_eq!(session.heartbeat().phase(), BeatState::Idle);
    }

    #[test]
    fn restarting_does_not_duplicate_timers() {
        let backend = RecordingBackend::new();
        let haptics = RecordingHaptics::new();
        let mut session = session(&backend, &haptics);
        session.publish(SignalSample::new(0.1, 15.0));

        session.start(ms(0));
        session.start(ms(0));
        let report = session.advance_to(ms(1_000));
        assert_eq!(report.ticks_applied, 5);

        session.end();
        session.start(ms(2_000));
        let report = session.advance_to(ms(3_000));
        assert_eq!(report.ticks_applied, 5);
        assert_eq!(session.snapshot().stress, StressScore::new(10.0));
    }

    #[test]
    fn unavailable_audio_does_not_stop_stress() {
        let haptics = RecordingHaptics::new();
        let mut session = InterviewSession::new(
            AppConfig::default(),
            Box::new(RecordingBackend::unavailable()),
            Box::new(haptics.clone()),
        );
        session.publish(SignalSample::new(0.0, 15.0));
        session.start(ms(0));

        let first = session.advance_to(ms(400));
        assert!(first.fault.map(|err| err.is_recoverable()).unwrap_or(false));

        let second = session.advance_to(ms(4_000));
        assert!(second.fault.is_none());
        assert_eq!(session.snapshot().stress, StressScore::new(40.0));
    }

    #[test]
    fn failing_haptics_are_reported_once() {
        struct Broken;
        impl HapticOutput for Broken {
            fn set_intensity(&mut self, _intensity: VibrationIntensity) -> Result<()> {
                Err(StressSimError::msg("serial port closed"))
            }
        }

        let mut session = InterviewSession::new(
            AppConfig::default(),
            Box::new(RecordingBackend::new()),
            Box::new(Broken),
        );
        session.publish(SignalSample::new(0.0, 40.0));
        session.start(ms(0));

        let first = session.advance_to(ms(200));
        assert!(matches!(first.fault, Some(StressSimError::ActuatorUnavailable(_))));
        let second = session.advance_to(ms(1_000));
        assert!(second.fault.is_none());
        assert_eq!(session.snapshot().stress, StressScore::new(25.0));
    }

    #[test]
    fn speech_follows_the_current_tier() {
        struct Echo(Vec<SpeechRequest>);
        impl SpeechClient for Echo {
            fn synthesize(&mut self, request: &SpeechRequest) -> Result<SpeechResponse> {
                self.0.push(request.clone());
                Ok(SpeechResponse {
                    content_type: Some("audio/mpeg".to_string()),
                    body: vec![0xff, 0xfb],
                })
            }
        }

        let mut session = InterviewSession::new(
            AppConfig::default(),
            Box::new(RecordingBackend::new()),
            Box::new(NullHaptics),
        );
        session.publish(SignalSample::new(0.0, 40.0));
        session.start(ms(0));
        session.advance_to(ms(3_000));

        let mut client = Echo(Vec::new());
        let response = session.speak(&mut client, "Look at me when you speak.").unwrap();

        assert_eq!(response.body.len(), 2);
        assert_eq!(client.0[0].tier, Tier::Horror);
    }
}
