use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};
use interview_stress_core::{
    AppConfig, BufferSynth, EffectorFrame, HapticOutput, InterviewSession, SessionClock,
    SignalSample, SpeechRequest, StressScore, StressSnapshot, ToneAnalysis, VibrationIntensity,
};
use tracing_subscriber::EnvFilter;

const STEP: Duration = Duration::from_millis(50);
const SIGNAL_PERIOD: Duration = Duration::from_secs(1);

fn main() -> interview_stress_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::live_defaults(),
    };

    match cli.command {
        Commands::Simulate {
            seconds,
            seed,
            realtime,
        } => run_simulation(config, seconds, seed, realtime),
        Commands::Classify { score } => run_classify(score),
        Commands::Voice { tier, text } => run_voice(&config, &tier, &text.join(" ")),
    }
}

fn run_simulation(
    config: AppConfig,
    seconds: u64,
    seed: u64,
    realtime: bool,
) -> interview_stress_core::Result<()> {
    tracing::info!(seconds, seed, realtime, "starting simulated interview");

    let synth = BufferSynth::new(config.audio.sample_rate);
    let mut session = InterviewSession::new(config, Box::new(synth.clone()), Box::new(LogHaptics));
    let mut signals = SyntheticSignals::new(seed);
    let mut clock = SessionClock::new();
    let end = Duration::from_secs(seconds);
    let mut next_signal = Duration::ZERO;

    session.start(clock.now());
    while clock.now() < end {
        if clock.now() >= next_signal {
            session.publish(signals.next_sample());
            next_signal += SIGNAL_PERIOD;
            log_snapshot(clock.now(), &session.snapshot());
        }

        let report = session.advance_to(clock.now());
        if let Some(fault) = report.fault {
            tracing::warn!(error = %fault, "effector unavailable, continuing without it");
        }

        if realtime {
            std::thread::sleep(STEP);
        }
        clock.advance(STEP);
    }

    let final_frame = session.effectors();
    session.end();
    // Let an armed dub finish so the audio context is released.
    session.advance_to(clock.advance(Duration::from_secs(1)));

    let samples = synth.samples()?;
    let analysis = ToneAnalysis::of(&samples, synth.sample_rate())?;
    let summary = serde_json::json!({
        "final": final_frame,
        "heartbeat_audio": analysis,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_classify(score: f32) -> interview_stress_core::Result<()> {
    let frame = EffectorFrame::from_snapshot(&StressSnapshot::of(StressScore::new(score)));
    println!("{}", serde_json::to_string_pretty(&frame)?);
    Ok(())
}

fn run_voice(config: &AppConfig, tier: &str, text: &str) -> interview_stress_core::Result<()> {
    let request = SpeechRequest::for_label(&config.speech, tier, text)?;
    println!("{}", request.to_json()?);
    Ok(())
}

fn log_snapshot(now: Duration, snapshot: &StressSnapshot) {
    let frame = EffectorFrame::from_snapshot(snapshot);
    tracing::info!(
        t = now.as_secs(),
        stress = frame.stress,
        tier = %frame.tier,
        bpm = frame.bpm,
        vibration = frame.vibration.value(),
        "snapshot"
    );
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

/// Haptic output that only logs what it would drive.
struct LogHaptics;

impl HapticOutput for LogHaptics {
    fn set_intensity(&mut self, intensity: VibrationIntensity) -> interview_stress_core::Result<()> {
        tracing::debug!(intensity = intensity.value(), "vibration");
        Ok(())
    }

    fn set_heart_level(&mut self, level: u8) -> interview_stress_core::Result<()> {
        tracing::debug!(level, "heart display");
        Ok(())
    }
}

/// Deterministic stand-in for the camera pipeline: looks at the interviewer
/// about 70% of the time and blinks 15 to 35 times a minute.
struct SyntheticSignals {
    state: u64,
}

impl SyntheticSignals {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_unit(&mut self) -> f32 {
        self.state = self.state.wrapping_mul(1103515245).wrapping_add(12345);
        ((self.state >> 16) & 0x7FFF) as f32 / 32767.0
    }

    fn next_sample(&mut self) -> SignalSample {
        let looking_center = self.next_unit() > 0.3;
        let gaze_score = if looking_center {
            0.7 + 0.3 * self.next_unit()
        } else {
            0.4 * self.next_unit()
        };
        let blink_rate = 15.0 + 20.0 * self.next_unit();
        SignalSample::new(gaze_score, blink_rate)
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Interview stress simulator", long_about = None)]
struct Cli {
    /// JSON configuration file. Missing fields use the defaults.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a session against synthetic gaze and blink signals.
    Simulate {
        /// Length of the simulated interview.
        #[arg(short, long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
        seconds: u64,
        /// Seed for the synthetic signal generator.
        #[arg(long, default_value_t = 7)]
        seed: u64,
        /// Pace the simulation against the wall clock.
        #[arg(long)]
        realtime: bool,
    },
    /// Print the tier and effector outputs for a stress score.
    Classify {
        #[arg(allow_negative_numbers = true)]
        score: f32,
    },
    /// Print the speech request for a tier and a line of text.
    Voice {
        /// Tier label; unknown labels use the neutral voice.
        #[arg(short, long, default_value = "neutral")]
        tier: String,
        #[arg(required = true)]
        text: Vec<String>,
    },
}
