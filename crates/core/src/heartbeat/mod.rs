//! Self-rescheduling lub-dub heartbeat.
//!
//! Every cycle samples the target BPM once, sounds the lub immediately, arms
//! the dub at a fixed fraction of the beat interval and schedules the next
//! cycle one interval later. A tempo change therefore lands on the next beat,
//! never inside the current one.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use crate::{
    audio::{AudioSlot, BeatPhase, Tone},
    config::{HeartbeatConfig, PendingDubPolicy},
    timeline::Scheduler,
    StressSimError,
};

/// Hard limits on the rate the loop will ever run at, whatever the
/// configuration says.
pub const MIN_BPM: f32 = 30.0;
pub const MAX_BPM: f32 = 140.0;

/// Shared cancellation flag checked at the start of every cycle.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeatState {
    Idle,
    Scheduled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatScheduleState {
    /// BPM sampled by the most recent cycle.
    pub current_bpm: f32,
    pub next_fire: Option<Duration>,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BeatTask {
    Cycle,
    Dub,
}

/// What a call to [`BeatScheduler::poll`] did.
#[derive(Debug, Default)]
pub struct BeatPoll {
    pub cycles: usize,
    pub dubs: usize,
    /// Set the one time the audio output turned out to be unavailable.
    pub fault: Option<StressSimError>,
}

#[derive(Debug)]
pub struct BeatScheduler {
    config: HeartbeatConfig,
    target_bpm: f32,
    state: BeatScheduleState,
    timers: Scheduler<BeatTask>,
    token: CancellationToken,
}

impl BeatScheduler {
    pub fn new(config: HeartbeatConfig) -> Self {
        let (resting, _) = bpm_bounds(&config);
        Self {
            config,
            target_bpm: resting,
            state: BeatScheduleState {
                current_bpm: resting,
                next_fire: None,
                active: false,
            },
            timers: Scheduler::new(),
            token: CancellationToken::new(),
        }
    }

    /// Sets the BPM the next cycle will use.
    pub fn set_bpm(&mut self, bpm: f32) {
        self.target_bpm = bpm;
    }

    pub fn target_bpm(&self) -> f32 {
        self.target_bpm
    }

    pub fn state(&self) -> BeatScheduleState {
        self.state
    }

    pub fn phase(&self) -> BeatState {
        if self.state.active {
            BeatState::Scheduled
        } else {
            BeatState::Idle
        }
    }

    /// Token for the running loop. Cancelling it has the same effect on future
    /// cycles as [`BeatScheduler::stop`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Starts the loop with a lub at `now`. Starting a running loop is a no-op.
    pub fn start(&mut self, now: Duration) {
        if self.state.active && !self.token.is_cancelled() {
            return;
        }
        // A dub armed before a token cancel must not come back with the new token.
        let retract =
            self.token.is_cancelled() && self.config.pending_dub == PendingDubPolicy::Retract;
        self.timers.retain(|event| event.task == BeatTask::Dub && !retract);
        self.token = CancellationToken::new();
        self.timers.schedule_at(now, BeatTask::Cycle);
        self.state.active = true;
        self.state.next_fire = Some(now);
        tracing::info!(bpm = self.target_bpm, "heartbeat started");
    }

    /// Cancels the loop. No cycle fires after this call; an already armed dub
    /// fires or is retracted according to [`PendingDubPolicy`].
    pub fn stop(&mut self) {
        self.token.cancel();
        let policy = self.config.pending_dub;
        self.timers.retain(|event| match event.task {
            BeatTask::Cycle => false,
            BeatTask::Dub => policy == PendingDubPolicy::FireArmed,
        });
        if self.state.active {
            tracing::info!("heartbeat stopped");
        }
        self.state.active = false;
        self.state.next_fire = None;
    }

    /// Drops every pending timer, armed dubs included.
    pub fn clear_pending(&mut self) {
        self.timers.clear();
    }

    pub fn next_due(&self) -> Option<Duration> {
        self.timers.next_due()
    }

    /// Runs every timer due at or before `now`, in order.
    pub fn poll(&mut self, now: Duration, audio: &mut AudioSlot) -> BeatPoll {
        let mut report = BeatPoll::default();
        while let Some(event) = self.timers.pop_due(now) {
            let sounded = match event.task {
                BeatTask::Cycle => self.run_cycle(event.due, audio, &mut report),
                BeatTask::Dub => self.run_dub(event.due, audio, &mut report),
            };
            if let Err(err) = sounded {
                report.fault.get_or_insert(err);
            }
        }
        report
    }

    fn run_cycle(
        &mut self,
        due: Duration,
        audio: &mut AudioSlot,
        report: &mut BeatPoll,
    ) -> crate::Result<()> {
        if self.token.is_cancelled() {
            self.state.active = false;
            self.state.next_fire = None;
            return Ok(());
        }

        let bpm = self.consumable_bpm();
        let interval = beat_interval(bpm);
        let dub_offset = scale(interval, self.config.dub_fraction);

        self.state.current_bpm = bpm;
        self.state.next_fire = Some(due + interval);
        self.timers.schedule_at(due + dub_offset, BeatTask::Dub);
        self.timers.schedule_at(due + interval, BeatTask::Cycle);
        report.cycles += 1;
        tracing::debug!(bpm, at_ms = due.as_millis() as u64, "lub");

        audio
            .play(due, &Tone::from_config(BeatPhase::Lub, &self.config.lub))
            .map(|_| ())
    }

    fn run_dub(
        &mut self,
        due: Duration,
        audio: &mut AudioSlot,
        report: &mut BeatPoll,
    ) -> crate::Result<()> {
        if self.token.is_cancelled() && self.config.pending_dub == PendingDubPolicy::Retract {
            return Ok(());
        }
        report.dubs += 1;
        audio
            .play(due, &Tone::from_config(BeatPhase::Dub, &self.config.dub))
            .map(|_| ())
    }

    /// Target BPM clamped again at the point of use.
    fn consumable_bpm(&self) -> f32 {
        let (min, max) = bpm_bounds(&self.config);
        if self.target_bpm.is_nan() {
            return min;
        }
        self.target_bpm.clamp(min, max)
    }
}

/// Configured BPM range intersected with [`MIN_BPM`, `MAX_BPM`]. Always
/// finite, positive and ordered.
fn bpm_bounds(config: &HeartbeatConfig) -> (f32, f32) {
    let min = if config.min_bpm.is_finite() {
        config.min_bpm.clamp(MIN_BPM, MAX_BPM)
    } else {
        MIN_BPM
    };
    let max = if config.max_bpm.is_finite() {
        config.max_bpm.clamp(min, MAX_BPM)
    } else {
        MAX_BPM
    };
    (min, max)
}

/// Length of one beat, rounded to the microsecond.
pub fn beat_interval(bpm: f32) -> Duration {
    Duration::from_micros((60_000_000.0 / f64::from(bpm)).round() as u64)
}

fn scale(interval: Duration, fraction: f32) -> Duration {
    let micros = interval.as_micros() as f64 * f64::from(fraction.clamp(0.0, 1.0));
    Duration::from_micros(micros.round() as u64)
}
