use std::time::Duration;

use crate::{SignalFeed, StressAccumulator, StressSnapshot};

/// Outcome of one sampler tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleTick {
    Applied(StressSnapshot),
    /// No signal was available; the score was left alone.
    Skipped,
}

/// Fixed-period driver that feeds the latest signal sample into the stress
/// accumulator.
///
/// Only the value present at tick time is seen. A spike that is published and
/// overwritten between two ticks never reaches the accumulator.
#[derive(Debug)]
pub struct SignalSampler {
    period: Duration,
    feed: SignalFeed,
    next_tick: Option<Duration>,
}

impl SignalSampler {
    pub fn new(period: Duration, feed: SignalFeed) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
            feed,
            next_tick: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn feed(&self) -> &SignalFeed {
        &self.feed
    }

    pub fn is_running(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Schedules the first tick one period after `now`. Restarting a running
    /// sampler keeps its current schedule.
    pub fn start(&mut self, now: Duration) {
        if self.next_tick.is_none() {
            self.next_tick = Some(now + self.period);
        }
    }

    pub fn stop(&mut self) {
        self.next_tick = None;
    }

    pub fn next_due(&self) -> Option<Duration> {
        self.next_tick
    }

    /// Runs the tick due at or before `now`, if any, and schedules the next
    /// one. Returns `None` when nothing was due.
    pub fn tick(&mut self, now: Duration, accumulator: &mut StressAccumulator) -> Option<SampleTick> {
        let due = self.next_tick.filter(|due| *due <= now)?;
        self.next_tick = Some(due + self.period);

        let outcome = match self.feed.latest() {
            Some(sample) => SampleTick::Applied(accumulator.apply(&sample)),
            None => SampleTick::Skipped,
        };
        tracing::debug!(at_ms = due.as_millis() as u64, ?outcome, "sampler tick");
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::StressConfig, SignalSample, StressScore};

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn setup() -> (SignalSampler, SignalFeed, StressAccumulator) {
        let feed = SignalFeed::new();
        let sampler = SignalSampler::new(ms(200), feed.clone());
        let accumulator = StressAccumulator::new(StressConfig {
            baseline: 10.0,
            ..StressConfig::default()
        });
        (sampler, feed, accumulator)
    }

    fn drain(sampler: &mut SignalSampler, now: Duration, accumulator: &mut StressAccumulator) -> Vec<SampleTick> {
        std::iter::from_fn(|| sampler.tick(now, accumulator)).collect()
    }

    #[test]
    fn ticks_once_per_period() {
        let (mut sampler, feed, mut accumulator) = setup();
        feed.publish(SignalSample::new(0.1, 15.0));
        sampler.start(ms(0));

        assert!(sampler.tick(ms(199), &mut accumulator).is_none());
        let ticks = drain(&mut sampler, ms(1_000), &mut accumulator);

        assert_eq!(ticks.len(), 5);
        assert_eq!(accumulator.score(), StressScore::new(20.0));
        assert_eq!(sampler.next_due(), Some(ms(1_200)));
    }

    #[test]
    fn absent_samples_leave_the_score_unchanged() {
        let (mut sampler, _feed, mut accumulator) = setup();
        sampler.start(ms(0));

        let ticks = drain(&mut sampler, ms(600), &mut accumulator);

        assert_eq!(ticks, vec![SampleTick::Skipped; 3]);
        assert_eq!(accumulator.score(), StressScore::new(10.0));
    }

    #[test]
    fn only_the_latest_value_is_observed() {
        let (mut sampler, feed, mut accumulator) = setup();
        sampler.start(ms(0));

        // A stressed reading replaced before the tick is never seen.
        feed.publish(SignalSample::new(0.0, 60.0));
        feed.publish(SignalSample::calm());
        drain(&mut sampler, ms(200), &mut accumulator);

        assert_eq!(accumulator.score(), StressScore::new(9.5));
    }

    #[test]
    fn stopped_sampler_never_ticks() {
        let (mut sampler, feed, mut accumulator) = setup();
        feed.publish(SignalSample::new(0.0, 60.0));
        sampler.start(ms(0));
        sampler.stop();

        assert!(drain(&mut sampler, ms(5_000), &mut accumulator).is_empty());
        assert!(!sampler.is_running());
        assert_eq!(accumulator.score(), StressScore::new(10.0));
    }

    #[test]
    fn restarting_keeps_a_single_schedule() {
        let (mut sampler, feed, mut accumulator) = setup();
        feed.publish(SignalSample::new(0.1, 15.0));
        sampler.start(ms(0));
        sampler.start(ms(100));

        assert_eq!(drain(&mut sampler, ms(400), &mut accumulator).len(), 2);
    }
}
