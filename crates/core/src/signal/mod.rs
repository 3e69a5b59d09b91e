use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

/// One observation of the candidate's attention, as estimated by the camera
/// pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalSample {
    /// Normalised attentiveness in `[0, 1]`; 1.0 means looking straight at
    /// the interviewer.
    pub gaze_score: f32,
    /// Blinks per minute.
    pub blink_rate: f32,
}

impl SignalSample {
    pub fn new(gaze_score: f32, blink_rate: f32) -> Self {
        Self {
            gaze_score,
            blink_rate,
        }
    }

    /// A centered gaze with an unremarkable blink rate.
    pub fn calm() -> Self {
        Self::new(1.0, 15.0)
    }
}

/// Latest-value slot shared between the signal producer and the sampler.
///
/// Publishing overwrites whatever was there; nothing is queued, so values that
/// are replaced before the sampler's next tick are never seen.
#[derive(Clone, Default)]
pub struct SignalFeed {
    latest: Arc<Mutex<Option<SignalSample>>>,
}

impl SignalFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, sample: SignalSample) {
        *self.lock() = Some(sample);
    }

    /// Marks the signal as absent, e.g. when the face is lost.
    pub fn clear(&self) {
        *self.lock() = None;
    }

    pub fn latest(&self) -> Option<SignalSample> {
        *self.lock()
    }

    // A panicking producer cannot leave an `Option<SignalSample>` half written,
    // so the poisoned value is still usable.
    fn lock(&self) -> MutexGuard<'_, Option<SignalSample>> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SignalFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalFeed")
            .field("latest", &self.latest())
            .finish()
    }
}
