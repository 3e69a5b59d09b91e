use std::sync::{Arc, Mutex, PoisonError};

use crate::{Result, VibrationIntensity};

/// Haptic collaborator driven by the session.
pub trait HapticOutput: Send {
    fn set_intensity(&mut self, intensity: VibrationIntensity) -> Result<()>;

    /// Level for the external heart display, 1 (panic) to 9 (calm).
    fn set_heart_level(&mut self, _level: u8) -> Result<()> {
        Ok(())
    }
}

/// Discards every command.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHaptics;

impl HapticOutput for NullHaptics {
    fn set_intensity(&mut self, _intensity: VibrationIntensity) -> Result<()> {
        Ok(())
    }
}

/// Keeps every command it receives.
#[derive(Debug, Default, Clone)]
pub struct RecordingHaptics {
    intensities: Arc<Mutex<Vec<VibrationIntensity>>>,
    heart_levels: Arc<Mutex<Vec<u8>>>,
}

impl RecordingHaptics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intensities(&self) -> Vec<VibrationIntensity> {
        self.intensities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn heart_levels(&self) -> Vec<u8> {
        self.heart_levels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl HapticOutput for RecordingHaptics {
    fn set_intensity(&mut self, intensity: VibrationIntensity) -> Result<()> {
        self.intensities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(intensity);
        Ok(())
    }

    fn set_heart_level(&mut self, level: u8) -> Result<()> {
        self.heart_levels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(level);
        Ok(())
    }
}
