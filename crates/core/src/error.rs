/// Result alias that carries the custom [`StressSimError`] type.
pub type Result<T> = std::result::Result<T, StressSimError>;

/// Common error type for the core crate.
///
/// Malformed signal samples, out-of-range mapper inputs and unknown tier
/// strings never show up here: they are absorbed, clamped or defaulted where
/// they enter the system.
#[derive(Debug, thiserror::Error)]
pub enum StressSimError {
    /// Free-form message for conditions that do not deserve their own variant.
    #[error("{0}")]
    Message(String),
    /// A caller handed an argument the operation cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// An effector could not acquire its output device. Recoverable: stress
    /// computation keeps running with the effector silenced.
    #[error("actuator unavailable: {0}")]
    ActuatorUnavailable(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Fft(#[from] realfft::FftError),
}

impl StressSimError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Returns `true` when the caller may keep the session running.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ActuatorUnavailable(_))
    }
}

impl From<&str> for StressSimError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for StressSimError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
