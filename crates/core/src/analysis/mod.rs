use std::f32::consts::PI;

use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};

use crate::{Result, StressSimError};

/// Measurements of a block of synthesized audio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ToneAnalysis {
    pub rms: f32,
    pub peak: f32,
    /// Frequency of the strongest bin of the Hann-windowed spectrum.
    pub dominant_hz: f32,
    pub duration_seconds: f32,
}

impl ToneAnalysis {
    pub fn of(samples: &[f32], sample_rate: u32) -> Result<Self> {
        if samples.len() < 2 {
            return Err(StressSimError::InvalidInput(
                "analysis requires blocks with at least two samples",
            ));
        }
        if sample_rate == 0 {
            return Err(StressSimError::InvalidInput("sample rate must be positive"));
        }

        Ok(Self {
            rms: compute_rms(samples),
            peak: samples.iter().fold(0.0_f32, |peak, sample| peak.max(sample.abs())),
            dominant_hz: dominant_frequency(samples, sample_rate)?,
            duration_seconds: samples.len() as f32 / sample_rate as f32,
        })
    }
}

fn dominant_frequency(samples: &[f32], sample_rate: u32) -> Result<f32> {
    let len = samples.len();
    let mut planner = RealFftPlanner::<f32>::new();
    let plan = planner.plan_fft_forward(len);
    let mut input = plan.make_input_vec();
    let mut spectrum = plan.make_output_vec();
    let mut scratch = plan.make_scratch_vec();

    for (index, value) in samples.iter().enumerate() {
        input[index] = *value * hann_value(index, len);
    }

    plan.process_with_scratch(&mut input, &mut spectrum, &mut scratch)?;

    let bin_hz = sample_rate as f32 / len as f32;
    let strongest = spectrum
        .iter()
        .enumerate()
        .skip(1)
        .map(|(index, bin)| (index, bin.norm()))
        .fold((0, 0.0_f32), |best, candidate| {
            if candidate.1 > best.1 {
                candidate
            } else {
                best
            }
        });

    if strongest.1 <= f32::EPSILON {
        Ok(0.0)
    } else {
        Ok(strongest.0 as f32 * bin_hz)
    }
}

fn compute_rms(samples: &[f32]) -> f32 {
    let sum: f32 = samples.iter().map(|sample| sample * sample).sum();
    (sum / samples.len() as f32).sqrt()
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}
