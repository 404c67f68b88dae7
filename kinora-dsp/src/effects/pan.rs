//! Constant-power stereo panning

use crate::error::DspError;
use crate::params::Param;
use crate::provider::{into_stereo, SampleProvider, WaveFormat};
use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;
use tracing::debug;

/// Shared pan parameter, writable from any thread
#[derive(Debug)]
pub struct PanParams {
    /// Raw pan position; clamped to -1.0 (left) .. 1.0 (right) when read
    pan: Param,
}

impl Default for PanParams {
    fn default() -> Self {
        Self {
            pan: Param::raw(0.0),
        }
    }
}

impl PanParams {
    pub fn set_pan(&self, pan: f32) {
        self.pan.set(pan);
    }

    /// Effective pan position after clamping
    pub fn pan(&self) -> f32 {
        let pan = self.pan.get();
        if pan.is_nan() {
            0.0
        } else {
            pan.clamp(-1.0, 1.0)
        }
    }
}

/// Left/right gains for a pan position.
///
/// Maps pan to an angle in `[0, π/2]` so that `left² + right² = 1` across the
/// whole range. Values outside `[-1, 1]` are clamped.
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let pan = if pan.is_nan() { 0.0 } else { pan.clamp(-1.0, 1.0) };
    let angle = (pan + 1.0) * 0.5 * FRAC_PI_2;
    // max(0.0) pins the float residue of cos(π/2) to exactly zero
    (angle.cos().max(0.0), angle.sin().max(0.0))
}

/// Balance control with perceptually constant loudness
pub struct StereoPanSampleProvider {
    source: Box<dyn SampleProvider>,
    format: WaveFormat,
    params: Arc<PanParams>,
}

impl StereoPanSampleProvider {
    /// Wrap `source`, upmixing mono to stereo first
    pub fn new(source: impl SampleProvider + 'static) -> Result<Self, DspError> {
        let source = into_stereo(Box::new(source))?;
        let format = source.wave_format();
        debug!(sample_rate = format.sample_rate(), "Created stereo pan");
        Ok(Self {
            source,
            format,
            params: Arc::new(PanParams::default()),
        })
    }

    /// Handle for writing the pan position from another thread
    pub fn params(&self) -> Arc<PanParams> {
        Arc::clone(&self.params)
    }

    pub fn set_pan(&mut self, pan: f32) {
        self.params.set_pan(pan);
    }

    pub fn pan(&self) -> f32 {
        self.params.pan()
    }
}

impl SampleProvider for StereoPanSampleProvider {
    fn wave_format(&self) -> WaveFormat {
        self.format
    }

    fn read(&mut self, buffer: &mut [f32]) -> usize {
        let len = self.format.whole_frames(buffer.len());
        let read = self.source.read(&mut buffer[..len]);
        let (gain_l, gain_r) = pan_gains(self.params.pan());

        for frame in buffer[..read].chunks_exact_mut(2) {
            frame[0] *= gain_l;
            frame[1] *= gain_r;
        }

        read
    }

    fn reset(&mut self) {
        self.source.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::BufferSource;

    #[test]
    fn test_constant_power() {
        for i in 0..=200 {
            let pan = -1.0 + i as f32 * 0.01;
            let (l, r) = pan_gains(pan);
            let power = l * l + r * r;
            assert!((power - 1.0).abs() < 1e-5, "pan {} power {}", pan, power);
        }
    }

    #[test]
    fn test_gain_endpoints() {
        let (l, r) = pan_gains(0.0);
        assert!((l - r).abs() < 1e-6);
        assert!((l - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);

        assert_eq!(pan_gains(1.0), (0.0, 1.0));
        assert_eq!(pan_gains(-1.0), (1.0, 0.0));
    }

    #[test]
    fn test_pan_clamp() {
        assert_eq!(pan_gains(2.5), pan_gains(1.0));
        assert_eq!(pan_gains(-7.0), pan_gains(-1.0));

        let params = PanParams::default();
        params.set_pan(2.5);
        assert_eq!(params.pan(), 1.0);
    }

    #[test]
    fn test_clamped_pan_output_matches_hard_right() {
        let input: Vec<f32> = (0..64).map(|i| (i as f32 * 0.1).sin()).collect();

        let mut over = StereoPanSampleProvider::new(BufferSource::from_vec(
            input.clone(),
            WaveFormat::stereo(8000),
        ))
        .unwrap();
        over.set_pan(2.5);

        let mut right = StereoPanSampleProvider::new(BufferSource::from_vec(
            input,
            WaveFormat::stereo(8000),
        ))
        .unwrap();
        right.set_pan(1.0);

        let mut a = [0.0; 64];
        let mut b = [0.0; 64];
        assert_eq!(over.read(&mut a), 64);
        assert_eq!(right.read(&mut b), 64);
        assert_eq!(a, b);
    }

    #[test]
    fn test_mono_source_is_upmixed() {
        let mono = BufferSource::from_vec(vec![0.5; 16], WaveFormat::mono(8000));
        let mut pan = StereoPanSampleProvider::new(mono).unwrap();
        assert_eq!(pan.wave_format().channels(), 2);

        pan.set_pan(-0.4);
        let (gain_l, gain_r) = pan_gains(-0.4);

        let mut buf = [0.0; 32];
        assert_eq!(pan.read(&mut buf), 32);
        for frame in buf.chunks_exact(2) {
            assert!((frame[0] - 0.5 * gain_l).abs() < 1e-6);
            assert!((frame[1] - 0.5 * gain_r).abs() < 1e-6);
        }
    }

    #[test]
    fn test_forwards_end_of_stream() {
        let mut pan =
            StereoPanSampleProvider::new(BufferSource::from_vec(vec![], WaveFormat::stereo(8000)))
                .unwrap();
        let mut buf = [0.0; 8];
        assert_eq!(pan.read(&mut buf), 0);
    }

    #[test]
    fn test_odd_buffer_keeps_channels_aligned() {
        let samples = (0..32).flat_map(|_| [1.0, 2.0]).collect();
        let mut pan =
            StereoPanSampleProvider::new(BufferSource::from_vec(samples, WaveFormat::stereo(8000)))
                .unwrap();
        pan.set_pan(-1.0);

        let mut out = Vec::new();
        let mut buf = [0.0; 3];
        loop {
            let n = pan.read(&mut buf);
            if n == 0 {
                break;
            }
            assert_eq!(n % 2, 0);
            out.extend_from_slice(&buf[..n]);
        }

        assert_eq!(out.len(), 64);
        for frame in out.chunks_exact(2) {
            assert_eq!(frame, [1.0, 0.0]);
        }
    }

    #[test]
    fn test_params_handle_shared() {
        let mut pan =
            StereoPanSampleProvider::new(BufferSource::from_vec(vec![1.0; 4], WaveFormat::stereo(8000)))
                .unwrap();
        let handle = pan.params();
        handle.set_pan(-1.0);

        let mut buf = [0.0; 4];
        pan.read(&mut buf);
        assert_eq!(buf, [1.0, 0.0, 1.0, 0.0]);
    }
}
