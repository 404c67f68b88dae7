//! Audio DSP core for Kinora - pull-based sample providers and effects
//!
//! This crate provides the processing chain behind playback:
//! - Provider: the `SampleProvider` pull contract, buffer source, mono upmix
//! - Filters: one-pole low-pass, comb, all-pass and delay-line primitives
//! - Effects: reverb, "through the wall" isolation, constant-power pan
//! - Timestretch: pitch-preserving variable speed (WSOLA)
//!
//! Providers wrap one another; the outermost one is read by the audio
//! output and pulls from its upstream on demand. Parameters are plain
//! atomics behind an `Arc`, so a UI thread can write them while the render
//! thread reads without locks.

mod effects;
mod error;
mod filters;
mod params;
mod provider;
mod timestretch;

pub use effects::{
    pan_gains, IsolationParams, IsolationSampleProvider, PanParams, ReverbParams,
    ReverbSampleProvider, StereoPanSampleProvider,
};
pub use error::DspError;
pub use filters::{AllPassFilter, CombFilter, DelayLine, OnePoleLowPass};
pub use provider::{into_stereo, BufferSource, MonoToStereo, SampleProvider, WaveFormat};
pub use timestretch::{
    TimeStretcher, VarispeedControl, VarispeedSampleProvider, Wsola, MAX_PLAYBACK_RATE,
    MIN_PLAYBACK_RATE,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn mono_tone(sample_rate: u32, frames: usize) -> BufferSource {
        let samples = (0..frames)
            .map(|i| 0.6 * (2.0 * std::f32::consts::PI * 330.0 * i as f32 / sample_rate as f32).sin())
            .collect();
        BufferSource::from_vec(samples, WaveFormat::mono(sample_rate))
    }

    #[test]
    fn test_full_chain_renders_stereo_to_completion() {
        let sample_rate = 22050;
        let frames = 22050;

        let mut varispeed = VarispeedSampleProvider::new(mono_tone(sample_rate, frames));
        varispeed.set_playback_rate(1.25).unwrap();
        let reverb = ReverbSampleProvider::new(varispeed).unwrap();
        let isolation = IsolationSampleProvider::new(reverb).unwrap();
        let mut pan = StereoPanSampleProvider::new(isolation).unwrap();
        pan.set_pan(-0.3);

        assert_eq!(pan.wave_format(), WaveFormat::stereo(sample_rate));

        let mut rendered = 0;
        let mut buffer = vec![0.0; 1024];
        loop {
            let n = pan.read(&mut buffer);
            if n == 0 {
                break;
            }
            assert_eq!(n % 2, 0);
            assert!(buffer[..n].iter().all(|s| s.is_finite() && s.abs() <= 1.0));
            rendered += n;
        }

        let expected = (frames as f32 / 1.25) as usize * 2;
        assert!(rendered.abs_diff(expected) <= 16, "rendered {} expected {}", rendered, expected);
        assert_eq!(pan.read(&mut buffer), 0);
    }

    #[test]
    fn test_parameter_handles_cross_threads() {
        let pan = StereoPanSampleProvider::new(mono_tone(8000, 100)).unwrap();
        let params = pan.params();

        std::thread::spawn(move || params.set_pan(0.75))
            .join()
            .unwrap();

        assert_eq!(pan.pan(), 0.75);
    }
}
