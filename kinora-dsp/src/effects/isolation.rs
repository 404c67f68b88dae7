//! "Through the wall" isolation effect
//!
//! A steep low-pass cascade stands in for the wall, a bass accumulator
//! restores the thump that leaks through, and a short bright comb/all-pass
//! bank places the result in a small tiled room.

use crate::error::DspError;
use crate::filters::{AllPassFilter, CombFilter, OnePoleLowPass};
use crate::params::Param;
use crate::provider::{into_stereo, SampleProvider, WaveFormat};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Cutoffs of the three cascaded low-pass stages
const MUFFLE_CUTOFFS_HZ: [f32; 3] = [250.0, 250.0, 200.0];

/// Level that survives the insulation
const INSULATION_GAIN: f32 = 0.35;

/// Bass accumulator smoothing (exponential moving average)
const BASS_SMOOTHING: f32 = 0.985;
/// Portion of accumulated bass added back, before the boost scaling.
///
/// Sized with `BATHROOM_COMB_SCALE` so a full-scale input settles below full
/// scale after `MAKEUP_GAIN`; larger values drive the output into the clamp.
const BASS_MIX: f32 = 0.12;
/// Boost range: 0.0 maps to 0.5x, 1.0 maps to 2.0x
const BASS_BOOST_MIN: f32 = 0.5;
const BASS_BOOST_RANGE: f32 = 1.5;

/// Small-room comb delays per side
const BATHROOM_COMBS_L_MS: [f32; 3] = [30.1, 35.3, 41.2];
const BATHROOM_COMBS_R_MS: [f32; 3] = [31.3, 36.7, 42.0];
const BATHROOM_ALLPASS_L_MS: [f32; 2] = [5.3, 1.7];
const BATHROOM_ALLPASS_R_MS: [f32; 2] = [5.9, 2.1];
const BATHROOM_FEEDBACK: f32 = 0.68;
const BATHROOM_ALLPASS_FEEDBACK: f32 = 0.5;
/// Comb bank output scale. Three combs at 0.68 feedback have a DC gain of
/// about 9.4; this brings the bank under unity so the 1.4x makeup gain does
/// not push a full-scale input to the clamp.
const BATHROOM_COMB_SCALE: f32 = 0.1;
const BATHROOM_WET: f32 = 0.75;

const MAKEUP_GAIN: f32 = 1.4;

/// Shared isolation parameters, writable from any thread
#[derive(Debug)]
pub struct IsolationParams {
    enabled: AtomicBool,
    /// Wet/dry of the whole effect (0.0 - 1.0)
    intensity: Param,
    /// Bass energy added back (0.0 - 1.0)
    bass_boost: Param,
}

impl Default for IsolationParams {
    fn default() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            intensity: Param::unit(1.0),
            bass_boost: Param::unit(0.5),
        }
    }
}

impl IsolationParams {
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Set intensity (0.0 - 1.0)
    pub fn set_intensity(&self, intensity: f32) {
        self.intensity.set(intensity);
    }

    pub fn intensity(&self) -> f32 {
        self.intensity.get()
    }

    /// Set bass boost (0.0 - 1.0)
    pub fn set_bass_boost(&self, bass_boost: f32) {
        self.bass_boost.set(bass_boost);
    }

    pub fn bass_boost(&self) -> f32 {
        self.bass_boost.get()
    }
}

struct IsolationChannel {
    muffle: [OnePoleLowPass; 3],
    bass: f32,
    combs: [CombFilter; 3],
    allpasses: [AllPassFilter; 2],
}

impl IsolationChannel {
    fn new(format: &WaveFormat, comb_ms: &[f32; 3], allpass_ms: &[f32; 2]) -> Self {
        let sample_rate = format.sample_rate() as f32;
        Self {
            muffle: std::array::from_fn(|i| OnePoleLowPass::new(MUFFLE_CUTOFFS_HZ[i], sample_rate)),
            bass: 0.0,
            combs: std::array::from_fn(|i| CombFilter::new(format.ms_to_frames(comb_ms[i]))),
            allpasses: std::array::from_fn(|i| {
                AllPassFilter::new(format.ms_to_frames(allpass_ms[i]), BATHROOM_ALLPASS_FEEDBACK)
            }),
        }
    }

    #[inline]
    fn process(&mut self, input: f32, bass_gain: f32) -> f32 {
        let mut muffled = input;
        for stage in &mut self.muffle {
            muffled = stage.process(muffled);
        }

        self.bass = self.bass * BASS_SMOOTHING + muffled * (1.0 - BASS_SMOOTHING);
        let through_wall = muffled * INSULATION_GAIN + self.bass * BASS_MIX * bass_gain;

        let mut room = 0.0;
        for comb in &mut self.combs {
            room += comb.process(through_wall, BATHROOM_FEEDBACK);
        }
        room *= BATHROOM_COMB_SCALE;
        for allpass in &mut self.allpasses {
            room = allpass.process(room);
        }

        let bathroom = through_wall * (1.0 - BATHROOM_WET) + room * BATHROOM_WET;
        (bathroom * MAKEUP_GAIN).clamp(-1.0, 1.0)
    }

    fn reset(&mut self) {
        self.muffle.iter_mut().for_each(OnePoleLowPass::reset);
        self.bass = 0.0;
        self.combs.iter_mut().for_each(CombFilter::reset);
        self.allpasses.iter_mut().for_each(AllPassFilter::reset);
    }
}

/// Muffled, distant-room rendition of the upstream audio
pub struct IsolationSampleProvider {
    source: Box<dyn SampleProvider>,
    format: WaveFormat,
    params: Arc<IsolationParams>,
    left: IsolationChannel,
    right: IsolationChannel,
}

impl IsolationSampleProvider {
    /// Wrap `source`, upmixing mono to stereo first
    pub fn new(source: impl SampleProvider + 'static) -> Result<Self, DspError> {
        let source = into_stereo(Box::new(source))?;
        let format = source.wave_format();
        debug!(sample_rate = format.sample_rate(), "Created isolation effect");

        Ok(Self {
            source,
            format,
            params: Arc::new(IsolationParams::default()),
            left: IsolationChannel::new(&format, &BATHROOM_COMBS_L_MS, &BATHROOM_ALLPASS_L_MS),
            right: IsolationChannel::new(&format, &BATHROOM_COMBS_R_MS, &BATHROOM_ALLPASS_R_MS),
        })
    }

    /// Handle for writing parameters from another thread
    pub fn params(&self) -> Arc<IsolationParams> {
        Arc::clone(&self.params)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.params.set_enabled(enabled);
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.params.set_intensity(intensity);
    }

    pub fn set_bass_boost(&mut self, bass_boost: f32) {
        self.params.set_bass_boost(bass_boost);
    }
}

impl SampleProvider for IsolationSampleProvider {
    fn wave_format(&self) -> WaveFormat {
        self.format
    }

    fn read(&mut self, buffer: &mut [f32]) -> usize {
        let len = self.format.whole_frames(buffer.len());
        let read = self.source.read(&mut buffer[..len]);
        if !self.params.is_enabled() {
            return read;
        }

        let intensity = self.params.intensity();
        let bass_gain = BASS_BOOST_MIN + self.params.bass_boost() * BASS_BOOST_RANGE;

        for frame in buffer[..read].chunks_exact_mut(2) {
            let dry_l = frame[0];
            let dry_r = frame[1];
            let wet_l = self.left.process(dry_l, bass_gain);
            let wet_r = self.right.process(dry_r, bass_gain);
            frame[0] = dry_l * (1.0 - intensity) + wet_l * intensity;
            frame[1] = dry_r * (1.0 - intensity) + wet_r * intensity;
        }

        read
    }

    fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
        self.source.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::BufferSource;

    fn isolation_over(samples: Vec<f32>, format: WaveFormat) -> IsolationSampleProvider {
        IsolationSampleProvider::new(BufferSource::from_vec(samples, format)).unwrap()
    }

    fn sine(freq: f32, sample_rate: u32, frames: usize) -> Vec<f32> {
        (0..frames)
            .flat_map(|i| {
                let s = (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin();
                [s, s]
            })
            .collect()
    }

    #[test]
    fn test_disabled_is_identity() {
        let input = sine(440.0, 48000, 2048);
        let mut iso = isolation_over(input.clone(), WaveFormat::stereo(48000));
        iso.set_enabled(false);

        let mut out = vec![0.0; input.len()];
        iso.read(&mut out);
        assert_eq!(out, input);
    }

    #[test]
    fn test_zero_intensity_is_identity() {
        let input = sine(1000.0, 44100, 4096);
        let mut iso = isolation_over(input.clone(), WaveFormat::stereo(44100));
        iso.set_intensity(0.0);

        let mut out = vec![0.0; input.len()];
        iso.read(&mut out);
        assert_eq!(out, input);
    }

    #[test]
    fn test_full_scale_constant_is_attenuated() {
        let frames = 48000;
        let mut iso = isolation_over(vec![1.0; frames * 2], WaveFormat::stereo(48000));
        iso.set_enabled(true);
        iso.set_intensity(1.0);

        let mut out = vec![0.0; frames * 2];
        assert_eq!(iso.read(&mut out), frames * 2);

        assert!(out.iter().all(|s| (-1.0..=1.0).contains(s)));

        let steady = &out[out.len() - 2000..];
        for &s in steady {
            assert!(s > 0.0 && s < 0.95, "steady-state sample {}", s);
        }
    }

    #[test]
    fn test_clipping_guard_with_max_bass() {
        let frames = 24000;
        let input: Vec<f32> = (0..frames * 2)
            .map(|i| if (i / 2 / 40) % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let mut iso = isolation_over(input, WaveFormat::stereo(24000));
        iso.set_bass_boost(1.0);

        let mut out = vec![0.0; frames * 2];
        iso.read(&mut out);
        assert!(out.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn test_high_frequencies_are_muffled() {
        let sample_rate = 48000;
        let frames = 24000;
        let input = sine(5000.0, sample_rate, frames);
        let mut iso = isolation_over(input, WaveFormat::stereo(sample_rate));

        let mut out = vec![0.0; frames * 2];
        iso.read(&mut out);

        let peak = out[frames..].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak < 0.05, "5 kHz leaked through at {}", peak);
    }

    #[test]
    fn test_mono_source_upmixed_identically() {
        let mono: Vec<f32> = sine(200.0, 16000, 1000).into_iter().step_by(2).collect();
        let mut iso = isolation_over(mono, WaveFormat::mono(16000));
        assert_eq!(iso.wave_format().channels(), 2);
        iso.set_enabled(false);

        let mut out = vec![0.0; 2000];
        assert_eq!(iso.read(&mut out), 2000);
        for frame in out.chunks_exact(2) {
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn test_parameter_clamping() {
        let params = IsolationParams::default();
        params.set_intensity(1.5);
        assert_eq!(params.intensity(), 1.0);
        params.set_bass_boost(-0.5);
        assert_eq!(params.bass_boost(), 0.0);
    }
}
