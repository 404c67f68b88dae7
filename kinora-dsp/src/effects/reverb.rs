//! Auditorium reverb
//!
//! Signal flow per stereo frame:
//!
//! ```text
//! L+R ─→ pre-delay ─┬─→ early taps (x4) ───────────────┬──────────┐
//!                   │                                  ↓          ↓
//!                   └─→ (+) ─→ combs (x5, parallel) ─→ LP ─→ allpass (x3) ─→ (+) ─→ M/S ─→ mix
//! ```
//!
//! Left and right use detuned tap times so the tail decorrelates, and a slow
//! LFO nudges the comb feedback of the two sides in opposite directions.

use crate::error::DspError;
use crate::filters::{AllPassFilter, CombFilter, DelayLine, OnePoleLowPass};
use crate::params::Param;
use crate::provider::{into_stereo, SampleProvider, WaveFormat};
use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

const TWO_PI: f32 = 2.0 * PI;

/// Distance to the first reflective surface
const PRE_DELAY_MS: f32 = 25.0;

/// Early reflection taps (left); right taps are offset by `EARLY_DETUNE_MS`
const EARLY_TAPS_MS: [f32; 4] = [19.0, 31.0, 47.0, 63.0];
const EARLY_GAINS: [f32; 4] = [0.82, 0.66, 0.51, 0.37];
const EARLY_DETUNE_MS: f32 = 2.1;

/// Comb delay times per side, mutually detuned
const COMB_TUNINGS_L_MS: [f32; 5] = [57.3, 61.9, 67.1, 73.7, 79.1];
const COMB_TUNINGS_R_MS: [f32; 5] = [58.9, 63.7, 69.2, 75.1, 80.3];

/// Series diffusion stages; right side offset by `ALLPASS_DETUNE_MS`
const ALLPASS_TUNINGS_MS: [f32; 3] = [9.1, 13.9, 19.7];
const ALLPASS_DETUNE_MS: f32 = 0.6;
const ALLPASS_FEEDBACK: f32 = 0.5;

/// High-frequency absorption of the tail
const DAMPING_CUTOFF_HZ: f32 = 6000.0;

const LFO_RATE_HZ: f32 = 0.3;
const LFO_DEPTH: f32 = 0.001;

const FEEDBACK_BASE: f32 = 0.6;
const FEEDBACK_RANGE: f32 = 0.25;

const EARLY_SCALE: f32 = 0.25;
const EARLY_INTO_COMBS: f32 = 0.3;
const COMB_SCALE: f32 = 0.2;
const EARLY_INTO_OUTPUT: f32 = 0.4;
/// Side level after mid/side decomposition; keeps the image frontal
const SIDE_WIDTH: f32 = 0.3;

/// Shared reverb parameters, writable from any thread
#[derive(Debug)]
pub struct ReverbParams {
    enabled: AtomicBool,
    /// 0.0 - 1.0, scales comb feedback (tail length)
    amount: Param,
    /// 0.0 = dry, 1.0 = fully wet
    wet_mix: Param,
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            amount: Param::unit(0.5),
            wet_mix: Param::unit(0.35),
        }
    }
}

impl ReverbParams {
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Set reverb amount (0.0 - 1.0)
    pub fn set_amount(&self, amount: f32) {
        self.amount.set(amount);
    }

    pub fn amount(&self) -> f32 {
        self.amount.get()
    }

    /// Set wet/dry blend (0.0 - 1.0)
    pub fn set_wet_mix(&self, wet_mix: f32) {
        self.wet_mix.set(wet_mix);
    }

    pub fn wet_mix(&self) -> f32 {
        self.wet_mix.get()
    }
}

/// One side of the reverb network
struct ReverbChannel {
    early: [DelayLine; 4],
    combs: [CombFilter; 5],
    damping: OnePoleLowPass,
    allpasses: [AllPassFilter; 3],
}

impl ReverbChannel {
    fn new(format: &WaveFormat, comb_ms: &[f32; 5], detune_ms: f32, allpass_detune_ms: f32) -> Self {
        Self {
            early: std::array::from_fn(|i| {
                DelayLine::new(format.ms_to_frames(EARLY_TAPS_MS[i] + detune_ms), EARLY_GAINS[i])
            }),
            combs: std::array::from_fn(|i| CombFilter::new(format.ms_to_frames(comb_ms[i]))),
            damping: OnePoleLowPass::new(DAMPING_CUTOFF_HZ, format.sample_rate() as f32),
            allpasses: std::array::from_fn(|i| {
                AllPassFilter::new(
                    format.ms_to_frames(ALLPASS_TUNINGS_MS[i] + allpass_detune_ms),
                    ALLPASS_FEEDBACK,
                )
            }),
        }
    }

    /// Run one pre-delayed mono sample through this side's network
    #[inline]
    fn process(&mut self, predelayed: f32, feedback: f32) -> f32 {
        let mut early = 0.0;
        for tap in &mut self.early {
            early += tap.process(predelayed);
        }
        early *= EARLY_SCALE;

        let comb_input = predelayed + early * EARLY_INTO_COMBS;
        let mut tail = 0.0;
        for comb in &mut self.combs {
            tail += comb.process(comb_input, feedback);
        }
        tail *= COMB_SCALE;

        tail = self.damping.process(tail);

        for allpass in &mut self.allpasses {
            tail = allpass.process(tail);
        }

        tail + early * EARLY_INTO_OUTPUT
    }

    fn reset(&mut self) {
        self.early.iter_mut().for_each(DelayLine::reset);
        self.combs.iter_mut().for_each(CombFilter::reset);
        self.damping.reset();
        self.allpasses.iter_mut().for_each(AllPassFilter::reset);
    }
}

/// Early reflections plus a diffuse late tail, applied in place
pub struct ReverbSampleProvider {
    source: Box<dyn SampleProvider>,
    format: WaveFormat,
    params: Arc<ReverbParams>,
    pre_delay: DelayLine,
    left: ReverbChannel,
    right: ReverbChannel,
    lfo_phase: f32,
    lfo_increment: f32,
}

impl ReverbSampleProvider {
    /// Wrap `source`, upmixing mono to stereo first
    pub fn new(source: impl SampleProvider + 'static) -> Result<Self, DspError> {
        let source = into_stereo(Box::new(source))?;
        let format = source.wave_format();

        let pre_delay = DelayLine::new(format.ms_to_frames(PRE_DELAY_MS), 1.0);
        let left = ReverbChannel::new(&format, &COMB_TUNINGS_L_MS, 0.0, 0.0);
        let right = ReverbChannel::new(&format, &COMB_TUNINGS_R_MS, EARLY_DETUNE_MS, ALLPASS_DETUNE_MS);

        debug!(
            sample_rate = format.sample_rate(),
            pre_delay = pre_delay.len(),
            "Created reverb"
        );

        Ok(Self {
            source,
            format,
            params: Arc::new(ReverbParams::default()),
            pre_delay,
            left,
            right,
            lfo_phase: 0.0,
            lfo_increment: TWO_PI * LFO_RATE_HZ / format.sample_rate() as f32,
        })
    }

    /// Handle for writing parameters from another thread
    pub fn params(&self) -> Arc<ReverbParams> {
        Arc::clone(&self.params)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.params.set_enabled(enabled);
    }

    pub fn set_amount(&mut self, amount: f32) {
        self.params.set_amount(amount);
    }

    pub fn set_wet_mix(&mut self, wet_mix: f32) {
        self.params.set_wet_mix(wet_mix);
    }

    /// Comb feedback for a given amount, before LFO modulation
    #[inline]
    pub fn feedback_for(amount: f32) -> f32 {
        FEEDBACK_BASE + amount * FEEDBACK_RANGE
    }

    fn process(&mut self, samples: &mut [f32], amount: f32, wet_mix: f32) {
        let base_feedback = Self::feedback_for(amount);
        let dry_mix = 1.0 - wet_mix;

        for frame in samples.chunks_exact_mut(2) {
            let dry_l = frame[0];
            let dry_r = frame[1];

            let predelayed = self.pre_delay.process((dry_l + dry_r) * 0.5);

            self.lfo_phase += self.lfo_increment;
            if self.lfo_phase >= TWO_PI {
                self.lfo_phase -= TWO_PI;
            }
            let lfo_mod = 1.0 + LFO_DEPTH * self.lfo_phase.sin();

            let wet_l = self.left.process(predelayed, base_feedback * lfo_mod);
            let wet_r = self.right.process(predelayed, base_feedback * (2.0 - lfo_mod));

            let mid = (wet_l + wet_r) * 0.5;
            let side = (wet_l - wet_r) * 0.5 * SIDE_WIDTH;

            frame[0] = dry_l * dry_mix + (mid + side) * wet_mix;
            frame[1] = dry_r * dry_mix + (mid - side) * wet_mix;
        }
    }
}

impl SampleProvider for ReverbSampleProvider {
    fn wave_format(&self) -> WaveFormat {
        self.format
    }

    fn read(&mut self, buffer: &mut [f32]) -> usize {
        let len = self.format.whole_frames(buffer.len());
        let read = self.source.read(&mut buffer[..len]);

        let amount = self.params.amount();
        if !self.params.is_enabled() || amount <= 0.0 {
            return read;
        }

        let wet_mix = self.params.wet_mix();
        self.process(&mut buffer[..read], amount, wet_mix);
        read
    }

    fn reset(&mut self) {
        self.pre_delay.reset();
        self.left.reset();
        self.right.reset();
        self.lfo_phase = 0.0;
        self.source.reset();
    }
}
