//! Variable-speed playback provider driving a [`TimeStretcher`]

use super::{TimeStretcher, Wsola, MAX_PLAYBACK_RATE, MIN_PLAYBACK_RATE};
use crate::error::DspError;
use crate::params::Param;
use crate::provider::{SampleProvider, WaveFormat};
use ringbuf::traits::{Consumer, Observer, Producer};
use ringbuf::HeapRb;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared playback-rate control, writable from any thread.
///
/// Writes made here take effect at the start of the next `read`.
#[derive(Debug)]
pub struct VarispeedControl {
    rate: Param,
}

impl Default for VarispeedControl {
    fn default() -> Self {
        Self {
            rate: Param::raw(1.0),
        }
    }
}

impl VarispeedControl {
    /// Set the tempo ratio.
    ///
    /// Accepts `MIN_PLAYBACK_RATE..=MAX_PLAYBACK_RATE`; anything else,
    /// including NaN, is rejected and the current rate is kept.
    pub fn set_playback_rate(&self, rate: f32) -> Result<(), DspError> {
        if !(MIN_PLAYBACK_RATE..=MAX_PLAYBACK_RATE).contains(&rate) {
            warn!(rate, "Rejected playback rate");
            return Err(DspError::InvalidPlaybackRate(rate));
        }
        self.rate.set(rate);
        Ok(())
    }

    pub fn playback_rate(&self) -> f32 {
        self.rate.get()
    }
}

/// Changes playback speed without changing pitch.
///
/// Lifecycle: pulls and stretches while the upstream produces audio; on the
/// first empty upstream read the engine is flushed once, and once that output
/// is drained every further `read` returns 0.
pub struct VarispeedSampleProvider {
    source: Box<dyn SampleProvider>,
    format: WaveFormat,
    engine: Box<dyn TimeStretcher>,
    control: Arc<VarispeedControl>,
    /// Rate the engine is currently configured for
    applied_rate: f32,
    /// Upstream block, one second of audio; doubles as the engine drain buffer
    staging: Vec<f32>,
    /// Stretched samples waiting to be handed to the caller
    ring: HeapRb<f32>,
    source_exhausted: bool,
    has_flushed: bool,
}

impl VarispeedSampleProvider {
    /// Wrap `source` with the built-in WSOLA engine
    pub fn new(source: impl SampleProvider + 'static) -> Self {
        let format = source.wave_format();
        let engine = Wsola::new(format.sample_rate(), format.channels());
        Self::with_engine(source, engine)
    }

    /// Wrap `source` with a custom time-stretch engine
    pub fn with_engine(
        source: impl SampleProvider + 'static,
        mut engine: impl TimeStretcher + 'static,
    ) -> Self {
        let format = source.wave_format();
        engine.configure(format.sample_rate(), format.channels());
        engine.set_tempo(1.0);

        let block = format.samples_per_second();
        debug!(
            sample_rate = format.sample_rate(),
            channels = format.channels(),
            block,
            "Created varispeed"
        );

        Self {
            source: Box::new(source),
            format,
            engine: Box::new(engine),
            control: Arc::new(VarispeedControl::default()),
            applied_rate: 1.0,
            staging: vec![0.0; block],
            ring: HeapRb::new(block * 2),
            source_exhausted: false,
            has_flushed: false,
        }
    }

    /// Handle for changing the rate from another thread
    pub fn control(&self) -> Arc<VarispeedControl> {
        Arc::clone(&self.control)
    }

    /// Set the tempo ratio and discard everything buffered at the old rate
    pub fn set_playback_rate(&mut self, rate: f32) -> Result<(), DspError> {
        self.control.set_playback_rate(rate)?;
        self.apply_pending_rate();
        Ok(())
    }

    /// Rate the engine is currently running at
    pub fn playback_rate(&self) -> f32 {
        self.applied_rate
    }

    /// Stretched samples buffered but not yet read
    pub fn buffered_samples(&self) -> usize {
        self.ring.occupied_len() + self.engine.available()
    }

    /// True once the upstream has ended and the flushed output is drained
    pub fn is_drained(&self) -> bool {
        self.source_exhausted && self.has_flushed && self.buffered_samples() == 0
    }

    fn apply_pending_rate(&mut self) {
        let rate = self.control.playback_rate();
        if rate == self.applied_rate {
            return;
        }

        // No cross-fade across a rate change: the engine restarts from silence
        self.engine.set_tempo(rate);
        self.engine.clear();
        self.ring.clear();
        debug!(from = self.applied_rate, to = rate, "Playback rate changed");
        self.applied_rate = rate;
    }

    /// Move as much engine output into the ring as it can hold
    fn drain_engine(&mut self) {
        let room = self.ring.vacant_len().min(self.staging.len());
        let received = self.engine.receive_samples(&mut self.staging[..room]);
        let pushed = self.ring.push_slice(&self.staging[..received]);
        debug_assert_eq!(pushed, received);
    }
}

impl SampleProvider for VarispeedSampleProvider {
    fn wave_format(&self) -> WaveFormat {
        self.format
    }

    fn read(&mut self, buffer: &mut [f32]) -> usize {
        let len = self.format.whole_frames(buffer.len());
        if len == 0 {
            return 0;
        }
        let buffer = &mut buffer[..len];

        self.apply_pending_rate();

        let mut written = 0;
        while written < buffer.len() {
            if !self.ring.is_empty() {
                written += self.ring.pop_slice(&mut buffer[written..]);
                continue;
            }

            if self.engine.available() > 0 {
                self.drain_engine();
                continue;
            }

            if self.source_exhausted {
                if self.has_flushed {
                    break;
                }
                self.engine.flush();
                self.has_flushed = true;
                debug!(pending = self.engine.available(), "Flushed varispeed engine");
                continue;
            }

            let read = self.source.read(&mut self.staging);
            if read == 0 {
                debug!("Varispeed source exhausted");
                self.source_exhausted = true;
                continue;
            }

            self.engine.put_samples(&self.staging[..read]);
        }

        written
    }

    fn reset(&mut self) {
        self.engine.clear();
        self.ring.clear();
        self.source_exhausted = false;
        self.has_flushed = false;
        self.source.reset();
    }
}
