//! Pitch-preserving time stretching for variable-speed playback.
//!
//! The stretching algorithm sits behind the [`TimeStretcher`] trait so the
//! provider that drives it ([`VarispeedSampleProvider`]) does not depend on
//! the algorithm choice. [`Wsola`] is the built-in engine.
//!
//! # Usage
//!
//! ```rust,ignore
//! use kinora_dsp::{BufferSource, VarispeedSampleProvider};
//!
//! let mut varispeed = VarispeedSampleProvider::new(source);
//! varispeed.set_playback_rate(1.5)?; // 50% faster, same pitch
//!
//! // In the render callback
//! let produced = varispeed.read(&mut buffer);
//! ```

mod varispeed;
mod wsola;

pub use varispeed::{VarispeedControl, VarispeedSampleProvider};
pub use wsola::Wsola;

/// Slowest supported playback rate
pub const MIN_PLAYBACK_RATE: f32 = 0.1;
/// Fastest supported playback rate
pub const MAX_PLAYBACK_RATE: f32 = 10.0;

/// Block-based time-stretch engine.
///
/// Samples are interleaved; a frame is one sample per channel. Output becomes
/// available in bursts as whole processing sequences complete.
pub trait TimeStretcher: Send {
    /// Set the stream layout; clears all buffered audio
    fn configure(&mut self, sample_rate: u32, channels: u16);

    /// Set the tempo ratio (2.0 = twice as fast, half the duration)
    fn set_tempo(&mut self, tempo: f32);

    fn tempo(&self) -> f32;

    /// Feed interleaved input samples.
    ///
    /// Buffers are sized at `configure` for puts of up to one second of audio
    /// made after the previous output has been received; larger puts or
    /// undrained output may grow them.
    fn put_samples(&mut self, samples: &[f32]);

    /// Move up to `output.len()` processed samples out, returning the count
    fn receive_samples(&mut self, output: &mut [f32]) -> usize;

    /// Processed samples ready to be received
    fn available(&self) -> usize;

    /// Push out everything still held back waiting for more input
    fn flush(&mut self);

    /// Drop all buffered input and output
    fn clear(&mut self);
}
