//! Error types for provider construction and parameter writes

use thiserror::Error;

/// Errors raised at construction or parameter boundaries.
///
/// Nothing on the `read` path returns an error; end of stream is a short or
/// zero-length read.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DspError {
    #[error("Playback rate must be between 0.1 and 10 (got {0})")]
    InvalidPlaybackRate(f32),
    #[error("Invalid wave format: {sample_rate} Hz, {channels} channel(s)")]
    InvalidWaveFormat { sample_rate: u32, channels: u16 },
    #[error("Unsupported channel count: {0} (expected mono or stereo)")]
    UnsupportedChannels(u16),
}
