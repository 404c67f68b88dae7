//! Pull-based sample provider contract, wave format and the basic providers
//! every chain is built from (terminal buffer source, mono upmix).

use crate::error::DspError;
use std::sync::Arc;
use tracing::debug;

/// Output format of a provider (interleaved f32 PCM)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaveFormat {
    sample_rate: u32,
    channels: u16,
}

impl WaveFormat {
    /// Create a format, rejecting a zero sample rate or channel count
    pub fn new(sample_rate: u32, channels: u16) -> Result<Self, DspError> {
        if sample_rate == 0 || channels == 0 {
            return Err(DspError::InvalidWaveFormat {
                sample_rate,
                channels,
            });
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    /// Stereo format at the given sample rate
    ///
    /// # Panics
    /// Panics if `sample_rate` is zero.
    pub fn stereo(sample_rate: u32) -> Self {
        assert!(sample_rate > 0, "sample rate must be positive");
        Self {
            sample_rate,
            channels: 2,
        }
    }

    /// Mono format at the given sample rate
    ///
    /// # Panics
    /// Panics if `sample_rate` is zero.
    pub fn mono(sample_rate: u32) -> Self {
        assert!(sample_rate > 0, "sample rate must be positive");
        Self {
            sample_rate,
            channels: 1,
        }
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of interleaved samples in one second of audio
    #[inline]
    pub fn samples_per_second(&self) -> usize {
        self.sample_rate as usize * self.channels as usize
    }

    /// Largest whole-frame sample count that fits in `samples`
    #[inline]
    pub fn whole_frames(&self, samples: usize) -> usize {
        samples - samples % self.channels as usize
    }

    /// Convert a duration in milliseconds to a whole number of frames (at least 1)
    #[inline]
    pub fn ms_to_frames(&self, ms: f32) -> usize {
        ((self.sample_rate as f32 * ms / 1000.0) as usize).max(1)
    }
}

/// A streaming audio source or transform.
///
/// `read` fills up to `buffer.len()` interleaved samples and returns how many
/// were produced. Only whole frames are produced, so a buffer whose length is
/// not a multiple of the channel count leaves its tail untouched and a buffer
/// shorter than one frame reads 0. A short read means "drained for now"; a
/// zero read on a buffer of at least one frame means end of stream.
pub trait SampleProvider: Send {
    /// Format of the samples this provider produces
    fn wave_format(&self) -> WaveFormat;

    /// Fill `buffer`, returning the number of samples written
    fn read(&mut self, buffer: &mut [f32]) -> usize;

    /// Clear internal processing state (tails, engine buffers) and forward upstream
    fn reset(&mut self) {}
}

impl<P: SampleProvider + ?Sized> SampleProvider for Box<P> {
    fn wave_format(&self) -> WaveFormat {
        (**self).wave_format()
    }

    fn read(&mut self, buffer: &mut [f32]) -> usize {
        (**self).read(buffer)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// Wrap a mono source so it produces stereo; stereo sources pass through.
pub fn into_stereo(
    source: Box<dyn SampleProvider>,
) -> Result<Box<dyn SampleProvider>, DspError> {
    match source.wave_format().channels() {
        1 => Ok(Box::new(MonoToStereo::new(source))),
        2 => Ok(source),
        n => Err(DspError::UnsupportedChannels(n)),
    }
}

/// Duplicates a mono source into both channels of a stereo stream.
///
/// Upmixing happens inside the caller's buffer: mono samples are read into
/// the front half and expanded back to front, so no scratch buffer is needed.
pub struct MonoToStereo {
    source: Box<dyn SampleProvider>,
    format: WaveFormat,
}

impl MonoToStereo {
    pub fn new(source: Box<dyn SampleProvider>) -> Self {
        let source_format = source.wave_format();
        debug_assert_eq!(source_format.channels(), 1);
        let format = WaveFormat::stereo(source_format.sample_rate());
        debug!(sample_rate = format.sample_rate(), "Upmixing mono source to stereo");
        Self { source, format }
    }
}

impl SampleProvider for MonoToStereo {
    fn wave_format(&self) -> WaveFormat {
        self.format
    }

    fn read(&mut self, buffer: &mut [f32]) -> usize {
        let frames = buffer.len() / 2;
        if frames == 0 {
            return 0;
        }

        let read = self.source.read(&mut buffer[..frames]);

        // Walk backwards so no mono sample is overwritten before it is copied
        for i in (0..read).rev() {
            let sample = buffer[i];
            buffer[i * 2] = sample;
            buffer[i * 2 + 1] = sample;
        }

        read * 2
    }

    fn reset(&mut self) {
        self.source.reset();
    }
}

/// Terminal provider over decoded, interleaved samples held in memory.
pub struct BufferSource {
    /// Interleaved samples - Arc so a host can share decoded audio without copying
    samples: Arc<Vec<f32>>,
    format: WaveFormat,
    /// Read cursor in samples (always frame aligned)
    position: usize,
}

impl BufferSource {
    pub fn new(samples: Arc<Vec<f32>>, format: WaveFormat) -> Self {
        debug!(
            samples = samples.len(),
            sample_rate = format.sample_rate(),
            channels = format.channels(),
            "Created buffer source"
        );
        Self {
            samples,
            format,
            position: 0,
        }
    }

    /// Convenience constructor taking ownership of a sample vector
    pub fn from_vec(samples: Vec<f32>, format: WaveFormat) -> Self {
        Self::new(Arc::new(samples), format)
    }

    /// Current position in frames
    pub fn position(&self) -> usize {
        self.position / self.format.channels() as usize
    }

    /// Total length in frames
    pub fn len_frames(&self) -> usize {
        self.samples.len() / self.format.channels() as usize
    }

    /// Jump to a frame, clamped to the end of the buffer
    pub fn seek(&mut self, frame: usize) {
        let channels = self.format.channels() as usize;
        self.position = frame.min(self.len_frames()) * channels;
    }

    /// Remaining samples before end of stream
    pub fn remaining(&self) -> usize {
        self.samples.len().saturating_sub(self.position)
    }
}

impl SampleProvider for BufferSource {
    fn wave_format(&self) -> WaveFormat {
        self.format
    }

    fn read(&mut self, buffer: &mut [f32]) -> usize {
        let count = self.format.whole_frames(buffer.len().min(self.remaining()));
        if count == 0 {
            return 0;
        }
        buffer[..count].copy_from_slice(&self.samples[self.position..self.position + count]);
        self.position += count;
        count
    }
}
