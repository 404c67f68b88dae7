//! Waveform-similarity overlap-add (WSOLA) time stretcher.
//!
//! Input is cut into sequences that overlap their neighbours. For every new
//! sequence the seek window is searched for the offset whose start best
//! matches the tail of the previous sequence, then the two are cross-faded.
//! Advancing the input by `tempo` times the output hop changes duration
//! while every emitted waveform keeps its original period, so pitch is
//! preserved.

use super::{TimeStretcher, MAX_PLAYBACK_RATE, MIN_PLAYBACK_RATE};
use tracing::debug;

/// Length of one processing sequence
const SEQUENCE_MS: f32 = 40.0;
/// Range searched for the best-matching splice point
const SEEK_WINDOW_MS: f32 = 15.0;
/// Cross-fade length between consecutive sequences
const OVERLAP_MS: f32 = 8.0;

/// Stride of the coarse correlation pass
const COARSE_STRIDE: usize = 4;

/// Cap on silence blocks pushed by a single flush
const MAX_FLUSH_BLOCKS: usize = 64;

/// WSOLA engine over interleaved f32 samples
pub struct Wsola {
    sample_rate: u32,
    channels: usize,
    tempo: f32,
    /// Sequence length in frames
    sequence: usize,
    /// Seek window length in frames
    seek: usize,
    /// Overlap length in frames
    overlap: usize,
    /// Input frames advanced per sequence (tempo * output hop)
    nominal_skip: f32,
    skip_fract: f32,
    /// Input frames that must be buffered before a sequence can be processed
    sample_req: usize,
    input: Vec<f32>,
    output: Vec<f32>,
    /// Tail of the previous sequence, cross-faded into the next one
    mid_buffer: Vec<f32>,
    /// First sequence after a clear is copied without cross-fade
    beginning: bool,
    /// Output frames the input fed so far should produce
    expected_out: f64,
    frames_out: u64,
}

impl Wsola {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        let mut wsola = Self {
            sample_rate: 0,
            channels: 0,
            tempo: 1.0,
            sequence: 0,
            seek: 0,
            overlap: 0,
            nominal_skip: 0.0,
            skip_fract: 0.0,
            sample_req: 0,
            input: Vec::new(),
            output: Vec::new(),
            mid_buffer: Vec::new(),
            beginning: true,
            expected_out: 0.0,
            frames_out: 0,
        };
        wsola.configure(sample_rate, channels);
        wsola
    }

    fn ms_to_frames(&self, ms: f32) -> usize {
        ((self.sample_rate as f32 * ms / 1000.0) as usize).max(1)
    }

    /// Recompute the tempo-dependent step sizes
    fn update_step(&mut self) {
        self.nominal_skip = self.tempo * (self.sequence - self.overlap) as f32;
        self.sample_req = (self.nominal_skip as usize + self.overlap).max(self.sequence) + self.seek;
    }

    #[inline]
    fn input_frames(&self) -> usize {
        self.input.len() / self.channels
    }

    /// Normalised cross-correlation of the previous tail against `offset`
    fn correlation(&self, offset: usize) -> f32 {
        let start = offset * self.channels;
        let window = &self.input[start..start + self.mid_buffer.len()];

        let mut corr = 0.0f32;
        let mut norm = 0.0f32;
        for (&m, &x) in self.mid_buffer.iter().zip(window) {
            corr += m * x;
            norm += x * x;
        }
        corr / norm.sqrt().max(1e-9)
    }

    /// Offset within the seek window that splices most smoothly
    fn seek_best_overlap(&self) -> usize {
        let mut best = 0;
        let mut best_corr = f32::MIN;

        for offset in (0..self.seek).step_by(COARSE_STRIDE) {
            let corr = self.correlation(offset);
            if corr > best_corr {
                best_corr = corr;
                best = offset;
            }
        }

        let lo = best.saturating_sub(COARSE_STRIDE - 1);
        let hi = (best + COARSE_STRIDE).min(self.seek);
        for offset in lo..hi {
            let corr = self.correlation(offset);
            if corr > best_corr {
                best_corr = corr;
                best = offset;
            }
        }

        best
    }

    /// Emit as many sequences as the buffered input allows
    fn process(&mut self) {
        let ch = self.channels;
        let overlap_len = self.overlap * ch;
        let hop = self.sequence - self.overlap;

        while self.input_frames() >= self.sample_req {
            let offset = if self.beginning {
                0
            } else {
                self.seek_best_overlap()
            };
            let start = offset * ch;

            if self.beginning {
                self.output
                    .extend_from_slice(&self.input[start..start + overlap_len]);
                self.beginning = false;
            } else {
                for frame in 0..self.overlap {
                    let fade_in = frame as f32 / self.overlap as f32;
                    for c in 0..ch {
                        let i = frame * ch + c;
                        let mixed =
                            self.mid_buffer[i] * (1.0 - fade_in) + self.input[start + i] * fade_in;
                        self.output.push(mixed);
                    }
                }
            }

            let body_start = start + overlap_len;
            let body_end = start + hop * ch;
            self.output
                .extend_from_slice(&self.input[body_start..body_end]);
            self.mid_buffer
                .copy_from_slice(&self.input[body_end..body_end + overlap_len]);
            self.frames_out += hop as u64;

            self.skip_fract += self.nominal_skip;
            let skip = self.skip_fract as usize;
            self.skip_fract -= skip as f32;
            self.input.drain(..skip * ch);
        }
    }

    fn clear_input(&mut self) {
        self.input.clear();
        self.mid_buffer.fill(0.0);
        self.beginning = true;
        self.skip_fract = 0.0;
        self.expected_out = 0.0;
        self.frames_out = 0;
    }
}

impl TimeStretcher for Wsola {
    fn configure(&mut self, sample_rate: u32, channels: u16) {
        self.sample_rate = sample_rate.max(1);
        self.channels = channels.max(1) as usize;

        self.sequence = self.ms_to_frames(SEQUENCE_MS);
        self.seek = self.ms_to_frames(SEEK_WINDOW_MS);
        // The body between two cross-fades must not be negative
        self.overlap = self.ms_to_frames(OVERLAP_MS).min(self.sequence / 2).max(1);
        self.update_step();

        let ch = self.channels;
        let hop = self.sequence - self.overlap;
        let max_put = self.sample_rate as usize;
        let max_req = ((MAX_PLAYBACK_RATE * hop as f32) as usize + self.overlap)
            .max(self.sequence)
            + self.seek;
        // Slowest tempo: every step consumes the fewest input frames
        let min_skip = ((MIN_PLAYBACK_RATE * hop as f32) as usize).max(1);
        let max_steps = (max_put + 2 * max_req) / min_skip + 1;

        self.input = Vec::with_capacity((max_put + 2 * max_req) * ch);
        self.output = Vec::with_capacity(max_steps * hop * ch);
        self.mid_buffer = vec![0.0; self.overlap * self.channels];
        self.clear_input();

        debug!(
            sample_rate = self.sample_rate,
            channels = self.channels,
            output_capacity = self.output.capacity(),
            sequence = self.sequence,
            seek = self.seek,
            overlap = self.overlap,
            "Configured WSOLA"
        );
    }

    fn set_tempo(&mut self, tempo: f32) {
        debug_assert!(tempo > 0.0, "tempo must be positive");
        self.tempo = tempo.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE);
        self.update_step();
    }

    fn tempo(&self) -> f32 {
        self.tempo
    }

    fn put_samples(&mut self, samples: &[f32]) {
        self.input.extend_from_slice(samples);
        self.expected_out += (samples.len() / self.channels) as f64 / self.tempo as f64;
        self.process();
    }

    fn receive_samples(&mut self, output: &mut [f32]) -> usize {
        let count = output.len().min(self.output.len());
        let count = count - count % self.channels;
        output[..count].copy_from_slice(&self.output[..count]);
        self.output.drain(..count);
        count
    }

    fn available(&self) -> usize {
        self.output.len()
    }

    fn flush(&mut self) {
        let expected = self.expected_out.round() as u64;
        let ch = self.channels;
        let pending_before = self.output.len() / ch;

        let mut blocks = 0;
        while self.frames_out < expected && blocks < MAX_FLUSH_BLOCKS {
            let padded = self.input.len() + self.sample_req * ch;
            self.input.resize(padded, 0.0);
            self.process();
            blocks += 1;
        }

        // Padding overshoots by up to one sequence; only trim what the flush added
        let overshoot = self.frames_out.saturating_sub(expected) as usize;
        let pending = self.output.len() / ch;
        let trim = overshoot.min(pending - pending_before.min(pending));
        self.output.truncate((pending - trim) * ch);

        debug!(
            expected,
            produced = self.frames_out - trim as u64,
            "Flushed WSOLA"
        );
        self.clear_input();
    }

    fn clear(&mut self) {
        self.output.clear();
        self.clear_input();
    }
}
