//! Media decoding into an in-memory buffer the effect chain can pull from

use kinora_dsp::{BufferSource, DspError, WaveFormat};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Resampler chunk size in frames
const RESAMPLE_CHUNK: usize = 1024;

/// Errors that can occur while loading media audio
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No audio track found in file")]
    NoAudioTrack,
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Resample error: {0}")]
    Resample(String),
    #[error(transparent)]
    Format(#[from] DspError),
}

/// Decoded audio, interleaved f32 normalized to -1.0 to 1.0
pub struct LoadedAudio {
    pub samples: Vec<f32>,
    pub format: WaveFormat,
}

impl LoadedAudio {
    pub fn duration_secs(&self) -> f64 {
        let frames = self.samples.len() / self.format.channels() as usize;
        frames as f64 / self.format.sample_rate() as f64
    }

    /// Terminal provider over the decoded samples
    pub fn into_source(self) -> BufferSource {
        BufferSource::from_vec(self.samples, self.format)
    }
}

/// Audio loader using Symphonia, resampling with Rubato
pub struct AudioLoader {
    target_sample_rate: u32,
}

impl AudioLoader {
    pub fn with_sample_rate(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }

    /// Decode the first audio track of a media file.
    ///
    /// Sources with more than two channels are folded to their front pair.
    pub fn load(&self, path: &Path) -> Result<LoadedAudio, LoadError> {
        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        let mut reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(LoadError::NoAudioTrack)?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let source_rate = codec_params.sample_rate.unwrap_or(44100);
        let source_channels = codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(2);
        if source_channels == 0 {
            return Err(LoadError::NoAudioTrack);
        }

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        let mut samples: Vec<f32> = Vec::new();
        loop {
            let packet = match reader.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => return Err(LoadError::Decode(e.to_string())),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!(error = e, "Skipping corrupt packet");
                    continue;
                }
                Err(e) => return Err(LoadError::Decode(e.to_string())),
            };

            let spec = *decoded.spec();
            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(sample_buf.samples());
        }

        let (samples, channels) = fold_to_stereo(samples, source_channels);
        debug!(
            path = %path.display(),
            source_rate,
            source_channels,
            frames = samples.len() / channels as usize,
            "Decoded audio"
        );

        let samples = if source_rate != self.target_sample_rate {
            info!(from = source_rate, to = self.target_sample_rate, "Resampling");
            self.resample(&samples, source_rate, channels)?
        } else {
            samples
        };

        Ok(LoadedAudio {
            samples,
            format: WaveFormat::new(self.target_sample_rate, channels)?,
        })
    }

    /// Resample interleaved audio to the target sample rate
    fn resample(
        &self,
        samples: &[f32],
        source_rate: u32,
        channels: u16,
    ) -> Result<Vec<f32>, LoadError> {
        use rubato::{FftFixedInOut, Resampler};

        let channels = channels as usize;
        let frames = samples.len() / channels;
        if frames == 0 {
            return Ok(Vec::new());
        }

        let mut resampler = FftFixedInOut::<f32>::new(
            source_rate as usize,
            self.target_sample_rate as usize,
            RESAMPLE_CHUNK,
            channels,
        )
        .map_err(|e| LoadError::Resample(e.to_string()))?;

        let planar: Vec<Vec<f32>> = (0..channels)
            .map(|ch| samples.iter().skip(ch).step_by(channels).copied().collect())
            .collect();

        let chunk = resampler.input_frames_next();
        let expected_frames =
            (frames as u64 * self.target_sample_rate as u64 / source_rate as u64) as usize;
        // The resampler's leading output is filter latency, not audio
        let delay = resampler.output_delay();
        let needed = delay + expected_frames;
        let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(needed); channels];

        let mut pos = 0;
        while output.first().map_or(0, Vec::len) < needed {
            let end = (pos + chunk).min(frames);
            // Past the end the chunks are silence that flushes the delayed tail
            let input: Vec<Vec<f32>> = planar
                .iter()
                .map(|ch| {
                    let mut block = ch[pos..end].to_vec();
                    block.resize(chunk, 0.0);
                    block
                })
                .collect();

            let resampled = resampler
                .process(&input, None)
                .map_err(|e| LoadError::Resample(e.to_string()))?;

            for (out, data) in output.iter_mut().zip(resampled) {
                out.extend(data);
            }
            pos = end;
        }

        for out in &mut output {
            out.drain(..delay.min(out.len()));
            out.truncate(expected_frames);
        }

        let out_frames = output.first().map_or(0, Vec::len);
        let mut interleaved = Vec::with_capacity(out_frames * channels);
        for frame in 0..out_frames {
            interleaved.extend(output.iter().map(|ch| ch[frame]));
        }

        Ok(interleaved)
    }
}

/// Keep the front left/right pair of a multichannel stream
fn fold_to_stereo(samples: Vec<f32>, channels: u16) -> (Vec<f32>, u16) {
    if channels <= 2 {
        return (samples, channels);
    }

    let folded = samples
        .chunks_exact(channels as usize)
        .flat_map(|frame| [frame[0], frame[1]])
        .collect();
    (folded, 2)
}
