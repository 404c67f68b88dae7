//! Kinora render - runs a media file through the audio effect chain
//!
//! Usage: `kinora-render <input> <output.wav> [--config <path>]`

mod config;
mod loader;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use kinora_dsp::{
    IsolationSampleProvider, ReverbSampleProvider, SampleProvider, StereoPanSampleProvider,
    VarispeedSampleProvider,
};
use loader::AudioLoader;

struct Args {
    input: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => Config::load(),
    };

    let audio = AudioLoader::with_sample_rate(config.sample_rate)
        .load(&args.input)
        .with_context(|| format!("Failed to load {}", args.input.display()))?;
    info!(
        input = %args.input.display(),
        duration_secs = audio.duration_secs(),
        channels = audio.format.channels(),
        "Loaded input"
    );

    let mut chain = build_chain(audio.into_source(), &config)?;

    let started = Instant::now();
    let frames = render(chain.as_mut(), &args.output, config.block_size)?;
    info!(
        output = %args.output.display(),
        frames,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Render complete"
    );

    Ok(())
}

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<Args> {
    let mut positional = Vec::new();
    let mut config = None;

    while let Some(arg) = args.next() {
        if arg == "--config" {
            let path = args.next().context("--config requires a path")?;
            config = Some(PathBuf::from(path));
        } else {
            positional.push(PathBuf::from(arg));
        }
    }

    match <[PathBuf; 2]>::try_from(positional) {
        Ok([input, output]) => Ok(Args {
            input,
            output,
            config,
        }),
        Err(_) => bail!("Usage: kinora-render <input> <output.wav> [--config <path>]"),
    }
}

/// Build the provider chain (outermost first): pan, isolation, reverb, varispeed
fn build_chain(
    source: impl SampleProvider + 'static,
    config: &Config,
) -> anyhow::Result<Box<dyn SampleProvider>> {
    let mut varispeed = VarispeedSampleProvider::new(source);
    varispeed.set_playback_rate(config.playback_rate)?;
    let mut chain: Box<dyn SampleProvider> = Box::new(varispeed);

    if config.reverb {
        let mut reverb = ReverbSampleProvider::new(chain)?;
        reverb.set_amount(config.reverb_amount);
        reverb.set_wet_mix(config.wet_mix);
        chain = Box::new(reverb);
    }

    if config.isolation {
        let mut isolation = IsolationSampleProvider::new(chain)?;
        isolation.set_intensity(config.intensity);
        isolation.set_bass_boost(config.bass_boost);
        chain = Box::new(isolation);
    }

    let mut pan = StereoPanSampleProvider::new(chain)?;
    pan.set_pan(config.pan);

    Ok(Box::new(pan))
}

/// Pull the chain to exhaustion into a 32-bit float WAV, returning frames written
fn render(chain: &mut dyn SampleProvider, output: &Path, block_size: usize) -> anyhow::Result<u64> {
    let format = chain.wave_format();
    let spec = WavSpec {
        channels: format.channels(),
        sample_rate: format.sample_rate(),
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(output, spec)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    // Whole frames only, so every read stays frame aligned
    let channels = format.channels() as usize;
    let block = (block_size.max(channels) / channels) * channels;
    let mut buffer = vec![0.0f32; block];
    let mut samples = 0u64;

    loop {
        let read = chain.read(&mut buffer);
        if read == 0 {
            break;
        }
        for &sample in &buffer[..read] {
            writer.write_sample(sample)?;
        }
        samples += read as u64;
    }

    writer.finalize()?;
    Ok(samples / channels as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinora_dsp::{BufferSource, WaveFormat};

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_parse_args_with_config() {
        let parsed = parse_args(args(&["in.mp3", "--config", "my.conf", "out.wav"])).unwrap();
        assert_eq!(parsed.input, PathBuf::from("in.mp3"));
        assert_eq!(parsed.output, PathBuf::from("out.wav"));
        assert_eq!(parsed.config, Some(PathBuf::from("my.conf")));
    }

    #[test]
    fn test_parse_args_rejects_missing_output() {
        assert!(parse_args(args(&["in.mp3"])).is_err());
        assert!(parse_args(args(&["in.mp3", "out.wav", "--config"])).is_err());
    }

    #[test]
    fn test_invalid_playback_rate_fails_chain() {
        let source = BufferSource::from_vec(vec![0.0; 100], WaveFormat::stereo(8000));
        let config = Config {
            playback_rate: 0.0,
            ..Config::default()
        };
        assert!(build_chain(source, &config).is_err());
    }

    #[test]
    fn test_render_writes_float_wav() {
        let samples: Vec<f32> = (0..8000).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        let source = BufferSource::from_vec(samples, WaveFormat::mono(8000));
        let config = Config {
            sample_rate: 8000,
            reverb: true,
            isolation: true,
            pan: 0.5,
            block_size: 1001,
            ..Config::default()
        };
        let mut chain = build_chain(source, &config).unwrap();

        let path = std::env::temp_dir().join(format!("kinora-render-{}.wav", std::process::id()));
        let frames = render(chain.as_mut(), &path, config.block_size).unwrap();
        assert!(frames.abs_diff(8000) <= 4, "rendered {} frames", frames);

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_format, SampleFormat::Float);
        assert_eq!(reader.duration() as u64, frames);

        std::fs::remove_file(&path).unwrap();
    }
}
