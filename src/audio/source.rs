use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::info;

/// One uploaded call recording: the playable source behind a session.
///
/// Only container metadata is held here; decoding for capture happens in
/// the file-backed chunk source. Dropping an `AudioSource` releases it.
#[derive(Debug, Clone)]
pub struct AudioSource {
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioSource {
    /// Probe an audio file for its format. WAV goes through hound; every
    /// other container (MP3, M4A, FLAC, OGG) through symphonia.
    pub fn probe(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("probing audio source: {}", path.display());

        let probed = if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
        {
            Self::probe_wav(path)?
        } else {
            Self::probe_container(path)?
        };

        info!(
            "audio source loaded: {:.1}s, {}Hz, {} channels",
            probed.duration_seconds, probed.sample_rate, probed.channels
        );

        Ok(probed)
    }

    fn probe_wav(path: &Path) -> Result<Self> {
        let reader = hound::WavReader::open(path).context("Failed to open WAV file")?;
        let spec = reader.spec();
        let frames = reader.duration();

        Ok(Self {
            path: path.to_path_buf(),
            duration_seconds: frames as f64 / spec.sample_rate as f64,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        })
    }

    fn probe_container(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).context("Failed to open audio file")?;
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
            .context("Failed to probe audio container")?;

        let track = probed
            .format
            .default_track()
            .context("No default audio track")?;
        let params = &track.codec_params;

        let sample_rate = params.sample_rate.context("Source missing sample rate")?;
        let channels = params.channels.map(|c| c.count() as u16).unwrap_or(1);
        let duration_seconds = match (params.time_base, params.n_frames) {
            (Some(tb), Some(frames)) => {
                let time = tb.calc_time(frames);
                time.seconds as f64 + time.frac
            }
            _ => 0.0,
        };

        Ok(Self {
            path: path.to_path_buf(),
            duration_seconds,
            sample_rate,
            channels,
        })
    }
}
