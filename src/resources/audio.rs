//! Audio buffers decoded from WAV files
//!
//! Playback lives outside this crate; a buffer only owns the decoded samples.

use crate::resources::error::{LoadError, LoadResult};
use hound::{SampleFormat, WavReader};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Format of a decoded WAV stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Number of frames (samples per channel)
    pub frames: u32,
}

/// Interleaved samples normalised to `[-1, 1]`
pub struct AudioBuffer {
    path: PathBuf,
    format: Option<AudioFormat>,
    samples: OnceLock<Vec<f32>>,
}

impl AudioBuffer {
    /// Read the header of `path`, decoding the samples now or on first access
    pub fn load(path: &Path, load_now: bool) -> LoadResult<Self> {
        let reader = open(path)?;
        let spec = reader.spec();
        let format = AudioFormat {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
            frames: reader.duration(),
        };

        let buffer = Self {
            path: path.to_path_buf(),
            format: Some(format),
            samples: OnceLock::new(),
        };
        if load_now {
            let samples = decode(reader, path)?;
            let _ = buffer.samples.set(samples);
        }

        log::info!(
            "Loaded audio {} ({} ch, {} Hz, {} frames)",
            path.display(),
            format.channels,
            format.sample_rate,
            format.frames
        );
        Ok(buffer)
    }

    pub(crate) fn failed(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            format: None,
            samples: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.format.is_some()
    }

    pub fn format(&self) -> Option<AudioFormat> {
        self.format
    }

    /// True once the samples have been decoded
    pub fn is_decoded(&self) -> bool {
        self.samples.get().is_some()
    }

    /// Playback length in seconds
    pub fn duration_secs(&self) -> f32 {
        self.format
            .map(|f| f.frames as f32 / f.sample_rate.max(1) as f32)
            .unwrap_or(0.0)
    }

    /// Decoded samples, decoding on first access
    ///
    /// A buffer that cannot be decoded yields an empty slice.
    pub fn samples(&self) -> &[f32] {
        if !self.is_loaded() {
            return &[];
        }
        self.samples.get_or_init(|| {
            match open(&self.path).and_then(|reader| decode(reader, &self.path)) {
                Ok(samples) => samples,
                Err(e) => {
                    log::error!("{}", e);
                    Vec::new()
                }
            }
        })
    }
}

fn open(path: &Path) -> LoadResult<WavReader<std::io::BufReader<std::fs::File>>> {
    WavReader::open(path).map_err(|source| match source {
        hound::Error::IoError(e) => LoadError::io(path, e),
        source => LoadError::Wav {
            path: path.to_path_buf(),
            source,
        },
    })
}

fn decode<R: std::io::Read>(mut reader: WavReader<R>, path: &Path) -> LoadResult<Vec<f32>> {
    let spec = reader.spec();
    let wav_error = |source| LoadError::Wav {
        path: path.to_path_buf(),
        source,
    };
    match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(wav_error),
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<_>, _>>()
                .map_err(wav_error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_eager_load_decodes_and_normalises() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, &[0, 16384, -32768, 0]);

        let audio = AudioBuffer::load(&path, true).unwrap();
        assert!(audio.is_decoded());
        let format = audio.format().unwrap();
        assert_eq!(format.channels, 2);
        assert_eq!(format.frames, 2);
        assert_eq!(audio.samples(), &[0.0, 0.5, -1.0, 0.0]);
    }

    #[test]
    fn test_lazy_load_decodes_on_first_access() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lazy.wav");
        write_wav(&path, &[0; 16]);

        let audio = AudioBuffer::load(&path, false).unwrap();
        assert!(!audio.is_decoded());
        assert_eq!(audio.samples().len(), 16);
        assert!(audio.is_decoded());
        assert!((audio.duration_secs() - 8.0 / 8000.0).abs() < 1e-6);
    }

    #[test]
    fn test_non_wav_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"definitely not RIFF").unwrap();
        assert!(matches!(AudioBuffer::load(&path, true), Err(LoadError::Wav { .. })));
    }

    #[test]
    fn test_failed_buffer_has_no_samples() {
        let audio = AudioBuffer::failed(Path::new("gone.wav"));
        assert!(!audio.is_loaded());
        assert!(audio.samples().is_empty());
    }
}
