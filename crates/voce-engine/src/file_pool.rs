//! Decoded sample storage and the promises handed to voices.
//!
//! Loading happens off the audio thread; `get_file_promise` is the only
//! entry point voices touch, and it hands out a shared immutable handle to
//! the decoded PCM.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;
use voce_core::{Error, Result};

/// Decoded PCM for one sample: 1 or 2 channels of f32 frames.
#[derive(Debug)]
pub struct SampleData {
    channels: Vec<Box<[f32]>>,
    sample_rate: f64,
    oversampling_factor: u32,
}

impl SampleData {
    /// `channels` must hold one or two equally long slices.
    pub fn new(channels: Vec<Box<[f32]>>, sample_rate: f64, oversampling_factor: u32) -> Self {
        debug_assert!(!channels.is_empty() && channels.len() <= 2);
        debug_assert!(channels.windows(2).all(|w| w[0].len() == w[1].len()));
        Self {
            channels,
            sample_rate,
            oversampling_factor: oversampling_factor.max(1),
        }
    }

    pub fn mono(samples: Vec<f32>, sample_rate: f64) -> Self {
        Self::new(vec![samples.into_boxed_slice()], sample_rate, 1)
    }

    pub fn stereo(left: Vec<f32>, right: Vec<f32>, sample_rate: f64) -> Self {
        Self::new(
            vec![left.into_boxed_slice(), right.into_boxed_slice()],
            sample_rate,
            1,
        )
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    /// Effective rate of the stored frames (already includes any
    /// oversampling applied at decode time).
    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Multiplier to apply to region frame positions (loop points, offsets)
    /// when indexing the stored frames.
    #[inline]
    pub fn oversampling_factor(&self) -> u32 {
        self.oversampling_factor
    }
}

/// Shared immutable handle to decoded PCM.
pub type SamplePromise = Arc<SampleData>;

/// Sample lookup table keyed by the region's sample id.
pub struct FilePool {
    samples: DashMap<String, SamplePromise>,
}

impl FilePool {
    pub fn new() -> Self {
        Self {
            samples: DashMap::new(),
        }
    }

    /// Decode a WAV file and register it under `id`. Non-RT.
    pub fn load_wav(&self, id: &str, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut reader = hound::WavReader::open(path)
            .map_err(|e| Error::SampleNotFound(format!("{}: {}", path.display(), e)))?;
        let spec = reader.spec();

        if spec.channels == 0 || spec.channels > 2 {
            return Err(Error::UnsupportedSampleFormat(format!(
                "{} channels in {}",
                spec.channels,
                path.display()
            )));
        }

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::UnsupportedSampleFormat(e.to_string()))?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|x| x as f32 * scale))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| Error::UnsupportedSampleFormat(e.to_string()))?
            }
        };

        let channels = spec.channels as usize;
        let frames = interleaved.len() / channels;
        let mut planar: Vec<Box<[f32]>> = Vec::with_capacity(channels);
        for ch in 0..channels {
            planar.push(
                (0..frames)
                    .map(|i| interleaved[i * channels + ch])
                    .collect::<Vec<_>>()
                    .into_boxed_slice(),
            );
        }

        debug!(
            id,
            path = %path.display(),
            frames,
            channels,
            sample_rate = spec.sample_rate,
            "loaded sample"
        );

        self.samples.insert(
            id.to_string(),
            Arc::new(SampleData::new(planar, spec.sample_rate as f64, 1)),
        );
        Ok(())
    }

    /// Register already decoded PCM under `id`. Non-RT.
    pub fn insert_memory(&self, id: &str, data: SampleData) {
        self.samples.insert(id.to_string(), Arc::new(data));
    }

    /// Hand out the promise for `id`, if loaded.
    pub fn get_file_promise(&self, id: &str) -> Option<SamplePromise> {
        self.samples.get(id).map(|entry| Arc::clone(entry.value()))
    }
}

impl Default for FilePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sample_roundtrip() {
        let pool = FilePool::new();
        pool.insert_memory("kick", SampleData::mono(vec![0.0, 0.5, -0.5], 44_100.0));

        let promise = pool.get_file_promise("kick").expect("registered");
        assert_eq!(promise.frames(), 3);
        assert_eq!(promise.num_channels(), 1);
        assert_eq!(promise.channel(0)[1], 0.5);
        assert_eq!(promise.oversampling_factor(), 1);
    }

    #[test]
    fn test_missing_sample_is_none() {
        let pool = FilePool::new();
        assert!(pool.get_file_promise("absent").is_none());
    }

    #[test]
    fn test_promises_share_data() {
        let pool = FilePool::new();
        pool.insert_memory("a", SampleData::mono(vec![1.0; 64], 48_000.0));
        let p1 = pool.get_file_promise("a").unwrap();
        let p2 = pool.get_file_promise("a").unwrap();
        assert!(Arc::ptr_eq(&p1, &p2));
    }

    #[test]
    fn test_stereo_layout() {
        let data = SampleData::stereo(vec![1.0; 8], vec![-1.0; 8], 48_000.0);
        assert_eq!(data.num_channels(), 2);
        assert_eq!(data.frames(), 8);
        assert_eq!(data.channel(1)[0], -1.0);
    }
}
