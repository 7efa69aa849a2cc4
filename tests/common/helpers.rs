#![allow(dead_code)] // Not every integration module uses every helper

use anyhow::{Result, anyhow};
use qpilot::engine::core::{SampleWindow, TargetProfile, VideoAsset};
use qpilot::engine::encoder::{BitrateProbe, Encoder};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

/// Encoder and probe pair backed by quality-to-bitrate curves instead of
/// ffmpeg. Encodes record the bitrate a real encode would have produced;
/// the probe reads the recorded value back by path.
pub struct MockCodec {
    sample_curve: Box<dyn Fn(u32) -> u64>,
    full_curve: Box<dyn Fn(u32) -> u64>,
    rates: RefCell<HashMap<PathBuf, u64>>,
    pub sample_encodes: Cell<usize>,
    pub full_encodes: Cell<usize>,
}

impl MockCodec {
    pub fn new(
        sample_curve: impl Fn(u32) -> u64 + 'static,
        full_curve: impl Fn(u32) -> u64 + 'static,
    ) -> Self {
        Self {
            sample_curve: Box::new(sample_curve),
            full_curve: Box::new(full_curve),
            rates: RefCell::new(HashMap::new()),
            sample_encodes: Cell::new(0),
            full_encodes: Cell::new(0),
        }
    }

    /// Codec whose sample and full encodes land on the same curve.
    pub fn uniform(curve: impl Fn(u32) -> u64 + Clone + 'static) -> Self {
        Self::new(curve.clone(), curve)
    }
}

impl Encoder for MockCodec {
    fn encode_sample(&self, _source: &Path, window: SampleWindow, quality: u32) -> Result<PathBuf> {
        self.sample_encodes.set(self.sample_encodes.get() + 1);
        let path = PathBuf::from(format!("mock_sample_{}s_q{}.mkv", window.start_s, quality));
        self.rates
            .borrow_mut()
            .insert(path.clone(), (self.sample_curve)(quality));
        Ok(path)
    }

    fn encode_full(&self, _source: &Path, output: &Path, quality: u32) -> Result<()> {
        self.full_encodes.set(self.full_encodes.get() + 1);
        self.rates
            .borrow_mut()
            .insert(output.to_path_buf(), (self.full_curve)(quality));
        Ok(())
    }
}

impl BitrateProbe for MockCodec {
    fn measure(&self, path: &Path) -> Result<u64> {
        self.rates
            .borrow()
            .get(path)
            .copied()
            .ok_or_else(|| anyhow!("no recorded bitrate for {}", path.display()))
    }
}

/// Encoder whose successive sample encodes produce a fixed bitrate sequence,
/// whatever the quality. Full encodes are not supported.
pub struct SequenceCodec {
    bitrates: RefCell<VecDeque<u64>>,
    rates: RefCell<HashMap<PathBuf, u64>>,
}

impl SequenceCodec {
    pub fn new(bitrates: &[u64]) -> Self {
        Self {
            bitrates: RefCell::new(bitrates.iter().copied().collect()),
            rates: RefCell::new(HashMap::new()),
        }
    }
}

impl Encoder for SequenceCodec {
    fn encode_sample(&self, _source: &Path, window: SampleWindow, quality: u32) -> Result<PathBuf> {
        let bitrate = self
            .bitrates
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("bitrate sequence exhausted"))?;
        let path = PathBuf::from(format!("seq_sample_{}s_q{}.mkv", window.start_s, quality));
        self.rates.borrow_mut().insert(path.clone(), bitrate);
        Ok(path)
    }

    fn encode_full(&self, _source: &Path, _output: &Path, _quality: u32) -> Result<()> {
        Err(anyhow!("SequenceCodec does not support full encodes"))
    }
}

impl BitrateProbe for SequenceCodec {
    fn measure(&self, path: &Path) -> Result<u64> {
        self.rates
            .borrow()
            .get(path)
            .copied()
            .ok_or_else(|| anyhow!("no recorded bitrate for {}", path.display()))
    }
}

/// A 1080p asset short enough to plan a single sample window.
pub fn short_asset() -> VideoAsset {
    VideoAsset {
        path: PathBuf::from("/media/clip.mkv"),
        duration_s: 45.0,
        height: 1080,
    }
}

/// A 1080p asset long enough to plan three sample windows.
pub fn long_asset() -> VideoAsset {
    VideoAsset {
        path: PathBuf::from("/media/feature.mkv"),
        duration_s: 300.0,
        height: 1080,
    }
}

/// The default 1080p target: 8 Mbps with a ±5% band.
pub fn profile_8m() -> TargetProfile {
    TargetProfile::new(8_000_000, 0.05)
}
