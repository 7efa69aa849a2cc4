//! Encoder and measurement seams
//!
//! The search and pass ladder only ever talk to these two traits. The
//! ffmpeg-backed implementations live here and in `probe`; tests drive the
//! engine with scripted implementations instead.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result, bail};

use crate::engine::core::{
    BatchJob, SampleWindow, build_pass_cmd, build_sample_cmd, run_quiet, run_with_progress,
};

/// Temp root created next to each input file. Sample encodes for a job live
/// in a per-job directory underneath it.
pub const TEMP_DIR_NAME: &str = ".qpilot_tmp";

/// Encoding operations the quality search and the pass ladder need.
pub trait Encoder {
    /// Encode one sample window at the given quality and return the path of
    /// the encoded sample.
    fn encode_sample(&self, source: &Path, window: SampleWindow, quality: u32) -> Result<PathBuf>;

    /// Encode the full asset at the given quality, overwriting `output` if
    /// it already exists.
    fn encode_full(&self, source: &Path, output: &Path, quality: u32) -> Result<()>;
}

/// Measures the container bitrate of an encoded file.
pub trait BitrateProbe {
    fn measure(&self, path: &Path) -> Result<u64>;
}

/// ffmpeg-backed encoder for one job. Owns the job's temp directory; call
/// [`FfmpegEncoder::cleanup`] once the job is finished or abandoned.
pub struct FfmpegEncoder<'a> {
    encoder: String,
    extra_args: String,
    sample_ext: String,
    duration_s: f64,
    temp_dir: PathBuf,
    cancel: &'a AtomicBool,
}

impl<'a> FfmpegEncoder<'a> {
    /// Create the encoder and its temp directory `.qpilot_tmp/<job_id>/`
    /// under the parent of the input file. Keeping temp files beside the
    /// source avoids cross-filesystem moves.
    pub fn new(
        job: &BatchJob,
        duration_s: f64,
        encoder: &str,
        extra_args: &str,
        cancel: &'a AtomicBool,
    ) -> Result<Self> {
        let parent = job.input_path.parent().unwrap_or_else(|| Path::new("."));
        let temp_dir = parent.join(TEMP_DIR_NAME).join(job.id.to_string());
        fs::create_dir_all(&temp_dir)
            .with_context(|| format!("Failed to create temp dir: {}", temp_dir.display()))?;

        // Samples use the same container as the real output so measured
        // bitrates include the same muxing overhead.
        let sample_ext = job
            .output_path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("mkv")
            .to_string();

        Ok(Self {
            encoder: encoder.to_string(),
            extra_args: extra_args.to_string(),
            sample_ext,
            duration_s,
            temp_dir,
            cancel,
        })
    }

    /// Remove the job's temp directory and everything in it. Best effort.
    pub fn cleanup(&self) {
        if self.temp_dir.exists() {
            let _ = fs::remove_dir_all(&self.temp_dir);
        }
    }

    /// Sample file path for one (window, quality) encode. The temp dir is
    /// per-job, so window start and quality are enough to keep names unique.
    fn sample_path(&self, window: SampleWindow, quality: u32) -> PathBuf {
        let name = format!(
            "sample_{:.1}s_q{}.{}",
            window.start_s, quality, self.sample_ext
        );
        self.temp_dir.join(name)
    }
}

impl Encoder for FfmpegEncoder<'_> {
    fn encode_sample(&self, source: &Path, window: SampleWindow, quality: u32) -> Result<PathBuf> {
        let output = self.sample_path(window, quality);

        let mut cmd = build_sample_cmd(
            source,
            &output,
            window,
            &self.encoder,
            quality,
            &self.extra_args,
        );

        if let Err(err) = run_quiet(&mut cmd, self.cancel) {
            // Never leave a partial sample behind.
            let _ = fs::remove_file(&output);
            return Err(err);
        }

        if !output.exists() {
            bail!("Sample encode produced no output file");
        }
        Ok(output)
    }

    fn encode_full(&self, source: &Path, output: &Path, quality: u32) -> Result<()> {
        let mut cmd = build_pass_cmd(source, output, &self.encoder, quality, &self.extra_args);

        if let Err(err) = run_with_progress(&mut cmd, self.duration_s, self.cancel) {
            // A partial output is unusable; remove it so a later scan does
            // not mistake it for a finished encode.
            let _ = fs::remove_file(output);
            return Err(err);
        }

        if !output.exists() {
            bail!("Encode produced no output file");
        }
        Ok(())
    }
}
