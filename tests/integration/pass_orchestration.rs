// Full pipeline behavior: search, passes, correction and interpolation

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use anyhow::{Result, anyhow};
use qpilot::engine::core::SampleWindow;
use qpilot::engine::encoder::{BitrateProbe, Encoder};
use qpilot::engine::error::is_cancelled;
use qpilot::engine::passes;
use tempfile::TempDir;

use crate::common::helpers::{MockCodec, long_asset, profile_8m, short_asset};

fn out_path() -> PathBuf {
    PathBuf::from("/media/clip.qpilot.mkv")
}

/// Encoder that writes real output files, with measurements that work on
/// samples but never on the finished output.
struct UnmeasurableOutputCodec {
    sample_bps: u64,
}

impl Encoder for UnmeasurableOutputCodec {
    fn encode_sample(&self, _source: &Path, window: SampleWindow, quality: u32) -> Result<PathBuf> {
        Ok(PathBuf::from(format!(
            "raw_sample_{}s_q{}.mkv",
            window.start_s, quality
        )))
    }

    fn encode_full(&self, _source: &Path, output: &Path, _quality: u32) -> Result<()> {
        fs::write(output, b"encoded")?;
        Ok(())
    }
}

impl BitrateProbe for UnmeasurableOutputCodec {
    fn measure(&self, path: &Path) -> Result<u64> {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.starts_with("raw_sample_") {
            Ok(self.sample_bps)
        } else {
            Err(anyhow!("no bit_rate field for {}", path.display()))
        }
    }
}

#[test]
fn test_single_pass_when_first_encode_lands_in_band() {
    // Three sample windows and the full encode all land exactly on target.
    let codec = MockCodec::uniform(|_| 8_000_000);
    let asset = long_asset();
    let cancel = AtomicBool::new(false);

    let report =
        passes::run(&codec, &codec, &asset, &out_path(), &profile_8m(), &cancel).unwrap();

    assert_eq!(report.pass_count, 1);
    assert!(report.within_tolerance);
    assert_eq!(report.final_quality, 60);
    assert_eq!(report.final_bitrate_bps, 8_000_000);
    assert_eq!(report.passes.len(), 1);
    assert_eq!(report.search.len(), 1);
    assert_eq!(codec.sample_encodes.get(), 3);
    assert_eq!(codec.full_encodes.get(), 1);
}

#[test]
fn test_second_pass_corrects_full_encode_overshoot() {
    // Samples predict 8.4M at quality 56, but the full encode lands at
    // 9.0M. The proportional correction steps down to 54, which lands.
    let codec = MockCodec::new(
        |q| 150_000 * q as u64,
        |q| match q {
            56 => 9_000_000,
            54 => 8_100_000,
            other => panic!("unexpected full-pass quality {other}"),
        },
    );
    let asset = short_asset();
    let cancel = AtomicBool::new(false);

    let report =
        passes::run(&codec, &codec, &asset, &out_path(), &profile_8m(), &cancel).unwrap();

    assert_eq!(report.pass_count, 2);
    assert!(report.within_tolerance);
    assert_eq!(report.final_quality, 54);
    assert_eq!(report.final_bitrate_bps, 8_100_000);
    assert_eq!(report.passes[0].quality, 56);
    assert_eq!(report.passes[0].bitrate_bps, 9_000_000);
    assert_eq!(report.search.len(), 3);
    assert_eq!(codec.full_encodes.get(), 2);
}

#[test]
fn test_third_pass_interpolates_between_two_misses() {
    // Pass 1 badly overshoots, the corrected pass 2 undershoots; pass 3
    // interpolates the two measurements and lands between them.
    let codec = MockCodec::new(
        |_| 8_000_000,
        |q| match q {
            60 => 14_050_000,
            52 => 7_500_000,
            53 => 8_200_000,
            other => panic!("unexpected full-pass quality {other}"),
        },
    );
    let asset = short_asset();
    let cancel = AtomicBool::new(false);

    let report =
        passes::run(&codec, &codec, &asset, &out_path(), &profile_8m(), &cancel).unwrap();

    assert_eq!(report.pass_count, 3);
    assert!(report.within_tolerance);
    assert_eq!(report.final_quality, 53);
    assert_eq!(report.final_bitrate_bps, 8_200_000);
    let qualities: Vec<u32> = report.passes.iter().map(|p| p.quality).collect();
    assert_eq!(qualities, vec![60, 52, 53]);
    assert_eq!(codec.full_encodes.get(), 3);
}

#[test]
fn test_report_flags_tolerance_miss_after_three_passes() {
    // The encoder refuses to come down whatever the quality. Three passes
    // run, the result ships anyway and the report says it missed.
    let codec = MockCodec::new(|_| 8_000_000, |_| 14_000_000);
    let asset = short_asset();
    let cancel = AtomicBool::new(false);

    let report =
        passes::run(&codec, &codec, &asset, &out_path(), &profile_8m(), &cancel).unwrap();

    assert_eq!(report.pass_count, 3);
    assert!(!report.within_tolerance);
    assert_eq!(report.final_bitrate_bps, 14_000_000);
    // Identical pass 1 and 2 bitrates give no slope; pass 3 takes the
    // midpoint of qualities 60 and 52.
    assert_eq!(report.final_quality, 56);
    assert_eq!(codec.full_encodes.get(), 3);
}

#[test]
fn test_unmeasurable_output_is_deleted_on_abort() {
    // The full encode succeeds but its bitrate cannot be read back. The
    // asset must abort without leaving the unverified file behind, or the
    // next run would skip it as already done.
    let codec = UnmeasurableOutputCodec {
        sample_bps: 8_000_000,
    };
    let asset = short_asset();
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("clip.qpilot.mkv");
    let cancel = AtomicBool::new(false);

    let err = passes::run(&codec, &codec, &asset, &output, &profile_8m(), &cancel).unwrap_err();

    assert!(!is_cancelled(&err));
    assert!(err.to_string().contains("no bitrate could be determined"));
    assert!(!output.exists());
}

#[test]
fn test_cancelled_run_encodes_nothing() {
    let codec = MockCodec::uniform(|_| 8_000_000);
    let asset = short_asset();
    let cancel = AtomicBool::new(true);

    let err =
        passes::run(&codec, &codec, &asset, &out_path(), &profile_8m(), &cancel).unwrap_err();

    assert!(is_cancelled(&err));
    assert_eq!(codec.sample_encodes.get(), 0);
    assert_eq!(codec.full_encodes.get(), 0);
}
