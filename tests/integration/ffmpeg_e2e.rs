// End-to-end tests that run the real ffmpeg binary when it is installed
//
// The encodes use ffmpeg's built-in mpeg4 encoder so the tests do not
// depend on optional codec libraries.

use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::AtomicBool;

use qpilot::engine::core::{BatchJob, SampleWindow, derive_output_path};
use qpilot::engine::encoder::{BitrateProbe, Encoder, FfmpegEncoder};
use qpilot::engine::probe::{FfprobeBitrate, probe_asset};
use tempfile::TempDir;

fn tool_available(tool: &str) -> bool {
    Command::new(tool)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

// Skip the test when ffmpeg/ffprobe are not installed
macro_rules! require_ffmpeg {
    () => {
        if !tool_available("ffmpeg") || !tool_available("ffprobe") {
            eprintln!("Skipping test: ffmpeg/ffprobe not available");
            return;
        }
    };
}

/// Generate 2 seconds of testsrc at 320x240.
fn generate_test_video(path: &Path) {
    let status = Command::new("ffmpeg")
        .args([
            "-hide_banner",
            "-y",
            "-f",
            "lavfi",
            "-i",
            "testsrc=duration=2:size=320x240:rate=30",
            "-c:v",
            "mpeg4",
            "-q:v",
            "5",
        ])
        .arg(path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("failed to run ffmpeg");
    assert!(status.success(), "test video generation failed");
}

#[test]
fn e2e_probe_reads_height_duration_and_bitrate() {
    require_ffmpeg!();

    let dir = TempDir::new().unwrap();
    let input = dir.path().join("clip.mp4");
    generate_test_video(&input);

    let asset = probe_asset(&input).unwrap();
    assert_eq!(asset.height, 240);
    assert!(
        asset.duration_s > 1.5 && asset.duration_s < 2.5,
        "unexpected duration {}",
        asset.duration_s
    );

    let bitrate = FfprobeBitrate.measure(&input).unwrap();
    assert!(bitrate > 0);
}

#[test]
fn e2e_sample_encode_measures_and_cleans_up() {
    require_ffmpeg!();

    let dir = TempDir::new().unwrap();
    let input = dir.path().join("clip.mp4");
    generate_test_video(&input);

    let job = BatchJob::new(input.clone(), derive_output_path(&input, "qpilot", "mp4"));
    let cancel = AtomicBool::new(false);
    let encoder = FfmpegEncoder::new(&job, 2.0, "mpeg4", "", &cancel).unwrap();

    let window = SampleWindow {
        start_s: 0.0,
        duration_s: 1.0,
    };
    let sample = encoder.encode_sample(&input, window, 5).unwrap();
    assert!(sample.exists());
    assert!(FfprobeBitrate.measure(&sample).unwrap() > 0);

    encoder.cleanup();
    assert!(!sample.exists());
}

#[test]
fn e2e_full_pass_writes_the_output() {
    require_ffmpeg!();

    let dir = TempDir::new().unwrap();
    let input = dir.path().join("clip.mp4");
    generate_test_video(&input);

    let output = derive_output_path(&input, "qpilot", "mp4");
    let job = BatchJob::new(input.clone(), output.clone());
    let cancel = AtomicBool::new(false);
    let encoder = FfmpegEncoder::new(&job, 2.0, "mpeg4", "", &cancel).unwrap();

    encoder.encode_full(&input, &output, 5).unwrap();
    assert!(output.exists());
    assert!(FfprobeBitrate.measure(&output).unwrap() > 0);

    encoder.cleanup();
}
