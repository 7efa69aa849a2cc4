// Input probing and bitrate measurement using ffprobe

use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, anyhow, bail};

use crate::engine::core::VideoAsset;
use crate::engine::encoder::BitrateProbe;

/// Probe height and duration for one input. Runs once per asset before the
/// search starts; nothing re-probes the source afterwards.
pub fn probe_asset(path: &Path) -> Result<VideoAsset> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "-select_streams",
            "v:0",
        ])
        .arg(path)
        .output()
        .context("Failed to run ffprobe")?;

    if !output.status.success() {
        bail!(
            "ffprobe failed for {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).context("Failed to parse ffprobe JSON")?;

    parse_asset(path, &json)
}

fn parse_asset(path: &Path, json: &serde_json::Value) -> Result<VideoAsset> {
    let streams = json["streams"]
        .as_array()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("No video stream found in {}", path.display()))?;
    let stream = &streams[0];

    let height = stream["height"]
        .as_u64()
        .ok_or_else(|| anyhow!("No video height reported for {}", path.display()))?
        as u32;

    // Container duration is authoritative; per-stream duration fills in for
    // containers that do not report one at format level.
    let duration_s = parse_f64_field(&json["format"]["duration"])
        .or_else(|| parse_f64_field(&stream["duration"]))
        .ok_or_else(|| anyhow!("No duration reported for {}", path.display()))?;

    if duration_s <= 0.0 {
        bail!("Non-positive duration reported for {}", path.display());
    }

    Ok(VideoAsset {
        path: path.to_path_buf(),
        duration_s,
        height,
    })
}

/// Measures bitrate from embedded metadata, falling back to file size over
/// duration when neither the stream nor the container reports one.
pub struct FfprobeBitrate;

impl BitrateProbe for FfprobeBitrate {
    fn measure(&self, path: &Path) -> Result<u64> {
        let output = Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "-select_streams",
                "v:0",
            ])
            .arg(path)
            .output()
            .context("Failed to run ffprobe")?;

        if !output.status.success() {
            bail!(
                "ffprobe failed for {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr)
            );
        }

        let json: serde_json::Value =
            serde_json::from_slice(&output.stdout).context("Failed to parse ffprobe JSON")?;
        let size_bytes = fs::metadata(path).map(|m| m.len()).ok();

        parse_bitrate(&json, size_bytes)
            .ok_or_else(|| anyhow!("No usable bitrate for {}", path.display()))
    }
}

/// stream bit_rate -> format bit_rate -> size * 8 / duration.
fn parse_bitrate(json: &serde_json::Value, size_bytes: Option<u64>) -> Option<u64> {
    if let Some(rate) = parse_u64_field(&json["streams"][0]["bit_rate"]) {
        return Some(rate);
    }
    if let Some(rate) = parse_u64_field(&json["format"]["bit_rate"]) {
        return Some(rate);
    }

    let duration_s = parse_f64_field(&json["format"]["duration"])?;
    if duration_s <= 0.0 {
        return None;
    }
    let size = size_bytes?;
    Some((size as f64 * 8.0 / duration_s).round() as u64)
}

// ffprobe reports numeric fields as JSON strings.
fn parse_f64_field(value: &serde_json::Value) -> Option<f64> {
    value.as_str().and_then(|s| s.parse::<f64>().ok())
}

fn parse_u64_field(value: &serde_json::Value) -> Option<u64> {
    value
        .as_str()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|&b| b > 0)
}
