use anyhow::{Context, Result};
use std::process::Command;

/// Check if ffmpeg is available and return its version line
pub fn ffmpeg_version() -> Result<String> {
    let output = Command::new("ffmpeg")
        .arg("-version")
        .output()
        .context("Failed to execute ffmpeg. Is ffmpeg installed and in PATH?")?;

    if !output.status.success() {
        anyhow::bail!("ffmpeg command failed with status: {}", output.status);
    }

    let version_output = String::from_utf8_lossy(&output.stdout);
    let first_line = version_output.lines().next().unwrap_or("Unknown version");

    Ok(first_line.to_string())
}

/// Check if ffprobe is available and return its version line
pub fn ffprobe_version() -> Result<String> {
    let output = Command::new("ffprobe")
        .arg("-version")
        .output()
        .context("Failed to execute ffprobe. Is ffprobe installed and in PATH?")?;

    if !output.status.success() {
        anyhow::bail!("ffprobe command failed with status: {}", output.status);
    }

    let version_output = String::from_utf8_lossy(&output.stdout);
    let first_line = version_output.lines().next().unwrap_or("Unknown version");

    Ok(first_line.to_string())
}

/// Whether this ffmpeg build ships the named encoder.
pub fn encoder_available(encoder: &str) -> bool {
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .output();

    match output {
        Ok(out) if out.status.success() => {
            encoder_listed(&String::from_utf8_lossy(&out.stdout), encoder)
        }
        _ => false,
    }
}

// `-encoders` lines look like " V....D hevc_videotoolbox  VideoToolbox H.265".
// The flags column comes first, so the name is the second field.
fn encoder_listed(listing: &str, encoder: &str) -> bool {
    listing
        .lines()
        .any(|line| line.split_whitespace().nth(1) == Some(encoder))
}
