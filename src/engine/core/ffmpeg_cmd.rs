//! ffmpeg command construction and execution
//!
//! Two command shapes exist: sample encodes (seeked, fixed-length, quiet)
//! and full passes (whole file, progress on stdout). Both run through
//! cancel-aware runners that kill the child when the stop flag trips and
//! classify the exit so user cancellation never reads as an encoder failure.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::debug;

use super::types::{ProgressParser, SampleWindow};
use crate::engine::error::EncodeError;

/// How many trailing stderr lines to keep in failure messages.
const STDERR_TAIL_LINES: usize = 20;

/// Check if ffmpeg stopped because of a user signal (SIGINT, SIGQUIT,
/// SIGTERM). ffmpeg usually catches the signal and exits on its own with
/// "Exiting normally, received signal X" on stderr, so both the process
/// status and the stderr text have to be checked.
#[cfg(unix)]
fn was_user_cancelled(status: &ExitStatus, stderr: &str) -> bool {
    use std::os::unix::process::ExitStatusExt;

    if let Some(signal) = status.signal() {
        if matches!(signal, 2 | 3 | 15) {
            return true;
        }
    }

    stderr.contains("received signal 2")
        || stderr.contains("received signal 3")
        || stderr.contains("received signal 15")
}

#[cfg(not(unix))]
fn was_user_cancelled(_status: &ExitStatus, stderr: &str) -> bool {
    stderr.contains("received signal")
}

/// Command for one sample-window encode. Seeks before the input so ffmpeg
/// jumps by keyframe instead of decoding up to the window.
pub fn build_sample_cmd(
    source: &Path,
    output: &Path,
    window: SampleWindow,
    encoder: &str,
    quality: u32,
    extra_args: &str,
) -> Command {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-hide_banner", "-y"]);

    cmd.arg("-ss").arg(window.start_s.to_string());
    cmd.arg("-t").arg(window.duration_s.to_string());
    cmd.arg("-i").arg(source);

    apply_codec_args(&mut cmd, encoder, quality);
    apply_extra_args(&mut cmd, extra_args);

    cmd.arg(output);
    cmd
}

/// Command for one full-length pass, reporting progress on stdout.
pub fn build_pass_cmd(
    source: &Path,
    output: &Path,
    encoder: &str,
    quality: u32,
    extra_args: &str,
) -> Command {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-hide_banner", "-y"]);

    cmd.arg("-i").arg(source);
    cmd.arg("-progress").arg("-").arg("-nostats");

    apply_codec_args(&mut cmd, encoder, quality);
    apply_extra_args(&mut cmd, extra_args);

    cmd.arg(output);
    cmd
}

/// Stream selection and codec settings shared by samples and passes. Both
/// must select the same streams or the sample bitrates stop predicting the
/// full-file bitrate.
fn apply_codec_args(cmd: &mut Command, encoder: &str, quality: u32) {
    cmd.arg("-map").arg("0:v:0");
    cmd.arg("-map").arg("0:a?");

    cmd.arg("-c:v").arg(encoder);
    cmd.arg("-q:v").arg(quality.to_string());

    cmd.arg("-c:a").arg("copy");
    cmd.arg("-sn");
}

/// Append user-provided ffmpeg arguments, parsed shell-style.
fn apply_extra_args(cmd: &mut Command, extra_args: &str) {
    if extra_args.is_empty() {
        return;
    }

    if let Some(args) = shlex::split(extra_args) {
        for arg in args {
            cmd.arg(arg);
        }
    } else {
        // Unbalanced quotes; fall back to whitespace splitting.
        for arg in extra_args.split_whitespace() {
            cmd.arg(arg);
        }
    }
}

/// Render a command the way it would be typed in a shell, for logging.
pub fn cmd_to_string(cmd: &Command) -> String {
    let args = cmd
        .get_args()
        .map(|a| a.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    format!("{} {}", cmd.get_program().to_string_lossy(), args)
}

/// Run an encode with no console output, polling so the child can be killed
/// as soon as the cancel flag trips.
pub fn run_quiet(cmd: &mut Command, cancel: &AtomicBool) -> Result<()> {
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::piped());

    debug!("Running: {}", cmd_to_string(cmd));

    let mut child = cmd.spawn().context("Failed to spawn ffmpeg")?;

    let stderr = child.stderr.take().context("Failed to capture stderr")?;
    let stderr_thread = thread::spawn(move || collect_lines(stderr));

    let status = loop {
        if cancel.load(Ordering::Relaxed) {
            let _ = child.kill();
            break child.wait().context("Failed to wait for ffmpeg")?;
        }
        match child.try_wait().context("Failed to poll ffmpeg")? {
            Some(status) => break status,
            None => thread::sleep(Duration::from_millis(100)),
        }
    };

    let stderr_output = stderr_thread
        .join()
        .unwrap_or_else(|_| "Failed to capture stderr".to_string());

    classify_exit(status, &stderr_output, cancel)
}

/// Run a full pass, printing a single-line progress readout parsed from
/// ffmpeg's `-progress` output.
pub fn run_with_progress(cmd: &mut Command, duration_s: f64, cancel: &AtomicBool) -> Result<()> {
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    debug!("Running: {}", cmd_to_string(cmd));

    let mut child = cmd.spawn().context("Failed to spawn ffmpeg")?;

    let stderr = child.stderr.take().context("Failed to capture stderr")?;
    let stderr_thread = thread::spawn(move || collect_lines(stderr));

    let stdout = child.stdout.take().context("Failed to capture stdout")?;
    let reader = BufReader::new(stdout);
    let mut parser = ProgressParser::new();
    let mut killed = false;

    for line in reader.lines().map_while(Result::ok) {
        parser.parse_line(&line);

        if cancel.load(Ordering::Relaxed) && !killed {
            let _ = child.kill();
            killed = true;
            continue;
        }

        let pct = parser.progress_pct(Some(duration_s));
        if pct > 0.0 {
            print!("\rProgress: {:.1}%", pct);
            if let Some(fps) = parser.fps {
                print!(" | FPS: {:.1}", fps);
            }
            if let Some(speed) = parser.speed {
                print!(" | Speed: {:.2}x", speed);
            }
            io::stdout().flush().ok();
        }
    }

    let status = child.wait().context("Failed to wait for ffmpeg")?;
    println!();

    let stderr_output = stderr_thread
        .join()
        .unwrap_or_else(|_| "Failed to capture stderr".to_string());

    classify_exit(status, &stderr_output, cancel)
}

fn collect_lines(stream: impl Read) -> String {
    let mut output = String::new();
    let reader = BufReader::new(stream);
    for line in reader.lines().map_while(Result::ok) {
        output.push_str(&line);
        output.push('\n');
    }
    output
}

fn classify_exit(status: ExitStatus, stderr: &str, cancel: &AtomicBool) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    if cancel.load(Ordering::Relaxed) || was_user_cancelled(&status, stderr) {
        return Err(EncodeError::Cancelled.into());
    }
    bail!("ffmpeg exited with {}:\n{}", status, stderr_tail(stderr));
}

/// Last lines of stderr, enough to show the actual failure without the full
/// transcript.
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    if lines.len() > STDERR_TAIL_LINES {
        lines[lines.len() - STDERR_TAIL_LINES..].join("\n")
    } else {
        stderr.trim_end().to_string()
    }
}
