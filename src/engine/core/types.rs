use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Pending,
    Running, // Quality search plus full-length passes
    Done,
    Failed,
    Skipped,
}

/// One input file in a batch, with its derived output path.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub id: Uuid,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub status: JobStatus,
    pub last_error: Option<String>,
}

impl BatchJob {
    /// Create a new pending job
    pub fn new(input_path: PathBuf, output_path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            input_path,
            output_path,
            status: JobStatus::Pending,
            last_error: None,
        }
    }
}

/// A probed input video. Built once per input and never mutated; the whole
/// search for an asset runs against the same duration and height.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoAsset {
    pub path: PathBuf,
    pub duration_s: f64,
    pub height: u32,
}

/// One sample slice of the source, used to cheaply estimate the bitrate a
/// quality setting would produce.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleWindow {
    pub start_s: f64,
    pub duration_s: f64,
}

/// One search iteration: the quality tried and the mean sample bitrate it
/// produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityAttempt {
    pub quality: u32,
    pub bitrate_bps: u64,
}

/// Append-only record of every quality tried during one search. Owned by a
/// single search invocation; attempts are never rewritten.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchHistory {
    attempts: Vec<QualityAttempt>,
}

impl SearchHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, attempt: QualityAttempt) {
        self.attempts.push(attempt);
    }

    pub fn attempts(&self) -> &[QualityAttempt] {
        &self.attempts
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn last(&self) -> Option<&QualityAttempt> {
        self.attempts.last()
    }
}

/// One completed full-length encode attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassRecord {
    pub pass: u8,
    pub quality: u32,
    pub bitrate_bps: u64,
}

/// Parser for ffmpeg progress output (key=value format)
#[derive(Debug, Default, Clone)]
pub struct ProgressParser {
    pub out_time_us: u64,
    pub fps: Option<f64>,
    pub speed: Option<f64>,
    pub bitrate_kbps: Option<f64>,
    pub is_complete: bool,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a single line of ffmpeg progress output
    pub fn parse_line(&mut self, line: &str) {
        if let Some((key, value)) = line.split_once('=') {
            match key.trim() {
                "out_time_us" => {
                    if let Ok(us) = value.trim().parse::<u64>() {
                        self.out_time_us = us;
                    }
                }
                "fps" => {
                    if let Ok(f) = value.trim().parse::<f64>() {
                        self.fps = Some(f);
                    }
                }
                "speed" => {
                    // Speed is in format "1.23x", strip the 'x'
                    let speed_str = value.trim().trim_end_matches('x');
                    if let Ok(s) = speed_str.parse::<f64>() {
                        self.speed = Some(s);
                    }
                }
                "bitrate" => {
                    // Bitrate is in format "123.4kbits/s", extract number
                    let bitrate_str = value.trim().trim_end_matches("kbits/s");
                    if let Ok(b) = bitrate_str.parse::<f64>() {
                        self.bitrate_kbps = Some(b);
                    }
                }
                "progress" => {
                    if value.trim() == "end" {
                        self.is_complete = true;
                    }
                }
                _ => {}
            }
        }
    }

    /// Get output time in seconds
    pub fn out_time_s(&self) -> f64 {
        self.out_time_us as f64 / 1_000_000.0
    }

    /// Calculate progress percentage given total duration
    pub fn progress_pct(&self, duration_s: Option<f64>) -> f64 {
        if let Some(dur) = duration_s {
            if dur > 0.0 {
                return (self.out_time_s() / dur * 100.0).min(100.0);
            }
        }
        0.0
    }
}
