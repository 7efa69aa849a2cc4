mod ffmpeg_cmd;
mod ffmpeg_info;
mod profile;
mod scan;
mod types;

pub use ffmpeg_cmd::{
    build_pass_cmd, build_sample_cmd, cmd_to_string, run_quiet, run_with_progress,
};
pub use ffmpeg_info::{encoder_available, ffmpeg_version, ffprobe_version};
pub use profile::{DEFAULT_TOLERANCE, TargetProfile, tier_for_height};
pub use scan::{
    build_batch, derive_output_path, is_derived_output, is_video_file, scan, scan_streaming,
};
pub use types::{
    BatchJob, JobStatus, PassRecord, ProgressParser, QualityAttempt, SampleWindow, SearchHistory,
    VideoAsset,
};
