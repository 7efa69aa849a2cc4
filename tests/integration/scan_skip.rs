// Directory discovery and skip conventions against a real filesystem

use std::fs::{self, File};
use std::path::Path;

use qpilot::engine::core::{JobStatus, build_batch, derive_output_path, scan};
use tempfile::TempDir;

#[test]
fn test_scan_finds_videos_and_ignores_dot_dirs_and_non_videos() {
    let dir = TempDir::new().unwrap();
    File::create(dir.path().join("a.mkv")).unwrap();
    File::create(dir.path().join("b.mp4")).unwrap();
    File::create(dir.path().join("notes.txt")).unwrap();
    fs::create_dir(dir.path().join(".qpilot_tmp")).unwrap();
    File::create(dir.path().join(".qpilot_tmp").join("sample_0.0s_q60.mkv")).unwrap();

    let files = scan(dir.path()).unwrap();
    let names: Vec<_> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.mkv", "b.mp4"]);
}

#[test]
fn test_batch_skips_inputs_whose_output_exists_unless_overwrite() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("movie.mkv");
    File::create(&input).unwrap();
    let output = derive_output_path(&input, "qpilot", "mkv");
    File::create(&output).unwrap();

    // The finished output is a video file too, but never becomes a job.
    let files = scan(dir.path()).unwrap();
    assert_eq!(files.len(), 2);

    let jobs = build_batch(files.clone(), "qpilot", "mkv", false);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].input_path, input);
    assert_eq!(jobs[0].status, JobStatus::Skipped);

    let jobs = build_batch(files, "qpilot", "mkv", true);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Pending);
}

#[test]
fn test_derived_output_lands_next_to_input() {
    let output = derive_output_path(Path::new("/shows/show.s01e01.mp4"), "qpilot", "mkv");
    assert_eq!(output, Path::new("/shows/show.s01e01.qpilot.mkv"));
}
