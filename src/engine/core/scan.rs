use std::path::{Path, PathBuf};

use anyhow::Result;
use walkdir::WalkDir;

use super::types::{BatchJob, JobStatus};

/// Video file extensions considered for transcoding
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "mov", "avi", "flv", "m4v", "wmv"];

/// Check if a path has a video file extension
pub fn is_video_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        if let Some(ext_str) = ext.to_str() {
            return VIDEO_EXTENSIONS.contains(&ext_str.to_lowercase().as_str());
        }
    }
    false
}

/// Scan a directory recursively for video files and invoke a callback for
/// each file found. Dot-directories are not descended into; the sample temp
/// dirs live in one and must never be queued as inputs.
pub fn scan_streaming<F>(root: &Path, mut on_file: F) -> Result<()>
where
    F: FnMut(PathBuf),
{
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden_name(e.file_name()));

    for entry in walker.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_file() && is_video_file(path) {
            on_file(path.to_path_buf());
        }
    }

    Ok(())
}

/// Scan a directory recursively for video files, sorted for a stable batch
/// order across filesystems.
pub fn scan(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    scan_streaming(root, |path| files.push(path))?;
    files.sort();
    Ok(files)
}

fn is_hidden_name(name: &std::ffi::OsStr) -> bool {
    name.to_str().map(|s| s.starts_with('.')).unwrap_or(false)
}

/// Output path for an input: `<stem>.<suffix>.<container>` in the same
/// directory as the input file.
pub fn derive_output_path(input_path: &Path, suffix: &str, container: &str) -> PathBuf {
    let dir = input_path.parent().unwrap_or_else(|| Path::new("."));
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    dir.join(format!("{}.{}.{}", stem, suffix, container))
}

/// Whether a file is itself a derived output from a previous run, judged by
/// the `.{suffix}` marker at the end of its stem.
pub fn is_derived_output(path: &Path, suffix: &str) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|stem| stem.ends_with(&format!(".{suffix}")))
        .unwrap_or(false)
}

/// Build the job list for a set of inputs. Files that are already derived
/// outputs are dropped entirely; jobs whose output exists are marked Skipped
/// unless overwrite is set.
pub fn build_batch(
    files: Vec<PathBuf>,
    suffix: &str,
    container: &str,
    overwrite: bool,
) -> Vec<BatchJob> {
    files
        .into_iter()
        .filter(|path| !is_derived_output(path, suffix))
        .map(|input| {
            let output = derive_output_path(&input, suffix, container);
            let mut job = BatchJob::new(input, output);
            if !overwrite && job.output_path.exists() {
                job.status = JobStatus::Skipped;
            }
            job
        })
        .collect()
}
