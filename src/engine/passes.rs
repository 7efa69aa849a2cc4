//! Full-length pass orchestration
//!
//! Runs the sample search, then up to three full encodes of the asset. Pass
//! 1 uses the searched quality; pass 2 applies a proportional correction to
//! the measured result; pass 3 interpolates between the first two and is
//! final whatever it lands at. Every pass writes over the same output path,
//! so the file left on disk is always the last attempt.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::engine::core::{PassRecord, SearchHistory, TargetProfile, VideoAsset};
use crate::engine::encoder::{BitrateProbe, Encoder};
use crate::engine::error::{EncodeError, Stage, fail_stage};
use crate::engine::{planner, search};

/// Hard cap on full-length encodes per asset.
pub const MAX_PASSES: u8 = 3;

/// What happened to one asset: the quality and bitrate it shipped with, how
/// many passes that took, and the full path taken to get there.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub final_quality: u32,
    pub final_bitrate_bps: u64,
    pub pass_count: u8,
    pub within_tolerance: bool,
    pub passes: Vec<PassRecord>,
    pub search: SearchHistory,
}

/// Transcode one asset to the target profile.
///
/// The output lands at `output` even when the tolerance is missed; a miss
/// after three passes is reported, not retried.
pub fn run<E, P>(
    encoder: &E,
    probe: &P,
    asset: &VideoAsset,
    output: &Path,
    profile: &TargetProfile,
    cancel: &AtomicBool,
) -> Result<PassReport>
where
    E: Encoder,
    P: BitrateProbe,
{
    let plan = planner::plan(asset.duration_s);
    info!(
        "Searching quality for {} ({} sample windows of {:.0}s)",
        asset.path.display(),
        plan.windows.len(),
        plan.sample_duration_s
    );

    let outcome = search::find(encoder, probe, &asset.path, &plan, profile, cancel)?;
    info!(
        "Search settled on quality {} after {} iterations",
        outcome.quality,
        outcome.history.len()
    );

    check_cancel(cancel)?;

    // Pass 1 goes out at the searched quality.
    let q1 = outcome.quality;
    let b1 = run_pass(encoder, probe, &asset.path, output, q1, 1)?;
    let mut passes = vec![PassRecord {
        pass: 1,
        quality: q1,
        bitrate_bps: b1,
    }];
    if profile.contains(b1) {
        return Ok(finish(outcome.history, passes, true));
    }

    check_cancel(cancel)?;

    // Pass 2 corrects proportionally to how far pass 1 missed.
    let q2 = search::adjust(q1, b1, profile.target_bps);
    info!("Pass 1 landed at {} bps; retrying at quality {}", b1, q2);
    let b2 = run_pass(encoder, probe, &asset.path, output, q2, 2)?;
    passes.push(PassRecord {
        pass: 2,
        quality: q2,
        bitrate_bps: b2,
    });
    if profile.contains(b2) {
        return Ok(finish(outcome.history, passes, true));
    }

    check_cancel(cancel)?;

    // Pass 3 interpolates between the first two measurements and is final.
    let q3 = search::interpolate(q1, b1, q2, b2, profile.target_bps);
    info!("Pass 2 landed at {} bps; final pass at quality {}", b2, q3);
    let b3 = run_pass(encoder, probe, &asset.path, output, q3, 3)?;
    passes.push(PassRecord {
        pass: 3,
        quality: q3,
        bitrate_bps: b3,
    });

    let within_tolerance = profile.contains(b3);
    if !within_tolerance {
        warn!(
            "{} finished {:+.1}% off target after {} passes ({} bps vs {} bps target)",
            asset.path.display(),
            profile.deviation(b3) * 100.0,
            MAX_PASSES,
            b3,
            profile.target_bps
        );
    }
    Ok(finish(outcome.history, passes, within_tolerance))
}

fn run_pass<E, P>(
    encoder: &E,
    probe: &P,
    source: &Path,
    output: &Path,
    quality: u32,
    pass: u8,
) -> Result<u64>
where
    E: Encoder,
    P: BitrateProbe,
{
    let stage = Stage::Pass(pass);

    encoder
        .encode_full(source, output, quality)
        .map_err(|err| fail_stage(err, stage))?;

    match probe.measure(output) {
        Ok(bitrate) => Ok(bitrate),
        Err(err) => {
            debug!("Bitrate probe failed for {}: {:#}", output.display(), err);
            // An output that cannot be verified must not survive the abort;
            // a rerun would see the file and skip the asset as done.
            let _ = fs::remove_file(output);
            Err(EncodeError::MeasurementUnavailable {
                path: output.to_path_buf(),
                stage,
            }
            .into())
        }
    }
}

fn finish(search: SearchHistory, passes: Vec<PassRecord>, within_tolerance: bool) -> PassReport {
    let last = passes[passes.len() - 1];
    PassReport {
        final_quality: last.quality,
        final_bitrate_bps: last.bitrate_bps,
        pass_count: last.pass,
        within_tolerance,
        passes,
        search,
    }
}

fn check_cancel(cancel: &AtomicBool) -> Result<()> {
    if cancel.load(Ordering::Relaxed) {
        return Err(EncodeError::Cancelled.into());
    }
    Ok(())
}
