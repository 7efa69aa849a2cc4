//! Sample-based quality search
//!
//! Hardware encoders expose a 0-100 quality knob instead of a bitrate
//! target, so the mapping from quality to bitrate has to be discovered per
//! asset. The search encodes the planned sample windows at a candidate
//! quality, averages the measured bitrates, and steps the quality until the
//! estimate lands inside the tolerance band. The integer quality scale means
//! the search can orbit the target without ever entering the band; the
//! oscillation and saturation checks end it deterministically when that
//! happens.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use tracing::{debug, warn};

use crate::engine::core::{QualityAttempt, SearchHistory, TargetProfile};
use crate::engine::encoder::{BitrateProbe, Encoder};
use crate::engine::error::{EncodeError, Stage, fail_stage};
use crate::engine::planner::SamplePlan;

/// First quality tried for every asset.
pub const INITIAL_QUALITY: u32 = 60;

/// Hard cap on search iterations. Oscillation and saturation checks end the
/// search long before this; the cap only guards against a pathological
/// encoder response.
const MAX_ITERATIONS: usize = 200;

const MIN_STEP: u32 = 1;
const MAX_STEP: u32 = 10;

/// Result of a quality search: the quality to use for the first full pass
/// and every (quality, bitrate) pair tried on the way there.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub quality: u32,
    pub history: SearchHistory,
}

/// Search for the quality whose sample bitrate lands inside the profile's
/// tolerance band.
///
/// Always returns a usable quality unless the encoder fails or the run is
/// cancelled: a non-converging search falls back to the best information it
/// has instead of erroring out.
pub fn find<E, P>(
    encoder: &E,
    probe: &P,
    source: &Path,
    plan: &SamplePlan,
    profile: &TargetProfile,
    cancel: &AtomicBool,
) -> Result<SearchOutcome>
where
    E: Encoder,
    P: BitrateProbe,
{
    let mut history = SearchHistory::new();
    let mut quality = INITIAL_QUALITY;

    for iteration in 1..=MAX_ITERATIONS {
        let candidate = sample_bitrate(encoder, probe, source, plan, quality, iteration, cancel)?;
        history.push(QualityAttempt {
            quality,
            bitrate_bps: candidate,
        });

        debug!(
            "Iteration {}: quality {} -> {} bps (band {}..{})",
            iteration, quality, candidate, profile.lower_bps, profile.upper_bps
        );

        if profile.contains(candidate) {
            debug!("Converged at quality {} after {} iterations", quality, iteration);
            return Ok(SearchOutcome { quality, history });
        }

        if let Some(period) = detect_cycle(history.attempts()) {
            let picked = pick_from_cycle(history.attempts(), period, profile.target_bps);
            debug!(
                "Quality oscillating with period {}; settling on quality {}",
                period, picked
            );
            return Ok(SearchOutcome {
                quality: picked,
                history,
            });
        }

        let next = adjust(quality, candidate, profile.target_bps);
        if next == quality {
            // Only happens pinned at 0 or 100: the target is out of reach in
            // that direction, so the bound is the best available answer.
            debug!("Quality saturated at {}; target is out of reach", quality);
            return Ok(SearchOutcome { quality, history });
        }

        if iteration == MAX_ITERATIONS {
            break;
        }
        quality = next;
    }

    warn!(
        "Quality search did not settle after {} iterations; keeping last tried quality {}",
        MAX_ITERATIONS, quality
    );
    Ok(SearchOutcome { quality, history })
}

/// Encode every planned window at `quality` and return the mean measured
/// bitrate. Samples are deleted as soon as they are measured, including when
/// the measurement fails.
fn sample_bitrate<E, P>(
    encoder: &E,
    probe: &P,
    source: &Path,
    plan: &SamplePlan,
    quality: u32,
    iteration: usize,
    cancel: &AtomicBool,
) -> Result<u64>
where
    E: Encoder,
    P: BitrateProbe,
{
    let mut rates = Vec::with_capacity(plan.windows.len());

    for (idx, window) in plan.windows.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            return Err(EncodeError::Cancelled.into());
        }

        let stage = Stage::Sample {
            iteration,
            window: idx + 1,
        };

        let sample = encoder
            .encode_sample(source, *window, quality)
            .map_err(|err| fail_stage(err, stage))?;

        let measured = probe.measure(&sample);
        let _ = fs::remove_file(&sample);

        match measured {
            Ok(bitrate) => rates.push(bitrate),
            Err(err) => {
                debug!("Bitrate probe failed for {}: {:#}", sample.display(), err);
                return Err(EncodeError::MeasurementUnavailable {
                    path: sample,
                    stage,
                }
                .into());
            }
        }
    }

    let mean = rates.iter().map(|&b| b as f64).sum::<f64>() / rates.len() as f64;
    Ok(mean.round() as u64)
}

/// Step the quality toward the target, proportionally to how far off the
/// measured bitrate is. A measurement at exactly the target still steps down
/// by one; overshoot beyond 2x the target is treated the same as 2x.
pub fn adjust(quality: u32, actual_bps: u64, target_bps: u64) -> u32 {
    let ratio = actual_bps as f64 / target_bps as f64;
    if actual_bps < target_bps {
        let step = step_for(1.0 - ratio);
        (quality + step).min(100)
    } else {
        let step = step_for((ratio - 1.0).min(1.0));
        quality.saturating_sub(step)
    }
}

fn step_for(distance: f64) -> u32 {
    let step = (MIN_STEP as f64 + (MAX_STEP - MIN_STEP) as f64 * distance).round() as u32;
    step.clamp(MIN_STEP, MAX_STEP)
}

/// Linearly interpolate between two (quality, bitrate) measurements to the
/// quality expected to hit the target, clamped to the 0-100 scale. When the
/// two bitrates are within 1% of the target of each other the slope is
/// unusable and the midpoint quality is returned instead.
pub fn interpolate(q1: u32, b1: u64, q2: u32, b2: u64, target_bps: u64) -> u32 {
    let b1 = b1 as f64;
    let b2 = b2 as f64;
    let target = target_bps as f64;

    if (b1 - b2).abs() < 0.01 * target {
        return ((q1 + q2) as f64 / 2.0).round() as u32;
    }

    let t = (target - b2) / (b1 - b2);
    let q = q2 as f64 + (q1 as f64 - q2 as f64) * t;
    q.round().clamp(0.0, 100.0) as u32
}

/// Detect a repeating quality cycle at the end of the history. Returns the
/// period (2 or 3) when the last `2 * period` attempts are the same quality
/// sequence twice and the cycle visits at least two distinct qualities.
fn detect_cycle(attempts: &[QualityAttempt]) -> Option<usize> {
    for period in [2usize, 3] {
        if attempts.len() < 2 * period {
            continue;
        }
        let tail = &attempts[attempts.len() - 2 * period..];
        let (prev, last) = tail.split_at(period);
        let repeats = prev.iter().zip(last).all(|(a, b)| a.quality == b.quality);
        if repeats && last.iter().any(|a| a.quality != last[0].quality) {
            return Some(period);
        }
    }
    None
}

/// Pick the cycle quality whose bitrate is closest to the target (squared
/// distance). Walks newest-first so a tie keeps the most recent measurement.
fn pick_from_cycle(attempts: &[QualityAttempt], period: usize, target_bps: u64) -> u32 {
    let cycle = &attempts[attempts.len() - period..];

    let mut seen: Vec<u32> = Vec::with_capacity(period);
    let mut best_quality = 0u32;
    let mut best_dist = f64::INFINITY;

    for attempt in cycle.iter().rev() {
        if seen.contains(&attempt.quality) {
            continue;
        }
        seen.push(attempt.quality);

        let diff = attempt.bitrate_bps as f64 - target_bps as f64;
        let dist = diff * diff;
        if dist < best_dist {
            best_dist = dist;
            best_quality = attempt.quality;
        }
    }

    best_quality
}
