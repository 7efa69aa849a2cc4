//! Sample-window planning
//!
//! Picks the short slices of the source that the quality search encodes to
//! estimate what bitrate a quality setting would produce on the full asset.
//! Multiple windows average out local complexity variance; the fixed 60s
//! length trades iteration latency for estimate accuracy.

use crate::engine::core::SampleWindow;

/// Base sample length in seconds.
pub const SAMPLE_DURATION_S: f64 = 60.0;

/// Window positions for long assets, as percentages of the duration.
const WINDOW_POSITIONS_PCT: [f64; 3] = [10.0, 50.0, 90.0];

/// Windows picked for one asset. Computed once, read-only during the search.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplePlan {
    pub windows: Vec<SampleWindow>,
    pub sample_duration_s: f64,
}

/// Plan sample windows for an asset duration.
///
/// - under 60s: the whole clip as one window
/// - 60-119s: one 60s window at the start
/// - 120-179s: two 60s windows, one at the start and one ending at the tail
/// - 180s and up: three 60s windows at 10%/50%/90% of the duration, each
///   offset clamped into [0, duration - 60] so a full window always fits
pub fn plan(duration_s: f64) -> SamplePlan {
    if duration_s < SAMPLE_DURATION_S {
        return SamplePlan {
            windows: vec![SampleWindow {
                start_s: 0.0,
                duration_s,
            }],
            sample_duration_s: duration_s,
        };
    }

    let windows = if duration_s < 2.0 * SAMPLE_DURATION_S {
        vec![SampleWindow {
            start_s: 0.0,
            duration_s: SAMPLE_DURATION_S,
        }]
    } else if duration_s < 3.0 * SAMPLE_DURATION_S {
        vec![
            SampleWindow {
                start_s: 0.0,
                duration_s: SAMPLE_DURATION_S,
            },
            SampleWindow {
                start_s: duration_s - SAMPLE_DURATION_S,
                duration_s: SAMPLE_DURATION_S,
            },
        ]
    } else {
        WINDOW_POSITIONS_PCT
            .iter()
            .map(|pct| SampleWindow {
                start_s: (duration_s * pct / 100.0).clamp(0.0, duration_s - SAMPLE_DURATION_S),
                duration_s: SAMPLE_DURATION_S,
            })
            .collect()
    };

    SamplePlan {
        windows,
        sample_duration_s: SAMPLE_DURATION_S,
    }
}
