// Target bitrate selection and the tolerance band around it

/// Default tolerance around the target bitrate (±5%).
pub const DEFAULT_TOLERANCE: f64 = 0.05;

/// Target bitrate an asset should land at, with the acceptance band
/// precomputed. Immutable per asset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetProfile {
    pub target_bps: u64,
    pub tolerance: f64,
    pub lower_bps: u64,
    pub upper_bps: u64,
}

impl TargetProfile {
    pub fn new(target_bps: u64, tolerance: f64) -> Self {
        let lower_bps = (target_bps as f64 * (1.0 - tolerance)).round() as u64;
        let upper_bps = (target_bps as f64 * (1.0 + tolerance)).round() as u64;
        Self {
            target_bps,
            tolerance,
            lower_bps,
            upper_bps,
        }
    }

    /// Derive the target from the source height tier table.
    pub fn for_height(height: u32, tolerance: f64) -> Self {
        Self::new(tier_for_height(height), tolerance)
    }

    /// Whether a measured bitrate lands inside the band (bounds inclusive).
    pub fn contains(&self, bitrate_bps: u64) -> bool {
        self.lower_bps <= bitrate_bps && bitrate_bps <= self.upper_bps
    }

    /// Signed deviation of a measurement from the target, as a fraction of
    /// the target. Positive means over target.
    pub fn deviation(&self, bitrate_bps: u64) -> f64 {
        (bitrate_bps as f64 - self.target_bps as f64) / self.target_bps as f64
    }
}

/// Bitrate tier by source height. Doubling ladder anchored at 1080p = 8 Mbps.
pub fn tier_for_height(height: u32) -> u64 {
    if height >= 2160 {
        16_000_000
    } else if height >= 1080 {
        8_000_000
    } else if height >= 720 {
        4_000_000
    } else {
        2_000_000
    }
}
