use crate::model::{DocumentRecord, LineScanStatus};
use crate::scope::canonical_bonus_markers;

const TEXT_BASE: f64 = 25.0;
const BINARY_BASE: f64 = 10.0;
const SCAN_OK_BONUS: f64 = 20.0;
const TIER_HIGH_BONUS: f64 = 25.0;
const TIER_MID_BONUS: f64 = 15.0;
const TIER_LOW_BONUS: f64 = 8.0;
const CANONICAL_BONUS: f64 = 10.0;
const DUPLICATE_STEP_PENALTY: f64 = 5.0;
const DUPLICATE_MAX_PENALTY: f64 = 20.0;
const OVERSIZE_PENALTY: f64 = 5.0;
const OVERSIZE_BYTES: u64 = 2_000_000;

pub const TIER_HIGH_MIN_WEIGHT: i64 = 200;
pub const TIER_MID_MIN_WEIGHT: i64 = 120;

/// Signals the score is computed from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreInputs<'a> {
    pub source_path: &'a str,
    pub is_text: bool,
    pub line_scan_status: LineScanStatus,
    pub priority_weight: i64,
    pub duplicate_group_size: usize,
    pub bytes: u64,
}

impl<'a> From<&'a DocumentRecord> for ScoreInputs<'a> {
    fn from(doc: &'a DocumentRecord) -> Self {
        Self {
            source_path: &doc.source_path,
            is_text: doc.is_text,
            line_scan_status: doc.line_scan_status,
            priority_weight: doc.priority_weight,
            duplicate_group_size: doc.duplicate_group_size,
            bytes: doc.bytes,
        }
    }
}

/// Additive 0–100 quality score, rounded to two decimals.
///
/// Every term is independent, so a single missing signal only costs its own weight.
#[must_use]
pub fn quality_score(inputs: ScoreInputs<'_>) -> f64 {
    let mut score = if inputs.is_text { TEXT_BASE } else { BINARY_BASE };

    if inputs.line_scan_status.is_ok() {
        score += SCAN_OK_BONUS;
    }
    score += priority_tier_bonus(inputs.priority_weight);

    #[allow(clippy::cast_precision_loss)]
    let markers = canonical_bonus_markers(inputs.source_path) as f64;
    score += CANONICAL_BONUS * markers;

    score -= duplicate_penalty(inputs.duplicate_group_size);
    if inputs.bytes > OVERSIZE_BYTES {
        score -= OVERSIZE_PENALTY;
    }

    round2(score).clamp(0.0, 100.0)
}

#[must_use]
pub fn priority_tier_bonus(priority_weight: i64) -> f64 {
    if priority_weight >= TIER_HIGH_MIN_WEIGHT {
        TIER_HIGH_BONUS
    } else if priority_weight >= TIER_MID_MIN_WEIGHT {
        TIER_MID_BONUS
    } else if priority_weight > 0 {
        TIER_LOW_BONUS
    } else {
        0.0
    }
}

#[must_use]
pub fn duplicate_penalty(duplicate_group_size: usize) -> f64 {
    if duplicate_group_size <= 1 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let extra = (duplicate_group_size - 1) as f64;
    (extra * DUPLICATE_STEP_PENALTY).min(DUPLICATE_MAX_PENALTY)
}

#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn score_documents(docs: &mut [DocumentRecord]) {
    for doc in docs.iter_mut() {
        doc.quality_score = quality_score(ScoreInputs::from(&*doc));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn inputs(path: &str) -> ScoreInputs<'_> {
        ScoreInputs {
            source_path: path,
            is_text: true,
            line_scan_status: LineScanStatus::Ok,
            priority_weight: 0,
            duplicate_group_size: 1,
            bytes: 100,
        }
    }

    #[test]
    fn baseline_text_scanned_unweighted() {
        assert_eq!(quality_score(inputs("a.md")), 45.0);
    }

    #[test]
    fn binary_unscanned_floor() {
        let score = quality_score(ScoreInputs {
            is_text: false,
            line_scan_status: LineScanStatus::Missing,
            ..inputs("a.bin")
        });
        assert_eq!(score, 10.0);
    }

    #[test]
    fn priority_tiers_use_exact_thresholds() {
        assert_eq!(priority_tier_bonus(0), 0.0);
        assert_eq!(priority_tier_bonus(-5), 0.0);
        assert_eq!(priority_tier_bonus(1), 8.0);
        assert_eq!(priority_tier_bonus(119), 8.0);
        assert_eq!(priority_tier_bonus(120), 15.0);
        assert_eq!(priority_tier_bonus(199), 15.0);
        assert_eq!(priority_tier_bonus(200), 25.0);
    }

    #[test]
    fn canonical_markers_stack() {
        let path = "x/workspace/maroon/canonical/reports/operating_registers/r.md";
        let score = quality_score(ScoreInputs {
            priority_weight: 250,
            ..inputs(path)
        });
        assert_eq!(score, 25.0 + 20.0 + 25.0 + 10.0 + 10.0);
    }

    #[test]
    fn duplicate_penalty_caps_at_twenty() {
        assert_eq!(duplicate_penalty(1), 0.0);
        assert_eq!(duplicate_penalty(2), 5.0);
        assert_eq!(duplicate_penalty(3), 10.0);
        assert_eq!(duplicate_penalty(5), 20.0);
        assert_eq!(duplicate_penalty(50), 20.0);
    }

    #[test]
    fn three_way_duplicate_costs_ten_points() {
        let base = quality_score(ScoreInputs {
            priority_weight: 50,
            ..inputs("a.md")
        });
        let dup = quality_score(ScoreInputs {
            priority_weight: 50,
            duplicate_group_size: 3,
            ..inputs("a.md")
        });
        assert_eq!(base - dup, 10.0);
    }

    #[test]
    fn oversize_penalty_starts_above_two_million() {
        let at = quality_score(ScoreInputs {
            bytes: 2_000_000,
            ..inputs("a.md")
        });
        let above = quality_score(ScoreInputs {
            bytes: 2_000_001,
            ..inputs("a.md")
        });
        assert_eq!(at - above, 5.0);
    }

    #[test]
    fn never_negative() {
        let score = quality_score(ScoreInputs {
            source_path: "a.bin",
            is_text: false,
            line_scan_status: LineScanStatus::Error,
            priority_weight: 0,
            duplicate_group_size: 100,
            bytes: 10_000_000,
        });
        assert_eq!(score, 0.0);
    }

    proptest! {
        #[test]
        fn score_is_bounded_and_two_decimal(
            is_text in any::<bool>(),
            ok in any::<bool>(),
            priority_weight in -10i64..1_000,
            duplicate_group_size in 1usize..64,
            bytes in 0u64..10_000_000,
            canonical in 0usize..3,
        ) {
            let path = match canonical {
                0 => "docs/a.md",
                1 => "x/workspace/maroon/canonical/a.md",
                _ => "x/workspace/maroon/canonical/reports/operating_registers/a.md",
            };
            let score = quality_score(ScoreInputs {
                source_path: path,
                is_text,
                line_scan_status: if ok { LineScanStatus::Ok } else { LineScanStatus::Missing },
                priority_weight,
                duplicate_group_size,
                bytes,
            });
            prop_assert!((0.0..=100.0).contains(&score));
            prop_assert_eq!(round2(score), score);
        }
    }
}
