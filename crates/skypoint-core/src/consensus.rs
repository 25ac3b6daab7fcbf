// Consensus calculation: mean of revealed votes snapped to the reference sequence.

use serde::{Deserialize, Serialize};

use crate::estimate::Estimate;

/// Values the consensus snaps to, in scan order.
pub const REFERENCE_SEQUENCE: [f64; 10] = [0.5, 1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 20.0, 40.0, 100.0];

/// One revealed vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResult {
    pub participant_id: String,
    pub name: String,
    pub value: Estimate,
}

/// Breakdown of a consensus computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsensusSummary {
    /// Arithmetic mean of the numeric votes, `None` when there were none.
    pub mean: Option<f64>,
    /// The snapped estimate (0 when no numeric votes were cast).
    pub estimate: f64,
    /// Votes that took part in the mean.
    pub counted: usize,
    /// "?" and "coffee" votes.
    pub abstained: usize,
}

/// Compute the consensus estimate for a set of revealed votes.
///
/// Returns 0 when no vote carries a numeric value.
pub fn consensus(votes: &[VoteResult]) -> f64 {
    summarize(votes).estimate
}

/// Compute the consensus estimate together with its inputs.
pub fn summarize(votes: &[VoteResult]) -> ConsensusSummary {
    let numeric: Vec<f64> = votes.iter().filter_map(|v| v.value.points()).collect();
    let abstained = votes.len() - numeric.len();

    if numeric.is_empty() {
        return ConsensusSummary {
            mean: None,
            estimate: 0.0,
            counted: 0,
            abstained,
        };
    }

    let mean = numeric.iter().sum::<f64>() / numeric.len() as f64;
    ConsensusSummary {
        mean: Some(mean),
        estimate: nearest_reference(mean),
        counted: numeric.len(),
        abstained,
    }
}

/// Snap `value` to the closest entry of [`REFERENCE_SEQUENCE`].
///
/// The scan keeps the current candidate unless a later one is strictly
/// closer, so on a tie the earlier (smaller) value wins: 1.5 snaps to 1.
pub fn nearest_reference(value: f64) -> f64 {
    REFERENCE_SEQUENCE
        .iter()
        .copied()
        .fold(REFERENCE_SEQUENCE[0], |best, candidate| {
            if (candidate - value).abs() < (best - value).abs() {
                candidate
            } else {
                best
            }
        })
}

/// Render story points without a trailing ".0" ("5", "0.5").
pub fn format_points(points: f64) -> String {
    if points.fract() == 0.0 {
        format!("{}", points as i64)
    } else {
        format!("{points}")
    }
}
