use crate::types::GateReport;

/// Per-utterance mask over valid frames: aligned label equals the greedy prediction.
///
/// Each row has exactly `lengths[b]` entries; frames missing from either
/// input count as not recognized.
pub fn recognition_mask(
    aligned: &[Vec<u32>],
    predictions: &[Vec<u32>],
    lengths: &[usize],
) -> Vec<Vec<bool>> {
    lengths
        .iter()
        .enumerate()
        .map(|(b, &len)| {
            let aligned_row = aligned.get(b).map_or(&[][..], Vec::as_slice);
            let predicted_row = predictions.get(b).map_or(&[][..], Vec::as_slice);
            (0..len)
                .map(|t| match (aligned_row.get(t), predicted_row.get(t)) {
                    (Some(a), Some(p)) => a == p,
                    _ => false,
                })
                .collect()
        })
        .collect()
}

/// Batch-global decision whether alignment boundaries can be trusted.
///
/// Fails when fewer than `ratio * sum(target_lengths) * batch_size` valid
/// frames are recognized. The scale is deliberately loose and global: one
/// good utterance can carry a weak one.
pub fn evaluate(mask: &[Vec<bool>], target_lengths: &[usize], ratio: f64) -> GateReport {
    let recognized = mask.iter().flatten().filter(|&&ok| ok).count();
    let target_total: usize = target_lengths.iter().sum();
    let threshold = target_total as f64 * mask.len() as f64 * ratio;
    GateReport {
        recognized,
        threshold,
        passed: recognized as f64 >= threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_ignores_padded_frames() {
        let aligned = vec![vec![1, 2, 3, 0], vec![4, 4, 0, 0]];
        let predictions = vec![vec![1, 2, 0, 0], vec![4, 5, 0, 0]];
        let mask = recognition_mask(&aligned, &predictions, &[3, 2]);
        assert_eq!(mask, vec![vec![true, true, false], vec![true, false]]);
    }

    #[test]
    fn mask_treats_short_rows_as_unrecognized() {
        let mask = recognition_mask(&[vec![1]], &[vec![1, 2]], &[2]);
        assert_eq!(mask, vec![vec![true, false]]);
    }

    #[test]
    fn gate_uses_target_sum_times_batch() {
        let mask = vec![vec![true; 6], vec![true, false, false, false]];
        // threshold = (3 + 2) * 2 * 0.5 = 5
        let report = evaluate(&mask, &[3, 2], 0.5);
        assert_eq!(report.recognized, 7);
        assert!((report.threshold - 5.0).abs() < 1e-12);
        assert!(report.passed);
    }

    #[test]
    fn gate_fails_strictly_below_threshold() {
        let mask = vec![vec![true, true, false, false], vec![true, true, false, false]];
        let at_threshold = evaluate(&mask, &[2, 2], 0.5);
        assert_eq!(at_threshold.recognized, 4);
        assert!(at_threshold.passed);

        let below = evaluate(&mask, &[3, 2], 0.5);
        assert!(!below.passed);
    }

    #[test]
    fn zero_ratio_always_passes() {
        let mask = vec![vec![false; 3]];
        assert!(evaluate(&mask, &[10], 0.0).passed);
    }
}
