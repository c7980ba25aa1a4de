use crate::alignment::collapse::collapse;
use crate::error::SegmentationError;
use crate::types::{SegmentPlan, SegmentRecord};

/// Label conventions shared by every utterance of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelIds {
    pub blank_id: u32,
    pub word_sep_id: u32,
}

/// Records for one utterance.
///
/// `aligned` covers at least the valid frames and `targets` is the raw label
/// sequence already truncated to the target length. Without an internal
/// boundary the whole utterance is kept with its raw targets. Otherwise every
/// boundary pair `(start, next)` yields the frames `[start, next)`; a
/// separator at `start` is split off as its own one-frame record, and a
/// separator at `next` is pulled out of the span except on the final pair.
pub fn build_records(
    utterance: usize,
    boundaries: &[usize],
    aligned: &[u32],
    targets: &[u32],
    emission_len: usize,
    ids: LabelIds,
) -> Vec<SegmentRecord> {
    if boundaries.len() <= 2 {
        return vec![SegmentRecord {
            utterance,
            emission_start: 0,
            emission_len,
            labels: targets.to_vec(),
        }];
    }

    let is_sep = |t: usize| aligned.get(t) == Some(&ids.word_sep_id);
    let final_pair = boundaries.len() - 2;
    let mut records = Vec::new();

    for (k, pair) in boundaries.windows(2).enumerate() {
        let (mut start, mut next) = (pair[0], pair[1]);

        if is_sep(start) {
            records.push(SegmentRecord {
                utterance,
                emission_start: start,
                emission_len: 1,
                labels: vec![ids.word_sep_id],
            });
            start += 1;
        }

        if k < final_pair && is_sep(next) {
            next -= 1;
        }

        if next <= start {
            continue;
        }

        records.push(SegmentRecord {
            utterance,
            emission_start: start,
            emission_len: next - start,
            labels: collapse(&aligned[start..next], ids.blank_id),
        });
    }
    records
}

/// Flat record arena for a batch, in utterance order.
///
/// Fails fast if some utterance yields no record at all, since its loss would
/// otherwise silently stay zero.
pub fn build_plan(
    boundaries: &[Vec<usize>],
    aligned: &[Vec<u32>],
    targets: &[Vec<u32>],
    emission_lengths: &[usize],
    target_lengths: &[usize],
    ids: LabelIds,
) -> Result<SegmentPlan, SegmentationError> {
    let batch_size = boundaries.len();
    let mut records = Vec::new();
    for utterance in 0..batch_size {
        let raw_targets = &targets[utterance][..target_lengths[utterance]];
        let built = build_records(
            utterance,
            &boundaries[utterance],
            &aligned[utterance],
            raw_targets,
            emission_lengths[utterance],
            ids,
        );
        if built.is_empty() {
            return Err(SegmentationError::DegenerateSegmentation { utterance });
        }
        records.extend(built);
    }
    Ok(SegmentPlan {
        batch_size,
        records,
    })
}
