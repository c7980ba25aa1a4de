use candle_core::{IndexOp, Tensor};

use crate::error::SegmentationError;
use crate::types::SegmentPlan;

/// Padded batch of records, ready for the loss primitive.
#[derive(Debug)]
pub struct Rebatched {
    /// `(records, max_emission_len, vocab)`, zero beyond each valid length.
    pub emissions: Tensor,
    /// `(records, max_label_len)` as `u32`, zero beyond each valid length.
    pub labels: Tensor,
    pub emission_lengths: Vec<usize>,
    pub label_lengths: Vec<usize>,
}

/// Copies every record's emission and label slices into fresh padded buffers
/// on the device of `emissions`.
pub fn rebatch(emissions: &Tensor, plan: &SegmentPlan) -> Result<Rebatched, SegmentationError> {
    let (_, _, vocab) = emissions
        .dims3()
        .map_err(|e| SegmentationError::tensor("emission shape", e))?;
    let device = emissions.device().clone();
    let n = plan.records.len();
    let max_emission_len = plan.max_emission_len();
    let max_label_len = plan.max_label_len();

    let mut rows = Vec::with_capacity(n);
    for record in &plan.records {
        let row = if record.emission_len == 0 {
            Tensor::zeros((max_emission_len, vocab), emissions.dtype(), &device)
        } else {
            emissions
                .i((record.utterance, record.emission_start..record.emission_end()))
                .and_then(|slice| slice.pad_with_zeros(0, 0, max_emission_len - record.emission_len))
        };
        rows.push(row.map_err(|e| SegmentationError::tensor("slice record emissions", e))?);
    }
    let stacked = if rows.is_empty() {
        Tensor::zeros((0, max_emission_len, vocab), emissions.dtype(), &device)
    } else {
        Tensor::stack(&rows, 0)
    };
    let emissions =
        stacked.map_err(|e| SegmentationError::tensor("stack record emissions", e))?;

    let mut flat_labels = vec![0u32; n * max_label_len];
    for (row, record) in flat_labels
        .chunks_mut(max_label_len.max(1))
        .zip(&plan.records)
    {
        row[..record.label_len()].copy_from_slice(&record.labels);
    }
    let labels = Tensor::from_vec(flat_labels, (n, max_label_len), &device)
        .map_err(|e| SegmentationError::tensor("record labels tensor", e))?;

    tracing::debug!(
        records = n,
        max_emission_len,
        max_label_len,
        ?device,
        "segmentation: re-batched records"
    );

    Ok(Rebatched {
        emissions,
        labels,
        emission_lengths: plan.records.iter().map(|r| r.emission_len).collect(),
        label_lengths: plan.records.iter().map(|r| r.label_len()).collect(),
    })
}
