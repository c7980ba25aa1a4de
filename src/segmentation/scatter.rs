use candle_core::Tensor;

use crate::error::SegmentationError;

/// Sums per-record losses into one value per original utterance.
///
/// `utterance_ids[r]` is the utterance that record `r` came from. Utterances
/// without any record stay at zero. Built on `index_add`, so gradients flow
/// back to every contributing record.
pub fn scatter_sum(
    utterance_ids: &[u32],
    record_losses: &Tensor,
    batch_size: usize,
) -> Result<Tensor, SegmentationError> {
    let records = record_losses
        .dims1()
        .map_err(|e| SegmentationError::tensor("record loss shape", e))?;
    if records != utterance_ids.len() {
        return Err(SegmentationError::invalid_input(format!(
            "{records} record losses for {} utterance ids",
            utterance_ids.len()
        )));
    }
    if let Some(&id) = utterance_ids.iter().find(|&&id| id as usize >= batch_size) {
        return Err(SegmentationError::invalid_input(format!(
            "utterance id {id} out of range for batch of {batch_size}"
        )));
    }

    let device = record_losses.device();
    let zeros = Tensor::zeros(batch_size, record_losses.dtype(), device)
        .map_err(|e| SegmentationError::tensor("allocate utterance losses", e))?;
    if records == 0 {
        return Ok(zeros);
    }
    let ids = Tensor::from_slice(utterance_ids, records, device)
        .map_err(|e| SegmentationError::tensor("utterance id tensor", e))?;
    zeros
        .index_add(&ids, record_losses, 0)
        .map_err(|e| SegmentationError::tensor("scatter record losses", e))
}
