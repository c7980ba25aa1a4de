use candle_core::{DType, Device, Tensor, D};

use crate::alignment::tokenization::min_frames;
use crate::alignment::viterbi::forced_align_frames;
use crate::error::SegmentationError;
use crate::loss::ctc::ctc_nll_with_grad;
use crate::loss::op::CtcNll;
use crate::pipeline::traits::{CtcLoss, FrameAligner};

/// CTC Viterbi alignment on the host.
pub struct ViterbiFrameAligner {
    pub blank_id: u32,
}

impl FrameAligner for ViterbiFrameAligner {
    fn align(
        &self,
        log_probs: &Tensor,
        targets: &Tensor,
        emission_lengths: &[usize],
        target_lengths: &[usize],
    ) -> Result<Vec<Vec<u32>>, SegmentationError> {
        let log_probs = host_scores(log_probs)?;
        let targets = host_labels(targets)?;
        let t_max = log_probs.first().map_or(0, Vec::len);
        check_lengths("emission", emission_lengths, log_probs.len(), t_max)?;
        let s_max = targets.first().map_or(0, Vec::len);
        check_lengths("target", target_lengths, targets.len(), s_max)?;
        if targets.len() != log_probs.len() {
            return Err(SegmentationError::invalid_input(format!(
                "{} target rows for {} emission rows",
                targets.len(),
                log_probs.len()
            )));
        }

        let mut aligned = Vec::with_capacity(log_probs.len());
        for (b, rows) in log_probs.iter().enumerate() {
            let frames = &rows[..emission_lengths[b]];
            let labels = &targets[b][..target_lengths[b]];
            if frames.len() < min_frames(labels) {
                tracing::warn!(
                    utterance = b,
                    frames = frames.len(),
                    required = min_frames(labels),
                    "alignment: too few frames for target, path will not collapse to it"
                );
            }
            let mut path = forced_align_frames(frames, labels, self.blank_id);
            path.resize(t_max, self.blank_id);
            aligned.push(path);
        }
        Ok(aligned)
    }
}

/// Reference CTC loss computed on the host, one utterance at a time.
///
/// Emissions are raw activations; log-softmax is applied over the last axis.
pub struct CpuCtcLoss {
    pub blank_id: u32,
}

impl CpuCtcLoss {
    /// Loss per example plus the gradient with respect to `emissions`,
    /// zero on padded frames.
    pub fn loss_and_grad(
        &self,
        emissions: &Tensor,
        labels: &Tensor,
        emission_lengths: &[usize],
        label_lengths: &[usize],
    ) -> Result<(Tensor, Tensor), SegmentationError> {
        let (n, t_max, vocab) = emissions
            .dims3()
            .map_err(|e| SegmentationError::tensor("emission shape", e))?;
        let (log_probs, labels) =
            self.host_inputs(emissions, labels, emission_lengths, label_lengths)?;

        let mut losses = Vec::with_capacity(n);
        let mut grads = vec![0f32; n * t_max * vocab];
        for b in 0..n {
            let (loss, grad) = ctc_nll_with_grad(
                &log_probs[b][..emission_lengths[b]],
                &labels[b][..label_lengths[b]],
                self.blank_id,
            );
            losses.push(loss as f32);
            for (t, row) in grad.iter().enumerate() {
                let offset = (b * t_max + t) * vocab;
                grads[offset..offset + vocab].copy_from_slice(row);
            }
        }

        let device = emissions.device();
        let losses = Tensor::from_vec(losses, n, device)
            .and_then(|t| t.to_dtype(emissions.dtype()))
            .map_err(|e| SegmentationError::tensor("loss tensor", e))?;
        let grads = Tensor::from_vec(grads, (n, t_max, vocab), device)
            .and_then(|t| t.to_dtype(emissions.dtype()))
            .map_err(|e| SegmentationError::tensor("gradient tensor", e))?;
        Ok((losses, grads))
    }

    fn host_inputs(
        &self,
        emissions: &Tensor,
        labels: &Tensor,
        emission_lengths: &[usize],
        label_lengths: &[usize],
    ) -> Result<(Vec<Vec<Vec<f32>>>, Vec<Vec<u32>>), SegmentationError> {
        let (n, t_max, _) = emissions
            .dims3()
            .map_err(|e| SegmentationError::tensor("emission shape", e))?;
        let log_probs = if n == 0 {
            Vec::new()
        } else {
            let normalized = candle_nn::ops::log_softmax(emissions, D::Minus1)
                .map_err(|e| SegmentationError::tensor("log_softmax", e))?;
            host_scores(&normalized)?
        };
        let labels = checked_labels(labels, n, t_max, emission_lengths, label_lengths)?;
        Ok((log_probs, labels))
    }
}

impl CtcLoss for CpuCtcLoss {
    /// Differentiable: the loss stays in the autograd graph of `emissions`.
    fn loss(
        &self,
        emissions: &Tensor,
        labels: &Tensor,
        emission_lengths: &[usize],
        label_lengths: &[usize],
    ) -> Result<Tensor, SegmentationError> {
        let (n, t_max, _) = emissions
            .dims3()
            .map_err(|e| SegmentationError::tensor("emission shape", e))?;
        let labels = checked_labels(labels, n, t_max, emission_lengths, label_lengths)?;
        if n == 0 {
            return Tensor::zeros(0, emissions.dtype(), emissions.device())
                .map_err(|e| SegmentationError::tensor("loss tensor", e));
        }

        let op = CtcNll {
            labels: labels
                .iter()
                .zip(label_lengths)
                .map(|(row, &len)| row[..len].to_vec())
                .collect(),
            emission_lengths: emission_lengths.to_vec(),
            blank_id: self.blank_id,
        };
        candle_nn::ops::log_softmax(emissions, D::Minus1)
            .and_then(|t| t.to_device(&Device::Cpu))
            .and_then(|t| t.to_dtype(DType::F32))
            .and_then(|t| t.contiguous())
            .and_then(|t| t.apply_op1(op))
            .and_then(|t| t.to_device(emissions.device()))
            .and_then(|t| t.to_dtype(emissions.dtype()))
            .map_err(|e| SegmentationError::tensor("ctc loss", e))
    }
}

fn checked_labels(
    labels: &Tensor,
    n: usize,
    t_max: usize,
    emission_lengths: &[usize],
    label_lengths: &[usize],
) -> Result<Vec<Vec<u32>>, SegmentationError> {
    let labels = host_labels(labels)?;
    check_lengths("emission", emission_lengths, n, t_max)?;
    let s_max = labels.first().map_or(0, Vec::len);
    check_lengths("label", label_lengths, labels.len(), s_max)?;
    if labels.len() != n {
        return Err(SegmentationError::invalid_input(format!(
            "{} label rows for {n} emission rows",
            labels.len()
        )));
    }
    Ok(labels)
}

pub(crate) fn host_scores(scores: &Tensor) -> Result<Vec<Vec<Vec<f32>>>, SegmentationError> {
    scores
        .to_dtype(DType::F32)
        .and_then(|t| t.to_vec3::<f32>())
        .map_err(|e| SegmentationError::tensor("copy scores to host", e))
}

/// Labels are read as `u32`; only entries inside each row's length are used,
/// so negative padding such as `-1` past the length is harmless.
pub(crate) fn host_labels(labels: &Tensor) -> Result<Vec<Vec<u32>>, SegmentationError> {
    labels
        .to_dtype(DType::U32)
        .and_then(|t| t.to_vec2::<u32>())
        .map_err(|e| SegmentationError::tensor("copy labels to host", e))
}

/// One length per row, each within the padded width.
pub(crate) fn check_lengths(
    what: &str,
    lengths: &[usize],
    rows: usize,
    width: usize,
) -> Result<(), SegmentationError> {
    if lengths.len() != rows {
        return Err(SegmentationError::invalid_input(format!(
            "{} {what} lengths for a batch of {rows}",
            lengths.len()
        )));
    }
    if let Some((b, &len)) = lengths.iter().enumerate().find(|&(_, &len)| len > width) {
        return Err(SegmentationError::invalid_input(format!(
            "{what} length {len} of utterance {b} exceeds padded width {width}"
        )));
    }
    Ok(())
}
