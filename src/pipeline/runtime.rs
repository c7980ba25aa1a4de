use candle_core::{Tensor, D};

use crate::config::SegmentedCtcConfig;
use crate::error::SegmentationError;
use crate::pipeline::defaults::{check_lengths, host_labels};
use crate::pipeline::traits::{CtcLoss, FrameAligner};
use crate::segmentation::boundaries::detect_boundaries;
use crate::segmentation::builder::{build_plan, LabelIds};
use crate::segmentation::quality_gate::{evaluate, recognition_mask};
use crate::segmentation::rebatch::rebatch;
use crate::segmentation::scatter::scatter_sum;
use crate::types::{Reduction, SegmentPlan, SegmentationOutcome};

/// CTC loss that scores confidently recognized words as independent segments.
///
/// Drop-in replacement for the wrapped [`CtcLoss`]: same inputs, and with
/// [`Reduction::None`] the same `(B,)` output shape.
pub struct SegmentedCtcLoss {
    config: SegmentedCtcConfig,
    aligner: Box<dyn FrameAligner>,
    loss: Box<dyn CtcLoss>,
}

pub(crate) struct SegmentedCtcLossParts {
    pub config: SegmentedCtcConfig,
    pub aligner: Box<dyn FrameAligner>,
    pub loss: Box<dyn CtcLoss>,
}

impl SegmentedCtcLoss {
    pub(crate) fn from_parts(parts: SegmentedCtcLossParts) -> Self {
        Self {
            config: parts.config,
            aligner: parts.aligner,
            loss: parts.loss,
        }
    }

    pub fn config(&self) -> &SegmentedCtcConfig {
        &self.config
    }

    pub fn forward(
        &self,
        logits: &Tensor,
        targets: &Tensor,
        logits_lengths: &[usize],
        targets_lengths: &[usize],
    ) -> Result<Tensor, SegmentationError> {
        let losses = self.per_utterance(logits, targets, logits_lengths, targets_lengths)?;
        reduce(losses, self.config.reduction)
    }

    /// Unreduced `(B,)` losses, whatever the configured reduction.
    pub fn per_utterance(
        &self,
        logits: &Tensor,
        targets: &Tensor,
        logits_lengths: &[usize],
        targets_lengths: &[usize],
    ) -> Result<Tensor, SegmentationError> {
        match self.plan(logits, targets, logits_lengths, targets_lengths)? {
            SegmentationOutcome::Fallback(_) => {
                self.loss
                    .loss(logits, targets, logits_lengths, targets_lengths)
            }
            SegmentationOutcome::Segmented { plan, .. } => self.score_plan(logits, &plan),
        }
    }

    /// Runs alignment, the quality gate and record building without scoring.
    pub fn plan(
        &self,
        logits: &Tensor,
        targets: &Tensor,
        logits_lengths: &[usize],
        targets_lengths: &[usize],
    ) -> Result<SegmentationOutcome, SegmentationError> {
        let (batch_size, max_len, _) = logits
            .dims3()
            .map_err(|e| SegmentationError::tensor("logits shape", e))?;
        let raw_targets = host_labels(targets)?;
        let max_target_len = raw_targets.first().map_or(0, Vec::len);
        check_lengths("logits", logits_lengths, batch_size, max_len)?;
        check_lengths("target", targets_lengths, raw_targets.len(), max_target_len)?;
        if raw_targets.len() != batch_size {
            return Err(SegmentationError::invalid_input(format!(
                "{} target rows for a batch of {batch_size}",
                raw_targets.len()
            )));
        }

        let log_probs = candle_nn::ops::log_softmax(logits, D::Minus1)
            .map_err(|e| SegmentationError::tensor("log_softmax", e))?;
        let aligned = self
            .aligner
            .align(&log_probs, targets, logits_lengths, targets_lengths)?;
        check_alignment(&aligned, logits_lengths)?;

        let predictions: Vec<Vec<u32>> = logits
            .argmax(D::Minus1)
            .and_then(|t| t.to_vec2())
            .map_err(|e| SegmentationError::tensor("greedy predictions", e))?;

        let mask = recognition_mask(&aligned, &predictions, logits_lengths);
        let gate = evaluate(&mask, targets_lengths, self.config.quality_ratio);
        tracing::debug!(
            recognized = gate.recognized,
            threshold = format!("{:.1}", gate.threshold),
            passed = gate.passed,
            batch_size,
            "segmentation: quality gate"
        );
        if !gate.passed {
            return Ok(SegmentationOutcome::Fallback(gate));
        }

        let boundaries: Vec<Vec<usize>> = mask
            .iter()
            .zip(&aligned)
            .map(|(recognized, row)| detect_boundaries(recognized, row, self.config.word_sep_id))
            .collect();
        let plan = build_plan(
            &boundaries,
            &aligned,
            &raw_targets,
            logits_lengths,
            targets_lengths,
            LabelIds {
                blank_id: self.config.blank_id,
                word_sep_id: self.config.word_sep_id,
            },
        )?;
        tracing::debug!(
            batch_size,
            records = plan.records.len(),
            segmented_utterances = boundaries.iter().filter(|b| b.len() > 2).count(),
            "segmentation: records built"
        );

        Ok(SegmentationOutcome::Segmented {
            gate,
            boundaries,
            plan,
        })
    }

    fn score_plan(&self, logits: &Tensor, plan: &SegmentPlan) -> Result<Tensor, SegmentationError> {
        let batch = rebatch(logits, plan)?;
        let record_losses = self.loss.loss(
            &batch.emissions,
            &batch.labels,
            &batch.emission_lengths,
            &batch.label_lengths,
        )?;
        scatter_sum(&plan.utterance_ids(), &record_losses, plan.batch_size)
    }
}

/// Always unreduced, so a segmented loss can itself be wrapped; the configured
/// reduction applies to [`SegmentedCtcLoss::forward`] only.
impl CtcLoss for SegmentedCtcLoss {
    fn loss(
        &self,
        emissions: &Tensor,
        labels: &Tensor,
        emission_lengths: &[usize],
        label_lengths: &[usize],
    ) -> Result<Tensor, SegmentationError> {
        self.per_utterance(emissions, labels, emission_lengths, label_lengths)
    }
}

fn check_alignment(aligned: &[Vec<u32>], lengths: &[usize]) -> Result<(), SegmentationError> {
    if aligned.len() != lengths.len() {
        return Err(SegmentationError::alignment(format!(
            "{} rows for a batch of {}",
            aligned.len(),
            lengths.len()
        )));
    }
    for (b, (row, &len)) in aligned.iter().zip(lengths).enumerate() {
        if row.len() < len {
            return Err(SegmentationError::alignment(format!(
                "{} of {len} frames for utterance {b}",
                row.len()
            )));
        }
    }
    Ok(())
}

fn reduce(losses: Tensor, reduction: Reduction) -> Result<Tensor, SegmentationError> {
    match reduction {
        Reduction::None => Ok(losses),
        Reduction::Sum => losses
            .sum_all()
            .map_err(|e| SegmentationError::tensor("sum reduction", e)),
        Reduction::Mean => losses
            .mean_all()
            .map_err(|e| SegmentationError::tensor("mean reduction", e)),
    }
}
