use candle_core::Tensor;

use crate::error::SegmentationError;

/// Per-example CTC loss over a padded batch.
pub trait CtcLoss: Send + Sync {
    /// `emissions` is `(N, T_max, V)` raw scores and `labels` is `(N, S_max)`;
    /// the length slices give each row's valid prefix. Returns an unreduced
    /// `(N,)` tensor on the device of `emissions`.
    fn loss(
        &self,
        emissions: &Tensor,
        labels: &Tensor,
        emission_lengths: &[usize],
        label_lengths: &[usize],
    ) -> Result<Tensor, SegmentationError>;
}

/// Forced alignment of raw targets onto emission frames.
///
/// Contract relied on by segmentation: each returned row has `T_max` entries
/// (blank past the valid length), and merging consecutive duplicates then
/// dropping blanks over the valid frames reproduces the target labels, or a
/// prefix of them.
pub trait FrameAligner: Send + Sync {
    fn align(
        &self,
        log_probs: &Tensor,
        targets: &Tensor,
        emission_lengths: &[usize],
        target_lengths: &[usize],
    ) -> Result<Vec<Vec<u32>>, SegmentationError>;
}
