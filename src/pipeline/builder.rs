use std::path::{Path, PathBuf};

use crate::config::{load_vocab_ids, SegmentedCtcConfig};
use crate::error::SegmentationError;
use crate::pipeline::defaults::{CpuCtcLoss, ViterbiFrameAligner};
use crate::pipeline::runtime::{SegmentedCtcLoss, SegmentedCtcLossParts};
use crate::pipeline::traits::{CtcLoss, FrameAligner};

pub struct SegmentedCtcLossBuilder {
    config: SegmentedCtcConfig,
    vocab_path: Option<PathBuf>,
    frame_aligner: Option<Box<dyn FrameAligner>>,
    loss: Option<Box<dyn CtcLoss>>,
}

impl SegmentedCtcLossBuilder {
    pub fn new(config: SegmentedCtcConfig) -> Self {
        Self {
            config,
            vocab_path: None,
            frame_aligner: None,
            loss: None,
        }
    }

    /// Resolve the blank (`<pad>`/`<blank>`) and separator (`|`/` `) ids
    /// from a `vocab.json`, overriding the configured ones when present.
    pub fn with_vocab_file(mut self, path: impl AsRef<Path>) -> Self {
        self.vocab_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_frame_aligner(mut self, frame_aligner: Box<dyn FrameAligner>) -> Self {
        self.frame_aligner = Some(frame_aligner);
        self
    }

    pub fn with_loss(mut self, loss: Box<dyn CtcLoss>) -> Self {
        self.loss = Some(loss);
        self
    }

    pub fn build(self) -> Result<SegmentedCtcLoss, SegmentationError> {
        let mut config = self.config;
        if let Some(path) = &self.vocab_path {
            let ids = load_vocab_ids(path)?;
            if let Some(blank_id) = ids.blank_id {
                config.blank_id = blank_id;
            }
            match ids.word_sep_id {
                Some(word_sep_id) => config.word_sep_id = word_sep_id,
                None => tracing::warn!(
                    vocab = %path.display(),
                    word_sep_id = config.word_sep_id,
                    "vocab has no word separator token; keeping configured id"
                ),
            }
        }
        config.validate()?;

        tracing::info!(
            blank_id = config.blank_id,
            word_sep_id = config.word_sep_id,
            quality_ratio = config.quality_ratio,
            reduction = ?config.reduction,
            custom_aligner = self.frame_aligner.is_some(),
            custom_loss = self.loss.is_some(),
            "segmented CTC loss built"
        );

        let blank_id = config.blank_id;
        Ok(SegmentedCtcLoss::from_parts(SegmentedCtcLossParts {
            config,
            aligner: self
                .frame_aligner
                .unwrap_or_else(|| Box::new(ViterbiFrameAligner { blank_id })),
            loss: self
                .loss
                .unwrap_or_else(|| Box::new(CpuCtcLoss { blank_id })),
        }))
    }
}
