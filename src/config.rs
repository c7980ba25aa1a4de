use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::SegmentationError;
use crate::types::Reduction;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SegmentedCtcConfig {
    pub blank_id: u32,
    pub word_sep_id: u32,
    /// Fraction of `sum(target_lengths) * batch_size` that must be recognized
    /// before a batch is segmented.
    pub quality_ratio: f64,
    pub reduction: Reduction,
}

impl SegmentedCtcConfig {
    pub const DEFAULT_BLANK_ID: u32 = 0;
    pub const DEFAULT_WORD_SEP_ID: u32 = 1;
    pub const DEFAULT_QUALITY_RATIO: f64 = 0.5;

    pub fn new(blank_id: u32, word_sep_id: u32) -> Self {
        Self {
            blank_id,
            word_sep_id,
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self, SegmentationError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| SegmentationError::io("read segmentation config", e))?;
        serde_json::from_str(&data)
            .map_err(|e| SegmentationError::json("parse segmentation config", e))
    }

    pub(crate) fn validate(&self) -> Result<(), SegmentationError> {
        if self.blank_id == self.word_sep_id {
            return Err(SegmentationError::invalid_input(format!(
                "blank id and word separator id must differ (both {})",
                self.blank_id
            )));
        }
        if !self.quality_ratio.is_finite() || self.quality_ratio < 0.0 {
            return Err(SegmentationError::invalid_input(format!(
                "quality ratio must be finite and non-negative, got {}",
                self.quality_ratio
            )));
        }
        Ok(())
    }
}

impl Default for SegmentedCtcConfig {
    fn default() -> Self {
        Self {
            blank_id: Self::DEFAULT_BLANK_ID,
            word_sep_id: Self::DEFAULT_WORD_SEP_ID,
            quality_ratio: Self::DEFAULT_QUALITY_RATIO,
            reduction: Reduction::None,
        }
    }
}

const BLANK_KEYS: [&str; 2] = ["<pad>", "<blank>"];
const WORD_SEP_KEYS: [&str; 2] = ["|", " "];

/// Label ids resolved from a `vocab.json` mapping tokens to ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VocabIds {
    pub blank_id: Option<u32>,
    pub word_sep_id: Option<u32>,
}

pub(crate) fn load_vocab_ids(path: &Path) -> Result<VocabIds, SegmentationError> {
    let data =
        std::fs::read_to_string(path).map_err(|e| SegmentationError::io("read vocab.json", e))?;
    let raw: HashMap<String, u32> =
        serde_json::from_str(&data).map_err(|e| SegmentationError::json("parse vocab.json", e))?;
    Ok(resolve_vocab_ids(&raw))
}

fn resolve_vocab_ids(vocab: &HashMap<String, u32>) -> VocabIds {
    let first_of = |keys: &[&str]| keys.iter().find_map(|k| vocab.get(*k).copied());
    VocabIds {
        blank_id: first_of(&BLANK_KEYS),
        word_sep_id: first_of(&WORD_SEP_KEYS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segmented_ctc_config_default() {
        let config = SegmentedCtcConfig::default();
        assert_eq!(config.blank_id, 0);
        assert_eq!(config.word_sep_id, SegmentedCtcConfig::DEFAULT_WORD_SEP_ID);
        assert!((config.quality_ratio - 0.5).abs() < 1e-12);
        assert_eq!(config.reduction, Reduction::None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: SegmentedCtcConfig =
            serde_json::from_str(r#"{"word_sep_id": 4, "reduction": "mean"}"#)
                .expect("valid config json");
        assert_eq!(config.blank_id, 0);
        assert_eq!(config.word_sep_id, 4);
        assert_eq!(config.reduction, Reduction::Mean);
        assert!((config.quality_ratio - SegmentedCtcConfig::DEFAULT_QUALITY_RATIO).abs() < 1e-12);
    }

    #[test]
    fn validate_rejects_blank_equal_to_separator() {
        let config = SegmentedCtcConfig::new(3, 3);
        assert!(matches!(
            config.validate(),
            Err(SegmentationError::InvalidInput { .. })
        ));
    }

    #[test]
    fn validate_rejects_bad_ratio() {
        let mut config = SegmentedCtcConfig::default();
        config.quality_ratio = f64::NAN;
        assert!(config.validate().is_err());
        config.quality_ratio = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_json_file() {
        let path = std::env::temp_dir().join("ctc_segmented_config_load.json");
        std::fs::write(&path, r#"{"blank_id": 2, "word_sep_id": 7, "quality_ratio": 0.25}"#)
            .expect("write config");
        let config = SegmentedCtcConfig::load(&path).expect("load config");
        assert_eq!(config.blank_id, 2);
        assert_eq!(config.word_sep_id, 7);
        assert!((config.quality_ratio - 0.25).abs() < 1e-12);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn load_fails_on_missing_file() {
        let result = SegmentedCtcConfig::load(Path::new("/nonexistent/segmentation.json"));
        assert!(matches!(result, Err(SegmentationError::Io { .. })));
    }

    #[test]
    fn vocab_ids_prefer_pipe_separator() {
        let vocab: HashMap<String, u32> = [("<pad>", 0), ("|", 4), (" ", 9), ("a", 5)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let ids = resolve_vocab_ids(&vocab);
        assert_eq!(ids.blank_id, Some(0));
        assert_eq!(ids.word_sep_id, Some(4));
    }

    #[test]
    fn vocab_ids_missing_tokens() {
        let path = std::env::temp_dir().join("ctc_segmented_vocab_missing_tokens.json");
        std::fs::write(&path, r#"{"a": 1, "b": 2}"#).expect("write vocab");
        let ids = load_vocab_ids(&path).expect("load vocab");
        assert_eq!(ids.blank_id, None);
        assert_eq!(ids.word_sep_id, None);
        let _ = std::fs::remove_file(&path);
    }
}
