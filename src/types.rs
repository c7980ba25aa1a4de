use serde::Deserialize;

/// How per-utterance losses are folded before they are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    /// One loss per utterance, shape `(B,)`.
    #[default]
    None,
    Sum,
    Mean,
}

/// One independently scored slice of an utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRecord {
    /// Index of the source utterance in the original batch.
    pub utterance: usize,
    /// Emission slice is `[emission_start, emission_start + emission_len)`.
    pub emission_start: usize,
    pub emission_len: usize,
    pub labels: Vec<u32>,
}

impl SegmentRecord {
    pub fn label_len(&self) -> usize {
        self.labels.len()
    }

    pub fn emission_end(&self) -> usize {
        self.emission_start + self.emission_len
    }
}

/// Flat arena of records for a whole batch, in utterance order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPlan {
    pub batch_size: usize,
    pub records: Vec<SegmentRecord>,
}

impl SegmentPlan {
    pub fn utterance_ids(&self) -> Vec<u32> {
        self.records.iter().map(|r| r.utterance as u32).collect()
    }

    pub fn records_for(&self, utterance: usize) -> impl Iterator<Item = &SegmentRecord> {
        self.records.iter().filter(move |r| r.utterance == utterance)
    }

    pub fn max_emission_len(&self) -> usize {
        self.records.iter().map(|r| r.emission_len).max().unwrap_or(0)
    }

    pub fn max_label_len(&self) -> usize {
        self.records.iter().map(SegmentRecord::label_len).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateReport {
    /// Correctly recognized valid timesteps across the batch.
    pub recognized: usize,
    pub threshold: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SegmentationOutcome {
    /// The model is not trusted yet; the batch is scored unsegmented.
    Fallback(GateReport),
    Segmented {
        gate: GateReport,
        boundaries: Vec<Vec<usize>>,
        plan: SegmentPlan,
    },
}

impl SegmentationOutcome {
    pub fn gate(&self) -> &GateReport {
        match self {
            Self::Fallback(gate) => gate,
            Self::Segmented { gate, .. } => gate,
        }
    }
}
