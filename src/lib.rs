pub mod alignment;
pub mod config;
pub mod error;
pub mod loss;
pub mod pipeline;
pub mod segmentation;
pub mod types;

pub use config::SegmentedCtcConfig;
pub use error::SegmentationError;
pub use pipeline::builder::SegmentedCtcLossBuilder;
pub use pipeline::defaults::{CpuCtcLoss, ViterbiFrameAligner};
pub use pipeline::runtime::SegmentedCtcLoss;
pub use pipeline::traits::{CtcLoss, FrameAligner};
pub use types::{GateReport, Reduction, SegmentPlan, SegmentRecord, SegmentationOutcome};
