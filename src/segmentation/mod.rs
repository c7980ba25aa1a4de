//! Segmentation decision procedure: quality gate, boundary scan, record
//! building, re-batching and scatter.

pub mod boundaries;
pub mod builder;
pub mod quality_gate;
pub mod rebatch;
pub mod scatter;
#[cfg(test)]
mod tests;
