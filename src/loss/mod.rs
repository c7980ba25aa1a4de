pub mod ctc;
pub(crate) mod op;
