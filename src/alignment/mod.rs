pub mod collapse;
pub mod tokenization;
pub mod viterbi;
