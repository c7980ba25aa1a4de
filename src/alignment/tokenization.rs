/// CTC state sequence for a label sequence: `blank, l1, blank, ..., lN, blank`.
///
/// Both the Viterbi aligner and the CPU loss walk this sequence; its length is
/// always `2 * labels.len() + 1`.
pub fn ctc_states(labels: &[u32], blank_id: u32) -> Vec<u32> {
    let mut states = Vec::with_capacity(labels.len() * 2 + 1);
    states.push(blank_id);
    for &label in labels {
        states.push(label);
        states.push(blank_id);
    }
    states
}

/// Whether state `s` may be entered directly from `s - 2`, skipping a blank.
///
/// Only allowed between two distinct non-blank labels; a repeated label needs
/// a blank in between to survive collapse.
#[inline]
pub(crate) fn can_skip(states: &[u32], s: usize, blank_id: u32) -> bool {
    s >= 2 && states[s] != blank_id && states[s] != states[s - 2]
}

/// Fewest frames that can emit `labels`: one per label plus one per adjacent repeat.
pub fn min_frames(labels: &[u32]) -> usize {
    let repeats = labels.windows(2).filter(|w| w[0] == w[1]).count();
    labels.len() + repeats
}
