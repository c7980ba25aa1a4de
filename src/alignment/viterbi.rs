use crate::alignment::tokenization::{can_skip, ctc_states};

/// CTC Viterbi forced alignment, one label (or blank) per frame.
///
/// `log_probs` holds the valid frames only. The returned path has exactly
/// `log_probs.len()` entries and collapses back to `labels` whenever the
/// alignment is feasible.
pub fn forced_align_frames(log_probs: &[Vec<f32>], labels: &[u32], blank_id: u32) -> Vec<u32> {
    let states = ctc_states(labels, blank_id);
    forced_align_states(log_probs, &states, blank_id)
        .into_iter()
        .map(|s| states[s])
        .collect()
}

/// Best state index per frame over a blank-interleaved state sequence.
pub(crate) fn forced_align_states(
    log_probs: &[Vec<f32>],
    states: &[u32],
    blank_id: u32,
) -> Vec<usize> {
    let t_len = log_probs.len();
    let s_len = states.len();
    if t_len == 0 || s_len == 0 {
        return Vec::new();
    }

    let mut prev = vec![f32::NEG_INFINITY; s_len];
    let mut curr = vec![f32::NEG_INFINITY; s_len];
    let mut bp = vec![0u8; t_len * s_len];

    prev[0] = emit(&log_probs[0], states[0]);
    if s_len > 1 {
        prev[1] = emit(&log_probs[0], states[1]);
    }

    let mut prev_start = 0usize;
    let mut prev_end = if s_len > 1 { 1 } else { 0 };
    let final_floor_state = s_len.saturating_sub(2);

    for t in 1..t_len {
        let row = &log_probs[t];
        let remaining = t_len - 1 - t;
        let curr_start = final_floor_state.saturating_sub(2 * remaining);
        let curr_end = (2 * t + 1).min(s_len - 1);

        curr.fill(f32::NEG_INFINITY);
        let bp_offset = t * s_len;
        for s in curr_start..=curr_end {
            let (best, step) = best_transition(&prev, s, prev_start, prev_end, states, blank_id);
            curr[s] = best + emit(row, states[s]);
            bp[bp_offset + s] = step;
        }

        std::mem::swap(&mut prev, &mut curr);
        prev_start = curr_start;
        prev_end = curr_end;
    }

    let mut s = s_len - 1;
    if s_len >= 2 && prev[s_len - 2] > prev[s_len - 1] {
        s = s_len - 2;
    }

    let mut path = Vec::with_capacity(t_len);
    path.push(s);
    for t in (1..t_len).rev() {
        s = match bp[t * s_len + s] {
            1 => s - 1,
            2 => s - 2,
            _ => s,
        };
        path.push(s);
    }
    path.reverse();
    path
}

#[inline(always)]
fn emit(row: &[f32], label: u32) -> f32 {
    row.get(label as usize).copied().unwrap_or(f32::NEG_INFINITY)
}

#[inline(always)]
fn best_transition(
    prev: &[f32],
    s: usize,
    prev_start: usize,
    prev_end: usize,
    states: &[u32],
    blank_id: u32,
) -> (f32, u8) {
    let in_window = |p: usize| p >= prev_start && p <= prev_end;
    let mut best = f32::NEG_INFINITY;
    let mut step = 0u8;

    if in_window(s) {
        best = prev[s];
    }

    if s >= 1 && in_window(s - 1) && prev[s - 1] > best {
        best = prev[s - 1];
        step = 1;
    }

    if can_skip(states, s, blank_id) && in_window(s - 2) && prev[s - 2] > best {
        best = prev[s - 2];
        step = 2;
    }

    (best, step)
}
