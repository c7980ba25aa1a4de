use crate::alignment::tokenization::{can_skip, ctc_states};

/// Negative log-likelihood of `labels` under per-frame log-probabilities.
///
/// Infeasible alignments (too few frames) score `+inf`.
pub fn ctc_nll(log_probs: &[Vec<f32>], labels: &[u32], blank_id: u32) -> f64 {
    let states = ctc_states(labels, blank_id);
    if log_probs.is_empty() {
        return if labels.is_empty() { 0.0 } else { f64::INFINITY };
    }
    let alpha = forward_variables(log_probs, &states, blank_id);
    -total_log_likelihood(&alpha, states.len())
}

/// Loss plus its gradient with respect to the pre-softmax activations.
///
/// The gradient has one row per frame of `log_probs` and is
/// `softmax - posterior state occupancy`; it is all zeros when the alignment
/// is infeasible.
pub fn ctc_nll_with_grad(
    log_probs: &[Vec<f32>],
    labels: &[u32],
    blank_id: u32,
) -> (f64, Vec<Vec<f32>>) {
    let t_len = log_probs.len();
    let vocab = log_probs.first().map_or(0, Vec::len);
    let states = ctc_states(labels, blank_id);
    if t_len == 0 {
        let loss = if labels.is_empty() { 0.0 } else { f64::INFINITY };
        return (loss, Vec::new());
    }

    let alpha = forward_variables(log_probs, &states, blank_id);
    let log_likelihood = total_log_likelihood(&alpha, states.len());
    if log_likelihood == f64::NEG_INFINITY {
        return (f64::INFINITY, vec![vec![0.0; vocab]; t_len]);
    }
    let beta = backward_variables(log_probs, &states, blank_id);

    let mut grads = Vec::with_capacity(t_len);
    for t in 0..t_len {
        let mut occupancy = vec![f64::NEG_INFINITY; vocab];
        for (s, &label) in states.iter().enumerate() {
            let k = label as usize;
            if k < vocab {
                occupancy[k] = log_sum_exp(occupancy[k], alpha[t][s] + beta[t][s]);
            }
        }
        let row = log_probs[t]
            .iter()
            .zip(occupancy)
            .map(|(&lp, occ)| {
                let posterior = (occ - log_likelihood).exp();
                ((lp as f64).exp() - posterior) as f32
            })
            .collect();
        grads.push(row);
    }
    (-log_likelihood, grads)
}

/// `alpha[t][s]`: log-probability of all prefixes ending in state `s` at `t`,
/// including the emission at `t`.
fn forward_variables(log_probs: &[Vec<f32>], states: &[u32], blank_id: u32) -> Vec<Vec<f64>> {
    let t_len = log_probs.len();
    let s_len = states.len();
    let mut alpha = vec![vec![f64::NEG_INFINITY; s_len]; t_len];

    alpha[0][0] = emit(&log_probs[0], states[0]);
    if s_len > 1 {
        alpha[0][1] = emit(&log_probs[0], states[1]);
    }

    for t in 1..t_len {
        for s in 0..s_len {
            let mut acc = alpha[t - 1][s];
            if s >= 1 {
                acc = log_sum_exp(acc, alpha[t - 1][s - 1]);
            }
            if can_skip(states, s, blank_id) {
                acc = log_sum_exp(acc, alpha[t - 1][s - 2]);
            }
            alpha[t][s] = acc + emit(&log_probs[t], states[s]);
        }
    }
    alpha
}

/// `beta[t][s]`: log-probability of completing the sequence from state `s`
/// at `t`, excluding the emission at `t`.
fn backward_variables(log_probs: &[Vec<f32>], states: &[u32], blank_id: u32) -> Vec<Vec<f64>> {
    let t_len = log_probs.len();
    let s_len = states.len();
    let mut beta = vec![vec![f64::NEG_INFINITY; s_len]; t_len];

    beta[t_len - 1][s_len - 1] = 0.0;
    if s_len > 1 {
        beta[t_len - 1][s_len - 2] = 0.0;
    }

    for t in (0..t_len - 1).rev() {
        let next = &log_probs[t + 1];
        for s in 0..s_len {
            let mut acc = beta[t + 1][s] + emit(next, states[s]);
            if s + 1 < s_len {
                acc = log_sum_exp(acc, beta[t + 1][s + 1] + emit(next, states[s + 1]));
            }
            if s + 2 < s_len && can_skip(states, s + 2, blank_id) {
                acc = log_sum_exp(acc, beta[t + 1][s + 2] + emit(next, states[s + 2]));
            }
            beta[t][s] = acc;
        }
    }
    beta
}

fn total_log_likelihood(alpha: &[Vec<f64>], s_len: usize) -> f64 {
    let last = &alpha[alpha.len() - 1];
    if s_len > 1 {
        log_sum_exp(last[s_len - 1], last[s_len - 2])
    } else {
        last[s_len - 1]
    }
}

#[inline]
fn emit(row: &[f32], label: u32) -> f64 {
    row.get(label as usize)
        .map_or(f64::NEG_INFINITY, |&v| v as f64)
}

#[inline]
fn log_sum_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let m = a.max(b);
    m + ((a - m).exp() + (b - m).exp()).ln()
}
