use candle_core::{CpuStorage, CustomOp1, Layout, Shape, Tensor};

use crate::loss::ctc::{ctc_nll, ctc_nll_with_grad};

/// CTC negative log-likelihood as a candle op over `(N, T_max, V)` f32
/// log-probabilities, yielding `(N,)`.
///
/// Labels are already truncated to each row's length. The backward pass
/// reruns forward-backward on the saved input and returns `-occupancy`, the
/// gradient with respect to the log-probabilities, zero on padded frames.
pub(crate) struct CtcNll {
    pub labels: Vec<Vec<u32>>,
    pub emission_lengths: Vec<usize>,
    pub blank_id: u32,
}

impl CtcNll {
    fn rows(&self, data: &[f32], b: usize, t_max: usize, vocab: usize) -> Vec<Vec<f32>> {
        let start = b * t_max * vocab;
        data[start..start + self.emission_lengths[b] * vocab]
            .chunks(vocab)
            .map(<[f32]>::to_vec)
            .collect()
    }
}

impl CustomOp1 for CtcNll {
    fn name(&self) -> &'static str {
        "ctc-nll"
    }

    fn cpu_fwd(
        &self,
        storage: &CpuStorage,
        layout: &Layout,
    ) -> candle_core::Result<(CpuStorage, Shape)> {
        let data = match storage {
            CpuStorage::F32(data) => data,
            _ => candle_core::bail!("ctc-nll expects f32 log-probabilities, got {storage:?}"),
        };
        let data = match layout.contiguous_offsets() {
            Some((o1, o2)) => &data[o1..o2],
            None => candle_core::bail!("ctc-nll input has to be contiguous"),
        };
        let (n, t_max, vocab) = layout.shape().dims3()?;
        if self.labels.len() != n || self.emission_lengths.len() != n {
            candle_core::bail!(
                "ctc-nll built for {} rows, applied to {n}",
                self.labels.len()
            );
        }

        let losses: Vec<f32> = (0..n)
            .map(|b| {
                let frames = self.rows(data, b, t_max, vocab);
                ctc_nll(&frames, &self.labels[b], self.blank_id) as f32
            })
            .collect();
        Ok((CpuStorage::F32(losses), Shape::from(n)))
    }

    fn bwd(
        &self,
        arg: &Tensor,
        _res: &Tensor,
        grad_res: &Tensor,
    ) -> candle_core::Result<Option<Tensor>> {
        let (n, t_max, vocab) = arg.dims3()?;
        let data = arg.flatten_all()?.to_vec1::<f32>()?;

        let mut grads = vec![0f32; n * t_max * vocab];
        for b in 0..n {
            let frames = self.rows(&data, b, t_max, vocab);
            let (loss, grad) = ctc_nll_with_grad(&frames, &self.labels[b], self.blank_id);
            if !loss.is_finite() {
                continue;
            }
            // d/d(log p) = d/d(activation) - softmax
            for (t, (row, lp)) in grad.iter().zip(&frames).enumerate() {
                let offset = (b * t_max + t) * vocab;
                for (k, (&g, &lp)) in row.iter().zip(lp).enumerate() {
                    grads[offset + k] = g - lp.exp();
                }
            }
        }

        let grads = Tensor::from_vec(grads, (n, t_max, vocab), arg.device())?;
        let upstream = grad_res.to_dtype(grads.dtype())?.reshape((n, 1, 1))?;
        Ok(Some(grads.broadcast_mul(&upstream)?))
    }
}
