use candle_core::Tensor;
use candle_nn::rnn::{GRU, RNN};
use convo_craft::{Error, Result};

/// Runs a GRU over a `(batch, seq_len, features)` batch and stacks the
/// per-step hidden states into a `(batch, seq_len, hidden)` tensor.
pub fn gru_outputs(gru: &GRU, xs: &Tensor) -> Result<Tensor> {
    let states = gru.seq(xs)?;
    let hs = states.iter().map(|s| s.h().clone()).collect::<Vec<_>>();
    Ok(Tensor::stack(&hs, 1)?)
}

/// Reverses the valid prefix of every row of a `(batch, seq_len, features)`
/// tensor, leaving the padded tail in place.
pub fn reverse_padded(xs: &Tensor, lengths: &[usize]) -> Result<Tensor> {
    let (batch, seq_len, features) = xs.dims3()?;
    if lengths.len() != batch {
        return Err(Error::msg(format!(
            "got {} lengths for a batch of {batch} rows",
            lengths.len()
        )));
    }
    let mut index = Vec::with_capacity(batch * seq_len);
    for &len in lengths {
        for t in 0..seq_len {
            let src = if t < len { len - 1 - t } else { t };
            index.push(src as u32);
        }
    }
    let index = Tensor::from_vec(index, (batch, seq_len), xs.device())?
        .unsqueeze(2)?
        .expand((batch, seq_len, features))?
        .contiguous()?;
    Ok(xs.gather(&index, 1)?)
}

/// Gathers the hidden state at each row's last valid step from a
/// `(batch, seq_len, hidden)` tensor of per-step states.
pub fn last_states(outputs: &Tensor, lengths: &[usize]) -> Result<Tensor> {
    let (batch, seq_len, hidden) = outputs.dims3()?;
    if lengths.len() != batch {
        return Err(Error::msg(format!(
            "got {} lengths for a batch of {batch} rows",
            lengths.len()
        )));
    }
    let mut index = Vec::with_capacity(batch * hidden);
    for &len in lengths {
        let t = len.min(seq_len).saturating_sub(1) as u32;
        index.extend(std::iter::repeat(t).take(hidden));
    }
    let index = Tensor::from_vec(index, (batch, 1, hidden), outputs.device())?;
    Ok(outputs.gather(&index, 1)?.squeeze(1)?)
}

#[cfg(test)]
mod tests {
    use candle_core::{Device, Tensor};

    use super::{last_states, reverse_padded};

    #[test]
    fn test_reverse_padded_keeps_padding_in_place() {
        let xs = Tensor::from_vec(
            vec![1f32, 2., 3., 4., 5., 0.],
            (2, 3, 1),
            &Device::Cpu,
        )
        .unwrap();
        let reversed = reverse_padded(&xs, &[3, 2]).unwrap();
        let rows = reversed.squeeze(2).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(rows[0], [3., 2., 1.]);
        assert_eq!(rows[1], [5., 4., 0.]);
    }

    #[test]
    fn test_last_states_reads_true_last_step() {
        let outputs = Tensor::from_vec(
            vec![1f32, 10., 2., 20., 3., 30., 4., 40., 5., 50., 6., 60.],
            (2, 3, 2),
            &Device::Cpu,
        )
        .unwrap();
        let last = last_states(&outputs, &[3, 1]).unwrap();
        let rows = last.to_vec2::<f32>().unwrap();
        assert_eq!(rows[0], [3., 30.]);
        assert_eq!(rows[1], [4., 40.]);
    }
}
