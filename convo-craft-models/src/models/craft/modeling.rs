use candle_core::{DType, Device, Tensor, D};
use candle_nn::rnn::{gru, GRUConfig, GRU};
use candle_nn::{embedding, linear, Activation, Dropout, Embedding, Linear, Module, VarBuilder};
use convo_craft::{Error, FromPretrainedParameters, Result};

use super::config::CraftConfig;
use crate::config::PretrainedConfig;
use crate::from_pretrained::from_pretrained;
use crate::model::{ForwardParams, ModelOutput, PreTrainedModel};
use crate::utils::rnn::{gru_outputs, last_states, reverse_padded};

pub const CRAFT_DTYPE: DType = DType::F32;

/// Encodes every utterance of a flattened batch into a single vector using
/// an embedding layer followed by a stacked bidirectional GRU. The utterance
/// vector is the sum of the last layer's final forward and backward states.
pub struct UtteranceEncoder {
    embedding: Embedding,
    layers: Vec<(GRU, GRU)>,
    dropout: Dropout,
}

impl UtteranceEncoder {
    fn load(vb: VarBuilder, config: &CraftConfig) -> Result<Self> {
        if config.encoder_num_layers == 0 {
            return Err(Error::msg("encoder_num_layers must be at least 1"));
        }
        let embedding = embedding(config.vocab_size, config.hidden_size, vb.pp("embedding"))?;
        let mut layers = Vec::with_capacity(config.encoder_num_layers);
        for i in 0..config.encoder_num_layers {
            // layers above the first consume both directions
            let in_dim = if i == 0 {
                config.hidden_size
            } else {
                2 * config.hidden_size
            };
            let vb = vb.pp(format!("gru.l{i}"));
            let forward = gru(in_dim, config.hidden_size, GRUConfig::default(), vb.pp("fwd"))?;
            let backward = gru(in_dim, config.hidden_size, GRUConfig::default(), vb.pp("bwd"))?;
            layers.push((forward, backward));
        }
        Ok(Self {
            embedding,
            layers,
            dropout: Dropout::new(config.dropout),
        })
    }

    fn forward(&self, input_ids: &Tensor, lengths: &[usize]) -> Result<Tensor> {
        let mut xs = self.embedding.forward(input_ids)?;
        let mut last = None;
        for (i, (forward, backward)) in self.layers.iter().enumerate() {
            if i > 0 {
                xs = self.dropout.forward(&xs, false)?;
            }
            let fwd = gru_outputs(forward, &xs)?;
            // the backward direction runs over each row with its valid prefix
            // reversed in place, so the recurrence never crosses padding
            let reversed = reverse_padded(&xs, lengths)?;
            let bwd = reverse_padded(&gru_outputs(backward, &reversed)?, lengths)?;
            xs = Tensor::cat(&[&fwd, &bwd], D::Minus1)?;
            last = Some((fwd, bwd));
        }
        let (fwd, bwd) = last.ok_or_else(|| Error::msg("utterance encoder has no layers"))?;
        let forward_state = last_states(&fwd, lengths)?;
        // the backward direction finishes at the first token
        let backward_state = bwd.narrow(1, 0, 1)?.squeeze(1)?;
        Ok((forward_state + backward_state)?)
    }
}

/// Runs a stacked unidirectional GRU over the utterance vectors of each
/// dialog and returns the state at each dialog's last utterance.
pub struct ContextEncoder {
    layers: Vec<GRU>,
    dropout: Dropout,
}

impl ContextEncoder {
    fn load(vb: VarBuilder, config: &CraftConfig) -> Result<Self> {
        if config.context_num_layers == 0 {
            return Err(Error::msg("context_num_layers must be at least 1"));
        }
        let mut layers = Vec::with_capacity(config.context_num_layers);
        for i in 0..config.context_num_layers {
            layers.push(gru(
                config.hidden_size,
                config.hidden_size,
                GRUConfig::default(),
                vb.pp(format!("gru.l{i}")),
            )?);
        }
        Ok(Self {
            layers,
            dropout: Dropout::new(config.dropout),
        })
    }

    fn forward(&self, xs: &Tensor, lengths: &[usize]) -> Result<Tensor> {
        let mut xs = xs.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            if i > 0 {
                xs = self.dropout.forward(&xs, false)?;
            }
            xs = gru_outputs(layer, &xs)?;
        }
        last_states(&xs, lengths)
    }
}

/// Scores a final context state with a small feed-forward head, producing
/// one derailment logit per dialog.
pub struct ForecastHead {
    layer1: Linear,
    layer2: Linear,
    output: Linear,
    activation: Activation,
    dropout: Dropout,
}

impl ForecastHead {
    fn load(vb: VarBuilder, config: &CraftConfig) -> Result<Self> {
        let layer1 = linear(config.hidden_size, config.hidden_size, vb.pp("layer1"))?;
        let layer2 = linear(config.hidden_size, config.hidden_size / 2, vb.pp("layer2"))?;
        let output = linear(config.hidden_size / 2, 1, vb.pp("output"))?;
        Ok(Self {
            layer1,
            layer2,
            output,
            activation: Activation::LeakyRelu(0.01),
            dropout: Dropout::new(config.dropout),
        })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let xs = self.activation.forward(&self.layer1.forward(xs)?)?;
        let xs = self.dropout.forward(&xs, false)?;
        let xs = self.activation.forward(&self.layer2.forward(&xs)?)?;
        let xs = self.dropout.forward(&xs, false)?;
        Ok(self.output.forward(&xs)?.squeeze(D::Minus1)?)
    }
}

/// The base CRAFT model: utterance encoder plus context encoder, producing
/// one context state per dialog of the batch.
pub struct CraftModel {
    encoder: UtteranceEncoder,
    context_encoder: ContextEncoder,
}

impl CraftModel {
    pub fn load(vb: VarBuilder, config: &CraftConfig) -> Result<Self> {
        Ok(Self {
            encoder: UtteranceEncoder::load(vb.pp("encoder"), config)?,
            context_encoder: ContextEncoder::load(vb.pp("context_encoder"), config)?,
        })
    }

    pub fn forward(
        &self,
        input_ids: &Tensor,
        utterance_lengths: &[usize],
        dialog_lengths: &[usize],
    ) -> Result<Tensor> {
        if dialog_lengths.is_empty() || dialog_lengths.contains(&0) {
            return Err(Error::EmptyDialog);
        }
        let total: usize = dialog_lengths.iter().sum();
        let (rows, _) = input_ids.dims2()?;
        if rows != total || utterance_lengths.len() != rows {
            return Err(Error::msg(format!(
                "dialog lengths sum to {total} but the batch has {rows} utterances"
            )));
        }

        let utterances = self.encoder.forward(input_ids, utterance_lengths)?;
        let hidden = utterances.dim(1)?;

        // regroup the flattened utterance vectors into one padded row per dialog
        let max_dialog = dialog_lengths.iter().copied().max().unwrap_or(0);
        let mut dialogs = Vec::with_capacity(dialog_lengths.len());
        let mut offset = 0;
        for &len in dialog_lengths {
            let mut dialog = utterances.narrow(0, offset, len)?;
            if len < max_dialog {
                let pad = Tensor::zeros(
                    (max_dialog - len, hidden),
                    utterances.dtype(),
                    utterances.device(),
                )?;
                dialog = Tensor::cat(&[&dialog, &pad], 0)?;
            }
            dialogs.push(dialog);
            offset += len;
        }
        let context_input = Tensor::stack(&dialogs, 0)?;

        self.context_encoder.forward(&context_input, dialog_lengths)
    }
}

/// A CRAFT model with the derailment scoring head on top.
pub struct CraftForForecasting {
    model: CraftModel,
    head: ForecastHead,
    config: CraftConfig,
}

impl CraftForForecasting {
    /// Loads a pretrained model from the Hugging Face Hub or a local
    /// checkpoint directory.
    ///
    /// # Arguments
    ///
    /// * `identifier` - The repository id or checkpoint directory of the model.
    /// * `device` - The device to run the model on.
    /// * `dtype` - The numeric type in which the model parameters should be loaded.
    /// * `params` - Optional parameters to specify the revision, user agent, and auth token.
    ///
    /// # Returns
    ///
    /// The loaded model.
    pub fn from_pretrained<S: AsRef<str>>(
        identifier: S,
        device: &Device,
        dtype: Option<DType>,
        params: Option<FromPretrainedParameters>,
    ) -> Result<Self> {
        let model_info = from_pretrained(identifier, params)?;
        let config = model_info
            .get_config()
            .ok_or(Error::MissingModelConfig)?
            .clone();
        let vb = model_info.get_var_builder(dtype.unwrap_or(CRAFT_DTYPE), device)?;
        Self::load(vb, config)
    }
}

impl PreTrainedModel for CraftForForecasting {
    fn load(vb: VarBuilder, config: serde_json::Value) -> Result<Self> {
        let config: CraftConfig = serde_json::from_value(config)?;
        let model = CraftModel::load(vb.pp("craft"), &config)?;
        let head = ForecastHead::load(vb.pp("classifier"), &config)?;
        Ok(Self {
            model,
            head,
            config,
        })
    }

    fn config(&self) -> &PretrainedConfig {
        &self.config.pretrained_config
    }

    fn forward(&self, params: ForwardParams) -> Result<ModelOutput> {
        let input_ids = params
            .get_input_ids()
            .ok_or(Error::MissingForwardParam("input_ids".to_string()))?;
        let utterance_lengths = params
            .get_utterance_lengths()
            .ok_or(Error::MissingForwardParam("utterance_lengths".to_string()))?;
        let dialog_lengths = params
            .get_dialog_lengths()
            .ok_or(Error::MissingForwardParam("dialog_lengths".to_string()))?;
        let context = self
            .model
            .forward(input_ids, utterance_lengths, dialog_lengths)?;
        let logits = self.head.forward(&context)?;
        Ok(ModelOutput::new(logits))
    }
}

#[cfg(test)]
mod tests {
    use candle_core::{DType, Device, Tensor};
    use candle_nn::VarBuilder;

    use super::{CraftForForecasting, CRAFT_DTYPE};
    use crate::model::{ForwardParams, PreTrainedModel};

    fn test_model() -> CraftForForecasting {
        let vb = VarBuilder::zeros(CRAFT_DTYPE, &Device::Cpu);
        let config = serde_json::json!({
            "model_type": "craft",
            "vocab_size": 10,
            "hidden_size": 8,
            "encoder_num_layers": 2,
            "context_num_layers": 2,
            "dropout": 0.1,
            "max_utterance_length": 80,
            "id2label": {"0": "no_attack", "1": "attack"}
        });
        CraftForForecasting::load(vb, config).unwrap()
    }

    #[test]
    fn test_forward_produces_one_logit_per_dialog() {
        let model = test_model();
        // two dialogs flattened into three utterances
        let input_ids = Tensor::zeros((3, 4), DType::U32, &Device::Cpu).unwrap();
        let utterance_lengths = [4, 3, 2];
        let dialog_lengths = [2, 1];
        let output = model
            .forward(ForwardParams::new(
                Some(&input_ids),
                Some(&utterance_lengths),
                Some(&dialog_lengths),
            ))
            .unwrap();
        let logits = output.get_logits().unwrap().to_vec1::<f32>().unwrap();
        assert_eq!(logits.len(), 2);
        // all-zero weights score every context at exactly zero
        assert!(logits.iter().all(|l| l.abs() < 1e-6));
    }

    #[test]
    fn test_forward_rejects_empty_dialogs() {
        let model = test_model();
        let input_ids = Tensor::zeros((1, 2), DType::U32, &Device::Cpu).unwrap();
        let utterance_lengths = [2];
        let dialog_lengths = [1, 0];
        let result = model.forward(ForwardParams::new(
            Some(&input_ids),
            Some(&utterance_lengths),
            Some(&dialog_lengths),
        ));
        assert!(result.is_err());
    }

    #[test]
    fn test_forward_requires_input_ids() {
        let model = test_model();
        assert!(model.forward(ForwardParams::default()).is_err());
    }
}
