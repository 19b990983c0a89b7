use candle_core::{DType, Device, Tensor};
use convo_craft::{Error, FromPretrainedParameters, Result};
use candle_nn::VarBuilder;

use crate::config::PretrainedConfig;
use crate::from_pretrained::from_pretrained;
use crate::models::craft::{CraftForForecasting, CRAFT_DTYPE};

/// Parameters for the `forward` method of a `PreTrainedModel`.
///
/// The flattened utterance batch is described by `input_ids` plus the true
/// length of every row; `dialog_lengths` tells how many consecutive rows
/// belong to each dialog.
pub struct ForwardParams<'a> {
    pub input_ids: Option<&'a Tensor>,
    pub utterance_lengths: Option<&'a [usize]>,
    pub dialog_lengths: Option<&'a [usize]>,
}

impl<'a> ForwardParams<'a> {
    pub fn new(
        input_ids: Option<&'a Tensor>,
        utterance_lengths: Option<&'a [usize]>,
        dialog_lengths: Option<&'a [usize]>,
    ) -> Self {
        Self {
            input_ids,
            utterance_lengths,
            dialog_lengths,
        }
    }

    pub fn get_input_ids(&self) -> Option<&'a Tensor> {
        self.input_ids
    }

    pub fn get_utterance_lengths(&self) -> Option<&'a [usize]> {
        self.utterance_lengths
    }

    pub fn get_dialog_lengths(&self) -> Option<&'a [usize]> {
        self.dialog_lengths
    }
}

impl<'a> Default for ForwardParams<'a> {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

#[cfg(feature = "tokenizers")]
impl<'a> From<&'a convo_craft_tokenizers::DialogEncoding> for ForwardParams<'a> {
    fn from(encoding: &'a convo_craft_tokenizers::DialogEncoding) -> Self {
        Self::new(
            Some(encoding.get_input_ids()),
            Some(encoding.get_utterance_lengths()),
            Some(encoding.get_dialog_lengths()),
        )
    }
}

/// The output of a forward pass.
#[derive(Debug)]
pub struct ModelOutput {
    logits: Option<Tensor>,
}

impl ModelOutput {
    pub fn new(logits: Tensor) -> Self {
        Self {
            logits: Some(logits),
        }
    }

    pub fn get_logits(&self) -> Option<&Tensor> {
        self.logits.as_ref()
    }
}

/// Trait for a pre-trained model.
pub trait PreTrainedModel {
    fn load(vb: VarBuilder, config: serde_json::Value) -> Result<Self>
    where
        Self: Sized;
    fn config(&self) -> &PretrainedConfig;
    fn forward(&self, params: ForwardParams) -> Result<ModelOutput>;
}

/// Loads the appropriate forecasting model for the `model_type` declared in
/// the checkpoint's `config.json`.
pub struct AutoModelForForecasting;

impl AutoModelForForecasting {
    /// Loads a pretrained forecasting model from the Hugging Face Hub or a
    /// local checkpoint directory.
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
    ) -> Result<Box<dyn PreTrainedModel>> {
        let model_info = from_pretrained(identifier, params)?;
        let config = model_info
            .get_config()
            .ok_or(Error::MissingModelConfig)?
            .clone();
        let model_type = config
            .get("model_type")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let vb = model_info.get_var_builder(dtype.unwrap_or(CRAFT_DTYPE), device)?;
        match model_type.as_str() {
            "craft" => Ok(Box::new(CraftForForecasting::load(vb, config)?)),
            _ => Err(Error::ModelNotImplemented(model_type)),
        }
    }
}
