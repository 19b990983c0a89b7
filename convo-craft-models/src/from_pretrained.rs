use std::path::{Path, PathBuf};

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use hf_hub::RepoType;

use convo_craft::{
    get_repo_api, load_json_file, utils::from_pretrained::MODEL_CONFIG_FILE, Error,
    FromPretrainedParameters, Result,
};

const MODEL_SAFETENSORS_FILE: &str = "model.safetensors";
const MODEL_PYTORCH_FILE: &str = "pytorch_model.bin";

/// A struct holding all the information required to load a pretrained model.
pub struct ModelInfo {
    /// The model configuration loaded from the `config.json` file.
    config: Option<serde_json::Value>,
    /// The paths to the model weights files.
    weights_file_paths: Vec<PathBuf>,
    /// A flag indicating whether the model weights are stored in PyTorch format.
    from_pth: bool,
}

impl ModelInfo {
    /// Loads the model weights from the resolved paths into a `VarBuilder`.
    ///
    /// # Arguments
    ///
    /// * `dtype` - The data type of the model weights.
    /// * `device` - The device on which the model weights should be loaded.
    ///
    /// # Returns
    ///
    /// A `VarBuilder` containing the model weights.
    pub fn get_var_builder(&self, dtype: DType, device: &Device) -> Result<VarBuilder> {
        let vb = match self.from_pth {
            true => VarBuilder::from_pth(&self.weights_file_paths[0], dtype, device)?,
            false => unsafe {
                VarBuilder::from_mmaped_safetensors(&self.weights_file_paths, dtype, device)?
            },
        };
        Ok(vb)
    }

    /// Gets a reference to the model configuration.
    pub fn get_config(&self) -> Option<&serde_json::Value> {
        self.config.as_ref()
    }
}

/// Resolves the configuration and weight files of a pretrained model from a
/// local checkpoint directory, or from the Hugging Face Hub if `identifier`
/// is not one.
pub fn from_pretrained<S: AsRef<str>>(
    identifier: S,
    params: Option<FromPretrainedParameters>,
) -> Result<ModelInfo> {
    let identifier = identifier.as_ref();
    let dir = Path::new(identifier);

    let (config_path, weights_path, from_pth) = if dir.is_dir() {
        let config_path = dir.join(MODEL_CONFIG_FILE);
        if !config_path.is_file() {
            return Err(Error::MissingModelConfig);
        }
        let safetensors = dir.join(MODEL_SAFETENSORS_FILE);
        let pytorch = dir.join(MODEL_PYTORCH_FILE);
        if safetensors.is_file() {
            (config_path, safetensors, false)
        } else if pytorch.is_file() {
            (config_path, pytorch, true)
        } else {
            return Err(Error::ModelWeightsNotFound);
        }
    } else {
        let api = get_repo_api(identifier, RepoType::Model, params)?;
        let config_path = api
            .get(MODEL_CONFIG_FILE)
            .map_err(|_| Error::MissingModelConfig)?;
        if let Ok(safetensors) = api.get(MODEL_SAFETENSORS_FILE) {
            (config_path, safetensors, false)
        } else if let Ok(pytorch) = api.get(MODEL_PYTORCH_FILE) {
            (config_path, pytorch, true)
        } else {
            return Err(Error::ModelWeightsNotFound);
        }
    };

    let config = load_json_file(config_path)?;

    Ok(ModelInfo {
        config: Some(config),
        weights_file_paths: vec![weights_path],
        from_pth,
    })
}
