use hf_hub::{
    api::sync::{Api, ApiRepo},
    Repo, RepoType,
};

use crate::{Error, Result};
use std::{collections::HashMap, fs, path::Path};

pub const MODEL_CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone)]
pub struct FromPretrainedParameters {
    pub revision: String,
    pub user_agent: HashMap<String, String>,
    pub auth_token: Option<String>,
}

impl Default for FromPretrainedParameters {
    fn default() -> Self {
        Self {
            revision: "main".into(),
            user_agent: HashMap::new(),
            auth_token: None,
        }
    }
}

/// Gets an [`ApiRepo`] instance for the provided repository ID, checking that the
/// repository actually exists.
///
/// # Arguments
///
/// * `repo_id` - The repository ID.
/// * `repo_type` - Whether the repository holds a model or a dataset.
/// * `params` - The parameters to use when creating the API instance.
///
/// # Returns
///
/// The API instance.
pub fn get_repo_api(
    repo_id: &str,
    repo_type: RepoType,
    params: Option<FromPretrainedParameters>,
) -> Result<ApiRepo> {
    let params = params.unwrap_or_default();
    let repo = Repo::with_revision(repo_id.to_string(), repo_type, params.revision);
    let api = Api::new()?.repo(repo);

    if api.info().is_err() {
        return Err(Error::RepositoryNotFound(repo_id.to_string()));
    }

    Ok(api)
}

/// Reads and parses a JSON file (model configurations, vocabulary files).
pub fn load_json_file<P: AsRef<Path>>(file_path: P) -> Result<serde_json::Value> {
    let contents = fs::read_to_string(file_path)?;
    let value = serde_json::from_str(&contents)?;
    Ok(value)
}
