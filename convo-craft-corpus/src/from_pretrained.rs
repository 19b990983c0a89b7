use std::path::PathBuf;

use convo_craft::{get_repo_api, Error, FromPretrainedParameters, Result};
use hf_hub::RepoType;

use crate::corpus::{CONVERSATIONS_FILE, CORPUS_META_FILE, UTTERANCES_FILE};

/// Downloads the dump files of a named dataset from the Hugging Face Hub into
/// the local cache and returns the directory they were cached in.
///
/// `utterances.jsonl` is required; `conversations.json` and `corpus.json` are
/// fetched when present.
pub fn from_pretrained(
    dataset_id: &str,
    params: Option<FromPretrainedParameters>,
) -> Result<PathBuf> {
    let api = get_repo_api(dataset_id, RepoType::Dataset, params)?;

    let utterances_path = api
        .get(UTTERANCES_FILE)
        .map_err(|_| Error::MissingCorpusFile(format!("{dataset_id}/{UTTERANCES_FILE}")))?;

    for file in [CONVERSATIONS_FILE, CORPUS_META_FILE] {
        if api.get(file).is_err() {
            tracing::warn!("dataset '{}' has no {}", dataset_id, file);
        }
    }

    let dir = utterances_path
        .parent()
        .map(PathBuf::from)
        .ok_or_else(|| Error::MissingCorpusFile(UTTERANCES_FILE.to_string()))?;

    Ok(dir)
}
