use std::path::{Path, PathBuf};

use convo_craft::{get_repo_api, Error, FromPretrainedParameters, Result};
use hf_hub::RepoType;

use crate::vocab::Vocabulary;

pub const WORD2INDEX_FILE: &str = "word2index.json";
pub const INDEX2WORD_FILE: &str = "index2word.json";

/// Loads the vocabulary of a pretrained model from a Hugging Face Hub model
/// repository, or from a local checkpoint directory if `identifier` is one.
pub fn from_pretrained(
    identifier: &str,
    params: Option<FromPretrainedParameters>,
) -> Result<Vocabulary> {
    let dir = Path::new(identifier);
    let (word2index_path, index2word_path) = if dir.is_dir() {
        let word2index_path = dir.join(WORD2INDEX_FILE);
        let index2word_path = dir.join(INDEX2WORD_FILE);
        for path in [&word2index_path, &index2word_path] {
            if !path.is_file() {
                return Err(Error::MissingVocabularyFile(path.display().to_string()));
            }
        }
        (word2index_path, index2word_path)
    } else {
        let api = get_repo_api(identifier, RepoType::Model, params)?;
        let word2index_path: PathBuf = api
            .get(WORD2INDEX_FILE)
            .map_err(|_| Error::MissingVocabularyFile(format!("{identifier}/{WORD2INDEX_FILE}")))?;
        let index2word_path: PathBuf = api
            .get(INDEX2WORD_FILE)
            .map_err(|_| Error::MissingVocabularyFile(format!("{identifier}/{INDEX2WORD_FILE}")))?;
        (word2index_path, index2word_path)
    };

    Vocabulary::from_files(&word2index_path, &index2word_path)
}
