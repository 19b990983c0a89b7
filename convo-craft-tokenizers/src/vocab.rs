use std::collections::HashMap;
use std::fs;
use std::path::Path;

use convo_craft::{Error, Result};

/// Token used for padding short utterances.
pub const PAD_TOKEN: &str = "PAD";
pub const PAD_TOKEN_ID: u32 = 0;
/// Start-of-sentence token.
pub const SOS_TOKEN: &str = "SOS";
pub const SOS_TOKEN_ID: u32 = 1;
/// End-of-sentence token, appended to every encoded utterance.
pub const EOS_TOKEN: &str = "EOS";
pub const EOS_TOKEN_ID: u32 = 2;
/// Unknown word token.
pub const UNK_TOKEN: &str = "UNK";
pub const UNK_TOKEN_ID: u32 = 3;

/// Maximum utterance length in tokens, including the trailing EOS.
pub const MAX_UTTERANCE_LENGTH: usize = 80;

const SPECIAL_TOKENS: [(&str, u32); 4] = [
    (PAD_TOKEN, PAD_TOKEN_ID),
    (SOS_TOKEN, SOS_TOKEN_ID),
    (EOS_TOKEN, EOS_TOKEN_ID),
    (UNK_TOKEN, UNK_TOKEN_ID),
];

/// The fixed vocabulary of a pretrained forecasting model, loaded from the
/// `word2index.json` / `index2word.json` pair shipped with the checkpoint.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    word2index: HashMap<String, u32>,
    index2word: HashMap<u32, String>,
}

impl Vocabulary {
    /// Builds a vocabulary from precomputed lookup maps. The special tokens
    /// are inserted when missing; a map that binds them to other ids is
    /// rejected.
    pub fn new(
        mut word2index: HashMap<String, u32>,
        mut index2word: HashMap<u32, String>,
    ) -> Result<Self> {
        for (token, id) in SPECIAL_TOKENS {
            match word2index.get(token) {
                Some(&found) if found != id => {
                    return Err(Error::MalformedVocabulary(format!(
                        "special token `{token}` is bound to id {found}, expected {id}"
                    )))
                }
                Some(_) => {}
                None => {
                    word2index.insert(token.to_string(), id);
                }
            }
            index2word.entry(id).or_insert_with(|| token.to_string());
        }
        Ok(Self {
            word2index,
            index2word,
        })
    }

    /// Loads the vocabulary from the two JSON lookup files.
    pub fn from_files<P: AsRef<Path>>(word2index_path: P, index2word_path: P) -> Result<Self> {
        let word2index: HashMap<String, u32> =
            serde_json::from_str(&fs::read_to_string(word2index_path)?)
                .map_err(|e| Error::MalformedVocabulary(e.to_string()))?;
        // index2word keys are serialized as strings of numbers
        let index2word: HashMap<String, String> =
            serde_json::from_str(&fs::read_to_string(index2word_path)?)
                .map_err(|e| Error::MalformedVocabulary(e.to_string()))?;
        let index2word = index2word
            .into_iter()
            .map(|(k, v)| {
                let id = k
                    .parse::<u32>()
                    .map_err(|_| Error::MalformedVocabulary(format!("non-numeric index `{k}`")))?;
                Ok((id, v))
            })
            .collect::<Result<HashMap<u32, String>>>()?;
        Self::new(word2index, index2word)
    }

    pub fn len(&self) -> usize {
        self.word2index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.word2index.is_empty()
    }

    pub fn id_of(&self, word: &str) -> Option<u32> {
        self.word2index.get(word).copied()
    }

    pub fn word_of(&self, id: u32) -> Option<&str> {
        self.index2word.get(&id).map(String::as_str)
    }

    pub fn word2index(&self) -> &HashMap<String, u32> {
        &self.word2index
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{Vocabulary, EOS_TOKEN_ID, UNK_TOKEN_ID};

    #[test]
    fn test_special_tokens_inserted_when_missing() {
        let mut word2index = HashMap::new();
        word2index.insert("hello".to_string(), 4);
        let voc = Vocabulary::new(word2index, HashMap::new()).unwrap();
        assert_eq!(voc.id_of("UNK"), Some(UNK_TOKEN_ID));
        assert_eq!(voc.word_of(EOS_TOKEN_ID), Some("EOS"));
        assert_eq!(voc.id_of("hello"), Some(4));
    }

    #[test]
    fn test_conflicting_special_token_rejected() {
        let mut word2index = HashMap::new();
        word2index.insert("PAD".to_string(), 7);
        assert!(Vocabulary::new(word2index, HashMap::new()).is_err());
    }

    #[test]
    fn test_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let w2i = dir.path().join("word2index.json");
        let i2w = dir.path().join("index2word.json");
        std::fs::write(&w2i, r#"{"UNK":3,"hello":4,"world":5}"#).unwrap();
        std::fs::write(&i2w, r#"{"3":"UNK","4":"hello","5":"world"}"#).unwrap();
        let voc = Vocabulary::from_files(&w2i, &i2w).unwrap();
        assert_eq!(voc.id_of("world"), Some(5));
        assert_eq!(voc.word_of(4), Some("hello"));
    }
}
