use candle_core::{Device, Tensor};
use convo_craft::{Error, FromPretrainedParameters, Result};
use tokenizers::models::wordlevel::WordLevel;
use tokenizers::normalizers::{
    Lowercase, NormalizerWrapper, Sequence as NormalizerSequence, StripAccents, NFD,
};
use tokenizers::pre_tokenizers::sequence::Sequence as PreTokenizerSequence;
use tokenizers::pre_tokenizers::split::{Split, SplitPattern};
use tokenizers::pre_tokenizers::whitespace::WhitespaceSplit;
use tokenizers::pre_tokenizers::PreTokenizerWrapper;
use tokenizers::{SplitDelimiterBehavior, Tokenizer as CoreTokenizer};

use crate::encoding::{BatchEncoding, DialogEncoding};
use crate::from_pretrained::from_pretrained;
use crate::vocab::{Vocabulary, EOS_TOKEN_ID, MAX_UTTERANCE_LENGTH, PAD_TOKEN_ID, UNK_TOKEN};

/// The word-level tokenizer of the pretrained forecasting models.
///
/// Text is NFD-normalized with diacritics stripped, lowercased, and split
/// into word and single-punctuation tokens; out-of-vocabulary words map to
/// `UNK`. Every encoded utterance is truncated to fit and terminated with
/// EOS, then padded with PAD to the longest row of the batch.
pub struct CraftTokenizer {
    tokenizer: CoreTokenizer,
    vocabulary: Vocabulary,
}

impl CraftTokenizer {
    pub fn from_vocabulary(vocabulary: Vocabulary) -> Result<Self> {
        let model = WordLevel::builder()
            .vocab(vocabulary.word2index().clone().into_iter().collect())
            .unk_token(UNK_TOKEN.to_string())
            .build()
            .map_err(|e| Error::TokenizerBuildError(e.to_string()))?;

        let mut tokenizer = CoreTokenizer::new(model);

        let normalizer: NormalizerWrapper =
            NormalizerSequence::new(vec![NFD.into(), StripAccents.into(), Lowercase.into()])
                .into();
        tokenizer.with_normalizer(Some(normalizer));

        let punctuation = Split::new(
            SplitPattern::Regex(r"[^\w\s]".to_string()),
            SplitDelimiterBehavior::Isolated,
            false,
        )
        .map_err(|e| Error::TokenizerBuildError(e.to_string()))?;
        let pre_tokenizer: PreTokenizerWrapper =
            PreTokenizerSequence::new(vec![WhitespaceSplit.into(), punctuation.into()]).into();
        tokenizer.with_pre_tokenizer(Some(pre_tokenizer));

        Ok(Self {
            tokenizer,
            vocabulary,
        })
    }

    /// Loads the tokenizer of a pretrained model from a Hugging Face Hub
    /// repository or a local checkpoint directory.
    pub fn from_pretrained<S: AsRef<str>>(
        identifier: S,
        params: Option<FromPretrainedParameters>,
    ) -> Result<Self> {
        let vocabulary = from_pretrained(identifier.as_ref(), params)?;
        Self::from_vocabulary(vocabulary)
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Normalized word tokens of `text`, with out-of-vocabulary words already
    /// folded to `UNK`.
    pub fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| Error::TokenizerEncodingError(e.to_string()))?;
        Ok(encoding.get_tokens().to_vec())
    }

    fn encode_ids(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| Error::TokenizerEncodingError(e.to_string()))?;
        let mut ids = encoding.get_ids().to_vec();
        // leave room for the EOS token
        ids.truncate(MAX_UTTERANCE_LENGTH - 1);
        ids.push(EOS_TOKEN_ID);
        Ok(ids)
    }

    fn pad_rows(rows: Vec<Vec<u32>>) -> Result<(Tensor, Tensor, Vec<usize>)> {
        let lengths: Vec<usize> = rows.iter().map(Vec::len).collect();
        let max_len = lengths.iter().copied().max().unwrap_or(0);
        let num_rows = rows.len();

        let mut input_ids = Vec::with_capacity(num_rows * max_len);
        let mut attention_mask = Vec::with_capacity(num_rows * max_len);
        for row in &rows {
            input_ids.extend_from_slice(row);
            input_ids.extend(std::iter::repeat(PAD_TOKEN_ID).take(max_len - row.len()));
            attention_mask.extend(std::iter::repeat(1u32).take(row.len()));
            attention_mask.extend(std::iter::repeat(0u32).take(max_len - row.len()));
        }

        let input_ids = Tensor::from_vec(input_ids, (num_rows, max_len), &Device::Cpu)?;
        let attention_mask = Tensor::from_vec(attention_mask, (num_rows, max_len), &Device::Cpu)?;
        Ok((input_ids, attention_mask, lengths))
    }

    /// Encodes a batch of utterances into padded id and mask tensors.
    pub fn encode<S: AsRef<str>>(&self, texts: &[S]) -> Result<BatchEncoding> {
        let rows = texts
            .iter()
            .map(|text| self.encode_ids(text.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let (input_ids, attention_mask, lengths) = Self::pad_rows(rows)?;
        Ok(BatchEncoding::new(input_ids, attention_mask, lengths))
    }

    /// Encodes a batch of dialogs into one flattened utterance batch,
    /// keeping the utterances of each dialog contiguous and in order.
    pub fn encode_dialogs<S: AsRef<str>>(&self, dialogs: &[Vec<S>]) -> Result<DialogEncoding> {
        let dialog_lengths: Vec<usize> = dialogs.iter().map(Vec::len).collect();
        let rows = dialogs
            .iter()
            .flat_map(|dialog| dialog.iter())
            .map(|text| self.encode_ids(text.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let (input_ids, attention_mask, utterance_lengths) = Self::pad_rows(rows)?;
        Ok(DialogEncoding::new(
            input_ids,
            attention_mask,
            utterance_lengths,
            dialog_lengths,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::CraftTokenizer;
    use crate::vocab::{Vocabulary, EOS_TOKEN_ID, MAX_UTTERANCE_LENGTH, PAD_TOKEN_ID};

    fn tokenizer() -> CraftTokenizer {
        let words = ["hello", "world", ",", "!", "cafe", "a"];
        let mut word2index = HashMap::new();
        let mut index2word = HashMap::new();
        for (i, word) in words.iter().enumerate() {
            let id = (i + 4) as u32;
            word2index.insert(word.to_string(), id);
            index2word.insert(id, word.to_string());
        }
        let vocabulary = Vocabulary::new(word2index, index2word).unwrap();
        CraftTokenizer::from_vocabulary(vocabulary).unwrap()
    }

    #[test]
    fn test_tokenize_lowercases_and_splits_punctuation() {
        let tokenizer = tokenizer();
        let tokens = tokenizer.tokenize("Hello, World!").unwrap();
        assert_eq!(tokens, ["hello", ",", "world", "!"]);
    }

    #[test]
    fn test_tokenize_strips_diacritics() {
        let tokenizer = tokenizer();
        let tokens = tokenizer.tokenize("Café").unwrap();
        assert_eq!(tokens, ["cafe"]);
    }

    #[test]
    fn test_tokenize_folds_out_of_vocabulary_words() {
        let tokenizer = tokenizer();
        let tokens = tokenizer.tokenize("hello stranger").unwrap();
        assert_eq!(tokens, ["hello", "UNK"]);
    }

    #[test]
    fn test_encode_appends_eos_and_pads() {
        let tokenizer = tokenizer();
        let encoding = tokenizer.encode(&["hello world", "hello"]).unwrap();
        assert_eq!(encoding.get_lengths(), [3, 2]);
        let ids = encoding.get_input_ids().to_vec2::<u32>().unwrap();
        assert_eq!(ids[0], [4, 5, EOS_TOKEN_ID]);
        assert_eq!(ids[1], [4, EOS_TOKEN_ID, PAD_TOKEN_ID]);
        let mask = encoding.get_attention_mask().to_vec2::<u32>().unwrap();
        assert_eq!(mask[0], [1, 1, 1]);
        assert_eq!(mask[1], [1, 1, 0]);
    }

    #[test]
    fn test_encode_truncates_long_utterances() {
        let tokenizer = tokenizer();
        let long = vec!["a"; 200].join(" ");
        let encoding = tokenizer.encode(&[long]).unwrap();
        assert_eq!(encoding.get_lengths(), [MAX_UTTERANCE_LENGTH]);
        let ids = encoding.get_input_ids().to_vec2::<u32>().unwrap();
        assert_eq!(ids[0].len(), MAX_UTTERANCE_LENGTH);
        assert_eq!(*ids[0].last().unwrap(), EOS_TOKEN_ID);
    }

    #[test]
    fn test_encode_empty_text_is_a_lone_eos() {
        let tokenizer = tokenizer();
        let encoding = tokenizer.encode(&[""]).unwrap();
        assert_eq!(encoding.get_lengths(), [1]);
        let ids = encoding.get_input_ids().to_vec2::<u32>().unwrap();
        assert_eq!(ids[0], [EOS_TOKEN_ID]);
    }

    #[test]
    fn test_encode_dialogs_keeps_dialog_grouping() {
        let tokenizer = tokenizer();
        let dialogs = vec![vec!["hello world", "hello"], vec!["world"]];
        let encoding = tokenizer.encode_dialogs(&dialogs).unwrap();
        assert_eq!(encoding.get_dialog_lengths(), [2, 1]);
        assert_eq!(encoding.get_utterance_lengths(), [3, 2, 2]);
        assert_eq!(encoding.get_input_ids().dims(), [3, 3]);
    }
}
