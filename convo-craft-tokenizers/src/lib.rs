pub mod encoding;
pub mod from_pretrained;
pub mod tokenizer;
pub mod vocab;

pub use encoding::{BatchEncoding, DialogEncoding};
pub use tokenizer::CraftTokenizer;
pub use vocab::{
    Vocabulary, EOS_TOKEN, EOS_TOKEN_ID, MAX_UTTERANCE_LENGTH, PAD_TOKEN, PAD_TOKEN_ID, SOS_TOKEN,
    SOS_TOKEN_ID, UNK_TOKEN, UNK_TOKEN_ID,
};
