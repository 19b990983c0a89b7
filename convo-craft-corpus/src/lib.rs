pub mod conversation;
pub mod corpus;
pub mod from_pretrained;
pub mod metadata;
pub mod utterance;

pub use conversation::Conversation;
pub use corpus::Corpus;
pub use metadata::Metadata;
pub use utterance::Utterance;
