use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;

use convo_craft::{Error, FromPretrainedParameters, Result};

use crate::conversation::Conversation;
use crate::from_pretrained::from_pretrained;
use crate::metadata::Metadata;
use crate::utterance::Utterance;

pub const UTTERANCES_FILE: &str = "utterances.jsonl";
pub const CONVERSATIONS_FILE: &str = "conversations.json";
pub const CORPUS_META_FILE: &str = "corpus.json";

/// An in-memory conversation corpus.
///
/// Conversations iterate in id order; the utterances of a conversation
/// iterate in chronological order.
#[derive(Debug, Default)]
pub struct Corpus {
    meta: Metadata,
    conversations: BTreeMap<String, Conversation>,
    utterances: HashMap<String, Utterance>,
}

impl Corpus {
    /// Loads a corpus from a directory containing `utterances.jsonl` and,
    /// optionally, `conversations.json` and `corpus.json`.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();

        let utterances_path = dir.join(UTTERANCES_FILE);
        if !utterances_path.is_file() {
            return Err(Error::MissingCorpusFile(
                utterances_path.display().to_string(),
            ));
        }

        let mut corpus = Corpus::default();

        let conversations_path = dir.join(CONVERSATIONS_FILE);
        if conversations_path.is_file() {
            let contents = fs::read_to_string(&conversations_path)?;
            let metas: HashMap<String, Metadata> = serde_json::from_str(&contents)
                .map_err(|e| Error::MalformedCorpus(format!("{CONVERSATIONS_FILE}: {e}")))?;
            for (id, meta) in metas {
                corpus
                    .conversations
                    .insert(id.clone(), Conversation::new(id, meta));
            }
        }

        let meta_path = dir.join(CORPUS_META_FILE);
        if meta_path.is_file() {
            let contents = fs::read_to_string(&meta_path)?;
            corpus.meta = serde_json::from_str(&contents)
                .map_err(|e| Error::MalformedCorpus(format!("{CORPUS_META_FILE}: {e}")))?;
        }

        let reader = BufReader::new(File::open(&utterances_path)?);
        for (line_number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let utterance: Utterance = serde_json::from_str(&line).map_err(|e| {
                Error::MalformedCorpus(format!("{UTTERANCES_FILE}:{}: {e}", line_number + 1))
            })?;
            corpus.add_utterance(utterance);
        }

        corpus.sort_conversations();

        tracing::debug!(
            conversations = corpus.conversations.len(),
            utterances = corpus.utterances.len(),
            "loaded corpus from {}",
            dir.display()
        );

        Ok(corpus)
    }

    /// Downloads a named dataset from the Hugging Face Hub and loads it.
    pub fn from_pretrained<S: AsRef<str>>(
        dataset_id: S,
        params: Option<FromPretrainedParameters>,
    ) -> Result<Self> {
        let dir = from_pretrained(dataset_id.as_ref(), params)?;
        Self::from_dir(dir)
    }

    fn add_utterance(&mut self, utterance: Utterance) {
        // partial dumps may omit conversations.json entries
        let conversation = self
            .conversations
            .entry(utterance.conversation_id.clone())
            .or_insert_with(|| {
                Conversation::new(utterance.conversation_id.clone(), Metadata::new())
            });
        conversation.push_utterance_id(utterance.id.clone());
        self.utterances.insert(utterance.id.clone(), utterance);
    }

    fn sort_conversations(&mut self) {
        for conversation in self.conversations.values_mut() {
            let mut ids = conversation.utterance_ids().to_vec();
            ids.sort_by(|a, b| {
                let ta = self
                    .utterances
                    .get(a)
                    .and_then(|u| u.timestamp)
                    .unwrap_or(f64::NEG_INFINITY);
                let tb = self
                    .utterances
                    .get(b)
                    .and_then(|u| u.timestamp)
                    .unwrap_or(f64::NEG_INFINITY);
                ta.total_cmp(&tb).then_with(|| a.cmp(b))
            });
            conversation.set_utterance_ids(ids);
        }
    }

    pub fn meta(&self) -> &Metadata {
        &self.meta
    }

    pub fn num_conversations(&self) -> usize {
        self.conversations.len()
    }

    pub fn num_utterances(&self) -> usize {
        self.utterances.len()
    }

    pub fn iter_conversations(&self) -> impl Iterator<Item = &Conversation> {
        self.conversations.values()
    }

    pub fn get_conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    pub fn get_utterance(&self, id: &str) -> Option<&Utterance> {
        self.utterances.get(id)
    }

    /// Mutable access to an utterance, for annotating its metadata.
    pub fn utterance_mut(&mut self, id: &str) -> Option<&mut Utterance> {
        self.utterances.get_mut(id)
    }

    /// The utterances of a conversation, in chronological order.
    pub fn utterances_of(&self, conversation: &Conversation) -> Vec<&Utterance> {
        conversation
            .utterance_ids()
            .iter()
            .filter_map(|id| self.utterances.get(id))
            .collect()
    }

    pub fn iter_utterances(&self) -> impl Iterator<Item = &Utterance> {
        self.conversations
            .values()
            .flat_map(|c| c.utterance_ids())
            .filter_map(|id| self.utterances.get(id))
    }

    pub fn filter_conversations<P>(&self, predicate: P) -> Vec<&Conversation>
    where
        P: Fn(&Conversation) -> bool,
    {
        self.conversations
            .values()
            .filter(|c| predicate(c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::Corpus;

    fn write_fixture(dir: &std::path::Path) {
        let utterances = [
            // out of chronological order on purpose, legacy field names
            r#"{"id":"u3","root":"c1","reply-to":"u2","user":"carol","timestamp":30.0,"text":"third","meta":{"comment_has_personal_attack":true}}"#,
            r#"{"id":"u1","root":"c1","reply-to":null,"user":"alice","timestamp":10.0,"text":"first","meta":{"is_section_header":true}}"#,
            r#"{"id":"u2","root":"c1","reply-to":"u1","user":"bob","timestamp":20.0,"text":"second","meta":{}}"#,
            // conversation without a conversations.json entry
            r#"{"id":"u4","root":"c2","reply-to":null,"user":"dave","timestamp":5.0,"text":"lonely","meta":{}}"#,
        ]
        .join("\n");
        fs::write(dir.join("utterances.jsonl"), utterances).unwrap();
        fs::write(
            dir.join("conversations.json"),
            r#"{"c1":{"split":"test","conversation_has_personal_attack":true}}"#,
        )
        .unwrap();
        fs::write(dir.join("corpus.json"), r#"{"name":"test-corpus"}"#).unwrap();
    }

    #[test]
    fn test_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());

        let corpus = Corpus::from_dir(dir.path()).unwrap();
        assert_eq!(corpus.num_conversations(), 2);
        assert_eq!(corpus.num_utterances(), 4);
        assert_eq!(corpus.meta().get_str("name"), Some("test-corpus"));

        let c1 = corpus.get_conversation("c1").unwrap();
        assert_eq!(c1.meta().get_str("split"), Some("test"));
        assert_eq!(c1.meta().get_bool("conversation_has_personal_attack"), Some(true));
        assert_eq!(c1.utterance_ids(), ["u1", "u2", "u3"]);

        // conversations absent from conversations.json are created with empty
        // metadata instead of failing
        let c2 = corpus.get_conversation("c2").unwrap();
        assert!(c2.meta().is_empty());
        assert_eq!(c2.utterance_ids(), ["u4"]);
    }

    #[test]
    fn test_chronological_iteration() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());

        let corpus = Corpus::from_dir(dir.path()).unwrap();
        let c1 = corpus.get_conversation("c1").unwrap();
        let texts: Vec<&str> = corpus
            .utterances_of(c1)
            .iter()
            .map(|u| u.text.as_str())
            .collect();
        assert_eq!(texts, ["first", "second", "third"]);
    }

    #[test]
    fn test_annotation_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());

        let mut corpus = Corpus::from_dir(dir.path()).unwrap();
        corpus
            .utterance_mut("u2")
            .unwrap()
            .meta
            .insert("forecast_score", 0.9);
        assert_eq!(
            corpus.get_utterance("u2").unwrap().meta.get_f64("forecast_score"),
            Some(0.9)
        );
    }

    #[test]
    fn test_filter_conversations() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());

        let corpus = Corpus::from_dir(dir.path()).unwrap();
        let test_split =
            corpus.filter_conversations(|c| c.meta().get_str("split") == Some("test"));
        assert_eq!(test_split.len(), 1);
        assert_eq!(test_split[0].id(), "c1");
    }

    #[test]
    fn test_missing_utterances_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Corpus::from_dir(dir.path()).is_err());
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("utterances.jsonl"), "not json").unwrap();
        let err = Corpus::from_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("utterances.jsonl:1"));
    }
}
