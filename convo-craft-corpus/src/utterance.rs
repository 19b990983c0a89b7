use serde::{Deserialize, Serialize};

use crate::metadata::Metadata;

/// A single utterance of a conversation.
///
/// Deserializes both the current dump field names and the legacy ones
/// (`root`, `reply-to`, `user`) found in older corpus releases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    pub id: String,
    #[serde(alias = "root")]
    pub conversation_id: String,
    #[serde(default, alias = "reply-to")]
    pub reply_to: Option<String>,
    #[serde(alias = "user")]
    pub speaker: String,
    #[serde(default)]
    pub timestamp: Option<f64>,
    pub text: String,
    #[serde(default)]
    pub meta: Metadata,
}

#[cfg(test)]
mod tests {
    use super::Utterance;

    #[test]
    fn test_deserialize_legacy_field_names() {
        let line = r#"{"id":"u2","root":"c1","reply-to":"u1","user":"alice","timestamp":1424798535.0,"text":"hi","meta":{"is_section_header":false}}"#;
        let utterance: Utterance = serde_json::from_str(line).unwrap();
        assert_eq!(utterance.conversation_id, "c1");
        assert_eq!(utterance.reply_to.as_deref(), Some("u1"));
        assert_eq!(utterance.speaker, "alice");
        assert_eq!(utterance.meta.get_bool("is_section_header"), Some(false));
    }

    #[test]
    fn test_deserialize_current_field_names() {
        let line = r#"{"id":"u1","conversation_id":"c1","speaker":"bob","text":"hello"}"#;
        let utterance: Utterance = serde_json::from_str(line).unwrap();
        assert_eq!(utterance.conversation_id, "c1");
        assert!(utterance.reply_to.is_none());
        assert!(utterance.timestamp.is_none());
        assert!(utterance.meta.is_empty());
    }
}
