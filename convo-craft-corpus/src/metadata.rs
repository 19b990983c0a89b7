use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form metadata attached to a corpus, conversation, or utterance.
///
/// Keys referenced by callers may be absent; the typed accessors return
/// `Option` instead of panicking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn insert<V: Into<Value>>(&mut self, key: &str, value: V) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::Metadata;

    #[test]
    fn test_typed_accessors() {
        let mut meta = Metadata::new();
        meta.insert("split", "test");
        meta.insert("has_attack", true);
        meta.insert("score", 0.75);

        assert_eq!(meta.get_str("split"), Some("test"));
        assert_eq!(meta.get_bool("has_attack"), Some(true));
        assert_eq!(meta.get_f64("score"), Some(0.75));
        // absent and mistyped keys resolve to None
        assert_eq!(meta.get_str("missing"), None);
        assert_eq!(meta.get_bool("split"), None);
    }
}
