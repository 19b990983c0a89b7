use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// The configuration tail shared by all pretrained models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PretrainedConfig {
    /// A map of the label ids to their corresponding labels.
    #[serde(default, deserialize_with = "deserialize_id2label")]
    id2label: Option<HashMap<usize, String>>,
    /// The ID of the PAD token.
    pad_token_id: Option<u32>,
}

impl PretrainedConfig {
    pub fn get_id2label(&self) -> Option<&HashMap<usize, String>> {
        self.id2label.as_ref()
    }

    pub fn get_pad_token_id(&self) -> Option<u32> {
        self.pad_token_id
    }

    pub fn label_for(&self, id: usize) -> Option<&str> {
        self.id2label
            .as_ref()
            .and_then(|map| map.get(&id))
            .map(String::as_str)
    }

    /// Gets the number of labels the model was trained on.
    pub fn num_labels(&self) -> usize {
        self.id2label.as_ref().map_or(0, HashMap::len)
    }
}

fn deserialize_id2label<'de, D>(deserializer: D) -> Result<Option<HashMap<usize, String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let map: Option<HashMap<String, String>> = Deserialize::deserialize(deserializer)?;
    map.map(|m| {
        m.into_iter()
            .map(|(k, v)| {
                let id = k.parse::<usize>().map_err(serde::de::Error::custom)?;
                Ok((id, v))
            })
            .collect::<Result<HashMap<usize, String>, D::Error>>()
    })
    .transpose()
}
