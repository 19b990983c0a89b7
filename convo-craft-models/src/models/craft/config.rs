use serde::{Deserialize, Serialize};

use crate::config::PretrainedConfig;

/// The configuration of a CRAFT forecasting model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CraftConfig {
    pub vocab_size: usize,
    pub hidden_size: usize,
    pub encoder_num_layers: usize,
    pub context_num_layers: usize,
    pub dropout: f32,
    pub max_utterance_length: usize,
    pub model_type: Option<String>,

    #[serde(flatten)]
    pub pretrained_config: PretrainedConfig,
}

impl Default for CraftConfig {
    fn default() -> Self {
        Self {
            vocab_size: 50004,
            hidden_size: 500,
            encoder_num_layers: 2,
            context_num_layers: 2,
            dropout: 0.1,
            max_utterance_length: 80,
            model_type: Some("craft".to_string()),
            pretrained_config: PretrainedConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CraftConfig;

    #[test]
    fn test_deserialize_with_labels() {
        let config: CraftConfig = serde_json::from_str(
            r#"{
                "model_type": "craft",
                "vocab_size": 10,
                "hidden_size": 8,
                "id2label": {"0": "no_attack", "1": "attack"}
            }"#,
        )
        .unwrap();
        assert_eq!(config.vocab_size, 10);
        assert_eq!(config.hidden_size, 8);
        // omitted fields fall back to the pretrained defaults
        assert_eq!(config.encoder_num_layers, 2);
        assert_eq!(config.pretrained_config.label_for(1), Some("attack"));
    }
}
