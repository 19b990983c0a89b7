pub mod config;
pub mod from_pretrained;
pub mod model;
pub mod models;
pub mod utils;

pub use config::PretrainedConfig;
pub use model::{AutoModelForForecasting, ForwardParams, ModelOutput, PreTrainedModel};

// CRAFT
pub use models::craft::{CraftConfig, CraftForForecasting, CraftModel, CRAFT_DTYPE};
