pub mod config;
pub mod modeling;

pub use config::CraftConfig;
pub use modeling::{CraftForForecasting, CraftModel, CRAFT_DTYPE};
