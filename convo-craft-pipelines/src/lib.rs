pub mod forecast;

pub use forecast::{ForecastOptions, ForecastPipeline, UtteranceForecast};
