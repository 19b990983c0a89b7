pub mod error;
pub mod utils;

pub use error::Error;
pub use utils::{get_repo_api, load_json_file, FromPretrainedParameters};

/// A type alias for `Result<T, Error>` for the `convo-craft` crates.
pub type Result<T> = std::result::Result<T, Error>;
