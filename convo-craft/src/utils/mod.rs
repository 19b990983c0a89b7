pub mod from_pretrained;

pub use from_pretrained::{get_repo_api, load_json_file, FromPretrainedParameters};
