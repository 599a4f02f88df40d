//! Configuration for the execution core
//!
//! Everything is optional: a missing file, or a file that names only a few
//! fields, yields a working configuration. `WEBCODER_*` environment variables
//! override the file.

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

use crate::errors::WebcoderError;
use std::path::Path;

/// Load a configuration from a YAML file, falling back to defaults when the
/// file does not exist
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<WebcoderConfig, WebcoderError> {
    ConfigLoader::from_file(path).await
}
