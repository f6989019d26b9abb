//! Runtime settings from the environment and the persisted configuration file.

mod document;
mod error;
mod settings;

pub use document::{from_reader, load_file};
pub use error::{Error, Result};
pub use settings::Settings;
