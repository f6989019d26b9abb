use std::path::PathBuf;

use crate::fsutil;

/// Errors raised while querying or interpreting scheduling data.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Read(#[from] fsutil::FileReadError),
    #[error("failed to parse `{path}`: {reason}")]
    Parse { path: PathBuf, reason: String },
    #[error("unknown scheduling policy `{0}`")]
    UnknownPolicy(String),
}

pub type Result<T> = std::result::Result<T, Error>;
