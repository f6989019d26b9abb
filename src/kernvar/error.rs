use std::path::PathBuf;

use crate::fsutil::FileReadError;

/// Errors raised by kernel virtual file system accessors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("parameter name must not be empty")]
    EmptyName,
    #[error("parameter path `{prefix}{name}` exceeds {max} bytes")]
    PathTooLong {
        prefix: String,
        name: String,
        max: usize,
    },
    #[error("failed to read kernel parameter: {0}")]
    Read(#[from] FileReadError),
    #[error("kernel parameter `{path}` is empty")]
    Empty { path: PathBuf },
    #[error("failed to write kernel parameter `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid cpu list `{0}`")]
    InvalidCpuList(String),
}

impl Error {
    /// Returns the OS error code of the underlying I/O failure, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::Read(err) => err.source.raw_os_error(),
            Error::Write { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
