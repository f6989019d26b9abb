use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid value `{value}` for `{key}`")]
    InvalidValue { key: &'static str, value: String },
    #[error(transparent)]
    Open(#[from] crate::fsutil::FileOpenError),
    #[error("failed to parse configuration `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration document: {0}")]
    Document(#[source] serde_json::Error),
    #[error("invalid scheduling parameters for `{entry}`: {source}")]
    Params {
        entry: String,
        #[source]
        source: crate::sched::Error,
    },
    #[error(transparent)]
    Container(#[from] crate::container::Error),
    #[error(transparent)]
    Registry(#[from] crate::registry::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
