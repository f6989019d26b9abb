use std::collections::TryReserveError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to allocate registry entry: {0}")]
    Allocation(#[from] TryReserveError),

    #[error("no matching configuration found")]
    NotFound,

    #[error("cursor refers to a removed node")]
    StaleCursor,

    #[error("unknown container `{0}`")]
    UnknownContainer(String),

    #[error(transparent)]
    Container(#[from] crate::container::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
