use crate::metadata::ResolveError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("not found")]
    NotFound,

    #[error("this action is unauthorized")]
    Forbidden,

    #[error("unauthenticated")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("io error: {0:?}")]
    IO(#[from] std::io::Error),

    #[error("csv error: {0:?}")]
    Csv(#[from] csv::Error),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}
