use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid change: {0}")]
    InvalidChange(String),

    #[error("No changes detected")]
    NoChanges,
}
