use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid record {id}: {reason}")]
    InvalidRecord { id: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
