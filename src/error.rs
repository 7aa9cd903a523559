use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("malformed board descriptor: {0}")]
    Descriptor(#[from] serde_json::Error),

    #[error("board has no binding for the base ROM")]
    NoRomMapping,
}

pub type Result<T> = std::result::Result<T, BoardError>;
