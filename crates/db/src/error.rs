use thiserror::Error;

/// Failures reported by a document store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A write would break a unique constraint.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("failed to decode stored document: {0}")]
    Decode(String),

    #[error(transparent)]
    Backend(#[from] mongodb::error::Error),
}

impl StoreError {
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, StoreError::DuplicateKey(_))
    }
}
