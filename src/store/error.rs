use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store root is not a directory: {}", .0.display())]
    InvalidRoot(PathBuf),
}

pub type Result<T> = std::result::Result<T, StoreError>;
