use thiserror::Error;

/// Named failure conditions of a single analysis call.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Insufficient snapshot data: {found} distinct snapshot time(s), at least {required} required")]
    InsufficientSnapshots { found: usize, required: usize },

    #[error("Co-spend analysis requires a tx_hash on transfer events")]
    MissingTxHash,

    #[error("Unknown clustering algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
