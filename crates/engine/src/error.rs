use domain::CommentId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("comment not found: {0}")]
    NotFound(CommentId),

    #[error("parent comment {parent_id} does not exist on this page")]
    InvalidParent { parent_id: CommentId },

    /// Reply chain deeper than the configured limit, usually a `parent_id` cycle.
    #[error("reply chain exceeds the maximum depth of {limit}")]
    DepthExceeded { limit: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
