mod error;
mod format;
mod gate;
mod moderation;
mod reader;
mod tokens;
mod tree;

pub use error::{EngineError, Result};
pub use format::{
    format_timestamp, CommentFormatter, CommentWrapper, DisplayComment, MarkdownRenderer,
    VerificationMap, DELETED_CONTENT, DELETED_NICKNAME,
};
pub use gate::VerificationGate;
pub use moderation::{ModerationEngine, NewCommentInput};
pub use reader::{page_count, CommenterPage, CommenterSummary, GetCommentsOptions, ThreadReader};
pub use tokens::{
    AcceptNotifyClaims, ApproveClaims, EmailVerifyClaims, TokenClaims, TokenError, TokenService,
};
pub use tree::{load_descendants, Descendants, ThreadArena};

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Deepest reply chain followed by tree walks.
    pub max_thread_depth: usize,
    pub default_page_size: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_thread_depth: 64,
            default_page_size: 10,
        }
    }
}
