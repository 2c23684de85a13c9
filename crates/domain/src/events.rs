use crate::models::{Comment, CommentId, ProjectId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HookEvent {
    CommentCreated {
        project_id: ProjectId,
        comment: Comment,
    },
    CommentApproved {
        project_id: ProjectId,
        comment_id: CommentId,
        parent_id: Option<CommentId>,
    },
    ModeratorReplied {
        comment: Comment,
        parent_id: CommentId,
    },
}

impl HookEvent {
    pub fn project_id(&self) -> &ProjectId {
        match self {
            HookEvent::CommentCreated { project_id, .. } => project_id,
            HookEvent::CommentApproved { project_id, .. } => project_id,
            HookEvent::ModeratorReplied { comment, .. } => &comment.project_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HookEvent::CommentCreated { .. } => "comment_created",
            HookEvent::CommentApproved { .. } => "comment_approved",
            HookEvent::ModeratorReplied { .. } => "moderator_replied",
        }
    }
}

/// Receiver of moderation side effects.
///
/// Implementations must return promptly and must not fail the caller: the
/// mutation has already been committed when these are called.
pub trait HookSink: Send + Sync {
    fn on_comment_created(&self, comment: &Comment, project_id: &ProjectId);

    fn on_comment_approved(
        &self,
        project_id: &ProjectId,
        comment_id: &CommentId,
        parent_id: Option<&CommentId>,
    );

    fn on_moderator_reply(&self, reply: &Comment, parent_id: &CommentId);
}

/// Sink that drops every event.
pub struct NoopHooks;

impl HookSink for NoopHooks {
    fn on_comment_created(&self, _: &Comment, _: &ProjectId) {}

    fn on_comment_approved(&self, _: &ProjectId, _: &CommentId, _: Option<&CommentId>) {}

    fn on_moderator_reply(&self, _: &Comment, _: &CommentId) {}
}
