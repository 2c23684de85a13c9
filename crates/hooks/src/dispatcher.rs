use domain::{Comment, CommentId, HookEvent, HookSink, ProjectId};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// [`HookSink`] that queues events for the hook worker without waiting.
///
/// A full queue drops the event: delivery is best effort and must never
/// hold up the request that triggered it.
#[derive(Clone)]
pub struct HookDispatcher {
    tx: mpsc::Sender<HookEvent>,
}

impl HookDispatcher {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<HookEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    fn dispatch(&self, event: HookEvent) {
        let name = event.name();
        match self.tx.try_send(event) {
            Ok(()) => debug!(event = name, "hook queued"),
            Err(TrySendError::Full(event)) => {
                warn!(event = name, project = %event.project_id(), "hook queue full, event dropped");
            }
            Err(TrySendError::Closed(_)) => {
                warn!(event = name, "hook worker stopped, event dropped");
            }
        }
    }
}

impl HookSink for HookDispatcher {
    fn on_comment_created(&self, comment: &Comment, project_id: &ProjectId) {
        self.dispatch(HookEvent::CommentCreated {
            project_id: project_id.clone(),
            comment: comment.clone(),
        });
    }

    fn on_comment_approved(
        &self,
        project_id: &ProjectId,
        comment_id: &CommentId,
        parent_id: Option<&CommentId>,
    ) {
        self.dispatch(HookEvent::CommentApproved {
            project_id: project_id.clone(),
            comment_id: comment_id.clone(),
            parent_id: parent_id.cloned(),
        });
    }

    fn on_moderator_reply(&self, reply: &Comment, parent_id: &CommentId) {
        self.dispatch(HookEvent::ModeratorReplied {
            comment: reply.clone(),
            parent_id: parent_id.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approved(id: &str) -> (ProjectId, CommentId) {
        (ProjectId::new_unchecked("blog".into()), CommentId::from(id))
    }

    #[tokio::test]
    async fn test_full_queue_drops_instead_of_blocking() {
        let (dispatcher, mut rx) = HookDispatcher::channel(1);
        let (project, first) = approved("c1");
        dispatcher.on_comment_approved(&project, &first, None);
        dispatcher.on_comment_approved(&project, &CommentId::from("c2"), None);

        match rx.recv().await {
            Some(HookEvent::CommentApproved { comment_id, .. }) => assert_eq!(comment_id, first),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_queue_is_silent() {
        let (dispatcher, rx) = HookDispatcher::channel(4);
        drop(rx);
        let (project, id) = approved("c1");
        dispatcher.on_comment_approved(&project, &id, None);
    }
}
