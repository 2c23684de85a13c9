#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use domain::store::{StoreTx, ThreadStore};
use domain::{Clock, Comment, CommentId, HookSink, ModeratorIdentity, ProjectId};
use engine::{
    CommentFormatter, EngineConfig, ModerationEngine, NewCommentInput, ThreadReader,
    VerificationGate,
};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use storage::Db;

/// Advances one second on every call so creation order is unambiguous.
pub struct SteppingClock {
    ticks: AtomicI64,
}

impl SteppingClock {
    pub fn new() -> Self {
        Self {
            ticks: AtomicI64::new(0),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() + Duration::seconds(tick)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Created(CommentId),
    Approved(CommentId),
    ModeratorReply { reply: CommentId, parent: CommentId },
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Recorded>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    pub fn approvals(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Recorded::Approved(_)))
            .count()
    }
}

impl HookSink for RecordingSink {
    fn on_comment_created(&self, comment: &Comment, _: &ProjectId) {
        self.events
            .lock()
            .unwrap()
            .push(Recorded::Created(comment.id.clone()));
    }

    fn on_comment_approved(&self, _: &ProjectId, comment_id: &CommentId, _: Option<&CommentId>) {
        self.events
            .lock()
            .unwrap()
            .push(Recorded::Approved(comment_id.clone()));
    }

    fn on_moderator_reply(&self, reply: &Comment, parent_id: &CommentId) {
        self.events.lock().unwrap().push(Recorded::ModeratorReply {
            reply: reply.id.clone(),
            parent: parent_id.clone(),
        });
    }
}

pub struct Harness {
    pub db: Db,
    pub hooks: Arc<RecordingSink>,
    pub engine: ModerationEngine,
    pub reader: ThreadReader,
    pub gate: VerificationGate,
}

pub fn project() -> ProjectId {
    ProjectId::new_unchecked("blog".into())
}

pub fn moderator() -> ModeratorIdentity {
    ModeratorIdentity {
        id: "mod-1".into(),
        email: Some("owner@blog.example".into()),
        name: Some("Owner".into()),
    }
}

pub async fn harness() -> Harness {
    harness_with(EngineConfig::default()).await
}

pub async fn harness_with(config: EngineConfig) -> Harness {
    let db = Db::in_memory().await.unwrap();
    let store = Arc::new(db.clone());
    let hooks = Arc::new(RecordingSink::default());
    let clock = Arc::new(SteppingClock::new());
    let formatter = Arc::new(CommentFormatter::default());

    Harness {
        engine: ModerationEngine::new(
            store.clone(),
            hooks.clone(),
            clock,
            formatter.clone(),
            config,
        ),
        reader: ThreadReader::new(store.clone(), formatter, config),
        gate: VerificationGate::new(store),
        hooks,
        db,
    }
}

impl Harness {
    pub async fn post(&self, email: Option<&str>, parent: Option<&CommentId>) -> Comment {
        self.post_on("post-1", email, parent).await
    }

    pub async fn post_on(
        &self,
        slug: &str,
        email: Option<&str>,
        parent: Option<&CommentId>,
    ) -> Comment {
        self.engine
            .create(NewCommentInput {
                project_id: project(),
                page_slug: slug.into(),
                page_title: None,
                page_url: None,
                content: "hello **world**".into(),
                email: email.map(str::to_string),
                nickname: Some("visitor".into()),
                parent_id: parent.cloned(),
            })
            .await
            .unwrap()
            .comment
    }

    pub async fn find(&self, id: &CommentId) -> Option<Comment> {
        let mut tx = self.db_tx().await;
        tx.find_comment(id).await.unwrap()
    }

    pub async fn is_verified(&self, email: &str) -> bool {
        let mut tx = self.db_tx().await;
        tx.find_commenters(&[email.to_string()])
            .await
            .unwrap()
            .iter()
            .any(|c| c.is_verified())
    }

    async fn db_tx(&self) -> Box<dyn StoreTx> {
        self.db.begin().await.unwrap()
    }
}
