use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use domain::{
    CommentId, HookEvent, HookSink, ModeratorIdentity, NoopHooks, ProjectId, SystemClock,
};
use engine::{
    ApproveClaims, CommentFormatter, EngineConfig, ModerationEngine, NewCommentInput,
    TokenService,
};
use hooks::{
    run_hooks, BroadcastHandler, HookDispatcher, HookHandler, MailMessage, Mailer,
    NotificationHandler, NotifySettings,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storage::Db;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<MailMessage>>,
}

impl RecordingMailer {
    fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap().clone()
    }

    fn recipients(&self) -> Vec<String> {
        self.sent().into_iter().map(|m| m.to).collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: MailMessage) -> Result<()> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

fn project() -> ProjectId {
    ProjectId::new_unchecked("blog".into())
}

fn moderator() -> ModeratorIdentity {
    ModeratorIdentity {
        id: "mod-1".into(),
        email: Some("owner@blog.example".into()),
        name: Some("Owner".into()),
    }
}

struct Fixture {
    engine: ModerationEngine,
    handler: NotificationHandler,
    mailer: Arc<RecordingMailer>,
    tokens: TokenService,
}

async fn fixture() -> Fixture {
    let db = Db::in_memory().await.unwrap();
    let store = Arc::new(db);
    let mailer = Arc::new(RecordingMailer::default());
    let tokens = TokenService::new("test-secret");
    let engine = ModerationEngine::new(
        store.clone(),
        Arc::new(NoopHooks),
        Arc::new(SystemClock),
        Arc::new(CommentFormatter::default()),
        EngineConfig::default(),
    );
    let handler = NotificationHandler::new(
        store,
        mailer.clone(),
        tokens.clone(),
        Arc::new(SystemClock),
        NotifySettings {
            public_url: "https://comments.example/".into(),
            owner_email: Some("owner@blog.example".into()),
            moderator: moderator(),
        },
    );
    Fixture {
        engine,
        handler,
        mailer,
        tokens,
    }
}

impl Fixture {
    async fn post(&self, email: &str, parent: Option<&CommentId>) -> domain::Comment {
        self.engine
            .create(NewCommentInput {
                project_id: project(),
                page_slug: "post-1".into(),
                page_title: None,
                page_url: None,
                content: "hi".into(),
                email: Some(email.into()),
                nickname: Some("visitor".into()),
                parent_id: parent.cloned(),
            })
            .await
            .unwrap()
            .comment
    }
}

#[tokio::test]
async fn test_new_comment_mails_owner_and_commenter() {
    let f = fixture().await;
    let comment = f.post("a@x.com", None).await;

    f.handler
        .handle(&HookEvent::CommentCreated {
            project_id: project(),
            comment: comment.clone(),
        })
        .await
        .unwrap();

    let sent = f.mailer.sent();
    assert_eq!(f.mailer.recipients(), vec!["owner@blog.example", "a@x.com"]);
    assert!(sent[0].html.contains("first comment on this site: yes"));
    assert!(sent[0].html.contains("email verified: no"));
    assert!(sent[1].html.contains("/api/open/confirm_email?token="));

    let token = sent[0]
        .html
        .split("token=")
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .unwrap();
    let claims: ApproveClaims = f.tokens.verify(token, Utc::now()).unwrap();
    assert_eq!(claims.comment_id, comment.id);
    assert_eq!(claims.moderator, moderator());
}

#[tokio::test]
async fn test_moderator_reply_notifies_subscribed_ancestors() {
    let f = fixture().await;
    let root = f.post("a@x.com", None).await;
    let middle = f.post("b@x.com", Some(&root.id)).await;
    let quiet = f.post("c@x.com", Some(&middle.id)).await;
    f.engine.set_reply_notification(&root.id, true).await.unwrap();
    f.engine.set_reply_notification(&middle.id, true).await.unwrap();

    let reply = f
        .engine
        .create_as_moderator(&quiet.id, "thanks", &moderator())
        .await
        .unwrap()
        .comment;
    f.handler
        .handle(&HookEvent::ModeratorReplied {
            comment: reply,
            parent_id: quiet.id,
        })
        .await
        .unwrap();

    assert_eq!(f.mailer.recipients(), vec!["b@x.com", "a@x.com"]);
    assert!(f.mailer.sent()[0].html.contains("unsubscribe=1"));
}

#[tokio::test]
async fn test_replier_is_not_notified_about_own_reply() {
    let f = fixture().await;
    let root = f.post("a@x.com", None).await;
    f.engine.set_reply_notification(&root.id, true).await.unwrap();
    let own = f.post("a@x.com", Some(&root.id)).await;

    f.engine.approve(&[own.id.clone()]).await.unwrap();
    f.handler
        .handle(&HookEvent::CommentApproved {
            project_id: project(),
            comment_id: own.id,
            parent_id: Some(root.id),
        })
        .await
        .unwrap();
    assert!(f.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_pending_reply_sends_nothing() {
    let f = fixture().await;
    let root = f.post("a@x.com", None).await;
    f.engine.set_reply_notification(&root.id, true).await.unwrap();
    let pending = f.post("b@x.com", Some(&root.id)).await;

    f.handler
        .handle(&HookEvent::CommentApproved {
            project_id: project(),
            comment_id: pending.id,
            parent_id: Some(root.id),
        })
        .await
        .unwrap();
    assert!(f.mailer.sent().is_empty());
}

struct FailingHandler;

#[async_trait]
impl HookHandler for FailingHandler {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn handle(&self, _: &HookEvent) -> Result<()> {
        anyhow::bail!("boom")
    }
}

#[tokio::test]
async fn test_worker_survives_failing_handler() {
    let (dispatcher, rx) = HookDispatcher::channel(8);
    let (tx_events, mut rx_events) = broadcast::channel(8);
    let cancel = CancellationToken::new();

    let failing: Arc<dyn HookHandler> = Arc::new(FailingHandler);
    let broadcaster: Arc<dyn HookHandler> = Arc::new(BroadcastHandler::new(tx_events));
    let handlers = vec![failing, broadcaster];
    let worker = tokio::spawn(run_hooks(rx, handlers, cancel.clone()));

    dispatcher.on_comment_approved(&project(), &CommentId::from("c1"), None);
    dispatcher.on_comment_approved(&project(), &CommentId::from("c2"), None);

    for expected in ["c1", "c2"] {
        let event = tokio::time::timeout(Duration::from_secs(2), rx_events.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            HookEvent::CommentApproved { comment_id, .. } => {
                assert_eq!(comment_id, CommentId::from(expected))
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), worker)
        .await
        .unwrap()
        .unwrap();
}
