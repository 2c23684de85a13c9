use crate::mailer::{MailMessage, Mailer};
use crate::templates::{ConfirmNotice, NewCommentNotice, ReplyNotice};
use crate::traits::HookHandler;
use anyhow::Result;
use async_trait::async_trait;
use domain::store::{CommentFilter, ThreadStore};
use domain::{Clock, Comment, CommentId, HookEvent, ModeratorIdentity, ProjectId};
use engine::{AcceptNotifyClaims, ApproveClaims, EmailVerifyClaims, TokenService};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Ancestors above a reply that may receive a notification.
const MAX_ANCESTOR_DEPTH: usize = 10;

#[derive(Debug, Clone)]
pub struct NotifySettings {
    /// Base URL that emailed links point at.
    pub public_url: String,
    pub owner_email: Option<String>,
    /// Identity embedded in approve links.
    pub moderator: ModeratorIdentity,
}

/// Sends owner notices for new comments and reply notices to subscribed
/// commenters further up the thread.
pub struct NotificationHandler {
    store: Arc<dyn ThreadStore>,
    mailer: Arc<dyn Mailer>,
    tokens: TokenService,
    clock: Arc<dyn Clock>,
    settings: NotifySettings,
}

struct Subscriber {
    email: String,
    comment_id: CommentId,
}

impl NotificationHandler {
    pub fn new(
        store: Arc<dyn ThreadStore>,
        mailer: Arc<dyn Mailer>,
        tokens: TokenService,
        clock: Arc<dyn Clock>,
        settings: NotifySettings,
    ) -> Self {
        Self {
            store,
            mailer,
            tokens,
            clock,
            settings,
        }
    }

    fn link(&self, path: &str, token: &str) -> String {
        format!(
            "{}/api/open/{}?token={}",
            self.settings.public_url.trim_end_matches('/'),
            path,
            token
        )
    }

    async fn deliver(&self, message: MailMessage) {
        let to = message.to.clone();
        if let Err(e) = self.mailer.send(message).await {
            warn!(to = %to, "mail delivery failed: {:?}", e);
        }
    }

    async fn on_created(&self, project_id: &ProjectId, comment: &Comment) -> Result<()> {
        if comment.is_moderator() {
            return Ok(());
        }

        let (verified, first_comment) = match comment.by_email.as_deref() {
            Some(email) => {
                let mut tx = self.store.begin().await?;
                let verified = tx
                    .find_commenters(&[email.to_string()])
                    .await?
                    .iter()
                    .any(|c| c.is_verified());
                let earlier = tx
                    .count_comments(&CommentFilter {
                        project_id: Some(project_id.clone()),
                        email: Some(email.to_string()),
                        moderator: Some(false),
                        exclude_id: Some(comment.id.clone()),
                        ..Default::default()
                    })
                    .await?;
                (verified, earlier == 0)
            }
            None => (false, true),
        };

        let now = self.clock.now();
        if let Some(owner) = &self.settings.owner_email {
            let token = self.tokens.sign(
                &ApproveClaims {
                    comment_id: comment.id.clone(),
                    moderator: self.settings.moderator.clone(),
                },
                now,
            )?;
            let link = self.link("approve", &token);
            let notice = NewCommentNotice {
                to: owner,
                page_slug: &comment.page_slug,
                nickname: comment.by_nickname.as_deref().unwrap_or("anonymous"),
                content: &comment.content,
                approve_link: &link,
                email_verified: verified,
                auto_approved: comment.approved,
                first_comment,
            };
            self.deliver(notice.render()).await;
        }

        if let Some(email) = comment.by_email.as_deref().filter(|_| !verified) {
            let verify = self.tokens.sign(
                &EmailVerifyClaims {
                    email: email.to_string(),
                    project_id: project_id.clone(),
                    comment_id: Some(comment.id.clone()),
                },
                now,
            )?;
            let notify = self.tokens.sign(
                &AcceptNotifyClaims {
                    comment_id: comment.id.clone(),
                },
                now,
            )?;
            let verify_link = self.link("confirm_email", &verify);
            let notify_link = self.link("confirm_reply_notification", &notify);
            let notice = ConfirmNotice {
                to: email,
                page_slug: &comment.page_slug,
                verify_link: &verify_link,
                notify_link: &notify_link,
            };
            self.deliver(notice.render()).await;
        }

        // auto-approved replies never pass through the approval hook
        match &comment.parent_id {
            Some(parent_id) if comment.approved => self.on_reply(comment, parent_id).await,
            _ => Ok(()),
        }
    }

    /// Collects subscribed authors from `parent_id` upward, nearest first.
    async fn subscribers(&self, reply: &Comment, parent_id: &CommentId) -> Result<Vec<Subscriber>> {
        let mut out: Vec<Subscriber> = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(parent_id.clone());
        let mut tx = self.store.begin().await?;

        while let Some(id) = next.take() {
            if seen.len() >= MAX_ANCESTOR_DEPTH || !seen.insert(id.clone()) {
                break;
            }
            let Some(ancestor) = tx.find_comment(&id).await? else {
                break;
            };
            if let Some(email) = ancestor.by_email.as_deref() {
                let subscribed = ancestor.notify_confirmed_at.is_some() && !ancestor.is_deleted();
                let is_replier = reply.by_email.as_deref() == Some(email);
                if subscribed && !is_replier && out.iter().all(|s| s.email != email) {
                    out.push(Subscriber {
                        email: email.to_string(),
                        comment_id: ancestor.id.clone(),
                    });
                }
            }
            next = ancestor.parent_id;
        }
        Ok(out)
    }

    async fn on_reply(&self, reply: &Comment, parent_id: &CommentId) -> Result<()> {
        if !reply.approved || reply.is_deleted() {
            debug!(reply = %reply.id, "reply not visible, no notification");
            return Ok(());
        }

        let now = self.clock.now();
        for subscriber in self.subscribers(reply, parent_id).await? {
            let token = self.tokens.sign(
                &AcceptNotifyClaims {
                    comment_id: subscriber.comment_id.clone(),
                },
                now,
            )?;
            let unsubscribe = format!(
                "{}&unsubscribe=1",
                self.link("confirm_reply_notification", &token)
            );
            let notice = ReplyNotice {
                to: &subscriber.email,
                page_slug: &reply.page_slug,
                nickname: reply.by_nickname.as_deref().unwrap_or("anonymous"),
                content: &reply.content,
                unsubscribe_link: &unsubscribe,
            };
            self.deliver(notice.render()).await;
        }
        Ok(())
    }
}

#[async_trait]
impl HookHandler for NotificationHandler {
    fn name(&self) -> &'static str {
        "notification"
    }

    async fn handle(&self, event: &HookEvent) -> Result<()> {
        match event {
            HookEvent::CommentCreated {
                project_id,
                comment,
            } => self.on_created(project_id, comment).await,
            HookEvent::CommentApproved {
                comment_id,
                parent_id: Some(parent_id),
                ..
            } => {
                let reply = {
                    let mut tx = self.store.begin().await?;
                    tx.find_comment(comment_id).await?
                };
                match reply {
                    Some(reply) => self.on_reply(&reply, parent_id).await,
                    None => Ok(()),
                }
            }
            HookEvent::CommentApproved { parent_id: None, .. } => Ok(()),
            HookEvent::ModeratorReplied { comment, parent_id } => {
                self.on_reply(comment, parent_id).await
            }
        }
    }
}
