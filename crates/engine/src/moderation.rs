use crate::error::{EngineError, Result};
use crate::format::{CommentFormatter, DisplayComment, VerificationMap};
use crate::gate::{self, TrustCheck, VerificationGate};
use crate::tree;
use crate::EngineConfig;
use domain::store::{CommentFilter, CommentPatch, NewComment, Ordering, PageTouch, ThreadStore};
use domain::{Clock, Comment, CommentId, HookSink, ModeratorIdentity, Project, ProjectId};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct NewCommentInput {
    pub project_id: ProjectId,
    pub page_slug: String,
    pub page_title: Option<String>,
    pub page_url: Option<String>,
    pub content: String,
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub parent_id: Option<CommentId>,
}

pub struct ModerationEngine {
    store: Arc<dyn ThreadStore>,
    gate: VerificationGate,
    hooks: Arc<dyn HookSink>,
    clock: Arc<dyn Clock>,
    formatter: Arc<CommentFormatter>,
    config: EngineConfig,
}

fn dedup(ids: &[CommentId]) -> Vec<CommentId> {
    ids.iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn require_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(EngineError::InvalidInput("comment content is empty".into()));
    }
    Ok(())
}

impl ModerationEngine {
    pub fn new(
        store: Arc<dyn ThreadStore>,
        hooks: Arc<dyn HookSink>,
        clock: Arc<dyn Clock>,
        formatter: Arc<CommentFormatter>,
        config: EngineConfig,
    ) -> Self {
        Self {
            gate: VerificationGate::new(store.clone()),
            store,
            hooks,
            clock,
            formatter,
            config,
        }
    }

    /// Stores a visitor comment, then applies auto-approval when the
    /// submitter's email clears the Verification Gate.
    pub async fn create(&self, input: NewCommentInput) -> Result<DisplayComment> {
        require_content(&input.content)?;
        let email = non_empty(input.email);
        let nickname = non_empty(input.nickname);

        let mut tx = self.store.begin().await?;
        let page = tx
            .upsert_page(
                &input.project_id,
                &input.page_slug,
                &PageTouch {
                    title: input.page_title,
                    url: input.page_url,
                },
            )
            .await?;

        if let Some(parent_id) = &input.parent_id {
            match tx.find_comment(parent_id).await? {
                Some(parent) if parent.page_id == page.id => {}
                _ => {
                    return Err(EngineError::InvalidParent {
                        parent_id: parent_id.clone(),
                    })
                }
            }
        }

        let created = tx
            .create_comment(NewComment {
                id: CommentId::generate(),
                page_id: page.id,
                parent_id: input.parent_id,
                content: input.content,
                by_email: email,
                by_nickname: nickname,
                moderator_id: None,
                approved: false,
                created_at: self.clock.now(),
            })
            .await?;
        tx.commit().await?;
        info!(comment = %created.id, project = %input.project_id, "comment created");

        let (comment, verification) = self.apply_auto_approval(created).await;

        self.hooks.on_comment_created(&comment, &input.project_id);
        Ok(self.formatter.format(&comment, 0, &verification, false))
    }

    // any failure leaves the comment pending
    async fn apply_auto_approval(&self, created: Comment) -> (Comment, VerificationMap) {
        let Some(email) = created.trust_email().map(str::to_string) else {
            return (created, VerificationMap::new());
        };

        let result: anyhow::Result<TrustCheck> = async {
            let mut tx = self.store.begin().await?;
            let trust = self
                .gate
                .evaluate(tx.as_mut(), &email, &created.project_id, Some(&created.id))
                .await?;
            if trust.auto_approve() {
                tx.update_comments(
                    &[created.id.clone()],
                    &CommentPatch {
                        approved: Some(true),
                        ..Default::default()
                    },
                )
                .await?;
                tx.commit().await?;
            }
            Ok(trust)
        }
        .await;

        let trust = gate::settle(result, &email, &created.project_id);
        let mut comment = created;
        if trust.auto_approve() {
            comment.approved = true;
            info!(comment = %comment.id, "comment auto-approved");
        }
        let verification = VerificationMap::from([(email, trust.verified)]);
        (comment, verification)
    }

    /// Moderator reply. Also approves the parent and verifies the parent's
    /// email: moderator attention on a thread counts as approval.
    pub async fn create_as_moderator(
        &self,
        parent_id: &CommentId,
        content: &str,
        moderator: &ModeratorIdentity,
    ) -> Result<DisplayComment> {
        require_content(content)?;
        let now = self.clock.now();

        let mut tx = self.store.begin().await?;
        let parent = tx
            .find_comment(parent_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(parent_id.clone()))?;

        let reply = tx
            .create_comment(NewComment {
                id: CommentId::generate(),
                page_id: parent.page_id.clone(),
                parent_id: Some(parent.id.clone()),
                content: content.to_string(),
                by_email: moderator.email.clone(),
                by_nickname: moderator.name.clone(),
                moderator_id: Some(moderator.id.clone()),
                approved: true,
                created_at: now,
            })
            .await?;

        tx.update_comments(
            &[parent.id.clone()],
            &CommentPatch {
                approved: Some(true),
                ..Default::default()
            },
        )
        .await?;

        if let Some(email) = parent.trust_email() {
            gate::verify_emails(tx.as_mut(), [email], now).await?;
        }
        tx.commit().await?;
        info!(reply = %reply.id, parent = %parent.id, moderator = %moderator.id, "moderator replied");

        self.hooks.on_moderator_reply(&reply, &parent.id);
        Ok(self
            .formatter
            .format(&reply, 0, &VerificationMap::new(), false))
    }

    /// Approves every existing id and permanently verifies the distinct
    /// emails behind them. Unknown ids are skipped.
    pub async fn approve(&self, comment_ids: &[CommentId]) -> Result<u64> {
        if comment_ids.is_empty() {
            return Ok(0);
        }
        let ids = dedup(comment_ids);
        let now = self.clock.now();

        let mut tx = self.store.begin().await?;
        let comments = tx
            .find_comments(&CommentFilter::by_ids(&ids), None, Ordering::OldestFirst)
            .await?;
        if comments.is_empty() {
            return Ok(0);
        }

        let found: Vec<CommentId> = comments.iter().map(|c| c.id.clone()).collect();
        let approved = tx
            .update_comments(
                &found,
                &CommentPatch {
                    approved: Some(true),
                    ..Default::default()
                },
            )
            .await?;
        let verified =
            gate::verify_emails(tx.as_mut(), comments.iter().filter_map(Comment::trust_email), now)
                .await?;
        tx.commit().await?;
        info!(approved, verified, "comments approved");

        // TODO: skip the hook for comments that were already approved once
        // downstream consumers stop relying on the repeat notification.
        for comment in &comments {
            self.hooks.on_comment_approved(
                &comment.project_id,
                &comment.id,
                comment.parent_id.as_ref(),
            );
        }
        Ok(approved)
    }

    /// Clears approval. Commenter verification is left untouched.
    pub async fn unapprove(&self, comment_ids: &[CommentId]) -> Result<u64> {
        self.patch(
            comment_ids,
            CommentPatch {
                approved: Some(false),
                ..Default::default()
            },
        )
        .await
    }

    /// Stamps `deleted_at = now` on every existing id, already deleted or
    /// not, and returns the matched count. Replies are not touched.
    pub async fn soft_delete(&self, comment_ids: &[CommentId]) -> Result<u64> {
        if comment_ids.is_empty() {
            return Ok(0);
        }
        let ids = dedup(comment_ids);
        self.soft_delete_matching(&CommentFilter::by_ids(&ids)).await
    }

    /// Soft-deletes every active comment on the project written by any of `emails`.
    pub async fn soft_delete_by_emails(
        &self,
        project_id: &ProjectId,
        emails: &[String],
    ) -> Result<u64> {
        if emails.is_empty() {
            return Ok(0);
        }
        let filter = CommentFilter {
            project_id: Some(project_id.clone()),
            emails: Some(emails.to_vec()),
            deleted: Some(false),
            ..Default::default()
        };
        self.soft_delete_matching(&filter).await
    }

    async fn soft_delete_matching(&self, filter: &CommentFilter) -> Result<u64> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let targets: Vec<CommentId> = tx
            .find_comments(filter, None, Ordering::OldestFirst)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();

        let deleted = tx
            .update_comments(
                &targets,
                &CommentPatch {
                    deleted_at: Some(Some(now)),
                    ..Default::default()
                },
            )
            .await?;
        tx.commit().await?;
        info!(deleted, "comments soft-deleted");
        Ok(deleted)
    }

    pub async fn restore(&self, comment_ids: &[CommentId]) -> Result<u64> {
        self.patch(
            comment_ids,
            CommentPatch {
                deleted_at: Some(None),
                ..Default::default()
            },
        )
        .await
    }

    /// Removes the comments and their whole reply closure. Nothing is
    /// removed if the closure is deeper than `max_thread_depth`.
    pub async fn cascade_hard_delete(&self, comment_ids: &[CommentId]) -> Result<u64> {
        if comment_ids.is_empty() {
            return Ok(0);
        }
        let ids = dedup(comment_ids);

        let mut tx = self.store.begin().await?;
        let descendants =
            tree::load_descendants(tx.as_mut(), &ids, self.config.max_thread_depth).await?;
        if descendants.overflowed {
            warn!(
                roots = ids.len(),
                limit = self.config.max_thread_depth,
                "cascade delete aborted: reply chain too deep"
            );
            return Err(EngineError::DepthExceeded {
                limit: self.config.max_thread_depth,
            });
        }

        let mut all = ids;
        all.extend(descendants.comments.into_iter().map(|c| c.id));
        let deleted = tx.delete_comments(&all).await?;
        tx.commit().await?;
        info!(deleted, "comments purged");
        Ok(deleted)
    }

    /// Verifies `email` after a confirmation link was followed. When the
    /// link names a pending comment and the email already has an approved
    /// comment on the project, that comment is approved as well.
    pub async fn confirm_email(
        &self,
        email: &str,
        project_id: &ProjectId,
        comment_id: Option<&CommentId>,
    ) -> Result<bool> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        gate::verify_emails(tx.as_mut(), [email], now).await?;

        let mut approve_target = None;
        if let Some(id) = comment_id {
            let belongs = tx.find_comment(id).await?.is_some_and(|c| {
                c.project_id == *project_id && c.by_email.as_deref() == Some(email)
            });
            if belongs {
                let trust = self.gate.evaluate(tx.as_mut(), email, project_id, None).await?;
                if trust.prior_approved {
                    approve_target = Some(id.clone());
                }
            } else {
                debug!(comment = %id, "confirmation names a comment from another sender");
            }
        }
        tx.commit().await?;
        info!(email, project = %project_id, "email verified");

        match approve_target {
            Some(id) => Ok(self.approve(&[id]).await? > 0),
            None => Ok(false),
        }
    }

    /// Opts the comment's author in to (or out of) reply notifications.
    pub async fn set_reply_notification(&self, comment_id: &CommentId, enabled: bool) -> Result<()> {
        let value = enabled.then(|| self.clock.now());
        let changed = self
            .patch(
                std::slice::from_ref(comment_id),
                CommentPatch {
                    notify_confirmed_at: Some(value),
                    ..Default::default()
                },
            )
            .await?;
        if changed == 0 {
            return Err(EngineError::NotFound(comment_id.clone()));
        }
        Ok(())
    }

    /// Approve from an emailed link, optionally answering in the same step.
    pub async fn approve_and_reply(
        &self,
        comment_id: &CommentId,
        moderator: &ModeratorIdentity,
        reply: Option<&str>,
    ) -> Result<Option<DisplayComment>> {
        if self.approve(std::slice::from_ref(comment_id)).await? == 0 {
            return Err(EngineError::NotFound(comment_id.clone()));
        }
        match reply.filter(|r| !r.trim().is_empty()) {
            Some(content) => Ok(Some(
                self.create_as_moderator(comment_id, content, moderator)
                    .await?,
            )),
            None => Ok(None),
        }
    }

    pub async fn register_project(
        &self,
        project_id: &ProjectId,
        owner_id: Option<&str>,
    ) -> Result<Project> {
        let mut tx = self.store.begin().await?;
        let project = tx.upsert_project(project_id, owner_id).await?;
        tx.commit().await?;
        Ok(project)
    }

    async fn patch(&self, comment_ids: &[CommentId], patch: CommentPatch) -> Result<u64> {
        if comment_ids.is_empty() {
            return Ok(0);
        }
        let ids = dedup(comment_ids);
        let mut tx = self.store.begin().await?;
        let changed = tx.update_comments(&ids, &patch).await?;
        tx.commit().await?;
        debug!(changed, "comments patched");
        Ok(changed)
    }
}
