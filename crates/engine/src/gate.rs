use crate::format::VerificationMap;
use chrono::{DateTime, Utc};
use domain::store::{CommentFilter, CommenterPatch, Ordering, Pagination, StoreTx, ThreadStore};
use domain::{CommentId, ProjectId};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct VerificationGate {
    store: Arc<dyn ThreadStore>,
}

impl VerificationGate {
    pub fn new(store: Arc<dyn ThreadStore>) -> Self {
        Self { store }
    }

    /// True only when the email is verified AND already has a moderator
    /// approved comment on this project. Lookup failures answer false.
    pub async fn should_auto_approve(&self, email: &str, project_id: &ProjectId) -> bool {
        let result = async {
            let mut tx = self.store.begin().await?;
            check_trust(tx.as_mut(), email, project_id, None).await
        }
        .await;
        settle(result, email, project_id).auto_approve()
    }

    /// Same decision inside a caller's transaction. `exclude` keeps a freshly
    /// stored comment out of its own approval history.
    pub(crate) async fn evaluate(
        &self,
        tx: &mut dyn StoreTx,
        email: &str,
        project_id: &ProjectId,
        exclude: Option<&CommentId>,
    ) -> anyhow::Result<TrustCheck> {
        check_trust(tx, email, project_id, exclude).await
    }
}

/// Failed lookups count as no trust at all.
pub(crate) fn settle(
    result: anyhow::Result<TrustCheck>,
    email: &str,
    project_id: &ProjectId,
) -> TrustCheck {
    result.unwrap_or_else(|e| {
        warn!(email, project = %project_id, "auto-approve check failed: {:?}", e);
        TrustCheck::default()
    })
}

/// The two trust factors for one email on one project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct TrustCheck {
    pub verified: bool,
    pub prior_approved: bool,
}

impl TrustCheck {
    pub fn auto_approve(&self) -> bool {
        self.verified && self.prior_approved
    }
}

async fn check_trust(
    tx: &mut dyn StoreTx,
    email: &str,
    project_id: &ProjectId,
    exclude: Option<&CommentId>,
) -> anyhow::Result<TrustCheck> {
    let verified = tx
        .find_commenters(&[email.to_string()])
        .await?
        .iter()
        .any(|c| c.is_verified());

    let prior = tx
        .find_comments(
            &CommentFilter {
                project_id: Some(project_id.clone()),
                email: Some(email.to_string()),
                approved: Some(true),
                moderator: Some(false),
                exclude_id: exclude.cloned(),
                ..Default::default()
            },
            Some(Pagination { offset: 0, limit: 1 }),
            Ordering::NewestFirst,
        )
        .await?;

    Ok(TrustCheck {
        verified,
        prior_approved: !prior.is_empty(),
    })
}

/// Marks every distinct email as verified at `now`, one upsert per address.
pub(crate) async fn verify_emails<'a>(
    tx: &mut dyn StoreTx,
    emails: impl IntoIterator<Item = &'a str>,
    now: DateTime<Utc>,
) -> anyhow::Result<usize> {
    let distinct: BTreeSet<&str> = emails.into_iter().collect();
    let patch = CommenterPatch {
        verified_at: Some(now),
    };
    for email in &distinct {
        tx.upsert_commenter(email, &patch).await?;
    }
    Ok(distinct.len())
}

/// Resolves verification for a set of emails with a single lookup.
pub(crate) async fn verification_map<'a>(
    tx: &mut dyn StoreTx,
    emails: impl IntoIterator<Item = &'a str>,
) -> anyhow::Result<VerificationMap> {
    let distinct: Vec<String> = emails
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect();

    let commenters = tx.find_commenters(&distinct).await?;
    Ok(commenters
        .into_iter()
        .map(|c| {
            let verified = c.is_verified();
            (c.email, verified)
        })
        .collect())
}
