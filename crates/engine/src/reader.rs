use crate::error::Result;
use crate::format::{CommentFormatter, CommentWrapper, DisplayComment, VerificationMap};
use crate::gate;
use crate::tree::{self, ThreadArena};
use crate::EngineConfig;
use domain::store::{CommentFilter, Ordering, Pagination, ParentFilter, ThreadStore};
use domain::{Comment, CommentId, Project, ProjectId};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::warn;

const COMMENTERS_PAGE_SIZE: u32 = 10;
const COMMENTER_PREVIEW: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct GetCommentsOptions {
    /// `None` lists root comments only.
    pub parent_id: Option<CommentId>,
    pub approved: Option<bool>,
    pub page_slug: Option<String>,
    /// Only comments on projects owned by this user.
    pub owner_id: Option<String>,
    pub page: u32,
    pub page_size: Option<u32>,
    pub include_replies: bool,
    pub include_deleted_parents: bool,
    pub admin: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommenterSummary {
    pub email: String,
    pub nickname: String,
    pub comment_count: u64,
    pub comments: Vec<DisplayComment>,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommenterPage {
    pub data: Vec<CommenterSummary>,
    pub total: u64,
    pub page: u32,
    pub page_count: u32,
}

/// `ceil(total / page_size)`, never below one.
pub fn page_count(total: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 1;
    }
    let pages = total.div_ceil(page_size as u64);
    pages.clamp(1, u32::MAX as u64) as u32
}

pub struct ThreadReader {
    store: Arc<dyn ThreadStore>,
    formatter: Arc<CommentFormatter>,
    config: EngineConfig,
}

struct ReplyContext<'a> {
    arena: &'a ThreadArena,
    verification: &'a VerificationMap,
    timezone_offset: i32,
    approved: Option<bool>,
    admin: bool,
}

impl ThreadReader {
    pub fn new(
        store: Arc<dyn ThreadStore>,
        formatter: Arc<CommentFormatter>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            formatter,
            config,
        }
    }

    /// Looks up a project; `None` when it was never registered.
    pub async fn find_project(&self, project_id: &ProjectId) -> Result<Option<Project>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.find_project(project_id).await?)
    }

    pub async fn get_comments(
        &self,
        project_id: &ProjectId,
        timezone_offset: i32,
        options: GetCommentsOptions,
    ) -> Result<CommentWrapper> {
        let page_size = options
            .page_size
            .filter(|size| *size > 0)
            .unwrap_or(self.config.default_page_size);

        let filter = CommentFilter {
            project_id: Some(project_id.clone()),
            page_slug: options.page_slug.clone(),
            parent: match &options.parent_id {
                Some(id) => ParentFilter::ChildOf(id.clone()),
                None => ParentFilter::Root,
            },
            approved: options.approved,
            // deleted rows are filtered after the fetch in this mode
            deleted: if options.include_deleted_parents {
                None
            } else {
                Some(false)
            },
            owner_id: options.owner_id.clone(),
            live_projects_only: true,
            ..Default::default()
        };

        let mut tx = self.store.begin().await?;
        let comment_count = tx.count_comments(&filter).await?;
        let roots = tx
            .find_comments(
                &filter,
                Some(Pagination::page(options.page, page_size)),
                Ordering::NewestFirst,
            )
            .await?;
        let root_ids: Vec<CommentId> = roots.iter().map(|c| c.id.clone()).collect();

        let arena = if options.include_replies || options.include_deleted_parents {
            let loaded =
                tree::load_descendants(tx.as_mut(), &root_ids, self.config.max_thread_depth)
                    .await?;
            if loaded.overflowed {
                warn!(project = %project_id, "reply tree truncated at depth {}", self.config.max_thread_depth);
            }
            ThreadArena::from_comments(roots.iter().cloned().chain(loaded.comments))
        } else {
            ThreadArena::new()
        };

        let reply_counts = if options.include_replies {
            HashMap::new()
        } else {
            tx.count_replies(&root_ids).await?
        };

        let emails = roots
            .iter()
            .filter_map(|c| c.by_email.as_deref())
            .chain(arena.emails());
        let verification = gate::verification_map(tx.as_mut(), emails).await?;
        drop(tx);

        let context = ReplyContext {
            arena: &arena,
            verification: &verification,
            timezone_offset,
            approved: options.approved,
            admin: options.admin,
        };

        let data = roots
            .iter()
            .filter(|root| {
                !options.include_deleted_parents
                    || !root.is_deleted()
                    || arena.has_visible_descendant(&root.id, options.approved)
            })
            .map(|root| {
                let mut shown =
                    self.formatter
                        .format(root, timezone_offset, &verification, options.admin);
                shown.replies = if options.include_replies {
                    let mut visited = HashSet::from([root.id.clone()]);
                    CommentWrapper::nested(self.build_replies(&context, &root.id, &mut visited))
                } else {
                    CommentWrapper::count_only(reply_counts.get(&root.id).copied().unwrap_or(0))
                };
                shown
            })
            .collect();

        Ok(CommentWrapper {
            data,
            comment_count,
            page_size,
            page_count: page_count(comment_count, page_size),
        })
    }

    /// Replies below `parent_id` that match the approval filter. A deleted
    /// reply is kept, as a placeholder outside admin views, only while a
    /// live reply below it also passes the filter.
    fn build_replies(
        &self,
        ctx: &ReplyContext<'_>,
        parent_id: &CommentId,
        visited: &mut HashSet<CommentId>,
    ) -> Vec<DisplayComment> {
        let mut out = Vec::new();
        for reply in ctx.arena.children_of(parent_id) {
            if !visited.insert(reply.id.clone()) {
                continue;
            }
            if ctx.approved.is_some_and(|want| reply.approved != want) {
                continue;
            }
            if reply.is_deleted() && !ctx.arena.has_visible_descendant(&reply.id, ctx.approved) {
                continue;
            }
            let mut shown =
                self.formatter
                    .format(reply, ctx.timezone_offset, ctx.verification, ctx.admin);
            shown.replies = CommentWrapper::nested(self.build_replies(ctx, &reply.id, visited));
            out.push(shown);
        }
        out
    }

    /// Deleted comments only, formatted for moderators.
    pub async fn get_deleted_comments(
        &self,
        project_id: &ProjectId,
        timezone_offset: i32,
        page: u32,
        page_size: Option<u32>,
    ) -> Result<CommentWrapper> {
        let page_size = page_size
            .filter(|size| *size > 0)
            .unwrap_or(self.config.default_page_size);
        let filter = CommentFilter {
            project_id: Some(project_id.clone()),
            deleted: Some(true),
            ..Default::default()
        };

        let mut tx = self.store.begin().await?;
        let comment_count = tx.count_comments(&filter).await?;
        let comments = tx
            .find_comments(
                &filter,
                Some(Pagination::page(page, page_size)),
                Ordering::NewestFirst,
            )
            .await?;
        let ids: Vec<CommentId> = comments.iter().map(|c| c.id.clone()).collect();
        let reply_counts = tx.count_replies(&ids).await?;
        let verification =
            gate::verification_map(tx.as_mut(), comments.iter().filter_map(|c| c.by_email.as_deref()))
                .await?;
        drop(tx);

        let data = comments
            .iter()
            .map(|c| {
                let mut shown = self.formatter.format(c, timezone_offset, &verification, true);
                shown.replies =
                    CommentWrapper::count_only(reply_counts.get(&c.id).copied().unwrap_or(0));
                shown
            })
            .collect();

        Ok(CommentWrapper {
            data,
            comment_count,
            page_size,
            page_count: page_count(comment_count, page_size),
        })
    }

    /// Active commenters on a project, most prolific first. Moderator
    /// comments are grouped by moderator id rather than email.
    pub async fn list_commenters(&self, project_id: &ProjectId, page: u32) -> Result<CommenterPage> {
        let page = page.max(1);
        let filter = CommentFilter {
            project_id: Some(project_id.clone()),
            deleted: Some(false),
            ..Default::default()
        };

        let mut tx = self.store.begin().await?;
        let comments = tx
            .find_comments(&filter, None, Ordering::NewestFirst)
            .await?;
        let verification =
            gate::verification_map(tx.as_mut(), comments.iter().filter_map(|c| c.by_email.as_deref()))
                .await?;
        drop(tx);

        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, (CommenterSummary, Vec<&Comment>)> = HashMap::new();
        for comment in &comments {
            let (key, display) = match (&comment.moderator_id, &comment.by_email) {
                (Some(moderator), _) => (moderator.clone(), format!("admin-{moderator}")),
                (None, Some(email)) => (email.clone(), email.clone()),
                (None, None) => continue,
            };
            let entry = groups.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                (
                    CommenterSummary {
                        email: display,
                        nickname: comment.by_nickname.clone().unwrap_or_default(),
                        comment_count: 0,
                        comments: Vec::new(),
                        is_admin: false,
                    },
                    Vec::new(),
                )
            });
            entry.0.comment_count += 1;
            entry.0.is_admin |= comment.is_moderator();
            if entry.1.len() < COMMENTER_PREVIEW {
                entry.1.push(comment);
            }
        }

        let mut all: Vec<CommenterSummary> = order
            .into_iter()
            .filter_map(|key| groups.remove(&key))
            .map(|(mut summary, preview)| {
                summary.comments = preview
                    .into_iter()
                    .map(|c| self.formatter.format(c, 0, &verification, true))
                    .collect();
                summary
            })
            .collect();
        // stable: ties keep the most recently active commenter first
        all.sort_by(|a, b| b.comment_count.cmp(&a.comment_count));

        let total = all.len() as u64;
        let offset = u64::from(page - 1).saturating_mul(u64::from(COMMENTERS_PAGE_SIZE));
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let data = all
            .into_iter()
            .skip(offset)
            .take(COMMENTERS_PAGE_SIZE as usize)
            .collect();

        Ok(CommenterPage {
            data,
            total,
            page,
            page_count: page_count(total, COMMENTERS_PAGE_SIZE),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count_floor() {
        assert_eq!(page_count(0, 10), 1);
        assert_eq!(page_count(1, 10), 1);
        assert_eq!(page_count(10, 10), 1);
        assert_eq!(page_count(11, 10), 2);
        assert_eq!(page_count(5, 0), 1);
    }
}
