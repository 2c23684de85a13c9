use crate::models::{Comment, CommentId, Commenter, Page, Project, ProjectId};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum ParentFilter {
    #[default]
    Any,
    Root,
    ChildOf(CommentId),
    ChildOfAny(Vec<CommentId>),
}

#[derive(Debug, Clone, Default)]
pub struct CommentFilter {
    pub ids: Option<Vec<CommentId>>,
    pub project_id: Option<ProjectId>,
    pub page_slug: Option<String>,
    pub parent: ParentFilter,
    pub approved: Option<bool>,
    pub deleted: Option<bool>,
    pub email: Option<String>,
    pub emails: Option<Vec<String>>,
    pub moderator: Option<bool>,
    pub exclude_id: Option<CommentId>,
    /// Restrict to projects owned by this user.
    pub owner_id: Option<String>,
    /// Skip comments whose project has been deleted.
    pub live_projects_only: bool,
}

impl CommentFilter {
    pub fn by_ids(ids: &[CommentId]) -> Self {
        Self {
            ids: Some(ids.to_vec()),
            ..Default::default()
        }
    }

    pub fn for_project(project_id: &ProjectId) -> Self {
        Self {
            project_id: Some(project_id.clone()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Pagination {
    /// One-based page number.
    pub fn page(page: u32, page_size: u32) -> Self {
        let page = page.max(1) as u64;
        Self {
            offset: (page - 1) * page_size as u64,
            limit: page_size as u64,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Ordering {
    #[default]
    NewestFirst,
    OldestFirst,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub id: CommentId,
    pub page_id: String,
    pub parent_id: Option<CommentId>,
    pub content: String,
    pub by_email: Option<String>,
    pub by_nickname: Option<String>,
    pub moderator_id: Option<String>,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
}

/// Partial update. `None` leaves a column untouched; `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct CommentPatch {
    pub approved: Option<bool>,
    pub deleted_at: Option<Option<DateTime<Utc>>>,
    pub notify_confirmed_at: Option<Option<DateTime<Utc>>>,
}

impl CommentPatch {
    pub fn is_empty(&self) -> bool {
        self.approved.is_none() && self.deleted_at.is_none() && self.notify_confirmed_at.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommenterPatch {
    pub verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct PageTouch {
    pub title: Option<String>,
    pub url: Option<String>,
}

#[async_trait]
pub trait ThreadStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>>;
}

/// Dropped without `commit` means rolled back.
#[async_trait]
pub trait StoreTx: Send {
    async fn find_comment(&mut self, id: &CommentId) -> Result<Option<Comment>>;

    async fn find_comments(
        &mut self,
        filter: &CommentFilter,
        pagination: Option<Pagination>,
        ordering: Ordering,
    ) -> Result<Vec<Comment>>;

    async fn count_comments(&mut self, filter: &CommentFilter) -> Result<u64>;

    /// Non-deleted reply counts keyed by parent id. Parents without replies are absent.
    async fn count_replies(&mut self, parent_ids: &[CommentId]) -> Result<HashMap<CommentId, u64>>;

    async fn create_comment(&mut self, comment: NewComment) -> Result<Comment>;

    async fn update_comments(&mut self, ids: &[CommentId], patch: &CommentPatch) -> Result<u64>;

    async fn delete_comments(&mut self, ids: &[CommentId]) -> Result<u64>;

    async fn upsert_commenter(&mut self, email: &str, patch: &CommenterPatch) -> Result<()>;

    async fn find_commenters(&mut self, emails: &[String]) -> Result<Vec<Commenter>>;

    async fn upsert_page(
        &mut self,
        project_id: &ProjectId,
        slug: &str,
        touch: &PageTouch,
    ) -> Result<Page>;

    async fn upsert_project(&mut self, project_id: &ProjectId, owner_id: Option<&str>)
        -> Result<Project>;

    async fn find_project(&mut self, project_id: &ProjectId) -> Result<Option<Project>>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_is_one_based() {
        assert_eq!(Pagination::page(1, 10), Pagination { offset: 0, limit: 10 });
        assert_eq!(Pagination::page(3, 10), Pagination { offset: 20, limit: 10 });
        assert_eq!(Pagination::page(0, 5), Pagination { offset: 0, limit: 5 });
    }
}
