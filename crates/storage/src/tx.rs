use crate::repo::{commenters, comments, pages};
use anyhow::Result;
use async_trait::async_trait;
use domain::store::{
    CommentFilter, CommentPatch, CommenterPatch, NewComment, Ordering, PageTouch, Pagination,
    StoreTx,
};
use domain::{Comment, CommentId, Commenter, Page, Project, ProjectId};
use sqlx::{Sqlite, Transaction};
use std::collections::HashMap;

pub struct SqliteTx {
    tx: Transaction<'static, Sqlite>,
}

impl SqliteTx {
    pub(crate) fn new(tx: Transaction<'static, Sqlite>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl StoreTx for SqliteTx {
    async fn find_comment(&mut self, id: &CommentId) -> Result<Option<Comment>> {
        comments::find_comment(&mut self.tx, id).await
    }

    async fn find_comments(
        &mut self,
        filter: &CommentFilter,
        pagination: Option<Pagination>,
        ordering: Ordering,
    ) -> Result<Vec<Comment>> {
        comments::find_comments(&mut self.tx, filter, pagination, ordering).await
    }

    async fn count_comments(&mut self, filter: &CommentFilter) -> Result<u64> {
        comments::count_comments(&mut self.tx, filter).await
    }

    async fn count_replies(&mut self, parent_ids: &[CommentId]) -> Result<HashMap<CommentId, u64>> {
        comments::count_replies(&mut self.tx, parent_ids).await
    }

    async fn create_comment(&mut self, comment: NewComment) -> Result<Comment> {
        comments::insert_comment(&mut self.tx, comment).await
    }

    async fn update_comments(&mut self, ids: &[CommentId], patch: &CommentPatch) -> Result<u64> {
        comments::update_comments(&mut self.tx, ids, patch).await
    }

    async fn delete_comments(&mut self, ids: &[CommentId]) -> Result<u64> {
        comments::delete_comments(&mut self.tx, ids).await
    }

    async fn upsert_commenter(&mut self, email: &str, patch: &CommenterPatch) -> Result<()> {
        commenters::upsert_commenter(&mut self.tx, email, patch).await
    }

    async fn find_commenters(&mut self, emails: &[String]) -> Result<Vec<Commenter>> {
        commenters::find_commenters(&mut self.tx, emails).await
    }

    async fn upsert_page(
        &mut self,
        project_id: &ProjectId,
        slug: &str,
        touch: &PageTouch,
    ) -> Result<Page> {
        pages::upsert_page(&mut self.tx, project_id, slug, touch).await
    }

    async fn upsert_project(
        &mut self,
        project_id: &ProjectId,
        owner_id: Option<&str>,
    ) -> Result<Project> {
        pages::upsert_project(&mut self.tx, project_id, owner_id).await
    }

    async fn find_project(&mut self, project_id: &ProjectId) -> Result<Option<Project>> {
        pages::find_project(&mut self.tx, project_id).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
