use chrono::{DateTime, Utc};
use domain::{Comment, CommentId, Commenter, Page, Project, ProjectId};
use sqlx::FromRow;

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

#[derive(FromRow)]
pub struct SqlComment {
    pub id: String,
    pub page_id: String,
    pub parent_id: Option<String>,
    pub content: String,
    pub by_email: Option<String>,
    pub by_nickname: Option<String>,
    pub moderator_id: Option<String>,
    pub approved: bool,
    pub created_at: i64,
    pub deleted_at: Option<i64>,
    pub notify_confirmed_at: Option<i64>,

    // joined from pages
    pub project_id: String,
    pub page_slug: String,
}

impl From<SqlComment> for Comment {
    fn from(sql: SqlComment) -> Self {
        Comment {
            id: CommentId::new_unchecked(sql.id),
            page_id: sql.page_id,
            project_id: ProjectId::new_unchecked(sql.project_id),
            page_slug: sql.page_slug,
            parent_id: sql.parent_id.map(CommentId::new_unchecked),
            content: sql.content,
            by_email: sql.by_email,
            by_nickname: sql.by_nickname,
            moderator_id: sql.moderator_id,
            approved: sql.approved,
            created_at: from_millis(sql.created_at),
            deleted_at: sql.deleted_at.map(from_millis),
            notify_confirmed_at: sql.notify_confirmed_at.map(from_millis),
        }
    }
}

#[derive(FromRow)]
pub struct SqlCommenter {
    pub email: String,
    pub verified_at: Option<i64>,
}

impl From<SqlCommenter> for Commenter {
    fn from(sql: SqlCommenter) -> Self {
        Commenter {
            email: sql.email,
            verified_at: sql.verified_at.map(from_millis),
        }
    }
}

#[derive(FromRow)]
pub struct SqlPage {
    pub id: String,
    pub project_id: String,
    pub slug: String,
    pub title: Option<String>,
    pub url: Option<String>,
}

impl From<SqlPage> for Page {
    fn from(sql: SqlPage) -> Self {
        Page {
            id: sql.id,
            project_id: ProjectId::new_unchecked(sql.project_id),
            slug: sql.slug,
            title: sql.title,
            url: sql.url,
        }
    }
}

#[derive(FromRow)]
pub struct SqlProject {
    pub id: String,
    pub owner_id: Option<String>,
    pub deleted_at: Option<i64>,
}

impl From<SqlProject> for Project {
    fn from(sql: SqlProject) -> Self {
        Project {
            id: ProjectId::new_unchecked(sql.id),
            owner_id: sql.owner_id,
            deleted_at: sql.deleted_at.map(from_millis),
        }
    }
}
