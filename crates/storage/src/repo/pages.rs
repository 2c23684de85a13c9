use crate::models::{SqlPage, SqlProject};
use anyhow::Result;
use domain::store::PageTouch;
use domain::{Page, Project, ProjectId};
use sqlx::SqliteConnection;

pub(crate) async fn upsert_page(
    conn: &mut SqliteConnection,
    project_id: &ProjectId,
    slug: &str,
    touch: &PageTouch,
) -> Result<Page> {
    sqlx::query(
        r#"
        INSERT INTO pages (id, project_id, slug, title, url)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(project_id, slug) DO UPDATE SET
            title = COALESCE(excluded.title, pages.title),
            url = COALESCE(excluded.url, pages.url)
        "#,
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(project_id.as_str())
    .bind(slug)
    .bind(&touch.title)
    .bind(&touch.url)
    .execute(&mut *conn)
    .await?;

    let page = sqlx::query_as::<_, SqlPage>(
        "SELECT id, project_id, slug, title, url FROM pages WHERE project_id = ? AND slug = ?",
    )
    .bind(project_id.as_str())
    .bind(slug)
    .fetch_one(&mut *conn)
    .await?;

    Ok(page.into())
}

pub(crate) async fn upsert_project(
    conn: &mut SqliteConnection,
    project_id: &ProjectId,
    owner_id: Option<&str>,
) -> Result<Project> {
    sqlx::query(
        r#"
        INSERT INTO projects (id, owner_id)
        VALUES (?, ?)
        ON CONFLICT(id) DO UPDATE SET
            owner_id = COALESCE(excluded.owner_id, projects.owner_id)
        "#,
    )
    .bind(project_id.as_str())
    .bind(owner_id)
    .execute(&mut *conn)
    .await?;

    find_project(conn, project_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("project {} vanished after upsert", project_id))
}

pub(crate) async fn find_project(
    conn: &mut SqliteConnection,
    project_id: &ProjectId,
) -> Result<Option<Project>> {
    let row = sqlx::query_as::<_, SqlProject>(
        "SELECT id, owner_id, deleted_at FROM projects WHERE id = ?",
    )
    .bind(project_id.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}
