use crate::models::{to_millis, SqlComment};
use anyhow::Result;
use domain::store::{CommentFilter, CommentPatch, NewComment, Ordering, Pagination, ParentFilter};
use domain::{Comment, CommentId};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use std::collections::HashMap;

const SELECT_COMMENTS: &str = r#"
    SELECT
        c.id, c.page_id, c.parent_id, c.content,
        c.by_email, c.by_nickname, c.moderator_id,
        c.approved, c.created_at, c.deleted_at, c.notify_confirmed_at,
        pg.project_id AS project_id,
        pg.slug AS page_slug
    FROM comments c
    JOIN pages pg ON c.page_id = pg.id
"#;

const COUNT_COMMENTS: &str = r#"
    SELECT COUNT(*)
    FROM comments c
    JOIN pages pg ON c.page_id = pg.id
"#;

fn push_in_list<I>(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, values: I)
where
    I: IntoIterator<Item = String>,
{
    let values: Vec<String> = values.into_iter().collect();
    if values.is_empty() {
        // IN () is a syntax error in SQLite; an empty set matches nothing.
        qb.push(" AND 0 = 1");
        return;
    }
    qb.push(" AND ").push(column).push(" IN (");
    let mut list = qb.separated(", ");
    for value in values {
        list.push_bind(value);
    }
    list.push_unseparated(")");
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &CommentFilter) {
    qb.push(" WHERE 1 = 1");

    if let Some(ids) = &filter.ids {
        push_in_list(qb, "c.id", ids.iter().map(|id| id.as_str().to_string()));
    }
    if let Some(project_id) = &filter.project_id {
        qb.push(" AND pg.project_id = ")
            .push_bind(project_id.as_str().to_string());
    }
    if let Some(slug) = &filter.page_slug {
        qb.push(" AND pg.slug = ").push_bind(slug.clone());
    }
    match &filter.parent {
        ParentFilter::Any => {}
        ParentFilter::Root => {
            qb.push(" AND c.parent_id IS NULL");
        }
        ParentFilter::ChildOf(parent_id) => {
            qb.push(" AND c.parent_id = ")
                .push_bind(parent_id.as_str().to_string());
        }
        ParentFilter::ChildOfAny(parent_ids) => {
            push_in_list(
                qb,
                "c.parent_id",
                parent_ids.iter().map(|id| id.as_str().to_string()),
            );
        }
    }
    if let Some(approved) = filter.approved {
        qb.push(" AND c.approved = ").push_bind(approved);
    }
    match filter.deleted {
        Some(true) => {
            qb.push(" AND c.deleted_at IS NOT NULL");
        }
        Some(false) => {
            qb.push(" AND c.deleted_at IS NULL");
        }
        None => {}
    }
    if let Some(email) = &filter.email {
        qb.push(" AND c.by_email = ").push_bind(email.clone());
    }
    if let Some(emails) = &filter.emails {
        push_in_list(qb, "c.by_email", emails.iter().cloned());
    }
    match filter.moderator {
        Some(true) => {
            qb.push(" AND c.moderator_id IS NOT NULL");
        }
        Some(false) => {
            qb.push(" AND c.moderator_id IS NULL");
        }
        None => {}
    }
    if let Some(exclude) = &filter.exclude_id {
        qb.push(" AND c.id <> ").push_bind(exclude.as_str().to_string());
    }
    if let Some(owner_id) = &filter.owner_id {
        qb.push(
            " AND EXISTS (SELECT 1 FROM projects pr WHERE pr.id = pg.project_id AND pr.owner_id = ",
        )
        .push_bind(owner_id.clone())
        .push(")");
    }
    if filter.live_projects_only {
        qb.push(
            " AND NOT EXISTS (SELECT 1 FROM projects pr WHERE pr.id = pg.project_id AND pr.deleted_at IS NOT NULL)",
        );
    }
}

pub(crate) async fn find_comment(
    conn: &mut SqliteConnection,
    id: &CommentId,
) -> Result<Option<Comment>> {
    let mut qb = QueryBuilder::<Sqlite>::new(SELECT_COMMENTS);
    qb.push(" WHERE c.id = ").push_bind(id.as_str().to_string());

    let row = qb
        .build_query_as::<SqlComment>()
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(Into::into))
}

pub(crate) async fn find_comments(
    conn: &mut SqliteConnection,
    filter: &CommentFilter,
    pagination: Option<Pagination>,
    ordering: Ordering,
) -> Result<Vec<Comment>> {
    let mut qb = QueryBuilder::<Sqlite>::new(SELECT_COMMENTS);
    push_filter(&mut qb, filter);

    // rowid breaks ties between comments created in the same millisecond
    match ordering {
        Ordering::NewestFirst => qb.push(" ORDER BY c.created_at DESC, c.rowid DESC"),
        Ordering::OldestFirst => qb.push(" ORDER BY c.created_at ASC, c.rowid ASC"),
    };

    if let Some(p) = pagination {
        qb.push(" LIMIT ")
            .push_bind(i64::try_from(p.limit).unwrap_or(i64::MAX))
            .push(" OFFSET ")
            .push_bind(i64::try_from(p.offset).unwrap_or(i64::MAX));
    }

    let rows = qb
        .build_query_as::<SqlComment>()
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

pub(crate) async fn count_comments(
    conn: &mut SqliteConnection,
    filter: &CommentFilter,
) -> Result<u64> {
    let mut qb = QueryBuilder::<Sqlite>::new(COUNT_COMMENTS);
    push_filter(&mut qb, filter);

    let (count,): (i64,) = qb.build_query_as().fetch_one(&mut *conn).await?;
    Ok(count.max(0) as u64)
}

pub(crate) async fn count_replies(
    conn: &mut SqliteConnection,
    parent_ids: &[CommentId],
) -> Result<HashMap<CommentId, u64>> {
    if parent_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT c.parent_id, COUNT(*) FROM comments c WHERE c.deleted_at IS NULL",
    );
    push_in_list(
        &mut qb,
        "c.parent_id",
        parent_ids.iter().map(|id| id.as_str().to_string()),
    );
    qb.push(" GROUP BY c.parent_id");

    let rows: Vec<(String, i64)> = qb.build_query_as().fetch_all(&mut *conn).await?;

    Ok(rows
        .into_iter()
        .map(|(parent, count)| (CommentId::new_unchecked(parent), count.max(0) as u64))
        .collect())
}

pub(crate) async fn insert_comment(
    conn: &mut SqliteConnection,
    c: NewComment,
) -> Result<Comment> {
    sqlx::query(
        r#"
        INSERT INTO comments (
            id, page_id, parent_id, content,
            by_email, by_nickname, moderator_id,
            approved, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(c.id.as_str())
    .bind(&c.page_id)
    .bind(c.parent_id.as_ref().map(|p| p.as_str()))
    .bind(&c.content)
    .bind(&c.by_email)
    .bind(&c.by_nickname)
    .bind(&c.moderator_id)
    .bind(c.approved)
    .bind(to_millis(c.created_at))
    .execute(&mut *conn)
    .await?;

    find_comment(conn, &c.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("comment {} vanished after insert", c.id))
}

pub(crate) async fn update_comments(
    conn: &mut SqliteConnection,
    ids: &[CommentId],
    patch: &CommentPatch,
) -> Result<u64> {
    if ids.is_empty() || patch.is_empty() {
        return Ok(0);
    }

    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE comments SET ");
    {
        let mut set = qb.separated(", ");
        if let Some(approved) = patch.approved {
            set.push("approved = ").push_bind_unseparated(approved);
        }
        if let Some(deleted_at) = patch.deleted_at {
            set.push("deleted_at = ")
                .push_bind_unseparated(deleted_at.map(to_millis));
        }
        if let Some(notify) = patch.notify_confirmed_at {
            set.push("notify_confirmed_at = ")
                .push_bind_unseparated(notify.map(to_millis));
        }
    }
    qb.push(" WHERE 1 = 1");
    push_in_list(&mut qb, "id", ids.iter().map(|id| id.as_str().to_string()));

    let result = qb.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

pub(crate) async fn delete_comments(conn: &mut SqliteConnection, ids: &[CommentId]) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM comments WHERE 1 = 1");
    push_in_list(&mut qb, "id", ids.iter().map(|id| id.as_str().to_string()));

    let result = qb.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::pages;
    use crate::Db;
    use chrono::{Duration, TimeZone, Utc};
    use domain::store::PageTouch;
    use domain::ProjectId;

    async fn seed(db: &Db) -> (String, Vec<CommentId>) {
        let mut conn = db.pool.acquire().await.unwrap();
        let project = ProjectId::new_unchecked("proj".into());
        let page = pages::upsert_page(&mut conn, &project, "hello", &PageTouch::default())
            .await
            .unwrap();

        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut ids = Vec::new();
        for i in 0..3 {
            let id = CommentId::generate();
            insert_comment(
                &mut conn,
                NewComment {
                    id: id.clone(),
                    page_id: page.id.clone(),
                    parent_id: ids.first().cloned().filter(|_| i == 2),
                    content: format!("comment {i}"),
                    by_email: Some("a@x.com".into()),
                    by_nickname: Some("a".into()),
                    moderator_id: None,
                    approved: i == 0,
                    created_at: base + Duration::minutes(i),
                },
            )
            .await
            .unwrap();
            ids.push(id);
        }
        (page.id, ids)
    }

    #[tokio::test]
    async fn test_filter_and_ordering() {
        let db = Db::in_memory().await.unwrap();
        let (_, ids) = seed(&db).await;
        let mut conn = db.pool.acquire().await.unwrap();

        let roots = find_comments(
            &mut conn,
            &CommentFilter {
                parent: ParentFilter::Root,
                ..Default::default()
            },
            None,
            Ordering::NewestFirst,
        )
        .await
        .unwrap();
        assert_eq!(
            roots.iter().map(|c| c.id.clone()).collect::<Vec<_>>(),
            vec![ids[1].clone(), ids[0].clone()]
        );
        assert_eq!(roots[0].project_id.as_str(), "proj");
        assert_eq!(roots[0].page_slug, "hello");

        let approved = count_comments(
            &mut conn,
            &CommentFilter {
                approved: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(approved, 1);

        let empty = count_comments(&mut conn, &CommentFilter::by_ids(&[]))
            .await
            .unwrap();
        assert_eq!(empty, 0);
    }

    #[tokio::test]
    async fn test_offset_past_i64_is_empty() {
        let db = Db::in_memory().await.unwrap();
        seed(&db).await;
        let mut conn = db.pool.acquire().await.unwrap();

        let far = find_comments(
            &mut conn,
            &CommentFilter::default(),
            Some(Pagination {
                offset: u64::MAX,
                limit: 10,
            }),
            Ordering::NewestFirst,
        )
        .await
        .unwrap();
        assert!(far.is_empty());

        let last = find_comments(
            &mut conn,
            &CommentFilter::default(),
            Some(Pagination::page(u32::MAX, u32::MAX)),
            Ordering::NewestFirst,
        )
        .await
        .unwrap();
        assert!(last.is_empty());
    }

    #[tokio::test]
    async fn test_update_and_reply_counts() {
        let db = Db::in_memory().await.unwrap();
        let (_, ids) = seed(&db).await;
        let mut conn = db.pool.acquire().await.unwrap();

        let counts = count_replies(&mut conn, &ids).await.unwrap();
        assert_eq!(counts.get(&ids[0]), Some(&1));
        assert_eq!(counts.get(&ids[1]), None);

        let now = Utc::now();
        let changed = update_comments(
            &mut conn,
            &[ids[2].clone()],
            &CommentPatch {
                deleted_at: Some(Some(now)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(changed, 1);

        let counts = count_replies(&mut conn, &ids).await.unwrap();
        assert!(counts.is_empty());

        let reloaded = find_comment(&mut conn, &ids[2]).await.unwrap().unwrap();
        assert_eq!(
            reloaded.deleted_at.map(|d| d.timestamp_millis()),
            Some(now.timestamp_millis())
        );
    }
}
