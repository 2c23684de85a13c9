use crate::models::{to_millis, SqlCommenter};
use anyhow::Result;
use domain::store::CommenterPatch;
use domain::Commenter;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

pub(crate) async fn upsert_commenter(
    conn: &mut SqliteConnection,
    email: &str,
    patch: &CommenterPatch,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO commenters (email, verified_at)
        VALUES (?, ?)
        ON CONFLICT(email) DO UPDATE SET
            verified_at = COALESCE(excluded.verified_at, commenters.verified_at)
        "#,
    )
    .bind(email)
    .bind(patch.verified_at.map(to_millis))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn find_commenters(
    conn: &mut SqliteConnection,
    emails: &[String],
) -> Result<Vec<Commenter>> {
    if emails.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb = QueryBuilder::<Sqlite>::new("SELECT email, verified_at FROM commenters WHERE email IN (");
    let mut list = qb.separated(", ");
    for email in emails {
        list.push_bind(email.clone());
    }
    list.push_unseparated(")");

    let rows = qb
        .build_query_as::<SqlCommenter>()
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}
