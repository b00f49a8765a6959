//! Document storage for every resource kind.
//!
//! Each record is one row of the `records` table: the serialized document plus
//! a handful of projected columns ([`RecordIndex`]) that listing, ownership and
//! uniqueness checks query on. All functions operate on a borrowed connection so
//! callers compose them inside a single transaction.

use chrono::{DateTime, TimeZone, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};

use crate::domain::{PageQuery, Timestamps};
use crate::errors::{LarderError, Result};

/// A value persisted in the `records` table.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    /// Discriminator stored in the `kind` column.
    const KIND: &'static str;

    fn id(&self) -> &str;
    fn timestamps(&self) -> &Timestamps;
    fn timestamps_mut(&mut self) -> &mut Timestamps;

    /// Projected columns for this document.
    fn index(&self) -> RecordIndex {
        RecordIndex::default()
    }
}

/// Projected, queryable columns of a record.
///
/// `unique_key` and `secondary_key` are enforced unique per kind among live
/// records. `left_id`/`right_id` hold bridge endpoints or an additional
/// ancestor id. `due_at` marks records a background sweep must revisit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordIndex {
    pub household_id: Option<String>,
    pub user_id: Option<String>,
    pub parent_id: Option<String>,
    pub left_id: Option<String>,
    pub right_id: Option<String>,
    pub search_key: Option<String>,
    pub unique_key: Option<String>,
    pub secondary_key: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
}

/// Raw row as read back from the table.
#[derive(Debug, Clone, FromRow)]
pub struct RecordRow {
    pub kind: String,
    pub id: String,
    pub household_id: Option<String>,
    pub user_id: Option<String>,
    pub parent_id: Option<String>,
    pub data: String,
    pub archived_at: Option<i64>,
}

impl RecordRow {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    pub fn decode<D: Document>(&self) -> Result<D> {
        serde_json::from_str(&self.data).map_err(|source| LarderError::Serialization {
            source,
            context: format!("Failed to decode {} '{}'", self.kind, self.id),
        })
    }
}

/// Column a listing filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    HouseholdId,
    UserId,
    ParentId,
    LeftId,
    RightId,
    UniqueKey,
    SecondaryKey,
}

impl Column {
    fn as_sql(&self) -> &'static str {
        match self {
            Column::HouseholdId => "household_id",
            Column::UserId => "user_id",
            Column::ParentId => "parent_id",
            Column::LeftId => "left_id",
            Column::RightId => "right_id",
            Column::UniqueKey => "unique_key",
            Column::SecondaryKey => "secondary_key",
        }
    }
}

/// Equality filters for a listing. The scope filter defines `totalCount`;
/// the narrowing filter further restricts `filteredCount`.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub scope: Vec<(Column, String)>,
    pub narrowing: Vec<(Column, String)>,
}

impl RecordFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn scoped(column: Column, value: impl Into<String>) -> Self {
        Self { scope: vec![(column, value.into())], narrowing: Vec::new() }
    }

    pub fn and_scope(mut self, column: Column, value: impl Into<String>) -> Self {
        self.scope.push((column, value.into()));
        self
    }

    pub fn narrow(mut self, column: Column, value: impl Into<String>) -> Self {
        self.narrowing.push((column, value.into()));
        self
    }
}

fn millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub fn from_millis(value: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(value).single().unwrap_or_default()
}

fn encode<D: Document>(doc: &D) -> Result<String> {
    serde_json::to_string(doc).map_err(|source| LarderError::Serialization {
        source,
        context: format!("Failed to encode {} '{}'", D::KIND, doc.id()),
    })
}

/// Insert a new record.
pub async fn insert<D: Document>(conn: &mut SqliteConnection, doc: &D) -> Result<()> {
    let index = doc.index();
    let timestamps = doc.timestamps();
    let data = encode(doc)?;

    sqlx::query(
        "INSERT INTO records (kind, id, household_id, user_id, parent_id, left_id, right_id, \
         search_key, unique_key, secondary_key, due_at, data, created_at, updated_at, archived_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
    )
    .bind(D::KIND)
    .bind(doc.id())
    .bind(index.household_id)
    .bind(index.user_id)
    .bind(index.parent_id)
    .bind(index.left_id)
    .bind(index.right_id)
    .bind(index.search_key)
    .bind(index.unique_key)
    .bind(index.secondary_key)
    .bind(index.due_at.map(millis))
    .bind(data)
    .bind(millis(timestamps.created_at))
    .bind(timestamps.last_updated_at.map(millis))
    .bind(timestamps.archived_at.map(millis))
    .execute(&mut *conn)
    .await
    .map_err(|e| LarderError::database(e, format!("Failed to insert {}", D::KIND)))?;

    Ok(())
}

/// Persist the current state of an existing record.
pub async fn save<D: Document>(conn: &mut SqliteConnection, doc: &D) -> Result<()> {
    let index = doc.index();
    let timestamps = doc.timestamps();
    let data = encode(doc)?;

    let result = sqlx::query(
        "UPDATE records SET household_id = $1, user_id = $2, parent_id = $3, left_id = $4, \
         right_id = $5, search_key = $6, unique_key = $7, secondary_key = $8, due_at = $9, \
         data = $10, updated_at = $11, archived_at = $12 WHERE kind = $13 AND id = $14",
    )
    .bind(index.household_id)
    .bind(index.user_id)
    .bind(index.parent_id)
    .bind(index.left_id)
    .bind(index.right_id)
    .bind(index.search_key)
    .bind(index.unique_key)
    .bind(index.secondary_key)
    .bind(index.due_at.map(millis))
    .bind(data)
    .bind(timestamps.last_updated_at.map(millis))
    .bind(timestamps.archived_at.map(millis))
    .bind(D::KIND)
    .bind(doc.id())
    .execute(&mut *conn)
    .await
    .map_err(|e| LarderError::database(e, format!("Failed to update {}", D::KIND)))?;

    if result.rows_affected() == 0 {
        return Err(LarderError::not_found(D::KIND, doc.id()));
    }
    Ok(())
}

/// Fetch the raw row of any kind, archived or not.
pub async fn fetch_row(conn: &mut SqliteConnection, kind: &str, id: &str) -> Result<Option<RecordRow>> {
    sqlx::query_as::<_, RecordRow>(
        "SELECT kind, id, household_id, user_id, parent_id, data, archived_at \
         FROM records WHERE kind = $1 AND id = $2",
    )
    .bind(kind)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| LarderError::database(e, format!("Failed to fetch {}", kind)))
}

/// Fetch a record regardless of archive state.
pub async fn fetch<D: Document>(conn: &mut SqliteConnection, id: &str) -> Result<Option<D>> {
    match fetch_row(conn, D::KIND, id).await? {
        Some(row) => row.decode().map(Some),
        None => Ok(None),
    }
}

/// Fetch a live record; archived records read as absent.
pub async fn fetch_live<D: Document>(conn: &mut SqliteConnection, id: &str) -> Result<Option<D>> {
    match fetch_row(conn, D::KIND, id).await? {
        Some(row) if !row.is_archived() => row.decode().map(Some),
        _ => Ok(None),
    }
}

/// Find the live record holding a unique or secondary key.
pub async fn find_by<D: Document>(
    conn: &mut SqliteConnection,
    column: Column,
    value: &str,
) -> Result<Option<D>> {
    let mut builder: QueryBuilder<'static, Sqlite> = QueryBuilder::new(
        "SELECT kind, id, household_id, user_id, parent_id, data, archived_at FROM records WHERE kind = ",
    );
    builder.push_bind(D::KIND);
    builder.push(format!(" AND {} = ", column.as_sql()));
    builder.push_bind(value.to_string());
    builder.push(" AND archived_at IS NULL ORDER BY seq LIMIT 1");

    let row = builder
        .build_query_as::<RecordRow>()
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| LarderError::database(e, format!("Failed to look up {}", D::KIND)))?;

    row.map(|row| row.decode()).transpose()
}

/// All live records matching every filter, oldest first.
pub async fn list_all<D: Document>(
    conn: &mut SqliteConnection,
    filters: &[(Column, String)],
) -> Result<Vec<D>> {
    let mut builder: QueryBuilder<'static, Sqlite> = QueryBuilder::new(
        "SELECT kind, id, household_id, user_id, parent_id, data, archived_at FROM records WHERE kind = ",
    );
    builder.push_bind(D::KIND);
    push_filters(&mut builder, filters);
    builder.push(" AND archived_at IS NULL ORDER BY created_at ASC, seq ASC");

    let rows = builder
        .build_query_as::<RecordRow>()
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| LarderError::database(e, format!("Failed to list {}", D::KIND)))?;

    rows.iter().map(|row| row.decode()).collect()
}

/// Records whose `due_at` has passed.
pub async fn list_due<D: Document>(conn: &mut SqliteConnection, now: DateTime<Utc>) -> Result<Vec<D>> {
    let rows = sqlx::query_as::<_, RecordRow>(
        "SELECT kind, id, household_id, user_id, parent_id, data, archived_at FROM records \
         WHERE kind = $1 AND due_at IS NOT NULL AND due_at <= $2 AND archived_at IS NULL \
         ORDER BY due_at ASC",
    )
    .bind(D::KIND)
    .bind(millis(now))
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| LarderError::database(e, format!("Failed to list due {}", D::KIND)))?;

    rows.iter().map(|row| row.decode()).collect()
}

/// One page of records plus `(filteredCount, totalCount)`.
pub async fn list_page<D: Document>(
    conn: &mut SqliteConnection,
    filter: &RecordFilter,
    query: &PageQuery,
) -> Result<(Vec<D>, u64, u64)> {
    let include_archived = query.wants_archived();

    let mut total: QueryBuilder<'static, Sqlite> =
        QueryBuilder::new("SELECT COUNT(*) FROM records WHERE kind = ");
    total.push_bind(D::KIND);
    push_filters(&mut total, &filter.scope);
    if !include_archived {
        total.push(" AND archived_at IS NULL");
    }
    let total_count: i64 = total
        .build_query_scalar()
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| LarderError::database(e, format!("Failed to count {}", D::KIND)))?;

    let mut filtered: QueryBuilder<'static, Sqlite> =
        QueryBuilder::new("SELECT COUNT(*) FROM records WHERE kind = ");
    filtered.push_bind(D::KIND);
    push_page_filters(&mut filtered, filter, query);
    let filtered_count: i64 = filtered
        .build_query_scalar()
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| LarderError::database(e, format!("Failed to count {}", D::KIND)))?;

    let mut select: QueryBuilder<'static, Sqlite> = QueryBuilder::new(
        "SELECT kind, id, household_id, user_id, parent_id, data, archived_at FROM records WHERE kind = ",
    );
    select.push_bind(D::KIND);
    push_page_filters(&mut select, filter, query);
    let direction = query.sort().as_sql();
    select.push(format!(" ORDER BY created_at {direction}, seq {direction} LIMIT "));
    select.push_bind(i64::from(query.limit()));
    select.push(" OFFSET ");
    select.push_bind(query.offset() as i64);

    let rows = select
        .build_query_as::<RecordRow>()
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| LarderError::database(e, format!("Failed to list {}", D::KIND)))?;

    let items = rows.iter().map(|row| row.decode()).collect::<Result<Vec<D>>>()?;
    Ok((items, filtered_count.max(0) as u64, total_count.max(0) as u64))
}

/// Live records whose search key starts with the query or contains a word
/// starting with it.
pub async fn search<D: Document>(
    conn: &mut SqliteConnection,
    query: &str,
    limit: u32,
) -> Result<Vec<D>> {
    let needle = escape_like(&query.trim().to_lowercase());
    let rows = sqlx::query_as::<_, RecordRow>(
        "SELECT kind, id, household_id, user_id, parent_id, data, archived_at FROM records \
         WHERE kind = $1 AND archived_at IS NULL \
         AND (search_key LIKE $2 ESCAPE '\\' OR search_key LIKE $3 ESCAPE '\\') \
         ORDER BY search_key ASC LIMIT $4",
    )
    .bind(D::KIND)
    .bind(format!("{}%", needle))
    .bind(format!("% {}%", needle))
    .bind(i64::from(limit))
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| LarderError::database(e, format!("Failed to search {}", D::KIND)))?;

    rows.iter().map(|row| row.decode()).collect()
}

fn escape_like(value: &str) -> String {
    value.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn push_filters(builder: &mut QueryBuilder<'static, Sqlite>, filters: &[(Column, String)]) {
    for (column, value) in filters {
        builder.push(format!(" AND {} = ", column.as_sql()));
        builder.push_bind(value.clone());
    }
}

fn push_page_filters(builder: &mut QueryBuilder<'static, Sqlite>, filter: &RecordFilter, query: &PageQuery) {
    push_filters(builder, &filter.scope);
    push_filters(builder, &filter.narrowing);
    if !query.wants_archived() {
        builder.push(" AND archived_at IS NULL");
    }
    if let Some(before) = query.created_before() {
        builder.push(" AND created_at < ");
        builder.push_bind(millis(before));
    }
    if let Some(after) = query.created_after() {
        builder.push(" AND created_at > ");
        builder.push_bind(millis(after));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::storage::{create_pool, Database};
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Probe {
        id: String,
        name: String,
        household: String,
        #[serde(flatten)]
        timestamps: Timestamps,
    }

    impl Document for Probe {
        const KIND: &'static str = "probe";

        fn id(&self) -> &str {
            &self.id
        }

        fn timestamps(&self) -> &Timestamps {
            &self.timestamps
        }

        fn timestamps_mut(&mut self) -> &mut Timestamps {
            &mut self.timestamps
        }

        fn index(&self) -> RecordIndex {
            RecordIndex {
                household_id: Some(self.household.clone()),
                search_key: Some(self.name.to_lowercase()),
                unique_key: Some(self.name.to_lowercase()),
                ..Default::default()
            }
        }
    }

    fn probe(id: &str, name: &str, household: &str, created_secs: i64) -> Probe {
        Probe {
            id: id.to_string(),
            name: name.to_string(),
            household: household.to_string(),
            timestamps: Timestamps::created(Utc.timestamp_opt(created_secs, 0).unwrap()),
        }
    }

    async fn database() -> Database {
        let config = DatabaseConfig { url: "sqlite::memory:".to_string(), ..Default::default() };
        Database::new(create_pool(&config).await.unwrap())
    }

    #[tokio::test]
    async fn insert_fetch_and_archive() {
        let db = database().await;
        let mut tx = db.write().await.unwrap();
        let mut record = probe("p1", "Salt", "h1", 100);
        insert(&mut tx, &record).await.unwrap();
        assert_eq!(fetch_live::<Probe>(&mut tx, "p1").await.unwrap(), Some(record.clone()));

        record.timestamps.archive(Utc::now());
        save(&mut tx, &record).await.unwrap();
        assert!(fetch_live::<Probe>(&mut tx, "p1").await.unwrap().is_none());
        assert!(fetch::<Probe>(&mut tx, "p1").await.unwrap().is_some());
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn unique_key_only_applies_to_live_records() {
        let db = database().await;
        let mut tx = db.write().await.unwrap();
        let mut first = probe("p1", "Salt", "h1", 100);
        insert(&mut tx, &first).await.unwrap();

        let duplicate = insert(&mut tx, &probe("p2", "salt", "h1", 101)).await.unwrap_err();
        assert_eq!(duplicate.code(), crate::errors::ErrorCode::Conflict);

        first.timestamps.archive(Utc::now());
        save(&mut tx, &first).await.unwrap();
        insert(&mut tx, &probe("p3", "SALT", "h1", 102)).await.unwrap();
    }

    #[tokio::test]
    async fn paging_counts_and_ordering() {
        let db = database().await;
        let mut tx = db.write().await.unwrap();
        for (i, name) in ["Anise", "Basil", "Cumin", "Dill"].iter().enumerate() {
            insert(&mut tx, &probe(&format!("p{i}"), name, "h1", 100 + i as i64)).await.unwrap();
        }
        insert(&mut tx, &probe("other", "Epazote", "h2", 200)).await.unwrap();

        let filter = RecordFilter::scoped(Column::HouseholdId, "h1");
        let query = PageQuery {
            limit: Some(2),
            page: Some(2),
            sort_by: Some(crate::domain::SortDirection::Desc),
            ..Default::default()
        };
        let (items, filtered, total) = list_page::<Probe>(&mut tx, &filter, &query).await.unwrap();
        assert_eq!(filtered, 4);
        assert_eq!(total, 4);
        let names: Vec<_> = items.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Basil", "Anise"]);

        let query = PageQuery { created_after: Some(101), ..Default::default() };
        let (items, filtered, total) = list_page::<Probe>(&mut tx, &filter, &query).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(filtered, 2);
        assert_eq!(total, 4);
    }

    #[tokio::test]
    async fn search_matches_prefixes_of_words() {
        let db = database().await;
        let mut tx = db.write().await.unwrap();
        insert(&mut tx, &probe("p1", "Black Pepper", "h1", 1)).await.unwrap();
        insert(&mut tx, &probe("p2", "Pepperoncini", "h1", 2)).await.unwrap();
        insert(&mut tx, &probe("p3", "Salt", "h1", 3)).await.unwrap();

        let found = search::<Probe>(&mut tx, "pep", 10).await.unwrap();
        let ids: Vec<_> = found.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
        assert!(search::<Probe>(&mut tx, "%", 10).await.unwrap().is_empty());
    }
}
