//! Audit log repository for the change journal.
//!
//! Entries are appended inside the transaction of the operation they describe,
//! so an operation and its journal entry commit or roll back together.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};

use crate::domain::{new_record_id, HouseholdId, PageQuery, UserId};
use crate::errors::{LarderError, Result};
use crate::observability::metrics;
use crate::storage::records::from_millis;

/// Audit event descriptor prior to persistence.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub event_type: String,
    pub actor_user_id: Option<UserId>,
    pub household_id: Option<HouseholdId>,
    pub resource_kind: Option<String>,
    pub resource_id: Option<String>,
    pub context: serde_json::Map<String, serde_json::Value>,
}

impl AuditEvent {
    pub fn new(event_type: impl Into<String>, actor: Option<&UserId>) -> Self {
        Self {
            event_type: event_type.into(),
            actor_user_id: actor.cloned(),
            household_id: None,
            resource_kind: None,
            resource_id: None,
            context: serde_json::Map::new(),
        }
    }

    pub fn household(mut self, household_id: &HouseholdId) -> Self {
        self.household_id = Some(household_id.clone());
        self
    }

    pub fn resource(mut self, kind: &str, id: &str) -> Self {
        self.resource_kind = Some(kind.to_string());
        self.resource_id = Some(id.to_string());
        self
    }

    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }
}

/// A persisted journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: String,
    pub event_type: String,
    #[serde(rename = "actorUserID")]
    pub actor_user_id: Option<UserId>,
    #[serde(rename = "belongsToHousehold")]
    pub household_id: Option<HouseholdId>,
    pub resource_kind: Option<String>,
    #[serde(rename = "resourceID")]
    pub resource_id: Option<String>,
    pub context: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct AuditRow {
    id: String,
    event_type: String,
    actor_user_id: Option<String>,
    household_id: Option<String>,
    resource_kind: Option<String>,
    resource_id: Option<String>,
    context: String,
    occurred_at: i64,
}

impl TryFrom<AuditRow> for AuditLogEntry {
    type Error = LarderError;

    fn try_from(row: AuditRow) -> Result<Self> {
        Ok(Self {
            context: serde_json::from_str(&row.context)?,
            id: row.id,
            event_type: row.event_type,
            actor_user_id: row.actor_user_id.map(UserId::from_string),
            household_id: row.household_id.map(HouseholdId::from_string),
            resource_kind: row.resource_kind,
            resource_id: row.resource_id,
            occurred_at: from_millis(row.occurred_at),
        })
    }
}

/// Append an entry.
pub async fn append(conn: &mut SqliteConnection, event: AuditEvent, now: DateTime<Utc>) -> Result<AuditLogEntry> {
    let entry = AuditLogEntry {
        id: new_record_id(),
        event_type: event.event_type,
        actor_user_id: event.actor_user_id,
        household_id: event.household_id,
        resource_kind: event.resource_kind,
        resource_id: event.resource_id,
        context: serde_json::Value::Object(event.context),
        occurred_at: now,
    };

    let context = serde_json::to_string(&entry.context)
        .map_err(|err| LarderError::validation(format!("Invalid audit context JSON: {}", err)))?;

    sqlx::query(
        "INSERT INTO audit_log (id, event_type, actor_user_id, household_id, resource_kind, \
         resource_id, context, occurred_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(&entry.id)
    .bind(&entry.event_type)
    .bind(entry.actor_user_id.as_ref())
    .bind(entry.household_id.as_ref())
    .bind(entry.resource_kind.as_deref())
    .bind(entry.resource_id.as_deref())
    .bind(context)
    .bind(now.timestamp_millis())
    .execute(&mut *conn)
    .await
    .map_err(|err| LarderError::database(err, "Failed to write audit event"))?;

    metrics::record_audit_entry(&entry.event_type);
    tracing::debug!(event_type = %entry.event_type, resource_id = ?entry.resource_id, "audit entry appended");
    Ok(entry)
}

/// Optional narrowing for audit queries.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditFilter {
    pub event_type: Option<String>,
    #[serde(rename = "actorUserID")]
    pub actor_user_id: Option<String>,
    #[serde(rename = "resourceID")]
    pub resource_id: Option<String>,
}

/// Page of entries, newest first unless `sortBy=asc`.
pub async fn list(
    conn: &mut SqliteConnection,
    filter: &AuditFilter,
    query: &PageQuery,
) -> Result<(Vec<AuditLogEntry>, u64, u64)> {
    let total_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_log")
        .fetch_one(&mut *conn)
        .await
        .map_err(|err| LarderError::database(err, "Failed to count audit entries"))?;

    let mut count: QueryBuilder<'static, Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM audit_log WHERE 1 = 1");
    push_audit_filters(&mut count, filter, query);
    let filtered_count: i64 = count
        .build_query_scalar()
        .fetch_one(&mut *conn)
        .await
        .map_err(|err| LarderError::database(err, "Failed to count audit entries"))?;

    let mut select: QueryBuilder<'static, Sqlite> = QueryBuilder::new(
        "SELECT id, event_type, actor_user_id, household_id, resource_kind, resource_id, context, occurred_at \
         FROM audit_log WHERE 1 = 1",
    );
    push_audit_filters(&mut select, filter, query);
    let direction = match query.sort_by {
        Some(crate::domain::SortDirection::Asc) => "ASC",
        _ => "DESC",
    };
    select.push(format!(" ORDER BY seq {direction} LIMIT "));
    select.push_bind(i64::from(query.limit()));
    select.push(" OFFSET ");
    select.push_bind(query.offset() as i64);

    let rows = select
        .build_query_as::<AuditRow>()
        .fetch_all(&mut *conn)
        .await
        .map_err(|err| LarderError::database(err, "Failed to list audit entries"))?;

    let entries = rows.into_iter().map(AuditLogEntry::try_from).collect::<Result<Vec<_>>>()?;
    Ok((entries, filtered_count.max(0) as u64, total_count.max(0) as u64))
}

fn push_audit_filters(builder: &mut QueryBuilder<'static, Sqlite>, filter: &AuditFilter, query: &PageQuery) {
    if let Some(event_type) = &filter.event_type {
        builder.push(" AND event_type = ");
        builder.push_bind(event_type.clone());
    }
    if let Some(actor) = &filter.actor_user_id {
        builder.push(" AND actor_user_id = ");
        builder.push_bind(actor.clone());
    }
    if let Some(resource_id) = &filter.resource_id {
        builder.push(" AND resource_id = ");
        builder.push_bind(resource_id.clone());
    }
    if let Some(before) = query.created_before() {
        builder.push(" AND occurred_at < ");
        builder.push_bind(before.timestamp_millis());
    }
    if let Some(after) = query.created_after() {
        builder.push(" AND occurred_at > ");
        builder.push_bind(after.timestamp_millis());
    }
}

/// Event types recorded for a resource, oldest first.
pub async fn event_types_for(conn: &mut SqliteConnection, resource_id: &str) -> Result<Vec<String>> {
    sqlx::query_scalar("SELECT event_type FROM audit_log WHERE resource_id = $1 ORDER BY seq ASC")
        .bind(resource_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|err| LarderError::database(err, "Failed to list audit event types"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::storage::{create_pool, Database};

    #[tokio::test]
    async fn append_and_filter_entries() {
        let config = DatabaseConfig { url: "sqlite::memory:".to_string(), ..Default::default() };
        let db = Database::new(create_pool(&config).await.unwrap());
        let actor = UserId::from("u-1");
        let now = Utc::now();

        let mut tx = db.write().await.unwrap();
        append(&mut tx, AuditEvent::new("userCreated", Some(&actor)).resource("user", "u-1"), now)
            .await
            .unwrap();
        append(
            &mut tx,
            AuditEvent::new("webhookCreated", Some(&actor))
                .household(&HouseholdId::from("h-1"))
                .resource("webhook", "w-1")
                .with("name", "deploys"),
            now,
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let mut conn = db.read().await.unwrap();
        let filter = AuditFilter { event_type: Some("webhookCreated".to_string()), ..Default::default() };
        let (entries, filtered, total) = list(&mut conn, &filter, &PageQuery::default()).await.unwrap();
        assert_eq!((filtered, total), (1, 2));
        assert_eq!(entries[0].context["name"], "deploys");
        assert_eq!(entries[0].household_id, Some(HouseholdId::from("h-1")));

        let types = event_types_for(&mut conn, "w-1").await.unwrap();
        assert_eq!(types, vec!["webhookCreated".to_string()]);
    }
}
