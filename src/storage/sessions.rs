//! Session rows backing cookie and bearer sessions.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};

use crate::domain::{HouseholdId, SessionId, UserId};
use crate::errors::{LarderError, Result};
use crate::storage::records::from_millis;

/// How a session was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthKind {
    Cookie,
    Bearer,
}

impl AuthKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthKind::Cookie => "cookie",
            AuthKind::Bearer => "bearer",
        }
    }

    fn parse(value: &str) -> Result<Self> {
        match value {
            "cookie" => Ok(AuthKind::Cookie),
            "bearer" => Ok(AuthKind::Bearer),
            other => Err(LarderError::internal(format!("Unknown session kind '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: SessionId,
    pub user_id: UserId,
    pub active_household_id: Option<HouseholdId>,
    pub auth_kind: AuthKind,
    pub secret_hash: String,
    pub api_client_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

#[derive(Debug, FromRow)]
struct SessionRow {
    id: String,
    user_id: String,
    active_household_id: Option<String>,
    auth_kind: String,
    secret_hash: String,
    api_client_id: Option<String>,
    created_at: i64,
    expires_at: i64,
    revoked_at: Option<i64>,
}

impl TryFrom<SessionRow> for SessionRecord {
    type Error = LarderError;

    fn try_from(row: SessionRow) -> Result<Self> {
        Ok(Self {
            id: SessionId::from_string(row.id),
            user_id: UserId::from_string(row.user_id),
            active_household_id: row.active_household_id.map(HouseholdId::from_string),
            auth_kind: AuthKind::parse(&row.auth_kind)?,
            secret_hash: row.secret_hash,
            api_client_id: row.api_client_id,
            created_at: from_millis(row.created_at),
            expires_at: from_millis(row.expires_at),
            revoked_at: row.revoked_at.map(from_millis),
        })
    }
}

pub async fn insert_session(conn: &mut SqliteConnection, session: &SessionRecord) -> Result<()> {
    sqlx::query(
        "INSERT INTO sessions (id, user_id, active_household_id, auth_kind, secret_hash, \
         api_client_id, created_at, expires_at, revoked_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(&session.id)
    .bind(&session.user_id)
    .bind(session.active_household_id.as_ref())
    .bind(session.auth_kind.as_str())
    .bind(&session.secret_hash)
    .bind(session.api_client_id.as_deref())
    .bind(session.created_at.timestamp_millis())
    .bind(session.expires_at.timestamp_millis())
    .bind(session.revoked_at.map(|at| at.timestamp_millis()))
    .execute(&mut *conn)
    .await
    .map_err(|e| LarderError::database(e, "Failed to insert session"))?;
    Ok(())
}

pub async fn find_session(conn: &mut SqliteConnection, id: &SessionId) -> Result<Option<SessionRecord>> {
    let row = sqlx::query_as::<_, SessionRow>(
        "SELECT id, user_id, active_household_id, auth_kind, secret_hash, api_client_id, \
         created_at, expires_at, revoked_at FROM sessions WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| LarderError::database(e, "Failed to fetch session"))?;

    row.map(SessionRecord::try_from).transpose()
}

pub async fn set_active_household(
    conn: &mut SqliteConnection,
    id: &SessionId,
    household_id: &HouseholdId,
) -> Result<()> {
    sqlx::query("UPDATE sessions SET active_household_id = $1 WHERE id = $2")
        .bind(household_id)
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(|e| LarderError::database(e, "Failed to switch session household"))?;
    Ok(())
}

pub async fn revoke_session(conn: &mut SqliteConnection, id: &SessionId, now: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE sessions SET revoked_at = $1 WHERE id = $2 AND revoked_at IS NULL")
        .bind(now.timestamp_millis())
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(|e| LarderError::database(e, "Failed to revoke session"))?;
    Ok(())
}

/// Revoke every live session of a user (archive, ban).
pub async fn revoke_user_sessions(conn: &mut SqliteConnection, user_id: &UserId, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("UPDATE sessions SET revoked_at = $1 WHERE user_id = $2 AND revoked_at IS NULL")
        .bind(now.timestamp_millis())
        .bind(user_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| LarderError::database(e, "Failed to revoke user sessions"))?;
    Ok(result.rows_affected())
}

/// Revoke sessions minted from an API client.
pub async fn revoke_client_sessions(conn: &mut SqliteConnection, api_client_id: &str, now: DateTime<Utc>) -> Result<u64> {
    let result =
        sqlx::query("UPDATE sessions SET revoked_at = $1 WHERE api_client_id = $2 AND revoked_at IS NULL")
            .bind(now.timestamp_millis())
            .bind(api_client_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| LarderError::database(e, "Failed to revoke client sessions"))?;
    Ok(result.rows_affected())
}

/// Delete sessions that expired before the cutoff.
pub async fn purge_expired(conn: &mut SqliteConnection, cutoff: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at < $1")
        .bind(cutoff.timestamp_millis())
        .execute(&mut *conn)
        .await
        .map_err(|e| LarderError::database(e, "Failed to purge sessions"))?;
    Ok(result.rows_affected())
}
