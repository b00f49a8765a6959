//! Generic lifecycle operations over any [`Resource`].

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::instrument;
use validator::Validate;

use super::{references, ChangeEvent, ChangeFeed, CreateContext, Creatable, Patchable, Resource, Scope};
use crate::auth::authorization::{authorize, Action, Owner, Target};
use crate::auth::models::SessionContext;
use crate::clock::SharedClock;
use crate::domain::{new_record_id, Page, PageQuery, UserId};
use crate::errors::{LarderError, Result};
use crate::storage::audit_log::{self, AuditEvent};
use crate::storage::{records, Column, Database, RecordFilter};

pub const CREATED: &str = "Created";
pub const UPDATED: &str = "Updated";
pub const ARCHIVED: &str = "Archived";

/// Shared handle the services are built on.
#[derive(Debug, Clone)]
pub struct Kernel {
    db: Database,
    clock: SharedClock,
    changes: ChangeFeed,
}

impl Kernel {
    pub fn new(db: Database, clock: SharedClock, changes: ChangeFeed) -> Self {
        Self { db, clock, changes }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn changes(&self) -> &ChangeFeed {
        &self.changes
    }

    // ---------------------------------------------------------------------
    // Transaction-level building blocks
    // ---------------------------------------------------------------------

    /// Load a record the principal may act on.
    ///
    /// Missing, out-of-tenant and archived records all read as `notFound`;
    /// service admins may still read archived records.
    pub async fn load_for<R: Resource>(
        conn: &mut SqliteConnection,
        session: &SessionContext,
        id: &str,
        action: Action,
    ) -> Result<R> {
        let row = records::fetch_row(conn, R::KIND, id)
            .await?
            .ok_or_else(|| LarderError::not_found(R::KIND, id))?;

        if row.is_archived() && (action.is_write() || !session.is_service_admin()) {
            return Err(LarderError::not_found(R::KIND, id));
        }

        let record: R = row.decode()?;
        let owner = record.owner();
        authorize(session, action, Target { kind: R::KIND, id, owner: &owner })?;
        Ok(record)
    }

    /// Load a child record and check it hangs off `parent_id`.
    pub async fn load_child_for<P: Resource, R: Resource>(
        conn: &mut SqliteConnection,
        session: &SessionContext,
        parent_id: &str,
        id: &str,
        action: Action,
    ) -> Result<R> {
        Self::load_for::<P>(conn, session, parent_id, Action::Read).await?;
        let record: R = Self::load_for(conn, session, id, action).await?;
        if record.index().parent_id.as_deref() != Some(parent_id) {
            return Err(LarderError::not_found(R::KIND, id));
        }
        Ok(record)
    }

    /// Append the journal entry for a transition and build its change event.
    pub async fn journal_in<R: Resource>(
        &self,
        conn: &mut SqliteConnection,
        actor: Option<&UserId>,
        record: &R,
        verb: &str,
    ) -> Result<ChangeEvent> {
        let event_type = format!("{}{}", R::NOUN, verb);
        self.journal_as_in(conn, actor, record, &event_type).await
    }

    /// Journal under a fully spelled-out event type (`userAddedToHousehold`).
    pub async fn journal_as_in<R: Resource>(
        &self,
        conn: &mut SqliteConnection,
        actor: Option<&UserId>,
        record: &R,
        event_type: &str,
    ) -> Result<ChangeEvent> {
        let now = self.now();
        let owner = record.owner();

        let mut event = AuditEvent::new(event_type, actor).resource(R::KIND, record.id());
        if let Owner::Household(household_id) = &owner {
            event = event.household(household_id);
        }
        if let Owner::User(user_id) = &owner {
            event = event.with("belongsToUser", user_id.as_str());
        }
        audit_log::append(conn, event, now).await?;

        Ok(ChangeEvent {
            event_type: event_type.to_string(),
            resource_kind: R::KIND.to_string(),
            resource_id: record.id().to_string(),
            household_id: owner.household_id().cloned(),
            user_id: actor.cloned(),
            data: serde_json::to_value(record)?,
            occurred_at: now,
        })
    }

    /// Check references, insert and journal a new record.
    pub async fn insert_in<R: Resource>(
        &self,
        conn: &mut SqliteConnection,
        actor: Option<&UserId>,
        record: &R,
    ) -> Result<ChangeEvent> {
        references::verify(conn, &record.owner(), &record.references()).await?;
        records::insert(conn, record).await?;
        self.journal_in(conn, actor, record, CREATED).await
    }

    /// Check references, stamp `lastUpdatedAt`, persist and journal.
    pub async fn update_in<R: Resource>(
        &self,
        conn: &mut SqliteConnection,
        actor: Option<&UserId>,
        record: &mut R,
    ) -> Result<ChangeEvent> {
        references::verify(conn, &record.owner(), &record.references()).await?;
        record.timestamps_mut().touch(self.now());
        records::save(conn, record).await?;
        self.journal_in(conn, actor, record, UPDATED).await
    }

    /// Persist a state transition under a custom journal verb, without
    /// re-checking references.
    pub async fn transition_in<R: Resource>(
        &self,
        conn: &mut SqliteConnection,
        actor: Option<&UserId>,
        record: &mut R,
        verb: &str,
    ) -> Result<ChangeEvent> {
        let event_type = format!("{}{}", R::NOUN, verb);
        self.transition_as_in(conn, actor, record, &event_type).await
    }

    /// [`Kernel::transition_in`] under a fully spelled-out event type.
    pub async fn transition_as_in<R: Resource>(
        &self,
        conn: &mut SqliteConnection,
        actor: Option<&UserId>,
        record: &mut R,
        event_type: &str,
    ) -> Result<ChangeEvent> {
        record.timestamps_mut().touch(self.now());
        records::save(conn, record).await?;
        self.journal_as_in(conn, actor, record, event_type).await
    }

    /// Soft-archive and journal.
    pub async fn archive_in<R: Resource>(
        &self,
        conn: &mut SqliteConnection,
        actor: Option<&UserId>,
        record: &mut R,
    ) -> Result<ChangeEvent> {
        record.timestamps_mut().archive(self.now());
        records::save(conn, record).await?;
        self.journal_in(conn, actor, record, ARCHIVED).await
    }

    /// Owner a new record of kind `R` gets from the session.
    pub fn owner_for_new<R: Resource>(session: &SessionContext) -> Result<Owner> {
        Ok(match R::SCOPE {
            Scope::Global => Owner::System,
            Scope::User => Owner::User(session.user_id.clone()),
            Scope::Household => Owner::Household(session.active_household()?.clone()),
        })
    }

    /// Listing filter confining `R` to what the session may see.
    pub fn scope_filter<R: Resource>(session: &SessionContext) -> Result<RecordFilter> {
        Ok(match R::SCOPE {
            Scope::Global => RecordFilter::all(),
            Scope::User => RecordFilter::scoped(Column::UserId, session.user_id.as_str()),
            Scope::Household => {
                RecordFilter::scoped(Column::HouseholdId, session.active_household()?.as_str())
            }
        })
    }

    // ---------------------------------------------------------------------
    // Uniform contract
    // ---------------------------------------------------------------------

    #[instrument(skip(self, session, input), fields(kind = R::KIND, user_id = %session.user_id))]
    pub async fn create<R: Creatable>(&self, session: &SessionContext, input: R::Input) -> Result<R> {
        input.validate()?;
        let owner = Self::owner_for_new::<R>(session)?;
        authorize(session, Action::Create, Target { kind: R::KIND, id: "new", owner: &owner })?;

        let mut tx = self.db.write().await?;
        let ctx = CreateContext { id: new_record_id(), owner, parent_id: None, now: self.now(), session };
        let record = R::from_input(input, &ctx)?;
        let event = self.insert_in(&mut tx, Some(&session.user_id), &record).await?;
        tx.commit().await?;

        self.changes.publish(event);
        Ok(record)
    }

    #[instrument(skip(self, session, input), fields(kind = R::KIND, parent_id = %parent_id))]
    pub async fn create_child<P: Resource, R: Creatable>(
        &self,
        session: &SessionContext,
        parent_id: &str,
        input: R::Input,
    ) -> Result<R> {
        input.validate()?;
        let mut tx = self.db.write().await?;
        let parent: P = Self::load_for(&mut tx, session, parent_id, Action::Read).await?;
        let owner = parent.owner();
        authorize(session, Action::Create, Target { kind: R::KIND, id: "new", owner: &owner })?;

        let ctx = CreateContext {
            id: new_record_id(),
            owner,
            parent_id: Some(parent_id.to_string()),
            now: self.now(),
            session,
        };
        let record = R::from_input(input, &ctx)?;
        let event = self.insert_in(&mut tx, Some(&session.user_id), &record).await?;
        tx.commit().await?;

        self.changes.publish(event);
        Ok(record)
    }

    pub async fn get<R: Resource>(&self, session: &SessionContext, id: &str) -> Result<R> {
        let mut conn = self.db.read().await?;
        Self::load_for(&mut conn, session, id, Action::Read).await
    }

    pub async fn get_child<P: Resource, R: Resource>(
        &self,
        session: &SessionContext,
        parent_id: &str,
        id: &str,
    ) -> Result<R> {
        let mut conn = self.db.read().await?;
        Self::load_child_for::<P, R>(&mut conn, session, parent_id, id, Action::Read).await
    }

    /// `false` wherever `get` would answer `notFound`.
    pub async fn exists<R: Resource>(&self, session: &SessionContext, id: &str) -> Result<bool> {
        match self.get::<R>(session, id).await {
            Ok(_) => Ok(true),
            Err(LarderError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    #[instrument(skip(self, session, query), fields(kind = R::KIND, user_id = %session.user_id))]
    pub async fn list<R: Resource>(&self, session: &SessionContext, query: PageQuery) -> Result<Page<R>> {
        let filter = Self::scope_filter::<R>(session)?;
        self.list_filtered(session, filter, query).await
    }

    pub async fn list_children<P: Resource, R: Resource>(
        &self,
        session: &SessionContext,
        parent_id: &str,
        query: PageQuery,
    ) -> Result<Page<R>> {
        let mut conn = self.db.read().await?;
        Self::load_for::<P>(&mut conn, session, parent_id, Action::Read).await?;
        drop(conn);

        let filter = Self::scope_filter::<R>(session)?.and_scope(Column::ParentId, parent_id);
        self.list_filtered(session, filter, query).await
    }

    /// List within the session's scope, narrowed to `column = value`.
    pub async fn list_by<R: Resource>(
        &self,
        session: &SessionContext,
        column: Column,
        value: &str,
        query: PageQuery,
    ) -> Result<Page<R>> {
        let filter = Self::scope_filter::<R>(session)?.narrow(column, value);
        self.list_filtered(session, filter, query).await
    }

    pub async fn list_filtered<R: Resource>(
        &self,
        session: &SessionContext,
        filter: RecordFilter,
        query: PageQuery,
    ) -> Result<Page<R>> {
        let query = query.restricted(session.is_service_admin());
        let mut conn = self.db.read().await?;
        let (items, filtered, total) = records::list_page::<R>(&mut conn, &filter, &query).await?;
        Ok(Page::new(items, &query, filtered, total))
    }

    #[instrument(skip(self, session, patch), fields(kind = R::KIND, id = %id))]
    pub async fn update<R: Patchable>(&self, session: &SessionContext, id: &str, patch: R::Patch) -> Result<R> {
        patch.validate()?;
        let mut tx = self.db.write().await?;
        let mut record: R = Self::load_for(&mut tx, session, id, Action::Update).await?;
        record.apply_patch(patch, session)?;
        let event = self.update_in(&mut tx, Some(&session.user_id), &mut record).await?;
        tx.commit().await?;

        self.changes.publish(event);
        Ok(record)
    }

    #[instrument(skip(self, session, patch), fields(kind = R::KIND, id = %id))]
    pub async fn update_child<P: Resource, R: Patchable>(
        &self,
        session: &SessionContext,
        parent_id: &str,
        id: &str,
        patch: R::Patch,
    ) -> Result<R> {
        patch.validate()?;
        let mut tx = self.db.write().await?;
        let mut record: R = Self::load_child_for::<P, R>(&mut tx, session, parent_id, id, Action::Update).await?;
        record.apply_patch(patch, session)?;
        let event = self.update_in(&mut tx, Some(&session.user_id), &mut record).await?;
        tx.commit().await?;

        self.changes.publish(event);
        Ok(record)
    }

    /// Archive a record. Archiving an already archived record is `notFound`.
    #[instrument(skip(self, session), fields(kind = R::KIND, id = %id))]
    pub async fn archive<R: Resource>(&self, session: &SessionContext, id: &str) -> Result<R> {
        let mut tx = self.db.write().await?;
        let mut record: R = Self::load_for(&mut tx, session, id, Action::Archive).await?;
        let event = self.archive_in(&mut tx, Some(&session.user_id), &mut record).await?;
        tx.commit().await?;

        self.changes.publish(event);
        Ok(record)
    }

    pub async fn archive_child<P: Resource, R: Resource>(
        &self,
        session: &SessionContext,
        parent_id: &str,
        id: &str,
    ) -> Result<R> {
        let mut tx = self.db.write().await?;
        let mut record: R = Self::load_child_for::<P, R>(&mut tx, session, parent_id, id, Action::Archive).await?;
        let event = self.archive_in(&mut tx, Some(&session.user_id), &mut record).await?;
        tx.commit().await?;

        self.changes.publish(event);
        Ok(record)
    }

    /// Name-indexed prefix/token search, filtered to what the session may read.
    pub async fn search<R: Resource>(&self, session: &SessionContext, query: &str, limit: u32) -> Result<Vec<R>> {
        if query.trim().is_empty() {
            return Err(LarderError::validation_field("search query cannot be empty", "q"));
        }
        let limit = limit.clamp(1, crate::domain::pagination::MAX_LIMIT);
        let mut conn = self.db.read().await?;
        let found = records::search::<R>(&mut conn, query, limit).await?;

        Ok(found
            .into_iter()
            .filter(|record| {
                let owner = record.owner();
                authorize(session, Action::Read, Target { kind: R::KIND, id: record.id(), owner: &owner }).is_ok()
            })
            .collect())
    }
}
