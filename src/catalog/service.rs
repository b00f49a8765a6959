use tracing::{info, instrument};

use super::bridges::Bridge;
use crate::auth::models::SessionContext;
use crate::domain::{Page, PageQuery};
use crate::errors::Result;
use crate::kernel::{Creatable, Kernel, Patchable, Resource};
use crate::storage::Column;

/// Reference data and bridges. Every kind is global: reads are open to any
/// principal and writes are reserved for service admins by the authorization
/// evaluator.
#[derive(Debug, Clone)]
pub struct CatalogService {
    kernel: Kernel,
}

impl CatalogService {
    pub fn new(kernel: Kernel) -> Self {
        Self { kernel }
    }

    #[instrument(skip(self, session, input), fields(kind = R::KIND))]
    pub async fn create<R: Creatable>(&self, session: &SessionContext, input: R::Input) -> Result<R> {
        let record = self.kernel.create::<R>(session, input).await?;
        info!(kind = R::KIND, id = %record.id(), "catalog record created");
        Ok(record)
    }

    pub async fn get<R: Resource>(&self, session: &SessionContext, id: &str) -> Result<R> {
        self.kernel.get(session, id).await
    }

    pub async fn exists<R: Resource>(&self, session: &SessionContext, id: &str) -> Result<bool> {
        self.kernel.exists::<R>(session, id).await
    }

    pub async fn list<R: Resource>(&self, session: &SessionContext, query: PageQuery) -> Result<Page<R>> {
        self.kernel.list(session, query).await
    }

    pub async fn update<R: Patchable>(&self, session: &SessionContext, id: &str, patch: R::Patch) -> Result<R> {
        self.kernel.update::<R>(session, id, patch).await
    }

    pub async fn archive<R: Resource>(&self, session: &SessionContext, id: &str) -> Result<R> {
        self.kernel.archive::<R>(session, id).await
    }

    pub async fn search<R: Resource>(&self, session: &SessionContext, query: &str, limit: u32) -> Result<Vec<R>> {
        self.kernel.search(session, query, limit).await
    }

    /// Live bridges whose left endpoint is `left_id`.
    pub async fn bridges_for_left<B: Bridge>(
        &self,
        session: &SessionContext,
        left_id: &str,
        query: PageQuery,
    ) -> Result<Page<B>> {
        self.kernel.get::<B::Left>(session, left_id).await?;
        self.kernel.list_by::<B>(session, Column::LeftId, left_id, query).await
    }

    /// Live bridges whose right endpoint is `right_id`.
    pub async fn bridges_for_right<B: Bridge>(
        &self,
        session: &SessionContext,
        right_id: &str,
        query: PageQuery,
    ) -> Result<Page<B>> {
        self.kernel.get::<B::Right>(session, right_id).await?;
        self.kernel.list_by::<B>(session, Column::RightId, right_id, query).await
    }
}
