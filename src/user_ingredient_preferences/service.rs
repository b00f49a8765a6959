use super::models::{
    UserIngredientPreference, UserIngredientPreferenceCreationInput, UserIngredientPreferenceUpdateInput,
};
use crate::auth::models::SessionContext;
use crate::domain::{Page, PageQuery};
use crate::errors::Result;
use crate::kernel::Kernel;
use crate::storage::{Column, RecordFilter};

#[derive(Debug, Clone)]
pub struct UserIngredientPreferenceService {
    kernel: Kernel,
}

impl UserIngredientPreferenceService {
    pub fn new(kernel: Kernel) -> Self {
        Self { kernel }
    }

    pub async fn create(
        &self,
        session: &SessionContext,
        input: UserIngredientPreferenceCreationInput,
    ) -> Result<UserIngredientPreference> {
        self.kernel.create::<UserIngredientPreference>(session, input).await
    }

    pub async fn get(&self, session: &SessionContext, id: &str) -> Result<UserIngredientPreference> {
        self.kernel.get(session, id).await
    }

    /// The session user's preferences.
    pub async fn list(&self, session: &SessionContext, query: PageQuery) -> Result<Page<UserIngredientPreference>> {
        let filter = RecordFilter::scoped(Column::UserId, session.user_id.as_str());
        self.kernel.list_filtered(session, filter, query).await
    }

    pub async fn update(
        &self,
        session: &SessionContext,
        id: &str,
        patch: UserIngredientPreferenceUpdateInput,
    ) -> Result<UserIngredientPreference> {
        self.kernel.update::<UserIngredientPreference>(session, id, patch).await
    }

    pub async fn archive(&self, session: &SessionContext, id: &str) -> Result<UserIngredientPreference> {
        self.kernel.archive::<UserIngredientPreference>(session, id).await
    }
}
