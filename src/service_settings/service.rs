use sqlx::SqliteConnection;
use tracing::instrument;
use validator::Validate;

use super::models::{
    ServiceSetting, ServiceSettingConfiguration, ServiceSettingConfigurationCreationInput,
    ServiceSettingConfigurationUpdateInput, ServiceSettingCreationInput, ServiceSettingUpdateInput, SettingType,
};
use crate::auth::authorization::{authorize, authorize_household, require_service_admin, Action, Owner, Target};
use crate::auth::models::SessionContext;
use crate::domain::{new_record_id, Page, PageQuery, Timestamps};
use crate::errors::{LarderError, Result};
use crate::kernel::{name_key, Kernel};
use crate::storage::{records, Column, Document, RecordFilter};

#[derive(Debug, Clone)]
pub struct ServiceSettingService {
    kernel: Kernel,
}

impl ServiceSettingService {
    pub fn new(kernel: Kernel) -> Self {
        Self { kernel }
    }

    async fn live_setting_in(conn: &mut SqliteConnection, id: &str) -> Result<ServiceSetting> {
        records::fetch_live(conn, id).await?.ok_or_else(|| {
            LarderError::validation_field(format!("serviceSettingID references unknown setting '{id}'"), "serviceSettingID")
        })
    }

    /// Who a configuration of `setting` belongs to, and whether the session may write it.
    fn configuration_owner(session: &SessionContext, setting: &ServiceSetting) -> Result<Owner> {
        match setting.setting_type {
            SettingType::User => {
                if setting.admins_only {
                    require_service_admin(session)?;
                }
                Ok(Owner::User(session.user_id.clone()))
            }
            SettingType::Household => {
                let household = session.active_household()?.clone();
                if setting.admins_only {
                    authorize_household(session, Action::UpdateHousehold, &household)?;
                }
                Ok(Owner::Household(household))
            }
        }
    }

    // ---------------------------------------------------------------------
    // Settings
    // ---------------------------------------------------------------------

    pub async fn create(&self, session: &SessionContext, input: ServiceSettingCreationInput) -> Result<ServiceSetting> {
        self.kernel.create::<ServiceSetting>(session, input).await
    }

    pub async fn get(&self, session: &SessionContext, id: &str) -> Result<ServiceSetting> {
        self.kernel.get(session, id).await
    }

    pub async fn list(&self, session: &SessionContext, query: PageQuery) -> Result<Page<ServiceSetting>> {
        self.kernel.list(session, query).await
    }

    pub async fn search(&self, session: &SessionContext, query: &str, limit: u32) -> Result<Vec<ServiceSetting>> {
        self.kernel.search(session, query, limit).await
    }

    pub async fn update(&self, session: &SessionContext, id: &str, patch: ServiceSettingUpdateInput) -> Result<ServiceSetting> {
        self.kernel.update::<ServiceSetting>(session, id, patch).await
    }

    pub async fn archive(&self, session: &SessionContext, id: &str) -> Result<ServiceSetting> {
        self.kernel.archive::<ServiceSetting>(session, id).await
    }

    // ---------------------------------------------------------------------
    // Configurations
    // ---------------------------------------------------------------------

    #[instrument(skip(self, session, input), fields(user_id = %session.user_id))]
    pub async fn create_configuration(
        &self,
        session: &SessionContext,
        input: ServiceSettingConfigurationCreationInput,
    ) -> Result<ServiceSettingConfiguration> {
        input.validate()?;
        let mut tx = self.kernel.db().write().await?;
        let setting = Self::live_setting_in(&mut tx, &input.service_setting_id).await?;
        setting.check_value(&input.value)?;
        let owner = Self::configuration_owner(session, &setting)?;
        authorize(session, Action::Create, Target { kind: ServiceSettingConfiguration::KIND, id: "new", owner: &owner })?;

        let configuration = ServiceSettingConfiguration {
            id: new_record_id(),
            service_setting_id: setting.id.clone(),
            value: input.value,
            notes: input.notes,
            belongs_to_user: owner.user_id().cloned(),
            belongs_to_household: owner.household_id().cloned(),
            timestamps: Timestamps::created(self.kernel.now()),
        };
        let change = self.kernel.insert_in(&mut tx, Some(&session.user_id), &configuration).await?;
        tx.commit().await?;

        self.kernel.changes().publish(change);
        Ok(configuration)
    }

    pub async fn get_configuration(&self, session: &SessionContext, id: &str) -> Result<ServiceSettingConfiguration> {
        self.kernel.get(session, id).await
    }

    /// The session user's own configurations.
    pub async fn list_user_configurations(
        &self,
        session: &SessionContext,
        query: PageQuery,
    ) -> Result<Page<ServiceSettingConfiguration>> {
        let filter = RecordFilter::scoped(Column::UserId, session.user_id.as_str());
        self.kernel.list_filtered(session, filter, query).await
    }

    /// Configurations of the active household.
    pub async fn list_household_configurations(
        &self,
        session: &SessionContext,
        query: PageQuery,
    ) -> Result<Page<ServiceSettingConfiguration>> {
        let filter = RecordFilter::scoped(Column::HouseholdId, session.active_household()?.as_str());
        self.kernel.list_filtered(session, filter, query).await
    }

    /// The session's configuration of the setting called `name`.
    pub async fn configuration_for_setting(&self, session: &SessionContext, name: &str) -> Result<ServiceSettingConfiguration> {
        let mut conn = self.kernel.db().read().await?;
        let setting: ServiceSetting = records::find_by(&mut conn, Column::UniqueKey, &name_key(name))
            .await?
            .ok_or_else(|| LarderError::not_found(ServiceSetting::KIND, name))?;

        let scope = match setting.setting_type {
            SettingType::User => format!("user:{}", session.user_id),
            SettingType::Household => format!("household:{}", session.active_household()?),
        };
        records::find_by(&mut conn, Column::UniqueKey, &format!("{}:{scope}", setting.id))
            .await?
            .ok_or_else(|| LarderError::not_found(ServiceSettingConfiguration::KIND, name))
    }

    pub async fn update_configuration(
        &self,
        session: &SessionContext,
        id: &str,
        patch: ServiceSettingConfigurationUpdateInput,
    ) -> Result<ServiceSettingConfiguration> {
        patch.validate()?;
        let mut tx = self.kernel.db().write().await?;
        let mut configuration: ServiceSettingConfiguration =
            Kernel::load_for(&mut tx, session, id, Action::Update).await?;
        let setting = Self::live_setting_in(&mut tx, &configuration.service_setting_id).await?;
        Self::configuration_owner(session, &setting)?;

        if let Some(value) = patch.value {
            setting.check_value(&value)?;
            configuration.value = value;
        }
        if let Some(notes) = patch.notes {
            configuration.notes = notes;
        }
        let change = self.kernel.update_in(&mut tx, Some(&session.user_id), &mut configuration).await?;
        tx.commit().await?;

        self.kernel.changes().publish(change);
        Ok(configuration)
    }

    pub async fn archive_configuration(&self, session: &SessionContext, id: &str) -> Result<ServiceSettingConfiguration> {
        let mut tx = self.kernel.db().write().await?;
        let mut configuration: ServiceSettingConfiguration =
            Kernel::load_for(&mut tx, session, id, Action::Archive).await?;
        if let Some(setting) = records::fetch_live::<ServiceSetting>(&mut tx, &configuration.service_setting_id).await? {
            Self::configuration_owner(session, &setting)?;
        }
        let change = self.kernel.archive_in(&mut tx, Some(&session.user_id), &mut configuration).await?;
        tx.commit().await?;

        self.kernel.changes().publish(change);
        Ok(configuration)
    }
}
