//! Bridge kinds: first-class records linking two reference kinds.
//!
//! A bridge projects its endpoints into the `left_id` / `right_id` columns so
//! it can be listed from either side, and is unique per endpoint pair among
//! live records.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::reference::{
    ValidIngredient, ValidIngredientState, ValidInstrument, ValidMeasurementUnit, ValidPreparation, ValidVessel,
};
use crate::auth::authorization::Owner;
use crate::auth::models::SessionContext;
use crate::domain::Timestamps;
use crate::errors::{LarderError, Result};
use crate::kernel::{patch_field, CreateContext, Creatable, Patchable, Reference, Resource, Scope};
use crate::storage::{Document, RecordIndex};

/// A record joining a left and a right reference kind.
pub trait Bridge: Resource {
    type Left: Resource;
    type Right: Resource;

    fn left_id(&self) -> &str;
    fn right_id(&self) -> &str;

    /// Key enforcing one live bridge per endpoint pair.
    fn pair_key(&self) -> String {
        format!("{}:{}", self.left_id(), self.right_id())
    }
}

fn bridge_index<B: Bridge>(bridge: &B) -> RecordIndex {
    RecordIndex {
        left_id: Some(bridge.left_id().to_string()),
        right_id: Some(bridge.right_id().to_string()),
        unique_key: Some(bridge.pair_key()),
        ..Default::default()
    }
}

fn bridge_references<B: Bridge>(bridge: &B, left_field: &'static str, right_field: &'static str) -> Vec<Reference> {
    vec![
        Reference::to::<B::Left>(bridge.left_id(), left_field),
        Reference::to::<B::Right>(bridge.right_id(), right_field),
    ]
}

fn required(id: String, field: &'static str) -> Result<String> {
    let id = id.trim().to_string();
    if id.is_empty() {
        return Err(LarderError::validation_field(format!("{field} is required"), field));
    }
    Ok(id)
}

/// Implement [`Document`], [`Resource`] and [`Bridge`] for a bridge with a
/// plain endpoint-pair key.
macro_rules! bridge_kind {
    (
        $ty:ident, $kind:literal,
        left: $left_field:ident => $left:ty, $left_wire:literal,
        right: $right_field:ident => $right:ty, $right_wire:literal
    ) => {
        impl Document for $ty {
            const KIND: &'static str = $kind;

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
                bridge_index(self)
            }
        }

        impl Resource for $ty {
            const NOUN: &'static str = $kind;
            const SCOPE: Scope = Scope::Global;

            fn owner(&self) -> Owner {
                Owner::System
            }

            fn references(&self) -> Vec<Reference> {
                bridge_references(self, $left_wire, $right_wire)
            }
        }

        impl Bridge for $ty {
            type Left = $left;
            type Right = $right;

            fn left_id(&self) -> &str {
                &self.$left_field
            }

            fn right_id(&self) -> &str {
                &self.$right_field
            }
        }
    };
}

/// Notes-only update shared by most bridges.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BridgeNotesUpdateInput {
    pub notes: Option<String>,
}

// -------------------------------------------------------------------------
// Ingredient <-> measurement unit
// -------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidIngredientMeasurementUnit {
    pub id: String,
    #[serde(rename = "validIngredientID")]
    pub valid_ingredient_id: String,
    #[serde(rename = "validMeasurementUnitID")]
    pub valid_measurement_unit_id: String,
    pub notes: String,
    pub allowable_minimum_quantity: f32,
    pub allowable_maximum_quantity: Option<f32>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

bridge_kind!(
    ValidIngredientMeasurementUnit, "validIngredientMeasurementUnit",
    left: valid_ingredient_id => ValidIngredient, "validIngredientID",
    right: valid_measurement_unit_id => ValidMeasurementUnit, "validMeasurementUnitID"
);

impl ValidIngredientMeasurementUnit {
    fn check_quantities(&self) -> Result<()> {
        if self.allowable_minimum_quantity < 0.0 {
            return Err(LarderError::validation_field(
                "allowableMinimumQuantity cannot be negative",
                "allowableMinimumQuantity",
            ));
        }
        if self.allowable_maximum_quantity.is_some_and(|max| max < self.allowable_minimum_quantity) {
            return Err(LarderError::validation_field(
                "allowableMaximumQuantity is below the minimum",
                "allowableMaximumQuantity",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidIngredientMeasurementUnitCreationInput {
    #[serde(rename = "validIngredientID")]
    pub valid_ingredient_id: String,
    #[serde(rename = "validMeasurementUnitID")]
    pub valid_measurement_unit_id: String,
    pub notes: String,
    pub allowable_minimum_quantity: f32,
    pub allowable_maximum_quantity: Option<f32>,
}

impl Creatable for ValidIngredientMeasurementUnit {
    type Input = ValidIngredientMeasurementUnitCreationInput;

    fn from_input(input: Self::Input, ctx: &CreateContext<'_>) -> Result<Self> {
        let bridge = Self {
            id: ctx.id.clone(),
            valid_ingredient_id: required(input.valid_ingredient_id, "validIngredientID")?,
            valid_measurement_unit_id: required(input.valid_measurement_unit_id, "validMeasurementUnitID")?,
            notes: input.notes,
            allowable_minimum_quantity: input.allowable_minimum_quantity,
            allowable_maximum_quantity: input.allowable_maximum_quantity,
            timestamps: Timestamps::created(ctx.now),
        };
        bridge.check_quantities()?;
        Ok(bridge)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidIngredientMeasurementUnitUpdateInput {
    #[serde(rename = "validIngredientID")]
    pub valid_ingredient_id: Option<String>,
    #[serde(rename = "validMeasurementUnitID")]
    pub valid_measurement_unit_id: Option<String>,
    pub notes: Option<String>,
    pub allowable_minimum_quantity: Option<f32>,
    pub allowable_maximum_quantity: Option<f32>,
}

impl Patchable for ValidIngredientMeasurementUnit {
    type Patch = ValidIngredientMeasurementUnitUpdateInput;

    fn apply_patch(&mut self, patch: Self::Patch, _session: &SessionContext) -> Result<()> {
        if let Some(id) = patch.valid_ingredient_id {
            self.valid_ingredient_id = required(id, "validIngredientID")?;
        }
        if let Some(id) = patch.valid_measurement_unit_id {
            self.valid_measurement_unit_id = required(id, "validMeasurementUnitID")?;
        }
        patch_field(&mut self.notes, patch.notes);
        patch_field(&mut self.allowable_minimum_quantity, patch.allowable_minimum_quantity);
        if patch.allowable_maximum_quantity.is_some() {
            self.allowable_maximum_quantity = patch.allowable_maximum_quantity;
        }
        self.check_quantities()
    }
}

// -------------------------------------------------------------------------
// Ingredient <-> preparation
// -------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidIngredientPreparation {
    pub id: String,
    #[serde(rename = "validIngredientID")]
    pub valid_ingredient_id: String,
    #[serde(rename = "validPreparationID")]
    pub valid_preparation_id: String,
    pub notes: String,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

bridge_kind!(
    ValidIngredientPreparation, "validIngredientPreparation",
    left: valid_ingredient_id => ValidIngredient, "validIngredientID",
    right: valid_preparation_id => ValidPreparation, "validPreparationID"
);

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidIngredientPreparationCreationInput {
    #[serde(rename = "validIngredientID")]
    pub valid_ingredient_id: String,
    #[serde(rename = "validPreparationID")]
    pub valid_preparation_id: String,
    pub notes: String,
}

impl Creatable for ValidIngredientPreparation {
    type Input = ValidIngredientPreparationCreationInput;

    fn from_input(input: Self::Input, ctx: &CreateContext<'_>) -> Result<Self> {
        Ok(Self {
            id: ctx.id.clone(),
            valid_ingredient_id: required(input.valid_ingredient_id, "validIngredientID")?,
            valid_preparation_id: required(input.valid_preparation_id, "validPreparationID")?,
            notes: input.notes,
            timestamps: Timestamps::created(ctx.now),
        })
    }
}

impl Patchable for ValidIngredientPreparation {
    type Patch = BridgeNotesUpdateInput;

    fn apply_patch(&mut self, patch: Self::Patch, _session: &SessionContext) -> Result<()> {
        patch_field(&mut self.notes, patch.notes);
        Ok(())
    }
}

// -------------------------------------------------------------------------
// Ingredient state <-> ingredient
// -------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidIngredientStateIngredient {
    pub id: String,
    #[serde(rename = "validIngredientStateID")]
    pub valid_ingredient_state_id: String,
    #[serde(rename = "validIngredientID")]
    pub valid_ingredient_id: String,
    pub notes: String,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

bridge_kind!(
    ValidIngredientStateIngredient, "validIngredientStateIngredient",
    left: valid_ingredient_state_id => ValidIngredientState, "validIngredientStateID",
    right: valid_ingredient_id => ValidIngredient, "validIngredientID"
);

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidIngredientStateIngredientCreationInput {
    #[serde(rename = "validIngredientStateID")]
    pub valid_ingredient_state_id: String,
    #[serde(rename = "validIngredientID")]
    pub valid_ingredient_id: String,
    pub notes: String,
}

impl Creatable for ValidIngredientStateIngredient {
    type Input = ValidIngredientStateIngredientCreationInput;

    fn from_input(input: Self::Input, ctx: &CreateContext<'_>) -> Result<Self> {
        Ok(Self {
            id: ctx.id.clone(),
            valid_ingredient_state_id: required(input.valid_ingredient_state_id, "validIngredientStateID")?,
            valid_ingredient_id: required(input.valid_ingredient_id, "validIngredientID")?,
            notes: input.notes,
            timestamps: Timestamps::created(ctx.now),
        })
    }
}

impl Patchable for ValidIngredientStateIngredient {
    type Patch = BridgeNotesUpdateInput;

    fn apply_patch(&mut self, patch: Self::Patch, _session: &SessionContext) -> Result<()> {
        patch_field(&mut self.notes, patch.notes);
        Ok(())
    }
}

// -------------------------------------------------------------------------
// Preparation <-> instrument
// -------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidPreparationInstrument {
    pub id: String,
    #[serde(rename = "validPreparationID")]
    pub valid_preparation_id: String,
    #[serde(rename = "validInstrumentID")]
    pub valid_instrument_id: String,
    pub notes: String,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

bridge_kind!(
    ValidPreparationInstrument, "validPreparationInstrument",
    left: valid_preparation_id => ValidPreparation, "validPreparationID",
    right: valid_instrument_id => ValidInstrument, "validInstrumentID"
);

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidPreparationInstrumentCreationInput {
    #[serde(rename = "validPreparationID")]
    pub valid_preparation_id: String,
    #[serde(rename = "validInstrumentID")]
    pub valid_instrument_id: String,
    pub notes: String,
}

impl Creatable for ValidPreparationInstrument {
    type Input = ValidPreparationInstrumentCreationInput;

    fn from_input(input: Self::Input, ctx: &CreateContext<'_>) -> Result<Self> {
        Ok(Self {
            id: ctx.id.clone(),
            valid_preparation_id: required(input.valid_preparation_id, "validPreparationID")?,
            valid_instrument_id: required(input.valid_instrument_id, "validInstrumentID")?,
            notes: input.notes,
            timestamps: Timestamps::created(ctx.now),
        })
    }
}

impl Patchable for ValidPreparationInstrument {
    type Patch = BridgeNotesUpdateInput;

    fn apply_patch(&mut self, patch: Self::Patch, _session: &SessionContext) -> Result<()> {
        patch_field(&mut self.notes, patch.notes);
        Ok(())
    }
}

// -------------------------------------------------------------------------
// Preparation <-> vessel
// -------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidPreparationVessel {
    pub id: String,
    #[serde(rename = "validPreparationID")]
    pub valid_preparation_id: String,
    #[serde(rename = "validVesselID")]
    pub valid_vessel_id: String,
    pub notes: String,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

bridge_kind!(
    ValidPreparationVessel, "validPreparationVessel",
    left: valid_preparation_id => ValidPreparation, "validPreparationID",
    right: valid_vessel_id => ValidVessel, "validVesselID"
);

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidPreparationVesselCreationInput {
    #[serde(rename = "validPreparationID")]
    pub valid_preparation_id: String,
    #[serde(rename = "validVesselID")]
    pub valid_vessel_id: String,
    pub notes: String,
}

impl Creatable for ValidPreparationVessel {
    type Input = ValidPreparationVesselCreationInput;

    fn from_input(input: Self::Input, ctx: &CreateContext<'_>) -> Result<Self> {
        Ok(Self {
            id: ctx.id.clone(),
            valid_preparation_id: required(input.valid_preparation_id, "validPreparationID")?,
            valid_vessel_id: required(input.valid_vessel_id, "validVesselID")?,
            notes: input.notes,
            timestamps: Timestamps::created(ctx.now),
        })
    }
}

impl Patchable for ValidPreparationVessel {
    type Patch = BridgeNotesUpdateInput;

    fn apply_patch(&mut self, patch: Self::Patch, _session: &SessionContext) -> Result<()> {
        patch_field(&mut self.notes, patch.notes);
        Ok(())
    }
}

// -------------------------------------------------------------------------
// Measurement unit conversions
// -------------------------------------------------------------------------

/// `1 from = modifier * to`, optionally only for one ingredient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidMeasurementUnitConversion {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(rename = "onlyForIngredient")]
    pub only_for_ingredient: Option<String>,
    pub modifier: f64,
    pub notes: String,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Document for ValidMeasurementUnitConversion {
    const KIND: &'static str = "validMeasurementUnitConversion";

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
        bridge_index(self)
    }
}

impl Resource for ValidMeasurementUnitConversion {
    const NOUN: &'static str = "validMeasurementUnitConversion";
    const SCOPE: Scope = Scope::Global;

    fn owner(&self) -> Owner {
        Owner::System
    }

    fn references(&self) -> Vec<Reference> {
        let mut references = bridge_references(self, "from", "to");
        references.extend(Reference::optional::<ValidIngredient>(self.only_for_ingredient.as_ref(), "onlyForIngredient"));
        references
    }
}

impl Bridge for ValidMeasurementUnitConversion {
    type Left = ValidMeasurementUnit;
    type Right = ValidMeasurementUnit;

    fn left_id(&self) -> &str {
        &self.from
    }

    fn right_id(&self) -> &str {
        &self.to
    }

    fn pair_key(&self) -> String {
        format!("{}:{}:{}", self.from, self.to, self.only_for_ingredient.as_deref().unwrap_or("*"))
    }
}

impl ValidMeasurementUnitConversion {
    fn check(&self) -> Result<()> {
        if self.from == self.to {
            return Err(LarderError::validation_field("a unit cannot convert to itself", "to"));
        }
        if !(self.modifier.is_finite() && self.modifier > 0.0) {
            return Err(LarderError::validation_field("modifier must be a positive number", "modifier"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidMeasurementUnitConversionCreationInput {
    pub from: String,
    pub to: String,
    #[serde(rename = "onlyForIngredient")]
    pub only_for_ingredient: Option<String>,
    pub modifier: f64,
    pub notes: String,
}

impl Creatable for ValidMeasurementUnitConversion {
    type Input = ValidMeasurementUnitConversionCreationInput;

    fn from_input(input: Self::Input, ctx: &CreateContext<'_>) -> Result<Self> {
        let conversion = Self {
            id: ctx.id.clone(),
            from: required(input.from, "from")?,
            to: required(input.to, "to")?,
            only_for_ingredient: input.only_for_ingredient.filter(|id| !id.is_empty()),
            modifier: input.modifier,
            notes: input.notes,
            timestamps: Timestamps::created(ctx.now),
        };
        conversion.check()?;
        Ok(conversion)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidMeasurementUnitConversionUpdateInput {
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(rename = "onlyForIngredient")]
    pub only_for_ingredient: Option<String>,
    pub modifier: Option<f64>,
    pub notes: Option<String>,
}

impl Patchable for ValidMeasurementUnitConversion {
    type Patch = ValidMeasurementUnitConversionUpdateInput;

    fn apply_patch(&mut self, patch: Self::Patch, _session: &SessionContext) -> Result<()> {
        if let Some(from) = patch.from {
            self.from = required(from, "from")?;
        }
        if let Some(to) = patch.to {
            self.to = required(to, "to")?;
        }
        if let Some(ingredient) = patch.only_for_ingredient {
            self.only_for_ingredient = Some(ingredient).filter(|id| !id.is_empty());
        }
        patch_field(&mut self.modifier, patch.modifier);
        patch_field(&mut self.notes, patch.notes);
        self.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::fixtures::session;
    use crate::auth::models::HouseholdRole;
    use chrono::Utc;

    fn ctx(session: &SessionContext) -> CreateContext<'_> {
        CreateContext { id: "b1".to_string(), owner: Owner::System, parent_id: None, now: Utc::now(), session }
    }

    #[test]
    fn bridges_project_both_endpoints() {
        let admin = session("u1", "h1", HouseholdRole::HouseholdAdmin);
        let input = ValidPreparationVesselCreationInput {
            valid_preparation_id: "p1".to_string(),
            valid_vessel_id: "v1".to_string(),
            notes: String::new(),
        };
        let bridge = ValidPreparationVessel::from_input(input, &ctx(&admin)).unwrap();
        let index = bridge.index();
        assert_eq!(index.left_id.as_deref(), Some("p1"));
        assert_eq!(index.right_id.as_deref(), Some("v1"));
        assert_eq!(index.unique_key.as_deref(), Some("p1:v1"));

        let kinds: Vec<_> = bridge.references().iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![ValidPreparation::KIND, ValidVessel::KIND]);
    }

    #[test]
    fn missing_endpoint_is_a_field_error() {
        let admin = session("u1", "h1", HouseholdRole::HouseholdAdmin);
        let input = ValidIngredientPreparationCreationInput {
            valid_ingredient_id: "i1".to_string(),
            ..Default::default()
        };
        let err = ValidIngredientPreparation::from_input(input, &ctx(&admin)).unwrap_err();
        assert!(err.to_string().contains("validPreparationID"));
    }

    #[test]
    fn conversions_are_keyed_per_ingredient_and_checked() {
        let admin = session("u1", "h1", HouseholdRole::HouseholdAdmin);
        let input = ValidMeasurementUnitConversionCreationInput {
            from: "cup".to_string(),
            to: "ml".to_string(),
            modifier: 236.6,
            ..Default::default()
        };
        let conversion = ValidMeasurementUnitConversion::from_input(input.clone(), &ctx(&admin)).unwrap();
        assert_eq!(conversion.pair_key(), "cup:ml:*");

        let flour = ValidMeasurementUnitConversionCreationInput {
            only_for_ingredient: Some("flour".to_string()),
            modifier: 120.0,
            ..input.clone()
        };
        let flour = ValidMeasurementUnitConversion::from_input(flour, &ctx(&admin)).unwrap();
        assert_eq!(flour.pair_key(), "cup:ml:flour");
        assert_eq!(flour.references().len(), 3);

        let zero = ValidMeasurementUnitConversionCreationInput { modifier: 0.0, ..input.clone() };
        assert!(ValidMeasurementUnitConversion::from_input(zero, &ctx(&admin)).is_err());
        let same = ValidMeasurementUnitConversionCreationInput { to: "cup".to_string(), ..input };
        assert!(ValidMeasurementUnitConversion::from_input(same, &ctx(&admin)).is_err());
    }

    #[test]
    fn quantity_band_is_checked_on_patch() {
        let admin = session("u1", "h1", HouseholdRole::HouseholdAdmin);
        let mut bridge = ValidIngredientMeasurementUnit::from_input(
            ValidIngredientMeasurementUnitCreationInput {
                valid_ingredient_id: "i1".to_string(),
                valid_measurement_unit_id: "m1".to_string(),
                allowable_minimum_quantity: 1.0,
                allowable_maximum_quantity: Some(10.0),
                ..Default::default()
            },
            &ctx(&admin),
        )
        .unwrap();

        let patch = ValidIngredientMeasurementUnitUpdateInput { allowable_minimum_quantity: Some(20.0), ..Default::default() };
        assert!(bridge.apply_patch(patch, &admin).is_err());
    }
}
