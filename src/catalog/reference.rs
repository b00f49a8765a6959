//! Global reference kinds: ingredients, preparations, measurement units,
//! instruments, vessels, ingredient states and ingredient groups.
//!
//! Each kind is unique by name and by slug among live records. Only service
//! admins create, update or archive them; everyone may read.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::slugify;
use crate::auth::authorization::Owner;
use crate::auth::models::SessionContext;
use crate::domain::Timestamps;
use crate::errors::{LarderError, Result};
use crate::kernel::{name_key, patch_field, CreateContext, Creatable, Patchable, Reference, Resource, Scope};
use crate::storage::{Document, RecordIndex};

/// Implement [`Document`] and [`Resource`] for a named, slugged global kind.
macro_rules! reference_kind {
    ($ty:ident, $kind:literal) => {
        reference_kind!($ty, $kind, |_record| Vec::new());
    };
    ($ty:ident, $kind:literal, |$record:ident| $references:expr) => {
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
                RecordIndex {
                    search_key: Some(name_key(&self.name)),
                    unique_key: Some(name_key(&self.name)),
                    secondary_key: Some(self.slug.clone()),
                    ..Default::default()
                }
            }
        }

        impl Resource for $ty {
            const NOUN: &'static str = $kind;
            const SCOPE: Scope = Scope::Global;

            fn owner(&self) -> Owner {
                Owner::System
            }

            fn references(&self) -> Vec<Reference> {
                let $record = self;
                $references
            }
        }
    };
}

fn slug_or_name(slug: Option<String>, name: &str) -> String {
    slug.map(|slug| slug.trim().to_lowercase()).filter(|slug| !slug.is_empty()).unwrap_or_else(|| slugify(name))
}

fn patch_slug(target: &mut String, slug: Option<String>) -> Result<()> {
    if let Some(slug) = slug {
        let slug = slug.trim().to_lowercase();
        if slug.is_empty() {
            return Err(LarderError::validation_field("slug cannot be empty", "slug"));
        }
        *target = slug;
    }
    Ok(())
}

// -------------------------------------------------------------------------
// Ingredients
// -------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidIngredient {
    pub id: String,
    pub name: String,
    pub plural_name: String,
    pub description: String,
    pub warning: String,
    pub icon_path: String,
    pub slug: String,
    pub storage_instructions: String,
    pub shopping_suggestions: String,
    pub minimum_ideal_storage_temperature_in_celsius: Option<f32>,
    pub maximum_ideal_storage_temperature_in_celsius: Option<f32>,
    pub contains_dairy: bool,
    pub contains_egg: bool,
    pub contains_fish: bool,
    pub contains_gluten: bool,
    pub contains_peanut: bool,
    pub contains_sesame: bool,
    pub contains_shellfish: bool,
    pub contains_soy: bool,
    pub contains_tree_nut: bool,
    pub contains_wheat: bool,
    pub contains_alcohol: bool,
    pub animal_flesh: bool,
    pub animal_derived: bool,
    pub is_liquid: bool,
    pub is_measured_volumetrically: bool,
    pub restrict_to_preparations: bool,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

reference_kind!(ValidIngredient, "validIngredient");

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidIngredientCreationInput {
    #[validate(length(min = 1, max = 256, message = "name is required"))]
    pub name: String,
    pub plural_name: String,
    pub description: String,
    pub warning: String,
    pub icon_path: String,
    pub slug: Option<String>,
    pub storage_instructions: String,
    pub shopping_suggestions: String,
    pub minimum_ideal_storage_temperature_in_celsius: Option<f32>,
    pub maximum_ideal_storage_temperature_in_celsius: Option<f32>,
    pub contains_dairy: bool,
    pub contains_egg: bool,
    pub contains_fish: bool,
    pub contains_gluten: bool,
    pub contains_peanut: bool,
    pub contains_sesame: bool,
    pub contains_shellfish: bool,
    pub contains_soy: bool,
    pub contains_tree_nut: bool,
    pub contains_wheat: bool,
    pub contains_alcohol: bool,
    pub animal_flesh: bool,
    pub animal_derived: bool,
    pub is_liquid: bool,
    pub is_measured_volumetrically: bool,
    pub restrict_to_preparations: bool,
}

fn check_storage_range(min: Option<f32>, max: Option<f32>) -> Result<()> {
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(LarderError::validation_field(
                "minimum storage temperature exceeds the maximum",
                "minimumIdealStorageTemperatureInCelsius",
            ));
        }
    }
    Ok(())
}

impl Creatable for ValidIngredient {
    type Input = ValidIngredientCreationInput;

    fn from_input(input: Self::Input, ctx: &CreateContext<'_>) -> Result<Self> {
        check_storage_range(
            input.minimum_ideal_storage_temperature_in_celsius,
            input.maximum_ideal_storage_temperature_in_celsius,
        )?;
        Ok(Self {
            id: ctx.id.clone(),
            slug: slug_or_name(input.slug, &input.name),
            name: input.name.trim().to_string(),
            plural_name: input.plural_name,
            description: input.description,
            warning: input.warning,
            icon_path: input.icon_path,
            storage_instructions: input.storage_instructions,
            shopping_suggestions: input.shopping_suggestions,
            minimum_ideal_storage_temperature_in_celsius: input.minimum_ideal_storage_temperature_in_celsius,
            maximum_ideal_storage_temperature_in_celsius: input.maximum_ideal_storage_temperature_in_celsius,
            contains_dairy: input.contains_dairy,
            contains_egg: input.contains_egg,
            contains_fish: input.contains_fish,
            contains_gluten: input.contains_gluten,
            contains_peanut: input.contains_peanut,
            contains_sesame: input.contains_sesame,
            contains_shellfish: input.contains_shellfish,
            contains_soy: input.contains_soy,
            contains_tree_nut: input.contains_tree_nut,
            contains_wheat: input.contains_wheat,
            contains_alcohol: input.contains_alcohol,
            animal_flesh: input.animal_flesh,
            animal_derived: input.animal_derived,
            is_liquid: input.is_liquid,
            is_measured_volumetrically: input.is_measured_volumetrically,
            restrict_to_preparations: input.restrict_to_preparations,
            timestamps: Timestamps::created(ctx.now),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidIngredientUpdateInput {
    #[validate(length(min = 1, max = 256, message = "name cannot be empty"))]
    pub name: Option<String>,
    pub plural_name: Option<String>,
    pub description: Option<String>,
    pub warning: Option<String>,
    pub icon_path: Option<String>,
    pub slug: Option<String>,
    pub storage_instructions: Option<String>,
    pub shopping_suggestions: Option<String>,
    pub minimum_ideal_storage_temperature_in_celsius: Option<f32>,
    pub maximum_ideal_storage_temperature_in_celsius: Option<f32>,
    pub contains_dairy: Option<bool>,
    pub contains_egg: Option<bool>,
    pub contains_fish: Option<bool>,
    pub contains_gluten: Option<bool>,
    pub contains_peanut: Option<bool>,
    pub contains_sesame: Option<bool>,
    pub contains_shellfish: Option<bool>,
    pub contains_soy: Option<bool>,
    pub contains_tree_nut: Option<bool>,
    pub contains_wheat: Option<bool>,
    pub contains_alcohol: Option<bool>,
    pub animal_flesh: Option<bool>,
    pub animal_derived: Option<bool>,
    pub is_liquid: Option<bool>,
    pub is_measured_volumetrically: Option<bool>,
    pub restrict_to_preparations: Option<bool>,
}

impl Patchable for ValidIngredient {
    type Patch = ValidIngredientUpdateInput;

    fn apply_patch(&mut self, patch: Self::Patch, _session: &SessionContext) -> Result<()> {
        patch_field(&mut self.name, patch.name.map(|name| name.trim().to_string()));
        patch_field(&mut self.plural_name, patch.plural_name);
        patch_field(&mut self.description, patch.description);
        patch_field(&mut self.warning, patch.warning);
        patch_field(&mut self.icon_path, patch.icon_path);
        patch_slug(&mut self.slug, patch.slug)?;
        patch_field(&mut self.storage_instructions, patch.storage_instructions);
        patch_field(&mut self.shopping_suggestions, patch.shopping_suggestions);
        if patch.minimum_ideal_storage_temperature_in_celsius.is_some() {
            self.minimum_ideal_storage_temperature_in_celsius = patch.minimum_ideal_storage_temperature_in_celsius;
        }
        if patch.maximum_ideal_storage_temperature_in_celsius.is_some() {
            self.maximum_ideal_storage_temperature_in_celsius = patch.maximum_ideal_storage_temperature_in_celsius;
        }
        check_storage_range(
            self.minimum_ideal_storage_temperature_in_celsius,
            self.maximum_ideal_storage_temperature_in_celsius,
        )?;
        patch_field(&mut self.contains_dairy, patch.contains_dairy);
        patch_field(&mut self.contains_egg, patch.contains_egg);
        patch_field(&mut self.contains_fish, patch.contains_fish);
        patch_field(&mut self.contains_gluten, patch.contains_gluten);
        patch_field(&mut self.contains_peanut, patch.contains_peanut);
        patch_field(&mut self.contains_sesame, patch.contains_sesame);
        patch_field(&mut self.contains_shellfish, patch.contains_shellfish);
        patch_field(&mut self.contains_soy, patch.contains_soy);
        patch_field(&mut self.contains_tree_nut, patch.contains_tree_nut);
        patch_field(&mut self.contains_wheat, patch.contains_wheat);
        patch_field(&mut self.contains_alcohol, patch.contains_alcohol);
        patch_field(&mut self.animal_flesh, patch.animal_flesh);
        patch_field(&mut self.animal_derived, patch.animal_derived);
        patch_field(&mut self.is_liquid, patch.is_liquid);
        patch_field(&mut self.is_measured_volumetrically, patch.is_measured_volumetrically);
        patch_field(&mut self.restrict_to_preparations, patch.restrict_to_preparations);
        Ok(())
    }
}

// -------------------------------------------------------------------------
// Preparations
// -------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidPreparation {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon_path: String,
    pub past_tense: String,
    pub slug: String,
    pub yields_nothing: bool,
    pub restrict_to_ingredients: bool,
    pub temperature_required: bool,
    pub time_estimate_required: bool,
    pub consumes_vessel: bool,
    pub only_for_vessels: bool,
    pub minimum_ingredient_count: u32,
    pub maximum_ingredient_count: Option<u32>,
    pub minimum_instrument_count: u32,
    pub maximum_instrument_count: Option<u32>,
    pub minimum_vessel_count: u32,
    pub maximum_vessel_count: Option<u32>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

reference_kind!(ValidPreparation, "validPreparation");

impl ValidPreparation {
    fn check_counts(&self) -> Result<()> {
        let bands = [
            (self.minimum_ingredient_count, self.maximum_ingredient_count, "maximumIngredientCount"),
            (self.minimum_instrument_count, self.maximum_instrument_count, "maximumInstrumentCount"),
            (self.minimum_vessel_count, self.maximum_vessel_count, "maximumVesselCount"),
        ];
        for (min, max, field) in bands {
            if max.is_some_and(|max| max < min) {
                return Err(LarderError::validation_field(format!("{field} is below its minimum"), field));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidPreparationCreationInput {
    #[validate(length(min = 1, max = 256, message = "name is required"))]
    pub name: String,
    pub description: String,
    pub icon_path: String,
    pub past_tense: String,
    pub slug: Option<String>,
    pub yields_nothing: bool,
    pub restrict_to_ingredients: bool,
    pub temperature_required: bool,
    pub time_estimate_required: bool,
    pub consumes_vessel: bool,
    pub only_for_vessels: bool,
    pub minimum_ingredient_count: u32,
    pub maximum_ingredient_count: Option<u32>,
    pub minimum_instrument_count: u32,
    pub maximum_instrument_count: Option<u32>,
    pub minimum_vessel_count: u32,
    pub maximum_vessel_count: Option<u32>,
}

impl Creatable for ValidPreparation {
    type Input = ValidPreparationCreationInput;

    fn from_input(input: Self::Input, ctx: &CreateContext<'_>) -> Result<Self> {
        let preparation = Self {
            id: ctx.id.clone(),
            slug: slug_or_name(input.slug, &input.name),
            name: input.name.trim().to_string(),
            description: input.description,
            icon_path: input.icon_path,
            past_tense: input.past_tense,
            yields_nothing: input.yields_nothing,
            restrict_to_ingredients: input.restrict_to_ingredients,
            temperature_required: input.temperature_required,
            time_estimate_required: input.time_estimate_required,
            consumes_vessel: input.consumes_vessel,
            only_for_vessels: input.only_for_vessels,
            minimum_ingredient_count: input.minimum_ingredient_count,
            maximum_ingredient_count: input.maximum_ingredient_count,
            minimum_instrument_count: input.minimum_instrument_count,
            maximum_instrument_count: input.maximum_instrument_count,
            minimum_vessel_count: input.minimum_vessel_count,
            maximum_vessel_count: input.maximum_vessel_count,
            timestamps: Timestamps::created(ctx.now),
        };
        preparation.check_counts()?;
        Ok(preparation)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidPreparationUpdateInput {
    #[validate(length(min = 1, max = 256, message = "name cannot be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon_path: Option<String>,
    pub past_tense: Option<String>,
    pub slug: Option<String>,
    pub yields_nothing: Option<bool>,
    pub restrict_to_ingredients: Option<bool>,
    pub temperature_required: Option<bool>,
    pub time_estimate_required: Option<bool>,
    pub consumes_vessel: Option<bool>,
    pub only_for_vessels: Option<bool>,
    pub minimum_ingredient_count: Option<u32>,
    pub maximum_ingredient_count: Option<u32>,
    pub minimum_instrument_count: Option<u32>,
    pub maximum_instrument_count: Option<u32>,
    pub minimum_vessel_count: Option<u32>,
    pub maximum_vessel_count: Option<u32>,
}

impl Patchable for ValidPreparation {
    type Patch = ValidPreparationUpdateInput;

    fn apply_patch(&mut self, patch: Self::Patch, _session: &SessionContext) -> Result<()> {
        patch_field(&mut self.name, patch.name.map(|name| name.trim().to_string()));
        patch_field(&mut self.description, patch.description);
        patch_field(&mut self.icon_path, patch.icon_path);
        patch_field(&mut self.past_tense, patch.past_tense);
        patch_slug(&mut self.slug, patch.slug)?;
        patch_field(&mut self.yields_nothing, patch.yields_nothing);
        patch_field(&mut self.restrict_to_ingredients, patch.restrict_to_ingredients);
        patch_field(&mut self.temperature_required, patch.temperature_required);
        patch_field(&mut self.time_estimate_required, patch.time_estimate_required);
        patch_field(&mut self.consumes_vessel, patch.consumes_vessel);
        patch_field(&mut self.only_for_vessels, patch.only_for_vessels);
        patch_field(&mut self.minimum_ingredient_count, patch.minimum_ingredient_count);
        patch_field(&mut self.minimum_instrument_count, patch.minimum_instrument_count);
        patch_field(&mut self.minimum_vessel_count, patch.minimum_vessel_count);
        if patch.maximum_ingredient_count.is_some() {
            self.maximum_ingredient_count = patch.maximum_ingredient_count;
        }
        if patch.maximum_instrument_count.is_some() {
            self.maximum_instrument_count = patch.maximum_instrument_count;
        }
        if patch.maximum_vessel_count.is_some() {
            self.maximum_vessel_count = patch.maximum_vessel_count;
        }
        self.check_counts()
    }
}

// -------------------------------------------------------------------------
// Measurement units
// -------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidMeasurementUnit {
    pub id: String,
    pub name: String,
    pub plural_name: String,
    pub description: String,
    pub icon_path: String,
    pub slug: String,
    pub volumetric: bool,
    pub universal: bool,
    pub metric: bool,
    pub imperial: bool,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

reference_kind!(ValidMeasurementUnit, "validMeasurementUnit");

fn check_unit_system(metric: bool, imperial: bool) -> Result<()> {
    if metric && imperial {
        return Err(LarderError::validation_field("a unit cannot be both metric and imperial", "metric"));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidMeasurementUnitCreationInput {
    #[validate(length(min = 1, max = 256, message = "name is required"))]
    pub name: String,
    pub plural_name: String,
    pub description: String,
    pub icon_path: String,
    pub slug: Option<String>,
    pub volumetric: bool,
    pub universal: bool,
    pub metric: bool,
    pub imperial: bool,
}

impl Creatable for ValidMeasurementUnit {
    type Input = ValidMeasurementUnitCreationInput;

    fn from_input(input: Self::Input, ctx: &CreateContext<'_>) -> Result<Self> {
        check_unit_system(input.metric, input.imperial)?;
        Ok(Self {
            id: ctx.id.clone(),
            slug: slug_or_name(input.slug, &input.name),
            name: input.name.trim().to_string(),
            plural_name: input.plural_name,
            description: input.description,
            icon_path: input.icon_path,
            volumetric: input.volumetric,
            universal: input.universal,
            metric: input.metric,
            imperial: input.imperial,
            timestamps: Timestamps::created(ctx.now),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidMeasurementUnitUpdateInput {
    #[validate(length(min = 1, max = 256, message = "name cannot be empty"))]
    pub name: Option<String>,
    pub plural_name: Option<String>,
    pub description: Option<String>,
    pub icon_path: Option<String>,
    pub slug: Option<String>,
    pub volumetric: Option<bool>,
    pub universal: Option<bool>,
    pub metric: Option<bool>,
    pub imperial: Option<bool>,
}

impl Patchable for ValidMeasurementUnit {
    type Patch = ValidMeasurementUnitUpdateInput;

    fn apply_patch(&mut self, patch: Self::Patch, _session: &SessionContext) -> Result<()> {
        patch_field(&mut self.name, patch.name.map(|name| name.trim().to_string()));
        patch_field(&mut self.plural_name, patch.plural_name);
        patch_field(&mut self.description, patch.description);
        patch_field(&mut self.icon_path, patch.icon_path);
        patch_slug(&mut self.slug, patch.slug)?;
        patch_field(&mut self.volumetric, patch.volumetric);
        patch_field(&mut self.universal, patch.universal);
        patch_field(&mut self.metric, patch.metric);
        patch_field(&mut self.imperial, patch.imperial);
        check_unit_system(self.metric, self.imperial)
    }
}

// -------------------------------------------------------------------------
// Instruments
// -------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidInstrument {
    pub id: String,
    pub name: String,
    pub plural_name: String,
    pub description: String,
    pub icon_path: String,
    pub slug: String,
    pub display_in_summary_lists: bool,
    pub include_in_generated_instructions: bool,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

reference_kind!(ValidInstrument, "validInstrument");

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidInstrumentCreationInput {
    #[validate(length(min = 1, max = 256, message = "name is required"))]
    pub name: String,
    pub plural_name: String,
    pub description: String,
    pub icon_path: String,
    pub slug: Option<String>,
    pub display_in_summary_lists: bool,
    pub include_in_generated_instructions: bool,
}

impl Creatable for ValidInstrument {
    type Input = ValidInstrumentCreationInput;

    fn from_input(input: Self::Input, ctx: &CreateContext<'_>) -> Result<Self> {
        Ok(Self {
            id: ctx.id.clone(),
            slug: slug_or_name(input.slug, &input.name),
            name: input.name.trim().to_string(),
            plural_name: input.plural_name,
            description: input.description,
            icon_path: input.icon_path,
            display_in_summary_lists: input.display_in_summary_lists,
            include_in_generated_instructions: input.include_in_generated_instructions,
            timestamps: Timestamps::created(ctx.now),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidInstrumentUpdateInput {
    #[validate(length(min = 1, max = 256, message = "name cannot be empty"))]
    pub name: Option<String>,
    pub plural_name: Option<String>,
    pub description: Option<String>,
    pub icon_path: Option<String>,
    pub slug: Option<String>,
    pub display_in_summary_lists: Option<bool>,
    pub include_in_generated_instructions: Option<bool>,
}

impl Patchable for ValidInstrument {
    type Patch = ValidInstrumentUpdateInput;

    fn apply_patch(&mut self, patch: Self::Patch, _session: &SessionContext) -> Result<()> {
        patch_field(&mut self.name, patch.name.map(|name| name.trim().to_string()));
        patch_field(&mut self.plural_name, patch.plural_name);
        patch_field(&mut self.description, patch.description);
        patch_field(&mut self.icon_path, patch.icon_path);
        patch_slug(&mut self.slug, patch.slug)?;
        patch_field(&mut self.display_in_summary_lists, patch.display_in_summary_lists);
        patch_field(&mut self.include_in_generated_instructions, patch.include_in_generated_instructions);
        Ok(())
    }
}

// -------------------------------------------------------------------------
// Vessels
// -------------------------------------------------------------------------

crate::string_enum! {
    pub enum VesselShape {
        Hemisphere => "hemisphere",
        Rectangle => "rectangle",
        Cone => "cone",
        Pyramid => "pyramid",
        Cylinder => "cylinder",
        Sphere => "sphere",
        Cube => "cube",
        Other => "other",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidVessel {
    pub id: String,
    pub name: String,
    pub plural_name: String,
    pub description: String,
    pub icon_path: String,
    pub slug: String,
    pub shape: VesselShape,
    pub capacity: f32,
    #[serde(rename = "capacityUnitID")]
    pub capacity_unit_id: Option<String>,
    pub width_in_millimeters: Option<f32>,
    pub length_in_millimeters: Option<f32>,
    pub height_in_millimeters: Option<f32>,
    pub usable_for_storage: bool,
    pub display_in_summary_lists: bool,
    pub include_in_generated_instructions: bool,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

reference_kind!(ValidVessel, "validVessel", |vessel| {
    Reference::optional::<ValidMeasurementUnit>(vessel.capacity_unit_id.as_ref(), "capacityUnitID")
        .into_iter()
        .collect()
});

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidVesselCreationInput {
    #[validate(length(min = 1, max = 256, message = "name is required"))]
    pub name: String,
    #[serde(default)]
    pub plural_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon_path: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub shape: VesselShape,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "capacity cannot be negative"))]
    pub capacity: f32,
    #[serde(default, rename = "capacityUnitID")]
    pub capacity_unit_id: Option<String>,
    #[serde(default)]
    pub width_in_millimeters: Option<f32>,
    #[serde(default)]
    pub length_in_millimeters: Option<f32>,
    #[serde(default)]
    pub height_in_millimeters: Option<f32>,
    #[serde(default)]
    pub usable_for_storage: bool,
    #[serde(default)]
    pub display_in_summary_lists: bool,
    #[serde(default)]
    pub include_in_generated_instructions: bool,
}

impl Creatable for ValidVessel {
    type Input = ValidVesselCreationInput;

    fn from_input(input: Self::Input, ctx: &CreateContext<'_>) -> Result<Self> {
        Ok(Self {
            id: ctx.id.clone(),
            slug: slug_or_name(input.slug, &input.name),
            name: input.name.trim().to_string(),
            plural_name: input.plural_name,
            description: input.description,
            icon_path: input.icon_path,
            shape: input.shape,
            capacity: input.capacity,
            capacity_unit_id: input.capacity_unit_id.filter(|id| !id.is_empty()),
            width_in_millimeters: input.width_in_millimeters,
            length_in_millimeters: input.length_in_millimeters,
            height_in_millimeters: input.height_in_millimeters,
            usable_for_storage: input.usable_for_storage,
            display_in_summary_lists: input.display_in_summary_lists,
            include_in_generated_instructions: input.include_in_generated_instructions,
            timestamps: Timestamps::created(ctx.now),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidVesselUpdateInput {
    #[validate(length(min = 1, max = 256, message = "name cannot be empty"))]
    pub name: Option<String>,
    pub plural_name: Option<String>,
    pub description: Option<String>,
    pub icon_path: Option<String>,
    pub slug: Option<String>,
    pub shape: Option<VesselShape>,
    #[validate(range(min = 0.0, message = "capacity cannot be negative"))]
    pub capacity: Option<f32>,
    #[serde(rename = "capacityUnitID")]
    pub capacity_unit_id: Option<String>,
    pub width_in_millimeters: Option<f32>,
    pub length_in_millimeters: Option<f32>,
    pub height_in_millimeters: Option<f32>,
    pub usable_for_storage: Option<bool>,
    pub display_in_summary_lists: Option<bool>,
    pub include_in_generated_instructions: Option<bool>,
}

impl Patchable for ValidVessel {
    type Patch = ValidVesselUpdateInput;

    fn apply_patch(&mut self, patch: Self::Patch, _session: &SessionContext) -> Result<()> {
        patch_field(&mut self.name, patch.name.map(|name| name.trim().to_string()));
        patch_field(&mut self.plural_name, patch.plural_name);
        patch_field(&mut self.description, patch.description);
        patch_field(&mut self.icon_path, patch.icon_path);
        patch_slug(&mut self.slug, patch.slug)?;
        patch_field(&mut self.shape, patch.shape);
        patch_field(&mut self.capacity, patch.capacity);
        if let Some(unit) = patch.capacity_unit_id {
            self.capacity_unit_id = Some(unit).filter(|id| !id.is_empty());
        }
        if patch.width_in_millimeters.is_some() {
            self.width_in_millimeters = patch.width_in_millimeters;
        }
        if patch.length_in_millimeters.is_some() {
            self.length_in_millimeters = patch.length_in_millimeters;
        }
        if patch.height_in_millimeters.is_some() {
            self.height_in_millimeters = patch.height_in_millimeters;
        }
        patch_field(&mut self.usable_for_storage, patch.usable_for_storage);
        patch_field(&mut self.display_in_summary_lists, patch.display_in_summary_lists);
        patch_field(&mut self.include_in_generated_instructions, patch.include_in_generated_instructions);
        Ok(())
    }
}

// -------------------------------------------------------------------------
// Ingredient states
// -------------------------------------------------------------------------

crate::string_enum! {
    pub enum IngredientAttributeType {
        Texture => "texture",
        Consistency => "consistency",
        Temperature => "temperature",
        Color => "color",
        Appearance => "appearance",
        Odor => "odor",
        Taste => "taste",
        Sound => "sound",
        Other => "other",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidIngredientState {
    pub id: String,
    pub name: String,
    pub past_tense: String,
    pub description: String,
    pub icon_path: String,
    pub slug: String,
    pub attribute_type: IngredientAttributeType,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

reference_kind!(ValidIngredientState, "validIngredientState");

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidIngredientStateCreationInput {
    #[validate(length(min = 1, max = 256, message = "name is required"))]
    pub name: String,
    #[serde(default)]
    pub past_tense: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon_path: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub attribute_type: IngredientAttributeType,
}

impl Creatable for ValidIngredientState {
    type Input = ValidIngredientStateCreationInput;

    fn from_input(input: Self::Input, ctx: &CreateContext<'_>) -> Result<Self> {
        Ok(Self {
            id: ctx.id.clone(),
            slug: slug_or_name(input.slug, &input.name),
            name: input.name.trim().to_string(),
            past_tense: input.past_tense,
            description: input.description,
            icon_path: input.icon_path,
            attribute_type: input.attribute_type,
            timestamps: Timestamps::created(ctx.now),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidIngredientStateUpdateInput {
    #[validate(length(min = 1, max = 256, message = "name cannot be empty"))]
    pub name: Option<String>,
    pub past_tense: Option<String>,
    pub description: Option<String>,
    pub icon_path: Option<String>,
    pub slug: Option<String>,
    pub attribute_type: Option<IngredientAttributeType>,
}

impl Patchable for ValidIngredientState {
    type Patch = ValidIngredientStateUpdateInput;

    fn apply_patch(&mut self, patch: Self::Patch, _session: &SessionContext) -> Result<()> {
        patch_field(&mut self.name, patch.name.map(|name| name.trim().to_string()));
        patch_field(&mut self.past_tense, patch.past_tense);
        patch_field(&mut self.description, patch.description);
        patch_field(&mut self.icon_path, patch.icon_path);
        patch_slug(&mut self.slug, patch.slug)?;
        patch_field(&mut self.attribute_type, patch.attribute_type);
        Ok(())
    }
}

// -------------------------------------------------------------------------
// Ingredient groups
// -------------------------------------------------------------------------

/// A named set of ingredients ("citrus", "hard cheeses").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidIngredientGroup {
    pub id: String,
    pub name: String,
    pub description: String,
    pub slug: String,
    #[serde(rename = "memberIngredientIDs")]
    pub member_ingredient_ids: Vec<String>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

reference_kind!(ValidIngredientGroup, "validIngredientGroup", |group| {
    group
        .member_ingredient_ids
        .iter()
        .map(|id| Reference::to::<ValidIngredient>(id.clone(), "memberIngredientIDs"))
        .collect()
});

fn dedup_members(ids: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    ids.into_iter().filter(|id| !id.is_empty() && seen.insert(id.clone())).collect()
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidIngredientGroupCreationInput {
    #[validate(length(min = 1, max = 256, message = "name is required"))]
    pub name: String,
    pub description: String,
    pub slug: Option<String>,
    #[serde(rename = "memberIngredientIDs")]
    pub member_ingredient_ids: Vec<String>,
}

impl Creatable for ValidIngredientGroup {
    type Input = ValidIngredientGroupCreationInput;

    fn from_input(input: Self::Input, ctx: &CreateContext<'_>) -> Result<Self> {
        Ok(Self {
            id: ctx.id.clone(),
            slug: slug_or_name(input.slug, &input.name),
            name: input.name.trim().to_string(),
            description: input.description,
            member_ingredient_ids: dedup_members(input.member_ingredient_ids),
            timestamps: Timestamps::created(ctx.now),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidIngredientGroupUpdateInput {
    #[validate(length(min = 1, max = 256, message = "name cannot be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub slug: Option<String>,
    #[serde(rename = "memberIngredientIDs")]
    pub member_ingredient_ids: Option<Vec<String>>,
}

impl Patchable for ValidIngredientGroup {
    type Patch = ValidIngredientGroupUpdateInput;

    fn apply_patch(&mut self, patch: Self::Patch, _session: &SessionContext) -> Result<()> {
        patch_field(&mut self.name, patch.name.map(|name| name.trim().to_string()));
        patch_field(&mut self.description, patch.description);
        patch_slug(&mut self.slug, patch.slug)?;
        patch_field(&mut self.member_ingredient_ids, patch.member_ingredient_ids.map(dedup_members));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::fixtures::session;
    use crate::auth::models::HouseholdRole;
    use chrono::Utc;

    fn ctx(session: &SessionContext) -> CreateContext<'_> {
        CreateContext { id: "r1".to_string(), owner: Owner::System, parent_id: None, now: Utc::now(), session }
    }

    #[test]
    fn slug_defaults_from_name_and_indexes_both_keys() {
        let admin = session("u1", "h1", HouseholdRole::HouseholdAdmin);
        let input = ValidIngredientCreationInput { name: " Black Pepper ".to_string(), ..Default::default() };
        let ingredient = ValidIngredient::from_input(input, &ctx(&admin)).unwrap();

        assert_eq!(ingredient.name, "Black Pepper");
        assert_eq!(ingredient.slug, "black-pepper");
        let index = ingredient.index();
        assert_eq!(index.unique_key.as_deref(), Some("black pepper"));
        assert_eq!(index.secondary_key.as_deref(), Some("black-pepper"));
        assert_eq!(ingredient.owner(), Owner::System);
    }

    #[test]
    fn inverted_ranges_are_rejected() {
        let admin = session("u1", "h1", HouseholdRole::HouseholdAdmin);
        let input = ValidPreparationCreationInput {
            name: "dice".to_string(),
            minimum_ingredient_count: 3,
            maximum_ingredient_count: Some(1),
            ..Default::default()
        };
        assert!(ValidPreparation::from_input(input, &ctx(&admin)).is_err());

        let unit = ValidMeasurementUnitCreationInput {
            name: "cup".to_string(),
            metric: true,
            imperial: true,
            ..Default::default()
        };
        assert!(ValidMeasurementUnit::from_input(unit, &ctx(&admin)).is_err());
    }

    #[test]
    fn group_members_are_references_without_duplicates() {
        let admin = session("u1", "h1", HouseholdRole::HouseholdAdmin);
        let input = ValidIngredientGroupCreationInput {
            name: "citrus".to_string(),
            member_ingredient_ids: vec!["i1".into(), "i2".into(), "i1".into(), String::new()],
            ..Default::default()
        };
        let group = ValidIngredientGroup::from_input(input, &ctx(&admin)).unwrap();
        assert_eq!(group.member_ingredient_ids, vec!["i1", "i2"]);
        assert_eq!(group.references().len(), 2);
        assert_eq!(group.references()[0].kind, ValidIngredient::KIND);
    }

    #[test]
    fn patch_rejects_blank_slug() {
        let admin = session("u1", "h1", HouseholdRole::HouseholdAdmin);
        let mut unit = ValidMeasurementUnit::from_input(
            ValidMeasurementUnitCreationInput { name: "gram".to_string(), metric: true, ..Default::default() },
            &ctx(&admin),
        )
        .unwrap();
        let patch = ValidMeasurementUnitUpdateInput { slug: Some("  ".to_string()), ..Default::default() };
        assert!(unit.apply_patch(patch, &admin).is_err());

        let patch = ValidMeasurementUnitUpdateInput { imperial: Some(true), ..Default::default() };
        assert!(unit.apply_patch(patch, &admin).is_err());
    }
}
