//! Culinary reference data: seven global kinds and the six bridges between
//! them.

pub mod bridges;
pub mod reference;
pub mod service;

pub use bridges::{
    Bridge, ValidIngredientMeasurementUnit, ValidIngredientPreparation, ValidIngredientStateIngredient,
    ValidMeasurementUnitConversion, ValidPreparationInstrument, ValidPreparationVessel,
};
pub use reference::{
    ValidIngredient, ValidIngredientGroup, ValidIngredientState, ValidInstrument, ValidMeasurementUnit,
    ValidPreparation, ValidVessel,
};
pub use service::CatalogService;

/// Lowercase, ASCII-alphanumeric words joined by `-`.
pub fn slugify(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn slugs_collapse_punctuation() {
        assert_eq!(slugify("  Crème fraîche "), "cr-me-fra-che");
        assert_eq!(slugify("Salt & Pepper"), "salt-pepper");
        assert_eq!(slugify("---"), "");
    }
}
