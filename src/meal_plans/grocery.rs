//! Grocery list aggregation.
//!
//! Ingredient needs gathered from the chosen recipes are summed per
//! ingredient. The first unit seen for an ingredient becomes its canonical
//! unit; later needs are converted into it through
//! [`ValidMeasurementUnitConversion`] records (`to = from * modifier`),
//! preferring ingredient-specific conversions and falling back to the reverse
//! direction. Needs that cannot be converted keep a line of their own.

use crate::catalog::ValidMeasurementUnitConversion;

/// Quantity band of one ingredient in one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct IngredientNeed {
    pub ingredient_id: String,
    pub measurement_unit_id: String,
    pub minimum_quantity: f64,
    pub maximum_quantity: Option<f64>,
}

impl IngredientNeed {
    fn scaled(&self, factor: f64) -> (f64, Option<f64>) {
        (self.minimum_quantity * factor, self.maximum_quantity.map(|max| max * factor))
    }
}

/// Factor turning a quantity in `from` into one in `to` for `ingredient_id`.
pub fn conversion_factor(
    conversions: &[ValidMeasurementUnitConversion],
    ingredient_id: &str,
    from: &str,
    to: &str,
) -> Option<f64> {
    if from == to {
        return Some(1.0);
    }
    let applies = |c: &&ValidMeasurementUnitConversion| {
        c.only_for_ingredient.as_deref().is_none_or(|only| only == ingredient_id)
    };
    let best = |from: &str, to: &str| {
        conversions
            .iter()
            .filter(|c| c.from == from && c.to == to)
            .filter(applies)
            .max_by_key(|c| c.only_for_ingredient.is_some())
            .map(|c| c.modifier)
    };

    best(from, to).or_else(|| best(to, from).filter(|modifier| *modifier > 0.0).map(|modifier| 1.0 / modifier))
}

/// Sum `needs` into one line per ingredient and convertible unit, in order of
/// first appearance.
pub fn aggregate(needs: &[IngredientNeed], conversions: &[ValidMeasurementUnitConversion]) -> Vec<IngredientNeed> {
    let mut lines: Vec<IngredientNeed> = Vec::new();

    for need in needs {
        let target = lines.iter_mut().find_map(|line| {
            if line.ingredient_id != need.ingredient_id {
                return None;
            }
            conversion_factor(conversions, &need.ingredient_id, &need.measurement_unit_id, &line.measurement_unit_id)
                .map(|factor| (line, factor))
        });

        match target {
            Some((line, factor)) => {
                let (min, max) = need.scaled(factor);
                line.maximum_quantity = match (line.maximum_quantity, max) {
                    (None, None) => None,
                    (line_max, need_max) => {
                        Some(line_max.unwrap_or(line.minimum_quantity) + need_max.unwrap_or(min))
                    }
                };
                line.minimum_quantity += min;
            }
            None => lines.push(need.clone()),
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Timestamps;
    use chrono::Utc;

    fn conversion(from: &str, to: &str, only: Option<&str>, modifier: f64) -> ValidMeasurementUnitConversion {
        ValidMeasurementUnitConversion {
            id: format!("{from}-{to}"),
            from: from.into(),
            to: to.into(),
            only_for_ingredient: only.map(Into::into),
            modifier,
            notes: String::new(),
            timestamps: Timestamps::created(Utc::now()),
        }
    }

    fn need(ingredient: &str, unit: &str, min: f64, max: Option<f64>) -> IngredientNeed {
        IngredientNeed {
            ingredient_id: ingredient.into(),
            measurement_unit_id: unit.into(),
            minimum_quantity: min,
            maximum_quantity: max,
        }
    }

    #[test]
    fn factors_prefer_ingredient_specific_then_reverse() {
        let conversions = vec![
            conversion("cup", "gram", None, 240.0),
            conversion("cup", "gram", Some("flour"), 120.0),
            conversion("kilogram", "gram", None, 1000.0),
        ];
        assert_eq!(conversion_factor(&conversions, "sugar", "cup", "gram"), Some(240.0));
        assert_eq!(conversion_factor(&conversions, "flour", "cup", "gram"), Some(120.0));
        assert_eq!(conversion_factor(&conversions, "flour", "gram", "kilogram"), Some(0.001));
        assert_eq!(conversion_factor(&conversions, "flour", "cup", "liter"), None);
    }

    #[test]
    fn needs_sum_into_the_first_unit_seen() {
        let conversions = vec![conversion("kilogram", "gram", None, 1000.0)];
        let lines = aggregate(
            &[
                need("flour", "gram", 200.0, None),
                need("egg", "unit", 2.0, Some(3.0)),
                need("flour", "kilogram", 0.5, Some(1.0)),
                need("egg", "unit", 1.0, None),
                need("flour", "cup", 1.0, None),
            ],
            &conversions,
        );

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], need("flour", "gram", 700.0, Some(1200.0)));
        assert_eq!(lines[1], need("egg", "unit", 3.0, Some(4.0)));
        assert_eq!(lines[2], need("flour", "cup", 1.0, None));
    }
}
