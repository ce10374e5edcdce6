//! Recipe scaling

use crate::error::{PlannerError, Result};
use crate::models::Recipe;

#[derive(Debug, Clone, PartialEq)]
pub struct ScaledIngredient {
    pub name: String,
    /// Declared quantity times the multiplier, still in `unit`
    pub base_required_qty: f64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScaledRecipe {
    pub target_quantity: f64,
    pub multiplier: f64,
    pub ingredients: Vec<ScaledIngredient>,
}

pub fn validate_target(target_quantity: f64) -> Result<()> {
    if !target_quantity.is_finite() || target_quantity <= 0.0 {
        return Err(PlannerError::validation(format!(
            "target quantity must be positive, got {target_quantity}"
        )));
    }
    Ok(())
}

/// Scale every ingredient by `target_quantity / servings`
pub fn scale(recipe: &Recipe, target_quantity: f64) -> Result<ScaledRecipe> {
    validate_target(target_quantity)?;
    if recipe.servings == 0 {
        return Err(PlannerError::validation(format!(
            "recipe '{}' has no servings",
            recipe.title
        )));
    }

    let multiplier = target_quantity / f64::from(recipe.servings);

    let ingredients = recipe
        .ingredients
        .iter()
        .map(|ingredient| {
            if !ingredient.quantity.is_finite() || ingredient.quantity < 0.0 {
                return Err(PlannerError::validation(format!(
                    "ingredient '{}' has invalid quantity {}",
                    ingredient.name, ingredient.quantity
                )));
            }
            Ok(ScaledIngredient {
                name: ingredient.name.clone(),
                base_required_qty: ingredient.quantity * multiplier,
                unit: ingredient.unit.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ScaledRecipe {
        target_quantity,
        multiplier,
        ingredients,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Ingredient, OutputType};

    fn recipe(servings: u32, quantity: f64) -> Recipe {
        Recipe {
            id: "r1".to_string(),
            title: "Bread".to_string(),
            servings,
            ingredients: vec![Ingredient {
                name: "Flour".to_string(),
                quantity,
                unit: "g".to_string(),
                notes: None,
            }],
            output_type: OutputType::Retail,
            output_item_id: "bread".to_string(),
        }
    }

    #[test]
    fn test_multiplier_applies_to_each_ingredient() {
        let scaled = scale(&recipe(4, 200.0), 8.0).unwrap();
        assert_eq!(scaled.multiplier, 2.0);
        assert_eq!(scaled.ingredients[0].base_required_qty, 400.0);
        assert_eq!(scaled.ingredients[0].unit, "g");
    }

    #[test]
    fn test_fractional_multiplier() {
        let scaled = scale(&recipe(4, 200.0), 1.0).unwrap();
        assert_eq!(scaled.ingredients[0].base_required_qty, 50.0);
    }

    #[test]
    fn test_rejects_non_positive_target() {
        assert!(matches!(scale(&recipe(4, 200.0), 0.0), Err(PlannerError::Validation(_))));
        assert!(matches!(scale(&recipe(4, 200.0), -2.0), Err(PlannerError::Validation(_))));
        assert!(matches!(scale(&recipe(4, 200.0), f64::NAN), Err(PlannerError::Validation(_))));
    }

    #[test]
    fn test_rejects_zero_servings() {
        assert!(matches!(scale(&recipe(0, 200.0), 2.0), Err(PlannerError::Validation(_))));
    }

    #[test]
    fn test_rejects_negative_ingredient_quantity() {
        assert!(matches!(scale(&recipe(2, -1.0), 2.0), Err(PlannerError::Validation(_))));
    }
}
