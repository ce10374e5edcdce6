//! Stock matching and sufficiency evaluation

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::error::{PlannerError, Result};
use crate::models::{CalculatedIngredient, IngredientStatus, RawMaterialStock};
use crate::scaler::{ScaledIngredient, ScaledRecipe};
use crate::units::{Conversion, UnitTable, normalize};

/// How to treat two stock entries whose names normalize to the same key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Fail the snapshot with [`PlannerError::DuplicateStock`]
    #[default]
    Reject,
    /// Keep the entry encountered first
    FirstWins,
}

/// Name -> stock lookup built once per snapshot
#[derive(Debug, Clone)]
pub struct StockIndex {
    entries: Vec<RawMaterialStock>,
    by_name: HashMap<String, usize>,
}

impl StockIndex {
    pub fn build(stock: Vec<RawMaterialStock>, policy: DuplicatePolicy) -> Result<Self> {
        let mut by_name: HashMap<String, usize> = HashMap::with_capacity(stock.len());

        for (idx, entry) in stock.iter().enumerate() {
            let key = normalize(&entry.name);
            if let Some(&existing) = by_name.get(&key) {
                match policy {
                    DuplicatePolicy::Reject => {
                        return Err(PlannerError::DuplicateStock {
                            name: key,
                            first: stock[existing].item_id.clone(),
                            second: entry.item_id.clone(),
                        });
                    }
                    DuplicatePolicy::FirstWins => {
                        debug!(name = %key, skipped = %entry.item_id, "duplicate stock name ignored");
                        continue;
                    }
                }
            }
            by_name.insert(key, idx);
        }

        Ok(StockIndex {
            entries: stock,
            by_name,
        })
    }

    /// Case/whitespace-insensitive exact name match
    pub fn find(&self, ingredient_name: &str) -> Option<&RawMaterialStock> {
        self.by_name
            .get(&normalize(ingredient_name))
            .map(|&idx| &self.entries[idx])
    }

    pub fn entries(&self) -> &[RawMaterialStock] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Match one scaled ingredient against stock and decide sufficiency
pub fn evaluate_ingredient(
    units: &UnitTable,
    ingredient: &ScaledIngredient,
    index: &StockIndex,
) -> CalculatedIngredient {
    let Some(stock) = index.find(&ingredient.name) else {
        return CalculatedIngredient {
            name: ingredient.name.clone(),
            required_qty: ingredient.base_required_qty,
            unit: ingredient.unit.clone(),
            available: 0.0,
            sufficient: false,
            status: IngredientStatus::Unmatched,
            raw_item_id: None,
        };
    };

    let available = stock.available();

    let (required_qty, unit, status) =
        match units.try_convert(ingredient.base_required_qty, &ingredient.unit, &stock.unit) {
            Conversion::Converted(qty) => {
                let status = if available >= qty {
                    IngredientStatus::Sufficient
                } else {
                    IngredientStatus::Short
                };
                (qty, stock.unit.clone(), status)
            }
            // numbers stay unconverted, reported in the ingredient's own unit
            Conversion::Incompatible => (
                ingredient.base_required_qty,
                ingredient.unit.clone(),
                IngredientStatus::IncompatibleUnits,
            ),
        };

    CalculatedIngredient {
        name: ingredient.name.clone(),
        required_qty,
        unit,
        available,
        sufficient: status == IngredientStatus::Sufficient,
        status,
        raw_item_id: Some(stock.item_id.clone()),
    }
}

/// Result of evaluating a scaled recipe against one stock snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub target_quantity: f64,
    pub ingredients: Vec<CalculatedIngredient>,
}

impl Evaluation {
    pub fn is_feasible(&self) -> bool {
        self.ingredients.iter().all(|i| i.sufficient)
    }

    /// Names of every ingredient that blocks production, in recipe order
    pub fn insufficient(&self) -> Vec<String> {
        self.ingredients
            .iter()
            .filter(|i| !i.sufficient)
            .map(|i| i.name.clone())
            .collect()
    }

    /// Largest target quantity this snapshot could support.
    ///
    /// None when some ingredient is unmatched or has incompatible units,
    /// or when no ingredient requires a positive amount.
    pub fn max_producible(&self) -> Option<f64> {
        let mut max: Option<f64> = None;
        for ingredient in &self.ingredients {
            match ingredient.status {
                IngredientStatus::Unmatched | IngredientStatus::IncompatibleUnits => return None,
                IngredientStatus::Sufficient | IngredientStatus::Short => {}
            }
            if ingredient.required_qty <= 0.0 {
                continue;
            }
            let per_unit = ingredient.required_qty / self.target_quantity;
            let supported = (ingredient.available / per_unit).max(0.0);
            max = Some(max.map_or(supported, |m: f64| m.min(supported)));
        }
        max
    }
}

/// Evaluate every ingredient of a scaled recipe
pub fn evaluate(units: &UnitTable, scaled: &ScaledRecipe, index: &StockIndex) -> Evaluation {
    let ingredients: Vec<CalculatedIngredient> = scaled
        .ingredients
        .iter()
        .map(|ingredient| {
            let calc = evaluate_ingredient(units, ingredient, index);
            debug!(
                ingredient = %calc.name,
                required = calc.required_qty,
                unit = %calc.unit,
                available = calc.available,
                status = ?calc.status,
                "ingredient evaluated"
            );
            calc
        })
        .collect();

    let evaluation = Evaluation {
        target_quantity: scaled.target_quantity,
        ingredients,
    };

    let blocked = evaluation.insufficient();
    if blocked.is_empty() {
        info!(
            target = scaled.target_quantity,
            ingredients = evaluation.ingredients.len(),
            "production feasible"
        );
    } else {
        warn!(target = scaled.target_quantity, blocked = ?blocked, "production not feasible");
    }

    evaluation
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock(id: &str, name: &str, closing: f64, unit: &str) -> RawMaterialStock {
        RawMaterialStock {
            item_id: id.to_string(),
            name: name.to_string(),
            opening_amount: 0.0,
            closing_amount: closing,
            unit: unit.to_string(),
        }
    }

    fn scaled(name: &str, qty: f64, unit: &str) -> ScaledIngredient {
        ScaledIngredient {
            name: name.to_string(),
            base_required_qty: qty,
            unit: unit.to_string(),
        }
    }

    #[test]
    fn test_match_ignores_case_and_whitespace() {
        let index = StockIndex::build(vec![stock("rm-1", " Flour ", 1.0, "kg")], DuplicatePolicy::Reject)
            .unwrap();
        assert_eq!(index.find("FLOUR").map(|s| s.item_id.as_str()), Some("rm-1"));
        assert!(index.find("Flour mix").is_none());
    }

    #[test]
    fn test_duplicate_names_rejected_by_default() {
        let result = StockIndex::build(
            vec![stock("rm-1", "Sugar", 1.0, "kg"), stock("rm-2", "sugar ", 2.0, "kg")],
            DuplicatePolicy::default(),
        );
        match result {
            Err(PlannerError::DuplicateStock { name, first, second }) => {
                assert_eq!(name, "sugar");
                assert_eq!(first, "rm-1");
                assert_eq!(second, "rm-2");
            }
            other => panic!("expected duplicate error, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_names_first_wins() {
        let index = StockIndex::build(
            vec![stock("rm-1", "Sugar", 1.0, "kg"), stock("rm-2", "sugar", 2.0, "kg")],
            DuplicatePolicy::FirstWins,
        )
        .unwrap();
        assert_eq!(index.find("sugar").map(|s| s.item_id.as_str()), Some("rm-1"));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_converted_requirement_reported_in_stock_unit() {
        let units = UnitTable::default();
        let index = StockIndex::build(vec![stock("rm-1", "Milk", 2.0, "l")], DuplicatePolicy::Reject)
            .unwrap();
        let calc = evaluate_ingredient(&units, &scaled("milk", 3.0, "cups"), &index);
        assert!((calc.required_qty - 0.72).abs() < 1e-9);
        assert_eq!(calc.unit, "l");
        assert!(calc.sufficient);
        assert_eq!(calc.raw_item_id.as_deref(), Some("rm-1"));
    }

    #[test]
    fn test_incompatible_units_keep_ingredient_unit() {
        let units = UnitTable::default();
        let index = StockIndex::build(vec![stock("rm-1", "Garlic", 100.0, "g")], DuplicatePolicy::Reject)
            .unwrap();
        let calc = evaluate_ingredient(&units, &scaled("Garlic", 2.0, "cloves"), &index);
        assert_eq!(calc.required_qty, 2.0);
        assert_eq!(calc.unit, "cloves");
        assert_eq!(calc.status, IngredientStatus::IncompatibleUnits);
        assert!(!calc.sufficient);
    }

    #[test]
    fn test_max_producible() {
        let evaluation = Evaluation {
            target_quantity: 8.0,
            ingredients: vec![
                CalculatedIngredient {
                    name: "Flour".to_string(),
                    required_qty: 400.0,
                    unit: "g".to_string(),
                    available: 500.0,
                    sufficient: true,
                    status: IngredientStatus::Sufficient,
                    raw_item_id: Some("rm-1".to_string()),
                },
                CalculatedIngredient {
                    name: "Milk".to_string(),
                    required_qty: 2.0,
                    unit: "l".to_string(),
                    available: 1.0,
                    sufficient: false,
                    status: IngredientStatus::Short,
                    raw_item_id: Some("rm-2".to_string()),
                },
            ],
        };
        assert_eq!(evaluation.max_producible(), Some(4.0));
        assert_eq!(evaluation.insufficient(), vec!["Milk".to_string()]);
        assert_eq!(evaluation.ingredients[1].shortfall(), 1.0);
    }
}
