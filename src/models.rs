//! Data models for recipes, raw-material stock and production requests

use serde::{Deserialize, Serialize};

/// What a recipe produces when committed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    /// Quantity-tracked finished stock, incremented on commit
    Retail,
    /// Availability-flagged item; commit only consumes raw materials
    Produce,
}

impl std::fmt::Display for OutputType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputType::Retail => f.pad("retail"),
            OutputType::Produce => f.pad("produce"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: String,
    pub title: String,
    pub servings: u32,
    pub ingredients: Vec<Ingredient>,
    pub output_type: OutputType,
    pub output_item_id: String,
}

/// Recipes of one vendor, partitioned by output type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeCatalog {
    pub retail: Vec<Recipe>,
    pub produce: Vec<Recipe>,
}

impl RecipeCatalog {
    pub fn from_recipes(recipes: impl IntoIterator<Item = Recipe>) -> Self {
        let mut catalog = RecipeCatalog::default();
        for recipe in recipes {
            match recipe.output_type {
                OutputType::Retail => catalog.retail.push(recipe),
                OutputType::Produce => catalog.produce.push(recipe),
            }
        }
        catalog
    }

    pub fn iter(&self) -> impl Iterator<Item = &Recipe> {
        self.retail.iter().chain(self.produce.iter())
    }

    pub fn find(&self, recipe_id: &str) -> Option<&Recipe> {
        self.iter().find(|r| r.id == recipe_id)
    }
}

/// One raw-material entry from a vendor's stock snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMaterialStock {
    pub item_id: String,
    pub name: String,
    pub opening_amount: f64,
    pub closing_amount: f64,
    pub unit: String,
}

impl RawMaterialStock {
    /// Closing amount once recorded for the day, otherwise the opening amount
    pub fn available(&self) -> f64 {
        if self.closing_amount > 0.0 {
            self.closing_amount
        } else {
            self.opening_amount
        }
    }
}

/// Why an ingredient is or is not covered by stock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IngredientStatus {
    Sufficient,
    Short,
    Unmatched,
    IncompatibleUnits,
}

/// Per-ingredient evaluation result. Recomputed, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculatedIngredient {
    pub name: String,
    pub required_qty: f64,
    pub unit: String,
    pub available: f64,
    pub sufficient: bool,
    pub status: IngredientStatus,
    /// Item id of the matched stock entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_item_id: Option<String>,
}

impl CalculatedIngredient {
    /// How much more stock is needed, zero when covered. Only meaningful
    /// when units were validated.
    pub fn shortfall(&self) -> f64 {
        (self.required_qty - self.available).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUsage {
    pub raw_item_id: String,
    pub quantity: f64,
    pub unit: String,
}

/// Commit body for retail output: deduct raw materials, credit finished stock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetailProductionRequest {
    pub vendor_id: String,
    pub quantity: f64,
    pub output_item_id: String,
    pub output_name: String,
    pub raw_usages: Vec<RawUsage>,
}

/// Commit body for produce output: deduct raw materials only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProduceProductionRequest {
    pub vendor_id: String,
    pub raw_usages: Vec<RawUsage>,
    pub output_produce_item_id: String,
    pub output_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductionRequest {
    Retail(RetailProductionRequest),
    Produce(ProduceProductionRequest),
}

impl ProductionRequest {
    pub fn raw_usages(&self) -> &[RawUsage] {
        match self {
            ProductionRequest::Retail(r) => &r.raw_usages,
            ProductionRequest::Produce(p) => &p.raw_usages,
        }
    }

    pub fn output_type(&self) -> OutputType {
        match self {
            ProductionRequest::Retail(_) => OutputType::Retail,
            ProductionRequest::Produce(_) => OutputType::Produce,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResponse {
    pub success: bool,
    pub message: String,
}
