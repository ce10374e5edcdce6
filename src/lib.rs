//! Recipe-to-production planner
//!
//! Scales a recipe to a target quantity, matches ingredients against a
//! raw-material stock snapshot, decides feasibility and builds the commit
//! request for the production/inventory service.

pub mod db;
pub mod error;
pub mod import;
pub mod inventory;
pub mod models;
pub mod planner;
pub mod provider;
pub mod scaler;
pub mod units;

pub use error::{PlannerError, ServiceError};
pub use inventory::{DuplicatePolicy, Evaluation, StockIndex};
pub use models::{
    CalculatedIngredient, CommitResponse, Ingredient, IngredientStatus, OutputType,
    ProduceProductionRequest, ProductionRequest, RawMaterialStock, RawUsage, Recipe,
    RecipeCatalog, RetailProductionRequest,
};
pub use planner::{
    PlanSummary, PlannerConfig, PlannerEvent, PlannerState, PlanningSession, SnapshotTicket,
    build_production_request, evaluate_recipe,
};
pub use provider::{ProductionService, RawMaterialProvider, RecipeProvider};
pub use units::{Conversion, UnitCategory, UnitTable};
