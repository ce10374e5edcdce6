//! Production planning: request assembly and the planning state machine
//!
//! A session moves through `Idle -> Selected -> Scaled -> Evaluated ->
//! Committing -> Committed | Failed`. Changing the recipe or the quantity
//! drops any earlier evaluation. Stock is never cached past one evaluation;
//! after a commit the caller fetches a fresh snapshot.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{PlannerError, Result, ServiceError};
use crate::inventory::{DuplicatePolicy, Evaluation, StockIndex, evaluate};
use crate::models::{
    CommitResponse, OutputType, ProduceProductionRequest, ProductionRequest, RawMaterialStock,
    RawUsage, Recipe, RetailProductionRequest,
};
use crate::provider::{ProductionService, RawMaterialProvider};
use crate::scaler::{ScaledRecipe, scale, validate_target};
use crate::units::UnitTable;

#[derive(Debug, Clone, Default)]
pub struct PlannerConfig {
    pub units: Arc<UnitTable>,
    pub duplicates: DuplicatePolicy,
}

/// Scale a recipe and evaluate it against one stock snapshot
pub fn evaluate_recipe(
    config: &PlannerConfig,
    recipe: &Recipe,
    target_quantity: f64,
    stock: Vec<RawMaterialStock>,
) -> Result<Evaluation> {
    let scaled = scale(recipe, target_quantity)?;
    let index = StockIndex::build(stock, config.duplicates)?;
    Ok(evaluate(&config.units, &scaled, &index))
}

/// Build the commit request for an evaluated recipe.
///
/// Fails with [`PlannerError::InsufficientStock`] naming every blocked
/// ingredient; nothing partial is ever produced.
pub fn build_production_request(
    vendor_id: &str,
    recipe: &Recipe,
    evaluation: &Evaluation,
) -> Result<ProductionRequest> {
    validate_target(evaluation.target_quantity)?;

    let blocked = evaluation.insufficient();
    if !blocked.is_empty() {
        return Err(PlannerError::InsufficientStock {
            ingredients: blocked,
        });
    }

    // sufficient implies matched and converted, so unit is the stock unit
    let raw_usages: Vec<RawUsage> = evaluation
        .ingredients
        .iter()
        .filter_map(|ingredient| {
            ingredient.raw_item_id.as_ref().map(|raw_item_id| RawUsage {
                raw_item_id: raw_item_id.clone(),
                quantity: ingredient.required_qty,
                unit: ingredient.unit.clone(),
            })
        })
        .collect();

    let request = match recipe.output_type {
        OutputType::Retail => ProductionRequest::Retail(RetailProductionRequest {
            vendor_id: vendor_id.to_string(),
            quantity: evaluation.target_quantity,
            output_item_id: recipe.output_item_id.clone(),
            output_name: recipe.title.clone(),
            raw_usages,
        }),
        OutputType::Produce => ProductionRequest::Produce(ProduceProductionRequest {
            vendor_id: vendor_id.to_string(),
            raw_usages,
            output_produce_item_id: recipe.output_item_id.clone(),
            output_name: recipe.title.clone(),
        }),
    };
    Ok(request)
}

/// Send a prepared request to the matching commit endpoint
pub async fn submit(
    service: &dyn ProductionService,
    request: &ProductionRequest,
) -> Result<CommitResponse, ServiceError> {
    match request {
        ProductionRequest::Retail(r) => service.commit_retail(r).await,
        ProductionRequest::Produce(p) => service.commit_produce(p).await,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlannerState {
    Idle,
    Selected {
        recipe: Recipe,
    },
    Scaled {
        recipe: Recipe,
        scaled: ScaledRecipe,
    },
    Evaluated {
        recipe: Recipe,
        scaled: ScaledRecipe,
        evaluation: Evaluation,
    },
    Committing {
        recipe: Recipe,
        scaled: ScaledRecipe,
        request: ProductionRequest,
    },
    Committed {
        recipe: Recipe,
        scaled: ScaledRecipe,
        response: CommitResponse,
    },
    Failed {
        recipe: Recipe,
        scaled: ScaledRecipe,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub enum PlannerEvent {
    SelectRecipe(Recipe),
    SetQuantity(f64),
    Evaluate(StockIndex),
    BeginCommit { vendor_id: String },
    CommitSucceeded(CommitResponse),
    CommitFailed(String),
    Reset,
}

impl PlannerState {
    pub fn name(&self) -> &'static str {
        match self {
            PlannerState::Idle => "idle",
            PlannerState::Selected { .. } => "selected",
            PlannerState::Scaled { .. } => "scaled",
            PlannerState::Evaluated { .. } => "evaluated",
            PlannerState::Committing { .. } => "committing",
            PlannerState::Committed { .. } => "committed",
            PlannerState::Failed { .. } => "failed",
        }
    }

    pub fn recipe(&self) -> Option<&Recipe> {
        match self {
            PlannerState::Idle => None,
            PlannerState::Selected { recipe }
            | PlannerState::Scaled { recipe, .. }
            | PlannerState::Evaluated { recipe, .. }
            | PlannerState::Committing { recipe, .. }
            | PlannerState::Committed { recipe, .. }
            | PlannerState::Failed { recipe, .. } => Some(recipe),
        }
    }

    fn scaled(&self) -> Option<&ScaledRecipe> {
        match self {
            PlannerState::Idle | PlannerState::Selected { .. } => None,
            PlannerState::Scaled { scaled, .. }
            | PlannerState::Evaluated { scaled, .. }
            | PlannerState::Committing { scaled, .. }
            | PlannerState::Committed { scaled, .. }
            | PlannerState::Failed { scaled, .. } => Some(scaled),
        }
    }

    fn invalid(&self, action: &'static str) -> PlannerError {
        PlannerError::InvalidTransition {
            from: self.name(),
            action,
        }
    }

    /// Apply one event. The current state is left untouched on error.
    pub fn transition(&self, event: PlannerEvent, config: &PlannerConfig) -> Result<PlannerState> {
        if let PlannerState::Committing { .. } = self {
            match event {
                PlannerEvent::CommitSucceeded(_)
                | PlannerEvent::CommitFailed(_)
                | PlannerEvent::Reset => {}
                _ => return Err(self.invalid("change the plan")),
            }
        }

        match event {
            PlannerEvent::Reset => Ok(PlannerState::Idle),

            PlannerEvent::SelectRecipe(recipe) => Ok(PlannerState::Selected { recipe }),

            PlannerEvent::SetQuantity(quantity) => {
                let recipe = self
                    .recipe()
                    .ok_or_else(|| PlannerError::validation("no recipe selected"))?;
                let scaled = scale(recipe, quantity)?;
                Ok(PlannerState::Scaled {
                    recipe: recipe.clone(),
                    scaled,
                })
            }

            PlannerEvent::Evaluate(index) => {
                let recipe = self
                    .recipe()
                    .ok_or_else(|| PlannerError::validation("no recipe selected"))?;
                let scaled = self
                    .scaled()
                    .ok_or_else(|| PlannerError::validation("no target quantity set"))?;
                let evaluation = evaluate(&config.units, scaled, &index);
                Ok(PlannerState::Evaluated {
                    recipe: recipe.clone(),
                    scaled: scaled.clone(),
                    evaluation,
                })
            }

            PlannerEvent::BeginCommit { vendor_id } => match self {
                PlannerState::Evaluated {
                    recipe,
                    scaled,
                    evaluation,
                } => {
                    let request = build_production_request(&vendor_id, recipe, evaluation)?;
                    Ok(PlannerState::Committing {
                        recipe: recipe.clone(),
                        scaled: scaled.clone(),
                        request,
                    })
                }
                PlannerState::Idle => Err(PlannerError::validation("no recipe selected")),
                _ => Err(self.invalid("commit")),
            },

            PlannerEvent::CommitSucceeded(response) => match self {
                PlannerState::Committing { recipe, scaled, .. } => Ok(PlannerState::Committed {
                    recipe: recipe.clone(),
                    scaled: scaled.clone(),
                    response,
                }),
                _ => Err(self.invalid("complete a commit")),
            },

            PlannerEvent::CommitFailed(reason) => match self {
                PlannerState::Committing { recipe, scaled, .. } => Ok(PlannerState::Failed {
                    recipe: recipe.clone(),
                    scaled: scaled.clone(),
                    reason,
                }),
                _ => Err(self.invalid("fail a commit")),
            },
        }
    }
}

/// Token identifying the selection a stock fetch was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotTicket {
    generation: u64,
}

/// Drives one vendor's planning flow against its collaborators
#[derive(Debug)]
pub struct PlanningSession {
    config: PlannerConfig,
    vendor_id: String,
    state: PlannerState,
    generation: u64,
}

impl PlanningSession {
    pub fn new(vendor_id: impl Into<String>, config: PlannerConfig) -> Self {
        Self {
            config,
            vendor_id: vendor_id.into(),
            state: PlannerState::Idle,
            generation: 0,
        }
    }

    pub fn state(&self) -> &PlannerState {
        &self.state
    }

    pub fn evaluation(&self) -> Option<&Evaluation> {
        match &self.state {
            PlannerState::Evaluated { evaluation, .. } => Some(evaluation),
            _ => None,
        }
    }

    fn apply(&mut self, event: PlannerEvent) -> Result<()> {
        self.state = self.state.transition(event, &self.config)?;
        Ok(())
    }

    pub fn select_recipe(&mut self, recipe: Recipe) -> Result<()> {
        self.apply(PlannerEvent::SelectRecipe(recipe))?;
        self.generation += 1;
        Ok(())
    }

    pub fn set_quantity(&mut self, quantity: f64) -> Result<()> {
        self.apply(PlannerEvent::SetQuantity(quantity))?;
        self.generation += 1;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.state = PlannerState::Idle;
        self.generation += 1;
    }

    /// Start a stock fetch. Any ticket issued earlier becomes stale.
    pub fn begin_refresh(&mut self) -> SnapshotTicket {
        self.generation += 1;
        SnapshotTicket {
            generation: self.generation,
        }
    }

    /// Evaluate against a fetched snapshot. Returns false, leaving the state
    /// alone, when the ticket has been superseded.
    pub fn apply_snapshot(
        &mut self,
        ticket: SnapshotTicket,
        stock: Vec<RawMaterialStock>,
    ) -> Result<bool> {
        if ticket.generation != self.generation {
            warn!(
                ticket = ticket.generation,
                current = self.generation,
                "discarding stale stock snapshot"
            );
            return Ok(false);
        }
        let index = StockIndex::build(stock, self.config.duplicates)?;
        self.apply(PlannerEvent::Evaluate(index))?;
        Ok(true)
    }

    /// Fetch a fresh snapshot and evaluate the current selection
    pub async fn refresh(&mut self, provider: &dyn RawMaterialProvider) -> Result<&Evaluation> {
        let ticket = self.begin_refresh();
        let stock = provider.raw_materials(&self.vendor_id).await?;
        self.apply_snapshot(ticket, stock)?;
        self.evaluation()
            .ok_or_else(|| PlannerError::validation("no evaluation available"))
    }

    /// Commit the last evaluation. The service is only called when every
    /// ingredient is sufficient.
    pub async fn commit(&mut self, service: &dyn ProductionService) -> Result<CommitResponse> {
        self.apply(PlannerEvent::BeginCommit {
            vendor_id: self.vendor_id.clone(),
        })?;
        let PlannerState::Committing { request, .. } = &self.state else {
            return Err(self.state.invalid("commit"));
        };
        let request = request.clone();

        info!(
            vendor = %self.vendor_id,
            output = %request.output_type(),
            raw_usages = request.raw_usages().len(),
            "submitting production commit"
        );

        match submit(service, &request).await {
            Ok(response) if response.success => {
                info!(message = %response.message, "production committed");
                self.apply(PlannerEvent::CommitSucceeded(response.clone()))?;
                Ok(response)
            }
            Ok(response) => {
                warn!(message = %response.message, "production commit rejected");
                self.apply(PlannerEvent::CommitFailed(response.message.clone()))?;
                Err(ServiceError::Rejected(response.message).into())
            }
            Err(err) => {
                warn!(error = %err, "production commit failed");
                self.apply(PlannerEvent::CommitFailed(err.to_string()))?;
                Err(err.into())
            }
        }
    }
}

/// Human-readable overview of one evaluation
#[derive(Debug)]
pub struct PlanSummary {
    pub recipe_title: String,
    pub output_type: OutputType,
    pub target_quantity: f64,
    pub feasible: bool,
    pub max_producible: Option<f64>,
    pub lines: Vec<(String, f64, f64, String, &'static str)>,
}

impl PlanSummary {
    pub fn new(recipe: &Recipe, evaluation: &Evaluation) -> Self {
        use crate::models::IngredientStatus;

        let lines = evaluation
            .ingredients
            .iter()
            .map(|i| {
                let status = match i.status {
                    IngredientStatus::Sufficient => "ok",
                    IngredientStatus::Short => "short",
                    IngredientStatus::Unmatched => "not in stock",
                    IngredientStatus::IncompatibleUnits => "unit mismatch",
                };
                (i.name.clone(), i.required_qty, i.available, i.unit.clone(), status)
            })
            .collect();

        PlanSummary {
            recipe_title: recipe.title.clone(),
            output_type: recipe.output_type,
            target_quantity: evaluation.target_quantity,
            feasible: evaluation.is_feasible(),
            max_producible: evaluation.max_producible(),
            lines,
        }
    }
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Production Plan ===")?;
        writeln!(
            f,
            "Recipe: {} ({}) x {}",
            self.recipe_title, self.output_type, self.target_quantity
        )?;
        writeln!(f)?;

        writeln!(
            f,
            "{:<24} {:>12} {:>12} {:<8} {}",
            "Ingredient", "Required", "Available", "Unit", "Status"
        )?;
        writeln!(f, "{}", "-".repeat(70))?;
        for (name, required, available, unit, status) in &self.lines {
            writeln!(
                f,
                "{:<24} {:>12.3} {:>12.3} {:<8} {}",
                name, required, available, unit, status
            )?;
        }
        writeln!(f)?;

        writeln!(f, "Feasible: {}", if self.feasible { "yes" } else { "no" })?;
        match self.max_producible {
            Some(max) => writeln!(f, "Max producible: {:.0}", max.floor())?,
            None => writeln!(f, "Max producible: unknown")?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Ingredient;
    use crate::provider::{RecordingProductionService, StaticSnapshot};

    fn bread(output_type: OutputType) -> Recipe {
        Recipe {
            id: "r1".to_string(),
            title: "Bread".to_string(),
            servings: 4,
            ingredients: vec![Ingredient {
                name: "Flour".to_string(),
                quantity: 200.0,
                unit: "g".to_string(),
                notes: None,
            }],
            output_type,
            output_item_id: "bread".to_string(),
        }
    }

    fn flour(closing: f64, unit: &str) -> Vec<RawMaterialStock> {
        vec![RawMaterialStock {
            item_id: "rm-flour".to_string(),
            name: "flour".to_string(),
            opening_amount: 0.0,
            closing_amount: closing,
            unit: unit.to_string(),
        }]
    }

    #[test]
    fn test_commit_from_idle_is_rejected() {
        let state = PlannerState::Idle;
        let result = state.transition(
            PlannerEvent::BeginCommit {
                vendor_id: "v1".to_string(),
            },
            &PlannerConfig::default(),
        );
        assert!(matches!(result, Err(PlannerError::Validation(_))));
    }

    #[test]
    fn test_commit_requires_evaluation() {
        let config = PlannerConfig::default();
        let state = PlannerState::Idle
            .transition(PlannerEvent::SelectRecipe(bread(OutputType::Retail)), &config)
            .unwrap()
            .transition(PlannerEvent::SetQuantity(8.0), &config)
            .unwrap();
        let result = state.transition(
            PlannerEvent::BeginCommit {
                vendor_id: "v1".to_string(),
            },
            &config,
        );
        assert!(matches!(
            result,
            Err(PlannerError::InvalidTransition { from: "scaled", .. })
        ));
    }

    #[test]
    fn test_quantity_change_discards_evaluation() {
        let mut session = PlanningSession::new("v1", PlannerConfig::default());
        session.select_recipe(bread(OutputType::Retail)).unwrap();
        session.set_quantity(8.0).unwrap();
        let ticket = session.begin_refresh();
        assert!(session.apply_snapshot(ticket, flour(500.0, "g")).unwrap());
        assert!(session.evaluation().is_some());

        session.set_quantity(4.0).unwrap();
        assert_eq!(session.state().name(), "scaled");
        assert!(session.evaluation().is_none());
    }

    #[test]
    fn test_stale_snapshot_is_ignored() {
        let mut session = PlanningSession::new("v1", PlannerConfig::default());
        session.select_recipe(bread(OutputType::Retail)).unwrap();
        session.set_quantity(8.0).unwrap();

        let stale = session.begin_refresh();
        session.set_quantity(12.0).unwrap();
        let fresh = session.begin_refresh();

        assert!(!session.apply_snapshot(stale, flour(500.0, "g")).unwrap());
        assert_eq!(session.state().name(), "scaled");

        assert!(session.apply_snapshot(fresh, flour(500.0, "g")).unwrap());
        let evaluation = session.evaluation().unwrap();
        assert_eq!(evaluation.ingredients[0].required_qty, 600.0);
        assert!(!evaluation.is_feasible());
    }

    #[test]
    fn test_produce_request_shape() {
        let config = PlannerConfig::default();
        let recipe = bread(OutputType::Produce);
        let evaluation = evaluate_recipe(&config, &recipe, 8.0, flour(1.0, "kg")).unwrap();
        let request = build_production_request("v1", &recipe, &evaluation).unwrap();
        match request {
            ProductionRequest::Produce(p) => {
                assert_eq!(p.output_produce_item_id, "bread");
                assert_eq!(p.raw_usages.len(), 1);
                assert!((p.raw_usages[0].quantity - 0.4).abs() < 1e-12);
                assert_eq!(p.raw_usages[0].unit, "kg");
            }
            other => panic!("expected produce request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_session_commit_round() {
        let snapshot = StaticSnapshot {
            stock: flour(500.0, "g"),
            ..Default::default()
        };
        let service = RecordingProductionService::new();
        let mut session = PlanningSession::new("v1", PlannerConfig::default());
        session.select_recipe(bread(OutputType::Retail)).unwrap();
        session.set_quantity(8.0).unwrap();
        session.refresh(&snapshot).await.unwrap();

        let response = session.commit(&service).await.unwrap();
        assert!(response.success);
        assert_eq!(session.state().name(), "committed");

        let commits = service.commits().unwrap();
        match &commits[0] {
            ProductionRequest::Retail(r) => {
                assert_eq!(r.quantity, 8.0);
                assert_eq!(r.output_item_id, "bread");
                assert_eq!(r.raw_usages[0].raw_item_id, "rm-flour");
                assert_eq!(r.raw_usages[0].quantity, 400.0);
            }
            other => panic!("expected retail request, got {other:?}"),
        }

        // committed plans can be re-evaluated against a fresh snapshot
        session.refresh(&snapshot).await.unwrap();
        assert_eq!(session.state().name(), "evaluated");
    }

    #[test]
    fn test_summary_display() {
        let config = PlannerConfig::default();
        let recipe = bread(OutputType::Retail);
        let evaluation = evaluate_recipe(&config, &recipe, 8.0, flour(500.0, "g")).unwrap();
        let text = PlanSummary::new(&recipe, &evaluation).to_string();
        assert!(text.contains("Bread (retail) x 8"));
        assert!(text.contains("Feasible: yes"));
        assert!(text.contains("Max producible: 10"));
    }
}
