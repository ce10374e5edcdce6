//! Collaborator interfaces: recipe and stock snapshots, production commits

use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::models::{
    CommitResponse, ProduceProductionRequest, ProductionRequest, RawMaterialStock, RecipeCatalog,
    RetailProductionRequest,
};

/// Source of a vendor's recipes, partitioned by output type
#[async_trait]
pub trait RecipeProvider: Send + Sync {
    async fn recipes(&self, vendor_id: &str) -> Result<RecipeCatalog, ServiceError>;
}

/// Source of a vendor's raw-material stock snapshot
#[async_trait]
pub trait RawMaterialProvider: Send + Sync {
    async fn raw_materials(&self, vendor_id: &str) -> Result<Vec<RawMaterialStock>, ServiceError>;
}

/// Production/inventory service that applies a commit.
///
/// Commits are not idempotent. The service is the authoritative check for
/// stock; the planner's evaluation is advisory.
#[async_trait]
pub trait ProductionService: Send + Sync {
    async fn commit_retail(
        &self,
        request: &RetailProductionRequest,
    ) -> Result<CommitResponse, ServiceError>;

    async fn commit_produce(
        &self,
        request: &ProduceProductionRequest,
    ) -> Result<CommitResponse, ServiceError>;
}

/// Fixed snapshots, for tests and offline use
#[derive(Debug, Clone, Default)]
pub struct StaticSnapshot {
    pub catalog: RecipeCatalog,
    pub stock: Vec<RawMaterialStock>,
}

#[async_trait]
impl RecipeProvider for StaticSnapshot {
    async fn recipes(&self, _vendor_id: &str) -> Result<RecipeCatalog, ServiceError> {
        Ok(self.catalog.clone())
    }
}

#[async_trait]
impl RawMaterialProvider for StaticSnapshot {
    async fn raw_materials(&self, _vendor_id: &str) -> Result<Vec<RawMaterialStock>, ServiceError> {
        Ok(self.stock.clone())
    }
}

/// Records every commit it receives and answers with success
pub struct RecordingProductionService {
    commits: RwLock<Vec<ProductionRequest>>,
}

impl RecordingProductionService {
    pub fn new() -> Self {
        Self {
            commits: RwLock::new(Vec::new()),
        }
    }

    pub fn commits(&self) -> Result<Vec<ProductionRequest>, ServiceError> {
        let commits = self
            .commits
            .read()
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;
        Ok(commits.clone())
    }

    fn record(&self, request: ProductionRequest) -> Result<CommitResponse, ServiceError> {
        let mut commits = self
            .commits
            .write()
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;
        let message = format!(
            "recorded {} commit with {} raw usages",
            request.output_type(),
            request.raw_usages().len()
        );
        commits.push(request);
        Ok(CommitResponse {
            success: true,
            message,
        })
    }
}

impl Default for RecordingProductionService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProductionService for RecordingProductionService {
    async fn commit_retail(
        &self,
        request: &RetailProductionRequest,
    ) -> Result<CommitResponse, ServiceError> {
        self.record(ProductionRequest::Retail(request.clone()))
    }

    async fn commit_produce(
        &self,
        request: &ProduceProductionRequest,
    ) -> Result<CommitResponse, ServiceError> {
        self.record(ProductionRequest::Produce(request.clone()))
    }
}
