use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Lead, Opportunity, Pipeline};

/// Errors surfaced by the lead, opportunity and pipeline repositories
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Concurrent modification of {entity} {id}")]
    Conflict { entity: &'static str, id: Uuid },

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn get_by_id(&self, tenant_id: Uuid, lead_id: Uuid) -> RepositoryResult<Lead>;

    async fn update(&self, lead: &Lead) -> RepositoryResult<()>;
}

#[async_trait]
pub trait OpportunityRepository: Send + Sync {
    async fn create(&self, opportunity: &Opportunity) -> RepositoryResult<()>;

    /// Remove an opportunity; used when a conversion is rolled back
    async fn delete(&self, tenant_id: Uuid, opportunity_id: Uuid) -> RepositoryResult<()>;
}

#[async_trait]
pub trait PipelineRepository: Send + Sync {
    async fn get_by_id(&self, tenant_id: Uuid, pipeline_id: Uuid) -> RepositoryResult<Pipeline>;
}
