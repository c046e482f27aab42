use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::saga::LeadConversionSaga;
use crate::state_machine::SagaState;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Saga {saga_id} not found")]
    NotFound { saga_id: Uuid },

    #[error("Saga {saga_id} already exists")]
    AlreadyExists { saga_id: Uuid },

    #[error("Idempotency key {key} is already bound to saga {saga_id}")]
    DuplicateIdempotencyKey { key: String, saga_id: Uuid },

    #[error("Saga {saga_id} was modified concurrently (expected version {expected}, found {actual})")]
    VersionConflict {
        saga_id: Uuid,
        expected: i64,
        actual: i64,
    },

    #[error("Saga store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Offset pagination for listing queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// Durable checkpoint storage for conversion sagas.
///
/// `create` and `update` take the saga mutably so the store can stamp the new
/// version; `update` must reject a saga whose version is stale.
#[async_trait]
pub trait SagaStore: Send + Sync {
    async fn create(&self, saga: &mut LeadConversionSaga) -> StoreResult<()>;

    async fn update(&self, saga: &mut LeadConversionSaga) -> StoreResult<()>;

    async fn get_by_id(
        &self,
        tenant_id: Uuid,
        saga_id: Uuid,
    ) -> StoreResult<Option<LeadConversionSaga>>;

    /// Most recent saga for a lead
    async fn get_by_lead_id(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
    ) -> StoreResult<Option<LeadConversionSaga>>;

    async fn get_by_idempotency_key(
        &self,
        tenant_id: Uuid,
        key: &str,
    ) -> StoreResult<Option<LeadConversionSaga>>;

    /// Non-terminal sagas, across tenants, not updated for at least `older_than`
    async fn get_pending_sagas(
        &self,
        older_than: Duration,
        limit: usize,
    ) -> StoreResult<Vec<LeadConversionSaga>>;

    /// Sagas in `state` for a tenant, with the total count before paging
    async fn get_by_state(
        &self,
        tenant_id: Uuid,
        state: SagaState,
        page: Page,
    ) -> StoreResult<(Vec<LeadConversionSaga>, usize)>;

    async fn get_compensating_sagas(&self, limit: usize) -> StoreResult<Vec<LeadConversionSaga>>;

    /// Sagas left in `Failed`, awaiting operator review
    async fn get_failed_sagas(
        &self,
        tenant_id: Uuid,
        page: Page,
    ) -> StoreResult<(Vec<LeadConversionSaga>, usize)>;

    /// Delete `Completed` sagas finished at least `older_than` ago; returns the number removed
    async fn delete_old_completed_sagas(&self, older_than: Duration) -> StoreResult<usize>;

    async fn count_by_state(&self, tenant_id: Uuid) -> StoreResult<HashMap<SagaState, usize>>;
}
