use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::ports::{Page, SagaStore, StoreError, StoreResult};
use crate::saga::LeadConversionSaga;
use crate::state_machine::SagaState;

/// Process-local [`SagaStore`] for tests and single-node deployments.
///
/// Sagas are keyed by id in a `DashMap`; the `(tenant, idempotency key)`
/// index sits behind one `RwLock` so key reservation is atomic.
#[derive(Debug, Default)]
pub struct InMemorySagaStore {
    sagas: DashMap<Uuid, LeadConversionSaga>,
    idempotency_index: RwLock<HashMap<(Uuid, String), Uuid>>,
}

impl InMemorySagaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sagas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sagas.is_empty()
    }

    fn collect<F>(&self, mut predicate: F) -> Vec<LeadConversionSaga>
    where
        F: FnMut(&LeadConversionSaga) -> bool,
    {
        let mut matches: Vec<_> = self
            .sagas
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matches.sort_by_key(|saga| saga.created_at);
        matches
    }

    fn paged(matches: Vec<LeadConversionSaga>, page: Page) -> (Vec<LeadConversionSaga>, usize) {
        let total = matches.len();
        let items = matches
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect();
        (items, total)
    }
}

fn cutoff(older_than: Duration) -> chrono::DateTime<Utc> {
    let age =
        chrono::Duration::from_std(older_than).unwrap_or_else(|_| chrono::Duration::days(365_000));
    Utc::now()
        .checked_sub_signed(age)
        .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC)
}

#[async_trait]
impl SagaStore for InMemorySagaStore {
    async fn create(&self, saga: &mut LeadConversionSaga) -> StoreResult<()> {
        let mut index = self.idempotency_index.write();
        let key = (saga.tenant_id, saga.idempotency_key.clone());

        if let Some(existing) = index.get(&key) {
            return Err(StoreError::DuplicateIdempotencyKey {
                key: saga.idempotency_key.clone(),
                saga_id: *existing,
            });
        }
        if self.sagas.contains_key(&saga.id) {
            return Err(StoreError::AlreadyExists { saga_id: saga.id });
        }

        saga.version = 1;
        index.insert(key, saga.id);
        self.sagas.insert(saga.id, saga.clone());
        debug!(saga_id = %saga.id, "Saga created in memory store");
        Ok(())
    }

    async fn update(&self, saga: &mut LeadConversionSaga) -> StoreResult<()> {
        let mut stored = self
            .sagas
            .get_mut(&saga.id)
            .ok_or(StoreError::NotFound { saga_id: saga.id })?;

        if stored.version != saga.version {
            return Err(StoreError::VersionConflict {
                saga_id: saga.id,
                expected: saga.version,
                actual: stored.version,
            });
        }

        saga.version += 1;
        *stored = saga.clone();
        Ok(())
    }

    async fn get_by_id(
        &self,
        tenant_id: Uuid,
        saga_id: Uuid,
    ) -> StoreResult<Option<LeadConversionSaga>> {
        Ok(self
            .sagas
            .get(&saga_id)
            .filter(|saga| saga.tenant_id == tenant_id)
            .map(|saga| saga.clone()))
    }

    async fn get_by_lead_id(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
    ) -> StoreResult<Option<LeadConversionSaga>> {
        Ok(self
            .collect(|saga| saga.tenant_id == tenant_id && saga.lead_id == lead_id)
            .pop())
    }

    async fn get_by_idempotency_key(
        &self,
        tenant_id: Uuid,
        key: &str,
    ) -> StoreResult<Option<LeadConversionSaga>> {
        let saga_id = self
            .idempotency_index
            .read()
            .get(&(tenant_id, key.to_string()))
            .copied();

        Ok(saga_id.and_then(|id| self.sagas.get(&id).map(|saga| saga.clone())))
    }

    async fn get_pending_sagas(
        &self,
        older_than: Duration,
        limit: usize,
    ) -> StoreResult<Vec<LeadConversionSaga>> {
        let cutoff = cutoff(older_than);
        let mut pending = self.collect(|saga| {
            matches!(saga.state(), SagaState::Started | SagaState::Running)
                && saga.updated_at <= cutoff
        });
        pending.truncate(limit);
        Ok(pending)
    }

    async fn get_by_state(
        &self,
        tenant_id: Uuid,
        state: SagaState,
        page: Page,
    ) -> StoreResult<(Vec<LeadConversionSaga>, usize)> {
        let matches = self.collect(|saga| saga.tenant_id == tenant_id && saga.state() == state);
        Ok(Self::paged(matches, page))
    }

    async fn get_compensating_sagas(&self, limit: usize) -> StoreResult<Vec<LeadConversionSaga>> {
        let mut compensating = self.collect(|saga| saga.state() == SagaState::Compensating);
        compensating.truncate(limit);
        Ok(compensating)
    }

    async fn get_failed_sagas(
        &self,
        tenant_id: Uuid,
        page: Page,
    ) -> StoreResult<(Vec<LeadConversionSaga>, usize)> {
        self.get_by_state(tenant_id, SagaState::Failed, page).await
    }

    async fn delete_old_completed_sagas(&self, older_than: Duration) -> StoreResult<usize> {
        let cutoff = cutoff(older_than);
        let expired = self.collect(|saga| {
            saga.state() == SagaState::Completed
                && saga.completed_at().is_some_and(|at| at <= cutoff)
        });

        let mut index = self.idempotency_index.write();
        for saga in &expired {
            self.sagas.remove(&saga.id);
            index.remove(&(saga.tenant_id, saga.idempotency_key.clone()));
        }
        Ok(expired.len())
    }

    async fn count_by_state(&self, tenant_id: Uuid) -> StoreResult<HashMap<SagaState, usize>> {
        let mut counts = HashMap::new();
        for entry in self.sagas.iter() {
            if entry.tenant_id == tenant_id {
                *counts.entry(entry.state()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}
