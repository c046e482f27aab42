//! In-memory collaborators with failure injection and call recording.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crm_sales_core::domain::{CreateCustomerRequest, Customer, Lead, Opportunity, Pipeline};
use crm_sales_core::events::{DomainEvent, PublishError};
use crm_sales_core::orchestration::{CompensationHandler, RequestContext, StepResult};
use crm_sales_core::ports::{
    CustomerService, DomainEventPublisher, LeadRepository, OpportunityRepository, Page,
    PipelineRepository, RepositoryError, RepositoryResult, SagaStore, ServiceError, ServiceResult,
    StoreError, StoreResult,
};
use crm_sales_core::saga::{LeadConversionSaga, SagaStep, StepType};
use crm_sales_core::state_machine::SagaState;
use crm_sales_core::InMemorySagaStore;

/// Ordered record of side-effecting collaborator calls shared by all mocks
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.0.lock().iter().filter(|c| c.as_str() == call).count()
    }
}

// ===== Leads =====

pub struct InMemoryLeadRepository {
    leads: Mutex<HashMap<Uuid, Lead>>,
    pub fail_updates: AtomicBool,
    log: CallLog,
}

impl InMemoryLeadRepository {
    pub fn new(log: CallLog) -> Self {
        Self {
            leads: Mutex::new(HashMap::new()),
            fail_updates: AtomicBool::new(false),
            log,
        }
    }

    pub fn insert(&self, lead: Lead) {
        self.leads.lock().insert(lead.id, lead);
    }

    pub fn get(&self, lead_id: Uuid) -> Option<Lead> {
        self.leads.lock().get(&lead_id).cloned()
    }
}

#[async_trait]
impl LeadRepository for InMemoryLeadRepository {
    async fn get_by_id(&self, tenant_id: Uuid, lead_id: Uuid) -> RepositoryResult<Lead> {
        self.leads
            .lock()
            .get(&lead_id)
            .filter(|lead| lead.tenant_id == tenant_id)
            .cloned()
            .ok_or(RepositoryError::NotFound {
                entity: "lead",
                id: lead_id,
            })
    }

    async fn update(&self, lead: &Lead) -> RepositoryResult<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(RepositoryError::Storage("lead store unavailable".to_string()));
        }
        self.log.push(format!("lead.update:{}", lead.status));
        self.leads.lock().insert(lead.id, lead.clone());
        Ok(())
    }
}

// ===== Opportunities =====

pub struct InMemoryOpportunityRepository {
    opportunities: Mutex<HashMap<Uuid, Opportunity>>,
    pub fail_creates: AtomicBool,
    pub fail_deletes: AtomicBool,
    log: CallLog,
}

impl InMemoryOpportunityRepository {
    pub fn new(log: CallLog) -> Self {
        Self {
            opportunities: Mutex::new(HashMap::new()),
            fail_creates: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            log,
        }
    }

    pub fn get(&self, opportunity_id: Uuid) -> Option<Opportunity> {
        self.opportunities.lock().get(&opportunity_id).cloned()
    }

    pub fn remove(&self, opportunity_id: Uuid) {
        self.opportunities.lock().remove(&opportunity_id);
    }

    pub fn len(&self) -> usize {
        self.opportunities.lock().len()
    }
}

#[async_trait]
impl OpportunityRepository for InMemoryOpportunityRepository {
    async fn create(&self, opportunity: &Opportunity) -> RepositoryResult<()> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(RepositoryError::Storage("opportunity insert failed".to_string()));
        }
        self.log.push("opportunity.create");
        self.opportunities
            .lock()
            .insert(opportunity.id, opportunity.clone());
        Ok(())
    }

    async fn delete(&self, _tenant_id: Uuid, opportunity_id: Uuid) -> RepositoryResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Storage("opportunity delete failed".to_string()));
        }
        match self.opportunities.lock().remove(&opportunity_id) {
            Some(_) => {
                self.log.push("opportunity.delete");
                Ok(())
            }
            None => Err(RepositoryError::NotFound {
                entity: "opportunity",
                id: opportunity_id,
            }),
        }
    }
}

// ===== Pipelines =====

#[derive(Default)]
pub struct InMemoryPipelineRepository {
    pipelines: Mutex<HashMap<Uuid, Pipeline>>,
}

impl InMemoryPipelineRepository {
    pub fn insert(&self, pipeline: Pipeline) {
        self.pipelines.lock().insert(pipeline.id, pipeline);
    }
}

#[async_trait]
impl PipelineRepository for InMemoryPipelineRepository {
    async fn get_by_id(&self, tenant_id: Uuid, pipeline_id: Uuid) -> RepositoryResult<Pipeline> {
        self.pipelines
            .lock()
            .get(&pipeline_id)
            .filter(|pipeline| pipeline.tenant_id == tenant_id)
            .cloned()
            .ok_or(RepositoryError::NotFound {
                entity: "pipeline",
                id: pipeline_id,
            })
    }
}

// ===== Customers =====

pub struct MockCustomerService {
    customers: Mutex<HashMap<Uuid, Customer>>,
    pub fail_creates: AtomicBool,
    pub fail_deletes: AtomicBool,
    deletion_supported: bool,
    delay: Option<Duration>,
    created: AtomicUsize,
    log: CallLog,
}

impl MockCustomerService {
    pub fn new(log: CallLog) -> Self {
        Self {
            customers: Mutex::new(HashMap::new()),
            fail_creates: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            deletion_supported: false,
            delay: None,
            created: AtomicUsize::new(0),
            log,
        }
    }

    pub fn with_deletion(mut self) -> Self {
        self.deletion_supported = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn insert(&self, customer: Customer) {
        self.customers.lock().insert(customer.id, customer);
    }

    pub fn remove(&self, customer_id: Uuid) {
        self.customers.lock().remove(&customer_id);
    }

    pub fn exists(&self, customer_id: Uuid) -> bool {
        self.customers.lock().contains_key(&customer_id)
    }

    pub fn len(&self) -> usize {
        self.customers.lock().len()
    }
}

#[async_trait]
impl CustomerService for MockCustomerService {
    async fn create_customer(
        &self,
        _tenant_id: Uuid,
        request: &CreateCustomerRequest,
    ) -> ServiceResult<Customer> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(ServiceError::Unavailable("customer service down".to_string()));
        }

        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let customer = Customer {
            id: Uuid::new_v4(),
            code: format!("CUS-{n:04}"),
            name: request.name.clone(),
        };
        self.log.push("customer.create");
        self.insert(customer.clone());
        Ok(customer)
    }

    async fn get_customer(&self, _tenant_id: Uuid, customer_id: Uuid) -> ServiceResult<Customer> {
        self.customers
            .lock()
            .get(&customer_id)
            .cloned()
            .ok_or(ServiceError::CustomerNotFound { customer_id })
    }

    fn supports_deletion(&self) -> bool {
        self.deletion_supported
    }

    async fn delete_customer(&self, _tenant_id: Uuid, customer_id: Uuid) -> ServiceResult<()> {
        if !self.deletion_supported {
            return Err(ServiceError::Unsupported("delete_customer"));
        }
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ServiceError::Unavailable("customer service down".to_string()));
        }
        match self.customers.lock().remove(&customer_id) {
            Some(_) => {
                self.log.push("customer.delete");
                Ok(())
            }
            None => Err(ServiceError::CustomerNotFound { customer_id }),
        }
    }
}

// ===== Events =====

#[derive(Default)]
pub struct RecordingPublisher {
    batches: Mutex<Vec<Vec<DomainEvent>>>,
    pub fail: AtomicBool,
}

impl RecordingPublisher {
    pub fn event_types(&self) -> Vec<String> {
        self.batches
            .lock()
            .iter()
            .flatten()
            .map(|event| event.event_type.clone())
            .collect()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }
}

#[async_trait]
impl DomainEventPublisher for RecordingPublisher {
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), PublishError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PublishError::Rejected("broker unavailable".to_string()));
        }
        self.batches.lock().push(events);
        Ok(())
    }
}

// ===== Saga store =====

/// Saga store whose `update` starts failing after a number of successful writes
pub struct FlakySagaStore {
    inner: InMemorySagaStore,
    remaining_updates: AtomicUsize,
}

impl FlakySagaStore {
    pub fn failing_after(successful_updates: usize) -> Self {
        Self {
            inner: InMemorySagaStore::new(),
            remaining_updates: AtomicUsize::new(successful_updates),
        }
    }

    pub fn allow_updates(&self, count: usize) {
        self.remaining_updates.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl SagaStore for FlakySagaStore {
    async fn create(&self, saga: &mut LeadConversionSaga) -> StoreResult<()> {
        self.inner.create(saga).await
    }

    async fn update(&self, saga: &mut LeadConversionSaga) -> StoreResult<()> {
        let allowed = self
            .remaining_updates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(StoreError::Backend("disk full".to_string()));
        }
        self.inner.update(saga).await
    }

    async fn get_by_id(
        &self,
        tenant_id: Uuid,
        saga_id: Uuid,
    ) -> StoreResult<Option<LeadConversionSaga>> {
        self.inner.get_by_id(tenant_id, saga_id).await
    }

    async fn get_by_lead_id(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
    ) -> StoreResult<Option<LeadConversionSaga>> {
        self.inner.get_by_lead_id(tenant_id, lead_id).await
    }

    async fn get_by_idempotency_key(
        &self,
        tenant_id: Uuid,
        key: &str,
    ) -> StoreResult<Option<LeadConversionSaga>> {
        self.inner.get_by_idempotency_key(tenant_id, key).await
    }

    async fn get_pending_sagas(
        &self,
        older_than: Duration,
        limit: usize,
    ) -> StoreResult<Vec<LeadConversionSaga>> {
        self.inner.get_pending_sagas(older_than, limit).await
    }

    async fn get_by_state(
        &self,
        tenant_id: Uuid,
        state: SagaState,
        page: Page,
    ) -> StoreResult<(Vec<LeadConversionSaga>, usize)> {
        self.inner.get_by_state(tenant_id, state, page).await
    }

    async fn get_compensating_sagas(&self, limit: usize) -> StoreResult<Vec<LeadConversionSaga>> {
        self.inner.get_compensating_sagas(limit).await
    }

    async fn get_failed_sagas(
        &self,
        tenant_id: Uuid,
        page: Page,
    ) -> StoreResult<(Vec<LeadConversionSaga>, usize)> {
        self.inner.get_failed_sagas(tenant_id, page).await
    }

    async fn delete_old_completed_sagas(&self, older_than: Duration) -> StoreResult<usize> {
        self.inner.delete_old_completed_sagas(older_than).await
    }

    async fn count_by_state(&self, tenant_id: Uuid) -> StoreResult<HashMap<SagaState, usize>> {
        self.inner.count_by_state(tenant_id).await
    }
}

// ===== Handler decorators =====

/// Records each compensation invocation before delegating
pub struct RecordingCompensation {
    step_type: StepType,
    inner: Arc<dyn CompensationHandler>,
    invocations: Arc<Mutex<Vec<StepType>>>,
}

impl RecordingCompensation {
    pub fn new(
        step_type: StepType,
        inner: Arc<dyn CompensationHandler>,
        invocations: Arc<Mutex<Vec<StepType>>>,
    ) -> Self {
        Self {
            step_type,
            inner,
            invocations,
        }
    }
}

#[async_trait]
impl CompensationHandler for RecordingCompensation {
    async fn compensate(
        &self,
        ctx: &RequestContext,
        saga: &LeadConversionSaga,
        step: &SagaStep,
    ) -> StepResult<Option<String>> {
        self.invocations.lock().push(self.step_type);
        self.inner.compensate(ctx, saga, step).await
    }
}
