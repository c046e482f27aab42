//! Test data builders and the orchestrator harness used by the integration suites.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crm_sales_core::domain::{
    Customer, Lead, LeadCompany, LeadContact, LeadStatus, Money, Pipeline, Stage, StageType,
};
use crm_sales_core::orchestration::{
    CompensationHandlerRegistry, LeadConversionOrchestrator, RequestContext, SagaCollaborators,
    StepHandlerRegistry,
};
use crm_sales_core::ports::SagaStore;
use crm_sales_core::saga::{generate_idempotency_key, LeadConversionRequest, LeadConversionSaga};
use crm_sales_core::{InMemorySagaStore, SagaConfig};

use super::mocks::{
    CallLog, InMemoryLeadRepository, InMemoryOpportunityRepository, InMemoryPipelineRepository,
    MockCustomerService, RecordingPublisher,
};

/// Builder for test leads
pub struct LeadBuilder {
    tenant_id: Uuid,
    status: LeadStatus,
    company_name: String,
    deleted: bool,
}

impl LeadBuilder {
    pub fn new(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            status: LeadStatus::Qualified,
            company_name: "Acme Corp".to_string(),
            deleted: false,
        }
    }

    pub fn with_status(mut self, status: LeadStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_company(mut self, name: &str) -> Self {
        self.company_name = name.to_string();
        self
    }

    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    pub fn build(self) -> Lead {
        let mut lead = Lead::new(
            self.tenant_id,
            LeadCompany {
                name: self.company_name,
                website: Some("https://acme.example".to_string()),
                industry: Some("Manufacturing".to_string()),
            },
            LeadContact {
                first_name: "Jane".to_string(),
                last_name: "Doe".to_string(),
                email: "jane.doe@acme.example".to_string(),
                phone: Some("+1-555-0100".to_string()),
                job_title: Some("CTO".to_string()),
            },
            Money::new(5_000_000, "USD"),
        );
        lead.status = self.status;
        if self.deleted {
            lead.deleted_at = Some(chrono::Utc::now());
        }
        lead
    }
}

/// Active pipeline with a discovery and a proposal stage
pub fn active_pipeline(tenant_id: Uuid) -> Pipeline {
    Pipeline::new(tenant_id, "Enterprise Sales", "USD")
        .with_stage(Stage::new("Discovery", StageType::Qualifying, 1, 20))
        .with_stage(Stage::new("Proposal", StageType::Negotiating, 2, 50))
}

/// Collaborators, store and fixtures for one tenant
pub struct TestHarness {
    pub tenant_id: Uuid,
    pub actor_id: Uuid,
    pub log: CallLog,
    pub leads: Arc<InMemoryLeadRepository>,
    pub opportunities: Arc<InMemoryOpportunityRepository>,
    pub pipelines: Arc<InMemoryPipelineRepository>,
    pub customers: Arc<MockCustomerService>,
    pub publisher: Arc<RecordingPublisher>,
    pub store: Arc<InMemorySagaStore>,
    pub config: SagaConfig,
    pub lead: Lead,
    pub pipeline: Pipeline,
}

impl TestHarness {
    /// Qualified lead, active pipeline, customer service without deletion
    pub fn new() -> Self {
        Self::with_customer_service(|log| MockCustomerService::new(log))
    }

    pub fn with_customer_service(build: impl FnOnce(CallLog) -> MockCustomerService) -> Self {
        let tenant_id = Uuid::new_v4();
        let log = CallLog::default();

        let leads = Arc::new(InMemoryLeadRepository::new(log.clone()));
        let lead = LeadBuilder::new(tenant_id).build();
        leads.insert(lead.clone());

        let pipelines = Arc::new(InMemoryPipelineRepository::default());
        let pipeline = active_pipeline(tenant_id);
        pipelines.insert(pipeline.clone());

        Self {
            tenant_id,
            actor_id: Uuid::new_v4(),
            opportunities: Arc::new(InMemoryOpportunityRepository::new(log.clone())),
            customers: Arc::new(build(log.clone())),
            publisher: Arc::new(RecordingPublisher::default()),
            store: Arc::new(InMemorySagaStore::new()),
            config: SagaConfig::default(),
            leads,
            pipelines,
            log,
            lead,
            pipeline,
        }
    }

    pub fn collaborators(&self) -> SagaCollaborators {
        SagaCollaborators::new(
            self.leads.clone(),
            self.opportunities.clone(),
            self.pipelines.clone(),
        )
        .with_customer_service(self.customers.clone())
        .with_publisher(self.publisher.clone())
    }

    pub fn orchestrator(&self) -> LeadConversionOrchestrator {
        LeadConversionOrchestrator::new(self.store.clone(), &self.collaborators(), &self.config)
    }

    pub fn orchestrator_with_store(&self, store: Arc<dyn SagaStore>) -> LeadConversionOrchestrator {
        LeadConversionOrchestrator::new(store, &self.collaborators(), &self.config)
    }

    pub fn orchestrator_with_registries(
        &self,
        step_handlers: StepHandlerRegistry,
        compensation_handlers: CompensationHandlerRegistry,
        step_timeout: Duration,
    ) -> LeadConversionOrchestrator {
        LeadConversionOrchestrator::with_registries(
            self.store.clone(),
            step_handlers,
            compensation_handlers,
            step_timeout,
        )
    }

    pub fn ctx(&self) -> RequestContext {
        RequestContext::new(self.tenant_id, self.actor_id)
    }

    pub fn create_customer_request(&self) -> LeadConversionRequest {
        LeadConversionRequest::create_customer(self.pipeline.id)
    }

    /// Register an existing customer and build a request that references it
    pub fn existing_customer_request(&self) -> (LeadConversionRequest, Customer) {
        let customer = Customer {
            id: Uuid::new_v4(),
            code: "CUS-9000".to_string(),
            name: "Acme Holdings".to_string(),
        };
        self.customers.insert(customer.clone());
        (
            LeadConversionRequest::existing_customer(self.pipeline.id, customer.id),
            customer,
        )
    }

    /// Build a saga for the harness lead without persisting it
    pub fn build_saga(&self, request: LeadConversionRequest) -> LeadConversionSaga {
        self.build_saga_for(self.lead.id, request)
    }

    pub fn build_saga_for(&self, lead_id: Uuid, request: LeadConversionRequest) -> LeadConversionSaga {
        let key = generate_idempotency_key(
            self.tenant_id,
            lead_id,
            self.actor_id,
            chrono::Utc::now(),
            self.config.idempotency_window(),
        );
        LeadConversionSaga::new(self.tenant_id, lead_id, key, self.actor_id, request)
    }

    /// Build a saga and create it in `store`
    pub async fn persisted_saga_in(
        &self,
        store: &dyn SagaStore,
        request: LeadConversionRequest,
    ) -> LeadConversionSaga {
        let mut saga = self.build_saga(request);
        store.create(&mut saga).await.expect("saga created");
        saga
    }

    pub async fn persisted_saga(&self, request: LeadConversionRequest) -> LeadConversionSaga {
        self.persisted_saga_in(self.store.as_ref(), request).await
    }

    /// Add another qualified lead for the same tenant
    pub fn add_lead(&self) -> Lead {
        let lead = LeadBuilder::new(self.tenant_id).build();
        self.leads.insert(lead.clone());
        lead
    }

    pub fn lead_status(&self) -> LeadStatus {
        self.leads.get(self.lead.id).expect("lead exists").status
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
