//! # Step Handler Registries
//!
//! Maps each [`StepType`] to its forward handler and, for steps with side
//! effects, to its compensation handler.
//!
//! ## Key Features
//!
//! - **Exhaustive dispatch**: lookups are a `match` over `StepType`, so a new
//!   step type without a handler does not compile
//! - **Read-only steps** (`ValidateLead`, `LookupCustomer`) have no
//!   compensation entry and are skipped during rollback
//! - **Overrides** for swapping a single handler (tests, decorators)

use std::sync::Arc;

use super::handlers::{
    CompensationHandler, CreateCustomerCompensation, CreateCustomerHandler,
    CreateOpportunityCompensation, CreateOpportunityHandler, LookupCustomerHandler,
    MarkLeadConvertedCompensation, MarkLeadConvertedHandler, PublishEventsCompensation,
    PublishEventsHandler, StepHandler, ValidateLeadHandler,
};
use crate::ports::{
    CustomerService, DomainEventPublisher, LeadRepository, OpportunityRepository,
    PipelineRepository,
};
use crate::saga::{CustomerResolution, StepType};

/// Collaborators the conversion steps call into
#[derive(Clone)]
pub struct SagaCollaborators {
    pub leads: Arc<dyn LeadRepository>,
    pub opportunities: Arc<dyn OpportunityRepository>,
    pub pipelines: Arc<dyn PipelineRepository>,
    pub customers: Option<Arc<dyn CustomerService>>,
    pub publisher: Option<Arc<dyn DomainEventPublisher>>,
}

impl SagaCollaborators {
    pub fn new(
        leads: Arc<dyn LeadRepository>,
        opportunities: Arc<dyn OpportunityRepository>,
        pipelines: Arc<dyn PipelineRepository>,
    ) -> Self {
        Self {
            leads,
            opportunities,
            pipelines,
            customers: None,
            publisher: None,
        }
    }

    pub fn with_customer_service(mut self, customers: Arc<dyn CustomerService>) -> Self {
        self.customers = Some(customers);
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn DomainEventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }
}

/// Forward handler for every step type
pub struct StepHandlerRegistry {
    validate_lead: Arc<dyn StepHandler>,
    create_customer: Arc<dyn StepHandler>,
    lookup_customer: Arc<dyn StepHandler>,
    create_opportunity: Arc<dyn StepHandler>,
    mark_lead_converted: Arc<dyn StepHandler>,
    publish_events: Arc<dyn StepHandler>,
}

impl StepHandlerRegistry {
    pub fn new(collaborators: &SagaCollaborators) -> Self {
        let c = collaborators;
        Self {
            validate_lead: Arc::new(ValidateLeadHandler::new(
                c.leads.clone(),
                c.pipelines.clone(),
            )),
            create_customer: Arc::new(CreateCustomerHandler::new(
                c.leads.clone(),
                c.customers.clone(),
            )),
            lookup_customer: Arc::new(LookupCustomerHandler::new(c.customers.clone())),
            create_opportunity: Arc::new(CreateOpportunityHandler::new(
                c.leads.clone(),
                c.pipelines.clone(),
                c.opportunities.clone(),
            )),
            mark_lead_converted: Arc::new(MarkLeadConvertedHandler::new(c.leads.clone())),
            publish_events: Arc::new(PublishEventsHandler::new(c.publisher.clone())),
        }
    }

    pub fn handler_for(&self, step_type: StepType) -> &dyn StepHandler {
        match step_type {
            StepType::ValidateLead => self.validate_lead.as_ref(),
            StepType::ResolveCustomer(CustomerResolution::CreateNew) => {
                self.create_customer.as_ref()
            }
            StepType::ResolveCustomer(CustomerResolution::LookupExisting) => {
                self.lookup_customer.as_ref()
            }
            StepType::CreateOpportunity => self.create_opportunity.as_ref(),
            StepType::MarkLeadConverted => self.mark_lead_converted.as_ref(),
            StepType::PublishEvents => self.publish_events.as_ref(),
        }
    }

    /// Replace the handler for one step type
    pub fn override_handler(&mut self, step_type: StepType, handler: Arc<dyn StepHandler>) {
        let slot = match step_type {
            StepType::ValidateLead => &mut self.validate_lead,
            StepType::ResolveCustomer(CustomerResolution::CreateNew) => &mut self.create_customer,
            StepType::ResolveCustomer(CustomerResolution::LookupExisting) => {
                &mut self.lookup_customer
            }
            StepType::CreateOpportunity => &mut self.create_opportunity,
            StepType::MarkLeadConverted => &mut self.mark_lead_converted,
            StepType::PublishEvents => &mut self.publish_events,
        };
        *slot = handler;
    }
}

/// Compensation handler for every step type with a side effect
pub struct CompensationHandlerRegistry {
    create_customer: Arc<dyn CompensationHandler>,
    create_opportunity: Arc<dyn CompensationHandler>,
    mark_lead_converted: Arc<dyn CompensationHandler>,
    publish_events: Arc<dyn CompensationHandler>,
}

impl CompensationHandlerRegistry {
    pub fn new(collaborators: &SagaCollaborators) -> Self {
        let c = collaborators;
        Self {
            create_customer: Arc::new(CreateCustomerCompensation::new(c.customers.clone())),
            create_opportunity: Arc::new(CreateOpportunityCompensation::new(
                c.opportunities.clone(),
            )),
            mark_lead_converted: Arc::new(MarkLeadConvertedCompensation::new(c.leads.clone())),
            publish_events: Arc::new(PublishEventsCompensation),
        }
    }

    /// `None` for read-only steps
    pub fn compensation_for(&self, step_type: StepType) -> Option<&dyn CompensationHandler> {
        match step_type {
            StepType::ValidateLead
            | StepType::ResolveCustomer(CustomerResolution::LookupExisting) => None,
            StepType::ResolveCustomer(CustomerResolution::CreateNew) => {
                Some(self.create_customer.as_ref())
            }
            StepType::CreateOpportunity => Some(self.create_opportunity.as_ref()),
            StepType::MarkLeadConverted => Some(self.mark_lead_converted.as_ref()),
            StepType::PublishEvents => Some(self.publish_events.as_ref()),
        }
    }

    pub fn is_compensatable(&self, step_type: StepType) -> bool {
        self.compensation_for(step_type).is_some()
    }

    /// Replace the compensation for a step with side effects.
    ///
    /// Read-only steps keep no compensation; returns `false` for them.
    pub fn override_compensation(
        &mut self,
        step_type: StepType,
        handler: Arc<dyn CompensationHandler>,
    ) -> bool {
        let slot = match step_type {
            StepType::ValidateLead
            | StepType::ResolveCustomer(CustomerResolution::LookupExisting) => return false,
            StepType::ResolveCustomer(CustomerResolution::CreateNew) => &mut self.create_customer,
            StepType::CreateOpportunity => &mut self.create_opportunity,
            StepType::MarkLeadConverted => &mut self.mark_lead_converted,
            StepType::PublishEvents => &mut self.publish_events,
        };
        *slot = handler;
        true
    }
}
