use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{CompensationHandler, StepHandler, StepOutcome};
use crate::domain::Opportunity;
use crate::orchestration::context::RequestContext;
use crate::orchestration::errors::{StepError, StepResult};
use crate::ports::{LeadRepository, OpportunityRepository, PipelineRepository, RepositoryError};
use crate::saga::{LeadConversionSaga, SagaStep, StepOutput, StepType};

/// Builds the opportunity from the lead, pipeline and resolved customer
pub struct CreateOpportunityHandler {
    leads: Arc<dyn LeadRepository>,
    pipelines: Arc<dyn PipelineRepository>,
    opportunities: Arc<dyn OpportunityRepository>,
}

impl CreateOpportunityHandler {
    pub fn new(
        leads: Arc<dyn LeadRepository>,
        pipelines: Arc<dyn PipelineRepository>,
        opportunities: Arc<dyn OpportunityRepository>,
    ) -> Self {
        Self {
            leads,
            pipelines,
            opportunities,
        }
    }
}

fn resolved_customer_name(saga: &LeadConversionSaga) -> Option<String> {
    let resolve_step = StepType::ResolveCustomer(saga.request.customer_resolution());
    match saga.output_of(resolve_step)? {
        StepOutput::CustomerCreated { customer_name, .. } => Some(customer_name.clone()),
        StepOutput::CustomerResolved { customer_name, .. } => customer_name.clone(),
        _ => None,
    }
}

#[async_trait]
impl StepHandler for CreateOpportunityHandler {
    async fn execute(
        &self,
        _ctx: &RequestContext,
        saga: &LeadConversionSaga,
    ) -> StepResult<StepOutcome> {
        let customer_id = saga.customer_id().ok_or(StepError::MissingPrerequisite {
            step: StepType::CreateOpportunity,
            missing: "customer id",
        })?;

        let lead = self.leads.get_by_id(saga.tenant_id, saga.lead_id).await?;
        let pipeline = self
            .pipelines
            .get_by_id(saga.tenant_id, saga.request.pipeline_id)
            .await?;
        let customer_name =
            resolved_customer_name(saga).unwrap_or_else(|| lead.company.name.clone());

        let mut opportunity =
            Opportunity::from_lead(&lead, &pipeline, customer_id, customer_name, saga.initiated_by)?;

        let request = &saga.request;
        if let Some(owner_id) = request.owner_id {
            opportunity.assign_owner(owner_id, request.owner_name.clone());
        }
        if let Some(description) = &request.description {
            opportunity.description = Some(description.clone());
        }
        if let Some(expected_close_date) = request.expected_close_date {
            opportunity.expected_close_date = Some(expected_close_date);
        }
        if let Some(amount) = &request.amount {
            opportunity.set_amount(amount.clone());
        }
        if let Some(probability) = request.probability {
            opportunity.set_probability(probability)?;
        }

        self.opportunities.create(&opportunity).await?;

        info!(
            saga_id = %saga.id,
            opportunity_id = %opportunity.id,
            opportunity_code = %opportunity.code,
            "Opportunity created from lead"
        );

        let events = opportunity.take_events();
        Ok(StepOutcome::new(StepOutput::OpportunityCreated {
            opportunity_id: opportunity.id,
            opportunity_code: opportunity.code,
            opportunity_name: opportunity.name,
        })
        .with_events(events))
    }
}

/// Deletes the opportunity created by the saga
pub struct CreateOpportunityCompensation {
    opportunities: Arc<dyn OpportunityRepository>,
}

impl CreateOpportunityCompensation {
    pub fn new(opportunities: Arc<dyn OpportunityRepository>) -> Self {
        Self { opportunities }
    }
}

#[async_trait]
impl CompensationHandler for CreateOpportunityCompensation {
    async fn compensate(
        &self,
        _ctx: &RequestContext,
        saga: &LeadConversionSaga,
        step: &SagaStep,
    ) -> StepResult<Option<String>> {
        let opportunity_id = step
            .output
            .as_ref()
            .and_then(StepOutput::opportunity_id)
            .or(saga.opportunity_id())
            .ok_or(StepError::MissingPrerequisite {
                step: StepType::CreateOpportunity,
                missing: "opportunity id",
            })?;

        match self.opportunities.delete(saga.tenant_id, opportunity_id).await {
            // already gone
            Ok(()) | Err(RepositoryError::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        info!(saga_id = %saga.id, opportunity_id = %opportunity_id, "Opportunity deleted");
        Ok(None)
    }
}
