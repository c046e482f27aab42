use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::{CompensationHandler, StepHandler, StepOutcome};
use crate::domain::LeadStatus;
use crate::orchestration::context::RequestContext;
use crate::orchestration::errors::{StepError, StepResult};
use crate::ports::LeadRepository;
use crate::saga::{LeadConversionSaga, SagaStep, StepOutput, StepType};

/// Moves the lead to `Converted`, linking the opportunity and customer
pub struct MarkLeadConvertedHandler {
    leads: Arc<dyn LeadRepository>,
}

impl MarkLeadConvertedHandler {
    pub fn new(leads: Arc<dyn LeadRepository>) -> Self {
        Self { leads }
    }
}

#[async_trait]
impl StepHandler for MarkLeadConvertedHandler {
    async fn execute(
        &self,
        _ctx: &RequestContext,
        saga: &LeadConversionSaga,
    ) -> StepResult<StepOutcome> {
        let opportunity_id = saga.opportunity_id().ok_or(StepError::MissingPrerequisite {
            step: StepType::MarkLeadConverted,
            missing: "opportunity id",
        })?;

        let mut lead = self.leads.get_by_id(saga.tenant_id, saga.lead_id).await?;
        let previous_status = lead.status;

        lead.convert_to_opportunity(
            opportunity_id,
            saga.initiated_by,
            saga.customer_id(),
            saga.contact_id(),
        )?;
        self.leads.update(&lead).await?;

        info!(saga_id = %saga.id, lead_id = %lead.id, "Lead marked as converted");

        let events = lead.take_events();
        Ok(StepOutcome::new(StepOutput::LeadConverted {
            previous_status,
            new_status: lead.status,
        })
        .with_events(events))
    }
}

/// Restores the lead's pre-conversion status
pub struct MarkLeadConvertedCompensation {
    leads: Arc<dyn LeadRepository>,
}

impl MarkLeadConvertedCompensation {
    pub fn new(leads: Arc<dyn LeadRepository>) -> Self {
        Self { leads }
    }
}

#[async_trait]
impl CompensationHandler for MarkLeadConvertedCompensation {
    async fn compensate(
        &self,
        _ctx: &RequestContext,
        saga: &LeadConversionSaga,
        _step: &SagaStep,
    ) -> StepResult<Option<String>> {
        let mut lead = self.leads.get_by_id(saga.tenant_id, saga.lead_id).await?;

        if lead.status != LeadStatus::Converted {
            debug!(saga_id = %saga.id, lead_id = %lead.id, status = %lead.status, "Lead already reverted");
            return Ok(None);
        }

        lead.revert_conversion()?;
        self.leads.update(&lead).await?;

        info!(saga_id = %saga.id, lead_id = %lead.id, status = %lead.status, "Lead conversion reverted");
        Ok(None)
    }
}
