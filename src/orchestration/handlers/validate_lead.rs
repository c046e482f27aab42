use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{StepHandler, StepOutcome};
use crate::orchestration::context::RequestContext;
use crate::orchestration::errors::{StepError, StepResult};
use crate::ports::{LeadRepository, PipelineRepository, RepositoryError};
use crate::saga::{LeadConversionSaga, StepOutput};

/// Read-only check that the lead can be converted into the target pipeline
pub struct ValidateLeadHandler {
    leads: Arc<dyn LeadRepository>,
    pipelines: Arc<dyn PipelineRepository>,
}

impl ValidateLeadHandler {
    pub fn new(leads: Arc<dyn LeadRepository>, pipelines: Arc<dyn PipelineRepository>) -> Self {
        Self { leads, pipelines }
    }
}

#[async_trait]
impl StepHandler for ValidateLeadHandler {
    async fn execute(
        &self,
        _ctx: &RequestContext,
        saga: &LeadConversionSaga,
    ) -> StepResult<StepOutcome> {
        let lead = self
            .leads
            .get_by_id(saga.tenant_id, saga.lead_id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound { .. } => StepError::LeadNotFound {
                    lead_id: saga.lead_id,
                },
                other => other.into(),
            })?;

        if !lead.can_convert() {
            return Err(StepError::LeadNotConvertible {
                lead_id: lead.id,
                status: lead.status,
            });
        }

        let pipeline_id = saga.request.pipeline_id;
        let pipeline = self
            .pipelines
            .get_by_id(saga.tenant_id, pipeline_id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound { .. } => StepError::PipelineNotFound { pipeline_id },
                other => other.into(),
            })?;

        if !pipeline.is_active {
            return Err(StepError::PipelineInactive { pipeline_id });
        }

        debug!(lead_id = %lead.id, pipeline_id = %pipeline.id, "Lead validated for conversion");

        Ok(StepOutput::LeadValidated {
            lead_status: lead.status,
            pipeline_id: pipeline.id,
            pipeline_name: pipeline.name,
            company_name: lead.company.name,
            contact_email: lead.contact.email,
        }
        .into())
    }
}
