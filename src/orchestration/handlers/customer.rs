use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::{CompensationHandler, StepHandler, StepOutcome};
use crate::constants::CUSTOMER_MANUAL_CLEANUP_NOTE;
use crate::domain::CreateCustomerRequest;
use crate::orchestration::context::RequestContext;
use crate::orchestration::errors::{StepError, StepResult};
use crate::ports::{CustomerService, LeadRepository, ServiceError};
use crate::saga::{LeadConversionSaga, SagaStep, StepOutput, StepType};

/// Creates a customer from the lead's company data
pub struct CreateCustomerHandler {
    leads: Arc<dyn LeadRepository>,
    customers: Option<Arc<dyn CustomerService>>,
}

impl CreateCustomerHandler {
    pub fn new(leads: Arc<dyn LeadRepository>, customers: Option<Arc<dyn CustomerService>>) -> Self {
        Self { leads, customers }
    }
}

#[async_trait]
impl StepHandler for CreateCustomerHandler {
    async fn execute(
        &self,
        _ctx: &RequestContext,
        saga: &LeadConversionSaga,
    ) -> StepResult<StepOutcome> {
        let customers = self
            .customers
            .as_ref()
            .ok_or(StepError::CustomerServiceUnavailable)?;

        let lead = self.leads.get_by_id(saga.tenant_id, saga.lead_id).await?;
        let request = CreateCustomerRequest::from_lead(&lead);
        let customer = customers.create_customer(saga.tenant_id, &request).await?;

        info!(
            saga_id = %saga.id,
            customer_id = %customer.id,
            customer_code = %customer.code,
            "Customer created from lead"
        );

        Ok(StepOutput::CustomerCreated {
            customer_id: customer.id,
            customer_code: customer.code,
            customer_name: customer.name,
        }
        .into())
    }
}

/// Removes the created customer when the service supports it, otherwise
/// leaves a manual cleanup note on the step
pub struct CreateCustomerCompensation {
    customers: Option<Arc<dyn CustomerService>>,
}

impl CreateCustomerCompensation {
    pub fn new(customers: Option<Arc<dyn CustomerService>>) -> Self {
        Self { customers }
    }
}

#[async_trait]
impl CompensationHandler for CreateCustomerCompensation {
    async fn compensate(
        &self,
        _ctx: &RequestContext,
        saga: &LeadConversionSaga,
        step: &SagaStep,
    ) -> StepResult<Option<String>> {
        let customer_id = step
            .output
            .as_ref()
            .and_then(StepOutput::customer_id)
            .ok_or(StepError::MissingPrerequisite {
                step: StepType::CREATE_CUSTOMER,
                missing: "customer id",
            })?;

        match &self.customers {
            Some(customers) if customers.supports_deletion() => {
                match customers.delete_customer(saga.tenant_id, customer_id).await {
                    Ok(()) | Err(ServiceError::CustomerNotFound { .. }) => {
                        info!(saga_id = %saga.id, customer_id = %customer_id, "Created customer removed");
                        Ok(None)
                    }
                    Err(e) => Err(e.into()),
                }
            }
            _ => {
                warn!(
                    saga_id = %saga.id,
                    customer_id = %customer_id,
                    "Customer service cannot delete customers; manual cleanup required"
                );
                Ok(Some(CUSTOMER_MANUAL_CLEANUP_NOTE.to_string()))
            }
        }
    }
}

/// Verifies the customer referenced by the request.
///
/// Without a customer service the referenced id is trusted as given.
pub struct LookupCustomerHandler {
    customers: Option<Arc<dyn CustomerService>>,
}

impl LookupCustomerHandler {
    pub fn new(customers: Option<Arc<dyn CustomerService>>) -> Self {
        Self { customers }
    }
}

#[async_trait]
impl StepHandler for LookupCustomerHandler {
    async fn execute(
        &self,
        _ctx: &RequestContext,
        saga: &LeadConversionSaga,
    ) -> StepResult<StepOutcome> {
        let customer_id = saga
            .request
            .customer_id
            .ok_or(StepError::MissingCustomerId)?;

        let customer_name = match &self.customers {
            Some(customers) => {
                let customer = customers
                    .get_customer(saga.tenant_id, customer_id)
                    .await
                    .map_err(|e| match e {
                        ServiceError::CustomerNotFound { customer_id } => {
                            StepError::CustomerNotFound { customer_id }
                        }
                        other => other.into(),
                    })?;
                Some(customer.name)
            }
            None => None,
        };

        Ok(StepOutput::CustomerResolved {
            customer_id,
            customer_name,
        }
        .into())
    }
}
