use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{CreateCustomerRequest, Customer};
use crate::events::{DomainEvent, PublishError};

/// Errors surfaced by external services
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("Customer {customer_id} not found")]
    CustomerNotFound { customer_id: Uuid },

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Customer management service owned by another bounded context
#[async_trait]
pub trait CustomerService: Send + Sync {
    async fn create_customer(
        &self,
        tenant_id: Uuid,
        request: &CreateCustomerRequest,
    ) -> ServiceResult<Customer>;

    async fn get_customer(&self, tenant_id: Uuid, customer_id: Uuid) -> ServiceResult<Customer>;

    /// Whether [`delete_customer`](Self::delete_customer) is implemented
    fn supports_deletion(&self) -> bool {
        false
    }

    async fn delete_customer(&self, tenant_id: Uuid, customer_id: Uuid) -> ServiceResult<()> {
        let _ = (tenant_id, customer_id);
        Err(ServiceError::Unsupported("delete_customer"))
    }
}

/// Sink for domain events raised during a conversion
#[async_trait]
pub trait DomainEventPublisher: Send + Sync {
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), PublishError>;
}
