//! # Collaborator Ports
//!
//! Traits the conversion saga consumes. Implementations live outside this
//! crate, apart from the in-memory saga store in [`crate::persistence`].

pub mod repositories;
pub mod saga_store;
pub mod services;

pub use repositories::{
    LeadRepository, OpportunityRepository, PipelineRepository, RepositoryError, RepositoryResult,
};
pub use saga_store::{Page, SagaStore, StoreError, StoreResult};
pub use services::{CustomerService, DomainEventPublisher, ServiceError, ServiceResult};
