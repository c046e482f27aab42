#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # CRM Sales Core
//!
//! Lead-to-opportunity conversion for a multi-tenant sales CRM, implemented
//! as a crash-resumable saga with compensation.
//!
//! ## Overview
//!
//! Converting a qualified lead touches several collaborators that do not
//! share a database transaction: the lead store, the customer service, the
//! opportunity store and the event bus. The conversion saga runs a fixed
//! pipeline of steps against them, checkpoints after every step so it can be
//! resumed after a crash, and undoes completed side effects in reverse order
//! when a later step fails.
//!
//! ## Module Organization
//!
//! - [`state_machine`] - Saga states, step statuses and the transition table
//! - [`saga`] - The saga aggregate, its steps and typed step outputs
//! - [`orchestration`] - Step handlers, registries and the orchestrator
//! - [`ports`] - Collaborator traits (repositories, services, saga store)
//! - [`persistence`] - In-memory saga store
//! - [`recovery`] - Sweep that resumes interrupted sagas
//! - [`conversion`] - Use-case entry point with idempotent request handling
//! - [`domain`] - Lead, pipeline, opportunity and customer types
//! - [`events`] - Domain event envelope and broadcast publisher
//! - [`config`] - Saga configuration
//! - [`error`] - Crate-level error type
//! - [`logging`] - Structured logging setup
//!
//! ## Testing
//!
//! Unit tests live next to the code; integration suites under `tests/` drive
//! the orchestrator against in-memory collaborators with failure injection.

pub mod config;
pub mod constants;
pub mod conversion;
pub mod domain;
pub mod error;
pub mod events;
pub mod logging;
pub mod orchestration;
pub mod persistence;
pub mod ports;
pub mod recovery;
pub mod saga;
pub mod state_machine;

pub use config::SagaConfig;
pub use conversion::{ConversionOutcome, LeadConversionService};
pub use error::{CrmError, Result};
pub use orchestration::{
    CancellationToken, LeadConversionOrchestrator, RequestContext, SagaCollaborators, SagaError,
    StepError,
};
pub use persistence::InMemorySagaStore;
pub use recovery::{SagaRecoverySweeper, SweepReport};
pub use saga::{
    LeadConversionRequest, LeadConversionResult, LeadConversionSaga, SagaStep, StepOutput,
    StepType,
};
pub use state_machine::{SagaState, StepStatus};
