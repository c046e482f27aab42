//! # Sales Domain
//!
//! The aggregates the conversion saga reads and mutates through its
//! collaborators. Only the behaviour the saga depends on lives here; CRUD
//! concerns belong to the use-case layer that owns these aggregates.

pub mod customer;
pub mod errors;
pub mod lead;
pub mod money;
pub mod opportunity;
pub mod pipeline;

pub use customer::{CreateCustomerRequest, Customer};
pub use errors::{DomainError, DomainResult};
pub use lead::{ConversionInfo, Lead, LeadCompany, LeadContact, LeadStatus};
pub use money::Money;
pub use opportunity::{Opportunity, OpportunityContact, OpportunityStatus};
pub use pipeline::{Pipeline, Stage, StageType};
