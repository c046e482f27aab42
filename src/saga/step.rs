use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::LeadStatus;
use crate::state_machine::StepStatus;

/// How the conversion obtains its customer; exactly one per saga
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerResolution {
    /// Create a customer from the lead's company data
    CreateNew,
    /// Link the customer referenced by the request
    LookupExisting,
}

/// Kind of work a saga step performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StepType {
    ValidateLead,
    ResolveCustomer(CustomerResolution),
    CreateOpportunity,
    MarkLeadConverted,
    PublishEvents,
}

impl StepType {
    pub const CREATE_CUSTOMER: StepType = StepType::ResolveCustomer(CustomerResolution::CreateNew);
    pub const LOOKUP_CUSTOMER: StepType =
        StepType::ResolveCustomer(CustomerResolution::LookupExisting);

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidateLead => "validate_lead",
            Self::ResolveCustomer(CustomerResolution::CreateNew) => "create_customer",
            Self::ResolveCustomer(CustomerResolution::LookupExisting) => "lookup_customer",
            Self::CreateOpportunity => "create_opportunity",
            Self::MarkLeadConverted => "mark_lead_converted",
            Self::PublishEvents => "publish_events",
        }
    }

    /// The fixed pipeline for a given customer branch
    pub fn pipeline(resolution: CustomerResolution) -> [StepType; 5] {
        [
            Self::ValidateLead,
            Self::ResolveCustomer(resolution),
            Self::CreateOpportunity,
            Self::MarkLeadConverted,
            Self::PublishEvents,
        ]
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StepType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "validate_lead" => Ok(Self::ValidateLead),
            "create_customer" => Ok(Self::CREATE_CUSTOMER),
            "lookup_customer" => Ok(Self::LOOKUP_CUSTOMER),
            "create_opportunity" => Ok(Self::CreateOpportunity),
            "mark_lead_converted" => Ok(Self::MarkLeadConverted),
            "publish_events" => Ok(Self::PublishEvents),
            _ => Err(format!("Invalid saga step type: {s}")),
        }
    }
}

impl From<StepType> for String {
    fn from(step_type: StepType) -> Self {
        step_type.as_str().to_string()
    }
}

impl TryFrom<String> for StepType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Typed result of a completed step, read by later steps and by compensation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOutput {
    LeadValidated {
        lead_status: LeadStatus,
        pipeline_id: Uuid,
        pipeline_name: String,
        company_name: String,
        contact_email: String,
    },
    CustomerCreated {
        customer_id: Uuid,
        customer_code: String,
        customer_name: String,
    },
    CustomerResolved {
        customer_id: Uuid,
        customer_name: Option<String>,
    },
    OpportunityCreated {
        opportunity_id: Uuid,
        opportunity_code: String,
        opportunity_name: String,
    },
    LeadConverted {
        previous_status: LeadStatus,
        new_status: LeadStatus,
    },
    EventsPublished {
        published: usize,
        pending: usize,
    },
}

impl StepOutput {
    /// Customer id produced by either customer branch
    pub fn customer_id(&self) -> Option<Uuid> {
        match self {
            Self::CustomerCreated { customer_id, .. } | Self::CustomerResolved { customer_id, .. } => {
                Some(*customer_id)
            }
            _ => None,
        }
    }

    pub fn opportunity_id(&self) -> Option<Uuid> {
        match self {
            Self::OpportunityCreated { opportunity_id, .. } => Some(*opportunity_id),
            _ => None,
        }
    }
}

/// One unit of work in the conversion pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaStep {
    pub id: Uuid,
    pub step_type: StepType,
    pub order: u32,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<StepOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compensation_note: Option<String>,
    pub attempts: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub compensated_at: Option<DateTime<Utc>>,
}

impl SagaStep {
    pub fn new(step_type: StepType, order: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            step_type,
            order,
            status: StepStatus::Pending,
            output: None,
            error: None,
            compensation_note: None,
            attempts: 0,
            started_at: None,
            completed_at: None,
            compensated_at: None,
        }
    }

    /// Mark the step as running
    pub fn start(&mut self) {
        self.status = StepStatus::Running;
        self.attempts += 1;
        self.error = None;
        self.started_at = Some(Utc::now());
    }

    /// Mark the step as successfully completed
    pub fn complete(&mut self, output: StepOutput) {
        self.status = StepStatus::Completed;
        self.output = Some(output);
        self.completed_at = Some(Utc::now());
    }

    /// Mark the step as failed
    pub fn fail(&mut self, error: impl fmt::Display) {
        self.status = StepStatus::Failed;
        self.error = Some(error.to_string());
        self.completed_at = Some(Utc::now());
    }

    /// Mark the step's side effect as undone
    pub fn compensate(&mut self, note: Option<String>) {
        self.status = StepStatus::Compensated;
        self.compensation_note = note;
        self.compensated_at = Some(Utc::now());
    }

    pub fn skip(&mut self) {
        self.status = StepStatus::Skipped;
    }

    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}
