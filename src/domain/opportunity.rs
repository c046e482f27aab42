use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{DomainError, DomainResult};
use super::lead::Lead;
use super::money::Money;
use super::pipeline::Pipeline;
use crate::constants::{aggregates, events};
use crate::events::DomainEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityStatus {
    #[default]
    Open,
    Won,
    Lost,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpportunityContact {
    pub customer_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: String,
    pub is_primary: bool,
}

#[derive(Serialize)]
struct OpportunityCreatedPayload<'a> {
    opportunity_id: Uuid,
    code: &'a str,
    pipeline_id: Uuid,
    customer_id: Uuid,
    lead_id: Option<Uuid>,
}

/// A qualified sales opportunity moving through a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub status: OpportunityStatus,
    pub pipeline_id: Uuid,
    pub pipeline_name: String,
    pub stage_id: Uuid,
    pub stage_name: String,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub lead_id: Option<Uuid>,
    pub amount: Money,
    pub weighted_amount: Money,
    pub probability: u8,
    pub expected_close_date: Option<DateTime<Utc>>,
    pub owner_id: Uuid,
    pub owner_name: Option<String>,
    pub source: Option<String>,
    pub contacts: Vec<OpportunityContact>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl Opportunity {
    /// Build an opportunity for a qualified lead, entering the pipeline's first stage
    pub fn from_lead(
        lead: &Lead,
        pipeline: &Pipeline,
        customer_id: Uuid,
        customer_name: impl Into<String>,
        created_by: Uuid,
    ) -> DomainResult<Self> {
        if !lead.can_convert() {
            return Err(DomainError::LeadNotQualified {
                status: lead.status,
            });
        }

        let stage = pipeline
            .first_stage()
            .ok_or(DomainError::PipelineHasNoStages {
                pipeline_id: pipeline.id,
            })?;

        if lead.company.name.trim().is_empty() {
            return Err(DomainError::InvalidOpportunity(
                "lead has no company name".to_string(),
            ));
        }
        let name = format!("{} - {}", lead.company.name, lead.contact.full_name());

        let id = Uuid::new_v4();
        let now = Utc::now();
        let customer_name = customer_name.into();

        let mut opportunity = Self {
            id,
            tenant_id: lead.tenant_id,
            code: opportunity_code(id),
            name,
            description: None,
            status: OpportunityStatus::Open,
            pipeline_id: pipeline.id,
            pipeline_name: pipeline.name.clone(),
            stage_id: stage.id,
            stage_name: stage.name.clone(),
            customer_id,
            customer_name,
            lead_id: Some(lead.id),
            amount: lead.estimated_value.clone(),
            weighted_amount: lead.estimated_value.percentage(stage.probability),
            probability: stage.probability,
            expected_close_date: None,
            owner_id: lead.owner_id.unwrap_or(created_by),
            owner_name: lead.owner_name.clone(),
            source: Some(lead.source.clone()),
            contacts: vec![OpportunityContact {
                customer_id,
                name: lead.contact.full_name(),
                email: lead.contact.email.clone(),
                phone: lead.contact.phone.clone(),
                role: "primary".to_string(),
                is_primary: true,
            }],
            created_by,
            created_at: now,
            updated_at: now,
            version: 1,
            events: Vec::new(),
        };

        let event = DomainEvent::new(
            events::OPPORTUNITY_CREATED,
            aggregates::OPPORTUNITY,
            opportunity.id,
            opportunity.tenant_id,
            opportunity.version,
            OpportunityCreatedPayload {
                opportunity_id: opportunity.id,
                code: &opportunity.code,
                pipeline_id: opportunity.pipeline_id,
                customer_id,
                lead_id: opportunity.lead_id,
            },
        );
        opportunity.events.push(event);

        Ok(opportunity)
    }

    pub fn assign_owner(&mut self, owner_id: Uuid, owner_name: Option<String>) {
        self.owner_id = owner_id;
        self.owner_name = owner_name;
        self.updated_at = Utc::now();
    }

    pub fn set_amount(&mut self, amount: Money) {
        self.weighted_amount = amount.percentage(self.probability);
        self.amount = amount;
        self.updated_at = Utc::now();
    }

    pub fn set_probability(&mut self, probability: u8) -> DomainResult<()> {
        if probability > 100 {
            return Err(DomainError::InvalidProbability(probability));
        }
        self.probability = probability;
        self.weighted_amount = self.amount.percentage(probability);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn events(&self) -> &[DomainEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.events)
    }
}

fn opportunity_code(id: Uuid) -> String {
    let simple = id.simple().to_string().to_uppercase();
    format!("OPP-{}", &simple[..8])
}
