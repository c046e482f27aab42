use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::errors::{DomainError, DomainResult};
use super::money::Money;
use crate::constants::{aggregates, events};
use crate::events::DomainEvent;

/// Sales status of a lead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    Unqualified,
    Converted,
    Nurturing,
}

impl LeadStatus {
    /// Only qualified leads may become opportunities
    pub fn can_convert(&self) -> bool {
        matches!(self, Self::Qualified)
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Contacted => write!(f, "contacted"),
            Self::Qualified => write!(f, "qualified"),
            Self::Unqualified => write!(f, "unqualified"),
            Self::Converted => write!(f, "converted"),
            Self::Nurturing => write!(f, "nurturing"),
        }
    }
}

impl std::str::FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "contacted" => Ok(Self::Contacted),
            "qualified" => Ok(Self::Qualified),
            "unqualified" => Ok(Self::Unqualified),
            "converted" => Ok(Self::Converted),
            "nurturing" => Ok(Self::Nurturing),
            _ => Err(format!("Invalid lead status: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LeadContact {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
}

impl LeadContact {
    pub fn full_name(&self) -> String {
        if self.last_name.is_empty() {
            self.first_name.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LeadCompany {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
}

/// Record of a completed conversion, kept on the lead
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionInfo {
    pub converted_at: DateTime<Utc>,
    pub converted_by: Uuid,
    pub opportunity_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    /// Status the lead had before it was converted
    pub previous_status: LeadStatus,
}

#[derive(Serialize)]
struct LeadConvertedPayload {
    lead_id: Uuid,
    opportunity_id: Uuid,
    customer_id: Option<Uuid>,
    contact_id: Option<Uuid>,
    converted_by: Uuid,
}

/// A prospective customer tracked by the sales team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub status: LeadStatus,
    pub company: LeadCompany,
    pub contact: LeadContact,
    pub estimated_value: Money,
    pub owner_id: Option<Uuid>,
    pub owner_name: Option<String>,
    pub source: String,
    pub conversion_info: Option<ConversionInfo>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl Lead {
    pub fn new(
        tenant_id: Uuid,
        company: LeadCompany,
        contact: LeadContact,
        estimated_value: Money,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            status: LeadStatus::New,
            company,
            contact,
            estimated_value,
            owner_id: None,
            owner_name: None,
            source: "website".to_string(),
            conversion_info: None,
            deleted_at: None,
            version: 1,
            created_at: now,
            updated_at: now,
            events: Vec::new(),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn can_convert(&self) -> bool {
        self.status.can_convert() && !self.is_deleted()
    }

    /// Mark the lead as qualified for conversion
    pub fn qualify(&mut self) -> DomainResult<()> {
        match self.status {
            LeadStatus::New | LeadStatus::Contacted | LeadStatus::Nurturing => {
                self.status = LeadStatus::Qualified;
                self.updated_at = Utc::now();
                Ok(())
            }
            from => Err(DomainError::InvalidLeadTransition {
                from,
                to: LeadStatus::Qualified,
            }),
        }
    }

    /// Transition the lead to `Converted`, linking the created records
    pub fn convert_to_opportunity(
        &mut self,
        opportunity_id: Uuid,
        converted_by: Uuid,
        customer_id: Option<Uuid>,
        contact_id: Option<Uuid>,
    ) -> DomainResult<()> {
        if self.status == LeadStatus::Converted {
            return Err(DomainError::LeadAlreadyConverted);
        }
        if !self.status.can_convert() {
            return Err(DomainError::LeadNotQualified {
                status: self.status,
            });
        }

        let now = Utc::now();
        self.conversion_info = Some(ConversionInfo {
            converted_at: now,
            converted_by,
            opportunity_id,
            customer_id,
            contact_id,
            previous_status: self.status,
        });
        self.status = LeadStatus::Converted;
        self.updated_at = now;

        let event = DomainEvent::new(
            events::LEAD_CONVERTED,
            aggregates::LEAD,
            self.id,
            self.tenant_id,
            self.version,
            LeadConvertedPayload {
                lead_id: self.id,
                opportunity_id,
                customer_id,
                contact_id,
                converted_by,
            },
        );
        self.events.push(event);
        Ok(())
    }

    /// Undo a conversion, restoring the status the lead had before it.
    ///
    /// No event is raised; the saga reports the compensation itself.
    pub fn revert_conversion(&mut self) -> DomainResult<()> {
        if self.status != LeadStatus::Converted {
            return Err(DomainError::LeadNotConverted);
        }

        let previous = self
            .conversion_info
            .take()
            .map_or(LeadStatus::Qualified, |info| info.previous_status);
        self.status = previous;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn events(&self) -> &[DomainEvent] {
        &self.events
    }

    /// Drain the events raised since the last call
    pub fn take_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.events)
    }
}
