use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::lead::Lead;
use crate::constants::{CONVERTED_CUSTOMER_SOURCE, CONVERTED_CUSTOMER_TYPE};

/// Customer record as returned by the customer service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub code: String,
    pub name: String,
}

/// Payload sent to the customer service when a lead's company becomes a customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCustomerRequest {
    pub name: String,
    pub customer_type: String,
    pub source: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
}

impl CreateCustomerRequest {
    /// Build the request from the lead's company and contact data
    pub fn from_lead(lead: &Lead) -> Self {
        let email = Some(lead.contact.email.clone()).filter(|e| !e.is_empty());

        Self {
            name: lead.company.name.clone(),
            customer_type: CONVERTED_CUSTOMER_TYPE.to_string(),
            source: CONVERTED_CUSTOMER_SOURCE.to_string(),
            email,
            phone: lead.contact.phone.clone(),
            website: lead.company.website.clone(),
        }
    }
}
