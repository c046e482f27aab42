use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageType {
    Open,
    Qualifying,
    Negotiating,
    Won,
    Lost,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub id: Uuid,
    pub name: String,
    pub stage_type: StageType,
    pub order: u32,
    /// Win probability in percent (0-100)
    pub probability: u8,
    pub is_active: bool,
}

impl Stage {
    pub fn new(name: impl Into<String>, stage_type: StageType, order: u32, probability: u8) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            stage_type,
            order,
            probability: probability.min(100),
            is_active: true,
        }
    }
}

/// Sales pipeline an opportunity moves through
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub currency: String,
    pub stages: Vec<Stage>,
    pub created_at: DateTime<Utc>,
}

impl Pipeline {
    pub fn new(tenant_id: Uuid, name: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.into(),
            is_active: true,
            currency: currency.into(),
            stages: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Active stages sorted by order
    pub fn active_stages(&self) -> Vec<&Stage> {
        let mut stages: Vec<&Stage> = self.stages.iter().filter(|s| s.is_active).collect();
        stages.sort_by_key(|s| s.order);
        stages
    }

    /// Entry stage for new opportunities
    pub fn first_stage(&self) -> Option<&Stage> {
        self.active_stages().into_iter().next()
    }
}
