//! Plantations (kebun) that supply stock lots

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KebunStatus {
    Active,
    Inactive,
}

impl KebunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KebunStatus::Active => "active",
            KebunStatus::Inactive => "inactive",
        }
    }
}

impl std::str::FromStr for KebunStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(KebunStatus::Active),
            "inactive" => Ok(KebunStatus::Inactive),
            other => Err(DomainError::validation(
                "status",
                format!("unknown plantation status '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kebun {
    pub id: Uuid,
    pub nama_kebun: String,
    pub lokasi: String,
    pub luas_hektar: Decimal,
    /// Free-form "lat,lng" string
    pub koordinat: Option<String>,
    pub status: KebunStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Kebun {
    pub fn is_active(&self) -> bool {
        self.status == KebunStatus::Active
    }
}
