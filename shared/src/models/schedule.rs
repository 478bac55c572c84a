//! Pickup schedules and daily loading queue numbers

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OrderStatus, PurchaseOrder};
use crate::error::{DomainError, DomainResult};

/// Status of a pickup schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Scheduled,
    InProgress,
    Completed,
    /// The order was cancelled before the truck was weighed in
    Cancelled,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Scheduled => "scheduled",
            ScheduleStatus::InProgress => "in_progress",
            ScheduleStatus::Completed => "completed",
            ScheduleStatus::Cancelled => "cancelled",
        }
    }

    /// Schedule follows its weighbridge record: weigh-in starts it,
    /// weigh-out completes it, order cancellation voids it.
    pub fn apply(self, to: ScheduleStatus) -> DomainResult<ScheduleStatus> {
        use ScheduleStatus as S;

        match (self, to) {
            (S::Scheduled, S::InProgress)
            | (S::InProgress, S::Completed)
            | (S::Scheduled, S::Cancelled) => Ok(to),
            _ => Err(DomainError::invalid_transition(
                "pickup schedule",
                self,
                match to {
                    S::InProgress => "start",
                    S::Completed => "complete",
                    S::Cancelled => "cancel",
                    S::Scheduled => "reschedule",
                },
            )),
        }
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScheduleStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(ScheduleStatus::Scheduled),
            "in_progress" => Ok(ScheduleStatus::InProgress),
            "completed" => Ok(ScheduleStatus::Completed),
            "cancelled" => Ok(ScheduleStatus::Cancelled),
            other => Err(DomainError::validation(
                "status",
                format!("unknown schedule status '{}'", other),
            )),
        }
    }
}

/// A truck pickup slot for one approved order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupSchedule {
    pub id: Uuid,
    pub po_id: Uuid,
    /// 1-based position among the schedules loading on the same day
    pub nomor_antrian: i32,
    pub waktu_loading: NaiveDateTime,
    pub plat_nomor: String,
    pub nama_sopir: String,
    pub status: ScheduleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Schedule request from staff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSchedule {
    pub po_id: Uuid,
    pub waktu_loading: NaiveDateTime,
    pub plat_nomor: String,
    pub nama_sopir: String,
}

impl NewSchedule {
    /// Calendar day whose queue this schedule joins
    pub fn loading_day(&self) -> NaiveDate {
        self.waktu_loading.date()
    }
}

impl PickupSchedule {
    /// Create the schedule for `order`, taking queue position `nomor_antrian`
    /// on the loading day.
    pub fn create(
        id: Uuid,
        order: &PurchaseOrder,
        input: NewSchedule,
        nomor_antrian: i32,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if order.id != input.po_id {
            return Err(DomainError::Consistency(format!(
                "schedule for order {} built from order {}",
                input.po_id, order.id
            )));
        }
        if order.status != OrderStatus::Approved {
            return Err(DomainError::invalid_transition(
                "purchase order",
                order.status,
                "schedule",
            ));
        }
        if nomor_antrian < 1 {
            return Err(DomainError::Consistency(format!(
                "queue number {} is not positive",
                nomor_antrian
            )));
        }

        let plat_nomor = crate::validation::normalize_plate_number(&input.plat_nomor)?;
        let nama_sopir = input.nama_sopir.trim().to_string();
        if nama_sopir.is_empty() {
            return Err(DomainError::validation("nama_sopir", "driver name is required"));
        }

        Ok(Self {
            id,
            po_id: order.id,
            nomor_antrian,
            waktu_loading: input.waktu_loading,
            plat_nomor,
            nama_sopir,
            status: ScheduleStatus::Scheduled,
            created_at: now,
            updated_at: now,
        })
    }
}
