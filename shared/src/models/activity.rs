//! Append-only activity log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Role;

/// Activity codes written by state-changing operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityCode {
    #[serde(rename = "auth.registered")]
    Registered,
    #[serde(rename = "auth.login")]
    Login,
    #[serde(rename = "profile.updated")]
    ProfileUpdated,
    #[serde(rename = "stock.created")]
    StockCreated,
    #[serde(rename = "stock.updated")]
    StockUpdated,
    #[serde(rename = "order.created")]
    OrderCreated,
    #[serde(rename = "order.approved")]
    OrderApproved,
    #[serde(rename = "order.rejected")]
    OrderRejected,
    #[serde(rename = "order.cancelled")]
    OrderCancelled,
    #[serde(rename = "order.loading")]
    OrderLoading,
    #[serde(rename = "order.completed")]
    OrderCompleted,
    #[serde(rename = "schedule.created")]
    ScheduleCreated,
    #[serde(rename = "weighbridge.weigh_in")]
    WeighIn,
    #[serde(rename = "weighbridge.weigh_out")]
    WeighOut,
    #[serde(rename = "document.issued")]
    DocumentIssued,
    #[serde(rename = "payment.created")]
    PaymentCreated,
    #[serde(rename = "payment.verified")]
    PaymentVerified,
    #[serde(rename = "payment.rejected")]
    PaymentRejected,
}

impl ActivityCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityCode::Registered => "auth.registered",
            ActivityCode::Login => "auth.login",
            ActivityCode::ProfileUpdated => "profile.updated",
            ActivityCode::StockCreated => "stock.created",
            ActivityCode::StockUpdated => "stock.updated",
            ActivityCode::OrderCreated => "order.created",
            ActivityCode::OrderApproved => "order.approved",
            ActivityCode::OrderRejected => "order.rejected",
            ActivityCode::OrderCancelled => "order.cancelled",
            ActivityCode::OrderLoading => "order.loading",
            ActivityCode::OrderCompleted => "order.completed",
            ActivityCode::ScheduleCreated => "schedule.created",
            ActivityCode::WeighIn => "weighbridge.weigh_in",
            ActivityCode::WeighOut => "weighbridge.weigh_out",
            ActivityCode::DocumentIssued => "document.issued",
            ActivityCode::PaymentCreated => "payment.created",
            ActivityCode::PaymentVerified => "payment.verified",
            ActivityCode::PaymentRejected => "payment.rejected",
        }
    }

    /// Module the activity belongs to; the prefix before the dot
    pub fn module(&self) -> &'static str {
        let code = self.as_str();
        code.split_once('.').map(|(module, _)| module).unwrap_or(code)
    }
}

impl std::fmt::Display for ActivityCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logged activity as read back from the log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub role: Option<Role>,
    pub aktivitas: String,
    pub modul: String,
    pub reference_id: Option<Uuid>,
    pub detail: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityCount {
    pub aktivitas: String,
    pub jumlah: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserActivityCount {
    pub user_id: Uuid,
    pub username: String,
    pub jumlah: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityStatistics {
    pub per_activity: Vec<ActivityCount>,
    pub top_users: Vec<UserActivityCount>,
}
