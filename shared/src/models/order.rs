//! Purchase orders and their lifecycle

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Grade, StockLot};
use crate::error::{DomainError, DomainResult};

/// Purchase order status.
///
/// ```text
/// pending ──approve──▶ approved ──start_loading──▶ loading ──complete──▶ completed
///    │                    │
///    ├──reject──▶ rejected │
///    └──cancel──▶ cancelled ◀──cancel──┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Approved,
    Rejected,
    Loading,
    Completed,
    Cancelled,
}

/// Actions that move an order through its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    Approve,
    Reject,
    Cancel,
    /// Weigh-in recorded at the weighbridge
    StartLoading,
    /// Weigh-out recorded at the weighbridge
    Complete,
}

impl OrderAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderAction::Approve => "approve",
            OrderAction::Reject => "reject",
            OrderAction::Cancel => "cancel",
            OrderAction::StartLoading => "start loading",
            OrderAction::Complete => "complete",
        }
    }

    /// Whether this transition gives the reserved quantity back to the lot
    pub fn releases_stock(&self) -> bool {
        matches!(self, OrderAction::Reject | OrderAction::Cancel)
    }
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Approved,
        OrderStatus::Rejected,
        OrderStatus::Loading,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Approved => "approved",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Loading => "loading",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Rejected | OrderStatus::Cancelled | OrderStatus::Completed
        )
    }

    /// Transition table for the order lifecycle
    pub fn next(self, action: OrderAction) -> Option<OrderStatus> {
        use OrderAction as A;
        use OrderStatus as S;

        match (self, action) {
            (S::Pending, A::Approve) => Some(S::Approved),
            (S::Pending, A::Reject) => Some(S::Rejected),
            (S::Pending, A::Cancel) => Some(S::Cancelled),
            (S::Approved, A::Cancel) => Some(S::Cancelled),
            (S::Approved, A::StartLoading) => Some(S::Loading),
            (S::Loading, A::Complete) => Some(S::Completed),
            _ => None,
        }
    }

    pub fn apply(self, action: OrderAction) -> DomainResult<OrderStatus> {
        self.next(action)
            .ok_or_else(|| DomainError::invalid_transition("purchase order", self, action.as_str()))
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                DomainError::validation("status", format!("unknown order status '{}'", s))
            })
    }
}

/// How the buyer intends to settle the order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Cash
    Tunai,
    /// Bank transfer
    Transfer,
    /// Installment / deferred payment
    Termin,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Tunai => "tunai",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Termin => "termin",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tunai" => Ok(PaymentMethod::Tunai),
            "transfer" => Ok(PaymentMethod::Transfer),
            "termin" => Ok(PaymentMethod::Termin),
            other => Err(DomainError::validation(
                "metode_pembayaran",
                format!("unknown payment method '{}'", other),
            )),
        }
    }
}

/// A buyer's purchase order against one stock lot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: Uuid,
    /// Human-facing number, e.g. "PO-20250601-0003"
    pub po_number: String,
    pub buyer_id: Uuid,
    pub stock_id: Uuid,
    pub kebun_id: Uuid,
    pub jumlah_kg: Decimal,
    pub grade_diminta: Grade,
    /// Unit price copied from the lot at creation
    pub harga_per_kg: Decimal,
    pub total_harga: Decimal,
    pub tanggal_pengambilan: NaiveDate,
    pub lokasi_pengambilan: String,
    pub metode_pembayaran: PaymentMethod,
    pub catatan: Option<String>,
    pub status: OrderStatus,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order request as submitted by a buyer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub stock_id: Uuid,
    pub jumlah_kg: Decimal,
    pub tanggal_pengambilan: NaiveDate,
    pub metode_pembayaran: PaymentMethod,
    pub catatan: Option<String>,
}

/// Total price of an order; fixed at creation and rounded to the cent
pub fn order_total(jumlah_kg: Decimal, harga_per_kg: Decimal) -> Decimal {
    (jumlah_kg * harga_per_kg).round_dp(2)
}

/// Format a purchase order number for the given day and daily sequence
pub fn format_po_number(day: NaiveDate, sequence: i64) -> String {
    format!("PO-{}-{:04}", day.format("%Y%m%d"), sequence)
}

impl PurchaseOrder {
    /// Validate a buyer's request against the lot and reserve the stock.
    ///
    /// On success the lot has already been decremented; on failure neither
    /// the lot nor anything else has changed.
    #[allow(clippy::too_many_arguments)]
    pub fn place(
        id: Uuid,
        po_number: String,
        buyer_id: Uuid,
        input: NewOrder,
        lot: &mut StockLot,
        lokasi_pengambilan: String,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        crate::validation::validate_positive_kg("jumlah_kg", input.jumlah_kg)?;
        if input.tanggal_pengambilan < today {
            return Err(DomainError::validation(
                "tanggal_pengambilan",
                "pickup date cannot be in the past",
            ));
        }
        if lot.id != input.stock_id {
            return Err(DomainError::Consistency(format!(
                "order for lot {} placed against lot {}",
                input.stock_id, lot.id
            )));
        }
        if input.jumlah_kg > lot.jumlah_tersedia {
            return Err(DomainError::InsufficientStock {
                requested: input.jumlah_kg,
                available: lot.jumlah_tersedia,
            });
        }
        if lot.status != super::StockStatus::Available {
            return Err(DomainError::invalid_transition("stock lot", lot.status, "order from"));
        }

        lot.reserve(input.jumlah_kg)?;

        Ok(Self {
            id,
            po_number,
            buyer_id,
            stock_id: lot.id,
            kebun_id: lot.kebun_id,
            jumlah_kg: input.jumlah_kg,
            grade_diminta: lot.grade,
            harga_per_kg: lot.harga_per_kg,
            total_harga: order_total(input.jumlah_kg, lot.harga_per_kg),
            tanggal_pengambilan: input.tanggal_pengambilan,
            lokasi_pengambilan,
            metode_pembayaran: input.metode_pembayaran,
            catatan: input.catatan,
            status: OrderStatus::Pending,
            approved_by: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a lifecycle action, releasing the reservation when the action
    /// ends the order before fulfilment.
    pub fn transition(
        &mut self,
        action: OrderAction,
        lot: Option<&mut StockLot>,
        now: DateTime<Utc>,
    ) -> DomainResult<OrderStatus> {
        let next = self.status.apply(action)?;

        if action.releases_stock() {
            let lot = lot.ok_or_else(|| {
                DomainError::Consistency(format!(
                    "order {} needs its stock lot to release the reservation",
                    self.id
                ))
            })?;
            if lot.id != self.stock_id {
                return Err(DomainError::Consistency(format!(
                    "order {} reserved lot {} but lot {} was supplied",
                    self.id, self.stock_id, lot.id
                )));
            }
            lot.release(self.jumlah_kg)?;
        }

        self.status = next;
        self.updated_at = now;
        Ok(next)
    }

    pub fn approve(&mut self, approver: Uuid, now: DateTime<Utc>) -> DomainResult<()> {
        self.transition(OrderAction::Approve, None, now)?;
        self.approved_by = Some(approver);
        self.approved_at = Some(now);
        Ok(())
    }
}
