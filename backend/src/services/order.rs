//! Purchase order lifecycle service
//!
//! Every transition runs in one transaction and locks rows in a fixed
//! order: purchase order, stock lot, schedule, weighbridge record. The
//! weighbridge service takes the same order, skipping the lot.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    format_po_number, ActivityCode, NewOrder, OrderAction, OrderStatus, PaginatedResponse,
    Pagination, PurchaseOrder,
};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::sequence::{self, SequenceScope};
use super::{activity, schedule, stock, weighbridge};
use crate::error::{AppError, AppResult};
use crate::middleware::Actor;

/// Order service for the purchase order lifecycle
#[derive(Clone)]
pub struct OrderService {
    db: PgPool,
}

/// Order as listed, with buyer, plantation and latest payment status
#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: PurchaseOrder,
    pub buyer_name: String,
    pub buyer_company: Option<String>,
    pub nama_kebun: String,
    /// Status of the most recent payment, or "unpaid"
    pub payment_status: String,
}

/// Approve or reject a pending order
#[derive(Debug, Clone, Deserialize)]
pub struct OrderStatusUpdate {
    pub status: OrderStatus,
    pub catatan: Option<String>,
}

/// Filters for the order listing
#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    /// Inclusive bounds on the creation date (business-local)
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, FromRow)]
pub(crate) struct OrderRow {
    id: Uuid,
    po_number: String,
    buyer_id: Uuid,
    stok_id: Uuid,
    kebun_id: Uuid,
    jumlah_kg: Decimal,
    grade_diminta: String,
    harga_per_kg: Decimal,
    total_harga: Decimal,
    tanggal_pengambilan: NaiveDate,
    lokasi_pengambilan: String,
    metode_pembayaran: String,
    catatan: Option<String>,
    status: String,
    approved_by: Option<Uuid>,
    approved_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for PurchaseOrder {
    type Error = AppError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(PurchaseOrder {
            id: row.id,
            po_number: row.po_number,
            buyer_id: row.buyer_id,
            stock_id: row.stok_id,
            kebun_id: row.kebun_id,
            jumlah_kg: row.jumlah_kg,
            grade_diminta: row
                .grade_diminta
                .parse()
                .map_err(|e| AppError::corrupt("order grade", e))?,
            harga_per_kg: row.harga_per_kg,
            total_harga: row.total_harga,
            tanggal_pengambilan: row.tanggal_pengambilan,
            lokasi_pengambilan: row.lokasi_pengambilan,
            metode_pembayaran: row
                .metode_pembayaran
                .parse()
                .map_err(|e| AppError::corrupt("order payment method", e))?,
            catatan: row.catatan,
            status: row.status.parse().map_err(|e| AppError::corrupt("order status", e))?,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderViewRow {
    #[sqlx(flatten)]
    order: OrderRow,
    buyer_name: String,
    buyer_company: Option<String>,
    nama_kebun: String,
    payment_status: String,
}

impl TryFrom<OrderViewRow> for OrderView {
    type Error = AppError;

    fn try_from(row: OrderViewRow) -> Result<Self, Self::Error> {
        Ok(OrderView {
            order: row.order.try_into()?,
            buyer_name: row.buyer_name,
            buyer_company: row.buyer_company,
            nama_kebun: row.nama_kebun,
            payment_status: row.payment_status,
        })
    }
}

pub(crate) const ORDER_COLUMNS: &str = "po.id, po.po_number, po.buyer_id, po.stok_id, \
     po.kebun_id, po.jumlah_kg, po.grade_diminta, po.harga_per_kg, po.total_harga, \
     po.tanggal_pengambilan, po.lokasi_pengambilan, po.metode_pembayaran, po.catatan, \
     po.status, po.approved_by, po.approved_at, po.created_at, po.updated_at";

/// Listing query. The latest payment comes from a lateral subquery so an
/// order with several payments still yields exactly one row.
const ORDER_VIEW_FROM: &str = r#"
    FROM purchase_orders po
    JOIN users u ON u.id = po.buyer_id
    JOIN kebun k ON k.id = po.kebun_id
    LEFT JOIN LATERAL (
        SELECT p.status
        FROM pembayaran p
        WHERE p.po_id = po.id
        ORDER BY p.created_at DESC
        LIMIT 1
    ) latest_payment ON TRUE
"#;

/// Lock an order row for the rest of the transaction
pub(crate) async fn lock_order(conn: &mut PgConnection, id: Uuid) -> AppResult<PurchaseOrder> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {} FROM purchase_orders po WHERE po.id = $1 FOR UPDATE",
        ORDER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))?;
    row.try_into()
}

/// Persist the lifecycle fields of a locked order
pub(crate) async fn store_order(conn: &mut PgConnection, order: &PurchaseOrder) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE purchase_orders
        SET status = $2, catatan = $3, approved_by = $4, approved_at = $5, updated_at = $6
        WHERE id = $1
        "#,
    )
    .bind(order.id)
    .bind(order.status.as_str())
    .bind(&order.catatan)
    .bind(order.approved_by)
    .bind(order.approved_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Reject access to another buyer's order without revealing it exists
pub(crate) fn ensure_visible(actor: &Actor, order: &PurchaseOrder) -> AppResult<()> {
    match actor.buyer_scope() {
        Some(buyer_id) if buyer_id != order.buyer_id => {
            Err(AppError::NotFound("Purchase order".to_string()))
        }
        _ => Ok(()),
    }
}

impl OrderService {
    /// Create a new OrderService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Place an order and reserve its quantity on the lot
    pub async fn create_order(
        &self,
        actor: &Actor,
        input: NewOrder,
        today: NaiveDate,
    ) -> AppResult<OrderView> {
        actor.require_role(shared::Role::Buyer)?;

        let mut tx = self.db.begin().await?;

        let mut lot = stock::lock_lot(&mut *tx, input.stock_id).await?;
        let lokasi = stock::kebun_name(&mut *tx, lot.kebun_id).await?;
        let now = Utc::now();

        let seq = sequence::next_value(&mut *tx, SequenceScope::PurchaseOrder, today).await?;
        let order = PurchaseOrder::place(
            Uuid::new_v4(),
            format_po_number(today, seq),
            actor.user_id,
            input,
            &mut lot,
            lokasi,
            today,
            now,
        )
        .map_err(|err| {
            tracing::warn!(stock_id = %lot.id, error = %err, "order rejected");
            err
        })?;

        sqlx::query(
            r#"
            INSERT INTO purchase_orders (
                id, po_number, buyer_id, stok_id, kebun_id, jumlah_kg, grade_diminta,
                harga_per_kg, total_harga, tanggal_pengambilan, lokasi_pengambilan,
                metode_pembayaran, catatan, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $15)
            "#,
        )
        .bind(order.id)
        .bind(&order.po_number)
        .bind(order.buyer_id)
        .bind(order.stock_id)
        .bind(order.kebun_id)
        .bind(order.jumlah_kg)
        .bind(order.grade_diminta.as_str())
        .bind(order.harga_per_kg)
        .bind(order.total_harga)
        .bind(order.tanggal_pengambilan)
        .bind(&order.lokasi_pengambilan)
        .bind(order.metode_pembayaran.as_str())
        .bind(&order.catatan)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .execute(&mut *tx)
        .await?;

        stock::store_lot(&mut *tx, &lot).await?;

        activity::record(
            &mut *tx,
            actor,
            ActivityCode::OrderCreated,
            Some(order.id),
            format!("{} for {} kg", order.po_number, order.jumlah_kg),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            po_number = %order.po_number,
            stock_id = %lot.id,
            remaining = %lot.jumlah_tersedia,
            "purchase order created"
        );
        self.get_order(actor, order.id).await
    }

    fn push_filters<'a>(
        qb: &mut QueryBuilder<'a, Postgres>,
        actor: &Actor,
        filter: &'a OrderFilter,
        offset_hours: i32,
    ) {
        qb.push(" WHERE TRUE");
        if let Some(buyer_id) = actor.buyer_scope() {
            qb.push(" AND po.buyer_id = ").push_bind(buyer_id);
        }
        if let Some(status) = filter.status {
            qb.push(" AND po.status = ").push_bind(status.as_str());
        }
        if let Some(start) = filter.start_date {
            qb.push(" AND (po.created_at + make_interval(hours => ")
                .push_bind(offset_hours)
                .push("))::date >= ")
                .push_bind(start);
        }
        if let Some(end) = filter.end_date {
            qb.push(" AND (po.created_at + make_interval(hours => ")
                .push_bind(offset_hours)
                .push("))::date <= ")
                .push_bind(end);
        }
    }

    /// Paginated orders, newest first. Buyers only see their own.
    pub async fn list_orders(
        &self,
        actor: &Actor,
        filter: &OrderFilter,
        pagination: &Pagination,
        offset_hours: i32,
    ) -> AppResult<PaginatedResponse<OrderView>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM purchase_orders po");
        Self::push_filters(&mut count, actor, filter, offset_hours);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {}, u.username AS buyer_name, u.company_name AS buyer_company, \
             k.nama_kebun, COALESCE(latest_payment.status, 'unpaid') AS payment_status {}",
            ORDER_COLUMNS, ORDER_VIEW_FROM
        ));
        Self::push_filters(&mut qb, actor, filter, offset_hours);
        qb.push(" ORDER BY po.created_at DESC LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows: Vec<OrderViewRow> = qb.build_query_as().fetch_all(&self.db).await?;
        let orders = rows
            .into_iter()
            .map(OrderView::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse::new(orders, pagination, total.max(0) as u64))
    }

    pub async fn get_order(&self, actor: &Actor, id: Uuid) -> AppResult<OrderView> {
        let row = sqlx::query_as::<_, OrderViewRow>(&format!(
            "SELECT {}, u.username AS buyer_name, u.company_name AS buyer_company, \
             k.nama_kebun, COALESCE(latest_payment.status, 'unpaid') AS payment_status {} \
             WHERE po.id = $1",
            ORDER_COLUMNS, ORDER_VIEW_FROM
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))?;

        let view = OrderView::try_from(row)?;
        ensure_visible(actor, &view.order)?;
        Ok(view)
    }

    /// Approve or reject a pending order. Rejection gives the reserved
    /// quantity back to the lot.
    pub async fn update_status(
        &self,
        actor: &Actor,
        id: Uuid,
        update: OrderStatusUpdate,
    ) -> AppResult<OrderView> {
        actor.require_privileged()?;

        let (action, code) = match update.status {
            OrderStatus::Approved => (OrderAction::Approve, ActivityCode::OrderApproved),
            OrderStatus::Rejected => (OrderAction::Reject, ActivityCode::OrderRejected),
            other => {
                return Err(AppError::validation(
                    "status",
                    format!("status must be approved or rejected, got {}", other),
                ))
            }
        };

        let mut tx = self.db.begin().await?;
        let mut order = lock_order(&mut *tx, id).await?;
        let from = order.status;
        let now = Utc::now();

        match action {
            OrderAction::Approve => order.approve(actor.user_id, now)?,
            _ => {
                // Check the transition before touching the lot
                order.status.apply(action)?;
                let mut lot = stock::lock_lot(&mut *tx, order.stock_id).await?;
                order.transition(action, Some(&mut lot), now)?;
                stock::store_lot(&mut *tx, &lot).await?;
            }
        }
        if let Some(note) = update.catatan.filter(|n| !n.trim().is_empty()) {
            order.catatan = Some(note);
        }
        store_order(&mut *tx, &order).await?;

        activity::record(
            &mut *tx,
            actor,
            code,
            Some(order.id),
            format!("{}: {} -> {}", order.po_number, from, order.status),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(order_id = %order.id, from = %from, to = %order.status, "order status changed");
        self.get_order(actor, id).await
    }

    /// Cancel an order before loading starts. Releases the reservation and
    /// voids any schedule and weighbridge record already created.
    pub async fn cancel_order(&self, actor: &Actor, id: Uuid) -> AppResult<OrderView> {
        let mut tx = self.db.begin().await?;
        let mut order = lock_order(&mut *tx, id).await?;
        ensure_visible(actor, &order)?;
        let from = order.status;

        order.status.apply(OrderAction::Cancel)?;
        let now = Utc::now();

        let mut lot = stock::lock_lot(&mut *tx, order.stock_id).await?;
        let pickup = schedule::lock_schedule_for_order(&mut *tx, order.id).await?;
        let record = weighbridge::lock_record_for_order(&mut *tx, order.id).await?;

        order.transition(OrderAction::Cancel, Some(&mut lot), now)?;
        stock::store_lot(&mut *tx, &lot).await?;

        if let Some(mut pickup) = pickup {
            pickup.status = pickup.status.apply(shared::ScheduleStatus::Cancelled)?;
            schedule::store_schedule_status(&mut *tx, &pickup).await?;
        }
        if let Some(mut record) = record {
            record.cancel(now)?;
            weighbridge::store_record(&mut *tx, &record).await?;
        }
        store_order(&mut *tx, &order).await?;

        activity::record(
            &mut *tx,
            actor,
            ActivityCode::OrderCancelled,
            Some(order.id),
            format!("{}: {} -> cancelled, {} kg released", order.po_number, from, order.jumlah_kg),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(order_id = %order.id, from = %from, "order cancelled");
        self.get_order(actor, id).await
    }
}
