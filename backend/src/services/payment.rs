//! Payments against sales documents

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    ActivityCode, NewPayment, PaginatedResponse, Pagination, Payment, PaymentDecision,
    PaymentStatus,
};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{activity, document};
use crate::error::{AppError, AppResult};
use crate::middleware::Actor;

#[derive(Clone)]
pub struct PaymentService {
    db: PgPool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyPaymentRequest {
    pub status: PaymentDecision,
    pub catatan: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentView {
    #[serde(flatten)]
    pub payment: Payment,
    pub po_number: String,
    pub nomor_invoice: String,
    pub total_akhir: Decimal,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentFilter {
    pub po_id: Option<Uuid>,
    pub status: Option<PaymentStatus>,
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: Uuid,
    dokumen_id: Uuid,
    po_id: Uuid,
    jumlah_bayar: Decimal,
    metode_pembayaran: String,
    bank_pengirim: Option<String>,
    nomor_rekening: Option<String>,
    nama_pengirim: Option<String>,
    bukti_transfer: Option<String>,
    tanggal_pembayaran: NaiveDate,
    tanggal_jatuh_tempo: Option<NaiveDate>,
    status: String,
    verified_by: Option<Uuid>,
    verified_at: Option<DateTime<Utc>>,
    catatan: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = AppError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id,
            dokumen_id: row.dokumen_id,
            po_id: row.po_id,
            jumlah_bayar: row.jumlah_bayar,
            metode_pembayaran: row
                .metode_pembayaran
                .parse()
                .map_err(|e| AppError::corrupt("payment method", e))?,
            bank_pengirim: row.bank_pengirim,
            nomor_rekening: row.nomor_rekening,
            nama_pengirim: row.nama_pengirim,
            bukti_transfer: row.bukti_transfer,
            tanggal_pembayaran: row.tanggal_pembayaran,
            tanggal_jatuh_tempo: row.tanggal_jatuh_tempo,
            status: row.status.parse().map_err(|e| AppError::corrupt("payment status", e))?,
            verified_by: row.verified_by,
            verified_at: row.verified_at,
            catatan: row.catatan,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct PaymentViewRow {
    #[sqlx(flatten)]
    payment: PaymentRow,
    po_number: String,
    nomor_invoice: String,
    total_akhir: Decimal,
}

impl TryFrom<PaymentViewRow> for PaymentView {
    type Error = AppError;

    fn try_from(row: PaymentViewRow) -> Result<Self, Self::Error> {
        Ok(PaymentView {
            payment: row.payment.try_into()?,
            po_number: row.po_number,
            nomor_invoice: row.nomor_invoice,
            total_akhir: row.total_akhir,
        })
    }
}

const PAYMENT_COLUMNS: &str = "p.id, p.dokumen_id, p.po_id, p.jumlah_bayar, \
     p.metode_pembayaran, p.bank_pengirim, p.nomor_rekening, p.nama_pengirim, \
     p.bukti_transfer, p.tanggal_pembayaran, p.tanggal_jatuh_tempo, p.status, \
     p.verified_by, p.verified_at, p.catatan, p.created_at, p.updated_at";

const PAYMENT_VIEW_FROM: &str = " FROM pembayaran p \
     JOIN dokumen_penjualan d ON d.id = p.dokumen_id \
     JOIN purchase_orders po ON po.id = p.po_id";

async fn lock_payment(conn: &mut PgConnection, id: Uuid) -> AppResult<Payment> {
    sqlx::query_as::<_, PaymentRow>(&format!(
        "SELECT {} FROM pembayaran p WHERE p.id = $1 FOR UPDATE",
        PAYMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Payment".to_string()))?
    .try_into()
}

impl PaymentService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Record a buyer's payment against one of their documents
    pub async fn create(&self, actor: &Actor, input: NewPayment) -> AppResult<PaymentView> {
        actor.require_role(shared::Role::Buyer)?;

        let mut tx = self.db.begin().await?;
        let dokumen = document::load_document(&mut *tx, input.dokumen_id).await?;
        if dokumen.buyer_id != actor.user_id {
            return Err(AppError::NotFound("Sales document".to_string()));
        }

        let payment = Payment::record(Uuid::new_v4(), input, &dokumen, Utc::now())?;

        sqlx::query(
            r#"
            INSERT INTO pembayaran (
                id, dokumen_id, po_id, jumlah_bayar, metode_pembayaran, bank_pengirim,
                nomor_rekening, nama_pengirim, bukti_transfer, tanggal_pembayaran,
                tanggal_jatuh_tempo, status, catatan, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14)
            "#,
        )
        .bind(payment.id)
        .bind(payment.dokumen_id)
        .bind(payment.po_id)
        .bind(payment.jumlah_bayar)
        .bind(payment.metode_pembayaran.as_str())
        .bind(&payment.bank_pengirim)
        .bind(&payment.nomor_rekening)
        .bind(&payment.nama_pengirim)
        .bind(&payment.bukti_transfer)
        .bind(payment.tanggal_pembayaran)
        .bind(payment.tanggal_jatuh_tempo)
        .bind(payment.status.as_str())
        .bind(&payment.catatan)
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?;

        activity::record(
            &mut *tx,
            actor,
            ActivityCode::PaymentCreated,
            Some(payment.id),
            format!(
                "{} {} for {}",
                payment.metode_pembayaran, payment.jumlah_bayar, dokumen.numbers.nomor_invoice
            ),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(payment_id = %payment.id, document_id = %dokumen.id, amount = %payment.jumlah_bayar, "payment recorded");
        self.get(actor, payment.id).await
    }

    /// Verify or reject a pending payment
    pub async fn verify(
        &self,
        actor: &Actor,
        id: Uuid,
        request: VerifyPaymentRequest,
    ) -> AppResult<PaymentView> {
        actor.require_privileged()?;

        let mut tx = self.db.begin().await?;
        let mut payment = lock_payment(&mut *tx, id).await?;
        let status = payment.verify(request.status, actor.user_id, request.catatan, Utc::now())?;

        sqlx::query(
            r#"
            UPDATE pembayaran
            SET status = $2, verified_by = $3, verified_at = $4, catatan = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(payment.id)
        .bind(payment.status.as_str())
        .bind(payment.verified_by)
        .bind(payment.verified_at)
        .bind(&payment.catatan)
        .bind(payment.updated_at)
        .execute(&mut *tx)
        .await?;

        let code = match status {
            PaymentStatus::Rejected => ActivityCode::PaymentRejected,
            _ => ActivityCode::PaymentVerified,
        };
        activity::record(
            &mut *tx,
            actor,
            code,
            Some(payment.id),
            format!("payment {} {}", payment.jumlah_bayar, status),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(payment_id = %payment.id, status = %status, "payment verified");
        self.get(actor, id).await
    }

    fn push_filters<'a>(
        qb: &mut QueryBuilder<'a, Postgres>,
        actor: &Actor,
        filter: &'a PaymentFilter,
    ) {
        qb.push(" WHERE TRUE");
        if let Some(buyer_id) = actor.buyer_scope() {
            qb.push(" AND po.buyer_id = ").push_bind(buyer_id);
        }
        if let Some(po_id) = filter.po_id {
            qb.push(" AND p.po_id = ").push_bind(po_id);
        }
        if let Some(status) = filter.status {
            qb.push(" AND p.status = ").push_bind(status.as_str());
        }
    }

    pub async fn list(
        &self,
        actor: &Actor,
        filter: &PaymentFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<PaymentView>> {
        let mut count = QueryBuilder::<Postgres>::new(format!(
            "SELECT COUNT(*){}",
            PAYMENT_VIEW_FROM
        ));
        Self::push_filters(&mut count, actor, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {}, po.po_number, d.nomor_invoice, d.total_akhir{}",
            PAYMENT_COLUMNS, PAYMENT_VIEW_FROM
        ));
        Self::push_filters(&mut qb, actor, filter);
        qb.push(" ORDER BY p.created_at DESC LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows: Vec<PaymentViewRow> = qb.build_query_as().fetch_all(&self.db).await?;
        let payments = rows
            .into_iter()
            .map(PaymentView::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse::new(payments, pagination, total.max(0) as u64))
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> AppResult<PaymentView> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {}, po.po_number, d.nomor_invoice, d.total_akhir{}",
            PAYMENT_COLUMNS, PAYMENT_VIEW_FROM
        ));
        qb.push(" WHERE p.id = ").push_bind(id);
        if let Some(buyer_id) = actor.buyer_scope() {
            qb.push(" AND po.buyer_id = ").push_bind(buyer_id);
        }

        let row: PaymentViewRow = qb
            .build_query_as()
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment".to_string()))?;
        row.try_into()
    }
}
