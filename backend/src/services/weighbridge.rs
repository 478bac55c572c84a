//! Weighbridge service: weigh-in, weigh-out and document issuance
//!
//! Weigh-out completes the weighing, the schedule and the order and issues
//! the sales document in a single transaction.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    ActivityCode, BuyerSnapshot, DocumentNumbers, DomainError, Grade, GradeAdjustmentPolicy,
    OrderAction, OrderStatus, PaginatedResponse, Pagination, SalesDocument, ScheduleStatus,
    WeighOutReading, WeighbridgeRecord, WeighbridgeStatus,
};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::sequence::{self, SequenceScope};
use super::{activity, document, order, schedule};
use crate::error::{AppError, AppResult};
use crate::middleware::Actor;

#[derive(Clone)]
pub struct WeighbridgeService {
    db: PgPool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeighInRequest {
    pub berat_masuk: Decimal,
}

/// Weighbridge record with its order and schedule details
#[derive(Debug, Clone, Serialize)]
pub struct WeighbridgeView {
    #[serde(flatten)]
    pub record: WeighbridgeRecord,
    pub po_number: String,
    pub grade_diminta: String,
    pub buyer_name: String,
    pub nomor_antrian: i32,
    pub nama_sopir: String,
}

/// Result of a weigh-out: the completed record and the issued document
#[derive(Debug, Clone, Serialize)]
pub struct WeighOutOutcome {
    pub timbangan: WeighbridgeRecord,
    pub dokumen: SalesDocument,
}

#[derive(Debug, Default, Deserialize)]
pub struct WeighbridgeFilter {
    pub po_id: Option<Uuid>,
    pub status: Option<WeighbridgeStatus>,
    pub grade: Option<Grade>,
}

#[derive(Debug, FromRow)]
struct RecordRow {
    id: Uuid,
    po_id: Uuid,
    jadwal_id: Uuid,
    plat_nomor: String,
    berat_masuk: Option<Decimal>,
    waktu_masuk: Option<DateTime<Utc>>,
    petugas_masuk: Option<Uuid>,
    berat_keluar: Option<Decimal>,
    waktu_keluar: Option<DateTime<Utc>>,
    petugas_keluar: Option<Uuid>,
    berat_bersih: Option<Decimal>,
    grade_aktual: Option<String>,
    kadar_air: Option<Decimal>,
    kadar_sampah: Option<Decimal>,
    tingkat_kematangan: Option<String>,
    catatan: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RecordRow> for WeighbridgeRecord {
    type Error = AppError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        Ok(WeighbridgeRecord {
            id: row.id,
            po_id: row.po_id,
            jadwal_id: row.jadwal_id,
            plat_nomor: row.plat_nomor,
            berat_masuk: row.berat_masuk,
            waktu_masuk: row.waktu_masuk,
            petugas_masuk: row.petugas_masuk,
            berat_keluar: row.berat_keluar,
            waktu_keluar: row.waktu_keluar,
            petugas_keluar: row.petugas_keluar,
            berat_bersih: row.berat_bersih,
            grade_aktual: row
                .grade_aktual
                .map(|g| g.parse::<Grade>())
                .transpose()
                .map_err(|e| AppError::corrupt("assessed grade", e))?,
            kadar_air: row.kadar_air,
            kadar_sampah: row.kadar_sampah,
            tingkat_kematangan: row.tingkat_kematangan,
            catatan: row.catatan,
            status: row.status.parse().map_err(|e| AppError::corrupt("weighbridge status", e))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct RecordViewRow {
    #[sqlx(flatten)]
    record: RecordRow,
    po_number: String,
    grade_diminta: String,
    buyer_name: String,
    nomor_antrian: i32,
    nama_sopir: String,
}

impl TryFrom<RecordViewRow> for WeighbridgeView {
    type Error = AppError;

    fn try_from(row: RecordViewRow) -> Result<Self, Self::Error> {
        Ok(WeighbridgeView {
            record: row.record.try_into()?,
            po_number: row.po_number,
            grade_diminta: row.grade_diminta,
            buyer_name: row.buyer_name,
            nomor_antrian: row.nomor_antrian,
            nama_sopir: row.nama_sopir,
        })
    }
}

const RECORD_COLUMNS: &str = "t.id, t.po_id, t.jadwal_id, t.plat_nomor, t.berat_masuk, \
     t.waktu_masuk, t.petugas_masuk, t.berat_keluar, t.waktu_keluar, t.petugas_keluar, \
     t.berat_bersih, t.grade_aktual, t.kadar_air, t.kadar_sampah, t.tingkat_kematangan, \
     t.catatan, t.status, t.created_at, t.updated_at";

pub(crate) async fn insert_record(
    conn: &mut PgConnection,
    record: &WeighbridgeRecord,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO timbangan (id, po_id, jadwal_id, plat_nomor, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $6)
        "#,
    )
    .bind(record.id)
    .bind(record.po_id)
    .bind(record.jadwal_id)
    .bind(&record.plat_nomor)
    .bind(record.status.as_str())
    .bind(record.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn lock_record_for_order(
    conn: &mut PgConnection,
    po_id: Uuid,
) -> AppResult<Option<WeighbridgeRecord>> {
    sqlx::query_as::<_, RecordRow>(&format!(
        "SELECT {} FROM timbangan t WHERE t.po_id = $1 FOR UPDATE",
        RECORD_COLUMNS
    ))
    .bind(po_id)
    .fetch_optional(&mut *conn)
    .await?
    .map(WeighbridgeRecord::try_from)
    .transpose()
}

/// Persist every reading of a locked record
pub(crate) async fn store_record(
    conn: &mut PgConnection,
    record: &WeighbridgeRecord,
) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE timbangan
        SET berat_masuk = $2, waktu_masuk = $3, petugas_masuk = $4,
            berat_keluar = $5, waktu_keluar = $6, petugas_keluar = $7,
            berat_bersih = $8, grade_aktual = $9, kadar_air = $10, kadar_sampah = $11,
            tingkat_kematangan = $12, catatan = $13, status = $14, updated_at = $15
        WHERE id = $1
        "#,
    )
    .bind(record.id)
    .bind(record.berat_masuk)
    .bind(record.waktu_masuk)
    .bind(record.petugas_masuk)
    .bind(record.berat_keluar)
    .bind(record.waktu_keluar)
    .bind(record.petugas_keluar)
    .bind(record.berat_bersih)
    .bind(record.grade_aktual.map(|g| g.as_str()))
    .bind(record.kadar_air)
    .bind(record.kadar_sampah)
    .bind(&record.tingkat_kematangan)
    .bind(&record.catatan)
    .bind(record.status.as_str())
    .bind(record.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Order id of a record, read without a lock so the order can be locked
/// first
async fn order_of_record(conn: &mut PgConnection, id: Uuid) -> AppResult<Uuid> {
    sqlx::query_scalar::<_, Uuid>("SELECT po_id FROM timbangan WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Weighbridge record".to_string()))
}

/// Lock the order, then its schedule, then the record, the same order
/// the order service uses
async fn lock_weighing(
    conn: &mut PgConnection,
    id: Uuid,
) -> AppResult<(shared::PurchaseOrder, shared::PickupSchedule, WeighbridgeRecord)> {
    let po_id = order_of_record(&mut *conn, id).await?;
    let order = order::lock_order(&mut *conn, po_id).await?;
    let pickup = schedule::lock_schedule_for_order(&mut *conn, po_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Pickup schedule".to_string()))?;
    let record = lock_record_for_order(&mut *conn, po_id)
        .await?
        .filter(|r| r.id == id)
        .ok_or_else(|| AppError::NotFound("Weighbridge record".to_string()))?;
    if record.jadwal_id != pickup.id {
        return Err(DomainError::Consistency(format!(
            "weighbridge record {} points at schedule {}, order has {}",
            record.id, record.jadwal_id, pickup.id
        ))
        .into());
    }
    Ok((order, pickup, record))
}

async fn buyer_snapshot(conn: &mut PgConnection, buyer_id: Uuid) -> AppResult<BuyerSnapshot> {
    let (username, company_name) = sqlx::query_as::<_, (String, Option<String>)>(
        "SELECT username, company_name FROM users WHERE id = $1",
    )
    .bind(buyer_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::corrupt("order buyer", format!("user {} is missing", buyer_id)))?;

    Ok(BuyerSnapshot {
        buyer_id,
        username,
        company_name,
    })
}

impl WeighbridgeService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Record the truck's gross weight on arrival. Starts loading for the
    /// order and its schedule.
    pub async fn weigh_in(
        &self,
        actor: &Actor,
        id: Uuid,
        request: WeighInRequest,
    ) -> AppResult<WeighbridgeView> {
        actor.require_privileged()?;

        let mut tx = self.db.begin().await?;
        let (mut order, mut pickup, mut record) = lock_weighing(&mut *tx, id).await?;
        let now = Utc::now();

        if order.status != OrderStatus::Approved {
            return Err(
                DomainError::invalid_transition("purchase order", order.status, "weigh in")
                    .into(),
            );
        }
        record.weigh_in(request.berat_masuk, actor.user_id, now)?;
        pickup.status = pickup.status.apply(ScheduleStatus::InProgress)?;
        order.transition(OrderAction::StartLoading, None, now)?;

        store_record(&mut *tx, &record).await?;
        schedule::store_schedule_status(&mut *tx, &pickup).await?;
        order::store_order(&mut *tx, &order).await?;

        activity::record(
            &mut *tx,
            actor,
            ActivityCode::WeighIn,
            Some(record.id),
            format!("{} weigh-in {} kg ({})", order.po_number, request.berat_masuk, record.plat_nomor),
        )
        .await?;
        activity::record(
            &mut *tx,
            actor,
            ActivityCode::OrderLoading,
            Some(order.id),
            format!("{}: approved -> loading", order.po_number),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(record_id = %record.id, order_id = %order.id, kg = %request.berat_masuk, "weigh-in recorded");
        self.get(actor, id).await
    }

    /// Record the departure weight and quality, complete the order and issue
    /// its sales document.
    pub async fn weigh_out(
        &self,
        actor: &Actor,
        id: Uuid,
        reading: WeighOutReading,
        policy: &GradeAdjustmentPolicy,
        today: NaiveDate,
    ) -> AppResult<WeighOutOutcome> {
        actor.require_privileged()?;

        let mut tx = self.db.begin().await?;
        let (mut order, mut pickup, mut record) = lock_weighing(&mut *tx, id).await?;
        let now = Utc::now();

        // Check the order can complete before recording anything
        order.status.apply(OrderAction::Complete)?;
        let berat_bersih = record.weigh_out(reading, actor.user_id, now)?;
        pickup.status = pickup.status.apply(ScheduleStatus::Completed)?;
        order.transition(OrderAction::Complete, None, now)?;

        let buyer = buyer_snapshot(&mut *tx, order.buyer_id).await?;
        let seq = sequence::next_value(&mut *tx, SequenceScope::SalesDocument, today).await?;
        let dokumen = SalesDocument::issue(
            Uuid::new_v4(),
            DocumentNumbers::for_day(today, seq),
            &order,
            &record,
            &buyer,
            policy,
            today,
            now,
        )?;

        store_record(&mut *tx, &record).await?;
        schedule::store_schedule_status(&mut *tx, &pickup).await?;
        order::store_order(&mut *tx, &order).await?;
        document::insert_document(&mut *tx, &dokumen).await?;

        activity::record(
            &mut *tx,
            actor,
            ActivityCode::WeighOut,
            Some(record.id),
            format!(
                "{} net {} kg grade {}",
                order.po_number,
                berat_bersih,
                dokumen.grade_aktual
            ),
        )
        .await?;
        activity::record(
            &mut *tx,
            actor,
            ActivityCode::OrderCompleted,
            Some(order.id),
            format!("{}: loading -> completed", order.po_number),
        )
        .await?;
        activity::record(
            &mut *tx,
            actor,
            ActivityCode::DocumentIssued,
            Some(dokumen.id),
            format!(
                "{} / {} total {}",
                dokumen.numbers.nomor_invoice, order.po_number, dokumen.total_akhir
            ),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            record_id = %record.id,
            order_id = %order.id,
            net_kg = %berat_bersih,
            invoice = %dokumen.numbers.nomor_invoice,
            total = %dokumen.total_akhir,
            "weigh-out recorded, document issued"
        );
        Ok(WeighOutOutcome {
            timbangan: record,
            dokumen,
        })
    }

    fn select_view() -> String {
        format!(
            "SELECT {}, po.po_number, po.grade_diminta, u.username AS buyer_name, \
             j.nomor_antrian, j.nama_sopir \
             FROM timbangan t \
             JOIN purchase_orders po ON po.id = t.po_id \
             JOIN users u ON u.id = po.buyer_id \
             JOIN jadwal_pengambilan j ON j.id = t.jadwal_id",
            RECORD_COLUMNS
        )
    }

    fn push_filters<'a>(
        qb: &mut QueryBuilder<'a, Postgres>,
        actor: &Actor,
        filter: &'a WeighbridgeFilter,
    ) {
        qb.push(" WHERE TRUE");
        if let Some(buyer_id) = actor.buyer_scope() {
            qb.push(" AND po.buyer_id = ").push_bind(buyer_id);
        }
        if let Some(po_id) = filter.po_id {
            qb.push(" AND t.po_id = ").push_bind(po_id);
        }
        if let Some(status) = filter.status {
            qb.push(" AND t.status = ").push_bind(status.as_str());
        }
        if let Some(grade) = filter.grade {
            qb.push(" AND t.grade_aktual = ").push_bind(grade.as_str());
        }
    }

    pub async fn list(
        &self,
        actor: &Actor,
        filter: &WeighbridgeFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<WeighbridgeView>> {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM timbangan t JOIN purchase_orders po ON po.id = t.po_id",
        );
        Self::push_filters(&mut count, actor, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let mut qb = QueryBuilder::<Postgres>::new(Self::select_view());
        Self::push_filters(&mut qb, actor, filter);
        qb.push(" ORDER BY t.created_at DESC LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows: Vec<RecordViewRow> = qb.build_query_as().fetch_all(&self.db).await?;
        let records = rows
            .into_iter()
            .map(WeighbridgeView::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse::new(records, pagination, total.max(0) as u64))
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> AppResult<WeighbridgeView> {
        let mut qb = QueryBuilder::<Postgres>::new(Self::select_view());
        qb.push(" WHERE t.id = ").push_bind(id);
        if let Some(buyer_id) = actor.buyer_scope() {
            qb.push(" AND po.buyer_id = ").push_bind(buyer_id);
        }

        let row: RecordViewRow = qb
            .build_query_as()
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Weighbridge record".to_string()))?;
        row.try_into()
    }
}
