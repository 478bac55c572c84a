//! Pickup schedules and the daily loading queue

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{
    ActivityCode, NewSchedule, PaginatedResponse, Pagination, PickupSchedule, ScheduleStatus,
    WeighbridgeRecord,
};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::sequence::{self, SequenceScope};
use super::{activity, order, weighbridge};
use crate::error::{AppError, AppResult};
use crate::middleware::Actor;

#[derive(Clone)]
pub struct ScheduleService {
    db: PgPool,
}

/// Schedule with its order number and buyer
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleView {
    #[serde(flatten)]
    pub schedule: PickupSchedule,
    pub po_number: String,
    pub buyer_name: String,
    pub jumlah_kg: rust_decimal::Decimal,
    pub weighbridge_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScheduleFilter {
    pub status: Option<ScheduleStatus>,
    /// Loading day
    pub tanggal: Option<NaiveDate>,
}

#[derive(Debug, FromRow)]
struct ScheduleRow {
    id: Uuid,
    po_id: Uuid,
    nomor_antrian: i32,
    waktu_loading: NaiveDateTime,
    plat_nomor: String,
    nama_sopir: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ScheduleRow> for PickupSchedule {
    type Error = AppError;

    fn try_from(row: ScheduleRow) -> Result<Self, Self::Error> {
        Ok(PickupSchedule {
            id: row.id,
            po_id: row.po_id,
            nomor_antrian: row.nomor_antrian,
            waktu_loading: row.waktu_loading,
            plat_nomor: row.plat_nomor,
            nama_sopir: row.nama_sopir,
            status: row.status.parse().map_err(|e| AppError::corrupt("schedule status", e))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ScheduleViewRow {
    #[sqlx(flatten)]
    schedule: ScheduleRow,
    po_number: String,
    buyer_name: String,
    jumlah_kg: rust_decimal::Decimal,
    weighbridge_id: Option<Uuid>,
}

const SCHEDULE_COLUMNS: &str = "j.id, j.po_id, j.nomor_antrian, j.waktu_loading, \
     j.plat_nomor, j.nama_sopir, j.status, j.created_at, j.updated_at";

/// Lock the schedule of an order, if it has one
pub(crate) async fn lock_schedule_for_order(
    conn: &mut PgConnection,
    po_id: Uuid,
) -> AppResult<Option<PickupSchedule>> {
    sqlx::query_as::<_, ScheduleRow>(&format!(
        "SELECT {} FROM jadwal_pengambilan j WHERE j.po_id = $1 FOR UPDATE",
        SCHEDULE_COLUMNS
    ))
    .bind(po_id)
    .fetch_optional(&mut *conn)
    .await?
    .map(PickupSchedule::try_from)
    .transpose()
}

pub(crate) async fn store_schedule_status(
    conn: &mut PgConnection,
    schedule: &PickupSchedule,
) -> AppResult<()> {
    sqlx::query("UPDATE jadwal_pengambilan SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(schedule.id)
        .bind(schedule.status.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

impl ScheduleService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Schedule the pickup of an approved order. Takes the next queue
    /// number of the loading day and opens the order's weighbridge record.
    pub async fn create(&self, actor: &Actor, input: NewSchedule) -> AppResult<ScheduleView> {
        actor.require_privileged()?;

        let mut tx = self.db.begin().await?;
        let order = order::lock_order(&mut *tx, input.po_id).await?;

        if lock_schedule_for_order(&mut *tx, order.id).await?.is_some() {
            return Err(shared::DomainError::invalid_transition(
                "purchase order",
                order.status,
                "schedule again",
            )
            .into());
        }

        let day = input.loading_day();
        let seq = sequence::next_value(&mut *tx, SequenceScope::LoadingQueue, day).await?;
        let nomor_antrian = i32::try_from(seq).map_err(|_| {
            AppError::Internal(format!("loading queue for {} overflowed", day))
        })?;

        let now = Utc::now();
        let schedule = PickupSchedule::create(Uuid::new_v4(), &order, input, nomor_antrian, now)?;
        let record = WeighbridgeRecord::open(
            Uuid::new_v4(),
            order.id,
            schedule.id,
            schedule.plat_nomor.clone(),
            now,
        );

        sqlx::query(
            r#"
            INSERT INTO jadwal_pengambilan (id, po_id, nomor_antrian, tanggal_loading, waktu_loading,
                                            plat_nomor, nama_sopir, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            "#,
        )
        .bind(schedule.id)
        .bind(schedule.po_id)
        .bind(schedule.nomor_antrian)
        .bind(day)
        .bind(schedule.waktu_loading)
        .bind(&schedule.plat_nomor)
        .bind(&schedule.nama_sopir)
        .bind(schedule.status.as_str())
        .bind(schedule.created_at)
        .execute(&mut *tx)
        .await?;

        weighbridge::insert_record(&mut *tx, &record).await?;

        activity::record(
            &mut *tx,
            actor,
            ActivityCode::ScheduleCreated,
            Some(schedule.id),
            format!(
                "{} queue #{} on {} ({})",
                order.po_number, schedule.nomor_antrian, day, schedule.plat_nomor
            ),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            schedule_id = %schedule.id,
            order_id = %order.id,
            queue = schedule.nomor_antrian,
            %day,
            "pickup scheduled"
        );
        self.get(actor, schedule.id).await
    }

    fn push_filters<'a>(
        qb: &mut QueryBuilder<'a, Postgres>,
        actor: &Actor,
        filter: &'a ScheduleFilter,
    ) {
        qb.push(" WHERE TRUE");
        if let Some(buyer_id) = actor.buyer_scope() {
            qb.push(" AND po.buyer_id = ").push_bind(buyer_id);
        }
        if let Some(status) = filter.status {
            qb.push(" AND j.status = ").push_bind(status.as_str());
        }
        if let Some(day) = filter.tanggal {
            qb.push(" AND j.tanggal_loading = ").push_bind(day);
        }
    }

    fn select_view() -> String {
        format!(
            "SELECT {}, po.po_number, u.username AS buyer_name, po.jumlah_kg, \
             t.id AS weighbridge_id \
             FROM jadwal_pengambilan j \
             JOIN purchase_orders po ON po.id = j.po_id \
             JOIN users u ON u.id = po.buyer_id \
             LEFT JOIN timbangan t ON t.jadwal_id = j.id",
            SCHEDULE_COLUMNS
        )
    }

    /// Schedules in loading order
    pub async fn list(
        &self,
        actor: &Actor,
        filter: &ScheduleFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<ScheduleView>> {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM jadwal_pengambilan j \
             JOIN purchase_orders po ON po.id = j.po_id",
        );
        Self::push_filters(&mut count, actor, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let mut qb = QueryBuilder::<Postgres>::new(Self::select_view());
        Self::push_filters(&mut qb, actor, filter);
        qb.push(" ORDER BY j.tanggal_loading DESC, j.nomor_antrian ASC LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows: Vec<ScheduleViewRow> = qb.build_query_as().fetch_all(&self.db).await?;
        let schedules = rows
            .into_iter()
            .map(|row| {
                Ok(ScheduleView {
                    schedule: row.schedule.try_into()?,
                    po_number: row.po_number,
                    buyer_name: row.buyer_name,
                    jumlah_kg: row.jumlah_kg,
                    weighbridge_id: row.weighbridge_id,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse::new(schedules, pagination, total.max(0) as u64))
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> AppResult<ScheduleView> {
        let mut qb = QueryBuilder::<Postgres>::new(Self::select_view());
        qb.push(" WHERE j.id = ").push_bind(id);
        if let Some(buyer_id) = actor.buyer_scope() {
            qb.push(" AND po.buyer_id = ").push_bind(buyer_id);
        }

        let row: ScheduleViewRow = qb
            .build_query_as()
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Pickup schedule".to_string()))?;

        Ok(ScheduleView {
            schedule: row.schedule.try_into()?,
            po_number: row.po_number,
            buyer_name: row.buyer_name,
            jumlah_kg: row.jumlah_kg,
            weighbridge_id: row.weighbridge_id,
        })
    }
}
