//! Stock ledger service: plantations and TBS stock lots

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    ActivityCode, Grade, Kebun, NewStockLot, PaginatedResponse, Pagination, StockLot,
    StockLotUpdate, StockStatus,
};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::activity;
use crate::error::{AppError, AppResult};
use crate::middleware::Actor;

/// Stock service for managing plantations and stock lots
#[derive(Clone)]
pub struct StockService {
    db: PgPool,
}

/// Stock lot with its plantation's name and location
#[derive(Debug, Clone, Serialize)]
pub struct StockLotView {
    #[serde(flatten)]
    pub lot: StockLot,
    pub nama_kebun: String,
    pub lokasi_kebun: String,
}

/// Filters for the stock listing
#[derive(Debug, Default, Deserialize)]
pub struct StockFilter {
    /// Defaults to `available`; `all` lists every status
    pub status: Option<String>,
    pub grade: Option<Grade>,
    pub kebun_id: Option<Uuid>,
}

impl StockFilter {
    fn status(&self) -> AppResult<Option<StockStatus>> {
        match self.status.as_deref() {
            None | Some("") => Ok(Some(StockStatus::Available)),
            Some("all") => Ok(None),
            Some(s) => Ok(Some(s.parse()?)),
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct StockRow {
    id: Uuid,
    kebun_id: Uuid,
    tanggal_panen: NaiveDate,
    grade: String,
    jumlah_kg: Decimal,
    jumlah_tersedia: Decimal,
    harga_per_kg: Decimal,
    kadar_minyak: Option<Decimal>,
    keterangan: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StockRow> for StockLot {
    type Error = AppError;

    fn try_from(row: StockRow) -> Result<Self, Self::Error> {
        Ok(StockLot {
            id: row.id,
            kebun_id: row.kebun_id,
            tanggal_panen: row.tanggal_panen,
            grade: row.grade.parse().map_err(|e| AppError::corrupt("stock grade", e))?,
            jumlah_kg: row.jumlah_kg,
            jumlah_tersedia: row.jumlah_tersedia,
            harga_per_kg: row.harga_per_kg,
            kadar_minyak: row.kadar_minyak,
            keterangan: row.keterangan,
            status: row.status.parse().map_err(|e| AppError::corrupt("stock status", e))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct StockViewRow {
    #[sqlx(flatten)]
    lot: StockRow,
    nama_kebun: String,
    lokasi_kebun: String,
}

impl TryFrom<StockViewRow> for StockLotView {
    type Error = AppError;

    fn try_from(row: StockViewRow) -> Result<Self, Self::Error> {
        Ok(StockLotView {
            lot: row.lot.try_into()?,
            nama_kebun: row.nama_kebun,
            lokasi_kebun: row.lokasi_kebun,
        })
    }
}

#[derive(Debug, FromRow)]
struct KebunRow {
    id: Uuid,
    nama_kebun: String,
    lokasi: String,
    luas_hektar: Decimal,
    koordinat: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<KebunRow> for Kebun {
    type Error = AppError;

    fn try_from(row: KebunRow) -> Result<Self, Self::Error> {
        Ok(Kebun {
            id: row.id,
            nama_kebun: row.nama_kebun,
            lokasi: row.lokasi,
            luas_hektar: row.luas_hektar,
            koordinat: row.koordinat,
            status: row.status.parse().map_err(|e| AppError::corrupt("kebun status", e))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const STOCK_COLUMNS: &str = "s.id, s.kebun_id, s.tanggal_panen, s.grade, s.jumlah_kg, \
     s.jumlah_tersedia, s.harga_per_kg, s.kadar_minyak, s.keterangan, s.status, \
     s.created_at, s.updated_at";

/// Lock a lot row for the rest of the transaction
pub(crate) async fn lock_lot(conn: &mut PgConnection, id: Uuid) -> AppResult<StockLot> {
    let row = sqlx::query_as::<_, StockRow>(&format!(
        "SELECT {} FROM stok_tbs s WHERE s.id = $1 FOR UPDATE",
        STOCK_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Stock lot".to_string()))?;
    row.try_into()
}

/// Persist the mutable ledger fields of a locked lot
pub(crate) async fn store_lot(conn: &mut PgConnection, lot: &StockLot) -> AppResult<()> {
    lot.check_invariants()?;
    sqlx::query(
        r#"
        UPDATE stok_tbs
        SET jumlah_tersedia = $2, harga_per_kg = $3, status = $4, keterangan = $5,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(lot.id)
    .bind(lot.jumlah_tersedia)
    .bind(lot.harga_per_kg)
    .bind(lot.status.as_str())
    .bind(&lot.keterangan)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Quantity held by orders that may still hand it back to the lot.
///
/// Call with the lot locked; every reserve and release takes that lock.
pub(crate) async fn open_reservations(
    conn: &mut PgConnection,
    lot_id: Uuid,
) -> AppResult<Decimal> {
    let held = sqlx::query_scalar::<_, Decimal>(
        "SELECT COALESCE(SUM(jumlah_kg), 0) FROM purchase_orders \
         WHERE stok_id = $1 AND status IN ('pending', 'approved')",
    )
    .bind(lot_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(held)
}

/// Plantation name for a lot's pickup location
pub(crate) async fn kebun_name(conn: &mut PgConnection, kebun_id: Uuid) -> AppResult<String> {
    sqlx::query_scalar::<_, String>("SELECT nama_kebun FROM kebun WHERE id = $1")
        .bind(kebun_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Kebun".to_string()))
}

impl StockService {
    /// Create a new StockService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Active plantations ordered by name
    pub async fn list_kebun(&self) -> AppResult<Vec<Kebun>> {
        let rows = sqlx::query_as::<_, KebunRow>(
            r#"
            SELECT id, nama_kebun, lokasi, luas_hektar, koordinat, status, created_at, updated_at
            FROM kebun
            WHERE status = 'active'
            ORDER BY nama_kebun
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Kebun::try_from).collect()
    }

    fn push_filters<'a>(
        qb: &mut QueryBuilder<'a, Postgres>,
        status: Option<StockStatus>,
        filter: &'a StockFilter,
    ) {
        qb.push(" WHERE TRUE");
        if let Some(status) = status {
            qb.push(" AND s.status = ").push_bind(status.as_str());
        }
        if let Some(grade) = filter.grade {
            qb.push(" AND s.grade = ").push_bind(grade.as_str());
        }
        if let Some(kebun_id) = filter.kebun_id {
            qb.push(" AND s.kebun_id = ").push_bind(kebun_id);
        }
    }

    /// Paginated stock listing, newest harvest first
    pub async fn list_stock(
        &self,
        filter: &StockFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<StockLotView>> {
        let status = filter.status()?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM stok_tbs s");
        Self::push_filters(&mut count, status, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {}, k.nama_kebun, k.lokasi AS lokasi_kebun \
             FROM stok_tbs s JOIN kebun k ON k.id = s.kebun_id",
            STOCK_COLUMNS
        ));
        Self::push_filters(&mut qb, status, filter);
        qb.push(" ORDER BY s.tanggal_panen DESC, s.created_at DESC LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows: Vec<StockViewRow> = qb.build_query_as().fetch_all(&self.db).await?;
        let lots = rows
            .into_iter()
            .map(StockLotView::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse::new(lots, pagination, total.max(0) as u64))
    }

    pub async fn get_stock(&self, id: Uuid) -> AppResult<StockLotView> {
        let row = sqlx::query_as::<_, StockViewRow>(&format!(
            "SELECT {}, k.nama_kebun, k.lokasi AS lokasi_kebun \
             FROM stok_tbs s JOIN kebun k ON k.id = s.kebun_id WHERE s.id = $1",
            STOCK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Stock lot".to_string()))?;

        row.try_into()
    }

    /// Register a newly harvested lot; all of it starts available
    pub async fn create_stock(&self, actor: &Actor, input: NewStockLot) -> AppResult<StockLotView> {
        actor.require_privileged()?;

        let mut tx = self.db.begin().await?;

        let kebun_status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM kebun WHERE id = $1",
        )
        .bind(input.kebun_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Kebun".to_string()))?;
        if kebun_status != "active" {
            return Err(AppError::validation("kebun_id", "plantation is not active"));
        }

        let lot = StockLot::create(Uuid::new_v4(), input, Utc::now())?;

        sqlx::query(
            r#"
            INSERT INTO stok_tbs (id, kebun_id, tanggal_panen, grade, jumlah_kg, jumlah_tersedia,
                                  harga_per_kg, kadar_minyak, keterangan, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            "#,
        )
        .bind(lot.id)
        .bind(lot.kebun_id)
        .bind(lot.tanggal_panen)
        .bind(lot.grade.as_str())
        .bind(lot.jumlah_kg)
        .bind(lot.jumlah_tersedia)
        .bind(lot.harga_per_kg)
        .bind(lot.kadar_minyak)
        .bind(&lot.keterangan)
        .bind(lot.status.as_str())
        .bind(lot.created_at)
        .execute(&mut *tx)
        .await?;

        activity::record(
            &mut *tx,
            actor,
            ActivityCode::StockCreated,
            Some(lot.id),
            format!("{} kg grade {} harvested {}", lot.jumlah_kg, lot.grade, lot.tanggal_panen),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(stock_id = %lot.id, kg = %lot.jumlah_kg, grade = %lot.grade, "stock lot created");
        self.get_stock(lot.id).await
    }

    /// Manual correction by inventory staff
    pub async fn update_stock(
        &self,
        actor: &Actor,
        id: Uuid,
        update: StockLotUpdate,
    ) -> AppResult<StockLotView> {
        actor.require_privileged()?;

        let mut tx = self.db.begin().await?;
        let mut lot = lock_lot(&mut *tx, id).await?;
        let before = (lot.jumlah_tersedia, lot.status);
        let reserved = open_reservations(&mut *tx, id).await?;

        lot.apply_update(update, reserved)?;
        store_lot(&mut *tx, &lot).await?;

        activity::record(
            &mut *tx,
            actor,
            ActivityCode::StockUpdated,
            Some(lot.id),
            format!(
                "available {} -> {} kg, status {} -> {}",
                before.0, lot.jumlah_tersedia, before.1, lot.status
            ),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(stock_id = %lot.id, status = %lot.status, available = %lot.jumlah_tersedia, "stock lot updated");
        self.get_stock(id).await
    }
}
