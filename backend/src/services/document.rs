//! Sales documents (delivery note, invoice, weighing certificate)

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{DocumentNumbers, Grade, PaginatedResponse, Pagination, SalesDocument};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::Actor;

#[derive(Clone)]
pub struct DocumentService {
    db: PgPool,
}

/// Document with its latest payment status and whether the stored
/// fingerprint still matches the printed fields
#[derive(Debug, Clone, Serialize)]
pub struct DocumentView {
    #[serde(flatten)]
    pub document: SalesDocument,
    pub payment_status: String,
    pub fingerprint_valid: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct DocumentFilter {
    pub po_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub grade: Option<Grade>,
}

#[derive(Debug, FromRow)]
pub(crate) struct DocumentRow {
    id: Uuid,
    po_id: Uuid,
    timbang_id: Uuid,
    po_number: String,
    nomor_surat_jalan: String,
    nomor_invoice: String,
    nomor_bukti_timbang: String,
    tanggal_dokumen: NaiveDate,
    buyer_id: Uuid,
    buyer_name: String,
    buyer_company: Option<String>,
    grade_diminta: String,
    grade_aktual: String,
    jumlah_kg: Decimal,
    harga_per_kg: Decimal,
    total_harga: Decimal,
    penyesuaian_harga: Decimal,
    total_akhir: Decimal,
    fingerprint: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<DocumentRow> for SalesDocument {
    type Error = AppError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        Ok(SalesDocument {
            id: row.id,
            po_id: row.po_id,
            timbang_id: row.timbang_id,
            po_number: row.po_number,
            numbers: DocumentNumbers {
                nomor_surat_jalan: row.nomor_surat_jalan,
                nomor_invoice: row.nomor_invoice,
                nomor_bukti_timbang: row.nomor_bukti_timbang,
            },
            tanggal_dokumen: row.tanggal_dokumen,
            buyer_id: row.buyer_id,
            buyer_name: row.buyer_name,
            buyer_company: row.buyer_company,
            grade_diminta: row
                .grade_diminta
                .parse()
                .map_err(|e| AppError::corrupt("document requested grade", e))?,
            grade_aktual: row
                .grade_aktual
                .parse()
                .map_err(|e| AppError::corrupt("document assessed grade", e))?,
            jumlah_kg: row.jumlah_kg,
            harga_per_kg: row.harga_per_kg,
            total_harga: row.total_harga,
            penyesuaian_harga: row.penyesuaian_harga,
            total_akhir: row.total_akhir,
            fingerprint: row.fingerprint,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct DocumentViewRow {
    #[sqlx(flatten)]
    document: DocumentRow,
    payment_status: String,
}

impl TryFrom<DocumentViewRow> for DocumentView {
    type Error = AppError;

    fn try_from(row: DocumentViewRow) -> Result<Self, Self::Error> {
        let document: SalesDocument = row.document.try_into()?;
        let fingerprint_valid = document.verify_fingerprint();
        if !fingerprint_valid {
            tracing::warn!(document_id = %document.id, "document fingerprint mismatch");
        }
        Ok(DocumentView {
            document,
            payment_status: row.payment_status,
            fingerprint_valid,
        })
    }
}

pub(crate) const DOCUMENT_COLUMNS: &str = "d.id, d.po_id, d.timbang_id, po.po_number, \
     d.nomor_surat_jalan, d.nomor_invoice, d.nomor_bukti_timbang, d.tanggal_dokumen, \
     d.buyer_id, d.buyer_name, d.buyer_company, d.grade_diminta, d.grade_aktual, d.jumlah_kg, \
     d.harga_per_kg, d.total_harga, d.penyesuaian_harga, d.total_akhir, d.fingerprint, \
     d.created_at";

const DOCUMENT_VIEW_FROM: &str = r#"
    FROM dokumen_penjualan d
    JOIN purchase_orders po ON po.id = d.po_id
    LEFT JOIN LATERAL (
        SELECT p.status
        FROM pembayaran p
        WHERE p.dokumen_id = d.id
        ORDER BY p.created_at DESC
        LIMIT 1
    ) latest_payment ON TRUE
"#;

pub(crate) async fn insert_document(
    conn: &mut PgConnection,
    document: &SalesDocument,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO dokumen_penjualan (
            id, po_id, timbang_id, nomor_surat_jalan, nomor_invoice, nomor_bukti_timbang,
            tanggal_dokumen, buyer_id, buyer_name, buyer_company, grade_diminta, grade_aktual,
            jumlah_kg, harga_per_kg, total_harga, penyesuaian_harga, total_akhir, fingerprint,
            created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
        "#,
    )
    .bind(document.id)
    .bind(document.po_id)
    .bind(document.timbang_id)
    .bind(&document.numbers.nomor_surat_jalan)
    .bind(&document.numbers.nomor_invoice)
    .bind(&document.numbers.nomor_bukti_timbang)
    .bind(document.tanggal_dokumen)
    .bind(document.buyer_id)
    .bind(&document.buyer_name)
    .bind(&document.buyer_company)
    .bind(document.grade_diminta.as_str())
    .bind(document.grade_aktual.as_str())
    .bind(document.jumlah_kg)
    .bind(document.harga_per_kg)
    .bind(document.total_harga)
    .bind(document.penyesuaian_harga)
    .bind(document.total_akhir)
    .bind(&document.fingerprint)
    .bind(document.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Load a document for a payment against it
pub(crate) async fn load_document(conn: &mut PgConnection, id: Uuid) -> AppResult<SalesDocument> {
    sqlx::query_as::<_, DocumentRow>(&format!(
        "SELECT {} FROM dokumen_penjualan d JOIN purchase_orders po ON po.id = d.po_id \
         WHERE d.id = $1",
        DOCUMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Sales document".to_string()))?
    .try_into()
}

impl DocumentService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn push_filters<'a>(
        qb: &mut QueryBuilder<'a, Postgres>,
        actor: &Actor,
        filter: &'a DocumentFilter,
    ) {
        qb.push(" WHERE TRUE");
        if let Some(buyer_id) = actor.buyer_scope() {
            qb.push(" AND d.buyer_id = ").push_bind(buyer_id);
        }
        if let Some(po_id) = filter.po_id {
            qb.push(" AND d.po_id = ").push_bind(po_id);
        }
        if let Some(start) = filter.start_date {
            qb.push(" AND d.tanggal_dokumen >= ").push_bind(start);
        }
        if let Some(end) = filter.end_date {
            qb.push(" AND d.tanggal_dokumen <= ").push_bind(end);
        }
        if let Some(grade) = filter.grade {
            qb.push(" AND d.grade_aktual = ").push_bind(grade.as_str());
        }
    }

    pub async fn list(
        &self,
        actor: &Actor,
        filter: &DocumentFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<DocumentView>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM dokumen_penjualan d");
        Self::push_filters(&mut count, actor, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {}, COALESCE(latest_payment.status, 'unpaid') AS payment_status {}",
            DOCUMENT_COLUMNS, DOCUMENT_VIEW_FROM
        ));
        Self::push_filters(&mut qb, actor, filter);
        qb.push(" ORDER BY d.tanggal_dokumen DESC, d.created_at DESC LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows: Vec<DocumentViewRow> = qb.build_query_as().fetch_all(&self.db).await?;
        let documents = rows
            .into_iter()
            .map(DocumentView::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse::new(documents, pagination, total.max(0) as u64))
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> AppResult<DocumentView> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {}, COALESCE(latest_payment.status, 'unpaid') AS payment_status {}",
            DOCUMENT_COLUMNS, DOCUMENT_VIEW_FROM
        ));
        qb.push(" WHERE d.id = ").push_bind(id);
        if let Some(buyer_id) = actor.buyer_scope() {
            qb.push(" AND d.buyer_id = ").push_bind(buyer_id);
        }

        let row: DocumentViewRow = qb
            .build_query_as()
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Sales document".to_string()))?;
        row.try_into()
    }
}
