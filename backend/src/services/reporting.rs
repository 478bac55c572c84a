//! Reporting service for sales figures and dashboards

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::DateRange;
use sqlx::PgPool;

use crate::error::AppResult;
use crate::middleware::Actor;

/// Reporting service
#[derive(Clone)]
pub struct ReportingService {
    db: PgPool,
}

/// Sales totals for one document date
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DailySalesReport {
    pub tanggal: NaiveDate,
    pub jumlah_transaksi: i64,
    pub total_kg: Decimal,
    /// Sum of final totals after grade adjustments
    pub total_pendapatan: Decimal,
    pub rata_rata_harga: Decimal,
    pub grade_a_kg: Decimal,
    pub grade_b_kg: Decimal,
    pub grade_c_kg: Decimal,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct OrderStatusCount {
    pub status: String,
    pub jumlah: i64,
}

/// Dashboard figures; the variant depends on the caller's role
#[derive(Debug, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum DashboardMetrics {
    Buyer {
        orders_by_status: Vec<OrderStatusCount>,
        total_orders: i64,
        /// Sum of final invoice totals over the buyer's issued documents
        total_spent: Decimal,
    },
    Operations {
        available_lots: i64,
        available_kg: Decimal,
        active_kebun: i64,
        active_buyers: i64,
        pending_orders: i64,
        revenue_this_month: Decimal,
    },
}

/// Report filter parameters
#[derive(Debug, Deserialize)]
pub struct ReportFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl ReportFilter {
    /// Requested range, defaulting to the 30 days up to `today`
    pub fn range(&self, today: NaiveDate) -> AppResult<DateRange> {
        let end = self.end_date.unwrap_or(today);
        let start = self
            .start_date
            .unwrap_or_else(|| end - chrono::Duration::days(29));
        Ok(DateRange::new(start, end)?)
    }
}

impl ReportingService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Sales per document date, oldest first
    pub async fn daily_sales(
        &self,
        actor: &Actor,
        range: DateRange,
    ) -> AppResult<Vec<DailySalesReport>> {
        actor.require_privileged()?;

        let reports = sqlx::query_as::<_, DailySalesReport>(
            r#"
            SELECT
                d.tanggal_dokumen AS tanggal,
                COUNT(*) AS jumlah_transaksi,
                COALESCE(SUM(d.jumlah_kg), 0) AS total_kg,
                COALESCE(SUM(d.total_akhir), 0) AS total_pendapatan,
                COALESCE(ROUND(AVG(d.harga_per_kg), 2), 0) AS rata_rata_harga,
                COALESCE(SUM(d.jumlah_kg) FILTER (WHERE d.grade_aktual = 'A'), 0) AS grade_a_kg,
                COALESCE(SUM(d.jumlah_kg) FILTER (WHERE d.grade_aktual = 'B'), 0) AS grade_b_kg,
                COALESCE(SUM(d.jumlah_kg) FILTER (WHERE d.grade_aktual = 'C'), 0) AS grade_c_kg
            FROM dokumen_penjualan d
            WHERE d.tanggal_dokumen BETWEEN $1 AND $2
            GROUP BY d.tanggal_dokumen
            ORDER BY d.tanggal_dokumen
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;

        Ok(reports)
    }

    /// Dashboard for the caller: own orders for buyers, operations
    /// figures for admin and staff
    pub async fn dashboard(&self, actor: &Actor, today: NaiveDate) -> AppResult<DashboardMetrics> {
        if let Some(buyer_id) = actor.buyer_scope() {
            let orders_by_status = sqlx::query_as::<_, OrderStatusCount>(
                r#"
                SELECT status, COUNT(*) AS jumlah
                FROM purchase_orders
                WHERE buyer_id = $1
                GROUP BY status
                ORDER BY status
                "#,
            )
            .bind(buyer_id)
            .fetch_all(&self.db)
            .await?;

            let total_spent: Decimal = sqlx::query_scalar(
                r#"
                SELECT COALESCE(SUM(total_akhir), 0)
                FROM dokumen_penjualan
                WHERE buyer_id = $1
                "#,
            )
            .bind(buyer_id)
            .fetch_one(&self.db)
            .await?;

            let total_orders = orders_by_status.iter().map(|c| c.jumlah).sum();
            return Ok(DashboardMetrics::Buyer {
                orders_by_status,
                total_orders,
                total_spent,
            });
        }

        let (available_lots, available_kg): (i64, Decimal) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(jumlah_tersedia), 0)
            FROM stok_tbs
            WHERE status = 'available'
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        let active_kebun: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM kebun WHERE status = 'active'")
                .fetch_one(&self.db)
                .await?;

        let active_buyers: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE role = 'buyer' AND status = 'active'",
        )
        .fetch_one(&self.db)
        .await?;

        let pending_orders: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM purchase_orders WHERE status = 'pending'")
                .fetch_one(&self.db)
                .await?;

        let month_start = today.with_day(1).unwrap_or(today);
        let revenue_this_month: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(total_akhir), 0)
            FROM dokumen_penjualan
            WHERE tanggal_dokumen BETWEEN $1 AND $2
            "#,
        )
        .bind(month_start)
        .bind(today)
        .fetch_one(&self.db)
        .await?;

        Ok(DashboardMetrics::Operations {
            available_lots,
            available_kg,
            active_kebun,
            active_buyers,
            pending_orders,
            revenue_this_month,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_range_is_thirty_days() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        let filter = ReportFilter {
            start_date: None,
            end_date: None,
        };
        let range = filter.range(today).unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(range.end, today);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        let filter = ReportFilter {
            start_date: Some(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()),
            end_date: Some(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()),
        };
        assert!(filter.range(today).is_err());
    }
}
