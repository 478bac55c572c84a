//! Per-day counters for order numbers, loading queue numbers and document
//! numbers.
//!
//! Each (scope, day) pair is one row in `daily_sequences`. The upsert takes a
//! row lock, so concurrent allocators for the same scope and day serialize
//! and the values handed out are contiguous from 1.

use chrono::NaiveDate;
use sqlx::PgConnection;

use crate::error::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceScope {
    /// PO-YYYYMMDD-NNNN
    PurchaseOrder,
    /// Loading queue position for a calendar day
    LoadingQueue,
    /// SJ/INV/BT numbers; one value per issued document
    SalesDocument,
}

impl SequenceScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceScope::PurchaseOrder => "purchase_order",
            SequenceScope::LoadingQueue => "loading_queue",
            SequenceScope::SalesDocument => "sales_document",
        }
    }
}

/// Allocate the next value for `scope` on `day`.
///
/// Must run inside the caller's transaction so a rolled-back operation
/// also gives its number back.
pub async fn next_value(
    conn: &mut PgConnection,
    scope: SequenceScope,
    day: NaiveDate,
) -> AppResult<i64> {
    let value = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO daily_sequences (scope, day, last_value)
        VALUES ($1, $2, 1)
        ON CONFLICT (scope, day)
        DO UPDATE SET last_value = daily_sequences.last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(scope.as_str())
    .bind(day)
    .fetch_one(&mut *conn)
    .await?;

    tracing::debug!(scope = scope.as_str(), %day, value, "allocated daily sequence value");
    Ok(value)
}
