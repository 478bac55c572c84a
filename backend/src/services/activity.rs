//! Activity log service
//!
//! Entries are written inside the transaction of the change they describe
//! and are never updated or deleted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use shared::{
    ActivityCode, ActivityCount, ActivityLogEntry, ActivityStatistics, DateRange,
    PaginatedResponse, Pagination, Role, UserActivityCount,
};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::Actor;

/// Append one entry to the activity log
pub async fn record(
    conn: &mut PgConnection,
    actor: &Actor,
    code: ActivityCode,
    reference_id: Option<Uuid>,
    detail: impl Into<String>,
) -> AppResult<()> {
    record_for(
        conn,
        Some((actor.user_id, actor.role)),
        actor.origin.as_deref(),
        code,
        reference_id,
        detail.into(),
    )
    .await
}

/// Append an entry where the acting user is known only by id (login,
/// registration)
pub async fn record_for(
    conn: &mut PgConnection,
    user: Option<(Uuid, Role)>,
    origin: Option<&str>,
    code: ActivityCode,
    reference_id: Option<Uuid>,
    detail: String,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO log_aktivitas (user_id, role, aktivitas, modul, reference_id, detail, ip_address)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(user.map(|(id, _)| id))
    .bind(user.map(|(_, role)| role.as_str()))
    .bind(code.as_str())
    .bind(code.module())
    .bind(reference_id)
    .bind(&detail)
    .bind(origin)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Filters for the activity log listing
#[derive(Debug, Default, Deserialize)]
pub struct ActivityFilter {
    pub user_id: Option<Uuid>,
    /// Substring match on the activity code
    pub aktivitas: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, FromRow)]
struct ActivityRow {
    id: Uuid,
    user_id: Option<Uuid>,
    username: Option<String>,
    role: Option<String>,
    aktivitas: String,
    modul: String,
    reference_id: Option<Uuid>,
    detail: Option<String>,
    ip_address: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ActivityRow> for ActivityLogEntry {
    type Error = AppError;

    fn try_from(row: ActivityRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .map(|r| r.parse::<Role>())
            .transpose()
            .map_err(|e| AppError::corrupt("activity role", e))?;
        Ok(ActivityLogEntry {
            id: row.id,
            user_id: row.user_id,
            username: row.username,
            role,
            aktivitas: row.aktivitas,
            modul: row.modul,
            reference_id: row.reference_id,
            detail: row.detail,
            ip_address: row.ip_address,
            created_at: row.created_at,
        })
    }
}

/// Read side of the activity log
#[derive(Clone)]
pub struct ActivityService {
    db: PgPool,
}

impl ActivityService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn push_filters<'a>(
        qb: &mut QueryBuilder<'a, Postgres>,
        filter: &'a ActivityFilter,
        offset_hours: i32,
    ) {
        qb.push(" WHERE TRUE");
        if let Some(user_id) = filter.user_id {
            qb.push(" AND la.user_id = ").push_bind(user_id);
        }
        if let Some(aktivitas) = filter.aktivitas.as_deref().filter(|a| !a.is_empty()) {
            qb.push(" AND la.aktivitas ILIKE ")
                .push_bind(format!("%{}%", aktivitas));
        }
        if let Some(start) = filter.start_date {
            qb.push(" AND (la.created_at + make_interval(hours => ")
                .push_bind(offset_hours)
                .push("))::date >= ")
                .push_bind(start);
        }
        if let Some(end) = filter.end_date {
            qb.push(" AND (la.created_at + make_interval(hours => ")
                .push_bind(offset_hours)
                .push("))::date <= ")
                .push_bind(end);
        }
    }

    /// Paginated activity log, newest first
    pub async fn list(
        &self,
        filter: &ActivityFilter,
        pagination: &Pagination,
        offset_hours: i32,
    ) -> AppResult<PaginatedResponse<ActivityLogEntry>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM log_aktivitas la");
        Self::push_filters(&mut count, filter, offset_hours);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let mut qb = QueryBuilder::<Postgres>::new(
            r#"
            SELECT la.id, la.user_id, u.username, la.role, la.aktivitas, la.modul,
                   la.reference_id, la.detail, la.ip_address, la.created_at
            FROM log_aktivitas la
            LEFT JOIN users u ON u.id = la.user_id
            "#,
        );
        Self::push_filters(&mut qb, filter, offset_hours);
        qb.push(" ORDER BY la.created_at DESC LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows: Vec<ActivityRow> = qb.build_query_as().fetch_all(&self.db).await?;
        let entries = rows
            .into_iter()
            .map(ActivityLogEntry::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse::new(entries, pagination, total.max(0) as u64))
    }

    /// Count per activity code and the ten most active users in `range`
    pub async fn statistics(
        &self,
        range: DateRange,
        offset_hours: i32,
    ) -> AppResult<ActivityStatistics> {
        let per_activity = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT aktivitas, COUNT(*) AS jumlah
            FROM log_aktivitas
            WHERE (created_at + make_interval(hours => $3))::date BETWEEN $1 AND $2
            GROUP BY aktivitas
            ORDER BY jumlah DESC, aktivitas
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .bind(offset_hours)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(|(aktivitas, jumlah)| ActivityCount { aktivitas, jumlah })
        .collect();

        let top_users = sqlx::query_as::<_, (Uuid, String, i64)>(
            r#"
            SELECT u.id, u.username, COUNT(*) AS jumlah
            FROM log_aktivitas la
            JOIN users u ON u.id = la.user_id
            WHERE (la.created_at + make_interval(hours => $3))::date BETWEEN $1 AND $2
            GROUP BY u.id, u.username
            ORDER BY jumlah DESC, u.username
            LIMIT 10
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .bind(offset_hours)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(|(user_id, username, jumlah)| UserActivityCount {
            user_id,
            username,
            jumlah,
        })
        .collect();

        Ok(ActivityStatistics {
            per_activity,
            top_users,
        })
    }
}
