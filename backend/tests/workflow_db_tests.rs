//! Database-backed workflow tests
//!
//! Covers concurrent ordering and scheduling, restocking around open
//! orders, and the weigh-out transaction.
//!
//! These need a disposable PostgreSQL database in `TEST_DATABASE_URL` and
//! are ignored by default:
//!
//! ```text
//! TEST_DATABASE_URL=postgres://... cargo test -p sawit-trading-backend -- --ignored
//! ```

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sawit_backend::error::AppError;
use sawit_backend::middleware::Actor;
use sawit_backend::services::order::OrderStatusUpdate;
use sawit_backend::services::reporting::DashboardMetrics;
use sawit_backend::services::weighbridge::WeighInRequest;
use sawit_backend::services::{
    OrderService, ReportingService, ScheduleService, StockService, WeighbridgeService,
};
use shared::{
    DomainError, Grade, GradeAdjustmentPolicy, NewOrder, NewSchedule, NewStockLot, OrderStatus,
    PaymentMethod, QualityAssessment, Role, ScheduleStatus, StockLot, StockLotUpdate, StockStatus,
    WeighOutReading, WeighbridgeStatus,
};
use sqlx::PgPool;
use uuid::Uuid;

async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = PgPool::connect(&url).await.expect("connect to test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    Some(pool)
}

async fn insert_user(pool: &PgPool, role: Role) -> Actor {
    let id = Uuid::new_v4();
    let username = format!("{}_{}", role.as_str(), id.simple());
    sqlx::query(
        "INSERT INTO users (id, username, email, password_hash, role) VALUES ($1, $2, $3, 'x', $4)",
    )
    .bind(id)
    .bind(&username)
    .bind(format!("{}@test.local", username))
    .bind(role.as_str())
    .execute(pool)
    .await
    .expect("insert user");

    Actor {
        user_id: id,
        username,
        role,
        origin: Some("127.0.0.1".into()),
    }
}

/// A far-future day no other test or earlier run numbers against, so the
/// daily counters for it start at 1
fn unused_day() -> NaiveDate {
    let offset = (Uuid::new_v4().as_u128() % 30_000) as i64;
    NaiveDate::from_ymd_opt(2100, 1, 1).unwrap() + Duration::days(offset)
}

fn order_for(lot: &StockLot, kg: i64, day: NaiveDate) -> NewOrder {
    NewOrder {
        stock_id: lot.id,
        jumlah_kg: Decimal::from(kg),
        tanggal_pengambilan: day,
        metode_pembayaran: PaymentMethod::Transfer,
        catatan: None,
    }
}

fn status(status: OrderStatus) -> OrderStatusUpdate {
    OrderStatusUpdate {
        status,
        catatan: None,
    }
}

async fn documents_for_order(pool: &PgPool, po_id: Uuid) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM dokumen_penjualan WHERE po_id = $1")
        .bind(po_id)
        .fetch_one(pool)
        .await
        .expect("count documents")
}

async fn stocked_lot(pool: &PgPool, admin: &Actor, kg: i64) -> StockLot {
    let kebun_id: Uuid = sqlx::query_scalar(
        "INSERT INTO kebun (nama_kebun, lokasi) VALUES ('Kebun Uji', 'Labuhanbatu') RETURNING id",
    )
    .fetch_one(pool)
    .await
    .expect("insert kebun");

    StockService::new(pool.clone())
        .create_stock(
            admin,
            NewStockLot {
                kebun_id,
                tanggal_panen: Utc::now().date_naive(),
                jumlah_kg: Decimal::from(kg),
                grade: Grade::A,
                kadar_minyak: None,
                harga_per_kg: Decimal::from(2750),
                keterangan: None,
            },
        )
        .await
        .expect("create lot")
        .lot
}

#[tokio::test]
#[ignore]
async fn concurrent_orders_never_oversell() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let admin = insert_user(&pool, Role::Admin).await;
    let buyer = insert_user(&pool, Role::Buyer).await;

    // PO numbers are counted per order day; keep this test's day private
    let today = unused_day();
    let lot = stocked_lot(&pool, &admin, 5000).await;

    let orders = OrderService::new(pool.clone());
    let mut handles = Vec::new();
    for _ in 0..10 {
        let orders = orders.clone();
        let buyer = buyer.clone();
        let input = order_for(&lot, 1000, today);
        handles.push(tokio::spawn(async move {
            orders.create_order(&buyer, input, today).await
        }));
    }

    let mut placed = Vec::new();
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(view) => placed.push(view.order),
            Err(AppError::Domain(DomainError::InsufficientStock { .. }))
            | Err(AppError::Domain(DomainError::InvalidTransition { .. })) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(placed.len(), 5);

    let remaining = StockService::new(pool.clone())
        .get_stock(lot.id)
        .await
        .expect("reload lot")
        .lot;
    assert_eq!(remaining.jumlah_tersedia, Decimal::ZERO);
    assert_eq!(remaining.status, StockStatus::SoldOut);

    let prefix = format!("PO-{}-", today.format("%Y%m%d"));
    assert!(placed.iter().all(|o| o.po_number.starts_with(&prefix)));
    assert!(placed.iter().all(|o| o.buyer_id == buyer.user_id && o.stock_id == lot.id));

    // unique, and rolled-back attempts give their numbers back
    let mut seqs: Vec<i64> = placed
        .iter()
        .filter_map(|o| o.po_number.strip_prefix(&prefix)?.parse().ok())
        .collect();
    seqs.sort_unstable();
    seqs.dedup();
    assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
#[ignore]
async fn concurrent_schedules_get_contiguous_queue_numbers() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let admin = insert_user(&pool, Role::Staff).await;
    let buyer = insert_user(&pool, Role::Buyer).await;
    let lot = stocked_lot(&pool, &admin, 5000).await;
    let today = unused_day();

    let orders = OrderService::new(pool.clone());
    let mut approved = Vec::new();
    for _ in 0..5 {
        let view = orders
            .create_order(&buyer, order_for(&lot, 1000, today), today)
            .await
            .expect("place order");
        let view = orders
            .update_status(&admin, view.order.id, status(OrderStatus::Approved))
            .await
            .expect("approve order");
        approved.push(view.order.id);
    }

    let loading_day = unused_day();

    let schedules = ScheduleService::new(pool.clone());
    let mut handles = Vec::new();
    for (i, po_id) in approved.into_iter().enumerate() {
        let schedules = schedules.clone();
        let admin = admin.clone();
        let input = NewSchedule {
            po_id,
            waktu_loading: loading_day.and_hms_opt(6 + i as u32, 0, 0).unwrap(),
            plat_nomor: format!("BK {} TB", 1000 + i),
            nama_sopir: format!("Sopir {}", i + 1),
        };
        handles.push(tokio::spawn(async move { schedules.create(&admin, input).await }));
    }

    let mut queue = Vec::new();
    for handle in handles {
        let view = handle.await.expect("task panicked").expect("create schedule");
        queue.push(view.schedule.nomor_antrian);
    }
    queue.sort_unstable();
    assert_eq!(queue, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
#[ignore]
async fn restock_leaves_room_for_open_orders() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let admin = insert_user(&pool, Role::Admin).await;
    let buyer = insert_user(&pool, Role::Buyer).await;
    let lot = stocked_lot(&pool, &admin, 5000).await;
    let today = unused_day();

    let orders = OrderService::new(pool.clone());
    let stock = StockService::new(pool.clone());
    let order = orders
        .create_order(&buyer, order_for(&lot, 2000, today), today)
        .await
        .expect("place order")
        .order;

    let update = |kg: i64| StockLotUpdate {
        jumlah_tersedia: Decimal::from(kg),
        harga_per_kg: Decimal::from(2800),
        status: StockStatus::Available,
        keterangan: Some("stock opname".into()),
    };

    // spoilage write-down, then a restock that would overlap the order
    stock.update_stock(&admin, lot.id, update(1000)).await.expect("write down");
    let err = stock.update_stock(&admin, lot.id, update(5000)).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Domain(DomainError::Validation { field: "jumlah_tersedia", .. })
    ));
    stock.update_stock(&admin, lot.id, update(3000)).await.expect("restock to headroom");

    let rejected = orders
        .update_status(&admin, order.id, status(OrderStatus::Rejected))
        .await
        .expect("reject after restock");
    assert_eq!(rejected.order.status, OrderStatus::Rejected);

    let after = stock.get_stock(lot.id).await.expect("reload lot").lot;
    assert_eq!(after.jumlah_tersedia, Decimal::from(5000));
    assert_eq!(after.harga_per_kg, Decimal::from(2800));
}

#[tokio::test]
#[ignore]
async fn weigh_out_issues_one_document_atomically() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let staff = insert_user(&pool, Role::Staff).await;
    let buyer = insert_user(&pool, Role::Buyer).await;
    let lot = stocked_lot(&pool, &staff, 10_000).await;
    let today = unused_day();

    let orders = OrderService::new(pool.clone());
    let schedules = ScheduleService::new(pool.clone());
    let weighbridge = WeighbridgeService::new(pool.clone());
    let policy = GradeAdjustmentPolicy::default();

    let mut scheduled = Vec::new();
    for i in 0..2u32 {
        let order = orders
            .create_order(&buyer, order_for(&lot, 5000, today), today)
            .await
            .expect("place order")
            .order;
        orders
            .update_status(&staff, order.id, status(OrderStatus::Approved))
            .await
            .expect("approve order");
        let view = schedules
            .create(
                &staff,
                NewSchedule {
                    po_id: order.id,
                    waktu_loading: today.and_hms_opt(7 + i, 0, 0).unwrap(),
                    plat_nomor: format!("bk {} tb", 8800 + i),
                    nama_sopir: format!("Sopir {}", i + 1),
                },
            )
            .await
            .expect("create schedule");
        scheduled.push(view);
    }
    let queue: Vec<i32> = scheduled.iter().map(|v| v.schedule.nomor_antrian).collect();
    assert_eq!(queue, vec![1, 2]);

    let first = &scheduled[0];
    let po_id = first.schedule.po_id;
    let record_id = first.weighbridge_id.expect("record opened with schedule");

    let loading = weighbridge
        .weigh_in(
            &staff,
            record_id,
            WeighInRequest {
                berat_masuk: Decimal::from(25_000),
            },
        )
        .await
        .expect("weigh in");
    assert_eq!(loading.record.status, WeighbridgeStatus::Loading);

    let reading = |keluar: i64| WeighOutReading {
        berat_keluar: Decimal::from(keluar),
        assessment: QualityAssessment {
            grade_aktual: Grade::B,
            kadar_air: Decimal::from(12),
            kadar_sampah: Decimal::from(2),
            tingkat_kematangan: None,
        },
        catatan: None,
    };
    // lighter than the arrival weight: nothing is written
    let err = weighbridge
        .weigh_out(&staff, record_id, reading(24_000), &policy, today)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Domain(DomainError::Validation { field: "berat_keluar", .. })
    ));
    assert_eq!(documents_for_order(&pool, po_id).await, 0);
    let still_loading = weighbridge.get(&staff, record_id).await.expect("reload record");
    assert_eq!(still_loading.record.status, WeighbridgeStatus::Loading);
    assert!(still_loading.record.berat_keluar.is_none());

    let outcome = weighbridge
        .weigh_out(&staff, record_id, reading(30_000), &policy, today)
        .await
        .expect("weigh out");
    assert_eq!(outcome.timbangan.berat_bersih, Some(Decimal::from(5000)));
    assert_eq!(outcome.timbangan.status, WeighbridgeStatus::Completed);
    assert_eq!(documents_for_order(&pool, po_id).await, 1);

    // first document of the day, priced on net weight with a B-grade discount
    let stamp = today.format("%Y%m%d");
    assert_eq!(outcome.dokumen.numbers.nomor_invoice, format!("INV-{}-0001", stamp));
    assert_eq!(outcome.dokumen.total_harga, Decimal::from(13_750_000));
    assert_eq!(outcome.dokumen.total_akhir, Decimal::from(12_375_000));
    assert!(outcome.dokumen.verify_fingerprint());

    let order = orders.get_order(&staff, po_id).await.expect("reload order").order;
    assert_eq!(order.status, OrderStatus::Completed);
    let pickup = schedules
        .get(&staff, first.schedule.id)
        .await
        .expect("reload schedule")
        .schedule;
    assert_eq!(pickup.status, ScheduleStatus::Completed);

    // the buyer's spend is what was invoiced, not what was ordered
    match ReportingService::new(pool.clone())
        .dashboard(&buyer, today)
        .await
        .expect("buyer dashboard")
    {
        DashboardMetrics::Buyer { total_spent, .. } => {
            assert_eq!(total_spent, Decimal::from(12_375_000))
        }
        other => panic!("unexpected dashboard {other:?}"),
    }
}
