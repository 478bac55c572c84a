//! End-to-end workflow tests over the domain rules
//!
//! Walks a lot through ordering, scheduling, weighing, document issuance
//! and payment in the same order the services apply each step.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{
    format_po_number, BuyerSnapshot, DocumentNumbers, DomainError, Grade, GradeAdjustmentPolicy,
    NewOrder, NewPayment, NewSchedule, NewStockLot, OrderAction, OrderStatus, Payment,
    PaymentMethod, PickupSchedule, PurchaseOrder, QualityAssessment, SalesDocument,
    ScheduleStatus, StockLot, StockStatus, WeighOutReading, WeighbridgeRecord,
    WeighbridgeStatus,
};
use std::str::FromStr;
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

fn harvested_lot(kg: &str) -> StockLot {
    StockLot::create(
        Uuid::new_v4(),
        NewStockLot {
            kebun_id: Uuid::new_v4(),
            tanggal_panen: day(),
            jumlah_kg: dec(kg),
            grade: Grade::A,
            kadar_minyak: Some(dec("23.5")),
            harga_per_kg: dec("2750"),
            keterangan: None,
        },
        Utc::now(),
    )
    .unwrap()
}

fn order_from(lot: &mut StockLot, buyer: Uuid, kg: &str, seq: i64) -> PurchaseOrder {
    PurchaseOrder::place(
        Uuid::new_v4(),
        format_po_number(day(), seq),
        buyer,
        NewOrder {
            stock_id: lot.id,
            jumlah_kg: dec(kg),
            tanggal_pengambilan: day(),
            metode_pembayaran: PaymentMethod::Transfer,
            catatan: Some("ambil pagi".into()),
        },
        lot,
        "Kebun Tanjung Garbus".into(),
        day(),
        Utc::now(),
    )
    .unwrap()
}

/// Approved order with its schedule and open weighbridge record
fn scheduled(
    lot: &mut StockLot,
    buyer: Uuid,
    queue: i32,
) -> (PurchaseOrder, PickupSchedule, WeighbridgeRecord) {
    let mut order = order_from(lot, buyer, "5000", 1);
    order.approve(Uuid::new_v4(), Utc::now()).unwrap();

    let schedule = PickupSchedule::create(
        Uuid::new_v4(),
        &order,
        NewSchedule {
            po_id: order.id,
            waktu_loading: day().and_hms_opt(7, 0, 0).unwrap(),
            plat_nomor: "bk 9001 xy".into(),
            nama_sopir: "Sutrisno".into(),
        },
        queue,
        Utc::now(),
    )
    .unwrap();
    let record = WeighbridgeRecord::open(
        Uuid::new_v4(),
        order.id,
        schedule.id,
        schedule.plat_nomor.clone(),
        Utc::now(),
    );
    (order, schedule, record)
}

fn reading(keluar: &str) -> WeighOutReading {
    WeighOutReading {
        berat_keluar: dec(keluar),
        assessment: QualityAssessment {
            grade_aktual: Grade::A,
            kadar_air: dec("11"),
            kadar_sampah: dec("1"),
            tingkat_kematangan: Some("matang".into()),
        },
        catatan: None,
    }
}

#[test]
fn test_reject_returns_reservation() {
    let mut lot = harvested_lot("5000");
    let mut order = order_from(&mut lot, Uuid::new_v4(), "2000", 1);
    assert_eq!(lot.jumlah_tersedia, dec("3000"));

    order
        .transition(OrderAction::Reject, Some(&mut lot), Utc::now())
        .unwrap();
    assert_eq!(order.status, OrderStatus::Rejected);
    assert_eq!(lot.jumlah_tersedia, dec("5000"));
    assert_eq!(lot.status, StockStatus::Available);
}

#[test]
fn test_full_pickup_issues_one_document() {
    let mut lot = harvested_lot("5000");
    let buyer = Uuid::new_v4();
    let (mut order, mut schedule, mut record) = scheduled(&mut lot, buyer, 3);
    assert_eq!(schedule.nomor_antrian, 3);
    assert_eq!(schedule.plat_nomor, "BK 9001 XY");
    assert_eq!(lot.status, StockStatus::SoldOut);

    // weigh-in
    record.weigh_in(dec("25000"), Uuid::new_v4(), Utc::now()).unwrap();
    schedule.status = schedule.status.apply(ScheduleStatus::InProgress).unwrap();
    order
        .transition(OrderAction::StartLoading, None, Utc::now())
        .unwrap();
    assert_eq!(record.status, WeighbridgeStatus::Loading);
    assert_eq!(order.status, OrderStatus::Loading);

    // weigh-out
    order.status.apply(OrderAction::Complete).unwrap();
    let net = record
        .weigh_out(reading("30000"), Uuid::new_v4(), Utc::now())
        .unwrap();
    schedule.status = schedule.status.apply(ScheduleStatus::Completed).unwrap();
    order.transition(OrderAction::Complete, None, Utc::now()).unwrap();
    assert_eq!(net, dec("5000"));
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(schedule.status, ScheduleStatus::Completed);

    let document = SalesDocument::issue(
        Uuid::new_v4(),
        DocumentNumbers::for_day(day(), 1),
        &order,
        &record,
        &BuyerSnapshot {
            buyer_id: buyer,
            username: "cv_sawit_jaya".into(),
            company_name: None,
        },
        &GradeAdjustmentPolicy::default(),
        day(),
        Utc::now(),
    )
    .unwrap();
    assert_eq!(document.jumlah_kg, dec("5000"));
    assert_eq!(document.total_akhir, dec("13750000"));

    // a completed record cannot be weighed again, so no second document
    assert!(record
        .weigh_out(reading("31000"), Uuid::new_v4(), Utc::now())
        .is_err());

    // payment
    let mut payment = Payment::record(
        Uuid::new_v4(),
        NewPayment {
            dokumen_id: document.id,
            jumlah_bayar: document.total_akhir,
            metode_pembayaran: PaymentMethod::Transfer,
            bank_pengirim: Some("Mandiri".into()),
            nomor_rekening: None,
            nama_pengirim: None,
            bukti_transfer: None,
            tanggal_pembayaran: day(),
            tanggal_jatuh_tempo: None,
            catatan: None,
        },
        &document,
        Utc::now(),
    )
    .unwrap();
    payment
        .verify(shared::PaymentDecision::Verified, Uuid::new_v4(), None, Utc::now())
        .unwrap();
    assert_eq!(payment.po_id, order.id);
}

#[test]
fn test_lighter_weigh_out_changes_nothing() {
    let mut lot = harvested_lot("5000");
    let (mut order, schedule, mut record) = scheduled(&mut lot, Uuid::new_v4(), 1);
    record.weigh_in(dec("25000"), Uuid::new_v4(), Utc::now()).unwrap();
    order
        .transition(OrderAction::StartLoading, None, Utc::now())
        .unwrap();

    let err = record
        .weigh_out(reading("24000"), Uuid::new_v4(), Utc::now())
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation { .. }));
    assert_eq!(record.status, WeighbridgeStatus::Loading);
    assert_eq!(order.status, OrderStatus::Loading);
    assert_eq!(schedule.status, ScheduleStatus::Scheduled);
}

#[test]
fn test_cancel_after_scheduling_voids_pickup() {
    let mut lot = harvested_lot("5000");
    let (mut order, mut schedule, mut record) = scheduled(&mut lot, Uuid::new_v4(), 1);

    order
        .transition(OrderAction::Cancel, Some(&mut lot), Utc::now())
        .unwrap();
    schedule.status = schedule.status.apply(ScheduleStatus::Cancelled).unwrap();
    record.cancel(Utc::now()).unwrap();

    assert_eq!(lot.jumlah_tersedia, dec("5000"));
    assert_eq!(lot.status, StockStatus::Available);
    assert_eq!(record.status, WeighbridgeStatus::Cancelled);
}

#[test]
fn test_loading_order_cannot_be_cancelled() {
    let mut lot = harvested_lot("5000");
    let (mut order, _, mut record) = scheduled(&mut lot, Uuid::new_v4(), 1);
    record.weigh_in(dec("20000"), Uuid::new_v4(), Utc::now()).unwrap();
    order
        .transition(OrderAction::StartLoading, None, Utc::now())
        .unwrap();

    assert!(order
        .transition(OrderAction::Cancel, Some(&mut lot), Utc::now())
        .is_err());
    assert!(record.cancel(Utc::now()).is_err());
    assert_eq!(lot.jumlah_tersedia, Decimal::ZERO);
}
