//! Stock ledger tests
//!
//! Tests for TBS stock lots including:
//! - Available quantity never leaves 0..=total
//! - Sold-out status follows an empty lot
//! - Reservations and releases conserve quantity

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{DomainError, Grade, NewStockLot, StockLot, StockLotUpdate, StockStatus};
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn new_lot(total: Decimal) -> StockLot {
    StockLot::create(
        Uuid::new_v4(),
        NewStockLot {
            kebun_id: Uuid::new_v4(),
            tanggal_panen: NaiveDate::from_ymd_opt(2025, 5, 28).unwrap(),
            jumlah_kg: total,
            grade: Grade::A,
            kadar_minyak: Some(dec("23.5")),
            harga_per_kg: dec("2750"),
            keterangan: None,
        },
        Utc::now(),
    )
    .unwrap()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_new_lot_is_fully_available() {
        let lot = new_lot(dec("5000"));
        assert_eq!(lot.jumlah_tersedia, dec("5000"));
        assert_eq!(lot.status, StockStatus::Available);
        assert!(lot.accepts_orders());
        assert!(lot.check_invariants().is_ok());
    }

    #[test]
    fn test_create_rejects_non_positive_values() {
        let input = NewStockLot {
            kebun_id: Uuid::new_v4(),
            tanggal_panen: NaiveDate::from_ymd_opt(2025, 5, 28).unwrap(),
            jumlah_kg: Decimal::ZERO,
            grade: Grade::B,
            kadar_minyak: None,
            harga_per_kg: dec("2500"),
            keterangan: None,
        };
        let err = StockLot::create(Uuid::new_v4(), input.clone(), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation { field: "jumlah_kg", .. }));

        let err = StockLot::create(
            Uuid::new_v4(),
            NewStockLot {
                jumlah_kg: dec("100"),
                harga_per_kg: dec("-1"),
                ..input.clone()
            },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation { field: "harga_per_kg", .. }));

        let err = StockLot::create(
            Uuid::new_v4(),
            NewStockLot {
                jumlah_kg: dec("100"),
                kadar_minyak: Some(dec("120")),
                ..input
            },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation { field: "kadar_minyak", .. }));
    }

    #[test]
    fn test_reserve_all_marks_sold_out() {
        let mut lot = new_lot(dec("1200"));
        lot.reserve(dec("1200")).unwrap();
        assert_eq!(lot.jumlah_tersedia, Decimal::ZERO);
        assert_eq!(lot.status, StockStatus::SoldOut);
        assert!(!lot.accepts_orders());
        assert!(lot.check_invariants().is_ok());
    }

    #[test]
    fn test_over_reservation_leaves_lot_unchanged() {
        let mut lot = new_lot(dec("1000"));
        let err = lot.reserve(dec("1000.01")).unwrap_err();
        assert!(matches!(
            err,
            DomainError::InsufficientStock { requested, available }
                if requested == dec("1000.01") && available == dec("1000")
        ));
        assert_eq!(lot.jumlah_tersedia, dec("1000"));
        assert_eq!(lot.status, StockStatus::Available);
    }

    #[test]
    fn test_release_reopens_sold_out_lot() {
        let mut lot = new_lot(dec("800"));
        lot.reserve(dec("800")).unwrap();
        lot.release(dec("300")).unwrap();
        assert_eq!(lot.jumlah_tersedia, dec("300"));
        assert_eq!(lot.status, StockStatus::Available);
    }

    #[test]
    fn test_release_keeps_manual_reserved_status() {
        let mut lot = new_lot(dec("800"));
        lot.reserve(dec("200")).unwrap();
        lot.apply_update(
            StockLotUpdate {
                jumlah_tersedia: dec("600"),
                harga_per_kg: dec("2750"),
                status: StockStatus::Reserved,
                keterangan: Some("held for contract buyer".into()),
            },
            dec("200"),
        )
        .unwrap();
        lot.release(dec("200")).unwrap();
        assert_eq!(lot.jumlah_tersedia, dec("800"));
        assert_eq!(lot.status, StockStatus::Reserved);
    }

    #[test]
    fn test_release_beyond_total_is_consistency_error() {
        let mut lot = new_lot(dec("500"));
        let err = lot.release(dec("1")).unwrap_err();
        assert!(matches!(err, DomainError::Consistency(_)));
        assert_eq!(lot.jumlah_tersedia, dec("500"));
    }

    #[test]
    fn test_manual_update_rules() {
        let mut lot = new_lot(dec("500"));

        let over = StockLotUpdate {
            jumlah_tersedia: dec("501"),
            harga_per_kg: dec("2750"),
            status: StockStatus::Available,
            keterangan: None,
        };
        assert!(lot.apply_update(over, Decimal::ZERO).is_err());

        let sold_out_with_stock = StockLotUpdate {
            jumlah_tersedia: dec("10"),
            harga_per_kg: dec("2750"),
            status: StockStatus::SoldOut,
            keterangan: None,
        };
        assert!(lot.apply_update(sold_out_with_stock, Decimal::ZERO).is_err());

        let empty = StockLotUpdate {
            jumlah_tersedia: Decimal::ZERO,
            harga_per_kg: dec("2800"),
            status: StockStatus::Available,
            keterangan: None,
        };
        lot.apply_update(empty, Decimal::ZERO).unwrap();
        assert_eq!(lot.status, StockStatus::SoldOut);
        assert_eq!(lot.harga_per_kg, dec("2800"));
    }

    #[test]
    fn test_restock_cannot_cover_open_reservations() {
        let mut lot = new_lot(dec("1000"));
        lot.reserve(dec("400")).unwrap();

        let full = StockLotUpdate {
            jumlah_tersedia: dec("1000"),
            harga_per_kg: dec("2750"),
            status: StockStatus::Available,
            keterangan: None,
        };
        let err = lot.apply_update(full, dec("400")).unwrap_err();
        assert!(matches!(err, DomainError::Validation { field: "jumlah_tersedia", .. }));
        assert_eq!(lot.jumlah_tersedia, dec("600"));

        // Restocking up to the unreserved part is fine and the order can
        // still be rejected afterwards.
        let capped = StockLotUpdate {
            jumlah_tersedia: dec("600"),
            harga_per_kg: dec("2750"),
            status: StockStatus::Available,
            keterangan: None,
        };
        lot.apply_update(capped, dec("400")).unwrap();
        lot.release(dec("400")).unwrap();
        assert_eq!(lot.jumlah_tersedia, dec("1000"));
        assert!(lot.check_invariants().is_ok());
    }

    #[test]
    fn test_sub_cent_quantities_rejected() {
        let input = NewStockLot {
            kebun_id: Uuid::new_v4(),
            tanggal_panen: NaiveDate::from_ymd_opt(2025, 5, 28).unwrap(),
            jumlah_kg: dec("1000.005"),
            grade: Grade::A,
            kadar_minyak: None,
            harga_per_kg: dec("2750"),
            keterangan: None,
        };
        assert!(StockLot::create(Uuid::new_v4(), input, Utc::now()).is_err());

        let mut lot = new_lot(dec("1000"));
        let update = StockLotUpdate {
            jumlah_tersedia: dec("999.999"),
            harga_per_kg: dec("2750"),
            status: StockStatus::Available,
            keterangan: None,
        };
        assert!(lot.apply_update(update, Decimal::ZERO).is_err());
        assert_eq!(lot.jumlah_tersedia, dec("1000"));
    }

    #[test]
    fn test_grade_ordering() {
        assert!(Grade::B.is_below(Grade::A));
        assert!(Grade::C.is_below(Grade::B));
        assert!(!Grade::A.is_below(Grade::C));
        assert!(!Grade::B.is_below(Grade::B));
        assert_eq!(Grade::from_str("a").ok(), Some(Grade::A));
        assert!(Grade::from_str("D").is_err());
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[derive(Debug, Clone)]
enum LedgerOp {
    Reserve(u32),
    ReleaseOldest,
}

fn ledger_op() -> impl Strategy<Value = LedgerOp> {
    prop_oneof![
        (1u32..3000).prop_map(LedgerOp::Reserve),
        Just(LedgerOp::ReleaseOldest),
    ]
}

proptest! {
    /// Any sequence of reservations and releases keeps the ledger invariants,
    /// and available + reserved always equals the lot total.
    #[test]
    fn prop_ledger_conserves_quantity(
        total in 1u32..20_000,
        ops in prop::collection::vec(ledger_op(), 0..40)
    ) {
        let total = Decimal::from(total);
        let mut lot = new_lot(total);
        let mut reservations: Vec<Decimal> = Vec::new();

        for op in ops {
            match op {
                LedgerOp::Reserve(kg) => {
                    let qty = Decimal::from(kg);
                    let before = lot.jumlah_tersedia;
                    match lot.reserve(qty) {
                        Ok(()) => reservations.push(qty),
                        Err(_) => prop_assert_eq!(lot.jumlah_tersedia, before),
                    }
                }
                LedgerOp::ReleaseOldest => {
                    if !reservations.is_empty() {
                        let qty = reservations.remove(0);
                        prop_assert!(lot.release(qty).is_ok());
                    }
                }
            }

            prop_assert!(lot.check_invariants().is_ok());
            let reserved: Decimal = reservations.iter().copied().sum();
            prop_assert_eq!(lot.jumlah_tersedia + reserved, total);
        }
    }

    /// Reserving exactly what is available always succeeds and empties the lot
    #[test]
    fn prop_reserve_remaining_sells_out(total in 1u32..50_000, first in 0u32..50_000) {
        let total = Decimal::from(total);
        let mut lot = new_lot(total);
        let first = Decimal::from(first).min(total - Decimal::ONE);
        if first > Decimal::ZERO {
            lot.reserve(first).unwrap();
        }
        let rest = lot.jumlah_tersedia;
        prop_assert!(lot.reserve(rest).is_ok());
        prop_assert_eq!(lot.status, StockStatus::SoldOut);
    }
}
