//! Sales document and payment tests
//!
//! Tests for document issuance including:
//! - Pricing from the net weight and the order's unit price
//! - Downgrade adjustments
//! - Fingerprint verification
//! - Payment recording and verification rules

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    BuyerSnapshot, DocumentNumbers, DomainError, Grade, GradeAdjustmentPolicy, NewPayment,
    OrderStatus, Payment, PaymentDecision, PaymentMethod, PaymentStatus, PurchaseOrder,
    QualityAssessment, SalesDocument, WeighOutReading, WeighbridgeRecord,
};
use std::str::FromStr;
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

fn loading_order(grade: Grade) -> PurchaseOrder {
    let now = Utc::now();
    PurchaseOrder {
        id: Uuid::new_v4(),
        po_number: "PO-20250601-0002".into(),
        buyer_id: Uuid::new_v4(),
        stock_id: Uuid::new_v4(),
        kebun_id: Uuid::new_v4(),
        jumlah_kg: dec("5000"),
        grade_diminta: grade,
        harga_per_kg: dec("2750"),
        total_harga: dec("13750000"),
        tanggal_pengambilan: day(),
        lokasi_pengambilan: "Kebun Rambutan".into(),
        metode_pembayaran: PaymentMethod::Transfer,
        catatan: None,
        status: OrderStatus::Completed,
        approved_by: Some(Uuid::new_v4()),
        approved_at: Some(now),
        created_at: now,
        updated_at: now,
    }
}

fn weighed(order: &PurchaseOrder, masuk: &str, keluar: &str, grade: Grade) -> WeighbridgeRecord {
    let mut record = WeighbridgeRecord::open(
        Uuid::new_v4(),
        order.id,
        Uuid::new_v4(),
        "BK 8812 TB".into(),
        Utc::now(),
    );
    record.weigh_in(dec(masuk), Uuid::new_v4(), Utc::now()).unwrap();
    record
        .weigh_out(
            WeighOutReading {
                berat_keluar: dec(keluar),
                assessment: QualityAssessment {
                    grade_aktual: grade,
                    kadar_air: dec("10"),
                    kadar_sampah: dec("1.5"),
                    tingkat_kematangan: None,
                },
                catatan: None,
            },
            Uuid::new_v4(),
            Utc::now(),
        )
        .unwrap();
    record
}

fn buyer_of(order: &PurchaseOrder) -> BuyerSnapshot {
    BuyerSnapshot {
        buyer_id: order.buyer_id,
        username: "pt_mitra".into(),
        company_name: Some("PT Mitra Sawit".into()),
    }
}

fn issue(order: &PurchaseOrder, record: &WeighbridgeRecord) -> Result<SalesDocument, DomainError> {
    SalesDocument::issue(
        Uuid::new_v4(),
        DocumentNumbers::for_day(day(), 1),
        order,
        record,
        &buyer_of(order),
        &GradeAdjustmentPolicy::default(),
        day(),
        Utc::now(),
    )
}

fn payment_input(document: &SalesDocument, amount: &str) -> NewPayment {
    NewPayment {
        dokumen_id: document.id,
        jumlah_bayar: dec(amount),
        metode_pembayaran: PaymentMethod::Transfer,
        bank_pengirim: Some("BRI".into()),
        nomor_rekening: Some("0123456789".into()),
        nama_pengirim: Some("PT Mitra Sawit".into()),
        bukti_transfer: Some("uploads/bukti-001.jpg".into()),
        tanggal_pembayaran: day(),
        tanggal_jatuh_tempo: None,
        catatan: None,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_document_priced_on_net_weight() {
        let order = loading_order(Grade::A);
        let record = weighed(&order, "25000", "30000", Grade::A);
        let doc = issue(&order, &record).unwrap();

        assert_eq!(doc.jumlah_kg, dec("5000"));
        assert_eq!(doc.total_harga, dec("13750000"));
        assert_eq!(doc.penyesuaian_harga, Decimal::ZERO);
        assert_eq!(doc.total_akhir, dec("13750000"));
        assert_eq!(doc.numbers.nomor_invoice, "INV-20250601-0001");
        assert_eq!(doc.buyer_company.as_deref(), Some("PT Mitra Sawit"));
        assert!(doc.verify_fingerprint());
    }

    #[test]
    fn test_sub_cent_total_rounded_before_fingerprint() {
        let mut order = loading_order(Grade::A);
        order.harga_per_kg = dec("2500.55");
        let record = weighed(&order, "25000", "30000.55", Grade::A);
        let doc = issue(&order, &record).unwrap();

        // 5000.55 kg x 2500.55 = 12504125.3025
        assert_eq!(doc.jumlah_kg, dec("5000.55"));
        assert_eq!(doc.total_harga, dec("12504125.30"));
        assert_eq!(doc.total_akhir, dec("12504125.30"));

        // What the NUMERIC(18,2) columns hand back must still verify
        let mut stored = doc.clone();
        stored.total_harga = stored.total_harga.round_dp(2);
        stored.total_akhir = stored.total_akhir.round_dp(2);
        assert!(stored.verify_fingerprint());
    }

    #[test]
    fn test_downgrade_applies_discount() {
        let order = loading_order(Grade::A);
        let record = weighed(&order, "10000", "14000", Grade::C);
        let doc = issue(&order, &record).unwrap();

        // 4000 kg x 2750 = 11,000,000; grade C takes 20 %
        assert_eq!(doc.total_harga, dec("11000000"));
        assert_eq!(doc.penyesuaian_harga, dec("-2200000"));
        assert_eq!(doc.total_akhir, dec("8800000"));
    }

    #[test]
    fn test_document_needs_completed_record() {
        let order = loading_order(Grade::A);
        let mut record = WeighbridgeRecord::open(
            Uuid::new_v4(),
            order.id,
            Uuid::new_v4(),
            "BK 1 A".into(),
            Utc::now(),
        );
        record.weigh_in(dec("20000"), Uuid::new_v4(), Utc::now()).unwrap();
        assert!(matches!(issue(&order, &record), Err(DomainError::Consistency(_))));
    }

    #[test]
    fn test_document_for_other_order_is_inconsistent() {
        let order = loading_order(Grade::A);
        let other = loading_order(Grade::A);
        let record = weighed(&other, "20000", "25000", Grade::A);
        assert!(matches!(issue(&order, &record), Err(DomainError::Consistency(_))));
    }

    #[test]
    fn test_tampered_document_fails_fingerprint() {
        let order = loading_order(Grade::B);
        let record = weighed(&order, "20000", "25000", Grade::B);
        let mut doc = issue(&order, &record).unwrap();
        doc.total_akhir += Decimal::ONE;
        assert!(!doc.verify_fingerprint());
    }

    #[test]
    fn test_payment_recorded_pending() {
        let order = loading_order(Grade::A);
        let doc = issue(&order, &weighed(&order, "25000", "30000", Grade::A)).unwrap();
        let payment = Payment::record(Uuid::new_v4(), payment_input(&doc, "13750000"), &doc, Utc::now())
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.po_id, order.id);
        assert_eq!(payment.bank_pengirim.as_deref(), Some("BRI"));
    }

    #[test]
    fn test_non_positive_payment_rejected() {
        let order = loading_order(Grade::A);
        let doc = issue(&order, &weighed(&order, "25000", "30000", Grade::A)).unwrap();
        for amount in ["0", "-1000", "0.004", "1000.005"] {
            let err = Payment::record(Uuid::new_v4(), payment_input(&doc, amount), &doc, Utc::now())
                .unwrap_err();
            assert!(matches!(err, DomainError::Validation { field: "jumlah_bayar", .. }));
        }
    }

    #[test]
    fn test_installment_needs_valid_due_date() {
        let order = loading_order(Grade::A);
        let doc = issue(&order, &weighed(&order, "25000", "30000", Grade::A)).unwrap();

        let mut input = payment_input(&doc, "5000000");
        input.metode_pembayaran = PaymentMethod::Termin;
        assert!(input.validate().is_err());

        input.tanggal_jatuh_tempo = day().pred_opt();
        assert!(input.validate().is_err());

        input.tanggal_jatuh_tempo = Some(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_verification_is_final() {
        let order = loading_order(Grade::A);
        let doc = issue(&order, &weighed(&order, "25000", "30000", Grade::A)).unwrap();
        let mut payment =
            Payment::record(Uuid::new_v4(), payment_input(&doc, "1000"), &doc, Utc::now()).unwrap();
        let verifier = Uuid::new_v4();

        let status = payment
            .verify(PaymentDecision::Verified, verifier, Some("dana masuk".into()), Utc::now())
            .unwrap();
        assert_eq!(status, PaymentStatus::Verified);
        assert_eq!(payment.verified_by, Some(verifier));
        assert_eq!(payment.catatan.as_deref(), Some("dana masuk"));

        let err = payment
            .verify(PaymentDecision::Rejected, verifier, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { entity: "payment", .. }));
        assert_eq!(payment.status, PaymentStatus::Verified);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

fn any_grade() -> impl Strategy<Value = Grade> {
    prop::sample::select(vec![Grade::A, Grade::B, Grade::C])
}

proptest! {
    /// final = total + adjustment, the adjustment is never positive, and it
    /// is zero unless the delivered grade is lower than requested
    #[test]
    fn prop_document_totals(
        requested in any_grade(),
        assessed in any_grade(),
        masuk in 5_000u32..30_000,
        load in 1u32..20_000
    ) {
        let order = loading_order(requested);
        let keluar = (masuk + load).to_string();
        let record = weighed(&order, &masuk.to_string(), &keluar, assessed);
        let doc = issue(&order, &record).unwrap();

        prop_assert_eq!(doc.total_harga, Decimal::from(load) * order.harga_per_kg);
        prop_assert_eq!(doc.total_akhir, doc.total_harga + doc.penyesuaian_harga);
        prop_assert!(doc.penyesuaian_harga <= Decimal::ZERO);
        if !assessed.is_below(requested) {
            prop_assert_eq!(doc.penyesuaian_harga, Decimal::ZERO);
        }
        prop_assert!(doc.verify_fingerprint());
    }

    /// Document numbers always share their date stamp and suffix
    #[test]
    fn prop_document_numbers_share_suffix(seq in 1i64..100_000) {
        let numbers = DocumentNumbers::for_day(day(), seq);
        let suffix = |n: &str| n.split_once('-').map(|(_, rest)| rest.to_string());
        prop_assert_eq!(suffix(&numbers.nomor_surat_jalan), suffix(&numbers.nomor_invoice));
        prop_assert_eq!(suffix(&numbers.nomor_invoice), suffix(&numbers.nomor_bukti_timbang));
    }
}
