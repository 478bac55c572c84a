//! Sales documents issued at weigh-out
//!
//! One document bundles the delivery note (surat jalan), the invoice and
//! the weighing certificate (bukti timbang) for a completed weighing. The
//! three numbers share one daily counter, so a document's numbers always
//! carry the same suffix.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{Grade, PurchaseOrder, WeighbridgeRecord, WeighbridgeStatus};
use crate::error::{DomainError, DomainResult};

/// Invoice, delivery note and weighing certificate numbers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentNumbers {
    pub nomor_surat_jalan: String,
    pub nomor_invoice: String,
    pub nomor_bukti_timbang: String,
}

impl DocumentNumbers {
    pub fn for_day(day: NaiveDate, sequence: i64) -> Self {
        let stamp = day.format("%Y%m%d");
        Self {
            nomor_surat_jalan: format!("SJ-{}-{:04}", stamp, sequence),
            nomor_invoice: format!("INV-{}-{:04}", stamp, sequence),
            nomor_bukti_timbang: format!("BT-{}-{:04}", stamp, sequence),
        }
    }
}

/// Discount applied when the fruit delivered grades below what was ordered
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeAdjustmentPolicy {
    /// Percent taken off the total when the assessed grade is B
    pub grade_b_discount_percent: Decimal,
    /// Percent taken off the total when the assessed grade is C
    pub grade_c_discount_percent: Decimal,
}

impl Default for GradeAdjustmentPolicy {
    fn default() -> Self {
        Self {
            grade_b_discount_percent: Decimal::from(10),
            grade_c_discount_percent: Decimal::from(20),
        }
    }
}

impl GradeAdjustmentPolicy {
    fn discount_percent(&self, grade: Grade) -> Decimal {
        match grade {
            Grade::A => Decimal::ZERO,
            Grade::B => self.grade_b_discount_percent,
            Grade::C => self.grade_c_discount_percent,
        }
    }

    /// Price adjustment (zero or negative) for `total`.
    ///
    /// Only a downgrade is penalised; delivering better fruit than ordered
    /// does not raise the price.
    pub fn adjustment(&self, requested: Grade, assessed: Grade, total: Decimal) -> Decimal {
        if !assessed.is_below(requested) {
            return Decimal::ZERO;
        }
        -(total * self.discount_percent(assessed) / Decimal::ONE_HUNDRED).round_dp(2)
    }
}

/// Buyer details copied onto the document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyerSnapshot {
    pub buyer_id: Uuid,
    pub username: String,
    pub company_name: Option<String>,
}

/// Immutable sales document for one completed weighing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesDocument {
    pub id: Uuid,
    pub po_id: Uuid,
    pub timbang_id: Uuid,
    pub po_number: String,
    #[serde(flatten)]
    pub numbers: DocumentNumbers,
    pub tanggal_dokumen: NaiveDate,
    pub buyer_id: Uuid,
    pub buyer_name: String,
    pub buyer_company: Option<String>,
    pub grade_diminta: Grade,
    pub grade_aktual: Grade,
    /// Net weight from the weighbridge (kg)
    pub jumlah_kg: Decimal,
    pub harga_per_kg: Decimal,
    pub total_harga: Decimal,
    pub penyesuaian_harga: Decimal,
    pub total_akhir: Decimal,
    /// SHA-256 of the canonical fields, printed on the weighing certificate
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

impl SalesDocument {
    /// Issue the document for a completed weighing.
    ///
    /// Every input here comes from the weigh-out transaction itself, so a
    /// mismatch is a consistency failure rather than bad user input.
    #[allow(clippy::too_many_arguments)]
    pub fn issue(
        id: Uuid,
        numbers: DocumentNumbers,
        order: &PurchaseOrder,
        record: &WeighbridgeRecord,
        buyer: &BuyerSnapshot,
        policy: &GradeAdjustmentPolicy,
        tanggal_dokumen: NaiveDate,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if record.status != WeighbridgeStatus::Completed {
            return Err(DomainError::Consistency(format!(
                "document requested for weighbridge record {} in status {}",
                record.id, record.status
            )));
        }
        if record.po_id != order.id {
            return Err(DomainError::Consistency(format!(
                "weighbridge record {} belongs to order {}, not {}",
                record.id, record.po_id, order.id
            )));
        }
        if buyer.buyer_id != order.buyer_id {
            return Err(DomainError::Consistency(format!(
                "buyer {} does not own order {}",
                buyer.buyer_id, order.id
            )));
        }
        let jumlah_kg = record.berat_bersih.ok_or_else(|| {
            DomainError::Consistency(format!("weighbridge record {} has no net weight", record.id))
        })?;
        let grade_aktual = record.grade_aktual.ok_or_else(|| {
            DomainError::Consistency(format!("weighbridge record {} has no assessed grade", record.id))
        })?;

        let total_harga = (jumlah_kg * order.harga_per_kg).round_dp(2);
        let penyesuaian_harga = policy.adjustment(order.grade_diminta, grade_aktual, total_harga);

        let mut document = Self {
            id,
            po_id: order.id,
            timbang_id: record.id,
            po_number: order.po_number.clone(),
            numbers,
            tanggal_dokumen,
            buyer_id: buyer.buyer_id,
            buyer_name: buyer.username.clone(),
            buyer_company: buyer.company_name.clone(),
            grade_diminta: order.grade_diminta,
            grade_aktual,
            jumlah_kg,
            harga_per_kg: order.harga_per_kg,
            total_harga,
            penyesuaian_harga,
            total_akhir: total_harga + penyesuaian_harga,
            fingerprint: String::new(),
            created_at: now,
        };
        document.fingerprint = document.compute_fingerprint();
        Ok(document)
    }

    /// Fingerprint over the fields printed on the documents
    pub fn compute_fingerprint(&self) -> String {
        let canonical = format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.numbers.nomor_surat_jalan,
            self.numbers.nomor_invoice,
            self.numbers.nomor_bukti_timbang,
            self.po_id,
            self.timbang_id,
            self.tanggal_dokumen,
            self.buyer_id,
            self.grade_aktual,
            self.jumlah_kg.normalize(),
            self.harga_per_kg.normalize(),
            self.total_akhir.normalize(),
        );
        URL_SAFE_NO_PAD.encode(Sha256::digest(canonical.as_bytes()))
    }

    pub fn verify_fingerprint(&self) -> bool {
        self.fingerprint == self.compute_fingerprint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_share_suffix() {
        let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let numbers = DocumentNumbers::for_day(day, 7);
        assert_eq!(numbers.nomor_surat_jalan, "SJ-20250601-0007");
        assert_eq!(numbers.nomor_invoice, "INV-20250601-0007");
        assert_eq!(numbers.nomor_bukti_timbang, "BT-20250601-0007");
    }

    #[test]
    fn upgrade_is_not_rewarded() {
        let policy = GradeAdjustmentPolicy::default();
        let total = Decimal::from(1_000_000);
        assert_eq!(policy.adjustment(Grade::C, Grade::A, total), Decimal::ZERO);
        assert_eq!(policy.adjustment(Grade::B, Grade::B, total), Decimal::ZERO);
        assert_eq!(policy.adjustment(Grade::A, Grade::B, total), Decimal::from(-100_000));
        assert_eq!(policy.adjustment(Grade::A, Grade::C, total), Decimal::from(-200_000));
    }
}
