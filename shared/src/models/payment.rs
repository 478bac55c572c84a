//! Buyer payments against sales documents

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PaymentMethod, SalesDocument};
use crate::error::{DomainError, DomainResult};

/// Verification status of a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Verified,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Verified => "verified",
            PaymentStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "verified" => Ok(PaymentStatus::Verified),
            "rejected" => Ok(PaymentStatus::Rejected),
            other => Err(DomainError::validation(
                "status",
                format!("unknown payment status '{}'", other),
            )),
        }
    }
}

/// Outcome chosen by the verifying officer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentDecision {
    Verified,
    Rejected,
}

impl From<PaymentDecision> for PaymentStatus {
    fn from(decision: PaymentDecision) -> Self {
        match decision {
            PaymentDecision::Verified => PaymentStatus::Verified,
            PaymentDecision::Rejected => PaymentStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub dokumen_id: Uuid,
    pub po_id: Uuid,
    pub jumlah_bayar: Decimal,
    pub metode_pembayaran: PaymentMethod,
    pub bank_pengirim: Option<String>,
    pub nomor_rekening: Option<String>,
    pub nama_pengirim: Option<String>,
    /// Reference to the uploaded proof of payment
    pub bukti_transfer: Option<String>,
    pub tanggal_pembayaran: NaiveDate,
    /// Due date for installment payments
    pub tanggal_jatuh_tempo: Option<NaiveDate>,
    pub status: PaymentStatus,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub catatan: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payment submission from a buyer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub dokumen_id: Uuid,
    pub jumlah_bayar: Decimal,
    pub metode_pembayaran: PaymentMethod,
    pub bank_pengirim: Option<String>,
    pub nomor_rekening: Option<String>,
    pub nama_pengirim: Option<String>,
    pub bukti_transfer: Option<String>,
    pub tanggal_pembayaran: NaiveDate,
    pub tanggal_jatuh_tempo: Option<NaiveDate>,
    pub catatan: Option<String>,
}

impl NewPayment {
    pub fn validate(&self) -> DomainResult<()> {
        crate::validation::validate_positive_amount("jumlah_bayar", self.jumlah_bayar)?;
        if self.metode_pembayaran == PaymentMethod::Termin {
            match self.tanggal_jatuh_tempo {
                None => {
                    return Err(DomainError::validation(
                        "tanggal_jatuh_tempo",
                        "installment payments need a due date",
                    ))
                }
                Some(due) if due < self.tanggal_pembayaran => {
                    return Err(DomainError::validation(
                        "tanggal_jatuh_tempo",
                        "due date cannot be before the payment date",
                    ))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Payment {
    /// Record a submitted payment against `document` in pending state
    pub fn record(
        id: Uuid,
        input: NewPayment,
        document: &SalesDocument,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        input.validate()?;
        if input.dokumen_id != document.id {
            return Err(DomainError::Consistency(format!(
                "payment for document {} recorded against document {}",
                input.dokumen_id, document.id
            )));
        }

        Ok(Self {
            id,
            dokumen_id: document.id,
            po_id: document.po_id,
            jumlah_bayar: input.jumlah_bayar,
            metode_pembayaran: input.metode_pembayaran,
            bank_pengirim: non_blank(input.bank_pengirim),
            nomor_rekening: non_blank(input.nomor_rekening),
            nama_pengirim: non_blank(input.nama_pengirim),
            bukti_transfer: non_blank(input.bukti_transfer),
            tanggal_pembayaran: input.tanggal_pembayaran,
            tanggal_jatuh_tempo: input.tanggal_jatuh_tempo,
            status: PaymentStatus::Pending,
            verified_by: None,
            verified_at: None,
            catatan: non_blank(input.catatan),
            created_at: now,
            updated_at: now,
        })
    }

    /// Settle a pending payment. The decision is final.
    pub fn verify(
        &mut self,
        decision: PaymentDecision,
        verifier: Uuid,
        catatan: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<PaymentStatus> {
        if self.status != PaymentStatus::Pending {
            return Err(DomainError::invalid_transition("payment", self.status, "verify"));
        }

        self.status = decision.into();
        self.verified_by = Some(verifier);
        self.verified_at = Some(now);
        if let Some(note) = non_blank(catatan) {
            self.catatan = Some(note);
        }
        self.updated_at = now;
        Ok(self.status)
    }
}
