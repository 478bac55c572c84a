//! Two-phase weighbridge recording
//!
//! A truck is weighed once on arrival (gross weight-in) and again after
//! loading (gross weight-out). The net fruit weight is only known after the
//! second reading.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Grade;
use crate::error::{DomainError, DomainResult};

/// Status of a weighbridge record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeighbridgeStatus {
    /// Waiting for the truck's first reading
    WeighIn,
    /// Weighed in; being loaded
    Loading,
    /// Accepted when decoding older rows; never entered by a transition
    WeighOut,
    Completed,
    /// The order was cancelled before weigh-in
    Cancelled,
}

impl WeighbridgeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeighbridgeStatus::WeighIn => "weigh_in",
            WeighbridgeStatus::Loading => "loading",
            WeighbridgeStatus::WeighOut => "weigh_out",
            WeighbridgeStatus::Completed => "completed",
            WeighbridgeStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for WeighbridgeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WeighbridgeStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weigh_in" => Ok(WeighbridgeStatus::WeighIn),
            "loading" => Ok(WeighbridgeStatus::Loading),
            "weigh_out" => Ok(WeighbridgeStatus::WeighOut),
            "completed" => Ok(WeighbridgeStatus::Completed),
            "cancelled" => Ok(WeighbridgeStatus::Cancelled),
            other => Err(DomainError::validation(
                "status",
                format!("unknown weighbridge status '{}'", other),
            )),
        }
    }
}

/// Quality assessment taken at weigh-out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub grade_aktual: Grade,
    /// Moisture content (%)
    pub kadar_air: Decimal,
    /// Impurity / trash content (%)
    pub kadar_sampah: Decimal,
    /// Ripeness description, e.g. "matang", "mentah"
    pub tingkat_kematangan: Option<String>,
}

/// Weigh-out submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeighOutReading {
    pub berat_keluar: Decimal,
    #[serde(flatten)]
    pub assessment: QualityAssessment,
    pub catatan: Option<String>,
}

/// One weighbridge record per purchase order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeighbridgeRecord {
    pub id: Uuid,
    pub po_id: Uuid,
    pub jadwal_id: Uuid,
    pub plat_nomor: String,
    pub berat_masuk: Option<Decimal>,
    pub waktu_masuk: Option<DateTime<Utc>>,
    pub petugas_masuk: Option<Uuid>,
    pub berat_keluar: Option<Decimal>,
    pub waktu_keluar: Option<DateTime<Utc>>,
    pub petugas_keluar: Option<Uuid>,
    pub berat_bersih: Option<Decimal>,
    pub grade_aktual: Option<Grade>,
    pub kadar_air: Option<Decimal>,
    pub kadar_sampah: Option<Decimal>,
    pub tingkat_kematangan: Option<String>,
    pub catatan: Option<String>,
    pub status: WeighbridgeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Net weight from a gross weight-in/weight-out pair
pub fn net_weight(berat_masuk: Decimal, berat_keluar: Decimal) -> DomainResult<Decimal> {
    if berat_keluar <= berat_masuk {
        return Err(DomainError::validation(
            "berat_keluar",
            "net weight must be positive: weight-out must exceed weight-in",
        ));
    }
    Ok(berat_keluar - berat_masuk)
}

impl WeighbridgeRecord {
    /// Empty record created together with the pickup schedule
    pub fn open(
        id: Uuid,
        po_id: Uuid,
        jadwal_id: Uuid,
        plat_nomor: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            po_id,
            jadwal_id,
            plat_nomor,
            berat_masuk: None,
            waktu_masuk: None,
            petugas_masuk: None,
            berat_keluar: None,
            waktu_keluar: None,
            petugas_keluar: None,
            berat_bersih: None,
            grade_aktual: None,
            kadar_air: None,
            kadar_sampah: None,
            tingkat_kematangan: None,
            catatan: None,
            status: WeighbridgeStatus::WeighIn,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record the gross weight on arrival
    pub fn weigh_in(
        &mut self,
        berat_masuk: Decimal,
        officer: Uuid,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if self.status != WeighbridgeStatus::WeighIn || self.berat_masuk.is_some() {
            return Err(DomainError::invalid_transition("weighbridge record", self.status, "weigh in"));
        }
        crate::validation::validate_positive_kg("berat_masuk", berat_masuk)?;

        self.berat_masuk = Some(berat_masuk);
        self.waktu_masuk = Some(now);
        self.petugas_masuk = Some(officer);
        self.status = WeighbridgeStatus::Loading;
        self.updated_at = now;
        Ok(())
    }

    /// Record the gross weight on departure and the quality assessment.
    ///
    /// Returns the net weight. Nothing changes when validation fails.
    pub fn weigh_out(
        &mut self,
        reading: WeighOutReading,
        officer: Uuid,
        now: DateTime<Utc>,
    ) -> DomainResult<Decimal> {
        if self.status != WeighbridgeStatus::Loading {
            return Err(DomainError::invalid_transition("weighbridge record", self.status, "weigh out"));
        }
        let berat_masuk = self.berat_masuk.ok_or_else(|| {
            DomainError::Consistency(format!(
                "weighbridge record {} is loading without a weight-in",
                self.id
            ))
        })?;

        crate::validation::validate_percentage("kadar_air", reading.assessment.kadar_air)?;
        crate::validation::validate_percentage("kadar_sampah", reading.assessment.kadar_sampah)?;
        crate::validation::validate_positive_kg("berat_keluar", reading.berat_keluar)?;
        let berat_bersih = net_weight(berat_masuk, reading.berat_keluar)?;

        self.berat_keluar = Some(reading.berat_keluar);
        self.waktu_keluar = Some(now);
        self.petugas_keluar = Some(officer);
        self.berat_bersih = Some(berat_bersih);
        self.grade_aktual = Some(reading.assessment.grade_aktual);
        self.kadar_air = Some(reading.assessment.kadar_air);
        self.kadar_sampah = Some(reading.assessment.kadar_sampah);
        self.tingkat_kematangan = reading.assessment.tingkat_kematangan;
        self.catatan = reading.catatan;
        self.status = WeighbridgeStatus::Completed;
        self.updated_at = now;
        Ok(berat_bersih)
    }

    /// Void the record when its order is cancelled before weigh-in
    pub fn cancel(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != WeighbridgeStatus::WeighIn || self.berat_masuk.is_some() {
            return Err(DomainError::invalid_transition("weighbridge record", self.status, "cancel"));
        }
        self.status = WeighbridgeStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }
}
