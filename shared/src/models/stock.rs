//! TBS stock lots and the stock ledger rules

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

/// Fruit quality tier. A is the best; ordering follows quality, so
/// `Grade::A > Grade::C`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
}

impl Grade {
    pub const ALL: [Grade; 3] = [Grade::A, Grade::B, Grade::C];

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Grade::A => 3,
            Grade::B => 2,
            Grade::C => 1,
        }
    }

    /// True when `self` is a lower quality tier than `other`
    pub fn is_below(&self, other: Grade) -> bool {
        self.rank() < other.rank()
    }
}

impl PartialOrd for Grade {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Grade {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Grade {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Grade::A),
            "B" | "b" => Ok(Grade::B),
            "C" | "c" => Ok(Grade::C),
            other => Err(DomainError::validation(
                "grade",
                format!("unknown grade '{}', expected A, B or C", other),
            )),
        }
    }
}

/// Availability status of a stock lot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Available,
    /// Held back by an administrator; no new orders accepted
    Reserved,
    SoldOut,
}

impl StockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::Available => "available",
            StockStatus::Reserved => "reserved",
            StockStatus::SoldOut => "sold_out",
        }
    }
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StockStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(StockStatus::Available),
            "reserved" => Ok(StockStatus::Reserved),
            "sold_out" => Ok(StockStatus::SoldOut),
            other => Err(DomainError::validation(
                "status",
                format!("unknown stock status '{}'", other),
            )),
        }
    }
}

/// A harvested TBS lot offered for sale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLot {
    pub id: Uuid,
    pub kebun_id: Uuid,
    pub tanggal_panen: NaiveDate,
    pub grade: Grade,
    /// Total harvested quantity (kg)
    pub jumlah_kg: Decimal,
    /// Quantity still open for ordering (kg)
    pub jumlah_tersedia: Decimal,
    pub harga_per_kg: Decimal,
    /// Oil content percentage, when measured
    pub kadar_minyak: Option<Decimal>,
    pub keterangan: Option<String>,
    pub status: StockStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New lot as submitted by inventory staff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStockLot {
    pub kebun_id: Uuid,
    pub tanggal_panen: NaiveDate,
    pub jumlah_kg: Decimal,
    pub grade: Grade,
    pub kadar_minyak: Option<Decimal>,
    pub harga_per_kg: Decimal,
    pub keterangan: Option<String>,
}

impl NewStockLot {
    pub fn validate(&self) -> DomainResult<()> {
        crate::validation::validate_positive_kg("jumlah_kg", self.jumlah_kg)?;
        crate::validation::validate_positive_amount("harga_per_kg", self.harga_per_kg)?;
        if let Some(oil) = self.kadar_minyak {
            crate::validation::validate_percentage("kadar_minyak", oil)?;
        }
        Ok(())
    }
}

/// Manual correction of a lot by inventory staff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLotUpdate {
    pub jumlah_tersedia: Decimal,
    pub harga_per_kg: Decimal,
    pub status: StockStatus,
    pub keterangan: Option<String>,
}

impl StockLot {
    /// Build a freshly created lot; all of it is available.
    pub fn create(id: Uuid, input: NewStockLot, now: DateTime<Utc>) -> DomainResult<Self> {
        input.validate()?;
        Ok(Self {
            id,
            kebun_id: input.kebun_id,
            tanggal_panen: input.tanggal_panen,
            grade: input.grade,
            jumlah_kg: input.jumlah_kg,
            jumlah_tersedia: input.jumlah_kg,
            harga_per_kg: input.harga_per_kg,
            kadar_minyak: input.kadar_minyak,
            keterangan: input.keterangan,
            status: StockStatus::Available,
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether new orders may be placed against this lot
    pub fn accepts_orders(&self) -> bool {
        self.status == StockStatus::Available && self.jumlah_tersedia > Decimal::ZERO
    }

    /// Take `qty` kg out of the available quantity.
    ///
    /// Leaves the lot untouched on any error.
    pub fn reserve(&mut self, qty: Decimal) -> DomainResult<()> {
        if qty <= Decimal::ZERO {
            return Err(DomainError::validation(
                "jumlah_kg",
                "quantity must be greater than zero",
            ));
        }
        if qty > self.jumlah_tersedia {
            return Err(DomainError::InsufficientStock {
                requested: qty,
                available: self.jumlah_tersedia,
            });
        }

        self.jumlah_tersedia -= qty;
        if self.jumlah_tersedia.is_zero() {
            self.status = StockStatus::SoldOut;
        }
        Ok(())
    }

    /// Give `qty` kg back after a rejection or cancellation.
    pub fn release(&mut self, qty: Decimal) -> DomainResult<()> {
        if qty <= Decimal::ZERO {
            return Err(DomainError::validation(
                "jumlah_kg",
                "quantity must be greater than zero",
            ));
        }
        let restored = self.jumlah_tersedia + qty;
        if restored > self.jumlah_kg {
            return Err(DomainError::Consistency(format!(
                "releasing {} kg on lot {} would exceed its total of {} kg",
                qty, self.id, self.jumlah_kg
            )));
        }

        self.jumlah_tersedia = restored;
        if self.status == StockStatus::SoldOut && self.jumlah_tersedia > Decimal::ZERO {
            self.status = StockStatus::Available;
        }
        Ok(())
    }

    /// Apply a manual correction, keeping the ledger invariants.
    ///
    /// `reserved` is the quantity still held by open orders on this lot;
    /// the available quantity may not grow past what those orders leave,
    /// so every later release still fits inside the total.
    pub fn apply_update(
        &mut self,
        update: StockLotUpdate,
        reserved: Decimal,
    ) -> DomainResult<()> {
        if update.jumlah_tersedia < Decimal::ZERO {
            return Err(DomainError::validation(
                "jumlah_tersedia",
                "available quantity cannot be negative",
            ));
        }
        if update.jumlah_tersedia > self.jumlah_kg {
            return Err(DomainError::validation(
                "jumlah_tersedia",
                format!(
                    "available quantity cannot exceed the lot total of {} kg",
                    self.jumlah_kg
                ),
            ));
        }
        let headroom = self.jumlah_kg - reserved;
        if update.jumlah_tersedia > headroom {
            return Err(DomainError::validation(
                "jumlah_tersedia",
                format!(
                    "{} kg of this lot is reserved by open orders; at most {} kg can be available",
                    reserved, headroom
                ),
            ));
        }
        crate::validation::validate_scale("jumlah_tersedia", update.jumlah_tersedia, 2)?;
        crate::validation::validate_positive_amount("harga_per_kg", update.harga_per_kg)?;

        let status = if update.jumlah_tersedia.is_zero() {
            StockStatus::SoldOut
        } else if update.status == StockStatus::SoldOut {
            return Err(DomainError::validation(
                "status",
                "a lot with quantity remaining cannot be marked sold out",
            ));
        } else {
            update.status
        };

        self.jumlah_tersedia = update.jumlah_tersedia;
        self.harga_per_kg = update.harga_per_kg;
        self.status = status;
        self.keterangan = update.keterangan;
        Ok(())
    }

    /// Check the ledger invariants hold for this lot
    pub fn check_invariants(&self) -> DomainResult<()> {
        if self.jumlah_tersedia < Decimal::ZERO || self.jumlah_tersedia > self.jumlah_kg {
            return Err(DomainError::Consistency(format!(
                "lot {} has {} kg available out of {} kg",
                self.id, self.jumlah_tersedia, self.jumlah_kg
            )));
        }
        if (self.status == StockStatus::SoldOut) != self.jumlah_tersedia.is_zero() {
            return Err(DomainError::Consistency(format!(
                "lot {} status {} disagrees with {} kg available",
                self.id, self.status, self.jumlah_tersedia
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lot(total: i64) -> StockLot {
        StockLot::create(
            Uuid::new_v4(),
            NewStockLot {
                kebun_id: Uuid::new_v4(),
                tanggal_panen: NaiveDate::from_ymd_opt(2025, 5, 20).unwrap(),
                jumlah_kg: Decimal::from(total),
                grade: Grade::A,
                kadar_minyak: None,
                harga_per_kg: Decimal::from(2500),
                keterangan: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn reserve_to_zero_marks_sold_out() {
        let mut l = lot(1000);
        l.reserve(Decimal::from(1000)).unwrap();
        assert_eq!(l.status, StockStatus::SoldOut);
        l.release(Decimal::from(1)).unwrap();
        assert_eq!(l.status, StockStatus::Available);
    }

    #[test]
    fn release_keeps_manual_reservation() {
        let mut l = lot(1000);
        l.reserve(Decimal::from(400)).unwrap();
        l.apply_update(
            StockLotUpdate {
                jumlah_tersedia: Decimal::from(600),
                harga_per_kg: Decimal::from(2500),
                status: StockStatus::Reserved,
                keterangan: None,
            },
            Decimal::from(400),
        )
        .unwrap();
        l.release(Decimal::from(400)).unwrap();
        assert_eq!(l.status, StockStatus::Reserved);
    }

    #[test]
    fn grade_ordering_follows_quality() {
        assert!(Grade::C.is_below(Grade::A));
        assert!(Grade::B.is_below(Grade::A));
        assert!(!Grade::A.is_below(Grade::B));
        assert!(Grade::A > Grade::C);
    }
}
