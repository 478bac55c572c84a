//! WebAssembly module for the TBS Trading Platform
//!
//! Provides client-side computation for:
//! - Net weight from weighbridge readings
//! - Order totals
//! - Grade adjustment previews
//! - A full invoice preview for a weighing
//! - Plate number and contact validation
//!
//! Amounts cross the boundary as decimal strings so the browser shows
//! exactly what the server will store.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::log_1(&JsValue::from_str("sawit-trading-wasm ready"));
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, JsValue> {
    Decimal::from_str(value.trim())
        .map_err(|e| JsValue::from_str(&format!("Invalid {}: {}", field, e)))
}

fn parse_grade(value: &str) -> Result<Grade, JsValue> {
    Grade::from_str(value.trim()).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Net weight in kg from gross weight-in and weight-out
#[wasm_bindgen]
pub fn calculate_net_weight(berat_masuk: &str, berat_keluar: &str) -> Result<String, JsValue> {
    let masuk = parse_decimal("berat_masuk", berat_masuk)?;
    let keluar = parse_decimal("berat_keluar", berat_keluar)?;
    net_weight(masuk, keluar)
        .map(|kg| kg.normalize().to_string())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Order total for a quantity at the lot's unit price
#[wasm_bindgen]
pub fn calculate_order_total(jumlah_kg: &str, harga_per_kg: &str) -> Result<String, JsValue> {
    let kg = parse_decimal("jumlah_kg", jumlah_kg)?;
    let price = parse_decimal("harga_per_kg", harga_per_kg)?;
    Ok(order_total(kg, price).normalize().to_string())
}

/// Price adjustment (zero or negative) the invoice will carry when the
/// delivered grade differs from the ordered one, using the default
/// discount rates
#[wasm_bindgen]
pub fn preview_grade_adjustment(
    grade_diminta: &str,
    grade_aktual: &str,
    total_harga: &str,
) -> Result<String, JsValue> {
    let requested = parse_grade(grade_diminta)?;
    let assessed = parse_grade(grade_aktual)?;
    let total = parse_decimal("total_harga", total_harga)?;
    let adjustment = GradeAdjustmentPolicy::default().adjustment(requested, assessed, total);
    Ok(adjustment.normalize().to_string())
}

/// Weigh-out figures as entered on the weighbridge form
#[derive(Debug, Deserialize)]
struct WeighingInput {
    berat_masuk: Decimal,
    berat_keluar: Decimal,
    harga_per_kg: Decimal,
    grade_diminta: Grade,
    grade_aktual: Grade,
}

/// The amounts the sales document will carry
#[derive(Debug, Serialize)]
struct InvoicePreview {
    berat_bersih: Decimal,
    total_harga: Decimal,
    penyesuaian_harga: Decimal,
    total_akhir: Decimal,
}

/// Preview the invoice for a weighing before it is submitted.
///
/// Takes and returns JSON; amounts are decimal strings.
#[wasm_bindgen]
pub fn preview_invoice(weighing_json: &str) -> Result<String, JsValue> {
    let input: WeighingInput = serde_json::from_str(weighing_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid weighing JSON: {}", e)))?;

    let berat_bersih = net_weight(input.berat_masuk, input.berat_keluar)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    let total_harga = order_total(berat_bersih, input.harga_per_kg);
    let penyesuaian_harga = GradeAdjustmentPolicy::default().adjustment(
        input.grade_diminta,
        input.grade_aktual,
        total_harga,
    );

    let preview = InvoicePreview {
        berat_bersih: berat_bersih.normalize(),
        total_harga: total_harga.normalize(),
        penyesuaian_harga: penyesuaian_harga.normalize(),
        total_akhir: (total_harga + penyesuaian_harga).normalize(),
    };
    serde_json::to_string(&preview).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Canonical plate number ("BK 1234 ABC"), or an error message
#[wasm_bindgen]
pub fn normalize_plate(plat_nomor: &str) -> Result<String, JsValue> {
    normalize_plate_number(plat_nomor).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
pub fn is_valid_nib(nib: &str) -> bool {
    validate_nib(nib).is_ok()
}

#[wasm_bindgen]
pub fn is_valid_phone(phone: &str) -> bool {
    validate_indonesian_phone(phone).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_total() {
        assert_eq!(calculate_order_total("1500", "2750.50").unwrap(), "4125750");
    }

    #[test]
    fn test_net_weight() {
        assert_eq!(calculate_net_weight("8200", "14750.5").unwrap(), "6550.5");
    }

    #[test]
    fn test_grade_adjustment_preview() {
        assert_eq!(preview_grade_adjustment("A", "C", "1000000").unwrap(), "-200000");
        assert_eq!(preview_grade_adjustment("B", "A", "1000000").unwrap(), "0");
    }

    #[test]
    fn test_invoice_preview() {
        let json = r#"{"berat_masuk":"25000","berat_keluar":"30000","harga_per_kg":"2750",
                       "grade_diminta":"A","grade_aktual":"B"}"#;
        let preview: serde_json::Value = serde_json::from_str(&preview_invoice(json).unwrap()).unwrap();
        assert_eq!(preview["berat_bersih"], "5000");
        assert_eq!(preview["total_harga"], "13750000");
        assert_eq!(preview["penyesuaian_harga"], "-1375000");
        assert_eq!(preview["total_akhir"], "12375000");
    }

    #[test]
    fn test_invoice_preview_rounds_to_cent() {
        let json = r#"{"berat_masuk":"25000","berat_keluar":"30000.55","harga_per_kg":"2500.55",
                       "grade_diminta":"A","grade_aktual":"A"}"#;
        let preview: serde_json::Value = serde_json::from_str(&preview_invoice(json).unwrap()).unwrap();
        assert_eq!(preview["berat_bersih"], "5000.55");
        assert_eq!(preview["total_akhir"], "12504125.3");
    }

    #[test]
    fn test_contact_checks() {
        assert!(is_valid_nib("1234567890123"));
        assert!(!is_valid_nib("12345"));
    }
}
