//! Browser tests for the exported calculators
//!
//! Run with `wasm-pack test --headless --firefox wasm` (or `--node`).

#![cfg(target_arch = "wasm32")]

use sawit_trading_wasm::{
    calculate_net_weight, calculate_order_total, is_valid_nib, is_valid_phone, normalize_plate,
    preview_grade_adjustment, preview_invoice,
};
use wasm_bindgen_test::*;

#[wasm_bindgen_test]
fn net_weight_rejects_lighter_departure() {
    assert_eq!(calculate_net_weight("25000", "30000").unwrap(), "5000");
    assert!(calculate_net_weight("25000", "24000").is_err());
    assert!(calculate_net_weight("25000", "abc").is_err());
}

#[wasm_bindgen_test]
fn order_total_matches_server_rounding() {
    assert_eq!(calculate_order_total("1.25", "2500.55").unwrap(), "3125.69");
}

#[wasm_bindgen_test]
fn downgrade_preview_is_negative() {
    assert_eq!(preview_grade_adjustment("A", "B", "13750000").unwrap(), "-1375000");
    assert!(preview_grade_adjustment("A", "D", "13750000").is_err());
}

#[wasm_bindgen_test]
fn invoice_preview_round_trips_json() {
    let json = r#"{"berat_masuk":"25000","berat_keluar":"30000","harga_per_kg":"2750",
                   "grade_diminta":"A","grade_aktual":"C"}"#;
    let preview: serde_json::Value = serde_json::from_str(&preview_invoice(json).unwrap()).unwrap();
    assert_eq!(preview["total_akhir"], "11000000");
    assert!(preview_invoice("{}").is_err());
}

#[wasm_bindgen_test]
fn form_checks() {
    assert_eq!(normalize_plate("bk1234abc").unwrap(), "BK 1234 ABC");
    assert!(normalize_plate("1234").is_err());
    assert!(is_valid_nib("1234567890123"));
    assert!(is_valid_phone("0812-3456-7890"));
    assert!(!is_valid_phone("12345"));
}
