//! Instrument tick values and live-trade default distances, with
//! `app_config` overrides layered over the hardcoded defaults.

use std::collections::HashMap;

use serde::Serialize;

pub const INSTRUMENTS: &[&str] = &["MES", "ES"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InstrumentSpec {
    pub dollars_per_point: f64,
    pub dollars_per_tick: f64,
    pub ticks_per_point: i64,
}

fn builtin_spec(symbol: &str) -> InstrumentSpec {
    match symbol {
        "ES" => InstrumentSpec {
            dollars_per_point: 50.0,
            dollars_per_tick: 12.50,
            ticks_per_point: 4,
        },
        // MES is also the fallback for unknown symbols
        _ => InstrumentSpec {
            dollars_per_point: 5.0,
            dollars_per_tick: 1.25,
            ticks_per_point: 4,
        },
    }
}

/// Instrument specs with any `inst_{sym}_{dpp,dpt,tpp}` settings applied.
pub fn instrument_config(settings: &HashMap<String, String>) -> HashMap<String, InstrumentSpec> {
    INSTRUMENTS
        .iter()
        .map(|&sym| {
            let mut spec = builtin_spec(sym);
            if let Some(v) = settings.get(&format!("inst_{sym}_dpp")).and_then(|v| v.parse().ok()) {
                spec.dollars_per_point = v;
            }
            if let Some(v) = settings.get(&format!("inst_{sym}_dpt")).and_then(|v| v.parse().ok()) {
                spec.dollars_per_tick = v;
            }
            if let Some(v) = settings.get(&format!("inst_{sym}_tpp")).and_then(|v| v.parse().ok()) {
                spec.ticks_per_point = v;
            }
            (sym.to_string(), spec)
        })
        .collect()
}

/// Spec for a single instrument, falling back to MES for unknown symbols.
pub fn spec_for(settings: &HashMap<String, String>, symbol: &str) -> InstrumentSpec {
    instrument_config(settings)
        .remove(symbol)
        .unwrap_or_else(|| builtin_spec("MES"))
}

/// Default stop/TP distances in points for the order ticket.
pub const TRADE_DEFAULT_KEYS: &[(&str, &str)] = &[
    ("full_stop_points", "20"),
    ("full_tp_points", "20"),
    ("partial_stop_points", "20"),
    ("partial_tp1_points", "5"),
    ("partial_tp2_points", "10"),
    ("partial_tp3_points", "20"),
];

/// Trade default settings, merging `td_*` config values over the built-ins.
pub fn trade_defaults(settings: &HashMap<String, String>) -> HashMap<String, String> {
    TRADE_DEFAULT_KEYS
        .iter()
        .map(|&(key, default)| {
            let value = settings
                .get(&format!("td_{key}"))
                .cloned()
                .unwrap_or_else(|| default.to_string());
            (key.to_string(), value)
        })
        .collect()
}

pub fn default_points(defaults: &HashMap<String, String>, key: &str) -> f64 {
    defaults.get(key).and_then(|v| v.parse().ok()).unwrap_or(20.0)
}
