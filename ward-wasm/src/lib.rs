//! Bridge WASM <-> JavaScript cho lõi đối soát khoa.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_wasm_bindgen::{from_value, to_value};
use ward_core::date::normalize_gregorian;
use ward_core::{
    format_many, merge, Clock, DischargeDraft, GhostDefaults, MergePolicy, MergedPatient,
    SystemClock, Unit, ViewProjector, ViewSpec, WardConfig, WardError, ZoneRule,
};
use wasm_bindgen::prelude::*;

#[derive(Deserialize)]
struct JsWardConfig {
    #[serde(default)]
    units: Option<Vec<Unit>>,
    #[serde(default)]
    zone_rules: Option<Vec<ZoneRule>>,
    #[serde(default)]
    unit_zone_rules: Option<BTreeMap<u32, Vec<ZoneRule>>>,
    #[serde(default)]
    elective_lookback_days: Option<u32>,
    #[serde(default)]
    merge_policy: Option<MergePolicy>,
    #[serde(default)]
    ghost: Option<GhostDefaults>,
}

impl From<JsWardConfig> for WardConfig {
    fn from(cfg: JsWardConfig) -> Self {
        let mut base = WardConfig::default();
        if let Some(units) = cfg.units {
            base.units = units;
        }
        if let Some(rules) = cfg.zone_rules {
            base.zone_rules = rules;
        }
        if let Some(per_unit) = cfg.unit_zone_rules {
            base.unit_zone_rules = per_unit;
        }
        if let Some(days) = cfg.elective_lookback_days {
            base.elective_lookback_days = days;
        }
        if let Some(policy) = cfg.merge_policy {
            base.merge_policy = policy;
        }
        if let Some(ghost) = cfg.ghost {
            base.ghost = ghost;
        }
        base
    }
}

fn read_config(config: Option<JsValue>) -> Result<WardConfig, JsValue> {
    match config {
        Some(js_cfg) if !js_cfg.is_undefined() && !js_cfg.is_null() => {
            let cfg: JsWardConfig = from_value(js_cfg)
                .map_err(|err| JsValue::from_str(&format!("Không đọc được config: {err}")))?;
            let cfg = WardConfig::from(cfg);
            cfg.validate()
                .map_err(|err| JsValue::from_str(&format_ward_error(err)))?;
            Ok(cfg)
        }
        _ => Ok(WardConfig::default()),
    }
}

fn read_patients(patients: JsValue) -> Result<Vec<MergedPatient>, JsValue> {
    from_value(patients)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được danh sách bệnh nhân: {err}")))
}

/// Ngày do trình duyệt truyền vào, hoặc đồng hồ hệ thống khi bỏ trống.
fn resolve_today(today: Option<String>) -> Result<NaiveDate, JsValue> {
    match today.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => normalize_gregorian(raw)
            .ok_or_else(|| JsValue::from_str(&format!("Ngày không hợp lệ: {raw}"))),
        None => Ok(SystemClock.today()),
    }
}

/// Hợp nhất một ảnh chụp `{sheets, patient_data, transfers}` thành danh sách bệnh nhân.
#[wasm_bindgen]
pub fn merge_snapshot(snapshot: JsValue, config: Option<JsValue>) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let snapshot_value = from_value::<serde_json::Value>(snapshot)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được JSON snapshot: {err}")))?;
    let cfg = read_config(config)?;

    let bundle = ward_sheets::load_snapshot_value(&snapshot_value)
        .map_err(|err| JsValue::from_str(&format_ward_error(err)))?;
    let patients = merge(&bundle.census, &bundle.edits, &bundle.transfers, &cfg);

    to_value(&patients)
        .map_err(|err| JsValue::from_str(&format!("Không serialize bệnh nhân: {err}")))
}

#[wasm_bindgen]
pub fn project_view(
    patients: JsValue,
    spec: JsValue,
    today: Option<String>,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let patients = read_patients(patients)?;
    let spec: ViewSpec = from_value(spec)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được góc nhìn: {err}")))?;
    let cfg = read_config(config)?;
    let today = resolve_today(today)?;

    let view = ViewProjector::new(&cfg, today)
        .project(&patients, &spec)
        .map_err(|err| JsValue::from_str(&format_ward_error(err)))?;

    to_value(&view).map_err(|err| JsValue::from_str(&format!("Không serialize góc nhìn: {err}")))
}

/// Văn bản bàn giao cho nhóm chat / sổ tay điện tử.
#[wasm_bindgen]
pub fn format_patients(
    label: String,
    patients: JsValue,
    today: Option<String>,
) -> Result<String, JsValue> {
    let patients = read_patients(patients)?;
    let today = resolve_today(today)?;
    Ok(format_many(&label, &patients, today))
}

#[wasm_bindgen]
pub fn discharge_draft(patient: JsValue, today: Option<String>) -> Result<JsValue, JsValue> {
    let patient: MergedPatient = from_value(patient)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được bệnh nhân: {err}")))?;
    let today = resolve_today(today)?;
    to_value(&DischargeDraft::from_patient(&patient, today))
        .map_err(|err| JsValue::from_str(&format!("Không serialize phiếu ra viện: {err}")))
}

fn format_ward_error(err: WardError) -> String {
    format!("Ward error: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_overrides_only_given_keys() {
        let cfg = WardConfig::from(JsWardConfig {
            units: None,
            zone_rules: None,
            unit_zone_rules: None,
            elective_lookback_days: Some(3),
            merge_policy: None,
            ghost: None,
        });
        assert_eq!(cfg.elective_lookback_days, 3);
        assert_eq!(cfg.units, WardConfig::default().units);
    }

    #[test]
    fn config_keys_match_core_casing_and_accept_ghost() {
        let js: JsWardConfig = serde_json::from_value(serde_json::json!({
            "elective_lookback_days": 5,
            "unit_zone_rules": {},
            "ghost": { "name": "Đã rời danh sách" }
        }))
        .unwrap();
        let cfg = WardConfig::from(js);
        assert_eq!(cfg.elective_lookback_days, 5);
        assert_eq!(cfg.ghost.name, "Đã rời danh sách");
        assert_eq!(cfg.ghost.age_gender, GhostDefaults::default().age_gender);
        assert_eq!(cfg.zone_rules, WardConfig::default().zone_rules);
    }
}
