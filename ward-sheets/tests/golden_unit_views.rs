use std::fs;

use chrono::NaiveDate;
use serde_json::{json, Value};
use ward_core::{format_many, merge, ProjectedView, ViewProjector, ViewSpec, WardConfig};
use ward_sheets::load_snapshot_str;

fn fixture_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 5).expect("ngày hợp lệ")
}

fn merged_fixture() -> Vec<ward_core::MergedPatient> {
    let snapshot =
        fs::read_to_string(fixture_path("ward_snapshot.json")).expect("Không đọc được snapshot mẫu");
    let bundle = load_snapshot_str(&snapshot).expect("Không đọc được nguồn dữ liệu");
    merge(
        &bundle.census,
        &bundle.edits,
        &bundle.transfers,
        &WardConfig::default(),
    )
}

fn summarize(view: &ProjectedView<'_>) -> Value {
    match view {
        ProjectedView::Groups(groups) => Value::Array(
            groups
                .iter()
                .map(|group| {
                    json!({
                        "label": group.label,
                        "ids": group.patients.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
                    })
                })
                .collect(),
        ),
        ProjectedView::List(patients) => {
            json!(patients.iter().map(|p| p.id.as_str()).collect::<Vec<_>>())
        }
    }
}

#[test]
fn trauma_handover_matches_golden() {
    let patients = merged_fixture();
    let config = WardConfig::default();
    let view = ViewProjector::new(&config, today())
        .project(&patients, &ViewSpec::Unit { unit_id: 3 })
        .expect("Không dựng được góc nhìn khoa");

    let actual = format_many("Trauma", view.patients(), today());

    let expected = fs::read_to_string(fixture_path("trauma_handover.txt"))
        .expect("Không đọc được golden handover");
    assert_eq!(actual, expected.trim_end_matches('\n'));
}

#[test]
fn trauma_views_match_golden() {
    let patients = merged_fixture();
    let config = WardConfig::default();
    let projector = ViewProjector::new(&config, today());

    let project = |spec: ViewSpec| {
        let view = projector
            .project(&patients, &spec)
            .expect("Không dựng được góc nhìn");
        summarize(&view)
    };

    let actual = json!({
        "bedZones": project(ViewSpec::BedZones { unit_id: 3 }),
        "consultants": project(ViewSpec::Consultants { unit_id: 3, sort: Default::default() }),
        "electiveByDate": project(ViewSpec::ElectiveByDate { consultant_sort: None }),
        "admissionDateGroups": project(ViewSpec::AdmissionDateGroups),
    });

    let expected = fs::read_to_string(fixture_path("trauma_views.json"))
        .expect("Không đọc được golden views");
    let expected_value: Value = serde_json::from_str(&expected).expect("Golden không hợp lệ");

    assert_eq!(actual, expected_value);
}
