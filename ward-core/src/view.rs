//! Dựng các góc nhìn hiển thị từ danh sách bệnh nhân đã hợp nhất.
//!
//! Mọi phép chiếu đều thuần: cùng danh sách, cùng `ViewSpec`, cùng ngày hôm
//! nay cho cùng kết quả. Danh sách rỗng cho góc nhìn rỗng, không phải lỗi.

use std::cmp::{Ordering, Reverse};
use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::date::CanonicalDate;
use crate::zones::{classify, natural_cmp, zone_order};
use crate::{LifecycleStatus, MergedPatient, Unit, WardConfig, WardError, ZoneRule};

/// Nhãn nhóm cho bệnh nhân không đọc được ngày nhập viện.
pub const UNKNOWN_DATE_LABEL: &str = "Unknown Date";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// Cách sắp xếp bệnh nhân trong một nhóm bác sĩ.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PatientSort {
    /// Giữ thứ tự của bảng tính.
    #[default]
    Census,
    Bed,
    Name,
    /// Mới nhập viện trước, ngày không đọc được xuống cuối.
    AdmissionDate,
}

/// Góc nhìn mà màn hình yêu cầu.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum ViewSpec {
    /// Bệnh nhân đang nằm viện của một khoa, xếp theo giường.
    Unit { unit_id: u32 },
    /// Bệnh nhân của khoa chia theo khu giường. Bệnh nhân "ma" bị loại.
    BedZones { unit_id: u32 },
    /// Bệnh nhân của khoa chia theo bác sĩ phụ trách.
    Consultants {
        unit_id: u32,
        #[serde(default)]
        sort: PatientSort,
    },
    /// Toàn bộ bệnh nhân đang nằm viện, mới nhập viện trước.
    AdmissionDate,
    /// Như `AdmissionDate` nhưng chia nhóm theo ngày.
    AdmissionDateGroups,
    /// Danh sách mổ phiên trong cửa sổ ngày.
    Elective {
        #[serde(default)]
        consultant_sort: Option<SortDirection>,
    },
    /// Danh sách mổ phiên chia nhóm theo ngày mổ.
    ElectiveByDate {
        #[serde(default)]
        consultant_sort: Option<SortDirection>,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PatientGroup<'a> {
    pub label: String,
    pub patients: Vec<&'a MergedPatient>,
}

impl<'a> PatientGroup<'a> {
    fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            patients: Vec::new(),
        }
    }
}

/// Kết quả phép chiếu: danh sách phẳng hoặc các nhóm có nhãn.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum ProjectedView<'a> {
    List(Vec<&'a MergedPatient>),
    Groups(Vec<PatientGroup<'a>>),
}

impl<'a> ProjectedView<'a> {
    pub fn len(&self) -> usize {
        match self {
            ProjectedView::List(patients) => patients.len(),
            ProjectedView::Groups(groups) => groups.iter().map(|g| g.patients.len()).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bệnh nhân theo đúng thứ tự hiển thị, bỏ qua nhãn nhóm.
    pub fn patients(&self) -> Vec<&'a MergedPatient> {
        match self {
            ProjectedView::List(patients) => patients.clone(),
            ProjectedView::Groups(groups) => groups
                .iter()
                .flat_map(|group| group.patients.iter().copied())
                .collect(),
        }
    }
}

/// Bộ dựng góc nhìn, gắn với cấu hình khoa và ngày hiện tại.
#[derive(Debug, Clone, Copy)]
pub struct ViewProjector<'c> {
    config: &'c WardConfig,
    today: NaiveDate,
}

impl<'c> ViewProjector<'c> {
    pub fn new(config: &'c WardConfig, today: NaiveDate) -> Self {
        Self { config, today }
    }

    pub fn project<'a>(
        &self,
        patients: &'a [MergedPatient],
        spec: &ViewSpec,
    ) -> Result<ProjectedView<'a>, WardError> {
        let view = match spec {
            ViewSpec::Unit { unit_id } => {
                let unit = self.config.unit(*unit_id)?;
                let rules = self.config.zone_rules_for(*unit_id);
                let mut list = unit_patients(patients, unit);
                sort_by_bed(&mut list, rules);
                ProjectedView::List(list)
            }
            ViewSpec::BedZones { unit_id } => {
                let unit = self.config.unit(*unit_id)?;
                let rules = self.config.zone_rules_for(*unit_id);
                let list = unit_patients(patients, unit)
                    .into_iter()
                    .filter(|patient| !patient.is_ghost)
                    .collect();
                ProjectedView::Groups(group_by_zone(list, rules))
            }
            ViewSpec::Consultants { unit_id, sort } => {
                let unit = self.config.unit(*unit_id)?;
                let rules = self.config.zone_rules_for(*unit_id);
                let mut groups = group_by_consultant(unit_patients(patients, unit), unit);
                for group in &mut groups {
                    sort_patients(&mut group.patients, *sort, rules);
                }
                ProjectedView::Groups(groups)
            }
            ViewSpec::AdmissionDate => ProjectedView::List(by_admission_date(patients)),
            ViewSpec::AdmissionDateGroups => {
                ProjectedView::Groups(self.admission_date_groups(by_admission_date(patients)))
            }
            ViewSpec::Elective { consultant_sort } => {
                ProjectedView::List(self.elective_window(patients, *consultant_sort))
            }
            ViewSpec::ElectiveByDate { consultant_sort } => {
                let list = self.elective_window(patients, *consultant_sort);
                ProjectedView::Groups(self.elective_groups(list))
            }
        };

        debug!(view = ?spec, shown = view.len(), total = patients.len(), "projected view");
        Ok(view)
    }

    /// Ca mổ phiên có ngày không quá `elective_lookback_days` ngày trong quá
    /// khứ: tương lai gần nhất trước, rồi hôm nay, rồi quá khứ gần nhất.
    fn elective_window<'a>(
        &self,
        patients: &'a [MergedPatient],
        consultant_sort: Option<SortDirection>,
    ) -> Vec<&'a MergedPatient> {
        let lookback = -i64::from(self.config.elective_lookback_days);
        let mut window: Vec<(i64, &MergedPatient)> = patients
            .iter()
            .filter(|patient| patient.status == LifecycleStatus::Elective)
            .filter_map(|patient| {
                let diff = patient.admission_date?.days_from(self.today)?;
                (diff >= lookback).then_some((diff, patient))
            })
            .collect();

        window.sort_by(|(diff_a, a), (diff_b, b)| {
            elective_tier_cmp(*diff_a, *diff_b).then_with(|| match consultant_sort {
                Some(direction) => direction.apply(consultant_cmp(a, b)),
                None => Ordering::Equal,
            })
        });

        window.into_iter().map(|(_, patient)| patient).collect()
    }

    fn elective_groups<'a>(&self, window: Vec<&'a MergedPatient>) -> Vec<PatientGroup<'a>> {
        let mut groups: Vec<(Option<CanonicalDate>, PatientGroup<'a>)> = Vec::new();
        for patient in window {
            match groups.last_mut() {
                Some((date, group)) if *date == patient.admission_date => {
                    group.patients.push(patient)
                }
                _ => {
                    let mut group = PatientGroup::new(self.relative_label(patient.admission_date));
                    group.patients.push(patient);
                    groups.push((patient.admission_date, group));
                }
            }
        }
        groups.into_iter().map(|(_, group)| group).collect()
    }

    fn admission_date_groups<'a>(&self, ordered: Vec<&'a MergedPatient>) -> Vec<PatientGroup<'a>> {
        let mut dated: BTreeMap<Reverse<CanonicalDate>, Vec<&'a MergedPatient>> = BTreeMap::new();
        let mut unknown = Vec::new();
        for patient in ordered {
            match patient.admission_date {
                Some(date) => dated.entry(Reverse(date)).or_default().push(patient),
                None => unknown.push(patient),
            }
        }

        let mut groups: Vec<PatientGroup<'a>> = dated
            .into_iter()
            .map(|(Reverse(date), patients)| PatientGroup {
                label: self.relative_label(Some(date)),
                patients,
            })
            .collect();
        if !unknown.is_empty() {
            groups.push(PatientGroup {
                label: UNKNOWN_DATE_LABEL.to_string(),
                patients: unknown,
            });
        }
        groups
    }

    fn relative_label(&self, date: Option<CanonicalDate>) -> String {
        let Some(date) = date else {
            return UNKNOWN_DATE_LABEL.to_string();
        };
        match date.days_from(self.today) {
            Some(0) => "Today".to_string(),
            Some(-1) => "Yesterday".to_string(),
            Some(1) => "Tomorrow".to_string(),
            _ => date.display(),
        }
    }
}

/// Bệnh nhân đang nằm viện có bác sĩ thuộc khoa, giữ thứ tự đầu vào.
fn unit_patients<'a>(patients: &'a [MergedPatient], unit: &Unit) -> Vec<&'a MergedPatient> {
    patients
        .iter()
        .filter(|patient| patient.is_active() && unit.covers(&patient.consultant))
        .collect()
}

/// Số bệnh nhân đang nằm viện của khoa, bất kể góc nhìn đang mở.
pub fn unit_census_count(patients: &[MergedPatient], unit: &Unit) -> usize {
    patients
        .iter()
        .filter(|patient| patient.is_active() && unit.covers(&patient.consultant))
        .count()
}

fn zone_rank(order: &[&str], zone: &str) -> usize {
    order
        .iter()
        .position(|name| *name == zone)
        .unwrap_or(order.len())
}

fn sort_by_bed(patients: &mut [&MergedPatient], rules: &[ZoneRule]) {
    let order = zone_order(rules);
    patients.sort_by(|a, b| {
        zone_rank(&order, classify(&a.bed_no, rules))
            .cmp(&zone_rank(&order, classify(&b.bed_no, rules)))
            .then_with(|| natural_cmp(&a.bed_no, &b.bed_no))
    });
}

fn group_by_zone<'a>(patients: Vec<&'a MergedPatient>, rules: &[ZoneRule]) -> Vec<PatientGroup<'a>> {
    let mut groups: Vec<PatientGroup<'a>> = zone_order(rules)
        .into_iter()
        .map(PatientGroup::new)
        .collect();

    for patient in patients {
        let zone = classify(&patient.bed_no, rules);
        if let Some(group) = groups.iter_mut().find(|group| group.label == zone) {
            group.patients.push(patient);
        }
    }

    groups.retain(|group| !group.patients.is_empty());
    for group in &mut groups {
        group.patients.sort_by(|a, b| natural_cmp(&a.bed_no, &b.bed_no));
    }
    groups
}

/// Mỗi bệnh nhân vào nhóm của bác sĩ đầu tiên khớp, theo thứ tự trong khoa.
fn group_by_consultant<'a>(patients: Vec<&'a MergedPatient>, unit: &Unit) -> Vec<PatientGroup<'a>> {
    let mut groups: Vec<PatientGroup<'a>> = unit
        .consultants
        .iter()
        .map(|consultant| PatientGroup::new(consultant.as_str()))
        .collect();

    for patient in patients {
        let Some(consultant) = unit.matching_consultant(&patient.consultant) else {
            continue;
        };
        if let Some(group) = groups.iter_mut().find(|group| group.label == consultant) {
            group.patients.push(patient);
        }
    }

    groups.retain(|group| !group.patients.is_empty());
    groups
}

fn sort_patients(patients: &mut [&MergedPatient], sort: PatientSort, rules: &[ZoneRule]) {
    match sort {
        PatientSort::Census => {}
        PatientSort::Bed => sort_by_bed(patients, rules),
        PatientSort::Name => patients.sort_by_key(|patient| patient.name.to_lowercase()),
        PatientSort::AdmissionDate => patients.sort_by(|a, b| newest_first(a, b)),
    }
}

fn newest_first(a: &MergedPatient, b: &MergedPatient) -> Ordering {
    match (a.admission_date, b.admission_date) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn by_admission_date(patients: &[MergedPatient]) -> Vec<&MergedPatient> {
    let mut list: Vec<&MergedPatient> = patients.iter().filter(|p| p.is_active()).collect();
    list.sort_by(|a, b| newest_first(a, b));
    list
}

/// Tương lai (tăng dần) → hôm nay → quá khứ (giảm dần).
fn elective_tier_cmp(a: i64, b: i64) -> Ordering {
    fn tier(diff: i64) -> u8 {
        match diff.cmp(&0) {
            Ordering::Greater => 0,
            Ordering::Equal => 1,
            Ordering::Less => 2,
        }
    }

    tier(a).cmp(&tier(b)).then_with(|| {
        if a > 0 {
            a.cmp(&b)
        } else {
            b.cmp(&a)
        }
    })
}

fn consultant_cmp(a: &MergedPatient, b: &MergedPatient) -> Ordering {
    a.consultant.to_lowercase().cmp(&b.consultant.to_lowercase())
}

/// Lọc không phân biệt hoa thường theo tên, số hồ sơ, giường, bác sĩ, chẩn đoán.
pub fn search<'a>(patients: &'a [MergedPatient], query: &str) -> Vec<&'a MergedPatient> {
    let needle = query.trim().to_lowercase();
    patients
        .iter()
        .filter(|patient| {
            needle.is_empty()
                || [
                    patient.name.as_str(),
                    patient.id.as_str(),
                    patient.bed_no.as_str(),
                    patient.consultant.as_str(),
                    patient.diagnosis.as_str(),
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .collect()
}

/// Chữ cái đầu của tên bác sĩ, bỏ qua danh xưng như "Dr." hay "Prof.".
pub fn consultant_initials(name: &str) -> String {
    name.split_whitespace()
        .filter(|token| !token.ends_with('.'))
        .filter_map(|token| token.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PatientId;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    fn patient(id: &str, consultant: &str, bed: &str, ip_date: &str) -> MergedPatient {
        MergedPatient {
            id: PatientId::new(id).unwrap(),
            name: format!("Patient {id}"),
            consultant: consultant.to_string(),
            bed_no: bed.to_string(),
            ip_date: ip_date.to_string(),
            admission_date: crate::normalize(ip_date),
            ..MergedPatient::default()
        }
    }

    fn elective(id: &str, consultant: &str, ip_date: &str) -> MergedPatient {
        MergedPatient {
            status: LifecycleStatus::Elective,
            ..patient(id, consultant, "", ip_date)
        }
    }

    fn ids(view: &ProjectedView<'_>) -> Vec<String> {
        view.patients().iter().map(|p| p.id.to_string()).collect()
    }

    #[test]
    fn elective_window_boundary_is_seven_days() {
        let patients = vec![
            elective("KEEP", "Dr. Rohit Bista", "2024-06-03"),
            elective("DROP", "Dr. Rohit Bista", "2024-06-02"),
            elective("BAD", "Dr. Rohit Bista", "not a date"),
        ];
        let config = WardConfig::default();
        let view = ViewProjector::new(&config, today())
            .project(&patients, &ViewSpec::Elective { consultant_sort: None })
            .unwrap();
        assert_eq!(ids(&view), vec!["KEEP"]);
    }

    #[test]
    fn elective_three_tier_order() {
        let patients = vec![
            elective("A", "Dr. X", "2024-06-12"),
            elective("B", "Dr. X", "2024-06-10"),
            elective("C", "Dr. X", "2024-06-11"),
            elective("D", "Dr. X", "2024-06-08"),
        ];
        let config = WardConfig::default();
        let view = ViewProjector::new(&config, today())
            .project(&patients, &ViewSpec::Elective { consultant_sort: None })
            .unwrap();
        assert_eq!(ids(&view), vec!["C", "A", "B", "D"]);
    }

    #[test]
    fn elective_consultant_tiebreak_within_a_tier() {
        let patients = vec![
            elective("Z", "Dr. Rohit Bista", "2024-06-11"),
            elective("Y", "Dr. Amit Joshi", "2024-06-11"),
            elective("X", "Dr. Amit Joshi", "2024-06-09"),
        ];
        let config = WardConfig::default();
        let projector = ViewProjector::new(&config, today());
        let spec = ViewSpec::ElectiveByDate {
            consultant_sort: Some(SortDirection::Ascending),
        };
        let view = projector.project(&patients, &spec).unwrap();
        let ProjectedView::Groups(groups) = &view else {
            panic!("expected groups");
        };
        let labels: Vec<&str> = groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["Tomorrow", "Yesterday"]);
        assert_eq!(ids(&view), vec!["Y", "Z", "X"]);
    }

    #[test]
    fn bed_zones_group_in_layout_order_without_ghosts() {
        let mut ghost = patient("G1", "Dr. Saroj Rijal", "", "2024-06-01");
        ghost.is_ghost = true;
        let patients = vec![
            patient("P1", "Dr. Saroj Rijal", "528", "2024-06-01"),
            patient("P2", "Dr. Saroj Rijal", "505", "2024-06-01"),
            patient("P3", "Dr. Saroj Rijal", "502", "2024-06-01"),
            patient("P4", "Dr. Saroj Rijal", "ICU-2", "2024-06-01"),
            patient("P5", "Dr. Bibek Banskota", "503", "2024-06-01"),
            ghost,
        ];
        let config = WardConfig::default();
        let view = ViewProjector::new(&config, today())
            .project(&patients, &ViewSpec::BedZones { unit_id: 3 })
            .unwrap();

        let ProjectedView::Groups(groups) = &view else {
            panic!("expected groups");
        };
        let labels: Vec<&str> = groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["5A", "5C", "ICU"]);
        assert_eq!(ids(&view), vec!["P3", "P2", "P1", "P4"]);
    }

    #[test]
    fn unit_view_excludes_discharged_and_elective_but_keeps_ghosts() {
        let mut discharged = patient("P2", "Dr. Saroj Rijal", "503", "2024-06-01");
        discharged.status = LifecycleStatus::Discharged;
        let mut ghost = patient("G1", "Dr. Saroj Rijal", "", "2024-06-01");
        ghost.is_ghost = true;
        let patients = vec![
            patient("P1", "Dr. Saroj Rijal", "502", "2024-06-01"),
            discharged,
            elective("E1", "Dr. Saroj Rijal", "2024-06-11"),
            ghost,
        ];
        let config = WardConfig::default();
        let view = ViewProjector::new(&config, today())
            .project(&patients, &ViewSpec::Unit { unit_id: 3 })
            .unwrap();
        assert_eq!(ids(&view), vec!["P1", "G1"]);
        assert_eq!(unit_census_count(&patients, config.unit(3).unwrap()), 2);
    }

    #[test]
    fn consultant_groups_follow_unit_order() {
        let patients = vec![
            patient("P1", "Dr. Subhash Regmi", "503", "2024-06-01"),
            patient("P2", "dr. saroj rijal", "502", "2024-06-01"),
            patient("P3", "Dr. Subhash Regmi", "501", "2024-06-01"),
        ];
        let config = WardConfig::default();
        let spec = ViewSpec::Consultants {
            unit_id: 3,
            sort: PatientSort::Bed,
        };
        let view = ViewProjector::new(&config, today())
            .project(&patients, &spec)
            .unwrap();
        let ProjectedView::Groups(groups) = &view else {
            panic!("expected groups");
        };
        let labels: Vec<&str> = groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["Dr. Saroj Rijal", "Dr. Subhash Regmi"]);
        assert_eq!(ids(&view), vec!["P2", "P3", "P1"]);
    }

    #[test]
    fn admission_date_order_puts_unknown_last_and_stable() {
        let patients = vec![
            patient("U1", "Dr. X", "", "garbage"),
            patient("OLD", "Dr. X", "", "2024-05-01"),
            patient("U2", "Dr. X", "", ""),
            patient("NEW", "Dr. X", "", "2024-06-09"),
        ];
        let config = WardConfig::default();
        let projector = ViewProjector::new(&config, today());

        let view = projector.project(&patients, &ViewSpec::AdmissionDate).unwrap();
        assert_eq!(ids(&view), vec!["NEW", "OLD", "U1", "U2"]);

        let grouped = projector
            .project(&patients, &ViewSpec::AdmissionDateGroups)
            .unwrap();
        let ProjectedView::Groups(groups) = &grouped else {
            panic!("expected groups");
        };
        let labels: Vec<&str> = groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["Yesterday", "01-May-2024", UNKNOWN_DATE_LABEL]);
    }

    #[test]
    fn unknown_unit_is_an_error_and_empty_input_is_not() {
        let config = WardConfig::default();
        let projector = ViewProjector::new(&config, today());
        assert!(matches!(
            projector.project(&[], &ViewSpec::Unit { unit_id: 42 }),
            Err(WardError::UnknownUnit(42))
        ));
        let view = projector.project(&[], &ViewSpec::BedZones { unit_id: 1 }).unwrap();
        assert!(view.is_empty());
    }

    #[test]
    fn view_spec_reads_from_json() {
        let spec: ViewSpec =
            serde_json::from_str(r#"{"view":"consultants","unit_id":5}"#).unwrap();
        assert_eq!(
            spec,
            ViewSpec::Consultants {
                unit_id: 5,
                sort: PatientSort::Census
            }
        );
    }

    #[test]
    fn search_and_initials() {
        let patients = vec![
            patient("H100", "Dr. Saroj Rijal", "502", "2024-06-01"),
            patient("H200", "Prof. Dr. Amit Joshi", "ICU-1", "2024-06-01"),
        ];
        assert_eq!(search(&patients, "icu").len(), 1);
        assert_eq!(search(&patients, "h100")[0].bed_no, "502");
        assert_eq!(search(&patients, "  ").len(), 2);
        assert_eq!(consultant_initials("Prof. Dr. Amit Joshi"), "AJ");
        assert_eq!(consultant_initials(""), "");
    }
}
