//! Logic lõi đối soát bệnh nhân nội trú và dựng các góc nhìn của khoa.
//!
//! Ba nguồn dữ liệu độc lập (bảng tính điều dưỡng, ghi chú lâm sàng, phiếu
//! chuyển khoa) được hợp nhất thành một danh sách `MergedPatient`; các module
//! con dựng góc nhìn theo giường, theo bác sĩ, theo ngày nhập viện và danh
//! sách mổ phiên.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod clock;
pub mod date;
pub mod discharge;
pub mod format;
pub mod merge;
pub mod state;
pub mod tracking;
pub mod view;
pub mod zones;

pub use clock::{Clock, FixedClock, SystemClock};
pub use date::{normalize, Calendar, CanonicalDate};
pub use discharge::{discharge_log, is_discharge_reverted, DischargeDraft, DischargeRecord};
pub use format::{format_many, format_one};
pub use merge::{latest_transfers, merge, EditPrecedence, EditableField, MergePolicy};
pub use state::{SourceEvent, WardState};
pub use tracking::{tracking_history, TrackingRow, Trend};
pub use view::{
    consultant_initials, search, unit_census_count, PatientGroup, PatientSort, ProjectedView,
    SortDirection, ViewProjector, ViewSpec,
};
pub use zones::{classify, default_zone_rules, natural_cmp, ZoneRule};

/// Các chuỗi lỗi công thức mà bảng tính có thể trả về thay cho giá trị thật.
pub const SHEET_ERROR_MARKERS: [&str; 8] = [
    "#NAME?", "#REF!", "#VALUE!", "#N/A", "#DIV/0!", "#NUM!", "#NULL!", "#ERROR!",
];

/// Ô chứa lỗi công thức được coi như bỏ trống.
pub fn is_sheet_error(value: &str) -> bool {
    SHEET_ERROR_MARKERS
        .iter()
        .any(|marker| value.contains(marker))
}

/// Mã bệnh nhân (số hồ sơ bệnh viện), khóa nối giữa mọi nguồn dữ liệu.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(String);

impl PatientId {
    /// Trả về `None` khi chuỗi rỗng hoặc là lỗi công thức.
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() || is_sheet_error(trimmed) {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trạng thái điều trị của bệnh nhân.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    #[default]
    Admitted,
    MarkedForDischarge,
    Discharged,
    Elective,
}

impl LifecycleStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "admitted" => Some(Self::Admitted),
            "marked_for_discharge" => Some(Self::MarkedForDischarge),
            "discharged" => Some(Self::Discharged),
            "elective" => Some(Self::Elective),
            _ => None,
        }
    }
}

/// Trang bảng tính nguồn của một dòng điều dưỡng.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CensusStatus {
    #[default]
    Admitted,
    Elective,
}

/// Một dòng trong bảng tính điều dưỡng (nguồn chuẩn cho thông tin nhập viện).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CensusRecord {
    pub hospital_no: PatientId,
    /// Ngày nhập viện ở dạng thô, chưa chuẩn hóa.
    pub ip_date: String,
    pub in_pat_no: String,
    pub name: String,
    pub department: String,
    pub consultant: String,
    pub mobile: String,
    pub age_gender: String,
    pub bed_no: String,
    pub diagnosis: String,
    pub procedure: String,
    pub npo_status: String,
    pub status: CensusStatus,
}

/// Một lần phẫu thuật bổ sung.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Surgery {
    pub procedure: String,
    /// Ngày phẫu thuật (thô).
    pub dop: String,
}

/// Một lần theo dõi chỉ số (Hb, dẫn lưu, nhiệt độ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TrackingEntry {
    pub id: String,
    pub date: String,
    pub parameter: String,
    pub value: String,
}

/// Ghi chú lâm sàng do bác sĩ chỉnh sửa (bộ sưu tập `patient_data`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EditRecord {
    pub name: String,
    pub age_gender: String,
    pub bed_no: String,
    pub consultant: String,
    pub ip_date: String,
    pub in_pat_no: String,
    pub department: String,
    pub mobile: String,
    pub diagnosis: String,
    pub procedure: String,
    pub dop: String,
    pub surgeries: Vec<Surgery>,
    pub plan: String,
    pub npo_status: String,
    pub address: String,
    pub history: String,
    pub examination: String,
    pub investigation: String,
    pub program_year: String,
    pub program_block: String,
    pub domain: String,
    pub level: String,
    pub tracking: Vec<TrackingEntry>,
    pub status: Option<LifecycleStatus>,
    pub last_updated: Option<String>,
}

impl EditRecord {
    /// Dựng bản ghi sẽ được lưu khi bác sĩ bấm lưu hoặc chuyển khoa.
    ///
    /// Giữ cả các trường thuộc bảng tính để bệnh nhân vẫn hiển thị được
    /// khi rời khỏi bảng tính; khi còn dòng bảng tính thì phép hợp nhất bỏ
    /// qua các trường đó.
    pub fn snapshot_of(patient: &MergedPatient, saved_at: DateTime<Utc>) -> Self {
        Self {
            name: patient.name.clone(),
            age_gender: patient.age_gender.clone(),
            bed_no: patient.bed_no.clone(),
            consultant: patient.consultant.clone(),
            ip_date: patient.ip_date.clone(),
            in_pat_no: patient.in_pat_no.clone(),
            department: patient.department.clone(),
            mobile: patient.mobile.clone(),
            diagnosis: patient.diagnosis.clone(),
            procedure: patient.procedure.clone(),
            dop: patient.dop.clone(),
            surgeries: patient.surgeries.clone(),
            plan: patient.plan.clone(),
            npo_status: patient.npo_status.clone(),
            address: patient.address.clone(),
            history: patient.history.clone(),
            examination: patient.examination.clone(),
            investigation: patient.investigation.clone(),
            program_year: patient.program_year.clone(),
            program_block: patient.program_block.clone(),
            domain: patient.domain.clone(),
            level: patient.level.clone(),
            tracking: patient.tracking.clone(),
            status: Some(patient.status),
            last_updated: Some(saved_at.to_rfc3339()),
        }
    }

    /// Bản ghi chuyển khoa cũng cập nhật bác sĩ phụ trách trong ảnh chụp.
    pub fn with_consultant(mut self, consultant: impl Into<String>) -> Self {
        self.consultant = consultant.into();
        self
    }
}

/// Phiếu chuyển bệnh nhân sang bác sĩ/khoa khác (bộ sưu tập `transfers`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TransferRecord {
    pub hospital_no: PatientId,
    pub new_consultant: String,
    pub unit_id: Option<u32>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Bệnh nhân sau khi hợp nhất. Không lưu trữ, dựng lại sau mỗi thay đổi nguồn.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MergedPatient {
    pub id: PatientId,
    pub ip_date: String,
    pub admission_date: Option<CanonicalDate>,
    pub in_pat_no: String,
    pub name: String,
    pub department: String,
    pub consultant: String,
    pub mobile: String,
    pub age_gender: String,
    pub bed_no: String,
    pub diagnosis: String,
    pub procedure: String,
    pub dop: String,
    pub surgeries: Vec<Surgery>,
    pub plan: String,
    pub npo_status: String,
    pub address: String,
    pub history: String,
    pub examination: String,
    pub investigation: String,
    pub program_year: String,
    pub program_block: String,
    pub domain: String,
    pub level: String,
    pub tracking: Vec<TrackingEntry>,
    pub status: LifecycleStatus,
    /// Khoa đích của phiếu chuyển gần nhất, nếu có.
    pub transfer_unit: Option<u32>,
    /// Bệnh nhân vẫn được theo dõi nhưng không còn trong bảng tính.
    pub is_ghost: bool,
    pub last_updated: Option<String>,
}

impl MergedPatient {
    /// Còn nằm viện: chưa ra viện và không phải ca mổ phiên.
    pub fn is_active(&self) -> bool {
        !matches!(
            self.status,
            LifecycleStatus::Discharged | LifecycleStatus::Elective
        )
    }
}

/// Một khoa lâm sàng và các bác sĩ thuộc khoa.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Unit {
    pub id: u32,
    pub name: String,
    /// Chuỗi con so khớp không phân biệt hoa thường với tên bác sĩ.
    pub consultants: Vec<String>,
}

impl Unit {
    pub fn new(id: u32, name: &str, consultants: &[&str]) -> Self {
        Self {
            id,
            name: name.to_string(),
            consultants: consultants.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Bác sĩ đầu tiên của khoa khớp với chuỗi bác sĩ của bệnh nhân.
    pub fn matching_consultant(&self, consultant: &str) -> Option<&str> {
        let haystack = consultant.to_lowercase();
        self.consultants
            .iter()
            .map(String::as_str)
            .filter(|needle| !needle.trim().is_empty())
            .find(|needle| haystack.contains(&needle.to_lowercase()))
    }

    pub fn covers(&self, consultant: &str) -> bool {
        self.matching_consultant(consultant).is_some()
    }
}

/// Danh sách khoa mặc định của bệnh viện.
pub fn default_units() -> Vec<Unit> {
    vec![
        Unit::new(
            1,
            "Hip Pelvis Acetabulum",
            &[
                "Prof. Dr. Ashok Kumar Banskota",
                "Dr. Bibek Banskota",
                "Dr. Ansul Rajbhandari",
                "Dr. Rajendra Aryal",
                "Dr. Birendra Bahadur Chand",
                "Dr. Nitesh Raj Pandey",
            ],
        ),
        Unit::new(
            2,
            "Spine",
            &[
                "Dr. Babu Kaji Shrestha",
                "Dr. Ram Krishna Barakoti",
                "Dr. Rajesh Kumar Chaudhary",
                "Dr. Deepak Kaucha",
            ],
        ),
        Unit::new(
            3,
            "Trauma",
            &["Dr. Saroj Rijal", "Dr. Ishor Pradhan", "Dr. Subhash Regmi"],
        ),
        Unit::new(
            5,
            "Sports",
            &[
                "Prof. Dr. Amit Joshi",
                "Dr. Nagmani Singh",
                "Dr. Bibek Basukala",
                "Dr. Rohit Bista",
                "Dr. Rajiv Sharma",
            ],
        ),
        Unit::new(
            6,
            "Hand",
            &[
                "Dr. Om Prasad Shrestha",
                "Dr. Niresh Shrestha",
                "Dr. Santosh Batajoo",
            ],
        ),
    ]
}

/// Giá trị thay thế khi dựng bệnh nhân "ma" từ ghi chú cũ.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GhostDefaults {
    pub name: String,
    pub age_gender: String,
    pub ip_date: String,
}

impl Default for GhostDefaults {
    fn default() -> Self {
        Self {
            name: "Unknown Patient (Left Census)".to_string(),
            age_gender: "N/A".to_string(),
            ip_date: "Unknown".to_string(),
        }
    }
}

/// Cấu hình khoa: danh sách khoa, sơ đồ giường, chính sách hợp nhất.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WardConfig {
    pub units: Vec<Unit>,
    /// Sơ đồ giường chung cho toàn viện.
    pub zone_rules: Vec<ZoneRule>,
    /// Sơ đồ giường riêng theo khoa, ưu tiên hơn sơ đồ chung.
    pub unit_zone_rules: BTreeMap<u32, Vec<ZoneRule>>,
    /// Số ngày đã qua mà ca mổ phiên vẫn còn hiển thị.
    pub elective_lookback_days: u32,
    pub merge_policy: MergePolicy,
    pub ghost: GhostDefaults,
}

impl Default for WardConfig {
    fn default() -> Self {
        Self {
            units: default_units(),
            zone_rules: default_zone_rules(),
            unit_zone_rules: BTreeMap::new(),
            elective_lookback_days: 7,
            merge_policy: MergePolicy::default(),
            ghost: GhostDefaults::default(),
        }
    }
}

impl WardConfig {
    pub fn unit(&self, unit_id: u32) -> Result<&Unit, WardError> {
        self.units
            .iter()
            .find(|unit| unit.id == unit_id)
            .ok_or(WardError::UnknownUnit(unit_id))
    }

    /// Kiểm tra cấu hình đọc từ file hoặc từ trình duyệt.
    pub fn validate(&self) -> Result<(), WardError> {
        let mut ids = std::collections::BTreeSet::new();
        if let Some(unit) = self.units.iter().find(|unit| !ids.insert(unit.id)) {
            return Err(WardError::Config(format!("mã khoa {} bị trùng", unit.id)));
        }
        let all_rules = self
            .zone_rules
            .iter()
            .chain(self.unit_zone_rules.values().flatten());
        for rule in all_rules {
            if rule.name.trim().is_empty() {
                return Err(WardError::Config("khu giường thiếu tên".to_string()));
            }
        }
        Ok(())
    }

    pub fn zone_rules_for(&self, unit_id: u32) -> &[ZoneRule] {
        self.unit_zone_rules
            .get(&unit_id)
            .filter(|rules| !rules.is_empty())
            .map(Vec::as_slice)
            .unwrap_or(&self.zone_rules)
    }
}

/// Nguồn dữ liệu bên ngoài.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Census,
    Edits,
    Transfers,
    Discharges,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SourceKind::Census => "census",
            SourceKind::Edits => "patient_data",
            SourceKind::Transfers => "transfers",
            SourceKind::Discharges => "discharges",
        };
        f.write_str(label)
    }
}

/// Lỗi chung của lõi đối soát.
#[derive(Debug, thiserror::Error)]
pub enum WardError {
    #[error("Dữ liệu đầu vào thiếu thông tin tối thiểu")]
    MissingData,
    #[error("Không đọc được dữ liệu: {0}")]
    Parse(String),
    #[error("Không tìm thấy khoa có mã {0}")]
    UnknownUnit(u32),
    #[error("Cấu hình không hợp lệ: {0}")]
    Config(String),
    #[error("Nguồn {feed} không khả dụng: {reason}")]
    SourceUnavailable { feed: SourceKind, reason: String },
}
