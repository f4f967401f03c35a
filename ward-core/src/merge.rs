//! Đối soát dòng bảng tính, ghi chú lâm sàng và phiếu chuyển khoa thành một
//! danh sách bệnh nhân.
//!
//! Phép hợp nhất là hàm thuần của ba ảnh chụp và được dựng lại từ đầu sau mỗi
//! thay đổi. Các trường thuộc bảng tính (mã, giường, tên, tuổi/giới, ngày nhập
//! viện, trạng thái) luôn lấy từ dòng bảng tính khi còn dòng đó. Bác sĩ phụ
//! trách lấy từ phiếu chuyển gần nhất nếu có, ngược lại từ bảng tính. Các
//! trường còn lại theo bảng [`EditPrecedence`] của từng trường.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::date::normalize;
use crate::{
    is_sheet_error, CensusRecord, CensusStatus, EditRecord, LifecycleStatus, MergedPatient,
    PatientId, TransferRecord, WardConfig,
};

/// Trường bác sĩ được sửa mà bảng tính cũng có thể mang.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum EditableField {
    InPatNo,
    Department,
    Mobile,
    Diagnosis,
    Procedure,
    Dop,
    Plan,
    NpoStatus,
    Address,
    History,
    Examination,
    Investigation,
    ProgramYear,
    ProgramBlock,
    Domain,
    Level,
}

/// Cách giá trị đã sửa cạnh tranh với giá trị bảng tính của cùng trường.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EditPrecedence {
    /// Chỉ lấy giá trị sửa khi ô bảng tính trống.
    #[default]
    FillIfEmpty,
    /// Lấy giá trị sửa mỗi khi nó không rỗng.
    EditWins,
}

/// Bảng ưu tiên theo trường. Trường không được khai báo dùng
/// [`EditPrecedence::FillIfEmpty`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MergePolicy {
    pub overrides: BTreeMap<EditableField, EditPrecedence>,
}

impl MergePolicy {
    pub fn precedence(&self, field: EditableField) -> EditPrecedence {
        self.overrides.get(&field).copied().unwrap_or_default()
    }

    pub fn with(mut self, field: EditableField, precedence: EditPrecedence) -> Self {
        self.overrides.insert(field, precedence);
        self
    }
}

/// Hợp nhất ba nguồn thành đúng một bệnh nhân cho mỗi mã.
///
/// Bệnh nhân trong bảng tính đứng trước theo thứ tự bảng tính; bệnh nhân "ma"
/// theo sau, xếp theo mã.
pub fn merge(
    census: &[CensusRecord],
    edits: &BTreeMap<PatientId, EditRecord>,
    transfers: &BTreeMap<PatientId, TransferRecord>,
    config: &WardConfig,
) -> Vec<MergedPatient> {
    let mut seen: BTreeSet<&PatientId> = BTreeSet::new();
    let mut merged = Vec::with_capacity(census.len());

    for (row, record) in census.iter().enumerate() {
        if record.hospital_no.is_empty() {
            warn!(row, "skipping census record without hospital number");
            continue;
        }
        if !seen.insert(&record.hospital_no) {
            debug!(hospital_no = %record.hospital_no, row, "duplicate census record ignored");
            continue;
        }

        let mut patient = from_census(record);
        if let Some(transfer) = transfers.get(&record.hospital_no) {
            apply_transfer(&mut patient, transfer);
        }
        if let Some(edit) = edits.get(&record.hospital_no) {
            apply_edit(&mut patient, edit, config);
        }
        merged.push(patient);
    }

    let tracked: BTreeSet<&PatientId> = edits
        .keys()
        .chain(transfers.keys())
        .filter(|id| !seen.contains(id))
        .collect();

    for id in tracked {
        if id.is_empty() {
            warn!("skipping tracked record without hospital number");
            continue;
        }
        merged.push(ghost(id, edits.get(id), transfers.get(id), config));
    }

    merged
}

/// Rút nhật ký chuyển khoa về phiếu mới nhất của mỗi bệnh nhân. Khi trùng
/// thời điểm, phiếu đứng sau thắng.
pub fn latest_transfers(
    records: impl IntoIterator<Item = TransferRecord>,
) -> BTreeMap<PatientId, TransferRecord> {
    let mut latest: BTreeMap<PatientId, TransferRecord> = BTreeMap::new();
    for record in records {
        if record.hospital_no.is_empty() {
            warn!("skipping transfer without hospital number");
            continue;
        }
        match latest.get(&record.hospital_no) {
            Some(existing) if existing.timestamp > record.timestamp => {}
            _ => {
                latest.insert(record.hospital_no.clone(), record);
            }
        }
    }
    latest
}

fn clean(value: &str) -> String {
    if is_sheet_error(value) {
        String::new()
    } else {
        value.to_string()
    }
}

fn usable(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty() && !is_sheet_error(trimmed)).then_some(value)
}

fn from_census(record: &CensusRecord) -> MergedPatient {
    let ip_date = clean(&record.ip_date);
    MergedPatient {
        id: record.hospital_no.clone(),
        admission_date: normalize(&ip_date),
        ip_date,
        in_pat_no: clean(&record.in_pat_no),
        name: clean(&record.name),
        department: clean(&record.department),
        consultant: clean(&record.consultant),
        mobile: clean(&record.mobile),
        age_gender: clean(&record.age_gender),
        bed_no: clean(&record.bed_no),
        diagnosis: clean(&record.diagnosis),
        procedure: clean(&record.procedure),
        npo_status: clean(&record.npo_status),
        // Còn trong bảng tính nghĩa là mọi lần ra viện ghi trong ghi chú bị hủy.
        status: match record.status {
            CensusStatus::Elective => LifecycleStatus::Elective,
            CensusStatus::Admitted => LifecycleStatus::Admitted,
        },
        ..MergedPatient::default()
    }
}

fn apply_transfer(patient: &mut MergedPatient, transfer: &TransferRecord) {
    if let Some(consultant) = usable(&transfer.new_consultant) {
        patient.consultant = consultant.to_string();
    }
    patient.transfer_unit = transfer.unit_id;
}

fn apply_edit(patient: &mut MergedPatient, edit: &EditRecord, config: &WardConfig) {
    let policy = &config.merge_policy;
    let id = &patient.id;
    let slots: [(EditableField, &mut String, &str); 16] = [
        (EditableField::InPatNo, &mut patient.in_pat_no, &edit.in_pat_no),
        (EditableField::Department, &mut patient.department, &edit.department),
        (EditableField::Mobile, &mut patient.mobile, &edit.mobile),
        (EditableField::Diagnosis, &mut patient.diagnosis, &edit.diagnosis),
        (EditableField::Procedure, &mut patient.procedure, &edit.procedure),
        (EditableField::Dop, &mut patient.dop, &edit.dop),
        (EditableField::Plan, &mut patient.plan, &edit.plan),
        (EditableField::NpoStatus, &mut patient.npo_status, &edit.npo_status),
        (EditableField::Address, &mut patient.address, &edit.address),
        (EditableField::History, &mut patient.history, &edit.history),
        (EditableField::Examination, &mut patient.examination, &edit.examination),
        (EditableField::Investigation, &mut patient.investigation, &edit.investigation),
        (EditableField::ProgramYear, &mut patient.program_year, &edit.program_year),
        (EditableField::ProgramBlock, &mut patient.program_block, &edit.program_block),
        (EditableField::Domain, &mut patient.domain, &edit.domain),
        (EditableField::Level, &mut patient.level, &edit.level),
    ];

    for (field, current, edited) in slots {
        if edited.trim().is_empty() {
            continue;
        }
        if is_sheet_error(edited) {
            debug!(hospital_no = %id, ?field, "ignoring edited value carrying a sheet error");
            continue;
        }
        let take = match policy.precedence(field) {
            EditPrecedence::FillIfEmpty => current.trim().is_empty(),
            EditPrecedence::EditWins => true,
        };
        if take {
            *current = edited.to_string();
        }
    }

    if patient.surgeries.is_empty() {
        patient.surgeries = edit
            .surgeries
            .iter()
            .filter(|surgery| usable(&surgery.procedure).is_some())
            .cloned()
            .collect();
    }
    if patient.tracking.is_empty() {
        patient.tracking = edit.tracking.clone();
    }
    if edit.last_updated.is_some() {
        patient.last_updated = edit.last_updated.clone();
    }
}

fn ghost(
    id: &PatientId,
    edit: Option<&EditRecord>,
    transfer: Option<&TransferRecord>,
    config: &WardConfig,
) -> MergedPatient {
    let defaults = &config.ghost;
    let mut patient = MergedPatient {
        id: id.clone(),
        is_ghost: true,
        ..MergedPatient::default()
    };

    if let Some(edit) = edit {
        apply_edit(&mut patient, edit, config);
    }

    let saved = |pick: fn(&EditRecord) -> &str| edit.map(pick).and_then(usable);

    patient.name = saved(|e| e.name.as_str())
        .unwrap_or(defaults.name.as_str())
        .to_string();
    patient.age_gender = saved(|e| e.age_gender.as_str())
        .unwrap_or(defaults.age_gender.as_str())
        .to_string();
    patient.ip_date = saved(|e| e.ip_date.as_str())
        .unwrap_or(defaults.ip_date.as_str())
        .to_string();
    patient.admission_date = normalize(&patient.ip_date);
    patient.bed_no = String::new();
    patient.consultant = transfer
        .and_then(|t| usable(&t.new_consultant))
        .or_else(|| saved(|e| e.consultant.as_str()))
        .unwrap_or_default()
        .to_string();
    patient.status = edit
        .and_then(|e| e.status)
        .unwrap_or(LifecycleStatus::Admitted);

    if let Some(transfer) = transfer {
        patient.transfer_unit = transfer.unit_id;
    }

    patient
}
