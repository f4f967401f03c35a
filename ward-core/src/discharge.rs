//! Phiếu ra viện: điền sẵn từ bệnh nhân đã hợp nhất và nhật ký ra viện.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{CensusRecord, MergedPatient, PatientId};

/// Nội dung phiếu ra viện gửi sang sổ tay điện tử.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DischargeDraft {
    pub program_year: String,
    pub program_block: String,
    pub domain: String,
    pub level: String,
    /// Các thủ thuật nối bằng " + ".
    pub procedure_name: String,
    pub procedure_description: String,
    /// Ngày lập phiếu, `YYYY-MM-DD`.
    pub date: String,
    pub in_patient_id: String,
    pub patient_name: String,
    pub age: String,
    pub address: String,
    pub history: String,
    /// Khám lâm sàng.
    pub diagnosis: String,
    pub investigation: String,
    pub provisional_diagnosis: String,
    pub final_diagnosis: String,
    pub management: String,
    pub follow_up: String,
    pub submitted_to: Vec<String>,
}

impl DischargeDraft {
    pub fn from_patient(patient: &MergedPatient, today: NaiveDate) -> Self {
        let surgeries = patient
            .surgeries
            .iter()
            .filter(|surgery| !surgery.procedure.trim().is_empty());

        let procedure_name = non_empty(&patient.procedure)
            .into_iter()
            .map(str::to_string)
            .chain(surgeries.clone().map(|surgery| surgery.procedure.clone()))
            .collect::<Vec<_>>()
            .join(" + ");

        let performed = non_empty(&patient.procedure)
            .into_iter()
            .map(str::to_string)
            .chain(surgeries.map(|surgery| format!("{} ({})", surgery.procedure, surgery.dop)))
            .collect::<Vec<_>>()
            .join(", ");

        let management = match (performed.is_empty(), non_empty(&patient.plan)) {
            (true, plan) => plan.unwrap_or_default().to_string(),
            (false, Some(plan)) => format!("Procedure: {performed}\n\n{plan}"),
            (false, None) => format!("Procedure: {performed}"),
        };

        Self {
            program_year: patient.program_year.clone(),
            program_block: patient.program_block.clone(),
            domain: patient.domain.clone(),
            level: patient.level.clone(),
            procedure_name,
            date: today.format("%Y-%m-%d").to_string(),
            in_patient_id: patient.id.to_string(),
            patient_name: patient.name.clone(),
            age: age_years(&patient.age_gender),
            address: patient.address.clone(),
            history: patient.history.clone(),
            diagnosis: patient.examination.clone(),
            investigation: patient.investigation.clone(),
            provisional_diagnosis: patient.diagnosis.clone(),
            final_diagnosis: patient.diagnosis.clone(),
            management,
            ..Self::default()
        }
    }
}

/// Bản lưu cố định của bệnh nhân tại thời điểm ra viện (bộ sưu tập `discharges`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DischargeRecord {
    pub hospital_no: PatientId,
    #[serde(flatten)]
    pub form: DischargeDraft,
    pub patient: MergedPatient,
    pub timestamp: Option<DateTime<Utc>>,
    pub unit_id: Option<u32>,
}

impl DischargeRecord {
    pub fn new(
        patient: &MergedPatient,
        form: DischargeDraft,
        at: DateTime<Utc>,
        unit_id: Option<u32>,
    ) -> Self {
        Self {
            hospital_no: patient.id.clone(),
            form,
            patient: patient.clone(),
            timestamp: Some(at),
            unit_id,
        }
    }
}

/// Nhật ký ra viện, mới nhất trước; bản ghi thiếu thời điểm xuống cuối.
pub fn discharge_log(records: &[DischargeRecord]) -> Vec<&DischargeRecord> {
    let mut log: Vec<&DischargeRecord> = records.iter().collect();
    log.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    log
}

/// Bệnh nhân xuất hiện lại trong bảng tính coi như đã hủy ra viện.
pub fn is_discharge_reverted(record: &DischargeRecord, census: &[CensusRecord]) -> bool {
    census.iter().any(|row| row.hospital_no == record.hospital_no)
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// "34/M" -> "34", "34 Y / F" -> "34".
fn age_years(age_gender: &str) -> String {
    age_gender
        .split('/')
        .next()
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Surgery;
    use chrono::TimeZone;

    fn patient() -> MergedPatient {
        MergedPatient {
            id: PatientId::new("H42").unwrap(),
            name: "Sita Kumari".into(),
            age_gender: "34 Y/F".into(),
            diagnosis: "Distal radius fracture".into(),
            procedure: "CRPP".into(),
            plan: "Check X-ray".into(),
            surgeries: vec![Surgery {
                procedure: "K-wire removal".into(),
                dop: "2024-07-01".into(),
            }],
            ..MergedPatient::default()
        }
    }

    #[test]
    fn draft_prefills_procedures_and_management() {
        let today = NaiveDate::from_ymd_opt(2024, 7, 3).unwrap();
        let draft = DischargeDraft::from_patient(&patient(), today);
        assert_eq!(draft.procedure_name, "CRPP + K-wire removal");
        assert_eq!(
            draft.management,
            "Procedure: CRPP, K-wire removal (2024-07-01)\n\nCheck X-ray"
        );
        assert_eq!(draft.age, "34");
        assert_eq!(draft.in_patient_id, "H42");
        assert_eq!(draft.date, "2024-07-03");
        assert_eq!(draft.final_diagnosis, "Distal radius fracture");
    }

    #[test]
    fn draft_without_procedures_keeps_plan_only() {
        let bare = MergedPatient {
            plan: "Physio".into(),
            ..MergedPatient::default()
        };
        let today = NaiveDate::from_ymd_opt(2024, 7, 3).unwrap();
        assert_eq!(DischargeDraft::from_patient(&bare, today).management, "Physio");
    }

    #[test]
    fn log_is_newest_first_and_revert_follows_census() {
        let p = patient();
        let form = DischargeDraft::default();
        let at = |day| Utc.with_ymd_and_hms(2024, 7, day, 9, 0, 0).unwrap();
        let older = DischargeRecord::new(&p, form.clone(), at(1), Some(6));
        let newer = DischargeRecord::new(&p, form, at(2), Some(6));
        let records = vec![older, newer];

        let log = discharge_log(&records);
        assert_eq!(log[0].timestamp, records[1].timestamp);

        let census = vec![CensusRecord {
            hospital_no: PatientId::new("H42").unwrap(),
            ..CensusRecord::default()
        }];
        assert!(is_discharge_reverted(&records[0], &census));
        assert!(!is_discharge_reverted(&records[0], &[]));
    }
}
