//! Văn bản bàn giao cho sổ tay điện tử và nhóm chat.
//!
//! Dùng dấu `*đậm*` và bố cục dòng cố định; người nhận dán nguyên văn nên bố
//! cục là một phần của hợp đồng.

use std::cmp::Ordering;

use chrono::NaiveDate;

use crate::date::normalize_gregorian;
use crate::MergedPatient;

const SEPARATOR: &str = "----------------------------------------";
const EMPTY_PLAN: &str = "To be decided";

struct Procedure<'a> {
    name: &'a str,
    raw_date: &'a str,
    date: Option<NaiveDate>,
}

/// Thủ thuật chính cộng các lần mổ thêm, mới nhất trước, không có ngày xuống cuối.
fn procedures(patient: &MergedPatient) -> Vec<Procedure<'_>> {
    let primary = (!patient.procedure.trim().is_empty()).then(|| Procedure {
        name: patient.procedure.as_str(),
        raw_date: patient.dop.as_str(),
        date: normalize_gregorian(&patient.dop),
    });

    let mut all: Vec<Procedure<'_>> = primary
        .into_iter()
        .chain(patient.surgeries.iter().map(|surgery| Procedure {
            name: surgery.procedure.as_str(),
            raw_date: surgery.dop.as_str(),
            date: normalize_gregorian(&surgery.dop),
        }))
        .collect();

    all.sort_by(|a, b| match (a.date, b.date) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    all
}

/// Khối văn bản của một bệnh nhân.
///
/// Khi có từ hai thủ thuật, dòng chẩn đoán được thêm tiền tố là thủ thuật gần
/// thứ nhì và ngày hậu phẫu của nó, ví dụ `4POD ORIF for ...`.
pub fn format_one(patient: &MergedPatient, today: NaiveDate) -> String {
    let procedures = procedures(patient);

    let diagnosis_prefix = match procedures.get(1) {
        Some(older) => match older.date.map(|date| today.signed_duration_since(date).num_days()) {
            Some(pod) if pod >= 0 => format!("{pod}POD {} for ", older.name),
            _ => format!("{} for ", older.name),
        },
        None => String::new(),
    };

    let mut lines = vec![
        format!("*Patient Name:* {}", patient.name),
        format!("*Age/Sex:* {}", or_placeholder(&patient.age_gender, "N/A")),
        format!("*Bed:* {}", or_placeholder(&patient.bed_no, "N/A")),
        format!("*Diagnosis:* {diagnosis_prefix}{}", patient.diagnosis),
        String::new(),
        "*Procedure:*".to_string(),
    ];

    if let Some(latest) = procedures.first() {
        let date_line = match latest.date {
            Some(date) => date.format("%d-%b-%Y").to_string(),
            None => latest.raw_date.to_string(),
        };
        if !date_line.is_empty() {
            lines.push(date_line);
        }
        if !latest.name.is_empty() {
            lines.push(latest.name.to_string());
        }
    }

    lines.push(String::new());
    lines.push("*Plan:*".to_string());
    lines.push(or_placeholder(&patient.plan, EMPTY_PLAN).to_string());

    lines.join("\n")
}

/// Phần đầu gồm nhãn, ngày và số bệnh nhân, rồi từng bệnh nhân đánh số từ 1.
pub fn format_many<'a>(
    label: &str,
    patients: impl IntoIterator<Item = &'a MergedPatient>,
    today: NaiveDate,
) -> String {
    let blocks: Vec<String> = patients
        .into_iter()
        .enumerate()
        .map(|(index, patient)| format!("[{}] {}", index + 1, format_one(patient, today)))
        .collect();

    let header = [
        format!("*Consultant:* {label}"),
        format!("*Date:* {}", today.format("%d-%b-%Y")),
        format!("*Total Patients:* {}", blocks.len()),
        SEPARATOR.to_string(),
    ]
    .join("\n");

    let body = blocks.join(&format!("\n\n{SEPARATOR}\n\n"));
    format!("{header}\n\n{body}")
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.trim().is_empty() {
        placeholder
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Surgery;

    fn day(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn operated() -> MergedPatient {
        MergedPatient {
            name: "Ram Bahadur".into(),
            age_gender: "45/M".into(),
            bed_no: "502".into(),
            diagnosis: "Fracture shaft of femur".into(),
            procedure: "Wound debridement".into(),
            dop: "2024-06-04".into(),
            surgeries: vec![Surgery {
                procedure: "External fixation".into(),
                dop: "2024-06-01".into(),
            }],
            ..MergedPatient::default()
        }
    }

    #[test]
    fn pod_prefix_comes_from_second_most_recent_procedure() {
        let text = format_one(&operated(), day(2024, 6, 5));
        assert!(text.contains("*Diagnosis:* 4POD External fixation for Fracture shaft of femur"));
        assert!(text.contains("*Procedure:*\n04-Jun-2024\nWound debridement"));
    }

    #[test]
    fn future_older_procedure_omits_pod() {
        let text = format_one(&operated(), day(2024, 5, 30));
        assert!(text.contains("*Diagnosis:* External fixation for Fracture"));
    }

    #[test]
    fn missing_fields_use_placeholders() {
        let text = format_one(&MergedPatient::default(), day(2024, 6, 5));
        assert_eq!(
            text,
            "*Patient Name:* \n*Age/Sex:* N/A\n*Bed:* N/A\n*Diagnosis:* \n\n*Procedure:*\n\n*Plan:*\nTo be decided"
        );
    }

    #[test]
    fn unparseable_date_is_printed_raw_and_sorted_last() {
        let patient = MergedPatient {
            procedure: "ORIF".into(),
            dop: "next week".into(),
            surgeries: vec![Surgery {
                procedure: "Casting".into(),
                dop: "2024-06-02".into(),
            }],
            ..MergedPatient::default()
        };
        let text = format_one(&patient, day(2024, 6, 5));
        assert!(text.contains("*Procedure:*\n02-Jun-2024\nCasting"));
        assert!(text.contains("*Diagnosis:* ORIF for "));
    }

    #[test]
    fn bulk_text_has_header_and_numbered_blocks() {
        let patients = vec![operated(), operated()];
        let text = format_many("Dr. Saroj Rijal", &patients, day(2024, 6, 5));
        assert!(text.starts_with(
            "*Consultant:* Dr. Saroj Rijal\n*Date:* 05-Jun-2024\n*Total Patients:* 2\n----------------------------------------\n\n[1] *Patient Name:* Ram Bahadur"
        ));
        assert!(text.contains("\n\n----------------------------------------\n\n[2] *Patient Name:*"));
    }
}
