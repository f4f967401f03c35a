//! Spreadsheet and document-store JSON to typed ward records.
//!
//! Everything untyped stops here: spreadsheet `values` grids, header-keyed
//! rows and `{id, fields}` documents are converted into `CensusRecord`,
//! `EditRecord`, `TransferRecord` and `DischargeRecord`. Malformed rows are
//! skipped with a warning; only a wrong top-level shape is an error.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use ward_core::date::normalize_gregorian;
use ward_core::{
    is_sheet_error, latest_transfers, CensusRecord, CensusStatus, DischargeRecord, EditRecord,
    LifecycleStatus, PatientId, Surgery, TrackingEntry, TransferRecord, WardError,
};

/// Logical sheet a census row was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetKind {
    /// Admitted census, sheet `Scraped`.
    Admitted,
    /// Elective / pre-op list, sheet `SportsPreop`.
    Elective,
}

impl SheetKind {
    pub fn sheet_name(self) -> &'static str {
        match self {
            SheetKind::Admitted => "Scraped",
            SheetKind::Elective => "SportsPreop",
        }
    }

    pub fn from_sheet_name(name: &str) -> Option<Self> {
        match name.trim() {
            "Scraped" => Some(SheetKind::Admitted),
            "SportsPreop" => Some(SheetKind::Elective),
            _ => None,
        }
    }

    fn status(self) -> CensusStatus {
        match self {
            SheetKind::Admitted => CensusStatus::Admitted,
            SheetKind::Elective => CensusStatus::Elective,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum CensusField {
    IpDate,
    HospitalNo,
    InPatNo,
    Name,
    Department,
    Consultant,
    Mobile,
    AgeGender,
    Age,
    Sex,
    BedNo,
    Diagnosis,
    Procedure,
    NpoStatus,
}

/// Candidate header fragments in priority order, plus the column the field
/// has historically occupied on the admitted sheet.
struct FieldRule {
    field: CensusField,
    candidates: &'static [&'static str],
    admitted_position: Option<usize>,
}

const FIELD_RULES: &[FieldRule] = &[
    FieldRule {
        field: CensusField::IpDate,
        candidates: &["ip-date", "ip date", "admission date", "date"],
        admitted_position: Some(0),
    },
    FieldRule {
        field: CensusField::HospitalNo,
        candidates: &["hospital no", "hospital number", "mrn"],
        admitted_position: Some(1),
    },
    FieldRule {
        field: CensusField::InPatNo,
        candidates: &["inpat no", "inpatient"],
        admitted_position: Some(2),
    },
    FieldRule {
        field: CensusField::Name,
        candidates: &["patient name", "name", "patient"],
        admitted_position: Some(3),
    },
    FieldRule {
        field: CensusField::Department,
        candidates: &["department", "dept"],
        admitted_position: Some(4),
    },
    FieldRule {
        field: CensusField::Consultant,
        candidates: &["consultant", "surgeon"],
        admitted_position: Some(5),
    },
    FieldRule {
        field: CensusField::Mobile,
        candidates: &["contact", "mobile", "phone"],
        admitted_position: Some(6),
    },
    FieldRule {
        field: CensusField::AgeGender,
        candidates: &["age/gender", "age/sex", "age / sex"],
        admitted_position: Some(7),
    },
    FieldRule {
        field: CensusField::Age,
        candidates: &["age"],
        admitted_position: None,
    },
    FieldRule {
        field: CensusField::Sex,
        candidates: &["sex", "gender"],
        admitted_position: None,
    },
    FieldRule {
        field: CensusField::BedNo,
        candidates: &["bed no", "bed"],
        admitted_position: Some(8),
    },
    FieldRule {
        field: CensusField::Diagnosis,
        candidates: &["diagnosis"],
        admitted_position: None,
    },
    FieldRule {
        field: CensusField::Procedure,
        candidates: &["procedure", "surgery"],
        admitted_position: None,
    },
    FieldRule {
        field: CensusField::NpoStatus,
        candidates: &["npo status", "npo", "remark", "instruction"],
        admitted_position: None,
    },
];

/// Lowercase and collapse internal whitespace.
fn normalize_header(header: &str) -> String {
    header
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Columns per logical field for one sheet, in candidate priority order.
/// A blank cell in one column falls through to the next.
#[derive(Debug, Default)]
struct ColumnMap {
    columns: BTreeMap<CensusField, Vec<usize>>,
}

impl ColumnMap {
    fn resolve(headers: &[String], kind: SheetKind, positional: bool) -> Self {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
        let mut columns: BTreeMap<CensusField, Vec<usize>> = BTreeMap::new();

        for rule in FIELD_RULES {
            let mut found: Vec<usize> = Vec::new();
            for candidate in rule.candidates {
                let column = normalized.iter().enumerate().find_map(|(column, header)| {
                    (!found.contains(&column) && !header.is_empty() && header.contains(candidate))
                        .then_some(column)
                });
                if let Some(column) = column {
                    found.push(column);
                }
            }
            columns.insert(rule.field, found);
        }

        // "age" also matches an "age/gender" header; that column is not a bare age.
        let combined = columns
            .get(&CensusField::AgeGender)
            .cloned()
            .unwrap_or_default();
        if let Some(age) = columns.get_mut(&CensusField::Age) {
            age.retain(|column| !combined.contains(column));
        }
        columns.retain(|_, found| !found.is_empty());

        if positional && kind == SheetKind::Admitted {
            let claimed: BTreeSet<usize> = columns.values().flatten().copied().collect();
            for rule in FIELD_RULES {
                let Some(position) = rule.admitted_position else {
                    continue;
                };
                if columns.contains_key(&rule.field)
                    || position >= headers.len()
                    || claimed.contains(&position)
                {
                    continue;
                }
                debug!(field = ?rule.field, position, "header not found, using column position");
                columns.insert(rule.field, vec![position]);
            }
        }

        Self { columns }
    }

    fn cell<'r>(&self, row: &'r [String], field: CensusField) -> &'r str {
        self.columns
            .get(&field)
            .into_iter()
            .flatten()
            .filter_map(|column| row.get(*column))
            .map(|value| value.trim())
            .find(|value| !value.is_empty() && !is_sheet_error(value))
            .unwrap_or_default()
    }

    fn record(&self, row: &[String], kind: SheetKind) -> Option<CensusRecord> {
        let hospital_no = PatientId::new(self.cell(row, CensusField::HospitalNo))?;

        let age_gender = match self.cell(row, CensusField::AgeGender) {
            "" => compose_age_gender(
                self.cell(row, CensusField::Age),
                self.cell(row, CensusField::Sex),
            ),
            combined => combined.to_string(),
        };

        Some(CensusRecord {
            hospital_no,
            ip_date: self.cell(row, CensusField::IpDate).to_string(),
            in_pat_no: self.cell(row, CensusField::InPatNo).to_string(),
            name: self.cell(row, CensusField::Name).to_string(),
            department: self.cell(row, CensusField::Department).to_string(),
            consultant: self.cell(row, CensusField::Consultant).to_string(),
            mobile: self.cell(row, CensusField::Mobile).to_string(),
            age_gender,
            bed_no: self.cell(row, CensusField::BedNo).to_string(),
            diagnosis: self.cell(row, CensusField::Diagnosis).to_string(),
            procedure: self.cell(row, CensusField::Procedure).to_string(),
            npo_status: self.cell(row, CensusField::NpoStatus).to_string(),
            status: kind.status(),
        })
    }
}

fn compose_age_gender(age: &str, sex: &str) -> String {
    match (age.is_empty(), sex.is_empty()) {
        (true, _) => String::new(),
        (false, true) => age.to_string(),
        (false, false) => format!("{age}/{sex}"),
    }
}

/// Read census rows from a grid whose first row is the header.
pub fn census_from_rows(rows: &[Vec<String>], kind: SheetKind) -> Vec<CensusRecord> {
    read_grid(rows, kind, true)
}

fn read_grid(rows: &[Vec<String>], kind: SheetKind, positional: bool) -> Vec<CensusRecord> {
    let Some((headers, body)) = rows.split_first() else {
        return Vec::new();
    };
    let columns = ColumnMap::resolve(headers, kind, positional);

    body.iter()
        .enumerate()
        .filter(|(_, row)| row.iter().any(|cell| !cell.trim().is_empty()))
        .filter_map(|(index, row)| {
            let record = columns.record(row, kind);
            if record.is_none() {
                warn!(
                    sheet = kind.sheet_name(),
                    row = index + 2,
                    "skipping census row without hospital number"
                );
            }
            record
        })
        .collect()
}

/// Read census rows from a spreadsheet `values` response (`{"values": [[..]]}`)
/// or a bare array of rows.
pub fn census_from_values(value: &Value, kind: SheetKind) -> Result<Vec<CensusRecord>, WardError> {
    let grid = value
        .get("values")
        .unwrap_or(value)
        .as_array()
        .ok_or_else(|| {
            WardError::Parse(format!("{} is not a grid of rows", kind.sheet_name()))
        })?;

    let rows: Vec<Vec<String>> = grid
        .iter()
        .map(|row| {
            row.as_array()
                .map(|cells| cells.iter().map(cell_text).collect())
                .unwrap_or_default()
        })
        .collect();

    Ok(census_from_rows(&rows, kind))
}

/// Read census rows from header-keyed objects (`[{"Patient Name": ..}, ..]`).
/// Column order carries no meaning here, so there is no positional fallback.
pub fn census_from_keyed_rows(
    value: &Value,
    kind: SheetKind,
) -> Result<Vec<CensusRecord>, WardError> {
    let objects = value.as_array().ok_or_else(|| {
        WardError::Parse(format!("{} is not an array of rows", kind.sheet_name()))
    })?;

    let mut headers: Vec<String> = Vec::new();
    for object in objects.iter().filter_map(Value::as_object) {
        for key in object.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let mut rows = Vec::with_capacity(objects.len() + 1);
    rows.push(headers.clone());
    for object in objects.iter().filter_map(Value::as_object) {
        rows.push(
            headers
                .iter()
                .map(|header| object.get(header).map(cell_text).unwrap_or_default())
                .collect(),
        );
    }

    Ok(read_grid(&rows, kind, false))
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        _ => String::new(),
    }
}

fn text(fields: &Map<String, Value>, key: &str) -> String {
    fields.get(key).map(cell_text).unwrap_or_default()
}

/// `{id, fields}` document, or a flat object whose own keys are the fields.
fn split_document(document: &Value) -> Option<(Option<&str>, &Map<String, Value>)> {
    let object = document.as_object()?;
    let id = object.get("id").and_then(Value::as_str);
    match object.get("fields").and_then(Value::as_object) {
        Some(fields) => Some((id, fields)),
        None => Some((id, object)),
    }
}

fn documents<'v>(value: &'v Value, collection: &str) -> Result<&'v Vec<Value>, WardError> {
    value
        .as_array()
        .ok_or_else(|| WardError::Parse(format!("{collection} is not an array of documents")))
}

/// `patient_data` documents keyed by identity. The document id is the
/// identity; a `hospitalNo` field is used when the id is missing.
pub fn edits_from_documents(value: &Value) -> Result<BTreeMap<PatientId, EditRecord>, WardError> {
    let mut edits = BTreeMap::new();
    for (index, document) in documents(value, "patient_data")?.iter().enumerate() {
        let Some((id, fields)) = split_document(document) else {
            warn!(index, "skipping patient_data entry that is not an object");
            continue;
        };
        let identity = id
            .and_then(PatientId::new)
            .or_else(|| PatientId::new(text(fields, "hospitalNo")));
        let Some(identity) = identity else {
            warn!(index, "skipping patient_data document without identity");
            continue;
        };
        edits.insert(identity, edit_from_fields(fields));
    }
    Ok(edits)
}

fn edit_from_fields(fields: &Map<String, Value>) -> EditRecord {
    let surgeries = fields
        .get("surgeries")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(|item| Surgery {
                    procedure: text(item, "procedure"),
                    dop: text(item, "dop"),
                })
                .collect()
        })
        .unwrap_or_default();

    let tracking = fields
        .get("tracking")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(|item| TrackingEntry {
                    id: text(item, "id"),
                    date: text(item, "date"),
                    parameter: text(item, "parameter"),
                    value: text(item, "value"),
                })
                .collect()
        })
        .unwrap_or_default();

    let status_text = text(fields, "status");
    let status = LifecycleStatus::parse(&status_text);
    if status.is_none() && !status_text.is_empty() {
        debug!(status = %status_text, "ignoring unknown lifecycle status");
    }

    EditRecord {
        name: text(fields, "name"),
        age_gender: text(fields, "ageGender"),
        bed_no: text(fields, "bedNo"),
        consultant: text(fields, "consultant"),
        ip_date: text(fields, "ipDate"),
        in_pat_no: text(fields, "inPatNo"),
        department: text(fields, "department"),
        mobile: text(fields, "mobile"),
        diagnosis: text(fields, "diagnosis"),
        procedure: text(fields, "procedure"),
        dop: text(fields, "dop"),
        surgeries,
        plan: text(fields, "plan"),
        npo_status: text(fields, "npoStatus"),
        address: text(fields, "address"),
        history: text(fields, "history"),
        examination: text(fields, "examination"),
        investigation: text(fields, "investigation"),
        program_year: text(fields, "programYear"),
        program_block: text(fields, "programBlock"),
        domain: text(fields, "domain"),
        level: text(fields, "level"),
        tracking,
        status,
        last_updated: Some(text(fields, "lastUpdated")).filter(|value| !value.is_empty()),
    }
}

fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(raw) => DateTime::parse_from_rfc3339(raw.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                normalize_gregorian(raw)
                    .map(|day| day.and_time(chrono::NaiveTime::MIN).and_utc())
            }),
        Value::Number(millis) => millis
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    }
}

fn parse_unit_id(value: Option<&Value>) -> Option<u32> {
    match value? {
        Value::Number(number) => number.as_u64().and_then(|id| u32::try_from(id).ok()),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

/// Full `transfers` log in document order. The join key is the `hospitalNo`
/// field; the document id is only a log-entry id.
pub fn transfers_from_documents(value: &Value) -> Result<Vec<TransferRecord>, WardError> {
    let mut transfers = Vec::new();
    for (index, document) in documents(value, "transfers")?.iter().enumerate() {
        let Some((_, fields)) = split_document(document) else {
            warn!(index, "skipping transfer entry that is not an object");
            continue;
        };
        let Some(hospital_no) = PatientId::new(text(fields, "hospitalNo")) else {
            warn!(index, "skipping transfer without hospitalNo");
            continue;
        };
        transfers.push(TransferRecord {
            hospital_no,
            new_consultant: text(fields, "newConsultant"),
            unit_id: parse_unit_id(fields.get("unitId")),
            timestamp: parse_timestamp(fields.get("timestamp")),
        });
    }
    Ok(transfers)
}

/// `discharges` documents. The frozen form is stored flat next to
/// `hospitalNo`, `timestamp` and `unitId`.
pub fn discharges_from_documents(value: &Value) -> Result<Vec<DischargeRecord>, WardError> {
    let mut discharges = Vec::new();
    for (index, document) in documents(value, "discharges")?.iter().enumerate() {
        let Some((_, fields)) = split_document(document) else {
            warn!(index, "skipping discharge entry that is not an object");
            continue;
        };
        let mut record: DischargeRecord =
            match serde_json::from_value(Value::Object(fields.clone())) {
                Ok(record) => record,
                Err(err) => {
                    warn!(index, error = %err, "skipping malformed discharge document");
                    continue;
                }
            };
        if record.hospital_no.is_empty() {
            match PatientId::new(&record.form.in_patient_id) {
                Some(id) => record.hospital_no = id,
                None => {
                    warn!(index, "skipping discharge without hospitalNo");
                    continue;
                }
            }
        }
        discharges.push(record);
    }
    Ok(discharges)
}

/// Every source the merge needs, already typed.
#[derive(Debug, Clone, Default)]
pub struct SourceBundle {
    /// Admitted sheet rows first, then the elective list.
    pub census: Vec<CensusRecord>,
    pub edits: BTreeMap<PatientId, EditRecord>,
    /// Newest transfer per identity.
    pub transfers: BTreeMap<PatientId, TransferRecord>,
    pub discharges: Vec<DischargeRecord>,
}

/// Load a combined snapshot from a JSON string.
pub fn load_snapshot_str(snapshot_json: &str) -> Result<SourceBundle, WardError> {
    let value: Value =
        serde_json::from_str(snapshot_json).map_err(|err| WardError::Parse(err.to_string()))?;
    load_snapshot_value(&value)
}

/// Load a combined snapshot:
///
/// ```json
/// {
///   "sheets": { "Scraped": {"values": [[..]]}, "SportsPreop": {"values": [[..]]} },
///   "patient_data": [{"id": "H1", "fields": {..}}],
///   "transfers": [{"id": "t1", "fields": {"hospitalNo": "H1", ..}}],
///   "discharges": [..]
/// }
/// ```
///
/// Every section is optional; a snapshot with none of them is `MissingData`.
pub fn load_snapshot_value(snapshot: &Value) -> Result<SourceBundle, WardError> {
    let object = snapshot
        .as_object()
        .ok_or_else(|| WardError::Parse("snapshot must be a JSON object".to_string()))?;

    if !["sheets", "patient_data", "transfers", "discharges"]
        .iter()
        .any(|key| object.contains_key(*key))
    {
        return Err(WardError::MissingData);
    }

    let mut bundle = SourceBundle::default();

    if let Some(sheets) = object.get("sheets") {
        let sheets = sheets
            .as_object()
            .ok_or_else(|| WardError::Parse("sheets must be an object".to_string()))?;
        for kind in [SheetKind::Admitted, SheetKind::Elective] {
            if let Some(sheet) = sheets.get(kind.sheet_name()) {
                let records = if sheet.get("values").is_some()
                    || sheet.as_array().and_then(|rows| rows.first()).is_some_and(Value::is_array)
                {
                    census_from_values(sheet, kind)?
                } else {
                    census_from_keyed_rows(sheet, kind)?
                };
                bundle.census.extend(records);
            }
        }
        for name in sheets.keys() {
            if SheetKind::from_sheet_name(name).is_none() {
                debug!(sheet = %name, "ignoring unknown sheet");
            }
        }
    }

    if let Some(edits) = object.get("patient_data") {
        bundle.edits = edits_from_documents(edits)?;
    }
    if let Some(transfers) = object.get("transfers") {
        bundle.transfers = latest_transfers(transfers_from_documents(transfers)?);
    }
    if let Some(discharges) = object.get("discharges") {
        bundle.discharges = discharges_from_documents(discharges)?;
    }

    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect()
    }

    #[test]
    fn headers_match_fuzzily() {
        let rows = grid(&[
            &["IP-Date", "Hospital  No.", "Patient Name", "Age", "Sex", "Bed No", "Consultant"],
            &["2024-06-01", "H1", "Ram", "45", "M", "502", "Dr. Saroj Rijal"],
        ]);
        let records = census_from_rows(&rows, SheetKind::Elective);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.hospital_no.as_str(), "H1");
        assert_eq!(record.name, "Ram");
        assert_eq!(record.age_gender, "45/M");
        assert_eq!(record.bed_no, "502");
        assert_eq!(record.status, CensusStatus::Elective);
    }

    #[test]
    fn admitted_sheet_falls_back_to_positions() {
        let rows = grid(&[
            &["A", "B", "C", "D", "E", "F", "G", "H", "I"],
            &["2024-06-01", "H7", "IP-9", "Sita", "Ortho", "Dr. X", "98", "30/F", "ICU-2"],
        ]);
        let records = census_from_rows(&rows, SheetKind::Admitted);
        assert_eq!(records[0].hospital_no.as_str(), "H7");
        assert_eq!(records[0].age_gender, "30/F");
        assert_eq!(records[0].bed_no, "ICU-2");
    }

    #[test]
    fn error_cells_are_empty_and_rows_without_identity_are_skipped() {
        let rows = grid(&[
            &["Hospital No", "Name", "Diagnosis"],
            &["#N/A", "Ghost row", ""],
            &["H2", "#REF!", "Fracture"],
            &["", "", ""],
        ]);
        let records = census_from_rows(&rows, SheetKind::Elective);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "");
        assert_eq!(records[0].diagnosis, "Fracture");
    }

    #[test]
    fn position_fallback_skips_columns_claimed_by_headers() {
        let rows = grid(&[
            &["Hospital No", "Patient Name", "Bed No", "Consultant"],
            &["H1", "Ram", "502", "Dr. Saroj Rijal"],
        ]);
        let records = census_from_rows(&rows, SheetKind::Admitted);
        let record = &records[0];
        assert_eq!(record.hospital_no.as_str(), "H1");
        assert_eq!(record.ip_date, "");
        assert_eq!(record.in_pat_no, "");
        assert_eq!(record.name, "Ram");
        assert_eq!(record.bed_no, "502");
        assert_eq!(record.consultant, "Dr. Saroj Rijal");
    }

    #[test]
    fn renamed_date_header_uses_its_unclaimed_position() {
        let rows = grid(&[
            &["Admitted On", "Hospital No", "Patient Name"],
            &["2024-06-01", "H1", "Ram"],
        ]);
        let records = census_from_rows(&rows, SheetKind::Admitted);
        assert_eq!(records[0].ip_date, "2024-06-01");
        assert_eq!(records[0].name, "Ram");
    }

    #[test]
    fn blank_cell_falls_through_to_next_candidate_column() {
        let rows = grid(&[
            &["Hospital No", "Patient Name", "Name", "Contact", "Phone"],
            &["H1", "", "Sita", "#N/A", "9841000000"],
            &["H2", "Hari", "Ignored", "", ""],
        ]);
        let records = census_from_rows(&rows, SheetKind::Elective);
        assert_eq!(records[0].name, "Sita");
        assert_eq!(records[0].mobile, "9841000000");
        assert_eq!(records[1].name, "Hari");
        assert_eq!(records[1].mobile, "");
    }

    #[test]
    fn keyed_rows_and_numeric_cells() {
        let value = json!([{"Hospital No": 1234, "Patient Name": "Hari", "Bed": 502}]);
        let records = census_from_keyed_rows(&value, SheetKind::Admitted).unwrap();
        assert_eq!(records[0].hospital_no.as_str(), "1234");
        assert_eq!(records[0].bed_no, "502");
    }

    #[test]
    fn edit_documents_use_id_then_hospital_no() {
        let value = json!([
            {"id": "H1", "fields": {"plan": "Physio", "status": "discharged"}},
            {"fields": {"hospitalNo": "H2", "surgeries": [{"procedure": "ORIF", "dop": "2024-06-01"}]}},
            {"fields": {"plan": "orphan"}}
        ]);
        let edits = edits_from_documents(&value).unwrap();
        assert_eq!(edits.len(), 2);
        let first = &edits[&PatientId::new("H1").unwrap()];
        assert_eq!(first.plan, "Physio");
        assert_eq!(first.status, Some(LifecycleStatus::Discharged));
        assert_eq!(edits[&PatientId::new("H2").unwrap()].surgeries.len(), 1);
    }

    #[test]
    fn transfers_keep_full_log_and_parse_timestamps() {
        let value = json!([
            {"id": "t1", "fields": {"hospitalNo": "H1", "newConsultant": "Dr. A", "unitId": 3, "timestamp": "2024-06-01T10:00:00Z"}},
            {"id": "t2", "fields": {"hospitalNo": "H1", "newConsultant": "Dr. B", "unitId": "5", "timestamp": "2024-06-02T10:00:00Z"}},
            {"id": "t3", "fields": {"newConsultant": "Dr. C"}}
        ]);
        let log = transfers_from_documents(&value).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].unit_id, Some(5));

        let latest = latest_transfers(log);
        assert_eq!(latest[&PatientId::new("H1").unwrap()].new_consultant, "Dr. B");
    }

    #[test]
    fn snapshot_shape_errors() {
        assert!(matches!(load_snapshot_str("[]"), Err(WardError::Parse(_))));
        assert!(matches!(load_snapshot_str("{}"), Err(WardError::MissingData)));
        assert!(matches!(load_snapshot_str("not json"), Err(WardError::Parse(_))));
    }
}
