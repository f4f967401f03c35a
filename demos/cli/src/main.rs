use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;
use ward_core::date::normalize_gregorian;
use ward_core::{
    consultant_initials, discharge_log, format_many, merge, search, Clock, DischargeRecord,
    MergedPatient, PatientSort, ProjectedView, SortDirection, SystemClock, ViewProjector,
    ViewSpec, WardConfig,
};
use ward_sheets::load_snapshot_str;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ViewArg {
    Unit,
    BedZones,
    Consultants,
    AdmissionDate,
    AdmissionDateGroups,
    Elective,
    ElectiveByDate,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    /// Bảng tóm tắt theo nhóm.
    Summary,
    /// Văn bản bàn giao dán vào nhóm chat.
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "ward-cli",
    about = "Đối soát danh sách bệnh nhân khoa từ ảnh chụp JSON và in góc nhìn."
)]
struct Args {
    /// Đường dẫn tới file JSON ảnh chụp (sheets, patient_data, transfers, discharges).
    #[arg(short, long)]
    input: PathBuf,

    /// File JSON cấu hình khoa; thiếu khóa nào dùng mặc định khóa đó.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "unit")]
    view: ViewArg,

    /// Mã khoa cho các góc nhìn theo khoa.
    #[arg(short, long)]
    unit: Option<u32>,

    #[arg(long, value_enum, default_value = "summary")]
    format: OutputFormat,

    /// Ngày hiện tại (YYYY-MM-DD), mặc định là hôm nay.
    #[arg(long)]
    today: Option<String>,

    /// Chỉ giữ bệnh nhân khớp chuỗi tìm kiếm.
    #[arg(long)]
    search: Option<String>,

    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let data = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Không đọc được file {:?}", args.input))?;
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => WardConfig::default(),
    };
    let today = match args.today.as_deref() {
        Some(raw) => normalize_gregorian(raw)
            .with_context(|| format!("Ngày không hợp lệ: {raw}"))?,
        None => SystemClock.today(),
    };

    let bundle = load_snapshot_str(&data)?;
    let merged = merge(&bundle.census, &bundle.edits, &bundle.transfers, &config);
    tracing::info!(
        census = bundle.census.len(),
        patients = merged.len(),
        ghosts = merged.iter().filter(|p| p.is_ghost).count(),
        "merged snapshot"
    );

    let patients: Vec<MergedPatient> = match &args.search {
        Some(query) => search(&merged, query).into_iter().cloned().collect(),
        None => merged,
    };

    let spec = view_spec(args.view, args.unit)?;
    let view = ViewProjector::new(&config, today).project(&patients, &spec)?;

    match args.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&view).context("Không serialize góc nhìn")?
            );
        }
        OutputFormat::Text => {
            let label = match spec_unit(&spec) {
                Some(unit_id) => config.unit(unit_id)?.name.clone(),
                None => view_label(args.view).to_string(),
            };
            println!("{}", format_many(&label, view.patients(), today));
        }
        OutputFormat::Summary => print_summary(&view, &bundle.discharges),
    }

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<WardConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Không đọc được file cấu hình {path:?}"))?;
    let config: WardConfig = serde_json::from_str(&raw)
        .with_context(|| format!("Cấu hình không hợp lệ: {path:?}"))?;
    config.validate()?;
    Ok(config)
}

fn view_spec(view: ViewArg, unit: Option<u32>) -> anyhow::Result<ViewSpec> {
    let unit_id = || match unit {
        Some(unit_id) => Ok(unit_id),
        None => bail!("Góc nhìn {view:?} cần --unit"),
    };
    Ok(match view {
        ViewArg::Unit => ViewSpec::Unit { unit_id: unit_id()? },
        ViewArg::BedZones => ViewSpec::BedZones { unit_id: unit_id()? },
        ViewArg::Consultants => ViewSpec::Consultants {
            unit_id: unit_id()?,
            sort: PatientSort::Bed,
        },
        ViewArg::AdmissionDate => ViewSpec::AdmissionDate,
        ViewArg::AdmissionDateGroups => ViewSpec::AdmissionDateGroups,
        ViewArg::Elective => ViewSpec::Elective {
            consultant_sort: Some(SortDirection::Ascending),
        },
        ViewArg::ElectiveByDate => ViewSpec::ElectiveByDate {
            consultant_sort: Some(SortDirection::Ascending),
        },
    })
}

fn spec_unit(spec: &ViewSpec) -> Option<u32> {
    match spec {
        ViewSpec::Unit { unit_id }
        | ViewSpec::BedZones { unit_id }
        | ViewSpec::Consultants { unit_id, .. } => Some(*unit_id),
        _ => None,
    }
}

fn view_label(view: ViewArg) -> &'static str {
    match view {
        ViewArg::AdmissionDate | ViewArg::AdmissionDateGroups => "All Admitted",
        ViewArg::Elective | ViewArg::ElectiveByDate => "Elective List",
        _ => "Unit",
    }
}

fn print_patient(patient: &MergedPatient) {
    let bed = if patient.bed_no.is_empty() {
        "-"
    } else {
        patient.bed_no.as_str()
    };
    let ghost = if patient.is_ghost { " (ngoài danh sách)" } else { "" };
    println!(
        "  {bed:<8} {:<10} {:<28} [{}]{ghost}",
        patient.id.as_str(),
        patient.name,
        consultant_initials(&patient.consultant)
    );
}

fn print_summary(view: &ProjectedView<'_>, discharges: &[DischargeRecord]) {
    match view {
        ProjectedView::List(patients) => patients.iter().for_each(|p| print_patient(p)),
        ProjectedView::Groups(groups) => {
            for group in groups {
                println!("{} ({})", group.label, group.patients.len());
                group.patients.iter().for_each(|p| print_patient(p));
            }
        }
    }
    println!("Tổng: {} bệnh nhân", view.len());

    let log = discharge_log(discharges);
    if !log.is_empty() {
        println!("\nRa viện gần đây:");
        for record in log.iter().take(5) {
            let at = record
                .timestamp
                .map(|ts| ts.format("%d-%b-%Y %H:%M").to_string())
                .unwrap_or_else(|| "?".to_string());
            println!(
                "  {at:<18} {:<10} {}",
                record.hospital_no.as_str(),
                record.form.patient_name
            );
        }
    }
}
