//! Lịch sử theo dõi chỉ số (Hb, dẫn lưu, nhiệt độ...) kèm xu hướng.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::date::normalize;
use crate::TrackingEntry;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Steady,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrackingRow<'a> {
    pub entry: &'a TrackingEntry,
    /// `None` khi không có lần đo cũ hơn của cùng chỉ số.
    pub trend: Option<Trend>,
}

/// Sắp xếp mới nhất trước và so sánh mỗi lần đo với lần đo cũ hơn liền kề
/// của cùng chỉ số. Giá trị không phải số cho `Steady`.
pub fn tracking_history(entries: &[TrackingEntry]) -> Vec<TrackingRow<'_>> {
    let mut ordered: Vec<&TrackingEntry> = entries.iter().collect();
    ordered.sort_by(|a, b| match (normalize(&a.date), normalize(&b.date)) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    ordered
        .iter()
        .enumerate()
        .map(|(index, &entry)| {
            let parameter = entry.parameter.trim();
            let previous = ordered[index + 1..]
                .iter()
                .find(|older| older.parameter.trim().eq_ignore_ascii_case(parameter));
            TrackingRow {
                entry,
                trend: previous.map(|older| trend(&entry.value, &older.value)),
            }
        })
        .collect()
}

fn trend(current: &str, previous: &str) -> Trend {
    match (leading_number(current), leading_number(previous)) {
        (Some(now), Some(before)) if now > before => Trend::Up,
        (Some(now), Some(before)) if now < before => Trend::Down,
        _ => Trend::Steady,
    }
}

/// "12.5 g/dL" -> 12.5
fn leading_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    let end = trimmed
        .char_indices()
        .find(|(idx, c)| !(c.is_ascii_digit() || *c == '.' || (*idx == 0 && *c == '-')))
        .map(|(idx, _)| idx)
        .unwrap_or(trimmed.len());
    trimmed[..end].parse().ok()
}
