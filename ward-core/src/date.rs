//! Chuẩn hóa ngày nhập viện và ngày mổ do người nhập tay.
//!
//! Cùng một cột bảng tính có thể chứa ngày ISO, `DD/MM/YYYY`, `MM/DD/YYYY`,
//! `2024-6-5` không đệm số 0 và ngày Bikram Sambat (`2081/05/12`). Không bao
//! giờ báo lỗi: chuỗi không đọc được thành `None` và bệnh nhân xuống cuối
//! các góc nhìn theo ngày.
//!
//! `03/04/2024` là nhập nhằng. Khi không phần nào lớn hơn 12 thì đọc theo
//! tháng/ngày, mặc định của bảng tính.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Năm từ giá trị này trở lên trong ngày dạng số là năm Bikram Sambat.
pub const BIKRAM_SAMBAT_MIN_YEAR: u32 = 2051;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Calendar {
    Gregorian,
    BikramSambat,
}

/// Ngày đọc từ bảng tính.
///
/// Ngày Bikram Sambat giữ nguyên các phần số và không được quy đổi, nên so
/// sánh với ngày dương lịch chỉ là so `(năm, tháng, ngày)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalDate {
    year: i32,
    month: u32,
    day: u32,
    calendar: Calendar,
}

impl CanonicalDate {
    pub fn gregorian(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
            calendar: Calendar::Gregorian,
        }
    }

    /// Tháng Bikram Sambat có tới 32 ngày.
    pub fn bikram_sambat(year: i32, month: u32, day: u32) -> Option<Self> {
        if !(1..=12).contains(&month) || !(1..=32).contains(&day) {
            return None;
        }
        Some(Self {
            year,
            month,
            day,
            calendar: Calendar::BikramSambat,
        })
    }

    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn as_gregorian(&self) -> Option<NaiveDate> {
        match self.calendar {
            Calendar::Gregorian => NaiveDate::from_ymd_opt(self.year, self.month, self.day),
            Calendar::BikramSambat => None,
        }
    }

    /// Số ngày có dấu từ `today` tới ngày này, dương nếu ở tương lai.
    /// `None` với ngày Bikram Sambat.
    pub fn days_from(&self, today: NaiveDate) -> Option<i64> {
        self.as_gregorian()
            .map(|date| date.signed_duration_since(today).num_days())
    }

    /// `YYYY-MM-DD` đệm số 0, theo lịch của chính ngày đó.
    pub fn iso_string(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }

    /// `dd-MMM-yyyy` cho dương lịch, `YYYY/MM/DD` cho Bikram Sambat.
    pub fn display(&self) -> String {
        match self.as_gregorian() {
            Some(date) => date.format("%d-%b-%Y").to_string(),
            None => format!("{:04}/{:02}/{:02}", self.year, self.month, self.day),
        }
    }
}

impl fmt::Display for CanonicalDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.iso_string())
    }
}

impl From<NaiveDate> for CanonicalDate {
    fn from(date: NaiveDate) -> Self {
        Self::gregorian(date)
    }
}

/// Đọc ngày từ chuỗi tự do. Không panic; chuỗi không đọc được cho `None`.
pub fn normalize(raw: &str) -> Option<CanonicalDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(iso) = iso_prefix(trimmed) {
        return NaiveDate::parse_from_str(iso, "%Y-%m-%d")
            .ok()
            .map(CanonicalDate::gregorian);
    }

    if let Some(parts) = numeric_parts(trimmed, '/') {
        return resolve_numeric_date(parts);
    }

    // "2024-6-5", "2024-06-5 10:00": gạch ngang nhưng không đệm số 0.
    if let Some(parts) = numeric_parts(trimmed, '-') {
        return resolve_numeric_date(parts);
    }

    parse_generic(trimmed).map(CanonicalDate::gregorian)
}

/// [`normalize`] nhưng chỉ nhận dương lịch, cho các phép tính ngày.
pub fn normalize_gregorian(raw: &str) -> Option<NaiveDate> {
    normalize(raw).and_then(|date| date.as_gregorian())
}

fn iso_prefix(value: &str) -> Option<&str> {
    let bytes = value.as_bytes();
    if bytes.len() < 10 {
        return None;
    }
    let shape_ok = bytes[..10].iter().enumerate().all(|(idx, byte)| match idx {
        4 | 7 => *byte == b'-',
        _ => byte.is_ascii_digit(),
    });
    if !shape_ok {
        return None;
    }
    match bytes.get(10) {
        None | Some(b'T') | Some(b't') | Some(b' ') => value.get(..10),
        _ => None,
    }
}

fn numeric_parts(value: &str, separator: char) -> Option<[u32; 3]> {
    let token = value.split_whitespace().next()?;
    let token = token.split(['T', 't']).next()?;
    let parts: Vec<&str> = token.split(separator).collect();
    if parts.len() != 3 {
        return None;
    }
    let mut numbers = [0u32; 3];
    for (slot, part) in numbers.iter_mut().zip(parts) {
        *slot = part.trim().parse().ok()?;
    }
    Some(numbers)
}

fn resolve_numeric_date([first, second, third]: [u32; 3]) -> Option<CanonicalDate> {
    if first >= BIKRAM_SAMBAT_MIN_YEAR {
        return CanonicalDate::bikram_sambat(first as i32, second, third);
    }

    let (year, month, day) = if first > 31 {
        (first, second, third)
    } else if first > 12 {
        (expand_year(third), second, first)
    } else {
        (expand_year(third), first, second)
    };

    NaiveDate::from_ymd_opt(year as i32, month, day).map(CanonicalDate::gregorian)
}

fn expand_year(year: u32) -> u32 {
    if year < 100 {
        2000 + year
    } else {
        year
    }
}

const GENERIC_FORMATS: [&str; 11] = [
    "%d-%b-%Y",
    "%d-%b-%y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%B %d %Y",
    "%a %b %d %Y",
    "%Y.%m.%d",
    "%d.%m.%Y",
];

fn parse_generic(value: &str) -> Option<NaiveDate> {
    if let Some(date) = GENERIC_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
    {
        return Some(date);
    }

    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_rfc2822(value))
        .map(|dt| dt.date_naive())
        .ok()
}
