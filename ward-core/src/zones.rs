//! Phân loại số giường vào khu giường.
//!
//! Luật được duyệt ba lượt trên danh sách cấu hình: số giường cụ thể trước,
//! rồi chuỗi con, rồi tiền tố kèm danh sách loại trừ của chính nó. Luật khớp
//! đầu tiên thắng. Giường cụ thể đi trước để "527-529 thuộc 5C" thắng luật
//! rộng hơn "52x là 5B".

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Khu cho số giường không rỗng nhưng không khớp luật nào.
pub const FALLBACK_ZONE: &str = "General Ward";
/// Khu cho bệnh nhân chưa có số giường.
pub const UNASSIGNED_ZONE: &str = "Unassigned";

/// Một khu có tên trong sơ đồ khoa. Một luật có thể gộp nhiều cách so khớp.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ZoneRule {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
    /// Giường bị bỏ qua khi so tiền tố của luật này.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    /// Giường thuộc hẳn về khu này.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub specific: Vec<String>,
}

impl ZoneRule {
    pub fn prefix(name: &str, prefix: &str) -> Self {
        Self {
            name: name.to_string(),
            prefix: Some(prefix.to_string()),
            ..Self::default()
        }
    }

    pub fn contains(name: &str, needle: &str) -> Self {
        Self {
            name: name.to_string(),
            contains: Some(needle.to_string()),
            ..Self::default()
        }
    }

    pub fn specific(name: &str, beds: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            specific: beds.iter().map(|bed| bed.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn excluding(mut self, beds: &[&str]) -> Self {
        self.exclude = beds.iter().map(|bed| bed.to_string()).collect();
        self
    }

    fn matches_specific(&self, base: &str) -> bool {
        self.specific
            .iter()
            .any(|bed| bed.trim().eq_ignore_ascii_case(base))
    }

    fn matches_substring(&self, bed: &str) -> bool {
        self.contains
            .as_deref()
            .map(str::trim)
            .filter(|needle| !needle.is_empty())
            .is_some_and(|needle| bed.contains(&needle.to_uppercase()))
    }

    fn matches_prefix(&self, bed: &str, base: &str) -> bool {
        let Some(prefix) = self
            .prefix
            .as_deref()
            .map(str::trim)
            .filter(|prefix| !prefix.is_empty())
        else {
            return false;
        };
        bed.starts_with(&prefix.to_uppercase())
            && !self
                .exclude
                .iter()
                .any(|excluded| excluded.trim().eq_ignore_ascii_case(base))
    }
}

/// Sơ đồ mặc định khi cả khoa lẫn bệnh viện đều chưa cấu hình.
pub fn default_zone_rules() -> Vec<ZoneRule> {
    vec![
        // Nhà cũ
        ZoneRule::prefix("5A", "50"),
        ZoneRule::prefix("5B", "52").excluding(&["527", "528", "529"]),
        ZoneRule::specific("5C", &["527", "528", "529"]),
        ZoneRule::prefix("4A (MHCU)", "40"),
        ZoneRule::prefix("Cubicle", "41"),
        ZoneRule::prefix("Neuro (ASU)", "42"),
        ZoneRule::prefix("3A", "30"),
        ZoneRule::prefix("3B", "31"),
        ZoneRule::contains("POW", "POW"),
        ZoneRule::prefix("1st Floor", "10"),
        ZoneRule::contains("1st Floor (NICU)", "NICU"),
        ZoneRule::contains("1st Floor (CAR)", "CAR"),
        ZoneRule::contains("1st Floor (CCU)", "CCU"),
        // Nhà mới
        ZoneRule::contains("HDU", "HDU"),
        ZoneRule::contains("ICU", "ICU"),
        ZoneRule::contains("AW", "AW"),
        ZoneRule::prefix("4th Plus", "24"),
        ZoneRule::prefix("5th Plus", "25"),
    ]
}

/// Tên khu của một số giường.
pub fn classify<'r>(bed_label: &str, rules: &'r [ZoneRule]) -> &'r str {
    let bed = bed_label.trim().to_uppercase();
    if bed.is_empty() {
        return UNASSIGNED_ZONE;
    }
    // "527-3" là phòng 527, giường phụ 3.
    let base = bed.split('-').next().unwrap_or(bed.as_str()).trim();

    rules
        .iter()
        .find(|rule| rule.matches_specific(base))
        .or_else(|| rules.iter().find(|rule| rule.matches_substring(&bed)))
        .or_else(|| rules.iter().find(|rule| rule.matches_prefix(&bed, base)))
        .map(|rule| rule.name.as_str())
        .unwrap_or(FALLBACK_ZONE)
}

/// Tên khu theo thứ tự hiển thị, bỏ trùng, thêm khu mặc định và khu chưa
/// xếp giường ở cuối.
pub fn zone_order(rules: &[ZoneRule]) -> Vec<&str> {
    let mut order: Vec<&str> = Vec::with_capacity(rules.len() + 2);
    for name in rules
        .iter()
        .map(|rule| rule.name.as_str())
        .chain([FALLBACK_ZONE, UNASSIGNED_ZONE])
    {
        if !order.contains(&name) {
            order.push(name);
        }
    }
    order
}

/// So sánh có hiểu số: `"B2" < "B10"`, chữ không phân biệt hoa thường.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let lhs = take_digits(&mut left);
                let rhs = take_digits(&mut right);
                let ordering = compare_digit_runs(&lhs, &rhs);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(x), Some(y)) => {
                let ordering = x.to_lowercase().cmp(y.to_lowercase());
                if ordering != Ordering::Equal {
                    return ordering;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        run.push(c);
    }
    run
}

fn compare_digit_runs(lhs: &str, rhs: &str) -> Ordering {
    let lhs = lhs.trim_start_matches('0');
    let rhs = rhs.trim_start_matches('0');
    lhs.len().cmp(&rhs.len()).then_with(|| lhs.cmp(rhs))
}
