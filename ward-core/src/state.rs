//! Reducer giữ ảnh chụp mới nhất của từng nguồn và danh sách đã hợp nhất.
//!
//! Mỗi nguồn gửi ảnh chụp kèm số thứ tự tăng dần. Ảnh chụp cũ hơn ảnh đang
//! giữ bị bỏ qua (ghi sau thắng khi thay ảnh chụp, không phải khi hợp nhất).
//! Lỗi nguồn được ghi lại còn trạng thái tốt trước đó vẫn giữ nguyên.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::discharge::DischargeRecord;
use crate::merge::merge;
use crate::{
    CensusRecord, EditRecord, MergedPatient, PatientId, SourceKind, TransferRecord, WardConfig,
    WardError,
};

/// Một thông báo từ nguồn dữ liệu bên ngoài.
#[derive(Debug, Clone)]
pub enum SourceEvent {
    Census {
        seq: u64,
        records: Vec<CensusRecord>,
    },
    Edits {
        seq: u64,
        records: BTreeMap<PatientId, EditRecord>,
    },
    Transfers {
        seq: u64,
        records: BTreeMap<PatientId, TransferRecord>,
    },
    Discharges {
        seq: u64,
        records: Vec<DischargeRecord>,
    },
    Failed {
        feed: SourceKind,
        reason: String,
    },
}

#[derive(Debug, Clone, Default)]
struct Snapshot<T> {
    seq: Option<u64>,
    data: T,
    failure: Option<String>,
}

impl<T> Snapshot<T> {
    /// `false` khi ảnh chụp không mới hơn ảnh đang giữ.
    fn replace(&mut self, seq: u64, data: T) -> bool {
        if self.seq.is_some_and(|current| seq <= current) {
            return false;
        }
        self.seq = Some(seq);
        self.data = data;
        self.failure = None;
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct WardState {
    census: Snapshot<Vec<CensusRecord>>,
    edits: Snapshot<BTreeMap<PatientId, EditRecord>>,
    transfers: Snapshot<BTreeMap<PatientId, TransferRecord>>,
    discharges: Snapshot<Vec<DischargeRecord>>,
    patients: Vec<MergedPatient>,
}

impl WardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Áp dụng một thông báo nguồn.
    ///
    /// `Ok(true)` khi danh sách đã được hợp nhất lại, `Ok(false)` khi ảnh
    /// chụp cũ bị bỏ qua, `Err(SourceUnavailable)` khi nguồn báo lỗi; khi đó
    /// danh sách hiện tại không đổi.
    pub fn apply(&mut self, event: SourceEvent, config: &WardConfig) -> Result<bool, WardError> {
        let (feed, seq, accepted) = match event {
            SourceEvent::Census { seq, records } => {
                (SourceKind::Census, seq, self.census.replace(seq, records))
            }
            SourceEvent::Edits { seq, records } => {
                (SourceKind::Edits, seq, self.edits.replace(seq, records))
            }
            SourceEvent::Transfers { seq, records } => {
                (SourceKind::Transfers, seq, self.transfers.replace(seq, records))
            }
            SourceEvent::Discharges { seq, records } => {
                let accepted = self.discharges.replace(seq, records);
                if !accepted {
                    debug!(feed = %SourceKind::Discharges, seq, "ignoring stale snapshot");
                }
                // Nhật ký ra viện không tham gia phép hợp nhất.
                return Ok(false);
            }
            SourceEvent::Failed { feed, reason } => {
                warn!(%feed, %reason, "source unavailable, keeping previous snapshot");
                self.snapshot_failure(feed, reason.clone());
                return Err(WardError::SourceUnavailable { feed, reason });
            }
        };

        if !accepted {
            debug!(%feed, seq, "ignoring stale snapshot");
            return Ok(false);
        }

        self.remerge(config);
        debug!(%feed, seq, patients = self.patients.len(), "re-merged ward");
        Ok(true)
    }

    fn snapshot_failure(&mut self, feed: SourceKind, reason: String) {
        let slot = match feed {
            SourceKind::Census => &mut self.census.failure,
            SourceKind::Edits => &mut self.edits.failure,
            SourceKind::Transfers => &mut self.transfers.failure,
            SourceKind::Discharges => &mut self.discharges.failure,
        };
        *slot = Some(reason);
    }

    /// Hợp nhất lại từ các ảnh chụp đang giữ, ví dụ sau khi đổi cấu hình.
    pub fn remerge(&mut self, config: &WardConfig) {
        self.patients = merge(
            &self.census.data,
            &self.edits.data,
            &self.transfers.data,
            config,
        );
    }

    pub fn patients(&self) -> &[MergedPatient] {
        &self.patients
    }

    pub fn census(&self) -> &[CensusRecord] {
        &self.census.data
    }

    pub fn discharges(&self) -> &[DischargeRecord] {
        &self.discharges.data
    }

    /// Nguồn có lần tải gần nhất bị lỗi, kèm lý do; dùng cho chỉ báo dữ liệu cũ.
    pub fn stale_feeds(&self) -> Vec<(SourceKind, &str)> {
        [
            (SourceKind::Census, &self.census.failure),
            (SourceKind::Edits, &self.edits.failure),
            (SourceKind::Transfers, &self.transfers.failure),
            (SourceKind::Discharges, &self.discharges.failure),
        ]
        .into_iter()
        .filter_map(|(feed, failure)| failure.as_deref().map(|reason| (feed, reason)))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn census(ids: &[&str]) -> Vec<CensusRecord> {
        ids.iter()
            .map(|id| CensusRecord {
                hospital_no: PatientId::new(id).unwrap(),
                name: format!("Patient {id}"),
                ..CensusRecord::default()
            })
            .collect()
    }

    #[test]
    fn stale_snapshots_are_ignored() {
        let config = WardConfig::default();
        let mut state = WardState::new();

        let fresh = SourceEvent::Census {
            seq: 2,
            records: census(&["H1", "H2"]),
        };
        assert!(state.apply(fresh, &config).unwrap());

        let late = SourceEvent::Census {
            seq: 1,
            records: census(&["H1"]),
        };
        assert!(!state.apply(late, &config).unwrap());
        assert_eq!(state.patients().len(), 2);
    }

    #[test]
    fn failure_keeps_previous_state_until_next_snapshot() {
        let config = WardConfig::default();
        let mut state = WardState::new();
        state
            .apply(
                SourceEvent::Census {
                    seq: 1,
                    records: census(&["H1"]),
                },
                &config,
            )
            .unwrap();

        let failed = state.apply(
            SourceEvent::Failed {
                feed: SourceKind::Census,
                reason: "HTTP 503".into(),
            },
            &config,
        );
        assert!(matches!(
            failed,
            Err(WardError::SourceUnavailable {
                feed: SourceKind::Census,
                ..
            })
        ));
        assert_eq!(state.patients().len(), 1);
        assert_eq!(state.stale_feeds(), vec![(SourceKind::Census, "HTTP 503")]);

        state
            .apply(
                SourceEvent::Census {
                    seq: 2,
                    records: census(&["H1", "H3"]),
                },
                &config,
            )
            .unwrap();
        assert!(state.stale_feeds().is_empty());
        assert_eq!(state.patients().len(), 2);
    }

    #[test]
    fn discharge_snapshots_do_not_remerge() {
        let config = WardConfig::default();
        let mut state = WardState::new();
        state
            .apply(
                SourceEvent::Census {
                    seq: 1,
                    records: census(&["H1"]),
                },
                &config,
            )
            .unwrap();

        let record = DischargeRecord {
            hospital_no: PatientId::new("H1").unwrap(),
            ..DischargeRecord::default()
        };
        let changed = state
            .apply(
                SourceEvent::Discharges {
                    seq: 1,
                    records: vec![record],
                },
                &config,
            )
            .unwrap();
        assert!(!changed);
        assert_eq!(state.discharges().len(), 1);
        assert_eq!(state.census().len(), 1);
        assert_eq!(state.patients().len(), 1);
    }

    #[test]
    fn each_source_change_triggers_full_remerge() {
        let config = WardConfig::default();
        let mut state = WardState::new();
        state
            .apply(
                SourceEvent::Census {
                    seq: 1,
                    records: census(&["H1"]),
                },
                &config,
            )
            .unwrap();

        let mut edits = BTreeMap::new();
        edits.insert(PatientId::new("H9").unwrap(), EditRecord::default());
        assert!(state
            .apply(SourceEvent::Edits { seq: 1, records: edits }, &config)
            .unwrap());

        let ghosts: Vec<&str> = state
            .patients()
            .iter()
            .filter(|p| p.is_ghost)
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(ghosts, vec!["H9"]);

        assert!(state
            .apply(
                SourceEvent::Census {
                    seq: 2,
                    records: census(&["H1", "H9"]),
                },
                &config,
            )
            .unwrap());
        assert!(state.patients().iter().all(|p| !p.is_ghost));
    }
}
