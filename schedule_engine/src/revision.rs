use crate::config::EngineConfig;
use crate::error::BaselineError;
use crate::models::{Alert, PlantScheduleMatrix, BLOCKS_PER_DAY};
use crate::table::{read_matrix_csv, write_matrix_csv, DisplayFormat};
use log::{debug, info, warn};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const REVISION_PREFIX: &str = "# revision=";

// Slot values are rounded to a few decimals; keep 3.0 - 2.9999999999 from missing.
const DELTA_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredBaseline {
    pub revision: Option<u32>,
    pub matrix: PlantScheduleMatrix,
}

/// Single-writer persistence for the most recent revision's matrix.
pub trait BaselineStore {
    fn load(&self) -> Result<Option<StoredBaseline>, BaselineError>;

    /// Replace whatever was stored before.
    fn save(&mut self, revision: u32, matrix: &PlantScheduleMatrix) -> Result<(), BaselineError>;
}

/// Baseline kept as a matrix CSV table, revision number in a leading comment line.
#[derive(Debug, Clone)]
pub struct CsvBaselineStore {
    path: PathBuf,
}

impl CsvBaselineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BaselineStore for CsvBaselineStore {
    fn load(&self) -> Result<Option<StoredBaseline>, BaselineError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)?;
        let revision = text
            .lines()
            .next()
            .and_then(|line| line.strip_prefix(REVISION_PREFIX))
            .and_then(|rev| rev.trim().parse().ok());
        let matrix = read_matrix_csv(text.as_bytes())?;
        Ok(Some(StoredBaseline { revision, matrix }))
    }

    fn save(&mut self, revision: u32, matrix: &PlantScheduleMatrix) -> Result<(), BaselineError> {
        let mut buf = Vec::new();
        writeln!(buf, "{}{}", REVISION_PREFIX, revision)?;
        write_matrix_csv(&mut buf, matrix, &DisplayFormat::default())?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, buf)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryBaselineStore {
    stored: Option<StoredBaseline>,
    saves: usize,
}

impl MemoryBaselineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_baseline(revision: Option<u32>, matrix: PlantScheduleMatrix) -> Self {
        Self {
            stored: Some(StoredBaseline { revision, matrix }),
            saves: 0,
        }
    }

    pub fn stored(&self) -> Option<&StoredBaseline> {
        self.stored.as_ref()
    }

    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl BaselineStore for MemoryBaselineStore {
    fn load(&self) -> Result<Option<StoredBaseline>, BaselineError> {
        Ok(self.stored.clone())
    }

    fn save(&mut self, revision: u32, matrix: &PlantScheduleMatrix) -> Result<(), BaselineError> {
        self.stored = Some(StoredBaseline {
            revision: Some(revision),
            matrix: matrix.clone(),
        });
        self.saves += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    /// No revision recorded yet.
    Idle,
    Baselined { revision: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Same revision as last time; nothing compared or stored.
    Duplicate,
    /// No usable prior baseline; the new matrix became the baseline.
    Baselined,
    /// The prior baseline tracked different plants and was replaced unseen.
    BaselineDiscarded,
    Compared(Vec<Alert>),
}

impl CycleOutcome {
    pub fn alerts(&self) -> &[Alert] {
        match self {
            CycleOutcome::Compared(alerts) => alerts,
            _ => &[],
        }
    }
}

/// Compares each new revision against the stored baseline, then rotates it.
pub struct RevisionTracker<S: BaselineStore> {
    store: S,
    state: TrackerState,
    threshold: f64,
    window: usize,
}

impl<S: BaselineStore> RevisionTracker<S> {
    pub fn new(store: S, config: &EngineConfig) -> Self {
        Self {
            store,
            state: TrackerState::Idle,
            threshold: config.alert_threshold,
            window: config.alert_window,
        }
    }

    /// Like `new`, but picks up the revision number already in the store so a
    /// restarted process still recognises a duplicate fetch.
    pub fn resume(store: S, config: &EngineConfig) -> Self {
        let mut tracker = Self::new(store, config);
        match tracker.store.load() {
            Ok(Some(StoredBaseline {
                revision: Some(revision),
                ..
            })) => tracker.state = TrackerState::Baselined { revision },
            Ok(_) => {}
            Err(e) => warn!("Ignoring unreadable baseline on resume: {}", e),
        }
        tracker
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn observe(
        &mut self,
        revision: u32,
        matrix: &PlantScheduleMatrix,
        current_block: usize,
    ) -> Result<CycleOutcome, BaselineError> {
        if let TrackerState::Baselined { revision: last } = self.state {
            if last == revision {
                debug!("Revision {} already processed", revision);
                return Ok(CycleOutcome::Duplicate);
            }
            if revision < last {
                info!("Revision went back from {} to {}; assuming a new operating day", last, revision);
            }
        }

        let prior = self.store.load().unwrap_or_else(|e| {
            warn!("Treating unreadable baseline as absent: {}", e);
            None
        });

        let outcome = match prior {
            None => CycleOutcome::Baselined,
            Some(prior) if prior.matrix.same_columns(matrix) => CycleOutcome::Compared(detect_changes(
                &prior.matrix,
                matrix,
                current_block,
                self.window,
                self.threshold,
            )),
            Some(_) => {
                warn!("Stored baseline tracks different plants; discarding it");
                CycleOutcome::BaselineDiscarded
            }
        };

        self.store.save(revision, matrix)?;
        self.state = TrackerState::Baselined { revision };
        info!(
            "Revision {} stored as baseline ({} alerts)",
            revision,
            outcome.alerts().len()
        );
        Ok(outcome)
    }
}

/// First slot per plant, within `[current_block, current_block + window)`
/// clipped to the operating day, whose change reaches `threshold`.
pub fn detect_changes(
    old: &PlantScheduleMatrix,
    new: &PlantScheduleMatrix,
    current_block: usize,
    window: usize,
    threshold: f64,
) -> Vec<Alert> {
    if current_block > BLOCKS_PER_DAY {
        return Vec::new();
    }
    let start = current_block.max(1);
    let end = start.saturating_add(window).min(BLOCKS_PER_DAY + 1);

    let mut alerts = Vec::new();
    for plant in new.columns() {
        for slot in start..end {
            let old_value = old.value(plant, slot).unwrap_or(0.0);
            let new_value = new.value(plant, slot).unwrap_or(0.0);
            let delta = new_value - old_value;
            if delta.abs() + DELTA_EPSILON >= threshold {
                alerts.push(Alert {
                    plant: plant.clone(),
                    slot,
                    old_value,
                    new_value,
                    delta,
                });
                break;
            }
        }
    }
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(values: &[(&str, usize, f64)], columns: &[&str]) -> PlantScheduleMatrix {
        let columns: Vec<String> = columns.iter().map(|s| s.to_string()).collect();
        let mut m = PlantScheduleMatrix::new(&columns);
        for (code, slot, value) in values {
            m.add(code, slot - 1, *value);
        }
        m
    }

    fn tracker(store: MemoryBaselineStore) -> RevisionTracker<MemoryBaselineStore> {
        RevisionTracker::new(store, &EngineConfig::default())
    }

    #[test]
    fn test_first_revision_becomes_baseline() {
        let mut t = tracker(MemoryBaselineStore::new());
        assert_eq!(t.state(), TrackerState::Idle);

        let m = matrix(&[("A", 10, 10.0)], &["A"]);
        assert_eq!(t.observe(1, &m, 10).unwrap(), CycleOutcome::Baselined);
        assert_eq!(t.state(), TrackerState::Baselined { revision: 1 });
        assert_eq!(t.store().stored().unwrap().matrix, m);
    }

    #[test]
    fn test_delta_over_threshold_alerts() {
        let mut t = tracker(MemoryBaselineStore::new());
        t.observe(1, &matrix(&[("A", 20, 10.0)], &["A"]), 15).unwrap();

        let outcome = t.observe(2, &matrix(&[("A", 20, 14.0)], &["A"]), 15).unwrap();
        assert_eq!(
            outcome.alerts(),
            &[Alert {
                plant: "A".to_string(),
                slot: 20,
                old_value: 10.0,
                new_value: 14.0,
                delta: 4.0,
            }]
        );
    }

    #[test]
    fn test_delta_under_threshold_is_quiet() {
        let mut t = tracker(MemoryBaselineStore::new());
        t.observe(1, &matrix(&[("A", 20, 10.0)], &["A"]), 15).unwrap();
        let outcome = t.observe(2, &matrix(&[("A", 20, 11.5)], &["A"]), 15).unwrap();
        assert_eq!(outcome, CycleOutcome::Compared(vec![]));
    }

    #[test]
    fn test_changes_outside_window_ignored() {
        let old = matrix(&[], &["A"]);
        let new = matrix(&[("A", 14, 50.0), ("A", 27, 50.0)], &["A"]);
        // Window starting at block 15 covers 15..=26.
        assert!(detect_changes(&old, &new, 15, 12, 3.0).is_empty());
        assert_eq!(detect_changes(&old, &new, 16, 12, 3.0)[0].slot, 27);
    }

    #[test]
    fn test_one_alert_per_plant_first_slot_wins() {
        let old = matrix(&[], &["A", "B"]);
        let new = matrix(
            &[("A", 3, -4.0), ("A", 4, 9.0), ("B", 5, 3.0)],
            &["A", "B"],
        );
        let alerts = detect_changes(&old, &new, 1, 12, 3.0);
        assert_eq!(alerts.len(), 2);
        assert_eq!((alerts[0].plant.as_str(), alerts[0].slot, alerts[0].delta), ("A", 3, -4.0));
        assert_eq!((alerts[1].plant.as_str(), alerts[1].slot), ("B", 5));
    }

    #[test]
    fn test_window_clamped_at_day_end() {
        let old = matrix(&[], &["A"]);
        let new = matrix(&[("A", 96, 5.0)], &["A"]);
        assert_eq!(detect_changes(&old, &new, 90, 12, 3.0)[0].slot, 96);
        assert!(detect_changes(&old, &new, 0, 12, 3.0).is_empty());
    }

    #[test]
    fn test_block_past_day_end_raises_nothing() {
        let old = matrix(&[], &["A"]);
        let new = matrix(&[("A", 96, 5.0)], &["A"]);
        assert_eq!(detect_changes(&old, &new, 96, 12, 3.0).len(), 1);
        assert!(detect_changes(&old, &new, 97, 12, 3.0).is_empty());
        assert!(detect_changes(&old, &new, 200, 12, 3.0).is_empty());
    }

    #[test]
    fn test_duplicate_revision_short_circuits() {
        let mut t = tracker(MemoryBaselineStore::new());
        let first = matrix(&[("A", 1, 1.0)], &["A"]);
        t.observe(5, &first, 1).unwrap();

        let changed = matrix(&[("A", 1, 100.0)], &["A"]);
        assert_eq!(t.observe(5, &changed, 1).unwrap(), CycleOutcome::Duplicate);
        assert_eq!(t.store().save_count(), 1);
        assert_eq!(t.store().stored().unwrap().matrix, first);
    }

    #[test]
    fn test_column_mismatch_discards_baseline() {
        let mut t = tracker(MemoryBaselineStore::with_baseline(
            Some(1),
            matrix(&[("A", 1, 1.0)], &["A"]),
        ));
        let next = matrix(&[("A", 1, 90.0)], &["A", "B"]);
        assert_eq!(t.observe(2, &next, 1).unwrap(), CycleOutcome::BaselineDiscarded);
        assert_eq!(t.store().stored().unwrap().matrix, next);

        let later = matrix(&[("A", 1, 95.0)], &["A", "B"]);
        assert_eq!(t.observe(3, &later, 1).unwrap().alerts().len(), 1);
    }

    #[test]
    fn test_resume_recognises_stored_revision() {
        let store = MemoryBaselineStore::with_baseline(Some(8), matrix(&[], &["A"]));
        let mut t = RevisionTracker::resume(store, &EngineConfig::default());
        assert_eq!(t.state(), TrackerState::Baselined { revision: 8 });
        assert_eq!(
            t.observe(8, &matrix(&[("A", 1, 50.0)], &["A"]), 1).unwrap(),
            CycleOutcome::Duplicate
        );
    }

    #[test]
    fn test_csv_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CsvBaselineStore::new(dir.path().join("state").join("baseline.csv"));
        assert_eq!(store.load().unwrap(), None);

        let m = matrix(&[("A", 1, 2.5), ("B", 96, -1.0)], &["A", "B"]);
        store.save(12, &m).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.revision, Some(12));
        assert_eq!(loaded.matrix, m);
    }

    #[test]
    fn test_unreadable_csv_baseline_self_heals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("baseline.csv");
        fs::write(&path, "garbage without numbers\nx\n").unwrap();

        let store = CsvBaselineStore::new(&path);
        assert!(store.load().is_err());

        let mut t = RevisionTracker::resume(store, &EngineConfig::default());
        assert_eq!(t.state(), TrackerState::Idle);
        let m = matrix(&[("A", 1, 1.0)], &["A"]);
        assert_eq!(t.observe(1, &m, 1).unwrap(), CycleOutcome::Baselined);
        assert_eq!(t.store().load().unwrap().unwrap().matrix, m);
    }
}
