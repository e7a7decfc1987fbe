use chrono::{DateTime, FixedOffset, NaiveTime, Offset, Timelike, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Quarter-hour blocks in one operating day.
pub const BLOCKS_PER_DAY: usize = 96;

const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Per-plant 96-slot megawatt matrix for one revision.
///
/// Every tracked column always owns exactly `BLOCKS_PER_DAY` values; there is
/// no way to add a column after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlantScheduleMatrix {
    columns: Vec<String>,
    series: BTreeMap<String, Vec<f64>>,
}

impl PlantScheduleMatrix {
    /// Zero-filled matrix spanning `columns` (duplicates are collapsed).
    pub fn new(columns: &[String]) -> Self {
        let mut ordered = Vec::with_capacity(columns.len());
        let mut series = BTreeMap::new();
        for column in columns {
            if series
                .insert(column.clone(), vec![0.0; BLOCKS_PER_DAY])
                .is_none()
            {
                ordered.push(column.clone());
            }
        }
        Self {
            columns: ordered,
            series,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_tracked(&self, code: &str) -> bool {
        self.series.contains_key(code)
    }

    pub fn series(&self, code: &str) -> Option<&[f64]> {
        self.series.get(code).map(Vec::as_slice)
    }

    /// Value at a 1-based slot.
    pub fn value(&self, code: &str, slot: usize) -> Option<f64> {
        if slot == 0 {
            return None;
        }
        self.series.get(code)?.get(slot - 1).copied()
    }

    /// Accumulate into a 0-based index. Returns false for untracked codes.
    pub fn add(&mut self, code: &str, index: usize, value: f64) -> bool {
        match self.series.get_mut(code).and_then(|s| s.get_mut(index)) {
            Some(cell) => {
                *cell += value;
                true
            }
            None => false,
        }
    }

    /// Overwrite a whole column; extra values are ignored, missing ones stay zero.
    pub fn set_series(&mut self, code: &str, values: &[f64]) -> bool {
        match self.series.get_mut(code) {
            Some(series) => {
                for (cell, value) in series.iter_mut().zip(values) {
                    *cell = *value;
                }
                true
            }
            None => false,
        }
    }

    /// True when both matrices track exactly the same plant codes.
    pub fn same_columns(&self, other: &PlantScheduleMatrix) -> bool {
        self.series.len() == other.series.len()
            && self.series.keys().all(|k| other.series.contains_key(k))
    }

    pub fn total(&self, code: &str) -> f64 {
        self.series(code).map(|s| s.iter().sum()).unwrap_or(0.0)
    }
}

/// A significant schedule change between two revisions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub plant: String,
    /// 1-based quarter-hour block.
    pub slot: usize,
    pub old_value: f64,
    pub new_value: f64,
    pub delta: f64,
}

impl Alert {
    pub fn slot_label(&self) -> String {
        slot_label(self.slot)
    }
}

/// Quarter-hour block (1..=96) containing `time`.
pub fn operating_block(time: NaiveTime) -> usize {
    (time.hour() as usize) * 4 + (time.minute() as usize) / 15 + 1
}

/// Current wall-clock time in the grid operator's timezone (UTC+05:30).
pub fn ist_now() -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(IST_OFFSET_SECS).unwrap_or_else(|| Utc.fix());
    Utc::now().with_timezone(&offset)
}

/// "HH:MM-HH:MM" for a 1-based slot, clamped to the operating day.
pub fn slot_label(slot: usize) -> String {
    let slot = slot.clamp(1, BLOCKS_PER_DAY);
    let start = (slot - 1) * 15;
    let end = slot * 15;
    format!(
        "{:02}:{:02}-{:02}:{:02}",
        start / 60,
        start % 60,
        end / 60,
        end % 60
    )
}

/// Round to `decimals` places; exact ties go to the even neighbour.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round_ties_even() / factor
}
