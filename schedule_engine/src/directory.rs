use crate::error::ConfigurationError;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const REGISTRY: &str = "plant registry";
const COLUMNS: &str = "plant column";

const RAW_KEY_HEADERS: &[&str] = &["RLDC", "RAWKEY"];
const PLANT_CODE_HEADERS: &[&str] = &["SLDCCODE", "PLANTCODE"];
const ENTITLEMENT_HEADERS: &[&str] = &["ENT%AGE", "ENTITLEMENTPERCENTAGE", "ENTITLEMENT"];

/// Normalized names of the date/period columns that never hold plant data.
const RESERVED_COLUMNS: &[&str] = &["MONTH", "DAY", "PERIOD", "TIMESLOT"];

/// Strip whitespace, underscores and hyphens, then upper-case.
pub fn normalize_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_uppercase)
        .collect()
}

pub fn is_reserved_column(name: &str) -> bool {
    RESERVED_COLUMNS.contains(&normalize_key(name).as_str())
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlantDirectoryEntry {
    pub raw_key: String,
    pub plant_code: String,
    pub entitlement_pct: f64,
}

/// Canonical plant registry plus the set of tracked plant columns.
///
/// Built once, then only read.
#[derive(Debug, Clone, Default)]
pub struct PlantDirectory {
    codes: HashMap<String, String>,
    entitlements: HashMap<String, f64>,
    tracked: Vec<String>,
}

impl PlantDirectory {
    /// Load both reference tables from CSV files.
    pub fn from_paths(
        registry_path: impl AsRef<Path>,
        columns_path: impl AsRef<Path>,
    ) -> Result<Self, ConfigurationError> {
        let registry = open_table(registry_path.as_ref(), REGISTRY)?;
        let columns = open_table(columns_path.as_ref(), COLUMNS)?;
        Self::load(registry, columns)
    }

    /// Load from any CSV sources: the registry rows and the plant-column header.
    pub fn load<R: Read, C: Read>(registry: R, columns: C) -> Result<Self, ConfigurationError> {
        let mut directory = Self::default();
        for entry in read_registry(registry)? {
            directory.add_entry(entry);
        }
        directory.tracked = read_tracked_columns(columns)?;
        log::info!(
            "Loaded plant directory: {} registry keys, {} tracked columns",
            directory.codes.len(),
            directory.tracked.len()
        );
        Ok(directory)
    }

    /// Build directly from entries and column names.
    pub fn from_entries(entries: Vec<PlantDirectoryEntry>, tracked: Vec<String>) -> Self {
        let mut directory = Self {
            tracked,
            ..Self::default()
        };
        for entry in entries {
            directory.add_entry(entry);
        }
        directory
    }

    /// Later entries replace earlier ones with the same key or code.
    pub fn add_entry(&mut self, entry: PlantDirectoryEntry) {
        self.codes
            .insert(normalize_key(&entry.raw_key), entry.plant_code.clone());
        self.entitlements
            .insert(entry.plant_code, entry.entitlement_pct);
    }

    /// Exact lookup of an already normalized key.
    pub fn code_for(&self, normalized_key: &str) -> Option<&str> {
        self.codes.get(normalized_key).map(String::as_str)
    }

    pub fn entitlement_pct(&self, plant_code: &str) -> Option<f64> {
        self.entitlements.get(plant_code).copied()
    }

    pub fn tracked_columns(&self) -> &[String] {
        &self.tracked
    }

    pub fn is_tracked(&self, plant_code: &str) -> bool {
        self.tracked.iter().any(|c| c == plant_code)
    }
}

fn open_table(path: &Path, table: &'static str) -> Result<File, ConfigurationError> {
    File::open(path).map_err(|_| ConfigurationError::MissingTable {
        table,
        path: path.display().to_string(),
    })
}

fn header_index(
    headers: &StringRecord,
    accepted: &[&str],
    column: &'static str,
) -> Result<usize, ConfigurationError> {
    headers
        .iter()
        .position(|h| accepted.contains(&normalize_key(h).as_str()))
        .ok_or(ConfigurationError::MissingColumn {
            table: REGISTRY,
            column,
        })
}

fn read_registry<R: Read>(source: R) -> Result<Vec<PlantDirectoryEntry>, ConfigurationError> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(source);
    let csv_err = |source| ConfigurationError::Csv {
        table: REGISTRY,
        source,
    };

    let headers = reader.headers().map_err(csv_err)?.clone();
    let raw_idx = header_index(&headers, RAW_KEY_HEADERS, "raw-key")?;
    let code_idx = header_index(&headers, PLANT_CODE_HEADERS, "plant-code")?;
    let ent_idx = header_index(&headers, ENTITLEMENT_HEADERS, "entitlement-percentage")?;

    let mut entries = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(csv_err)?;
        // Header is row 1.
        let row = idx + 2;
        let raw_key = record.get(raw_idx).unwrap_or("");
        let plant_code = record.get(code_idx).unwrap_or("");
        if raw_key.is_empty() && plant_code.is_empty() {
            continue;
        }
        if raw_key.is_empty() || plant_code.is_empty() {
            return Err(ConfigurationError::Malformed {
                table: REGISTRY,
                row,
                message: "raw key and plant code must both be present".to_string(),
            });
        }
        let entitlement_pct = parse_entitlement(record.get(ent_idx).unwrap_or(""), row)?;
        entries.push(PlantDirectoryEntry {
            raw_key: raw_key.to_string(),
            plant_code: plant_code.to_string(),
            entitlement_pct,
        });
    }
    Ok(entries)
}

fn parse_entitlement(cell: &str, row: usize) -> Result<f64, ConfigurationError> {
    let cell = cell.trim_end_matches('%').trim();
    if cell.is_empty() {
        return Ok(0.0);
    }
    let value: f64 = cell.parse().map_err(|_| ConfigurationError::Malformed {
        table: REGISTRY,
        row,
        message: format!("entitlement {:?} is not a number", cell),
    })?;
    if !(0.0..=100.0).contains(&value) {
        return Err(ConfigurationError::Malformed {
            table: REGISTRY,
            row,
            message: format!("entitlement {} outside 0-100", value),
        });
    }
    Ok(value)
}

fn read_tracked_columns<R: Read>(source: R) -> Result<Vec<String>, ConfigurationError> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(source);
    let headers = reader
        .headers()
        .map_err(|source| ConfigurationError::Csv {
            table: COLUMNS,
            source,
        })?
        .clone();

    let mut tracked: Vec<String> = Vec::new();
    for header in headers.iter() {
        if header.is_empty() || is_reserved_column(header) {
            continue;
        }
        if !tracked.iter().any(|c| c == header) {
            tracked.push(header.to_string());
        }
    }
    if tracked.is_empty() {
        return Err(ConfigurationError::Malformed {
            table: COLUMNS,
            row: 1,
            message: "no plant columns in header".to_string(),
        });
    }
    Ok(tracked)
}
