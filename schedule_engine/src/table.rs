use crate::directory::is_reserved_column;
use crate::error::{BaselineError, ConfigurationError};
use crate::models::{PlantScheduleMatrix, BLOCKS_PER_DAY};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

const DISPLAY_FORMAT: &str = "display format";

/// Row labels and column order for rendered matrices.
///
/// Header cells that name a matrix column are filled from the matrix; every
/// other cell is copied through as a label.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayFormat {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Default for DisplayFormat {
    /// A single `Period` column numbered 1 to 96.
    fn default() -> Self {
        Self {
            headers: vec!["Period".to_string()],
            rows: (1..=BLOCKS_PER_DAY).map(|p| vec![p.to_string()]).collect(),
        }
    }
}

impl DisplayFormat {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|_| ConfigurationError::MissingTable {
            table: DISPLAY_FORMAT,
            path: path.display().to_string(),
        })?;
        Self::load(file)
    }

    pub fn load<R: Read>(source: R) -> Result<Self, ConfigurationError> {
        let csv_err = |source| ConfigurationError::Csv {
            table: DISPLAY_FORMAT,
            source,
        };
        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(source);
        let headers: Vec<String> = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::with_capacity(BLOCKS_PER_DAY);
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        if rows.len() != BLOCKS_PER_DAY {
            return Err(ConfigurationError::Malformed {
                table: DISPLAY_FORMAT,
                row: rows.len() + 1,
                message: format!("expected {} rows, found {}", BLOCKS_PER_DAY, rows.len()),
            });
        }
        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Output header: format columns in order, then matrix columns the format lacks.
    fn output_headers(&self, matrix: &PlantScheduleMatrix) -> Vec<String> {
        let mut headers = self.headers.clone();
        for column in matrix.columns() {
            if !headers.contains(column) {
                headers.push(column.clone());
            }
        }
        headers
    }

    fn label(&self, row: usize, header: &str) -> &str {
        self.headers
            .iter()
            .position(|h| h == header)
            .and_then(|idx| self.rows.get(row)?.get(idx))
            .map(String::as_str)
            .unwrap_or("")
    }
}

fn format_value(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else {
        value.to_string()
    }
}

pub fn write_matrix_csv<W: Write>(
    writer: W,
    matrix: &PlantScheduleMatrix,
    format: &DisplayFormat,
) -> Result<(), csv::Error> {
    let mut out = WriterBuilder::new().from_writer(writer);
    let headers = format.output_headers(matrix);
    out.write_record(&headers)?;

    for row in 0..BLOCKS_PER_DAY {
        let record: Vec<String> = headers
            .iter()
            .map(|header| match matrix.value(header, row + 1) {
                Some(value) => format_value(value),
                None => format.label(row, header).to_string(),
            })
            .collect();
        out.write_record(&record)?;
    }
    out.flush()?;
    Ok(())
}

/// Read a matrix table back. Reserved label columns are ignored; `#` lines are comments.
pub fn read_matrix_csv<R: Read>(source: R) -> Result<PlantScheduleMatrix, BaselineError> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_reader(source);
    let headers = reader.headers()?.clone();

    let plant_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !h.is_empty() && !is_reserved_column(h))
        .map(|(idx, h)| (idx, h.to_string()))
        .collect();
    if plant_columns.is_empty() {
        return Err(BaselineError::Schema("no plant columns".to_string()));
    }

    let names: Vec<String> = plant_columns.iter().map(|(_, name)| name.clone()).collect();
    let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(BLOCKS_PER_DAY); plant_columns.len()];
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        for ((idx, name), values) in plant_columns.iter().zip(columns.iter_mut()) {
            let cell = record.get(*idx).unwrap_or("");
            let value = cell.parse::<f64>().map_err(|_| {
                BaselineError::Schema(format!("row {} column {}: {:?} is not a number", row + 1, name, cell))
            })?;
            values.push(value);
        }
    }

    let rows = columns.first().map(Vec::len).unwrap_or(0);
    if rows != BLOCKS_PER_DAY {
        return Err(BaselineError::Schema(format!(
            "expected {} rows, found {}",
            BLOCKS_PER_DAY, rows
        )));
    }

    let mut matrix = PlantScheduleMatrix::new(&names);
    for (name, values) in names.iter().zip(&columns) {
        matrix.set_series(name, values);
    }
    Ok(matrix)
}
