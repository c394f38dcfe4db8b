use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::info;

use crate::core::{Column, DataError, Dataset, Values};

/// `x{YY}.csv` for the two-digit suffix of `tax_year`.
pub fn output_file_name(tax_year: i32) -> String {
    format!("x{:02}.csv", tax_year.rem_euclid(100))
}

/// Parses a CSV table with a header row. A column whose every cell parses as
/// an integer is stored as integers, anything else numeric as floats.
pub fn read_dataset<R: Read>(reader: R) -> std::result::Result<Dataset, DataError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        if record.len() != headers.len() {
            return Err(DataError::RaggedRow {
                row,
                expected: headers.len(),
                found: record.len(),
            });
        }
        for (col, field) in record.iter().enumerate() {
            cells[col].push(field.to_string());
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, raw)| parse_column(name, raw))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Dataset::new(columns)
}

fn parse_column(name: String, raw: Vec<String>) -> std::result::Result<Column, DataError> {
    let ints: Option<Vec<i64>> = raw.iter().map(|s| s.parse().ok()).collect();
    if let Some(ints) = ints {
        return Ok(Column {
            name,
            values: Values::Int(ints),
        });
    }
    let mut floats = Vec::with_capacity(raw.len());
    for (row, s) in raw.iter().enumerate() {
        match s.parse::<f64>() {
            Ok(v) => floats.push(v),
            Err(_) => {
                return Err(DataError::NonNumeric {
                    column: name,
                    row,
                    value: s.clone(),
                });
            }
        }
    }
    Ok(Column {
        name,
        values: Values::Float(floats),
    })
}

pub fn write_dataset<W: Write>(dataset: &Dataset, writer: W) -> std::result::Result<(), DataError> {
    let mut wtr = WriterBuilder::new().from_writer(writer);
    wtr.write_record(dataset.column_names())?;
    let mut record = Vec::with_capacity(dataset.column_count());
    for row in 0..dataset.row_count() {
        record.clear();
        for column in dataset.columns() {
            record.push(match &column.values {
                Values::Int(v) => v[row].to_string(),
                Values::Float(v) => v[row].to_string(),
            });
        }
        wtr.write_record(&record)?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let file = File::open(path)
        .with_context(|| format!("{} file not found", path.display()))?;
    let dataset = read_dataset(file)
        .with_context(|| format!("failed to read {}", path.display()))?;
    info!(
        path = %path.display(),
        rows = dataset.row_count(),
        columns = dataset.column_count(),
        "loaded dataset"
    );
    Ok(dataset)
}

/// A fully written temp file sitting next to its destination. Dropping it
/// without calling [`StagedFile::persist`] removes the temp file.
#[derive(Debug)]
pub struct StagedFile {
    tmp: NamedTempFile,
    path: PathBuf,
}

impl StagedFile {
    /// Where the file lands once persisted.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn persist(self) -> Result<PathBuf> {
        let StagedFile { tmp, path } = self;
        tmp.persist(&path)
            .with_context(|| format!("failed to persist {}", path.display()))?;
        Ok(path)
    }
}

fn stage_in(path: &Path) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))
}

/// Writes `x{YY}.csv` for `dataset` into a temp file under `dir`.
pub fn stage_output(dataset: &Dataset, dir: &Path, tax_year: i32) -> Result<StagedFile> {
    let path = dir.join(output_file_name(tax_year));
    let mut tmp = stage_in(&path)?;
    write_dataset(dataset, tmp.as_file_mut())
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), rows = dataset.row_count(), "staged dataset");
    Ok(StagedFile { tmp, path })
}

/// Pretty-prints `value` as JSON into a temp file next to `path`.
pub fn stage_json<T: Serialize>(value: &T, path: &Path) -> Result<StagedFile> {
    let mut tmp = stage_in(path)?;
    serde_json::to_writer_pretty(tmp.as_file_mut(), value)
        .with_context(|| format!("failed to write {}", path.display()))?;
    tmp.as_file_mut()
        .write_all(b"\n")
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(StagedFile {
        tmp,
        path: path.to_path_buf(),
    })
}
