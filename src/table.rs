use std::{error::Error, fs, path::Path};

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum TableError {
    #[error("table has {found} records, fewer than the {expected} header rows requested")]
    TooShort { found: usize, expected: usize },
    #[error("header level {level} out of range, table has {levels} header rows")]
    NoSuchLevel { level: usize, levels: usize },
    #[error("tables have different header depths ({0} vs {1})")]
    DepthMismatch(usize, usize),
}

/// A CSV table as exported from Infoshare.
///
/// The first column is the row index (usually the time period).  Column labels can
/// span several header rows, one per variable, e.g.
/// ```text
/// ,Auckland (sea),Auckland (sea),Napier (sea)
/// ,FOB,Gross weight,FOB
/// 2021M06,1,2,3
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub header: Vec<Vec<String>>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Split raw records into header rows and data rows.
    pub fn from_records(mut records: Vec<Vec<String>>, header_rows: usize) -> Result<Table, TableError> {
        if records.len() < header_rows {
            return Err(TableError::TooShort {
                found: records.len(),
                expected: header_rows,
            });
        }
        let rows = records.split_off(header_rows);
        Ok(Table {
            header: records,
            rows,
        })
    }

    pub fn read_csv(path: &Path, header_rows: usize) -> Result<Table, Box<dyn Error>> {
        let records = read_records(path)?;
        Ok(Table::from_records(records, header_rows)?)
    }

    /// Write header rows then data rows.  Creates the parent directory if needed.
    pub fn write_csv(&self, path: &Path) -> Result<(), Box<dyn Error>> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut wtr = csv::WriterBuilder::new().flexible(true).from_path(path)?;
        for record in self.header.iter().chain(self.rows.iter()) {
            wtr.write_record(record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Column labels of one header level, index column excluded.
    pub fn column_labels(&self, level: usize) -> Result<&[String], TableError> {
        let row = self.header.get(level).ok_or(TableError::NoSuchLevel {
            level,
            levels: self.header.len(),
        })?;
        Ok(row.get(1..).unwrap_or(&[]))
    }

    pub fn index(&self) -> Vec<&str> {
        self.rows
            .iter()
            .map(|row| row.first().map(|s| s.as_str()).unwrap_or(""))
            .collect()
    }

    /// Set the label of the index column on the last header row.
    pub fn set_index_name(&mut self, name: &str) {
        if let Some(row) = self.header.last_mut() {
            match row.first_mut() {
                Some(cell) => *cell = name.to_string(),
                None => row.push(name.to_string()),
            }
        }
    }
}

/// Read every record of a CSV file, without treating any row as a header.
pub fn read_records(path: &Path) -> Result<Vec<Vec<String>>, Box<dyn Error>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut records = Vec::new();
    for result in rdr.records() {
        let record = result?;
        records.push(record.iter().map(String::from).collect());
    }
    Ok(records)
}

/// Convenience for building records in tests and fixtures.
pub fn record(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|s| s.to_string()).collect()
}
