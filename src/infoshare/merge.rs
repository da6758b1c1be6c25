use std::{
    error::Error,
    fs,
    path::{Path, PathBuf},
};

use log::info;

use crate::table::{read_records, Table};

use super::InfoshareError;

/// File stem of the `i`-th partial download of a dataset.
pub fn partial_name(dataset_name: &str, i: usize) -> String {
    format!("{}__temp{}", dataset_name, i)
}

/// Partial CSVs of a dataset already on disk, `__temp0`, `__temp1`, ... up to the
/// first missing index.
pub fn find_partials(dir: &Path, dataset_name: &str) -> Vec<PathBuf> {
    (0..)
        .map(|i| dir.join(format!("{}.csv", partial_name(dataset_name, i))))
        .take_while(|p| p.exists())
        .collect()
}

/// Number of leading records that two partial downloads have in common.
///
/// Chunks cover different time periods, so the first record that differs is the
/// first data row and everything above it is header.
pub fn detect_header_rows(a: &[Vec<String>], b: &[Vec<String>]) -> Result<usize, InfoshareError> {
    a.iter()
        .zip(b.iter())
        .position(|(x, y)| x != y)
        .ok_or(InfoshareError::IdenticalChunks)
}

/// Stack the data rows of the partial CSVs under one header, ordered by the row
/// index, descending.
pub fn merge_partial_csvs(paths: &[PathBuf]) -> Result<Table, Box<dyn Error>> {
    if paths.len() < 2 {
        return Err(Box::new(InfoshareError::TooFewChunks(paths.len())));
    }
    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        records.push(read_records(path)?);
    }
    let header_rows = detect_header_rows(&records[0], &records[1])?;

    let mut merged: Option<Table> = None;
    for (path, chunk) in paths.iter().zip(records) {
        let table = Table::from_records(chunk, header_rows)?;
        match merged.as_mut() {
            None => merged = Some(table),
            Some(m) => {
                if m.header != table.header {
                    return Err(Box::new(InfoshareError::HeaderMismatch(
                        path.display().to_string(),
                    )));
                }
                m.rows.extend(table.rows);
            }
        }
    }
    let mut merged = merged.ok_or(InfoshareError::TooFewChunks(0))?;
    merged.rows.sort_by(|x, y| y.first().cmp(&x.first()));
    Ok(merged)
}

/// Merge the partials into `out` and remove them.
pub fn merge_and_replace(paths: &[PathBuf], out: &Path) -> Result<Table, Box<dyn Error>> {
    let merged = merge_partial_csvs(paths)?;
    merged.write_csv(out)?;
    for path in paths {
        fs::remove_file(path)?;
    }
    info!(
        "merged {} partial CSVs into {} ({} rows)",
        paths.len(),
        out.display(),
        merged.rows.len()
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;
    use crate::table::record;

    fn write(dir: &Path, name: &str, records: &[Vec<String>]) -> Result<PathBuf, Box<dyn Error>> {
        let path = dir.join(name);
        Table {
            header: Vec::new(),
            rows: records.to_vec(),
        }
        .write_csv(&path)?;
        Ok(path)
    }

    fn two_level_chunk(periods: &[&str]) -> Vec<Vec<String>> {
        let mut records = vec![
            record(&["", "Auckland (sea)", "Auckland (sea)", "Napier (sea)"]),
            record(&["", "FOB", "Gross weight", "FOB"]),
        ];
        for p in periods {
            records.push(record(&[p, "1", "2", "3"]));
        }
        records
    }

    #[test]
    fn header_rows_detected() -> Result<(), Box<dyn Error>> {
        let a = two_level_chunk(&["2020M01", "2020M02"]);
        let b = two_level_chunk(&["2020M03"]);
        assert_eq!(detect_header_rows(&a, &b)?, 2);
        assert_eq!(detect_header_rows(&a, &a), Err(InfoshareError::IdenticalChunks));
        Ok(())
    }

    #[test]
    fn merge_sorts_descending_and_cleans_up() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let paths = vec![
            write(dir.path(), "cargo__temp0.csv", &two_level_chunk(&["2020M01", "2020M02"]))?,
            write(dir.path(), "cargo__temp1.csv", &two_level_chunk(&["2020M03", "2020M04"]))?,
            write(dir.path(), "cargo__temp2.csv", &two_level_chunk(&["2020M05"]))?,
        ];
        assert_eq!(find_partials(dir.path(), "cargo"), paths);

        let out = dir.path().join("cargo.csv");
        let merged = merge_and_replace(&paths, &out)?;
        assert_eq!(merged.header.len(), 2);
        assert_eq!(
            merged.index(),
            vec!["2020M05", "2020M04", "2020M03", "2020M02", "2020M01"]
        );
        assert!(paths.iter().all(|p| !p.exists()));
        assert_eq!(Table::read_csv(&out, 2)?, merged);
        Ok(())
    }

    #[test]
    fn header_mismatch() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let mut other = two_level_chunk(&["2020M05"]);
        other[1] = record(&["", "CIF", "Gross weight", "CIF"]);
        let paths = vec![
            write(dir.path(), "a__temp0.csv", &two_level_chunk(&["2020M01"]))?,
            write(dir.path(), "a__temp1.csv", &two_level_chunk(&["2020M02"]))?,
            write(dir.path(), "a__temp2.csv", &other)?,
        ];
        let err = merge_partial_csvs(&paths).unwrap_err();
        assert!(err.to_string().starts_with("header rows of"));
        Ok(())
    }

    #[test]
    fn needs_two_chunks() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let one = vec![write(dir.path(), "a__temp0.csv", &two_level_chunk(&["2020M01"]))?];
        let err = merge_partial_csvs(&one).unwrap_err();
        assert_eq!(err.to_string(), "need at least two partial CSVs to merge, got 1");
        Ok(())
    }
}
