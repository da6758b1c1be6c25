// Reshape raw Infoshare CSVs into the flat, one-row-per-period files the COVID-19
// data portal consumes.

use std::{
    collections::HashMap,
    error::Error,
    fs,
    path::{Path, PathBuf},
};

use itertools::Itertools;
use log::info;

use crate::{
    infoshare::selection::parse_period,
    table::{Table, TableError},
};

pub const MONTHLY_FORMAT: &str = "%YM%m";
pub const PORTAL_DATE_FORMAT: &str = "%d/%m/%Y";
pub const CARGO_DATASETS: [&str; 2] = ["Exports", "Imports"];

/// `2013M01` with format `%YM%m` becomes `01/01/2013`.
pub fn period_to_date(label: &str, format: &str) -> Result<String, Box<dyn Error>> {
    let date = parse_period(label, format)?;
    Ok(date.strftime(PORTAL_DATE_FORMAT).to_string())
}

/// Repeated labels get a `.1`, `.2`, ... suffix in order of appearance.
fn dedup_labels(labels: &[String]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    labels
        .iter()
        .map(|label| {
            let count = seen.entry(label.as_str()).or_insert(0);
            let out = if *count == 0 {
                label.clone()
            } else {
                format!("{}.{}", label, count)
            };
            *count += 1;
            out
        })
        .collect()
}

/// Keep a single header row, taken from `level`, and name the index column.
/// Labels repeated across the dropped levels, e.g. the same observation at two
/// ports, become `FOB`, `FOB.1`.
pub fn flatten_header(table: &Table, level: usize, index_name: &str) -> Result<Table, TableError> {
    let labels = table.column_labels(level)?;
    let mut header = vec![index_name.to_string()];
    header.extend(dedup_labels(labels));
    Ok(Table {
        header: vec![header],
        rows: table.rows.clone(),
    })
}

pub fn reformat_index(table: &mut Table, format: &str) -> Result<(), Box<dyn Error>> {
    for row in table.rows.iter_mut() {
        if let Some(cell) = row.first_mut() {
            *cell = period_to_date(cell, format)?;
        }
    }
    Ok(())
}

/// Prefix the labels of the last header row with `<prefix>_`.
pub fn prefix_columns(table: &mut Table, prefix: &str) {
    if let Some(row) = table.header.last_mut() {
        for label in row.iter_mut().skip(1) {
            *label = format!("{}_{}", prefix, label);
        }
    }
}

/// Inner join on the index column.  Row order follows `left`.
pub fn join_on_index(left: &Table, right: &Table) -> Result<Table, TableError> {
    if left.header.len() != right.header.len() {
        return Err(TableError::DepthMismatch(left.header.len(), right.header.len()));
    }
    let header = left
        .header
        .iter()
        .zip(right.header.iter())
        .map(|(l, r)| l.iter().chain(r.iter().skip(1)).cloned().collect())
        .collect();

    let mut lookup: HashMap<&str, &Vec<String>> = HashMap::new();
    for row in &right.rows {
        if let Some(key) = row.first() {
            lookup.entry(key.as_str()).or_insert(row);
        }
    }
    let rows = left
        .rows
        .iter()
        .filter_map(|l| {
            let key = l.first()?;
            let r = lookup.get(key.as_str())?;
            Some(l.iter().chain(r.iter().skip(1)).cloned().collect())
        })
        .collect();
    Ok(Table { header, rows })
}

/// One table per distinct label of header `level`, in first-seen order.  The split
/// level is dropped from each table's header.
pub fn split_by_header_level(table: &Table, level: usize) -> Result<Vec<(String, Table)>, TableError> {
    let labels = table.column_labels(level)?.to_vec();
    let mut out = Vec::new();
    for key in labels.iter().unique() {
        // +1 for the index column
        let columns: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, l)| *l == key)
            .map(|(i, _)| i + 1)
            .collect();
        let pick = |row: &Vec<String>| -> Vec<String> {
            let mut picked = vec![row.first().cloned().unwrap_or_default()];
            picked.extend(columns.iter().map(|c| row.get(*c).cloned().unwrap_or_default()));
            picked
        };
        let header = table
            .header
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != level)
            .map(|(_, row)| pick(row))
            .collect();
        let rows = table.rows.iter().map(pick).collect();
        out.push((key.clone(), Table { header, rows }));
    }
    Ok(out)
}

fn remove_inputs(paths: &[PathBuf]) -> Result<(), Box<dyn Error>> {
    for path in paths {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Merge `air_cargo_Exports.csv` and `air_cargo_Imports.csv` into the portal file.
pub fn air_cargo(dir: &Path) -> Result<PathBuf, Box<dyn Error>> {
    info!("Merging air cargo");
    let mut inputs = Vec::new();
    let mut merged: Option<Table> = None;
    for dataset in CARGO_DATASETS {
        let path = dir.join(format!("air_cargo_{}.csv", dataset));
        let raw = Table::read_csv(&path, 2)?;
        let mut table = flatten_header(&raw, 1, "Month")?;
        reformat_index(&mut table, MONTHLY_FORMAT)?;
        prefix_columns(&mut table, dataset);
        merged = Some(match merged {
            Some(m) => join_on_index(&m, &table)?,
            None => table,
        });
        inputs.push(path);
    }
    let out = dir.join("COVID-19 - Christchurch Airport traffic statistics.csv");
    merged.unwrap_or_default().write_csv(&out)?;
    remove_inputs(&inputs)?;
    Ok(out)
}

/// Merge sea cargo exports and imports, then write one portal file per port.
pub fn sea_cargo(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    info!("Merging sea cargo (and then splitting by port)");
    let mut inputs = Vec::new();
    let mut by_port: Vec<(String, Table)> = Vec::new();
    for dataset in CARGO_DATASETS {
        let path = dir.join(format!("sea_cargo_{}.csv", dataset));
        let mut raw = Table::read_csv(&path, 2)?;
        reformat_index(&mut raw, MONTHLY_FORMAT)?;
        for (port, mut table) in split_by_header_level(&raw, 0)? {
            table.set_index_name("Month");
            prefix_columns(&mut table, dataset);
            match by_port.iter_mut().find(|(p, _)| *p == port) {
                Some((_, merged)) => *merged = join_on_index(merged, &table)?,
                None => by_port.push((port, table)),
            }
        }
        inputs.push(path);
    }

    let mut outs = Vec::new();
    for (port, table) in by_port {
        let out = dir.join(format!(
            "COVID-19 - Sea cargo {}.csv",
            port.replace(" (sea)", "")
        ));
        table.write_csv(&out)?;
        outs.push(out);
    }
    remove_inputs(&inputs)?;
    Ok(outs)
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;
    use crate::table::{read_records, record};

    fn cargo_table(observation: &str) -> Table {
        Table {
            header: vec![
                record(&["", "Auckland (sea)", "Auckland (sea)", "Napier (sea)", "Napier (sea)"]),
                record(&["", observation, "Gross weight (tonnes)", observation, "Gross weight (tonnes)"]),
            ],
            rows: vec![
                record(&["2021M02", "10", "11", "20", "21"]),
                record(&["2021M01", "12", "13", "22", "23"]),
            ],
        }
    }

    #[test]
    fn periods() -> Result<(), Box<dyn Error>> {
        assert_eq!(period_to_date("2013M01", MONTHLY_FORMAT)?, "01/01/2013");
        assert_eq!(period_to_date("2021M12", MONTHLY_FORMAT)?, "01/12/2021");
        assert!(period_to_date("2021Q4", MONTHLY_FORMAT).is_err());
        Ok(())
    }

    #[test]
    fn flatten_and_prefix() -> Result<(), Box<dyn Error>> {
        let mut table = flatten_header(&cargo_table("FOB"), 1, "Month")?;
        prefix_columns(&mut table, "Exports");
        assert_eq!(
            table.header,
            vec![record(&[
                "Month",
                "Exports_FOB",
                "Exports_Gross weight (tonnes)",
                "Exports_FOB.1",
                "Exports_Gross weight (tonnes).1"
            ])]
        );
        Ok(())
    }

    #[test]
    fn inner_join() -> Result<(), Box<dyn Error>> {
        let left = Table {
            header: vec![record(&["Month", "a"])],
            rows: vec![record(&["m1", "1"]), record(&["m2", "2"]), record(&["m3", "3"])],
        };
        let right = Table {
            header: vec![record(&["Month", "b"])],
            rows: vec![record(&["m3", "30"]), record(&["m1", "10"])],
        };
        let joined = join_on_index(&left, &right)?;
        assert_eq!(joined.header, vec![record(&["Month", "a", "b"])]);
        assert_eq!(joined.rows, vec![record(&["m1", "1", "10"]), record(&["m3", "3", "30"])]);

        let deeper = cargo_table("FOB");
        assert_eq!(join_on_index(&left, &deeper), Err(TableError::DepthMismatch(1, 2)));
        Ok(())
    }

    #[test]
    fn split_ports() -> Result<(), Box<dyn Error>> {
        let parts = split_by_header_level(&cargo_table("FOB"), 0)?;
        assert_eq!(parts.len(), 2);
        let (port, table) = &parts[1];
        assert_eq!(port, "Napier (sea)");
        assert_eq!(table.header, vec![record(&["", "FOB", "Gross weight (tonnes)"])]);
        assert_eq!(table.rows[1], record(&["2021M01", "22", "23"]));
        Ok(())
    }

    #[test]
    fn sea_cargo_files() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        cargo_table("FOB").write_csv(&dir.path().join("sea_cargo_Exports.csv"))?;
        cargo_table("CIF").write_csv(&dir.path().join("sea_cargo_Imports.csv"))?;

        let outs = sea_cargo(dir.path())?;
        assert_eq!(
            outs,
            vec![
                dir.path().join("COVID-19 - Sea cargo Auckland.csv"),
                dir.path().join("COVID-19 - Sea cargo Napier.csv"),
            ]
        );
        let napier = read_records(&outs[1])?;
        assert_eq!(
            napier[0],
            record(&[
                "Month",
                "Exports_FOB",
                "Exports_Gross weight (tonnes)",
                "Imports_CIF",
                "Imports_Gross weight (tonnes)"
            ])
        );
        assert_eq!(napier[1], record(&["01/02/2021", "20", "21", "20", "21"]));
        assert!(!dir.path().join("sea_cargo_Exports.csv").exists());
        Ok(())
    }

    #[test]
    fn air_cargo_file() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let single_port = |observation: &str| Table {
            header: vec![
                record(&["", "Christchurch Airport", "Christchurch Airport"]),
                record(&["", observation, "Gross weight (tonnes)"]),
            ],
            rows: vec![record(&["2021M01", "5", "6"])],
        };
        single_port("FOB").write_csv(&dir.path().join("air_cargo_Exports.csv"))?;
        single_port("CIF").write_csv(&dir.path().join("air_cargo_Imports.csv"))?;

        let out = air_cargo(dir.path())?;
        let records = read_records(&out)?;
        assert_eq!(
            records,
            vec![
                record(&[
                    "Month",
                    "Exports_FOB",
                    "Exports_Gross weight (tonnes)",
                    "Imports_CIF",
                    "Imports_Gross weight (tonnes)"
                ]),
                record(&["01/01/2021", "5", "6", "5", "6"]),
            ]
        );
        Ok(())
    }

    #[test]
    fn air_cargo_two_ports() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let two_ports = |observation: &str| Table {
            header: vec![
                record(&["", "Christchurch Airport", "Auckland Airport"]),
                record(&["", observation, observation]),
            ],
            rows: vec![record(&["2021M01", "5", "7"])],
        };
        two_ports("FOB").write_csv(&dir.path().join("air_cargo_Exports.csv"))?;
        two_ports("CIF").write_csv(&dir.path().join("air_cargo_Imports.csv"))?;

        let records = read_records(&air_cargo(dir.path())?)?;
        assert_eq!(
            records[0],
            record(&["Month", "Exports_FOB", "Exports_FOB.1", "Imports_CIF", "Imports_CIF.1"])
        );
        assert_eq!(records[1], record(&["01/01/2021", "5", "7", "5", "7"]));
        Ok(())
    }
}
