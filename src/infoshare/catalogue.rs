use std::{
    error::Error,
    fs,
    path::{Path, PathBuf},
};

use log::{error, info};

use crate::session::{
    CatalogueNode, PortalSession, SessionConfig, SessionFactory, INFOSHARE_URL, TEXT_CSV,
};

use super::{
    download::{get_infoshare_dataset, DatasetRequest, DownloadOptions},
    navigate::DatasetRef,
    selection::Selection,
};

pub const CATALOGUE_FILE: &str = "00_datasets_catalogue.csv";

/// Second-level entries that hold tables directly under a category rather than
/// being a group of datasets.  They need custom handling and are skipped.
pub const PSEUDO_GROUPS: [&str; 4] = [
    "Harmonised Trade - Exports",
    "Harmonised Trade - Imports",
    "Harmonised Trade - Re-exports",
    "International Travel and Migration: To access tables, please refer to this subject under the Tourism category.",
];

pub fn flatten_catalogue(nodes: &[CatalogueNode]) -> Vec<DatasetRef> {
    let mut refs = Vec::new();
    for category in nodes {
        for group in &category.children {
            if PSEUDO_GROUPS.contains(&group.name.as_str()) {
                info!("  > {}: skipping", group.name);
                continue;
            }
            for dataset in &group.children {
                refs.push(DatasetRef::new(&category.name, &group.name, &dataset.name));
            }
        }
    }
    refs
}

/// Walk the whole browse tree and list every dataset.
pub fn find_all_datasets<F: SessionFactory>(
    factory: &F,
    save_dir: &Path,
) -> Result<Vec<DatasetRef>, Box<dyn Error>> {
    let config = SessionConfig::new(save_dir, &[TEXT_CSV])?;
    let mut session = factory.open(&config, INFOSHARE_URL)?;
    let nodes = session.catalogue();
    session.close()?;
    let nodes = nodes?;
    info!("--- Finding all datasets from {} categories ---", nodes.len());
    let refs = flatten_catalogue(&nodes);
    info!("--- Found all {} datasets ---", refs.len());
    Ok(refs)
}

/// Output file stem for a dataset: `category__group__dataset`, with `/` replaced.
pub fn dataset_file_name(dataset_ref: &DatasetRef) -> String {
    [
        dataset_ref.category.as_str(),
        dataset_ref.group.as_str(),
        dataset_ref.dataset.as_str(),
    ]
    .join("__")
    .replace('/', " ")
}

pub fn write_catalogue(dir: &Path, refs: &[DatasetRef]) -> Result<PathBuf, Box<dyn Error>> {
    fs::create_dir_all(dir)?;
    let path = dir.join(CATALOGUE_FILE);
    let mut wtr = csv::Writer::from_path(&path)?;
    wtr.write_record(["category", "group", "dataset"])?;
    for r in refs {
        wtr.write_record([&r.category, &r.group, &r.dataset])?;
    }
    wtr.flush()?;
    Ok(path)
}

#[derive(Debug, Default)]
pub struct ScrapeSummary {
    pub downloaded: Vec<PathBuf>,
    pub failed: Vec<(DatasetRef, String)>,
}

/// Download every dataset on the portal with all options selected, status flags
/// shown and footnotes saved.  A failing dataset is logged and the crawl goes on.
pub fn scrape_all<F: SessionFactory>(
    factory: &F,
    save_dir: &Path,
) -> Result<ScrapeSummary, Box<dyn Error>> {
    let refs = find_all_datasets(factory, save_dir)?;
    write_catalogue(save_dir, &refs)?;

    let options = DownloadOptions {
        show_status_flags: true,
        get_metadata: true,
        ..DownloadOptions::default()
    };
    let mut summary = ScrapeSummary::default();
    for dataset_ref in refs {
        let request = DatasetRequest {
            name: dataset_file_name(&dataset_ref),
            dataset_ref,
            selection: Selection::All,
        };
        match get_infoshare_dataset(factory, save_dir, &request, &options) {
            Ok(path) => summary.downloaded.push(path),
            Err(e) => {
                error!("Failed to download {}: {}", request.dataset_ref, e);
                summary.failed.push((request.dataset_ref, e.to_string()));
            }
        }
    }
    info!(
        "SCRAPED ALL: {} downloaded, {} failed",
        summary.downloaded.len(),
        summary.failed.len()
    );
    Ok(summary)
}
