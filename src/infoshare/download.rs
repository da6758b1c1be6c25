use std::{
    error::Error,
    fs,
    path::{Path, PathBuf},
};

use log::info;
use serde::Deserialize;

use crate::{
    session::{PortalSession, SessionConfig, SessionFactory, INFOSHARE_URL, TEXT_CSV},
    table::Table,
};

use super::{
    chunk::{plan_chunks, CELL_BUDGET, SPLIT_VARIABLE},
    merge::{merge_and_replace, partial_name},
    navigate::{navigate_to_dataset, DatasetRef},
    selection::{apply, resolve, ResolvedVariable, Selection},
};

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOptions {
    pub show_status_flags: bool,
    pub get_metadata: bool,
    pub cell_budget: u64,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        DownloadOptions {
            show_status_flags: false,
            get_metadata: false,
            cell_budget: CELL_BUDGET,
        }
    }
}

/// One dataset to fetch.  `name` is the output file stem, without extension.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatasetRequest {
    pub dataset_ref: DatasetRef,
    pub selection: Selection,
    pub name: String,
}

pub fn csv_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.csv", name))
}

pub fn metadata_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}__meta.txt", name))
}

/// Trim, collapse runs of blank lines, and end with exactly one newline.
/// `\r\n` line ends come out as `\n`, and a line holding only a `\r` counts as blank.
pub fn clean_metadata(text: &str) -> String {
    let mut out = text
        .trim()
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    out.push('\n');
    out
}

/// Download a dataset into `<save_dir>/<name>.csv`.
///
/// When the selection is larger than the cell budget the request is split along
/// the time axis.  Each chunk is fetched in a fresh session into
/// `<name>__temp<i>.csv`, then the chunks are merged and the partial files removed.
pub fn get_infoshare_dataset<F: SessionFactory>(
    factory: &F,
    save_dir: &Path,
    request: &DatasetRequest,
    options: &DownloadOptions,
) -> Result<PathBuf, Box<dyn Error>> {
    info!("{}", request.name);
    let config = SessionConfig::new(save_dir, &[TEXT_CSV])?;
    let out = csv_path(save_dir, &request.name);

    let chunks = in_session(factory, &config, &request.dataset_ref, |session| {
        let boxes = session.variable_boxes()?;
        let resolved = resolve(&request.selection, &boxes)?;
        let chunks = plan_chunks(&resolved, options.cell_budget, SPLIT_VARIABLE)?;
        if chunks.len() == 1 {
            download_selection(
                session,
                &resolved,
                save_dir,
                &request.name,
                options.show_status_flags,
                options.get_metadata,
            )?;
        }
        Ok(chunks)
    })?;
    if chunks.len() == 1 {
        return Ok(out);
    }

    info!("Downloading in {} partial-CSVs and then merging.", chunks.len());
    let mut partials = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let name = partial_name(&request.name, i);
        in_session(factory, &config, &request.dataset_ref, |session| {
            // the footnotes are the same for every chunk, keep the first
            download_selection(
                session,
                chunk,
                save_dir,
                &name,
                options.show_status_flags,
                options.get_metadata && i == 0,
            )
        })?;
        partials.push(csv_path(save_dir, &name));
    }

    merge_and_replace(&partials, &out)?;
    if options.get_metadata {
        fs::rename(
            metadata_path(save_dir, &partial_name(&request.name, 0)),
            metadata_path(save_dir, &request.name),
        )?;
    }
    info!("{} - Finished", request.name);
    Ok(out)
}

/// Open a session on the dataset page and run `work` in it.  The session is
/// closed whether or not `work` succeeds.
fn in_session<F, T>(
    factory: &F,
    config: &SessionConfig,
    dataset_ref: &DatasetRef,
    work: impl FnOnce(&mut F::Session) -> Result<T, Box<dyn Error>>,
) -> Result<T, Box<dyn Error>>
where
    F: SessionFactory,
{
    let mut session = factory.open(config, INFOSHARE_URL)?;
    let result = navigate_to_dataset(&mut session, dataset_ref).and_then(|_| work(&mut session));
    let closed = session.close();
    let value = result?;
    closed?;
    Ok(value)
}

/// Make the selections on an open dataset page, then save the rendered table.
fn download_selection<S: PortalSession>(
    session: &mut S,
    resolved: &[ResolvedVariable],
    save_dir: &Path,
    name: &str,
    show_status_flags: bool,
    get_metadata: bool,
) -> Result<(), Box<dyn Error>> {
    apply(session, resolved)?;
    session.submit()?;
    if show_status_flags {
        session.show_status_flags()?;
    }

    let grid = session.data_table()?;
    Table::from_records(grid, 0)?.write_csv(&csv_path(save_dir, name))?;

    if get_metadata {
        let text = clean_metadata(&session.metadata_text()?);
        fs::write(metadata_path(save_dir, name), text)?;
    }
    Ok(())
}
