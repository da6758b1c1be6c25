use std::{error::Error, path::PathBuf};

use clap::Parser;
use log::info;
use nzstats::{
    config::{load_env, Settings},
    infoshare::{
        download::csv_path,
        merge::{find_partials, merge_and_replace},
    },
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Environment name, e.g., test, prod
    #[arg(short, long, default_value = "prod")]
    env: String,

    /// Dataset file stem, the partials are `<name>__temp0.csv`, `<name>__temp1.csv`, ...
    #[arg(short, long)]
    name: String,

    /// Folder with the partial CSVs, defaults to the Infoshare folder under DATA_DIR
    #[arg(short, long)]
    dir: Option<PathBuf>,
}

/// Merge partial downloads left behind by an interrupted chunked download.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();
    load_env(&args.env)?;

    let dir = match args.dir {
        Some(dir) => dir,
        None => Settings::from_env()?.infoshare_dir(),
    };
    let partials = find_partials(&dir, &args.name);
    info!("Found {} partial CSVs for {}", partials.len(), args.name);
    let merged = merge_and_replace(&partials, &csv_path(&dir, &args.name))?;
    info!("{} rows in {}", merged.rows.len(), args.name);

    Ok(())
}
