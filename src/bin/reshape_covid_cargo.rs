use std::error::Error;

use clap::Parser;
use log::info;
use nzstats::{
    config::{load_env, Settings},
    reshape::{air_cargo, sea_cargo},
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Environment name, e.g., test, prod
    #[arg(short, long, default_value = "prod")]
    env: String,
}

/// Run after the cargo datasets are downloaded into the COVID-19 portal folder.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();
    load_env(&args.env)?;

    let dir = Settings::from_env()?.covid_portal_dir();
    let air = air_cargo(&dir)?;
    info!("Wrote {}", air.display());
    for path in sea_cargo(&dir)? {
        info!("Wrote {}", path.display());
    }

    Ok(())
}
