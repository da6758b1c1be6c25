use std::error::Error;

use clap::Parser;
use jiff::tz::TimeZone;
use log::info;
use nzstats::{
    config::{load_env, Settings},
    releases::{calendar::FileCalendar, watcher, DEFAULT_TZ},
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Environment name, e.g., test, prod
    #[arg(short, long, default_value = "prod")]
    env: String,

    /// IANA timezone the release times are reported in
    #[arg(long, default_value = DEFAULT_TZ)]
    tz: String,

    /// Email the releases expected today before watching them
    #[arg(long)]
    email_schedule: bool,
}

/// Run this job at the beginning of the day.  It exits after the last release of
/// the day is detected or the day is over.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();
    load_env(&args.env)?;

    let settings = Settings::from_env()?;
    let tz = TimeZone::get(&args.tz)?;
    let mut calendar = FileCalendar::new(&settings.release_calendar_path());
    info!("Watching releases from {}", settings.release_calendar_path().display());
    watcher::run(&mut calendar, &settings, &tz, args.email_schedule).await?;

    Ok(())
}
