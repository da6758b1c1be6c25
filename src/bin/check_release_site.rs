use std::error::Error;

use clap::Parser;
use log::info;
use nzstats::{
    config::load_env,
    releases::site_check::{fetch_and_check, CheckOutcome, SiteCheck},
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Environment name, e.g., test, prod
    #[arg(short, long, default_value = "prod")]
    env: String,

    #[arg(long)]
    url: String,

    /// Regex for the element text, with `<date_str>` where the date goes
    #[arg(long)]
    text_template: String,

    /// Date to look for, e.g. "August 2021"
    #[arg(long)]
    date_str: String,

    /// CSS selector of the element
    #[arg(long)]
    selector: String,
}

/// Check a release page once and print what it shows.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();
    load_env(&args.env)?;

    let check = SiteCheck {
        url: args.url,
        text_template: args.text_template,
        selector: args.selector,
    };
    let client = reqwest::Client::new();
    match fetch_and_check(&client, &check, &args.date_str).await {
        CheckOutcome::Updated(text) => info!("Updated: {}", text),
        CheckOutcome::NotUpdated(text) => info!("Not updated yet: {}", text),
        CheckOutcome::Failed(reason) => return Err(reason.into()),
    }

    Ok(())
}
