use std::error::Error;

use clap::Parser;
use nzstats::{
    config::{load_env, Settings},
    utils::send_email::email_alert,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Environment name, e.g., test, prod
    #[arg(short, long, default_value = "prod")]
    env: String,

    #[arg(short, long, default_value = "Test Email")]
    subject: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();
    load_env(&args.env)?;

    let settings = Settings::from_env()?;
    email_alert(
        &settings,
        "This is a test email using Rust and Mailtrap API!",
        &args.subject,
    )
    .await?;

    Ok(())
}
