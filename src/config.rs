use std::{env, error::Error, path::{Path, PathBuf}};

/// Everything the jobs read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub config_dir: PathBuf,
    pub email_from: String,
    pub alert_email_addresses: Vec<String>,
    pub mailtrap_api_key: String,
}

/// Load `.env/{env}.env`, e.g. `prod` or `test`.
pub fn load_env(env: &str) -> Result<PathBuf, Box<dyn Error>> {
    let path = PathBuf::from(format!(".env/{}.env", env));
    dotenvy::from_path(&path)
        .map_err(|e| format!("failed to load environment file {}: {}", path.display(), e))?;
    Ok(path)
}

pub fn parse_addresses(s: &str) -> Vec<String> {
    s.split(',')
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .map(|a| a.to_string())
        .collect()
}

fn var(name: &str) -> Result<String, Box<dyn Error>> {
    env::var(name).map_err(|e| format!("{}: {}", name, e).into())
}

impl Settings {
    pub fn from_env() -> Result<Settings, Box<dyn Error>> {
        Ok(Settings {
            data_dir: PathBuf::from(var("DATA_DIR")?),
            config_dir: PathBuf::from(var("CONFIG_DIR")?),
            email_from: var("EMAIL_FROM")?,
            alert_email_addresses: parse_addresses(&var("ALERT_EMAIL_ADDRESSES")?),
            mailtrap_api_key: var("MAILTRAP_API_KEY")?,
        })
    }

    pub fn with_dirs(data_dir: &Path, config_dir: &Path) -> Settings {
        Settings {
            data_dir: data_dir.to_path_buf(),
            config_dir: config_dir.to_path_buf(),
            email_from: String::new(),
            alert_email_addresses: Vec::new(),
            mailtrap_api_key: String::new(),
        }
    }

    /// Where a full portal scrape lands.
    pub fn infoshare_dir(&self) -> PathBuf {
        self.data_dir.join("all_infoshare")
    }

    pub fn covid_portal_dir(&self) -> PathBuf {
        self.data_dir.join("covid_portal_raw").join("Infoshare")
    }

    pub fn release_calendar_path(&self) -> PathBuf {
        self.config_dir.join("release_calendar.json")
    }

    pub fn next_day_summary_path(&self) -> PathBuf {
        self.config_dir.join("next_day.json")
    }
}
