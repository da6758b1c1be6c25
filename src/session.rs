// The boundary between the download logic and whatever drives the portal UI.
// A browser-automation backend implements `SessionFactory` + `PortalSession`.

use std::{
    error::Error,
    fmt,
    path::{Path, PathBuf},
};

use crate::infoshare::InfoshareError;

pub const INFOSHARE_URL: &str = "http://infoshare.stats.govt.nz/";
pub const TEXT_CSV: &str = "text/csv";

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub download_dir: PathBuf,
    pub download_mime_types: Vec<String>,
    pub headless: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PreferenceValue {
    Int(i64),
    Bool(bool),
    Str(String),
}

impl fmt::Display for PreferenceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreferenceValue::Int(v) => write!(f, "{}", v),
            PreferenceValue::Bool(v) => write!(f, "{}", v),
            PreferenceValue::Str(v) => write!(f, "{}", v),
        }
    }
}

impl SessionConfig {
    /// The download directory must be absolute, browsers silently ignore relative ones.
    pub fn new(download_dir: &Path, mime_types: &[&str]) -> Result<SessionConfig, InfoshareError> {
        if !download_dir.is_absolute() {
            return Err(InfoshareError::RelativeDownloadDir(
                download_dir.display().to_string(),
            ));
        }
        Ok(SessionConfig {
            download_dir: download_dir.to_path_buf(),
            download_mime_types: mime_types.iter().map(|s| s.to_string()).collect(),
            headless: true,
        })
    }

    /// Profile preferences needed so that click-to-download files land in
    /// `download_dir` without a save dialog.
    pub fn profile_preferences(&self) -> Vec<(&'static str, PreferenceValue)> {
        vec![
            ("browser.download.folderList", PreferenceValue::Int(2)),
            (
                "browser.download.manager.showWhenStarting",
                PreferenceValue::Bool(false),
            ),
            (
                "browser.download.dir",
                PreferenceValue::Str(self.download_dir.display().to_string()),
            ),
            (
                "browser.helperApps.neverAsk.saveToDisk",
                PreferenceValue::Str(self.download_mime_types.join(",")),
            ),
        ]
    }

    pub fn browser_args(&self) -> Vec<&'static str> {
        if self.headless {
            vec!["--headless"]
        } else {
            vec![]
        }
    }
}

/// The three levels of the Infoshare browse tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeLevel {
    Category,
    Group,
    Dataset,
}

/// One "select variables" block on a dataset page: its heading and the texts of
/// the options in its list box, in page order.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableBox {
    pub title: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CatalogueNode {
    pub name: String,
    pub children: Vec<CatalogueNode>,
}

impl CatalogueNode {
    pub fn leaf(name: &str) -> CatalogueNode {
        CatalogueNode {
            name: name.to_string(),
            children: Vec::new(),
        }
    }

    pub fn branch(name: &str, children: Vec<CatalogueNode>) -> CatalogueNode {
        CatalogueNode {
            name: name.to_string(),
            children,
        }
    }
}

pub trait PortalSession {
    /// Click the first node at `level` whose text contains `label`.
    /// Return `false` if no such node shows up in time.
    fn click_tree_node(&mut self, level: TreeLevel, label: &str) -> Result<bool, Box<dyn Error>>;

    fn variable_boxes(&mut self) -> Result<Vec<VariableBox>, Box<dyn Error>>;

    fn select_option(&mut self, title: &str, option: &str) -> Result<(), Box<dyn Error>>;

    /// Press "Go", accepting the large-table warning if the portal raises one.
    fn submit(&mut self) -> Result<(), Box<dyn Error>>;

    fn show_status_flags(&mut self) -> Result<(), Box<dyn Error>>;

    /// The data table of the current view, header rows first.
    fn data_table(&mut self) -> Result<Vec<Vec<String>>, Box<dyn Error>>;

    /// The footnote text that accompanies the data table.
    fn metadata_text(&mut self) -> Result<String, Box<dyn Error>>;

    /// The browse tree: categories, their groups, and the groups' datasets.
    fn catalogue(&mut self) -> Result<Vec<CatalogueNode>, Box<dyn Error>>;

    fn close(self) -> Result<(), Box<dyn Error>>
    where
        Self: Sized;
}

pub trait SessionFactory {
    type Session: PortalSession;

    /// Start a fresh session on the portal landing page.
    fn open(&self, config: &SessionConfig, url: &str) -> Result<Self::Session, Box<dyn Error>>;
}
