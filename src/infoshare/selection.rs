use std::{collections::BTreeMap, error::Error, fmt, str::FromStr, sync::OnceLock};

use jiff::civil::Date;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::session::{PortalSession, VariableBox};

#[derive(Error, Debug, PartialEq)]
pub enum SelectionError {
    #[error("no options requested for variable '{0}'")]
    MissingVariable(String),
    #[error("variable '{0}' is not on the dataset page")]
    UnknownVariable(String),
    #[error("option '{option}' not available for variable '{title}'")]
    UnknownOption { title: String, option: String },
    #[error("can't parse '{value}' with date format '{format}'")]
    BadDate { value: String, format: String },
    #[error("no dated options to choose from for variable '{0}'")]
    NoDatedOptions(String),
    #[error("selection for variable '{0}' is empty")]
    EmptySelection(String),
}

/// What to select in one variable box.
///
/// Accepted string forms:
/// * `ALL` - every option;
/// * `USE_LATEST_DATETIME<%YM%m>` - the single most recent period, parsing option
///   texts with the given format (e.g. `2021M06`);
/// * `<2013M01>UNTIL_LATEST_DATETIME<%YM%m>` - every period from `2013M01` on;
/// * anything else is taken as one literal option text.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionSpec {
    All,
    Values(Vec<String>),
    Latest { format: String },
    Since { start: String, format: String },
}

fn latest_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^USE_LATEST_DATETIME<(.*)>$").unwrap())
}

fn since_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^<(.*)>UNTIL_LATEST_DATETIME<(.*)>$").unwrap())
}

impl FromStr for OptionSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "ALL" {
            return Ok(OptionSpec::All);
        }
        if let Some(caps) = latest_re().captures(s) {
            return Ok(OptionSpec::Latest {
                format: caps[1].to_string(),
            });
        }
        if let Some(caps) = since_re().captures(s) {
            return Ok(OptionSpec::Since {
                start: caps[1].to_string(),
                format: caps[2].to_string(),
            });
        }
        if s.is_empty() {
            return Err("empty option spec".to_string());
        }
        Ok(OptionSpec::Values(vec![s.to_string()]))
    }
}

impl fmt::Display for OptionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionSpec::All => write!(f, "ALL"),
            OptionSpec::Values(values) => write!(f, "[{}]", values.join(", ")),
            OptionSpec::Latest { format } => write!(f, "USE_LATEST_DATETIME<{}>", format),
            OptionSpec::Since { start, format } => {
                write!(f, "<{}>UNTIL_LATEST_DATETIME<{}>", start, format)
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSpec {
    One(String),
    Many(Vec<String>),
}

// A one-element list holding a pseudo-value (`["USE_LATEST_DATETIME<%YM%m>"]`) means
// the pseudo-value, not a literal option.
impl<'de> Deserialize<'de> for OptionSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawSpec::deserialize(deserializer)? {
            RawSpec::One(s) => s.parse().map_err(serde::de::Error::custom),
            RawSpec::Many(values) => match values.as_slice() {
                [one] => one.parse().map_err(serde::de::Error::custom),
                _ => Ok(OptionSpec::Values(values)),
            },
        }
    }
}

/// The whole request for a dataset page.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    All,
    Variables(BTreeMap<String, OptionSpec>),
}

impl Selection {
    pub fn from_pairs(pairs: &[(&str, OptionSpec)]) -> Selection {
        Selection::Variables(
            pairs
                .iter()
                .map(|(title, spec)| (title.to_string(), spec.clone()))
                .collect(),
        )
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSelection {
    All(String),
    Variables(BTreeMap<String, OptionSpec>),
}

impl<'de> Deserialize<'de> for Selection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawSelection::deserialize(deserializer)? {
            RawSelection::All(s) if s == "ALL" => Ok(Selection::All),
            RawSelection::All(s) => Err(serde::de::Error::custom(format!(
                "expected \"ALL\" or a map of variables, got \"{}\"",
                s
            ))),
            RawSelection::Variables(map) => Ok(Selection::Variables(map)),
        }
    }
}

/// Explicit option texts for one variable box.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVariable {
    pub title: String,
    pub options: Vec<String>,
}

/// Parse a period label such as `2021M06`, `Aug 2021`, `2021` or `2021-06-30`.
/// A format without a month resolves to January, one without a day to the first.
pub fn parse_period(label: &str, format: &str) -> Result<Date, SelectionError> {
    let has_day = ["%d", "%e", "%j"].iter().any(|d| format.contains(d));
    let has_month = ["%m", "%b", "%B", "%h", "%j"].iter().any(|m| format.contains(m));
    let mut fmt = format.to_string();
    let mut text = label.trim().to_string();
    if !has_month {
        fmt.push_str(" %m");
        text.push_str(" 01");
    }
    if !has_day {
        fmt.push_str(" %d");
        text.push_str(" 01");
    }
    Date::strptime(&fmt, &text).map_err(|_| SelectionError::BadDate {
        value: label.to_string(),
        format: format.to_string(),
    })
}

impl OptionSpec {
    fn resolve(&self, vbox: &VariableBox) -> Result<Vec<String>, SelectionError> {
        let available = vbox.options.iter().filter(|o| !o.is_empty());
        match self {
            OptionSpec::All => Ok(available.cloned().collect()),
            OptionSpec::Values(values) => {
                if let Some(missing) = values.iter().find(|v| !vbox.options.contains(v)) {
                    return Err(SelectionError::UnknownOption {
                        title: vbox.title.clone(),
                        option: missing.clone(),
                    });
                }
                Ok(values.clone())
            }
            OptionSpec::Latest { format } => {
                let mut latest: Option<(Date, &String)> = None;
                for option in available {
                    let date = parse_period(option, format)?;
                    if latest.map_or(true, |(d, _)| date > d) {
                        latest = Some((date, option));
                    }
                }
                match latest {
                    Some((_, option)) => Ok(vec![option.clone()]),
                    None => Err(SelectionError::NoDatedOptions(vbox.title.clone())),
                }
            }
            OptionSpec::Since { start, format } => {
                let start = parse_period(start, format)?;
                let mut out = Vec::new();
                for option in available {
                    if parse_period(option, format)? >= start {
                        out.push(option.clone());
                    }
                }
                Ok(out)
            }
        }
    }
}

/// Turn the request into explicit option lists, one per variable box in page order.
pub fn resolve(
    selection: &Selection,
    boxes: &[VariableBox],
) -> Result<Vec<ResolvedVariable>, SelectionError> {
    if let Selection::Variables(map) = selection {
        if let Some(title) = map.keys().find(|t| !boxes.iter().any(|b| &b.title == *t)) {
            return Err(SelectionError::UnknownVariable(title.clone()));
        }
    }
    let mut resolved = Vec::with_capacity(boxes.len());
    for vbox in boxes {
        let spec = match selection {
            Selection::All => OptionSpec::All,
            Selection::Variables(map) => map
                .get(&vbox.title)
                .cloned()
                .ok_or_else(|| SelectionError::MissingVariable(vbox.title.clone()))?,
        };
        let options = spec.resolve(vbox)?;
        if options.is_empty() {
            return Err(SelectionError::EmptySelection(vbox.title.clone()));
        }
        resolved.push(ResolvedVariable {
            title: vbox.title.clone(),
            options,
        });
    }
    Ok(resolved)
}

/// Select every resolved option by its visible text.
pub fn apply<S: PortalSession>(
    session: &mut S,
    resolved: &[ResolvedVariable],
) -> Result<(), Box<dyn Error>> {
    for variable in resolved {
        for option in &variable.options {
            session.select_option(&variable.title, option)?;
        }
    }
    Ok(())
}
