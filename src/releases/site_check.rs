use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

pub const DATE_PLACEHOLDER: &str = "<date_str>";

/// Where to look for the date of the latest release of a click-to-download dataset.
///
/// `text_template` is a regex for the text of the element picked by the CSS
/// `selector`, with `<date_str>` where the release date appears, e.g.
/// `Jobs Online Monthly Unadjusted Series from May 2007 to <date_str>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteCheck {
    pub url: String,
    pub text_template: String,
    pub selector: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// The element shows the expected date.  Carries the element text.
    Updated(String),
    /// The element still shows another date.  Carries the element text.
    NotUpdated(String),
    /// The check could not be made, with the reason.
    Failed(String),
}

impl CheckOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, CheckOutcome::Updated(_))
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Check whether the page shows `date_str` in the element picked by `selector`.
pub fn check_date_str(html: &str, text_template: &str, date_str: &str, selector: &str) -> CheckOutcome {
    if text_template.matches(DATE_PLACEHOLDER).count() != 1 {
        return CheckOutcome::Failed(format!(
            "text_template must contain exactly one '{}' substring",
            DATE_PLACEHOLDER
        ));
    }
    let selector = match Selector::parse(selector) {
        Ok(s) => s,
        Err(e) => return CheckOutcome::Failed(format!("invalid css selector: {:?}", e)),
    };
    let document = Html::parse_document(html);
    let text = match document.select(&selector).next() {
        Some(element) => collapse_whitespace(&element.text().collect::<String>()),
        None => {
            return CheckOutcome::Failed("Could not find HTML element according to css".to_string())
        }
    };

    // any date at all, to catch templates that no longer fit the page
    let any_date = match Regex::new(&text_template.replace(DATE_PLACEHOLDER, ".*")) {
        Ok(re) => re,
        Err(e) => return CheckOutcome::Failed(format!("invalid text_template: {}", e)),
    };
    if !any_date.is_match(&text) {
        return CheckOutcome::Failed("text_template is not valid for the HTML element".to_string());
    }
    let expected = match Regex::new(&text_template.replace(DATE_PLACEHOLDER, &regex::escape(date_str))) {
        Ok(re) => re,
        Err(e) => return CheckOutcome::Failed(format!("invalid text_template: {}", e)),
    };
    if expected.is_match(&text) {
        CheckOutcome::Updated(text)
    } else {
        CheckOutcome::NotUpdated(text)
    }
}

/// Fetch the page and check it.  Network failures come back as `Failed`.
pub async fn fetch_and_check(client: &reqwest::Client, check: &SiteCheck, date_str: &str) -> CheckOutcome {
    let response = match client.get(&check.url).send().await {
        Ok(r) => r,
        Err(e) => return CheckOutcome::Failed(format!("request to {} failed: {}", check.url, e)),
    };
    if !response.status().is_success() {
        return CheckOutcome::Failed(format!("{} returned {}", check.url, response.status()));
    }
    match response.text().await {
        Ok(html) => check_date_str(&html, &check.text_template, date_str, &check.selector),
        Err(e) => CheckOutcome::Failed(format!("invalid body from {}: {}", check.url, e)),
    }
}
