use std::error::Error;

use build_html::{Html, Table};
use log::{info, warn};
use reqwest::Response;
use serde_json::json;

use crate::{
    config::Settings,
    releases::calendar::{CalendarEvent, EventDetails},
};

const MAILTRAP_URL: &str = "https://send.api.mailtrap.io/api/send";

/// Send an email using the Mailtrap API
pub async fn send_email(
    api_key: &str,
    from: String,
    to: Vec<String>,
    subject: String,
    text: String,
    html: Option<String>,
) -> Result<Response, reqwest::Error> {
    let to_ = to
        .iter()
        .map(|email| json!({"email": email}))
        .collect::<Vec<_>>();
    let email_payload = json!({
        "from": {"email" : from},
        "to": to_,
        "subject": subject,
        "text": text,
        "html": html,
    });

    let client = reqwest::Client::new();
    let response = client
        .post(MAILTRAP_URL)
        .header("Content-Type", "application/json")
        .header("Api-Token", api_key)
        .body(email_payload.to_string())
        .send()
        .await?;

    Ok(response)
}

pub fn alert_subject(subject: &str) -> String {
    if subject.is_empty() {
        "Alert!! from automation".to_string()
    } else {
        format!("Alert!! from automation - {}", subject)
    }
}

/// Email `message` to the alert addresses.  A rejected send is logged, not raised.
pub async fn email_alert(
    settings: &Settings,
    message: &str,
    subject: &str,
) -> Result<(), Box<dyn Error>> {
    let response = send_email(
        &settings.mailtrap_api_key,
        settings.email_from.clone(),
        settings.alert_email_addresses.clone(),
        alert_subject(subject),
        message.to_string(),
        None,
    )
    .await?;
    log_response(response).await
}

/// Email the releases expected today as an html table, with a plain text fallback.
pub async fn email_release_schedule(
    settings: &Settings,
    events: &[CalendarEvent],
) -> Result<(), Box<dyn Error>> {
    let text = events
        .iter()
        .map(|e| format!("{}  {}", e.start.strftime("%H:%M"), e.title))
        .collect::<Vec<_>>()
        .join("\n");
    let html = format!("<h3>Releases expected today:</h3>{}", release_table(events));
    let response = send_email(
        &settings.mailtrap_api_key,
        settings.email_from.clone(),
        settings.alert_email_addresses.clone(),
        alert_subject("Release schedule"),
        text,
        Some(html),
    )
    .await?;
    log_response(response).await
}

async fn log_response(response: Response) -> Result<(), Box<dyn Error>> {
    if response.status().is_success() {
        info!("Email sent successfully!");
    } else {
        warn!("Failed to send email. Status: {:?}", response.status());
        let body = response.text().await?;
        warn!("Response body: {}", body);
    }
    Ok(())
}

/// Body of the "Data Release Detected" alert.
pub fn release_message(event: &CalendarEvent, details: &EventDetails, element_text: &str) -> String {
    let mut lines = vec![
        format!(
            "Data released for \"{}\" with date \"{}\"",
            event.title,
            details.date_str.as_deref().unwrap_or_default()
        ),
        format!("Expected at: {}", event.start.strftime("%Y-%m-%d %H:%M %Z")),
        format!("Page text: {}", element_text),
    ];
    if let Some(url) = &details.url {
        lines.push(format!("Download from: {}", url));
    }
    if !details.files.is_empty() {
        lines.push(format!("Files: {}", details.files.join(", ")));
    }
    if let Some(script) = &details.script {
        lines.push(format!("Script to run: {}", script));
    }
    lines.join("\n")
}

/// Releases as an html table of title and expected time.
pub fn release_table(events: &[CalendarEvent]) -> String {
    let mut table = Table::new();
    table.add_header_row(vec!["Release", "Expected at"]);
    for event in events {
        table.add_body_row(vec![
            event.title.clone(),
            event.start.strftime("%Y-%m-%d %H:%M %Z").to_string(),
        ]);
    }
    table.to_html_string()
}
