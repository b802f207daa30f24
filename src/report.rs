//! Human and machine readable listings of loaded updates.
use serde::Serialize;

use crate::feed::UpdateRecord;
use crate::platform::Platform;
use crate::util::{one_line, pad_to_width, strip_control_chars, truncate_to_width, validate_url};

const VERSION_WIDTH: usize = 14;
const MODE_WIDTH: usize = 10;
const FLAG_WIDTH: usize = 10;
const TITLE_WIDTH: usize = 48;

#[derive(Serialize)]
struct JsonReport<'a> {
    platform: &'a Platform,
    updates: &'a [UpdateRecord],
}

/// "download" when the update can be installed directly, "browser" when the
/// user has to be sent to the web page.
pub fn install_mode(record: &UpdateRecord) -> &'static str {
    if record.has_download() {
        "download"
    } else {
        "browser"
    }
}

/// Sanitises feed text for a single table cell.
fn cell(text: &str, width: usize) -> String {
    let stripped = strip_control_chars(text);
    let flat = one_line(&stripped);
    truncate_to_width(&flat, width).into_owned()
}

/// Logs a warning for every URL of `record` that is not a usable http(s) URL.
/// Returns how many were found.
pub fn warn_on_bad_urls(record: &UpdateRecord) -> usize {
    let urls = [
        ("download", record.enclosure.as_ref().map(|e| e.download_url.as_str())),
        ("web", record.web_url.as_deref()),
        ("release_notes", record.release_notes_url.as_deref()),
    ];

    let mut bad = 0;
    for (kind, url) in urls {
        let Some(url) = url.filter(|u| !u.is_empty()) else {
            continue;
        };
        if let Err(e) = validate_url(url) {
            tracing::warn!(version = %record.version, kind, url = %url, error = %e, "Appcast entry has an unusable URL");
            bad += 1;
        }
    }
    bad
}

fn header_row() -> String {
    format!(
        "{}{}{}TITLE\n",
        pad_to_width("VERSION", VERSION_WIDTH),
        pad_to_width("MODE", MODE_WIDTH),
        pad_to_width("FLAGS", FLAG_WIDTH),
    )
}

/// One table row plus, when there is one, the URL line beneath it.
fn update_rows(record: &UpdateRecord) -> String {
    let version = cell(record.display_version(), VERSION_WIDTH - 1);
    let flags = if record.critical { "critical" } else { "" };
    let title = record
        .title
        .as_deref()
        .map(|t| cell(t, TITLE_WIDTH))
        .unwrap_or_default();

    let mut rows = format!(
        "{}{}{}{}\n",
        pad_to_width(&version, VERSION_WIDTH),
        pad_to_width(install_mode(record), MODE_WIDTH),
        pad_to_width(flags, FLAG_WIDTH),
        title
    );

    let target = if record.has_download() {
        record.enclosure.as_ref().map(|e| e.download_url.as_str())
    } else {
        record.web_url.as_deref()
    };
    if let Some(url) = target {
        rows.push_str(&format!(
            "{}{}\n",
            " ".repeat(VERSION_WIDTH),
            strip_control_chars(url)
        ));
    }
    rows
}

/// Renders a table with fixed-width columns, one update per row followed by
/// the URL the update would be obtained from.
pub fn render_text(records: &[UpdateRecord], platform: &Platform) -> String {
    if records.is_empty() {
        return format!("No updates available for {platform}\n");
    }

    let rows: String = records.iter().map(update_rows).collect();
    header_row() + &rows
}

/// Renders the platform and the updates as pretty-printed JSON.
pub fn render_json(records: &[UpdateRecord], platform: &Platform) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonReport {
        platform,
        updates: records,
    })
}
