use chrono::{DateTime, FixedOffset};
use thiserror::Error;

use super::item::{Enclosure, UpdateRecord};
use super::parser::{Candidate, CandidateEnclosure};
use crate::platform::Platform;

/// Why an item was left out of the result. Only ever logged.
#[derive(Debug, Error)]
enum SkipReason {
    #[error("all {0} enclosure(s) target another OS")]
    ForeignOs(usize),
    #[error("requires OS version {0}")]
    OsTooOld(String),
    #[error("no version")]
    MissingVersion,
    #[error("neither a download nor a web URL")]
    NoDownloadOrWebUrl,
}

/// Turns parsed candidates into the update records that apply to `platform`.
///
/// Items are dropped, never reported, when:
/// - every enclosure declares a `sparkle:os` this platform does not match
/// - the platform's OS version is known and below `sparkle:minimumSystemVersion`
/// - no version is given on the item or its selected enclosure
/// - there is neither a usable enclosure URL nor a `link`
///
/// The surviving records keep the order of `candidates` and all satisfy
/// [`UpdateRecord::is_valid`].
pub fn select_applicable(candidates: Vec<Candidate>, platform: &Platform) -> Vec<UpdateRecord> {
    candidates
        .into_iter()
        .enumerate()
        .filter_map(|(index, candidate)| match into_record(candidate, platform) {
            Ok(record) => Some(record),
            Err(reason) => {
                tracing::debug!(item = index, platform = %platform, reason = %reason, "Skipping appcast item");
                None
            }
        })
        .collect()
}

fn into_record(candidate: Candidate, platform: &Platform) -> Result<UpdateRecord, SkipReason> {
    if let Some(min) = candidate.min_os_version.as_deref() {
        if !platform.accepts_min_os_version(min) {
            return Err(SkipReason::OsTooOld(min.to_owned()));
        }
    }

    let selected = select_enclosure(candidate.enclosures, platform)?;

    let version = candidate
        .version
        .or_else(|| selected.as_ref().and_then(|s| s.version.clone()))
        .unwrap_or_default();
    if version.is_empty() {
        return Err(SkipReason::MissingVersion);
    }

    let short_version = candidate
        .short_version
        .or_else(|| selected.as_ref().and_then(|s| s.short_version.clone()));

    let record = UpdateRecord {
        version,
        short_version,
        release_notes_url: candidate.release_notes_link,
        web_url: candidate.link,
        title: candidate.title,
        description: candidate.description,
        min_os_version: candidate.min_os_version,
        critical: candidate.critical,
        pub_date: candidate.pub_date.as_deref().and_then(parse_pub_date),
        enclosure: selected.map(|s| s.enclosure).filter(Enclosure::is_valid),
    };

    if record.is_valid() {
        Ok(record)
    } else {
        Err(SkipReason::NoDownloadOrWebUrl)
    }
}

/// Picks the enclosure to install on `platform`.
///
/// Enclosures without a `sparkle:os` apply everywhere. Among the applicable
/// ones, the first with a URL wins, falling back to the first applicable.
/// `Ok(None)` means the item has no enclosures at all.
fn select_enclosure(
    enclosures: Vec<CandidateEnclosure>,
    platform: &Platform,
) -> Result<Option<CandidateEnclosure>, SkipReason> {
    if enclosures.is_empty() {
        return Ok(None);
    }

    let total = enclosures.len();
    let mut applicable: Vec<CandidateEnclosure> = enclosures
        .into_iter()
        .filter(|c| {
            c.enclosure
                .os
                .as_deref()
                .map_or(true, |tag| platform.matches_os_tag(tag))
        })
        .collect();

    if applicable.is_empty() {
        return Err(SkipReason::ForeignOs(total));
    }

    let pick = applicable
        .iter()
        .position(|c| c.enclosure.is_valid())
        .unwrap_or(0);
    Ok(Some(applicable.swap_remove(pick)))
}

/// RSS dates are RFC 2822; some generators emit RFC 3339 instead.
fn parse_pub_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map_err(|e| {
            tracing::debug!(pub_date = %raw, error = %e, "Ignoring unparseable pubDate");
        })
        .ok()
}
