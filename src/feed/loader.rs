use super::filter::select_applicable;
use super::item::UpdateRecord;
use super::parser::{parse_candidates, AppcastError};
use crate::platform::Platform;

/// Loads every update in an appcast that applies to the running platform,
/// including its OS version when [`Platform::current`] can detect it.
///
/// The list is in feed order without any additional sorting. Items that do
/// not apply (another OS, too old an OS, no version, nothing to download or
/// open) are left out. An empty list means the feed was fine but offered
/// nothing usable.
///
/// # Errors
///
/// Returns [`AppcastError`] if `xml` is not a well-formed document.
pub fn load(xml: &str) -> Result<Vec<UpdateRecord>, AppcastError> {
    load_for(xml, &Platform::current())
}

/// Same as [`load`], with an explicit platform.
///
/// # Errors
///
/// Returns [`AppcastError`] if `xml` is not a well-formed document.
pub fn load_for(xml: &str, platform: &Platform) -> Result<Vec<UpdateRecord>, AppcastError> {
    let candidates = parse_candidates(xml)?;
    let total = candidates.len();
    let records = select_applicable(candidates, platform);

    tracing::debug!(
        items = total,
        applicable = records.len(),
        platform = %platform,
        "Loaded appcast"
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SPARKLE: &str = "http://www.andymatuschak.org/xml-namespaces/sparkle";

    fn feed(items: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<rss version="2.0" xmlns:sparkle="{SPARKLE}">
  <channel>
    <title>App Changelog</title>
    {items}
  </channel>
</rss>"#
        )
    }

    fn windows() -> Platform {
        Platform::new("windows", "x64")
    }

    #[test]
    fn test_download_for_current_os() {
        let xml = feed(
            r#"<item>
      <sparkle:version>2.0</sparkle:version>
      <enclosure url="https://x/u.exe" sparkle:os="windows"/>
    </item>"#,
        );

        let records = load_for(&xml, &windows()).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_valid());
        assert!(records[0].has_download());
    }

    #[test]
    fn test_foreign_os_yields_nothing() {
        let xml = feed(
            r#"<item>
      <sparkle:version>2.0</sparkle:version>
      <enclosure url="https://x/u.dmg" sparkle:os="macos"/>
    </item>"#,
        );

        assert!(load_for(&xml, &windows()).unwrap().is_empty());
    }

    #[test]
    fn test_web_only_update() {
        let xml = feed(
            r#"<item>
      <sparkle:version>2.0</sparkle:version>
      <link>https://x/notes</link>
    </item>"#,
        );

        let records = load_for(&xml, &windows()).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_valid());
        assert!(!records[0].has_download());
        assert_eq!(records[0].web_url.as_deref(), Some("https://x/notes"));
    }

    #[test]
    fn test_missing_version_dropped() {
        let xml = feed(r#"<item><enclosure url="https://x/u.exe" sparkle:os="windows"/></item>"#);
        assert!(load_for(&xml, &windows()).unwrap().is_empty());
    }

    #[test]
    fn test_order_preserved_around_dropped_item() {
        let xml = feed(
            r#"<item>
      <title>A</title>
      <sparkle:version>1.0</sparkle:version>
      <enclosure url="https://x/a.exe"/>
    </item>
    <item>
      <title>B</title>
      <enclosure url="https://x/b.exe"/>
    </item>
    <item>
      <title>C</title>
      <sparkle:version>0.9</sparkle:version>
      <link>https://x/c</link>
    </item>"#,
        );

        let titles: Vec<_> = load_for(&xml, &windows())
            .unwrap()
            .into_iter()
            .map(|r| r.title.unwrap_or_default())
            .collect();
        assert_eq!(titles, vec!["A", "C"]);
    }

    #[test]
    fn test_truncated_feed_fails() {
        let xml = feed(r#"<item><sparkle:version>2.0</sparkle:version>"#);
        let truncated = &xml[..xml.find("</channel>").unwrap()];
        assert!(load_for(truncated, &windows()).is_err());
    }

    #[test]
    fn test_empty_feed_is_not_an_error() {
        assert!(load_for(&feed(""), &windows()).unwrap().is_empty());
    }

    #[test]
    fn test_load_uses_current_platform() {
        let xml = feed(
            r#"<item>
      <sparkle:version>2.0</sparkle:version>
      <enclosure url="https://x/u.bin"/>
    </item>
    <item>
      <sparkle:version>2.0</sparkle:version>
      <enclosure url="https://x/u.bin" sparkle:os="no-such-os"/>
    </item>"#,
        );

        assert_eq!(load(&xml).unwrap().len(), 1);
    }

    #[test]
    fn test_load_applies_detected_os_version() {
        let xml = feed(
            r#"<item>
      <sparkle:version>2.0</sparkle:version>
      <sparkle:minimumSystemVersion>999</sparkle:minimumSystemVersion>
      <link>https://x/download</link>
    </item>"#,
        );

        let records = load(&xml).unwrap();
        match Platform::current().version() {
            Some(_) => assert_eq!(records, vec![]),
            // Nothing to compare against on this host
            None => assert_eq!(records.len(), 1),
        }
    }
}
