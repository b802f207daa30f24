use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// A directly downloadable installer payload offered by an appcast item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Enclosure {
    /// URL of the installer. Empty means there is nothing to download.
    pub download_url: String,
    /// `sparkle:dsaSignature` of the payload
    pub dsa_signature: Option<String>,
    /// `sparkle:edSignature` of the payload
    pub eddsa_signature: Option<String>,
    /// Target OS tag (`sparkle:os`), e.g. `windows` or `windows-x64`
    pub os: Option<String>,
    /// Arguments passed on to the installer executable
    pub installer_arguments: Option<String>,
    /// Payload size in bytes as advertised by the feed
    pub length: Option<u64>,
    /// MIME type of the payload
    pub mime_type: Option<String>,
}

impl Enclosure {
    pub fn is_valid(&self) -> bool {
        !self.download_url.is_empty()
    }
}

/// One update offered by an appcast feed.
///
/// Records returned by [`crate::feed::load`] always satisfy [`is_valid`](Self::is_valid).
/// The predicates read the current field values on every call, so a record
/// modified after loading reports its new state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateRecord {
    /// Machine-comparable version (`sparkle:version`)
    pub version: String,
    /// Human-readable version (`sparkle:shortVersionString`)
    pub short_version: Option<String>,
    /// Release notes page (`sparkle:releaseNotesLink`)
    pub release_notes_url: Option<String>,
    /// Page to open in a browser instead of installing (`link`)
    pub web_url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// `sparkle:minimumSystemVersion`
    pub min_os_version: Option<String>,
    pub critical: bool,
    pub pub_date: Option<DateTime<FixedOffset>>,
    pub enclosure: Option<Enclosure>,
}

impl UpdateRecord {
    /// True when the update can be downloaded and installed directly.
    /// False means the caller should send the user to [`web_url`](Self::web_url).
    pub fn has_download(&self) -> bool {
        self.enclosure.as_ref().is_some_and(Enclosure::is_valid)
    }

    /// True when the record has a version and some way to obtain the update.
    pub fn is_valid(&self) -> bool {
        !self.version.is_empty() && (self.has_download() || self.has_web_url())
    }

    /// Short version when the feed provides one, otherwise the version.
    pub fn display_version(&self) -> &str {
        self.short_version
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.version)
    }

    fn has_web_url(&self) -> bool {
        self.web_url.as_deref().is_some_and(|url| !url.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enclosure(url: &str) -> Enclosure {
        Enclosure {
            download_url: url.to_string(),
            ..Default::default()
        }
    }

    fn record(version: &str, enclosure: Option<Enclosure>, web_url: Option<&str>) -> UpdateRecord {
        UpdateRecord {
            version: version.to_string(),
            web_url: web_url.map(str::to_string),
            enclosure,
            ..Default::default()
        }
    }

    #[test]
    fn test_enclosure_validity_follows_url() {
        assert!(enclosure("https://x/u.exe").is_valid());
        assert!(!enclosure("").is_valid());
    }

    #[test]
    fn test_record_with_download() {
        let r = record("2.0", Some(enclosure("https://x/u.exe")), None);
        assert!(r.has_download());
        assert!(r.is_valid());
    }

    #[test]
    fn test_record_with_web_url_only() {
        let r = record("2.0", None, Some("https://x/notes"));
        assert!(!r.has_download());
        assert!(r.is_valid());
    }

    #[test]
    fn test_record_with_empty_enclosure_and_no_web_url_is_invalid() {
        let r = record("2.0", Some(enclosure("")), None);
        assert!(!r.has_download());
        assert!(!r.is_valid());
    }

    #[test]
    fn test_record_without_version_is_invalid() {
        let r = record("", Some(enclosure("https://x/u.exe")), Some("https://x"));
        assert!(r.has_download());
        assert!(!r.is_valid());
    }

    #[test]
    fn test_empty_web_url_does_not_count() {
        let r = record("2.0", None, Some(""));
        assert!(!r.is_valid());
    }

    #[test]
    fn test_predicates_follow_mutation() {
        let mut r = record("2.0", Some(enclosure("https://x/u.exe")), None);
        assert!(r.has_download());

        if let Some(enc) = r.enclosure.as_mut() {
            enc.download_url.clear();
        }
        assert!(!r.has_download());
        assert!(!r.is_valid());

        r.web_url = Some("https://x/download".to_string());
        assert!(r.is_valid());

        r.version.clear();
        assert!(!r.is_valid());
    }

    #[test]
    fn test_display_version_prefers_short_version() {
        let mut r = record("1234", None, Some("https://x"));
        assert_eq!(r.display_version(), "1234");

        r.short_version = Some("1.2.3".to_string());
        assert_eq!(r.display_version(), "1.2.3");

        r.short_version = Some(String::new());
        assert_eq!(r.display_version(), "1234");
    }
}
