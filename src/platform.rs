//! Identity of the machine an update would be installed on.
//!
//! The applicability filter asks two questions of a [`Platform`]: does an
//! enclosure's `sparkle:os` tag target this OS, and does the running OS satisfy
//! an item's `sparkle:minimumSystemVersion`.
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while parsing an OS version string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OsVersionError {
    /// The version string was empty or whitespace.
    #[error("empty OS version")]
    Empty,
    /// A dotted component was not a non-negative integer.
    #[error("invalid OS version component {component:?} in {input:?}")]
    InvalidComponent { input: String, component: String },
}

/// A dotted numeric OS version such as `10.0.19041` or `13.4`.
///
/// Missing trailing components compare as zero, so `10` == `10.0.0`.
#[derive(Debug, Clone, Eq, Serialize)]
#[serde(into = "String")]
pub struct OsVersion {
    components: Vec<u32>,
}

impl OsVersion {
    pub fn components(&self) -> &[u32] {
        &self.components
    }

    fn component(&self, idx: usize) -> u32 {
        self.components.get(idx).copied().unwrap_or(0)
    }
}

impl FromStr for OsVersion {
    type Err = OsVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(OsVersionError::Empty);
        }

        let components = trimmed
            .split('.')
            .map(|part| {
                part.parse::<u32>()
                    .map_err(|_| OsVersionError::InvalidComponent {
                        input: trimmed.to_owned(),
                        component: part.to_owned(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { components })
    }
}

impl Ord for OsVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for OsVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for OsVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl fmt::Display for OsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.components.iter().map(u32::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

impl From<OsVersion> for String {
    fn from(version: OsVersion) -> Self {
        version.to_string()
    }
}

/// The OS an update is being selected for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Platform {
    os: String,
    arch: String,
    version: Option<OsVersion>,
}

impl Platform {
    /// Creates a platform from an OS tag (`windows`, `macos`, `linux`) and an
    /// architecture tag (`x64`, `x86`, `arm64`). Both are lowercased.
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into().trim().to_ascii_lowercase(),
            arch: arch.into().trim().to_ascii_lowercase(),
            version: None,
        }
    }

    /// The platform this binary was compiled for, with the running OS version
    /// when it can be detected.
    pub fn current() -> Self {
        let arch = match std::env::consts::ARCH {
            "x86_64" => "x64",
            "aarch64" => "arm64",
            other => other,
        };
        let platform = Self::new(std::env::consts::OS, arch);

        match detected_os_version() {
            Some(version) => platform.with_version(version.clone()),
            None => platform,
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: OsVersion) -> Self {
        self.version = Some(version);
        self
    }

    pub fn os(&self) -> &str {
        &self.os
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    pub fn version(&self) -> Option<&OsVersion> {
        self.version.as_ref()
    }

    /// Returns true if a `sparkle:os` tag targets this platform.
    ///
    /// Accepts the bare OS (`windows`) and the OS qualified with this
    /// platform's architecture (`windows-x64`). Comparison ignores case.
    pub fn matches_os_tag(&self, tag: &str) -> bool {
        let tag = tag.trim().to_ascii_lowercase();
        if tag == self.os {
            return true;
        }
        tag.strip_prefix(self.os.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
            .is_some_and(|arch| arch == self.arch)
    }

    /// Returns true unless the platform version is known and lower than `min`.
    ///
    /// An unparseable minimum is not grounds for exclusion.
    pub fn accepts_min_os_version(&self, min: &str) -> bool {
        let Some(current) = &self.version else {
            return true;
        };

        match min.parse::<OsVersion>() {
            Ok(required) => *current >= required,
            Err(e) => {
                tracing::debug!(min_os_version = %min, error = %e, "Ignoring unparseable minimum OS version");
                true
            }
        }
    }
}

/// Running OS version, detected once per process.
fn detected_os_version() -> Option<&'static OsVersion> {
    static DETECTED: OnceLock<Option<OsVersion>> = OnceLock::new();
    DETECTED
        .get_or_init(|| {
            let raw = sysinfo::System::os_version();
            let version = raw.as_deref().and_then(leading_os_version);
            tracing::debug!(raw = ?raw, version = ?version, "Detected OS version");
            version
        })
        .as_ref()
}

/// Parses the dotted numeric prefix of an OS version string as reported by
/// the system, e.g. `14.5` from `14.5` or `11` from `11 (22631)`.
fn leading_os_version(raw: &str) -> Option<OsVersion> {
    let raw = raw.trim();
    let end = raw
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(raw.len());
    raw[..end].trim_end_matches('.').parse().ok()
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)?;
        if let Some(version) = &self.version {
            write!(f, " {version}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> OsVersion {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_os_version() {
        assert_eq!(v("10.0.19041").components(), &[10, 0, 19041]);
        assert_eq!(v(" 13 ").components(), &[13]);
    }

    #[test]
    fn test_parse_os_version_rejects_garbage() {
        assert_eq!("".parse::<OsVersion>(), Err(OsVersionError::Empty));
        assert!("10.x".parse::<OsVersion>().is_err());
        assert!("10..1".parse::<OsVersion>().is_err());
        assert!("-1".parse::<OsVersion>().is_err());
    }

    #[test]
    fn test_os_version_ordering_pads_with_zero() {
        assert_eq!(v("10"), v("10.0.0"));
        assert!(v("10.0.1") > v("10"));
        assert!(v("6.1") < v("10.0"));
        assert!(v("10.10") > v("10.9"));
    }

    #[test]
    fn test_os_version_display() {
        assert_eq!(v("10.0.19041").to_string(), "10.0.19041");
    }

    #[test]
    fn test_matches_bare_os_tag() {
        let platform = Platform::new("windows", "x64");
        assert!(platform.matches_os_tag("windows"));
        assert!(platform.matches_os_tag("Windows"));
        assert!(!platform.matches_os_tag("macos"));
    }

    #[test]
    fn test_matches_arch_qualified_tag() {
        let platform = Platform::new("windows", "x64");
        assert!(platform.matches_os_tag("windows-x64"));
        assert!(!platform.matches_os_tag("windows-x86"));
        assert!(!platform.matches_os_tag("windows-arm64"));
        assert!(!platform.matches_os_tag("windowsx64"));
    }

    #[test]
    fn test_min_os_version_unknown_platform_version_accepts() {
        let platform = Platform::new("windows", "x64");
        assert!(platform.accepts_min_os_version("99.0"));
    }

    #[test]
    fn test_min_os_version_compares_when_known() {
        let platform = Platform::new("windows", "x64").with_version(v("6.1"));
        assert!(platform.accepts_min_os_version("6.0"));
        assert!(platform.accepts_min_os_version("6.1"));
        assert!(!platform.accepts_min_os_version("10.0"));
    }

    #[test]
    fn test_min_os_version_unparseable_accepts() {
        let platform = Platform::new("macos", "arm64").with_version(v("13.0"));
        assert!(platform.accepts_min_os_version("Ventura"));
    }

    #[test]
    fn test_current_platform_is_lowercase() {
        let platform = Platform::current();
        assert!(!platform.os().is_empty());
        assert_eq!(platform.os(), platform.os().to_ascii_lowercase());
        assert_eq!(platform.os(), std::env::consts::OS);
    }

    #[test]
    fn test_current_platform_carries_detected_version() {
        let expected = sysinfo::System::os_version()
            .as_deref()
            .and_then(leading_os_version);
        assert_eq!(Platform::current().version(), expected.as_ref());
    }

    #[test]
    fn test_leading_os_version() {
        assert_eq!(leading_os_version("14.5"), Some(v("14.5")));
        assert_eq!(leading_os_version("10.0.22631"), Some(v("10.0.22631")));
        assert_eq!(leading_os_version("11 (22631)"), Some(v("11")));
        assert_eq!(leading_os_version(" 22.04 "), Some(v("22.04")));
        assert_eq!(leading_os_version("6.8.0-45-generic"), Some(v("6.8.0")));
        assert_eq!(leading_os_version("13."), Some(v("13")));
        assert_eq!(leading_os_version("rolling"), None);
        assert_eq!(leading_os_version(""), None);
    }

    #[test]
    fn test_display() {
        let platform = Platform::new("linux", "arm64").with_version(v("6.5"));
        assert_eq!(platform.to_string(), "linux-arm64 6.5");
    }
}
