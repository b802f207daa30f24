//! Appcast loading: from feed XML to the list of applicable updates.
//!
//! Loading happens in two passes:
//!
//! - [`parser`] walks the XML with `quick-xml` and collects the raw contents
//!   of every `<item>`. This is the only pass that can fail.
//! - [`filter`] drops items that do not apply to the [`Platform`](crate::platform::Platform)
//!   or cannot be acted on, and builds [`UpdateRecord`]s from the rest.
//!
//! [`load`] and [`load_for`] run both.
//!
//! # Example
//!
//! ```
//! use appcast_reader::feed::load_for;
//! use appcast_reader::platform::Platform;
//!
//! let xml = r#"<rss xmlns:sparkle="http://www.andymatuschak.org/xml-namespaces/sparkle">
//!   <channel><item>
//!     <sparkle:version>2.0</sparkle:version>
//!     <enclosure url="https://example.com/app.exe" sparkle:os="windows"/>
//!   </item></channel>
//! </rss>"#;
//!
//! let updates = load_for(xml, &Platform::new("windows", "x64")).unwrap();
//! assert!(updates[0].has_download());
//! ```

mod filter;
mod item;
mod loader;
mod parser;

pub use filter::select_applicable;
pub use item::{Enclosure, UpdateRecord};
pub use loader::{load, load_for};
pub use parser::{parse_candidates, AppcastError, Candidate, CandidateEnclosure, SPARKLE_NS};
