use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, QName, ResolveResult};
use quick_xml::NsReader;
use thiserror::Error;

use super::item::Enclosure;

/// XML namespace of the Sparkle appcast extension elements and attributes.
pub const SPARKLE_NS: &[u8] = b"http://www.andymatuschak.org/xml-namespaces/sparkle";

/// SEC-003: Maximum allowed element nesting depth.
/// Prevents resource exhaustion from maliciously deep documents.
const MAX_FEED_DEPTH: usize = 64;

/// Errors that make an appcast document unusable as a whole.
///
/// Problems confined to a single item never surface here; such items are
/// dropped by the applicability filter instead.
#[derive(Debug, Error)]
pub enum AppcastError {
    /// The markup is not well-formed.
    #[error("XML parse error at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    /// Input ended while elements were still open.
    #[error("unexpected end of document at byte {position}: <{element}> is not closed")]
    UnexpectedEof { element: String, position: u64 },

    /// Input contained no element at all.
    #[error("document has no root element")]
    NoRootElement,

    /// A second root element, or text before or after the root.
    #[error("content outside the root element at byte {position}")]
    ContentOutsideRoot { position: u64 },

    /// An element or attribute uses a namespace prefix that was never declared.
    #[error("undeclared namespace prefix {prefix:?} at byte {position}")]
    UnboundPrefix { prefix: String, position: u64 },

    /// An attribute value contains a literal `<`.
    #[error("attribute {name:?} contains '<' at byte {position}")]
    LtInAttributeValue { name: String, position: u64 },

    /// SEC-003: Element nesting exceeds safety limit.
    #[error("feed nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),
}

/// An enclosure as written in the feed, with the version attributes Sparkle
/// allows on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateEnclosure {
    pub enclosure: Enclosure,
    pub version: Option<String>,
    pub short_version: Option<String>,
}

/// Raw, unfiltered contents of one `<item>`.
///
/// Nothing here has been checked for applicability or validity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub pub_date: Option<String>,
    pub release_notes_link: Option<String>,
    pub version: Option<String>,
    pub short_version: Option<String>,
    pub min_os_version: Option<String>,
    pub critical: bool,
    pub enclosures: Vec<CandidateEnclosure>,
}

impl Candidate {
    /// Stores trimmed element text. Empty text leaves the field untouched and
    /// a repeated element overwrites the earlier value.
    fn set_text(&mut self, tag: Tag, text: &str) {
        let value = text.trim();
        if value.is_empty() {
            return;
        }
        let slot = match tag {
            Tag::Title => &mut self.title,
            Tag::Description => &mut self.description,
            Tag::Link => &mut self.link,
            Tag::PubDate => &mut self.pub_date,
            Tag::ReleaseNotesLink => &mut self.release_notes_link,
            Tag::Version => &mut self.version,
            Tag::ShortVersion => &mut self.short_version,
            Tag::MinOsVersion => &mut self.min_os_version,
            _ => return,
        };
        *slot = Some(value.to_owned());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Item,
    Title,
    Description,
    Link,
    PubDate,
    Enclosure,
    ReleaseNotesLink,
    Version,
    ShortVersion,
    MinOsVersion,
    CriticalUpdate,
    Tags,
    Other,
}

impl Tag {
    fn has_text(self) -> bool {
        matches!(
            self,
            Tag::Title
                | Tag::Description
                | Tag::Link
                | Tag::PubDate
                | Tag::ReleaseNotesLink
                | Tag::Version
                | Tag::ShortVersion
                | Tag::MinOsVersion
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ns {
    None,
    Sparkle,
    Other,
}

fn namespace_of(ns: &ResolveResult<'_>, reader: &NsReader<&[u8]>) -> Result<Ns, AppcastError> {
    match ns {
        ResolveResult::Unbound => Ok(Ns::None),
        ResolveResult::Bound(Namespace(uri)) if *uri == SPARKLE_NS => Ok(Ns::Sparkle),
        ResolveResult::Bound(_) => Ok(Ns::Other),
        // Feeds in the wild sometimes use the prefix without declaring it
        ResolveResult::Unknown(prefix) if prefix.as_slice() == b"sparkle" => Ok(Ns::Sparkle),
        ResolveResult::Unknown(prefix) => Err(AppcastError::UnboundPrefix {
            prefix: String::from_utf8_lossy(prefix).into_owned(),
            position: reader.buffer_position() as u64,
        }),
    }
}

fn classify(reader: &NsReader<&[u8]>, name: QName<'_>) -> Result<Tag, AppcastError> {
    let (ns, local) = reader.resolve_element(name);
    let tag = match (namespace_of(&ns, reader)?, local.as_ref()) {
        (Ns::None, b"item") => Tag::Item,
        (Ns::None, b"title") => Tag::Title,
        (Ns::None, b"description") => Tag::Description,
        (Ns::None, b"link") => Tag::Link,
        (Ns::None, b"pubDate") => Tag::PubDate,
        (Ns::None, b"enclosure") => Tag::Enclosure,
        (Ns::Sparkle, b"releaseNotesLink") => Tag::ReleaseNotesLink,
        (Ns::Sparkle, b"version") => Tag::Version,
        (Ns::Sparkle, b"shortVersionString") => Tag::ShortVersion,
        (Ns::Sparkle, b"minimumSystemVersion") => Tag::MinOsVersion,
        (Ns::Sparkle, b"criticalUpdate") => Tag::CriticalUpdate,
        (Ns::Sparkle, b"tags") => Tag::Tags,
        _ => Tag::Other,
    };
    Ok(tag)
}

/// `xmlns`, `xmlns:*` and `xml:*` attributes are bound by XML itself.
fn is_reserved_attribute(key: QName<'_>) -> bool {
    let key = key.as_ref();
    key == b"xmlns" || key.starts_with(b"xmlns:") || key.starts_with(b"xml:")
}

/// Checks every attribute of an element.
///
/// quick-xml only reports duplicate names, missing quotes and bad entity
/// references when the attributes are iterated and unescaped, so this has to
/// run for all elements, not just the ones whose attributes are read. A raw
/// `<` in a value and an undeclared prefix are checked here as well.
fn check_attributes(start: &BytesStart<'_>, reader: &NsReader<&[u8]>) -> Result<(), AppcastError> {
    for attr_result in start.attributes() {
        let attr = attr_result.map_err(|e| xml_error(reader, e))?;
        if attr.value.contains(&b'<') {
            return Err(AppcastError::LtInAttributeValue {
                name: String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                position: reader.buffer_position() as u64,
            });
        }
        attr.decode_and_unescape_value(reader.decoder())
            .map_err(|e| xml_error(reader, e))?;

        if !is_reserved_attribute(attr.key) {
            let (ns, _) = reader.resolve_attribute(attr.key);
            namespace_of(&ns, reader)?;
        }
    }
    Ok(())
}

fn xml_error<R>(reader: &NsReader<R>, err: impl Into<quick_xml::Error>) -> AppcastError {
    AppcastError::Xml {
        position: reader.buffer_position() as u64,
        source: err.into(),
    }
}

/// Text being collected for an item child element.
struct Capture {
    tag: Tag,
    depth: usize,
    text: String,
}

struct OpenItem {
    depth: usize,
    candidate: Candidate,
    tags_depth: Option<usize>,
    capture: Option<Capture>,
}

/// Tracks where the event stream is relative to the current `<item>`.
#[derive(Default)]
struct Walker {
    open_elements: Vec<String>,
    root_seen: bool,
    root_closed: bool,
    item: Option<OpenItem>,
    candidates: Vec<Candidate>,
}

impl Walker {
    fn depth(&self) -> usize {
        self.open_elements.len()
    }

    /// Fails if an element starts after the root element has closed.
    fn ensure_root_open(&self, reader: &NsReader<&[u8]>) -> Result<(), AppcastError> {
        if self.root_closed {
            return Err(AppcastError::ContentOutsideRoot {
                position: reader.buffer_position() as u64,
            });
        }
        Ok(())
    }

    /// Fails on character data outside the root element. Whitespace and a
    /// byte order mark are allowed there.
    fn ensure_text_allowed(&self, text: &str, reader: &NsReader<&[u8]>) -> Result<(), AppcastError> {
        let blank = text.trim_start_matches('\u{feff}').trim().is_empty();
        if self.open_elements.is_empty() && !blank {
            return Err(AppcastError::ContentOutsideRoot {
                position: reader.buffer_position() as u64,
            });
        }
        Ok(())
    }

    /// Handles an element opening at `depth`. `empty` is set for
    /// self-closing elements, which get no matching close call.
    fn open(
        &mut self,
        tag: Tag,
        depth: usize,
        empty: bool,
        start: &BytesStart<'_>,
        reader: &NsReader<&[u8]>,
    ) -> Result<(), AppcastError> {
        check_attributes(start, reader)?;
        self.root_seen = true;
        if empty && depth == 1 {
            self.root_closed = true;
        }

        let Some(item) = self.item.as_mut() else {
            if tag == Tag::Item {
                if empty {
                    self.candidates.push(Candidate::default());
                } else {
                    self.item = Some(OpenItem {
                        depth,
                        candidate: Candidate::default(),
                        tags_depth: None,
                        capture: None,
                    });
                }
            }
            return Ok(());
        };

        if depth == item.depth + 1 {
            match tag {
                t if t.has_text() && !empty => {
                    item.capture = Some(Capture {
                        tag,
                        depth,
                        text: String::new(),
                    });
                }
                Tag::CriticalUpdate => item.candidate.critical = true,
                Tag::Tags if !empty => item.tags_depth = Some(depth),
                Tag::Enclosure => {
                    let enclosure = parse_enclosure(start, reader)?;
                    item.candidate.enclosures.push(enclosure);
                }
                _ => {}
            }
        } else if tag == Tag::CriticalUpdate && item.tags_depth == Some(depth - 1) {
            item.candidate.critical = true;
        }

        Ok(())
    }

    fn text(&mut self, text: &str) {
        if let Some(capture) = self.item.as_mut().and_then(|i| i.capture.as_mut()) {
            capture.text.push_str(text);
        }
    }

    fn close(&mut self) {
        let depth = self.depth();
        let finished = match self.item.as_mut() {
            Some(item) => {
                if item.capture.as_ref().is_some_and(|c| c.depth == depth) {
                    if let Some(capture) = item.capture.take() {
                        item.candidate.set_text(capture.tag, &capture.text);
                    }
                }
                if item.tags_depth == Some(depth) {
                    item.tags_depth = None;
                }
                item.depth == depth
            }
            None => false,
        };

        if finished {
            if let Some(item) = self.item.take() {
                self.candidates.push(item.candidate);
            }
        }
        self.open_elements.pop();
        if self.open_elements.is_empty() {
            self.root_closed = true;
        }
    }
}

/// Reads the attributes of an `<enclosure>` element.
fn parse_enclosure(
    start: &BytesStart<'_>,
    reader: &NsReader<&[u8]>,
) -> Result<CandidateEnclosure, AppcastError> {
    let mut out = CandidateEnclosure::default();

    for attr_result in start.attributes() {
        let attr = attr_result.map_err(|e| xml_error(reader, e))?;
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|e| xml_error(reader, e))?;
        let value = value.trim();
        let (ns, local) = reader.resolve_attribute(attr.key);

        let slot = match (namespace_of(&ns, reader)?, local.as_ref()) {
            (Ns::None, b"url") => {
                out.enclosure.download_url = value.to_owned();
                continue;
            }
            (Ns::None, b"length") => {
                out.enclosure.length = match value.parse::<u64>() {
                    Ok(len) => Some(len),
                    Err(e) => {
                        tracing::debug!(length = %value, error = %e, "Ignoring invalid enclosure length");
                        None
                    }
                };
                continue;
            }
            (Ns::None, b"type") => &mut out.enclosure.mime_type,
            (Ns::Sparkle, b"version") => &mut out.version,
            (Ns::Sparkle, b"shortVersionString") => &mut out.short_version,
            (Ns::Sparkle, b"dsaSignature") => &mut out.enclosure.dsa_signature,
            (Ns::Sparkle, b"edSignature") => &mut out.enclosure.eddsa_signature,
            (Ns::Sparkle, b"os") => &mut out.enclosure.os,
            (Ns::Sparkle, b"installerArguments") => &mut out.enclosure.installer_arguments,
            _ => continue,
        };
        *slot = (!value.is_empty()).then(|| value.to_owned());
    }

    Ok(out)
}

/// Walks an appcast document and returns the raw contents of every `<item>`
/// in document order.
///
/// # Errors
///
/// Returns [`AppcastError`] if the document is not well-formed XML: syntax
/// errors, mismatched end tags, undefined entity references, malformed or
/// duplicate attributes, undeclared namespace prefixes (other than
/// `sparkle:`), content outside a single root element, elements left open at
/// end of input, or no root element. No partial result is produced.
///
/// # Security
///
/// - quick-xml (0.37) does not parse `<!ENTITY>` declarations, so custom
///   entities are rejected rather than expanded (see SEC-002 in `Cargo.toml`)
/// - Nesting deeper than 64 elements is rejected (SEC-003)
pub fn parse_candidates(xml: &str) -> Result<Vec<Candidate>, AppcastError> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut walker = Walker::default();

    loop {
        let event = reader.read_event().map_err(|e| xml_error(&reader, e))?;
        match event {
            Event::Start(e) => {
                walker.ensure_root_open(&reader)?;
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                walker.open_elements.push(name);
                let depth = walker.depth();
                if depth > MAX_FEED_DEPTH {
                    return Err(AppcastError::MaxDepthExceeded(MAX_FEED_DEPTH));
                }
                let tag = classify(&reader, e.name())?;
                walker.open(tag, depth, false, &e, &reader)?;
            }
            Event::Empty(e) => {
                walker.ensure_root_open(&reader)?;
                let tag = classify(&reader, e.name())?;
                let depth = walker.depth() + 1;
                walker.open(tag, depth, true, &e, &reader)?;
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(|err| xml_error(&reader, err))?;
                walker.ensure_text_allowed(&text, &reader)?;
                walker.text(&text);
            }
            Event::CData(e) => {
                let raw = e.into_inner();
                let text = reader
                    .decoder()
                    .decode(&raw)
                    .map_err(|err| xml_error(&reader, err))?;
                if walker.open_elements.is_empty() {
                    return Err(AppcastError::ContentOutsideRoot {
                        position: reader.buffer_position() as u64,
                    });
                }
                walker.text(&text);
            }
            Event::End(_) => walker.close(),
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(element) = walker.open_elements.pop() {
        return Err(AppcastError::UnexpectedEof {
            element,
            position: reader.buffer_position() as u64,
        });
    }
    if !walker.root_seen {
        return Err(AppcastError::NoRootElement);
    }

    Ok(walker.candidates)
}
