//! Content sniffing for fetched feeds.
//!
//! Upstreams frequently answer a calendar URL with an HTML login or error
//! page and a 200 status. Looking at the declared content type and the first
//! bytes of the body catches that before the document reaches the parser.

/// What a response looks like from its headers and body prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Calendar data, by marker or declared type.
    Calendar,
    /// An HTML document.
    Html,
    /// Nothing conclusive.
    Unknown,
}

impl ContentKind {
    /// Returns true if fetching should continue.
    pub fn should_proceed(&self) -> bool {
        !matches!(self, Self::Html)
    }
}

const CALENDAR_MARKERS: &[&str] = &["begin:vcalendar", "begin:vevent"];
const HTML_MARKERS: &[&str] = &["<!doctype html", "<html"];
const COMMENT_OPEN: &str = "<!--";
const COMMENT_CLOSE: &str = "-->";
const CALENDAR_TYPES: &[&str] = &["text/calendar", "application/calendar", "text/plain"];
const HTML_TYPES: &[&str] = &["text/html", "application/xhtml+xml"];

/// Classifies a response from its declared content type and body prefix.
///
/// A calendar marker at the start of the body wins over any header. After
/// that, an HTML content type or HTML marker rejects, and a calendar-like
/// content type accepts. Leading `<!-- -->` comments are skipped before
/// looking for an HTML marker.
pub fn sniff(content_type: Option<&str>, prefix: &[u8]) -> ContentKind {
    let head = leading_text(prefix);

    if starts_with_any(&head, CALENDAR_MARKERS) {
        return ContentKind::Calendar;
    }

    let mime = content_type.map(media_type);
    let declared_html = mime.as_deref().is_some_and(|m| HTML_TYPES.contains(&m));
    let markup = skip_comments(&head);
    if declared_html || markup.is_none_or(|rest| starts_with_any(rest, HTML_MARKERS)) {
        return ContentKind::Html;
    }

    if mime.as_deref().is_some_and(|m| CALENDAR_TYPES.contains(&m)) {
        return ContentKind::Calendar;
    }

    ContentKind::Unknown
}

/// Lowercased body prefix with leading whitespace and byte-order mark removed.
fn leading_text(prefix: &[u8]) -> String {
    String::from_utf8_lossy(prefix)
        .trim_start_matches(|c: char| c == '\u{feff}' || c.is_whitespace())
        .to_ascii_lowercase()
}

/// Skips leading markup comments. Returns `None` if a comment is still open
/// at the end of the prefix.
fn skip_comments(text: &str) -> Option<&str> {
    let mut rest = text;
    while let Some(comment) = rest.strip_prefix(COMMENT_OPEN) {
        let end = comment.find(COMMENT_CLOSE)?;
        rest = comment[end + COMMENT_CLOSE.len()..].trim_start();
    }
    Some(rest)
}

fn starts_with_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|marker| text.starts_with(marker))
}

/// Extracts the bare media type from a `Content-Type` value.
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
