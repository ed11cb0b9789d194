//! Raw RFC 5322 message to [`Document`] conversion

use crate::document::Document;
use crate::error::{Result, SegmentError};
use chrono::DateTime;
use mailparse::{MailHeader, MailHeaderMap, ParsedMail};
use serde_json::{Map, Value};
use tracing::debug;

/// Parse a raw mail message into a segmentable document
///
/// The body is the first `text/plain` part, or the tag-stripped first
/// `text/html` part when there is no plain text. Selected headers are
/// kept as metadata next to the body `text`.
pub fn document_from_rfc5322(raw: &[u8]) -> Result<Document> {
    let parsed = mailparse::parse_mail(raw).map_err(|e| SegmentError::Message(e.to_string()))?;

    let body = message_body(&parsed);

    let mut metadata = Map::new();
    for (key, header) in [
        ("message_id", "Message-ID"),
        ("from", "From"),
        ("subject", "Subject"),
        ("to", "To"),
        ("cc", "Cc"),
        ("in_reply_to", "In-Reply-To"),
        ("list_id", "List-Id"),
    ] {
        if let Some(value) = parsed.headers.get_first_value(header) {
            metadata.insert(key.to_string(), Value::String(value));
        }
    }
    if let Some(date) = extract_date(&parsed.headers) {
        metadata.insert("date".to_string(), Value::String(date));
    }
    metadata.insert("text".to_string(), Value::String(body.clone()));

    debug!("Parsed message with {} body bytes", body.len());
    Ok(Document::from_text(&body, metadata))
}

fn extract_date(headers: &[MailHeader]) -> Option<String> {
    headers
        .get_first_value("Date")
        .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok())
        .map(|dt| dt.to_rfc3339())
}

/// First leaf part of the given MIME type, depth first
fn first_part<'m, 'a>(part: &'m ParsedMail<'a>, mimetype: &str) -> Option<&'m ParsedMail<'a>> {
    if part.subparts.is_empty() {
        return part
            .ctype
            .mimetype
            .eq_ignore_ascii_case(mimetype)
            .then_some(part);
    }
    part.subparts.iter().find_map(|sub| first_part(sub, mimetype))
}

/// Plain text body, falling back to stripped HTML
fn message_body(parsed: &ParsedMail) -> String {
    let decoded = |mimetype: &str| first_part(parsed, mimetype).and_then(|p| p.get_body().ok());

    decoded("text/plain")
        .filter(|text| !text.is_empty())
        .or_else(|| decoded("text/html").map(|html| strip_html(&html)))
        .unwrap_or_default()
        .replace("\r\n", "\n")
}

/// Drop tags, scripts and styles, keeping block breaks as newlines
fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    let mut skipping = false;
    let mut tag = String::new();

    for c in html.chars() {
        match (in_tag, c) {
            (false, '<') => {
                in_tag = true;
                tag.clear();
            }
            (true, '>') => {
                in_tag = false;
                let name = tag.to_lowercase();
                if name.starts_with("script") || name.starts_with("style") {
                    skipping = true;
                } else if name.starts_with("/script") || name.starts_with("/style") {
                    skipping = false;
                } else if ["br", "/p", "/div", "/li", "/h", "/tr"]
                    .iter()
                    .any(|t| name.starts_with(t))
                {
                    result.push('\n');
                }
            }
            (true, _) => tag.push(c),
            (false, _) if !skipping => result.push(c),
            (false, _) => {}
        }
    }

    result
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
