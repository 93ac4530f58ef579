//! Directory-listing parser.
//!
//! Turns the HTML of an upstream index page into a typed [`Listing`]. The page
//! is untrusted input: anything that is not a link to a file directly inside
//! the listed directory is dropped, and size/date columns are only recorded
//! when they can be read unambiguously. Missing columns stay `None`.
//!
//! Two layouts are understood:
//! - IIS style, metadata before the link:
//!   `1/3/2024  8:30 AM     12345 <A HREF="/pub/pr/pr.class">pr.class</A><br>`
//! - Apache style, metadata after the link:
//!   `<a href="pr.class">pr.class</a>   03-Jan-2024 08:30   12345`

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;
use tracing::{debug, warn};
use url::Url;

use crate::contract::UpstreamEntry;
use crate::error::ParseError;

static ANCHOR_OPEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))[^>]*>"#)
        .expect("anchor pattern is valid")
});

static ANCHOR_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</a\s*>").expect("anchor close pattern is valid"));

static LINE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\n|<br\s*/?>|</?tr[\s>]").expect("line break pattern is valid"));

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern is valid"));

static PARENT_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)parent\s+directory|^\s*\.\.?/?\s*$").expect("parent label pattern is valid")
});

static US_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2}/\d{1,2}/\d{4})\s+(\d{1,2}:\d{2}(?::\d{2})?)\s*([AaPp][Mm])")
        .expect("us date pattern is valid")
});

static ISO_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4}-\d{2}-\d{2})[ T](\d{2}:\d{2}(?::\d{2})?)").expect("iso date pattern is valid")
});

static APACHE_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2}-[A-Za-z]{3}-\d{4})\s+(\d{2}:\d{2}(?::\d{2})?)")
        .expect("apache date pattern is valid")
});

/// Parsed upstream listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    /// File entries ordered by filename.
    pub entries: Vec<UpstreamEntry>,
    /// Every anchor seen, including directories and navigation links.
    pub links_seen: usize,
}

impl Listing {
    /// Links were present but none of them pointed at a file.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse listing HTML fetched from `base_url`.
///
/// Fails only when the page has no anchors at all; a page with navigation
/// links but no files yields an empty [`Listing`].
pub fn parse_listing(html: &str, base_url: &str) -> Result<Listing, ParseError> {
    let base = Url::parse(base_url).map_err(|e| ParseError::BaseUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })?;
    let base_dir = directory_of(base.path());

    let anchors = find_anchors(html);
    if anchors.is_empty() {
        warn!(bytes = html.len(), "[LISTING] No anchor links found in listing");
        return Err(ParseError::NoLinks { bytes: html.len() });
    }

    let mut by_name: BTreeMap<String, UpstreamEntry> = BTreeMap::new();
    for (i, anchor) in anchors.iter().enumerate() {
        let Some((filename, url)) = file_link(&base, base_dir, &anchor.href, &anchor.label) else {
            debug!(href = %anchor.href, label = %anchor.label, "[LISTING] Skipping non-file link");
            continue;
        };

        let prev_end = if i == 0 { 0 } else { anchors[i - 1].end };
        let next_start = anchors.get(i + 1).map_or(html.len(), |a| a.start);

        let before = last_line(&html[prev_end..anchor.start]);
        let after = first_line(&html[anchor.end..next_start]);
        let columns = Columns::read(before);
        let columns = if columns.is_empty() { Columns::read(after) } else { columns };

        if by_name.contains_key(&filename) {
            debug!(filename = %filename, "[LISTING] Duplicate link, keeping last occurrence");
        }
        by_name.insert(
            filename.clone(),
            UpstreamEntry {
                filename,
                url: url.to_string(),
                size: columns.size,
                last_modified: columns.last_modified,
            },
        );
    }

    debug!(
        links = anchors.len(),
        files = by_name.len(),
        "[LISTING] Parsed directory listing"
    );
    Ok(Listing {
        entries: by_name.into_values().collect(),
        links_seen: anchors.len(),
    })
}

struct Anchor {
    start: usize,
    end: usize,
    href: String,
    label: String,
}

/// Locate every `<a href>` with its label. A missing `</a>` ends the label at
/// the next tag or line break, so one broken row never hides the next link.
fn find_anchors(html: &str) -> Vec<Anchor> {
    let opens: Vec<_> = ANCHOR_OPEN.captures_iter(html).collect();
    let mut anchors = Vec::with_capacity(opens.len());
    for (i, caps) in opens.iter().enumerate() {
        let Some(tag) = caps.get(0) else { continue };
        let href = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map(|m| decode_entities(m.as_str().trim()))
            .unwrap_or_default();

        let limit = opens
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(html.len(), |m| m.start());
        let region = &html[tag.end()..limit];
        let (label, end) = match ANCHOR_CLOSE.find(region) {
            Some(close) => (&region[..close.start()], tag.end() + close.end()),
            None => {
                let stop = region.find(['<', '\n']).unwrap_or(region.len());
                (&region[..stop], tag.end())
            }
        };

        anchors.push(Anchor {
            start: tag.start(),
            end,
            href,
            label: plain_text(label),
        });
    }
    anchors
}

/// Resolve an anchor to `(filename, url)` when it names a file directly
/// inside the listed directory.
fn file_link(base: &Url, base_dir: &str, href: &str, label: &str) -> Option<(String, Url)> {
    if href.is_empty() || href.starts_with('#') || href.starts_with('?') {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if lower.starts_with("mailto:") || lower.starts_with("javascript:") {
        return None;
    }
    if PARENT_LABEL.is_match(label) {
        return None;
    }
    let url = base.join(href).ok()?;
    if url.query().is_some() || url.origin() != base.origin() {
        return None;
    }
    let name = url.path().strip_prefix(base_dir)?;
    if name.is_empty() || name.contains('/') {
        return None;
    }
    let filename = percent_decode_str(name).decode_utf8().ok()?.into_owned();
    if filename == "." || filename == ".." {
        return None;
    }
    Some((filename, url))
}

fn directory_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..=idx],
        None => "/",
    }
}

fn last_line(segment: &str) -> &str {
    match LINE_BREAK.find_iter(segment).last() {
        Some(m) => &segment[m.end()..],
        None => segment,
    }
}

fn first_line(segment: &str) -> &str {
    match LINE_BREAK.find(segment) {
        Some(m) => &segment[..m.start()],
        None => segment,
    }
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn plain_text(fragment: &str) -> String {
    let stripped = TAG.replace_all(fragment, " ");
    decode_entities(&stripped)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Size and date columns next to one link.
#[derive(Debug, Default)]
struct Columns {
    size: Option<u64>,
    last_modified: Option<DateTime<Utc>>,
}

impl Columns {
    fn read(fragment: &str) -> Self {
        let text = plain_text(fragment);
        if text.is_empty() {
            return Self::default();
        }
        let (last_modified, rest) = match find_date(&text) {
            Some((when, start, end)) => (Some(when), format!("{} {}", &text[..start], &text[end..])),
            None => (None, text.clone()),
        };
        Self {
            size: find_size(&rest),
            last_modified,
        }
    }

    fn is_empty(&self) -> bool {
        self.size.is_none() && self.last_modified.is_none()
    }
}

/// First recognised timestamp in `text`, with its byte span. Listing times
/// carry no zone and are read as UTC.
fn find_date(text: &str) -> Option<(DateTime<Utc>, usize, usize)> {
    if let Some(c) = US_DATE.captures(text) {
        let span = c.get(0)?;
        let joined = format!("{} {} {}", &c[1], &c[2], c[3].to_ascii_uppercase());
        if let Some(dt) = parse_naive(&joined, &["%m/%d/%Y %I:%M:%S %p", "%m/%d/%Y %I:%M %p"]) {
            return Some((dt.and_utc(), span.start(), span.end()));
        }
    }
    if let Some(c) = ISO_DATE.captures(text) {
        let span = c.get(0)?;
        let joined = format!("{} {}", &c[1], &c[2]);
        if let Some(dt) = parse_naive(&joined, &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]) {
            return Some((dt.and_utc(), span.start(), span.end()));
        }
    }
    if let Some(c) = APACHE_DATE.captures(text) {
        let span = c.get(0)?;
        let joined = format!("{} {}", &c[1], &c[2]);
        if let Some(dt) = parse_naive(&joined, &["%d-%b-%Y %H:%M:%S", "%d-%b-%Y %H:%M"]) {
            return Some((dt.and_utc(), span.start(), span.end()));
        }
    }
    None
}

fn parse_naive(s: &str, formats: &[&str]) -> Option<NaiveDateTime> {
    formats
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
}

/// An exact byte count. `<dir>` markers, `-` placeholders and abbreviated
/// sizes such as `12K` are not exact and yield `None`.
fn find_size(text: &str) -> Option<u64> {
    let mut size = None;
    for token in text.split_whitespace() {
        if token.eq_ignore_ascii_case("<dir>") {
            return None;
        }
        let digits = token.replace(',', "");
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            size = digits.parse().ok();
        }
    }
    size
}
