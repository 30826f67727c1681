//! Lenient feed item extraction.
//!
//! Feeds are uncontrolled input, so nothing here rejects a document: markup
//! that cannot be located simply yields fewer items. The scanner works on an
//! ASCII-lowercased copy of the text (same byte offsets) so tag lookup is
//! case-insensitive while extracted content keeps its original casing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Maximum characters kept from a cleaned text field.
pub const MAX_TEXT_CHARS: usize = 500;

const ENTITIES: [(&str, &str); 7] = [
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&amp;", "&"),
    ("&quot;", "\""),
    ("&apos;", "'"),
    ("&#39;", "'"),
    ("&#34;", "\""),
];

#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    /// Cleaned description; `None` when the item carries none
    pub description: Option<String>,
    /// Date text as found in the feed, resolved later by [`parse_date`]
    pub pub_date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Rss,
    Atom,
}

impl Flavor {
    fn container(self) -> &'static str {
        match self {
            Flavor::Rss => "channel",
            Flavor::Atom => "feed",
        }
    }

    fn item(self) -> &'static str {
        match self {
            Flavor::Rss => "item",
            Flavor::Atom => "entry",
        }
    }
}

/// Items of one document, in document order.
///
/// Blocks without a title or link are skipped. Scanning is lazy, so a
/// consumer that stops early leaves the rest of the document untouched.
pub struct FeedItems<'a> {
    body: &'a str,
    lower: String,
    flavor: Flavor,
    cursor: usize,
}

/// Extract the items of a raw feed document.
///
/// A document without a locatable `<channel>` (or Atom `<feed>`) block
/// produces an empty sequence.
pub fn parse(text: &str) -> FeedItems<'_> {
    let lower = text.to_ascii_lowercase();

    for flavor in [Flavor::Rss, Flavor::Atom] {
        if let Some((start, end)) = find_element(&lower, flavor.container(), 0) {
            return FeedItems {
                body: &text[start..end],
                lower: lower[start..end].to_string(),
                flavor,
                cursor: 0,
            };
        }
    }

    FeedItems {
        body: "",
        lower: String::new(),
        flavor: Flavor::Rss,
        cursor: 0,
    }
}

impl Iterator for FeedItems<'_> {
    type Item = FeedItem;

    fn next(&mut self) -> Option<FeedItem> {
        loop {
            let (start, end) = find_element(&self.lower, self.flavor.item(), self.cursor)?;
            self.cursor = end;

            if let Some(item) = read_item(&self.body[start..end], self.flavor) {
                return Some(item);
            }
        }
    }
}

fn read_item(block: &str, flavor: Flavor) -> Option<FeedItem> {
    let lower = block.to_ascii_lowercase();
    let tag = |name: &str| extract_tag(block, &lower, name);

    let title = tag("title")?;
    let link = match flavor {
        Flavor::Rss => tag("link"),
        Flavor::Atom => tag("link").or_else(|| extract_link_href(block, &lower)),
    }?;
    let description = match flavor {
        Flavor::Rss => tag("description").or_else(|| tag("content:encoded")),
        Flavor::Atom => tag("summary").or_else(|| tag("content")),
    };
    let pub_date = match flavor {
        Flavor::Rss => tag("pubdate").or_else(|| tag("dc:date")),
        Flavor::Atom => tag("published").or_else(|| tag("updated")),
    };

    Some(FeedItem {
        description: description
            .map(|d| clean_text(&d))
            .filter(|d| !d.is_empty()),
        title: clean_text(&title),
        link: link.trim().to_string(),
        pub_date,
    })
}

struct OpenTag {
    content_start: usize,
    self_closing: bool,
}

/// Find `<tag` followed by `>` or, when `allow_attrs`, by whitespace and
/// attributes. Names that merely share a prefix (`<titles>`) never match.
fn find_open_tag(lower: &str, tag: &str, from: usize, allow_attrs: bool) -> Option<(usize, OpenTag)> {
    let needle = format!("<{}", tag);
    let bytes = lower.as_bytes();
    let mut pos = from;

    while let Some(rel) = lower.get(pos..)?.find(&needle) {
        let start = pos + rel;
        let after = start + needle.len();

        match bytes.get(after) {
            Some(b'>') => {
                return Some((
                    start,
                    OpenTag {
                        content_start: after + 1,
                        self_closing: false,
                    },
                ))
            }
            Some(b) if allow_attrs && (b.is_ascii_whitespace() || *b == b'/') => {
                let gt = after + lower[after..].find('>')?;
                return Some((
                    start,
                    OpenTag {
                        content_start: gt + 1,
                        self_closing: bytes[gt - 1] == b'/',
                    },
                ));
            }
            _ => pos = after,
        }
    }
    None
}

/// Locate the content span of the first closed `<tag ...>...</tag>` element.
fn find_element(lower: &str, tag: &str, from: usize) -> Option<(usize, usize)> {
    element_span(lower, tag, from, true).map(|(start, end, _)| (start, end))
}

/// Returns the content start, content end, and the end of the closing tag.
fn element_span(lower: &str, tag: &str, from: usize, allow_attrs: bool) -> Option<(usize, usize, usize)> {
    let close = format!("</{}>", tag);
    let mut pos = from;

    loop {
        let (_, open) = find_open_tag(lower, tag, pos, allow_attrs)?;
        if open.self_closing {
            pos = open.content_start;
            continue;
        }
        let end = open.content_start + lower[open.content_start..].find(&close)?;
        return Some((open.content_start, end, end + close.len()));
    }
}

/// Text content of the first `tag` element, trying the attribute-tolerant
/// form first and the bare `<tag>` form second. Empty content counts as
/// absent. CDATA markers are removed.
fn extract_tag(block: &str, lower: &str, tag: &str) -> Option<String> {
    for allow_attrs in [true, false] {
        if let Some((start, end, _)) = element_span(lower, tag, 0, allow_attrs) {
            let value = unwrap_cdata(block[start..end].trim());
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}

fn unwrap_cdata(text: &str) -> String {
    text.replace("<![CDATA[", "").replace("]]>", "").trim().to_string()
}

/// `href` of the Atom `<link>` to use: the `alternate` one, or the first
/// link without a `rel`, or failing both the first link at all.
fn extract_link_href(block: &str, lower: &str) -> Option<String> {
    let mut pos = 0;
    let mut fallback = None;

    while let Some((start, open)) = find_open_tag(lower, "link", pos, true) {
        pos = open.content_start;
        let tag_lower = &lower[start..open.content_start];
        let tag_text = &block[start..open.content_start];

        let Some(href) = attribute(tag_text, tag_lower, "href") else {
            continue;
        };
        match attribute(tag_text, tag_lower, "rel").as_deref() {
            None | Some("alternate") => return Some(href),
            Some(_) => {
                fallback.get_or_insert(href);
            }
        }
    }
    fallback
}

fn attribute(tag_text: &str, tag_lower: &str, name: &str) -> Option<String> {
    let needle = format!(" {}=", name);
    let value_start = tag_lower.find(&needle)? + needle.len();
    let quote = tag_text[value_start..].chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let rest = &tag_text[value_start + 1..];
    let end = rest.find(quote)?;
    let value = rest[..end].trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Strip markup tags, unescape the standard XML entities, trim, and cap the
/// length at [`MAX_TEXT_CHARS`].
pub fn clean_text(text: &str) -> String {
    let mut stripped = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(lt) = rest.find('<') {
        stripped.push_str(&rest[..lt]);
        match rest[lt..].find('>') {
            // A tag needs at least one character between the brackets
            Some(gt) if gt > 1 => rest = &rest[lt + gt + 1..],
            _ => {
                stripped.push('<');
                rest = &rest[lt + 1..];
            }
        }
    }
    stripped.push_str(rest);

    let unescaped = ENTITIES
        .iter()
        .fold(stripped, |acc, (entity, ch)| acc.replace(entity, ch));

    truncate_chars(unescaped.trim(), MAX_TEXT_CHARS)
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Parse a feed date. Unparseable or empty input resolves to `now`.
pub fn parse_date(raw: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let raw = raw.trim();
    if raw.is_empty() {
        return now;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc);
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return naive.and_utc();
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return midnight.and_utc();
    }

    now
}
