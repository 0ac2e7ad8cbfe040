//! Tolerant RSS item extraction.
//!
//! The upstream markup is not schema-validated, so this module never rejects a
//! document. It scans for `<item>` records with regular expressions and pulls
//! each field out of its record using a fixed precedence:
//!
//! 1. CDATA-wrapped form: `<tag attrs><![CDATA[ ... ]]></tag>`
//! 2. plain form: `<tag attrs> ... </tag>`
//! 3. empty string
//!
//! Opening tags may carry attributes. Self-closing tags (`<tag attr="x"/>`)
//! never open a field, so an empty element cannot swallow its neighbour.
//!
//! Plain-form text is returned verbatim (entities are not decoded), since
//! `description` is served as a raw HTML snippet.
use regex::Regex;
use std::sync::LazyLock;

use super::types::Article;

static ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<item(?:\s(?:[^>]*[^/>])?)?>(.*?)</item>").expect("item pattern is valid")
});

static CATEGORY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<category(?:\s(?:[^>]*[^/>])?)?>(?:\s*<!\[CDATA\[)?(.*?)(?:\]\]>\s*)?</category>")
        .expect("category pattern is valid")
});

static IMG_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img[^>]+src=["']([^"']+)["']"#).expect("img pattern is valid")
});

/// Compiled wrapped/plain patterns for a single tag name.
struct FieldPattern {
    wrapped: Regex,
    plain: Regex,
}

impl FieldPattern {
    fn new(tag: &str) -> Self {
        let tag = regex::escape(tag);
        let wrapped =
            format!(r"(?is)<{tag}(?:\s(?:[^>]*[^/>])?)?>\s*<!\[CDATA\[(.*?)\]\]>\s*</{tag}>");
        let plain = format!(r"(?is)<{tag}(?:\s(?:[^>]*[^/>])?)?>(.*?)</{tag}>");
        Self {
            wrapped: Regex::new(&wrapped).expect("wrapped field pattern is valid"),
            plain: Regex::new(&plain).expect("plain field pattern is valid"),
        }
    }

    fn extract<'a>(&self, record: &'a str) -> &'a str {
        self.wrapped
            .captures(record)
            .or_else(|| self.plain.captures(record))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .unwrap_or("")
    }
}

struct ItemFields {
    title: FieldPattern,
    pub_date: FieldPattern,
    link: FieldPattern,
    guid: FieldPattern,
    dc_creator: FieldPattern,
    creator: FieldPattern,
    description: FieldPattern,
    content_encoded: FieldPattern,
}

static FIELDS: LazyLock<ItemFields> = LazyLock::new(|| ItemFields {
    title: FieldPattern::new("title"),
    pub_date: FieldPattern::new("pubDate"),
    link: FieldPattern::new("link"),
    guid: FieldPattern::new("guid"),
    dc_creator: FieldPattern::new("dc:creator"),
    creator: FieldPattern::new("creator"),
    description: FieldPattern::new("description"),
    content_encoded: FieldPattern::new("content:encoded"),
});

/// Parses every `<item>` in `xml` into an [`Article`], preserving document order.
///
/// Never fails. A document with no recognisable items yields an empty list.
pub fn parse_feed(xml: &str) -> Vec<Article> {
    let articles: Vec<Article> = records(xml)
        .enumerate()
        .map(|(index, record)| {
            let article = parse_record(record);
            if article.title.is_empty() || article.link.is_empty() {
                tracing::debug!(
                    index = index,
                    guid = %article.guid,
                    "Feed record missing title or link, keeping partial article"
                );
            }
            article
        })
        .collect();

    tracing::debug!(count = articles.len(), "Parsed feed records");
    articles
}

/// Lazily yields the inner markup of each `<item>` record, left to right,
/// without overlap.
pub fn records(xml: &str) -> impl Iterator<Item = &str> + '_ {
    ITEM.captures_iter(xml)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
}

/// Extracts a single record's fields.
pub fn parse_record(record: &str) -> Article {
    let fields = &*FIELDS;

    let description = non_empty_or(fields.description.extract(record), || {
        fields.content_encoded.extract(record)
    });
    let author = non_empty_or(fields.dc_creator.extract(record), || {
        fields.creator.extract(record)
    });

    Article {
        title: fields.title.extract(record).to_string(),
        published_at: fields.pub_date.extract(record).to_string(),
        link: fields.link.extract(record).to_string(),
        guid: fields.guid.extract(record).to_string(),
        author: author.to_string(),
        thumbnail_url: first_image_src(description).to_string(),
        description: description.to_string(),
        categories: categories(record),
    }
}

/// Returns the `src` of the first `<img>` tag in `html`, or `""`.
pub fn first_image_src(html: &str) -> &str {
    IMG_SRC
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or("")
}

fn categories(record: &str) -> Vec<String> {
    CATEGORY
        .captures_iter(record)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

fn non_empty_or<'a>(value: &'a str, fallback: impl FnOnce() -> &'a str) -> &'a str {
    if value.is_empty() {
        fallback()
    } else {
        value
    }
}
