//! Sitemap document parsing
//!
//! Two formats are understood:
//! - XML sitemaps: `<urlset><url><loc/><lastmod/></url></urlset>`
//! - The human-readable HTML index WordPress renders when its XSL stylesheet
//!   is applied server-side: `#sitemap__table tbody tr td.loc a`

use chrono::{DateTime, NaiveDate, Utc};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use scraper::{Html, Selector};
use url::Url;

use super::SitemapError;
use crate::types::SitemapEntry;

#[derive(Clone, Copy)]
enum Field {
    Loc,
    LastMod,
}

/// Parse a sitemap document, falling back to the HTML table layout when the
/// text holds no XML `<url>` records.
pub fn parse_sitemap(text: &str, page_url: &Url) -> Result<Vec<SitemapEntry>, SitemapError> {
    let xml_error = match parse_xml(text) {
        Ok(entries) if !entries.is_empty() => return Ok(entries),
        Ok(_) => None,
        Err(e) => Some(e),
    };

    let entries = parse_html_table(text, page_url);
    match xml_error {
        Some(e) if entries.is_empty() && looks_like_xml(text) => Err(e),
        _ => Ok(entries),
    }
}

fn looks_like_xml(text: &str) -> bool {
    let head = text.trim_start();
    head.starts_with("<?xml") || head.starts_with("<urlset") || head.starts_with("<sitemapindex")
}

/// Extract `<url>` records from an XML sitemap, in document order
pub fn parse_xml(xml: &str) -> Result<Vec<SitemapEntry>, SitemapError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut in_url = false;
    // Depth of elements nested below <url> other than <loc>/<lastmod>,
    // e.g. <image:image><image:loc/></image:image>
    let mut nested = 0usize;
    let mut field: Option<Field> = None;
    let mut loc = String::new();
    let mut lastmod = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"url" if !in_url => {
                    in_url = true;
                    nested = 0;
                    loc.clear();
                    lastmod.clear();
                }
                b"loc" if in_url && nested == 0 => field = Some(Field::Loc),
                b"lastmod" if in_url && nested == 0 => field = Some(Field::LastMod),
                _ if in_url => nested += 1,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if let Some(f) = field {
                    let text = e
                        .unescape()
                        .map_err(|err| SitemapError::Parse(err.to_string()))?;
                    push_field(f, &text, &mut loc, &mut lastmod);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(f) = field {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    push_field(f, &text, &mut loc, &mut lastmod);
                }
            }
            Ok(Event::End(_)) if in_url && nested > 0 => nested -= 1,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"url" => {
                    let url = loc.trim();
                    if in_url && !url.is_empty() {
                        let mut entry = SitemapEntry::new(url);
                        entry.creation_date = parse_lastmod(lastmod.trim());
                        entries.push(entry);
                    }
                    in_url = false;
                    field = None;
                }
                b"loc" | b"lastmod" => field = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SitemapError::Parse(format!(
                    "{} at position {}",
                    e,
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
    }

    Ok(entries)
}

fn push_field(field: Field, text: &str, loc: &mut String, lastmod: &mut String) {
    match field {
        Field::Loc => loc.push_str(text),
        Field::LastMod => lastmod.push_str(text),
    }
}

/// Parse a W3C datetime as used by `<lastmod>`; unparseable values yield `None`
pub fn parse_lastmod(value: &str) -> Option<DateTime<Utc>> {
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

/// Extract entry links from the HTML sitemap table
pub fn parse_html_table(html: &str, page_url: &Url) -> Vec<SitemapEntry> {
    let (Ok(row_selector), Ok(link_selector)) = (
        Selector::parse("#sitemap__table tbody tr"),
        Selector::parse("td.loc a[href]"),
    ) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let mut entries = Vec::new();

    for row in document.select(&row_selector) {
        let Some(anchor) = row.select(&link_selector).next() else {
            continue;
        };
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        match page_url.join(href.trim()) {
            Ok(url) => entries.push(SitemapEntry::new(url.as_str())),
            Err(e) => tracing::debug!("Skipping sitemap link {}: {}", href, e),
        }
    }

    entries
}
