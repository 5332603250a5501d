//! Offline-safe HTML rewriting
//!
//! `normalize` moves every network reference of a page into inert `data-*`
//! attributes holding site-relative paths; `redact` replaces what cannot be
//! shown offline (media, embeds, document downloads) with text placeholders
//! and strips the remaining link targets. `sanitize` runs both.

use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;
use url::Url;

use super::dom::{self, Element, Fragment};
use crate::util::relative_reference;

/// Class carried by every placeholder span
pub const PLACEHOLDER_CLASS: &str = "offline-placeholder";

const MEDIA_ELEMENTS: &[&str] = &["img", "video", "audio", "source", "track"];

const LINK_ELEMENTS: &[&str] = &["a", "area"];

const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "xls", "xlsx"];

/// Attributes that can still point at the site once the element-specific
/// rewrites have run
const URL_ATTRIBUTES: &[&str] = &["src", "action", "formaction", "cite", "data", "background"];

static RE_BACKGROUND: OnceLock<Regex> = OnceLock::new();

/// A `background` or `background-image` declaration carrying a `url(...)`
fn background_re() -> &'static Regex {
    RE_BACKGROUND.get_or_init(|| {
        Regex::new(
            r#"(?i)background(?:-image)?\s*:[^;]*?url\(\s*['"]?([^'")]*?)['"]?\s*\)[^;]*;?"#,
        )
        .unwrap()
    })
}

/// Sanitize a fetched page for offline display.
///
/// Returns the `<body>` inner HTML. Deterministic and idempotent.
pub fn sanitize(html: &str, base_url: &str) -> String {
    let mut nodes = dom::parse_body(html);
    normalize_nodes(&mut nodes, base_url);
    redact_nodes(&mut nodes);
    dom::serialize(&nodes)
}

/// Rewrite media sources, same-origin links and background images to
/// relative `data-*` attributes.
pub fn normalize(html: &str, base_url: &str) -> String {
    let mut nodes = dom::parse_body(html);
    normalize_nodes(&mut nodes, base_url);
    dom::serialize(&nodes)
}

/// Replace non-text content with placeholders and strip link targets.
pub fn redact(html: &str) -> String {
    let mut nodes = dom::parse_body(html);
    redact_nodes(&mut nodes);
    dom::serialize(&nodes)
}

// ============================================================================
// Normalize
// ============================================================================

fn normalize_nodes(nodes: &mut [Fragment], base_url: &str) {
    let base = match Url::parse(base_url) {
        Ok(base) => base,
        Err(e) => {
            warn!("Invalid base URL {}: {}; leaving references as-is", base_url, e);
            return;
        }
    };
    walk_elements(nodes, &mut |el: &mut Element| normalize_element(el, &base));
}

fn walk_elements(nodes: &mut [Fragment], f: &mut dyn FnMut(&mut Element)) {
    for node in nodes {
        if let Fragment::Element(el) = node {
            f(el);
            walk_elements(&mut el.children, f);
        }
    }
}

fn normalize_element(el: &mut Element, base: &Url) {
    if MEDIA_ELEMENTS.contains(&el.name.as_str()) {
        normalize_media(el, base);
    }
    if LINK_ELEMENTS.contains(&el.name.as_str()) {
        normalize_link(el, base);
    }
    if el.attrs.contains_key("style") {
        normalize_background(el, base);
    }
    normalize_remaining(el, base);
}

fn normalize_media(el: &mut Element, base: &Url) {
    let mut sources = vec![("src", "data-src")];
    if el.name == "video" {
        sources.push(("poster", "data-poster"));
    }

    let mut rewrites = Vec::new();
    for (attr, data_attr) in sources {
        if let Some(value) = el.attr(attr) {
            match base.join(value.trim()) {
                Ok(url) => rewrites.push((attr, data_attr, relative_reference(&url))),
                Err(_) => return,
            }
        }
    }

    for (attr, data_attr, reference) in rewrites {
        el.attrs.remove(attr);
        el.attrs.insert(data_attr.to_string(), reference);
    }
    el.attrs.remove("srcset");
}

fn normalize_link(el: &mut Element, base: &Url) {
    let Some(href) = el.attr("href") else {
        return;
    };
    let Ok(url) = base.join(href.trim()) else {
        return;
    };
    if url.origin() != base.origin() {
        return;
    }

    let mut reference = relative_reference(&url);
    if let Some(fragment) = url.fragment() {
        reference.push('#');
        reference.push_str(fragment);
    }
    el.attrs.remove("href");
    el.attrs.insert("data-href".to_string(), reference);
}

fn normalize_background(el: &mut Element, base: &Url) {
    let Some(style) = el.attr("style") else {
        return;
    };
    let re = background_re();
    let Some(target) = re.captures(style).and_then(|c| c.get(1)) else {
        return;
    };
    let Ok(url) = base.join(target.as_str().trim()) else {
        return;
    };

    let remaining = re.replace_all(style, "");
    let remaining = remaining.trim().trim_matches(';').trim().to_string();

    el.attrs
        .insert("data-background-src".to_string(), relative_reference(&url));
    if remaining.is_empty() {
        el.attrs.remove("style");
    } else {
        el.attrs.insert("style".to_string(), remaining);
    }
}

/// Move any other same-origin URL attribute (form actions, quote sources,
/// image inputs, legacy backgrounds) to its `data-*` counterpart.
fn normalize_remaining(el: &mut Element, base: &Url) {
    for attr in URL_ATTRIBUTES {
        let Some(value) = el.attr(attr) else {
            continue;
        };
        let Ok(url) = base.join(value.trim()) else {
            continue;
        };
        if url.origin() != base.origin() {
            continue;
        }
        el.attrs.remove(*attr);
        el.attrs
            .insert(format!("data-{}", attr), relative_reference(&url));
    }
}

// ============================================================================
// Redact
// ============================================================================

fn redact_nodes(nodes: &mut [Fragment]) {
    for node in nodes {
        let Fragment::Element(el) = node else {
            continue;
        };
        if let Some(placeholder) = placeholder_for(el) {
            *node = placeholder;
            continue;
        }
        if LINK_ELEMENTS.contains(&el.name.as_str()) {
            el.attrs.remove("href");
            el.attrs.remove("data-href");
        }
        redact_nodes(&mut el.children);
    }
}

fn placeholder_for(el: &Element) -> Option<Fragment> {
    let (kind, label) = match el.name.as_str() {
        "img" => ("image", image_label(el)),
        "picture" => (
            "image",
            el.find_descendant("img")
                .map(image_label)
                .unwrap_or_else(|| "Image".to_string()),
        ),
        "video" => ("video", "Video".to_string()),
        "audio" => ("audio", "Audio".to_string()),
        "svg" => ("graphic", "Graphic".to_string()),
        "iframe" | "embed" | "object" => ("embed", "Embedded content".to_string()),
        "a" | "area" => {
            let target = el.attr("href").or_else(|| el.attr("data-href"))?;
            ("document", format!("Document: {}", document_name(target)?))
        }
        _ => return None,
    };
    Some(placeholder(kind, &label))
}

fn image_label(img: &Element) -> String {
    match img.attr("alt").map(str::trim) {
        Some(alt) if !alt.is_empty() => alt.to_string(),
        _ => "Image".to_string(),
    }
}

fn placeholder(kind: &str, label: &str) -> Fragment {
    Fragment::Element(
        Element::new("span")
            .with_attr("class", PLACEHOLDER_CLASS)
            .with_attr("data-kind", kind)
            .with_text(format!("[{}]", label)),
    )
}

/// File name of a link target pointing at an office document or PDF
fn document_name(target: &str) -> Option<String> {
    let path = target.split(['?', '#']).next().unwrap_or_default();
    let name = path.rsplit('/').next().unwrap_or_default();
    let (_, extension) = name.rsplit_once('.')?;
    if DOCUMENT_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str()) {
        Some(name.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://ex.com";

    #[test]
    fn test_image_becomes_alt_placeholder() {
        let out = sanitize(r#"<p><img src="https://ex.com/p/x.png" alt="Cat"></p>"#, BASE);
        assert_eq!(
            out,
            r#"<p><span class="offline-placeholder" data-kind="image">[Cat]</span></p>"#
        );
        assert!(!out.contains("<img"));
    }

    #[test]
    fn test_media_placeholders() {
        let html = r#"
            <img src="/a.png">
            <picture><source srcset="/b.webp"><img src="/b.png" alt="Dog"></picture>
            <video src="/v.mp4" poster="/v.jpg"></video>
            <audio><source src="/s.mp3"></audio>
            <svg viewBox="0 0 1 1"><circle r="1"></circle></svg>
            <iframe src="https://www.youtube.com/embed/x"></iframe>
            <object data="/f.swf"></object>
        "#;
        let out = sanitize(html, BASE);

        for tag in ["<img", "<video", "<audio", "<svg", "<iframe", "<object", "<picture"] {
            assert!(!out.contains(tag), "{} left in {}", tag, out);
        }
        for label in ["[Image]", "[Dog]", "[Video]", "[Audio]", "[Graphic]", "[Embedded content]"] {
            assert!(out.contains(label), "{} missing in {}", label, out);
        }
    }

    #[test]
    fn test_document_link_placeholder() {
        let out = sanitize(
            r#"<a href="https://ex.com/files/Report.PDF?dl=1">report</a> <a href="/a/b">next</a>"#,
            BASE,
        );
        assert_eq!(
            out,
            r#"<span class="offline-placeholder" data-kind="document">[Document: Report.PDF]</span> <a>next</a>"#
        );
    }

    #[test]
    fn test_foreign_links_lose_href() {
        let out = sanitize(r#"<a href="https://other.org/x" class="ext">x</a>"#, BASE);
        assert_eq!(out, r#"<a class="ext">x</a>"#);
    }

    #[test]
    fn test_normalize_rewrites_references() {
        let html = r#"<img src="https://ex.com/content/x.png?w=300" srcset="a.png 1x, b.png 2x">
            <video src="/v.mp4" poster="https://cdn.ex.com/p.jpg"></video>
            <a href="https://ex.com/tag/rust/#top">rust</a>
            <a href="https://other.org/x">x</a>"#;
        let out = normalize(html, "https://ex.com/");

        assert!(out.contains(r#"<img data-src="/content/x.png?w=300">"#));
        assert!(out.contains(r#"<video data-poster="/p.jpg" data-src="/v.mp4"></video>"#));
        assert!(out.contains(r##"<a data-href="/tag/rust/#top">rust</a>"##));
        assert!(out.contains(r#"<a href="https://other.org/x">x</a>"#));
        assert!(!out.contains("https://ex.com"));
    }

    #[test]
    fn test_background_image_moved_to_data_attribute() {
        let html = r#"<div style="color: red; background-image: url('https://ex.com/bg.jpg');">a</div>
            <div style="background-image:url(/hero.png)">b</div>"#;
        let out = normalize(html, BASE);
        assert!(out.contains(r#"<div data-background-src="/bg.jpg" style="color: red">a</div>"#));
        assert!(out.contains(r#"<div data-background-src="/hero.png">b</div>"#));
    }

    #[test]
    fn test_other_url_attributes_moved_to_data_attributes() {
        let html = r#"<form action="https://ex.com/subscribe"><input type="image" src="https://ex.com/btn.png">
            <button formaction="/members/signin">go</button></form>
            <blockquote cite="https://ex.com/q">said</blockquote><q cite="https://other.org/q">x</q>
            <div style="background: url(https://ex.com/hero.jpg) no-repeat">hero</div>
            <table background="https://ex.com/t.gif"><tr><td>t</td></tr></table>"#;
        let out = sanitize(html, BASE);

        assert!(!out.contains(BASE), "absolute reference left in {}", out);
        assert!(out.contains(r#"<form data-action="/subscribe">"#));
        assert!(out.contains(r#"<input data-src="/btn.png" type="image">"#));
        assert!(out.contains(r#"<button data-formaction="/members/signin">go</button>"#));
        assert!(out.contains(r#"<blockquote data-cite="/q">said</blockquote>"#));
        assert!(out.contains(r#"<q cite="https://other.org/q">x</q>"#));
        assert!(out.contains(r#"<div data-background-src="/hero.jpg">hero</div>"#));
        assert!(out.contains(r#"<table data-background="/t.gif">"#));
    }

    #[test]
    fn test_background_shorthand_without_url_is_kept() {
        let out = normalize(r#"<div style="background: #fff; background-color: red">a</div>"#, BASE);
        assert_eq!(out, r#"<div style="background: #fff; background-color: red">a</div>"#);
    }

    #[test]
    fn test_malformed_url_leaves_element_unmodified() {
        let html = r#"<img src="http://[bad" alt="x"><a href="http://[bad">y</a>"#;
        let out = normalize(html, BASE);
        assert!(out.contains(r#"<img alt="x" src="http://[bad">"#));
        assert!(out.contains(r#"<a href="http://[bad">y</a>"#));
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let pages = [
            r#"<html><head><title>Post</title></head><body>
                <article><h1>Title</h1><p>Text &amp; more&nbsp;here</p>
                <figure><img src="/x.png" alt="A &quot;quoted&quot; cat"><figcaption>cap</figcaption></figure>
                <table><tr><td>cell</td></tr></table>
                <pre>
code</pre>
                <a href="/doc.docx">doc</a><a href="/next">next</a>
                <div style="background-image: url(/bg.png); margin: 0">bg</div>
                </article></body></html>"#,
            "plain text only",
            "",
            "<p>unclosed <b>bold <i>both</p> tail",
            "<plaintext>a</plaintext><p>b</p>",
            r#"<p>x<plaintext>
<img src="/y.png"> &amp; more"#,
        ];

        for page in pages {
            let once = sanitize(page, BASE);
            let twice = sanitize(&once, BASE);
            assert_eq!(once, twice, "not idempotent for {:?}", page);
        }
    }

    #[test]
    fn test_redact_alone_keeps_text() {
        let out = redact(r#"<p>Hello <a data-href="/x">world</a><img alt=" "></p>"#);
        assert_eq!(
            out,
            r#"<p>Hello <a>world</a><span class="offline-placeholder" data-kind="image">[Image]</span></p>"#
        );
    }

    #[test]
    fn test_document_name() {
        assert_eq!(document_name("/files/a.xlsx").as_deref(), Some("a.xlsx"));
        assert_eq!(document_name("https://ex.com/a.pdf#p=2").as_deref(), Some("a.pdf"));
        assert_eq!(document_name("/files/a.html"), None);
        assert_eq!(document_name("/files/"), None);
    }
}
