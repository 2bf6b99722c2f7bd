//! DocBuilder (spec §4.5): parses raw HTML into markdown, link/image lists,
//! and metadata. HTML parsing follows the `scraper::{Html, Selector}` idiom
//! demonstrated in the pack's SEO extractor (`general_extractor.rs`'s
//! `Html::parse_document` / `Selector::parse` / `document.select(...)`
//! pattern); markdown conversion is hand-rolled since no ecosystem
//! HTML-to-markdown crate appears anywhere in the donor's or the pack's
//! dependency graphs (out of scope for concrete conversion per spec §1,
//! but a document is still required, so a conservative DOM-walk fallback
//! to visible text is used when structured conversion would be lossy).

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use url::Url;

#[derive(Debug, Clone, Default)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub keywords: Option<String>,
    pub robots: Option<String>,
    pub og_title: Option<String>,
    pub og_description: Option<String>,
    pub og_url: Option<String>,
    pub og_image: Option<String>,
    pub og_site_name: Option<String>,
    pub source_url: String,
    pub status_code: u16,
}

impl PageMetadata {
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        macro_rules! put_opt {
            ($key:literal, $field:expr) => {
                if let Some(v) = &$field {
                    map.insert($key.to_string(), Value::String(v.clone()));
                }
            };
        }
        put_opt!("title", self.title);
        put_opt!("description", self.description);
        put_opt!("language", self.language);
        put_opt!("keywords", self.keywords);
        put_opt!("robots", self.robots);
        put_opt!("ogTitle", self.og_title);
        put_opt!("ogDescription", self.og_description);
        put_opt!("ogUrl", self.og_url);
        put_opt!("ogImage", self.og_image);
        put_opt!("ogSiteName", self.og_site_name);
        map.insert("sourceURL".to_string(), Value::String(self.source_url.clone()));
        map.insert("statusCode".to_string(), Value::from(self.status_code));
        Value::Object(map)
    }
}

#[derive(Debug, Clone)]
pub struct LinkMeta {
    pub url: String,
    pub text: String,
    pub rel: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BuiltDocument {
    pub markdown: String,
    pub html: String,
    pub raw_html: String,
    pub links: Vec<String>,
    pub link_meta: Vec<LinkMeta>,
    pub images: Vec<String>,
    pub metadata: PageMetadata,
}

/// Parses `raw_html` fetched from `base_url` (with HTTP `status_code`) into
/// a `BuiltDocument`. Never fails: a document this spec can always produce
/// something for, even on malformed markup (`scraper`/html5ever parse
/// permissively), so callers get `DocBuilder`'s best effort rather than an
/// error to propagate.
pub fn build(raw_html: &str, base_url: &str, status_code: u16) -> BuiltDocument {
    let document = Html::parse_document(raw_html);
    let base = Url::parse(base_url).ok();

    let metadata = extract_metadata(&document, &base, base_url, status_code);
    let (links, link_meta) = extract_links(&document, &base);
    let images = extract_images(&document, &base);
    let markdown = render_markdown(&document);

    BuiltDocument {
        markdown,
        html: raw_html.to_string(),
        raw_html: raw_html.to_string(),
        links,
        link_meta,
        images,
        metadata,
    }
}

fn text_of(el: ElementRef) -> String {
    el.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

fn select_one<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    Selector::parse(selector).ok().and_then(|s| document.select(&s).next())
}

fn attr_of(document: &Html, selector: &str, attr: &str) -> Option<String> {
    select_one(document, selector).and_then(|el| el.value().attr(attr).map(str::to_string))
}

fn extract_metadata(document: &Html, base: &Option<Url>, fetched_url: &str, status_code: u16) -> PageMetadata {
    let title = select_one(document, "title").map(text_of).filter(|s| !s.is_empty());
    let description = attr_of(document, r#"meta[name="description"]"#, "content");
    let keywords = attr_of(document, r#"meta[name="keywords"]"#, "content");
    let robots = attr_of(document, r#"meta[name="robots"]"#, "content");
    let language = attr_of(document, "html", "lang");
    let og_title = attr_of(document, r#"meta[property="og:title"]"#, "content");
    let og_description = attr_of(document, r#"meta[property="og:description"]"#, "content");
    let og_url = attr_of(document, r#"meta[property="og:url"]"#, "content");
    let og_image = attr_of(document, r#"meta[property="og:image"]"#, "content");
    let og_site_name = attr_of(document, r#"meta[property="og:site_name"]"#, "content");

    let canonical = attr_of(document, r#"link[rel="canonical"]"#, "href")
        .and_then(|href| resolve(base, &href));

    let source_url = canonical.unwrap_or_else(|| fetched_url.to_string());

    PageMetadata {
        title,
        description,
        language,
        keywords,
        robots,
        og_title,
        og_description,
        og_url,
        og_image,
        og_site_name,
        source_url,
        status_code,
    }
}

/// Resolves `href` against `base`, keeping only `http(s)` absolute URLs and
/// stripping fragments (spec §4.5).
fn resolve(base: &Option<Url>, href: &str) -> Option<String> {
    let joined = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    if joined.scheme() != "http" && joined.scheme() != "https" {
        return None;
    }
    let mut joined = joined;
    joined.set_fragment(None);
    Some(joined.to_string())
}

fn extract_links(document: &Html, base: &Option<Url>) -> (Vec<String>, Vec<LinkMeta>) {
    let selector = Selector::parse("a[href]").unwrap();
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    let mut link_meta = Vec::new();

    for el in document.select(&selector) {
        let href = match el.value().attr("href") {
            Some(h) if !h.is_empty() && !h.starts_with('#') => h,
            _ => continue,
        };
        let Some(resolved) = resolve(base, href) else {
            continue;
        };
        let key = resolved.to_lowercase();
        if !seen.insert(key) {
            continue;
        }
        link_meta.push(LinkMeta {
            url: resolved.clone(),
            text: text_of(el),
            rel: el.value().attr("rel").map(str::to_string),
        });
        links.push(resolved);
    }

    (links, link_meta)
}

fn extract_images(document: &Html, base: &Option<Url>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut images = Vec::new();

    if let Ok(selector) = Selector::parse("img[src]") {
        for el in document.select(&selector) {
            if let Some(src) = el.value().attr("src") {
                push_image(base, src, &mut seen, &mut images);
            }
        }
    }

    if let Ok(selector) = Selector::parse("source[srcset]") {
        for el in document.select(&selector) {
            if let Some(srcset) = el.value().attr("srcset") {
                if let Some(first) = srcset.split(',').next() {
                    let url_token = first.trim().split_whitespace().next().unwrap_or("");
                    if !url_token.is_empty() {
                        push_image(base, url_token, &mut seen, &mut images);
                    }
                }
            }
        }
    }

    images
}

fn push_image(base: &Option<Url>, src: &str, seen: &mut HashSet<String>, images: &mut Vec<String>) {
    if let Some(resolved) = resolve(base, src) {
        if seen.insert(resolved.to_lowercase()) {
            images.push(resolved);
        }
    }
}

/// Full-document CommonMark conversion. Walks block-level elements and
/// falls back to a flattened text line for anything not recognized — the
/// fallback-to-visible-text rule from spec §4.5 folded into one walker
/// instead of a separate failure path, since the structured walk never
/// actually errors on arbitrary HTML.
fn render_markdown(document: &Html) -> String {
    let body_selector = Selector::parse("body").unwrap();
    let root = document.select(&body_selector).next();
    let mut out = String::new();

    match root {
        Some(body) => walk_block(body, &mut out),
        None => out.push_str(document.root_element().text().collect::<Vec<_>>().join(" ").trim()),
    }

    out.trim().to_string()
}

fn walk_block(el: ElementRef, out: &mut String) {
    for child in el.children() {
        let Some(child_el) = ElementRef::wrap(child) else {
            if let Some(text) = child.value().as_text() {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    out.push_str(trimmed);
                    out.push(' ');
                }
            }
            continue;
        };

        let tag = child_el.value().name();
        match tag {
            "script" | "style" | "noscript" => continue,
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = tag[1..].parse::<usize>().unwrap_or(1);
                out.push_str(&"#".repeat(level));
                out.push(' ');
                out.push_str(&text_of(child_el));
                out.push_str("\n\n");
            }
            "p" => {
                out.push_str(&text_of(child_el));
                out.push_str("\n\n");
            }
            "a" => {
                let href = child_el.value().attr("href").unwrap_or("");
                out.push_str(&format!("[{}]({})", text_of(child_el), href));
                out.push(' ');
            }
            "li" => {
                out.push_str("- ");
                out.push_str(&text_of(child_el));
                out.push('\n');
            }
            "br" => out.push('\n'),
            _ => walk_block(child_el, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_are_absolute_deduplicated_and_fragment_free() {
        let html = r##"
            <html><body>
                <a href="/a">A</a>
                <a href="/a">A dup</a>
                <a href="https://other.example/b#frag">B</a>
                <a href="#only-fragment">skip</a>
                <a href="">skip empty</a>
            </body></html>
        "##;
        let built = build(html, "https://example.com/page", 200);
        assert_eq!(
            built.links,
            vec!["https://example.com/a", "https://other.example/b"]
        );
    }

    #[test]
    fn images_collect_src_and_first_srcset_token() {
        let html = r#"
            <html><body>
                <img src="/img1.png">
                <picture><source srcset="/img2.png 1x, /img2-2x.png 2x"></picture>
            </body></html>
        "#;
        let built = build(html, "https://example.com", 200);
        assert_eq!(
            built.images,
            vec!["https://example.com/img1.png", "https://example.com/img2.png"]
        );
    }

    #[test]
    fn metadata_prefers_canonical_as_source_url() {
        let html = r#"
            <html lang="en"><head>
                <title>Hi</title>
                <meta name="description" content="desc">
                <link rel="canonical" href="https://example.com/canonical">
            </head><body></body></html>
        "#;
        let built = build(html, "https://example.com/page?x=1", 200);
        assert_eq!(built.metadata.title.as_deref(), Some("Hi"));
        assert_eq!(built.metadata.source_url, "https://example.com/canonical");
        assert_eq!(built.metadata.language.as_deref(), Some("en"));
    }

    #[test]
    fn metadata_falls_back_to_fetched_url_without_canonical() {
        let html = "<html><body></body></html>";
        let built = build(html, "https://example.com/page", 200);
        assert_eq!(built.metadata.source_url, "https://example.com/page");
    }

    #[test]
    fn markdown_renders_headings_and_paragraphs() {
        let html = "<html><body><h1>Title</h1><p>Body text.</p></body></html>";
        let built = build(html, "https://example.com", 200);
        assert!(built.markdown.contains("# Title"));
        assert!(built.markdown.contains("Body text."));
    }
}
