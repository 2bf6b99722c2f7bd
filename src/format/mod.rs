//! FormatProjector (spec §4.6): turns `DocBuilder` output plus a requested
//! `formats` array into the public `Document` JSON shape, calling out to
//! `LlmClient`/`BrowserEngine` for the derived formats. Soft-degrades on
//! provider failure (format omitted + `warning` attached) unless `strict`
//! is set, in which case the failure is hard (`EXTRACT_FAILED`).
//!
//! No donor equivalent — the donor's single echo-manifest model never
//! projected formats — but the trait-object composition (`Arc<dyn LlmClient>`,
//! `Arc<dyn BrowserEngine>`) follows the same async-trait-object idiom the
//! donor used for `JobHandler`/`MessageProducer`.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

use crate::docbuilder::BuiltDocument;
use crate::llm::LlmClient;
use crate::worker::fetcher::BrowserEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    Markdown,
    Html,
    RawHtml,
    Links,
    Images,
    Summary,
    Json,
    Branding,
    Screenshot,
}

#[derive(Debug, Clone)]
pub struct FormatSpec {
    pub kind: FormatKind,
    pub prompt: Option<String>,
    pub schema: Option<Value>,
    pub full_page: bool,
}

impl FormatSpec {
    fn simple(kind: FormatKind) -> Self {
        Self {
            kind,
            prompt: None,
            schema: None,
            full_page: false,
        }
    }
}

#[derive(Deserialize)]
struct FormatObject {
    #[serde(rename = "type")]
    kind: String,
    prompt: Option<String>,
    schema: Option<Value>,
    #[serde(rename = "fullPage", default)]
    full_page: bool,
}

fn kind_from_str(s: &str) -> Option<FormatKind> {
    match s {
        "markdown" => Some(FormatKind::Markdown),
        "html" => Some(FormatKind::Html),
        "rawHtml" => Some(FormatKind::RawHtml),
        "links" => Some(FormatKind::Links),
        "images" => Some(FormatKind::Images),
        "summary" => Some(FormatKind::Summary),
        "json" => Some(FormatKind::Json),
        "branding" => Some(FormatKind::Branding),
        "screenshot" => Some(FormatKind::Screenshot),
        _ => None,
    }
}

pub const DEFAULT_FORMATS: &[FormatKind] = &[
    FormatKind::Markdown,
    FormatKind::Html,
    FormatKind::RawHtml,
    FormatKind::Links,
    FormatKind::Images,
];

/// Parses the `formats` request field: elements are either bare strings or
/// `{type, ...}` objects (spec §4.6). An empty/absent array yields
/// `DEFAULT_FORMATS`. Unknown format names are silently ignored — callers
/// validate the overall request shape elsewhere.
pub fn parse_formats(value: Option<&Value>) -> Vec<FormatSpec> {
    let Some(Value::Array(items)) = value else {
        return DEFAULT_FORMATS.iter().copied().map(FormatSpec::simple).collect();
    };
    if items.is_empty() {
        return DEFAULT_FORMATS.iter().copied().map(FormatSpec::simple).collect();
    }

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => kind_from_str(s).map(FormatSpec::simple),
            Value::Object(_) => {
                let obj: FormatObject = serde_json::from_value(item.clone()).ok()?;
                let kind = kind_from_str(&obj.kind)?;
                Some(FormatSpec {
                    kind,
                    prompt: obj.prompt,
                    schema: obj.schema,
                    full_page: obj.full_page,
                })
            }
            _ => None,
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct LinkFilterConfig {
    pub max_per_document: Option<usize>,
    pub same_domain_only: bool,
}

impl Default for LinkFilterConfig {
    fn default() -> Self {
        Self {
            max_per_document: None,
            same_domain_only: false,
        }
    }
}

pub struct FormatProjector {
    pub llm: Arc<dyn LlmClient>,
    pub browser: Arc<dyn BrowserEngine>,
    pub link_filters: LinkFilterConfig,
}

#[derive(Debug, Default)]
pub struct ProjectionOutcome {
    pub document: Value,
    pub warnings: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("format projection failed: {0}")]
pub struct ProjectionError(pub String);

impl FormatProjector {
    pub fn new(llm: Arc<dyn LlmClient>, browser: Arc<dyn BrowserEngine>, link_filters: LinkFilterConfig) -> Self {
        Self { llm, browser, link_filters }
    }

    /// Projects `built` through `formats`, producing the public Document
    /// JSON object. `strict` upgrades provider failures to hard errors.
    pub async fn project(
        &self,
        built: &BuiltDocument,
        source_url: &str,
        formats: &[FormatSpec],
        strict: bool,
    ) -> Result<ProjectionOutcome, ProjectionError> {
        let mut doc = Map::new();
        let mut metadata = built.metadata.to_json();
        let mut warnings = Vec::new();

        for spec in formats {
            match spec.kind {
                FormatKind::Markdown => {
                    doc.insert("markdown".into(), Value::String(built.markdown.clone()));
                }
                FormatKind::Html => {
                    doc.insert("html".into(), Value::String(built.html.clone()));
                }
                FormatKind::RawHtml => {
                    doc.insert("rawHtml".into(), Value::String(built.raw_html.clone()));
                }
                FormatKind::Links => {
                    doc.insert("links".into(), Value::Array(self.filtered_links(built, source_url)));
                }
                FormatKind::Images => {
                    doc.insert(
                        "images".into(),
                        Value::Array(built.images.iter().cloned().map(Value::String).collect()),
                    );
                }
                FormatKind::Summary => match self.llm.summarize(&built.markdown).await {
                    Ok(summary) => {
                        if let Value::Object(m) = &mut metadata {
                            m.insert("summary".into(), Value::String(summary));
                        }
                    }
                    Err(e) => self.degrade("summary", e.to_string(), strict, &mut warnings)?,
                },
                FormatKind::Json => {
                    let schema = spec.schema.clone().unwrap_or(Value::Object(Map::new()));
                    match self
                        .llm
                        .extract(&built.markdown, &schema, spec.prompt.as_deref(), None)
                        .await
                    {
                        Ok(json) => {
                            if let Value::Object(m) = &mut metadata {
                                m.insert("json".into(), json);
                            }
                        }
                        Err(e) => self.degrade("json", e.to_string(), strict, &mut warnings)?,
                    }
                }
                FormatKind::Branding => {
                    let schema = branding_schema();
                    match self
                        .llm
                        .extract(&built.markdown, &schema, spec.prompt.as_deref(), None)
                        .await
                    {
                        Ok(mut branding) => {
                            prune_nulls(&mut branding);
                            if let Value::Object(m) = &mut metadata {
                                m.insert("branding".into(), branding);
                            }
                        }
                        Err(e) => self.degrade("branding", e.to_string(), strict, &mut warnings)?,
                    }
                }
                FormatKind::Screenshot => {
                    match self.browser.capture_screenshot(source_url, spec.full_page).await {
                        Ok(base64) => {
                            if let Value::Object(m) = &mut metadata {
                                m.insert("screenshotBase64".into(), Value::String(base64));
                            }
                        }
                        Err(e) => self.degrade("screenshot", e.to_string(), strict, &mut warnings)?,
                    }
                }
            }
        }

        doc.insert("metadata".into(), metadata);
        Ok(ProjectionOutcome {
            document: Value::Object(doc),
            warnings,
        })
    }

    fn degrade(
        &self,
        format: &str,
        reason: String,
        strict: bool,
        warnings: &mut Vec<String>,
    ) -> Result<(), ProjectionError> {
        if strict {
            return Err(ProjectionError(format!("{format} failed: {reason}")));
        }
        warnings.push(format!("{format} failed: {reason}"));
        Ok(())
    }

    fn filtered_links(&self, built: &BuiltDocument, source_url: &str) -> Vec<Value> {
        let source_host = Url::parse(source_url).ok().and_then(|u| u.host_str().map(str::to_string));

        let mut links: Vec<&String> = built
            .links
            .iter()
            .filter(|link| {
                if !self.link_filters.same_domain_only {
                    return true;
                }
                let host = Url::parse(link).ok().and_then(|u| u.host_str().map(str::to_string));
                host == source_host
            })
            .collect();

        if let Some(max) = self.link_filters.max_per_document {
            links.truncate(max);
        }

        links.into_iter().cloned().map(Value::String).collect()
    }
}

fn branding_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "name": {"type": "string"},
            "logo": {"type": "string"},
            "primaryColor": {"type": "string"}
        }
    })
}

fn prune_nulls(value: &mut Value) {
    if let Value::Object(map) = value {
        map.retain(|_, v| !v.is_null());
    }
}
