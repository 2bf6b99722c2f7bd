//! URL discovery shared by `/map` and `CrawlExecutor` (spec §4.7 step 1):
//! sitemap.xml + HTML anchors, then include/exclude/host/robots/query
//! filters, then dedup and limit.

use std::collections::HashSet;

use regex::Regex;
use url::Url;

use crate::docbuilder;
use crate::executor::context::ExecutorContext;
use crate::worker::fetcher::FetchOptions;

#[derive(Debug, Clone)]
pub struct DiscoveredUrl {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DiscoverOptions {
    pub limit: Option<usize>,
    pub search: Option<String>,
    pub include_paths: Vec<String>,
    pub exclude_paths: Vec<String>,
    pub allow_subdomains: bool,
    pub allow_external_links: bool,
    pub ignore_robots_txt: bool,
    pub ignore_query_parameters: bool,
}

#[derive(Debug, Default)]
pub struct DiscoverResult {
    pub urls: Vec<DiscoveredUrl>,
    pub warning: Option<String>,
}

pub async fn discover(ctx: &ExecutorContext, base_url: &str, options: &DiscoverOptions) -> DiscoverResult {
    let Ok(base) = Url::parse(base_url) else {
        return DiscoverResult::default();
    };

    let mut sitemap_urls = fetch_sitemap_urls(ctx, &base).await;
    let mut anchor_urls = fetch_anchor_urls(ctx, base_url).await;

    let disallowed = if options.ignore_robots_txt {
        Vec::new()
    } else {
        fetch_robots_disallow(ctx, &base).await
    };

    let include_res: Vec<Regex> = options.include_paths.iter().filter_map(|p| Regex::new(p).ok()).collect();
    let exclude_res: Vec<Regex> = options.exclude_paths.iter().filter_map(|p| Regex::new(p).ok()).collect();

    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    // Sitemap results precede HTML-anchor results in discovery order (spec §4.7 tie-break).
    merged.append(&mut sitemap_urls);
    merged.append(&mut anchor_urls);

    let mut filtered = Vec::new();
    for candidate in merged {
        let Ok(parsed) = Url::parse(&candidate.url) else { continue };

        if !host_allowed(&base, &parsed, options.allow_subdomains, options.allow_external_links) {
            continue;
        }

        let path = parsed.path();
        if !include_res.is_empty() && !include_res.iter().any(|r| r.is_match(path)) {
            continue;
        }
        if exclude_res.iter().any(|r| r.is_match(path)) {
            continue;
        }

        if disallowed.iter().any(|d| path.starts_with(d.as_str())) {
            continue;
        }

        let canonical = canonicalize(&parsed, options.ignore_query_parameters);

        if let Some(search) = &options.search {
            let haystack = format!(
                "{} {} {}",
                canonical,
                candidate.title.as_deref().unwrap_or(""),
                candidate.description.as_deref().unwrap_or("")
            )
            .to_lowercase();
            if !haystack.contains(&search.to_lowercase()) {
                continue;
            }
        }

        let key = canonical.to_lowercase();
        if !seen.insert(key) {
            continue;
        }

        filtered.push(DiscoveredUrl {
            url: canonical,
            title: candidate.title,
            description: candidate.description,
        });

        if let Some(limit) = options.limit {
            if filtered.len() >= limit {
                break;
            }
        }
    }

    let warning = if filtered.len() <= 1 {
        Some("deep path yielded at most one link; consider mapping the base domain".to_string())
    } else {
        None
    };

    DiscoverResult { urls: filtered, warning }
}

fn host_allowed(base: &Url, candidate: &Url, allow_subdomains: bool, allow_external: bool) -> bool {
    if allow_external {
        return true;
    }
    let (Some(base_host), Some(candidate_host)) = (base.host_str(), candidate.host_str()) else {
        return false;
    };
    if base_host == candidate_host {
        return true;
    }
    allow_subdomains && candidate_host.ends_with(&format!(".{base_host}"))
}

fn canonicalize(url: &Url, strip_query: bool) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    if strip_query {
        url.set_query(None);
    }
    url.to_string()
}

async fn fetch_sitemap_urls(ctx: &ExecutorContext, base: &Url) -> Vec<DiscoveredUrl> {
    let Ok(sitemap_url) = base.join("/sitemap.xml") else {
        return Vec::new();
    };
    let options = FetchOptions {
        user_agent: ctx.user_agent.clone(),
        ..FetchOptions::default()
    };
    let Ok(outcome) = ctx.fetcher.fetch(sitemap_url.as_str(), &options).await else {
        return Vec::new();
    };
    if outcome.status_code != 200 {
        return Vec::new();
    }

    let loc_re = Regex::new(r"<loc>\s*([^<\s]+)\s*</loc>").unwrap();
    loc_re
        .captures_iter(&outcome.raw_html)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .map(|url| DiscoveredUrl { url, title: None, description: None })
        .collect()
}

async fn fetch_anchor_urls(ctx: &ExecutorContext, base_url: &str) -> Vec<DiscoveredUrl> {
    let options = FetchOptions {
        user_agent: ctx.user_agent.clone(),
        ..FetchOptions::default()
    };
    let Ok(outcome) = ctx.fetcher.fetch(base_url, &options).await else {
        return Vec::new();
    };

    let built = docbuilder::build(&outcome.raw_html, base_url, outcome.status_code);
    built
        .link_meta
        .into_iter()
        .map(|lm| DiscoveredUrl {
            url: lm.url,
            title: if lm.text.is_empty() { None } else { Some(lm.text) },
            description: None,
        })
        .collect()
}

async fn fetch_robots_disallow(ctx: &ExecutorContext, base: &Url) -> Vec<String> {
    let Ok(robots_url) = base.join("/robots.txt") else {
        return Vec::new();
    };
    let options = FetchOptions {
        user_agent: ctx.user_agent.clone(),
        ..FetchOptions::default()
    };
    let Ok(outcome) = ctx.fetcher.fetch(robots_url.as_str(), &options).await else {
        return Vec::new();
    };
    if outcome.status_code != 200 {
        return Vec::new();
    }

    let mut applies = false;
    let mut disallowed = Vec::new();
    for line in outcome.raw_html.lines() {
        let line = line.trim();
        if let Some(agent) = line.to_lowercase().strip_prefix("user-agent:") {
            applies = agent.trim() == "*";
            continue;
        }
        if !applies {
            continue;
        }
        if let Some(path) = line.to_lowercase().strip_prefix("disallow:") {
            let path = path.trim();
            if !path.is_empty() {
                disallowed.push(path.to_string());
            }
        }
    }
    disallowed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_strips_fragment_always_and_query_when_requested() {
        let url = Url::parse("https://example.com/a?x=1#frag").unwrap();
        assert_eq!(canonicalize(&url, false), "https://example.com/a?x=1");
        assert_eq!(canonicalize(&url, true), "https://example.com/a");
    }

    #[test]
    fn host_allowed_rejects_cross_host_without_flags() {
        let base = Url::parse("https://example.com").unwrap();
        let other = Url::parse("https://evil.com").unwrap();
        assert!(!host_allowed(&base, &other, false, false));
        assert!(host_allowed(&base, &other, false, true));
    }

    #[test]
    fn host_allowed_accepts_subdomain_when_flagged() {
        let base = Url::parse("https://example.com").unwrap();
        let sub = Url::parse("https://blog.example.com").unwrap();
        assert!(!host_allowed(&base, &sub, false, false));
        assert!(host_allowed(&base, &sub, true, false));
    }
}
