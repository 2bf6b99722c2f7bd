//! Synchronous request validation shared across routes (spec §7:
//! "Validation... surfaced synchronously before enqueue").

use url::Url;

use super::error::ApiError;

/// An http(s) URL with a host, matching spec §4.9's `BAD_REQUEST_INVALID_URL`
/// rule.
pub fn valid_http_url(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.host_str().is_some(),
        Err(_) => false,
    }
}

pub fn require_valid_url(raw: &str) -> Result<(), ApiError> {
    if valid_http_url(raw) {
        Ok(())
    } else {
        Err(ApiError::BadRequestInvalidUrl(raw.to_string()))
    }
}

/// `/search`'s `scrapeOptions.formats` is restricted to markdown/html/rawHtml
/// (spec §6).
pub const SEARCH_ALLOWED_FORMATS: &[&str] = &["markdown", "html", "rawHtml"];

pub fn validate_search_formats(scrape_options: Option<&serde_json::Value>) -> Result<(), ApiError> {
    let Some(formats) = scrape_options.and_then(|o| o.get("formats")) else {
        return Ok(());
    };
    let Some(list) = formats.as_array() else {
        return Ok(());
    };
    for entry in list {
        let kind = entry.as_str().or_else(|| entry.get("type").and_then(|t| t.as_str()));
        match kind {
            Some(k) if SEARCH_ALLOWED_FORMATS.contains(&k) => continue,
            other => {
                return Err(ApiError::UnsupportedFormat(
                    other.unwrap_or("unknown").to_string(),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_http_and_https() {
        assert!(valid_http_url("https://example.com"));
        assert!(valid_http_url("http://example.com/path"));
    }

    #[test]
    fn rejects_non_http_schemes_and_garbage() {
        assert!(!valid_http_url("ftp://example.com"));
        assert!(!valid_http_url("not a url"));
    }

    #[test]
    fn search_formats_whitelist_rejects_json() {
        let opts = json!({"formats": ["markdown", "json"]});
        assert!(validate_search_formats(Some(&opts)).is_err());
    }

    #[test]
    fn search_formats_whitelist_allows_plain_formats() {
        let opts = json!({"formats": ["markdown", "html", "rawHtml"]});
        assert!(validate_search_formats(Some(&opts)).is_ok());
    }
}
