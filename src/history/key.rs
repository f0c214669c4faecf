use url::Url;

/// Normalized forms of a url used to match history entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlKeys {
    /// scheme + host + path, no query or fragment, no trailing slash.
    pub prefix: String,
    /// The url as given, cut at the first `?` or `#`. `None` when the url has
    /// no query or fragment, so a plain revisit is never its own parent.
    pub stripped: Option<String>,
}

/// Returns `None` for urls that are not http, https or file, or that do not
/// parse at all. Such urls are never merged.
pub fn url_keys(raw: &str) -> Option<UrlKeys> {
    let raw = raw.trim();
    let parsed = Url::parse(raw).ok()?;
    match parsed.scheme() {
        "http" | "https" | "file" => {}
        _ => return None,
    }

    let mut origin = format!("{}://{}", parsed.scheme(), parsed.host_str().unwrap_or(""));
    if let Some(port) = parsed.port() {
        origin.push(':');
        origin.push_str(&port.to_string());
    }
    let prefix = format!("{origin}{}", parsed.path().trim_end_matches('/'));

    let stripped = raw.find(['?', '#']).map(|cut| raw[..cut].to_string());

    Some(UrlKeys { prefix, stripped })
}
