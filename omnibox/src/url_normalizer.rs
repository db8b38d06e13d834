//! URL helpers: dedup keys, scheme/www stripping, and fix-up of typed text.

use std::net::Ipv4Addr;
use url::Url;

/// Schemes recognised when the user types them explicitly. Exotic schemes like
/// javascript: or data: are not treated as navigable input.
const EXPLICIT_SCHEMES: &[&str] = &["http://", "https://", "ftp://", "file://"];

/// Query parameters that never change the destination page
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "dclid", "msclkid", "mc_eid", "ref_src"];

fn is_tracking_param(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with("utm_") || TRACKING_PARAMS.contains(&lower.as_str())
}

/// Canonical key used to spot two URLs pointing at the same page.
///
/// Scheme, a leading `www.`, a trailing slash, the fragment, and tracking
/// parameters are dropped. Host is lowercased; path case is preserved.
pub fn normalize_url_for_dedup(url: &str) -> String {
    let trimmed = url.trim();
    let parsed = match Url::parse(trimmed) {
        Ok(parsed) if parsed.has_host() => parsed,
        _ => return normalize_unparsed(trimmed),
    };

    let host = parsed.host_str().unwrap_or_default();
    let mut key = String::from(host.strip_prefix("www.").unwrap_or(host));
    if let Some(port) = parsed.port() {
        key.push(':');
        key.push_str(&port.to_string());
    }
    key.push_str(parsed.path().trim_end_matches('/'));

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(name, _)| !is_tracking_param(name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    if !params.is_empty() {
        params.sort();
        let joined: Vec<String> = params.iter().map(|(n, v)| format!("{}={}", n, v)).collect();
        key.push('?');
        key.push_str(&joined.join("&"));
    }
    key
}

/// Fallback for strings the URL parser rejects (e.g. "example.com/foo/").
fn normalize_unparsed(text: &str) -> String {
    let without_fragment = text.split('#').next().unwrap_or(text);
    let stripped = strip_scheme_and_www(without_fragment).to_lowercase();
    stripped.trim_end_matches('/').to_string()
}

/// Remove a leading `scheme://` and then a leading `www.` (case-insensitive).
pub fn strip_scheme_and_www(url: &str) -> String {
    let rest = match url.find("://") {
        Some(pos) if url[..pos].chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c)) => &url[pos + 3..],
        _ => url,
    };
    match rest.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("www.") => rest[4..].to_string(),
        _ => rest.to_string(),
    }
}

/// Whether `text` starts with one of the schemes we accept as typed URLs
pub fn has_explicit_scheme(text: &str) -> bool {
    let lower = text.trim().to_ascii_lowercase();
    EXPLICIT_SCHEMES.iter().any(|s| lower.starts_with(s))
}

/// Heuristic: does the typed text look like something to navigate to?
pub fn looks_like_url(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
        return false;
    }
    if has_explicit_scheme(trimmed) {
        return Url::parse(trimmed).map_or(false, |u| u.has_host() || u.scheme() == "file");
    }

    let host_port = trimmed
        .split(|c| c == '/' || c == '?' || c == '#')
        .next()
        .unwrap_or_default();
    let host = match host_port.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => host,
        Some(_) => return false,
        None => host_port,
    };

    if host.eq_ignore_ascii_case("localhost") || host.parse::<Ipv4Addr>().is_ok() {
        return true;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    let labels_ok = labels.iter().all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_alphanumeric() || c == '-')
    });
    let tld = labels[labels.len() - 1];
    labels_ok && tld.chars().count() >= 2 && tld.chars().all(|c| c.is_alphabetic())
}

/// Turn typed text into a navigable URL, adding a scheme when missing.
pub fn fixup_url(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if !looks_like_url(trimmed) {
        return None;
    }
    if has_explicit_scheme(trimmed) {
        return Url::parse(trimmed).ok().map(String::from);
    }
    let is_local = trimmed.to_ascii_lowercase().starts_with("localhost")
        || trimmed
            .split(|c| c == '/' || c == ':')
            .next()
            .map_or(false, |h| h.parse::<Ipv4Addr>().is_ok());
    let scheme = if is_local { "http" } else { "https" };
    Url::parse(&format!("{}://{}", scheme, trimmed)).ok().map(String::from)
}

/// Split a URL into (host without `www.`, remainder after the host).
/// The remainder is empty for a bare root URL.
pub fn split_host_and_path(url: &str) -> (String, String) {
    if let Ok(parsed) = Url::parse(url.trim()) {
        if let Some(host) = parsed.host_str() {
            let host = host.strip_prefix("www.").unwrap_or(host).to_string();
            let mut rest = if parsed.path() == "/" { String::new() } else { parsed.path().to_string() };
            if let Some(query) = parsed.query() {
                rest.push('?');
                rest.push_str(query);
            }
            return (host, rest);
        }
    }
    let stripped = strip_scheme_and_www(url.trim());
    match stripped.find('/') {
        Some(pos) => (stripped[..pos].to_lowercase(), stripped[pos..].trim_end_matches('/').to_string()),
        None => (stripped.to_lowercase(), String::new()),
    }
}
