//! URL helpers: domain normalization, tracking-parameter removal and
//! unwrapping of search-engine redirector links.

use url::Url;

/// Query parameters that only carry tracking information.
const TRACKING_PARAMS: &[&str] = &["spm", "from", "ref", "source", "cmpid"];

/// (domain, path suffix, query parameters holding the target URL)
const REDIRECTORS: &[(&str, &str, &[&str])] = &[
    ("bing.com", "/news/apiclick.aspx", &["url"]),
    ("google.com", "/url", &["url", "q"]),
];

/// Lowercased host without a leading `www.`.
pub fn normalize_domain(link: &str) -> Option<String> {
    let url = Url::parse(link.trim()).ok()?;
    let host = url.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").map(str::to_string).unwrap_or(host);
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// `domain` equals `pattern` or is a subdomain of it.
pub fn domain_matches(domain: &str, pattern: &str) -> bool {
    domain == pattern
        || domain
            .strip_suffix(pattern)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

/// Drops tracking parameters and the fragment. Links that do not parse as
/// absolute URLs with a host are returned trimmed but otherwise untouched.
pub fn clean_url(link: &str) -> String {
    let trimmed = link.trim();
    let mut url = match Url::parse(trimmed) {
        Ok(url) if url.has_host() => url,
        _ => return trimmed.to_string(),
    };

    url.set_fragment(None);

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let kept: Vec<&(String, String)> = pairs
        .iter()
        .filter(|(k, _)| !is_tracking_param(k))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else if kept.len() != pairs.len() {
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }

    url.to_string()
}

/// Unwraps known redirector links to the article they point at and cleans
/// the result. If no target can be found the cleaned redirector link is kept.
pub fn resolve_link(link: &str) -> String {
    if let Some(target) = redirect_target(link) {
        return clean_url(&target);
    }
    clean_url(link)
}

fn redirect_target(link: &str) -> Option<String> {
    let url = Url::parse(link.trim()).ok()?;
    let domain = normalize_domain(link)?;

    let (_, _, params) = REDIRECTORS.iter().find(|(redirector, suffix, _)| {
        domain_matches(&domain, redirector) && url.path().ends_with(suffix)
    })?;

    params.iter().find_map(|param| {
        url.query_pairs()
            .find(|(k, _)| k == *param)
            .map(|(_, v)| v.trim().to_string())
            .filter(|v| v.starts_with("http://") || v.starts_with("https://"))
    })
}

pub fn is_http(link: &str) -> bool {
    link.starts_with("http://") || link.starts_with("https://")
}
