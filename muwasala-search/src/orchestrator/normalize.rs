//! Canonical forms used for duplicate detection.
//!
//! Titles decide ranker dedup (`(source, title)` pairs); URLs decide
//! whether a fallback candidate repeats something the live round already
//! found.

use url::Url;

/// Query parameters that never change which page a URL points at.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "ref",
];

/// Canonical form of a title: lowercased, punctuation and symbols dropped,
/// whitespace runs collapsed to one space, trimmed.
///
/// Letters and digits of any script are kept, so Arabic titles normalise
/// as well as Latin ones.
///
/// ```
/// use muwasala_search::orchestrator::normalize::normalize_title;
///
/// assert_eq!(normalize_title("  Fasting: The Rules!  "), "fasting the rules");
/// assert_eq!(normalize_title("FASTING -- the rules"), "fasting the rules");
/// ```
pub fn normalize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_space = false;
    for ch in title.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(ch);
        } else if ch.is_whitespace() {
            pending_space = true;
        }
    }
    out
}

/// Canonical form of a URL for equality checks.
///
/// Drops the fragment, default ports, tracking parameters and a trailing
/// path slash, and sorts the remaining query parameters. Scheme and host
/// come out lowercased from the parser. Unparseable input is returned
/// unchanged.
///
/// ```
/// use muwasala_search::orchestrator::normalize::normalize_url;
///
/// let a = normalize_url("https://Quran.COM/2/183/?b=2&a=1#tafsir");
/// let b = normalize_url("https://quran.com/2/183?a=1&b=2&utm_source=x");
/// assert_eq!(a, b);
/// ```
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut parsed) = Url::parse(raw) else {
        return raw.to_string();
    };

    parsed.set_fragment(None);
    if matches!(
        (parsed.scheme(), parsed.port()),
        ("http", Some(80)) | ("https", Some(443))
    ) {
        let _ = parsed.set_port(None);
    }

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.to_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();
    if params.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(&params);
    }

    let path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(path.trim_end_matches('/'));
    }

    parsed.to_string()
}
