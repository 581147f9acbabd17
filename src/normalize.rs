use tracing::debug;
use url::Url;
use url::form_urlencoded;

// Compared lower-cased; every utm_* parameter is dropped as well.
const TRACKING_PARAMS: [&str; 10] = [
    "ref",
    "source",
    "fbclid",
    "gclid",
    "mc_cid",
    "mc_eid",
    "trk",
    "trackingid",
    "refid",
    "originalreferer",
];

fn is_tracking_param(name: &str) -> bool {
    let name = name.to_lowercase();
    name.starts_with("utm_") || TRACKING_PARAMS.contains(&name.as_str())
}

pub(crate) fn strip_www(host: &str) -> &str {
    let mut host = host;
    while let Some(rest) = host.strip_prefix("www.") {
        if rest.is_empty() || rest.starts_with('.') {
            break;
        }
        host = rest;
    }
    host
}

/// Canonical deduplication key for a URL.
///
/// Never fails: anything that does not parse as a URL with a host comes
/// back lower-cased as-is. The whole key is lower-cased, so two paths that
/// differ only in letter case collapse into one identity.
pub fn normalize(url: &str) -> String {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(url = %url, error = %e, "unparseable url, using degraded identity");
            return url.to_lowercase();
        }
    };

    let Some(host) = parsed.host_str() else {
        return url.to_lowercase();
    };
    let host = strip_www(&host.to_lowercase()).to_string();

    let path = parsed.path().trim_end_matches('/');

    let mut normalized = format!("{}://{}{}", parsed.scheme(), host, path);

    let remaining: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(name, _)| !is_tracking_param(name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    if !remaining.is_empty() {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(remaining)
            .finish();
        normalized.push('?');
        normalized.push_str(&query);
    }

    normalized.to_lowercase()
}
