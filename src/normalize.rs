use url::Url;

/// Query parameters that never change what a page serves.
const TRACKING_PARAMS: &[&str] = &[
    "v", "fbclid", "gclid", "ref", "ref_src", "mc_cid", "mc_eid", "_ga", "_gl",
];

/// Normalize a url extracted from markup.
///
/// Applies the following transformations:
/// - Unescapes HTML entities and JS string escapes, trims quotes
/// - Resolves protocol-relative and relative urls against `origin`
/// - Lowercases the hostname and drops the fragment
/// - Strips tracking query parameters (`v`, utm_*, fbclid, gclid, ref, mc_*)
/// - Collapses duplicated path segments (`/index.html/index.html`)
///
/// Returns `None` if the result is not an absolute http(s) url.
/// `normalize(normalize(x)) == normalize(x)` for every input.
pub fn normalize(raw: &str, origin: &str) -> Option<String> {
    let cleaned = clean_raw(raw);
    let mut url = resolve(&cleaned, origin)?;
    canonicalize(&mut url);
    Some(url.to_string())
}

/// Unescape until nothing changes, then trim whitespace and quotes.
pub fn clean_raw(raw: &str) -> String {
    let mut current = raw.trim().to_string();
    loop {
        let next = unescape_once(&current);
        if next == current {
            break;
        }
        current = next;
    }

    current
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

fn unescape_once(s: &str) -> String {
    // every replacement is shorter than its pattern, so repeated passes terminate
    s.replace("\\u002F", "/")
        .replace("\\u002f", "/")
        .replace("\\/", "/")
        .replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&#x2F;", "/")
        .replace("&#x2f;", "/")
        .replace("&#47;", "/")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .replace('\\', "")
}

/// Turn `raw` into an absolute url, resolving relative forms against `origin`.
pub fn resolve(raw: &str, origin: &str) -> Option<Url> {
    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }

    let lower = raw.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:", "about:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let candidate = if raw.starts_with("//") {
        format!("https:{raw}")
    } else {
        raw.to_string()
    };

    let url = match Url::parse(&candidate) {
        Ok(u) => u,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(origin).ok()?.join(&candidate).ok()?
        }
        Err(_) => return None,
    };

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }

    Some(url)
}

/// In-place cleanup of an already absolute url.
pub fn canonicalize(url: &mut Url) {
    url.set_fragment(None);

    if let Some(query) = url.query().map(str::to_string) {
        let kept: Vec<&str> = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter(|pair| {
                let key = pair.split('=').next().unwrap_or_default();
                !is_tracking_param(key)
            })
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.set_query(Some(&kept.join("&")));
        }
    }

    let path = collapse_segments(url.path());
    url.set_path(&path);
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

/// Collapse `a/a` file segments anywhere and any repeated run at the end of the path.
pub fn collapse_segments(path: &str) -> String {
    let trailing_slash = path.len() > 1 && path.ends_with('/');

    let mut out: Vec<&str> = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if segment.contains('.') && out.last() == Some(&segment) {
            continue;
        }
        out.push(segment);
    }

    while out.len() >= 2 && out[out.len() - 1] == out[out.len() - 2] {
        out.pop();
    }

    if out.is_empty() {
        return "/".to_string();
    }

    let mut collapsed = format!("/{}", out.join("/"));
    if trailing_slash {
        collapsed.push('/');
    }
    collapsed
}

/// Lowercased host of `url`.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(|h| h.to_lowercase())
}

/// Non-empty path segments of `url`.
pub fn segments_of(url: &str) -> Vec<String> {
    Url::parse(url)
        .ok()
        .map(|u| {
            u.path()
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Last path segment of `url`, the slug most portals name games by.
pub fn slug_of(url: &str) -> Option<String> {
    segments_of(url).pop()
}

/// `"subway-moto"` -> `"Subway Moto"`
pub fn title_from_slug(slug: &str) -> String {
    slug.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
