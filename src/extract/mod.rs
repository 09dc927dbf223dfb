mod armorgames;
mod gameflare;
mod grid;
mod itchio;
pub mod rules;
mod zapgames;

use std::collections::HashSet;

use regex::Regex;
use scraper::{ElementRef, Html};

pub use armorgames::ArmorGames;
pub use gameflare::GameFlare;
pub use grid::GridPortal;
pub use itchio::ItchIo;
pub use zapgames::ZapGames;

use crate::{
    fetch::Probe,
    games::CandidateEntry,
    normalize::{self, normalize},
    platform::Platform,
};

/// Paths that are never games on the portals we scrape.
pub(crate) const COMMON_DENYLIST: &[&str] = &[
    "/category/",
    "/tag/",
    "/search",
    "/user/",
    "/about",
    "/contact",
    "/privacy",
    "/terms",
    "/#",
    "javascript:",
    "mailto:",
    "tel:",
    "/upload/",
    "/static/",
    "/css/",
    "/js/",
    "/images/",
];

pub(crate) const MIN_NAME_LEN: usize = 2;

/// Site specific knowledge of one portal.
pub trait SiteExtractor: Send + Sync {
    fn platform(&self) -> Platform;

    /// Game links found on a listing page, de-duplicated by url.
    fn list(&self, html: &str) -> Vec<CandidateEntry>;

    /// Canonical embed url found on (or derived from) a detail page.
    fn detail(&self, html: &str, source_url: &str, probe: &dyn Probe) -> Option<String>;

    /// Domain and path shape check of an embed url.
    fn validate(&self, url: &str) -> bool;
}

pub fn extractor_for(platform: Platform) -> Box<dyn SiteExtractor> {
    match platform {
        Platform::ItchIo => Box::new(ItchIo),
        Platform::AzGames | Platform::GeoGuessr => Box::new(GridPortal::new(platform)),
        Platform::ArmorGames => Box::new(ArmorGames),
        Platform::GameFlare => Box::new(GameFlare),
        Platform::ZapGames => Box::new(ZapGames),
    }
}

/// Selector pass first, a regex scan of the raw markup (scripts and comments
/// included) when the selectors find nothing acceptable.
pub(crate) fn list_with(
    platform: Platform,
    html: &str,
    structural: impl FnOnce(&Html) -> Vec<CandidateEntry>,
    fallback: &Regex,
    fallback_name: fn(&str) -> String,
    accept: impl Fn(&CandidateEntry) -> bool,
) -> Vec<CandidateEntry> {
    let doc = Html::parse_document(html);

    let found: Vec<_> = structural(&doc).into_iter().filter(|c| accept(c)).collect();
    if !found.is_empty() {
        return dedup_by_url(found);
    }

    let scanned: Vec<_> = scan(html, fallback, platform.origin(), fallback_name)
        .into_iter()
        .filter(|c| accept(c))
        .collect();

    if !scanned.is_empty() {
        log::debug!(
            "{platform}: selectors missed, regex fallback found {} links",
            scanned.len()
        );
    }

    dedup_by_url(scanned)
}

/// Candidates from a regex with a `url` group and an optional `name` group.
pub(crate) fn scan(
    html: &str,
    pattern: &Regex,
    origin: &str,
    fallback_name: fn(&str) -> String,
) -> Vec<CandidateEntry> {
    pattern
        .captures_iter(html)
        .filter_map(|caps| {
            let url = normalize(caps.name("url")?.as_str(), origin)?;
            let name = caps
                .name("name")
                .map(|m| collapse_whitespace(m.as_str()))
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| fallback_name(&url));
            Some(CandidateEntry::new(name, url))
        })
        .collect()
}

pub(crate) fn dedup_by_url(candidates: Vec<CandidateEntry>) -> Vec<CandidateEntry> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.url.clone()))
        .collect()
}

/// Text of an element with runs of whitespace squashed.
pub(crate) fn element_text(el: &ElementRef) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn is_denied(url: &str, denylist: &[&str]) -> bool {
    let url = url.to_lowercase();
    denylist.iter().any(|pattern| url.contains(pattern))
}

pub(crate) fn long_enough(name: &str) -> bool {
    name.trim().chars().count() >= MIN_NAME_LEN
}

/// Game name derived from the last segment of its url.
pub(crate) fn name_from_url(url: &str) -> String {
    normalize::slug_of(url)
        .map(|slug| normalize::title_from_slug(&slug))
        .unwrap_or_default()
}

/// `true` if `url` is on `domain` or one of its subdomains.
pub(crate) fn on_domain(url: &str, domain: &str) -> bool {
    normalize::host_of(url)
        .map(|host| host == domain || host.ends_with(&format!(".{domain}")))
        .unwrap_or(false)
}
