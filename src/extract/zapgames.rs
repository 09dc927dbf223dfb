use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::{
    is_denied, list_with, long_enough, name_from_url, on_domain,
    rules::{first_match, Rule},
    SiteExtractor, COMMON_DENYLIST,
};
use crate::{
    fetch::Probe,
    games::CandidateEntry,
    normalize::{self, normalize},
    platform::Platform,
};

const INVALID_KEYWORDS: &[&str] = &["advertisement", "promo", "sponsor", "ad-"];

/// Badges rendered in front of a thumbnail title.
const BADGES: &[&str] = &["Top rated", "Hot", "Trending", "New"];

/// Top level pages that look like game slugs.
const NAV_PAGES: &[&str] = &[
    "new",
    "hot",
    "trending",
    "top-rated",
    "popular",
    "categories",
    "tags",
    "login",
    "signup",
];

// class names carry a build hash suffix, match on the stable prefix
static GAME_LINKS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a[class*='GameThumb_gameThumbLink']")
        .expect("Failed to parse zapgames link selector")
});
static TITLE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("[class*='GameThumb_gameThumbTitleContainer']")
        .expect("Failed to parse zapgames title selector")
});
static THUMB: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img").expect("Failed to parse img selector"));

static PLAY_ALT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^play\s+(.+?)(?:\s+game)?$").expect("Failed to compile alt regex")
});

static LISTING_FALLBACK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?P<url>https://zapgames\.io/[a-z0-9][a-z0-9-]*)["'\s<]"#)
        .expect("Failed to compile zapgames listing regex")
});

static EMBED_ABSOLUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https://(?:www\.)?zapgames\.io/[^<>\s"']+\.embed"#)
        .expect("Failed to compile zapgames embed regex")
});

fn infer_embed(source_url: &str) -> Option<String> {
    let url = url::Url::parse(source_url).ok()?;
    let path = url.path().trim_end_matches('/');
    if path.is_empty() || path.ends_with(".embed") {
        return None;
    }
    Some(format!("https://{}{path}.embed", url.host_str()?))
}

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule::Frames { needle: ".embed" },
        Rule::Pattern(&EMBED_ABSOLUTE),
        Rule::Infer(infer_embed),
    ]
});

/// Strip a leading badge, whether it came as its own text node or glued to the title.
fn strip_badge(pieces: &[&str]) -> String {
    let mut pieces: Vec<&str> = pieces.iter().map(|p| p.trim()).filter(|p| !p.is_empty()).collect();

    if pieces.len() > 1 && BADGES.iter().any(|b| b.eq_ignore_ascii_case(pieces[0])) {
        pieces.remove(0);
    }

    let joined = pieces.join(" ");
    if pieces.len() == 1 {
        for badge in BADGES {
            let Some(rest) = joined.strip_prefix(badge) else {
                continue;
            };
            // "HotMoto Road" but not "Newton's Apple"
            if rest
                .chars()
                .next()
                .is_some_and(|c| c.is_uppercase() || c.is_ascii_digit())
            {
                return rest.trim().to_string();
            }
        }
    }
    joined
}

/// zapgames.io, players at `<game url>.embed`.
pub struct ZapGames;

impl ZapGames {
    fn accept_candidate(c: &CandidateEntry) -> bool {
        let name = c.name.to_lowercase();
        let segments = normalize::segments_of(&c.url);

        long_enough(&c.name)
            && !INVALID_KEYWORDS.iter().any(|k| name.contains(k))
            && on_domain(&c.url, "zapgames.io")
            && !is_denied(&c.url, COMMON_DENYLIST)
            && !segments.is_empty()
            && !(segments.len() == 1 && NAV_PAGES.contains(&segments[0].as_str()))
    }

    fn name_of(link: &ElementRef) -> String {
        if let Some(title) = link.select(&TITLE).next() {
            let pieces: Vec<&str> = title.text().collect();
            let name = strip_badge(&pieces);
            if !name.is_empty() {
                return name;
            }
        }

        link.select(&THUMB)
            .next()
            .and_then(|img| img.value().attr("alt"))
            .map(|alt| {
                let alt = alt.trim();
                PLAY_ALT
                    .captures(alt)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_else(|| alt.to_string())
            })
            .unwrap_or_default()
    }
}

impl SiteExtractor for ZapGames {
    fn platform(&self) -> Platform {
        Platform::ZapGames
    }

    fn list(&self, html: &str) -> Vec<CandidateEntry> {
        let origin = Platform::ZapGames.origin();

        list_with(
            Platform::ZapGames,
            html,
            |doc: &Html| {
                doc.select(&GAME_LINKS)
                    .filter_map(|el| {
                        let url = normalize(el.value().attr("href")?, origin)?;
                        let mut name = Self::name_of(&el);
                        if name.is_empty() {
                            name = name_from_url(&url);
                        }
                        Some(CandidateEntry::new(name, url))
                    })
                    .collect()
            },
            &LISTING_FALLBACK,
            name_from_url,
            Self::accept_candidate,
        )
    }

    fn detail(&self, html: &str, source_url: &str, probe: &dyn Probe) -> Option<String> {
        let origin = Platform::ZapGames.origin();
        first_match(&RULES, html, source_url, probe, |raw| {
            normalize(raw, origin).filter(|url| self.validate(url))
        })
    }

    fn validate(&self, url: &str) -> bool {
        on_domain(url, "zapgames.io")
            && url::Url::parse(url)
                .map(|u| u.path().ends_with(".embed") && u.path().len() > "/.embed".len())
                .unwrap_or(false)
    }
}
