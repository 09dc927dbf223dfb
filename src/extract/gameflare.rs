use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use super::{
    element_text, is_denied, list_with, long_enough, name_from_url, on_domain,
    rules::{first_match, Rule},
    SiteExtractor, COMMON_DENYLIST,
};
use crate::{
    fetch::Probe,
    games::CandidateEntry,
    normalize::{self, normalize},
    platform::Platform,
};

/// Substrings marking promotional tiles in the listing.
const INVALID_KEYWORDS: &[&str] = &["advertisement", "sponsor", "promo", "banner"];
/// Matched as whole words only, "ad" is a substring of too many titles.
const INVALID_WORDS: &[&str] = &["ad", "ads"];

static GAME_LINKS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a[href*='/online-game/']").expect("Failed to parse gameflare link selector")
});

static LISTING_FALLBACK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?P<url>(?:https://www\.gameflare\.com)?/online-game/[a-z0-9][a-z0-9-]*/?)["'\s<]"#)
        .expect("Failed to compile gameflare listing regex")
});

static EMBED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https://(?:www\.)?gameflare\.com/embed/[a-z0-9][a-z0-9-]*/?"#)
        .expect("Failed to compile gameflare embed regex")
});

fn infer_embed(source_url: &str) -> Option<String> {
    let segments = normalize::segments_of(source_url);
    match segments.as_slice() {
        [section, slug] if section == "online-game" => {
            Some(format!("https://www.gameflare.com/embed/{slug}/"))
        }
        _ => None,
    }
}

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule::Anchor {
            selector: "#iframe-in-game",
            attrs: &["src", "data-src"],
        },
        Rule::Frames { needle: "/embed/" },
        Rule::Pattern(&EMBED_PATTERN),
        Rule::Infer(infer_embed),
    ]
});

fn is_promotional(name: &str) -> bool {
    let name = name.to_lowercase();
    INVALID_KEYWORDS.iter().any(|k| name.contains(k))
        || name
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| INVALID_WORDS.contains(&word))
}

/// gameflare.com, players under `/embed/<slug>/`.
pub struct GameFlare;

impl GameFlare {
    fn accept_candidate(c: &CandidateEntry) -> bool {
        let segments = normalize::segments_of(&c.url);

        long_enough(&c.name)
            && !is_promotional(&c.name)
            && on_domain(&c.url, "gameflare.com")
            && !is_denied(&c.url, COMMON_DENYLIST)
            && segments.len() == 2
            && segments[0] == "online-game"
    }
}

impl SiteExtractor for GameFlare {
    fn platform(&self) -> Platform {
        Platform::GameFlare
    }

    fn list(&self, html: &str) -> Vec<CandidateEntry> {
        let origin = Platform::GameFlare.origin();

        list_with(
            Platform::GameFlare,
            html,
            |doc: &Html| {
                doc.select(&GAME_LINKS)
                    .filter_map(|el| {
                        let url = normalize(el.value().attr("href")?, origin)?;
                        let mut name = element_text(&el);
                        if name.is_empty() {
                            name = el.value().attr("title").unwrap_or_default().trim().to_string();
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
        let origin = Platform::GameFlare.origin();
        first_match(&RULES, html, source_url, probe, |raw| {
            normalize(raw, origin).filter(|url| self.validate(url))
        })
    }

    fn validate(&self, url: &str) -> bool {
        let Ok(parsed) = url::Url::parse(url) else {
            return false;
        };
        let host = parsed.host_str().unwrap_or_default();
        let path = parsed.path();

        if !on_domain(url, "gameflare.com") || path == "/" || path.starts_with("/online-game/") {
            return false;
        }

        // game servers on subdomains are fine, on the main site only the player path is
        path.starts_with("/embed/") || (host != "www.gameflare.com" && host != "gameflare.com")
    }
}
