use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::{
    element_text, is_denied, list_with, long_enough, on_domain,
    rules::{first_match, Rule},
    SiteExtractor, COMMON_DENYLIST,
};
use crate::{
    fetch::Probe,
    games::CandidateEntry,
    normalize::{self, normalize},
    platform::Platform,
};

static LIST_ITEMS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("ul.gamelisting li").expect("Failed to parse armorgames listing selector")
});
static LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("Failed to parse link selector"));
static THUMB: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img").expect("Failed to parse img selector"));

/// `/<slug>-game/<id>`
static GAME_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/[^/]+-game/\d+/?$").expect("Failed to compile armorgames path regex")
});

static LISTING_FALLBACK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?P<url>(?:https://armorgames\.com)?/[a-z0-9-]+-game/\d+)["'\s<]"#)
        .expect("Failed to compile armorgames listing regex")
});

static DATA_SRC_CACHE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"data-src=['"](https://[^'"]*\.cache\.armorgames\.com[^'"]*)"#)
        .expect("Failed to compile armorgames cache regex")
});
static SRC_CACHE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"src=['"](https://[^'"]*\.cache\.armorgames\.com[^'"]*)"#)
        .expect("Failed to compile armorgames cache regex")
});
static BARE_CACHE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(https://\d+\.cache\.armorgames\.com/files/games/[^'"\s]+)"#)
        .expect("Failed to compile armorgames cache regex")
});

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule::Anchor {
            selector: "iframe#html-game-frame",
            attrs: &["data-src", "src"],
        },
        Rule::Frames {
            needle: "armorgames.com",
        },
        Rule::Pattern(&DATA_SRC_CACHE),
        Rule::Pattern(&SRC_CACHE),
        Rule::Pattern(&BARE_CACHE),
    ]
});

/// `"/subway-moto-game/19234"` -> `"Subway Moto"`
fn name_from_game_url(url: &str) -> String {
    normalize::segments_of(url)
        .first()
        .map(|slug| normalize::title_from_slug(slug.trim_end_matches("-game")))
        .unwrap_or_default()
}

/// armorgames.com, html5 games served from `<n>.cache.armorgames.com`.
pub struct ArmorGames;

impl ArmorGames {
    fn accept_candidate(c: &CandidateEntry) -> bool {
        let path = url::Url::parse(&c.url)
            .map(|u| u.path().to_string())
            .unwrap_or_default();

        long_enough(&c.name)
            && on_domain(&c.url, "armorgames.com")
            && !is_denied(&c.url, COMMON_DENYLIST)
            && !c.url.contains("/games/date")
            && GAME_PATH.is_match(&path)
    }

    fn name_of(link: &ElementRef) -> String {
        let from_title = link.value().attr("title").map(str::trim).unwrap_or_default();
        if !from_title.is_empty() {
            return from_title.to_string();
        }

        let text = element_text(link);
        if !text.is_empty() {
            return text;
        }

        link.select(&THUMB)
            .next()
            .and_then(|img| img.value().attr("alt").or_else(|| img.value().attr("title")))
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    }
}

impl SiteExtractor for ArmorGames {
    fn platform(&self) -> Platform {
        Platform::ArmorGames
    }

    fn list(&self, html: &str) -> Vec<CandidateEntry> {
        let origin = Platform::ArmorGames.origin();

        list_with(
            Platform::ArmorGames,
            html,
            |doc: &Html| {
                doc.select(&LIST_ITEMS)
                    .filter_map(|li| {
                        let link = li.select(&LINK).next()?;
                        let url = normalize(link.value().attr("href")?, origin)?;
                        Some(CandidateEntry::new(Self::name_of(&link), url))
                    })
                    .collect()
            },
            &LISTING_FALLBACK,
            name_from_game_url,
            Self::accept_candidate,
        )
    }

    fn detail(&self, html: &str, source_url: &str, probe: &dyn Probe) -> Option<String> {
        let origin = Platform::ArmorGames.origin();
        first_match(&RULES, html, source_url, probe, |raw| {
            normalize(raw, origin).filter(|url| self.validate(url))
        })
    }

    fn validate(&self, url: &str) -> bool {
        let Ok(parsed) = url::Url::parse(url) else {
            return false;
        };
        let host = parsed.host_str().unwrap_or_default();

        on_domain(url, "armorgames.com")
            && (host.ends_with(".cache.armorgames.com") || parsed.path().starts_with("/files/games/"))
    }
}
